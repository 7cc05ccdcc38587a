use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

/// Branch refinement after the initial placement.
#[derive(Debug, Clone, PartialEq)]
pub struct RefinementConfig {
    pub enabled: bool,
    pub max_iterations: usize,
    /// Finite-difference step used for every numeric derivative.
    pub approx_step: f64,
    /// A round improving the energy by less than this ends refinement.
    pub energy_threshold: f64,
    pub seed: u64,
}

impl Default for RefinementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_iterations: 20,
            approx_step: 1e-4,
            energy_threshold: 1e-3,
            seed: 0x5eed,
        }
    }
}

/// Gradient smoothing of large or distorted ring blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct SmoothingConfig {
    pub macrocycle_min_size: usize,
    pub max_iterations: usize,
    /// Relative bond-length deviation above which a block is smoothed.
    pub bond_tolerance: f64,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self {
            macrocycle_min_size: 9,
            max_iterations: 400,
            bond_tolerance: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutConfig {
    pub bond_length: f64,
    /// Keep atoms that already have non-zero coordinates where they are.
    pub respect_existing: bool,
    /// Wall-clock budget in milliseconds; `0` disables the timeout.
    pub timeout_ms: u64,
    /// Gaps between fragments composed side by side, in bond lengths.
    pub horizontal_interval: f64,
    pub vertical_interval: f64,
    pub refinement: RefinementConfig,
    pub smoothing: SmoothingConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            bond_length: 1.0,
            respect_existing: false,
            timeout_ms: 0,
            horizontal_interval: 1.0,
            vertical_interval: 1.0,
            refinement: RefinementConfig::default(),
            smoothing: SmoothingConfig::default(),
        }
    }
}

impl LayoutConfig {
    pub fn builder() -> LayoutConfigBuilder {
        LayoutConfigBuilder::new()
    }

    /// Parses a TOML document; absent keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse(content, "<string>")
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.to_string_lossy())
    }

    fn parse(content: &str, origin: &str) -> Result<Self, ConfigError> {
        let partial: PartialLayoutConfig =
            toml::from_str(content).map_err(|e| ConfigError::Toml {
                path: origin.to_string(),
                source: e,
            })?;
        partial.into_builder().build()
    }
}

#[derive(Default)]
pub struct LayoutConfigBuilder {
    bond_length: Option<f64>,
    respect_existing: Option<bool>,
    timeout_ms: Option<u64>,
    horizontal_interval: Option<f64>,
    vertical_interval: Option<f64>,
    refinement_enabled: Option<bool>,
    refinement_max_iterations: Option<usize>,
    approx_step: Option<f64>,
    energy_threshold: Option<f64>,
    seed: Option<u64>,
    macrocycle_min_size: Option<usize>,
    smoothing_max_iterations: Option<usize>,
    bond_tolerance: Option<f64>,
}

impl LayoutConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bond_length(mut self, length: f64) -> Self {
        self.bond_length = Some(length);
        self
    }
    pub fn respect_existing(mut self, respect: bool) -> Self {
        self.respect_existing = Some(respect);
        self
    }
    pub fn timeout_ms(mut self, timeout: u64) -> Self {
        self.timeout_ms = Some(timeout);
        self
    }
    pub fn horizontal_interval(mut self, interval: f64) -> Self {
        self.horizontal_interval = Some(interval);
        self
    }
    pub fn vertical_interval(mut self, interval: f64) -> Self {
        self.vertical_interval = Some(interval);
        self
    }
    pub fn refinement_enabled(mut self, enabled: bool) -> Self {
        self.refinement_enabled = Some(enabled);
        self
    }
    pub fn refinement_max_iterations(mut self, iterations: usize) -> Self {
        self.refinement_max_iterations = Some(iterations);
        self
    }
    pub fn approx_step(mut self, step: f64) -> Self {
        self.approx_step = Some(step);
        self
    }
    pub fn energy_threshold(mut self, threshold: f64) -> Self {
        self.energy_threshold = Some(threshold);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn macrocycle_min_size(mut self, size: usize) -> Self {
        self.macrocycle_min_size = Some(size);
        self
    }
    pub fn smoothing_max_iterations(mut self, iterations: usize) -> Self {
        self.smoothing_max_iterations = Some(iterations);
        self
    }
    pub fn bond_tolerance(mut self, tolerance: f64) -> Self {
        self.bond_tolerance = Some(tolerance);
        self
    }

    pub fn build(self) -> Result<LayoutConfig, ConfigError> {
        let defaults = LayoutConfig::default();
        let config = LayoutConfig {
            bond_length: self.bond_length.unwrap_or(defaults.bond_length),
            respect_existing: self.respect_existing.unwrap_or(defaults.respect_existing),
            timeout_ms: self.timeout_ms.unwrap_or(defaults.timeout_ms),
            horizontal_interval: self
                .horizontal_interval
                .unwrap_or(defaults.horizontal_interval),
            vertical_interval: self.vertical_interval.unwrap_or(defaults.vertical_interval),
            refinement: RefinementConfig {
                enabled: self.refinement_enabled.unwrap_or(defaults.refinement.enabled),
                max_iterations: self
                    .refinement_max_iterations
                    .unwrap_or(defaults.refinement.max_iterations),
                approx_step: self.approx_step.unwrap_or(defaults.refinement.approx_step),
                energy_threshold: self
                    .energy_threshold
                    .unwrap_or(defaults.refinement.energy_threshold),
                seed: self.seed.unwrap_or(defaults.refinement.seed),
            },
            smoothing: SmoothingConfig {
                macrocycle_min_size: self
                    .macrocycle_min_size
                    .unwrap_or(defaults.smoothing.macrocycle_min_size),
                max_iterations: self
                    .smoothing_max_iterations
                    .unwrap_or(defaults.smoothing.max_iterations),
                bond_tolerance: self
                    .bond_tolerance
                    .unwrap_or(defaults.smoothing.bond_tolerance),
            },
        };
        config.validate()?;
        Ok(config)
    }
}

impl LayoutConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        let positive = |name: &'static str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(ConfigError::InvalidParameter {
                    name,
                    reason: format!("must be a positive finite number, got {value}"),
                })
            }
        };
        let non_negative = |name: &'static str, value: f64| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(ConfigError::InvalidParameter {
                    name,
                    reason: format!("must be a non-negative finite number, got {value}"),
                })
            }
        };

        positive("bond-length", self.bond_length)?;
        non_negative("horizontal-interval", self.horizontal_interval)?;
        non_negative("vertical-interval", self.vertical_interval)?;
        positive("approx-step", self.refinement.approx_step)?;
        non_negative("energy-threshold", self.refinement.energy_threshold)?;
        positive("bond-tolerance", self.smoothing.bond_tolerance)?;
        if self.smoothing.macrocycle_min_size < 3 {
            return Err(ConfigError::InvalidParameter {
                name: "macrocycle-min-size",
                reason: format!(
                    "rings have at least 3 atoms, got {}",
                    self.smoothing.macrocycle_min_size
                ),
            });
        }
        Ok(())
    }
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialRefinementConfig {
    enabled: Option<bool>,
    max_iterations: Option<usize>,
    approx_step: Option<f64>,
    energy_threshold: Option<f64>,
    seed: Option<u64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialSmoothingConfig {
    macrocycle_min_size: Option<usize>,
    max_iterations: Option<usize>,
    bond_tolerance: Option<f64>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
struct PartialLayoutConfig {
    bond_length: Option<f64>,
    respect_existing: Option<bool>,
    timeout_ms: Option<u64>,
    horizontal_interval: Option<f64>,
    vertical_interval: Option<f64>,
    #[serde(default)]
    refinement: PartialRefinementConfig,
    #[serde(default)]
    smoothing: PartialSmoothingConfig,
}

impl PartialLayoutConfig {
    fn into_builder(self) -> LayoutConfigBuilder {
        LayoutConfigBuilder {
            bond_length: self.bond_length,
            respect_existing: self.respect_existing,
            timeout_ms: self.timeout_ms,
            horizontal_interval: self.horizontal_interval,
            vertical_interval: self.vertical_interval,
            refinement_enabled: self.refinement.enabled,
            refinement_max_iterations: self.refinement.max_iterations,
            approx_step: self.refinement.approx_step,
            energy_threshold: self.refinement.energy_threshold,
            seed: self.refinement.seed,
            macrocycle_min_size: self.smoothing.macrocycle_min_size,
            smoothing_max_iterations: self.smoothing.max_iterations,
            bond_tolerance: self.smoothing.bond_tolerance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn builder_without_overrides_yields_defaults() {
        let config = LayoutConfigBuilder::new().build().unwrap();
        assert_eq!(config, LayoutConfig::default());
    }

    #[test]
    fn builder_rejects_non_positive_bond_length() {
        let result = LayoutConfig::builder().bond_length(0.0).build();
        assert!(matches!(
            result,
            Err(ConfigError::InvalidParameter { name: "bond-length", .. })
        ));
    }

    #[test]
    fn builder_rejects_tiny_macrocycle_threshold() {
        let result = LayoutConfig::builder().macrocycle_min_size(2).build();
        assert!(matches!(result, Err(ConfigError::InvalidParameter { .. })));
    }

    #[test]
    fn toml_overrides_nested_sections() {
        let config = LayoutConfig::from_toml_str(
            r#"
            bond-length = 1.5
            respect-existing = true

            [refinement]
            max-iterations = 5
            seed = 42

            [smoothing]
            macrocycle-min-size = 12
            "#,
        )
        .unwrap();

        assert_eq!(config.bond_length, 1.5);
        assert!(config.respect_existing);
        assert_eq!(config.refinement.max_iterations, 5);
        assert_eq!(config.refinement.seed, 42);
        assert!(config.refinement.enabled);
        assert_eq!(config.smoothing.macrocycle_min_size, 12);
        assert_eq!(config.smoothing.max_iterations, SmoothingConfig::default().max_iterations);
    }

    #[test]
    fn toml_with_unknown_key_is_rejected() {
        let result = LayoutConfig::from_toml_str("bond-lenght = 1.5");
        assert!(matches!(result, Err(ConfigError::Toml { .. })));
    }

    #[test]
    fn load_reads_config_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "timeout-ms = 250\nhorizontal-interval = 2.0").unwrap();

        let config = LayoutConfig::load(file.path()).unwrap();
        assert_eq!(config.timeout_ms, 250);
        assert_eq!(config.horizontal_interval, 2.0);
    }

    #[test]
    fn load_reports_missing_file_with_path() {
        let result = LayoutConfig::load(Path::new("/definitely/not/here.toml"));
        match result {
            Err(ConfigError::Io { path, .. }) => assert!(path.contains("here.toml")),
            other => panic!("expected Io error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_value_in_file_fails_validation() {
        let result = LayoutConfig::from_toml_str("[refinement]\napprox-step = -1.0");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidParameter { name: "approx-step", .. })
        ));
    }
}
