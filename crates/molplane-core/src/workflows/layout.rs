use super::brackets::place_brackets;
use crate::core::graph::VertexId;
use crate::core::models::molecule::Molecule;
use crate::core::models::sgroup::SGroupKind;
use crate::engine::cancellation::{CancellationHandler, TimeoutCancellationHandler};
use crate::engine::config::LayoutConfig;
use crate::engine::error::LayoutError;
use crate::engine::layout::{LayoutContext, LayoutGraph};
use crate::engine::metalayout::{LayoutItem, Metalayout};
use crate::engine::progress::{Progress, ProgressReporter};
use nalgebra::{Point2, Point3, Vector2};
use slotmap::SecondaryMap;
use std::collections::HashMap;
use tracing::{debug, info, instrument};

/// Copies of a multiple group beyond the first, keyed by copy atom.
///
/// Each entry names the parent atom the copy stands for and which copy
/// (starting at 1) it belongs to.
#[derive(Debug, Default)]
struct CollapsedGroups {
    copies: HashMap<VertexId, (VertexId, usize)>,
    /// Parent atoms of every collapsed group.
    groups: Vec<Vec<VertexId>>,
}

impl CollapsedGroups {
    fn is_copy(&self, atom: VertexId) -> bool {
        self.copies.contains_key(&atom)
    }

    /// The atom that represents `atom` in the collapsed drawing.
    fn representative(&self, atom: VertexId) -> VertexId {
        self.copies.get(&atom).map_or(atom, |&(parent, _)| parent)
    }
}

/// Computes 2D coordinates for a molecule in place.
///
/// Besides atom positions, the layout updates everything whose geometry
/// follows from them: copies of multiple groups, R-group fragments and
/// S-group brackets.
pub struct MoleculeLayout<'m> {
    molecule: &'m mut Molecule,
    config: LayoutConfig,
    cancellation: Option<Box<dyn CancellationHandler + 'm>>,
    reporter: ProgressReporter<'m>,
}

impl<'m> MoleculeLayout<'m> {
    pub fn new(molecule: &'m mut Molecule, config: LayoutConfig) -> Self {
        Self {
            molecule,
            config,
            cancellation: None,
            reporter: ProgressReporter::new(),
        }
    }

    /// Replaces the timeout handler derived from the configuration.
    pub fn set_cancellation_handler(&mut self, handler: Box<dyn CancellationHandler + 'm>) {
        self.cancellation = Some(handler);
    }

    pub fn set_progress_reporter(&mut self, reporter: ProgressReporter<'m>) {
        self.reporter = reporter;
    }

    #[instrument(skip_all, name = "molecule_layout", fields(atoms = self.molecule.atom_count()))]
    pub fn make(&mut self) -> Result<(), LayoutError> {
        let timeout = (self.cancellation.is_none() && self.config.timeout_ms > 0)
            .then(|| TimeoutCancellationHandler::new(self.config.timeout_ms));
        let cancellation: Option<&dyn CancellationHandler> = match &self.cancellation {
            Some(handler) => Some(handler.as_ref()),
            None => timeout.as_ref().map(|h| h as &dyn CancellationHandler),
        };
        let ctx = LayoutContext::new(&self.config, cancellation);

        info!("Starting molecule layout.");
        layout_molecule(self.molecule, &ctx, &self.reporter)?;
        info!(
            atoms = self.molecule.atom_count(),
            rgroups = self.molecule.rgroups().len(),
            "Molecule layout complete."
        );
        Ok(())
    }
}

fn layout_molecule(
    molecule: &mut Molecule,
    ctx: &LayoutContext,
    reporter: &ProgressReporter,
) -> Result<(), LayoutError> {
    let bond_length = ctx.config.bond_length;

    // === Phase 1: Collapse multiple groups ===
    reporter.report(Progress::PhaseStart { name: "Collapse" });
    let collapsed = collapse_multiple_groups(molecule)?;
    let mut graph = build_layout_graph(molecule, &collapsed, ctx.config)?;
    debug!(
        copies = collapsed.copies.len(),
        vertices = graph.vertex_count(),
        "Multiple groups collapsed."
    );
    reporter.report(Progress::PhaseFinish);

    // === Phase 2: Layout of the collapsed graph ===
    reporter.report(Progress::PhaseStart { name: "Layout" });
    graph.layout(ctx)?;
    for v in graph.vertex_ids() {
        let lv = graph.vertex(v)?;
        if lv.fixed {
            continue;
        }
        let p = lv.pos * bond_length;
        molecule.set_atom_xyz(lv.ext_idx, Point3::new(p.x, p.y, 0.0))?;
    }
    reporter.report(Progress::PhaseFinish);

    // === Phase 3: Expand multiple groups ===
    if !collapsed.groups.is_empty() {
        reporter.report(Progress::PhaseStart { name: "Expand" });
        expand_multiple_groups(molecule, &collapsed, bond_length)?;
        reporter.report(Progress::Message(format!(
            "Expanded {} multiple group(s).",
            collapsed.groups.len()
        )));
        reporter.report(Progress::PhaseFinish);
    }

    // === Phase 4: R-group fragments ===
    if !molecule.rgroups().is_empty() {
        reporter.report(Progress::PhaseStart { name: "R-groups" });
        for rgroup in molecule.rgroups_mut() {
            for fragment in &mut rgroup.fragments {
                reporter.report(Progress::FragmentStart {
                    atoms: fragment.atom_count(),
                });
                ctx.check_cancelled()?;
                layout_molecule(fragment, ctx, reporter)?;
                reporter.report(Progress::FragmentFinish);
            }
        }
        compose_rgroups(molecule, ctx.config);
        reporter.report(Progress::PhaseFinish);
    }

    // === Phase 5: S-group brackets ===
    place_brackets(molecule, bond_length)?;
    Ok(())
}

fn collapse_multiple_groups(molecule: &Molecule) -> Result<CollapsedGroups, LayoutError> {
    let mut collapsed = CollapsedGroups::default();
    for (index, sgroup) in molecule.sgroups().iter().enumerate() {
        let SGroupKind::MultipleGroup {
            multiplier,
            parent_atoms,
        } = &sgroup.kind
        else {
            continue;
        };
        let invalid = |message: String| LayoutError::InvalidSGroup { index, message };
        let width = parent_atoms.len();
        if *multiplier == 0 || width == 0 {
            return Err(invalid("multiple group without parent atoms".to_string()));
        }
        if sgroup.atoms.len() != multiplier * width {
            return Err(invalid(format!(
                "expected {} atoms for {} copies of {}, found {}",
                multiplier * width,
                multiplier,
                width,
                sgroup.atoms.len()
            )));
        }
        if sgroup.atoms[..width] != parent_atoms[..] {
            return Err(invalid("parent atoms must be the first copy".to_string()));
        }
        if let Some(&missing) = sgroup.atoms.iter().find(|&&a| !molecule.graph().has_vertex(a)) {
            return Err(invalid(format!("atom {missing:?} is not in the molecule")));
        }

        for (k, copy) in sgroup.atoms.chunks(width).enumerate().skip(1) {
            for (&atom, &parent) in copy.iter().zip(parent_atoms) {
                collapsed.copies.insert(atom, (parent, k));
            }
        }
        collapsed.groups.push(parent_atoms.clone());
    }
    Ok(collapsed)
}

/// Mirrors the molecule without multiple-group copies.
///
/// A bond from a copy to an atom outside its group is redirected to the
/// matching parent atom; bonds among group atoms that touch a copy are
/// dropped.
fn build_layout_graph(
    molecule: &Molecule,
    collapsed: &CollapsedGroups,
    config: &LayoutConfig,
) -> Result<LayoutGraph, LayoutError> {
    let mut graph = LayoutGraph::new();
    let mut mapping: SecondaryMap<VertexId, VertexId> = SecondaryMap::new();
    for atom in molecule.atoms() {
        if collapsed.is_copy(atom) {
            continue;
        }
        let position = molecule.atom_xyz(atom)?;
        let fixed = (config.respect_existing && position != Point3::origin())
            .then(|| Point2::new(position.x, position.y) / config.bond_length);
        mapping.insert(atom, graph.add_vertex(atom, fixed));
    }

    let group_atoms = |atom: VertexId| {
        molecule.sgroups().iter().any(|sg| {
            matches!(sg.kind, SGroupKind::MultipleGroup { .. }) && sg.contains(atom)
        })
    };
    for (e, edge) in molecule.graph().edges_iter() {
        let (beg_copy, end_copy) = (collapsed.is_copy(edge.beg), collapsed.is_copy(edge.end));
        if (beg_copy && group_atoms(edge.end)) || (end_copy && group_atoms(edge.beg)) {
            continue;
        }
        let (Some(&beg), Some(&end)) = (
            mapping.get(collapsed.representative(edge.beg)),
            mapping.get(collapsed.representative(edge.end)),
        ) else {
            return Err(LayoutError::Internal(format!(
                "bond {e:?} has no representative in the collapsed graph"
            )));
        };
        if beg == end {
            continue;
        }
        let ext = (!beg_copy && !end_copy).then_some(e);
        graph.add_edge(beg, end, ext)?;
    }
    Ok(graph)
}

/// Places copy `k` of each parent atom `k` group widths to the right.
fn expand_multiple_groups(
    molecule: &mut Molecule,
    collapsed: &CollapsedGroups,
    bond_length: f64,
) -> Result<(), LayoutError> {
    let mut shifts: HashMap<VertexId, f64> = HashMap::new();
    for parents in &collapsed.groups {
        let Some((min, max)) = molecule.bounding_box_of(parents.iter().copied()) else {
            continue;
        };
        let step = max.x - min.x + bond_length;
        for &parent in parents {
            shifts.insert(parent, step);
        }
    }
    for (&copy, &(parent, k)) in &collapsed.copies {
        let step = shifts.get(&parent).copied().unwrap_or(bond_length);
        let origin = molecule.atom_xy(parent)?;
        molecule.set_atom_xyz(copy, Point3::new(origin.x + k as f64 * step, origin.y, 0.0))?;
    }
    Ok(())
}

/// Puts the root molecule on the first line and each R-group's fragments
/// on a line of their own below it.
fn compose_rgroups(molecule: &mut Molecule, config: &LayoutConfig) {
    let mut metalayout = Metalayout::new(
        config.horizontal_interval * config.bond_length,
        config.vertical_interval * config.bond_length,
    );
    if let Some((min, max)) = molecule.bounding_box() {
        metalayout.push_item(LayoutItem::new(min, max));
    }

    let mut slots: Vec<(usize, usize, usize, usize)> = Vec::new();
    for (r, rgroup) in molecule.rgroups().iter().enumerate() {
        let line = metalayout.new_line();
        for (f, fragment) in rgroup.fragments.iter().enumerate() {
            if let Some((min, max)) = fragment.bounding_box() {
                let (_, position) = metalayout.push_item(LayoutItem::new(min, max));
                slots.push((r, f, line, position));
            }
        }
    }
    metalayout.process();

    for (r, f, line, position) in slots {
        let offset = metalayout.offset(line, position).unwrap_or_else(Vector2::zeros);
        molecule.rgroups_mut()[r].fragments[f].translate(&offset);
    }
}
