use super::molecule::Molecule;
use crate::core::graph::VertexId;
use nalgebra::Point2;

/// The S-group variants that take part in layout.
#[derive(Debug, Clone, PartialEq)]
pub enum SGroupKind {
    /// A repeating unit (SRU); only its brackets are recomputed.
    RepeatingUnit,
    /// `multiplier` consecutive copies of the same fragment.
    ///
    /// `parent_atoms` is the first copy; the group's `atoms` list the copies
    /// one after another, each in the same order as `parent_atoms`.
    MultipleGroup {
        multiplier: usize,
        parent_atoms: Vec<VertexId>,
    },
    Generic,
}

/// A bracketed atom group with its rendered bracket segments.
#[derive(Debug, Clone, PartialEq)]
pub struct SGroup {
    pub kind: SGroupKind,
    pub atoms: Vec<VertexId>,
    pub brackets: Vec<[Point2<f64>; 2]>,
}

impl SGroup {
    pub fn new(kind: SGroupKind, atoms: Vec<VertexId>) -> Self {
        Self {
            kind,
            atoms,
            brackets: Vec::new(),
        }
    }

    pub fn repeating_unit(atoms: Vec<VertexId>) -> Self {
        Self::new(SGroupKind::RepeatingUnit, atoms)
    }

    pub fn multiple_group(multiplier: usize, parent_atoms: Vec<VertexId>, atoms: Vec<VertexId>) -> Self {
        Self::new(
            SGroupKind::MultipleGroup {
                multiplier,
                parent_atoms,
            },
            atoms,
        )
    }

    /// Whether brackets are laid out for this group.
    pub fn has_brackets(&self) -> bool {
        matches!(
            self.kind,
            SGroupKind::RepeatingUnit | SGroupKind::MultipleGroup { .. }
        )
    }

    pub fn contains(&self, atom: VertexId) -> bool {
        self.atoms.contains(&atom)
    }
}

/// An R-group: alternative fragments substituted at an R-site.
#[derive(Debug, Clone, Default)]
pub struct RGroup {
    pub fragments: Vec<Molecule>,
}

impl RGroup {
    pub fn new(fragments: Vec<Molecule>) -> Self {
        Self { fragments }
    }
}
