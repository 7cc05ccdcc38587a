use super::sgroup::{RGroup, SGroup};
use crate::core::graph::{EdgeId, Graph, GraphError, VertexId};
use crate::core::utils::geometry::bounding_box;
use nalgebra::{Point2, Point3, Vector2};
use slotmap::SecondaryMap;

/// A molecule as the layout sees it: bond topology, per-atom coordinates and
/// the groups whose geometry depends on the layout.
///
/// Chemical identity (elements, charges, bond orders) is not modelled; the
/// layout only needs connectivity and a place to read and write positions.
#[derive(Debug, Clone, Default)]
pub struct Molecule {
    graph: Graph,
    positions: SecondaryMap<VertexId, Point3<f64>>,
    sgroups: Vec<SGroup>,
    rgroups: Vec<RGroup>,
}

impl Molecule {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an atom at the origin.
    pub fn add_atom(&mut self) -> VertexId {
        self.add_atom_at(Point3::origin())
    }

    pub fn add_atom_at(&mut self, position: Point3<f64>) -> VertexId {
        let v = self.graph.add_vertex();
        self.positions.insert(v, position);
        v
    }

    /// Connects two atoms.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError`] for missing atoms, loops or duplicate bonds.
    pub fn add_bond(&mut self, a: VertexId, b: VertexId) -> Result<EdgeId, GraphError> {
        self.graph.add_edge(a, b)
    }

    pub fn remove_atom(&mut self, v: VertexId) -> Result<(), GraphError> {
        self.graph.remove_vertex(v)?;
        self.positions.remove(v);
        for sgroup in &mut self.sgroups {
            sgroup.atoms.retain(|&a| a != v);
        }
        Ok(())
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn atom_count(&self) -> usize {
        self.graph.vertex_count()
    }

    pub fn bond_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn atoms(&self) -> impl Iterator<Item = VertexId> + '_ {
        self.graph.vertex_ids()
    }

    pub fn atom_xyz(&self, v: VertexId) -> Result<Point3<f64>, GraphError> {
        self.positions
            .get(v)
            .copied()
            .ok_or(GraphError::VertexNotFound(v))
    }

    /// Projection of the atom position onto the drawing plane.
    pub fn atom_xy(&self, v: VertexId) -> Result<Point2<f64>, GraphError> {
        self.atom_xyz(v).map(|p| Point2::new(p.x, p.y))
    }

    pub fn set_atom_xyz(&mut self, v: VertexId, position: Point3<f64>) -> Result<(), GraphError> {
        if !self.graph.has_vertex(v) {
            return Err(GraphError::VertexNotFound(v));
        }
        self.positions.insert(v, position);
        Ok(())
    }

    /// Whether any atom has a coordinate other than the origin.
    pub fn has_coordinates(&self) -> bool {
        self.positions.values().any(|p| p.coords.norm_squared() > 0.0)
    }

    /// Planar bounding box of `atoms`; atoms not in the molecule are skipped.
    pub fn bounding_box_of(
        &self,
        atoms: impl IntoIterator<Item = VertexId>,
    ) -> Option<(Point2<f64>, Point2<f64>)> {
        let points: Vec<Point2<f64>> = atoms
            .into_iter()
            .filter_map(|v| self.atom_xy(v).ok())
            .collect();
        bounding_box(&points)
    }

    pub fn bounding_box(&self) -> Option<(Point2<f64>, Point2<f64>)> {
        self.bounding_box_of(self.graph.vertex_ids())
    }

    /// Shifts every atom within the drawing plane.
    pub fn translate(&mut self, offset: &Vector2<f64>) {
        for p in self.positions.values_mut() {
            p.x += offset.x;
            p.y += offset.y;
        }
    }

    pub fn sgroups(&self) -> &[SGroup] {
        &self.sgroups
    }

    pub fn sgroups_mut(&mut self) -> &mut [SGroup] {
        &mut self.sgroups
    }

    pub fn add_sgroup(&mut self, sgroup: SGroup) -> usize {
        self.sgroups.push(sgroup);
        self.sgroups.len() - 1
    }

    pub fn rgroups(&self) -> &[RGroup] {
        &self.rgroups
    }

    pub fn rgroups_mut(&mut self) -> &mut [RGroup] {
        &mut self.rgroups
    }

    pub fn add_rgroup(&mut self, rgroup: RGroup) -> usize {
        self.rgroups.push(rgroup);
        self.rgroups.len() - 1
    }

    /// Builds a molecule with `atoms` unconnected atoms and the given bonds
    /// between them, indexed by creation order.
    pub fn from_bonds(atoms: usize, bonds: &[(usize, usize)]) -> Result<(Self, Vec<VertexId>), GraphError> {
        let mut molecule = Self::new();
        let ids: Vec<VertexId> = (0..atoms).map(|_| molecule.add_atom()).collect();
        for &(a, b) in bonds {
            molecule.add_bond(ids[a], ids[b])?;
        }
        Ok((molecule, ids))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::sgroup::SGroupKind;

    #[test]
    fn new_atoms_start_at_origin() {
        let mut molecule = Molecule::new();
        let a = molecule.add_atom();
        assert_eq!(molecule.atom_xyz(a).unwrap(), Point3::origin());
        assert!(!molecule.has_coordinates());

        molecule.set_atom_xyz(a, Point3::new(1.0, 2.0, 3.0)).unwrap();
        assert!(molecule.has_coordinates());
        assert_eq!(molecule.atom_xy(a).unwrap(), Point2::new(1.0, 2.0));
    }

    #[test]
    fn removing_atom_updates_graph_and_groups() {
        let (mut molecule, ids) = Molecule::from_bonds(3, &[(0, 1), (1, 2)]).unwrap();
        molecule.add_sgroup(SGroup::repeating_unit(ids.clone()));

        molecule.remove_atom(ids[1]).unwrap();
        assert_eq!(molecule.atom_count(), 2);
        assert_eq!(molecule.bond_count(), 0);
        assert_eq!(molecule.sgroups()[0].atoms, vec![ids[0], ids[2]]);
        assert!(molecule.atom_xyz(ids[1]).is_err());
    }

    #[test]
    fn translate_moves_bounding_box() {
        let mut molecule = Molecule::new();
        molecule.add_atom_at(Point3::new(0.0, 0.0, 2.0));
        molecule.add_atom_at(Point3::new(3.0, 1.0, 0.0));
        molecule.translate(&Vector2::new(1.0, -1.0));

        let (min, max) = molecule.bounding_box().unwrap();
        assert_eq!(min, Point2::new(1.0, -1.0));
        assert_eq!(max, Point2::new(4.0, 0.0));
        assert!(molecule.atoms().any(|v| molecule.atom_xyz(v).unwrap().z == 2.0));
    }

    #[test]
    fn set_position_of_unknown_atom_fails() {
        let (mut molecule, ids) = Molecule::from_bonds(1, &[]).unwrap();
        molecule.remove_atom(ids[0]).unwrap();
        assert_eq!(
            molecule.set_atom_xyz(ids[0], Point3::origin()),
            Err(GraphError::VertexNotFound(ids[0]))
        );
    }

    #[test]
    fn multiple_group_exposes_parent_atoms() {
        let (mut molecule, ids) = Molecule::from_bonds(4, &[(0, 1), (1, 2), (2, 3)]).unwrap();
        let idx = molecule.add_sgroup(SGroup::multiple_group(2, ids[0..2].to_vec(), ids.clone()));
        let group = &molecule.sgroups()[idx];

        assert!(group.has_brackets());
        match &group.kind {
            SGroupKind::MultipleGroup { multiplier, parent_atoms } => {
                assert_eq!(*multiplier, 2);
                assert_eq!(parent_atoms.len(), 2);
            }
            other => panic!("unexpected kind {other:?}"),
        }
    }
}
