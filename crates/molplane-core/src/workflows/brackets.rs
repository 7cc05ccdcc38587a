use crate::core::graph::{GraphError, VertexId};
use crate::core::models::molecule::Molecule;
use crate::core::models::sgroup::SGroup;
use crate::core::utils::geometry::{centroid, try_normalize};
use nalgebra::{Point2, Vector2};
use std::collections::HashSet;
use tracing::trace;

/// Below this dot product two crossing bonds count as pointing apart.
const OPPOSITE_BONDS_DOT: f64 = -0.3;

/// A bond leaving an S-group, oriented from the inside atom outwards.
#[derive(Debug, Clone, Copy)]
struct CrossBond {
    inside: Point2<f64>,
    outside: Point2<f64>,
}

impl CrossBond {
    fn midpoint(&self) -> Point2<f64> {
        Point2::from((self.inside.coords + self.outside.coords) / 2.0)
    }

    fn direction(&self) -> Option<Vector2<f64>> {
        try_normalize(&(self.outside - self.inside))
    }
}

fn collect_cross_bonds(molecule: &Molecule, atoms: &HashSet<VertexId>) -> Result<Vec<CrossBond>, GraphError> {
    let mut bonds = Vec::new();
    for (_, edge) in molecule.graph().edges_iter() {
        let (inside, outside) = match (atoms.contains(&edge.beg), atoms.contains(&edge.end)) {
            (true, false) => (edge.beg, edge.end),
            (false, true) => (edge.end, edge.beg),
            _ => continue,
        };
        bonds.push(CrossBond {
            inside: molecule.atom_xy(inside)?,
            outside: molecule.atom_xy(outside)?,
        });
    }
    Ok(bonds)
}

fn segment(center: Point2<f64>, along: Vector2<f64>, half_length: f64) -> [Point2<f64>; 2] {
    [center - along * half_length, center + along * half_length]
}

/// Computes bracket segments for one group from the current coordinates.
///
/// Without crossing bonds the brackets flank the group's bounding box. Two
/// bonds leaving in roughly opposite directions get a pair of brackets sized
/// to the whole group; any other arrangement gets one short bracket across
/// every crossing bond.
pub fn compute_brackets(
    molecule: &Molecule,
    sgroup: &SGroup,
    bond_length: f64,
) -> Result<Vec<[Point2<f64>; 2]>, GraphError> {
    let atoms: HashSet<VertexId> = sgroup.atoms.iter().copied().collect();
    let points: Vec<Point2<f64>> = sgroup
        .atoms
        .iter()
        .map(|&v| molecule.atom_xy(v))
        .collect::<Result<_, _>>()?;
    let Some(center) = centroid(&points) else {
        return Ok(Vec::new());
    };
    let pad = bond_length / 2.0;
    let cross = collect_cross_bonds(molecule, &atoms)?;

    if cross.is_empty() {
        let min_y = points.iter().map(|p| p.y).fold(f64::INFINITY, f64::min) - pad;
        let max_y = points.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max) + pad;
        let min_x = points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min) - pad;
        let max_x = points.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max) + pad;
        return Ok(vec![
            [Point2::new(min_x, min_y), Point2::new(min_x, max_y)],
            [Point2::new(max_x, min_y), Point2::new(max_x, max_y)],
        ]);
    }

    if let [first, second] = cross.as_slice() {
        if let (Some(d1), Some(d2)) = (first.direction(), second.direction()) {
            if d1.dot(&d2) < OPPOSITE_BONDS_DOT {
                let axis = try_normalize(&(d1 - d2)).unwrap_or(d1);
                let across = Vector2::new(-axis.y, axis.x);
                let half = points
                    .iter()
                    .map(|p| (p - center).dot(&across).abs())
                    .fold(0.0, f64::max)
                    + pad;
                return Ok([first, second]
                    .iter()
                    .map(|bond| {
                        let m = bond.midpoint();
                        let aligned = m + across * (center - m).dot(&across);
                        segment(aligned, across, half)
                    })
                    .collect());
            }
        }
    }

    Ok(cross
        .iter()
        .filter_map(|bond| {
            let d = bond.direction()?;
            Some(segment(bond.midpoint(), Vector2::new(-d.y, d.x), pad))
        })
        .collect())
}

/// Recomputes the brackets of every S-group that carries them.
pub fn place_brackets(molecule: &mut Molecule, bond_length: f64) -> Result<usize, GraphError> {
    let mut placed = Vec::new();
    for (idx, sgroup) in molecule.sgroups().iter().enumerate() {
        if sgroup.has_brackets() {
            placed.push((idx, compute_brackets(molecule, sgroup, bond_length)?));
        }
    }
    let count = placed.len();
    for (idx, brackets) in placed {
        molecule.sgroups_mut()[idx].brackets = brackets;
    }
    trace!(groups = count, "Brackets placed.");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Point3;

    /// A straight chain along x with atoms at integer positions.
    fn straight_chain(n: usize) -> (Molecule, Vec<VertexId>) {
        let bonds: Vec<(usize, usize)> = (1..n).map(|i| (i - 1, i)).collect();
        let (mut molecule, ids) = Molecule::from_bonds(n, &bonds).unwrap();
        for (i, &v) in ids.iter().enumerate() {
            molecule.set_atom_xyz(v, Point3::new(i as f64, 0.0, 0.0)).unwrap();
        }
        (molecule, ids)
    }

    fn length(segment: &[Point2<f64>; 2]) -> f64 {
        (segment[1] - segment[0]).norm()
    }

    #[test]
    fn isolated_group_is_flanked_left_and_right() {
        let (molecule, ids) = straight_chain(2);
        let group = SGroup::repeating_unit(ids.clone());
        let brackets = compute_brackets(&molecule, &group, 1.0).unwrap();

        assert_eq!(brackets.len(), 2);
        assert_eq!(brackets[0][0], Point2::new(-0.5, -0.5));
        assert_eq!(brackets[0][1], Point2::new(-0.5, 0.5));
        assert_eq!(brackets[1][0].x, 1.5);
    }

    #[test]
    fn opposite_cross_bonds_give_centred_pair() {
        let (molecule, ids) = straight_chain(4);
        let group = SGroup::repeating_unit(ids[1..3].to_vec());
        let brackets = compute_brackets(&molecule, &group, 1.0).unwrap();

        assert_eq!(brackets.len(), 2);
        let centers: Vec<Point2<f64>> = brackets
            .iter()
            .map(|s| Point2::from((s[0].coords + s[1].coords) / 2.0))
            .collect();
        assert!((centers[0] - Point2::new(0.5, 0.0)).norm() < 1e-12);
        assert!((centers[1] - Point2::new(2.5, 0.0)).norm() < 1e-12);
        for s in &brackets {
            assert!((s[0].x - s[1].x).abs() < 1e-12);
            assert!((length(s) - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn branched_cross_bonds_get_one_bracket_each() {
        let (mut molecule, ids) = Molecule::from_bonds(4, &[(0, 1), (0, 2), (0, 3)]).unwrap();
        let coords = [(0.0, 0.0), (1.0, 0.0), (-0.5, 0.8), (-0.5, -0.8)];
        for (&v, (x, y)) in ids.iter().zip(coords) {
            molecule.set_atom_xyz(v, Point3::new(x, y, 0.0)).unwrap();
        }
        let group = SGroup::repeating_unit(vec![ids[0]]);
        let brackets = compute_brackets(&molecule, &group, 1.2).unwrap();

        assert_eq!(brackets.len(), 3);
        assert!(brackets.iter().all(|s| (length(s) - 1.2).abs() < 1e-12));
    }

    #[test]
    fn only_bracketed_groups_are_updated() {
        let (mut molecule, ids) = straight_chain(3);
        molecule.add_sgroup(SGroup::repeating_unit(ids.clone()));
        molecule.add_sgroup(SGroup::new(crate::core::models::sgroup::SGroupKind::Generic, ids));

        assert_eq!(place_brackets(&mut molecule, 1.0).unwrap(), 1);
        assert_eq!(molecule.sgroups()[0].brackets.len(), 2);
        assert!(molecule.sgroups()[1].brackets.is_empty());
    }
}
