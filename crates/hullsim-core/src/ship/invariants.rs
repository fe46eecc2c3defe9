//! Structural self-check, run after every step in debug builds and by the
//! harness.

use hullsim_logic::constants::world_constants::{HALF_MAX_WORLD_HEIGHT, HALF_MAX_WORLD_WIDTH};

use super::Ship;
use crate::error::{InvariantKind, InvariantViolation};
use crate::types::ElementIndex;

impl Ship {
    /// Check the cross references between points, springs, triangles and
    /// frontiers, plus the per-point value ranges. Returns the first
    /// violation found.
    pub fn verify_invariants(&self) -> Result<(), InvariantViolation> {
        self.verify_point_values()?;
        self.verify_spring_connectivity()?;
        self.verify_triangle_connectivity()?;
        self.verify_super_triangles()?;
        self.verify_plane_partition()?;
        self.frontiers.verify(&self.springs)
    }

    fn verify_point_values(&self) -> Result<(), InvariantViolation> {
        for p in 0..self.points.point_count() {
            let position = self.points.position(p);
            if !position.is_finite()
                || position.x.abs() > HALF_MAX_WORLD_WIDTH
                || position.y.abs() > HALF_MAX_WORLD_HEIGHT
            {
                return Err(InvariantViolation::new(
                    InvariantKind::PointOutOfBounds,
                    format!("point {} at ({}, {})", p, position.x, position.y),
                ));
            }
        }

        for p in self.points.raw_ship_points() {
            let water = self.points.water(p);
            if water < 0.0 || water.is_nan() {
                return Err(InvariantViolation::new(
                    InvariantKind::NegativeWater,
                    format!("point {} has water {}", p, water),
                ));
            }

            if self.points.is_hull(p) && self.points.leaking(p).structural_leak != 0.0 {
                return Err(InvariantViolation::new(
                    InvariantKind::LeakingHull,
                    format!("hull point {} has a structural leak", p),
                ));
            }

            let decay = self.points.decay(p);
            if !(decay > 0.0 && decay <= 1.0) {
                return Err(InvariantViolation::new(
                    InvariantKind::DecayOutOfRange,
                    format!("point {} has decay {}", p, decay),
                ));
            }
        }

        Ok(())
    }

    fn verify_spring_connectivity(&self) -> Result<(), InvariantViolation> {
        for s in 0..self.springs.element_count() {
            let expected = usize::from(!self.springs.is_deleted(s));
            for (p, other) in [
                (self.springs.endpoint_a(s), self.springs.endpoint_b(s)),
                (self.springs.endpoint_b(s), self.springs.endpoint_a(s)),
            ] {
                let entries: Vec<_> = self
                    .points
                    .connected_springs(p)
                    .iter()
                    .filter(|cs| cs.spring == s)
                    .collect();
                if entries.len() != expected || entries.iter().any(|cs| cs.other_endpoint != other) {
                    return Err(InvariantViolation::new(
                        InvariantKind::SpringConnectivity,
                        format!(
                            "spring {} (deleted: {}) listed {} times at point {}",
                            s,
                            self.springs.is_deleted(s),
                            entries.len(),
                            p
                        ),
                    ));
                }
            }
        }

        for p in self.points.raw_ship_points() {
            if let Some(cs) = self
                .points
                .connected_springs(p)
                .iter()
                .find(|cs| self.springs.is_deleted(cs.spring))
            {
                return Err(InvariantViolation::new(
                    InvariantKind::SpringConnectivity,
                    format!("point {} still lists deleted spring {}", p, cs.spring),
                ));
            }
        }

        Ok(())
    }

    fn verify_triangle_connectivity(&self) -> Result<(), InvariantViolation> {
        let mut owned = vec![0usize; self.points.point_count()];

        for t in 0..self.triangles.element_count() {
            let is_deleted = self.triangles.is_deleted(t);
            if !is_deleted {
                owned[self.triangles.point_a(t)] += 1;
            }
            let expected = usize::from(!is_deleted);
            for p in self.triangles.endpoints(t) {
                let listed = self.points.connected_triangles(p).iter().filter(|&&x| x == t).count();
                if listed != expected {
                    return Err(InvariantViolation::new(
                        InvariantKind::TriangleConnectivity,
                        format!("triangle {} (deleted: {}) listed {} times at point {}", t, is_deleted, listed, p),
                    ));
                }
            }
        }

        for p in self.points.raw_ship_points() {
            if self.points.connected_owned_triangles_count(p) != owned[p] {
                return Err(InvariantViolation::new(
                    InvariantKind::TriangleConnectivity,
                    format!(
                        "point {} owns {} triangles but counts {}",
                        p,
                        owned[p],
                        self.points.connected_owned_triangles_count(p)
                    ),
                ));
            }
        }

        Ok(())
    }

    /// Live springs never cross planes, and no two components with springs
    /// share a plane. Loose points may borrow any plane id.
    fn verify_plane_partition(&self) -> Result<(), InvariantViolation> {
        if self.is_structure_dirty {
            return Ok(());
        }

        let plane_count = self.connectivity.plane_count();
        let mut plane_owner: Vec<Option<ElementIndex>> = vec![None; plane_count];
        let mut seen = vec![false; self.points.raw_ship_point_count()];
        let mut stack = Vec::new();

        for start in self.points.raw_ship_points() {
            if seen[start] || self.points.connected_springs(start).is_empty() {
                continue;
            }

            let plane = self.points.plane_id(start);
            match plane_owner.get(plane as usize).copied() {
                Some(None) => plane_owner[plane as usize] = Some(start),
                Some(Some(other)) => {
                    return Err(InvariantViolation::new(
                        InvariantKind::PlanePartition,
                        format!("points {} and {} are disconnected but share plane {}", other, start, plane),
                    ));
                }
                None => {
                    return Err(InvariantViolation::new(
                        InvariantKind::PlanePartition,
                        format!("point {} has plane {} of {}", start, plane, plane_count),
                    ));
                }
            }

            seen[start] = true;
            stack.push(start);
            while let Some(p) = stack.pop() {
                for cs in self.points.connected_springs(p) {
                    let other = cs.other_endpoint;
                    if self.points.plane_id(other) != plane {
                        return Err(InvariantViolation::new(
                            InvariantKind::PlanePartition,
                            format!("spring {} joins planes {} and {}", cs.spring, plane, self.points.plane_id(other)),
                        ));
                    }
                    if !seen[other] {
                        seen[other] = true;
                        stack.push(other);
                    }
                }
            }
        }

        Ok(())
    }

    fn verify_super_triangles(&self) -> Result<(), InvariantViolation> {
        for s in 0..self.springs.element_count() {
            let super_triangles = self.springs.super_triangles(s);
            if super_triangles.len() > 2 {
                return Err(InvariantViolation::new(
                    InvariantKind::SuperTriangle,
                    format!("spring {} has {} super triangles", s, super_triangles.len()),
                ));
            }
            for &t in super_triangles {
                if self.triangles.is_deleted(t) || !self.triangles.sub_springs(t).contains(&s) {
                    return Err(InvariantViolation::new(
                        InvariantKind::SuperTriangle,
                        format!("spring {} lists triangle {} which does not contain it", s, t),
                    ));
                }
            }
        }

        for t in 0..self.triangles.element_count() {
            if self.triangles.is_deleted(t) {
                continue;
            }
            for s in self.triangles.sub_springs(t) {
                if !self.springs.super_triangles(s).contains(&t) {
                    return Err(InvariantViolation::new(
                        InvariantKind::SuperTriangle,
                        format!("triangle {} missing from super triangles of spring {}", t, s),
                    ));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ship::test_ships::{grid_ship, TestShip};

    #[test]
    fn test_fresh_ship_is_consistent() {
        let TestShip { ship, .. } = grid_ship(5, 4);
        assert_eq!(ship.verify_invariants(), Ok(()));
    }

    #[test]
    fn test_detects_point_out_of_bounds() {
        let TestShip { mut ship, .. } = grid_ship(2, 2);
        ship.points.position[1].x = HALF_MAX_WORLD_WIDTH * 2.0;

        let violation = ship.verify_invariants().expect_err("out of bounds");
        assert_eq!(violation.kind, InvariantKind::PointOutOfBounds);
    }

    #[test]
    fn test_detects_negative_water() {
        let TestShip { mut ship, .. } = grid_ship(2, 2);
        ship.points.water[0] = -0.1;

        let violation = ship.verify_invariants().expect_err("negative water");
        assert_eq!(violation.kind, InvariantKind::NegativeWater);
    }

    #[test]
    fn test_detects_decay_out_of_range() {
        let TestShip { mut ship, .. } = grid_ship(2, 2);
        ship.points.decay[3] = 0.0;

        let violation = ship.verify_invariants().expect_err("zero decay");
        assert_eq!(violation.kind, InvariantKind::DecayOutOfRange);
    }

    #[test]
    fn test_detects_leaking_hull_point() {
        let TestShip { mut ship, .. } = grid_ship(2, 2);
        ship.points.is_hull[0] = true;
        ship.points.leaking[0].structural_leak = 1.0;

        let violation = ship.verify_invariants().expect_err("leaking hull");
        assert_eq!(violation.kind, InvariantKind::LeakingHull);
    }

    #[test]
    fn test_detects_spring_across_planes() {
        let TestShip { mut ship, .. } = grid_ship(3, 2);
        assert!(!ship.is_structure_dirty());
        ship.points.plane_id[0] = 7;

        let violation = ship.verify_invariants().expect_err("split plane");
        assert_eq!(violation.kind, InvariantKind::PlanePartition);
    }

    #[test]
    fn test_detects_dangling_spring_reference() {
        let TestShip { mut ship, .. } = grid_ship(2, 2);
        let s = ship.points.connected_springs(0)[0].spring;
        ship.points.disconnect_spring(0, s);

        let violation = ship.verify_invariants().expect_err("dangling spring");
        assert_eq!(violation.kind, InvariantKind::SpringConnectivity);
    }
}
