//! Plane / connected-component assignment.

use std::collections::VecDeque;

use crate::points::Points;
use crate::types::PlaneId;

/// Result of one connectivity visit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectivityInfo {
    /// Points in each connected component, indexed by plane id. Orphan points
    /// folded into a component are not counted.
    pub component_sizes: Vec<usize>,
    /// Prefix sums of owned triangles per plane: plane `k` owns triangles
    /// `plane_triangle_offsets[k]..plane_triangle_offsets[k + 1]` in plane order.
    pub plane_triangle_offsets: Vec<usize>,
}

impl ConnectivityInfo {
    pub fn plane_count(&self) -> usize {
        self.component_sizes.len()
    }

    pub fn max_plane_id(&self) -> Option<PlaneId> {
        self.plane_count().checked_sub(1).map(|p| p as PlaneId)
    }
}

/// Flood the raw point graph along live springs and tag every point with its
/// component's plane id. Single orphan points don't open a plane of their
/// own; they share the id of the next real component.
pub(crate) fn run_connectivity_visit(points: &mut Points, visited: &mut Vec<bool>) -> ConnectivityInfo {
    let raw_count = points.raw_ship_point_count();
    visited.clear();
    visited.resize(raw_count, false);

    let mut info = ConnectivityInfo {
        component_sizes: Vec::new(),
        plane_triangle_offsets: vec![0],
    };

    let mut current_plane: PlaneId = 0;
    let mut component_size = 1;
    let mut has_deferred_points = false;
    let mut triangle_count = 0;
    let mut queue: VecDeque<usize> = VecDeque::new();

    for start in (0..raw_count).rev() {
        if visited[start] {
            continue;
        }

        points.plane_id[start] = current_plane;
        visited[start] = true;
        queue.push_back(start);

        while let Some(p) = queue.pop_front() {
            for cs in &points.connected_springs[p] {
                let other = cs.other_endpoint;
                if !visited[other] {
                    points.plane_id[other] = current_plane;
                    visited[other] = true;
                    queue.push_back(other);
                    component_size += 1;
                }
            }
            triangle_count += points.connected_owned_triangles_count[p];
        }

        if component_size > 1 {
            info.component_sizes.push(component_size);
            info.plane_triangle_offsets.push(triangle_count);
            current_plane += 1;
            component_size = 1;
            has_deferred_points = false;
        } else {
            has_deferred_points = true;
        }
    }

    if has_deferred_points {
        info.component_sizes.push(component_size);
        info.plane_triangle_offsets.push(triangle_count);
    }

    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ShipBuilder;
    use hullsim_logic::materials::MaterialPreset;
    use hullsim_logic::parameters::SimulationParameters;
    use hullsim_logic::vectors::Vec2f;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// Two separate squares (two triangles each) plus two loose points.
    fn two_islands() -> Points {
        let mut builder = ShipBuilder::new();
        let steel = builder.add_material(MaterialPreset::Steel.material());
        let mut square = |x: f32| {
            let a = builder.add_point(Vec2f::new(x, 0.0), steel);
            let b = builder.add_point(Vec2f::new(x + 1.0, 0.0), steel);
            let c = builder.add_point(Vec2f::new(x + 1.0, 1.0), steel);
            let d = builder.add_point(Vec2f::new(x, 1.0), steel);
            for (p, q) in [(a, b), (b, c), (c, d), (d, a), (a, c)] {
                builder.add_spring(p, q);
            }
            builder.add_triangle(a, b, c);
            builder.add_triangle(a, c, d);
        };
        square(0.0);
        square(10.0);
        builder.add_point(Vec2f::new(20.0, 0.0), steel);
        builder.add_point(Vec2f::new(30.0, 0.0), steel);

        let params = SimulationParameters::default();
        let mut rng = StdRng::seed_from_u64(5);
        builder.build_structure(&params, &mut rng).expect("valid islands").points
    }

    #[test]
    fn test_components_get_distinct_planes_and_orphans_are_folded() {
        let mut points = two_islands();
        let mut visited = Vec::new();
        let info = run_connectivity_visit(&mut points, &mut visited);

        // Visit runs from the last point: both orphans join the second square
        assert_eq!(info.plane_count(), 2);
        assert_eq!(info.component_sizes, vec![4, 4]);
        assert_eq!(info.plane_triangle_offsets, vec![0, 2, 4]);
        assert_eq!(info.max_plane_id(), Some(1));

        for p in 4..10 {
            assert_eq!(points.plane_id(p), 0);
        }
        for p in 0..4 {
            assert_eq!(points.plane_id(p), 1);
        }
    }

    #[test]
    fn test_trailing_orphans_get_their_own_plane() {
        let params = SimulationParameters::default();
        let mut points = Points::new(vec![MaterialPreset::Steel.material()], &params);
        points.add(Vec2f::new(0.0, 0.0), 0, 0.0, false, 0.5, &params);
        points.add(Vec2f::new(5.0, 0.0), 0, 0.0, false, 0.5, &params);
        points.finalize(0, &params);

        let info = run_connectivity_visit(&mut points, &mut Vec::new());
        assert_eq!(info.plane_count(), 1);
        assert_eq!(points.plane_id(0), 0);
        assert_eq!(points.plane_id(1), 0);
    }
}
