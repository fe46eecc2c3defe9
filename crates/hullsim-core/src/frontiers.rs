//! Topological boundaries of the ship mesh.
//!
//! A boundary edge is a spring with exactly one super triangle, directed as
//! in that triangle. Boundary edges link into cycles: the outer hull of each
//! rigid piece (`External`, clockwise) and the rim of each hole
//! (`Internal`, counter-clockwise).
//!
//! Frontiers are kept up to date incrementally: after a triangle is
//! destroyed or restored (and the spring/triangle graph already reflects
//! it), every frontier touching the triangle's vertices is dissolved and the
//! affected edges are traced again.

use std::collections::VecDeque;

use hullsim_logic::constants::dynamics_constants::MAX_TRIANGLES_PER_POINT;
use hullsim_logic::vectors::{Aabb, Vec2f};

use crate::error::{InvariantKind, InvariantViolation};
use crate::points::Points;
use crate::springs::Springs;
use crate::triangles::Triangles;
use crate::types::{ElementIndex, FrontierId, FrontierType};

/// Per-spring frontier bookkeeping; only meaningful while `frontier` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontierEdge {
    pub frontier: Option<FrontierId>,
    /// Start point of the directed edge.
    pub point_a: ElementIndex,
    pub point_b: ElementIndex,
    pub next: ElementIndex,
    pub prev: ElementIndex,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frontier {
    pub frontier_type: FrontierType,
    pub size: usize,
    pub start_edge: ElementIndex,
    pub aabb: Aabb,
    pub center: Vec2f,
}

pub struct Frontiers {
    edges: Vec<FrontierEdge>,
    frontiers: Vec<Option<Frontier>>,
}

impl Frontiers {
    pub fn new(spring_count: usize) -> Self {
        Self {
            edges: (0..spring_count)
                .map(|s| FrontierEdge {
                    frontier: None,
                    point_a: 0,
                    point_b: 0,
                    next: s,
                    prev: s,
                })
                .collect(),
            frontiers: Vec::new(),
        }
    }

    /// Trace every frontier of a freshly built mesh.
    pub fn build(points: &Points, springs: &Springs, triangles: &Triangles) -> Self {
        let mut frontiers = Self::new(springs.element_count());
        let mut seeds: VecDeque<ElementIndex> = (0..springs.element_count()).collect();
        frontiers.trace_from(&mut seeds, points, springs, triangles);
        frontiers.update_geometry(points);
        frontiers
    }

    pub fn frontier_count(&self) -> usize {
        self.frontiers.iter().filter(|f| f.is_some()).count()
    }

    pub fn frontier(&self, id: FrontierId) -> Option<&Frontier> {
        self.frontiers.get(id).and_then(|f| f.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = (FrontierId, &Frontier)> {
        self.frontiers
            .iter()
            .enumerate()
            .filter_map(|(id, f)| f.as_ref().map(|f| (id, f)))
    }

    pub fn edge(&self, s: ElementIndex) -> &FrontierEdge {
        &self.edges[s]
    }

    /// Springs of a frontier, in cycle order from its start edge.
    pub fn edge_cycle(&self, id: FrontierId) -> Vec<ElementIndex> {
        let Some(frontier) = self.frontier(id) else {
            return Vec::new();
        };
        let mut cycle = Vec::with_capacity(frontier.size);
        let mut e = frontier.start_edge;
        for _ in 0..frontier.size {
            cycle.push(e);
            e = self.edges[e].next;
        }
        cycle
    }

    /// Start points of a frontier's edges, in cycle order.
    pub fn point_cycle(&self, id: FrontierId) -> Vec<ElementIndex> {
        self.edge_cycle(id)
            .into_iter()
            .map(|e| self.edges[e].point_a)
            .collect()
    }

    /// Every frontier as its point cycle rotated to start at the smallest
    /// point index, sorted; independent of slot ids and start edges.
    pub fn canonical_cycles(&self) -> Vec<(FrontierType, Vec<ElementIndex>)> {
        let mut cycles: Vec<(FrontierType, Vec<ElementIndex>)> = self
            .iter()
            .map(|(id, f)| {
                let mut cycle = self.point_cycle(id);
                if let Some(min_pos) = cycle.iter().enumerate().min_by_key(|(_, p)| **p).map(|(i, _)| i) {
                    cycle.rotate_left(min_pos);
                }
                (f.frontier_type, cycle)
            })
            .collect();
        cycles.sort_by(|a, b| a.1.cmp(&b.1));
        cycles
    }

    /// Refresh the AABB and center of every frontier.
    pub fn update_geometry(&mut self, points: &Points) {
        for id in 0..self.frontiers.len() {
            let Some(frontier) = &self.frontiers[id] else {
                continue;
            };
            let mut aabb = Aabb::empty();
            let mut sum = Vec2f::ZERO;
            let mut e = frontier.start_edge;
            for _ in 0..frontier.size {
                let position = points.position(self.edges[e].point_a);
                aabb.extend_to(position);
                sum += position;
                e = self.edges[e].next;
            }
            let size = frontier.size;
            if let Some(frontier) = &mut self.frontiers[id] {
                frontier.aabb = aabb;
                frontier.center = sum / size as f32;
            }
        }
    }

    /// Re-establish the frontiers around triangle `t`, which has just been
    /// destroyed or restored.
    ///
    /// Every frontier touching `t` is dissolved and traced again from its
    /// edges, so the cost grows with the length of those frontiers rather
    /// than being constant per change as an in-place splice would be.
    pub fn handle_triangle_change(
        &mut self,
        t: ElementIndex,
        points: &Points,
        springs: &Springs,
        triangles: &Triangles,
    ) {
        let mut dissolved: Vec<FrontierId> = Vec::new();
        let mut seeds: VecDeque<ElementIndex> = VecDeque::new();

        let consider = |s: ElementIndex, edges: &[FrontierEdge], dissolved: &mut Vec<FrontierId>| {
            if let Some(f) = edges[s].frontier {
                if !dissolved.contains(&f) {
                    dissolved.push(f);
                }
            }
        };
        for v in triangles.endpoints(t) {
            for cs in points.connected_springs(v) {
                consider(cs.spring, &self.edges, &mut dissolved);
            }
        }
        for s in triangles.sub_springs(t) {
            consider(s, &self.edges, &mut dissolved);
            seeds.push_back(s);
        }

        let dissolved_count = dissolved.len();
        for f in dissolved {
            seeds.extend(self.dissolve(f));
        }

        let created = self.trace_from(&mut seeds, points, springs, triangles);
        self.update_geometry(points);

        if created > dissolved_count {
            log::debug!("Frontier split: {} -> {} (triangle {})", dissolved_count, created, t);
        } else if created < dissolved_count {
            log::debug!("Frontier merge: {} -> {} (triangle {})", dissolved_count, created, t);
        }
    }

    /// Remove a frontier, returning its edges.
    fn dissolve(&mut self, id: FrontierId) -> Vec<ElementIndex> {
        let cycle = self.edge_cycle(id);
        for &e in &cycle {
            self.edges[e].frontier = None;
        }
        self.frontiers[id] = None;
        cycle
    }

    /// Trace a new frontier from every unregistered boundary edge among the
    /// seeds; returns the number of frontiers created.
    fn trace_from(
        &mut self,
        seeds: &mut VecDeque<ElementIndex>,
        points: &Points,
        springs: &Springs,
        triangles: &Triangles,
    ) -> usize {
        let mut created = 0;
        while let Some(seed) = seeds.pop_front() {
            if self.edges[seed].frontier.is_some() || !is_boundary_edge(seed, springs) {
                continue;
            }
            let Some(cycle) = trace_cycle(seed, springs, triangles) else {
                log::warn!("Frontier from spring {} does not close; mesh is not manifold there", seed);
                continue;
            };

            // An edge still owned by another frontier means that frontier is stale
            let stale: Vec<FrontierId> = cycle
                .iter()
                .filter_map(|(e, _, _)| self.edges[*e].frontier)
                .collect();
            for f in stale {
                if self.frontiers[f].is_some() {
                    seeds.extend(self.dissolve(f));
                }
            }

            self.register(&cycle, points);
            created += 1;
        }
        created
    }

    fn register(&mut self, cycle: &[(ElementIndex, ElementIndex, ElementIndex)], points: &Points) {
        let id = match self.frontiers.iter().position(|f| f.is_none()) {
            Some(id) => id,
            None => {
                self.frontiers.push(None);
                self.frontiers.len() - 1
            }
        };

        // Shoelace: clockwise outer hulls come out negative
        let mut twice_area = 0.0;
        let n = cycle.len();
        for (i, &(e, point_a, point_b)) in cycle.iter().enumerate() {
            let next = cycle[(i + 1) % n].0;
            let prev = cycle[(i + n - 1) % n].0;
            self.edges[e] = FrontierEdge {
                frontier: Some(id),
                point_a,
                point_b,
                next,
                prev,
            };
            twice_area += points.position(point_a).cross(points.position(point_b));
        }

        self.frontiers[id] = Some(Frontier {
            frontier_type: if twice_area < 0.0 {
                FrontierType::External
            } else {
                FrontierType::Internal
            },
            size: n,
            start_edge: cycle[0].0,
            aabb: Aabb::empty(),
            center: Vec2f::ZERO,
        });
    }

    /// Check cycle sizes and edge registration.
    pub fn verify(&self, springs: &Springs) -> Result<(), InvariantViolation> {
        for (id, frontier) in self.iter() {
            if frontier.size < 3 {
                return Err(InvariantViolation::new(
                    InvariantKind::Frontier,
                    format!("frontier {} has size {}", id, frontier.size),
                ));
            }
            let mut e = frontier.start_edge;
            for i in 0..frontier.size {
                let edge = &self.edges[e];
                if edge.frontier != Some(id) {
                    return Err(InvariantViolation::new(
                        InvariantKind::Frontier,
                        format!("edge {} of frontier {} is registered to {:?}", e, id, edge.frontier),
                    ));
                }
                if !is_boundary_edge(e, springs) || springs.is_deleted(e) {
                    return Err(InvariantViolation::new(
                        InvariantKind::Frontier,
                        format!("edge {} of frontier {} is not a live boundary spring", e, id),
                    ));
                }
                let next = &self.edges[edge.next];
                if next.prev != e || next.point_a != edge.point_b {
                    return Err(InvariantViolation::new(
                        InvariantKind::Frontier,
                        format!("edge {} of frontier {} is not linked to its successor", e, id),
                    ));
                }
                e = edge.next;
                if e == frontier.start_edge && i + 1 != frontier.size {
                    return Err(InvariantViolation::new(
                        InvariantKind::Frontier,
                        format!("frontier {} closes after {} edges, expected {}", id, i + 1, frontier.size),
                    ));
                }
            }
            if e != frontier.start_edge {
                return Err(InvariantViolation::new(
                    InvariantKind::Frontier,
                    format!("frontier {} does not close after {} edges", id, frontier.size),
                ));
            }
        }
        Ok(())
    }
}

fn is_boundary_edge(s: ElementIndex, springs: &Springs) -> bool {
    springs.super_triangles(s).len() == 1
}

/// Direction of boundary edge `s` as `(from, to)` within its super triangle,
/// along with the triangle and the edge's position in it.
fn boundary_edge_direction(
    s: ElementIndex,
    springs: &Springs,
    triangles: &Triangles,
) -> Option<(ElementIndex, ElementIndex, ElementIndex)> {
    let t = *springs.super_triangles(s).first()?;
    let i = triangles.sub_springs(t).iter().position(|&x| x == s)?;
    let endpoints = triangles.endpoints(t);
    Some((t, endpoints[i], endpoints[(i + 1) % 3]))
}

/// Boundary edge following `s`: rotate around its end vertex through the
/// triangle fan until an edge with a single super triangle is found.
fn next_boundary_edge(s: ElementIndex, springs: &Springs, triangles: &Triangles) -> Option<ElementIndex> {
    let (mut t, _, vertex) = boundary_edge_direction(s, springs, triangles)?;
    for _ in 0..=MAX_TRIANGLES_PER_POINT {
        let k = triangles.endpoints(t).iter().position(|&p| p == vertex)?;
        let candidate = triangles.sub_springs(t)[k];
        let supers = springs.super_triangles(candidate);
        if supers.len() == 1 {
            return Some(candidate);
        }
        t = *supers.iter().find(|&&other| other != t)?;
    }
    None
}

/// Follow boundary edges from `seed` until back at it; `None` if the walk
/// does not close.
fn trace_cycle(
    seed: ElementIndex,
    springs: &Springs,
    triangles: &Triangles,
) -> Option<Vec<(ElementIndex, ElementIndex, ElementIndex)>> {
    let mut cycle = Vec::new();
    let mut e = seed;
    loop {
        let (_, from, to) = boundary_edge_direction(e, springs, triangles)?;
        cycle.push((e, from, to));
        e = next_boundary_edge(e, springs, triangles)?;
        if e == seed {
            return Some(cycle);
        }
        if cycle.len() > springs.element_count() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ShipBuilder;
    use hullsim_logic::materials::MaterialPreset;
    use hullsim_logic::parameters::SimulationParameters;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn grid(cols: usize, rows: usize) -> (Points, Springs, Triangles) {
        let mut builder = ShipBuilder::new();
        let wood = builder.add_material(MaterialPreset::Wood.material());
        builder.add_grid(cols, rows, 1.0, Vec2f::new(0.0, 10.0), wood);
        let mut rng = StdRng::seed_from_u64(7);
        let structure = builder
            .build_structure(&SimulationParameters::default(), &mut rng)
            .expect("valid grid");
        (structure.points, structure.springs, structure.triangles)
    }

    /// Apply the graph side of a triangle destroy, as the ship does.
    fn remove_triangle(t: ElementIndex, points: &mut Points, springs: &mut Springs, triangles: &mut Triangles) {
        triangles.set_deleted(t, true);
        for s in triangles.sub_springs(t) {
            springs.remove_super_triangle(s, t);
        }
        for (i, p) in triangles.endpoints(t).into_iter().enumerate() {
            points.disconnect_triangle(p, t, i == 0);
        }
    }

    fn restore_triangle(t: ElementIndex, points: &mut Points, springs: &mut Springs, triangles: &mut Triangles) {
        triangles.set_deleted(t, false);
        for (i, p) in triangles.endpoints(t).into_iter().enumerate() {
            points.connect_triangle(p, t, i == 0);
        }
        for s in triangles.sub_springs(t) {
            springs.add_super_triangle(s, t);
        }
    }

    /// The two triangles of the grid cell at (col, row).
    fn cell_triangles(triangles: &Triangles, cols: usize, col: usize, row: usize) -> Vec<ElementIndex> {
        let corners = [
            row * cols + col,
            row * cols + col + 1,
            (row + 1) * cols + col,
            (row + 1) * cols + col + 1,
        ];
        (0..triangles.element_count())
            .filter(|&t| triangles.endpoints(t).iter().all(|p| corners.contains(p)))
            .collect()
    }

    #[test]
    fn test_grid_has_single_external_frontier() {
        let (points, springs, triangles) = grid(3, 3);
        let frontiers = Frontiers::build(&points, &springs, &triangles);

        assert_eq!(frontiers.frontier_count(), 1);
        let (_, frontier) = frontiers.iter().next().expect("one frontier");
        assert_eq!(frontier.frontier_type, FrontierType::External);
        assert_eq!(frontier.size, 8);
        assert!((frontier.center - Vec2f::new(1.0, 11.0)).length() < 1e-5);
        assert!(frontiers.verify(&springs).is_ok());
    }

    #[test]
    fn test_removing_center_cell_opens_internal_frontier() {
        let (mut points, mut springs, mut triangles) = grid(4, 4);
        let mut frontiers = Frontiers::build(&points, &springs, &triangles);
        let before = frontiers.canonical_cycles();

        let center = cell_triangles(&triangles, 4, 1, 1);
        assert_eq!(center.len(), 2);

        remove_triangle(center[0], &mut points, &mut springs, &mut triangles);
        frontiers.handle_triangle_change(center[0], &points, &springs, &triangles);
        assert_eq!(frontiers.frontier_count(), 2);
        assert!(frontiers.verify(&springs).is_ok());

        remove_triangle(center[1], &mut points, &mut springs, &mut triangles);
        frontiers.handle_triangle_change(center[1], &points, &springs, &triangles);

        let cycles = frontiers.canonical_cycles();
        assert_eq!(cycles.len(), 2);
        let internal: Vec<_> = cycles
            .iter()
            .filter(|(kind, _)| *kind == FrontierType::Internal)
            .collect();
        assert_eq!(internal.len(), 1);
        assert_eq!(internal[0].1.len(), 4);
        assert!(frontiers.verify(&springs).is_ok());

        // Restoring brings back the exact same boundary
        restore_triangle(center[1], &mut points, &mut springs, &mut triangles);
        frontiers.handle_triangle_change(center[1], &points, &springs, &triangles);
        restore_triangle(center[0], &mut points, &mut springs, &mut triangles);
        frontiers.handle_triangle_change(center[0], &points, &springs, &triangles);
        assert_eq!(frontiers.canonical_cycles(), before);
    }

    #[test]
    fn test_cutting_a_strip_splits_external_frontier() {
        let (mut points, mut springs, mut triangles) = grid(4, 2);
        let mut frontiers = Frontiers::build(&points, &springs, &triangles);
        assert_eq!(frontiers.frontier_count(), 1);

        for t in cell_triangles(&triangles, 4, 1, 0) {
            remove_triangle(t, &mut points, &mut springs, &mut triangles);
            frontiers.handle_triangle_change(t, &points, &springs, &triangles);
        }

        let cycles = frontiers.canonical_cycles();
        assert_eq!(cycles.len(), 2);
        assert!(cycles.iter().all(|(kind, cycle)| *kind == FrontierType::External && cycle.len() == 4));
        assert!(frontiers.verify(&springs).is_ok());
    }
}
