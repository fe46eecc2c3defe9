//! Ship mesh construction.
//!
//! `ShipBuilder` collects materials, points, springs, triangles and
//! electrical elements, then validates them and lays them out in the
//! element stores. Triangles are re-wound clockwise; super triangles and
//! covered springs are derived from the mesh.

use std::collections::HashMap;

use rand::Rng;

use hullsim_logic::constants::dynamics_constants::{MAX_SPRINGS_PER_POINT, MAX_TRIANGLES_PER_POINT};
use hullsim_logic::materials::{ElectricalMaterial, StructuralMaterial};
use hullsim_logic::parameters::SimulationParameters;
use hullsim_logic::vectors::Vec2f;

use crate::electrical::ElectricalElements;
use crate::error::BuildError;
use crate::points::Points;
use crate::springs::Springs;
use crate::triangles::Triangles;
use crate::types::ElementIndex;

#[derive(Debug, Clone, PartialEq)]
struct PointSpec {
    position: Vec2f,
    material: usize,
    water: f32,
    is_leaking: bool,
}

/// The element stores of a freshly built ship.
pub(crate) struct ShipStructure {
    pub(crate) points: Points,
    pub(crate) springs: Springs,
    pub(crate) triangles: Triangles,
    pub(crate) electrical: ElectricalElements,
}

#[derive(Debug, Clone, Default)]
pub struct ShipBuilder {
    materials: Vec<StructuralMaterial>,
    points: Vec<PointSpec>,
    springs: Vec<(ElementIndex, ElementIndex)>,
    triangles: Vec<[ElementIndex; 3]>,
    electrical: Vec<(ElementIndex, ElectricalMaterial)>,
}

impl ShipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_material(&mut self, material: StructuralMaterial) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    pub fn add_point(&mut self, position: Vec2f, material: usize) -> ElementIndex {
        self.points.push(PointSpec {
            position,
            material,
            water: 0.0,
            is_leaking: false,
        });
        self.points.len() - 1
    }

    /// Water the point holds at construction.
    pub fn set_point_water(&mut self, point: ElementIndex, water: f32) {
        if let Some(p) = self.points.get_mut(point) {
            p.water = water;
        }
    }

    /// Make the point leak from the start, e.g. an open porthole.
    pub fn set_point_leaking(&mut self, point: ElementIndex) {
        if let Some(p) = self.points.get_mut(point) {
            p.is_leaking = true;
        }
    }

    pub fn add_spring(&mut self, point_a: ElementIndex, point_b: ElementIndex) -> ElementIndex {
        self.springs.push((point_a, point_b));
        self.springs.len() - 1
    }

    /// Add a triangle; the winding is normalized at build time.
    pub fn add_triangle(&mut self, a: ElementIndex, b: ElementIndex, c: ElementIndex) -> ElementIndex {
        self.triangles.push([a, b, c]);
        self.triangles.len() - 1
    }

    pub fn add_electrical_element(&mut self, point: ElementIndex, material: ElectricalMaterial) -> ElementIndex {
        self.electrical.push((point, material));
        self.electrical.len() - 1
    }

    pub fn point_count(&self) -> usize {
        self.points.len()
    }

    /// Add a fully braced rectangular grid of `cols` x `rows` points, row
    /// by row from `origin` upwards. Each cell gets both diagonals and two
    /// triangles. Returns the point indices, row-major.
    pub fn add_grid(
        &mut self,
        cols: usize,
        rows: usize,
        spacing: f32,
        origin: Vec2f,
        material: usize,
    ) -> Vec<ElementIndex> {
        let mut indices = Vec::with_capacity(cols * rows);
        for r in 0..rows {
            for c in 0..cols {
                indices.push(self.add_point(origin + Vec2f::new(c as f32 * spacing, r as f32 * spacing), material));
            }
        }

        let at = |c: usize, r: usize| indices[r * cols + c];
        for r in 0..rows {
            for c in 0..cols {
                if c + 1 < cols {
                    self.add_spring(at(c, r), at(c + 1, r));
                }
                if r + 1 < rows {
                    self.add_spring(at(c, r), at(c, r + 1));
                }
                if c + 1 < cols && r + 1 < rows {
                    let (bl, br, tl, tr) = (at(c, r), at(c + 1, r), at(c, r + 1), at(c + 1, r + 1));
                    self.add_spring(bl, tr);
                    self.add_spring(br, tl);
                    self.add_triangle(bl, br, tr);
                    self.add_triangle(bl, tr, tl);
                }
            }
        }
        indices
    }

    fn validate(&self) -> Result<HashMap<(ElementIndex, ElementIndex), ElementIndex>, BuildError> {
        if self.points.is_empty() {
            return Err(BuildError::EmptyShip);
        }
        let point_count = self.points.len();
        let check_point = |index: ElementIndex| {
            if index < point_count {
                Ok(())
            } else {
                Err(BuildError::PointIndexOutOfRange { index, point_count })
            }
        };

        for p in &self.points {
            if p.material >= self.materials.len() {
                return Err(BuildError::MaterialIndexOutOfRange {
                    index: p.material,
                    material_count: self.materials.len(),
                });
            }
        }

        let mut spring_map = HashMap::new();
        let mut springs_per_point = vec![0usize; point_count];
        for (s, &(a, b)) in self.springs.iter().enumerate() {
            check_point(a)?;
            check_point(b)?;
            if a == b {
                return Err(BuildError::DegenerateSpring { point: a });
            }
            if spring_map.insert((a.min(b), a.max(b)), s).is_some() {
                return Err(BuildError::DuplicateSpring { point_a: a, point_b: b });
            }
            for p in [a, b] {
                springs_per_point[p] += 1;
                if springs_per_point[p] > MAX_SPRINGS_PER_POINT {
                    return Err(BuildError::TooManySpringsAtPoint {
                        point: p,
                        max: MAX_SPRINGS_PER_POINT,
                    });
                }
            }
        }

        let mut triangles_per_point = vec![0usize; point_count];
        for triangle in &self.triangles {
            for &p in triangle {
                check_point(p)?;
                triangles_per_point[p] += 1;
                if triangles_per_point[p] > MAX_TRIANGLES_PER_POINT {
                    return Err(BuildError::TooManyTrianglesAtPoint {
                        point: p,
                        max: MAX_TRIANGLES_PER_POINT,
                    });
                }
            }
        }

        let mut electrical_points = vec![false; point_count];
        for &(p, _) in &self.electrical {
            check_point(p)?;
            if electrical_points[p] {
                return Err(BuildError::DuplicateElectricalElement { point: p });
            }
            electrical_points[p] = true;
        }

        Ok(spring_map)
    }

    /// Validate the mesh and lay it out in the element stores.
    pub(crate) fn build_structure(
        &self,
        params: &SimulationParameters,
        rng: &mut impl Rng,
    ) -> Result<ShipStructure, BuildError> {
        let spring_map = self.validate()?;
        let spring_between =
            |a: ElementIndex, b: ElementIndex| spring_map.get(&(a.min(b), a.max(b))).copied();

        // Points
        let mut points = Points::new(self.materials.clone(), params);
        for spec in &self.points {
            points.add(spec.position, spec.material, spec.water, spec.is_leaking, rng.gen::<f32>(), params);
        }

        // Triangles: clockwise winding, sub-springs [ab, bc, ca]
        let mut triangle_endpoints = Vec::with_capacity(self.triangles.len());
        let mut triangle_sub_springs = Vec::with_capacity(self.triangles.len());
        let mut super_triangles: Vec<Vec<ElementIndex>> = vec![Vec::new(); self.springs.len()];
        for (t, &[a, b, c]) in self.triangles.iter().enumerate() {
            let (pa, pb, pc) = (self.points[a].position, self.points[b].position, self.points[c].position);
            let [a, b, c] = if (pb - pa).cross(pc - pa) > 0.0 { [a, c, b] } else { [a, b, c] };

            let mut sub_springs = [0; 3];
            for (i, (from, to)) in [(a, b), (b, c), (c, a)].into_iter().enumerate() {
                let s = spring_between(from, to).ok_or(BuildError::MissingTriangleEdge {
                    point_a: from,
                    point_b: to,
                })?;
                super_triangles[s].push(t);
                if super_triangles[s].len() > 2 {
                    return Err(BuildError::TooManySuperTriangles { spring: s });
                }
                sub_springs[i] = s;
            }
            triangle_endpoints.push([a, b, c]);
            triangle_sub_springs.push(sub_springs);
        }

        // Covered springs: sub-springs, plus the traverse diagonal of every
        // quad formed by two triangles sharing an edge
        let mut covered: Vec<Vec<ElementIndex>> = triangle_sub_springs.iter().map(|s| s.to_vec()).collect();
        for (s, supers) in super_triangles.iter().enumerate() {
            if let [t1, t2] = supers[..] {
                let (a, b) = self.springs[s];
                let opposite = |t: ElementIndex| {
                    triangle_endpoints[t]
                        .into_iter()
                        .find(|&p| p != a && p != b)
                };
                if let (Some(o1), Some(o2)) = (opposite(t1), opposite(t2)) {
                    if let Some(diagonal) = spring_between(o1, o2) {
                        for t in [t1, t2] {
                            if !covered[t].contains(&diagonal) {
                                covered[t].push(diagonal);
                            }
                        }
                    }
                }
            }
        }
        let mut covering_count = vec![0usize; self.springs.len()];
        for list in &covered {
            for &s in list {
                covering_count[s] += 1;
            }
        }

        // Springs
        let mut springs = Springs::new(params);
        for (s, &(a, b)) in self.springs.iter().enumerate() {
            springs.add(a, b, super_triangles[s].clone(), covering_count[s], &points);
            points.add_factory_connected_spring(a, s, b);
            points.add_factory_connected_spring(b, s, a);
            if points.is_hull(a) || points.is_hull(b) {
                springs.set_water_permeability(s, 0.0);
            }
        }

        let mut triangles = Triangles::new();
        for (t, covered) in covered.into_iter().enumerate() {
            let endpoints = triangle_endpoints[t];
            triangles.add(endpoints, triangle_sub_springs[t], covered);
            for (i, p) in endpoints.into_iter().enumerate() {
                points.add_factory_connected_triangle(p, t, i == 0);
            }
        }

        // Electrical elements, connected along springs
        let mut electrical = ElectricalElements::new();
        for (p, material) in &self.electrical {
            let e = electrical.add(*p, material.clone());
            points.set_electrical_element(*p, e);
        }
        for &(a, b) in &self.springs {
            if let (Some(ea), Some(eb)) = (points.electrical_element(a), points.electrical_element(b)) {
                electrical.add_factory_connection(ea, eb);
            }
        }

        points.finalize(params.max_ephemeral_particles, params);

        Ok(ShipStructure {
            points,
            springs,
            triangles,
            electrical,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hullsim_logic::materials::MaterialPreset;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn build(builder: &ShipBuilder) -> Result<ShipStructure, BuildError> {
        let mut rng = StdRng::seed_from_u64(1);
        builder.build_structure(&SimulationParameters::default(), &mut rng)
    }

    #[test]
    fn test_grid_layout() {
        let mut builder = ShipBuilder::new();
        let wood = builder.add_material(MaterialPreset::Wood.material());
        let indices = builder.add_grid(3, 2, 1.0, Vec2f::ZERO, wood);
        assert_eq!(indices.len(), 6);

        let structure = build(&builder).expect("valid grid");
        // 2 cells: 3 horizontal x 2 rows... 4 horizontal, 3 vertical, 4 diagonals
        assert_eq!(structure.springs.element_count(), 4 + 3 + 4);
        assert_eq!(structure.triangles.element_count(), 4);
        assert_eq!(structure.points.raw_ship_point_count(), 6);

        // Traverse diagonals are covered by both triangles of their cell
        let covered_twice = (0..structure.springs.element_count())
            .filter(|&s| structure.springs.super_triangles(s).is_empty())
            .all(|s| structure.springs.covering_triangles_count(s) == 2);
        assert!(covered_twice);
    }

    #[test]
    fn test_triangles_are_wound_clockwise() {
        let mut builder = ShipBuilder::new();
        let steel = builder.add_material(MaterialPreset::Steel.material());
        let a = builder.add_point(Vec2f::new(0.0, 0.0), steel);
        let b = builder.add_point(Vec2f::new(1.0, 0.0), steel);
        let c = builder.add_point(Vec2f::new(0.0, 1.0), steel);
        builder.add_spring(a, b);
        builder.add_spring(b, c);
        builder.add_spring(c, a);
        // Counter-clockwise as given
        builder.add_triangle(a, b, c);

        let structure = build(&builder).expect("valid triangle");
        let [p0, p1, p2] = structure.triangles.endpoints(0);
        let (v0, v1, v2) = (
            structure.points.position(p0),
            structure.points.position(p1),
            structure.points.position(p2),
        );
        assert!((v1 - v0).cross(v2 - v0) < 0.0);
        assert_eq!(structure.points.connected_owned_triangles_count(p0), 1);
    }

    #[test]
    fn test_validation_errors() {
        let mut builder = ShipBuilder::new();
        assert!(matches!(build(&builder), Err(BuildError::EmptyShip)));

        let steel = builder.add_material(MaterialPreset::Steel.material());
        let a = builder.add_point(Vec2f::ZERO, steel);
        let b = builder.add_point(Vec2f::new(1.0, 0.0), steel);
        let c = builder.add_point(Vec2f::new(0.0, 1.0), steel);

        let mut degenerate = builder.clone();
        degenerate.add_spring(a, a);
        assert_eq!(build(&degenerate).err(), Some(BuildError::DegenerateSpring { point: a }));

        let mut duplicate = builder.clone();
        duplicate.add_spring(a, b);
        duplicate.add_spring(b, a);
        assert!(matches!(build(&duplicate), Err(BuildError::DuplicateSpring { .. })));

        let mut missing_edge = builder.clone();
        missing_edge.add_spring(a, b);
        missing_edge.add_triangle(a, b, c);
        assert!(matches!(build(&missing_edge), Err(BuildError::MissingTriangleEdge { .. })));

        let mut out_of_range = builder.clone();
        out_of_range.add_spring(a, 42);
        assert_eq!(
            build(&out_of_range).err(),
            Some(BuildError::PointIndexOutOfRange { index: 42, point_count: 3 })
        );

        let mut bad_material = builder.clone();
        bad_material.add_point(Vec2f::ZERO, 9);
        assert!(matches!(build(&bad_material), Err(BuildError::MaterialIndexOutOfRange { .. })));
    }

    #[test]
    fn test_hull_springs_are_impermeable_and_elements_connected() {
        let mut builder = ShipBuilder::new();
        let hull = builder.add_material(MaterialPreset::IronHull.material());
        let wood = builder.add_material(MaterialPreset::Wood.material());
        let a = builder.add_point(Vec2f::ZERO, hull);
        let b = builder.add_point(Vec2f::new(1.0, 0.0), wood);
        let c = builder.add_point(Vec2f::new(2.0, 0.0), wood);
        let ab = builder.add_spring(a, b);
        let bc = builder.add_spring(b, c);
        builder.add_electrical_element(b, ElectricalMaterial::generator());
        builder.add_electrical_element(c, ElectricalMaterial::cable());

        let structure = build(&builder).expect("valid");
        assert_eq!(structure.springs.water_permeability(ab), 0.0);
        assert_eq!(structure.springs.water_permeability(bc), 1.0);
        assert_eq!(structure.electrical.connected(0), &[1]);
    }
}
