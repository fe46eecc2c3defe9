//! Spring store: struct-of-arrays structural connections.
//!
//! A deleted spring keeps its slot with zeroed coefficients, so the force
//! pass can run over every spring without branching.

use hullsim_logic::constants::dynamics_constants::{
    SPRING_DAMPING_COEFFICIENT, SPRING_REDUCTION_FRACTION, STIFFNESS_GROWTH_RATE, STRAIN_THRESHOLD_JITTER,
    STRESS_RELEASE_FRACTION,
};
use hullsim_logic::constants::heat_constants::{MELTING_OVERHEAT_SPAN, MOLTEN_STIFFNESS_MULTIPLIER};
use hullsim_logic::constants::world_constants::SIMULATION_STEP_TIME_DURATION;
use hullsim_logic::formulae::{extra_melting_induced_tolerance, spring_strength_iterations_adjustment};
use hullsim_logic::math::{mix, partition_range, smooth_step};
use hullsim_logic::parameters::{SimulationParameters, StressRenderMode};
use hullsim_logic::vectors::Vec2f;

use crate::events::SimulationEventHandler;
use crate::points::Points;
use crate::types::ElementIndex;
use crate::world::ShipWorld;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpringEndpoints {
    pub point_a: ElementIndex,
    pub point_b: ElementIndex,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrainState {
    /// Maximum absolute length change before breaking.
    pub breaking_elongation: f32,
    /// Fraction of the breaking elongation above which the spring is stressed.
    pub strain_threshold_fraction: f32,
    pub is_stressed: bool,
}

/// Material properties averaged over the two endpoints.
#[derive(Debug, Clone, Copy, PartialEq)]
struct SpringMaterialProperties {
    stiffness: f32,
    strength: f32,
    melting_temperature: f32,
    extra_melting_induced_tolerance: f32,
}

/// Parameter values the coefficients were last computed with.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CoefficientParameters {
    num_iterations: usize,
    stiffness_adjustment: f32,
    damping_adjustment: f32,
    strength_adjustment: f32,
    melting_temperature_adjustment: f32,
}

impl CoefficientParameters {
    fn from_params(params: &SimulationParameters) -> Self {
        Self {
            num_iterations: params.num_mechanical_dynamics_iterations(),
            stiffness_adjustment: params.spring_stiffness_adjustment,
            damping_adjustment: params.spring_damping_adjustment,
            strength_adjustment: params.spring_strength_adjustment,
            melting_temperature_adjustment: params.melting_temperature_adjustment,
        }
    }
}

pub struct Springs {
    pub(crate) is_deleted: Vec<bool>,
    pub(crate) endpoints: Vec<SpringEndpoints>,
    pub(crate) super_triangles: Vec<Vec<ElementIndex>>,
    pub(crate) factory_super_triangles: Vec<Vec<ElementIndex>>,
    /// Triangles covering the spring, super triangles included.
    pub(crate) covering_triangles_count: Vec<usize>,
    pub(crate) strain_state: Vec<StrainState>,
    pub(crate) factory_rest_length: Vec<f32>,
    pub(crate) rest_length: Vec<f32>,
    pub(crate) stiffness_coefficient: Vec<f32>,
    pub(crate) damping_coefficient: Vec<f32>,
    material_properties: Vec<SpringMaterialProperties>,
    pub(crate) base_material: Vec<usize>,
    pub(crate) is_rope: Vec<bool>,
    pub(crate) water_permeability: Vec<f32>,
    pub(crate) thermal_conductivity: Vec<f32>,

    current: CoefficientParameters,
}

impl Springs {
    pub fn new(params: &SimulationParameters) -> Self {
        Self {
            is_deleted: Vec::new(),
            endpoints: Vec::new(),
            super_triangles: Vec::new(),
            factory_super_triangles: Vec::new(),
            covering_triangles_count: Vec::new(),
            strain_state: Vec::new(),
            factory_rest_length: Vec::new(),
            rest_length: Vec::new(),
            stiffness_coefficient: Vec::new(),
            damping_coefficient: Vec::new(),
            material_properties: Vec::new(),
            base_material: Vec::new(),
            is_rope: Vec::new(),
            water_permeability: Vec::new(),
            thermal_conductivity: Vec::new(),
            current: CoefficientParameters::from_params(params),
        }
    }

    /// Add a spring between two points; rest length is their current distance.
    pub fn add(
        &mut self,
        point_a: ElementIndex,
        point_b: ElementIndex,
        super_triangles: Vec<ElementIndex>,
        covering_triangles_count: usize,
        points: &Points,
    ) -> ElementIndex {
        debug_assert!(super_triangles.len() <= 2);
        debug_assert!(covering_triangles_count >= super_triangles.len());

        let s = self.is_deleted.len();
        let material_a = points.material(point_a);
        let material_b = points.material(point_b);

        // Jittered around the average by the point's personality seed
        let average_threshold = (material_a.strain_threshold_fraction + material_b.strain_threshold_fraction) / 2.0;
        let strain_threshold_fraction = average_threshold
            * (1.0 - STRAIN_THRESHOLD_JITTER + 2.0 * STRAIN_THRESHOLD_JITTER * points.random_normalized(point_a));

        let rest_length = (points.position(point_a) - points.position(point_b)).length();
        let strength = (material_a.strength + material_b.strength) / 2.0;

        self.is_deleted.push(false);
        self.endpoints.push(SpringEndpoints { point_a, point_b });
        self.factory_super_triangles.push(super_triangles.clone());
        self.super_triangles.push(super_triangles);
        self.covering_triangles_count.push(covering_triangles_count);
        self.strain_state.push(StrainState {
            breaking_elongation: 0.0,
            strain_threshold_fraction,
            is_stressed: false,
        });
        self.factory_rest_length.push(rest_length);
        self.rest_length.push(rest_length);
        // Stiffness grows slowly and shrinks at once, so start from the top
        self.stiffness_coefficient.push(f32::MAX);
        self.damping_coefficient.push(0.0);
        self.material_properties.push(SpringMaterialProperties {
            stiffness: (material_a.stiffness + material_b.stiffness) / 2.0,
            strength,
            melting_temperature: (material_a.melting_temperature + material_b.melting_temperature) / 2.0,
            extra_melting_induced_tolerance: extra_melting_induced_tolerance(strength),
        });
        // Weakest of the two
        self.base_material.push(if material_a.strength < material_b.strength {
            points.material_index(point_a)
        } else {
            points.material_index(point_b)
        });
        self.is_rope.push(points.is_rope(point_a) && points.is_rope(point_b));
        self.water_permeability.push(1.0);
        self.thermal_conductivity
            .push((material_a.thermal_conductivity + material_b.thermal_conductivity) / 2.0);

        self.update_coefficients(s, points);
        s
    }

    pub fn element_count(&self) -> usize {
        self.is_deleted.len()
    }

    pub fn is_deleted(&self, s: ElementIndex) -> bool {
        self.is_deleted[s]
    }

    pub fn endpoint_a(&self, s: ElementIndex) -> ElementIndex {
        self.endpoints[s].point_a
    }

    pub fn endpoint_b(&self, s: ElementIndex) -> ElementIndex {
        self.endpoints[s].point_b
    }

    pub fn other_endpoint(&self, s: ElementIndex, p: ElementIndex) -> ElementIndex {
        let e = self.endpoints[s];
        if e.point_a == p {
            e.point_b
        } else {
            e.point_a
        }
    }

    pub fn length(&self, s: ElementIndex, points: &Points) -> f32 {
        let e = self.endpoints[s];
        (points.position(e.point_a) - points.position(e.point_b)).length()
    }

    pub fn midpoint(&self, s: ElementIndex, points: &Points) -> Vec2f {
        let e = self.endpoints[s];
        (points.position(e.point_a) + points.position(e.point_b)) / 2.0
    }

    pub fn rest_length(&self, s: ElementIndex) -> f32 {
        self.rest_length[s]
    }

    pub fn factory_rest_length(&self, s: ElementIndex) -> f32 {
        self.factory_rest_length[s]
    }

    pub fn stiffness_coefficient(&self, s: ElementIndex) -> f32 {
        self.stiffness_coefficient[s]
    }

    pub fn damping_coefficient(&self, s: ElementIndex) -> f32 {
        self.damping_coefficient[s]
    }

    pub fn strain_state(&self, s: ElementIndex) -> StrainState {
        self.strain_state[s]
    }

    pub fn base_material_index(&self, s: ElementIndex) -> usize {
        self.base_material[s]
    }

    pub fn is_rope(&self, s: ElementIndex) -> bool {
        self.is_rope[s]
    }

    pub fn water_permeability(&self, s: ElementIndex) -> f32 {
        self.water_permeability[s]
    }

    pub(crate) fn set_water_permeability(&mut self, s: ElementIndex, permeability: f32) {
        self.water_permeability[s] = permeability;
    }

    pub fn thermal_conductivity(&self, s: ElementIndex) -> f32 {
        self.thermal_conductivity[s]
    }

    pub fn super_triangles(&self, s: ElementIndex) -> &[ElementIndex] {
        &self.super_triangles[s]
    }

    pub fn factory_super_triangles(&self, s: ElementIndex) -> &[ElementIndex] {
        &self.factory_super_triangles[s]
    }

    pub fn covering_triangles_count(&self, s: ElementIndex) -> usize {
        self.covering_triangles_count[s]
    }

    pub(crate) fn add_super_triangle(&mut self, s: ElementIndex, t: ElementIndex) {
        debug_assert!(self.super_triangles[s].len() < 2);
        debug_assert!(!self.super_triangles[s].contains(&t));
        self.super_triangles[s].push(t);
        let order = &self.factory_super_triangles[s];
        self.super_triangles[s].sort_by_key(|t| order.iter().position(|f| f == t).unwrap_or(usize::MAX));
    }

    pub(crate) fn remove_super_triangle(&mut self, s: ElementIndex, t: ElementIndex) {
        self.super_triangles[s].retain(|&x| x != t);
    }

    pub(crate) fn add_covering_triangle(&mut self, s: ElementIndex) {
        self.covering_triangles_count[s] += 1;
    }

    pub(crate) fn remove_covering_triangle(&mut self, s: ElementIndex) {
        debug_assert!(self.covering_triangles_count[s] > 0);
        self.covering_triangles_count[s] = self.covering_triangles_count[s].saturating_sub(1);
    }

    /// Mark the spring deleted and zero its coefficients.
    pub(crate) fn mark_deleted(&mut self, s: ElementIndex) {
        debug_assert!(!self.is_deleted[s]);
        self.stiffness_coefficient[s] = 0.0;
        self.damping_coefficient[s] = 0.0;
        self.is_deleted[s] = true;
    }

    /// Clear the deleted flag and recompute coefficients.
    pub(crate) fn mark_restored(&mut self, s: ElementIndex, points: &Points) {
        debug_assert!(self.is_deleted[s]);
        self.is_deleted[s] = false;
        self.update_coefficients(s, points);
    }

    /// Recompute every coefficient if any parameter they depend on changed.
    pub(crate) fn update_for_simulation_parameters(&mut self, params: &SimulationParameters, points: &Points) -> bool {
        let new = CoefficientParameters::from_params(params);
        if new == self.current {
            return false;
        }
        self.current = new;
        self.update_coefficients_for_partition(0, 1, points);
        true
    }

    /// Recompute coefficients of one slice of the springs, e.g. after decay
    /// and temperature changes.
    pub(crate) fn update_coefficients_for_partition(
        &mut self,
        partition: usize,
        partition_count: usize,
        points: &Points,
    ) {
        let (start, end) = partition_range(self.element_count(), partition, partition_count);
        for s in start..end {
            if !self.is_deleted[s] {
                self.update_coefficients(s, points);
            }
        }
    }

    pub(crate) fn update_coefficients(&mut self, s: ElementIndex, points: &Points) {
        let SpringEndpoints { point_a, point_b } = self.endpoints[s];
        let properties = self.material_properties[s];
        let current = self.current;

        let mass_a = points.augmented_material_mass[point_a];
        let mass_b = points.augmented_material_mass[point_b];
        let mass_factor = (mass_a * mass_b) / (mass_a + mass_b);

        let dt = SIMULATION_STEP_TIME_DURATION / current.num_iterations as f32;

        // A spring is as soft as its softest endpoint
        let spring_temperature = points.temperature(point_a).max(points.temperature(point_b));
        let melting_overheat = spring_temperature - properties.melting_temperature * current.melting_temperature_adjustment;
        let melt_depth_fraction = smooth_step(0.0, MELTING_OVERHEAT_SPAN, melting_overheat);
        let melt_multiplier = mix(1.0, MOLTEN_STIFFNESS_MULTIPLIER, melt_depth_fraction);

        let desired_stiffness = SPRING_REDUCTION_FRACTION
            * properties.stiffness
            * current.stiffness_adjustment
            * mass_factor
            / (dt * dt)
            * melt_multiplier;

        if desired_stiffness > self.stiffness_coefficient[s] {
            self.stiffness_coefficient[s] += STIFFNESS_GROWTH_RATE * (desired_stiffness - self.stiffness_coefficient[s]);
        } else {
            self.stiffness_coefficient[s] = desired_stiffness;
        }

        self.damping_coefficient[s] = SPRING_DAMPING_COEFFICIENT * current.damping_adjustment * mass_factor / dt;

        // Melting stretches the rest length, up to twice the factory length;
        // it stays stretched after cooling
        if melting_overheat > 0.0 {
            let length = self.length(s, points);
            self.rest_length[s] = length.clamp(self.rest_length[s], self.factory_rest_length[s] * 2.0);
        }

        let spring_decay = (points.decay(point_a) + points.decay(point_b)) / 2.0;

        self.strain_state[s].breaking_elongation = properties.strength
            * current.strength_adjustment
            * spring_strength_iterations_adjustment(current.num_iterations as f32)
            * spring_decay
            * self.rest_length[s]
            * (1.0 + properties.extra_melting_induced_tolerance * melt_depth_fraction);
    }

    /// Track stress and collect the springs stretched past their breaking
    /// elongation. The caller destroys the returned springs.
    pub(crate) fn update_for_strains(
        &mut self,
        points: &mut Points,
        stress_render_mode: StressRenderMode,
        world: &dyn ShipWorld,
        events: &mut dyn SimulationEventHandler,
    ) -> Vec<ElementIndex> {
        let do_update_stress = stress_render_mode.is_active();
        let mut broken = Vec::new();

        for s in 0..self.element_count() {
            if self.is_deleted[s] {
                continue;
            }

            let strain = self.length(s, points) - self.rest_length[s];
            let abs_strain = strain.abs();
            let state = &mut self.strain_state[s];

            if abs_strain > state.breaking_elongation {
                broken.push(s);
                continue;
            }

            if state.is_stressed {
                if abs_strain < STRESS_RELEASE_FRACTION * state.breaking_elongation {
                    state.is_stressed = false;
                }
            } else if abs_strain > state.strain_threshold_fraction * state.breaking_elongation {
                state.is_stressed = true;
                let point_a = self.endpoints[s].point_a;
                events.on_stress(
                    &points.materials[self.base_material[s]],
                    world.is_underwater(points.position(point_a)),
                    1,
                );
            }

            if do_update_stress {
                let stress = strain / self.strain_state[s].breaking_elongation;
                let SpringEndpoints { point_a, point_b } = self.endpoints[s];
                for p in [point_a, point_b] {
                    if stress.abs() > points.stress[p].abs() {
                        points.stress[p] = stress;
                    }
                }
            }
        }

        broken
    }
}
