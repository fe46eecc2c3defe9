//! Point store: struct-of-arrays particle state.
//!
//! Raw ship points come first, then a fixed-capacity region of ephemeral
//! particles (air bubbles, debris). Points are never deallocated; a detached
//! point simply loses its springs and triangles, and may later be restored.
//!
//! Structural mutations only mark state here; the cascading effects
//! (springs, triangles, frontiers, events) are driven by the ship.

use rand::Rng;
use serde::{Deserialize, Serialize};

use hullsim_logic::constants::dynamics_constants::{MASS_CONVERGENCE_RATE, MAX_SPRINGS_PER_POINT};
use hullsim_logic::constants::low_frequency_constants::PERIOD;
use hullsim_logic::constants::particle_constants::*;
use hullsim_logic::constants::physics_constants::WATER_MASS;
use hullsim_logic::constants::world_constants::SIMULATION_STEP_TIME_DURATION;
use hullsim_logic::formulae::{
    buoyancy_coefficients, combustion_decay_coefficients, BuoyancyCoefficients, CombustionDecayCoefficients,
};
use hullsim_logic::materials::{CombustionType, MaterialPreset, StructuralMaterial};
use hullsim_logic::parameters::SimulationParameters;
use hullsim_logic::vectors::Vec2f;

use crate::types::{ConnectedSpring, ElementIndex, EphemeralType, PlaneId};

/// Smallest decay a point may reach; decay never hits zero.
pub const MIN_DECAY: f32 = 1e-10;

/// Reciprocal of the depth over which a new point goes from air to water.
pub const DEFAULT_AIR_WATER_INTERFACE_INVERSE_WIDTH: f32 = 1.0;

/// Sources of water leaking into a point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LeakingComposite {
    /// 1.0 when the point has a hole, 0.0 otherwise.
    pub structural_leak: f32,
    /// Signed pump force: positive pumps water in.
    pub water_pump_force: f32,
}

impl LeakingComposite {
    pub fn is_cumulatively_leaking(&self) -> bool {
        self.structural_leak != 0.0 || self.water_pump_force != 0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombustionState {
    #[default]
    NotBurning,
    Developing1,
    Developing2,
    Burning,
    ExtinguishingConsumed,
    ExtinguishingSmotheredRain,
    ExtinguishingSmotheredWater,
    Exploded,
}

impl CombustionState {
    pub fn is_burning(self) -> bool {
        !matches!(self, CombustionState::NotBurning | CombustionState::Exploded)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Combustion {
    pub state: CombustionState,
    pub flame_development: f32,
    pub max_flame_development: f32,
}

impl Combustion {
    pub fn reset(&mut self) {
        *self = Combustion::default();
    }
}

/// Per-slot state of an ephemeral particle.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EphemeralState {
    pub kind: EphemeralType,
    pub start_time: f32,
    pub max_lifetime: f32,
    pub vortex_amplitude: f32,
    pub vortex_period: f32,
}

pub struct Points {
    pub(crate) raw_ship_point_count: usize,
    pub(crate) materials: Vec<StructuralMaterial>,
    pub(crate) air_material: usize,
    pub(crate) glass_material: usize,

    // Structure
    pub(crate) material: Vec<usize>,
    pub(crate) is_damaged: Vec<bool>,
    pub(crate) connected_springs: Vec<Vec<ConnectedSpring>>,
    pub(crate) factory_connected_springs: Vec<Vec<ConnectedSpring>>,
    pub(crate) connected_triangles: Vec<Vec<ElementIndex>>,
    pub(crate) connected_owned_triangles_count: Vec<usize>,
    pub(crate) factory_connected_triangles: Vec<Vec<ElementIndex>>,
    pub(crate) electrical_element: Vec<Option<ElementIndex>>,
    pub(crate) plane_id: Vec<PlaneId>,

    // Mechanics
    pub(crate) position: Vec<Vec2f>,
    pub(crate) velocity: Vec<Vec2f>,
    pub(crate) dynamic_force: Vec<Vec2f>,
    pub(crate) static_force: Vec<Vec2f>,
    pub(crate) static_pressure_force: Vec<Vec2f>,
    pub(crate) augmented_material_mass: Vec<f32>,
    pub(crate) mass: Vec<f32>,
    pub(crate) frozen_coefficient: Vec<f32>,
    pub(crate) integration_factor_time_coefficient: Vec<f32>,
    pub(crate) integration_factor: Vec<f32>,
    pub(crate) buoyancy_volume_fill: Vec<f32>,
    pub(crate) buoyancy: Vec<BuoyancyCoefficients>,
    pub(crate) cached_depth: Vec<f32>,
    pub(crate) air_water_interface_inverse_width: Vec<f32>,
    pub(crate) stress: Vec<f32>,

    // Water
    pub(crate) is_hull: Vec<bool>,
    pub(crate) is_rope: Vec<bool>,
    pub(crate) water: Vec<f32>,
    pub(crate) water_velocity: Vec<Vec2f>,
    pub(crate) water_momentum: Vec<Vec2f>,
    pub(crate) cumulated_intaken_water: Vec<f32>,
    pub(crate) leaking: Vec<LeakingComposite>,
    pub(crate) factory_structural_leak: Vec<f32>,
    pub(crate) water_intake: Vec<f32>,
    pub(crate) water_restitution: Vec<f32>,
    pub(crate) water_diffusion_speed: Vec<f32>,
    pub(crate) internal_pressure: Vec<f32>,
    pub(crate) total_factory_wet_points: usize,

    // Heat and combustion
    pub(crate) temperature: Vec<f32>,
    pub(crate) heat_capacity_reciprocal: Vec<f32>,
    pub(crate) ignition_temperature: Vec<f32>,
    pub(crate) combustion_type: Vec<CombustionType>,
    pub(crate) explosive_combustion_force: Vec<f32>,
    pub(crate) explosive_combustion_radius: Vec<f32>,
    pub(crate) combustion: Vec<Combustion>,
    pub(crate) burning_points: Vec<ElementIndex>,
    pub(crate) combustion_decay: CombustionDecayCoefficients,

    // Misc
    pub(crate) rust_receptivity: Vec<f32>,
    pub(crate) wind_receptivity: Vec<f32>,
    pub(crate) decay: Vec<f32>,
    pub(crate) is_electrified: Vec<bool>,
    pub(crate) light: Vec<f32>,
    pub(crate) random_normalized: Vec<f32>,

    // Ephemeral particles
    pub(crate) ephemeral: Vec<EphemeralState>,
    free_ephemeral_search_start: usize,
    air_bubble_counter: u64,

    // Parameter caches
    current_num_iterations: usize,
    current_air_bubbles_threshold: f32,
    current_combustion_speed_adjustment: f32,
}

impl Points {
    /// Create an empty store; raw points are added with [`Points::add`] and
    /// the ephemeral region is allocated by [`Points::finalize`].
    pub fn new(mut materials: Vec<StructuralMaterial>, params: &SimulationParameters) -> Self {
        let air_material = materials.len();
        materials.push(MaterialPreset::Air.material());
        let glass_material = materials.len();
        materials.push(MaterialPreset::Glass.material());

        Self {
            raw_ship_point_count: 0,
            materials,
            air_material,
            glass_material,
            material: Vec::new(),
            is_damaged: Vec::new(),
            connected_springs: Vec::new(),
            factory_connected_springs: Vec::new(),
            connected_triangles: Vec::new(),
            connected_owned_triangles_count: Vec::new(),
            factory_connected_triangles: Vec::new(),
            electrical_element: Vec::new(),
            plane_id: Vec::new(),
            position: Vec::new(),
            velocity: Vec::new(),
            dynamic_force: Vec::new(),
            static_force: Vec::new(),
            static_pressure_force: Vec::new(),
            augmented_material_mass: Vec::new(),
            mass: Vec::new(),
            frozen_coefficient: Vec::new(),
            integration_factor_time_coefficient: Vec::new(),
            integration_factor: Vec::new(),
            buoyancy_volume_fill: Vec::new(),
            buoyancy: Vec::new(),
            cached_depth: Vec::new(),
            air_water_interface_inverse_width: Vec::new(),
            stress: Vec::new(),
            is_hull: Vec::new(),
            is_rope: Vec::new(),
            water: Vec::new(),
            water_velocity: Vec::new(),
            water_momentum: Vec::new(),
            cumulated_intaken_water: Vec::new(),
            leaking: Vec::new(),
            factory_structural_leak: Vec::new(),
            water_intake: Vec::new(),
            water_restitution: Vec::new(),
            water_diffusion_speed: Vec::new(),
            internal_pressure: Vec::new(),
            total_factory_wet_points: 0,
            temperature: Vec::new(),
            heat_capacity_reciprocal: Vec::new(),
            ignition_temperature: Vec::new(),
            combustion_type: Vec::new(),
            explosive_combustion_force: Vec::new(),
            explosive_combustion_radius: Vec::new(),
            combustion: Vec::new(),
            burning_points: Vec::new(),
            combustion_decay: combustion_decay_coefficients(
                params.combustion_speed_adjustment,
                PERIOD as f32 * SIMULATION_STEP_TIME_DURATION,
            ),
            rust_receptivity: Vec::new(),
            wind_receptivity: Vec::new(),
            decay: Vec::new(),
            is_electrified: Vec::new(),
            light: Vec::new(),
            random_normalized: Vec::new(),
            ephemeral: Vec::new(),
            free_ephemeral_search_start: 0,
            air_bubble_counter: 0,
            current_num_iterations: params.num_mechanical_dynamics_iterations(),
            current_air_bubbles_threshold: f32::NAN,
            current_combustion_speed_adjustment: params.combustion_speed_adjustment,
        }
    }

    /// Append a raw ship point.
    pub fn add(
        &mut self,
        position: Vec2f,
        material_index: usize,
        water: f32,
        is_leaking: bool,
        random_normalized: f32,
        params: &SimulationParameters,
    ) -> ElementIndex {
        let p = self.push_slot(position, material_index, params);
        self.raw_ship_point_count += 1;

        self.water[p] = water.max(0.0);
        if water > 0.0 {
            self.total_factory_wet_points += 1;
        }
        let leak = if is_leaking && !self.is_hull[p] { 1.0 } else { 0.0 };
        self.factory_structural_leak[p] = leak;
        self.leaking[p].structural_leak = leak;
        self.random_normalized[p] = random_normalized;
        p
    }

    /// Allocate the ephemeral particle region; call once, after all raw points.
    pub fn finalize(&mut self, ephemeral_capacity: usize, params: &SimulationParameters) {
        let start = self.position.len();
        for _ in 0..ephemeral_capacity.min(MAX_EPHEMERAL_PARTICLES) {
            let p = self.push_slot(Vec2f::ZERO, self.air_material, params);
            self.freeze(p, params);
        }
        self.free_ephemeral_search_start = start;
    }

    fn push_slot(&mut self, position: Vec2f, material_index: usize, params: &SimulationParameters) -> ElementIndex {
        let p = self.position.len();
        let material = &self.materials[material_index];
        let mass = material.mass();
        let time_coefficient = integration_time_coefficient(params.num_mechanical_dynamics_iterations(), 1.0);

        self.material.push(material_index);
        self.is_damaged.push(false);
        self.connected_springs.push(Vec::with_capacity(MAX_SPRINGS_PER_POINT));
        self.factory_connected_springs.push(Vec::new());
        self.connected_triangles.push(Vec::new());
        self.connected_owned_triangles_count.push(0);
        self.factory_connected_triangles.push(Vec::new());
        self.electrical_element.push(None);
        self.plane_id.push(0);

        self.position.push(position);
        self.velocity.push(Vec2f::ZERO);
        self.dynamic_force.push(Vec2f::ZERO);
        self.static_force.push(Vec2f::ZERO);
        self.static_pressure_force.push(Vec2f::ZERO);
        self.augmented_material_mass.push(mass);
        self.mass.push(mass);
        self.frozen_coefficient.push(1.0);
        self.integration_factor_time_coefficient.push(time_coefficient);
        self.integration_factor.push(time_coefficient / mass);
        self.buoyancy_volume_fill.push(material.buoyancy_volume_fill);
        self.buoyancy.push(buoyancy_coefficients(
            material.buoyancy_volume_fill,
            material.thermal_expansion_coefficient,
        ));
        self.cached_depth.push(-position.y);
        self.air_water_interface_inverse_width
            .push(DEFAULT_AIR_WATER_INTERFACE_INVERSE_WIDTH);
        self.stress.push(0.0);

        self.is_hull.push(material.is_hull);
        self.is_rope.push(material.is_rope);
        self.water.push(0.0);
        self.water_velocity.push(Vec2f::ZERO);
        self.water_momentum.push(Vec2f::ZERO);
        self.cumulated_intaken_water.push(0.0);
        self.leaking.push(LeakingComposite::default());
        self.factory_structural_leak.push(0.0);
        self.water_intake.push(material.water_intake);
        self.water_restitution.push(material.water_restitution());
        self.water_diffusion_speed.push(material.water_diffusion_speed);
        self.internal_pressure.push(0.0);

        self.temperature.push(params.air_temperature);
        self.heat_capacity_reciprocal.push(1.0 / material.heat_capacity());
        self.ignition_temperature.push(material.ignition_temperature);
        self.combustion_type.push(material.combustion_type);
        self.explosive_combustion_force.push(material.explosive_combustion_force);
        self.explosive_combustion_radius.push(material.explosive_combustion_radius);
        self.combustion.push(Combustion::default());

        self.rust_receptivity.push(material.rust_receptivity);
        self.wind_receptivity.push(material.wind_receptivity);
        self.decay.push(1.0);
        self.is_electrified.push(false);
        self.light.push(0.0);
        self.random_normalized.push(0.0);
        self.ephemeral.push(EphemeralState::default());
        p
    }

    //
    // Counts and ranges
    //

    pub fn raw_ship_point_count(&self) -> usize {
        self.raw_ship_point_count
    }

    /// Raw ship points plus ephemeral slots.
    pub fn point_count(&self) -> usize {
        self.position.len()
    }

    pub fn raw_ship_points(&self) -> std::ops::Range<ElementIndex> {
        0..self.raw_ship_point_count
    }

    pub fn ephemeral_points(&self) -> std::ops::Range<ElementIndex> {
        self.raw_ship_point_count..self.position.len()
    }

    pub fn total_factory_wet_points(&self) -> usize {
        self.total_factory_wet_points
    }

    //
    // Accessors
    //

    pub fn position(&self, p: ElementIndex) -> Vec2f {
        self.position[p]
    }

    pub fn set_position(&mut self, p: ElementIndex, position: Vec2f) {
        self.position[p] = position;
    }

    pub fn velocity(&self, p: ElementIndex) -> Vec2f {
        self.velocity[p]
    }

    pub fn set_velocity(&mut self, p: ElementIndex, velocity: Vec2f) {
        self.velocity[p] = velocity;
    }

    pub fn static_force(&self, p: ElementIndex) -> Vec2f {
        self.static_force[p]
    }

    pub fn add_static_force(&mut self, p: ElementIndex, force: Vec2f) {
        self.static_force[p] += force;
    }

    pub fn mass(&self, p: ElementIndex) -> f32 {
        self.mass[p]
    }

    pub fn material(&self, p: ElementIndex) -> &StructuralMaterial {
        &self.materials[self.material[p]]
    }

    pub fn material_index(&self, p: ElementIndex) -> usize {
        self.material[p]
    }

    pub fn water(&self, p: ElementIndex) -> f32 {
        self.water[p]
    }

    pub fn set_water(&mut self, p: ElementIndex, water: f32) {
        self.water[p] = water.max(0.0);
    }

    pub fn water_velocity(&self, p: ElementIndex) -> Vec2f {
        self.water_velocity[p]
    }

    pub fn cumulated_intaken_water(&self, p: ElementIndex) -> f32 {
        self.cumulated_intaken_water[p]
    }

    pub fn internal_pressure(&self, p: ElementIndex) -> f32 {
        self.internal_pressure[p]
    }

    pub fn set_internal_pressure(&mut self, p: ElementIndex, pressure: f32) {
        self.internal_pressure[p] = pressure;
    }

    pub fn leaking(&self, p: ElementIndex) -> LeakingComposite {
        self.leaking[p]
    }

    pub fn set_water_pump_force(&mut self, p: ElementIndex, force: f32) {
        self.leaking[p].water_pump_force = force;
    }

    pub fn is_hull(&self, p: ElementIndex) -> bool {
        self.is_hull[p]
    }

    pub fn is_rope(&self, p: ElementIndex) -> bool {
        self.is_rope[p]
    }

    pub fn cached_depth(&self, p: ElementIndex) -> f32 {
        self.cached_depth[p]
    }

    pub fn is_cached_underwater(&self, p: ElementIndex) -> bool {
        self.cached_depth[p] > 0.0
    }

    pub fn temperature(&self, p: ElementIndex) -> f32 {
        self.temperature[p]
    }

    pub fn set_temperature(&mut self, p: ElementIndex, temperature: f32) {
        self.temperature[p] = temperature;
    }

    pub fn heat_capacity_reciprocal(&self, p: ElementIndex) -> f32 {
        self.heat_capacity_reciprocal[p]
    }

    pub fn air_water_interface_inverse_width(&self, p: ElementIndex) -> f32 {
        self.air_water_interface_inverse_width[p]
    }

    /// Narrower interfaces make buoyancy kick in over a shorter depth.
    pub fn set_air_water_interface_inverse_width(&mut self, p: ElementIndex, inverse_width: f32) {
        self.air_water_interface_inverse_width[p] = inverse_width;
    }

    pub fn decay(&self, p: ElementIndex) -> f32 {
        self.decay[p]
    }

    pub fn set_decay(&mut self, p: ElementIndex, decay: f32) {
        self.decay[p] = decay.clamp(MIN_DECAY, 1.0);
    }

    pub fn combustion(&self, p: ElementIndex) -> Combustion {
        self.combustion[p]
    }

    pub fn burning_points(&self) -> &[ElementIndex] {
        &self.burning_points
    }

    pub fn is_damaged(&self, p: ElementIndex) -> bool {
        self.is_damaged[p]
    }

    pub fn is_electrified(&self, p: ElementIndex) -> bool {
        self.is_electrified[p]
    }

    pub fn light(&self, p: ElementIndex) -> f32 {
        self.light[p]
    }

    pub fn stress(&self, p: ElementIndex) -> f32 {
        self.stress[p]
    }

    pub fn plane_id(&self, p: ElementIndex) -> PlaneId {
        self.plane_id[p]
    }

    pub fn random_normalized(&self, p: ElementIndex) -> f32 {
        self.random_normalized[p]
    }

    pub fn electrical_element(&self, p: ElementIndex) -> Option<ElementIndex> {
        self.electrical_element[p]
    }

    pub(crate) fn set_electrical_element(&mut self, p: ElementIndex, element: ElementIndex) {
        self.electrical_element[p] = Some(element);
    }

    pub fn ephemeral_type(&self, p: ElementIndex) -> EphemeralType {
        self.ephemeral[p].kind
    }

    pub fn ephemeral_state(&self, p: ElementIndex) -> EphemeralState {
        self.ephemeral[p]
    }

    pub fn live_ephemeral_count(&self) -> usize {
        self.ephemeral_points()
            .filter(|&p| self.ephemeral[p].kind != EphemeralType::None)
            .count()
    }

    //
    // Connectivity
    //

    pub fn connected_springs(&self, p: ElementIndex) -> &[ConnectedSpring] {
        &self.connected_springs[p]
    }

    pub fn factory_connected_springs(&self, p: ElementIndex) -> &[ConnectedSpring] {
        &self.factory_connected_springs[p]
    }

    pub fn connected_triangles(&self, p: ElementIndex) -> &[ElementIndex] {
        &self.connected_triangles[p]
    }

    pub fn factory_connected_triangles(&self, p: ElementIndex) -> &[ElementIndex] {
        &self.factory_connected_triangles[p]
    }

    pub fn connected_owned_triangles_count(&self, p: ElementIndex) -> usize {
        self.connected_owned_triangles_count[p]
    }

    pub(crate) fn add_factory_connected_spring(&mut self, p: ElementIndex, spring: ElementIndex, other: ElementIndex) {
        let cs = ConnectedSpring {
            spring,
            other_endpoint: other,
        };
        self.factory_connected_springs[p].push(cs);
        self.connected_springs[p].push(cs);
    }

    pub(crate) fn add_factory_connected_triangle(&mut self, p: ElementIndex, triangle: ElementIndex, is_owner: bool) {
        self.factory_connected_triangles[p].push(triangle);
        self.connect_triangle(p, triangle, is_owner);
    }

    pub(crate) fn connect_spring(&mut self, p: ElementIndex, spring: ElementIndex, other: ElementIndex) {
        debug_assert!(!self.connected_springs[p].iter().any(|cs| cs.spring == spring));
        self.connected_springs[p].push(ConnectedSpring {
            spring,
            other_endpoint: other,
        });
        // Keep factory order so that destroy+restore is reversible
        let order = &self.factory_connected_springs[p];
        self.connected_springs[p]
            .sort_by_key(|cs| order.iter().position(|f| f.spring == cs.spring).unwrap_or(usize::MAX));
    }

    pub(crate) fn disconnect_spring(&mut self, p: ElementIndex, spring: ElementIndex) -> bool {
        let before = self.connected_springs[p].len();
        self.connected_springs[p].retain(|cs| cs.spring != spring);
        before != self.connected_springs[p].len()
    }

    pub(crate) fn connect_triangle(&mut self, p: ElementIndex, triangle: ElementIndex, is_owner: bool) {
        debug_assert!(!self.connected_triangles[p].contains(&triangle));
        self.connected_triangles[p].push(triangle);
        let order = &self.factory_connected_triangles[p];
        self.connected_triangles[p].sort_by_key(|t| order.iter().position(|f| f == t).unwrap_or(usize::MAX));
        if is_owner {
            self.connected_owned_triangles_count[p] += 1;
        }
    }

    pub(crate) fn disconnect_triangle(&mut self, p: ElementIndex, triangle: ElementIndex, is_owner: bool) {
        let before = self.connected_triangles[p].len();
        self.connected_triangles[p].retain(|&t| t != triangle);
        if is_owner && before != self.connected_triangles[p].len() {
            self.connected_owned_triangles_count[p] -= 1;
        }
    }

    //
    // Damage and repair
    //

    /// Mark the point as damaged by a broken spring; non-hull points start
    /// leaking. Returns true when this is the first damage.
    pub(crate) fn damage(&mut self, p: ElementIndex, rng: &mut impl Rng, params: &SimulationParameters) -> bool {
        if !self.is_hull[p] {
            self.leaking[p].structural_leak = 1.0;
            self.cumulated_intaken_water[p] = randomize_cumulated_intaken_water(
                air_bubbles_density_to_cumulated_intaken_water(params.air_bubbles_density),
                rng,
            );
        }
        self.mark_damaged(p)
    }

    /// Returns true when the point was not damaged yet.
    pub(crate) fn mark_damaged(&mut self, p: ElementIndex) -> bool {
        if self.is_damaged[p] {
            false
        } else {
            self.is_damaged[p] = true;
            true
        }
    }

    /// Undo damage: back to the factory leak, flames out.
    pub(crate) fn restore(&mut self, p: ElementIndex) {
        debug_assert!(self.is_damaged[p]);
        self.is_damaged[p] = false;
        self.leaking[p].structural_leak = if self.is_hull[p] {
            0.0
        } else {
            self.factory_structural_leak[p]
        };
        if self.combustion[p].state != CombustionState::NotBurning {
            self.burning_points.retain(|&b| b != p);
            self.combustion[p].reset();
        }
    }

    /// Hull points never leak: a closing door plugs its hole.
    pub(crate) fn seal_structural_leak(&mut self, p: ElementIndex) {
        self.leaking[p].structural_leak = 0.0;
        self.cumulated_intaken_water[p] = 0.0;
    }

    /// A reopened door leaks again when its point is damaged.
    pub(crate) fn unseal_structural_leak(&mut self, p: ElementIndex) {
        self.leaking[p].structural_leak = if self.is_damaged[p] {
            1.0
        } else {
            self.factory_structural_leak[p]
        };
    }

    /// A point lost its last spring: a burning point shrinks its flame.
    pub(crate) fn on_orphaned(&mut self, p: ElementIndex) {
        let combustion = &mut self.combustion[p];
        if combustion.state == CombustionState::Burning {
            combustion.max_flame_development =
                combustion.flame_development / 3.0 + 0.04 * self.random_normalized[p];
            combustion.state = CombustionState::Developing2;
        }
    }

    //
    // Per-frame helpers
    //

    /// Refresh caches that depend on parameters; returns whether the
    /// iteration count changed.
    pub(crate) fn update_for_simulation_parameters(
        &mut self,
        params: &SimulationParameters,
        rng: &mut impl Rng,
    ) -> bool {
        let num_iterations = params.num_mechanical_dynamics_iterations();
        let iterations_changed = num_iterations != self.current_num_iterations;
        if iterations_changed {
            for p in 0..self.point_count() {
                self.integration_factor_time_coefficient[p] =
                    integration_time_coefficient(num_iterations, self.frozen_coefficient[p]);
            }
            self.current_num_iterations = num_iterations;
        }

        let threshold = air_bubbles_density_to_cumulated_intaken_water(params.air_bubbles_density);
        if threshold != self.current_air_bubbles_threshold {
            for p in self.raw_ship_points() {
                if self.leaking[p].is_cumulatively_leaking() {
                    self.cumulated_intaken_water[p] = randomize_cumulated_intaken_water(threshold, rng);
                }
            }
            self.current_air_bubbles_threshold = threshold;
        }

        if params.combustion_speed_adjustment != self.current_combustion_speed_adjustment {
            self.combustion_decay = combustion_decay_coefficients(
                params.combustion_speed_adjustment,
                PERIOD as f32 * SIMULATION_STEP_TIME_DURATION,
            );
            self.current_combustion_speed_adjustment = params.combustion_speed_adjustment;
        }

        iterations_changed
    }

    /// Converge masses towards material mass plus absorbed water, and refresh
    /// integration factors.
    pub(crate) fn update_masses(&mut self, params: &SimulationParameters) {
        for p in 0..self.point_count() {
            let target = self.augmented_material_mass[p]
                + self.water[p].min(self.buoyancy_volume_fill[p]) * WATER_MASS * params.water_density_adjustment;
            self.mass[p] += (target - self.mass[p]) * MASS_CONVERGENCE_RATE;
            self.integration_factor[p] = self.integration_factor_time_coefficient[p] / self.mass[p];
        }
    }

    pub(crate) fn reset_static_forces(&mut self) {
        self.static_force.iter_mut().for_each(|f| *f = Vec2f::ZERO);
    }

    pub(crate) fn reset_stress(&mut self) {
        self.stress.iter_mut().for_each(|s| *s = 0.0);
    }

    pub(crate) fn reset_is_electrified(&mut self) {
        self.is_electrified.iter_mut().for_each(|e| *e = false);
    }

    pub(crate) fn update_water_momenta_from_velocities(&mut self) {
        for p in 0..self.point_count() {
            self.water_momentum[p] = self.water_velocity[p] * self.water[p];
        }
    }

    /// Keep burning points ordered by plane, then top to bottom.
    pub(crate) fn reorder_burning_points_for_depth(&mut self) {
        let plane_id = &self.plane_id;
        let position = &self.position;
        self.burning_points.sort_by(|&a, &b| {
            plane_id[a]
                .cmp(&plane_id[b])
                .then(position[b].y.total_cmp(&position[a].y))
        });
    }

    pub(crate) fn set_is_hull(&mut self, p: ElementIndex, is_hull: bool) {
        self.is_hull[p] = is_hull;
    }

    //
    // Ephemeral particles
    //

    /// First free ephemeral slot after the last one handed out; when none is
    /// free and `force` is set, the oldest particle is recycled.
    pub(crate) fn find_free_ephemeral_particle(&mut self, current_time: f32, force: bool) -> Option<ElementIndex> {
        let range = self.ephemeral_points();
        if range.is_empty() {
            return None;
        }
        if !range.contains(&self.free_ephemeral_search_start) {
            self.free_ephemeral_search_start = range.start;
        }

        let mut oldest: Option<(ElementIndex, f32)> = None;
        let mut p = self.free_ephemeral_search_start;
        loop {
            let state = &self.ephemeral[p];
            if state.kind == EphemeralType::None {
                self.free_ephemeral_search_start = if p + 1 >= range.end { range.start } else { p + 1 };
                return Some(p);
            }

            let lifetime = current_time - state.start_time;
            if oldest.map_or(true, |(_, l)| lifetime >= l) {
                oldest = Some((p, lifetime));
            }

            p += 1;
            if p >= range.end {
                p = range.start;
            }
            if p == self.free_ephemeral_search_start {
                break;
            }
        }

        if !force {
            return None;
        }
        let (p, _) = oldest?;
        self.free_ephemeral_search_start = if p + 1 >= range.end { range.start } else { p + 1 };
        Some(p)
    }

    fn assign_material(&mut self, p: ElementIndex, material_index: usize) {
        let material = &self.materials[material_index];
        self.material[p] = material_index;
        let mass = material.mass();
        self.augmented_material_mass[p] = mass;
        self.mass[p] = mass;
        self.buoyancy_volume_fill[p] = material.buoyancy_volume_fill;
        self.buoyancy[p] = buoyancy_coefficients(material.buoyancy_volume_fill, material.thermal_expansion_coefficient);
        self.is_hull[p] = material.is_hull;
        self.is_rope[p] = material.is_rope;
        self.water_intake[p] = material.water_intake;
        self.water_restitution[p] = material.water_restitution();
        self.water_diffusion_speed[p] = material.water_diffusion_speed;
        self.heat_capacity_reciprocal[p] = 1.0 / material.heat_capacity();
        self.ignition_temperature[p] = material.ignition_temperature;
        self.combustion_type[p] = material.combustion_type;
        self.explosive_combustion_force[p] = material.explosive_combustion_force;
        self.explosive_combustion_radius[p] = material.explosive_combustion_radius;
        self.rust_receptivity[p] = material.rust_receptivity;
        self.wind_receptivity[p] = material.wind_receptivity;
    }

    fn activate(&mut self, p: ElementIndex, params: &SimulationParameters) {
        self.frozen_coefficient[p] = 1.0;
        self.integration_factor_time_coefficient[p] =
            integration_time_coefficient(params.num_mechanical_dynamics_iterations(), 1.0);
        self.integration_factor[p] = self.integration_factor_time_coefficient[p] / self.mass[p];
        self.static_force[p] = Vec2f::ZERO;
        self.dynamic_force[p] = Vec2f::ZERO;
        self.water_velocity[p] = Vec2f::ZERO;
        self.water_momentum[p] = Vec2f::ZERO;
        self.decay[p] = 1.0;
        self.light[p] = 0.0;
        self.combustion[p].reset();
    }

    /// Spawn an air bubble; returns `None` when every slot is taken.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create_ephemeral_air_bubble(
        &mut self,
        position: Vec2f,
        depth: f32,
        temperature: f32,
        current_time: f32,
        plane_id: PlaneId,
        rng: &mut impl Rng,
        params: &SimulationParameters,
    ) -> Option<ElementIndex> {
        let p = self.find_free_ephemeral_particle(current_time, false)?;

        self.assign_material(p, self.air_material);
        self.buoyancy_volume_fill[p] = AIR_BUBBLE_BUOYANCY_VOLUME_FILL;
        self.buoyancy[p] = buoyancy_coefficients(
            AIR_BUBBLE_BUOYANCY_VOLUME_FILL,
            self.materials[self.air_material].thermal_expansion_coefficient,
        );
        self.wind_receptivity[p] = 0.0;
        self.activate(p, params);

        self.position[p] = position;
        self.velocity[p] = Vec2f::ZERO;
        self.cached_depth[p] = depth;
        self.water[p] = 0.0;
        self.temperature[p] = temperature;
        self.plane_id[p] = plane_id;

        let phase = (self.air_bubble_counter % AIR_BUBBLE_PHASE_PERIOD) as f32 / AIR_BUBBLE_PHASE_PERIOD as f32;
        self.air_bubble_counter += 1;
        let end_amplitude = AIR_BUBBLE_VORTEX_AMPLITUDE;
        let start_amplitude = end_amplitude / 40.0;
        let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };

        self.ephemeral[p] = EphemeralState {
            kind: EphemeralType::AirBubble,
            start_time: current_time,
            max_lifetime: f32::MAX,
            vortex_amplitude: (start_amplitude + (end_amplitude - start_amplitude) * phase) * sign,
            vortex_period: rng.gen_range(MIN_AIR_BUBBLE_VORTEX_PERIOD..MAX_AIR_BUBBLE_VORTEX_PERIOD),
        };
        Some(p)
    }

    /// Spawn a debris particle, recycling the oldest particle if needed.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create_ephemeral_debris(
        &mut self,
        position: Vec2f,
        velocity: Vec2f,
        depth: f32,
        water: f32,
        material_index: usize,
        current_time: f32,
        max_lifetime: f32,
        plane_id: PlaneId,
        params: &SimulationParameters,
    ) -> Option<ElementIndex> {
        let p = self.find_free_ephemeral_particle(current_time, true)?;

        self.assign_material(p, material_index);
        self.buoyancy_volume_fill[p] = 0.0;
        self.buoyancy[p] = BuoyancyCoefficients::default();
        self.wind_receptivity[p] = DEBRIS_WIND_RECEPTIVITY;
        self.activate(p, params);

        self.position[p] = position;
        self.velocity[p] = velocity;
        self.cached_depth[p] = depth;
        self.water[p] = water;
        self.temperature[p] = params.air_temperature;
        self.plane_id[p] = plane_id;

        self.ephemeral[p] = EphemeralState {
            kind: EphemeralType::Debris,
            start_time: current_time,
            max_lifetime,
            vortex_amplitude: 0.0,
            vortex_period: 0.0,
        };
        Some(p)
    }

    /// Return an ephemeral slot to the free pool; the slot stays frozen in place.
    pub(crate) fn expire_ephemeral_particle(&mut self, p: ElementIndex, params: &SimulationParameters) {
        self.ephemeral[p].kind = EphemeralType::None;
        self.freeze(p, params);
    }

    fn freeze(&mut self, p: ElementIndex, params: &SimulationParameters) {
        self.frozen_coefficient[p] = 0.0;
        self.integration_factor_time_coefficient[p] =
            integration_time_coefficient(params.num_mechanical_dynamics_iterations(), 0.0);
        self.integration_factor[p] = 0.0;
        self.velocity[p] = Vec2f::ZERO;
        self.water[p] = 0.0;
        self.water_velocity[p] = Vec2f::ZERO;
    }
}

/// dt² scaled by the frozen coefficient; divided by mass it gives the
/// integration factor.
pub(crate) fn integration_time_coefficient(num_iterations: usize, frozen_coefficient: f32) -> f32 {
    let dt = SIMULATION_STEP_TIME_DURATION / num_iterations as f32;
    dt * dt * frozen_coefficient
}

fn randomize_cumulated_intaken_water(threshold: f32, rng: &mut impl Rng) -> f32 {
    if threshold > 0.0 {
        rng.gen_range(0.0..threshold)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn make_points(raw: usize, ephemeral: usize) -> Points {
        let params = SimulationParameters::default();
        let mut points = Points::new(
            vec![MaterialPreset::Wood.material(), MaterialPreset::IronHull.material()],
            &params,
        );
        for i in 0..raw {
            points.add(Vec2f::new(i as f32, 0.0), i % 2, 0.0, false, 0.5, &params);
        }
        points.finalize(ephemeral, &params);
        points
    }

    #[test]
    fn test_ranges() {
        let points = make_points(4, 3);
        assert_eq!(points.raw_ship_point_count(), 4);
        assert_eq!(points.point_count(), 7);
        assert_eq!(points.ephemeral_points(), 4..7);
        assert!(points.ephemeral_points().all(|p| points.ephemeral_type(p) == EphemeralType::None));
    }

    #[test]
    fn test_damage_makes_non_hull_points_leak() {
        let mut points = make_points(2, 0);
        let mut rng = StdRng::seed_from_u64(1);
        let params = SimulationParameters::default();

        assert!(points.damage(0, &mut rng, &params));
        assert!(!points.damage(0, &mut rng, &params));
        assert_eq!(points.leaking(0).structural_leak, 1.0);

        // Point 1 is iron hull
        assert!(points.damage(1, &mut rng, &params));
        assert_eq!(points.leaking(1).structural_leak, 0.0);

        points.restore(0);
        assert!(!points.is_damaged(0));
        assert_eq!(points.leaking(0).structural_leak, 0.0);
    }

    #[test]
    fn test_masses_converge_towards_water_mass() {
        let mut points = make_points(1, 0);
        let params = SimulationParameters::default();
        let dry = points.mass(0);
        points.set_water(0, 1.0);
        for _ in 0..200 {
            points.update_masses(&params);
        }
        let fill = points.material(0).buoyancy_volume_fill;
        assert!((points.mass(0) - (dry + fill * WATER_MASS)).abs() < 1.0);
    }

    #[test]
    fn test_ephemeral_slots_rotate_and_recycle_oldest() {
        let mut points = make_points(1, 2);
        let params = SimulationParameters::default();
        let mut rng = StdRng::seed_from_u64(3);

        let a = points
            .create_ephemeral_air_bubble(Vec2f::ZERO, 1.0, 300.0, 0.0, 0, &mut rng, &params)
            .expect("free slot");
        let b = points
            .create_ephemeral_air_bubble(Vec2f::ZERO, 1.0, 300.0, 1.0, 0, &mut rng, &params)
            .expect("free slot");
        assert_ne!(a, b);

        // Air bubbles never recycle
        assert!(points
            .create_ephemeral_air_bubble(Vec2f::ZERO, 1.0, 300.0, 2.0, 0, &mut rng, &params)
            .is_none());

        // Debris takes over the oldest
        let d = points
            .create_ephemeral_debris(Vec2f::ZERO, Vec2f::new(1.0, 0.0), 0.0, 0.0, 0, 3.0, 0.5, 0, &params)
            .expect("forced slot");
        assert_eq!(d, a);
        assert_eq!(points.ephemeral_type(d), EphemeralType::Debris);

        points.expire_ephemeral_particle(b, &params);
        assert_eq!(points.ephemeral_type(b), EphemeralType::None);
        assert_eq!(points.velocity(b), Vec2f::ZERO);
        assert_eq!(points.live_ephemeral_count(), 1);
    }

    #[test]
    fn test_orphaned_burning_point_shrinks_flame() {
        let mut points = make_points(1, 0);
        points.combustion[0] = Combustion {
            state: CombustionState::Burning,
            flame_development: 0.9,
            max_flame_development: 0.9,
        };
        points.on_orphaned(0);
        assert_eq!(points.combustion(0).state, CombustionState::Developing2);
        assert!((points.combustion(0).max_flame_development - (0.3 + 0.02)).abs() < 1e-6);
    }

    #[test]
    fn test_decay_is_floored() {
        let mut points = make_points(1, 0);
        points.set_decay(0, 0.0);
        assert!(points.decay(0) > 0.0);
        points.set_decay(0, 2.0);
        assert_eq!(points.decay(0), 1.0);
    }
}
