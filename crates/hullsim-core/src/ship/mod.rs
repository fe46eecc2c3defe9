//! The ship: owner of the element stores and runner of the per-step
//! physics pipeline.
//!
//! A step advances, in order:
//!
//! 1. Parameter-derived caches, densities and masses
//! 2. Spring relaxation with integration and sea floor collisions
//! 3. Strains, which may break springs and reroute frontiers
//! 4. Queued interactions, gadgets, state machines and world forces
//! 5. Low-frequency rot, spring refresh, combustion and sinking checks
//! 6. Water intake, then water flow alongside pressure and heat
//! 7. Electricals, light and ephemeral particles
//!
//! Structural mutations go through the handlers in `physics_handler`, which
//! keep points, springs, triangles, frontiers and electricals consistent.

mod combustion;
mod connectivity;
mod dynamics;
mod heat;
mod interactions;
mod invariants;
mod light;
mod particles;
mod physics_handler;
mod static_pressure;
#[cfg(test)]
mod test_ships;
mod water;
mod world_forces;

use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;

use hullsim_logic::constants::dynamics_constants::SEA_FLOOR_COLLISION_PERIOD;
use hullsim_logic::constants::interaction_constants::{REPAIR_GRACE_RECOVERY_RATE, REPAIR_GRACE_SNAP};
use hullsim_logic::constants::low_frequency_constants::{
    COMBUSTION_STEPS, PARTITION_COUNT, PERIOD, ROT_POINTS_STEPS, SPRING_DECAY_AND_TEMPERATURE_STEPS,
    UPDATE_SINKING_STEP,
};
use hullsim_logic::constants::water_constants::SPLASH_RUNNING_AVERAGE_WINDOW;
use hullsim_logic::constants::world_constants::SIMULATION_STEP_TIME_DURATION;
use hullsim_logic::formulae::{
    air_density, global_damping_velocity_factor, ocean_floor_collision_factors, water_density,
    OceanFloorCollisionFactors,
};
use hullsim_logic::parameters::{SimulationParameters, StormParameters, StressRenderMode};
use hullsim_logic::vectors::{AabbSet, Vec2f};

use crate::builder::ShipBuilder;
use crate::collaborators::{GadgetHandler, NpcHandler, ShipCollaborators};
use crate::electrical::ElectricalElements;
use crate::error::BuildError;
use crate::events::SimulationEventHandler;
use crate::frontiers::Frontiers;
use crate::perf::{Phase, PerfStats};
use crate::points::Points;
use crate::springs::Springs;
use crate::state_machines::StateMachine;
use crate::threading::ThreadManager;
use crate::triangles::Triangles;
use crate::types::{FrontierType, ShipId, SpringDestroyOptions};
use crate::world::ShipWorld;

pub use connectivity::ConnectivityInfo;
pub use interactions::Interaction;
pub use static_pressure::StaticPressureStats;

use heat::{HeatInputs, fill_wet_mask, propagate_heat, rot_points};
use light::LightDiffusion;
use static_pressure::{PressureInputs, update_static_pressure};
use water::{
    RunningAverage, WaterFlowInputs, WaterFlowState, equalize_internal_pressure, update_pressure_and_water_inflow,
    update_water_velocities,
};

/// Ocean floor parameters the cached collision factors were computed with.
type FloorCollisionKey = [f32; 5];

/// Structural damage counters; the ship is fully repaired when all are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DamageCounters {
    pub damaged_points: usize,
    pub broken_springs: usize,
    pub broken_triangles: usize,
}

impl DamageCounters {
    pub fn is_pristine(&self) -> bool {
        self.damaged_points == 0 && self.broken_springs == 0 && self.broken_triangles == 0
    }
}

pub struct Ship {
    id: ShipId,

    /// Element stores
    pub(crate) points: Points,
    pub(crate) springs: Springs,
    pub(crate) triangles: Triangles,
    pub(crate) frontiers: Frontiers,
    pub(crate) electrical: ElectricalElements,

    /// Collaborators
    world: Box<dyn ShipWorld>,
    events: Box<dyn SimulationEventHandler>,
    npcs: Box<dyn NpcHandler>,
    gadgets: Box<dyn GadgetHandler>,

    rng: StdRng,

    /// Explosions and the like, advanced every step
    state_machines: Vec<StateMachine>,
    /// Interaction forces waiting for the next step
    queued_interactions: Vec<Interaction>,

    // Scheduling
    current_simulation_sequence_number: u64,
    current_simulation_time: f32,

    // Structure
    is_structure_dirty: bool,
    connectivity: ConnectivityInfo,
    damage: DamageCounters,
    is_sinking: bool,
    repair_grace_period_multiplier: f32,

    // Per-step outputs
    splash_average: RunningAverage,
    last_static_pressure: StaticPressureStats,
    light_diffusion: LightDiffusion,
    floor_collision_factors: Vec<OceanFloorCollisionFactors>,
    floor_collision_key: Option<FloorCollisionKey>,

    // Scratch buffers reused across steps
    new_depths: Vec<f32>,
    wet_mask: Vec<bool>,
    old_water: Vec<f32>,
    old_temperature: Vec<f32>,
    visited: Vec<bool>,
}

impl Ship {
    /// Build a ship from a validated mesh. `seed` drives every random draw
    /// the ship makes, so equal seeds give identical runs.
    pub fn new(
        id: ShipId,
        builder: &ShipBuilder,
        collaborators: ShipCollaborators,
        params: &SimulationParameters,
        seed: u64,
    ) -> Result<Self, BuildError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let structure = builder.build_structure(params, &mut rng)?;
        let ShipCollaborators {
            world,
            events,
            npcs,
            gadgets,
        } = collaborators;

        let frontiers = Frontiers::build(&structure.points, &structure.springs, &structure.triangles);

        let mut ship = Self {
            id,
            points: structure.points,
            springs: structure.springs,
            triangles: structure.triangles,
            frontiers,
            electrical: structure.electrical,
            world,
            events,
            npcs,
            gadgets,
            rng,
            state_machines: Vec::new(),
            queued_interactions: Vec::new(),
            current_simulation_sequence_number: 0,
            current_simulation_time: 0.0,
            is_structure_dirty: true,
            connectivity: ConnectivityInfo::default(),
            damage: DamageCounters::default(),
            is_sinking: false,
            repair_grace_period_multiplier: 1.0,
            splash_average: RunningAverage::new(SPLASH_RUNNING_AVERAGE_WINDOW),
            last_static_pressure: StaticPressureStats::default(),
            light_diffusion: LightDiffusion::new(),
            floor_collision_factors: Vec::new(),
            floor_collision_key: None,
            new_depths: Vec::new(),
            wet_mask: Vec::new(),
            old_water: Vec::new(),
            old_temperature: Vec::new(),
            visited: Vec::new(),
        };

        for p in 0..ship.points.point_count() {
            ship.points.cached_depth[p] = ship.world.depth(ship.points.position[p]);
        }
        ship.frontiers.update_geometry(&ship.points);
        ship.update_floor_collision_factors(params);
        ship.refresh_connectivity();

        log::info!(
            "Ship {} built: {} points, {} springs, {} triangles, {} frontiers, {} electrical elements",
            id,
            ship.points.raw_ship_point_count(),
            ship.springs.element_count(),
            ship.triangles.element_count(),
            ship.frontiers.frontier_count(),
            ship.electrical.element_count(),
        );

        Ok(ship)
    }

    //
    // Accessors
    //

    pub fn id(&self) -> ShipId {
        self.id
    }

    pub fn points(&self) -> &Points {
        &self.points
    }

    pub fn springs(&self) -> &Springs {
        &self.springs
    }

    pub fn triangles(&self) -> &Triangles {
        &self.triangles
    }

    pub fn frontiers(&self) -> &Frontiers {
        &self.frontiers
    }

    pub fn electrical_elements(&self) -> &ElectricalElements {
        &self.electrical
    }

    pub fn world(&self) -> &dyn ShipWorld {
        self.world.as_ref()
    }

    pub fn state_machines(&self) -> &[StateMachine] {
        &self.state_machines
    }

    pub fn queued_interaction_count(&self) -> usize {
        self.queued_interactions.len()
    }

    pub fn current_simulation_sequence_number(&self) -> u64 {
        self.current_simulation_sequence_number
    }

    pub fn current_simulation_time(&self) -> f32 {
        self.current_simulation_time
    }

    pub fn is_structure_dirty(&self) -> bool {
        self.is_structure_dirty
    }

    pub fn connectivity(&self) -> &ConnectivityInfo {
        &self.connectivity
    }

    pub fn damage(&self) -> DamageCounters {
        self.damage
    }

    pub fn is_sinking(&self) -> bool {
        self.is_sinking
    }

    pub fn repair_grace_period_multiplier(&self) -> f32 {
        self.repair_grace_period_multiplier
    }

    pub fn last_static_pressure(&self) -> StaticPressureStats {
        self.last_static_pressure
    }

    //
    // Update
    //

    /// Advance the ship by one simulation step. External frontier AABBs are
    /// added to `external_aabbs`.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        current_simulation_time: f32,
        storm: &StormParameters,
        params: &SimulationParameters,
        stress_render_mode: StressRenderMode,
        external_aabbs: &mut AabbSet,
        thread_manager: &ThreadManager,
        perf: &mut PerfStats,
    ) {
        let update_start = Instant::now();

        self.current_simulation_sequence_number += 1;
        self.current_simulation_time = current_simulation_time;
        let low_frequency_step = self.current_simulation_sequence_number % PERIOD;

        // Parameter changes
        self.points.update_for_simulation_parameters(params, &mut self.rng);
        self.springs.update_for_simulation_parameters(params, &self.points);
        self.update_floor_collision_factors(params);

        let effective_air_density = air_density(params.air_temperature, params);
        let effective_water_density = water_density(params.water_temperature, params);

        self.points.update_masses(params);

        // Mechanical dynamics
        let start = Instant::now();
        self.run_spring_relaxation(params);
        dynamics::trim_for_world_bounds(&mut self.points, params);
        perf.record(Phase::MechanicalDynamics, start.elapsed());

        // Positions are final from here on

        // Strains
        let start = Instant::now();
        if stress_render_mode.is_active() {
            self.points.reset_stress();
        }
        let broken = self.springs.update_for_strains(
            &mut self.points,
            stress_render_mode,
            self.world.as_ref(),
            self.events.as_mut(),
        );
        for s in broken {
            if !self.springs.is_deleted(s) {
                self.destroy_spring(
                    s,
                    SpringDestroyOptions {
                        fire_break_event: true,
                        destroy_all_triangles: false,
                    },
                    current_simulation_time,
                    params,
                );
            }
        }
        perf.record(Phase::Strains, start.elapsed());

        // Static forces were integrated, start over
        self.points.reset_static_forces();
        self.apply_queued_interaction_forces(params);

        // World forces; cached depths are valid from here on
        let start = Instant::now();
        self.apply_world_forces(effective_air_density, effective_water_density, params, external_aabbs);
        perf.record(Phase::WorldForces, start.elapsed());

        // Low frequency: rot
        let start = Instant::now();
        if let Some(partition) = ROT_POINTS_STEPS.iter().position(|&s| s == low_frequency_step) {
            rot_points(&mut self.points, partition, PARTITION_COUNT, params);
        }
        perf.record(Phase::LowFrequency, start.elapsed());

        // Gadgets and state machines
        let requests = self.gadgets.update(current_simulation_time, params);
        for request in requests {
            self.start_explosion(current_simulation_time, &request);
        }
        self.update_state_machines(current_simulation_time, params);

        // Water and heat
        let start = Instant::now();
        let water_taken = update_pressure_and_water_inflow(
            &mut self.points,
            effective_air_density,
            effective_water_density,
            current_simulation_time,
            storm,
            params,
            &mut self.rng,
        );
        self.events.on_water_taken(water_taken);

        let (splash, pressure_stats) = self.run_water_pressure_and_heat(
            effective_air_density,
            effective_water_density,
            storm,
            params,
            thread_manager,
        );
        let splash = self.splash_average.update(splash);
        self.events.on_water_splashed(splash);
        if let Some(stats) = pressure_stats {
            log::trace!(
                "Ship {} static pressure: net force {:.3}, iterations {:.1}%",
                self.id,
                stats.net_force_magnitude_average,
                stats.iterations_percentage_average * 100.0
            );
            self.events
                .on_static_pressure_updated(stats.net_force_magnitude_average, stats.iterations_percentage_average);
            self.last_static_pressure = stats;
        }
        perf.record(Phase::WaterAndHeat, start.elapsed());

        // Low frequency: sinking
        if low_frequency_step == UPDATE_SINKING_STEP {
            self.update_sinking(current_simulation_time);
        }

        // Electricals
        let start = Instant::now();
        let electrical_update = self.electrical.update(current_simulation_time, &mut self.points, params);
        for (e, reason) in electrical_update.destroyed {
            self.destroy_electrical_element(e, reason, current_simulation_time, params);
        }
        for (p, is_open) in electrical_update.door_changes {
            self.handle_watertight_door_updated(p, is_open);
        }
        perf.record(Phase::Electrical, start.elapsed());

        // Light
        let start = Instant::now();
        let lamps = self.electrical.lamp_lights();
        self.light_diffusion.diffuse(&mut self.points, &lamps, thread_manager, params);
        perf.record(Phase::Light, start.elapsed());

        // Combustion: slow, then fast
        let start = Instant::now();
        if let Some(partition) = COMBUSTION_STEPS.iter().position(|&s| s == low_frequency_step) {
            let requests = combustion::update_combustion_low_frequency(
                &mut self.points,
                partition,
                PARTITION_COUNT,
                current_simulation_time,
                storm,
                params,
                &mut self.rng,
                self.events.as_mut(),
            );
            for request in requests {
                self.start_explosion(current_simulation_time, &request);
            }
        }
        combustion::update_combustion_high_frequency(
            &mut self.points,
            SIMULATION_STEP_TIME_DURATION,
            params,
            self.events.as_mut(),
        );

        // Low frequency: spring decay and temperature
        if let Some(partition) = SPRING_DECAY_AND_TEMPERATURE_STEPS
            .iter()
            .position(|&s| s == low_frequency_step)
        {
            self.springs
                .update_coefficients_for_partition(partition, PARTITION_COUNT, &self.points);
        }
        perf.record(Phase::LowFrequency, start.elapsed());

        // Ephemeral particles
        let start = Instant::now();
        particles::update_ephemeral_particles(
            &mut self.points,
            current_simulation_time,
            self.world.as_mut(),
            self.events.as_mut(),
            params,
        );
        perf.record(Phase::Particles, start.elapsed());

        self.refresh_connectivity();

        debug_assert_eq!(self.verify_invariants(), Ok(()));

        perf.total_update_duration += update_start.elapsed();
        perf.update_count += 1;
    }

    /// Bookkeeping after every ship of the world has been updated.
    pub fn update_end(&mut self) {
        // Recover from a repair
        if self.repair_grace_period_multiplier != 1.0 {
            self.repair_grace_period_multiplier += REPAIR_GRACE_RECOVERY_RATE * (1.0 - self.repair_grace_period_multiplier);
            if (1.0 - self.repair_grace_period_multiplier).abs() < REPAIR_GRACE_SNAP {
                self.repair_grace_period_multiplier = 1.0;
            }
        }

        self.points.reset_is_electrified();
    }

    /// Re-run the connectivity visit if the structure changed since the last
    /// one; also works while the simulation is paused. Returns whether a
    /// visit ran.
    pub fn refresh_connectivity(&mut self) -> bool {
        if !self.is_structure_dirty {
            return false;
        }

        self.connectivity = connectivity::run_connectivity_visit(&mut self.points, &mut self.visited);
        self.points.reorder_burning_points_for_depth();
        self.npcs.on_ship_connectivity_changed(self.id);
        self.is_structure_dirty = false;

        log::debug!("Ship {} connectivity: {} planes", self.id, self.connectivity.plane_count());
        true
    }

    /// Put the clock back where a snapshot left it.
    pub(crate) fn set_clock(&mut self, simulation_time: f32, sequence_number: u64) {
        self.current_simulation_time = simulation_time;
        self.current_simulation_sequence_number = sequence_number;
    }

    pub(crate) fn mark_structure_dirty(&mut self) {
        self.is_structure_dirty = true;
    }

    //
    // Pipeline stages
    //

    fn update_floor_collision_factors(&mut self, params: &SimulationParameters) {
        let key = [
            params.elasticity_adjustment,
            params.static_friction_adjustment,
            params.kinetic_friction_adjustment,
            params.ocean_floor_elasticity_coefficient,
            params.ocean_floor_friction_coefficient,
        ];
        if self.floor_collision_key == Some(key) {
            return;
        }

        self.floor_collision_factors = self
            .points
            .materials
            .iter()
            .map(|m| {
                ocean_floor_collision_factors(
                    m.elasticity_coefficient,
                    m.static_friction_coefficient,
                    m.kinetic_friction_coefficient,
                    params,
                )
            })
            .collect();
        self.floor_collision_key = Some(key);
    }

    /// Relax springs over the configured number of sub-iterations,
    /// integrating after each one.
    pub fn run_spring_relaxation(&mut self, params: &SimulationParameters) {
        let num_iterations = params.num_mechanical_dynamics_iterations();
        let dt = params.mechanical_simulation_step_time_duration();
        let velocity_factor = global_damping_velocity_factor(num_iterations as f32, params.global_damping_adjustment);

        for iter in 0..num_iterations {
            dynamics::apply_spring_forces(&self.springs, &mut self.points);

            // Pressure forces are dynamic, and applied once
            if iter == num_iterations - 1 {
                dynamics::apply_static_pressure_forces(&mut self.points);
            }

            dynamics::integrate_and_reset_dynamic_forces(&mut self.points, dt, velocity_factor);

            if iter % SEA_FLOOR_COLLISION_PERIOD == SEA_FLOOR_COLLISION_PERIOD - 1 {
                dynamics::handle_collisions_with_sea_floor(
                    &mut self.points,
                    &self.floor_collision_factors,
                    self.world.as_ref(),
                    params,
                );
            }
        }
    }

    fn apply_world_forces(
        &mut self,
        effective_air_density: f32,
        effective_water_density: f32,
        params: &SimulationParameters,
        external_aabbs: &mut AabbSet,
    ) {
        self.new_depths.resize(self.points.point_count(), 0.0);

        world_forces::apply_world_particle_forces(
            &mut self.points,
            &mut self.new_depths,
            self.world.as_ref(),
            effective_air_density,
            effective_water_density,
            params,
        );

        world_forces::apply_world_surface_forces(
            &mut self.points,
            &self.frontiers,
            &mut self.new_depths,
            self.world.as_mut(),
            self.events.as_mut(),
            effective_air_density,
            effective_water_density,
            params,
        );

        self.frontiers.update_geometry(&self.points);
        for (_, frontier) in self.frontiers.iter() {
            if frontier.frontier_type == FrontierType::External {
                external_aabbs.add(frontier.aabb);
            }
        }
    }

    /// Water flow on one side; pressure equalization, static pressure and
    /// heat on the other. The two touch disjoint point buffers.
    fn run_water_pressure_and_heat(
        &mut self,
        effective_air_density: f32,
        effective_water_density: f32,
        storm: &StormParameters,
        params: &SimulationParameters,
        thread_manager: &ThreadManager,
    ) -> (f32, Option<StaticPressureStats>) {
        fill_wet_mask(&self.points, &mut self.wet_mask);

        let raw_point_count = self.points.raw_ship_point_count();
        let repair_grace_period_multiplier = self.repair_grace_period_multiplier;
        let do_static_pressure = params.static_pressure_force_adjustment > 0.0;

        let springs = &self.springs;
        let frontiers = &self.frontiers;
        let world: &dyn ShipWorld = self.world.as_ref();
        let wet_mask = &self.wet_mask[..];
        let old_water = &mut self.old_water;
        let old_temperature = &mut self.old_temperature;

        let Points {
            position,
            connected_springs,
            water_diffusion_speed,
            water,
            water_velocity,
            water_momentum,
            internal_pressure,
            is_hull,
            static_pressure_force,
            temperature,
            heat_capacity_reciprocal,
            ..
        } = &mut self.points;
        let position = &position[..];
        let connected_springs = &connected_springs[..];
        let is_hull = &is_hull[..];

        thread_manager.run_pair(
            || {
                update_water_velocities(
                    &WaterFlowInputs {
                        raw_point_count,
                        position,
                        connected_springs,
                        water_diffusion_speed: &water_diffusion_speed[..],
                    },
                    &mut WaterFlowState {
                        water: &mut water[..],
                        water_velocity: &mut water_velocity[..],
                        water_momentum: &mut water_momentum[..],
                    },
                    springs,
                    old_water,
                    params,
                )
            },
            || {
                equalize_internal_pressure(raw_point_count, &mut internal_pressure[..], is_hull, connected_springs);

                let stats = if do_static_pressure {
                    Some(update_static_pressure(
                        frontiers,
                        &PressureInputs {
                            position,
                            is_hull,
                            internal_pressure: &internal_pressure[..],
                        },
                        &mut static_pressure_force[..],
                        world,
                        effective_air_density,
                        effective_water_density,
                        repair_grace_period_multiplier,
                        params,
                    ))
                } else {
                    static_pressure_force.iter_mut().for_each(|f| *f = Vec2f::ZERO);
                    None
                };

                propagate_heat(
                    &HeatInputs {
                        raw_point_count,
                        position,
                        connected_springs,
                        heat_capacity_reciprocal: &heat_capacity_reciprocal[..],
                        is_wet: wet_mask,
                    },
                    &mut temperature[..],
                    old_temperature,
                    springs,
                    SIMULATION_STEP_TIME_DURATION,
                    storm,
                    params,
                );

                stats
            },
        )
    }

    fn update_sinking(&mut self, current_simulation_time: f32) {
        let wet_points = water::wet_point_count(&self.points);
        let transition = water::sinking_transition(
            self.is_sinking,
            wet_points,
            self.points.raw_ship_point_count(),
            self.points.total_factory_wet_points(),
        );

        match transition {
            Some(true) => {
                log::info!("Ship {} started sinking ({} wet points)", self.id, wet_points);
                self.npcs.on_ship_started_sinking(self.id, current_simulation_time);
                self.events.on_sinking_begin(self.id);
                self.is_sinking = true;
            }
            Some(false) => {
                log::info!("Ship {} stopped sinking ({} wet points)", self.id, wet_points);
                self.events.on_sinking_end(self.id);
                self.is_sinking = false;
            }
            None => {}
        }
    }
}
