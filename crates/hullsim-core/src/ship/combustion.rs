//! Fire: ignition, burning and extinction of points.
//!
//! The low-frequency pass decides which points ignite, explode or start
//! going out; the high-frequency pass heats the neighbors of burning
//! points and advances each flame through its development states.

use rand::Rng;

use hullsim_logic::constants::heat_constants::*;
use hullsim_logic::constants::interaction_constants::COMBUSTION_EXPLOSION_BLAST_FORCE;
use hullsim_logic::constants::low_frequency_constants::PERIOD;
use hullsim_logic::constants::world_constants::SIMULATION_STEP_TIME_DURATION;
use hullsim_logic::materials::CombustionType;
use hullsim_logic::math::smooth_step;
use hullsim_logic::parameters::{SimulationParameters, StormParameters};
use hullsim_logic::vectors::Vec2f;

use crate::collaborators::ExplosionRequest;
use crate::events::SimulationEventHandler;
use crate::points::{CombustionState, Points};
use crate::types::{ElementIndex, ExplosionType};

const GRAVITY_NORMALIZED: Vec2f = Vec2f::new(0.0, -1.0);

/// Flame development below which an extinguishing point stops burning.
const FLAME_OUT_THRESHOLD: f32 = 0.02;

/// Visit every `partition_count`-th raw point starting at `partition`:
/// ignite the hottest candidates, explode overheated explosives, and
/// consume or rain-smother burning points. Returns the explosions to start.
#[allow(clippy::too_many_arguments)]
pub(crate) fn update_combustion_low_frequency(
    points: &mut Points,
    partition: usize,
    partition_count: usize,
    current_time: f32,
    storm: &StormParameters,
    params: &SimulationParameters,
    rng: &mut impl Rng,
    events: &mut dyn SimulationEventHandler,
) -> Vec<ExplosionRequest> {
    let mut ignition_candidates: Vec<(ElementIndex, f32)> = Vec::new();
    let mut explosion_candidates: Vec<(ElementIndex, f32)> = Vec::new();

    let rain_extinguish_probability = storm.rain_density.clamp(0.0, 1.0).powf(0.5) as f64;

    for p in (partition..points.raw_ship_point_count()).step_by(partition_count.max(1)) {
        let ignition_temperature = points.ignition_temperature[p] * params.ignition_temperature_adjustment;

        match points.combustion[p].state {
            CombustionState::NotBurning => {
                // Rain does not prevent ignition; flames get smothered later
                if points.temperature[p] >= ignition_temperature + IGNITION_TEMPERATURE_HIGH_WATERMARK
                    && points.water[p] < SMOTHERING_WATER_LOW_WATERMARK
                    && points.decay[p] > SMOTHERING_DECAY_HIGH_WATERMARK
                {
                    let overheat = (points.temperature[p] - ignition_temperature) / ignition_temperature;
                    match points.combustion_type[p] {
                        CombustionType::Combustion if !points.is_cached_underwater(p) => {
                            ignition_candidates.push((p, overheat));
                        }
                        CombustionType::Explosion => {
                            explosion_candidates.push((p, overheat));
                        }
                        _ => {}
                    }
                }
            }
            CombustionState::Burning => {
                if points.temperature[p] <= ignition_temperature + IGNITION_TEMPERATURE_LOW_WATERMARK
                    || points.decay[p] < SMOTHERING_DECAY_LOW_WATERMARK
                {
                    points.combustion[p].state = CombustionState::ExtinguishingConsumed;
                    events.on_combustion_end();
                } else if rng.gen_bool(rain_extinguish_probability) {
                    smother(points, p, false, events);
                } else {
                    // Burning consumes the point and its neighbors
                    let alpha = points.combustion_decay.alpha(points.augmented_material_mass[p]);
                    debug_assert!(alpha <= 1.0);
                    points.set_decay(p, points.decay[p] * alpha);
                    for i in 0..points.connected_springs[p].len() {
                        let other = points.connected_springs[p][i].other_endpoint;
                        points.set_decay(other, points.decay[other] * alpha);
                    }
                }
            }
            _ => {}
        }
    }

    //
    // Ignition
    //

    if !ignition_candidates.is_empty() {
        let max_burning = params.max_burning_particles as usize;
        let room = max_burning.saturating_sub(points.burning_points.len());
        let count = (MAX_IGNITION_CANDIDATES_PER_STEP + rng.gen_range(0..MAX_EXTRA_IGNITIONS_PER_STEP))
            .min(room)
            .min(ignition_candidates.len());

        ignition_candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

        for &(p, overheat) in &ignition_candidates[..count] {
            let flame_development = 0.1 + 0.5 * smooth_step(0.0, 2.0, overheat);
            // Chains get smaller flames
            let springs_bonus = points.connected_springs[p].len() as f32 * 0.0625;

            let combustion = &mut points.combustion[p];
            combustion.state = CombustionState::Developing1;
            combustion.flame_development = flame_development;
            combustion.max_flame_development =
                (0.25 + springs_bonus + 0.5 * points.random_normalized[p]).max(flame_development);

            insert_burning_point(points, p);
            events.on_combustion_begin();
        }
    }

    //
    // Explosions
    //

    let mut explosions = Vec::new();
    if !explosion_candidates.is_empty() {
        let count = MAX_EXPLOSION_CANDIDATES_PER_STEP.min(explosion_candidates.len());
        explosion_candidates.sort_by(|a, b| b.1.total_cmp(&a.1));

        let blast_heat = COMBUSTION_HEAT
            * 1.5
            * PERIOD as f32
            * SIMULATION_STEP_TIME_DURATION
            * params.combustion_heat_adjustment
            * if params.is_ultra_violent_mode { 10.0 } else { 1.0 };

        for &(p, _) in &explosion_candidates[..count] {
            let blast_radius = points.explosive_combustion_radius[p]
                * if params.is_ultra_violent_mode { 4.0 } else { 1.0 };
            let blast_force = COMBUSTION_EXPLOSION_BLAST_FORCE * points.explosive_combustion_force[p];

            explosions.push(ExplosionRequest {
                plane_id: points.plane_id[p],
                center: points.position[p],
                blast_force,
                blast_force_radius: blast_radius,
                blast_heat,
                blast_heat_radius: blast_radius,
                kind: ExplosionType::Combustion,
            });
            events.on_combustion_explosion(points.is_cached_underwater(p), 1);

            points.combustion[p].state = CombustionState::Exploded;
        }
    }

    explosions
}

/// Every step: smother wet burning points, heat the neighbors of burning
/// points, and develop or extinguish each flame.
pub(crate) fn update_combustion_high_frequency(
    points: &mut Points,
    dt: f32,
    params: &SimulationParameters,
    events: &mut dyn SimulationEventHandler,
) {
    let combustion_heat = COMBUSTION_HEAT * dt * params.combustion_heat_adjustment;

    let burning = std::mem::take(&mut points.burning_points);
    let mut stopped: Vec<ElementIndex> = Vec::new();

    for &p in &burning {
        let state = points.combustion[p].state;
        debug_assert!(state != CombustionState::NotBurning);

        let is_smothering_candidate = matches!(
            state,
            CombustionState::Developing1
                | CombustionState::Developing2
                | CombustionState::Burning
                | CombustionState::ExtinguishingConsumed
        );
        if is_smothering_candidate
            && (points.is_cached_underwater(p) || points.water[p] > SMOTHERING_WATER_HIGH_WATERMARK)
        {
            smother(points, p, true, events);
        } else if state == CombustionState::Burning {
            points.temperature[p] = points.ignition_temperature[p] * params.ignition_temperature_adjustment * 1.1;

            // Flames climb: 2.9 up, 1.9 sideways, 0.9 down
            for i in 0..points.connected_springs[p].len() {
                let other = points.connected_springs[p][i].other_endpoint;
                let direction = (points.position[other] - points.position[p]).normalise();
                let direction_alpha = 0.9 + (1.0 - direction.dot(GRAVITY_NORMALIZED));
                points.temperature[other] += combustion_heat
                    * direction_alpha
                    * points.heat_capacity_reciprocal[other]
                    * points.decay[other];
            }
        }

        let combustion = &mut points.combustion[p];
        match combustion.state {
            CombustionState::Developing1 => {
                combustion.flame_development += 0.04 * combustion.flame_development;
                if combustion.flame_development > combustion.max_flame_development + 0.1 {
                    combustion.state = CombustionState::Developing2;
                }
            }
            CombustionState::Developing2 => {
                let extra = combustion.flame_development - combustion.max_flame_development;
                if extra < 0.02 {
                    combustion.state = CombustionState::Burning;
                    combustion.flame_development = combustion.max_flame_development;
                } else {
                    combustion.flame_development -= 0.35 * extra;
                }
            }
            CombustionState::ExtinguishingConsumed
            | CombustionState::ExtinguishingSmotheredRain
            | CombustionState::ExtinguishingSmotheredWater => {
                combustion.flame_development -= match combustion.state {
                    CombustionState::ExtinguishingConsumed => {
                        0.0625 * (combustion.max_flame_development - combustion.flame_development + 0.01)
                    }
                    CombustionState::ExtinguishingSmotheredRain => 0.075 * combustion.flame_development,
                    _ => 0.3 * combustion.flame_development,
                };
                if combustion.flame_development <= FLAME_OUT_THRESHOLD {
                    combustion.state = CombustionState::NotBurning;
                    stopped.push(p);
                }
            }
            CombustionState::Burning | CombustionState::Exploded | CombustionState::NotBurning => {}
        }
    }

    points.burning_points = burning;
    if !stopped.is_empty() {
        points.burning_points.retain(|p| !stopped.contains(p));
    }
}

fn smother(points: &mut Points, p: ElementIndex, is_water: bool, events: &mut dyn SimulationEventHandler) {
    let combustion = &mut points.combustion[p];
    if matches!(
        combustion.state,
        CombustionState::Developing1 | CombustionState::Developing2 | CombustionState::Burning
    ) {
        events.on_combustion_end();
    }
    combustion.state = if is_water {
        CombustionState::ExtinguishingSmotheredWater
    } else {
        CombustionState::ExtinguishingSmotheredRain
    };
    events.on_combustion_smothered();
}

/// Insert before the other points of the same plane and height, keeping
/// the order of [`Points::reorder_burning_points_for_depth`].
fn insert_burning_point(points: &mut Points, p: ElementIndex) {
    debug_assert!(!points.burning_points.contains(&p));
    let plane_id = &points.plane_id;
    let position = &points.position;
    let at = points.burning_points.partition_point(|&q| {
        plane_id[q] < plane_id[p] || (plane_id[q] == plane_id[p] && position[q].y > position[p].y)
    });
    points.burning_points.insert(at, p);
}
