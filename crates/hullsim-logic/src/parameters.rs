//! Tunable simulation parameters.
//!
//! `SimulationParameters` carries every knob the ship update reads. All
//! adjustments are dimensionless multipliers defaulting to 1.0; the struct
//! loads from JSON with missing fields taking their defaults and unknown
//! fields rejected.

use serde::{Deserialize, Serialize};

use crate::constants::dynamics_constants::BASIS_NUM_MECHANICAL_DYNAMICS_ITERATIONS;
use crate::constants::world_constants::SIMULATION_STEP_TIME_DURATION;

/// Error raised when loading or validating parameters.
#[derive(Debug)]
pub enum ParameterError {
    Json(serde_json::Error),
    OutOfRange {
        name: &'static str,
        value: f32,
        min: f32,
        max: f32,
    },
}

impl From<serde_json::Error> for ParameterError {
    fn from(e: serde_json::Error) -> Self {
        ParameterError::Json(e)
    }
}

impl std::fmt::Display for ParameterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterError::Json(e) => write!(f, "JSON error: {}", e),
            ParameterError::OutOfRange { name, value, min, max } => {
                write!(f, "Parameter {} = {} out of range [{}, {}]", name, value, min, max)
            }
        }
    }
}

impl std::error::Error for ParameterError {}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SimulationParameters {
    // Mechanics
    pub num_mechanical_dynamics_iterations_adjustment: f32,
    pub spring_stiffness_adjustment: f32,
    pub spring_damping_adjustment: f32,
    pub spring_strength_adjustment: f32,
    pub global_damping_adjustment: f32,
    pub elasticity_adjustment: f32,
    pub static_friction_adjustment: f32,
    pub kinetic_friction_adjustment: f32,

    // Ocean floor
    pub ocean_floor_elasticity_coefficient: f32,
    pub ocean_floor_friction_coefficient: f32,
    /// 0.0 = floor fully silted (soft), 1.0 = hard rock.
    pub ocean_floor_silt_hardness: f32,
    pub sea_depth: f32,

    /// Rot speed multiplier; 0 disables rotting.
    pub rot_accelerator: f32,

    // Air and water
    pub air_density_adjustment: f32,
    pub air_friction_drag_adjustment: f32,
    pub air_pressure_drag_adjustment: f32,
    pub water_density_adjustment: f32,
    pub water_friction_drag_adjustment: f32,
    pub water_pressure_drag_adjustment: f32,
    pub water_impact_force_adjustment: f32,
    pub hydrostatic_pressure_counterbalance_adjustment: f32,
    pub static_pressure_force_adjustment: f32,
    pub water_intake_adjustment: f32,
    pub water_diffusion_speed_adjustment: f32,
    /// How much the Bernoulli velocity dominates water motion.
    pub water_crazyness: f32,
    pub water_displacement_wave_height_adjustment: f32,
    pub do_displace_water: bool,
    pub rain_flood_adjustment: f32,

    // Heat and combustion
    /// Kelvin
    pub air_temperature: f32,
    /// Kelvin
    pub water_temperature: f32,
    pub thermal_conductivity_adjustment: f32,
    pub heat_dissipation_adjustment: f32,
    pub ignition_temperature_adjustment: f32,
    pub melting_temperature_adjustment: f32,
    pub combustion_speed_adjustment: f32,
    pub combustion_heat_adjustment: f32,
    pub max_burning_particles: u32,

    // Electricals and light
    pub luminiscence_adjustment: f32,
    pub light_spread_adjustment: f32,
    pub water_pump_power_adjustment: f32,

    // Particles
    pub air_bubbles_density: f32,
    pub do_generate_debris: bool,
    pub do_generate_air_bubbles: bool,
    pub max_ephemeral_particles: usize,

    // Interactions
    pub anti_matter_bomb_implosion_strength: f32,
    pub is_ultra_violent_mode: bool,
}

impl Default for SimulationParameters {
    fn default() -> Self {
        Self {
            num_mechanical_dynamics_iterations_adjustment: 1.0,
            spring_stiffness_adjustment: 1.0,
            spring_damping_adjustment: 1.0,
            spring_strength_adjustment: 1.0,
            global_damping_adjustment: 1.0,
            elasticity_adjustment: 1.0,
            static_friction_adjustment: 1.0,
            kinetic_friction_adjustment: 1.0,
            ocean_floor_elasticity_coefficient: 0.5,
            ocean_floor_friction_coefficient: 0.35,
            ocean_floor_silt_hardness: 0.0,
            sea_depth: 800.0,
            rot_accelerator: 1.0,
            air_density_adjustment: 1.0,
            air_friction_drag_adjustment: 1.0,
            air_pressure_drag_adjustment: 1.0,
            water_density_adjustment: 1.0,
            water_friction_drag_adjustment: 1.0,
            water_pressure_drag_adjustment: 1.0,
            water_impact_force_adjustment: 1.0,
            hydrostatic_pressure_counterbalance_adjustment: 0.5,
            static_pressure_force_adjustment: 1.0,
            water_intake_adjustment: 1.0,
            water_diffusion_speed_adjustment: 1.0,
            water_crazyness: 1.0,
            water_displacement_wave_height_adjustment: 1.0,
            do_displace_water: true,
            rain_flood_adjustment: 1.0,
            air_temperature: 288.15,
            water_temperature: 288.15,
            thermal_conductivity_adjustment: 1.0,
            heat_dissipation_adjustment: 1.0,
            ignition_temperature_adjustment: 1.0,
            melting_temperature_adjustment: 1.0,
            combustion_speed_adjustment: 1.0,
            combustion_heat_adjustment: 1.0,
            max_burning_particles: 112,
            luminiscence_adjustment: 1.0,
            light_spread_adjustment: 1.0,
            water_pump_power_adjustment: 1.0,
            air_bubbles_density: 64.0,
            do_generate_debris: true,
            do_generate_air_bubbles: true,
            max_ephemeral_particles: 512,
            anti_matter_bomb_implosion_strength: 3.0,
            is_ultra_violent_mode: false,
        }
    }
}

impl SimulationParameters {
    /// Parse and validate parameters from a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ParameterError> {
        let params: SimulationParameters = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn to_json_string(&self) -> Result<String, ParameterError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check every ranged parameter; returns the first violation.
    pub fn validate(&self) -> Result<(), ParameterError> {
        match self.out_of_range().into_iter().next() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// All ranged parameters currently outside their range.
    pub fn out_of_range(&self) -> Vec<ParameterError> {
        self.ranges()
            .into_iter()
            .filter(|(_, value, min, max)| !(*value >= *min && *value <= *max))
            .map(|(name, value, min, max)| ParameterError::OutOfRange { name, value, min, max })
            .collect()
    }

    /// Copy with every ranged parameter clamped into its range, along with
    /// the violations that were corrected.
    pub fn clamped(&self) -> (Self, Vec<ParameterError>) {
        let violations = self.out_of_range();
        let mut result = self.clone();
        for (name, _, min, max) in self.ranges() {
            if let Some(field) = result.field_mut(name) {
                *field = if field.is_nan() { min } else { field.clamp(min, max) };
            }
        }
        result.max_burning_particles = result.max_burning_particles.clamp(10, 1000);
        (result, violations)
    }

    /// Number of relaxation sub-iterations per simulation step.
    pub fn num_mechanical_dynamics_iterations(&self) -> usize {
        ((BASIS_NUM_MECHANICAL_DYNAMICS_ITERATIONS * self.num_mechanical_dynamics_iterations_adjustment).round()
            as usize)
            .max(1)
    }

    /// Duration of one relaxation sub-iteration, in seconds.
    pub fn mechanical_simulation_step_time_duration(&self) -> f32 {
        SIMULATION_STEP_TIME_DURATION / self.num_mechanical_dynamics_iterations() as f32
    }

    fn ranges(&self) -> Vec<(&'static str, f32, f32, f32)> {
        vec![
            ("num_mechanical_dynamics_iterations_adjustment", self.num_mechanical_dynamics_iterations_adjustment, 0.1, 20.0),
            ("spring_stiffness_adjustment", self.spring_stiffness_adjustment, 0.001, 2.4),
            ("spring_damping_adjustment", self.spring_damping_adjustment, 0.001, 4.0),
            ("spring_strength_adjustment", self.spring_strength_adjustment, 0.01, 50.0),
            ("global_damping_adjustment", self.global_damping_adjustment, 0.0, 10.0),
            ("elasticity_adjustment", self.elasticity_adjustment, 0.0, 4.0),
            ("static_friction_adjustment", self.static_friction_adjustment, 0.0, 40.0),
            ("kinetic_friction_adjustment", self.kinetic_friction_adjustment, 0.0, 10.0),
            ("ocean_floor_elasticity_coefficient", self.ocean_floor_elasticity_coefficient, 0.0, 1.0),
            ("ocean_floor_friction_coefficient", self.ocean_floor_friction_coefficient, 0.0, 1.0),
            ("ocean_floor_silt_hardness", self.ocean_floor_silt_hardness, 0.0, 1.0),
            ("sea_depth", self.sea_depth, -50.0, 10000.0),
            ("rot_accelerator", self.rot_accelerator, 0.0, 1000.0),
            ("air_density_adjustment", self.air_density_adjustment, 0.001, 1000.0),
            ("air_friction_drag_adjustment", self.air_friction_drag_adjustment, 0.0, 1000.0),
            ("air_pressure_drag_adjustment", self.air_pressure_drag_adjustment, 0.0, 1000.0),
            ("water_density_adjustment", self.water_density_adjustment, 0.001, 100.0),
            ("water_friction_drag_adjustment", self.water_friction_drag_adjustment, 0.0, 1000.0),
            ("water_pressure_drag_adjustment", self.water_pressure_drag_adjustment, 0.0, 1000.0),
            ("water_impact_force_adjustment", self.water_impact_force_adjustment, 0.0, 10.0),
            ("hydrostatic_pressure_counterbalance_adjustment", self.hydrostatic_pressure_counterbalance_adjustment, 0.0, 1.0),
            ("static_pressure_force_adjustment", self.static_pressure_force_adjustment, 0.0, 20.0),
            ("water_intake_adjustment", self.water_intake_adjustment, 0.001, 10.0),
            ("water_diffusion_speed_adjustment", self.water_diffusion_speed_adjustment, 0.001, 2.0),
            ("water_crazyness", self.water_crazyness, 0.0, 2.0),
            ("water_displacement_wave_height_adjustment", self.water_displacement_wave_height_adjustment, 0.0, 10.0),
            ("rain_flood_adjustment", self.rain_flood_adjustment, 0.0, 10000.0),
            ("air_temperature", self.air_temperature, 273.15 - 90.0, 273.15 + 200.0),
            ("water_temperature", self.water_temperature, 273.15, 273.15 + 100.0),
            ("thermal_conductivity_adjustment", self.thermal_conductivity_adjustment, 0.1, 100.0),
            ("heat_dissipation_adjustment", self.heat_dissipation_adjustment, 0.01, 20.0),
            ("ignition_temperature_adjustment", self.ignition_temperature_adjustment, 0.1, 1000.0),
            ("melting_temperature_adjustment", self.melting_temperature_adjustment, 0.1, 1000.0),
            ("combustion_speed_adjustment", self.combustion_speed_adjustment, 0.1, 100.0),
            ("combustion_heat_adjustment", self.combustion_heat_adjustment, 0.1, 100.0),
            ("max_burning_particles", self.max_burning_particles as f32, 10.0, 1000.0),
            ("luminiscence_adjustment", self.luminiscence_adjustment, 0.0, 4.0),
            ("light_spread_adjustment", self.light_spread_adjustment, 0.0, 4.0),
            ("water_pump_power_adjustment", self.water_pump_power_adjustment, 0.0, 20.0),
            ("air_bubbles_density", self.air_bubbles_density, 0.0, 128.0),
            ("anti_matter_bomb_implosion_strength", self.anti_matter_bomb_implosion_strength, 0.1, 10.0),
        ]
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut f32> {
        Some(match name {
            "num_mechanical_dynamics_iterations_adjustment" => &mut self.num_mechanical_dynamics_iterations_adjustment,
            "spring_stiffness_adjustment" => &mut self.spring_stiffness_adjustment,
            "spring_damping_adjustment" => &mut self.spring_damping_adjustment,
            "spring_strength_adjustment" => &mut self.spring_strength_adjustment,
            "global_damping_adjustment" => &mut self.global_damping_adjustment,
            "elasticity_adjustment" => &mut self.elasticity_adjustment,
            "static_friction_adjustment" => &mut self.static_friction_adjustment,
            "kinetic_friction_adjustment" => &mut self.kinetic_friction_adjustment,
            "ocean_floor_elasticity_coefficient" => &mut self.ocean_floor_elasticity_coefficient,
            "ocean_floor_friction_coefficient" => &mut self.ocean_floor_friction_coefficient,
            "ocean_floor_silt_hardness" => &mut self.ocean_floor_silt_hardness,
            "sea_depth" => &mut self.sea_depth,
            "rot_accelerator" => &mut self.rot_accelerator,
            "air_density_adjustment" => &mut self.air_density_adjustment,
            "air_friction_drag_adjustment" => &mut self.air_friction_drag_adjustment,
            "air_pressure_drag_adjustment" => &mut self.air_pressure_drag_adjustment,
            "water_density_adjustment" => &mut self.water_density_adjustment,
            "water_friction_drag_adjustment" => &mut self.water_friction_drag_adjustment,
            "water_pressure_drag_adjustment" => &mut self.water_pressure_drag_adjustment,
            "water_impact_force_adjustment" => &mut self.water_impact_force_adjustment,
            "hydrostatic_pressure_counterbalance_adjustment" => {
                &mut self.hydrostatic_pressure_counterbalance_adjustment
            }
            "static_pressure_force_adjustment" => &mut self.static_pressure_force_adjustment,
            "water_intake_adjustment" => &mut self.water_intake_adjustment,
            "water_diffusion_speed_adjustment" => &mut self.water_diffusion_speed_adjustment,
            "water_crazyness" => &mut self.water_crazyness,
            "water_displacement_wave_height_adjustment" => &mut self.water_displacement_wave_height_adjustment,
            "rain_flood_adjustment" => &mut self.rain_flood_adjustment,
            "air_temperature" => &mut self.air_temperature,
            "water_temperature" => &mut self.water_temperature,
            "thermal_conductivity_adjustment" => &mut self.thermal_conductivity_adjustment,
            "heat_dissipation_adjustment" => &mut self.heat_dissipation_adjustment,
            "ignition_temperature_adjustment" => &mut self.ignition_temperature_adjustment,
            "melting_temperature_adjustment" => &mut self.melting_temperature_adjustment,
            "combustion_speed_adjustment" => &mut self.combustion_speed_adjustment,
            "combustion_heat_adjustment" => &mut self.combustion_heat_adjustment,
            "luminiscence_adjustment" => &mut self.luminiscence_adjustment,
            "light_spread_adjustment" => &mut self.light_spread_adjustment,
            "water_pump_power_adjustment" => &mut self.water_pump_power_adjustment,
            "air_bubbles_density" => &mut self.air_bubbles_density,
            "anti_matter_bomb_implosion_strength" => &mut self.anti_matter_bomb_implosion_strength,
            _ => return None,
        })
    }
}

/// Weather affecting the ship this step.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct StormParameters {
    /// 0.0 = no rain, 1.0 = heaviest rain.
    pub rain_density: f32,
    /// Rain height, in m/h.
    pub rain_quantity: f32,
}

/// Which stress overlay, if any, is being visualized; when active the
/// strain pass records per-point stress.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum StressRenderMode {
    #[default]
    None,
    StressOverlay,
    TensionOverlay,
}

impl StressRenderMode {
    pub fn is_active(self) -> bool {
        self != StressRenderMode::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = SimulationParameters::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.num_mechanical_dynamics_iterations(), 40);
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let params = SimulationParameters::from_json_str(r#"{ "rot_accelerator": 5.0 }"#).unwrap();
        assert_eq!(params.rot_accelerator, 5.0);
        assert_eq!(params.air_bubbles_density, 64.0);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result = SimulationParameters::from_json_str(r#"{ "warp_factor": 9.0 }"#);
        assert!(matches!(result, Err(ParameterError::Json(_))));
    }

    #[test]
    fn test_out_of_range_rejected_and_clamped() {
        let params = SimulationParameters {
            water_crazyness: 7.0,
            ..Default::default()
        };
        match params.validate() {
            Err(ParameterError::OutOfRange { name, .. }) => assert_eq!(name, "water_crazyness"),
            other => panic!("unexpected: {:?}", other),
        }

        let (clamped, violations) = params.clamped();
        assert_eq!(violations.len(), 1);
        assert_eq!(clamped.water_crazyness, 2.0);
        assert!(clamped.validate().is_ok());
    }

    #[test]
    fn test_iteration_count_rounds_and_floors() {
        let params = SimulationParameters {
            num_mechanical_dynamics_iterations_adjustment: 0.5,
            ..Default::default()
        };
        assert_eq!(params.num_mechanical_dynamics_iterations(), 20);
        assert!((params.mechanical_simulation_step_time_duration() - 1.0 / 64.0 / 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_json_roundtrip_keeps_values() {
        let params = SimulationParameters {
            is_ultra_violent_mode: true,
            sea_depth: 120.0,
            ..Default::default()
        };
        let json = params.to_json_string().unwrap();
        let back = SimulationParameters::from_json_str(&json).unwrap();
        assert_eq!(params, back);
    }
}
