//! Structural and electrical material descriptions.
//!
//! Materials are plain data; the ship copies the values it needs into its
//! per-point and per-spring buffers at construction. A handful of presets
//! cover the materials used by the harness and the tests.

use serde::{Deserialize, Serialize};

use crate::constants::physics_constants::AIR_MASS;

/// What happens when a material reaches its ignition temperature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum CombustionType {
    /// Burns, heating and decaying its neighbors.
    #[default]
    Combustion,
    /// Explodes once.
    Explosion,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StructuralMaterial {
    pub name: String,

    // Mechanics
    pub strength: f32,
    /// Kg
    pub nominal_mass: f32,
    pub density: f32,
    /// Fraction of the particle volume that displaces water; hull is usually 0.0.
    pub buoyancy_volume_fill: f32,
    pub stiffness: f32,
    /// Fraction of the breaking elongation above which a spring counts as stressed.
    pub strain_threshold_fraction: f32,
    pub elasticity_coefficient: f32,
    pub kinetic_friction_coefficient: f32,
    pub static_friction_coefficient: f32,

    // Water
    pub is_hull: bool,
    pub water_intake: f32,
    pub water_diffusion_speed: f32,
    pub water_retention: f32,
    pub rust_receptivity: f32,

    // Heat
    /// K
    pub ignition_temperature: f32,
    /// K
    pub melting_temperature: f32,
    /// W/(m*K)
    pub thermal_conductivity: f32,
    /// 1/K
    pub thermal_expansion_coefficient: f32,
    /// J/(Kg*K)
    pub specific_heat: f32,
    pub combustion_type: CombustionType,
    /// KN
    pub explosive_combustion_force: f32,
    /// m
    pub explosive_combustion_radius: f32,

    // Misc
    pub wind_receptivity: f32,
    pub is_rope: bool,
}

impl Default for StructuralMaterial {
    fn default() -> Self {
        Self {
            name: String::from("Generic"),
            strength: 0.5,
            nominal_mass: 500.0,
            density: 1.0,
            buoyancy_volume_fill: 1.0,
            stiffness: 1.0,
            strain_threshold_fraction: 0.5,
            elasticity_coefficient: 0.5,
            kinetic_friction_coefficient: 0.25,
            static_friction_coefficient: 0.25,
            is_hull: false,
            water_intake: 1.0,
            water_diffusion_speed: 0.5,
            water_retention: 0.05,
            rust_receptivity: 1.0,
            ignition_temperature: 2000.0,
            melting_temperature: 2000.0,
            thermal_conductivity: 50.0,
            thermal_expansion_coefficient: 0.0,
            specific_heat: 100.0,
            combustion_type: CombustionType::Combustion,
            explosive_combustion_force: 1.0,
            explosive_combustion_radius: 0.0,
            wind_receptivity: 0.0,
            is_rope: false,
        }
    }
}

impl StructuralMaterial {
    /// Kg
    pub fn mass(&self) -> f32 {
        self.nominal_mass * self.density
    }

    /// J/K
    pub fn heat_capacity(&self) -> f32 {
        self.specific_heat * self.mass()
    }

    pub fn water_restitution(&self) -> f32 {
        1.0 - self.water_retention
    }
}

/// Built-in structural materials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MaterialPreset {
    IronHull = 0,
    Steel = 1,
    Wood = 2,
    Rope = 3,
    Glass = 4,
    Gunpowder = 5,
    Air = 6,
}

impl MaterialPreset {
    pub fn material(&self) -> StructuralMaterial {
        match self {
            Self::IronHull => StructuralMaterial {
                name: String::from("Iron Hull"),
                strength: 0.75,
                nominal_mass: 750.0,
                buoyancy_volume_fill: 0.0,
                is_hull: true,
                elasticity_coefficient: 0.3,
                kinetic_friction_coefficient: 0.2,
                static_friction_coefficient: 0.3,
                ignition_temperature: 1811.0,
                melting_temperature: 1811.0,
                thermal_conductivity: 80.0,
                thermal_expansion_coefficient: 0.000012,
                specific_heat: 449.0,
                ..Default::default()
            },
            Self::Steel => StructuralMaterial {
                name: String::from("Steel"),
                strength: 0.6,
                nominal_mass: 700.0,
                elasticity_coefficient: 0.3,
                ignition_temperature: 1700.0,
                melting_temperature: 1700.0,
                thermal_conductivity: 45.0,
                thermal_expansion_coefficient: 0.000012,
                specific_heat: 490.0,
                ..Default::default()
            },
            Self::Wood => StructuralMaterial {
                name: String::from("Wood"),
                strength: 0.35,
                nominal_mass: 500.0,
                density: 0.75,
                water_diffusion_speed: 0.3,
                water_retention: 0.2,
                rust_receptivity: 0.0,
                ignition_temperature: 573.15,
                melting_temperature: 1000.0,
                thermal_conductivity: 5.0,
                thermal_expansion_coefficient: 0.00003,
                specific_heat: 1700.0,
                wind_receptivity: 0.05,
                ..Default::default()
            },
            Self::Rope => StructuralMaterial {
                name: String::from("Rope"),
                strength: 0.9,
                nominal_mass: 200.0,
                stiffness: 0.6,
                rust_receptivity: 0.0,
                ignition_temperature: 523.15,
                melting_temperature: 800.0,
                thermal_conductivity: 2.0,
                specific_heat: 1300.0,
                wind_receptivity: 0.5,
                is_rope: true,
                ..Default::default()
            },
            Self::Glass => StructuralMaterial {
                name: String::from("Glass"),
                strength: 0.1,
                nominal_mass: 2500.0,
                density: 0.4,
                buoyancy_volume_fill: 0.0,
                is_hull: true,
                rust_receptivity: 0.0,
                ignition_temperature: 1900.0,
                melting_temperature: 1900.0,
                thermal_conductivity: 1.0,
                specific_heat: 840.0,
                ..Default::default()
            },
            Self::Gunpowder => StructuralMaterial {
                name: String::from("Gunpowder"),
                strength: 0.2,
                nominal_mass: 1700.0,
                rust_receptivity: 0.0,
                ignition_temperature: 700.0,
                melting_temperature: 1500.0,
                thermal_conductivity: 10.0,
                specific_heat: 900.0,
                combustion_type: CombustionType::Explosion,
                explosive_combustion_force: 5.0,
                explosive_combustion_radius: 4.0,
                ..Default::default()
            },
            Self::Air => StructuralMaterial {
                name: String::from("Air"),
                strength: 0.0,
                nominal_mass: AIR_MASS,
                water_intake: 0.0,
                water_diffusion_speed: 0.0,
                water_retention: 0.0,
                rust_receptivity: 0.0,
                ignition_temperature: 10000.0,
                melting_temperature: 10000.0,
                thermal_conductivity: 0.03,
                thermal_expansion_coefficient: 0.0034,
                specific_heat: 1000.0,
                wind_receptivity: 1.0,
                ..Default::default()
            },
        }
    }

    pub fn all() -> &'static [MaterialPreset] {
        &[
            Self::IronHull,
            Self::Steel,
            Self::Wood,
            Self::Rope,
            Self::Glass,
            Self::Gunpowder,
            Self::Air,
        ]
    }
}

/// Kinds of electrical element a point may host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElectricalKind {
    Cable,
    Lamp,
    WaterPump,
    WatertightDoor,
    Generator,
}

/// How a lamp fails when it breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LampBreakage {
    #[default]
    Break,
    Explosion,
    Implosion,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ElectricalMaterial {
    pub name: String,
    pub kind: ElectricalKind,
    pub conducts_electricity: bool,

    // Lamps
    /// 0.0..=1.0
    pub luminiscence: f32,
    /// m
    pub light_spread: f32,
    pub lamp_breakage: LampBreakage,
    /// K; lamps above this temperature break.
    pub max_operating_temperature: f32,

    // Pumps
    /// Signed: positive pumps water in, negative pumps it out.
    pub water_pump_nominal_force: f32,
}

impl Default for ElectricalMaterial {
    fn default() -> Self {
        Self {
            name: String::from("Cable"),
            kind: ElectricalKind::Cable,
            conducts_electricity: true,
            luminiscence: 0.0,
            light_spread: 0.0,
            lamp_breakage: LampBreakage::Break,
            max_operating_temperature: 1000.0,
            water_pump_nominal_force: 0.0,
        }
    }
}

impl ElectricalMaterial {
    pub fn cable() -> Self {
        Self::default()
    }

    pub fn lamp(luminiscence: f32, light_spread: f32, lamp_breakage: LampBreakage) -> Self {
        Self {
            name: String::from("Lamp"),
            kind: ElectricalKind::Lamp,
            luminiscence,
            light_spread,
            lamp_breakage,
            max_operating_temperature: 573.15,
            ..Default::default()
        }
    }

    pub fn water_pump(nominal_force: f32) -> Self {
        Self {
            name: String::from("Water Pump"),
            kind: ElectricalKind::WaterPump,
            water_pump_nominal_force: nominal_force,
            ..Default::default()
        }
    }

    pub fn watertight_door() -> Self {
        Self {
            name: String::from("Watertight Door"),
            kind: ElectricalKind::WatertightDoor,
            ..Default::default()
        }
    }

    pub fn generator() -> Self {
        Self {
            name: String::from("Generator"),
            kind: ElectricalKind::Generator,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_quantities() {
        let m = MaterialPreset::Wood.material();
        assert!((m.mass() - 375.0).abs() < 1e-3);
        assert!((m.heat_capacity() - 1700.0 * 375.0).abs() < 1.0);
        assert!((m.water_restitution() - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_presets_are_sane() {
        for preset in MaterialPreset::all() {
            let m = preset.material();
            assert!(m.mass() > 0.0, "{}", m.name);
            assert!(m.specific_heat > 0.0, "{}", m.name);
            assert!(m.water_retention >= 0.0 && m.water_retention <= 1.0, "{}", m.name);
        }
        assert!(MaterialPreset::IronHull.material().is_hull);
        assert!(MaterialPreset::Rope.material().is_rope);
        assert_eq!(MaterialPreset::Gunpowder.material().combustion_type, CombustionType::Explosion);
    }

    #[test]
    fn test_material_from_json_with_defaults() {
        let m: StructuralMaterial = serde_json::from_str(r#"{ "name": "Lead", "nominal_mass": 11000.0 }"#).unwrap();
        assert_eq!(m.name, "Lead");
        assert_eq!(m.nominal_mass, 11000.0);
        assert_eq!(m.strain_threshold_fraction, 0.5);
    }
}
