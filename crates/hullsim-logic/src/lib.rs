//! Pure math and data for HullSim.
//!
//! This crate holds everything about the ship simulation that does not own
//! simulation state: vector types, interpolation helpers, physical constants,
//! closed-form formulae, tunable parameters and material descriptions.
//! Functions take plain data and return results, so they are unit-testable
//! in isolation from the ship.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`constants`] | World extents, physical properties, low-frequency schedule |
//! | [`formulae`] | Densities, pressures, wind force, damping and strength factors |
//! | [`materials`] | Structural and electrical materials, built-in presets |
//! | [`math`] | Step/mix interpolation and range partitioning |
//! | [`parameters`] | `SimulationParameters` (JSON, validation), storm, stress mode |
//! | [`vectors`] | `Vec2f`, `Aabb`, `AabbSet` |

pub mod constants;
pub mod formulae;
pub mod materials;
pub mod math;
pub mod parameters;
pub mod vectors;
