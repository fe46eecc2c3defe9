//! HullSim Core - Deformable Ship Physics
//!
//! A ship is a mass-spring network: points joined by springs, with triangles
//! filling the surface between them. Every step relaxes the springs, breaks
//! the ones stretched too far, floods the hull through its damaged points,
//! and propagates heat, fire and electricity.
//!
//! # Architecture
//!
//! Element stores are flat structure-of-arrays containers cross-referencing
//! each other by index:
//! - **Points**: mass, position, water, heat, combustion, ephemeral particles
//! - **Springs**: coefficients, strain state, super triangles
//! - **Triangles**: sub springs and covered springs
//! - **Frontiers**: closed boundary-edge cycles, external and internal
//! - **ElectricalElements**: cables, lamps, pumps, doors and generators
//!
//! The [`ship::Ship`] owns the stores and runs the per-step pipeline. Anything
//! living outside the ship (ocean, floor, sound, NPCs, bombs) is reached
//! through the traits in [`world`], [`events`] and [`collaborators`].
//!
//! # Example
//!
//! ```rust,no_run
//! use hullsim_core::prelude::*;
//!
//! let params = SimulationParameters::default();
//! let mut builder = ShipBuilder::new();
//! let wood = builder.add_material(MaterialPreset::Wood.material());
//! builder.add_grid(20, 6, 1.0, Vec2f::new(-10.0, 0.0), wood);
//!
//! let mut ship = Ship::new(0, &builder, ShipCollaborators::new(CalmSea::default()), &params, 7)
//!     .expect("valid mesh");
//! let threads = ThreadManager::with_available_parallelism().expect("thread pool");
//! let mut perf = PerfStats::new();
//! let mut aabbs = AabbSet::new();
//!
//! // Run simulation
//! for step in 1..=640 {
//!     let t = step as f32 * SIMULATION_STEP_TIME_DURATION;
//!     aabbs.clear();
//!     ship.update(t, &StormParameters::default(), &params, StressRenderMode::None, &mut aabbs, &threads, &mut perf);
//!     ship.update_end();
//! }
//! ```

pub mod builder;
pub mod collaborators;
pub mod electrical;
pub mod error;
pub mod events;
pub mod frontiers;
pub mod perf;
pub mod points;
pub mod ship;
pub mod snapshot;
pub mod springs;
pub mod state_machines;
pub mod threading;
pub mod triangles;
pub mod types;
pub mod world;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::builder::ShipBuilder;
    pub use crate::collaborators::{ExplosionRequest, GadgetHandler, NpcHandler, ShipCollaborators};
    pub use crate::error::{BuildError, InvariantKind, InvariantViolation, SnapshotError};
    pub use crate::events::{EventRecorder, LoggingEventHandler, SimulationEvent, SimulationEventHandler};
    pub use crate::perf::PerfStats;
    pub use crate::ship::{DamageCounters, Interaction, Ship};
    pub use crate::snapshot::{load_snapshot, save_snapshot};
    pub use crate::threading::ThreadManager;
    pub use crate::types::{ElementIndex, ExplosionType, RecordedEvent, ShipId};
    pub use crate::world::{CalmSea, ShipWorld};

    pub use hullsim_logic::constants::world_constants::SIMULATION_STEP_TIME_DURATION;
    pub use hullsim_logic::materials::{ElectricalMaterial, LampBreakage, MaterialPreset};
    pub use hullsim_logic::parameters::{SimulationParameters, StormParameters, StressRenderMode};
    pub use hullsim_logic::vectors::{AabbSet, Vec2f};
}
