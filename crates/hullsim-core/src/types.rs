//! Index types and small enums shared by the element stores.

use serde::{Deserialize, Serialize};

use hullsim_logic::vectors::Vec2f;

/// Index of a point, spring, triangle or electrical element in its store.
pub type ElementIndex = usize;
pub type ElementCount = usize;

pub type ShipId = u32;

/// Connected-component tag; higher planes are drawn (and lit) on top.
pub type PlaneId = u32;

/// Slot of a frontier in the frontier store.
pub type FrontierId = usize;

/// A spring as seen from one of its endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectedSpring {
    pub spring: ElementIndex,
    pub other_endpoint: ElementIndex,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrontierType {
    /// Outer boundary of a connected structure.
    External,
    /// Boundary of a cavity inside a structure.
    Internal,
}

/// What an ephemeral point slot currently hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EphemeralType {
    #[default]
    None,
    AirBubble,
    Debris,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExplosionType {
    Combustion,
    Deflagration,
    Sodium,
}

/// Options for destroying a spring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpringDestroyOptions {
    /// Fire `on_break` for the spring.
    pub fire_break_event: bool,
    /// Destroy every triangle touching either endpoint, rather than only the
    /// triangles having both endpoints.
    pub destroy_all_triangles: bool,
}

/// Why an electrical element is being destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElectricalDestroyReason {
    /// Destroyed along with its point.
    Other,
    /// Removed without any event.
    SilentRemoval,
    LampBroken,
    LampExploded,
    LampImploded,
}

/// Structural mutation that can be recorded and replayed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum RecordedEvent {
    PointDetachForDestroy {
        point: ElementIndex,
        velocity: Vec2f,
        simulation_time: f32,
    },
}
