//! Narrow interfaces to the subsystems living next to a ship.
//!
//! NPCs and gadgets (bombs and the like) are owned by the world; the ship
//! only notifies them of structural changes. Gadgets may also ask the ship
//! to start explosions.

use hullsim_logic::parameters::SimulationParameters;
use hullsim_logic::vectors::Vec2f;

use crate::events::{NullEventHandler, SimulationEventHandler};
use crate::types::{ElementIndex, ExplosionType, PlaneId, ShipId};
use crate::world::ShipWorld;

/// Explosion a gadget wants the ship to run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExplosionRequest {
    pub plane_id: PlaneId,
    pub center: Vec2f,
    pub blast_force: f32,
    pub blast_force_radius: f32,
    /// KJ/s
    pub blast_heat: f32,
    pub blast_heat_radius: f32,
    pub kind: ExplosionType,
}

pub trait NpcHandler: Send {
    fn on_ship_connectivity_changed(&mut self, _ship: ShipId) {}
    fn on_ship_started_sinking(&mut self, _ship: ShipId, _simulation_time: f32) {}
    fn on_ship_repaired(&mut self, _ship: ShipId, _simulation_time: f32) {}
    fn on_ship_triangle_destroyed(&mut self, _ship: ShipId, _triangle: ElementIndex) {}

    fn apply_anti_matter_bomb_preimplosion(&mut self, _ship: ShipId, _center: Vec2f, _radius: f32, _thickness: f32) {}
    fn apply_anti_matter_bomb_implosion(&mut self, _ship: ShipId, _center: Vec2f, _progress: f32) {}
    fn apply_anti_matter_bomb_explosion(&mut self, _ship: ShipId, _center: Vec2f) {}
}

pub trait GadgetHandler: Send {
    fn on_point_detached(&mut self, _point: ElementIndex, _simulation_time: f32) {}
    fn on_spring_destroyed(&mut self, _spring: ElementIndex, _simulation_time: f32) {}
    fn on_electric_spark(&mut self, _point: ElementIndex, _simulation_time: f32) {}

    /// Advance gadgets by one step; returns the explosions to start.
    fn update(&mut self, _simulation_time: f32, _params: &SimulationParameters) -> Vec<ExplosionRequest> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoNpcs;

impl NpcHandler for NoNpcs {}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoGadgets;

impl GadgetHandler for NoGadgets {}

/// Everything a ship talks to besides itself.
pub struct ShipCollaborators {
    pub world: Box<dyn ShipWorld>,
    pub events: Box<dyn SimulationEventHandler>,
    pub npcs: Box<dyn NpcHandler>,
    pub gadgets: Box<dyn GadgetHandler>,
}

impl ShipCollaborators {
    pub fn new(world: impl ShipWorld + 'static) -> Self {
        Self {
            world: Box::new(world),
            events: Box::new(NullEventHandler),
            npcs: Box::new(NoNpcs),
            gadgets: Box::new(NoGadgets),
        }
    }

    pub fn with_events(mut self, events: impl SimulationEventHandler + 'static) -> Self {
        self.events = Box::new(events);
        self
    }

    pub fn with_npcs(mut self, npcs: impl NpcHandler + 'static) -> Self {
        self.npcs = Box::new(npcs);
        self
    }

    pub fn with_gadgets(mut self, gadgets: impl GadgetHandler + 'static) -> Self {
        self.gadgets = Box::new(gadgets);
        self
    }
}
