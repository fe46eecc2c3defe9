//! Simulation event sink.
//!
//! The ship reports noteworthy happenings (breaks, water, sinking, repairs,
//! fire, lamps) through [`SimulationEventHandler`]. Every method has a no-op
//! default so handlers only implement what they care about.

use std::sync::{Arc, Mutex};

use hullsim_logic::materials::StructuralMaterial;

use crate::types::{ExplosionType, ShipId};

pub trait SimulationEventHandler: Send {
    fn on_break(&mut self, _material: &StructuralMaterial, _is_underwater: bool, _size: u32) {}
    fn on_stress(&mut self, _material: &StructuralMaterial, _is_underwater: bool, _size: u32) {}
    fn on_destroy(&mut self, _material: &StructuralMaterial, _is_underwater: bool, _size: u32) {}

    fn on_water_taken(&mut self, _quantity: f32) {}
    fn on_water_splashed(&mut self, _quantity: f32) {}
    fn on_water_displaced(&mut self, _quantity: f32) {}

    fn on_sinking_begin(&mut self, _ship: ShipId) {}
    fn on_sinking_end(&mut self, _ship: ShipId) {}

    fn on_spring_repaired(&mut self, _material: &StructuralMaterial, _is_underwater: bool, _size: u32) {}
    fn on_triangle_repaired(&mut self, _material: &StructuralMaterial, _is_underwater: bool, _size: u32) {}
    fn on_ship_repaired(&mut self, _ship: ShipId) {}

    fn on_watertight_door_opened(&mut self, _is_underwater: bool, _size: u32) {}
    fn on_watertight_door_closed(&mut self, _is_underwater: bool, _size: u32) {}

    fn on_static_pressure_updated(&mut self, _net_force: f32, _complexity: f32) {}

    fn on_lamp_broken(&mut self, _is_underwater: bool, _size: u32) {}
    fn on_lamp_exploded(&mut self, _is_underwater: bool, _size: u32) {}
    fn on_lamp_imploded(&mut self, _is_underwater: bool, _size: u32) {}

    fn on_combustion_begin(&mut self) {}
    fn on_combustion_end(&mut self) {}
    fn on_combustion_smothered(&mut self) {}
    fn on_combustion_explosion(&mut self, _is_underwater: bool, _size: u32) {}
    fn on_explosion_started(&mut self, _kind: ExplosionType) {}

    fn on_air_bubble_surfaced(&mut self, _size: u32) {}
}

/// Handler that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventHandler;

impl SimulationEventHandler for NullEventHandler {}

/// One recorded simulation event.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationEvent {
    Break { material: String, is_underwater: bool },
    Stress { material: String, is_underwater: bool },
    Destroy { material: String, is_underwater: bool },
    WaterTaken(f32),
    WaterSplashed(f32),
    WaterDisplaced(f32),
    SinkingBegin(ShipId),
    SinkingEnd(ShipId),
    SpringRepaired { material: String },
    TriangleRepaired { material: String },
    ShipRepaired(ShipId),
    WatertightDoorOpened,
    WatertightDoorClosed,
    StaticPressureUpdated { net_force: f32, complexity: f32 },
    LampBroken,
    LampExploded,
    LampImploded,
    CombustionBegin,
    CombustionEnd,
    CombustionSmothered,
    CombustionExplosion,
    ExplosionStarted(ExplosionType),
    AirBubbleSurfaced,
}

/// Records every event into a shared list; clones share the same list, so a
/// test can keep one clone and hand the other to the ship.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<SimulationEvent>>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SimulationEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, predicate: impl Fn(&SimulationEvent) -> bool) -> usize {
        self.events
            .lock()
            .map(|e| e.iter().filter(|ev| predicate(ev)).count())
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut e) = self.events.lock() {
            e.clear();
        }
    }

    fn push(&self, event: SimulationEvent) {
        if let Ok(mut e) = self.events.lock() {
            e.push(event);
        }
    }
}

impl SimulationEventHandler for EventRecorder {
    fn on_break(&mut self, material: &StructuralMaterial, is_underwater: bool, _size: u32) {
        self.push(SimulationEvent::Break { material: material.name.clone(), is_underwater });
    }

    fn on_stress(&mut self, material: &StructuralMaterial, is_underwater: bool, _size: u32) {
        self.push(SimulationEvent::Stress { material: material.name.clone(), is_underwater });
    }

    fn on_destroy(&mut self, material: &StructuralMaterial, is_underwater: bool, _size: u32) {
        self.push(SimulationEvent::Destroy { material: material.name.clone(), is_underwater });
    }

    fn on_water_taken(&mut self, quantity: f32) {
        self.push(SimulationEvent::WaterTaken(quantity));
    }

    fn on_water_splashed(&mut self, quantity: f32) {
        self.push(SimulationEvent::WaterSplashed(quantity));
    }

    fn on_water_displaced(&mut self, quantity: f32) {
        self.push(SimulationEvent::WaterDisplaced(quantity));
    }

    fn on_sinking_begin(&mut self, ship: ShipId) {
        self.push(SimulationEvent::SinkingBegin(ship));
    }

    fn on_sinking_end(&mut self, ship: ShipId) {
        self.push(SimulationEvent::SinkingEnd(ship));
    }

    fn on_spring_repaired(&mut self, material: &StructuralMaterial, _is_underwater: bool, _size: u32) {
        self.push(SimulationEvent::SpringRepaired { material: material.name.clone() });
    }

    fn on_triangle_repaired(&mut self, material: &StructuralMaterial, _is_underwater: bool, _size: u32) {
        self.push(SimulationEvent::TriangleRepaired { material: material.name.clone() });
    }

    fn on_ship_repaired(&mut self, ship: ShipId) {
        self.push(SimulationEvent::ShipRepaired(ship));
    }

    fn on_watertight_door_opened(&mut self, _is_underwater: bool, _size: u32) {
        self.push(SimulationEvent::WatertightDoorOpened);
    }

    fn on_watertight_door_closed(&mut self, _is_underwater: bool, _size: u32) {
        self.push(SimulationEvent::WatertightDoorClosed);
    }

    fn on_static_pressure_updated(&mut self, net_force: f32, complexity: f32) {
        self.push(SimulationEvent::StaticPressureUpdated { net_force, complexity });
    }

    fn on_lamp_broken(&mut self, _is_underwater: bool, _size: u32) {
        self.push(SimulationEvent::LampBroken);
    }

    fn on_lamp_exploded(&mut self, _is_underwater: bool, _size: u32) {
        self.push(SimulationEvent::LampExploded);
    }

    fn on_lamp_imploded(&mut self, _is_underwater: bool, _size: u32) {
        self.push(SimulationEvent::LampImploded);
    }

    fn on_combustion_begin(&mut self) {
        self.push(SimulationEvent::CombustionBegin);
    }

    fn on_combustion_end(&mut self) {
        self.push(SimulationEvent::CombustionEnd);
    }

    fn on_combustion_smothered(&mut self) {
        self.push(SimulationEvent::CombustionSmothered);
    }

    fn on_combustion_explosion(&mut self, _is_underwater: bool, _size: u32) {
        self.push(SimulationEvent::CombustionExplosion);
    }

    fn on_explosion_started(&mut self, kind: ExplosionType) {
        self.push(SimulationEvent::ExplosionStarted(kind));
    }

    fn on_air_bubble_surfaced(&mut self, _size: u32) {
        self.push(SimulationEvent::AirBubbleSurfaced);
    }
}

/// Forwards every event to `log::debug!`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventHandler;

impl SimulationEventHandler for LoggingEventHandler {
    fn on_break(&mut self, material: &StructuralMaterial, is_underwater: bool, size: u32) {
        log::debug!("Break: {} x{} (underwater={})", material.name, size, is_underwater);
    }

    fn on_stress(&mut self, material: &StructuralMaterial, is_underwater: bool, size: u32) {
        log::debug!("Stress: {} x{} (underwater={})", material.name, size, is_underwater);
    }

    fn on_destroy(&mut self, material: &StructuralMaterial, is_underwater: bool, size: u32) {
        log::debug!("Destroy: {} x{} (underwater={})", material.name, size, is_underwater);
    }

    fn on_water_taken(&mut self, quantity: f32) {
        log::debug!("Water taken: {:.4}", quantity);
    }

    fn on_water_splashed(&mut self, quantity: f32) {
        log::debug!("Water splashed: {:.4}", quantity);
    }

    fn on_water_displaced(&mut self, quantity: f32) {
        log::debug!("Water displaced: {:.4}", quantity);
    }

    fn on_sinking_begin(&mut self, ship: ShipId) {
        log::debug!("Ship {} sinking", ship);
    }

    fn on_sinking_end(&mut self, ship: ShipId) {
        log::debug!("Ship {} stopped sinking", ship);
    }

    fn on_spring_repaired(&mut self, material: &StructuralMaterial, _is_underwater: bool, size: u32) {
        log::debug!("Spring repaired: {} x{}", material.name, size);
    }

    fn on_triangle_repaired(&mut self, material: &StructuralMaterial, _is_underwater: bool, size: u32) {
        log::debug!("Triangle repaired: {} x{}", material.name, size);
    }

    fn on_ship_repaired(&mut self, ship: ShipId) {
        log::debug!("Ship {} repaired", ship);
    }

    fn on_watertight_door_opened(&mut self, _is_underwater: bool, size: u32) {
        log::debug!("Watertight door opened x{}", size);
    }

    fn on_watertight_door_closed(&mut self, _is_underwater: bool, size: u32) {
        log::debug!("Watertight door closed x{}", size);
    }

    fn on_static_pressure_updated(&mut self, net_force: f32, complexity: f32) {
        log::debug!("Static pressure: net force {:.3}, complexity {:.3}", net_force, complexity);
    }

    fn on_lamp_broken(&mut self, _is_underwater: bool, size: u32) {
        log::debug!("Lamp broken x{}", size);
    }

    fn on_lamp_exploded(&mut self, _is_underwater: bool, size: u32) {
        log::debug!("Lamp exploded x{}", size);
    }

    fn on_lamp_imploded(&mut self, _is_underwater: bool, size: u32) {
        log::debug!("Lamp imploded x{}", size);
    }

    fn on_combustion_begin(&mut self) {
        log::debug!("Combustion begin");
    }

    fn on_combustion_end(&mut self) {
        log::debug!("Combustion end");
    }

    fn on_combustion_smothered(&mut self) {
        log::debug!("Combustion smothered");
    }

    fn on_combustion_explosion(&mut self, is_underwater: bool, size: u32) {
        log::debug!("Combustion explosion x{} (underwater={})", size, is_underwater);
    }

    fn on_explosion_started(&mut self, kind: ExplosionType) {
        log::debug!("Explosion started: {:?}", kind);
    }

    fn on_air_bubble_surfaced(&mut self, size: u32) {
        log::debug!("Air bubble surfaced x{}", size);
    }
}
