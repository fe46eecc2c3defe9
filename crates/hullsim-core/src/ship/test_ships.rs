//! Small ships shared by the ship module tests.

use hullsim_logic::materials::MaterialPreset;
use hullsim_logic::parameters::SimulationParameters;
use hullsim_logic::vectors::Vec2f;

use super::Ship;
use crate::builder::ShipBuilder;
use crate::collaborators::ShipCollaborators;
use crate::events::EventRecorder;
use crate::world::CalmSea;

pub(crate) struct TestShip {
    pub ship: Ship,
    pub params: SimulationParameters,
    pub recorder: EventRecorder,
}

pub(crate) fn ship_from(builder: &ShipBuilder) -> TestShip {
    let params = SimulationParameters::default();
    let recorder = EventRecorder::new();
    let collaborators = ShipCollaborators::new(CalmSea::default()).with_events(recorder.clone());
    let ship = Ship::new(0, builder, collaborators, &params, 42).expect("valid test ship");
    TestShip {
        ship,
        params,
        recorder,
    }
}

/// Wooden grid with unit spacing, bottom-left corner at (0, 10), above the sea.
pub(crate) fn grid_ship(cols: usize, rows: usize) -> TestShip {
    let mut builder = ShipBuilder::new();
    let wood = builder.add_material(MaterialPreset::Wood.material());
    builder.add_grid(cols, rows, 1.0, Vec2f::new(0.0, 10.0), wood);
    ship_from(&builder)
}
