//! Save/load of a ship's dynamic state.
//!
//! A snapshot holds per-point dynamics plus which springs and triangles are
//! broken. It does not hold the mesh itself: it is loaded into a ship built
//! from the same mesh, and structural differences are re-applied through
//! the ship's destroy and restore handlers so that every cross reference
//! and frontier stays consistent.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use hullsim_logic::parameters::SimulationParameters;
use hullsim_logic::vectors::Vec2f;

use crate::error::SnapshotError;
use crate::ship::Ship;
use crate::types::SpringDestroyOptions;

/// Version number of the snapshot format (increment when format changes)
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipSnapshot {
    pub version: u32,
    pub simulation_time: f32,
    pub sequence_number: u64,
    /// Raw ship points only; ephemeral particles are not saved.
    pub points: Vec<PointSnapshot>,
    pub deleted_springs: Vec<bool>,
    pub deleted_triangles: Vec<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointSnapshot {
    pub position: Vec2f,
    pub velocity: Vec2f,
    pub water: f32,
    pub water_velocity: Vec2f,
    pub internal_pressure: f32,
    pub temperature: f32,
    pub decay: f32,
}

impl ShipSnapshot {
    pub fn capture(ship: &Ship) -> Self {
        let points = ship.points();
        let springs = ship.springs();
        let triangles = ship.triangles();

        Self {
            version: SNAPSHOT_VERSION,
            simulation_time: ship.current_simulation_time(),
            sequence_number: ship.current_simulation_sequence_number(),
            points: points
                .raw_ship_points()
                .map(|p| PointSnapshot {
                    position: points.position(p),
                    velocity: points.velocity(p),
                    water: points.water(p),
                    water_velocity: points.water_velocity(p),
                    internal_pressure: points.internal_pressure(p),
                    temperature: points.temperature(p),
                    decay: points.decay(p),
                })
                .collect(),
            deleted_springs: (0..springs.element_count()).map(|s| springs.is_deleted(s)).collect(),
            deleted_triangles: (0..triangles.element_count())
                .map(|t| triangles.is_deleted(t))
                .collect(),
        }
    }

    fn check_shape(&self, ship: &Ship) -> Result<(), SnapshotError> {
        let shapes = [
            ("point", ship.points().raw_ship_point_count(), self.points.len()),
            ("spring", ship.springs().element_count(), self.deleted_springs.len()),
            ("triangle", ship.triangles().element_count(), self.deleted_triangles.len()),
        ];
        for (what, expected, found) in shapes {
            if expected != found {
                return Err(SnapshotError::ShapeMismatch { what, expected, found });
            }
        }
        Ok(())
    }

    /// Bring `ship` to this snapshot's state.
    pub fn apply(&self, ship: &mut Ship, params: &SimulationParameters) -> Result<(), SnapshotError> {
        if self.version != SNAPSHOT_VERSION {
            return Err(SnapshotError::VersionMismatch {
                expected: SNAPSHOT_VERSION,
                found: self.version,
            });
        }
        self.check_shape(ship)?;

        // Point state first, so handlers see the saved positions
        for (p, saved) in self.points.iter().enumerate() {
            ship.points.position[p] = saved.position;
            ship.points.velocity[p] = saved.velocity;
            ship.points.water[p] = saved.water;
            ship.points.water_velocity[p] = saved.water_velocity;
            ship.points.internal_pressure[p] = saved.internal_pressure;
            ship.points.temperature[p] = saved.temperature;
            ship.points.decay[p] = saved.decay;
        }
        ship.points.update_water_momenta_from_velocities();

        // Springs come back before the triangles resting on them
        for (s, &deleted) in self.deleted_springs.iter().enumerate() {
            if !deleted && ship.springs.is_deleted(s) {
                ship.restore_spring(s, self.simulation_time);
            }
        }
        for (t, &deleted) in self.deleted_triangles.iter().enumerate() {
            if !deleted && ship.triangles.is_deleted(t) {
                ship.restore_triangle(t, self.simulation_time);
            }
        }

        // Triangles go before the springs under them
        for (t, &deleted) in self.deleted_triangles.iter().enumerate() {
            if deleted && !ship.triangles.is_deleted(t) {
                ship.destroy_triangle(t);
            }
        }
        for (s, &deleted) in self.deleted_springs.iter().enumerate() {
            if deleted && !ship.springs.is_deleted(s) {
                ship.destroy_spring(
                    s,
                    SpringDestroyOptions {
                        fire_break_event: false,
                        destroy_all_triangles: false,
                    },
                    self.simulation_time,
                    params,
                );
            }
        }

        ship.set_clock(self.simulation_time, self.sequence_number);
        ship.frontiers.update_geometry(&ship.points);
        ship.mark_structure_dirty();
        ship.refresh_connectivity();

        log::debug!(
            "Ship {} loaded snapshot at t={:.3} ({} broken springs)",
            ship.id(),
            self.simulation_time,
            ship.damage().broken_springs
        );
        Ok(())
    }
}

/// Save a ship's dynamic state to a writer
pub fn save_snapshot<W: Write>(ship: &Ship, writer: W) -> Result<(), SnapshotError> {
    bincode::serialize_into(writer, &ShipSnapshot::capture(ship))?;
    Ok(())
}

/// Load a snapshot from a reader into a ship built from the same mesh
pub fn load_snapshot<R: Read>(ship: &mut Ship, reader: R, params: &SimulationParameters) -> Result<(), SnapshotError> {
    let snapshot: ShipSnapshot = bincode::deserialize_from(reader)?;
    if snapshot.version != SNAPSHOT_VERSION {
        log::warn!(
            "Snapshot version {} does not match {}, not loading",
            snapshot.version,
            SNAPSHOT_VERSION
        );
    }
    snapshot.apply(ship, params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::ShipBuilder;
    use crate::collaborators::ShipCollaborators;
    use crate::world::CalmSea;
    use hullsim_logic::materials::MaterialPreset;

    fn grid(cols: usize, rows: usize) -> (Ship, SimulationParameters) {
        let params = SimulationParameters::default();
        let mut builder = ShipBuilder::new();
        let wood = builder.add_material(MaterialPreset::Wood.material());
        builder.add_grid(cols, rows, 1.0, Vec2f::new(0.0, 10.0), wood);
        let ship = Ship::new(1, &builder, ShipCollaborators::new(CalmSea::default()), &params, 3).expect("valid grid");
        (ship, params)
    }

    #[test]
    fn test_save_load_roundtrip() {
        let (mut ship, params) = grid(5, 5);
        ship.destroy_at(Vec2f::new(2.0, 12.0), 0.5, 0.25, &params);
        ship.points.water[3] = 0.4;
        ship.points.temperature[7] = 400.0;
        ship.set_clock(0.25, 16);

        let mut buffer = Vec::new();
        save_snapshot(&ship, &mut buffer).expect("Save failed");

        let (mut loaded, _) = grid(5, 5);
        load_snapshot(&mut loaded, &buffer[..], &params).expect("Load failed");

        assert_eq!(loaded.current_simulation_time(), 0.25);
        assert_eq!(loaded.current_simulation_sequence_number(), 16);
        assert_eq!(loaded.points().water(3), 0.4);
        assert_eq!(loaded.points().temperature(7), 400.0);
        for s in 0..ship.springs().element_count() {
            assert_eq!(loaded.springs().is_deleted(s), ship.springs().is_deleted(s));
        }
        for t in 0..ship.triangles().element_count() {
            assert_eq!(loaded.triangles().is_deleted(t), ship.triangles().is_deleted(t));
        }
        assert_eq!(loaded.frontiers().canonical_cycles(), ship.frontiers().canonical_cycles());
        assert_eq!(loaded.verify_invariants(), Ok(()));
    }

    #[test]
    fn test_loading_repairs_what_the_snapshot_has_intact() {
        let (pristine, params) = grid(4, 4);
        let mut buffer = Vec::new();
        save_snapshot(&pristine, &mut buffer).expect("Save failed");

        let (mut broken, _) = grid(4, 4);
        broken.destroy_at(Vec2f::new(1.0, 11.0), 0.5, 0.0, &params);
        assert!(!broken.damage().is_pristine());

        load_snapshot(&mut broken, &buffer[..], &params).expect("Load failed");
        assert_eq!(broken.triangles().live_count(), pristine.triangles().live_count());
        assert_eq!(broken.frontiers().canonical_cycles(), pristine.frontiers().canonical_cycles());
        assert_eq!(broken.verify_invariants(), Ok(()));
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let (small, params) = grid(3, 3);
        let mut buffer = Vec::new();
        save_snapshot(&small, &mut buffer).expect("Save failed");

        let (mut big, _) = grid(4, 4);
        let err = load_snapshot(&mut big, &buffer[..], &params).unwrap_err();
        assert!(matches!(err, SnapshotError::ShapeMismatch { what: "point", expected: 16, found: 9 }));
    }

    #[test]
    fn test_version_mismatch_is_rejected() {
        let (ship, params) = grid(3, 3);
        let mut snapshot = ShipSnapshot::capture(&ship);
        snapshot.version = SNAPSHOT_VERSION + 1;
        let buffer = bincode::serialize(&snapshot).expect("serialize");

        let (mut target, _) = grid(3, 3);
        let err = load_snapshot(&mut target, &buffer[..], &params).unwrap_err();
        assert!(matches!(err, SnapshotError::VersionMismatch { expected: 1, found: 2 }));
    }
}
