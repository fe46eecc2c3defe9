//! Short-lived, time-progressing effects owned by a ship.
//!
//! The set of variants is closed; the ship matches on [`StateMachine`] and
//! advances each one per step until its progress passes 1.0.

use hullsim_logic::constants::interaction_constants::{
    EXPLOSION_BLAST_FRACTION, EXPLOSION_DURATION, EXPLOSION_MAX_DISPLACEMENT_DEPTH,
};
use hullsim_logic::vectors::Vec2f;

use crate::types::{ExplosionType, PlaneId};

#[derive(Debug, Clone, PartialEq)]
pub enum StateMachine {
    Explosion(ExplosionStateMachine),
}

impl StateMachine {
    pub fn current_progress(&self) -> f32 {
        match self {
            StateMachine::Explosion(e) => e.current_progress,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExplosionStateMachine {
    pub start_time: f32,
    pub plane_id: PlaneId,
    pub center: Vec2f,
    pub blast_force: f32,
    pub blast_radius: f32,
    /// KJ/s
    pub blast_heat: f32,
    pub blast_heat_radius: f32,
    pub kind: ExplosionType,
    pub personality_seed: f32,
    pub is_blasting: bool,
    pub is_first_frame: bool,
    pub current_progress: f32,
}

impl ExplosionStateMachine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        start_time: f32,
        plane_id: PlaneId,
        center: Vec2f,
        blast_force: f32,
        blast_radius: f32,
        blast_heat: f32,
        blast_heat_radius: f32,
        kind: ExplosionType,
        personality_seed: f32,
    ) -> Self {
        Self {
            start_time,
            plane_id,
            center,
            blast_force,
            blast_radius,
            blast_heat,
            blast_heat_radius,
            kind,
            personality_seed,
            is_blasting: true,
            is_first_frame: true,
            current_progress: 0.0,
        }
    }

    /// Update progress; returns false once the explosion is over.
    pub fn advance(&mut self, current_time: f32) -> bool {
        self.current_progress = (current_time - self.start_time) / EXPLOSION_DURATION;
        self.current_progress <= 1.0
    }

    /// Progress of the blast phase; the blast is over past 1.0.
    pub fn blast_progress(&self) -> f32 {
        self.current_progress / EXPLOSION_BLAST_FRACTION
    }

    /// Radius reached by the blast so far.
    pub fn current_blast_radius(&self) -> f32 {
        self.blast_radius * self.blast_progress().min(1.0)
    }
}

/// Lateral radius and signed height of the ocean surface bump raised by an
/// explosion at `depth` (positive underwater). Deeper explosions raise
/// smaller bumps, and none past the maximum displacement depth.
pub fn explosion_ocean_displacement(depth: f32, blast_radius: f32) -> (f32, f32) {
    const MIN_RADIUS: f32 = 1.0;
    const MAX_DISPLACEMENT: f32 = 6.0;
    const MAX_DEPTH: f32 = EXPLOSION_MAX_DISPLACEMENT_DEPTH;

    let abs_depth = depth.abs();
    let max_radius = 20.0 * blast_radius;
    let radius = max_radius + abs_depth / MAX_DEPTH * (MIN_RADIUS - max_radius);

    // f(0) = max, f(MAX_DEPTH) = 0, f'(MAX_DEPTH) = 0
    let a = -MAX_DISPLACEMENT / (MAX_DEPTH * MAX_DEPTH);
    let b = 2.0 * MAX_DISPLACEMENT / MAX_DEPTH;
    let c = -MAX_DISPLACEMENT;
    let magnitude = if abs_depth > MAX_DEPTH {
        0.0
    } else {
        a * abs_depth * abs_depth + b * abs_depth + c
    };
    let sign = if depth <= 0.0 { 1.0 } else { -1.0 };

    (radius, magnitude * sign)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn explosion() -> ExplosionStateMachine {
        ExplosionStateMachine::new(10.0, 0, Vec2f::ZERO, 1000.0, 8.0, 100.0, 8.0, ExplosionType::Combustion, 0.5)
    }

    #[test]
    fn test_progress_and_expiry() {
        let mut sm = explosion();
        assert!(sm.advance(10.0));
        assert_eq!(sm.current_progress, 0.0);
        assert_eq!(sm.current_blast_radius(), 0.0);

        assert!(sm.advance(10.125));
        assert!((sm.current_blast_radius() - 4.0).abs() < 1e-5);

        assert!(sm.advance(10.5));
        assert!(sm.blast_progress() > 1.0);
        assert_eq!(sm.current_blast_radius(), 8.0);

        assert!(!sm.advance(11.01));
    }

    #[test]
    fn test_ocean_displacement_fades_with_depth() {
        let (radius_surface, d_surface) = explosion_ocean_displacement(0.0, 2.0);
        let (radius_deep, d_deep) = explosion_ocean_displacement(10.0, 2.0);
        let (_, d_too_deep) = explosion_ocean_displacement(30.0, 2.0);

        assert_eq!(radius_surface, 40.0);
        assert!(radius_deep < radius_surface);
        assert!((d_surface + 6.0).abs() < 1e-5);
        // Underwater flips the sign
        assert!(d_deep > 0.0);
        assert_eq!(d_too_deep, 0.0);

        let sm = StateMachine::Explosion(explosion());
        assert_eq!(sm.current_progress(), 0.0);
    }
}
