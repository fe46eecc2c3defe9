//! The world as seen by a ship: ocean surface, ocean floor and wind.
//!
//! The ship only queries the world through [`ShipWorld`]; [`CalmSea`] is a
//! flat-surface implementation used by tests and the harness.

use hullsim_logic::constants::world_constants::HALF_MAX_WORLD_WIDTH;
use hullsim_logic::vectors::Vec2f;

/// Localized wind gust, e.g. from a storm cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadialWindField {
    pub source_pos: Vec2f,
    pub pre_front_radius: f32,
    pub pre_front_wind_force_magnitude: f32,
    pub main_front_radius: f32,
    pub main_front_wind_force_magnitude: f32,
}

/// Queries the ship makes of the world each step.
pub trait ShipWorld: Send + Sync {
    /// Height of the ocean surface at `x`.
    fn height_at(&self, x: f32) -> f32;

    /// Depth below the ocean surface; positive when underwater.
    fn depth(&self, position: Vec2f) -> f32 {
        self.height_at(position.x) - position.y
    }

    fn is_underwater(&self, position: Vec2f) -> bool {
        self.depth(position) > 0.0
    }

    /// Raise (positive) or lower the ocean surface at `x`.
    fn displace_ocean_surface_at(&mut self, x: f32, amount: f32);

    /// Wind speed, in km/h.
    fn current_wind_speed(&self) -> Vec2f;

    fn current_radial_wind_field(&self) -> Option<RadialWindField>;

    /// Ocean floor height at `x` and its cell index, if `y` is beneath it.
    fn ocean_floor_height_if_underneath(&self, x: f32, y: f32) -> Option<(f32, usize)>;

    /// Unit normal of the ocean floor in the given cell, pointing up.
    fn ocean_floor_normal_at(&self, cell: usize) -> Vec2f;
}

/// Flat sea with a flat or uniformly sloped floor.
#[derive(Debug, Clone)]
pub struct CalmSea {
    pub surface_height: f32,
    pub sea_depth: f32,
    /// Floor rise per unit of x.
    pub floor_slope: f32,
    /// km/h
    pub wind_speed: Vec2f,
    pub radial_wind_field: Option<RadialWindField>,
    total_displacement: f32,
    displacement_count: usize,
}

impl CalmSea {
    /// Width of one ocean floor cell.
    pub const FLOOR_CELL_WIDTH: f32 = 2.0;

    pub fn new(sea_depth: f32) -> Self {
        Self {
            surface_height: 0.0,
            sea_depth,
            floor_slope: 0.0,
            wind_speed: Vec2f::ZERO,
            radial_wind_field: None,
            total_displacement: 0.0,
            displacement_count: 0,
        }
    }

    pub fn with_floor_slope(mut self, slope: f32) -> Self {
        self.floor_slope = slope;
        self
    }

    pub fn with_wind(mut self, wind_speed: Vec2f) -> Self {
        self.wind_speed = wind_speed;
        self
    }

    pub fn with_radial_wind_field(mut self, field: RadialWindField) -> Self {
        self.radial_wind_field = Some(field);
        self
    }

    pub fn floor_height_at(&self, x: f32) -> f32 {
        -self.sea_depth + self.floor_slope * x
    }

    /// Sum of all displacements requested so far.
    pub fn total_displacement(&self) -> f32 {
        self.total_displacement
    }

    pub fn displacement_count(&self) -> usize {
        self.displacement_count
    }
}

impl Default for CalmSea {
    fn default() -> Self {
        Self::new(800.0)
    }
}

impl ShipWorld for CalmSea {
    fn height_at(&self, _x: f32) -> f32 {
        self.surface_height
    }

    fn displace_ocean_surface_at(&mut self, _x: f32, amount: f32) {
        self.total_displacement += amount;
        self.displacement_count += 1;
    }

    fn current_wind_speed(&self) -> Vec2f {
        self.wind_speed
    }

    fn current_radial_wind_field(&self) -> Option<RadialWindField> {
        self.radial_wind_field
    }

    fn ocean_floor_height_if_underneath(&self, x: f32, y: f32) -> Option<(f32, usize)> {
        let floor_height = self.floor_height_at(x);
        if y < floor_height {
            let cell = ((x + HALF_MAX_WORLD_WIDTH) / Self::FLOOR_CELL_WIDTH).max(0.0) as usize;
            Some((floor_height, cell))
        } else {
            None
        }
    }

    fn ocean_floor_normal_at(&self, _cell: usize) -> Vec2f {
        Vec2f::new(-self.floor_slope, 1.0).normalise()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_depth_is_positive_underwater() {
        let sea = CalmSea::new(100.0);
        assert_eq!(sea.depth(Vec2f::new(3.0, -5.0)), 5.0);
        assert!(sea.is_underwater(Vec2f::new(0.0, -0.1)));
        assert!(!sea.is_underwater(Vec2f::new(0.0, 0.1)));
    }

    #[test]
    fn test_floor_query() {
        let sea = CalmSea::new(100.0).with_floor_slope(0.5);
        assert!(sea.ocean_floor_height_if_underneath(0.0, -99.0).is_none());
        let (height, _) = sea.ocean_floor_height_if_underneath(10.0, -120.0).expect("under floor");
        assert_eq!(height, -95.0);

        let normal = sea.ocean_floor_normal_at(0);
        assert!((normal.length() - 1.0).abs() < 1e-6);
        assert!(normal.x < 0.0 && normal.y > 0.0);
    }

    #[test]
    fn test_displacement_is_recorded() {
        let mut sea = CalmSea::default();
        sea.displace_ocean_surface_at(1.0, 0.25);
        sea.displace_ocean_surface_at(2.0, -0.5);
        assert_eq!(sea.displacement_count(), 2);
        assert!((sea.total_displacement() + 0.25).abs() < 1e-6);
    }
}
