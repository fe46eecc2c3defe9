//! Lamp light diffusion.

use rayon::prelude::*;

use hullsim_logic::parameters::SimulationParameters;
use hullsim_logic::vectors::Vec2f;

use crate::electrical::LampLight;
use crate::points::Points;
use crate::threading::ThreadManager;
use crate::types::PlaneId;

/// Points handled per worker before another worker is worth it.
const POINTS_PER_THREAD: usize = 1000;

/// Width that chunk sizes are rounded up to.
const VECTORIZATION_WIDTH: usize = 4;

/// A lamp with its light-spread already adjusted.
#[derive(Debug, Clone, Copy)]
struct LampSource {
    position: Vec2f,
    plane_id: PlaneId,
    distance_coefficient: f32,
    spread_max_distance: f32,
}

/// Remembers what the last diffusion ran with.
#[derive(Debug, Clone, Default)]
pub(crate) struct LightDiffusion {
    last_luminiscence_adjustment: f32,
    parallelism: usize,
}

impl LightDiffusion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    /// Light every raw point with the brightest lamp on its plane or a
    /// higher one, fading linearly to zero at the lamp's spread.
    pub fn diffuse(
        &mut self,
        points: &mut Points,
        lamps: &[LampLight],
        thread_manager: &ThreadManager,
        params: &SimulationParameters,
    ) {
        if lamps.is_empty() || (params.luminiscence_adjustment == 0.0 && self.last_luminiscence_adjustment == 0.0) {
            return;
        }

        let sources: Vec<LampSource> = lamps
            .iter()
            .map(|lamp| {
                let spread_max_distance = lamp.light_spread * params.light_spread_adjustment;
                LampSource {
                    position: points.position[lamp.point],
                    plane_id: points.plane_id[lamp.point],
                    distance_coefficient: lamp.luminiscence * params.luminiscence_adjustment
                        / spread_max_distance.max(f32::EPSILON)
                        * lamp.available_light,
                    spread_max_distance,
                }
            })
            .collect();

        let raw_count = points.raw_ship_point_count();
        self.recalculate_parallelism(raw_count, thread_manager);

        let chunk_size = chunk_size(raw_count, self.parallelism);
        let position = &points.position[..raw_count];
        let plane_id = &points.plane_id[..raw_count];
        let light = &mut points.light[..raw_count];

        thread_manager.install(|| {
            light
                .par_chunks_mut(chunk_size)
                .enumerate()
                .for_each(|(chunk, out)| {
                    let start = chunk * chunk_size;
                    for (i, point_light) in out.iter_mut().enumerate() {
                        *point_light = light_at(position[start + i], plane_id[start + i], &sources);
                    }
                });
        });

        self.last_luminiscence_adjustment = params.luminiscence_adjustment;
    }

    fn recalculate_parallelism(&mut self, point_count: usize, thread_manager: &ThreadManager) {
        let parallelism = (point_count / POINTS_PER_THREAD).min(thread_manager.parallelism()).max(1);
        if parallelism != self.parallelism {
            log::debug!("Light diffusion parallelism: {} -> {}", self.parallelism, parallelism);
            self.parallelism = parallelism;
        }
    }
}

/// Per-worker chunk size, a multiple of the vectorization width.
fn chunk_size(point_count: usize, parallelism: usize) -> usize {
    let per_worker = point_count.div_ceil(parallelism.max(1));
    per_worker.div_ceil(VECTORIZATION_WIDTH).max(1) * VECTORIZATION_WIDTH
}

fn light_at(position: Vec2f, plane_id: PlaneId, sources: &[LampSource]) -> f32 {
    let brightest = sources
        .iter()
        .filter(|lamp| plane_id <= lamp.plane_id)
        .map(|lamp| lamp.distance_coefficient * (lamp.spread_max_distance - (position - lamp.position).length()))
        .fold(0.0_f32, f32::max);
    brightest.min(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hullsim_logic::materials::MaterialPreset;

    fn row_of_points(count: usize) -> Points {
        let params = SimulationParameters::default();
        let mut points = Points::new(vec![MaterialPreset::Steel.material()], &params);
        for i in 0..count {
            points.add(Vec2f::new(i as f32, 0.0), 0, 0.0, false, 0.5, &params);
        }
        points.finalize(0, &params);
        points
    }

    fn lamp_at(point: usize) -> LampLight {
        LampLight {
            point,
            luminiscence: 1.0,
            light_spread: 5.0,
            available_light: 1.0,
        }
    }

    #[test]
    fn test_chunk_size_is_multiple_of_four() {
        assert_eq!(chunk_size(10, 1), 12);
        assert_eq!(chunk_size(4000, 3), 1336);
        assert_eq!(chunk_size(0, 4), 4);
        assert_eq!(chunk_size(2500, 2) % 4, 0);
    }

    #[test]
    fn test_light_fades_with_distance() {
        let mut points = row_of_points(8);
        let tm = ThreadManager::new(1).unwrap();
        let params = SimulationParameters::default();
        let mut diffusion = LightDiffusion::new();

        diffusion.diffuse(&mut points, &[lamp_at(0)], &tm, &params);

        assert_eq!(points.light(0), 1.0);
        assert!(points.light(2) > points.light(3));
        assert!((points.light(3) - 0.4).abs() < 1e-5);
        assert_eq!(points.light(6), 0.0);
        assert_eq!(diffusion.parallelism(), 1);
    }

    #[test]
    fn test_lamp_does_not_light_higher_planes() {
        let mut points = row_of_points(4);
        points.plane_id[0] = 0;
        points.plane_id[1] = 1;
        points.plane_id[2] = 0;
        let tm = ThreadManager::new(1).unwrap();
        let params = SimulationParameters::default();

        LightDiffusion::new().diffuse(&mut points, &[lamp_at(0)], &tm, &params);

        assert_eq!(points.light(1), 0.0);
        assert!(points.light(2) > 0.0);
    }

    #[test]
    fn test_zero_luminiscence_skips_after_first_dark_pass() {
        let mut points = row_of_points(4);
        let tm = ThreadManager::new(1).unwrap();
        let mut params = SimulationParameters::default();
        let mut diffusion = LightDiffusion::new();

        diffusion.diffuse(&mut points, &[lamp_at(0)], &tm, &params);
        assert!(points.light(1) > 0.0);

        // One pass turns the lights off, later passes are skipped
        params.luminiscence_adjustment = 0.0;
        diffusion.diffuse(&mut points, &[lamp_at(0)], &tm, &params);
        assert_eq!(points.light(1), 0.0);

        points.light[1] = 0.5;
        diffusion.diffuse(&mut points, &[lamp_at(0)], &tm, &params);
        assert_eq!(points.light(1), 0.5);
    }
}
