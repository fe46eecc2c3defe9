//! Scalar interpolation helpers shared by the physics passes.

/// 0.0 when `x < edge`, 1.0 otherwise.
#[inline]
pub fn step(edge: f32, x: f32) -> f32 {
    if x < edge {
        0.0
    } else {
        1.0
    }
}

/// Linear ramp from 0.0 at `lower_edge` to 1.0 at `upper_edge`, clamped.
#[inline]
pub fn linear_step(lower_edge: f32, upper_edge: f32, x: f32) -> f32 {
    ((x - lower_edge) / (upper_edge - lower_edge)).clamp(0.0, 1.0)
}

/// Hermite ramp from 0.0 at `lower_edge` to 1.0 at `upper_edge`, clamped.
#[inline]
pub fn smooth_step(lower_edge: f32, upper_edge: f32, x: f32) -> f32 {
    let t = linear_step(lower_edge, upper_edge, x);
    t * t * (3.0 - 2.0 * t)
}

#[inline]
pub fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Index range `[start, end)` of slice `partition` when `count` elements
/// are split into `partition_count` slices of `ceil(count / partition_count)`.
pub fn partition_range(count: usize, partition: usize, partition_count: usize) -> (usize, usize) {
    let partition_count = partition_count.max(1);
    let size = count.div_ceil(partition_count);
    let start = (partition * size).min(count);
    let end = (start + size).min(count);
    (start, end)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_steps() {
        assert_eq!(step(0.0, -0.1), 0.0);
        assert_eq!(step(0.0, 0.0), 1.0);
        assert_eq!(linear_step(0.0, 2.0, 1.0), 0.5);
        assert_eq!(linear_step(0.0, 2.0, 5.0), 1.0);
        assert_eq!(smooth_step(0.0, 1.0, 0.5), 0.5);
        assert_eq!(smooth_step(0.0, 1.0, -1.0), 0.0);
    }

    #[test]
    fn test_partition_range_covers_everything() {
        let count = 10;
        let mut covered = 0;
        for p in 0..4 {
            let (s, e) = partition_range(count, p, 4);
            covered += e - s;
        }
        assert_eq!(covered, count);
        assert_eq!(partition_range(10, 0, 4), (0, 3));
        assert_eq!(partition_range(10, 3, 4), (9, 10));
    }
}
