//! Wall-clock timing of the update phases.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    MechanicalDynamics,
    Strains,
    WorldForces,
    LowFrequency,
    WaterAndHeat,
    Electrical,
    Light,
    Particles,
}

impl Phase {
    pub const COUNT: usize = 8;

    pub const ALL: [Phase; Phase::COUNT] = [
        Phase::MechanicalDynamics,
        Phase::Strains,
        Phase::WorldForces,
        Phase::LowFrequency,
        Phase::WaterAndHeat,
        Phase::Electrical,
        Phase::Light,
        Phase::Particles,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Phase::MechanicalDynamics => "mechanical dynamics",
            Phase::Strains => "strains",
            Phase::WorldForces => "world forces",
            Phase::LowFrequency => "low frequency",
            Phase::WaterAndHeat => "water and heat",
            Phase::Electrical => "electrical",
            Phase::Light => "light",
            Phase::Particles => "particles",
        }
    }
}

/// Accumulated durations since the last reset.
#[derive(Debug, Clone, Default)]
pub struct PerfStats {
    phases: [Duration; Phase::COUNT],
    pub total_update_duration: Duration,
    pub update_count: u64,
}

impl PerfStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, phase: Phase, duration: Duration) {
        self.phases[phase as usize] += duration;
    }

    /// Run `f`, charging its wall-clock time to `phase`.
    pub fn time<R>(&mut self, phase: Phase, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let result = f();
        self.record(phase, start.elapsed());
        result
    }

    pub fn phase_duration(&self, phase: Phase) -> Duration {
        self.phases[phase as usize]
    }

    pub fn average_update_duration(&self) -> Duration {
        if self.update_count == 0 {
            Duration::ZERO
        } else {
            self.total_update_duration / self.update_count as u32
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// One line per phase, for the harness.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "{} updates, {:.3} ms avg",
            self.update_count,
            self.average_update_duration().as_secs_f64() * 1000.0
        )];
        for phase in Phase::ALL {
            lines.push(format!(
                "  {:<20} {:>10.3} ms",
                phase.name(),
                self.phase_duration(phase).as_secs_f64() * 1000.0
            ));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_per_phase() {
        let mut stats = PerfStats::new();
        stats.record(Phase::Strains, Duration::from_millis(2));
        stats.record(Phase::Strains, Duration::from_millis(3));
        let value = stats.time(Phase::Light, || 42);
        assert_eq!(value, 42);

        assert_eq!(stats.phase_duration(Phase::Strains), Duration::from_millis(5));
        assert_eq!(stats.phase_duration(Phase::Electrical), Duration::ZERO);
        assert_eq!(stats.average_update_duration(), Duration::ZERO);

        stats.total_update_duration = Duration::from_millis(10);
        stats.update_count = 4;
        assert_eq!(stats.average_update_duration(), Duration::from_micros(2500));
        assert!(stats.summary().contains("strains"));

        stats.reset();
        assert_eq!(stats.update_count, 0);
    }
}
