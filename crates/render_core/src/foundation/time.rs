//! Frame timing
//!
//! The renderer does not read the wall clock; the host hands it the elapsed
//! seconds each tick and the clock accumulates them.

/// Accumulates host-supplied frame deltas
#[derive(Debug, Clone, Default)]
pub struct FrameClock {
    delta_time: f32,
    total_time: f64,
    frame_count: u64,
}

impl FrameClock {
    /// Create a clock at frame zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one frame. Negative or non-finite deltas count as zero.
    pub fn advance(&mut self, delta_seconds: f32) {
        let delta = if delta_seconds.is_finite() && delta_seconds > 0.0 {
            delta_seconds
        } else {
            0.0
        };
        self.delta_time = delta;
        self.total_time += f64::from(delta);
        self.frame_count += 1;
    }

    /// Seconds covered by the last frame
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Seconds accumulated since creation
    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    /// Number of frames advanced so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Average frames per second since creation
    pub fn average_fps(&self) -> f32 {
        if self.total_time > 0.0 {
            (self.frame_count as f64 / self.total_time) as f32
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_clock_accumulates_deltas() {
        let mut clock = FrameClock::new();
        clock.advance(0.5);
        clock.advance(0.25);

        assert_eq!(clock.frame_count(), 2);
        assert_relative_eq!(clock.delta_time(), 0.25);
        assert_relative_eq!(clock.total_time(), 0.75);
        assert_relative_eq!(clock.average_fps(), 2.0 / 0.75, epsilon = 1e-5);
    }

    #[test]
    fn test_invalid_delta_counts_as_zero() {
        let mut clock = FrameClock::new();
        clock.advance(f32::NAN);
        clock.advance(-1.0);

        assert_eq!(clock.frame_count(), 2);
        assert_relative_eq!(clock.total_time(), 0.0);
        assert_relative_eq!(clock.average_fps(), 0.0);
    }
}
