/// Fixed-step simulation clock.
///
/// Time is always derived as `start + steps * step_size` so that repeated
/// stepping never accumulates rounding drift.
///
/// # Examples
///
/// ```
/// use cosim_server::sim::clock::Clock;
///
/// let mut clock = Clock::new(0.0, 0.5, 1.25);
/// let mut points = Vec::new();
///
/// clock.run(|t, h| points.push((t, h)));
/// assert_eq!(points, vec![(0.0, 0.5), (0.5, 0.5), (1.0, 0.25)]);
/// assert_eq!(clock.time(), 1.25);
/// ```
#[derive(Debug, Clone)]
pub struct Clock {
    start: f64,
    step_size: f64,
    stop_time: f64,
    steps: u64,
    /// Set once a clipped final step has landed exactly on `stop_time`.
    clipped: bool,
}

/// Fraction of a step treated as "already there" when comparing against stop time.
const STOP_TOLERANCE: f64 = 1e-9;

impl Clock {
    /// Creates a clock at `start` advancing by `step_size` towards `stop_time`.
    ///
    /// # Arguments
    ///
    /// * `start` - Initial simulated time
    /// * `step_size` - Fixed communication step (must be > 0)
    /// * `stop_time` - Time at which the run is complete
    pub fn new(start: f64, step_size: f64, stop_time: f64) -> Self {
        Self {
            start,
            step_size,
            stop_time,
            steps: 0,
            clipped: false,
        }
    }

    /// Current simulated time.
    pub fn time(&self) -> f64 {
        if self.clipped {
            self.stop_time
        } else {
            self.start + self.steps as f64 * self.step_size
        }
    }

    pub fn step_size(&self) -> f64 {
        self.step_size
    }

    pub fn stop_time(&self) -> f64 {
        self.stop_time
    }

    /// Number of steps taken so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Returns `true` once simulated time has reached the stop time.
    pub fn finished(&self) -> bool {
        self.time() >= self.stop_time - STOP_TOLERANCE * self.step_size
    }

    /// Number of steps [`Clock::tick`] will produce from the start,
    /// saturating at `u64::MAX`.
    pub fn total_steps(&self) -> u64 {
        let span = (self.stop_time - self.start) / self.step_size;
        if span <= 0.0 {
            0
        } else {
            (span - STOP_TOLERANCE).ceil() as u64
        }
    }

    /// Takes one full step regardless of the stop time and returns the new time.
    pub fn advance(&mut self) -> f64 {
        self.steps += 1;
        self.time()
    }

    /// Returns `(communication_point, step)` for the next step and advances,
    /// or `None` once the stop time is reached. The final step is shortened
    /// so that the clock lands exactly on the stop time.
    pub fn tick(&mut self) -> Option<(f64, f64)> {
        if self.finished() {
            return None;
        }
        let point = self.time();
        let remaining = self.stop_time - point;
        self.steps += 1;
        if remaining < self.step_size * (1.0 + STOP_TOLERANCE) {
            self.clipped = true;
            Some((point, remaining))
        } else {
            Some((point, self.step_size))
        }
    }

    /// Runs a function for each remaining step with `(communication_point, step)`.
    pub fn run(&mut self, mut f: impl FnMut(f64, f64)) {
        while let Some((t, h)) = self.tick() {
            f(t, h);
        }
    }

    /// Rewinds to the start time.
    pub fn reset(&mut self) {
        self.steps = 0;
        self.clipped = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clock() {
        let clock = Clock::new(0.0, 0.1, 1.0);
        assert_eq!(clock.time(), 0.0);
        assert_eq!(clock.steps(), 0);
        assert!(!clock.finished());
    }

    #[test]
    fn test_advance_has_no_drift() {
        let mut clock = Clock::new(0.0, 1e-3, 2.0);
        for _ in 0..1999 {
            clock.advance();
        }
        assert!(!clock.finished());
        assert_eq!(clock.advance(), 2000.0 * 1e-3);
        assert!(clock.finished());
    }

    #[test]
    fn test_tick_exact_multiple() {
        let mut clock = Clock::new(0.0, 0.25, 1.0);
        let mut n = 0;
        clock.run(|_, h| {
            assert_eq!(h, 0.25);
            n += 1;
        });
        assert_eq!(n, 4);
        assert_eq!(clock.total_steps(), 4);
        assert_eq!(clock.time(), 1.0);
        assert_eq!(clock.tick(), None);
    }

    #[test]
    fn test_total_steps_rounds_up() {
        assert_eq!(Clock::new(0.0, 0.3, 1.0).total_steps(), 4);
        assert_eq!(Clock::new(0.0, 0.01, 8.0).total_steps(), 800);
        assert_eq!(Clock::new(1.0, 0.1, 1.0).total_steps(), 0);
    }

    #[test]
    fn test_empty_clock() {
        let mut clock = Clock::new(2.0, 0.1, 2.0);
        assert_eq!(clock.tick(), None);

        let mut was_called = false;
        clock.run(|_, _| was_called = true);
        assert!(!was_called);
    }

    #[test]
    fn test_reset() {
        let mut clock = Clock::new(0.5, 0.5, 1.2);
        clock.run(|_, _| {});
        assert_eq!(clock.time(), 1.2);
        clock.reset();
        assert_eq!(clock.time(), 0.5);
        assert_eq!(clock.steps(), 0);
    }

    #[test]
    fn test_total_steps_saturates() {
        let clock = Clock::new(0.0, 1e-10, 1e30);
        assert_eq!(clock.total_steps(), u64::MAX);
    }
}
