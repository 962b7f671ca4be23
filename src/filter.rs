//! Trailing moving-average filter and the publish change gate.

/// Largest supported filter window.
pub const MAX_FILTER_WINDOW: usize = 16;

/// Bounded FIFO of the last `window` batch averages.
///
/// Pushing beyond the window evicts the oldest entry. A window of 1 passes
/// values straight through.
///
/// ```
/// use vl6180x_ranging::MovingAverage;
///
/// let mut filter = MovingAverage::new(3);
/// assert_eq!(filter.push(30.0), 30.0);
/// assert_eq!(filter.push(60.0), 45.0);
/// assert_eq!(filter.push(90.0), 60.0);
/// // 30 is evicted
/// assert_eq!(filter.push(90.0), 80.0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MovingAverage {
    values: [f32; MAX_FILTER_WINDOW],
    // index of the oldest entry
    head: usize,
    len: usize,
    window: usize,
}

impl MovingAverage {
    /// Creates an empty filter. `window` is clamped to `1..=MAX_FILTER_WINDOW`.
    #[must_use]
    pub fn new(window: usize) -> Self {
        Self {
            values: [0.0; MAX_FILTER_WINDOW],
            head: 0,
            len: 0,
            window: window.clamp(1, MAX_FILTER_WINDOW),
        }
    }

    /// Configured window size.
    #[must_use]
    pub fn window(&self) -> usize {
        self.window
    }

    /// Number of values currently held, never more than the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True before the first push.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drops all held values.
    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    /// Adds a value, evicting the oldest when full, and returns the new mean.
    pub fn push(&mut self, value: f32) -> f32 {
        if self.len == self.window {
            self.values[self.head] = value;
            self.head = (self.head + 1) % self.window;
        } else {
            self.values[(self.head + self.len) % self.window] = value;
            self.len += 1;
        }
        self.mean().unwrap_or(value)
    }

    /// Arithmetic mean over the held values.
    #[must_use]
    pub fn mean(&self) -> Option<f32> {
        if self.len == 0 {
            return None;
        }
        let sum: f32 = (0..self.len)
            .map(|i| self.values[(self.head + i) % self.window])
            .sum();
        #[allow(clippy::cast_precision_loss)]
        let mean = sum / self.len as f32;
        Some(mean)
    }
}

/// Suppresses publications that differ from the last published value by
/// less than a threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChangeGate {
    threshold_mm: f32,
    last_published: Option<f32>,
}

impl ChangeGate {
    /// Creates a gate with no baseline. A threshold of 0 publishes everything.
    #[must_use]
    pub fn new(threshold_mm: f32) -> Self {
        Self {
            threshold_mm,
            last_published: None,
        }
    }

    /// Configured threshold in millimeters.
    #[must_use]
    pub fn threshold(&self) -> f32 {
        self.threshold_mm
    }

    /// Changes the threshold, keeping the current baseline.
    pub fn set_threshold(&mut self, threshold_mm: f32) {
        self.threshold_mm = threshold_mm;
    }

    /// The last value that passed the gate.
    #[must_use]
    pub fn last_published(&self) -> Option<f32> {
        self.last_published
    }

    /// Offers `value` for publication.
    ///
    /// Returns `true` and moves the baseline when the value is published;
    /// returns `false` and changes nothing when `|value - baseline|` is
    /// strictly below the threshold.
    pub fn offer(&mut self, value: f32) -> bool {
        if let Some(prior) = self.last_published {
            let delta = if value > prior {
                value - prior
            } else {
                prior - value
            };
            if self.threshold_mm > 0.0 && delta < self.threshold_mm {
                return false;
            }
        }
        self.last_published = Some(value);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_holds_more_than_window() {
        let mut filter = MovingAverage::new(5);
        for i in 0..12u8 {
            filter.push(f32::from(i));
            assert!(filter.len() <= 5);
        }
        assert_eq!(filter.len(), 5);
        // 7, 8, 9, 10, 11
        assert_eq!(filter.mean(), Some(9.0));
    }

    #[test]
    fn converges_to_repeated_value() {
        let mut filter = MovingAverage::new(5);
        filter.push(180.0);
        filter.push(3.0);
        let mut out = 0.0;
        for _ in 0..5 {
            out = filter.push(42.0);
        }
        assert_eq!(out, 42.0);
    }

    #[test]
    fn window_of_one_is_pass_through() {
        let mut filter = MovingAverage::new(1);
        for value in [12.0, 150.0, 0.0, 77.5] {
            assert_eq!(filter.push(value), value);
        }
    }

    #[test]
    fn window_is_clamped() {
        assert_eq!(MovingAverage::new(0).window(), 1);
        assert_eq!(MovingAverage::new(100).window(), MAX_FILTER_WINDOW);
    }

    #[test]
    fn clear_resets_contents() {
        let mut filter = MovingAverage::new(3);
        filter.push(10.0);
        filter.clear();
        assert!(filter.is_empty());
        assert_eq!(filter.mean(), None);
        assert_eq!(filter.push(20.0), 20.0);
    }

    #[test]
    fn output_stays_within_input_bounds() {
        let mut filter = MovingAverage::new(4);
        for value in [0.0, 200.0, 13.0, 199.0, 200.0, 0.0, 57.0] {
            let out = filter.push(value);
            assert!((0.0..=200.0).contains(&out));
        }
    }

    #[test]
    fn gate_publishes_first_value() {
        let mut gate = ChangeGate::new(10.0);
        assert!(gate.offer(50.0));
        assert_eq!(gate.last_published(), Some(50.0));
    }

    #[test]
    fn gate_threshold_is_exclusive_on_suppress() {
        let mut gate = ChangeGate::new(5.0);
        assert!(gate.offer(50.0));
        // delta == threshold publishes
        assert!(gate.offer(55.0));
        // delta == threshold - 0.5 suppresses and keeps the baseline
        assert!(!gate.offer(59.5));
        assert_eq!(gate.last_published(), Some(55.0));
        assert!(!gate.offer(50.5));
        assert!(gate.offer(50.0));
    }

    #[test]
    fn zero_threshold_always_publishes() {
        let mut gate = ChangeGate::new(0.0);
        assert!(gate.offer(50.0));
        assert!(gate.offer(50.0));
        assert!(gate.offer(50.1));
    }
}
