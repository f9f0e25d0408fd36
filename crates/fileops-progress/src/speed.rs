//! Throughput estimation over a sliding window of samples.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Default number of samples kept.
pub const DEFAULT_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    items: u64,
    bytes: u64,
}

/// Bounded window of cumulative progress samples. The oldest sample is
/// evicted once the window is full.
#[derive(Debug, Clone)]
pub struct SpeedWindow {
    capacity: usize,
    samples: VecDeque<Sample>,
}

impl SpeedWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(2);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Record cumulative counters observed at `at`.
    pub fn push(&mut self, at: Instant, items: u64, bytes: u64) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(Sample { at, items, bytes });
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Items per second between the oldest and newest sample.
    pub fn items_per_second(&self) -> f64 {
        self.rate(|s| s.items)
    }

    /// Bytes per second between the oldest and newest sample.
    pub fn bytes_per_second(&self) -> f64 {
        self.rate(|s| s.bytes)
    }

    fn rate(&self, counter: impl Fn(&Sample) -> u64) -> f64 {
        let (Some(oldest), Some(newest)) = (self.samples.front(), self.samples.back()) else {
            return 0.0;
        };
        if self.samples.len() < 2 {
            return 0.0;
        }
        let elapsed = newest.at.saturating_duration_since(oldest.at).as_secs_f64();
        if elapsed <= 0.0 {
            return 0.0;
        }
        counter(newest).saturating_sub(counter(oldest)) as f64 / elapsed
    }
}

impl Default for SpeedWindow {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

/// Time left to finish `total` items at `speed` items per second.
///
/// `None` when the total is unknown, already reached, or the speed gives no
/// finite estimate.
pub fn estimate_eta(processed: u64, total: u64, speed: f64) -> Option<Duration> {
    if total == 0 || processed >= total || !speed.is_finite() || speed <= 0.0 {
        return None;
    }
    let seconds = (total - processed) as f64 / speed;
    Duration::try_from_secs_f64(seconds).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speed_needs_two_samples() {
        let mut window = SpeedWindow::default();
        assert_eq!(window.items_per_second(), 0.0);

        window.push(Instant::now(), 10, 0);
        assert_eq!(window.items_per_second(), 0.0);
    }

    #[test]
    fn test_speed_zero_elapsed() {
        let now = Instant::now();
        let mut window = SpeedWindow::default();
        window.push(now, 0, 0);
        window.push(now, 100, 0);
        assert_eq!(window.items_per_second(), 0.0);
    }

    #[test]
    fn test_speed_over_window() {
        let start = Instant::now();
        let mut window = SpeedWindow::default();
        window.push(start, 0, 0);
        window.push(start + Duration::from_secs(1), 50, 1000);
        window.push(start + Duration::from_secs(2), 100, 4000);

        assert_eq!(window.items_per_second(), 50.0);
        assert_eq!(window.bytes_per_second(), 2000.0);
    }

    #[test]
    fn test_window_evicts_oldest() {
        let start = Instant::now();
        let mut window = SpeedWindow::new(3);
        for i in 0..5u64 {
            window.push(start + Duration::from_secs(i), i * 10, 0);
        }

        assert_eq!(window.len(), 3);
        // Samples 2..=4: 20 items over 2 seconds.
        assert_eq!(window.items_per_second(), 10.0);
    }

    #[test]
    fn test_eta() {
        assert_eq!(estimate_eta(0, 0, 10.0), None);
        assert_eq!(estimate_eta(10, 10, 10.0), None);
        assert_eq!(estimate_eta(12, 10, 10.0), None);
        assert_eq!(estimate_eta(0, 10, 0.0), None);
        assert_eq!(estimate_eta(0, 10, f64::INFINITY), None);
        assert_eq!(estimate_eta(0, 10, f64::NAN), None);
        assert_eq!(estimate_eta(50, 100, 10.0), Some(Duration::from_secs(5)));
    }
}
