use std::time::{Duration, Instant};

/// Running loss statistics for one pass over a split.
///
/// The average is cumulative over the whole pass, not windowed, so reports
/// early in an epoch are noisier than late ones.
#[derive(Debug, Clone)]
pub struct EpochStats {
    loss_sum: f64,
    batch_count: usize,
    started: Instant,
}

impl EpochStats {
    pub fn start() -> Self {
        EpochStats {
            loss_sum: 0.0,
            batch_count: 0,
            started: Instant::now(),
        }
    }

    pub fn record(&mut self, loss: f64) {
        self.loss_sum += loss;
        self.batch_count += 1;
    }

    pub fn batch_count(&self) -> usize {
        self.batch_count
    }

    pub fn average_loss(&self) -> f64 {
        if self.batch_count == 0 {
            return 0.0;
        }
        self.loss_sum / self.batch_count as f64
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

impl Default for EpochStats {
    fn default() -> Self {
        Self::start()
    }
}

/// Counts the logging thresholds a traversal has crossed.
///
/// Thresholds are `first_pct`, `first_pct + step_pct`, ... A batch that
/// jumps over several thresholds reports all of them at once.
#[derive(Debug, Clone)]
pub struct LogCadence {
    first_pct: f64,
    step_pct: f64,
    /// Thresholds already reported.
    fired: u64,
}

impl LogCadence {
    pub fn new(first_pct: f64, step_pct: f64) -> Self {
        LogCadence {
            first_pct,
            step_pct,
            fired: 0,
        }
    }

    pub fn next_pct(&self) -> f64 {
        if self.step_pct > 0.0 {
            self.first_pct + self.step_pct * self.fired as f64
        } else if self.fired == 0 {
            self.first_pct
        } else {
            f64::INFINITY
        }
    }

    /// Number of thresholds `progress_pct` reached since the last call.
    /// A non-positive step has a single threshold.
    pub fn crossed(&mut self, progress_pct: f64) -> usize {
        if progress_pct.is_nan() || progress_pct < self.next_pct() {
            return 0;
        }
        let total = if self.step_pct > 0.0 {
            ((progress_pct - self.first_pct) / self.step_pct).floor() as u64 + 1
        } else {
            1
        };
        let newly = total.saturating_sub(self.fired);
        self.fired = self.fired.max(total);
        usize::try_from(newly).unwrap_or(usize::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fire_count(cadence: &mut LogCadence, progress: impl IntoIterator<Item = f64>) -> usize {
        progress.into_iter().map(|p| cadence.crossed(p)).sum()
    }

    #[test]
    fn test_average_loss_is_cumulative() {
        let mut stats = EpochStats::start();
        assert_eq!(stats.average_loss(), 0.0);
        stats.record(1.0);
        stats.record(3.0);
        stats.record(8.0);
        assert_eq!(stats.batch_count(), 3);
        assert!((stats.average_loss() - 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_every_percent_fires_twenty_times() {
        let mut cadence = LogCadence::new(0.5, 5.0);
        let fired = fire_count(&mut cadence, (1..=100).map(f64::from));
        assert_eq!(fired, 20);
    }

    #[test]
    fn test_coarse_progress_counts_every_threshold() {
        let mut cadence = LogCadence::new(0.5, 5.0);
        let per_batch: Vec<usize> = (1..=10)
            .map(|i| cadence.crossed(f64::from(i) * 10.0))
            .collect();
        assert_eq!(per_batch, vec![2; 10]);
        assert!((cadence.next_pct() - 100.5).abs() < 1e-9);
    }

    #[test]
    fn test_first_threshold_respected() {
        let mut cadence = LogCadence::new(10.0, 5.0);
        assert_eq!(cadence.crossed(5.0), 0);
        assert_eq!(cadence.crossed(9.99), 0);
        assert_eq!(cadence.crossed(10.0), 1);
        assert_eq!(cadence.crossed(12.0), 0);
        assert_eq!(cadence.crossed(15.0), 1);
        assert_eq!(cadence.crossed(31.0), 3);
    }

    #[test]
    fn test_tiny_step_returns_immediately() {
        let mut cadence = LogCadence::new(0.5, 1e-9);
        let fired = cadence.crossed(100.0);
        assert!(fired > 99_000_000_000, "fired {fired}");
        assert_eq!(cadence.crossed(100.0), 0);
    }

    #[test]
    fn test_zero_step_fires_once() {
        let mut cadence = LogCadence::new(50.0, 0.0);
        assert_eq!(cadence.crossed(40.0), 0);
        assert_eq!(cadence.crossed(60.0), 1);
        assert_eq!(cadence.crossed(100.0), 0);
        assert_eq!(cadence.next_pct(), f64::INFINITY);
    }

    #[test]
    fn test_nan_progress_never_fires() {
        let mut cadence = LogCadence::new(0.5, 5.0);
        assert_eq!(cadence.crossed(f64::NAN), 0);
    }
}
