//! Progress snapshot derived from [`GenerationState`](crate::GenerationState).

use serde::Serialize;
use std::time::Duration;

use crate::GenerationState;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct Progress {
    pub current: usize,
    pub total: usize,
    pub elapsed: Duration,
}

impl Progress {
    pub fn from_state(state: &GenerationState) -> Self {
        Self {
            current: state.current,
            total: state.total,
            elapsed: state.elapsed(),
        }
    }

    /// Items per second since the run started. Zero before any time has passed.
    pub fn throughput(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.current as f64 / secs
        } else {
            0.0
        }
    }

    /// Estimated seconds left, rounded up. `None` while throughput is zero.
    pub fn remaining_secs(&self) -> Option<u64> {
        let rate = self.throughput();
        if rate <= 0.0 {
            return None;
        }
        let left = self.total.saturating_sub(self.current) as f64;
        Some((left / rate).ceil() as u64)
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.current as f64 * 100.0 / self.total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_is_ceiled() {
        let p = Progress {
            current: 3,
            total: 10,
            elapsed: Duration::from_secs(2),
        };
        // 1.5 items/s, 7 left → 4.67s
        assert_eq!(p.remaining_secs(), Some(5));
        assert!((p.percent() - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_estimate_without_throughput() {
        let p = Progress {
            current: 0,
            total: 10,
            elapsed: Duration::from_secs(3),
        };
        assert_eq!(p.throughput(), 0.0);
        assert_eq!(p.remaining_secs(), None);
        assert_eq!(Progress::default().remaining_secs(), None);
    }

    #[test]
    fn test_done_has_zero_remaining() {
        let p = Progress {
            current: 10,
            total: 10,
            elapsed: Duration::from_millis(500),
        };
        assert_eq!(p.remaining_secs(), Some(0));
    }
}
