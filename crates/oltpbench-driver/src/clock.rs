use std::time::{SystemTime, UNIX_EPOCH};

use tokio::time::Instant;

/// Maps monotonic instants onto wall-clock microseconds since the epoch.
///
/// Anchored once per run so every terminal stamps records on the same scale,
/// including under a paused test clock.
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    anchor: Instant,
    anchor_micros: u64,
}

impl RunClock {
    #[must_use]
    pub fn start() -> Self {
        let anchor_micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        Self::anchored(Instant::now(), anchor_micros)
    }

    #[must_use]
    pub fn anchored(anchor: Instant, anchor_micros: u64) -> Self {
        Self {
            anchor,
            anchor_micros,
        }
    }

    /// Epoch microseconds of `instant`.
    #[must_use]
    pub fn micros(&self, instant: Instant) -> u64 {
        if instant >= self.anchor {
            self.anchor_micros + (instant - self.anchor).as_micros() as u64
        } else {
            self.anchor_micros
                .saturating_sub((self.anchor - instant).as_micros() as u64)
        }
    }

    #[must_use]
    pub fn now_micros(&self) -> u64 {
        self.micros(Instant::now())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_micros_follow_the_monotonic_clock() {
        let clock = RunClock::anchored(Instant::now(), 1_000_000);
        tokio::time::advance(Duration::from_millis(250)).await;
        assert_eq!(clock.now_micros(), 1_250_000);
    }
}
