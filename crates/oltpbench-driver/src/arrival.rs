//! Arrival control: when a terminal's next transaction may fire.
//!
//! Closed-loop phases fire back to back. Rate-limited phases give each active
//! terminal a mean spacing of `active_terminals / rate` seconds, either fixed
//! (regular) or exponentially distributed (Poisson). Due times accumulate from
//! the phase start, so a slow target makes a terminal fall behind rather than
//! silently lowering the offered rate; the backlog of overdue arrivals is
//! bounded by the queue limit.

use std::time::Duration;

use oltpbench_core::{Arrival, CoreError, Phase};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Exp};
use tokio::time::Instant;

use crate::error::{DriverError, DriverResult};

/// Seed stream used for arrival sampling.
pub const ARRIVAL_STREAM: u64 = 1;

/// Seed stream used for transaction selection.
pub const SELECTION_STREAM: u64 = 2;

/// Derives a reproducible per-terminal seed (splitmix64 finalizer).
#[must_use]
pub fn terminal_seed(seed: u64, terminal: usize, stream: u64) -> u64 {
    let mut z = seed
        ^ (terminal as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ stream.wrapping_mul(0xD1B5_4A32_D192_ED03);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Outcome of asking for the next arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextArrival {
    /// Fire immediately.
    Now,
    /// Fire at the given instant.
    At(Instant),
}

#[derive(Debug, Clone)]
enum Pacing {
    ClosedLoop,
    Regular { interval: Duration },
    Poisson { distribution: Exp<f64>, mean: Duration },
}

/// Per-terminal arrival schedule.
#[derive(Debug, Clone)]
pub struct ArrivalController {
    terminal: usize,
    queue_limit: usize,
    rng: StdRng,
    pacing: Pacing,
    next_due: Option<Instant>,
}

impl ArrivalController {
    /// Creates the controller of a terminal; `terminal` is the global index.
    #[must_use]
    pub fn new(seed: u64, terminal: usize, queue_limit: usize) -> Self {
        Self {
            terminal,
            queue_limit,
            rng: StdRng::seed_from_u64(terminal_seed(seed, terminal, ARRIVAL_STREAM)),
            pacing: Pacing::ClosedLoop,
            next_due: None,
        }
    }

    /// Resets the schedule for `phase`, which started at `phase_start`.
    ///
    /// `slot` is the terminal's position among the phase's active terminals.
    /// Regular arrivals are staggered by slot so that active terminals do not
    /// fire in lockstep; Poisson arrivals draw their first gap.
    pub fn begin(&mut self, phase: &Phase, slot: usize, phase_start: Instant) -> DriverResult<()> {
        self.pacing = match phase.mean_interarrival() {
            Some(mean) if !mean.is_zero() => match phase.arrival() {
                Arrival::Regular => Pacing::Regular { interval: mean },
                Arrival::Poisson => {
                    let distribution = Exp::new(1.0 / mean.as_secs_f64()).map_err(|e| {
                        let number = phase.index() + 1;
                        DriverError::Core(CoreError::invalid_phase(number, e.to_string()))
                    })?;
                    Pacing::Poisson { distribution, mean }
                }
            },
            _ => Pacing::ClosedLoop,
        };

        let first_gap = match &self.pacing {
            Pacing::ClosedLoop => None,
            Pacing::Regular { interval } => {
                let active = phase.active_terminals().max(1) as f64;
                Some(interval.mul_f64(slot as f64 / active))
            }
            Pacing::Poisson { .. } => self.draw_interval(),
        };
        self.next_due = first_gap.map(|gap| phase_start + gap);
        Ok(())
    }

    /// Runs the current phase closed-loop regardless of its rate. Trace
    /// playback is paced only by the target.
    pub fn unpaced(&mut self) {
        self.pacing = Pacing::ClosedLoop;
        self.next_due = None;
    }

    /// Mean spacing of the current phase; `None` when closed-loop.
    #[must_use]
    pub fn mean_interval(&self) -> Option<Duration> {
        match &self.pacing {
            Pacing::ClosedLoop => None,
            Pacing::Regular { interval } => Some(*interval),
            Pacing::Poisson { mean, .. } => Some(*mean),
        }
    }

    /// Draws the gap to the following arrival.
    pub fn draw_interval(&mut self) -> Option<Duration> {
        match &self.pacing {
            Pacing::ClosedLoop => None,
            Pacing::Regular { interval } => Some(*interval),
            Pacing::Poisson { distribution, .. } => {
                let secs: f64 = distribution.sample(&mut self.rng);
                Some(Duration::from_secs_f64(secs.max(0.0)))
            }
        }
    }

    /// Overdue arrivals at `now`.
    #[must_use]
    pub fn backlog(&self, now: Instant) -> usize {
        match (self.next_due, self.mean_interval()) {
            (Some(due), Some(mean)) if now > due => {
                ((now - due).as_secs_f64() / mean.as_secs_f64()) as usize
            }
            _ => 0,
        }
    }

    /// Claims the next arrival.
    ///
    /// Fails with a queue overload once the backlog exceeds the limit.
    pub fn next(&mut self, now: Instant) -> DriverResult<NextArrival> {
        let Some(due) = self.next_due else {
            return Ok(NextArrival::Now);
        };

        let backlog = self.backlog(now);
        if backlog > self.queue_limit {
            return Err(DriverError::QueueOverload {
                terminal: self.terminal,
                backlog,
                limit: self.queue_limit,
            });
        }

        let gap = self.draw_interval().unwrap_or_default();
        self.next_due = Some(due + gap);
        if due <= now {
            Ok(NextArrival::Now)
        } else {
            Ok(NextArrival::At(due))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oltpbench_core::{PhaseSchedule, PhaseSpec};
    use std::sync::Arc;

    fn phase(rate: &str, arrival: Arrival, active: usize) -> Arc<Phase> {
        let mut schedule = PhaseSchedule::new(active, 1);
        schedule
            .add_phase(PhaseSpec {
                duration_secs: 60,
                rate: rate.to_string(),
                arrival,
                active_terminals: Some(active),
                weights: vec![1.0],
                ..Default::default()
            })
            .unwrap();
        Arc::clone(&schedule.phases()[0])
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_loop_never_waits() {
        let mut arrival = ArrivalController::new(0, 0, 10);
        let start = Instant::now();
        arrival.begin(&phase("unlimited", Arrival::Regular, 1), 0, start).unwrap();
        for _ in 0..5 {
            assert_eq!(arrival.next(Instant::now()).unwrap(), NextArrival::Now);
        }
        assert_eq!(arrival.backlog(start + Duration::from_secs(100)), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unpaced_ignores_phase_rate() {
        let mut arrival = ArrivalController::new(0, 0, 1);
        let start = Instant::now();
        arrival.begin(&phase("1", Arrival::Regular, 1), 0, start).unwrap();
        arrival.unpaced();

        assert_eq!(arrival.mean_interval(), None);
        for _ in 0..5 {
            assert_eq!(arrival.next(start + Duration::from_secs(60)).unwrap(), NextArrival::Now);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_regular_spacing_is_staggered() {
        // 4 terminals at 40/s: each terminal fires every 100ms, offset by 25ms per slot.
        let start = Instant::now();
        let mut arrival = ArrivalController::new(0, 7, 10);
        arrival.begin(&phase("40", Arrival::Regular, 4), 2, start).unwrap();

        assert_eq!(
            arrival.next(start).unwrap(),
            NextArrival::At(start + Duration::from_millis(50))
        );
        assert_eq!(
            arrival.next(start).unwrap(),
            NextArrival::At(start + Duration::from_millis(150))
        );
        assert_eq!(
            arrival.next(start + Duration::from_millis(400)).unwrap(),
            NextArrival::Now
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_backlog_over_limit_is_an_overload() {
        let start = Instant::now();
        let mut arrival = ArrivalController::new(0, 3, 5);
        arrival.begin(&phase("10", Arrival::Regular, 1), 0, start).unwrap();

        // Due every 100ms from `start`; 2s late means ~20 overdue arrivals.
        let late = start + Duration::from_secs(2);
        assert_eq!(arrival.backlog(late), 20);
        match arrival.next(late).unwrap_err() {
            DriverError::QueueOverload {
                terminal,
                backlog,
                limit,
            } => assert_eq!((terminal, backlog, limit), (3, 20, 5)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poisson_mean_converges() {
        // 10 terminals at 100/s: mean gap 100ms per terminal.
        let mut arrival = ArrivalController::new(42, 0, 10);
        arrival
            .begin(&phase("100", Arrival::Poisson, 10), 0, Instant::now())
            .unwrap();

        let draws = 20_000;
        let total: f64 = (0..draws)
            .map(|_| arrival.draw_interval().unwrap().as_secs_f64())
            .sum();
        let mean = total / draws as f64;
        assert!((mean - 0.1).abs() < 0.005, "empirical mean {mean}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_poisson_is_reproducible_per_terminal() {
        let p = phase("50", Arrival::Poisson, 1);
        let start = Instant::now();
        let draws = |seed: u64, terminal: usize| {
            let mut arrival = ArrivalController::new(seed, terminal, 10);
            arrival.begin(&p, 0, start).unwrap();
            (0..16)
                .map(|_| arrival.draw_interval().unwrap())
                .collect::<Vec<_>>()
        };

        assert_eq!(draws(9, 1), draws(9, 1));
        assert_ne!(draws(9, 1), draws(9, 2));
        assert_ne!(draws(9, 1), draws(10, 1));
    }

    #[test]
    fn test_terminal_seed_streams_differ() {
        assert_ne!(
            terminal_seed(0, 0, ARRIVAL_STREAM),
            terminal_seed(0, 0, SELECTION_STREAM)
        );
        assert_ne!(terminal_seed(0, 0, ARRIVAL_STREAM), terminal_seed(0, 1, ARRIVAL_STREAM));
    }
}
