//! Phase model: the ordered schedule a run executes.
//!
//! Phases are appended with [`PhaseSchedule::add_phase`], which resolves the
//! rate string and the serial/active-terminal interaction, and then checked as
//! a whole with [`PhaseSchedule::validate_all`] before any terminal exists.

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CoreError, CoreResult};

/// Rate keyword: the phase occupies its slot but issues nothing.
pub const RATE_DISABLED: &str = "disabled";

/// Rate keyword: closed-loop, back-to-back transactions.
pub const RATE_UNLIMITED: &str = "unlimited";

/// Inter-arrival distribution for rate-limited phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Arrival {
    /// Fixed spacing.
    #[default]
    Regular,
    /// Exponentially distributed spacing.
    Poisson,
}

impl FromStr for Arrival {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "regular" => Ok(Self::Regular),
            "poisson" => Ok(Self::Poisson),
            other => Err(CoreError::config(format!(
                "arrival must be 'regular' or 'poisson', got '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Arrival {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Regular => write!(f, "regular"),
            Self::Poisson => write!(f, "poisson"),
        }
    }
}

/// Rate state of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimit {
    /// Phase is skipped but still consumes its schedule time.
    Disabled,
    /// Closed-loop saturation.
    Unlimited,
    /// Open-loop target in transactions per second, aggregated across active terminals.
    PerSecond(NonZeroU32),
}

impl FromStr for RateLimit {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s.trim();
        if value.is_empty() {
            return Err(CoreError::config("rate must be specified"));
        }
        if value.eq_ignore_ascii_case(RATE_DISABLED) {
            return Ok(Self::Disabled);
        }
        if value.eq_ignore_ascii_case(RATE_UNLIMITED) {
            return Ok(Self::Unlimited);
        }
        let rate: i64 = value.parse().map_err(|_| {
            CoreError::config(format!(
                "rate must be '{RATE_DISABLED}', '{RATE_UNLIMITED}' or a number, got '{value}'"
            ))
        })?;
        u32::try_from(rate)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self::PerSecond)
            .ok_or_else(|| {
                CoreError::config(format!(
                    "rate limit must be at least 1 (got {rate}); \
                     use '{RATE_UNLIMITED}' or '{RATE_DISABLED}' instead"
                ))
            })
    }
}

impl fmt::Display for RateLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => write!(f, "{RATE_DISABLED}"),
            Self::Unlimited => write!(f, "{RATE_UNLIMITED}"),
            Self::PerSecond(n) => write!(f, "{n}/s"),
        }
    }
}

/// Raw phase declaration, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseSpec {
    /// Measured duration in seconds; 0 means untimed.
    pub duration_secs: u64,
    /// Warmup seconds preceding the measured window.
    pub warmup_secs: i64,
    /// `"disabled"`, `"unlimited"` or a positive integer.
    pub rate: String,
    /// Inter-arrival distribution.
    pub arrival: Arrival,
    /// Run the registry in order instead of sampling weights.
    pub serial: bool,
    /// Terminals issuing work in this phase; all terminals when absent.
    pub active_terminals: Option<usize>,
    /// One weight per transaction type, in registry order.
    pub weights: Vec<f64>,
}

impl Default for PhaseSpec {
    fn default() -> Self {
        Self {
            duration_secs: 0,
            warmup_secs: 0,
            rate: RATE_UNLIMITED.to_string(),
            arrival: Arrival::Regular,
            serial: false,
            active_terminals: None,
            weights: Vec::new(),
        }
    }
}

/// A validated phase.
#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    index: usize,
    duration: Duration,
    warmup: Duration,
    arrival: Arrival,
    rate: RateLimit,
    weights: Vec<f64>,
    active_terminals: usize,
    serial: bool,
}

impl Phase {
    /// Zero-based position in the schedule.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Measured window length.
    #[must_use]
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Warmup window length.
    #[must_use]
    pub fn warmup(&self) -> Duration {
        self.warmup
    }

    /// Warmup plus measured window: the slot this phase occupies on the timeline.
    #[must_use]
    pub fn schedule_length(&self) -> Duration {
        self.warmup + self.duration
    }

    #[must_use]
    pub fn arrival(&self) -> Arrival {
        self.arrival
    }

    #[must_use]
    pub fn rate(&self) -> RateLimit {
        self.rate
    }

    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    #[must_use]
    pub fn weight_count(&self) -> usize {
        self.weights.len()
    }

    #[must_use]
    pub fn active_terminals(&self) -> usize {
        self.active_terminals
    }

    #[must_use]
    pub fn is_serial(&self) -> bool {
        self.serial
    }

    /// True when the phase ends on a timer rather than after one serial pass.
    #[must_use]
    pub fn is_timed(&self) -> bool {
        !self.duration.is_zero()
    }

    #[must_use]
    pub fn is_disabled(&self) -> bool {
        self.rate == RateLimit::Disabled
    }

    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self.rate, RateLimit::PerSecond(_))
    }

    /// Mean spacing between two transactions of the same terminal, for
    /// rate-limited phases: `active_terminals / rate` seconds.
    #[must_use]
    pub fn mean_interarrival(&self) -> Option<Duration> {
        match self.rate {
            RateLimit::PerSecond(rate) => Some(Duration::from_secs_f64(
                self.active_terminals as f64 / f64::from(rate.get()),
            )),
            _ => None,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "phase {} [rate={}, arrival={}, terminals={}, serial={}, warmup={}s, time={}s]",
            self.index + 1,
            self.rate,
            self.arrival,
            self.active_terminals,
            self.serial,
            self.warmup.as_secs(),
            self.duration.as_secs()
        )
    }
}

/// The ordered sequence of phases for one benchmark.
#[derive(Debug, Clone)]
pub struct PhaseSchedule {
    phases: Vec<Arc<Phase>>,
    terminals: usize,
    transaction_count: usize,
    trace_driven: bool,
}

impl PhaseSchedule {
    /// Starts an empty schedule for `terminals` total terminals and
    /// `transaction_count` registered transaction types.
    #[must_use]
    pub fn new(terminals: usize, transaction_count: usize) -> Self {
        Self {
            phases: Vec::new(),
            terminals,
            transaction_count,
            trace_driven: false,
        }
    }

    /// Marks the schedule as replaying a trace: serial is suppressed and
    /// timer/weights are not required.
    #[must_use]
    pub fn trace_driven(mut self, trace_driven: bool) -> Self {
        self.trace_driven = trace_driven;
        self
    }

    /// Validates one phase declaration and appends it.
    pub fn add_phase(&mut self, spec: PhaseSpec) -> CoreResult<()> {
        let number = self.phases.len() + 1;
        let mut rate: RateLimit = spec
            .rate
            .parse()
            .map_err(|e: CoreError| CoreError::invalid_phase(number, e.to_string()))?;

        let serial = spec.serial && !self.trace_driven;
        let mut active_terminals = spec.active_terminals.unwrap_or(self.terminals);
        if serial && active_terminals != 1 {
            warn!(
                phase = number,
                configured = active_terminals,
                "Serial ordering is enabled, so # of active terminals is clamped to 1"
            );
            active_terminals = 1;
        }
        if active_terminals > self.terminals {
            return Err(CoreError::invalid_phase(
                number,
                format!(
                    "number of active terminals ({active_terminals}) is bigger than \
                     the total number of terminals ({})",
                    self.terminals
                ),
            ));
        }
        if active_terminals == 0 && rate != RateLimit::Disabled {
            return Err(CoreError::invalid_phase(number, "active terminals must be at least 1"));
        }

        if spec.warmup_secs < 0 {
            return Err(CoreError::invalid_phase(
                number,
                "must provide nonnegative time bound for warmup",
            ));
        }

        let timed = spec.duration_secs > 0;
        if self.trace_driven {
            info!(phase = number, "Running a trace; ignoring timer, serial, and weight settings");
            if let RateLimit::PerSecond(configured) = rate {
                info!(
                    phase = number,
                    configured = configured.get(),
                    "Trace playback is not rate limited; running the phase unlimited"
                );
                rate = RateLimit::Unlimited;
            }
        } else if !timed {
            if serial {
                info!(
                    phase = number,
                    "Timer disabled for serial run; will execute all queries exactly once"
                );
            } else {
                return Err(CoreError::invalid_phase(
                    number,
                    "must provide positive time bound for non-serial executions; \
                     either provide a valid time or enable serial mode",
                ));
            }
        } else if serial {
            info!(
                phase = number,
                "Timer enabled for serial run; will run queries serially in a loop \
                 until the timer expires"
            );
        }

        if let Some(bad) = spec.weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(CoreError::invalid_phase(
                number,
                format!("weights must be finite and non-negative, got {bad}"),
            ));
        }
        let weight_sum: f64 = spec.weights.iter().sum();
        let selects_by_weight = !serial && !self.trace_driven && rate != RateLimit::Disabled;
        if selects_by_weight && weight_sum <= 0.0 && !spec.weights.is_empty() {
            return Err(CoreError::invalid_phase(number, "at least one weight must be positive"));
        }

        self.phases.push(Arc::new(Phase {
            index: self.phases.len(),
            duration: Duration::from_secs(spec.duration_secs),
            warmup: Duration::from_secs(spec.warmup_secs as u64),
            arrival: spec.arrival,
            rate,
            weights: spec.weights,
            active_terminals,
            serial,
        }));
        Ok(())
    }

    /// Checks the cross-phase invariants. Must succeed before any terminal starts.
    pub fn validate_all(&self) -> CoreResult<()> {
        if self.phases.is_empty() {
            return Err(CoreError::config("at least one phase must be declared"));
        }
        for phase in &self.phases {
            if phase.weight_count() != self.transaction_count {
                return Err(CoreError::WeightCountMismatch {
                    phase: phase.index + 1,
                    weights: phase.weight_count(),
                    expected: self.transaction_count,
                    serial: phase.serial,
                });
            }
        }
        Ok(())
    }

    /// Phases in execution order.
    #[must_use]
    pub fn phases(&self) -> &[Arc<Phase>] {
        &self.phases
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.phases.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    #[must_use]
    pub fn terminals(&self) -> usize {
        self.terminals
    }

    #[must_use]
    pub fn is_trace_driven(&self) -> bool {
        self.trace_driven
    }

    /// Sum of all timed slots (untimed phases contribute their warmup only).
    #[must_use]
    pub fn scheduled_duration(&self) -> Duration {
        self.phases.iter().map(|p| p.schedule_length()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(rate: &str, weights: Vec<f64>) -> PhaseSpec {
        PhaseSpec {
            duration_secs: 60,
            rate: rate.to_string(),
            weights,
            ..Default::default()
        }
    }

    #[test]
    fn test_rate_parsing() {
        assert_eq!("disabled".parse::<RateLimit>().unwrap(), RateLimit::Disabled);
        assert_eq!("UNLIMITED".parse::<RateLimit>().unwrap(), RateLimit::Unlimited);
        assert_eq!(
            "250".parse::<RateLimit>().unwrap(),
            RateLimit::PerSecond(NonZeroU32::new(250).unwrap())
        );
        assert!("0".parse::<RateLimit>().is_err());
        assert!("-5".parse::<RateLimit>().is_err());
        assert!("fast".parse::<RateLimit>().is_err());
        assert!("".parse::<RateLimit>().is_err());
    }

    #[test]
    fn test_serial_clamps_active_terminals() {
        let mut schedule = PhaseSchedule::new(8, 2);
        schedule
            .add_phase(PhaseSpec {
                serial: true,
                active_terminals: Some(4),
                ..spec("unlimited", vec![1.0, 1.0])
            })
            .unwrap();

        let phase = &schedule.phases()[0];
        assert!(phase.is_serial());
        assert_eq!(phase.active_terminals(), 1);
    }

    #[test]
    fn test_active_terminals_above_total_is_fatal() {
        let mut schedule = PhaseSchedule::new(4, 1);
        let err = schedule
            .add_phase(PhaseSpec {
                active_terminals: Some(5),
                ..spec("100", vec![1.0])
            })
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidPhase { phase: 1, .. }));
    }

    #[test]
    fn test_untimed_requires_serial() {
        let mut schedule = PhaseSchedule::new(1, 1);
        let untimed = PhaseSpec {
            duration_secs: 0,
            ..spec("unlimited", vec![1.0])
        };
        assert!(schedule.add_phase(untimed.clone()).is_err());
        assert!(schedule
            .add_phase(PhaseSpec {
                serial: true,
                ..untimed
            })
            .is_ok());
        assert!(!schedule.phases()[0].is_timed());
    }

    #[test]
    fn test_negative_warmup_rejected() {
        let mut schedule = PhaseSchedule::new(1, 1);
        let err = schedule
            .add_phase(PhaseSpec {
                warmup_secs: -1,
                ..spec("10", vec![1.0])
            })
            .unwrap_err();
        assert!(err.to_string().contains("warmup"));
    }

    #[test]
    fn test_weight_count_checked_for_every_phase() {
        let mut schedule = PhaseSchedule::new(2, 3);
        schedule.add_phase(spec("10", vec![50.0, 30.0, 20.0])).unwrap();
        schedule
            .add_phase(PhaseSpec {
                serial: true,
                ..spec("unlimited", vec![1.0, 1.0])
            })
            .unwrap();

        match schedule.validate_all().unwrap_err() {
            CoreError::WeightCountMismatch {
                phase,
                weights,
                expected,
                serial,
            } => {
                assert_eq!((phase, weights, expected, serial), (2, 2, 3, true));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mean_interarrival() {
        let mut schedule = PhaseSchedule::new(10, 1);
        schedule
            .add_phase(PhaseSpec {
                active_terminals: Some(10),
                ..spec("100", vec![1.0])
            })
            .unwrap();
        assert_eq!(
            schedule.phases()[0].mean_interarrival(),
            Some(Duration::from_millis(100))
        );
    }

    #[test]
    fn test_trace_driven_suppresses_serial() {
        let mut schedule = PhaseSchedule::new(3, 1).trace_driven(true);
        schedule
            .add_phase(PhaseSpec {
                duration_secs: 0,
                serial: true,
                ..spec("unlimited", vec![1.0])
            })
            .unwrap();
        let phase = &schedule.phases()[0];
        assert!(!phase.is_serial());
        assert_eq!(phase.active_terminals(), 3);
    }

    #[test]
    fn test_trace_driven_ignores_rate_but_keeps_disabled() {
        let mut schedule = PhaseSchedule::new(2, 1).trace_driven(true);
        schedule.add_phase(spec("1", vec![1.0])).unwrap();
        schedule.add_phase(spec("disabled", vec![0.0])).unwrap();

        let phases = schedule.phases();
        assert_eq!(phases[0].rate(), RateLimit::Unlimited);
        assert_eq!(phases[0].mean_interarrival(), None);
        assert!(phases[1].is_disabled());
    }

    #[test]
    fn test_disabled_phase_keeps_its_slot() {
        let mut schedule = PhaseSchedule::new(1, 1);
        schedule
            .add_phase(PhaseSpec {
                duration_secs: 30,
                ..spec("disabled", vec![0.0])
            })
            .unwrap();
        schedule.add_phase(spec("unlimited", vec![1.0])).unwrap();
        schedule.validate_all().unwrap();

        assert!(schedule.phases()[0].is_disabled());
        assert_eq!(schedule.scheduled_duration(), Duration::from_secs(90));
    }
}
