//! Rate-controlled execution engine: arrival control, transaction selection,
//! virtual terminals and run orchestration.

pub mod arrival;
pub mod clock;
pub mod dispatcher;
pub mod error;
pub mod monitor;
pub mod selector;
pub mod worker;

pub use arrival::{terminal_seed, ArrivalController, NextArrival};
pub use clock::RunClock;
pub use dispatcher::{ActivePhase, BenchmarkRun, Dispatcher, PhaseSignal, RunReport};
pub use error::{DriverError, DriverResult};
pub use monitor::{ProgressMonitor, ProgressSnapshot};
pub use selector::{Selection, TransactionSelector};
pub use worker::{WorkerProgress, WorkerState};
