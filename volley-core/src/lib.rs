//! Benchmark orchestration core for volley
//!
//! Leaf-first: the [`attack::Attacker`] paces requests and yields
//! [`outcome::Outcome`]s, the [`metrics::MetricsAggregator`] folds one run's
//! outcomes into [`metrics::RunMetrics`], the [`probe::ReadinessProber`]
//! gates load on a healthy target, the [`runner::MatrixRunner`] walks a
//! [`plan::BenchmarkPlan`] cell by cell, and [`bench::Benchmark`] ties these
//! to the server process and collaborator hooks.

pub mod attack;
pub mod bench;
pub mod error;
pub mod hooks;
pub mod metrics;
pub mod outcome;
pub mod plan;
pub mod probe;
pub mod process;
pub mod progress;
pub mod rate;
pub mod report;
pub mod runner;

// Re-export commonly used types at the crate root
pub use attack::{Attacker, OutcomeStream};
pub use bench::{BenchReport, Benchmark, BenchmarkBuilder, SUCCESS_MESSAGE};
pub use error::{BenchError, HookError, ProcessError};
pub use hooks::{Collaborator, CommandHooks, NoopHooks};
pub use metrics::{LatencyMetrics, MetricsAggregator, RunMetrics};
pub use outcome::{Outcome, TRANSPORT_FAILURE};
pub use plan::{BenchmarkPlan, PlanCell, TargetTemplate};
pub use probe::{ProbeReport, ReadinessProber};
pub use process::{
    ChildLauncher, ManagedServer, ProcessLifecycleManager, ProcessState, ServerLauncher,
    ServerProcess, ServerSpec, ServerWatch,
};
pub use progress::{NoopProgress, ProgressFn, ProgressObserver};
pub use rate::Rate;
pub use report::{
    format_latency, CellReport, MemorySink, ReportEvent, ReportSink, StdoutSink, SummaryLine,
};
pub use runner::MatrixRunner;
