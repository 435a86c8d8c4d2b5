//! Summary lines and report sinks

use crate::metrics::RunMetrics;
use crate::plan::PlanCell;
use colored::Colorize;
use serde::Serialize;
use std::fmt;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;
use volley_http::HttpMethod;

const BANNER: &str = "=========================================";
const RULE: &str = "─────────────────────────────────────────────────────────────────";

/// Result of one matrix cell
#[derive(Debug, Clone, Serialize)]
pub struct CellReport {
    pub cell: PlanCell,
    pub method: HttpMethod,
    /// Path and query actually requested
    pub path: String,
    pub metrics: RunMetrics,
}

/// The printed form of one cell
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryLine {
    pub concurrency: u32,
    pub rate: f64,
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
    pub error_rate: f64,
    pub first_error: Option<String>,
    pub other_errors: usize,
    pub total: u64,
}

impl SummaryLine {
    pub fn from_report(report: &CellReport) -> Self {
        let metrics = &report.metrics;
        Self {
            concurrency: report.cell.concurrency,
            rate: metrics.rate,
            p50: metrics.latencies.p50,
            p95: metrics.latencies.p95,
            p99: metrics.latencies.p99,
            error_rate: metrics.error_rate(),
            first_error: metrics.first_error().map(str::to_string),
            other_errors: metrics.errors.len().saturating_sub(1),
            total: metrics.requests,
        }
    }
}

impl fmt::Display for SummaryLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  Concurrency: {:<3} | RPS: {:>7.0} | p50: {:>8} | p95: {:>8} | p99: {:>8} | ",
            self.concurrency,
            self.rate,
            format_latency(self.p50),
            format_latency(self.p95),
            format_latency(self.p99),
        )?;

        match &self.first_error {
            Some(error) => {
                write!(f, "Errors: {:.2}% ({})", self.error_rate * 100.0, error)?;
                if self.other_errors > 0 {
                    write!(f, " (+{} more)", self.other_errors)?;
                }
            }
            None => write!(f, "Errors: 0")?,
        }

        write!(f, " | Total: {}", self.total)
    }
}

/// Compact latency rendering: `850ns`, `12.40µs`, `10.23ms`, `1.50s`
pub fn format_latency(latency: Duration) -> String {
    let nanos = latency.as_nanos();
    if nanos < 1_000 {
        format!("{}ns", nanos)
    } else if nanos < 1_000_000 {
        format!("{:.2}µs", nanos as f64 / 1e3)
    } else if nanos < 1_000_000_000 {
        format!("{:.2}ms", nanos as f64 / 1e6)
    } else {
        format!("{:.2}s", latency.as_secs_f64())
    }
}

/// Where summary lines go. Groups are consecutive cells sharing a limit.
pub trait ReportSink: Send + Sync {
    /// Before the first cell
    fn begin(&self) {}

    fn begin_group(&self, method: HttpMethod, path: &str);

    fn summary(&self, line: &SummaryLine);

    fn end_group(&self);

    /// After the last cell
    fn finish(&self) {}
}

/// Human-readable report on stdout
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutSink {
    color: bool,
}

impl StdoutSink {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn banner(&self, title: &str) {
        let mut out = std::io::stdout().lock();
        let title = format!("{:^41}", title);
        let title = if self.color {
            title.bold().to_string()
        } else {
            title
        };
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", BANNER);
        let _ = writeln!(out, "{}", title.trim_end());
        let _ = writeln!(out, "{}", BANNER);
        let _ = writeln!(out);
    }
}

impl ReportSink for StdoutSink {
    fn begin(&self) {
        self.banner("Running Benchmarks");
    }

    fn begin_group(&self, method: HttpMethod, path: &str) {
        let header = format!("Benchmarking {} {}", method, path);
        let header = if self.color {
            header.cyan().bold().to_string()
        } else {
            header
        };
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", header);
        let _ = writeln!(out, "{}", RULE);
    }

    fn summary(&self, line: &SummaryLine) {
        let rendered = line.to_string();
        let rendered = if self.color && line.first_error.is_some() {
            rendered.yellow().to_string()
        } else {
            rendered
        };
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}", rendered);
        let _ = out.flush();
    }

    fn end_group(&self) {
        println!();
    }

    fn finish(&self) {
        self.banner("Benchmark Complete");
    }
}

/// Sink events, as recorded by [`MemorySink`]
#[derive(Debug, Clone, PartialEq)]
pub enum ReportEvent {
    Begin,
    Group { method: HttpMethod, path: String },
    Summary(SummaryLine),
    EndGroup,
    Finish,
}

/// Records everything; used by tests and embedders
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ReportEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ReportEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Summary lines in the order they were reported
    pub fn lines(&self) -> Vec<SummaryLine> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                ReportEvent::Summary(line) => Some(line),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ReportEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl ReportSink for MemorySink {
    fn begin(&self) {
        self.push(ReportEvent::Begin);
    }

    fn begin_group(&self, method: HttpMethod, path: &str) {
        self.push(ReportEvent::Group {
            method,
            path: path.to_string(),
        });
    }

    fn summary(&self, line: &SummaryLine) {
        self.push(ReportEvent::Summary(line.clone()));
    }

    fn end_group(&self) {
        self.push(ReportEvent::EndGroup);
    }

    fn finish(&self) {
        self.push(ReportEvent::Finish);
    }
}
