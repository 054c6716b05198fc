//! Per-stage timings and memory counters.

use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::config::{MonitoringLevel, Options};
use crate::warnings::{WarningKind, WarningSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Plan,
    Execute,
    Validate,
    Audit,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Extract => "extract",
            Stage::Plan => "plan",
            Stage::Execute => "execute",
            Stage::Validate => "validate",
            Stage::Audit => "audit",
        }
    }
}

#[derive(Debug)]
pub struct Monitor {
    level: MonitoringLevel,
    timings: Vec<(Stage, Duration)>,
}

impl Monitor {
    pub fn new(level: MonitoringLevel) -> Self {
        Self {
            level,
            timings: Vec::new(),
        }
    }

    pub fn time<T>(&mut self, stage: Stage, work: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let result = work();
        let elapsed = started.elapsed();
        self.timings.push((stage, elapsed));
        if !matches!(self.level, MonitoringLevel::Basic) {
            info!(
                stage = stage.as_str(),
                elapsed_ms = elapsed.as_millis() as u64,
                rss_mb = rss_mb().unwrap_or(0),
                "stage finished"
            );
        }
        result
    }

    pub fn timings(&self) -> &[(Stage, Duration)] {
        &self.timings
    }

    pub fn total(&self) -> Duration {
        self.timings.iter().map(|(_, d)| *d).sum()
    }

    /// Compare resident memory against the configured thresholds.
    pub fn check_memory(&self, options: &Options, sink: &mut WarningSink) {
        let Some(rss) = rss_mb() else {
            return;
        };
        if rss >= options.memory_critical_mb {
            warn!(rss_mb = rss, "memory above critical threshold");
            sink.push(
                WarningKind::Monitor,
                "monitor",
                format!(
                    "resident memory {rss} MB above critical threshold {} MB",
                    options.memory_critical_mb
                ),
            );
        } else if rss >= options.memory_warning_mb {
            sink.push(
                WarningKind::Monitor,
                "monitor",
                format!(
                    "resident memory {rss} MB above warning threshold {} MB",
                    options.memory_warning_mb
                ),
            );
        }
    }
}

/// Resident set size in MiB, best effort.
pub fn rss_mb() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        for line in status.lines() {
            if let Some(rest) = line.strip_prefix("VmRSS:") {
                let kb: u64 = rest.trim().trim_end_matches("kB").trim().parse().ok()?;
                return Some(kb / 1024);
            }
        }
        None
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}
