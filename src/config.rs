use std::path::PathBuf;

use crate::error::{SimError, SimResult};

/// Time steps from 1 fs to 1 s.
pub const PRECISION_RANGE: std::ops::RangeInclusive<i8> = -15..=0;

/// Simulation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Time step as a power of ten in seconds (`-12` = 1 ps).
    pub precision: i8,
    /// The running test fails once simulation time passes this limit.
    pub max_sim_time_ns: Option<u64>,
    /// JUnit XML output; nothing is written when `None`.
    pub results_file: Option<PathBuf>,
    pub suite_name: String,
    pub print_summary: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            precision: -12,
            max_sim_time_ns: Some(10_000_000_000),
            results_file: None,
            suite_name: env!("CARGO_PKG_NAME").to_string(),
            print_summary: false,
        }
    }
}

impl SimConfig {
    /// Defaults overridden by `COUNTBENCH_PRECISION`, `COUNTBENCH_MAX_TIME_NS`,
    /// `COUNTBENCH_RESULTS` and `COUNTBENCH_SUITE`.
    pub fn from_env() -> SimResult<Self> {
        Self::default().with_overrides(|var| std::env::var(var).ok())
    }

    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> SimResult<Self> {
        if let Some(v) = lookup("COUNTBENCH_PRECISION") {
            self.precision = v
                .parse::<i8>()
                .ok()
                .filter(|p| PRECISION_RANGE.contains(p))
                .ok_or_else(|| config_err("COUNTBENCH_PRECISION", &v))?;
        }
        if let Some(v) = lookup("COUNTBENCH_MAX_TIME_NS") {
            self.max_sim_time_ns = match v.as_str() {
                "" | "none" => None,
                _ => Some(v.parse().map_err(|_| config_err("COUNTBENCH_MAX_TIME_NS", &v))?),
            };
        }
        if let Some(v) = lookup("COUNTBENCH_RESULTS") {
            self.results_file = (!v.is_empty()).then(|| PathBuf::from(v));
        }
        if let Some(v) = lookup("COUNTBENCH_SUITE") {
            self.suite_name = v;
        }
        Ok(self)
    }

    /// Rejects settings the kernel can't run with.
    pub fn validate(&self) -> SimResult<()> {
        if !PRECISION_RANGE.contains(&self.precision) {
            return Err(config_err("precision", &self.precision.to_string()));
        }
        Ok(())
    }

    pub fn precision(mut self, precision: i8) -> Self {
        self.precision = precision;
        self
    }

    pub fn max_sim_time_ns(mut self, limit: Option<u64>) -> Self {
        self.max_sim_time_ns = limit;
        self
    }

    pub fn results_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.results_file = Some(path.into());
        self
    }

    pub fn suite_name(mut self, name: &str) -> Self {
        self.suite_name = name.to_string();
        self
    }

    pub fn print_summary(mut self, on: bool) -> Self {
        self.print_summary = on;
        self
    }
}

fn config_err(var: &str, value: &str) -> SimError {
    SimError::Config {
        var: var.to_string(),
        value: value.to_string(),
    }
}
