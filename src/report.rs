use prettytable::{format, Cell, Row, Table};

use crate::assertion::AssertionStats;

/// Result of one test in a finished simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct TestOutcome {
    pub name: String,
    pub passed: bool,
    pub message: String,
    pub time_secs: f64,
    pub sim_time_ns: f64,
}

/// What a simulation run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct SimReport {
    pub suite: String,
    pub tests: Vec<TestOutcome>,
    pub assertions: Vec<AssertionStats>,
    pub sim_time_ns: f64,
    pub real_time_secs: f64,
}

impl SimReport {
    /// Every test passed and no assertion failed.
    pub fn passed(&self) -> bool {
        self.tests.iter().all(|t| t.passed) && self.assertions.iter().all(|a| a.failed == 0)
    }

    pub fn failures(&self) -> Vec<&TestOutcome> {
        self.tests.iter().filter(|t| !t.passed).collect()
    }

    pub fn test(&self, name: &str) -> Option<&TestOutcome> {
        self.tests.iter().find(|t| t.name == name)
    }

    pub fn assertion(&self, name: &str) -> Option<&AssertionStats> {
        self.assertions.iter().find(|a| a.name == name)
    }

    pub fn sim_speed(&self) -> f64 {
        if self.real_time_secs > 0.0 {
            self.sim_time_ns / self.real_time_secs
        } else {
            0.0
        }
    }

    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.set_format(*format::consts::FORMAT_NO_BORDER_LINE_SEPARATOR);
        table.set_titles(Row::new(
            ["TEST", "RESULT", "SIM TIME (ns)", "REAL TIME (s)", "RATIO (ns/s)"]
                .iter()
                .map(|t| Cell::new(t))
                .collect(),
        ));
        for t in self.tests.iter() {
            let ratio = if t.time_secs > 0.0 { t.sim_time_ns / t.time_secs } else { 0.0 };
            table.add_row(Row::new(vec![
                Cell::new(&t.name),
                Cell::new(if t.passed { "PASS" } else { "FAIL" }),
                Cell::new(&format!("{:.1}", t.sim_time_ns)),
                Cell::new(&format!("{:.3}", t.time_secs)),
                Cell::new(&format!("{:.1}", ratio)),
            ]));
        }
        for a in self.assertions.iter() {
            table.add_row(Row::new(vec![
                Cell::new(&format!("assertion {}", a.name)),
                Cell::new(if a.failed == 0 { "PASS" } else { "FAIL" }),
                Cell::new(&format!("{} triggered", a.triggered)),
                Cell::new(&format!("{} passed", a.passed)),
                Cell::new(&format!("{} failed", a.failed)),
            ]));
        }
        table.add_row(Row::new(vec![
            Cell::new(&format!("TESTS={} PASS={} FAIL={}",
                self.tests.len(),
                self.tests.len() - self.failures().len(),
                self.failures().len())),
            Cell::new(""),
            Cell::new(&format!("{:.1}", self.sim_time_ns)),
            Cell::new(&format!("{:.3}", self.real_time_secs)),
            Cell::new(&format!("{:.1}", self.sim_speed())),
        ]));
        table
    }

    pub fn print_table(&self) {
        self.table().printstd();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn outcome(name: &str, passed: bool) -> TestOutcome {
        TestOutcome {
            name: name.to_string(),
            passed,
            message: String::new(),
            time_secs: 0.5,
            sim_time_ns: 100.0,
        }
    }

    fn report(tests: Vec<TestOutcome>, assertions: Vec<AssertionStats>) -> SimReport {
        SimReport {
            suite: "countbench".to_string(),
            tests,
            assertions,
            sim_time_ns: 200.0,
            real_time_secs: 1.0,
        }
    }

    #[test]
    fn failures_lists_failed_tests() {
        let r = report(vec![outcome("a", true), outcome("b", false)], vec![]);
        assert!(!r.passed());
        let names: Vec<&str> = r.failures().iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["b"]);
    }

    #[test]
    fn assertion_failure_fails_report() {
        let mut stats = AssertionStats::new("bus_z");
        stats.failed = 1;
        let r = report(vec![outcome("a", true)], vec![stats]);
        assert!(!r.passed());
        assert!(r.failures().is_empty());
    }

    #[test]
    fn table_has_row_per_test_and_total() {
        let r = report(vec![outcome("a", true), outcome("b", true)], vec![]);
        assert!(r.passed());
        assert_eq!(r.table().len(), 3);
    }
}
