use junit_report::{Duration, ReportBuilder, TestCaseBuilder, TestSuiteBuilder};
use std::path::Path;

use crate::error::{SimError, SimResult};
use crate::report::SimReport;

pub(crate) fn write_junit_xml(report: &SimReport, path: &Path) -> SimResult<()> {
    let mut test_cases = Vec::new();

    for t in report.tests.iter() {
        let tc = match t.passed {
            true => TestCaseBuilder::success(&t.name, Duration::seconds_f64(t.time_secs)),
            false => TestCaseBuilder::failure(
                &t.name,
                Duration::seconds_f64(t.time_secs),
                "failure",
                &t.message,
            ),
        }
        .build();
        test_cases.push(tc);
    }
    for a in report.assertions.iter().filter(|a| a.failed > 0) {
        let tc = TestCaseBuilder::failure(
            &format!("assertion {}", a.name),
            Duration::ZERO,
            "assertion",
            &a.failures.join("\n"),
        )
        .build();
        test_cases.push(tc);
    }

    let test_suite = TestSuiteBuilder::new(&report.suite)
        .add_testcases(test_cases)
        .build();
    let xml = ReportBuilder::new().add_testsuite(test_suite).build();

    let report_err = |message: String| SimError::Report {
        path: path.display().to_string(),
        message,
    };
    let file = std::fs::File::create(path).map_err(|e| report_err(e.to_string()))?;
    xml.write_xml(file).map_err(|e| report_err(e.to_string()))?;
    log::info!(target: "countbench", "wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::TestOutcome;

    #[test]
    fn writes_failures_with_message() {
        let report = SimReport {
            suite: "junit_suite".to_string(),
            tests: vec![TestOutcome {
                name: "test_load".to_string(),
                passed: false,
                message: "bus mismatch".to_string(),
                time_secs: 0.1,
                sim_time_ns: 50.0,
            }],
            assertions: vec![],
            sim_time_ns: 50.0,
            real_time_secs: 0.1,
        };
        let path = std::env::temp_dir().join(format!("countbench_junit_{}.xml", std::process::id()));
        write_junit_xml(&report, &path).unwrap();
        let xml = std::fs::read_to_string(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert!(xml.contains("junit_suite"));
        assert!(xml.contains("test_load"));
        assert!(xml.contains("bus mismatch"));
    }

    #[test]
    fn unwritable_path_is_report_error() {
        let report = SimReport {
            suite: "s".to_string(),
            tests: vec![],
            assertions: vec![],
            sim_time_ns: 0.0,
            real_time_secs: 0.0,
        };
        let path = Path::new("/nonexistent-dir/countbench/results.xml");
        assert!(matches!(
            write_junit_xml(&report, path),
            Err(SimError::Report { .. })
        ));
    }
}
