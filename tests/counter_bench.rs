use countbench::bench::{
    test_chip_enable_gating, test_project, test_random_stimulus, test_reset_dominance,
    test_wraparound,
};
use countbench::config::SimConfig;
use countbench::counter::ControlBits;
use countbench::design::{Design, Pins, Port};
use countbench::native;
use countbench::report::SimReport;
use countbench::tb_tests;
use countbench::test::TbTests;
use countbench::tt_counter::TtCounter;
use countbench::value::LogicVec;
use pretty_assertions::assert_eq;

fn run(design: impl Design + 'static, tests: TbTests) -> SimReport {
    let _ = env_logger::builder().is_test(true).try_init();
    native::run(Box::new(design), tests, &SimConfig::default()).unwrap()
}

#[test]
fn project_scenarios() {
    let report = run(TtCounter::new(), tb_tests!(test_project));
    assert!(report.passed(), "{:?}", report.failures());
}

#[test]
fn all_benches_in_one_simulation() {
    let report = run(
        TtCounter::new(),
        tb_tests!(
            test_project,
            test_reset_dominance,
            test_wraparound,
            test_chip_enable_gating,
            test_random_stimulus,
        ),
    );
    assert!(report.passed(), "{:?}", report.failures());
    assert_eq!(report.tests.len(), 5);

    let bus_z = report.assertion("bus_z_iff_not_enabled").unwrap();
    assert_eq!(bus_z.failed, 0);
    assert!(bus_z.triggered > 500);
    assert_eq!(bus_z.triggered, bus_z.passed);
}

/// Counter wired as if the load pin were not connected.
struct IgnoresLoad(TtCounter);

impl Design for IgnoresLoad {
    fn name(&self) -> &str {
        self.0.name()
    }
    fn ports(&self) -> Vec<Port> {
        self.0.ports()
    }
    fn clock(&self) -> &'static str {
        self.0.clock()
    }
    fn clock_edge(&mut self, inputs: &Pins) {
        let mut pins = inputs.clone();
        let ui_in = inputs.bits("ui_in") & !u64::from(ControlBits::LOAD);
        pins.set("ui_in", LogicVec::from_u64(8, ui_in));
        self.0.clock_edge(&pins);
    }
    fn drive(&self, inputs: &Pins, outputs: &mut Pins) {
        self.0.drive(inputs, outputs)
    }
}

#[test]
fn faulty_design_reports_every_mismatch() {
    let report = run(IgnoresLoad(TtCounter::new()), tb_tests!(test_project));
    assert!(!report.passed());
    let outcome = report.test("test_project").unwrap();
    assert!(!outcome.passed);

    // 1 + 10 + 20 model mismatches after the missed load, plus 3 literal checks
    assert!(outcome.message.contains("errors=34"), "{}", outcome.message);
    assert!(outcome
        .message
        .contains("(bus after load): expected Driven(121), received Driven(0)"));
    assert!(outcome
        .message
        .contains("(count up [9]): expected Driven(131), received Driven(10)"));
    assert!(!outcome.message.contains("bus released"));
}
