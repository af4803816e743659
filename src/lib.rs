//! Cycle-level model of a loadable up/down 8-bit counter with a tri-state
//! output bus, and an async testbench framework to verify it on an
//! in-process simulator.

pub mod assertion;
pub mod bench;
pub mod config;
pub mod counter;
pub mod design;
pub mod error;
mod executor;
mod junit;
pub mod native;
pub mod prelude;
pub mod report;
pub mod signal;
pub mod sim_if;
mod tb_obj;
pub mod test;
pub mod testbench;
mod trigger;
pub mod tt_counter;
pub mod utils;
pub mod value;

pub use env_logger;
pub use futures;

use futures_channel::oneshot;
use std::cell::{Cell, RefCell};
use std::sync::Arc;
use std::time::Instant;

use config::SimConfig;
use error::SimResult;
use executor::Task;
use report::{SimReport, TestOutcome};
use sim_if::SIM_IF;
use tb_obj::TbObj;
use test::{TbTests, Test};
use value::Val;

pub type TbResult = Result<Val, Val>;

struct CurrentTest {
    task: Arc<Task>,
    test: TbObj<Test>,
    done: oneshot::Sender<()>,
}

thread_local! {
    static SIM_START_TIME: Cell<Option<Instant>> = const { Cell::new(None) };
    static CURRENT_TEST: RefCell<Option<CurrentTest>> = const { RefCell::new(None) };
    static TESTS: RefCell<Vec<TbObj<Test>>> = const { RefCell::new(Vec::new()) };
}

/// Passes the running test, unless it already has a result.
pub fn pass_test(msg: &str) {
    finish_test(Ok(Val::String(msg.to_string())));
}

/// Fails the running test, unless it already has a result.
pub fn fail_test(msg: &str) {
    finish_test(Err(Val::String(msg.to_string())));
}

fn finish_test(result: TbResult) {
    let Some(current) = CURRENT_TEST.with(|c| c.borrow_mut().take()) else {
        return;
    };
    current.test.with_mut(|t| t.finish(result));
    tear_down_test(&current.task);
    // wakes the test chain, which starts the next test
    let _ = current.done.send(());
}

fn tear_down_test(task: &Arc<Task>) {
    trigger::cancel_all_triggers();
    executor::clear_ready_queue();
    executor::end_scope();
    task.cancel();
}

/// Fails the running test and stops the chain, as the simulation will not continue.
pub(crate) fn abort_simulation(msg: &str) {
    SIM_IF.log(&format!("Aborting simulation: {}", msg));
    let current = CURRENT_TEST.with(|c| c.borrow_mut().take());
    if let Some(current) = current {
        current.test.with_mut(|t| t.finish(Err(Val::String(msg.to_string()))));
        tear_down_test(&current.task);
    }
    trigger::cancel_all_triggers();
    executor::clear_ready_queue();
}

/// Drops everything a previous simulation on this thread left behind.
pub(crate) fn reset_thread_state() {
    let current = CURRENT_TEST.with(|c| c.borrow_mut().take());
    if let Some(current) = current {
        current.task.cancel();
    }
    trigger::cancel_all_triggers();
    executor::clear_ready_queue();
    signal::clear_cache();
    assertion::clear_assertions();
    let tests = TESTS.with(|t| std::mem::take(&mut *t.borrow_mut()));
    drop(tests);
    SIM_START_TIME.with(|t| t.set(None));
}

async fn run_test(root: signal::SimObject, test: TbObj<Test>) -> TbResult {
    let (name, generator) = test.with_mut(|t| {
        t.start();
        (t.name.clone(), t.generator)
    });
    SIM_IF.log(&format!("Running test {}", name));
    let result = generator(root).await;
    finish_test(result);
    Ok(Val::None)
}

pub(crate) fn start_of_simulation(tests: TbTests) -> SimResult<()> {
    SIM_START_TIME.with(|t| t.set(Some(Instant::now())));
    let sim_root = signal::SimObject::get_root()?;
    let tests = tests.into_vec();
    TESTS.with(|t| *t.borrow_mut() = tests.clone());

    // Tests run one after the other; each is a task of its own, so tearing a
    // test down does not stop the chain.
    Task::spawn_persistent(
        async move {
            for test in tests {
                let (done_tx, done_rx) = oneshot::channel();
                let name = test.get().name.clone();
                let handle = Task::spawn_from_future(run_test(sim_root, test.clone()), &name);
                if let Some(task) = handle.task() {
                    CURRENT_TEST.with(|c| {
                        *c.borrow_mut() = Some(CurrentTest { task, test, done: done_tx });
                    });
                }
                let _ = done_rx.await;
            }
            Ok(Val::None)
        },
        "test chain",
    );

    // execute first simulation tick
    executor::run_once();
    Ok(())
}

pub(crate) fn end_of_simulation(config: &SimConfig) -> SimResult<SimReport> {
    if CURRENT_TEST.with(|c| c.borrow().is_some()) {
        fail_test("test did not finish before the simulation ended");
    }
    let duration = SIM_START_TIME
        .with(|t| t.get())
        .map_or(0.0, |start| start.elapsed().as_secs_f64());
    let final_sim_time = SIM_IF.get_sim_time("ns");

    let tests = TESTS.with(|t| t.borrow().clone());
    let outcomes: Vec<TestOutcome> = tests
        .iter()
        .map(|test| {
            let t = test.get();
            let (passed, message) = match &t.result {
                Some(Ok(v)) => (true, v.to_string()),
                Some(Err(v)) => (false, v.to_string()),
                None => (false, "test was not run".to_string()),
            };
            TestOutcome {
                name: t.name.clone(),
                passed,
                message,
                time_secs: t.time_secs,
                sim_time_ns: t.sim_time_ns,
            }
        })
        .collect();

    for t in outcomes.iter() {
        let sim_speed = if t.time_secs > 0.0 { t.sim_time_ns / t.time_secs } else { 0.0 };
        SIM_IF.log(&format!(
            "TEST {}: Result={}, Time={:.3}, SimTime={}ns, SimSpeed={:.3}ns/s",
            t.name,
            if t.passed { "passed" } else { "failed" },
            t.time_secs,
            t.sim_time_ns,
            sim_speed
        ));
        if !t.passed {
            SIM_IF.log(&format!("TEST {} failed: {}", t.name, t.message));
        }
    }
    assertion::log_assertion_stats();

    let report = SimReport {
        suite: config.suite_name.clone(),
        tests: outcomes,
        assertions: assertion::collect_stats(),
        sim_time_ns: final_sim_time,
        real_time_secs: duration,
    };
    SIM_IF.log("TOTAL SIMULATION");
    SIM_IF.log(&format!("Simulation time: {} ns", report.sim_time_ns));
    SIM_IF.log(&format!("Real time: {:.3} s", report.real_time_secs));
    SIM_IF.log(&format!("Simulation speed: {:.3} ns/s", report.sim_speed()));

    if config.print_summary {
        report.print_table();
    }
    if let Some(path) = &config.results_file {
        junit::write_junit_xml(&report, path)?;
    }
    Ok(report)
}
