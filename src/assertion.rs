//! Concurrent assertions.
//!
//! An assertion waits for any of its triggers, then evaluates its check in the
//! read-only phase of that time step, before ordinary read-only waiters run.
//! Checks are forked, so a check may itself await later events.
//! Statistics are kept by name for the whole simulation.

use futures::future::{select_all, BoxFuture};
use std::cell::RefCell;
use std::sync::Arc;

use crate::executor::{JoinHandle, Task};
use crate::sim_if::SIM_IF;
use crate::tb_obj::TbObj;
use crate::trigger::Trigger;
use crate::value::Val;
use crate::TbResult;

thread_local! {
    static ASSERTIONS: RefCell<Vec<TbObj<AssertionStats>>> = const { RefCell::new(Vec::new()) };
}

type Check = Arc<dyn Fn() -> BoxFuture<'static, TbResult> + Send + Sync>;

/// Evaluates to `Ok(Val::None)` if the condition holds, else an error naming it.
#[macro_export]
macro_rules! check {
    ($cond:expr) => {
        if $cond {
            Ok($crate::value::Val::None)
        } else {
            Err($crate::value::Val::String(format!("check failed: {}", stringify!($cond))))
        }
    };
}

/// Spawns a named assertion. Captured values must be `Copy` (e.g. `SimObject`).
#[macro_export]
macro_rules! assertion {
    ($name:expr, [$( $trig:expr ),+ $(,)?], $check:expr) => {
        $crate::assertion::Assertion::new(
            $name,
            vec![$( $trig ),+],
            move || $crate::futures::FutureExt::boxed($check),
        )
        .spawn()
    };
}

#[derive(Debug, Clone, PartialEq)]
pub struct AssertionStats {
    pub name: String,
    pub triggered: u32,
    pub passed: u32,
    pub failed: u32,
    pub failures: Vec<String>,
}

impl AssertionStats {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            triggered: 0,
            passed: 0,
            failed: 0,
            failures: Vec::new(),
        }
    }

    fn record(&mut self, result: &TbResult, at_ns: f64) {
        match result {
            Ok(_) => self.passed += 1,
            Err(e) => {
                self.failed += 1;
                self.failures.push(format!("{}ns: {}", at_ns, e));
            }
        }
    }

    pub fn result_str(&self) -> String {
        format!(
            "Assertion {}: Triggered: {}, Passed: {}, Failed: {}.",
            self.name, self.triggered, self.passed, self.failed
        )
    }
}

pub struct Assertion {
    stats: TbObj<AssertionStats>,
    triggers: Vec<Trigger>,
    check: Check,
}

impl Assertion {
    pub fn new(
        name: &str,
        triggers: Vec<Trigger>,
        check: impl Fn() -> BoxFuture<'static, TbResult> + Send + Sync + 'static,
    ) -> Self {
        Self {
            stats: stats_for(name),
            triggers,
            check: Arc::new(check),
        }
    }

    pub fn name(&self) -> String {
        self.stats.get().name.clone()
    }

    /// Runs the assertion until the current test ends or the handle is cancelled.
    pub fn spawn(self) -> JoinHandle {
        let name = format!("assertion {}", self.name());
        Task::spawn_from_future(self.run(), &name)
    }

    async fn run(self) -> TbResult {
        if self.triggers.is_empty() {
            return Err(Val::String(format!("assertion {} has no triggers", self.name())));
        }
        loop {
            let waits: Vec<JoinHandle> = self
                .triggers
                .iter()
                .cloned()
                .map(|trig| {
                    Task::fork(async move {
                        trig.await;
                        Ok(Val::None)
                    })
                })
                .collect();
            let (_, _, rest) = select_all(waits).await;
            for r in rest {
                r.cancel();
            }
            self.stats.with_mut(|s| s.triggered += 1);

            Trigger::read_only_prio().await;
            let check = (self.check)();
            let stats = self.stats.clone();
            Task::fork(async move {
                let result = check.await;
                let at_ns = SIM_IF.get_sim_time("ns");
                if let Err(e) = &result {
                    SIM_IF.log(&format!("{} failed: {}", stats.get().name, e));
                }
                stats.with_mut(|s| s.record(&result, at_ns));
                Ok(Val::None)
            });
        }
    }
}

fn stats_for(name: &str) -> TbObj<AssertionStats> {
    ASSERTIONS.with(|a| {
        let mut a = a.borrow_mut();
        if let Some(existing) = a.iter().find(|s| s.get().name == name) {
            return existing.clone();
        }
        let stats = TbObj::new(AssertionStats::new(name));
        a.push(stats.clone());
        stats
    })
}

pub(crate) fn collect_stats() -> Vec<AssertionStats> {
    ASSERTIONS.with(|a| a.borrow().iter().map(|s| s.get().clone()).collect())
}

pub(crate) fn log_assertion_stats() {
    for stats in collect_stats() {
        SIM_IF.log(&stats.result_str());
    }
}

pub(crate) fn clear_assertions() {
    let old = ASSERTIONS.with(|a| std::mem::take(&mut *a.borrow_mut()));
    drop(old);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_macro_names_condition() {
        let x = 3;
        let ok: TbResult = crate::check!(x == 3);
        let err: TbResult = crate::check!(x == 4);
        assert_eq!(ok, Ok(Val::None));
        assert_eq!(err, Err(Val::String("check failed: x == 4".to_string())));
    }

    #[test]
    fn stats_are_shared_by_name() {
        clear_assertions();
        let a = stats_for("bus_z");
        let b = stats_for("bus_z");
        a.with_mut(|s| s.triggered += 2);
        assert_eq!(b.get().triggered, 2);
        assert_eq!(collect_stats().len(), 1);
        clear_assertions();
    }

    #[test]
    fn record_counts_and_keeps_messages() {
        let mut s = AssertionStats::new("a");
        s.record(&Ok(Val::None), 10.0);
        s.record(&Err(Val::String("bad".to_string())), 20.0);
        assert_eq!((s.passed, s.failed), (1, 1));
        assert_eq!(s.failures, vec!["20ns: bad".to_string()]);
    }
}
