use futures::future::BoxFuture;
use std::time::Instant;

use crate::signal::SimObject;
use crate::sim_if::SIM_IF;
use crate::tb_obj::TbObj;
use crate::TbResult;

pub type TestFn = fn(SimObject) -> BoxFuture<'static, TbResult>;

/// Tests of one simulation, run in the order they were added.
#[derive(Debug, Default)]
pub struct TbTests(Vec<TbObj<Test>>);

impl TbTests {
    pub fn new() -> Self {
        Self(Vec::new())
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(&self) -> core::slice::Iter<'_, TbObj<Test>> {
        self.0.iter()
    }
    pub fn push(&mut self, test: Test) {
        self.0.push(TbObj::new(test));
    }
    pub fn add(&mut self, name: &str, generator: TestFn) {
        self.push(Test::new(name, generator));
    }
    pub(crate) fn into_vec(self) -> Vec<TbObj<Test>> {
        self.0
    }
}

#[derive(Debug)]
pub struct Test {
    pub name: String,
    pub generator: TestFn,
    pub result: Option<TbResult>,
    pub time_secs: f64,
    pub sim_time_ns: f64,
    started: Option<(Instant, f64)>,
}

impl Test {
    pub fn new(name: &str, generator: TestFn) -> Self {
        Self {
            name: name.to_string(),
            generator,
            result: None,
            time_secs: 0.0,
            sim_time_ns: 0.0,
            started: None,
        }
    }

    pub(crate) fn start(&mut self) {
        self.started = Some((Instant::now(), SIM_IF.get_sim_time("ns")));
    }

    /// Records the first result only; later calls are ignored.
    pub(crate) fn finish(&mut self, result: TbResult) {
        if self.result.is_some() {
            return;
        }
        if let Some((real, sim_ns)) = self.started {
            self.time_secs = real.elapsed().as_secs_f64();
            self.sim_time_ns = SIM_IF.get_sim_time("ns") - sim_ns;
        }
        self.result = Some(result);
    }

    pub fn passed(&self) -> bool {
        matches!(self.result, Some(Ok(_)))
    }
}

/// Builds [`TbTests`] from async test functions, named after the functions.
#[macro_export]
macro_rules! tb_tests {
    ($( $i:ident ),+ $(,)?) => {{
        let mut tests = $crate::test::TbTests::new();
        $(
            tests.add(stringify!($i), |dut| $crate::futures::FutureExt::boxed($i(dut)));
        )+
        tests
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Val;

    async fn noop(_dut: SimObject) -> TbResult {
        Ok(Val::None)
    }

    #[test]
    fn macro_keeps_order_and_names() {
        let tests = crate::tb_tests!(noop, noop);
        let names: Vec<String> = tests.iter().map(|t| t.get().name.clone()).collect();
        assert_eq!(names, vec!["noop", "noop"]);
    }

    #[test]
    fn first_result_wins() {
        let mut test = Test::new("t", |dut| futures::FutureExt::boxed(noop(dut)));
        test.finish(Err(Val::String("timeout".to_string())));
        test.finish(Ok(Val::None));
        assert!(!test.passed());
        assert_eq!(test.result, Some(Err(Val::String("timeout".to_string()))));
    }
}
