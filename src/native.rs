//! In-process event-driven simulator hosting a [`Design`].
//!
//! One time step runs in phases: timer callbacks, then delta cycles (commit
//! pending writes, clock the design on a rising clock edge, recompute outputs,
//! fire value-change callbacks) until no writes are pending, then read-write
//! synch (followed by more delta cycles), then read-only synch. Afterwards
//! time advances to the earliest pending timer.
//!
//! All state is thread-local; a thread runs at most one simulation at a time.

use intmap::IntMap;
use num_format::{Locale, ToFormattedString};
use std::cell::RefCell;
use std::collections::BTreeMap;

use crate::config::SimConfig;
use crate::design::{Design, Pins, Port, PortDirection};
use crate::error::{SimError, SimResult};
use crate::report::SimReport;
use crate::sim_if::{ldexp10, SimCallback, SimIf, SIM_IF};
use crate::signal::{ObjectKind, SimObject};
use crate::test::TbTests;
use crate::trigger::{self, EdgeKind};
use crate::value::LogicVec;

const ROOT_HANDLE: usize = 0;
const MAX_DELTAS: usize = 10_000;

thread_local! {
    static KERNEL: RefCell<Option<Kernel>> = const { RefCell::new(None) };
}

struct Net {
    port: Port,
    value: LogicVec,
}

struct Kernel {
    design: Box<dyn Design>,
    top: String,
    clock: usize,
    // net handle is index + 1, 0 is the root scope
    nets: Vec<Net>,
    time: u64,
    precision: i8,
    pending: Vec<(usize, LogicVec)>,
    callbacks: IntMap<SimCallback>,
    timers: BTreeMap<u64, usize>,
    edges: IntMap<usize>,
    read_write: Option<usize>,
    read_only: Option<usize>,
    next_cb: usize,
}

impl Kernel {
    fn new(design: Box<dyn Design>, precision: i8) -> Self {
        let nets: Vec<Net> = design
            .ports()
            .into_iter()
            .map(|port| Net { port, value: LogicVec::zero(port.width) })
            .collect();
        let clock_name = design.clock();
        let clock = nets
            .iter()
            .position(|n| n.port.name == clock_name)
            .map_or(usize::MAX, |i| i + 1);
        let mut kernel = Kernel {
            top: design.name().to_string(),
            design,
            clock,
            nets,
            time: 0,
            precision,
            pending: Vec::new(),
            callbacks: IntMap::new(),
            timers: BTreeMap::new(),
            edges: IntMap::new(),
            read_write: None,
            read_only: None,
            next_cb: 1,
        };
        let _ = kernel.drive_outputs();
        kernel
    }

    fn net(&self, handle: usize) -> SimResult<&Net> {
        handle
            .checked_sub(1)
            .and_then(|i| self.nets.get(i))
            .ok_or(SimError::InvalidHandle(handle))
    }

    fn full_name(&self, handle: usize) -> SimResult<String> {
        if handle == ROOT_HANDLE {
            return Ok(self.top.clone());
        }
        Ok(format!("{}.{}", self.top, self.net(handle)?.port.name))
    }

    fn lookup(&self, name: &str) -> SimResult<SimObject> {
        if name == self.top {
            return Ok(SimObject { handle: ROOT_HANDLE, kind: ObjectKind::Hier });
        }
        name.strip_prefix(self.top.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .and_then(|port| self.nets.iter().position(|n| n.port.name == port))
            .map(|i| SimObject {
                handle: i + 1,
                kind: ObjectKind::Int(self.nets[i].port.width),
            })
            .ok_or_else(|| SimError::UnknownObject(name.to_string()))
    }

    fn write(&mut self, handle: usize, value: LogicVec) -> SimResult<()> {
        let net = self.net(handle)?;
        if net.port.direction != PortDirection::Input {
            return Err(SimError::ReadOnlyPort(self.full_name(handle)?));
        }
        if value.width() != net.port.width {
            return Err(SimError::WidthMismatch {
                name: self.full_name(handle)?,
                expected: net.port.width,
                got: value.width(),
            });
        }
        self.pending.push((handle, value));
        Ok(())
    }

    fn pins(&self, direction: PortDirection) -> Pins {
        let mut pins = Pins::new();
        for net in self.nets.iter().filter(|n| n.port.direction == direction) {
            pins.set(net.port.name, net.value);
        }
        pins
    }

    /// Recomputes outputs, returning the handles that changed with their edge.
    fn drive_outputs(&mut self) -> Vec<(usize, EdgeKind)> {
        let inputs = self.pins(PortDirection::Input);
        let mut outputs = self.pins(PortDirection::Output);
        self.design.drive(&inputs, &mut outputs);
        let mut changed = Vec::new();
        for (name, value) in outputs.iter() {
            if let Some(i) = self.nets.iter().position(|n| n.port.name == *name) {
                let net = &mut self.nets[i];
                if net.value != *value {
                    changed.push((i + 1, edge_kind(&net.value, value)));
                    net.value = *value;
                }
            }
        }
        changed
    }

    /// One delta cycle. `None` if nothing was pending.
    fn commit(&mut self) -> Option<Vec<(usize, EdgeKind)>> {
        if self.pending.is_empty() {
            return None;
        }
        // last write to a net within a delta wins
        let mut latest: Vec<(usize, LogicVec)> = Vec::new();
        for (handle, value) in self.pending.drain(..) {
            match latest.iter_mut().find(|(h, _)| *h == handle) {
                Some(slot) => slot.1 = value,
                None => latest.push((handle, value)),
            }
        }

        let mut changed = Vec::new();
        let mut clock_rose = false;
        for (handle, value) in latest {
            let net = &mut self.nets[handle - 1];
            if net.value == value {
                continue;
            }
            let edge = edge_kind(&net.value, &value);
            net.value = value;
            if handle == self.clock && edge == EdgeKind::Rising {
                clock_rose = true;
            }
            changed.push((handle, edge));
        }
        if changed.is_empty() {
            return Some(changed);
        }
        if clock_rose {
            let inputs = self.pins(PortDirection::Input);
            self.design.clock_edge(&inputs);
        }
        changed.extend(self.drive_outputs());
        changed.retain(|(handle, _)| self.edges.contains_key(*handle as u64));
        Some(changed)
    }

    fn add_callback(&mut self, cb: SimCallback) -> usize {
        let handle = self.next_cb;
        self.next_cb += 1;
        self.callbacks.insert(handle as u64, cb);
        handle
    }

    fn cancel(&mut self, cb_hdl: usize) -> SimResult<()> {
        match self.callbacks.remove(cb_hdl as u64) {
            Some(SimCallback::Time(t)) => {
                self.timers.remove(&t);
            }
            Some(SimCallback::Edge(sig_hdl)) => {
                self.edges.remove(sig_hdl as u64);
            }
            Some(SimCallback::ReadWrite) => self.read_write = None,
            Some(SimCallback::ReadOnly) => self.read_only = None,
            None => return Err(SimError::UnknownCallback(cb_hdl)),
        }
        Ok(())
    }

    fn next_timer(&self) -> Option<u64> {
        self.timers.keys().next().copied()
    }

    fn take_timer(&mut self, t: u64) {
        if let Some(cb_hdl) = self.timers.remove(&t) {
            self.callbacks.remove(cb_hdl as u64);
        }
        self.time = t;
    }

    fn take_sync(&mut self, read_only: bool) -> bool {
        let slot = if read_only { &mut self.read_only } else { &mut self.read_write };
        match slot.take() {
            Some(cb_hdl) => {
                self.callbacks.remove(cb_hdl as u64);
                true
            }
            None => false,
        }
    }
}

fn edge_kind(old: &LogicVec, new: &LogicVec) -> EdgeKind {
    if new.width() != 1 {
        return EdgeKind::Any;
    }
    match new.to_u64() {
        Some(1) if old.to_u64() != Some(1) => EdgeKind::Rising,
        Some(0) if old.to_u64() != Some(0) => EdgeKind::Falling,
        _ => EdgeKind::Any,
    }
}

fn with_kernel<R>(f: impl FnOnce(&mut Kernel) -> SimResult<R>) -> SimResult<R> {
    KERNEL.with(|k| match k.borrow_mut().as_mut() {
        Some(kernel) => f(kernel),
        None => Err(SimError::NotRunning),
    })
}

/// Simulator interface backed by the thread's kernel.
pub(crate) struct Native;

impl SimIf for Native {
    fn set_value(&self, obj: &SimObject, value: u32) -> SimResult<()> {
        with_kernel(|k| {
            let width = k.net(obj.handle)?.port.width;
            if width < 32 && u64::from(value) >> width != 0 {
                return Err(SimError::ValueTooWide {
                    name: k.full_name(obj.handle)?,
                    width,
                    value: u64::from(value),
                });
            }
            k.write(obj.handle, LogicVec::from_u64(width, u64::from(value)))
        })
    }
    fn get_value(&self, obj: &SimObject) -> SimResult<u32> {
        with_kernel(|k| {
            let net = k.net(obj.handle)?;
            match net.value.to_u64() {
                Some(v) => Ok(v as u32),
                None => Err(SimError::Unresolved {
                    name: k.full_name(obj.handle)?,
                    bin: net.value.to_bin(),
                }),
            }
        })
    }
    fn set_value_bin(&self, obj: &SimObject, value: &str) -> SimResult<()> {
        let v = LogicVec::parse_bin(value)?;
        with_kernel(|k| k.write(obj.handle, v))
    }
    fn get_value_bin(&self, obj: &SimObject) -> SimResult<String> {
        self.get_logic(obj).map(|v| v.to_bin())
    }
    fn get_logic(&self, obj: &SimObject) -> SimResult<LogicVec> {
        with_kernel(|k| {
            if obj.handle == ROOT_HANDLE {
                return Err(SimError::NoValue(k.top.clone()));
            }
            Ok(k.net(obj.handle)?.value)
        })
    }
    fn get_object_by_name(&self, name: &str) -> SimResult<SimObject> {
        with_kernel(|k| k.lookup(name))
    }
    fn get_root_object(&self) -> SimResult<SimObject> {
        with_kernel(|k| k.lookup(&k.top))
    }
    fn get_full_name(&self, obj: &SimObject) -> SimResult<String> {
        with_kernel(|k| k.full_name(obj.handle))
    }
    fn get_sim_time_steps(&self) -> u64 {
        // log() may be called while the kernel is borrowed
        KERNEL.with(|k| {
            k.try_borrow()
                .ok()
                .and_then(|k| k.as_ref().map(|k| k.time))
                .unwrap_or(0)
        })
    }
    fn get_sim_precision(&self) -> i8 {
        KERNEL.with(|k| {
            k.try_borrow()
                .ok()
                .and_then(|k| k.as_ref().map(|k| k.precision))
                .unwrap_or(-12)
        })
    }
    fn log(&self, msg: &str) {
        let t = self.get_sim_time("ns");
        let int = t.floor() as u64;
        let mut frac_str = format!("{:.3}", t % 1.0);
        frac_str.remove(0);
        log::info!(
            target: "countbench",
            "{}{}ns {}",
            int.to_formatted_string(&Locale::en),
            frac_str,
            msg
        );
    }
    fn register_callback_rw(&self) -> SimResult<usize> {
        with_kernel(|k| {
            if k.read_write.is_some() {
                return Err(SimError::DuplicateCallback("read-write".to_string()));
            }
            let handle = k.add_callback(SimCallback::ReadWrite);
            k.read_write = Some(handle);
            Ok(handle)
        })
    }
    fn register_callback_ro(&self) -> SimResult<usize> {
        with_kernel(|k| {
            if k.read_only.is_some() {
                return Err(SimError::DuplicateCallback("read-only".to_string()));
            }
            let handle = k.add_callback(SimCallback::ReadOnly);
            k.read_only = Some(handle);
            Ok(handle)
        })
    }
    fn register_callback_time(&self, t: u64) -> SimResult<usize> {
        with_kernel(|k| {
            let t_abs = k.time + t;
            if k.timers.contains_key(&t_abs) {
                return Err(SimError::DuplicateCallback(format!("timer at step {}", t_abs)));
            }
            let handle = k.add_callback(SimCallback::Time(t_abs));
            k.timers.insert(t_abs, handle);
            Ok(handle)
        })
    }
    fn register_callback_edge(&self, sig_hdl: usize) -> SimResult<usize> {
        with_kernel(|k| {
            let name = k.full_name(sig_hdl)?;
            if sig_hdl == ROOT_HANDLE {
                return Err(SimError::NoValue(name));
            }
            if k.edges.contains_key(sig_hdl as u64) {
                return Err(SimError::DuplicateCallback(format!("value change of {}", name)));
            }
            let handle = k.add_callback(SimCallback::Edge(sig_hdl));
            k.edges.insert(sig_hdl as u64, handle);
            Ok(handle)
        })
    }
    fn cancel_callback(&self, cb_hdl: usize) -> SimResult<()> {
        with_kernel(|k| k.cancel(cb_hdl))
    }
}

// Removes the kernel when the run ends, also when a test panics.
struct Installed;

impl Installed {
    fn new(design: Box<dyn Design>, config: &SimConfig) -> SimResult<Self> {
        KERNEL.with(|k| {
            let mut k = k.try_borrow_mut().map_err(|_| SimError::AlreadyRunning)?;
            if k.is_some() {
                return Err(SimError::AlreadyRunning);
            }
            *k = Some(Kernel::new(design, config.precision));
            Ok(Installed)
        })
    }
}

impl Drop for Installed {
    fn drop(&mut self) {
        crate::reset_thread_state();
        KERNEL.with(|k| {
            if let Ok(mut k) = k.try_borrow_mut() {
                k.take();
            }
        });
    }
}

/// Runs `tests` in order against `design` and reports the outcome.
pub fn run(design: Box<dyn Design>, tests: TbTests, config: &SimConfig) -> SimResult<SimReport> {
    config.validate()?;
    let _installed = Installed::new(design, config)?;
    crate::reset_thread_state();
    let max_steps = config
        .max_sim_time_ns
        .map(|ns| ldexp10(ns as f64, -9 - config.precision) as u64);

    crate::start_of_simulation(tests)?;
    run_sim(max_steps);
    crate::end_of_simulation(config)
}

fn run_sim(max_steps: Option<u64>) {
    if !settle() {
        return;
    }
    while let Ok(Some(t)) = with_kernel(|k| Ok(k.next_timer())) {
        if max_steps.is_some_and(|limit| t > limit) {
            let now_ns = SIM_IF.get_sim_time("ns");
            crate::abort_simulation(&format!("simulation time limit reached at {}ns", now_ns));
            break;
        }
        let _ = with_kernel(|k| {
            k.take_timer(t);
            Ok(())
        });
        trigger::react_time(t);
        if !settle() {
            break;
        }
    }
}

/// Runs delta cycles and synch phases of the current time step. `false` if
/// the simulation had to be aborted.
fn settle() -> bool {
    let mut deltas = 0;
    loop {
        while let Ok(Some(fired)) = with_kernel(|k| Ok(k.commit())) {
            deltas += 1;
            if deltas > MAX_DELTAS {
                crate::abort_simulation("delta cycle limit reached, inputs keep changing");
                return false;
            }
            for (handle, edge) in fired {
                trigger::react_edge(handle, edge);
            }
        }
        if with_kernel(|k| Ok(k.take_sync(false))).unwrap_or(false) {
            trigger::react_rw();
            continue;
        }
        if with_kernel(|k| Ok(k.take_sync(true))).unwrap_or(false) {
            trigger::react_ro();
            // writes from the read-only phase land in the next delta
            if with_kernel(|k| Ok(!k.pending.is_empty())).unwrap_or(false) {
                log::debug!(target: "countbench::native", "write during read-only phase");
                continue;
            }
        }
        return true;
    }
}

/// Generates a `main` that runs the given tests against a design.
#[macro_export]
macro_rules! run_with_native {
    ($design:expr; $( $i:ident ),+ $(,)?) => {
        fn main() {
            let _ = $crate::env_logger::Builder::from_env(
                $crate::env_logger::Env::default().default_filter_or("info"),
            )
            .try_init();
            let config = match $crate::config::SimConfig::from_env() {
                Ok(config) if std::env::var_os("COUNTBENCH_RESULTS").is_none() => {
                    config.print_summary(true).results_file("results.xml")
                }
                Ok(config) => config.print_summary(true),
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(2);
                }
            };
            let tests = $crate::tb_tests!($( $i ),+);
            match $crate::native::run(Box::new($design), tests, &config) {
                Ok(report) if report.passed() => {}
                Ok(_) => std::process::exit(1),
                Err(e) => {
                    eprintln!("{}", e);
                    std::process::exit(2);
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::LogicVec;
    use rstest::rstest;

    #[rstest]
    #[case("0", "1", EdgeKind::Rising)]
    #[case("1", "0", EdgeKind::Falling)]
    #[case("x", "1", EdgeKind::Rising)]
    #[case("z", "0", EdgeKind::Falling)]
    #[case("1", "x", EdgeKind::Any)]
    #[case("0", "z", EdgeKind::Any)]
    fn single_bit_edges(#[case] old: &str, #[case] new: &str, #[case] expected: EdgeKind) {
        let old = LogicVec::parse_bin(old).unwrap();
        let new = LogicVec::parse_bin(new).unwrap();
        assert_eq!(edge_kind(&old, &new), expected);
    }

    #[test]
    fn wide_nets_report_any() {
        assert_eq!(
            edge_kind(&LogicVec::zero(8), &LogicVec::from_u64(8, 1)),
            EdgeKind::Any
        );
    }
}
