use intmap::IntMap;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll, Waker};

use crate::executor;
use crate::{signal::SimObject, sim_if::SIM_IF, value::Val, TbResult};

struct CallbackHandles {
    handle: Option<usize>,
    callbacks: VecDeque<TrigShared>,
}

impl CallbackHandles {
    fn new() -> Self {
        CallbackHandles { handle: None, callbacks: VecDeque::new() }
    }
}

struct Triggers {
    // key is signal handle as u64
    edges: IntMap<CallbackHandles>,
    // key is absolute callback time
    timers: IntMap<CallbackHandles>,
    read_only: CallbackHandles,
    read_write: CallbackHandles,
}

thread_local! {
    static TRIGGERS: RefCell<Triggers> = RefCell::new(Triggers {
        edges: IntMap::new(),
        timers: IntMap::new(),
        read_only: CallbackHandles::new(),
        read_write: CallbackHandles::new(),
    });
}

#[derive(PartialEq, Clone, Copy, Debug)]
pub enum EdgeKind {
    Any,
    Rising,
    Falling,
}

/// Drops every pending trigger and cancels the simulator callbacks behind them.
pub(crate) fn cancel_all_triggers() {
    let handles: Vec<usize> = TRIGGERS.with(|t| {
        let mut t = t.borrow_mut();
        let mut handles = Vec::new();
        handles.extend(t.read_only.handle.take());
        t.read_only.callbacks.clear();
        handles.extend(t.read_write.handle.take());
        t.read_write.callbacks.clear();
        handles.extend(t.timers.values().filter_map(|cb| cb.handle));
        t.timers.clear();
        handles.extend(t.edges.values().filter_map(|cb| cb.handle));
        t.edges.clear();
        handles
    });
    for handle in handles {
        if let Err(e) = SIM_IF.cancel_callback(handle) {
            log::debug!(target: "countbench::trigger", "cancel callback {}: {}", handle, e);
        }
    }
}

#[derive(Debug, Clone)]
struct TrigShared {
    waker: Waker,
    // If trigger is an edge, the react method needs to know if it is a rising or falling edge
    // so an existing callback does not have to be rescheduled.
    edge_kind: EdgeKind,
}

#[derive(Clone, Debug)]
pub enum TrigKind {
    Edge(usize, EdgeKind),
    Timer(u64),
    ReadWrite,
    ReadOnly,
}

/// A one-shot future that completes when the simulator reaches a point of
/// interest: a time, a value change, or a synchronization phase.
#[derive(Clone, Debug)]
pub struct Trigger {
    kind: TrigKind,
    awaited: bool,
    // high exec prio currently only implemented for ReadOnly
    high_exec_prio: bool,
}

impl Trigger {
    fn new(kind: TrigKind) -> Self {
        Trigger { kind, awaited: false, high_exec_prio: false }
    }
    /// Panics if `time` is not a whole number of simulation steps.
    pub fn timer(time: u64, unit: &str) -> Self {
        let steps = SIM_IF
            .get_sim_steps(time as f64, unit)
            .unwrap_or_else(|e| panic!("Invalid timer: {}", e));
        Trigger::new(TrigKind::Timer(steps))
    }
    pub fn timer_steps(steps: u64) -> Self {
        Trigger::new(TrigKind::Timer(steps))
    }
    pub async fn timer_ro(time: u64, unit: &str) -> TbResult {
        Trigger::timer(time, unit).await;
        Trigger::read_only().await;
        Ok(Val::None)
    }
    pub async fn timer_rw(time: u64, unit: &str) -> TbResult {
        Trigger::timer(time, unit).await;
        Trigger::read_write().await;
        Ok(Val::None)
    }
    pub fn edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Any))
    }
    pub fn rising_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Rising))
    }
    pub fn falling_edge(signal: SimObject) -> Self {
        Trigger::new(TrigKind::Edge(signal.handle(), EdgeKind::Falling))
    }
    pub fn read_write() -> Self {
        Trigger::new(TrigKind::ReadWrite)
    }
    pub fn read_only() -> Self {
        Trigger::new(TrigKind::ReadOnly)
    }
    pub(crate) fn read_only_prio() -> Self {
        Trigger { kind: TrigKind::ReadOnly, awaited: false, high_exec_prio: true }
    }
}

impl Future for Trigger {
    type Output = Val;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        // Trigger must only be awaited once, so the second time it is polled it must be because
        // the waker signaled its completion.
        if self.awaited {
            return Poll::Ready(Val::None);
        }
        self.awaited = true;
        let mut shared = TrigShared {
            waker: cx.waker().clone(),
            edge_kind: EdgeKind::Any,
        };
        let kind = self.kind.clone();
        let high_exec_prio = self.high_exec_prio;

        TRIGGERS.with(|t| {
            let mut t = t.borrow_mut();
            match kind {
                TrigKind::ReadWrite => {
                    t.read_write.callbacks.push_back(shared);
                    if t.read_write.handle.is_none() {
                        t.read_write.handle = Some(register(SIM_IF.register_callback_rw()));
                    }
                }
                TrigKind::ReadOnly => {
                    match high_exec_prio {
                        false => t.read_only.callbacks.push_back(shared),
                        true => t.read_only.callbacks.push_front(shared),
                    }
                    if t.read_only.handle.is_none() {
                        t.read_only.handle = Some(register(SIM_IF.register_callback_ro()));
                    }
                }
                TrigKind::Timer(steps) => {
                    // Key on absolute time, since the simulator reports absolute time back
                    let abs_time = steps + SIM_IF.get_sim_time_steps();
                    if let Some(callbacks) = t.timers.get_mut(abs_time) {
                        callbacks.callbacks.push_back(shared);
                    } else {
                        let mut cb = CallbackHandles::new();
                        cb.handle = Some(register(SIM_IF.register_callback_time(steps)));
                        cb.callbacks.push_back(shared);
                        t.timers.insert(abs_time, cb);
                    }
                }
                TrigKind::Edge(sig_hdl, edge_kind) => {
                    shared.edge_kind = edge_kind;
                    if let Some(callbacks) = t.edges.get_mut(sig_hdl as u64) {
                        callbacks.callbacks.push_back(shared);
                    } else {
                        let mut cb = CallbackHandles::new();
                        cb.handle = Some(register(SIM_IF.register_callback_edge(sig_hdl)));
                        cb.callbacks.push_back(shared);
                        t.edges.insert(sig_hdl as u64, cb);
                    }
                }
            }
        });
        Poll::Pending
    }
}

fn register(result: crate::error::SimResult<usize>) -> usize {
    result.unwrap_or_else(|e| panic!("Can't register simulator callback: {}", e))
}

fn wake_all(wakers: VecDeque<TrigShared>) {
    if wakers.is_empty() {
        return;
    }
    for shared in wakers {
        shared.waker.wake();
    }
    // execute woken tasks
    executor::run_once();
}

pub(crate) fn react_rw() {
    let wakers = TRIGGERS.with(|t| {
        let mut t = t.borrow_mut();
        t.read_write.handle = None; // remove handle, since CB is now done
        std::mem::take(&mut t.read_write.callbacks)
    });
    wake_all(wakers);
}

pub(crate) fn react_ro() {
    let wakers = TRIGGERS.with(|t| {
        let mut t = t.borrow_mut();
        t.read_only.handle = None;
        std::mem::take(&mut t.read_only.callbacks)
    });
    wake_all(wakers);
}

pub(crate) fn react_time(abs_time: u64) {
    let wakers = TRIGGERS.with(|t| t.borrow_mut().timers.remove(abs_time));
    match wakers {
        Some(callbacks) => wake_all(callbacks.callbacks),
        None => log::debug!(target: "countbench::trigger", "stale timer callback at {}", abs_time),
    }
}

pub(crate) fn react_edge(sig_hdl: usize, edge: EdgeKind) {
    let (wake, cancel) = TRIGGERS.with(|t| {
        let mut t = t.borrow_mut();
        let Some(mut callbacks) = t.edges.remove(sig_hdl as u64) else {
            return (VecDeque::new(), None);
        };
        let (wake, resched): (VecDeque<_>, VecDeque<_>) = callbacks
            .callbacks
            .drain(..)
            .partition(|trig| {
                edge == EdgeKind::Any || trig.edge_kind == EdgeKind::Any || trig.edge_kind == edge
            });
        if resched.is_empty() {
            // if no callbacks are remaining, cancel
            (wake, callbacks.handle)
        } else {
            callbacks.callbacks = resched;
            t.edges.insert(sig_hdl as u64, callbacks);
            (wake, None)
        }
    });
    if let Some(handle) = cancel {
        if let Err(e) = SIM_IF.cancel_callback(handle) {
            log::debug!(target: "countbench::trigger", "cancel edge callback {}: {}", handle, e);
        }
    }
    wake_all(wake);
}
