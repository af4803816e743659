use futures::{
    future::{BoxFuture, FutureExt},
    task::{waker_ref, ArcWake, Context, Poll},
};
use futures_channel::oneshot;
use queues::{IsQueue, Queue};
use std::{
    cell::{Cell, RefCell},
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
};

use crate::tb_obj::lock;
use crate::value::Val;
use crate::TbResult;

// Tasks are woken from trigger callbacks on the simulation thread, so every
// simulation gets its own queue.
thread_local! {
    static READY_QUEUE: RefCell<Queue<Arc<Task>>> = RefCell::new(Queue::new());
    // Tasks belong to the scope they were spawned in; scope 0 outlives every test.
    static SCOPE: Cell<u64> = const { Cell::new(1) };
}

fn current_scope() -> u64 {
    SCOPE.with(|s| s.get())
}

/// Tasks spawned before this call are cancelled the next time they are woken.
pub(crate) fn end_scope() {
    SCOPE.with(|s| s.set(s.get() + 1));
}

pub fn schedule_task(task: Arc<Task>) {
    READY_QUEUE.with(|q| {
        let _ = q.borrow_mut().add(task);
    });
}

fn next_task() -> Option<Arc<Task>> {
    READY_QUEUE.with(|q| q.borrow_mut().remove().ok())
}

pub(crate) fn clear_ready_queue() {
    // dropping tasks may wake others, so drop outside the borrow
    let old = READY_QUEUE.with(|q| q.replace(Queue::new()));
    drop(old);
}

#[inline]
pub fn run_once() {
    while let Some(task) = next_task() {
        process_task(task);
    }
}

#[inline]
fn process_task(task: Arc<Task>) {
    if *lock(&task.state) == TaskState::Cancelled {
        // do not execute if state is cancelled, will be dropped once all references disappear
        return;
    }
    if task.scope != 0 && task.scope != current_scope() {
        log::trace!(target: "countbench::executor", "dropping task {} of an ended test", task.name);
        task.cancel();
        return;
    }

    // The slot stays empty while polling, so the task may cancel itself.
    let Some(mut fut) = lock(&task.future).take() else {
        // woken more than once before it ran, and already completed
        return;
    };
    let waker = waker_ref(&task);
    let context = &mut Context::from_waker(&waker);
    match fut.as_mut().poll(context) {
        Poll::Pending => {
            if !task.is_cancelled() {
                *lock(&task.future) = Some(fut);
            }
        }
        Poll::Ready(result) => {
            log::trace!(target: "countbench::executor", "task {} complete", task.name);
            if let Some(tx) = lock(&task.join_tx).take() {
                let _ = tx.send(result);
            }
        }
    }
}

#[derive(PartialEq, Debug)]
enum TaskState {
    Pending,
    Cancelled,
}

pub struct Task {
    future: Mutex<Option<BoxFuture<'static, TbResult>>>,
    state: Mutex<TaskState>,
    name: String,
    scope: u64,
    join_tx: Mutex<Option<oneshot::Sender<TbResult>>>,
}

impl Task {
    pub fn fork(future: impl Future<Output = TbResult> + Send + 'static) -> JoinHandle {
        Task::spawn_from_future(future, "forked")
    }
    pub fn spawn_from_future(
        future: impl Future<Output = TbResult> + Send + 'static,
        name: &str,
    ) -> JoinHandle {
        let (task, join_handle) = Task::new(future.boxed(), name, current_scope());
        schedule_task(task);
        join_handle
    }
    /// Like [`Task::spawn_from_future`], but the task survives the end of the current test.
    pub(crate) fn spawn_persistent(
        future: impl Future<Output = TbResult> + Send + 'static,
        name: &str,
    ) -> JoinHandle {
        let (task, join_handle) = Task::new(future.boxed(), name, 0);
        schedule_task(task);
        join_handle
    }
    fn new(fut: BoxFuture<'static, TbResult>, name: &str, scope: u64) -> (Arc<Self>, JoinHandle) {
        let (tx, rx) = oneshot::channel::<TbResult>();
        let task = Arc::new(Self {
            future: Mutex::new(Some(fut)),
            state: Mutex::new(TaskState::Pending),
            name: name.to_string(),
            scope,
            join_tx: Mutex::new(Some(tx)),
        });
        let join_handle = JoinHandle {
            join_rx: rx,
            awaited_task: Some(task.clone()),
        };
        (task, join_handle)
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn cancel(&self) {
        // set state to Cancelled, Executor will drop the Task without execution on callback
        *lock(&self.state) = TaskState::Cancelled;
        // release what the future holds and wake up whoever joins it
        let fut = lock(&self.future).take();
        drop(fut);
        let tx = lock(&self.join_tx).take();
        drop(tx);
    }
    pub fn is_cancelled(&self) -> bool {
        *lock(&self.state) == TaskState::Cancelled
    }
}

impl ArcWake for Task {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        schedule_task(arc_self.clone());
    }
}

pub struct JoinHandle {
    awaited_task: Option<Arc<Task>>,
    join_rx: oneshot::Receiver<TbResult>,
}

impl JoinHandle {
    pub fn task(&self) -> Option<Arc<Task>> {
        self.awaited_task.clone()
    }
    pub fn cancel(mut self) {
        // take awaited_task, cancel it and drop its reference
        if let Some(task) = self.awaited_task.take() {
            task.cancel();
        }
    }
}

impl Future for JoinHandle {
    type Output = TbResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.join_rx.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(Val::String("task was cancelled".to_string()))),
            Poll::Pending => Poll::Pending,
        }
    }
}
