use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use crate::generation::lock;

/// Lifecycle of a [`PollLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Running,
    Cancelled,
}

type CancelHook = Box<dyn FnOnce() + Send>;

struct Shared {
    state: Mutex<PollState>,
    on_cancel: Mutex<Option<CancelHook>>,
    cancel_tx: watch::Sender<bool>,
}

/// Repeats an async step at a fixed interval until the step's output says
/// to stop or the loop is cancelled.
///
/// Dropping the handle cancels the loop.
pub struct PollLoop {
    shared: Arc<Shared>,
}

impl PollLoop {
    /// Spawn the loop on the current tokio runtime and run the first step
    /// immediately.
    ///
    /// `step` is invoked while the loop's state lock is held, so it must only
    /// build the future and not lock anything that callers of
    /// [`PollLoop::cancel`] may hold.
    pub fn start<F, Fut, T, P>(
        mut step: F,
        should_continue: P,
        interval: Duration,
        on_cancel: impl FnOnce() + Send + 'static,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
        P: Fn(&T) -> bool + Send + 'static,
    {
        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            state: Mutex::new(PollState::Running),
            on_cancel: Mutex::new(Some(Box::new(on_cancel))),
            cancel_tx,
        });

        let task = Arc::clone(&shared);
        tokio::spawn(async move {
            loop {
                let pending = {
                    let state = lock(&task.state);
                    if *state != PollState::Running {
                        return;
                    }
                    step()
                };

                let output = pending.await;
                if !should_continue(&output) {
                    let mut state = lock(&task.state);
                    if *state == PollState::Running {
                        *state = PollState::Idle;
                        debug!("poll loop finished");
                    }
                    return;
                }

                tokio::select! {
                    biased;
                    _ = cancel_rx.changed() => return,
                    () = tokio::time::sleep(interval) => {}
                }
            }
        });

        Self { shared }
    }

    pub fn state(&self) -> PollState {
        *lock(&self.shared.state)
    }

    pub fn is_running(&self) -> bool {
        self.state() == PollState::Running
    }

    /// Stop the loop. No step starts after this returns, including one whose
    /// timer already elapsed. Idempotent; `on_cancel` runs only on the first
    /// cancel of a running loop.
    pub fn cancel(&self) {
        let was_running = {
            let mut state = lock(&self.shared.state);
            let was_running = *state == PollState::Running;
            *state = PollState::Cancelled;
            was_running
        };
        self.shared.cancel_tx.send_replace(true);

        if was_running {
            debug!("poll loop cancelled");
            let hook = lock(&self.shared.on_cancel).take();
            if let Some(hook) = hook {
                hook();
            }
        }
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for PollLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollLoop")
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use tokio::time::sleep;

    const INTERVAL: Duration = Duration::from_millis(1500);

    fn counter() -> Arc<AtomicUsize> {
        Arc::new(AtomicUsize::new(0))
    }

    fn counting_step(calls: &Arc<AtomicUsize>) -> impl FnMut() -> std::future::Ready<usize> + use<> {
        let calls = Arc::clone(calls);
        move || std::future::ready(calls.fetch_add(1, Ordering::SeqCst) + 1)
    }

    #[tokio::test(start_paused = true)]
    async fn stops_when_predicate_turns_false() {
        let calls = counter();
        let poll = PollLoop::start(counting_step(&calls), |n: &usize| *n < 3, INTERVAL, || {});

        sleep(Duration::from_millis(100)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(poll.is_running());

        sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(poll.state(), PollState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn steps_follow_the_interval() {
        let calls = counter();
        let _poll = PollLoop::start(counting_step(&calls), |_: &usize| true, INTERVAL, || {});

        sleep(Duration::from_millis(1400)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        sleep(Duration::from_millis(200)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        sleep(Duration::from_millis(1500)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_prevents_scheduled_step_and_runs_hook_once() {
        let calls = counter();
        let cancels = counter();
        let hook_cancels = Arc::clone(&cancels);
        let poll = PollLoop::start(counting_step(&calls), |_: &usize| true, INTERVAL, move || {
            hook_cancels.fetch_add(1, Ordering::SeqCst);
        });

        sleep(Duration::from_millis(100)).await;
        poll.cancel();
        poll.cancel();

        sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
        assert_eq!(poll.state(), PollState::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_during_step_prevents_next_step() {
        let calls = counter();
        let gate = Arc::new(Notify::new());
        let step_calls = Arc::clone(&calls);
        let step_gate = Arc::clone(&gate);
        let poll = PollLoop::start(
            move || {
                step_calls.fetch_add(1, Ordering::SeqCst);
                let gate = Arc::clone(&step_gate);
                async move { gate.notified().await }
            },
            |_: &()| true,
            INTERVAL,
            || {},
        );

        sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        poll.cancel();
        gate.notify_one();
        sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelling_a_finished_loop_skips_hook() {
        let calls = counter();
        let cancels = counter();
        let hook_cancels = Arc::clone(&cancels);
        let poll = PollLoop::start(counting_step(&calls), |_: &usize| false, INTERVAL, move || {
            hook_cancels.fetch_add(1, Ordering::SeqCst);
        });

        sleep(Duration::from_millis(10)).await;
        assert_eq!(poll.state(), PollState::Idle);

        poll.cancel();
        assert_eq!(poll.state(), PollState::Cancelled);
        assert_eq!(cancels.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_cancels() {
        let calls = counter();
        let poll = PollLoop::start(counting_step(&calls), |_: &usize| true, INTERVAL, || {});
        sleep(Duration::from_millis(10)).await;
        drop(poll);

        sleep(Duration::from_secs(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
