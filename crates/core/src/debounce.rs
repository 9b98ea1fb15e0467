//! Trailing-edge debounce built on cancellable delays.
//!
//! Every call to [`Debouncer::schedule`] opens a new debounce scope. The
//! previous scope is cancelled while the slot lock is held, and only then is
//! the new delay started, so at most one scheduled action per debouncer can
//! ever reach its deadline.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::trace;

/// 單一防彈跳範圍的狀態。 / Lifecycle of one debounce scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// Nothing has been scheduled yet.
    Idle,
    Scheduled,
    /// Superseded by a newer trigger or cancelled explicitly.
    Cancelled,
    Fired,
}

#[derive(Debug)]
struct DebounceScope {
    generation: u64,
    token: CancellationToken,
    state: Arc<Mutex<DebounceState>>,
}

impl DebounceScope {
    fn cancel(&self) {
        let mut state = self.state.lock();
        if *state == DebounceState::Scheduled {
            *state = DebounceState::Cancelled;
        }
        self.token.cancel();
    }
}

#[derive(Debug, Default)]
struct Slot {
    generation: u64,
    current: Option<DebounceScope>,
}

/// 合併連續觸發，只執行最後一次。 / Coalesces bursts of triggers into the most recent one.
#[derive(Debug)]
pub struct Debouncer {
    name: &'static str,
    runtime: Handle,
    slot: Mutex<Slot>,
}

impl Debouncer {
    /// `name` only shows up in trace output.
    pub fn new(name: &'static str, runtime: Handle) -> Self {
        Self {
            name,
            runtime,
            slot: Mutex::new(Slot::default()),
        }
    }

    /// 取消前一個範圍後排程新的延遲動作。 / Cancels the previous scope, then schedules `action` after `delay`.
    ///
    /// Returns the generation of the new scope. Safe to call from threads
    /// outside the runtime.
    pub fn schedule<F, Fut>(&self, delay: Duration, action: F) -> u64
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (generation, token, state) = {
            let mut slot = self.slot.lock();
            if let Some(previous) = slot.current.take() {
                previous.cancel();
            }
            slot.generation += 1;
            let scope = DebounceScope {
                generation: slot.generation,
                token: CancellationToken::new(),
                state: Arc::new(Mutex::new(DebounceState::Scheduled)),
            };
            let handles = (scope.generation, scope.token.clone(), Arc::clone(&scope.state));
            slot.current = Some(scope);
            handles
        };

        let name = self.name;
        self.runtime.spawn(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    trace!(debouncer = name, generation, "debounce superseded");
                }
                _ = tokio::time::sleep(delay) => {
                    let fire = {
                        let mut state = state.lock();
                        if *state == DebounceState::Scheduled && !token.is_cancelled() {
                            *state = DebounceState::Fired;
                            true
                        } else {
                            false
                        }
                    };
                    if fire {
                        trace!(debouncer = name, generation, "debounce fired");
                        action().await;
                    }
                }
            }
        });

        generation
    }

    /// 取消尚未觸發的動作。 / Cancels the pending action, if any.
    pub fn cancel(&self) {
        let slot = self.slot.lock();
        if let Some(current) = slot.current.as_ref() {
            current.cancel();
        }
    }

    /// State of the most recently scheduled scope.
    pub fn state(&self) -> DebounceState {
        let slot = self.slot.lock();
        slot.current
            .as_ref()
            .map(|scope| *scope.state.lock())
            .unwrap_or(DebounceState::Idle)
    }

    pub fn generation(&self) -> u64 {
        self.slot.lock().generation
    }

    pub fn is_pending(&self) -> bool {
        self.state() == DebounceState::Scheduled
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        if let Some(current) = self.slot.get_mut().current.take() {
            current.cancel();
        }
    }
}
