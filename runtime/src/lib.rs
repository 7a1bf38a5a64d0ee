//! # Tablewise Runtime
//!
//! Runtime implementation for the Tablewise booking architecture.
//!
//! The [`Store`] drives a [`Reducer`]: actions are serialized through the
//! reducer under a write lock, and the returned [`Effect`] values are
//! executed on spawned tasks. Actions produced by effects are fed back into
//! the store (feedback loop) and broadcast to observers.
//!
//! ## Cancellation
//!
//! [`Effect::Cancellable`] registers its task under an [`EffectId`].
//! Starting a new cancellable effect under an occupied id aborts the
//! previous task first (later-wins), and [`Effect::Cancel`] aborts without
//! a replacement. Debounce windows and restartable countdowns are built on
//! this: the reducer re-issues the cancellable delay and the stale timer
//! simply never fires.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use tablewise_core::effect::{Effect, EffectId};
use tablewise_core::reducer::Reducer;
use tokio::sync::{broadcast, Notify, RwLock};
use tokio::task::{AbortHandle, Id as TaskId};

/// Errors produced by the [`Store`].
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store is shutting down and rejects new actions.
    #[error("store is shutting down")]
    ShutdownInProgress,

    /// A wait timed out before the expected condition held.
    #[error("timed out waiting for store")]
    Timeout,

    /// The action broadcast channel closed.
    #[error("action channel closed")]
    ChannelClosed,

    /// Shutdown expired with effects still running.
    #[error("shutdown timeout: {0} effects still running")]
    ShutdownTimeout(usize),
}

// ─────────────────────────────────────────────────────────────────────────
// Effect tracking
// ─────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct TrackingInner {
    pending: AtomicUsize,
    notify: Notify,
}

/// Handle returned by [`Store::send`].
///
/// Allows callers (primarily tests) to await quiescence of the effects
/// transitively spawned by one action, including the effects of feedback
/// actions.
#[derive(Debug, Clone)]
pub struct EffectHandle {
    inner: Arc<TrackingInner>,
}

impl EffectHandle {
    fn new() -> Self {
        Self {
            inner: Arc::new(TrackingInner::default()),
        }
    }

    fn increment(&self) {
        self.inner.pending.fetch_add(1, Ordering::SeqCst);
    }

    fn decrement(&self) {
        if self.inner.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.notify.notify_waiters();
        }
    }

    /// Wait until every tracked effect has completed.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.inner.pending.load(Ordering::SeqCst) == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Wait for effect completion with a timeout.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Timeout`] if effects are still running when the
    /// timeout expires.
    pub async fn wait_with_timeout(&self, timeout: Duration) -> Result<(), StoreError> {
        tokio::time::timeout(timeout, self.wait())
            .await
            .map_err(|_| StoreError::Timeout)
    }
}

/// Decrements the tracking counter on drop, so aborted and panicked effect
/// tasks still release their slot.
struct DecrementGuard(EffectHandle);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

struct PendingGuard(Arc<AtomicUsize>);

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ─────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────

type CancelRegistry = Arc<Mutex<HashMap<EffectId, (TaskId, AbortHandle)>>>;

/// The store: owns state, runs the reducer, executes effects.
///
/// Multiple concurrent `send` calls serialize at the reducer level; effects
/// execute asynchronously and may complete in any order.
pub struct Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    state: Arc<RwLock<S>>,
    reducer: R,
    environment: E,
    shutdown: Arc<AtomicBool>,
    pending_effects: Arc<AtomicUsize>,
    cancellables: CancelRegistry,
    /// Actions produced by effects are broadcast to observers.
    action_broadcast: broadcast::Sender<A>,
}

impl<S, A, E, R> Clone for Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Clone,
    E: Clone,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            reducer: self.reducer.clone(),
            environment: self.environment.clone(),
            shutdown: Arc::clone(&self.shutdown),
            pending_effects: Arc::clone(&self.pending_effects),
            cancellables: Arc::clone(&self.cancellables),
            action_broadcast: self.action_broadcast.clone(),
        }
    }
}

impl<S, A, E, R> Store<S, A, E, R>
where
    R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
    A: Send + Clone + 'static,
    S: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a new store with initial state, reducer, and environment.
    #[must_use]
    pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
        let (action_broadcast, _) = broadcast::channel(64);

        Self {
            state: Arc::new(RwLock::new(initial_state)),
            reducer,
            environment,
            shutdown: Arc::new(AtomicBool::new(false)),
            pending_effects: Arc::new(AtomicUsize::new(0)),
            cancellables: Arc::new(Mutex::new(HashMap::new())),
            action_broadcast,
        }
    }

    /// Send an action to the store.
    ///
    /// 1. Acquires the write lock on state
    /// 2. Calls the reducer with (state, action, environment)
    /// 3. Executes the returned effects asynchronously
    ///
    /// Returns after *starting* effect execution, not after completion; use
    /// the returned [`EffectHandle`] to await quiescence.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting
    /// down.
    pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError> {
        if self.shutdown.load(Ordering::Acquire) {
            tracing::warn!("rejected action: store is shutting down");
            return Err(StoreError::ShutdownInProgress);
        }

        let handle = EffectHandle::new();

        let effects = {
            let mut state = self.state.write().await;
            self.reducer.reduce(&mut state, action, &self.environment)
        };

        tracing::trace!(count = effects.len(), "executing effects");
        for effect in effects {
            self.execute_effect(effect, handle.clone());
        }

        Ok(handle)
    }

    /// Send an action and wait for a matching result action.
    ///
    /// Designed for request-response flows in tests and demo harnesses:
    /// subscribes to the action broadcast *before* sending, then returns the
    /// first effect-produced action matching the predicate.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Timeout`] if no matching action arrives in time
    /// - [`StoreError::ChannelClosed`] if the broadcast channel closes
    /// - [`StoreError::ShutdownInProgress`] if the store is shutting down
    pub async fn send_and_wait_for<F>(
        &self,
        action: A,
        predicate: F,
        timeout: Duration,
    ) -> Result<A, StoreError>
    where
        F: Fn(&A) -> bool,
    {
        // Subscribe before sending to avoid a race with fast effects.
        let mut rx = self.action_broadcast.subscribe();

        self.send(action).await?;

        tokio::time::timeout(timeout, async {
            loop {
                match rx.recv().await {
                    Ok(action) if predicate(&action) => return Ok(action),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "action observer lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(StoreError::ChannelClosed);
                    }
                }
            }
        })
        .await
        .map_err(|_| StoreError::Timeout)?
    }

    /// Read current state via a closure.
    ///
    /// ```ignore
    /// let covers = store.state(|s| s.covers).await;
    /// ```
    pub async fn state<F, T>(&self, f: F) -> T
    where
        F: FnOnce(&S) -> T,
    {
        let state = self.state.read().await;
        f(&state)
    }

    /// Subscribe to all actions produced by effects.
    #[must_use]
    pub fn subscribe_actions(&self) -> broadcast::Receiver<A> {
        self.action_broadcast.subscribe()
    }

    /// Initiate graceful shutdown: reject new actions, wait for pending
    /// effects.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ShutdownTimeout`] if effects are still running
    /// when the timeout expires.
    pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
        tracing::info!("initiating graceful shutdown");
        self.shutdown.store(true, Ordering::Release);

        let start = std::time::Instant::now();
        loop {
            let pending = self.pending_effects.load(Ordering::Acquire);
            if pending == 0 {
                tracing::info!("all effects completed, shutdown successful");
                return Ok(());
            }
            if start.elapsed() >= timeout {
                tracing::error!(pending, "shutdown timeout with effects still running");
                return Err(StoreError::ShutdownTimeout(pending));
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    // ─────────────────────────────────────────────────────────────────
    // Effect execution
    // ─────────────────────────────────────────────────────────────────

    fn spawn_tracked(&self, handle: EffectHandle, fut: BoxFuture<'static, ()>) -> AbortHandle {
        handle.increment();
        self.pending_effects.fetch_add(1, Ordering::SeqCst);
        let guard = DecrementGuard(handle);
        let pending_guard = PendingGuard(Arc::clone(&self.pending_effects));

        let task = tokio::spawn(async move {
            let _guard = guard;
            let _pending_guard = pending_guard;
            fut.await;
        });
        task.abort_handle()
    }

    fn execute_effect(&self, effect: Effect<A>, handle: EffectHandle) {
        match effect {
            Effect::None => {}
            Effect::Parallel(effects) => {
                for effect in effects {
                    self.execute_effect(effect, handle.clone());
                }
            }
            Effect::Cancel(id) => {
                let previous = {
                    let mut registry = lock_registry(&self.cancellables);
                    registry.remove(&id)
                };
                if let Some((_, abort)) = previous {
                    tracing::debug!(?id, "cancelling effect slot");
                    abort.abort();
                }
            }
            Effect::Cancellable { id, effect } => {
                let store = self.clone();
                let inner_handle = handle.clone();
                let registry = Arc::clone(&self.cancellables);
                let abort = self.spawn_tracked(
                    handle,
                    Box::pin(async move {
                        run_to_completion(&store, *effect, inner_handle).await;
                        // Release the slot if this task still owns it.
                        let own_id = tokio::task::id();
                        let mut registry = lock_registry(&registry);
                        if registry.get(&id).is_some_and(|(task, _)| *task == own_id) {
                            registry.remove(&id);
                        }
                    }),
                );

                let replaced = {
                    let mut registry = lock_registry(&self.cancellables);
                    // The AbortHandle's task id pairs the slot with its owner.
                    registry.insert(id, (abort.id(), abort))
                };
                if let Some((_, previous)) = replaced {
                    tracing::debug!(?id, "superseding in-flight effect");
                    previous.abort();
                }
            }
            other => {
                let store = self.clone();
                let inner_handle = handle.clone();
                self.spawn_tracked(
                    handle,
                    Box::pin(async move {
                        run_to_completion(&store, other, inner_handle).await;
                    }),
                );
            }
        }
    }
}

fn lock_registry(
    registry: &Mutex<HashMap<EffectId, (TaskId, AbortHandle)>>,
) -> std::sync::MutexGuard<'_, HashMap<EffectId, (TaskId, AbortHandle)>> {
    // Registry operations never panic while holding the lock, so a poisoned
    // mutex can only follow a panic elsewhere; propagating the inner state
    // keeps cancellation working during unwind-in-tests.
    match registry.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Execute an effect to completion, awaiting nested feedback effects.
fn run_to_completion<'a, S, A, E, R>(
    store: &'a Store<S, A, E, R>,
    effect: Effect<A>,
    handle: EffectHandle,
) -> BoxFuture<'a, ()>
where
    R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
    A: Send + Clone + 'static,
    S: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    Box::pin(async move {
        match effect {
            Effect::None => {}
            Effect::Future(fut) => {
                if let Some(action) = fut.await {
                    feed_back(store, action).await;
                } else {
                    tracing::trace!("Effect::Future completed with no action");
                }
            }
            Effect::Delay { duration, action } => {
                tokio::time::sleep(duration).await;
                feed_back(store, *action).await;
            }
            Effect::Sequential(effects) => {
                for effect in effects {
                    run_to_completion(store, effect, handle.clone()).await;
                }
            }
            Effect::Parallel(effects) => {
                let futures: Vec<_> = effects
                    .into_iter()
                    .map(|effect| run_to_completion(store, effect, handle.clone()))
                    .collect();
                futures::future::join_all(futures).await;
            }
            cancellable @ (Effect::Cancellable { .. } | Effect::Cancel(_)) => {
                // Slot management must go through the registry.
                store.execute_effect(cancellable, handle.clone());
            }
        }
    })
}

async fn feed_back<S, A, E, R>(store: &Store<S, A, E, R>, action: A)
where
    R: Reducer<State = S, Action = A, Environment = E> + Clone + Send + Sync + 'static,
    A: Send + Clone + 'static,
    S: Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    // Broadcast to observers (tests, demo harnesses).
    let _ = store.action_broadcast.send(action.clone());

    match store.send(action).await {
        Ok(nested) => nested.wait().await,
        Err(StoreError::ShutdownInProgress) => {
            tracing::debug!("dropping feedback action during shutdown");
        }
        Err(error) => tracing::error!(%error, "failed to feed back action"),
    }
}
