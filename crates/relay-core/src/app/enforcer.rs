//! CoalescingEnforcer - 同時に届いたリクエストを 1 回の batch にまとめる
//!
//! # submit 時の判定順
//! 1. coalescing flag が off → キューを通さず 1 件だけの batch として即送信
//! 2. pending >= max_queue_depth → Backpressure で即拒否（キューには入らない）
//! 3. 追加後 pending >= flush_threshold → タイマーを止めて即 flush
//! 4. それ以外 → タイマーが無ければ coalescence window 分のタイマーを開始
//!
//! タイマーは debounce ではありません。後から来たリクエストで延長されないので、
//! 追加されるレイテンシは最大でも window 1 回分です。
//!
//! # 排他
//! 状態はすべて 1 つの Mutex の中にあり、await を跨いでロックを持ちません。
//! append / snapshot-and-clear / drain はそれぞれ 1 回のロックで完結します。

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::config::{ConfigError, EnforcerConfig};
use super::status::{EnforcerCounters, EnforcerStatus};
use super::transport::assign_correlation_ids;
use crate::domain::{
    AuditAction, AuditEvent, ENFORCER_ENTITY_ID, LogicalRequest, LogicalResponse, RelayError,
};
use crate::impls::{NoopAuditSink, NoopFeatureFlags};
use crate::ports::audit_sink::emit_best_effort;
use crate::ports::{AuditSink, BatchExecutor, COALESCING_FLAG, Clock, FeatureFlags, SystemClock};

type Reply = oneshot::Sender<Result<LogicalResponse, RelayError>>;

/// Deferred result of one accepted request.
///
/// Resolves exactly once: with the response, or with the error that concerns
/// this request only.
#[derive(Debug)]
pub struct ResponseHandle {
    rx: oneshot::Receiver<Result<LogicalResponse, RelayError>>,
}

impl Future for ResponseHandle {
    type Output = Result<LogicalResponse, RelayError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(RelayError::Canceled)))
    }
}

struct QueuedRequest {
    request: LogicalRequest,
    reply: Reply,
}

struct WindowTimer {
    epoch: u64,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct EnforcerState {
    queue: Vec<QueuedRequest>,
    timer: Option<WindowTimer>,
    next_epoch: u64,
    high_water_mark: usize,
    disposed: bool,
    counters: EnforcerCounters,
}

impl EnforcerState {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.handle.abort();
        }
    }

    /// Take the whole queue; requests arriving afterwards start a new cycle.
    fn take_snapshot(&mut self) -> Vec<QueuedRequest> {
        let snapshot = std::mem::take(&mut self.queue);
        if !snapshot.is_empty() {
            self.counters.flushes += 1;
            self.counters.coalesced_requests += snapshot.len() as u64;
        }
        snapshot
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispatchKind {
    Coalesced,
    Passthrough,
}

struct Inner {
    executor: Arc<dyn BatchExecutor>,
    flags: Arc<dyn FeatureFlags>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    config: EnforcerConfig,
    state: Mutex<EnforcerState>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, EnforcerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn audit(&self, action: AuditAction, details: String) {
        emit_best_effort(
            self.audit.as_ref(),
            AuditEvent::new(action, ENFORCER_ENTITY_ID, details, self.clock.now()),
        );
    }

    fn start_timer(self: &Arc<Self>, state: &mut EnforcerState) {
        let epoch = state.next_epoch;
        state.next_epoch += 1;

        // window は最初のリクエストの時点から測る
        let deadline = Instant::now() + self.config.window();
        let weak: Weak<Inner> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(inner) = weak.upgrade() {
                inner.on_window_elapsed(epoch).await;
            }
        });
        state.timer = Some(WindowTimer { epoch, handle });
    }

    async fn on_window_elapsed(self: Arc<Self>, epoch: u64) {
        let snapshot = {
            let mut state = self.lock();
            let current = state.timer.as_ref().map(|t| t.epoch);
            if state.disposed || current != Some(epoch) {
                return;
            }
            // 自分自身の handle なので abort せずに外すだけ
            state.timer = None;
            state.take_snapshot()
        };
        self.dispatch(snapshot, DispatchKind::Coalesced).await;
    }

    fn spawn_dispatch(self: &Arc<Self>, entries: Vec<QueuedRequest>, kind: DispatchKind) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.dispatch(entries, kind).await;
        });
    }

    /// Send one snapshot and settle every entry exactly once.
    async fn dispatch(&self, entries: Vec<QueuedRequest>, kind: DispatchKind) {
        if entries.is_empty() {
            return;
        }
        let started = Instant::now();
        let count = entries.len();

        let (mut requests, replies): (Vec<LogicalRequest>, Vec<Reply>) = entries
            .into_iter()
            .map(|q| (q.request, q.reply))
            .unzip();

        let ids = match assign_correlation_ids(&mut requests) {
            Ok(ids) => ids,
            Err(e) => {
                for reply in replies {
                    let _ = reply.send(Err(e.clone()));
                }
                return;
            }
        };

        match self.executor.execute_batch(requests).await {
            Ok(result) => {
                let mut by_id: HashMap<String, LogicalResponse> = HashMap::with_capacity(count);
                for response in result.into_responses() {
                    by_id.entry(response.id.clone()).or_insert(response);
                }
                for (id, reply) in ids.into_iter().zip(replies) {
                    let outcome = match by_id.remove(&id) {
                        Some(response) if response.is_error() => {
                            Err(RelayError::request_failed(response))
                        }
                        Some(response) => Ok(response),
                        None => Err(RelayError::NoResponse { id }),
                    };
                    // receiver may have been dropped; nothing to do then
                    let _ = reply.send(outcome);
                }
            }
            Err(e) => {
                tracing::warn!(
                    component = %self.config.component_name,
                    count,
                    error = %e,
                    "batch executor failed; rejecting snapshot"
                );
                for reply in replies {
                    let _ = reply.send(Err(e.clone()));
                }
            }
        }

        if kind == DispatchKind::Coalesced {
            let elapsed_ms = started.elapsed().as_millis();
            tracing::debug!(component = %self.config.component_name, count, elapsed_ms, "flush completed");
            self.audit(
                AuditAction::BatchCoalesced,
                format!("Coalesced {count} requests in {elapsed_ms}ms"),
            );
        }
    }
}

/// Queue in front of a `BatchExecutor` that groups concurrent callers.
///
/// Cloning is cheap and shares the same queue. Must be used inside a tokio
/// runtime: flushes and the window timer run on spawned tasks.
///
/// # 使用例
/// ```ignore
/// let enforcer = CoalescingEnforcer::builder(transport)
///     .feature_flags(flags)
///     .audit_logger(Arc::new(TracingAuditSink))
///     .build()?;
///
/// let response = enforcer.enqueue(LogicalRequest::get("/users/1/photo/$value")).await?;
/// ```
#[derive(Clone)]
pub struct CoalescingEnforcer {
    inner: Arc<Inner>,
}

impl CoalescingEnforcer {
    /// Default config, no audit, given flags.
    pub fn new(executor: Arc<dyn BatchExecutor>, flags: Arc<dyn FeatureFlags>) -> Self {
        Self::from_parts(
            executor,
            flags,
            Arc::new(NoopAuditSink),
            Arc::new(SystemClock),
            EnforcerConfig::default(),
        )
    }

    pub fn builder(executor: Arc<dyn BatchExecutor>) -> EnforcerBuilder {
        EnforcerBuilder::new(executor)
    }

    fn from_parts(
        executor: Arc<dyn BatchExecutor>,
        flags: Arc<dyn FeatureFlags>,
        audit: Arc<dyn AuditSink>,
        clock: Arc<dyn Clock>,
        config: EnforcerConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                executor,
                flags,
                audit,
                clock,
                config,
                state: Mutex::new(EnforcerState::default()),
            }),
        }
    }

    pub fn config(&self) -> &EnforcerConfig {
        &self.inner.config
    }

    /// Accept one request and return its deferred result.
    ///
    /// Backpressure, duplicate ids and use after `dispose` are reported here,
    /// synchronously, to this caller only.
    pub fn submit(&self, request: LogicalRequest) -> Result<ResponseHandle, RelayError> {
        let inner = &self.inner;
        let config = &inner.config;
        let (reply, rx) = oneshot::channel();

        if !inner.flags.is_enabled(COALESCING_FLAG) {
            {
                let mut state = inner.lock();
                if state.disposed {
                    return Err(RelayError::Disposed);
                }
                state.counters.passthrough_requests += 1;
            }
            inner.spawn_dispatch(vec![QueuedRequest { request, reply }], DispatchKind::Passthrough);
            return Ok(ResponseHandle { rx });
        }

        let snapshot = {
            let mut state = inner.lock();
            if state.disposed {
                return Err(RelayError::Disposed);
            }

            let pending = state.queue.len();
            if pending >= config.max_queue_depth {
                state.counters.backpressure_rejections += 1;
                drop(state);
                tracing::warn!(
                    component = %config.component_name,
                    pending,
                    max_depth = config.max_queue_depth,
                    "queue full; rejecting request"
                );
                inner.audit(
                    AuditAction::BatchBackpressure,
                    format!("Queue full: {pending}/{}", config.max_queue_depth),
                );
                return Err(RelayError::Backpressure {
                    component: config.component_name.clone(),
                    pending_count: pending,
                    max_depth: config.max_queue_depth,
                });
            }

            if let Some(id) = request.id()
                && state.queue.iter().any(|q| q.request.id() == Some(id))
            {
                return Err(RelayError::DuplicateRequestId { id: id.to_string() });
            }

            state.queue.push(QueuedRequest { request, reply });
            let pending = state.queue.len();
            state.high_water_mark = state.high_water_mark.max(pending);

            if pending >= config.flush_threshold {
                state.cancel_timer();
                Some(state.take_snapshot())
            } else {
                if state.timer.is_none() {
                    inner.start_timer(&mut state);
                }
                None
            }
        };

        if let Some(snapshot) = snapshot {
            tracing::debug!(component = %config.component_name, count = snapshot.len(), "threshold reached; flushing");
            inner.spawn_dispatch(snapshot, DispatchKind::Coalesced);
        }

        Ok(ResponseHandle { rx })
    }

    /// Submit and wait for the response.
    pub async fn enqueue(&self, request: LogicalRequest) -> Result<LogicalResponse, RelayError> {
        self.submit(request)?.await
    }

    /// Flush whatever is pending now. An empty queue makes no transport call.
    pub async fn flush(&self) {
        let snapshot = {
            let mut state = self.inner.lock();
            state.cancel_timer();
            state.take_snapshot()
        };
        self.inner.dispatch(snapshot, DispatchKind::Coalesced).await;
    }

    /// Reject everything still queued and stop accepting requests.
    ///
    /// A timer that already woke up sees the disposed flag and does nothing.
    /// Snapshots already handed to the transport still complete.
    pub fn dispose(&self) {
        let drained = {
            let mut state = self.inner.lock();
            state.disposed = true;
            state.cancel_timer();
            std::mem::take(&mut state.queue)
        };
        tracing::info!(component = %self.inner.config.component_name, rejected = drained.len(), "enforcer disposed");
        for queued in drained {
            let _ = queued.reply.send(Err(RelayError::Disposed));
        }
    }

    pub fn pending_count(&self) -> usize {
        self.inner.lock().queue.len()
    }

    pub fn high_water_mark(&self) -> usize {
        self.inner.lock().high_water_mark
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().disposed
    }

    pub fn status(&self) -> EnforcerStatus {
        let coalescing_enabled = self.inner.flags.is_enabled(COALESCING_FLAG);
        let config = &self.inner.config;
        let state = self.inner.lock();
        EnforcerStatus {
            component: config.component_name.clone(),
            pending: state.queue.len(),
            high_water_mark: state.high_water_mark,
            max_queue_depth: config.max_queue_depth,
            flush_threshold: config.flush_threshold,
            coalescing_enabled,
            timer_running: state.timer.is_some(),
            disposed: state.disposed,
            counters: state.counters,
        }
    }
}

/// Builder for `CoalescingEnforcer`.
///
/// Flags default to `NoopFeatureFlags` (coalescing off) until a real source
/// is wired in.
pub struct EnforcerBuilder {
    executor: Arc<dyn BatchExecutor>,
    flags: Arc<dyn FeatureFlags>,
    audit: Arc<dyn AuditSink>,
    clock: Arc<dyn Clock>,
    config: EnforcerConfig,
}

impl EnforcerBuilder {
    pub fn new(executor: Arc<dyn BatchExecutor>) -> Self {
        Self {
            executor,
            flags: Arc::new(NoopFeatureFlags),
            audit: Arc::new(NoopAuditSink),
            clock: Arc::new(SystemClock),
            config: EnforcerConfig::default(),
        }
    }

    pub fn feature_flags(mut self, flags: Arc<dyn FeatureFlags>) -> Self {
        self.flags = flags;
        self
    }

    pub fn audit_logger(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = audit;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(mut self, config: EnforcerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<CoalescingEnforcer, ConfigError> {
        self.config.validate()?;
        Ok(CoalescingEnforcer::from_parts(
            self.executor,
            self.flags,
            self.audit,
            self.clock,
            self.config,
        ))
    }
}
