//! Event channel and async event source infrastructure for the engine's
//! single-threaded event loop (spec §5).
//!
//! The loop itself lives in the `reqtui-cli` binary; this crate only owns
//! the tagged-union `Event`, the bounded channel policy, and the
//! `AsyncEventSource` trait that background producers (transport sends,
//! stream runners, the reflow scheduler, OAuth acquisition) implement.

use std::sync::atomic::AtomicU64;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;

use reqtui_model::{
    OAuthTokenMsg, ProfileProgressMsg, ProfileResultMsg, RawDumpResultMsg, ReflowResultMsg,
    ResponseMsg, StreamProgressMsg, TickMsg,
};

// -----------------------------------------------------------------------------------------------
// Channel Policy
// -----------------------------------------------------------------------------------------------
// The event loop consumes a bounded mpsc channel sized by `EVENT_CHANNEL_CAP`. Producers are
// background async tasks (HTTP/gRPC sends, stream runners, the reflow scheduler, OAuth
// acquisition); none of them are latency-critical enough to justify an unbounded channel, and a
// bound gives natural backpressure if the render/dispatch side falls behind.
pub const EVENT_CHANNEL_CAP: usize = 2048;

pub static CHANNEL_SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_SOURCE_STARTS: AtomicU64 = AtomicU64::new(0);
pub static ASYNC_SOURCE_STOP_CHANNEL: AtomicU64 = AtomicU64::new(0);

/// Top-level event enum consumed by the central event loop (spec §5).
#[derive(Debug, Clone)]
pub enum Event {
    Command(CommandEvent),
    Response(ResponseMsg),
    StreamProgress(StreamProgressMsg),
    ReflowResult(ReflowResultMsg),
    RawDumpResult(RawDumpResultMsg),
    ProfileProgress(ProfileProgressMsg),
    ProfileResult(ProfileResultMsg),
    OAuthToken(OAuthTokenMsg),
    RenderRequested,
    /// Monotonic tick driving debounce timers without busy polling.
    Tick(TickMsg),
    Shutdown,
}

#[derive(Debug, Clone)]
pub enum CommandEvent {
    SendRequest,
    CancelRequest,
    Quit,
}

/// Optional hooks observing events at the loop boundary. Default is a no-op;
/// implementations must not block the loop.
pub trait EventHooks: Send + Sync + 'static {
    fn pre_handle(&self, _event: &Event) {}
    fn post_handle(&self, _event: &Event) {}
}

pub struct NoopEventHooks;

impl EventHooks for NoopEventHooks {}

/// Trait implemented by any async event producer. Implementors hold their own
/// configuration and spawn one background task that pushes `Event`s into the
/// shared channel, terminating promptly when the channel closes.
pub trait AsyncEventSource: Send + 'static {
    /// Human-readable stable identifier (used for logging/diagnostics).
    fn name(&self) -> &'static str;
    /// Consume self and spawn the background task. Implementors should stop
    /// when `tx.send(..).await` errs (channel closed) or on their own
    /// internal stop condition, and should never busy-loop.
    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()>;
}

/// Registry of event sources, spawned all at once at startup.
pub struct EventSourceRegistry {
    sources: Vec<Box<dyn AsyncEventSource>>,
}

impl Default for EventSourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSourceRegistry {
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    pub fn register<S: AsyncEventSource>(&mut self, src: S) {
        self.sources.push(Box::new(src));
    }

    /// Spawn all registered sources, returning their JoinHandles. Each source
    /// receives its own clone of `tx`; the caller should drop its own sender
    /// before awaiting these handles during shutdown so sources observe the
    /// closed channel and exit cooperatively.
    pub fn spawn_all(&mut self, tx: &Sender<Event>) -> Vec<JoinHandle<()>> {
        let mut out = Vec::with_capacity(self.sources.len());
        for src in self.sources.drain(..) {
            let name = src.name();
            tracing::info!(target: "reqtui::events", source = name, "spawning event source");
            ASYNC_SOURCE_STARTS.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            out.push(src.spawn(tx.clone()));
        }
        out
    }
}

/// Built-in monotonic tick source used to drive debounce timers (spec §4.7).
pub struct TickEventSource {
    interval: std::time::Duration,
}

impl TickEventSource {
    pub fn new(interval: std::time::Duration) -> Self {
        Self { interval }
    }
}

impl AsyncEventSource for TickEventSource {
    fn name(&self) -> &'static str {
        "tick"
    }

    fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
        let dur = self.interval;
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(dur);
            let start = tokio::time::Instant::now();
            loop {
                let tick = interval.tick().await;
                let elapsed = tick.saturating_duration_since(start);
                if tx.send(Event::Tick(TickMsg { elapsed })).await.is_err() {
                    ASYNC_SOURCE_STOP_CHANNEL.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                    break;
                }
            }
        })
    }
}

/// Helper result type for channel setup.
pub type EventResult<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct MockOnceSource;

    impl AsyncEventSource for MockOnceSource {
        fn name(&self) -> &'static str {
            "mock_once"
        }
        fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
            tokio::spawn(async move {
                let _ = tx.send(Event::RenderRequested).await;
            })
        }
    }

    #[tokio::test]
    async fn registry_spawns_and_emits() {
        let (tx, mut rx) = mpsc::channel::<Event>(8);
        let mut reg = EventSourceRegistry::new();
        reg.register(MockOnceSource);
        reg.register(TickEventSource::new(Duration::from_millis(10)));
        let handles = reg.spawn_all(&tx);

        let mut got_render = false;
        let mut got_tick = false;
        let start = std::time::Instant::now();
        while start.elapsed() < Duration::from_millis(200) && (!got_render || !got_tick) {
            if let Ok(Some(ev)) = tokio::time::timeout(Duration::from_millis(10), rx.recv()).await
            {
                match ev {
                    Event::RenderRequested => got_render = true,
                    Event::Tick(_) => got_tick = true,
                    _ => {}
                }
            }
        }
        assert!(got_render, "expected mock source to emit a render request");
        assert!(got_tick, "expected tick source to emit ticks");

        drop(tx);
        drop(rx);
        for handle in handles {
            let _ = tokio::time::timeout(Duration::from_millis(50), handle).await;
        }
    }

    struct MockCloseSource {
        flag: Arc<AtomicBool>,
    }

    impl AsyncEventSource for MockCloseSource {
        fn name(&self) -> &'static str {
            "mock_close"
        }
        fn spawn(self: Box<Self>, tx: Sender<Event>) -> JoinHandle<()> {
            let flag = self.flag.clone();
            tokio::spawn(async move {
                tx.closed().await;
                flag.store(true, Ordering::SeqCst);
            })
        }
    }

    #[tokio::test]
    async fn registry_sources_exit_on_channel_drop() {
        let (tx, rx) = mpsc::channel::<Event>(8);
        let mut reg = EventSourceRegistry::new();
        let flag = Arc::new(AtomicBool::new(false));
        reg.register(MockCloseSource { flag: flag.clone() });
        let handles = reg.spawn_all(&tx);

        drop(tx);
        drop(rx);

        for handle in handles {
            match tokio::time::timeout(Duration::from_millis(50), handle).await {
                Ok(join_res) => join_res.expect("source task should exit cleanly"),
                Err(_) => panic!("source task did not observe channel closure"),
            }
        }
        assert!(flag.load(Ordering::SeqCst));
    }
}
