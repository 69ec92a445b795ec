//! reqtui entrypoint: wires the Data Model, Preparer, Dispatcher, OAuth
//! Manager, transports, and Presentation Model into the single-threaded
//! cooperative event loop described in spec §5.
//!
//! Document parsing, history, clipboard, and the binary-view/diff services
//! are external collaborators (spec §1, §6) and are not implemented here;
//! this binary drives one request (built from a `curl`/URL line via the
//! Preparer's inline builder) or a profile run of that request, through the
//! real send path, and reports the result the way the Presentation Model
//! would hand it to a renderer.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use std::time::Duration;

use anyhow::{anyhow, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use reqtui_config::Options;
use reqtui_dispatcher::{preparer, Dispatcher, ExecutionContext};
use reqtui_events::{
    CommandEvent, Event, EventSourceRegistry, TickEventSource, EVENT_CHANNEL_CAP,
};
use reqtui_model::document::{Document, Environment};
use reqtui_model::{CancelToken, ErrKind, ProfileSpec, ResponseMsg};
use reqtui_oauth::{Manager, ReqwestOAuthTransport};
use reqtui_render::{self as render, PresentationModel, PRIMARY};
use reqtui_transport::{GrpcTransport, HttpTransport, ReqwestHttpTransport, TonicGrpcTransport};

/// Status-pulse / reflow-debounce tick period (spec §4.6, §4.7).
const TICK_PERIOD: Duration = Duration::from_millis(100);

/// What the user hands the engine: a single request line (inline curl/URL
/// form, spec §4.1) plus how many times to repeat it.
#[derive(Parser, Debug)]
#[command(name = "reqtui", version, about = "HTTP/gRPC/WebSocket/SSE request runner")]
struct Args {
    /// A request line: `METHOD URL`, a bare URL (implies GET), or a `curl …`
    /// invocation (spec §4.1 inline builder).
    request: String,
    /// Environment name scoping variable resolution and capture storage.
    #[arg(long, default_value = "default")]
    environment: String,
    /// Repeat the request `count` times through the Profile Runner (spec §4.9)
    /// instead of sending it once.
    #[arg(long)]
    profile: Option<usize>,
    /// Warmup iterations excluded from profile stats.
    #[arg(long, default_value_t = 0)]
    warmup: usize,
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn run(&mut self) -> Result<()> {
        self.configure_logging()?;
        Self::install_panic_hook();
        info!(target: "runtime", "startup");
        Ok(())
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let file_appender = tracing_appender::rolling::never(log_dir, "reqtui.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => self.log_guard = Some(guard),
            Err(_) => {
                // Subscriber already installed (e.g. under a test harness); drop the guard.
            }
        }
        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

/// Assembles the transport/OAuth/dispatcher stack the rest of the loop
/// drives requests through.
struct Engine {
    dispatcher: Dispatcher<ReqwestOAuthTransport>,
}

impl Engine {
    fn build() -> Result<Self> {
        let options = Options::load();
        let http: Arc<dyn HttpTransport> = Arc::new(
            ReqwestHttpTransport::from_options(&options).map_err(|e| anyhow!(e.to_string()))?,
        );
        let grpc: Arc<dyn GrpcTransport> = Arc::new(TonicGrpcTransport::new());
        let oauth_client = reqwest::Client::new();
        let oauth = Arc::new(Manager::new(ReqwestOAuthTransport::new(oauth_client)));
        let script = Arc::new(reqtui_dispatcher::NullScriptRunner);
        Ok(Self {
            dispatcher: Dispatcher::new(http, grpc, oauth, script),
        })
    }
}

/// Sends the document's one request through the dispatcher on a background
/// task and posts the raw `ResponseMsg` back to the loop (spec §5: transport
/// work runs off the loop and communicates via typed messages).
fn spawn_send(engine: Arc<Engine>, doc: Document, environment: Environment, cwd: PathBuf, tx: mpsc::Sender<Event>) {
    tokio::spawn(async move {
        let descriptor = &doc.requests[0];
        let ctx = ExecutionContext {
            doc: &doc,
            environment: &environment,
            capture_env_override: None,
            cwd: &cwd,
            chained_vars: Default::default(),
        };
        let outcome = engine
            .dispatcher
            .execute_request(descriptor, Duration::from_secs(30), ctx)
            .await;
        let _ = tx.send(Event::Response(outcome.response)).await;
        let _ = tx.send(Event::Command(CommandEvent::Quit)).await;
    });
}

/// Converts a dispatched `ResponseMsg` into the snapshot the Presentation
/// Model ingests (spec §4.6), logging at the suspension-point boundary.
fn ingest_response(presentation: &mut PresentationModel, environment: &str, response: ResponseMsg) {
    let id = render::next_snapshot_id();
    let snapshot = match response {
        ResponseMsg::Http { result: Ok(resp), .. } => render::from_http(id, environment, &resp),
        ResponseMsg::Grpc { result: Ok(resp), .. } => render::from_grpc(id, environment, &resp),
        ResponseMsg::Http { result: Err(err), .. } | ResponseMsg::Grpc { result: Err(err), .. } => {
            if err.is_cancellation() {
                info!(target: "dispatch", "send canceled");
            } else {
                warn!(target: "dispatch", error = %err, "send failed");
            }
            presentation.render_error(PRIMARY, &err);
            return;
        }
        ResponseMsg::Test { .. } => render::pending(id, environment),
    };
    info!(target: "dispatch", status = %snapshot.pretty.len(), "response received");
    presentation.ingest_snapshot(snapshot);
}

/// Runs the single-threaded event loop for one document (spec §5): spawns
/// the tick source, drives the send on a background task, and applies
/// every resulting `Event` to the `PresentationModel` on this loop.
async fn run_loop(engine: Engine, doc: Document, environment: Environment, cwd: PathBuf) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(EVENT_CHANNEL_CAP);
    let mut sources = EventSourceRegistry::new();
    sources.register(TickEventSource::new(TICK_PERIOD));
    let tick_handles = sources.spawn_all(&tx);

    let mut presentation = PresentationModel::new();
    presentation.start_sending();

    spawn_send(Arc::new(engine), doc, environment.clone(), cwd, tx.clone());
    drop(tx);

    let mut shutdown = false;
    while let Some(event) = rx.recv().await {
        match event {
            Event::Tick(_) => presentation.tick_pulse(),
            Event::Response(response) => {
                presentation.finish_sending();
                ingest_response(&mut presentation, &environment.name, response);
            }
            Event::Command(CommandEvent::Quit) | Event::Command(CommandEvent::CancelRequest) => {
                shutdown = true;
            }
            Event::Shutdown => shutdown = true,
            _ => {}
        }
        if shutdown {
            break;
        }
    }

    for handle in tick_handles {
        handle.abort();
    }

    match presentation.primary.current() {
        Some(snapshot) if snapshot.ready => println!("{}", snapshot.pretty),
        Some(snapshot) => eprintln!("{}", snapshot.pretty),
        None => {}
    }

    Ok(())
}

async fn run_profile(engine: Engine, doc: Document, environment: Environment, cwd: PathBuf, count: usize, warmup: usize) -> Result<()> {
    let cancel = CancelToken::new();
    let spec = ProfileSpec {
        warmup,
        count,
        delay: None,
    };
    let stats = render::run_profile(
        &engine.dispatcher,
        &doc.requests[0],
        &spec,
        Duration::from_secs(30),
        &doc,
        &environment,
        &cwd,
        &cancel,
    )
    .await;
    info!(
        target: "profile",
        runs = stats.runs,
        successes = stats.successes,
        failures = stats.failures,
        throughput = stats.throughput_per_sec,
        "profile complete"
    );
    println!(
        "runs={} successes={} failures={} throughput={:.1}/s",
        stats.runs, stats.successes, stats.failures, stats.throughput_per_sec
    );
    if let Some(latency) = &stats.latency {
        println!(
            "p50={:?} p90={:?} p99={:?} max={:?}",
            latency.p50, latency.p90, latency.p99, latency.max
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut startup = AppStartup::new();
    startup.run()?;

    let args = Args::parse();
    let descriptor = preparer::build_from_line(&args.request)
        .map_err(|e: ErrKind| anyhow!(e.to_string()))?
        .ok_or_else(|| anyhow!("not a recognized request line: {}", args.request))?;

    let cwd = std::env::current_dir()?;
    let doc = Document {
        path: PathBuf::from("<cli>"),
        requests: vec![descriptor],
        defaults: Default::default(),
    };
    let environment = Environment::new(args.environment.clone());
    let engine = Engine::build()?;

    match args.profile {
        Some(count) => run_profile(engine, doc, environment, cwd, count, args.warmup).await,
        None => run_loop(engine, doc, environment, cwd).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_from_line_recognizes_a_bare_url() {
        let descriptor = preparer::build_from_line("https://example.com/health")
            .unwrap()
            .unwrap();
        assert_eq!(descriptor.url, "https://example.com/health");
    }

    #[test]
    fn build_from_line_rejects_unrecognized_input() {
        assert!(preparer::build_from_line("not a request").unwrap().is_none());
    }
}
