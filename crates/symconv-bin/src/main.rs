//! symconv entrypoint: replay an edit trace through a symbol-conversion session.
use anyhow::{Context, Result};
use clap::Parser;
use core_config::load_from;
use core_detect::SuppressRule;
use core_events::{
    EVENT_CHANNEL_CAP, Event, EventHooks, EventSourceRegistry, HostEvent, InputEvent,
    NoopEventHooks, TickEventSource,
};
use core_state::Session;
use core_text::Document;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{error, info, trace, warn};
use tracing_appender::non_blocking::WorkerGuard;

mod host;
mod replay;
mod watch;

use host::{DEFAULT_LANGUAGE, ReplayHost};
use replay::{TraceReplaySource, parse_trace};
use watch::ConfigWatchSource;

const TICK_INTERVAL: Duration = Duration::from_millis(10);

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "symconv", version, about = "Replay an edit trace through symbol conversion")]
struct Args {
    /// JSON-lines trace to replay.
    pub trace: PathBuf,
    /// Initial document content (empty when omitted).
    #[arg(long = "document")]
    pub document: Option<PathBuf>,
    /// Configuration file path (overrides discovery of `symconv.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Reload the configuration whenever the file changes.
    #[arg(long = "watch-config")]
    pub watch_config: bool,
    /// Language id for trace steps that do not name one.
    #[arg(long = "language", default_value = DEFAULT_LANGUAGE)]
    pub language: String,
}

struct AppStartup {
    log_guard: Option<WorkerGuard>,
}

impl AppStartup {
    fn new() -> Self {
        Self { log_guard: None }
    }

    fn configure_logging(&mut self) -> Result<()> {
        let log_dir = Path::new(".");
        let log_path = log_dir.join("symconv.log");
        if log_path.exists() {
            let _ = std::fs::remove_file(&log_path);
        }

        let file_appender = tracing_appender::rolling::never(log_dir, "symconv.log");
        let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
        match tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_ansi(false)
            .with_writer(nb_writer)
            .try_init()
        {
            Ok(_) => {
                self.log_guard = Some(guard);
            }
            Err(_err) => {
                // Global tracing subscriber already installed; drop guard so writer shuts down.
            }
        }

        Ok(())
    }

    fn install_panic_hook() {
        static HOOK: Once = Once::new();
        HOOK.call_once(|| {
            let default_panic = std::panic::take_hook();
            std::panic::set_hook(Box::new(move |info| {
                tracing::error!(target: "runtime.panic", ?info, "panic");
                default_panic(info);
            }));
        });
    }
}

enum LoopControl {
    Continue,
    Break { reason: ShutdownReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShutdownReason {
    TraceFinished,
    ChannelClosed,
}

impl ShutdownReason {
    fn as_str(&self) -> &'static str {
        match self {
            ShutdownReason::TraceFinished => "trace_finished",
            ShutdownReason::ChannelClosed => "channel_closed",
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn log_shutdown_stage(reason: ShutdownReason, stage: &'static str) {
    info!(
        target: "runtime.shutdown",
        reason = reason.as_str(),
        stage = stage,
        "shutdown_stage"
    );
}

struct ReplayRuntime {
    session: Session,
    host: ReplayHost,
    config_path: Option<PathBuf>,
    hooks: Box<dyn EventHooks>,
    rx: mpsc::Receiver<Event>,
    tx: Option<mpsc::Sender<Event>>,
    source_handles: Vec<tokio::task::JoinHandle<()>>,
}

impl ReplayRuntime {
    fn new(
        session: Session,
        doc: Document,
        config_path: Option<PathBuf>,
        tx: mpsc::Sender<Event>,
        rx: mpsc::Receiver<Event>,
    ) -> Self {
        Self {
            session,
            host: ReplayHost::new(doc, Some(tx.clone())),
            config_path,
            hooks: Box::new(NoopEventHooks),
            rx,
            tx: Some(tx),
            source_handles: Vec::new(),
        }
    }

    async fn run(&mut self) -> Result<()> {
        let loop_span = tracing::debug_span!(target: "runtime", "event_loop");
        let _enter_loop = loop_span.enter();

        let mut shutdown_reason = ShutdownReason::ChannelClosed;
        while let Some(event) = self.rx.recv().await {
            self.hooks.pre_handle(&event);
            match self.handle(&event, Instant::now()) {
                LoopControl::Break { reason } => {
                    shutdown_reason = reason;
                    break;
                }
                LoopControl::Continue => self.hooks.post_handle(&event),
            }
        }

        self.rx.close();
        self.finalize_shutdown(shutdown_reason).await;
        Ok(())
    }

    fn handle(&mut self, event: &Event, now: Instant) -> LoopControl {
        match event {
            Event::Input(input) => self.handle_input(input, now),
            Event::Host(host_event) => self.handle_host(host_event, now),
            Event::Tick => {
                self.session.poll(now, &mut self.host);
            }
            Event::Shutdown => {
                return LoopControl::Break {
                    reason: ShutdownReason::TraceFinished,
                };
            }
        }
        LoopControl::Continue
    }

    fn handle_input(&mut self, input: &InputEvent, now: Instant) {
        match self.host.apply_input(input) {
            Ok(Some(notification)) => self.handle_host(&notification, now),
            Ok(None) => {}
            Err(err) => warn!(target: "runtime", %err, "input_rejected"),
        }
    }

    fn handle_host(&mut self, event: &HostEvent, now: Instant) {
        match event {
            HostEvent::TextChanged(change) => {
                let outcome = self.session.on_text_change(change, now, &mut self.host);
                trace!(
                    target: "runtime",
                    edits = change.edits.len(),
                    inserted = change.inserted_chars(),
                    ?outcome,
                    "text_change_handled"
                );
            }
            HostEvent::SelectionChanged(sel) => self.session.on_selection_change(sel),
            HostEvent::ConfigChanged => match load_from(self.config_path.clone()) {
                Ok(cfg) => self.session.on_config_change(cfg),
                Err(err) => error!(target: "runtime", %err, "config_reload_failed"),
            },
            HostEvent::MutationSettled => {
                self.session.settle(&mut self.host);
            }
        }
    }

    async fn finalize_shutdown(&mut self, reason: ShutdownReason) {
        log_shutdown_stage(reason, "begin");
        self.session.deactivate();
        self.host.disconnect();
        if let Some(tx) = self.tx.take() {
            trace!(
                target: "runtime.shutdown",
                reason = reason.as_str(),
                "dropping_runtime_sender"
            );
            drop(tx);
        }

        while let Some(handle) = self.source_handles.pop() {
            match tokio::time::timeout(Duration::from_millis(200), handle).await {
                Ok(Ok(_)) => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_stopped"
                ),
                Ok(Err(err)) if err.is_cancelled() => trace!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_cancelled"
                ),
                Ok(Err(err)) => error!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    ?err,
                    "event_source_task_error"
                ),
                Err(_) => warn!(
                    target: "runtime.shutdown",
                    reason = reason.as_str(),
                    "event_source_task_timeout"
                ),
            }
        }

        log_shutdown_stage(reason, "complete");
    }

    fn skip_summary(&self) -> Vec<String> {
        let stats = self.session.stats();
        let mut out: Vec<String> = SuppressRule::ALL
            .iter()
            .filter_map(|rule| {
                let rec = stats.get(*rule)?;
                let hint = rule.hint();
                Some(format!(
                    "{:>5}x {} [{}] last in {}; {}",
                    rec.count, hint.title, hint.setting_key, rec.last_language, hint.suggestion
                ))
            })
            .collect();
        let m = self.session.metrics();
        out.push(format!(
            "batches={} suppressed={} dropped_busy={} passes={} replacements={} cursor_moves={}",
            m.batches_seen,
            m.batches_suppressed,
            m.batches_dropped_busy,
            m.passes_run,
            m.replacements_applied,
            m.cursor_moves
        ));
        out
    }
}

fn read_document(path: Option<&PathBuf>) -> Result<Document> {
    let Some(path) = path else {
        return Ok(Document::from_str(""));
    };
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading document {}", path.display()))?;
    let normalized = content.replace("\r\n", "\n");
    tracing::debug!(target: "io", file = %path.display(), size_bytes = content.len(), "file_read_ok");
    Ok(Document::from_str(&normalized))
}

#[tokio::main]
async fn main() -> Result<()> {
    let mut startup = AppStartup::new();
    startup.configure_logging()?;
    AppStartup::install_panic_hook();
    info!(target: "runtime", "startup");

    let args = Args::parse();
    let trace_src = std::fs::read_to_string(&args.trace)
        .with_context(|| format!("reading trace {}", args.trace.display()))?;
    let steps = parse_trace(&trace_src)?;
    let doc = read_document(args.document.as_ref())?;
    let config = load_from(args.config.clone())?;
    info!(
        target: "runtime.startup",
        steps = steps.len(),
        enabled = config.file.enabled,
        config_override = args.config.is_some(),
        watch_config = args.watch_config,
        "bootstrap_complete"
    );

    let (tx, rx) = mpsc::channel::<Event>(EVENT_CHANNEL_CAP);
    let mut registry = EventSourceRegistry::new();
    registry.register(TraceReplaySource::new(steps, args.language.clone()));
    registry.register(TickEventSource::new(TICK_INTERVAL));
    if args.watch_config {
        let path = args.config.clone().unwrap_or_else(core_config::discover);
        registry.register(ConfigWatchSource::new(path));
    }

    let mut runtime = ReplayRuntime::new(Session::new(config), doc, args.config.clone(), tx, rx);
    if let Some(tx) = runtime.tx.as_ref() {
        runtime.source_handles = registry.spawn_all(tx);
    }
    runtime.run().await?;

    print!("{}", runtime.host.document().text());
    for line in runtime.skip_summary() {
        eprintln!("{line}");
    }
    drop(startup.log_guard.take());
    Ok(())
}
