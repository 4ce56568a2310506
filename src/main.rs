use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use tab_resources::config::{self, Config};
use tab_resources::control::{self, ControlState, NotifierFactory};
use tab_resources::protocol::{self, Incoming, Outgoing};
use tab_resources::rules::{self, CallbackFactory, RuleLoader};
use tab_resources::{ContentResources, Namespace, NativeHost};

/// Native messaging host that injects content scripts and stylesheets into
/// browser tabs by URL.
#[derive(Parser, Debug)]
#[command(name = "tab-resources", version)]
struct Cli {
    /// Config file (default: ~/.tab-resources/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Control server port
    #[arg(long)]
    port: Option<u16>,

    /// Directory of *.toml rule files
    #[arg(long)]
    rules_dir: Option<String>,

    /// Do not reload rule files when they change
    #[arg(long)]
    no_watch: bool,

    /// Log filter, e.g. "debug" or "tab_resources=trace"
    #[arg(long)]
    log_level: Option<String>,

    /// Arguments the browser appends (caller origin, parent window).
    #[arg(hide = true, trailing_var_arg = true, allow_hyphen_values = true)]
    browser_args: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match cli.config.as_deref() {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };
    let (mut config, config_error) = match loaded {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    apply_overrides(&mut config, &cli);

    // Logs go to stderr; stdout carries the native messaging protocol.
    init_tracing(config.log_level.as_deref());
    if let Some(e) = config_error {
        warn!(error = %e, "config not loaded, using defaults");
    }
    info!(browser_args = ?cli.browser_args, "starting");

    if let Err(e) = run(config).await {
        error!(error = %e, "host stopped with error");
    }
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(dir) = &cli.rules_dir {
        config.rules_dir = dir.clone();
    }
    if cli.no_watch {
        config.watch_rules = false;
    }
    if cli.log_level.is_some() {
        config.log_level = cli.log_level.clone();
    }
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

async fn run(config: Config) -> tab_resources::Result<()> {
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outgoing>();

    // Handle stdout in a dedicated task to ensure protocol compliance
    tokio::spawn(async move {
        let mut stdout = io::stdout();
        while let Some(msg) = out_rx.recv().await {
            if let Err(e) = protocol::write_message(&mut stdout, &msg) {
                error!(error = %e, "failed to write to stdout");
                break;
            }
        }
    });

    let host = Arc::new(NativeHost::new(out_tx).with_timeout(config.request_timeout()));
    let resources = ContentResources::new(host.clone());

    let file_callbacks: CallbackFactory = {
        let host = host.clone();
        Arc::new(move |ns: &Namespace| host.loaded_notifier(Some(ns)))
    };
    let loader = Arc::new(
        RuleLoader::new(resources.clone(), config.rules_path()).with_callback_factory(file_callbacks),
    );
    let namespaces = loader.load_all()?;
    info!(files = namespaces.len(), rules = resources.rule_count(), "rules loaded");

    let http_callbacks: NotifierFactory = {
        let host = host.clone();
        Arc::new(move |ns: Option<&Namespace>| Some(host.loaded_notifier(ns)))
    };
    let state = ControlState {
        resources: resources.clone(),
        notifier: Some(http_callbacks),
    };
    match tokio::net::TcpListener::bind(("127.0.0.1", config.port)).await {
        Ok(listener) => {
            info!(port = config.port, "control server listening");
            tokio::spawn(async move {
                if let Err(e) = axum::serve(listener, control::router(state)).await {
                    error!(error = %e, "control server stopped");
                }
            });
        }
        Err(e) => warn!(port = config.port, error = %e, "control server disabled"),
    }

    let (change_tx, mut change_rx) = mpsc::unbounded_channel::<PathBuf>();
    let _watcher = if config.watch_rules && loader.dir().is_dir() {
        loader
            .watch(change_tx)
            .inspect_err(|e| warn!(error = %e, "not watching rules directory"))
            .ok()
    } else {
        None
    };
    {
        let loader = loader.clone();
        tokio::spawn(async move {
            while let Some(first) = change_rx.recv().await {
                // Editors tend to emit several events per save.
                tokio::time::sleep(Duration::from_millis(200)).await;
                for path in rules::drain_changes(first, &mut change_rx) {
                    if let Err(e) = loader.reload_file(&path).await {
                        warn!(path = %path.display(), error = %e, "rules reload failed");
                    }
                }
            }
        });
    }

    // Main loop: read frames from the extension on a blocking thread. Responses
    // are resolved right away so requests awaited elsewhere never wait on the
    // event loop below.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Incoming>();
    let reader_host = host.clone();
    let reader = tokio::task::spawn_blocking(move || {
        let mut stdin = io::stdin().lock();
        loop {
            match protocol::read_message::<_, Incoming>(&mut stdin) {
                Ok(Incoming::Response {
                    request_id,
                    result,
                    error,
                }) => reader_host.resolve(request_id, result, error),
                Ok(event) => {
                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    warn!(error = %e, "skipping malformed message");
                }
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    info!("stdin closed");
                    break;
                }
                Err(e) => {
                    error!(error = %e, "error reading from stdin");
                    break;
                }
            }
        }
        reader_host.disconnect();
    });

    while let Some(event) = event_rx.recv().await {
        match event {
            Incoming::TabUpdated {
                tab_id,
                change_info,
                tab,
            } => {
                resources.on_tab_updated(tab_id, &change_info, &tab);
            }
            Incoming::TabRemoved { tab_id } => resources.on_tab_removed(tab_id),
            Incoming::Response { .. } => {}
        }
    }

    resources.shutdown();
    if let Err(e) = reader.await {
        warn!(error = %e, "stdin reader did not finish cleanly");
    }
    Ok(())
}
