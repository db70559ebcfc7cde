//! Pane
//!
//! A small window server: clients connect over a Unix socket, draw into
//! shared memory buffers, and the server composites their windows with
//! server-side decorations into a software framebuffer.

mod compositor;
mod config;
mod input;
mod input_async;
mod server;
mod shared;
mod shm;
mod wm;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use input_async::InputEventStream;
use server::ServerContext;
use server::ipc::IpcServer;

/// Command line options
#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    socket: Option<PathBuf>,
    no_input: bool,
}

impl Args {
    fn parse() -> Result<Self> {
        let mut args = Args::default();
        let mut iter = std::env::args().skip(1);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    args.config = Some(iter.next().context("--config needs a path")?.into());
                }
                "--socket" | "-s" => {
                    args.socket = Some(iter.next().context("--socket needs a path")?.into());
                }
                "--no-input" => args.no_input = true,
                other => anyhow::bail!("Unknown argument: {}", other),
            }
        }
        Ok(args)
    }
}

/// Main application state
struct PaneApp {
    server: ServerContext,
    input: Option<InputEventStream>,
    socket_path: PathBuf,
}

impl PaneApp {
    fn new(args: &Args) -> Result<Self> {
        let config = match &args.config {
            Some(path) => config::Config::load_from(path),
            None => config::Config::load(),
        }
        .context("Failed to load configuration")?;

        let socket_path = args
            .socket
            .clone()
            .or_else(|| config.server.socket_path.clone())
            .unwrap_or_else(pane_proto::socket_path);
        let buffer_dir = socket_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(std::env::temp_dir);

        let input = if config.input.enabled && !args.no_input {
            match InputEventStream::open(&config.input.mouse_device) {
                Ok(stream) => {
                    info!("Reading pointer input from {:?}", config.input.mouse_device);
                    Some(stream)
                }
                Err(e) => {
                    warn!("Pointer input disabled: {:#}", e);
                    None
                }
            }
        } else {
            info!("Pointer input disabled");
            None
        };

        let server = ServerContext::new(&config, buffer_dir)?;
        Ok(Self {
            server,
            input,
            socket_path,
        })
    }

    /// Main event loop
    async fn run(mut self) -> Result<()> {
        let mut ipc = IpcServer::bind(&self.socket_path)?.start();
        info!("Starting main event loop");
        self.server.flush();

        loop {
            tokio::select! {
                event = ipc.events.recv() => {
                    let Some(event) = event else {
                        error!("IPC acceptor stopped");
                        return Ok(());
                    };
                    self.server.handle_event(event);
                    // Batch whatever else is already queued before compositing
                    while let Ok(event) = ipc.events.try_recv() {
                        self.server.handle_event(event);
                    }
                }

                () = async {
                    match &self.input {
                        Some(input) => input.wait_readable().await,
                        None => std::future::pending().await,
                    }
                } => {
                    if let Some(input) = &mut self.input {
                        match input.poll_packets() {
                            Ok(packets) => self.server.process_motion_packets(&packets),
                            Err(e) => {
                                error!("Pointer device failed, disabling input: {:#}", e);
                                self.input = None;
                            }
                        }
                    }
                }
            }
            self.server.flush();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "pane=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Pane window server");
    let args = Args::parse()?;

    // Setup signal handlers for graceful shutdown
    let (shutdown_tx, mut shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::spawn(async move {
            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
                _ = sigint.recv() => info!("Received SIGINT, shutting down gracefully"),
            }
            let _ = shutdown_tx.send(()).await;
        });
    }

    let app = PaneApp::new(&args)?;

    tokio::select! {
        result = app.run() => {
            if let Err(e) = result {
                error!("Application error: {:#}", e);
                return Err(e);
            }
        }
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received, cleaning up...");
        }
    }

    Ok(())
}
