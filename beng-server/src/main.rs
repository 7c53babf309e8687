// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  beng-proxy — HTTP reverse proxy, web accelerator and content
//  transformation gateway
//
//  Architecture: monoio thread-per-core data plane + tokio control
//  plane (translation cache refresh, active health checks, metrics)
//  Config:       YAML file + BENG_-prefixed environment overrides
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

mod metrics_server;

use beng_core::config::BengConfig;
use beng_observability::MetricsCollector;
use beng_proxy::worker::{self, SharedState};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

static SHUTDOWN: AtomicBool = AtomicBool::new(false);

#[derive(Parser, Debug)]
#[command(name = "beng-proxy", version, about = "beng-proxy — HTTP reverse proxy and content transformation gateway")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .with_target(false)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "beng-proxy starting");

    let config = BengConfig::load(cli.config.as_ref().and_then(|p| p.to_str()))?;
    let num_workers = config.effective_workers();
    info!(workers = num_workers, addr = %config.listener.http_addr, "configuration loaded");

    let metrics = Arc::new(MetricsCollector::default());
    let observability = config.observability.clone();

    if observability.prometheus_enabled {
        let metrics = Arc::clone(&metrics);
        let addr = observability.prometheus_addr;
        let path = observability.prometheus_path.clone();
        std::thread::Builder::new()
            .name("beng-control".to_string())
            .spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("failed to build tokio runtime for control plane");
                rt.block_on(metrics_server::serve(addr, path, metrics));
            })
            .expect("failed to spawn control-plane thread");
        info!(addr = %addr, "metrics endpoint started");
    }

    let shared = SharedState::new(config);
    let worker_handles = worker::spawn_workers(Arc::clone(&shared), num_workers);

    info!(workers = num_workers, "beng-proxy is ready — serving traffic");

    setup_signal_handler();
    while !SHUTDOWN.load(Ordering::Relaxed) {
        std::thread::sleep(std::time::Duration::from_millis(100));
    }

    info!("shutdown signal received, stopping");

    // Worker threads run an infinite accept loop; the OS reclaims them on
    // process exit. A graceful per-connection drain is future work.
    drop(worker_handles);

    info!("beng-proxy stopped");
    Ok(())
}

fn setup_signal_handler() {
    for sig in [libc::SIGTERM, libc::SIGINT] {
        unsafe {
            libc::signal(sig, signal_handler as libc::sighandler_t);
        }
    }
}

extern "C" fn signal_handler(_sig: libc::c_int) {
    SHUTDOWN.store(true, Ordering::Relaxed);
}
