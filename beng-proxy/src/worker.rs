use beng_cache::{RubberStore, SingleFlight};
use beng_core::config::BengConfig;
use beng_pool::{Balancer, BalancePolicy, FailureTable, IdlePool};
use beng_translation::TranslationCache;
use beng_widget::{ClassRegistry, InMemoryStateStore};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use tracing::{error, info};

use crate::orchestrator::WorkerState;

/// Configuration shared (read-only) by every worker thread.
pub struct SharedState {
    pub config: Arc<BengConfig>,
}

impl SharedState {
    pub fn new(config: BengConfig) -> Arc<Self> {
        Arc::new(Self {
            config: Arc::new(config),
        })
    }
}

/// Spawn monoio worker threads — one per core.
///
/// Each thread runs an independent monoio runtime with its own TCP
/// listener, event loop, and per-thread `WorkerState` (§5 concurrency
/// model: no cross-thread sharing of hot-path state).
pub fn spawn_workers(shared: Arc<SharedState>, num_workers: usize) -> Vec<std::thread::JoinHandle<()>> {
    let listen_addr = shared.config.listener.http_addr.to_string();
    let mut handles = Vec::with_capacity(num_workers);

    for worker_id in 0..num_workers {
        let shared = Arc::clone(&shared);
        let addr = listen_addr.clone();

        let handle = std::thread::Builder::new()
            .name(format!("beng-worker-{}", worker_id))
            .spawn(move || {
                let mut rt = monoio::RuntimeBuilder::<monoio::FusionDriver>::new()
                    .enable_all()
                    .build()
                    .expect("failed to build monoio runtime");

                rt.block_on(worker_loop(worker_id, shared, addr));
            })
            .expect("failed to spawn worker thread");

        handles.push(handle);
    }

    info!(workers = num_workers, addr = %listen_addr, "workers spawned");
    handles
}

fn new_worker_state(shared: &SharedState) -> WorkerState {
    let cfg = &shared.config;
    WorkerState {
        translation_socket: cfg.translation.socket_path.to_string_lossy().into_owned(),
        translation_cache: TranslationCache::new(cfg.translation.cache_max_entries),
        response_cache: RubberStore::new(cfg.cache.rubber_max_size_bytes, cfg.cache.compaction_ratio)
            .expect("failed to map response cache arena"),
        idle_pool: IdlePool::new(
            cfg.pool.idle_per_address_max,
            cfg.pool.idle_global_max,
            std::time::Duration::from_secs(cfg.pool.idle_timeout_secs),
        ),
        failures: FailureTable::new(),
        balancer: Balancer::new(BalancePolicy::StickyHash),
        class_registry: ClassRegistry::new(),
        widget_state: InMemoryStateStore::default(),
        session_cookie_name: "beng_sid".to_string(),
        hop_identity: "beng-proxy".to_string(),
        cache_max_body_bytes: cfg.cache.max_body_bytes,
        single_flight: SingleFlight::new(),
    }
}

/// Main loop for a single worker thread: one `WorkerState` for the whole
/// thread, shared across every connection on it via `Rc<RefCell<_>>`.
async fn worker_loop(worker_id: usize, shared: Arc<SharedState>, addr: String) {
    use monoio::net::TcpListener;

    let listener = TcpListener::bind(&addr)
        .unwrap_or_else(|e| panic!("worker {} failed to bind to {}: {}", worker_id, addr, e));

    info!(worker = worker_id, addr = %addr, "worker listening");

    let state = Rc::new(RefCell::new(new_worker_state(&shared)));

    loop {
        match listener.accept().await {
            Ok((stream, peer_addr)) => {
                let _ = stream.set_nodelay(true);

                let state = Rc::clone(&state);
                monoio::spawn(async move {
                    if let Err(e) = crate::connection::handle_connection(stream, peer_addr, state).await {
                        tracing::debug!(error = %e, "connection closed");
                    }
                });
            }
            Err(e) => {
                error!(worker = worker_id, error = %e, "accept error");
            }
        }
    }
}
