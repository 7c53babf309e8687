pub mod coalesce;
pub mod connection;
pub mod headers;
pub mod orchestrator;
pub mod translation_io;
pub mod upstream;
pub mod worker;

pub use orchestrator::{handle_request, WorkerState};
pub use worker::{spawn_workers, SharedState};
