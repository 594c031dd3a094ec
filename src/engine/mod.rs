//! Work distribution engine: workers, the self-sizing pool, and the service
//! lifecycle that drives them.

pub mod pool;
pub mod service;
pub mod worker;

pub use pool::WorkerPool;
pub use service::Service;
pub use worker::{CancelFlag, Cancellation, Worker, WorkerContext};
