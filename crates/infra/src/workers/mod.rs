//! Background threads that keep read models current.

pub mod projection_worker;

pub use projection_worker::{ProjectionWorker, WorkerHandle};
