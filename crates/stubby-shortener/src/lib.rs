//! Shortening workflows and the background deletion pipeline.

pub mod deletion;
pub mod service;

pub use deletion::{DeletionHandle, DeletionQueue, DeletionSettings, DeletionTask, DeletionWorker};
pub use service::ShortenerService;
