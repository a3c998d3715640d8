//! Batch tailoring: ingest, the worker-pool runner, and the per-item pipeline.

pub mod handlers;
pub mod ingest;
pub mod outreach;
pub mod processor;
pub mod retry;
pub mod runner;

pub use processor::BatchItemProcessor;
pub use runner::{ItemProcessor, RunOptions};
