// Allow dead code for public API functions that may not be used internally
// but are part of the library's exposed interface
#![allow(dead_code)]

pub mod cli;
pub mod config;
pub mod fetch;
pub mod retry;
pub mod payload;
pub mod mapper;
pub mod extractor;
pub mod classifier;
pub mod profile;
pub mod partial;
pub mod degrade;
pub mod record;
pub mod validate;
pub mod pipeline;
pub mod roster;
pub mod stats;
pub mod logger;
pub mod export;

pub use pipeline::{BatchPipeline, PipelineOptions, PipelineOutcome};
pub use record::{EntityId, EntityKind, FailedEntity, Record};
