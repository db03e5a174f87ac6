pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod processor;
pub mod source;
pub mod storage;

pub use error::{PipelineError, Result};
