//! Stage graph and runner.
//!
//! A run is a fixed graph of named stages. The runner executes it level by
//! level, handing typed artifacts from producers to consumers, and returns a
//! [`RunSummary`] with one report per stage.

pub mod graph;
pub mod runner;
pub mod stage;
pub mod stages;
pub mod summary;

pub use graph::{PipelineGraph, PipelineGraphBuilder, StageNode};
pub use runner::{PipelineRunner, report_graph, standard_graph};
pub use stage::{Artifact, Artifacts, Stage, StageContext, StageOutput};
pub use summary::{RunFailure, RunStatus, RunSummary, StageReport, StageStatus};
