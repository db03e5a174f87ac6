use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::pipeline::graph::PipelineGraph;
use crate::pipeline::stage::{Artifacts, StageContext};
use crate::pipeline::stages::*;
use crate::pipeline::summary::{RunFailure, RunStatus, RunSummary, StageReport};
use crate::source::{MemorySource, SourceReader};
use crate::storage::TableStore;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

/// The full extract, transform, load, report graph.
pub fn standard_graph() -> Result<PipelineGraph> {
    PipelineGraph::builder()
        .stage(PrepareTables, &[])
        .stage(ExtractProducts, &[PREPARE_TABLES])
        .stage(ExtractSales, &[PREPARE_TABLES])
        .stage(Transform, &[EXTRACT_PRODUCTS, EXTRACT_SALES])
        .stage(Load, &[TRANSFORM])
        .stage(GenerateReport, &[LOAD])
        .stage(DetectLowPerformance, &[LOAD])
        .build()
}

/// Report and anomaly stages only, over an already populated store.
pub fn report_graph() -> Result<PipelineGraph> {
    PipelineGraph::builder()
        .stage(GenerateReport, &[])
        .stage(DetectLowPerformance, &[])
        .build()
}

pub struct PipelineRunner {
    graph: PipelineGraph,
    config: PipelineConfig,
    source: Arc<dyn SourceReader>,
    store: Arc<dyn TableStore>,
}

impl PipelineRunner {
    pub fn new(
        config: PipelineConfig,
        source: Arc<dyn SourceReader>,
        store: Arc<dyn TableStore>,
    ) -> Result<Self> {
        Ok(Self::with_graph(standard_graph()?, config, source, store))
    }

    pub fn report_only(config: PipelineConfig, store: Arc<dyn TableStore>) -> Result<Self> {
        Ok(Self::with_graph(
            report_graph()?,
            config,
            Arc::new(MemorySource::new()),
            store,
        ))
    }

    pub fn with_graph(
        graph: PipelineGraph,
        config: PipelineConfig,
        source: Arc<dyn SourceReader>,
        store: Arc<dyn TableStore>,
    ) -> Self {
        Self {
            graph,
            config,
            source,
            store,
        }
    }

    /// Runs every level in order and the stages of a level concurrently.
    ///
    /// A failing required stage stops the run once its level has finished;
    /// later stages are reported as skipped.
    pub async fn run(&self) -> std::result::Result<RunSummary, RunFailure> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        info!("🚀 Starting pipeline run {} ({} stages)", run_id, self.graph.len());

        let mut artifacts = Artifacts::default();
        let mut reports: Vec<StageReport> = Vec::new();
        let mut failure: Option<(String, PipelineError)> = None;
        let mut advisory_failed = false;

        for level in self.graph.levels() {
            if failure.is_some() {
                reports.extend(
                    level
                        .iter()
                        .map(|node| StageReport::skipped(node.name(), node.stage.advisory())),
                );
                continue;
            }

            let ctx = StageContext {
                run_started: started_at,
                config: &self.config,
                source: self.source.as_ref(),
                store: self.store.as_ref(),
                artifacts: &artifacts,
            };
            let ctx = &ctx;
            let results = join_all(level.iter().map(|node| async move {
                info!("▶ Stage {}", node.name());
                let started = Instant::now();
                let result = node.stage.run(ctx).await;
                (*node, result, started.elapsed().as_millis() as u64)
            }))
            .await;

            for (node, result, duration_ms) in results {
                let name = node.name();
                let advisory = node.stage.advisory();
                match result {
                    Ok(output) => {
                        info!("✅ Stage {} finished in {} ms", name, duration_ms);
                        reports.push(StageReport::succeeded(
                            name,
                            advisory,
                            duration_ms,
                            output.metrics,
                            output.warnings,
                        ));
                        if let Some(artifact) = output.artifact {
                            artifacts.absorb(artifact);
                        }
                    }
                    Err(e) if advisory => {
                        warn!("⚠️ Advisory stage {} failed: {}", name, e);
                        reports.push(StageReport::failed(name, advisory, duration_ms, &e));
                        advisory_failed = true;
                    }
                    Err(e) => {
                        error!("❌ Stage {} failed: {}", name, e);
                        reports.push(StageReport::failed(name, advisory, duration_ms, &e));
                        if failure.is_none() {
                            failure = Some((name.to_string(), e));
                        }
                    }
                }
            }
        }

        let status = match (&failure, advisory_failed) {
            (Some(_), _) => RunStatus::Failed,
            (None, true) => RunStatus::SucceededWithErrors,
            (None, false) => RunStatus::Succeeded,
        };
        let warnings = reports
            .iter()
            .flat_map(|r| r.warnings.iter().cloned())
            .collect();
        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            status,
            stages: reports,
            warnings,
            report: artifacts.take_report(),
            low_performance: artifacts.take_low_performance(),
        };

        match failure {
            Some((stage, source)) => Err(RunFailure {
                stage,
                source,
                summary: Box::new(summary),
            }),
            None => {
                info!(
                    "🏁 Run {} finished with {} data quality warnings",
                    run_id,
                    summary.warnings.len()
                );
                Ok(summary)
            }
        }
    }
}
