//! Postprod pipeline.
//!
//! A run moves through a fixed series of stages:
//! 1. Fetch (export the source documents)
//! 2. Assets (download and optimize images)
//! 3. Transform (clean the markup into page content)
//! 4. Bind (render content into page templates)
//! 5. Write (check out a working copy and write pages, assets, fixtures)
//! 6. Format (run the repository's formatter)
//! 7. Publish (commit and push the branch)
//!
//! Nothing touches the hunt repository before the write stage, and nothing
//! becomes visible to others before the publish stage. A failing stage stops
//! the run and records which stage failed and why.
//!
//! Custom stages can be inserted before or after any named stage.

mod context;
mod error;
mod run;
mod stages;

pub use context::PipelineContext;
pub use error::{Cause, PipelineError};
pub use run::{PostprodRun, RunStage, RunState};

use stages::{AssetStage, BindStage, FetchStage, FormatStage, PublishStage, TransformStage, WriteStage};

/// A stage in the postprod pipeline.
pub trait Stage: Send + Sync {
    /// Unique name for this stage (used for insertion points).
    fn name(&self) -> &'static str;

    /// The run stage reported while this stage is active.
    fn phase(&self) -> RunStage;

    /// Advance the run through this stage.
    fn process(&self, run: &mut PostprodRun, ctx: &PipelineContext) -> Result<(), PipelineError>;
}

/// The postprod pipeline.
///
/// # Extension Points
///
/// Insert custom stages using `insert_before` or `insert_after`:
///
/// ```ignore
/// pipeline.insert_after("transform", MyLintStage);
/// ```
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    /// Create an empty pipeline with no stages.
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Create the full postprod pipeline.
    ///
    /// Stages: fetch → assets → transform → bind → write → format → publish
    pub fn default_pipeline() -> Self {
        let mut pipeline = Self::new();
        pipeline.add_stage(FetchStage);
        pipeline.add_stage(AssetStage);
        pipeline.add_stage(TransformStage);
        pipeline.add_stage(BindStage);
        pipeline.add_stage(WriteStage);
        pipeline.add_stage(FormatStage);
        pipeline.add_stage(PublishStage);
        pipeline
    }

    /// Pipeline for fixture exports, which have no pages.
    ///
    /// Stages: write → format → publish
    pub fn export_pipeline() -> Self {
        let mut pipeline = Self::new();
        pipeline.add_stage(WriteStage);
        pipeline.add_stage(FormatStage);
        pipeline.add_stage(PublishStage);
        pipeline
    }

    /// Add a stage to the end of the pipeline.
    pub fn add_stage<S: Stage + 'static>(&mut self, stage: S) -> &mut Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Insert a stage before the named stage.
    ///
    /// # Panics
    ///
    /// Panics if no stage with the given name exists.
    pub fn insert_before<S: Stage + 'static>(&mut self, name: &str, stage: S) -> &mut Self {
        let pos = self.position(name);
        self.stages.insert(pos, Box::new(stage));
        self
    }

    /// Insert a stage after the named stage.
    ///
    /// # Panics
    ///
    /// Panics if no stage with the given name exists.
    pub fn insert_after<S: Stage + 'static>(&mut self, name: &str, stage: S) -> &mut Self {
        let pos = self.position(name);
        self.stages.insert(pos + 1, Box::new(stage));
        self
    }

    fn position(&self, name: &str) -> usize {
        self.stages
            .iter()
            .position(|s| s.name() == name)
            .unwrap_or_else(|| panic!("stage '{}' not found in pipeline", name))
    }

    /// Run every stage in order, stopping at the first failure.
    ///
    /// On failure the run's state records the failing stage and cause.
    pub fn run(&self, run: &mut PostprodRun, ctx: &PipelineContext) -> Result<(), PipelineError> {
        for stage in &self.stages {
            let phase = stage.phase();
            if run.state != RunState::Running(phase) {
                tracing::info!(branch = %run.branch, stage = %phase, "entering stage");
                run.state = RunState::Running(phase);
            }

            if let Err(error) = stage.process(run, ctx) {
                let cause = error.cause();
                tracing::error!(branch = %run.branch, stage = %phase, %cause, "{error}");
                run.state = RunState::Failed {
                    stage: phase,
                    cause,
                };
                return Err(error);
            }
        }

        run.state = RunState::Done;
        Ok(())
    }

    /// Get the names of all stages in order.
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::default_pipeline()
    }
}
