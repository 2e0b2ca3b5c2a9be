//! Build pipeline orchestration.
//!
//! ```text
//! New ──prepare──▶ Prepared ──with_config──▶ Configured ──build──▶ Built ──sign──▶ Signed ──clean_workspace──▶ BuildOutcome
//! ```
//!
//! Every transition consumes the pipeline, so stages cannot be skipped or
//! reordered. Errors carry the [`Stage`] that produced them.

mod builder;
mod progress;

pub use builder::{
    BuildOutcome, BuildPipeline, Built, Configured, New, PipelineStage, Prepared, Signed,
};
pub use progress::{ChannelProgress, ProgressCallback, ProgressEvent};

use std::fmt;

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Template extraction
    Prepare,
    /// Descriptor update, script staging and manifest patch
    Configure,
    /// Icon and resource table finalization
    Build,
    /// Archiving and signing
    Sign,
    /// Workspace removal
    Clean,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Prepare => write!(f, "prepare"),
            Stage::Configure => write!(f, "configure"),
            Stage::Build => write!(f, "build"),
            Stage::Sign => write!(f, "sign"),
            Stage::Clean => write!(f, "clean"),
        }
    }
}

/// Where a pipeline is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineState {
    /// Nothing done yet
    New,
    /// Template extracted
    Prepared,
    /// Scripts staged and manifest patched
    Configured,
    /// Resources finalized
    Built,
    /// Package written and signed
    Signed,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::New => write!(f, "New"),
            PipelineState::Prepared => write!(f, "Prepared"),
            PipelineState::Configured => write!(f, "Configured"),
            PipelineState::Built => write!(f, "Built"),
            PipelineState::Signed => write!(f, "Signed"),
        }
    }
}
