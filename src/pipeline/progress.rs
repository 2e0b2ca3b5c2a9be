//! Progress notifications.

use crate::pipeline::{PipelineState, Stage};
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Snapshot of a pipeline handed to progress callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Stage that is about to run
    pub stage: Stage,
    /// State the pipeline is in when the stage starts
    pub state: PipelineState,
    /// Workspace directory
    pub workspace: PathBuf,
    /// Destination package
    pub output: PathBuf,
}

/// Receives one notification per stage, before the stage does its work.
///
/// Callbacks run on the pipeline's thread and must return quickly; use
/// [`ChannelProgress`] to hand events to another task.
pub trait ProgressCallback: Send + Sync {
    /// Template extraction is starting.
    fn on_prepare(&self, _event: &ProgressEvent) {}

    /// Icon and resource table finalization is starting.
    fn on_build(&self, _event: &ProgressEvent) {}

    /// Archiving and signing is starting.
    fn on_sign(&self, _event: &ProgressEvent) {}

    /// Workspace removal is starting.
    fn on_clean(&self, _event: &ProgressEvent) {}
}

/// Forwards notifications over an unbounded channel.
///
/// Sending never blocks; events are dropped once the receiver is gone.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    /// Create a sender and the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: &ProgressEvent) {
        if self.tx.send(event.clone()).is_err() {
            log::trace!("Progress receiver closed, dropping {} event", event.stage);
        }
    }
}

impl ProgressCallback for ChannelProgress {
    fn on_prepare(&self, event: &ProgressEvent) {
        self.send(event);
    }

    fn on_build(&self, event: &ProgressEvent) {
        self.send(event);
    }

    fn on_sign(&self, event: &ProgressEvent) {
        self.send(event);
    }

    fn on_clean(&self, event: &ProgressEvent) {
        self.send(event);
    }
}
