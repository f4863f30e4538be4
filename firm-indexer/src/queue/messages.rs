//! Message types for the task stream.
//!
//! Defines the messages that flow between a task source and the orchestrator.

use crate::queue::task::TaskEnvelope;

/// Position of a delivered task in its source, as (topic, partition, offset).
///
/// The in-memory source reports no offsets.
pub type Offset = (String, i32, i64);

/// Messages that flow through the pipeline.
#[derive(Debug)]
pub enum StreamMessage {
    /// A batch of tasks with associated offsets for acknowledgment.
    Tasks {
        tasks: Vec<TaskEnvelope>,
        offsets: Vec<Offset>,
    },
    /// Acknowledgment that a batch was handled.
    ///
    /// A batch is acknowledged as successful once each task either completed
    /// or was handed back to the queue for a later attempt.
    Acknowledgment {
        offsets: Vec<Offset>,
        success: bool,
        error: Option<String>,
    },
    /// Stream has ended.
    End,
    /// An error occurred.
    Error(String),
}
