use cc_snake::SnakeError;
use thiserror::Error;

use crate::{FilterError, HandlerId};

/// Failures that abort a frame. Nothing from the failing frame is stored.
#[derive(Debug, Error)]
pub enum SegmentationError {
    #[error("frame {frame}: node count exceeded the limit while reusing the previous contour")]
    ConvergenceFailure { frame: usize },
    #[error("frame {frame}: every snake is dead")]
    AllSnakesDead { frame: usize },
    #[error("frame {frame}: segmentation cancelled")]
    Cancelled { frame: usize },
    #[error("frame {frame}: filter `{filter}` failed for handler {handler}")]
    FilterFailed {
        frame: usize,
        handler: HandlerId,
        filter: String,
        #[source]
        source: FilterError,
    },
    #[error("invalid parameters: {0}")]
    InvalidParams(#[from] SnakeError),
}

impl SegmentationError {
    pub fn frame(&self) -> Option<usize> {
        match self {
            Self::ConvergenceFailure { frame }
            | Self::AllSnakesDead { frame }
            | Self::Cancelled { frame }
            | Self::FilterFailed { frame, .. } => Some(*frame),
            Self::InvalidParams(_) => None,
        }
    }
}
