use cc_ring::RingError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnakeError {
    #[error("snake would drop below 3 nodes (currently {count})")]
    TooFewNodes { count: usize },
    #[error("node position became non-finite")]
    NonFinite,
    #[error("invalid segmentation parameters: {0}")]
    InvalidParams(String),
    #[error("seed does not describe a usable contour")]
    EmptySeed,
    #[error("ring edit failed: {0}")]
    Ring(RingError),
}

impl From<RingError> for SnakeError {
    fn from(e: RingError) -> Self {
        match e {
            RingError::TooFewNodes { count } => Self::TooFewNodes { count },
            other => Self::Ring(other),
        }
    }
}
