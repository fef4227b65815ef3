use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RingError {
    #[error("ring would drop below 3 nodes (currently {count})")]
    TooFewNodes { count: usize },
    #[error("vertex key does not belong to this ring")]
    StaleKey,
}
