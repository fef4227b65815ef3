use core::fmt;

/// Raster construction failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Backing buffer shorter than `width * height` (or `stride * height`).
    SizeMismatch { expected: usize, actual: usize },
    InvalidStride { stride: usize, width: usize },
    /// A sampler needs at least one pixel to fall back on.
    EmptyImage { width: usize, height: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeMismatch { expected, actual } => {
                write!(f, "buffer holds {actual} pixels, raster needs {expected}")
            }
            Self::InvalidStride { stride, width } => {
                write!(f, "stride {stride} is narrower than width {width}")
            }
            Self::EmptyImage { width, height } => {
                write!(f, "cannot sample a {width}x{height} raster")
            }
        }
    }
}

impl std::error::Error for Error {}
