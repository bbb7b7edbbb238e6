//! Error types for PCM upsampling.

use thiserror::Error;

/// Result type for upsampling operations.
pub type Result<T> = std::result::Result<T, ResampleError>;

/// Errors that can occur while configuring or running the upsampler.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResampleError {
    /// Invalid sample rate specified.
    #[error("Invalid sample rate: {rate} Hz (must be > 0)")]
    InvalidSampleRate {
        /// The offending rate.
        rate: u32,
    },

    /// Invalid channel count.
    #[error("Invalid channel count: {count} (must be 1 or 2)")]
    InvalidChannelCount {
        /// The offending channel count.
        count: u8,
    },

    /// Unsupported sample width.
    #[error("Unsupported bit depth: {bits} (only 16-bit PCM is supported)")]
    UnsupportedBitDepth {
        /// The offending bit depth.
        bits: u8,
    },

    /// Input buffer is not a whole number of source frames.
    #[error("Input size {actual} is not aligned to the {frame} byte source frame")]
    InputNotFrameAligned {
        /// Actual input length in bytes.
        actual: usize,
        /// Source frame size in bytes.
        frame: usize,
    },
}

impl From<ResampleError> for btaudio_core::Error {
    fn from(err: ResampleError) -> Self {
        btaudio_core::Error::Resample(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ResampleError::InvalidSampleRate { rate: 0 };
        assert!(err.to_string().contains("Invalid sample rate"));

        let err = ResampleError::UnsupportedBitDepth { bits: 8 };
        assert!(err.to_string().contains("16-bit"));
    }

    #[test]
    fn test_core_conversion() {
        let err = ResampleError::InvalidChannelCount { count: 3 };
        let core: btaudio_core::Error = err.into();
        assert!(matches!(core, btaudio_core::Error::Resample(_)));
    }
}
