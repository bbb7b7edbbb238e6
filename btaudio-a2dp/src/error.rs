//! Error types for the A2DP SBC streaming session.

use thiserror::Error;

/// Result type for session operations.
pub type Result<T> = std::result::Result<T, A2dpError>;

/// Errors surfaced at the session API boundary.
///
/// Runtime conditions on the streaming hot path (short reads, congestion,
/// unreachable bit-pool targets) are deliberately *not* errors: each has a
/// local recovery policy and keeps the session running.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum A2dpError {
    /// Peer MTU leaves no room for a media payload.
    #[error("Peer MTU {mtu} cannot hold any media payload")]
    MtuTooSmall {
        /// The offending MTU value.
        mtu: u16,
    },

    /// PCM feeding sample rate is outside the supported set.
    #[error("Unsupported PCM feeding rate: {rate} Hz")]
    UnsupportedFeedingRate {
        /// The offending rate.
        rate: u32,
    },

    /// PCM feeding sample width is outside the supported set.
    #[error("Unsupported PCM bit depth: {bits} (only 16-bit is supported)")]
    UnsupportedBitDepth {
        /// The offending bit depth.
        bits: u8,
    },

    /// PCM feeding channel count is invalid.
    #[error("Invalid PCM channel count: {count} (must be 1 or 2)")]
    InvalidChannelCount {
        /// The offending channel count.
        count: u8,
    },

    /// Upsampler rejected the feeding configuration.
    #[error("Resample error: {0}")]
    Resample(#[from] btaudio_resample::ResampleError),
}

impl From<A2dpError> for btaudio_core::Error {
    fn from(err: A2dpError) -> Self {
        btaudio_core::Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = A2dpError::MtuTooSmall { mtu: 1 };
        assert!(err.to_string().contains("MTU 1"));

        let err = A2dpError::UnsupportedFeedingRate { rate: 96000 };
        assert!(err.to_string().contains("96000"));
    }

    #[test]
    fn test_core_conversion() {
        let err = A2dpError::InvalidChannelCount { count: 0 };
        let core: btaudio_core::Error = err.into();
        assert!(matches!(core, btaudio_core::Error::Config(_)));
    }
}
