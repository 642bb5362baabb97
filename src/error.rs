//! Error types for the catalog cache core
//!
//! A single taxonomy shared by the cache tiers, the stampede guard, and the
//! catalog service. Errors split into two classes: those surfaced to the
//! caller (the store is authoritative and failed, or the request was bad)
//! and those degraded into cache-miss behavior with a log line and a metric.

use thiserror::Error;

/// Unified error type for the catalog cache
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Surfaced Errors
    // =========================================================================
    #[error("Product not found: {id}")]
    NotFound { id: i64 },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // =========================================================================
    // Degradable Errors
    // =========================================================================
    #[error("Shared cache tier unavailable: {0}")]
    CacheTierUnavailable(String),

    #[error("Lock wait timed out for key: {key}")]
    LockTimeout { key: String },

    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check whether this error degrades into miss/no-op behavior rather
    /// than surfacing to the caller.
    ///
    /// The read path treats a degradable error on a cache tier as a MISS;
    /// the write path treats it as a skipped best-effort write.
    pub fn is_degradable(&self) -> bool {
        matches!(
            self,
            Error::CacheTierUnavailable(_) | Error::LockTimeout { .. } | Error::Codec(_)
        )
    }

    /// Check whether this error must surface to the caller unchanged.
    pub fn surfaces(&self) -> bool {
        matches!(
            self,
            Error::NotFound { .. } | Error::StoreUnavailable(_) | Error::InvalidInput(_)
        )
    }
}

/// Result type alias for the catalog cache
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(Error::NotFound { id: 7 }.surfaces());
        assert!(Error::StoreUnavailable("down".into()).surfaces());
        assert!(Error::InvalidInput("bad price".into()).surfaces());

        assert!(Error::CacheTierUnavailable("redis gone".into()).is_degradable());
        assert!(Error::LockTimeout { key: "lock:productById::1".into() }.is_degradable());

        let codec_err: Error = serde_json::from_str::<i64>("not json").unwrap_err().into();
        assert!(codec_err.is_degradable());
        assert!(!codec_err.surfaces());
    }

    #[test]
    fn test_degradable_and_surfaced_are_disjoint() {
        let errors = [
            Error::NotFound { id: 1 },
            Error::StoreUnavailable("x".into()),
            Error::InvalidInput("x".into()),
            Error::CacheTierUnavailable("x".into()),
            Error::LockTimeout { key: "x".into() },
            Error::Configuration("x".into()),
            Error::Internal("x".into()),
        ];
        for err in errors {
            assert!(!(err.is_degradable() && err.surfaces()), "{err} in both classes");
        }
    }
}
