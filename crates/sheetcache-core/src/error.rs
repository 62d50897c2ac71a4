use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize cache entry: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid store name: {0}")]
    InvalidName(String),

    #[error("Store does not exist: {0}")]
    MissingStore(String),
}

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network unreachable: {0}")]
    Unreachable(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("Core asset {url} could not be cached: {reason}")]
    AssetUnavailable { url: String, reason: String },

    #[error("Invalid core asset path {path}: {reason}")]
    InvalidAsset { path: String, reason: String },

    #[error("Failed to write core assets: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum ActivationError {
    #[error("Cannot activate while {0}; a completed install is required")]
    NotInstalled(&'static str),

    #[error("Failed to purge stale stores: {0}")]
    Store(#[from] StoreError),
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error("Offline and no fallback page is cached for {url}")]
    OfflineFallbackMissing { url: String },
}

#[derive(Error, Debug)]
pub enum CoordinatorError {
    #[error("Registration platform error: {0}")]
    Platform(String),
}

/// Maximum length for reasons carried in error messages
const MAX_REASON_LENGTH: usize = 200;

impl InstallError {
    pub fn asset_unavailable(url: &str, reason: impl ToString) -> Self {
        let mut reason = reason.to_string();
        if reason.len() > MAX_REASON_LENGTH {
            let mut cut = MAX_REASON_LENGTH;
            while !reason.is_char_boundary(cut) {
                cut -= 1;
            }
            reason.truncate(cut);
            reason.push_str("...");
        }
        InstallError::AssetUnavailable {
            url: url.to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_unavailable_truncates_long_reason() {
        let err = InstallError::asset_unavailable("https://a.test/x", "e".repeat(500));
        match err {
            InstallError::AssetUnavailable { reason, .. } => {
                assert_eq!(reason.len(), MAX_REASON_LENGTH + 3);
                assert!(reason.ends_with("..."));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fetch_error_is_transparent_over_network() {
        let err: FetchError = NetworkError::Unreachable("offline".into()).into();
        assert_eq!(err.to_string(), "Network unreachable: offline");
    }
}
