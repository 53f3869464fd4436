use api_client::{ApiClientError, DecodeError, PhotoId};
use cache::CacheError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to list photos: {0}")]
    Listing(ApiClientError),
    #[error("Malformed photo list: {0}")]
    Decode(DecodeError),
    #[error("Failed to load photo {id}: {source}")]
    Photo {
        id: PhotoId,
        #[source]
        source: ApiClientError,
    },
    #[error("Failed to store photo {id}: {source}")]
    Materialize {
        id: PhotoId,
        #[source]
        source: CacheError,
    },
    #[error("Fetch queue closed")]
    QueueClosed,
}

impl FetchError {
    /// Errors from an id-list request, keeping decode failures distinct.
    pub(crate) fn listing(err: ApiClientError) -> Self {
        match err {
            ApiClientError::Decode(e) => FetchError::Decode(e),
            other => FetchError::Listing(other),
        }
    }
}

/// Failures surfaced by the linking workflow and the gallery.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("The server sent a malformed photo list: {0}")]
    Decode(DecodeError),
    #[error("Could not load photos: {0}")]
    Fetch(FetchError),
    #[error("Failed to link photos to album {album}: {source}")]
    Association {
        album: String,
        #[source]
        source: ApiClientError,
    },
    #[error("Photos were linked to album {album}, but refreshing its photo list failed ({source}); the displayed photos may be out of date")]
    Reconciliation {
        album: String,
        linked: Vec<PhotoId>,
        #[source]
        source: ApiClientError,
    },
}

impl LinkError {
    pub fn code(&self) -> &'static str {
        match self {
            LinkError::Decode(_) => "decode",
            LinkError::Fetch(_) => "fetch",
            LinkError::Association { .. } => "association",
            LinkError::Reconciliation { .. } => "reconciliation",
        }
    }

    /// The server holds the association even though this error was returned.
    pub fn is_durable(&self) -> bool {
        matches!(self, LinkError::Reconciliation { .. })
    }
}

impl From<FetchError> for LinkError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::Decode(e) => LinkError::Decode(e),
            other => LinkError::Fetch(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_failures_keep_their_kind() {
        let decode = DecodeError::Unbalanced;
        let err: LinkError = FetchError::listing(ApiClientError::Decode(decode.clone())).into();
        assert!(matches!(err, LinkError::Decode(ref e) if *e == decode));
        assert_eq!(err.code(), "decode");

        let err: LinkError = FetchError::listing(ApiClientError::Timeout).into();
        assert_eq!(err.code(), "fetch");
        assert!(!err.is_durable());
    }

    #[test]
    fn reconciliation_message_mentions_success() {
        let err = LinkError::Reconciliation {
            album: "Vacation".into(),
            linked: vec![2, 3],
            source: ApiClientError::Timeout,
        };
        assert!(err.is_durable());
        let msg = err.to_string();
        assert!(msg.contains("were linked to album Vacation"));
        assert!(msg.contains("out of date"));
    }
}
