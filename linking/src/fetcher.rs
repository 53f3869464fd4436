//! Concurrent photo retrieval into local handles.

use crate::error::FetchError;
use api_client::{ApiClient, PhotoId};
use cache::{PhotoHandle, Spool};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;

pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Clone)]
pub struct PhotoFetcher {
    client: Arc<ApiClient>,
    spool: Spool,
    semaphore: Arc<Semaphore>,
}

impl PhotoFetcher {
    pub fn new(client: Arc<ApiClient>, spool: Spool, concurrency: usize) -> Self {
        Self {
            client,
            spool,
            semaphore: Arc::new(Semaphore::new(concurrency.max(1))),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn spool(&self) -> &Spool {
        &self.spool
    }

    /// Fetch every photo in `ids` into a fresh handle.
    ///
    /// Duplicate ids are fetched once. All requests settle before the results
    /// are inspected; if any of them failed, every handle from the batch is
    /// revoked and the first failure is returned. The returned handles are in
    /// no particular order.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn fetch_all(&self, ids: &[PhotoId]) -> Result<Vec<PhotoHandle>, FetchError> {
        let start = Instant::now();
        let mut seen = HashSet::with_capacity(ids.len());
        let unique: Vec<PhotoId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();

        let results = futures::future::join_all(unique.iter().map(|&id| self.fetch_one(id))).await;

        let mut handles = Vec::with_capacity(results.len());
        let mut first_error = None;
        for result in results {
            match result {
                Ok(handle) => handles.push(handle),
                Err(e) => {
                    tracing::warn!(error = %e, "photo fetch failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        if let Some(err) = first_error {
            let discarded = handles.len();
            for handle in handles {
                let id = handle.id();
                if let Err(e) = handle.revoke() {
                    tracing::error!(id, error = %e, "failed to revoke photo handle");
                }
            }
            tracing::warn!(requested = unique.len(), discarded, "photo batch aborted");
            return Err(err);
        }

        tracing::info!(
            "fetch_time_ms" = %start.elapsed().as_millis(),
            "count" = handles.len(),
            "fetched photo batch"
        );
        Ok(handles)
    }

    async fn fetch_one(&self, id: PhotoId) -> Result<PhotoHandle, FetchError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| FetchError::QueueClosed)?;
        let photo = self
            .client
            .fetch_photo(id)
            .await
            .map_err(|source| FetchError::Photo { id, source })?;
        self.spool
            .materialize(id, &photo.data, photo.mime_type)
            .await
            .map_err(|source| FetchError::Materialize { id, source })
    }

    /// Every photo visible to the caller (`GET /photos`, then each payload).
    pub async fn fetch_listing(&self) -> Result<Vec<PhotoHandle>, FetchError> {
        let ids = self
            .client
            .list_photo_ids()
            .await
            .map_err(FetchError::listing)?;
        self.fetch_all(&ids).await
    }

    /// The photos currently associated with `album_name`.
    pub async fn fetch_album(&self, album_name: &str) -> Result<Vec<PhotoHandle>, FetchError> {
        let ids = self
            .client
            .list_album_photo_ids(album_name)
            .await
            .map_err(FetchError::listing)?;
        self.fetch_all(&ids).await
    }
}
