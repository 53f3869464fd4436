use crate::{CacheError, PhotoHandle};
use api_client::PhotoId;
use std::collections::BTreeMap;

/// Identifies the view a batch of handles was fetched for.
///
/// Taken before a fetch starts; [`HandleRegistry::revoke_all`] invalidates
/// every token issued so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewToken(u64);

/// Owns the handles of the photos currently on display, keyed by id.
///
/// Every handle that enters the registry leaves it through a revocation:
/// on replacement, on [`revoke`](Self::revoke), on
/// [`revoke_all`](Self::revoke_all) or when the registry is dropped.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    handles: BTreeMap<PhotoId, PhotoHandle>,
    generation: u64,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a handle, revoking any handle already registered for the same id.
    pub fn register(&mut self, handle: PhotoHandle) {
        if let Some(previous) = self.handles.remove(&handle.id()) {
            tracing::debug!(id = previous.id(), "replacing registered photo handle");
            release(previous);
        }
        self.handles.insert(handle.id(), handle);
    }

    pub fn get(&self, id: PhotoId) -> Option<&PhotoHandle> {
        self.handles.get(&id)
    }

    pub fn contains(&self, id: PhotoId) -> bool {
        self.handles.contains_key(&id)
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = PhotoId> + '_ {
        self.handles.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PhotoHandle> {
        self.handles.values()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn revoke(&mut self, id: PhotoId) -> bool {
        match self.handles.remove(&id) {
            Some(handle) => {
                release(handle);
                true
            }
            None => false,
        }
    }

    /// Tear down the view: revoke every handle and invalidate outstanding tokens.
    pub fn revoke_all(&mut self) -> usize {
        self.generation += 1;
        let handles = std::mem::take(&mut self.handles);
        let count = handles.len();
        handles.into_values().for_each(release);
        if count > 0 {
            tracing::debug!(count, "revoked photo handles");
        }
        count
    }

    pub fn view_token(&self) -> ViewToken {
        ViewToken(self.generation)
    }

    pub fn is_current(&self, token: ViewToken) -> bool {
        token.0 == self.generation
    }

    /// Register a fetched batch if the view it was fetched for is still open.
    ///
    /// A stale batch is revoked immediately and reported as
    /// [`CacheError::StaleView`].
    pub fn register_batch(
        &mut self,
        token: ViewToken,
        handles: Vec<PhotoHandle>,
    ) -> Result<usize, CacheError> {
        let count = handles.len();
        if !self.is_current(token) {
            handles.into_iter().for_each(release);
            tracing::debug!(count, "discarded photo handles for a closed view");
            return Err(CacheError::StaleView(count));
        }
        for handle in handles {
            self.register(handle);
        }
        Ok(count)
    }
}

impl Drop for HandleRegistry {
    fn drop(&mut self) {
        self.revoke_all();
    }
}

fn release(handle: PhotoHandle) {
    let id = handle.id();
    if let Err(e) = handle.revoke() {
        tracing::error!(id, error = %e, "failed to revoke photo handle");
    }
}
