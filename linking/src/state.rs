//! Application state shared by the client's views.

use crate::error::LinkError;
use crate::fetcher::PhotoFetcher;
use crate::workflow::LinkingWorkflow;
use api_client::{Album, ApiClient, ApiClientError};
use cache::{HandleRegistry, Spool};
use std::cell::{Ref, RefCell};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryView {
    AllPhotos,
    Album(String),
}

impl fmt::Display for GalleryView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GalleryView::AllPhotos => write!(f, "All Photos"),
            GalleryView::Album(name) => write!(f, "{}", name),
        }
    }
}

#[derive(Debug, Default)]
struct Gallery {
    view: Option<GalleryView>,
    photos: HandleRegistry,
}

/// Single owner of the client's session state: the album list, the photos
/// of the gallery being browsed, and the linking workflow.
pub struct AppState {
    fetcher: PhotoFetcher,
    albums: RefCell<Vec<Album>>,
    gallery: RefCell<Gallery>,
    linking: LinkingWorkflow,
}

impl AppState {
    pub fn new(client: ApiClient, spool: Spool, concurrency: usize) -> Self {
        let fetcher = PhotoFetcher::new(Arc::new(client), spool, concurrency);
        Self {
            linking: LinkingWorkflow::new(fetcher.clone()),
            fetcher,
            albums: RefCell::new(Vec::new()),
            gallery: RefCell::new(Gallery::default()),
        }
    }

    pub fn spool(&self) -> &Spool {
        self.fetcher.spool()
    }

    pub fn linking(&self) -> &LinkingWorkflow {
        &self.linking
    }

    /// Replace the album list with the server's.
    pub async fn load_albums(&self) -> Result<Vec<Album>, ApiClientError> {
        let albums = self.fetcher.client().list_albums().await?;
        tracing::debug!(count = albums.len(), "loaded albums");
        *self.albums.borrow_mut() = albums.clone();
        Ok(albums)
    }

    pub fn albums(&self) -> Vec<Album> {
        self.albums.borrow().clone()
    }

    pub fn find_album(&self, name: &str) -> Option<Album> {
        self.albums.borrow().iter().find(|a| a.name == name).cloned()
    }

    /// Show `view` in the gallery, replacing whatever was shown before.
    ///
    /// The previous view's handles are revoked up front. If another view
    /// replaces this one before its photos arrive, they are discarded and
    /// `Ok(None)` is returned.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn browse(&self, view: GalleryView) -> Result<Option<usize>, LinkError> {
        let token = {
            let mut gallery = self.gallery.borrow_mut();
            gallery.photos.revoke_all();
            gallery.view = Some(view.clone());
            gallery.photos.view_token()
        };

        let fetched = match &view {
            GalleryView::AllPhotos => self.fetcher.fetch_listing().await,
            GalleryView::Album(name) => self.fetcher.fetch_album(name).await,
        };

        let mut gallery = self.gallery.borrow_mut();
        match fetched {
            Ok(handles) => match gallery.photos.register_batch(token, handles) {
                Ok(count) => {
                    tracing::info!(view = %view, photos = count, "gallery loaded");
                    Ok(Some(count))
                }
                Err(_) => Ok(None),
            },
            Err(err) => {
                if gallery.photos.is_current(token) {
                    gallery.view = None;
                }
                tracing::warn!(view = %view, error = %err, "failed to load gallery");
                Err(err.into())
            }
        }
    }

    /// Leave the gallery, revoking its photos.
    pub fn close_gallery(&self) -> usize {
        let mut gallery = self.gallery.borrow_mut();
        gallery.view = None;
        gallery.photos.revoke_all()
    }

    pub fn gallery_view(&self) -> Option<GalleryView> {
        self.gallery.borrow().view.clone()
    }

    /// Handles of the photos on display. Drop the guard before browsing again.
    pub fn gallery(&self) -> Ref<'_, HandleRegistry> {
        Ref::map(self.gallery.borrow(), |g| &g.photos)
    }
}
