//! Linking photos to an album.
//!
//! `Idle -> SelectorOpen -> Submitting -> Reconciling -> Idle`, with cancel
//! from `SelectorOpen` and a return to a stable state on every failure.
//! Operations take `&self` so a host event loop can have several of them
//! pending at once; overlapping requests are rejected by the state machine.
//! Borrows of the session never span an `.await`.

use crate::error::{FetchError, LinkError};
use crate::fetcher::PhotoFetcher;
use crate::selection::SelectionSet;
use api_client::{Album, PhotoId};
use cache::{AssociationCache, HandleRegistry, ViewToken};
use std::cell::{Ref, RefCell};
use std::collections::BTreeSet;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    #[default]
    Idle,
    SelectorOpen,
    Submitting,
    Reconciling,
}

/// Why a submit was a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitRejection {
    NotOpen,
    EmptySelection,
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Linked {
        album: String,
        photo_ids: BTreeSet<PhotoId>,
        confirmation: String,
    },
    Ignored(SubmitRejection),
}

#[derive(Debug, Default)]
struct Session {
    state: LinkState,
    target: Option<Album>,
    candidates: HandleRegistry,
    selection: SelectionSet,
}

impl Session {
    fn close(&mut self) {
        self.candidates.revoke_all();
        self.selection.clear();
        self.target = None;
        self.state = LinkState::Idle;
    }
}

/// Puts the session back into a stable state if an operation's future is
/// dropped at an `.await`.
///
/// An abandoned submit returns to `SelectorOpen` (the link may not have been
/// accepted) or, once reconciling, closes the selector. An abandoned open
/// closes the selector unless another open has replaced it since.
struct Unwind<'a> {
    session: &'a RefCell<Session>,
    view: Option<ViewToken>,
    armed: bool,
}

impl<'a> Unwind<'a> {
    fn submit(session: &'a RefCell<Session>) -> Self {
        Self {
            session,
            view: None,
            armed: true,
        }
    }

    fn open(session: &'a RefCell<Session>, view: ViewToken) -> Self {
        Self {
            session,
            view: Some(view),
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for Unwind<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(mut session) = self.session.try_borrow_mut() else {
            return;
        };
        match (session.state, self.view) {
            (LinkState::Submitting, None) => {
                tracing::warn!("link request abandoned, selector reopened");
                session.state = LinkState::SelectorOpen;
            }
            (LinkState::Reconciling, None) => {
                tracing::warn!("album refresh abandoned, selector closed");
                session.close();
            }
            (LinkState::SelectorOpen, Some(view)) if session.candidates.is_current(view) => {
                tracing::debug!("candidate load abandoned, selector closed");
                session.close();
            }
            _ => {}
        }
    }
}

pub struct LinkingWorkflow {
    fetcher: PhotoFetcher,
    session: RefCell<Session>,
    associations: RefCell<AssociationCache>,
}

impl LinkingWorkflow {
    pub fn new(fetcher: PhotoFetcher) -> Self {
        Self {
            fetcher,
            session: RefCell::new(Session::default()),
            associations: RefCell::new(AssociationCache::new()),
        }
    }

    pub fn state(&self) -> LinkState {
        self.session.borrow().state
    }

    pub fn target_album(&self) -> Option<Album> {
        self.session.borrow().target.clone()
    }

    pub fn selection(&self) -> Vec<PhotoId> {
        self.session.borrow().selection.ids()
    }

    pub fn candidate_ids(&self) -> Vec<PhotoId> {
        self.session.borrow().candidates.ids().collect()
    }

    /// Candidate handles for rendering. Drop the guard before calling any
    /// other workflow operation.
    pub fn candidates(&self) -> Ref<'_, HandleRegistry> {
        Ref::map(self.session.borrow(), |s| &s.candidates)
    }

    pub fn cached_association(&self, album_name: &str) -> Option<BTreeSet<PhotoId>> {
        self.associations.borrow().get(album_name).cloned()
    }

    /// Open the photo selector for `album` and load every candidate photo.
    ///
    /// Returns `Ok(false)` if a submission is in progress, or if the selector
    /// was closed or reopened before the candidates arrived. Dropping the
    /// future before it completes leaves the workflow `Idle`.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn open(&self, album: Album) -> Result<bool, LinkError> {
        let token = {
            let mut session = self.session.borrow_mut();
            match session.state {
                LinkState::Submitting | LinkState::Reconciling => {
                    tracing::debug!(album = %album.name, "selector busy, ignoring open");
                    return Ok(false);
                }
                LinkState::SelectorOpen => session.close(),
                LinkState::Idle => {}
            }
            session.state = LinkState::SelectorOpen;
            session.target = Some(album.clone());
            session.candidates.view_token()
        };

        let unwind = Unwind::open(&self.session, token);
        let fetched = self.fetcher.fetch_listing().await;
        unwind.disarm();

        let mut session = self.session.borrow_mut();
        match fetched {
            Ok(handles) => match session.candidates.register_batch(token, handles) {
                Ok(count) => {
                    tracing::info!(album = %album.name, candidates = count, "photo selector opened");
                    Ok(true)
                }
                Err(_) => {
                    tracing::debug!(album = %album.name, "selector closed while loading candidates");
                    Ok(false)
                }
            },
            Err(err) => {
                if session.candidates.is_current(token) {
                    session.close();
                }
                tracing::warn!(album = %album.name, error = %err, "failed to load candidate photos");
                Err(err.into())
            }
        }
    }

    /// Flip selection of a candidate. Returns whether it is selected afterwards.
    pub fn toggle(&self, id: PhotoId) -> bool {
        let mut session = self.session.borrow_mut();
        if session.state != LinkState::SelectorOpen || !session.candidates.contains(id) {
            tracing::debug!(id, "ignoring selection of unavailable photo");
            return session.selection.contains(id);
        }
        session.selection.toggle(id)
    }

    /// Returns `true` if membership changed.
    pub fn set_selected(&self, id: PhotoId, selected: bool) -> bool {
        let mut session = self.session.borrow_mut();
        if session.state != LinkState::SelectorOpen || !session.candidates.contains(id) {
            return false;
        }
        session.selection.set(id, selected)
    }

    /// Close the selector without submitting.
    pub fn cancel(&self) -> bool {
        let mut session = self.session.borrow_mut();
        if session.state != LinkState::SelectorOpen {
            return false;
        }
        session.close();
        tracing::debug!("photo selector cancelled");
        true
    }

    /// Link the selected photos to the target album, then replace the cached
    /// association with the server's list.
    ///
    /// If the link request fails the selector stays open with the selection
    /// intact. Once the server has accepted the link the selector is closed
    /// whether or not the refresh succeeds; a failed refresh is reported as
    /// [`LinkError::Reconciliation`] and leaves the cached association as it was.
    ///
    /// Dropping the future while the link request is pending reopens the
    /// selector; dropping it during the refresh closes it.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn submit(&self) -> Result<SubmitOutcome, LinkError> {
        let (album, photo_ids) = {
            let mut session = self.session.borrow_mut();
            let rejection = match session.state {
                LinkState::Idle => Some(SubmitRejection::NotOpen),
                LinkState::Submitting | LinkState::Reconciling => Some(SubmitRejection::InFlight),
                LinkState::SelectorOpen if session.selection.is_empty() => {
                    Some(SubmitRejection::EmptySelection)
                }
                LinkState::SelectorOpen => None,
            };
            let album = match (rejection, session.target.clone()) {
                (None, Some(album)) => album,
                (rejection, _) => {
                    let rejection = rejection.unwrap_or(SubmitRejection::NotOpen);
                    tracing::debug!(?rejection, "submit ignored");
                    return Ok(SubmitOutcome::Ignored(rejection));
                }
            };
            session.state = LinkState::Submitting;
            (album, session.selection.ids())
        };

        let unwind = Unwind::submit(&self.session);
        tracing::info!(album = %album.name, count = photo_ids.len(), "linking photos");
        let confirmation = match self.fetcher.client().link_photos(album.id, &photo_ids).await {
            Ok(text) => text,
            Err(source) => {
                unwind.disarm();
                self.session.borrow_mut().state = LinkState::SelectorOpen;
                tracing::warn!(album = %album.name, error = %source, "linking photos failed");
                return Err(LinkError::Association {
                    album: album.name,
                    source,
                });
            }
        };

        self.session.borrow_mut().state = LinkState::Reconciling;
        let refreshed = self.fetcher.client().list_album_photo_ids(&album.name).await;
        unwind.disarm();
        self.session.borrow_mut().close();

        match refreshed {
            Ok(ids) => {
                let photo_ids: BTreeSet<PhotoId> = ids.into_iter().collect();
                self.associations
                    .borrow_mut()
                    .replace(&album.name, photo_ids.iter().copied());
                tracing::info!(album = %album.name, photos = photo_ids.len(), "album association refreshed");
                Ok(SubmitOutcome::Linked {
                    album: album.name,
                    photo_ids,
                    confirmation,
                })
            }
            Err(source) => {
                tracing::warn!(album = %album.name, error = %source, "photos linked but refresh failed");
                Err(LinkError::Reconciliation {
                    album: album.name,
                    linked: photo_ids,
                    source,
                })
            }
        }
    }

    /// Re-read an album's association from the server into the cache.
    pub async fn refresh_association(&self, album_name: &str) -> Result<BTreeSet<PhotoId>, LinkError> {
        let ids = self
            .fetcher
            .client()
            .list_album_photo_ids(album_name)
            .await
            .map_err(FetchError::listing)?;
        let ids: BTreeSet<PhotoId> = ids.into_iter().collect();
        self.associations
            .borrow_mut()
            .replace(album_name, ids.iter().copied());
        Ok(ids)
    }
}
