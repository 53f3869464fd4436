//! Photo retrieval and album linking for the Arda client.
//!
//! [`PhotoFetcher`] turns id lists into local photo handles,
//! [`LinkingWorkflow`] drives the select-and-link flow for one album, and
//! [`AppState`] owns both for the lifetime of a client session.

mod error;
mod fetcher;
mod selection;
mod state;
mod workflow;

pub use error::{FetchError, LinkError};
pub use fetcher::{PhotoFetcher, DEFAULT_CONCURRENCY};
pub use selection::SelectionSet;
pub use state::{AppState, GalleryView};
pub use workflow::{LinkState, LinkingWorkflow, SubmitOutcome, SubmitRejection};
