use api_client::PhotoId;
use std::collections::{BTreeSet, HashMap};

/// Album name -> ids the server last reported for that album.
///
/// Entries are only ever replaced wholesale from a decoded server response,
/// never merged with local selections.
#[derive(Debug, Default, Clone)]
pub struct AssociationCache {
    albums: HashMap<String, BTreeSet<PhotoId>>,
}

impl AssociationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace<I>(&mut self, album_name: &str, ids: I) -> Option<BTreeSet<PhotoId>>
    where
        I: IntoIterator<Item = PhotoId>,
    {
        self.albums
            .insert(album_name.to_string(), ids.into_iter().collect())
    }

    pub fn get(&self, album_name: &str) -> Option<&BTreeSet<PhotoId>> {
        self.albums.get(album_name)
    }

    pub fn len(&self) -> usize {
        self.albums.len()
    }

    pub fn is_empty(&self) -> bool {
        self.albums.is_empty()
    }
}
