//! Decoder for the server's bracketed id-list encoding.
//!
//! The photo service enumerates ids as the printed form of a collection,
//! e.g. `List(3, 7, 9)`. An empty collection prints as `List()` and some
//! endpoints return a bare `3,7,9` or an empty body. All of these decode to an
//! ordered `Vec<PhotoId>`; anything outside that grammar is rejected.

use crate::PhotoId;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid photo id {token:?} at position {index}")]
    InvalidId { index: usize, token: String },
    #[error("invalid list prefix {0:?}")]
    InvalidWrapper(String),
    #[error("unbalanced parentheses in id list")]
    Unbalanced,
    #[error("unexpected text after id list: {0:?}")]
    TrailingText(String),
}

/// Decode an id list into its ids, left to right.
///
/// Empty tokens are skipped so trailing separators and `List()` are accepted.
/// A token that is not a base-10 integer fails the whole call.
pub fn decode(raw: &str) -> Result<Vec<PhotoId>, DecodeError> {
    let body = strip_wrapper(raw.trim())?;
    let mut ids = Vec::new();
    for (index, token) in body.split(',').map(str::trim).enumerate() {
        if token.is_empty() {
            continue;
        }
        ids.push(parse_id(index, token)?);
    }
    Ok(ids)
}

/// Encode ids the way the link endpoint expects them (`1,2,3`).
pub fn encode(ids: &[PhotoId]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn strip_wrapper(text: &str) -> Result<&str, DecodeError> {
    let Some(open) = text.find('(') else {
        if text.contains(')') {
            return Err(DecodeError::Unbalanced);
        }
        return Ok(text);
    };

    let wrapper = text[..open].trim_end();
    if !wrapper.is_empty() && !is_wrapper_token(wrapper) {
        return Err(DecodeError::InvalidWrapper(wrapper.to_string()));
    }

    let rest = &text[open + 1..];
    let close = rest.rfind(')').ok_or(DecodeError::Unbalanced)?;
    let trailing = rest[close + 1..].trim();
    if !trailing.is_empty() {
        return Err(DecodeError::TrailingText(trailing.to_string()));
    }

    let inner = &rest[..close];
    if inner.contains(['(', ')']) {
        return Err(DecodeError::Unbalanced);
    }
    Ok(inner)
}

fn is_wrapper_token(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn parse_id(index: usize, token: &str) -> Result<PhotoId, DecodeError> {
    let invalid = || DecodeError::InvalidId {
        index,
        token: token.to_string(),
    };
    // `u64::from_str` accepts a leading '+', the wire format does not.
    if !token.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    token.parse::<PhotoId>().map_err(|_| invalid())
}
