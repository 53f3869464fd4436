//! API client module for the Arda photo-storage service.

pub mod id_list;

pub use id_list::DecodeError;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type PhotoId = u64;
pub type AlbumId = u64;
pub type UserId = u64;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Album {
    pub id: AlbumId,
    pub name: String,
    pub owner_id: UserId,
}

/// Binary payload of a single photo as returned by `GET /photos/{id}`.
#[derive(Debug, Clone)]
pub struct Photo {
    pub id: PhotoId,
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ApiClientError {
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out")]
    Timeout,
    #[error("not found")]
    NotFound,
    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("malformed id list: {0}")]
    Decode(#[from] DecodeError),
}

impl ApiClientError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiClientError::Timeout
        } else {
            ApiClientError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    access_token: String,
    base_url: String,
}

impl ApiClient {
    /// Create a new client with a custom API base URL.
    pub fn with_base_url(access_token: String, base_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), access_token, base_url)
    }

    /// Use a preconfigured `reqwest::Client`, e.g. one with a request timeout.
    pub fn with_client(client: reqwest::Client, access_token: String, base_url: String) -> Self {
        ApiClient {
            client,
            access_token,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ApiClientError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ApiClientError::InvalidBaseUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiClientError::InvalidBaseUrl(format!("{} cannot carry a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(&self, url: Url) -> Result<Response, ApiClientError> {
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token))
            .send()
            .await
            .map_err(ApiClientError::from_reqwest)?;
        check_status(response).await
    }

    async fn get_text(&self, url: Url) -> Result<String, ApiClientError> {
        self.get(url)
            .await?
            .text()
            .await
            .map_err(ApiClientError::from_reqwest)
    }

    /// `GET /photos`: every photo id visible to the caller.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn list_photo_ids(&self) -> Result<Vec<PhotoId>, ApiClientError> {
        let body = self.get_text(self.url(&["photos"])?).await?;
        let ids = id_list::decode(&body)?;
        tracing::debug!(count = ids.len(), "listed photo ids");
        Ok(ids)
    }

    /// `GET /photos/{id}`: the binary image payload.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn fetch_photo(&self, id: PhotoId) -> Result<Photo, ApiClientError> {
        let response = self.get(self.url(&["photos", &id.to_string()])?).await?;
        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let data = response
            .bytes()
            .await
            .map_err(ApiClientError::from_reqwest)?
            .to_vec();
        Ok(Photo {
            id,
            mime_type,
            data,
        })
    }

    /// `GET /albums/{albumName}/photos`: ids currently associated with an album.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn list_album_photo_ids(&self, album_name: &str) -> Result<Vec<PhotoId>, ApiClientError> {
        let body = self
            .get_text(self.url(&["albums", album_name, "photos"])?)
            .await?;
        Ok(id_list::decode(&body)?)
    }

    /// `POST /albums/{albumId}/photos/link`. Returns the server's confirmation text.
    #[cfg_attr(feature = "trace-spans", tracing::instrument(skip(self)))]
    pub async fn link_photos(&self, album_id: AlbumId, photo_ids: &[PhotoId]) -> Result<String, ApiClientError> {
        let url = self.url(&["albums", &album_id.to_string(), "photos", "link"])?;
        let response = self
            .client
            .post(url)
            .header(AUTHORIZATION, format!("Bearer {}", self.access_token))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(format!("photoIds={}", id_list::encode(photo_ids)))
            .send()
            .await
            .map_err(ApiClientError::from_reqwest)?;
        check_status(response)
            .await?
            .text()
            .await
            .map_err(ApiClientError::from_reqwest)
    }

    /// `GET /albums`: the album list as JSON.
    pub async fn list_albums(&self) -> Result<Vec<Album>, ApiClientError> {
        self.get(self.url(&["albums"])?)
            .await?
            .json::<Vec<Album>>()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ApiClientError::Timeout
                } else {
                    ApiClientError::InvalidResponse(e.to_string())
                }
            })
    }
}

async fn check_status(response: Response) -> Result<Response, ApiClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(ApiClientError::NotFound);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(ApiClientError::Status {
        status: status.as_u16(),
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::time::Duration;

    #[test]
    fn test_parse_album_list() {
        let json = r#"[
            { "id": 1, "name": "Vacation", "ownerId": 7 },
            { "id": 2, "name": "Family", "ownerId": 7 }
        ]"#;
        let albums: Vec<Album> = serde_json::from_str(json).unwrap();
        assert_eq!(albums.len(), 2);
        assert_eq!(albums[0].name, "Vacation");
        assert_eq!(albums[1].owner_id, 7);
    }

    #[tokio::test]
    async fn test_list_photo_ids_sends_bearer() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/photos")
                    .header("authorization", "Bearer secret");
                then.status(200).body("List(3, 7, 9)");
            })
            .await;

        let client = ApiClient::with_base_url("secret".into(), server.base_url());
        assert_eq!(client.list_photo_ids().await.unwrap(), vec![3, 7, 9]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_list_photo_ids_decode_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/photos");
                then.status(200).body("List(3, a, 9)");
            })
            .await;

        let client = ApiClient::with_base_url("t".into(), server.base_url());
        let err = client.list_photo_ids().await.unwrap_err();
        assert!(matches!(err, ApiClientError::Decode(_)));
    }

    #[tokio::test]
    async fn test_fetch_photo_payload_and_not_found() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/photos/5");
                then.status(200)
                    .header("content-type", "image/png")
                    .body("png-bytes");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/photos/6");
                then.status(404);
            })
            .await;

        let client = ApiClient::with_base_url("t".into(), server.base_url());
        let photo = client.fetch_photo(5).await.unwrap();
        assert_eq!(photo.id, 5);
        assert_eq!(photo.mime_type.as_deref(), Some("image/png"));
        assert_eq!(photo.data, b"png-bytes");
        assert_eq!(client.fetch_photo(6).await.unwrap_err(), ApiClientError::NotFound);
    }

    #[tokio::test]
    async fn test_album_photo_ids() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/albums/Vacation/photos");
                then.status(200).body("List()");
            })
            .await;

        let client = ApiClient::with_base_url("t".into(), server.base_url());
        let ids = client.list_album_photo_ids("Vacation").await.unwrap();
        assert!(ids.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_link_photos_form_body() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/albums/4/photos/link")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body("photoIds=2,3");
                then.status(200).body("Photos linked");
            })
            .await;

        let client = ApiClient::with_base_url("t".into(), server.base_url());
        let text = client.link_photos(4, &[2, 3]).await.unwrap();
        assert_eq!(text, "Photos linked");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_link_photos_error_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/albums/4/photos/link");
                then.status(403).body("Not the album owner");
            })
            .await;

        let client = ApiClient::with_base_url("t".into(), server.base_url());
        let err = client.link_photos(4, &[2]).await.unwrap_err();
        assert_eq!(
            err,
            ApiClientError::Status {
                status: 403,
                body: "Not the album owner".into()
            }
        );
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/photos");
                then.status(200)
                    .body("List(1)")
                    .delay(Duration::from_millis(300));
            })
            .await;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(50))
            .build()
            .unwrap();
        let client = ApiClient::with_client(http, "t".into(), server.base_url());
        assert_eq!(client.list_photo_ids().await.unwrap_err(), ApiClientError::Timeout);
    }

    #[tokio::test]
    async fn test_connection_refused_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ApiClient::with_base_url("t".into(), format!("http://{}", addr));
        match client.list_albums().await {
            Err(ApiClientError::Network(_)) => (),
            other => panic!("expected network error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bad_base_url_is_a_configuration_error() {
        let client = ApiClient::with_base_url("t".into(), "not a url".into());
        match client.list_photo_ids().await {
            Err(ApiClientError::InvalidBaseUrl(msg)) => assert!(msg.starts_with("not a url")),
            other => panic!("expected invalid base url, got {:?}", other),
        }

        let client = ApiClient::with_base_url("t".into(), "mailto:photos@example.com".into());
        assert!(matches!(
            client.link_photos(1, &[2]).await,
            Err(ApiClientError::InvalidBaseUrl(_))
        ));
    }
}
