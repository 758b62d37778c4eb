//! Drive REST storage backend.
//!
//! Implements [`StorageClient`] against a Google-Drive-style v3 API:
//! - folder listings follow `nextPageToken` until the last page
//! - contents are read with `alt=media` and written with media uploads
//! - 401 responses clear the token store and surface as `AuthExpired`

use std::sync::Arc;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::auth::{ExpiryPolicy, TokenStore, extend_if_near_expiry, unix_now};
use crate::error::{Error, Result};
use crate::storage::{FileMeta, PLAYLIST_MIME_TYPE, StorageClient};

/// Public endpoint of the Drive API.
pub const DEFAULT_API_BASE: &str = "https://www.googleapis.com";

/// Default timeout for a single request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum page size accepted by the listing endpoint.
const LIST_PAGE_SIZE: u32 = 1000;

/// Fields requested for every file resource.
const FILE_FIELDS: &str = "id,name,mimeType,size,modifiedTime";

/// A file resource as returned by the API. Sizes arrive as strings.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    #[serde(default)]
    mime_type: String,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    modified_time: Option<String>,
}

impl From<DriveFile> for FileMeta {
    fn from(file: DriveFile) -> Self {
        Self {
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
            size: file.size.and_then(|s| s.parse().ok()),
            modified_time: file.modified_time,
        }
    }
}

/// One page of a folder listing.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileListPage {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Parse a listing page into file metadata and the next page token.
fn parse_page(body: &str) -> Result<(Vec<FileMeta>, Option<String>)> {
    let page: FileListPage = serde_json::from_str(body)?;
    let token = page.next_page_token.filter(|t| !t.is_empty());
    Ok((page.files.into_iter().map(FileMeta::from).collect(), token))
}

/// Fetch listing pages until one comes back without a next page token.
///
/// `fetch_page` receives the token of the page to fetch, `None` for the
/// first one, and returns the raw response body.
fn collect_pages<F>(mut fetch_page: F) -> Result<Vec<FileMeta>>
where
    F: FnMut(Option<&str>) -> Result<String>,
{
    let mut files = Vec::new();
    let mut page_token: Option<String> = None;

    loop {
        let body = fetch_page(page_token.as_deref())?;
        let (page, next) = parse_page(&body)?;
        files.extend(page);

        match next {
            Some(token) => page_token = Some(token),
            None => return Ok(files),
        }
    }
}

/// Create a file, then upload its content, removing the file again when
/// the upload fails.
fn create_with_content<C, U, D>(create: C, upload: U, discard: D) -> Result<FileMeta>
where
    C: FnOnce() -> Result<FileMeta>,
    U: FnOnce(&str) -> Result<()>,
    D: FnOnce(&str) -> Result<()>,
{
    let meta = create()?;
    if let Err(e) = upload(&meta.id) {
        warn!("Upload to new file {} failed, removing it: {}", meta.id, e);
        if let Err(discard_err) = discard(&meta.id) {
            warn!("Failed to remove empty file {}: {}", meta.id, discard_err);
        }
        return Err(e);
    }
    Ok(meta)
}

/// Map a non-success HTTP status to a storage error.
#[must_use]
pub fn classify_status(status: u16, id: &str, reason: &str) -> Error {
    match status {
        401 => Error::auth_expired(),
        404 => Error::not_found(id),
        _ => Error::transient(Some(status), reason.to_string()),
    }
}

/// Listing query for the direct, non-trashed children of a folder.
fn children_query(folder_id: &str) -> String {
    format!("'{}' in parents and trashed=false", folder_id.replace('\'', "\\'"))
}

/// Drive API client.
pub struct DriveClient {
    http: Client,
    api_base: String,
    tokens: Arc<dyn TokenStore>,
    policy: ExpiryPolicy,
}

impl DriveClient {
    /// Create a client for `api_base` using tokens from `tokens`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(api_base: impl Into<String>, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| Error::transient(None, format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            tokens,
            policy: ExpiryPolicy::default(),
        })
    }

    /// Set the token expiry extension policy.
    #[must_use]
    pub const fn with_expiry_policy(mut self, policy: ExpiryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.api_base)
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/{}", self.files_url(), urlencoding::encode(file_id))
    }

    fn upload_url(&self, file_id: &str) -> String {
        format!(
            "{}/upload/drive/v3/files/{}",
            self.api_base,
            urlencoding::encode(file_id)
        )
    }

    /// Current bearer token, extended first if it is about to expire.
    fn bearer(&self) -> Result<String> {
        let now = unix_now();
        let token = self
            .tokens
            .get()
            .filter(|t| t.is_valid_at(now))
            .ok_or_else(Error::auth_expired)?;

        if let Some(extended) = extend_if_near_expiry(&token, now, &self.policy) {
            debug!("Extending token expiry to {}", extended.expires_at);
            let value = extended.value.clone();
            self.tokens.set(extended)?;
            return Ok(value);
        }
        Ok(token.value)
    }

    /// Turn a failed response into an error, dropping credentials on 401.
    fn failure(&self, status: u16, id: &str, reason: &str) -> Error {
        let err = classify_status(status, id, reason);
        if err.is_auth_expired() {
            warn!("Storage rejected credentials, clearing stored token");
            if let Err(e) = self.tokens.clear() {
                warn!("Failed to clear token store: {}", e);
            }
        }
        err
    }

    /// Authorize and send a request, checking the response status.
    fn send(&self, request: RequestBuilder, id: &str) -> Result<Response> {
        let token = self.bearer()?;
        let response = request
            .bearer_auth(token)
            .send()
            .map_err(|e| Error::transient(None, e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let reason = status.canonical_reason().unwrap_or("Unexpected status");
        Err(self.failure(status.as_u16(), id, reason))
    }

    fn read_body(response: Response) -> Result<String> {
        let status = response.status().as_u16();
        response
            .text()
            .map_err(|e| Error::transient(Some(status), format!("Failed to read body: {e}")))
    }
}

impl StorageClient for DriveClient {
    fn list_files(&self, folder_id: &str) -> Result<Vec<FileMeta>> {
        let files = collect_pages(|page_token| {
            let mut params = vec![
                ("q", children_query(folder_id)),
                ("fields", format!("nextPageToken,files({FILE_FIELDS})")),
                ("pageSize", LIST_PAGE_SIZE.to_string()),
            ];
            if let Some(token) = page_token {
                params.push(("pageToken", token.to_string()));
            }
            let request = self.http.get(self.files_url()).query(&params);
            Self::read_body(self.send(request, folder_id)?)
        })?;

        debug!("Listed {} entries of folder {}", files.len(), folder_id);
        Ok(files)
    }

    fn get_file_content(&self, file_id: &str) -> Result<String> {
        let request = self.http.get(self.file_url(file_id)).query(&[("alt", "media")]);
        Self::read_body(self.send(request, file_id)?)
    }

    fn update_file(&self, file_id: &str, content: &str) -> Result<()> {
        let request = self
            .http
            .patch(self.upload_url(file_id))
            .query(&[("uploadType", "media")])
            .header(CONTENT_TYPE, PLAYLIST_MIME_TYPE)
            .body(content.to_string());
        self.send(request, file_id)?;
        debug!("Uploaded {} bytes to {}", content.len(), file_id);
        Ok(())
    }

    fn create_file(&self, name: &str, parent_folder_id: &str, content: &str) -> Result<FileMeta> {
        let metadata = serde_json::json!({
            "name": name,
            "parents": [parent_folder_id],
            "mimeType": PLAYLIST_MIME_TYPE,
        });
        let request = self
            .http
            .post(self.files_url())
            .query(&[("fields", FILE_FIELDS)])
            .header(CONTENT_TYPE, "application/json")
            .body(metadata.to_string());

        let mut meta = create_with_content(
            || {
                let body = Self::read_body(self.send(request, parent_folder_id)?)?;
                let created: DriveFile = serde_json::from_str(&body)?;
                Ok(FileMeta::from(created))
            },
            |id| self.update_file(id, content),
            |id| {
                self.send(self.http.delete(self.file_url(id)), id)
                    .map(|_| ())
            },
        )?;
        meta.size = Some(content.len() as u64);

        info!("Created {} ({}) in folder {}", meta.name, meta.id, parent_folder_id);
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AccessToken, MockTokenStore};
    use crate::error::ErrorKind;

    fn client(tokens: MockTokenStore) -> DriveClient {
        DriveClient::new("https://drive.example.com/", Arc::new(tokens)).expect("Should build")
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(classify_status(401, "f", "Unauthorized").kind(), ErrorKind::AuthExpired);

        let err = classify_status(404, "folder-9", "Not Found");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Not found: folder-9");

        let err = classify_status(500, "f", "Internal Server Error");
        assert_eq!(err.kind(), ErrorKind::TransientIo);
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_parse_page_with_token() {
        let body = r#"{
            "nextPageToken": "tok-2",
            "files": [
                {"id": "1", "name": "a.mp3", "mimeType": "audio/mpeg", "size": "2048",
                 "modifiedTime": "2024-05-01T10:00:00.000Z"},
                {"id": "2", "name": "sub", "mimeType": "application/vnd.google-apps.folder"}
            ]
        }"#;
        let (files, next) = parse_page(body).expect("Should parse");
        assert_eq!(next.as_deref(), Some("tok-2"));
        assert_eq!(files.len(), 2);
        assert_eq!(files[0].size, Some(2048));
        assert_eq!(
            files[0].modified_time.as_deref(),
            Some("2024-05-01T10:00:00.000Z")
        );
        assert!(files[1].is_folder());
        assert_eq!(files[1].size, None);
    }

    #[test]
    fn test_parse_last_page() {
        let (files, next) = parse_page(r#"{"files": []}"#).expect("Should parse");
        assert!(files.is_empty());
        assert!(next.is_none());

        let (_, next) = parse_page(r#"{"files": [], "nextPageToken": ""}"#).expect("Should parse");
        assert!(next.is_none());
    }

    #[test]
    fn test_parse_page_rejects_garbage() {
        let err = parse_page("<html>").expect_err("Should fail");
        assert_eq!(err.kind(), ErrorKind::Serialization);
    }

    fn page(names: &[&str], next: Option<&str>) -> String {
        let files: Vec<serde_json::Value> = names
            .iter()
            .map(|name| serde_json::json!({"id": name, "name": name, "mimeType": "audio/mpeg"}))
            .collect();
        serde_json::json!({"files": files, "nextPageToken": next}).to_string()
    }

    #[test]
    fn test_collect_pages_follows_tokens_in_order() {
        let mut requested = Vec::new();
        let files = collect_pages(|token| {
            requested.push(token.map(str::to_string));
            Ok(match token {
                None => page(&["a.mp3", "b.mp3"], Some("p2")),
                Some("p2") => page(&["c.mp3"], Some("p3")),
                Some(_) => page(&["d.mp3"], None),
            })
        })
        .expect("Should list");

        let names: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.mp3", "b.mp3", "c.mp3", "d.mp3"]);
        assert_eq!(
            requested,
            vec![None, Some("p2".to_string()), Some("p3".to_string())]
        );
    }

    #[test]
    fn test_collect_pages_stops_on_empty_token() {
        let mut calls = 0;
        let files = collect_pages(|_| {
            calls += 1;
            Ok(page(&["only.mp3"], Some("")))
        })
        .expect("Should list");
        assert_eq!(files.len(), 1);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_collect_pages_propagates_page_error() {
        let err = collect_pages(|token| match token {
            None => Ok(page(&["a.mp3"], Some("p2"))),
            Some(_) => Err(Error::auth_expired()),
        })
        .expect_err("Should fail");
        assert!(err.is_auth_expired());
    }

    fn created() -> Result<FileMeta> {
        Ok(FileMeta {
            id: "new-1".to_string(),
            name: "Mix.m3u8".to_string(),
            mime_type: PLAYLIST_MIME_TYPE.to_string(),
            size: None,
            modified_time: None,
        })
    }

    #[test]
    fn test_create_with_content_removes_file_after_failed_upload() {
        let mut discarded = None;
        let err = create_with_content(
            created,
            |_| Err(Error::transient(Some(503), "Service Unavailable")),
            |id| {
                discarded = Some(id.to_string());
                Ok(())
            },
        )
        .expect_err("Should fail");

        assert_eq!(err.kind(), ErrorKind::TransientIo);
        assert_eq!(discarded.as_deref(), Some("new-1"));
    }

    #[test]
    fn test_create_with_content_keeps_file_on_success() {
        let meta = create_with_content(created, |_| Ok(()), |_| {
            panic!("Should not remove a file that was uploaded")
        })
        .expect("Should create");
        assert_eq!(meta.id, "new-1");
    }

    #[test]
    fn test_create_with_content_reports_upload_error_when_cleanup_fails() {
        let err = create_with_content(
            created,
            |_| Err(Error::auth_expired()),
            |_| Err(Error::auth_expired()),
        )
        .expect_err("Should fail");
        assert!(err.is_auth_expired());
    }

    #[test]
    fn test_children_query_escapes_quotes() {
        assert_eq!(
            children_query("abc"),
            "'abc' in parents and trashed=false"
        );
        assert_eq!(
            children_query("o'brien"),
            "'o\\'brien' in parents and trashed=false"
        );
    }

    #[test]
    fn test_urls() {
        let drive = client(MockTokenStore::new());
        assert_eq!(drive.files_url(), "https://drive.example.com/drive/v3/files");
        assert_eq!(
            drive.file_url("id 1"),
            "https://drive.example.com/drive/v3/files/id%201"
        );
        assert_eq!(
            drive.upload_url("abc"),
            "https://drive.example.com/upload/drive/v3/files/abc"
        );
    }

    #[test]
    fn test_bearer_without_token_is_auth_expired() {
        let mut tokens = MockTokenStore::new();
        tokens.expect_get().returning(|| None);

        let err = client(tokens).bearer().expect_err("Should fail");
        assert!(err.is_auth_expired());
    }

    #[test]
    fn test_bearer_with_expired_token_is_auth_expired() {
        let mut tokens = MockTokenStore::new();
        tokens
            .expect_get()
            .returning(|| Some(AccessToken::new("old", 0, 10)));

        let err = client(tokens).bearer().expect_err("Should fail");
        assert!(err.is_auth_expired());
    }

    #[test]
    fn test_bearer_with_fresh_token() {
        let mut tokens = MockTokenStore::new();
        tokens
            .expect_get()
            .returning(|| Some(AccessToken::new("fresh", unix_now(), 86_400)));
        tokens.expect_set().never();

        assert_eq!(client(tokens).bearer().expect("Should succeed"), "fresh");
    }

    #[test]
    fn test_bearer_extends_token_near_expiry() {
        let mut tokens = MockTokenStore::new();
        tokens
            .expect_get()
            .returning(|| Some(AccessToken::new("soon", unix_now(), 60)));
        tokens
            .expect_set()
            .withf(|t| t.value == "soon")
            .times(1)
            .returning(|_| Ok(()));

        assert_eq!(client(tokens).bearer().expect("Should succeed"), "soon");
    }

    #[test]
    fn test_unauthorized_clears_tokens() {
        let mut tokens = MockTokenStore::new();
        tokens.expect_clear().times(1).returning(|| Ok(()));

        let err = client(tokens).failure(401, "file", "Unauthorized");
        assert!(err.is_auth_expired());
    }

    #[test]
    fn test_not_found_keeps_tokens() {
        let mut tokens = MockTokenStore::new();
        tokens.expect_clear().never();

        let err = client(tokens).failure(404, "file-7", "Not Found");
        assert_eq!(err.to_string(), "Not found: file-7");
    }
}
