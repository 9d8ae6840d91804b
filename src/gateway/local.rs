//! Local resource store.
//!
//! Resolves request paths under a root directory and serves files with
//! cache-disabling headers. Existence is checked on every request; nothing
//! is cached. Paths that cannot be mapped safely under the root resolve to
//! `None` and behave exactly like missing files.

use http::header::{ALLOW, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderValue, Method, Response, StatusCode};
use percent_encoding::percent_decode_str;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::proxy_body::{self, ProxyBody};

/// Header attached to every locally served file.
pub const NO_CACHE: &str = "no-cache, no-store";

const INDEX_FILE: &str = "index.html";

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a URL path onto the root. `None` if the path is malformed or
    /// would escape the root.
    pub fn resolve(&self, path: &str) -> Option<PathBuf> {
        let mut resolved = self.root.clone();
        for raw in path.split('/') {
            let segment = percent_decode_str(raw).decode_utf8().ok()?;
            match segment.as_ref() {
                "" | "." => continue,
                s if is_plain_segment(s) => resolved.push(s),
                _ => return None,
            }
        }
        Some(resolved)
    }

    /// Resolve `path` and return it only if something exists there now.
    pub async fn lookup(&self, path: &str) -> Option<PathBuf> {
        let file = self.resolve(path)?;
        match tokio::fs::metadata(&file).await {
            Ok(_) => Some(file),
            Err(e) => {
                if e.kind() != io::ErrorKind::NotFound {
                    debug!(path, error = %e, "local lookup failed, treating as absent");
                }
                None
            }
        }
    }

    /// Serve `file` (as returned by [`lookup`](Self::lookup) or
    /// [`resolve`](Self::resolve)).
    ///
    /// Read failures are answered here with a status and a short body.
    pub async fn serve(&self, method: &Method, file: &Path) -> Response<ProxyBody> {
        if method != Method::GET && method != Method::HEAD {
            let mut response = status_response(StatusCode::METHOD_NOT_ALLOWED);
            response
                .headers_mut()
                .insert(ALLOW, HeaderValue::from_static("GET, HEAD"));
            return response;
        }

        match open(file).await {
            Ok((handle, len, served_path)) => {
                let mime = mime_guess::from_path(&served_path).first_or_octet_stream();
                let body = if method == Method::HEAD {
                    proxy_body::empty()
                } else {
                    proxy_body::from_file(handle)
                };

                let mut response = Response::new(body);
                let headers = response.headers_mut();
                headers.insert(CACHE_CONTROL, HeaderValue::from_static(NO_CACHE));
                headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
                if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
                    headers.insert(CONTENT_TYPE, value);
                }
                response
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                status_response(StatusCode::NOT_FOUND)
            }
            Err(e) => {
                warn!(file = %file.display(), error = %e, "local file unreadable");
                status_response(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

/// A decoded segment must name exactly one ordinary path component.
/// Encoded separators, parent references, NULs and platform prefixes
/// (`C:` on Windows) all fail this check.
fn is_plain_segment(segment: &str) -> bool {
    if segment.contains(['/', '\\', '\0']) {
        return false;
    }
    let mut components = Path::new(segment).components();
    matches!(components.next(), Some(Component::Normal(_))) && components.next().is_none()
}

/// Open `file`, descending into `index.html` for directories.
async fn open(file: &Path) -> io::Result<(tokio::fs::File, u64, PathBuf)> {
    let mut target = file.to_path_buf();
    let mut meta = tokio::fs::metadata(&target).await?;
    if meta.is_dir() {
        target.push(INDEX_FILE);
        meta = tokio::fs::metadata(&target).await?;
    }
    if !meta.is_file() {
        return Err(io::Error::new(io::ErrorKind::NotFound, "not a regular file"));
    }
    let handle = tokio::fs::File::open(&target).await?;
    Ok((handle, meta.len(), target))
}

fn status_response(status: StatusCode) -> Response<ProxyBody> {
    let text = format!(
        "{} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or_default()
    );
    let mut response = Response::new(proxy_body::full(text));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_resolve_plain_and_encoded() {
        let store = LocalStore::new("/srv/assets");
        assert_eq!(
            store.resolve("/resource/map1.json"),
            Some(PathBuf::from("/srv/assets/resource/map1.json"))
        );
        assert_eq!(
            store.resolve("/resource/my%20map.json"),
            Some(PathBuf::from("/srv/assets/resource/my map.json"))
        );
        assert_eq!(
            store.resolve("//resource/./a.json"),
            Some(PathBuf::from("/srv/assets/resource/a.json"))
        );
        assert_eq!(store.resolve("/"), Some(PathBuf::from("/srv/assets")));
    }

    #[test]
    fn test_resolve_rejects_escapes() {
        let store = LocalStore::new("/srv/assets");
        assert_eq!(store.resolve("/../etc/passwd"), None);
        assert_eq!(store.resolve("/resource/%2e%2e/%2e%2e/etc/passwd"), None);
        assert_eq!(store.resolve("/a%5c..%5cb"), None);
        assert_eq!(store.resolve("/a%00b"), None);
        assert_eq!(store.resolve("/bad%ff%fe"), None);
        assert_eq!(store.resolve("/..%2Fsecret.txt"), None);
        assert_eq!(store.resolve("/a%2F..%2F..%2Fb"), None);
        assert_eq!(store.resolve("/resource/%2Fetc%2Fpasswd"), None);
        assert_eq!(store.resolve("/resource/map%2Fa.json"), None);
    }

    #[cfg(windows)]
    #[test]
    fn test_resolve_rejects_drive_prefix() {
        let store = LocalStore::new("C:\\srv\\assets");
        assert_eq!(store.resolve("/c:/windows"), None);
        assert_eq!(store.resolve("/resource/d:secret"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_allows_colon_in_file_name() {
        let store = LocalStore::new("/srv/assets");
        assert_eq!(
            store.resolve("/resource/a:b.xml"),
            Some(PathBuf::from("/srv/assets/resource/a:b.xml"))
        );
        assert_eq!(
            store.resolve("/c:/windows"),
            Some(PathBuf::from("/srv/assets/c:/windows"))
        );
    }

    #[tokio::test]
    async fn test_lookup_and_serve() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("resource")).unwrap();
        std::fs::write(dir.path().join("resource/map1.json"), br#"{"id":1}"#).unwrap();
        let store = LocalStore::new(dir.path());

        assert!(store.lookup("/resource/missing.json").await.is_none());
        let file = store.lookup("/resource/map1.json").await.unwrap();

        let response = store.serve(&Method::GET, &file).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CACHE_CONTROL], NO_CACHE);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()[CONTENT_LENGTH], "8");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"id":1}"#);
    }

    #[tokio::test]
    async fn test_head_has_no_body() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.xml"), b"<a/>").unwrap();
        let store = LocalStore::new(dir.path());

        let response = store.serve(&Method::HEAD, &dir.path().join("a.xml")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_LENGTH], "4");
        assert!(response.into_body().collect().await.unwrap().to_bytes().is_empty());
    }

    #[tokio::test]
    async fn test_directory_serves_index() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), b"<html></html>").unwrap();
        let store = LocalStore::new(dir.path());

        let response = store.serve(&Method::GET, dir.path()).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html");
    }

    #[tokio::test]
    async fn test_read_failures_are_local_statuses() {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path());

        let gone = store.serve(&Method::GET, &dir.path().join("gone.json")).await;
        assert_eq!(gone.status(), StatusCode::NOT_FOUND);

        let empty_dir = store.serve(&Method::GET, dir.path()).await;
        assert_eq!(empty_dir.status(), StatusCode::NOT_FOUND);

        let post = store.serve(&Method::POST, &dir.path().join("gone.json")).await;
        assert_eq!(post.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(post.headers()[ALLOW], "GET, HEAD");
    }
}
