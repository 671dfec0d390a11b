//! Encoded-path file handler.
//!
//! Files are addressed as `GET /{segment}` where `segment` is the relative
//! path encoded with the URL-safe base64 alphabet (with padding). Invalid
//! segments are rejected with 400; they never reach the filesystem.

use axum::{
    extract::{Path as UrlPath, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::URL_SAFE, Engine as _};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeFile;

/// Why a segment could not be turned into a path.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid base64 path: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("decoded path is not valid UTF-8")]
    Utf8,
    #[error("path escapes the root directory")]
    Traversal,
}

/// Encode a relative path as a URL segment.
pub fn encode_path(relative: &str) -> String {
    URL_SAFE.encode(relative.as_bytes())
}

/// Decode a URL segment into a relative path string.
pub fn decode_path(segment: &str) -> Result<String, DecodeError> {
    let bytes = URL_SAFE.decode(segment)?;
    String::from_utf8(bytes).map_err(|_| DecodeError::Utf8)
}

/// Join `relative` under `root`, refusing anything that could leave it.
pub fn safe_join(root: &Path, relative: &str) -> Result<PathBuf, DecodeError> {
    let mut joined = root.to_path_buf();
    for component in Path::new(relative.trim_start_matches('/')).components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(DecodeError::Traversal)
            }
        }
    }
    Ok(joined)
}

/// `GET /{file}` in encoded mode.
pub async fn serve_encoded(
    State(root): State<Arc<PathBuf>>,
    UrlPath(segment): UrlPath<String>,
    request: Request,
) -> Response {
    let path = match decode_path(&segment).and_then(|relative| safe_join(&root, &relative)) {
        Ok(path) => path,
        Err(e) => {
            tracing::debug!(segment = %segment, error = %e, "Rejected encoded path");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    tracing::debug!(path = %path.display(), "Serving encoded path");
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}
