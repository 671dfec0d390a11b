//! Directory listings for raw mode.
//!
//! `ServeDir` answers files and `index.html`; when a directory has no index
//! it falls through to [`directory_listing`], which renders a plain `<pre>`
//! list of entries. Anything else is a 404.

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::path::PathBuf;
use std::sync::Arc;

use crate::http::encoded::safe_join;

/// Characters escaped in listing links.
const LINK: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, "404 page not found\n").into_response()
}

/// Fallback service for `ServeDir`.
pub async fn directory_listing(State(root): State<Arc<PathBuf>>, uri: Uri) -> Response {
    let Ok(decoded) = percent_decode_str(uri.path()).decode_utf8() else {
        return not_found();
    };
    let Ok(path) = safe_join(&root, &decoded) else {
        return not_found();
    };

    let mut entries = match tokio::fs::read_dir(&path).await {
        Ok(entries) => entries,
        Err(_) => return not_found(),
    };

    let mut names = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let mut name = entry.file_name().to_string_lossy().into_owned();
                if entry.file_type().await.map(|t| t.is_dir()).unwrap_or(false) {
                    name.push('/');
                }
                names.push(name);
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Error reading directory");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Error reading directory\n")
                    .into_response();
            }
        }
    }
    names.sort();

    let mut response = Html(render_listing(&names)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, header::HeaderValue::from_static("no-cache"));
    response
}

/// Render entry names (directories carry a trailing `/`) as HTML.
pub fn render_listing(names: &[String]) -> String {
    let mut body = String::from(
        "<!doctype html>\n<meta name=\"viewport\" content=\"width=device-width\">\n<pre>\n",
    );
    for name in names {
        body.push_str(&format!(
            "<a href=\"{}\">{}</a>\n",
            utf8_percent_encode(name, LINK),
            escape_html(name)
        ));
    }
    body.push_str("</pre>\n");
    body
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
