use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri};
use axum::response::{Html, IntoResponse, Json, Response};
use bkt_namespace::BucketNamespace;
use bkt_store::{ObjectBody, ObjectStore};
use percent_encoding::{percent_decode_str, utf8_percent_encode};
use serde::Serialize;

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::render::{self, Fragment, ListingDoc, PATH_ESCAPE};

/// Media type that selects a JSON listing when it leads the `Accept` header.
pub const JSON_LISTING_MEDIA_TYPE: &str = "list/json";
const RECURSIVE_DIRECTIVE: &str = "recursive";
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Shared by every request.
pub struct AppState {
    pub namespace: BucketNamespace,
    pub store: Arc<dyn ObjectStore>,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn ObjectStore>, config: ServerConfig) -> Self {
        Self {
            namespace: BucketNamespace::new(Arc::clone(&store), &config.namespace),
            store,
            config,
        }
    }

    /// True when the configured unlock header is present on the request.
    fn writes_allowed(&self, headers: &HeaderMap) -> bool {
        match self.config.modify_allow_header.as_deref() {
            Some(name) if !name.is_empty() => headers.contains_key(name),
            _ => false,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub generation: u64,
    pub snapshot_age_ms: Option<u64>,
    pub directories: usize,
    pub objects: u64,
    pub bytes: u64,
    pub last_error: Option<String>,
}

/// Health check handler. Never triggers a rebuild.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let s = state.namespace.status();
    let status = match (&s.age, &s.last_error) {
        (None, _) => "starting",
        (Some(_), Some(_)) => "degraded",
        (Some(_), None) => "ok",
    };
    Json(HealthResponse {
        status,
        generation: s.generation,
        snapshot_age_ms: s.age.map(|a| a.as_millis() as u64),
        directories: s.directories,
        objects: s.objects,
        bytes: s.bytes,
        last_error: s.last_error,
    })
}

/// Every path other than the health check lands here.
pub async fn bucket_handler(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> ServerResult<Response> {
    let key = request_key(&uri)?;
    match method {
        Method::GET | Method::HEAD => get_path(&state, &key, uri.query(), &headers).await,
        Method::PUT if state.writes_allowed(&headers) => {
            put_object(&state, &key, &headers, body).await
        }
        Method::DELETE if state.writes_allowed(&headers) => delete_object(&state, &key).await,
        _ => Err(ServerError::UnsupportedMethod),
    }
}

/// Decoded object key for a request path, without the leading `/`.
fn request_key(uri: &Uri) -> ServerResult<String> {
    let raw = uri.path().trim_start_matches('/');
    let key = percent_decode_str(raw)
        .decode_utf8()
        .map_err(|e| ServerError::BadPath(e.to_string()))?;
    Ok(key.into_owned())
}

async fn get_path(
    state: &AppState,
    key: &str,
    query: Option<&str>,
    headers: &HeaderMap,
) -> ServerResult<Response> {
    if key.is_empty() || key.ends_with('/') {
        return get_directory(state, key, query, headers).await;
    }
    match state.store.get(key).await {
        Ok(object) => Ok(object_response(object)),
        Err(e) if e.is_not_found() => {
            let dir = format!("{key}/");
            if state.namespace.is_directory(&dir).await? {
                Ok(redirect_to(&dir))
            } else {
                Err(ServerError::NotFound(key.to_string()))
            }
        }
        Err(e) => Err(e.into()),
    }
}

async fn get_directory(
    state: &AppState,
    key: &str,
    query: Option<&str>,
    headers: &HeaderMap,
) -> ServerResult<Response> {
    if let Some(accept) = json_listing_request(headers) {
        if accept.recursive || query_has_flag(query, RECURSIVE_DIRECTIVE) {
            let listings = state.namespace.list_recursive(key).await?;
            let docs: Vec<ListingDoc<'_>> = listings.iter().map(ListingDoc::from).collect();
            return Ok(Json(docs).into_response());
        }
        let listing = state.namespace.list(key).await?;
        return Ok(Json(render::entry_docs(&listing.entries)).into_response());
    }

    for index in &state.config.directory_index {
        let candidate = format!("{key}{index}");
        if state.namespace.is_file(&candidate).await? {
            let object = state.store.get(&candidate).await?;
            return Ok(object_response(object));
        }
    }

    let listing = state.namespace.list(key).await?;
    let header = decoration(state, key, &state.config.directory_header).await?;
    let footer = decoration(state, key, &state.config.directory_footer).await?;
    let html = render::html_listing(&listing, header.as_ref(), footer.as_ref());
    Ok(Html(html).into_response())
}

/// First candidate that exists as a file. Names starting with `/` are bucket
/// keys; others are relative to the listed directory.
async fn decoration(
    state: &AppState,
    dir: &str,
    candidates: &[String],
) -> ServerResult<Option<Fragment>> {
    for candidate in candidates {
        let key = match candidate.strip_prefix('/') {
            Some(absolute) => absolute.to_string(),
            None => format!("{dir}{candidate}"),
        };
        if !state.namespace.is_file(&key).await? {
            continue;
        }
        return match state.store.get(&key).await {
            Ok(object) => {
                let body = String::from_utf8_lossy(&object.data).into_owned();
                Ok(Some(Fragment::new(&key, body)))
            }
            Err(e) => {
                tracing::debug!(key = %key, error = %e, "listing decoration unavailable");
                Ok(None)
            }
        };
    }
    Ok(None)
}

async fn put_object(
    state: &AppState,
    key: &str,
    headers: &HeaderMap,
    body: Bytes,
) -> ServerResult<Response> {
    if key.is_empty() {
        return Err(ServerError::BadPath("empty key".into()));
    }
    let declared = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|ct| !ct.is_empty() && *ct != "application/x-www-form-urlencoded");
    let content_type = declared.unwrap_or_else(|| guess_content_type(key));
    let size = body.len();
    state.store.put(key, body, Some(content_type)).await?;
    state.namespace.invalidate();
    tracing::info!(key, size, content_type, "object written");
    Ok(StatusCode::OK.into_response())
}

async fn delete_object(state: &AppState, key: &str) -> ServerResult<Response> {
    if key.is_empty() {
        return Err(ServerError::BadPath("empty key".into()));
    }
    state.store.delete(key).await?;
    state.namespace.invalidate();
    tracing::info!(key, "object deleted");
    Ok(StatusCode::OK.into_response())
}

fn object_response(object: ObjectBody) -> Response {
    let content_type = object
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or(HeaderValue::from_static(FALLBACK_CONTENT_TYPE));
    let mut response = Response::new(Body::from(object.data));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, content_type);
    if let Some(modified) = object.last_modified {
        let stamp = modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        if let Ok(v) = HeaderValue::from_str(&stamp) {
            headers.insert(header::LAST_MODIFIED, v);
        }
    }
    response
}

fn redirect_to(dir: &str) -> Response {
    let location = format!("/{}", utf8_percent_encode(dir, PATH_ESCAPE));
    match HeaderValue::from_str(&location) {
        Ok(v) => (StatusCode::TEMPORARY_REDIRECT, [(header::LOCATION, v)]).into_response(),
        Err(e) => ServerError::Internal(e.to_string()).into_response(),
    }
}

#[derive(Debug, Default, PartialEq, Eq)]
struct JsonListingRequest {
    recursive: bool,
}

/// Looks only at the first media range of `Accept`; its parameters may
/// carry the `recursive` directive.
fn json_listing_request(headers: &HeaderMap) -> Option<JsonListingRequest> {
    let accept = headers.get(header::ACCEPT)?.to_str().ok()?;
    let first = accept.split(',').next()?;
    let mut parts = first.split(';').map(str::trim);
    if !parts.next()?.eq_ignore_ascii_case(JSON_LISTING_MEDIA_TYPE) {
        return None;
    }
    Some(JsonListingRequest {
        recursive: parts.any(|p| p.eq_ignore_ascii_case(RECURSIVE_DIRECTIVE)),
    })
}

fn query_has_flag(query: Option<&str>, flag: &str) -> bool {
    query
        .into_iter()
        .flat_map(|q| q.split('&'))
        .any(|pair| pair.split('=').next() == Some(flag))
}

/// Content type from the key's extension, for uploads that did not declare one.
pub fn guess_content_type(key: &str) -> &'static str {
    let name = key.rsplit('/').next().unwrap_or(key);
    let ext = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => return FALLBACK_CONTENT_TYPE,
    };
    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "txt" | "md" => "text/plain; charset=utf-8",
        "csv" => "text/csv; charset=utf-8",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" | "tgz" => "application/gzip",
        "tar" => "application/x-tar",
        "wasm" => "application/wasm",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "mp4" => "video/mp4",
        "mp3" => "audio/mpeg",
        _ => FALLBACK_CONTENT_TYPE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accept(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::ACCEPT, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn json_listing_only_when_first() {
        assert_eq!(
            json_listing_request(&accept("list/json")),
            Some(JsonListingRequest { recursive: false })
        );
        assert_eq!(
            json_listing_request(&accept("list/json; recursive, text/html")),
            Some(JsonListingRequest { recursive: true })
        );
        assert_eq!(json_listing_request(&accept("text/html, list/json")), None);
        assert_eq!(json_listing_request(&HeaderMap::new()), None);
    }

    #[test]
    fn query_flags() {
        assert!(query_has_flag(Some("recursive"), "recursive"));
        assert!(query_has_flag(Some("a=1&recursive=1"), "recursive"));
        assert!(!query_has_flag(Some("recursively"), "recursive"));
        assert!(!query_has_flag(None, "recursive"));
    }

    #[test]
    fn content_type_guesses() {
        assert_eq!(guess_content_type("site/index.HTML"), "text/html; charset=utf-8");
        assert_eq!(guess_content_type("img/logo.png"), "image/png");
        assert_eq!(guess_content_type("archive.tar.gz"), "application/gzip");
        assert_eq!(guess_content_type("bin/tool"), FALLBACK_CONTENT_TYPE);
        assert_eq!(guess_content_type("a.b/.bashrc"), FALLBACK_CONTENT_TYPE);
    }

    #[test]
    fn keys_are_percent_decoded() {
        let uri: Uri = "/docs/a%20b.txt?x=1".parse().unwrap();
        assert_eq!(request_key(&uri).unwrap(), "docs/a b.txt");
        let uri: Uri = "/".parse().unwrap();
        assert_eq!(request_key(&uri).unwrap(), "");
        let uri: Uri = "/%FF".parse().unwrap();
        assert!(matches!(request_key(&uri), Err(ServerError::BadPath(_))));
    }
}
