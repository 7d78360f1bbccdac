use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bkt_namespace::NamespaceError;
use bkt_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("404 path not found: {0}")]
    NotFound(String),

    #[error("Only GET is supported")]
    UnsupportedMethod,

    #[error("bad request path: {0}")]
    BadPath(String),

    #[error("namespace unavailable: {0}")]
    Unavailable(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("namespace error: {0}")]
    Namespace(NamespaceError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<NamespaceError> for ServerError {
    fn from(e: NamespaceError) -> Self {
        match e {
            NamespaceError::NotFound(path) => Self::NotFound(path),
            NamespaceError::NoSnapshot { last_error } => Self::Unavailable(last_error),
            other => Self::Namespace(other),
        }
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Store(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            Self::Store(StoreError::ReadOnly) => StatusCode::FORBIDDEN,
            Self::UnsupportedMethod | Self::BadPath(_) => StatusCode::BAD_REQUEST,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, self.to_string()).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_errors_map_to_statuses() {
        let nf: ServerError = NamespaceError::NotFound("a/".into()).into();
        assert_eq!(nf.status(), StatusCode::NOT_FOUND);
        assert_eq!(nf.to_string(), "404 path not found: a/");

        let none: ServerError = NamespaceError::NoSnapshot {
            last_error: "boom".into(),
        }
        .into();
        assert_eq!(none.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn store_not_found_is_404() {
        let e: ServerError = StoreError::NotFound("k".into()).into();
        assert_eq!(e.status(), StatusCode::NOT_FOUND);
        let e: ServerError = StoreError::backend("throttled").into();
        assert_eq!(e.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let e: ServerError = StoreError::ReadOnly.into();
        assert_eq!(e.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn unsupported_method_message() {
        assert_eq!(ServerError::UnsupportedMethod.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ServerError::UnsupportedMethod.to_string(), "Only GET is supported");
    }
}
