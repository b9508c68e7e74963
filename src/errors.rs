use crate::{http::types::StatusCode, query};
use std::io;

/// Errors produced by the connection reader, the codec, the router and the
/// route table loader.
///
/// Each variant maps onto the status code the server answers with when the
/// error escapes request processing, see [`Error::status`].
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No trie path matches the requested method and path.
    #[error("no routing rule matches {method} {path}")]
    NotFound { method: String, path: String },

    /// Malformed registration input, unresolvable identifiers,
    /// or a header name/value the header bag refuses.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The raw request could not be split into a start line and headers.
    #[error("malformed request: {0}")]
    Malformed(&'static str),

    #[error(transparent)]
    Query(#[from] query::Error),

    /// The request head grew past its size limit before the empty line.
    #[error("request head exceeds {0} bytes")]
    HeadTooLarge(usize),

    /// The declared `content-length` exceeds the body size limit.
    #[error("request body exceeds {0} bytes")]
    BodyTooLarge(usize),

    /// The declarative route table could not be parsed.
    #[error("route table: {0}")]
    Config(String),

    /// A response body could not be serialized.
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    #[inline]
    pub(crate) fn invalid<M: Into<String>>(message: M) -> Self {
        Error::InvalidArgument(message.into())
    }

    /// Status code reported to the client for this error.
    #[inline]
    pub const fn status(&self) -> StatusCode {
        match self {
            Error::NotFound { .. } => StatusCode::NotFound,
            Error::InvalidArgument(_) | Error::Malformed(_) | Error::Query(_) => {
                StatusCode::BadRequest
            }
            Error::HeadTooLarge(_) => StatusCode::RequestHeaderFieldsTooLarge,
            Error::BodyTooLarge(_) => StatusCode::PayloadTooLarge,
            Error::Config(_) | Error::Json(_) => StatusCode::InternalServerError,
            Error::Io(_) => StatusCode::ServiceUnavailable,
        }
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        #[rustfmt::skip]
        let cases = [
            (Error::NotFound { method: "GET".into(), path: "/".into() }, 404),
            (Error::invalid("bad header"),                              400),
            (Error::Malformed("missing method"),                        400),
            (Error::Query(query::Error::OverLimit(1)),                  400),
            (Error::HeadTooLarge(8192),                                 431),
            (Error::BodyTooLarge(1024),                                 413),
            (Error::Config("expected table".into()),                    500),
            (Error::Json(serde_json::from_str::<u8>("x").unwrap_err()), 500),
            (Error::Io(io::ErrorKind::TimedOut.into()),                 503),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status().as_u16(), expected, "{error}");
        }
    }

    #[test]
    fn display() {
        let error = Error::NotFound {
            method: "POST".into(),
            path: "/users/42".into(),
        };
        assert_eq!(error.to_string(), "no routing rule matches POST /users/42");
    }
}
