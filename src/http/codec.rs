//! Wire codec: raw request bytes in, raw response bytes out.

use crate::{
    errors::Error,
    http::{
        multipart::Multipart,
        request::{Env, Request},
        response::Response,
        types::HeaderMap,
        upload::Files,
    },
    limits::ReqLimits,
    log,
    query::{Params, Query},
};
use memchr::memmem;
use serde_json::Value;
use std::{fmt::Write, path::PathBuf};

/// Decodes requests and encodes responses.
///
/// Stateless apart from its configuration, so one instance is shared by
/// every connection.
///
/// # Examples
/// ```
/// use relay_web::{Codec, Response, StatusCode};
///
/// let codec = Codec::new();
///
/// let raw = b"GET /users/42?active=1 HTTP/1.1\r\nHost: localhost\r\n\r\n";
/// let req = codec.decode(raw, Default::default()).unwrap();
///
/// assert_eq!(req.method(), "GET");
/// assert_eq!(req.path(), "/users/42");
/// assert_eq!(req.query()["active"], "1");
///
/// let mut resp = Response::new();
/// resp.status(StatusCode::NotFound).body("gone");
///
/// assert_eq!(
///     codec.encode(&resp),
///     b"HTTP/1.1 404 Not Found\r\ncontent-length: 4\r\n\r\ngone"
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Codec {
    limits: ReqLimits,
    upload_dir: PathBuf,
}

impl Default for Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl Codec {
    /// Default [`ReqLimits`], uploads go to [`std::env::temp_dir`].
    #[inline]
    pub fn new() -> Self {
        Self {
            limits: ReqLimits::default(),
            upload_dir: std::env::temp_dir(),
        }
    }

    #[inline]
    pub fn limits(mut self, limits: ReqLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Directory for the temporary files of multipart uploads.
    #[inline]
    pub fn upload_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.upload_dir = dir.into();
        self
    }

    #[inline]
    pub fn req_limits(&self) -> &ReqLimits {
        &self.limits
    }
}

// Decoding
impl Codec {
    /// Decodes one complete request message.
    ///
    /// `env` holds the transport attributes and becomes the request's
    /// server parameters as is.
    ///
    /// Fails with [`Error::Malformed`] when the head can't be split into a
    /// start line and headers, and with [`Error::Query`] when the query
    /// string, the cookies or a URL-encoded body carry too many parameters.
    /// Header lines without a colon, or with a name that is not a token,
    /// are skipped.
    pub fn decode(&self, raw: &[u8], env: Env) -> Result<Request, Error> {
        let at = memmem::find(raw, b"\r\n\r\n").ok_or(Error::Malformed("missing head delimiter"))?;
        let (head, body) = (&raw[..at], &raw[at + 4..]);

        let head = simdutf8::basic::from_utf8(head)
            .map_err(|_| Error::Malformed("head is not valid UTF-8"))?;

        let (start_line, header_lines) = head.split_once("\r\n").unwrap_or((head, ""));
        let mut request = self.parse_start_line(start_line)?;
        request.headers = self.parse_headers(header_lines)?;

        if let Some(cookie) = request.headers.first("cookie") {
            let fields = cookie.replace("; ", "&");
            request.cookies = Query::parse(fields.as_bytes(), self.limits.query_params)?;
        }

        if let Some(at) = memchr::memchr(b'?', request.target.as_bytes()) {
            request.query = Query::parse(&request.target.as_bytes()[at..], self.limits.query_params)?;
        }

        if !body.is_empty() {
            let content_type = request.headers.first("content-type").unwrap_or_default();
            let (parsed, files) = self.parse_body(content_type, body)?;

            request.parsed_body = parsed;
            request.files = files;
        }

        request.body = body.to_vec();
        request.server_params = env;
        Ok(request)
    }

    // METHOD SP TARGET SP HTTP/VERSION
    fn parse_start_line(&self, line: &str) -> Result<Request, Error> {
        let mut parts = line.splitn(3, ' ');

        let method = parts.next().unwrap_or_default();
        if method.is_empty() {
            log::debug!("request without method: {:?}", line);
            return Err(Error::Malformed("missing method"));
        }

        let target = parts.next().filter(|t| !t.is_empty()).unwrap_or("/");
        let version = parts
            .next()
            .map(|v| v.trim().strip_prefix("HTTP/").unwrap_or(v.trim()))
            .filter(|v| !v.is_empty())
            .unwrap_or("1.0");

        let mut request = Request::new(method, target);
        request.version = version.to_string();
        Ok(request)
    }

    fn parse_headers(&self, lines: &str) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();

        for (count, line) in lines.split("\r\n").filter(|l| !l.is_empty()).enumerate() {
            if count >= self.limits.header_count {
                return Err(Error::Malformed("too many headers"));
            }

            let Some((name, value)) = line.split_once(':') else {
                log::debug!("header line without colon skipped: {:?}", line);
                continue;
            };
            if headers.append(name.trim(), value.trim()).is_err() {
                log::debug!("invalid header line skipped: {:?}", line);
            }
        }

        Ok(headers)
    }

    fn parse_body(&self, content_type: &str, body: &[u8]) -> Result<(Value, Files), Error> {
        if content_type.contains("json") {
            let parsed = match serde_json::from_slice::<Value>(body) {
                Ok(value @ (Value::Object(_) | Value::Array(_))) => value,
                _ => Value::Object(Params::new()),
            };
            return Ok((parsed, Files::new()));
        }

        if content_type.contains("form-data") {
            let Some(multipart) = Multipart::new(content_type, &self.upload_dir) else {
                log::debug!("multipart body without boundary: {:?}", content_type);
                return Ok((Value::Object(Params::new()), Files::new()));
            };
            let (fields, files) = multipart.parse(body);
            return Ok((Value::Object(fields), files));
        }

        let fields = Query::parse(body, self.limits.query_params)?;
        Ok((Value::Object(fields), Files::new()))
    }
}

// Encoding
impl Codec {
    /// Encodes a response.
    ///
    /// ```text
    /// HTTP/[VERSION] SP [CODE] SP [REASON] CRLF
    /// [NAME]: [VALUE];[VALUE] CRLF       <- sorted by name, content-length included
    /// set-cookie: [COOKIE] CRLF          <- one line each, in insertion order
    /// CRLF
    /// [BODY]
    /// ```
    ///
    /// `content-length` always reflects the body, any value set on the
    /// response is replaced. A response marked with
    /// [`close`](Response::close) gets `connection: close`.
    pub fn encode(&self, response: &Response) -> Vec<u8> {
        let mut headers = response.headers().clone();
        let cookies = headers.remove("set-cookie").unwrap_or_default();

        headers.put("content-length", response.content().len().to_string());
        if !response.is_keep_alive() {
            headers.put("connection", "close".to_string());
        }

        let mut head = String::with_capacity(128);
        // Writing into a String cannot fail
        let _ = write!(
            head,
            "HTTP/{} {} {}\r\n",
            response.version(),
            response.code(),
            response.reason()
        );

        for (name, values) in headers.iter() {
            let _ = write!(head, "{}: {}\r\n", name, values.join(";"));
        }
        for cookie in &cookies {
            let _ = write!(head, "set-cookie: {}\r\n", cookie);
        }
        head.push_str("\r\n");

        let mut raw = head.into_bytes();
        raw.extend_from_slice(response.content());
        raw
    }
}
