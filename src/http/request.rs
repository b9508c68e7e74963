use crate::{
    http::{
        types::HeaderMap,
        upload::{Files, UploadedFile},
    },
    query::Params,
};
use memchr::memchr;
use serde_json::Value;
use std::collections::HashMap;

/// Transport-supplied attributes (`remote_addr`, `server_port`, ...),
/// carried through decoding untouched.
pub type Env = HashMap<String, String>;

/// Decoded HTTP request.
///
/// Produced by [`Codec::decode`](crate::Codec::decode). Everything except the
/// attribute bag is fixed once decoding finishes; middleware communicates
/// through [`set_attribute`](Request::set_attribute), and the router's bound
/// path arguments are attached there before the pipeline runs.
///
/// # Input data requirements
///
/// The head (start line and headers) must be `UTF-8`, the body may be
/// anything. Line terminator is exactly `CRLF`.
///
/// | Part        | Template                                        | Example                       |
/// |-------------|-------------------------------------------------|-------------------------------|
/// | Start line  | `[METHOD] SP [TARGET] SP "HTTP/" [VERSION] CRLF` | `GET /api/users HTTP/1.1\r\n` |
/// | Header      | `[NAME] ":" [VALUE] CRLF`                       | `Accept: text/html\r\n`       |
/// | End of head | `CRLF`                                          |                               |
///
/// A missing target means `/`, a missing version means `1.0`.
///
/// Body interpretation depends on `content-type`:
///
/// | Content type contains | Parsed body                                         |
/// |-----------------------|-----------------------------------------------------|
/// | `json`                | JSON object or array, anything else is an empty map |
/// | `form-data`           | plain fields, files go to [`files`](Request::files) |
/// | anything else         | URL-encoded form                                    |
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub(crate) method: String,
    pub(crate) target: String,
    pub(crate) version: String,

    pub(crate) headers: HeaderMap,
    pub(crate) cookies: Params,
    pub(crate) query: Params,

    pub(crate) parsed_body: Value,
    pub(crate) files: Files,
    pub(crate) body: Vec<u8>,

    pub(crate) server_params: Env,
    pub(crate) attributes: HashMap<String, Value>,
}

impl Request {
    /// Creates a bare request, mostly useful for driving a pipeline directly.
    ///
    /// Only the method (upper-cased) and target are set; the query component
    /// of the target is not decoded.
    ///
    /// # Examples
    /// ```
    /// use relay_web::Request;
    ///
    /// let req = Request::new("get", "/users/42?active=1");
    ///
    /// assert_eq!(req.method(), "GET");
    /// assert_eq!(req.path(), "/users/42");
    /// assert_eq!(req.version(), "1.1");
    /// ```
    pub fn new(method: &str, target: &str) -> Self {
        Self {
            method: method.to_ascii_uppercase(),
            target: target.to_string(),
            version: "1.1".to_string(),

            headers: HeaderMap::new(),
            cookies: Params::new(),
            query: Params::new(),

            parsed_body: Value::Object(Params::new()),
            files: Files::new(),
            body: Vec::new(),

            server_params: Env::new(),
            attributes: HashMap::new(),
        }
    }
}

// Start line
impl Request {
    #[inline]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Request target as received, query included.
    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Path component of the target.
    #[inline]
    pub fn path(&self) -> &str {
        match memchr(b'?', self.target.as_bytes()) {
            Some(at) => &self.target[..at],
            None => &self.target,
        }
    }

    /// Protocol version without the `HTTP/` prefix.
    #[inline]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Whether the connection may serve another request after this one.
    ///
    /// An explicit `connection: close` or `connection: keep-alive` wins,
    /// otherwise only `HTTP/1.1` keeps the connection.
    pub fn is_keep_alive(&self) -> bool {
        let connection = self.headers.first("connection").map(str::trim);

        match connection {
            Some(value) if value.eq_ignore_ascii_case("close") => false,
            Some(value) if value.eq_ignore_ascii_case("keep-alive") => true,
            _ => self.version == "1.1",
        }
    }
}

// Headers, cookies, query
impl Request {
    #[inline]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// All values of the header `name` (case-insensitive).
    #[inline]
    pub fn header(&self, name: &str) -> Option<&[String]> {
        self.headers.get(name)
    }

    /// All values of the header `name` joined by `", "`.
    #[inline]
    pub fn header_line(&self, name: &str) -> Option<String> {
        self.headers.line(name)
    }

    #[inline]
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains(name)
    }

    #[inline]
    pub const fn cookies(&self) -> &Params {
        &self.cookies
    }

    /// String value of the cookie `name`.
    #[inline]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name)?.as_str()
    }

    #[inline]
    pub const fn query(&self) -> &Params {
        &self.query
    }

    #[inline]
    pub fn query_param(&self, name: &str) -> Option<&Value> {
        self.query.get(name)
    }
}

// Body
impl Request {
    /// Decoded body: an object for forms, an object or array for JSON.
    #[inline]
    pub const fn parsed_body(&self) -> &Value {
        &self.parsed_body
    }

    #[inline]
    pub const fn files(&self) -> &Files {
        &self.files
    }

    #[inline]
    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files.get(name)
    }

    /// Mutable access, e.g. to [`move_to`](UploadedFile::move_to) an upload.
    #[inline]
    pub fn file_mut(&mut self, name: &str) -> Option<&mut UploadedFile> {
        self.files.get_mut(name)
    }

    /// Raw body bytes.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

// Environment and attributes
impl Request {
    #[inline]
    pub const fn server_params(&self) -> &Env {
        &self.server_params
    }

    #[inline]
    pub fn server_param(&self, name: &str) -> Option<&str> {
        self.server_params.get(name).map(String::as_str)
    }

    #[inline]
    pub const fn attributes(&self) -> &HashMap<String, Value> {
        &self.attributes
    }

    #[inline]
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Stores a value for later pipeline stages, returning the previous one.
    #[inline]
    pub fn set_attribute<N, V>(&mut self, name: N, value: V) -> Option<Value>
    where
        N: Into<String>,
        V: Into<Value>,
    {
        self.attributes.insert(name.into(), value.into())
    }

    #[inline]
    pub fn remove_attribute(&mut self, name: &str) -> Option<Value> {
        self.attributes.remove(name)
    }
}
