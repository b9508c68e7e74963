//! HTTP response message handed back by actions and middleware.

use crate::{
    errors::Error,
    http::types::{HeaderMap, StatusCode},
};
use serde::Serialize;

pub use write::{BodyWriter, WriteBuffer};

/// HTTP response message.
///
/// Holds the status line parts, a [`HeaderMap`] and the body bytes. The
/// wire form is produced by [`Codec::encode`](crate::Codec::encode), which
/// always recomputes `content-length` and emits `set-cookie` values on lines
/// of their own, in the order they were added.
///
/// # Examples
/// ```
/// use relay_web::{Response, StatusCode};
///
/// let mut resp = Response::new();
/// resp.status(StatusCode::Created)
///     .set_header("content-type", "text/plain")
///     .unwrap()
///     .body("Done");
///
/// assert_eq!(resp.code(), 201);
/// assert_eq!(resp.reason(), "Created");
/// assert_eq!(resp.content(), b"Done");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    code: u16,
    reason: String,
    version: String,
    headers: HeaderMap,
    body: Vec<u8>,
    pub(crate) keep_alive: bool,
}

impl Default for Response {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// `200 OK`, `HTTP/1.1`, no headers, empty body.
    #[inline]
    pub fn new() -> Self {
        Self::with_status(StatusCode::Ok)
    }

    #[inline]
    pub fn with_status(status: StatusCode) -> Self {
        Self {
            code: status.as_u16(),
            reason: status.reason().to_string(),
            version: "1.1".to_string(),
            headers: HeaderMap::new(),
            body: Vec::new(),
            keep_alive: true,
        }
    }
}

// Getters
impl Response {
    #[inline]
    pub const fn code(&self) -> u16 {
        self.code
    }

    #[inline]
    pub fn reason(&self) -> &str {
        &self.reason
    }

    /// Protocol version without the `HTTP/` prefix, e.g. `"1.1"`.
    #[inline]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[inline]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Values of the header `name`, looked up case-insensitively.
    #[inline]
    pub fn header(&self, name: &str) -> Option<&[String]> {
        self.headers.get(name)
    }

    /// `set-cookie` values in the order they were added.
    #[inline]
    pub fn cookies(&self) -> &[String] {
        self.headers.get("set-cookie").unwrap_or_default()
    }

    #[inline]
    pub fn content(&self) -> &[u8] {
        &self.body
    }

    #[inline]
    pub const fn is_keep_alive(&self) -> bool {
        self.keep_alive
    }
}

// Setters
impl Response {
    /// Sets the status code with its canonical reason phrase.
    #[inline]
    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.code = status.as_u16();
        self.reason = status.reason().to_string();
        self
    }

    /// Sets a status code that may be missing from [`StatusCode`].
    ///
    /// An empty `reason` falls back to the canonical phrase when one is known.
    pub fn status_with_reason<R: Into<String>>(&mut self, code: u16, reason: R) -> &mut Self {
        let reason = reason.into();

        self.code = code;
        self.reason = match (reason.is_empty(), StatusCode::from_u16(code)) {
            (true, Some(status)) => status.reason().to_string(),
            _ => reason,
        };
        self
    }

    /// Sets the protocol version echoed in the status line.
    #[inline]
    pub fn set_version<V: Into<String>>(&mut self, version: V) -> &mut Self {
        self.version = version.into();
        self
    }

    /// Replaces all values of the header `name`.
    ///
    /// `content-length` is recomputed on encoding, whatever is set here.
    #[inline]
    pub fn set_header<V: Into<String>>(&mut self, name: &str, value: V) -> Result<&mut Self, Error> {
        self.headers.set(name, [value])?;
        Ok(self)
    }

    /// Adds a value to the header `name`, keeping the existing ones.
    #[inline]
    pub fn append_header<V: Into<String>>(
        &mut self,
        name: &str,
        value: V,
    ) -> Result<&mut Self, Error> {
        self.headers.append(name, value)?;
        Ok(self)
    }

    /// Adds a ready `set-cookie` value such as `"id=42; Path=/; HttpOnly"`.
    #[inline]
    pub fn add_cookie<V: Into<String>>(&mut self, cookie: V) -> Result<&mut Self, Error> {
        self.append_header("set-cookie", cookie)
    }

    /// Forces the connection to close after this response.
    #[inline]
    pub fn close(&mut self) -> &mut Self {
        self.keep_alive = false;
        self
    }

    /// Replaces the body.
    ///
    /// # Examples
    /// ```
    /// use relay_web::Response;
    ///
    /// let mut resp = Response::new();
    ///
    /// resp.body(128);
    /// assert_eq!(resp.content(), b"128");
    ///
    /// resp.body(b"\x00raw");
    /// assert_eq!(resp.content(), b"\x00raw");
    /// ```
    #[inline]
    pub fn body<T: WriteBuffer>(&mut self, data: T) -> &mut Self {
        self.body.clear();
        data.write_to(&mut self.body);
        self
    }

    /// Appends to the body through a [`BodyWriter`].
    #[inline]
    pub fn body_with<F: FnOnce(&mut BodyWriter)>(&mut self, f: F) -> &mut Self {
        f(&mut BodyWriter(&mut self.body));
        self
    }

    /// Serializes `value` as the body and sets `content-type: application/json`.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self, Error> {
        self.body = serde_json::to_vec(value)?;
        self.set_header("content-type", "application/json")
    }
}

pub(crate) mod write {
    use std::{borrow::Cow, io::Write, sync::Arc};

    /// Appending writer over the response body.
    ///
    /// # Examples
    /// ```
    /// use relay_web::Response;
    /// use std::io::Write;
    ///
    /// let mut resp = Response::new();
    /// resp.body_with(|w| {
    ///     w.write("total: ");
    ///     w.write(42);
    ///     write!(w, ", {} items", 3).unwrap();
    /// });
    ///
    /// assert_eq!(resp.content(), b"total: 42, 3 items");
    /// ```
    #[derive(Debug)]
    pub struct BodyWriter<'a>(pub(crate) &'a mut Vec<u8>);

    impl BodyWriter<'_> {
        #[inline]
        pub fn write<T: WriteBuffer>(&mut self, value: T) {
            value.write_to(self.0);
        }
    }

    impl Write for BodyWriter<'_> {
        #[inline]
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        #[inline]
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Values that can be written into a response body.
    ///
    /// Implemented for strings, bytes, booleans, characters and integers.
    /// Floats are left out on purpose: their textual form is a formatting
    /// decision the caller should make.
    pub trait WriteBuffer {
        fn write_to(&self, buffer: &mut Vec<u8>);
    }

    macro_rules! impl_write_buffer {
        (bytes, $conv:expr => $($t:ty),*) => {
            $(impl WriteBuffer for $t {
                #[inline] fn write_to(&self, buffer: &mut Vec<u8>) {
                    let closure = $conv;
                    closure(self, buffer);
                }
            })*
        };
        (display => $($t:ty),*) => {
            $(impl WriteBuffer for $t {
                #[inline] fn write_to(&self, buffer: &mut Vec<u8>) {
                    // Writing into a Vec cannot fail
                    let _ = write!(buffer, "{}", self);
                }
            })*
        };
    }

    impl<T: WriteBuffer + ?Sized> WriteBuffer for &T {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            T::write_to(*self, buffer);
        }
    }

    impl_write_buffer! {
        bytes, |value: &str, buffer: &mut Vec<u8>| {
            buffer.extend_from_slice(value.as_bytes());
        } => str, String, Box<str>, Cow<'_, str>, Arc<str>
    }
    impl_write_buffer! {
        bytes, |value: &[u8], buffer: &mut Vec<u8>| {
            buffer.extend_from_slice(value);
        } => [u8], Vec<u8>, Box<[u8]>, Cow<'_, [u8]>, Arc<[u8]>
    }
    impl<const N: usize> WriteBuffer for [u8; N] {
        #[inline]
        fn write_to(&self, buffer: &mut Vec<u8>) {
            buffer.extend_from_slice(self);
        }
    }
    impl_write_buffer! {
        display => u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, bool, char
    }
}
