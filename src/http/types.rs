#![allow(rustdoc::bare_urls)]

//! Core HTTP protocol types and utilities

use crate::errors::Error;
use std::collections::{btree_map, BTreeMap};

#[inline(always)]
pub(crate) fn slice_to_usize(bytes: &[u8]) -> Option<usize> {
    if bytes.is_empty() {
        return None;
    }

    let mut result: usize = 0;

    for &byte in bytes {
        if !byte.is_ascii_digit() {
            return None;
        }

        result = result
            .checked_mul(10)?
            .checked_add((byte - b'0') as usize)?;
    }

    Some(result)
}

// STATUS_CODE

macro_rules! set_status_codes {
    ($(
        $(#[$docs:meta])*
        $name:ident = ($num:literal, $str:literal);
    )+) => {
        /// HTTP status codes
        ///
        /// Represents valid HTTP status codes as defined in
        /// [RFC 9110](https://datatracker.ietf.org/doc/html/rfc9110#section-15) and other standards.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StatusCode { $(
            #[doc = concat!(stringify!($num), " ", $str)]
            $(#[$docs])*
            $name = $num,
        )+ }

        impl StatusCode {
            /// Numeric value of the status code.
            #[inline]
            pub const fn as_u16(&self) -> u16 {
                *self as u16
            }

            /// Canonical reason phrase, e.g. `"Not Found"` for 404.
            #[inline]
            pub const fn reason(&self) -> &'static str {
                match self { $(
                    StatusCode::$name => $str,
                )+ }
            }

            /// Looks up a known status code.
            #[inline]
            pub const fn from_u16(code: u16) -> Option<Self> {
                match code { $(
                    $num => Some(StatusCode::$name),
                )+
                    _ => None,
                }
            }
        }
    }
}

set_status_codes! {
    Continue = (100, "Continue");
    SwitchingProtocols = (101, "Switching Protocols");
    Processing = (102, "Processing");

    Ok = (200, "OK");
    Created = (201, "Created");
    Accepted = (202, "Accepted");
    NonAuthoritativeInformation = (203, "Non Authoritative Information");
    NoContent = (204, "No Content");
    ResetContent = (205, "Reset Content");
    PartialContent = (206, "Partial Content");
    MultiStatus = (207, "Multi-Status");

    MultipleChoices = (300, "Multiple Choices");
    MovedPermanently = (301, "Moved Permanently");
    Found = (302, "Found");
    SeeOther = (303, "See Other");
    NotModified = (304, "Not Modified");
    TemporaryRedirect = (307, "Temporary Redirect");
    PermanentRedirect = (308, "Permanent Redirect");

    BadRequest = (400, "Bad Request");
    Unauthorized = (401, "Unauthorized");
    PaymentRequired = (402, "Payment Required");
    Forbidden = (403, "Forbidden");
    NotFound = (404, "Not Found");
    MethodNotAllowed = (405, "Method Not Allowed");
    NotAcceptable = (406, "Not Acceptable");
    RequestTimeout = (408, "Request Timeout");
    Conflict = (409, "Conflict");
    Gone = (410, "Gone");
    LengthRequired = (411, "Length Required");
    PreconditionFailed = (412, "Precondition Failed");
    PayloadTooLarge = (413, "Payload Too Large");
    UriTooLong = (414, "URI Too Long");
    UnsupportedMediaType = (415, "Unsupported Media Type");
    /// Kept for the teapots.
    ImaTeapot = (418, "I'm a teapot");
    UnprocessableEntity = (422, "Unprocessable Entity");
    TooManyRequests = (429, "Too Many Requests");
    RequestHeaderFieldsTooLarge = (431, "Request Header Fields Too Large");

    InternalServerError = (500, "Internal Server Error");
    NotImplemented = (501, "Not Implemented");
    BadGateway = (502, "Bad Gateway");
    ServiceUnavailable = (503, "Service Unavailable");
    GatewayTimeout = (504, "Gateway Timeout");
    HttpVersionNotSupported = (505, "HTTP Version Not Supported");
}

// HEADER MAP

/// Case-insensitive, multi-valued header bag.
///
/// Names are stored lower-cased and kept sorted, so iteration yields headers
/// by name ascending. Every name maps to an ordered list of values.
///
/// # Examples
/// ```
/// use relay_web::HeaderMap;
///
/// let mut headers = HeaderMap::new();
/// headers.append("Content-Type", "text/plain").unwrap();
///
/// assert_eq!(headers.get("content-type"), Some(&["text/plain".to_string()][..]));
/// assert_eq!(headers.get("CONTENT-TYPE"), headers.get("content-type"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderMap {
    entries: BTreeMap<String, Vec<String>>,
}

impl HeaderMap {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns every value stored under `name`.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.entries
            .get(name.to_ascii_lowercase().as_str())
            .map(Vec::as_slice)
    }

    /// Returns the first value stored under `name`.
    #[inline]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.get(name)?.first().map(String::as_str)
    }

    /// Returns all values of `name` joined by `", "`.
    pub fn line(&self, name: &str) -> Option<String> {
        self.get(name).map(|values| values.join(", "))
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name.to_ascii_lowercase().as_str())
    }

    /// Replaces the values of `name`.
    pub fn set<I, V>(&mut self, name: &str, values: I) -> Result<(), Error>
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let name = Self::checked_name(name)?;
        let values = values
            .into_iter()
            .map(|value| Self::checked_value(value.into()))
            .collect::<Result<Vec<_>, _>>()?;

        self.entries.insert(name, values);
        Ok(())
    }

    /// Appends one value to `name`, keeping any existing values.
    pub fn append<V: Into<String>>(&mut self, name: &str, value: V) -> Result<(), Error> {
        let name = Self::checked_name(name)?;
        let value = Self::checked_value(value.into())?;

        self.entries.entry(name).or_default().push(value);
        Ok(())
    }

    // For names and values produced by the codec itself.
    #[inline]
    pub(crate) fn put(&mut self, name: &str, value: String) {
        self.entries.insert(name.to_string(), vec![value]);
    }

    /// Removes `name` and returns its values in insertion order.
    #[inline]
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.entries.remove(name.to_ascii_lowercase().as_str())
    }

    /// Iterates headers sorted by name.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn checked_name(name: &str) -> Result<String, Error> {
        // token = 1*tchar, RFC 9110 section 5.6.2
        let valid = !name.is_empty()
            && name.bytes().all(|byte| {
                byte.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&byte)
            });

        match valid {
            true => Ok(name.to_ascii_lowercase()),
            false => Err(Error::invalid(format!("invalid header name {name:?}"))),
        }
    }

    fn checked_value(value: String) -> Result<String, Error> {
        match value.bytes().any(|byte| matches!(byte, b'\r' | b'\n' | b'\0')) {
            true => Err(Error::invalid(format!("invalid header value {value:?}"))),
            false => Ok(value),
        }
    }
}

impl<'a> IntoIterator for &'a HeaderMap {
    type Item = (&'a String, &'a Vec<String>);
    type IntoIter = btree_map::Iter<'a, String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
