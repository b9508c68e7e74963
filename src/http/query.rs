//! URL-encoded parameter decoder with bracket notation support.
//!
//! Used for the request target's query component, the `cookie` header and
//! `application/x-www-form-urlencoded` bodies.

use memchr::memchr;
use serde_json::{Map, Value};
use std::{error, fmt};

/// Decoded parameters. Scalar values are [`Value::String`], bracketed names
/// produce nested arrays and objects.
pub type Params = Map<String, Value>;

/// Parser for `key=value&...` strings.
///
/// Names and values are percent-decoded (`+` is a space). A name may carry
/// bracket segments which build nested collections:
///
/// | Input            | Result                         |
/// |------------------|--------------------------------|
/// | `a=1`            | `{"a": "1"}`                   |
/// | `a[]=1&a[]=2`    | `{"a": ["1", "2"]}`            |
/// | `u[name]=x`      | `{"u": {"name": "x"}}`         |
/// | `m[x][]=1`       | `{"m": {"x": ["1"]}}`          |
/// | `flag`           | `{"flag": ""}`                 |
///
/// Later occurrences of a scalar name overwrite earlier ones.
///
/// # Examples
/// ```rust
/// use relay_web::query::Query;
///
/// let params = Query::parse(b"?name=john%20doe&tags[]=a&tags[]=b", 10).unwrap();
///
/// assert_eq!(params["name"], "john doe");
/// assert_eq!(params["tags"], serde_json::json!(["a", "b"]));
///
/// // Handle limits
/// let result = Query::parse(b"a=1&b=2", 1);
/// assert!(result.is_err()); // Exceeds limit of 1 parameter
/// ```
pub struct Query;

impl Query {
    /// Parses a URL-encoded string into a new collection.
    ///
    /// # Arguments
    /// - `query`: Raw bytes of the string
    ///   (handles optional leading `?` automatically, so `?a=1` and `a=1` are equivalent)
    /// - `limit`: Maximum number of parameters to parse
    #[inline]
    pub fn parse(query: &[u8], limit: usize) -> Result<Params, Error> {
        let mut result = Params::new();
        Self::parse_into(&mut result, query, limit)?;
        Ok(result)
    }

    /// Parses a URL-encoded string into an existing collection.
    ///
    /// Parameters are merged into `result`; the limit counts only the
    /// pairs of this call.
    pub fn parse_into(result: &mut Params, query: &[u8], limit: usize) -> Result<(), Error> {
        let data = match query.first() {
            Some(b'?') => &query[1..],
            Some(_) => query,
            None => return Ok(()),
        };

        for (count, (name, value)) in form_urlencoded::parse(data).enumerate() {
            if count >= limit {
                return Err(Error::OverLimit(limit));
            }

            let (base, path) = split_name(&name);
            if base.is_empty() {
                continue;
            }

            let slot = result.entry(base).or_insert(Value::Null);
            assign(slot, &path, value.into_owned());
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Key {
    /// `[]`
    Push,
    /// `[name]`
    Name(String),
}

/// Deepest bracket nesting a name can build.
const MAX_DEPTH: usize = 64;

// `a[b][]` -> ("a", [Name("b"), Push]). A name whose brackets don't close is taken literally.
// Past `MAX_DEPTH` the rest of the name becomes one literal key.
fn split_name(name: &str) -> (String, Vec<Key>) {
    let bytes = name.as_bytes();
    let Some(open) = memchr(b'[', bytes) else {
        return (name.to_string(), Vec::new());
    };
    if open == 0 {
        return (String::new(), Vec::new());
    }

    let mut path = Vec::new();
    let mut start = open;
    while bytes.get(start) == Some(&b'[') {
        if path.len() == MAX_DEPTH - 1 {
            path.push(Key::Name(name[start..].to_string()));
            break;
        }
        let Some(close) = memchr(b']', &bytes[start..]) else {
            return (name.to_string(), Vec::new());
        };

        path.push(match &name[start + 1..start + close] {
            "" => Key::Push,
            key => Key::Name(key.to_string()),
        });
        start += close + 1;
    }

    (name[..open].to_string(), path)
}

fn assign(slot: &mut Value, path: &[Key], value: String) {
    let Some((key, rest)) = path.split_first() else {
        *slot = Value::String(value);
        return;
    };

    if !slot.is_array() && !slot.is_object() {
        *slot = match key {
            Key::Name(name) if list_index(name) != Some(0) => Value::Object(Map::new()),
            _ => Value::Array(Vec::new()),
        };
    }

    // A named key that is not the next list position turns the list into a map.
    let demote = match (&*slot, key) {
        (Value::Array(items), Key::Name(name)) => {
            list_index(name).map_or(true, |index| index > items.len())
        }
        _ => false,
    };
    if demote {
        if let Value::Array(items) = std::mem::take(slot) {
            let map = items
                .into_iter()
                .enumerate()
                .map(|(index, item)| (index.to_string(), item))
                .collect();
            *slot = Value::Object(map);
        }
    }

    match slot {
        Value::Array(items) => {
            let index = match key {
                Key::Name(name) => list_index(name).unwrap_or(items.len()),
                Key::Push => items.len(),
            };
            if index == items.len() {
                items.push(Value::Null);
            }
            assign(&mut items[index], rest, value);
        }
        Value::Object(map) => {
            let name = match key {
                Key::Name(name) => name.clone(),
                Key::Push => next_map_index(map).to_string(),
            };
            assign(map.entry(name).or_insert(Value::Null), rest, value);
        }
        _ => {}
    }
}

fn list_index(name: &str) -> Option<usize> {
    match name.as_bytes() {
        [b'0'] => Some(0),
        [b'1'..=b'9', ..] => crate::http::types::slice_to_usize(name.as_bytes()),
        _ => None,
    }
}

fn next_map_index(map: &Map<String, Value>) -> usize {
    map.keys()
        .filter_map(|key| list_index(key))
        .max()
        .map_or(0, |max| max + 1)
}

/// Error types that can occur during parameter parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The number of parameters exceeded the specified limit.
    ///
    /// # Fields
    /// - `0`: The maximum allowed number of parameters
    OverLimit(usize),
}

impl error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::OverLimit(limit) => {
                write!(f, "Query parameter limit exceeded: limit={}", limit)
            }
        }
    }
}
