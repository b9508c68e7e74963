//! `multipart/form-data` body splitter.
//!
//! Literal shape of one part:
//! ```text
//! --[BOUNDARY] CRLF
//! [HEADERS] CRLF
//! CRLF
//! [VALUE] CRLF
//! ```
//! and the body ends with `--[BOUNDARY]--`.

use crate::{
    http::upload::{Files, UploadError, UploadedFile},
    log,
    query::Params,
};
use memchr::memmem;
use serde_json::Value;
use std::{
    io::Write,
    path::{Path, PathBuf},
};

pub(crate) struct Multipart<'a> {
    boundary: &'a str,
    upload_dir: &'a Path,
}

impl<'a> Multipart<'a> {
    /// Returns `None` when the content type carries no usable boundary.
    pub(crate) fn new(content_type: &'a str, upload_dir: &'a Path) -> Option<Self> {
        let boundary = parameters(content_type)
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("boundary"))
            .map(|(_, value)| value)
            .filter(|value| !value.is_empty())?;

        Some(Self {
            boundary,
            upload_dir,
        })
    }

    /// Splits `body` into plain fields and persisted files.
    ///
    /// Parts without a `name` are skipped. A part with both a `filename` and
    /// its own `content-type` is a file, everything else is a field whose
    /// value is trimmed.
    pub(crate) fn parse(&self, body: &[u8]) -> (Params, Files) {
        let mut fields = Params::new();
        let mut files = Files::new();

        for part in self.parts(body) {
            let Some((head, value)) = split_part(part) else {
                continue;
            };
            let Ok(head) = simdutf8::basic::from_utf8(head) else {
                log::debug!("multipart part with a non UTF-8 header block skipped");
                continue;
            };

            let mut name = None;
            let mut filename = None;
            let mut media_type = None;

            for line in head.split("\r\n") {
                let Some((key, rest)) = line.split_once(':') else {
                    continue;
                };
                let key = key.trim();

                if key.eq_ignore_ascii_case("content-disposition") {
                    for (param, param_value) in parameters(rest) {
                        match param.to_ascii_lowercase().as_str() {
                            "name" => name = Some(param_value),
                            "filename" => filename = Some(param_value),
                            _ => {}
                        }
                    }
                } else if key.eq_ignore_ascii_case("content-type") {
                    media_type = Some(rest.trim());
                }
            }

            let Some(name) = name else {
                continue;
            };

            match (filename, media_type) {
                (Some(filename), Some(media_type)) => {
                    let file = self.persist(value, filename, media_type);
                    files.insert(name.to_string(), file);
                }
                _ => {
                    let value = String::from_utf8_lossy(value).trim().to_string();
                    fields.insert(name.to_string(), Value::String(value));
                }
            }
        }

        (fields, files)
    }

    // Delimiter lines start the body or follow a CRLF, and go on with CRLF
    // (next part) or `--` (end of body). Any other `--boundary` is data.
    fn parts<'b>(&self, body: &'b [u8]) -> Vec<&'b [u8]> {
        let delimiter = format!("--{}", self.boundary).into_bytes();
        let len = delimiter.len();

        let lines: Vec<(usize, bool)> = memmem::find_iter(body, &delimiter)
            .filter(|&at| at == 0 || body[..at].ends_with(b"\r\n"))
            .filter_map(|at| {
                let rest = &body[at + len..];
                if rest.starts_with(b"\r\n") {
                    Some((at, false))
                } else if rest.starts_with(b"--") {
                    Some((at, true))
                } else {
                    None
                }
            })
            .collect();

        let mut parts = Vec::with_capacity(lines.len());
        for (index, &(start, last)) in lines.iter().enumerate() {
            if last {
                break;
            }

            let from = start + len + 2;
            let part = match lines.get(index + 1) {
                // the CRLF before the next delimiter belongs to it
                Some(&(next, _)) => body.get(from..next - 2).unwrap_or_default(),
                None => {
                    let tail = &body[from..];
                    tail.strip_suffix(b"\r\n").unwrap_or(tail)
                }
            };
            if !part.is_empty() {
                parts.push(part);
            }
        }

        parts
    }

    fn persist(&self, value: &[u8], filename: &str, media_type: &str) -> UploadedFile {
        let (path, error) = match self.write_temp(value) {
            Ok(path) => (path, UploadError::Ok),
            Err(err) => {
                log::warning!(
                    "failed to persist upload {:?} to {}: {}",
                    filename,
                    self.upload_dir.display(),
                    err
                );
                (PathBuf::new(), UploadError::CantWrite)
            }
        };

        UploadedFile::new(
            path,
            value.len(),
            error,
            filename.to_string(),
            media_type.to_string(),
        )
    }

    fn write_temp(&self, value: &[u8]) -> std::io::Result<PathBuf> {
        let mut file = tempfile::Builder::new()
            .prefix("upload_")
            .tempfile_in(self.upload_dir)?;
        file.write_all(value)?;

        let (_, path) = file.keep().map_err(|err| err.error)?;
        Ok(path)
    }
}

// Header block and value are separated by the first empty line.
fn split_part(part: &[u8]) -> Option<(&[u8], &[u8])> {
    let at = memmem::find(part, b"\r\n\r\n")?;
    Some((&part[..at], &part[at + 4..]))
}

// `form-data; name="a"; filename="b"` -> [("name", "a"), ("filename", "b")]
// A `;` inside a quoted value is part of the value.
fn parameters(header: &str) -> Vec<(&str, &str)> {
    let mut params = Vec::new();
    let mut rest = header;

    while !rest.is_empty() {
        let mut quoted = false;
        let end = rest
            .bytes()
            .position(|byte| {
                if byte == b'"' {
                    quoted = !quoted;
                }
                byte == b';' && !quoted
            })
            .unwrap_or(rest.len());

        let (param, tail) = rest.split_at(end);
        rest = tail.get(1..).unwrap_or_default();

        let Some((name, value)) = param.split_once('=') else {
            continue;
        };
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        params.push((name.trim(), value));
    }

    params
}
