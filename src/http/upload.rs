//! Descriptors for files received through `multipart/form-data` bodies.

use crate::errors::Error;
use std::{
    collections::HashMap,
    fmt, fs, io,
    path::{Path, PathBuf},
};

/// Uploaded files keyed by their form field name.
pub type Files = HashMap<String, UploadedFile>;

/// Upload status codes, numbered like the classic CGI upload error table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadError {
    /// The file was received and persisted.
    Ok = 0,
    IniSize = 1,
    FormSize = 2,
    Partial = 3,
    NoFile = 4,
    NoTmpDir = 6,
    /// Writing the temporary file failed.
    CantWrite = 7,
    Extension = 8,
}

impl UploadError {
    #[inline]
    pub const fn code(&self) -> u8 {
        *self as u8
    }

    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            UploadError::Ok => "UPLOAD_ERR_OK",
            UploadError::IniSize => "UPLOAD_ERR_INI_SIZE",
            UploadError::FormSize => "UPLOAD_ERR_FORM_SIZE",
            UploadError::Partial => "UPLOAD_ERR_PARTIAL",
            UploadError::NoFile => "UPLOAD_ERR_NO_FILE",
            UploadError::NoTmpDir => "UPLOAD_ERR_NO_TMP_DIR",
            UploadError::CantWrite => "UPLOAD_ERR_CANT_WRITE",
            UploadError::Extension => "UPLOAD_ERR_EXTENSION",
        }
    }
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A file segment of a multipart body, persisted to a temporary location.
///
/// The size is the declared (received) length of the segment value. When the
/// temporary file could not be written, [`error`](UploadedFile::error) is
/// [`UploadError::CantWrite`] and the path may not exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    tmp_path: PathBuf,
    size: usize,
    error: UploadError,
    client_filename: String,
    client_media_type: String,
    moved: bool,
}

impl UploadedFile {
    pub fn new(
        tmp_path: PathBuf,
        size: usize,
        error: UploadError,
        client_filename: String,
        client_media_type: String,
    ) -> Self {
        Self {
            tmp_path,
            size,
            error,
            client_filename,
            client_media_type,
            moved: false,
        }
    }

    #[inline]
    pub fn tmp_path(&self) -> &Path {
        &self.tmp_path
    }

    #[inline]
    pub const fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub const fn error(&self) -> UploadError {
        self.error
    }

    /// File name as sent by the client. Never trust it as a path.
    #[inline]
    pub fn client_filename(&self) -> &str {
        &self.client_filename
    }

    #[inline]
    pub fn client_media_type(&self) -> &str {
        &self.client_media_type
    }

    #[inline]
    pub const fn is_moved(&self) -> bool {
        self.moved
    }

    /// Moves the temporary file to `target`.
    ///
    /// Falls back to copy + remove when a rename is impossible (e.g. across
    /// file systems). May be called once, and only for a successful upload.
    pub fn move_to<P: AsRef<Path>>(&mut self, target: P) -> Result<(), Error> {
        if self.error != UploadError::Ok {
            return Err(Error::invalid(format!(
                "cannot move a failed upload ({})",
                self.error
            )));
        }
        if self.moved {
            return Err(Error::invalid("upload has already been moved"));
        }

        let target = target.as_ref();
        if let Err(err) = fs::rename(&self.tmp_path, target) {
            if err.kind() == io::ErrorKind::NotFound {
                return Err(err.into());
            }
            fs::copy(&self.tmp_path, target)?;
            fs::remove_file(&self.tmp_path)?;
        }

        self.tmp_path = target.to_path_buf();
        self.moved = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes() {
        #[rustfmt::skip]
        let cases = [
            (UploadError::Ok,        0, "UPLOAD_ERR_OK"),
            (UploadError::NoTmpDir,  6, "UPLOAD_ERR_NO_TMP_DIR"),
            (UploadError::CantWrite, 7, "UPLOAD_ERR_CANT_WRITE"),
        ];

        for (error, code, name) in cases {
            assert_eq!(error.code(), code);
            assert_eq!(error.to_string(), name);
        }
    }

    #[test]
    fn move_once() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("upload_src");
        fs::write(&source, b"payload").unwrap();

        let mut file = UploadedFile::new(
            source.clone(),
            7,
            UploadError::Ok,
            "photo.png".into(),
            "image/png".into(),
        );

        let target = dir.path().join("photo.png");
        file.move_to(&target).unwrap();

        assert!(file.is_moved());
        assert!(!source.exists());
        assert_eq!(file.tmp_path(), target.as_path());
        assert_eq!(fs::read(&target).unwrap(), b"payload");

        let again = file.move_to(dir.path().join("other.png"));
        assert!(matches!(again, Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn failed_upload_cannot_move() {
        let mut file = UploadedFile::new(
            PathBuf::from("/nonexistent/upload"),
            3,
            UploadError::CantWrite,
            "a.txt".into(),
            "text/plain".into(),
        );

        assert!(matches!(file.move_to("/tmp/a.txt"), Err(Error::InvalidArgument(_))));
        assert!(!file.is_moved());
    }
}
