//! Uploaded files and the conversion of environment file descriptors into them.
//!
//! An [`UploadedFile`] is backed either by a file on disk (the temporary file the hosting
//! server wrote) or by a [`Stream`], never both. It can be [moved](UploadedFile::move_to)
//! exactly once; afterwards its stream is no longer available.

mod tree;

pub use tree::{FileSpec, FileSpecNode, FileSpecTree, UploadedFileNode, UploadedFiles};
pub use tree::{convert_file_specs, parse_uploaded_files};

use crate::error::UploadError;
use crate::stream::Stream;
use crate::utils::ensure;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// How the hosting environment delivers uploaded files, which decides how they are moved.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HostingMode {
    /// Command-line or embedded usage: files are moved with a plain rename.
    Cli,
    /// A real server: only files flagged as genuine uploads may be moved.
    #[default]
    Server,
}

/// The outcome of an upload as reported by the hosting server.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UploadErrorCode {
    #[default]
    Ok,
    IniSize,
    FormSize,
    Partial,
    NoFile,
    NoTmpDir,
    CantWrite,
    Extension,
    /// A code the server reported that none of the above covers.
    Unknown(i64),
}

impl UploadErrorCode {
    /// Maps any reported code, keeping the ones outside the known set as [`Self::Unknown`].
    pub fn from_code(code: i64) -> Self {
        Self::try_from(code).unwrap_or(Self::Unknown(code))
    }

    pub fn code(self) -> i64 {
        match self {
            Self::Ok => 0,
            Self::IniSize => 1,
            Self::FormSize => 2,
            Self::Partial => 3,
            Self::NoFile => 4,
            Self::NoTmpDir => 6,
            Self::CantWrite => 7,
            Self::Extension => 8,
            Self::Unknown(code) => code,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            Self::Ok => "There is no error, the file uploaded with success.",
            Self::IniSize => "The uploaded file exceeds the upload_max_filesize directive in php.ini",
            Self::FormSize => "The uploaded file exceeds the MAX_FILE_SIZE directive that was specified in the HTML form.",
            Self::Partial => "The uploaded file was only partially uploaded.",
            Self::NoFile => "No file was uploaded.",
            Self::NoTmpDir => "Missing a temporary folder.",
            Self::CantWrite => "Failed to write file to disk.",
            Self::Extension => "File upload stopped by extension.",
            Self::Unknown(_) => "Unknown upload error.",
        }
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl TryFrom<i64> for UploadErrorCode {
    type Error = i64;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Ok),
            1 => Ok(Self::IniSize),
            2 => Ok(Self::FormSize),
            3 => Ok(Self::Partial),
            4 => Ok(Self::NoFile),
            6 => Ok(Self::NoTmpDir),
            7 => Ok(Self::CantWrite),
            8 => Ok(Self::Extension),
            other => Err(other),
        }
    }
}

impl fmt::Display for UploadErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

#[derive(Debug)]
enum UploadSource {
    File(PathBuf),
    Stream(Arc<Stream>),
}

#[derive(Debug)]
pub struct UploadedFile {
    source: UploadSource,
    client_filename: Option<String>,
    client_media_type: Option<String>,
    size: Option<u64>,
    error: UploadErrorCode,
    hosting: HostingMode,
    genuine_upload: bool,
    moved: Mutex<bool>,
}

impl UploadedFile {
    /// Starts building an upload backed by the file at `path`.
    pub fn from_file(path: impl Into<PathBuf>) -> UploadedFileBuilder {
        UploadedFileBuilder::new(UploadSource::File(path.into()))
    }

    /// Starts building an upload backed by `stream`, which must be readable.
    pub fn from_stream(stream: Arc<Stream>) -> Result<UploadedFileBuilder, UploadError> {
        ensure!(stream.is_readable(), UploadError::UnreadableStream);
        let size = stream.size();
        Ok(UploadedFileBuilder { size, ..UploadedFileBuilder::new(UploadSource::Stream(stream)) })
    }

    /// Returns the backing stream.
    ///
    /// Fails once the file has been moved, or when the upload is backed by a file.
    pub fn stream(&self) -> Result<Arc<Stream>, UploadError> {
        ensure!(!self.is_moved(), UploadError::AlreadyMoved);
        match &self.source {
            UploadSource::Stream(stream) => Ok(Arc::clone(stream)),
            UploadSource::File(_) => Err(UploadError::NoStream),
        }
    }

    /// The temporary path of a file-backed upload.
    pub fn path(&self) -> Option<&Path> {
        match &self.source {
            UploadSource::File(path) => Some(path),
            UploadSource::Stream(_) => None,
        }
    }

    /// Moves the upload to `target`. May succeed only once.
    ///
    /// The parent directory of `target` must be writable. Stream-backed uploads write the
    /// stream's remaining contents to `target`.
    pub fn move_to(&self, target: impl AsRef<Path>) -> Result<(), UploadError> {
        let target = target.as_ref();
        let mut moved = self.moved.lock().unwrap_or_else(PoisonError::into_inner);
        ensure!(!*moved, UploadError::AlreadyMoved);

        match &self.source {
            UploadSource::File(path) => {
                ensure!(is_writable_dir(target), UploadError::TargetNotWritable { path: target.to_path_buf() });

                match self.hosting {
                    HostingMode::Cli => fs::rename(path, target)
                        .map_err(|e| UploadError::move_failed(target, format!("could not rename the file: {e}")))?,
                    HostingMode::Server => {
                        ensure!(
                            self.genuine_upload,
                            UploadError::move_failed(target, format!("\"{}\" is invalid uploaded file", path.display()))
                        );
                        move_file(path, target).map_err(|e| UploadError::move_failed(target, e))?;
                    }
                }
                debug!(from = %path.display(), to = %target.display(), "moved uploaded file");
            }
            UploadSource::Stream(stream) => {
                let contents = stream.contents().map_err(|e| UploadError::move_failed(target, e))?;
                fs::write(target, &contents).map_err(|e| UploadError::move_failed(target, e))?;
                debug!(to = %target.display(), bytes = contents.len(), "wrote uploaded stream");
            }
        }

        *moved = true;
        Ok(())
    }

    pub fn is_moved(&self) -> bool {
        *self.moved.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn error(&self) -> UploadErrorCode {
        self.error
    }

    pub fn client_filename(&self) -> Option<&str> {
        self.client_filename.as_deref()
    }

    pub fn client_media_type(&self) -> Option<&str> {
        self.client_media_type.as_deref()
    }
}

fn is_writable_dir(target: &Path) -> bool {
    let parent = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::metadata(parent).is_ok_and(|metadata| metadata.is_dir() && !metadata.permissions().readonly())
}

/// Renames `from` to `to`, copying then removing when the rename crosses filesystems.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        result => result,
    }
}

#[derive(Debug)]
pub struct UploadedFileBuilder {
    source: UploadSource,
    client_filename: Option<String>,
    client_media_type: Option<String>,
    size: Option<u64>,
    error: UploadErrorCode,
    hosting: HostingMode,
    genuine_upload: bool,
}

impl UploadedFileBuilder {
    fn new(source: UploadSource) -> Self {
        Self {
            source,
            client_filename: None,
            client_media_type: None,
            size: None,
            error: UploadErrorCode::Ok,
            hosting: HostingMode::default(),
            genuine_upload: false,
        }
    }

    pub fn client_filename(mut self, name: impl Into<String>) -> Self {
        self.client_filename = Some(name.into());
        self
    }

    pub fn client_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.client_media_type = Some(media_type.into());
        self
    }

    pub fn size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn error(mut self, error: UploadErrorCode) -> Self {
        self.error = error;
        self
    }

    pub fn hosting(mut self, hosting: HostingMode) -> Self {
        self.hosting = hosting;
        self
    }

    /// Flags the source file as written by the hosting server for this request.
    ///
    /// In [`HostingMode::Server`] only flagged files can be moved.
    pub fn genuine_upload(mut self, genuine: bool) -> Self {
        self.genuine_upload = genuine;
        self
    }

    pub fn build(self) -> UploadedFile {
        UploadedFile {
            source: self.source,
            client_filename: self.client_filename,
            client_media_type: self.client_media_type,
            size: self.size,
            error: self.error,
            hosting: self.hosting,
            genuine_upload: self.genuine_upload,
            moved: Mutex::new(false),
        }
    }
}
