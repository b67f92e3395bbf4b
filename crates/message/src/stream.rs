//! Byte stream abstraction backing every message body.
//!
//! A [`Stream`] wraps an already-open resource (an in-memory buffer, a file, or any
//! type implementing [`StreamResource`]) and exposes three independent capabilities
//! derived from the fopen-style mode it was opened with:
//!
//! - **readable**: the mode is `r`, or contains `+`
//! - **writable**: the mode is `w`, `a`, `x` or `c`, or contains `+`
//! - **seekable**: reported by the resource itself
//!
//! All operations take `&self`; the resource lives behind a mutex so a body can be
//! shared between message instances through an `Arc<Stream>`. Streams are still meant
//! to have a single active user at a time, the lock only keeps the state consistent.
//!
//! Once a stream is [detached](Stream::detach) or [closed](Stream::close) every
//! capability flag resets to `false`, the size becomes `None`, and all further I/O
//! fails with [`StreamError::Unavailable`].

use crate::error::StreamError;
use bytes::Bytes;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;

/// A resource a [`Stream`] can own.
pub trait StreamResource: Read + Write + Seek + Send {
    /// Total size in bytes, when the resource is able to tell.
    fn size(&self) -> Option<u64> {
        None
    }

    fn is_seekable(&self) -> bool {
        true
    }
}

impl StreamResource for Cursor<Vec<u8>> {
    fn size(&self) -> Option<u64> {
        Some(self.get_ref().len() as u64)
    }
}

impl StreamResource for File {
    fn size(&self) -> Option<u64> {
        self.metadata().map(|metadata| metadata.len()).ok()
    }
}

/// A snapshot of the stream's metadata, see [`Stream::metadata`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMetadata {
    pub mode: String,
    pub seekable: bool,
    pub uri: Option<String>,
    pub eof: bool,
}

pub struct Stream {
    inner: Mutex<Inner>,
}

struct Inner {
    resource: Option<Box<dyn StreamResource>>,
    readable: bool,
    writable: bool,
    seekable: bool,
    size: Option<u64>,
    eof: bool,
    mode: String,
    uri: Option<String>,
}

const MEMORY_MODE: &str = "w+b";
const MEMORY_URI: &str = "memory://temp";

impl Stream {
    /// Creates an empty in-memory stream, readable, writable and seekable.
    pub fn memory() -> Self {
        Self::from_bytes(Vec::new())
    }

    /// Creates an in-memory stream holding `content`, positioned at its start.
    pub fn from_bytes(content: impl Into<Vec<u8>>) -> Self {
        let mode = OpenMode { access: Access::Write, plus: true };
        Self::with_mode(Box::new(Cursor::new(content.into())), mode, MEMORY_MODE, Some(MEMORY_URI.to_owned()))
    }

    /// Opens the file at `path` with an fopen-style `mode` such as `r`, `rb`, `w+` or `a+`.
    pub fn open(path: impl AsRef<Path>, mode: &str) -> Result<Self, StreamError> {
        let path = path.as_ref();
        let open_mode = OpenMode::parse(mode)?;
        let file = open_mode
            .open_options()
            .open(path)
            .map_err(|source| StreamError::Open { path: path.to_path_buf(), source })?;

        Ok(Self::with_mode(Box::new(file), open_mode, mode, Some(path.display().to_string())))
    }

    /// Wraps an already-open resource, deriving the capabilities from `mode`.
    pub fn from_resource<R>(resource: R, mode: &str) -> Result<Self, StreamError>
    where
        R: StreamResource + 'static,
    {
        let open_mode = OpenMode::parse(mode)?;
        Ok(Self::with_mode(Box::new(resource), open_mode, mode, None))
    }

    fn with_mode(resource: Box<dyn StreamResource>, open_mode: OpenMode, mode: &str, uri: Option<String>) -> Self {
        let seekable = resource.is_seekable();
        let inner = Inner {
            resource: Some(resource),
            readable: open_mode.readable(),
            writable: open_mode.writable(),
            seekable,
            size: None,
            eof: false,
            mode: mode.to_owned(),
            uri,
        };
        Self { inner: Mutex::new(inner) }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_readable(&self) -> bool {
        self.lock().readable
    }

    pub fn is_writable(&self) -> bool {
        self.lock().writable
    }

    pub fn is_seekable(&self) -> bool {
        self.lock().seekable
    }

    /// Returns the size in bytes, or `None` once detached or when unknown.
    ///
    /// The value is computed once and cached until the next write.
    pub fn size(&self) -> Option<u64> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let resource = inner.resource.as_ref()?;
        if inner.size.is_none() {
            inner.size = resource.size();
        }
        inner.size
    }

    pub fn tell(&self) -> Result<u64, StreamError> {
        let mut guard = self.lock();
        let resource = guard.resource.as_mut().ok_or(StreamError::Unavailable)?;
        Ok(resource.stream_position()?)
    }

    /// Returns `true` once a read has reached the end of the stream, and always once detached.
    pub fn eof(&self) -> bool {
        let inner = self.lock();
        inner.resource.is_none() || inner.eof
    }

    pub fn seek(&self, position: SeekFrom) -> Result<(), StreamError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let resource = inner.resource.as_mut().ok_or(StreamError::Unavailable)?;
        if !inner.seekable {
            return Err(StreamError::NotSeekable);
        }

        resource.seek(position).map_err(|source| StreamError::Seek { position, source })?;
        inner.eof = false;
        Ok(())
    }

    pub fn rewind(&self) -> Result<(), StreamError> {
        self.seek(SeekFrom::Start(0))
    }

    /// Writes `data` and returns the number of bytes written.
    ///
    /// Writing to a stream that is not writable is a no-op returning `0`, callers are
    /// expected to consult [`is_writable`](Self::is_writable) themselves.
    pub fn write(&self, data: &[u8]) -> Result<usize, StreamError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let resource = inner.resource.as_mut().ok_or(StreamError::Unavailable)?;

        let mut written = 0;
        if inner.writable {
            resource.write_all(data)?;
            written = data.len();
        }

        inner.size = None;
        Ok(written)
    }

    /// Reads up to `len` bytes from the current position.
    ///
    /// A stream that is not readable yields no bytes.
    pub fn read(&self, len: usize) -> Result<Bytes, StreamError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let resource = inner.resource.as_mut().ok_or(StreamError::Unavailable)?;
        if !inner.readable || len == 0 {
            return Ok(Bytes::new());
        }

        let mut buf = Vec::with_capacity(len.min(8 * 1024));
        (&mut **resource).take(len as u64).read_to_end(&mut buf)?;
        inner.eof = buf.len() < len;
        Ok(Bytes::from(buf))
    }

    /// Reads everything from the current position to the end.
    pub fn contents(&self) -> Result<Bytes, StreamError> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        let resource = inner.resource.as_mut().ok_or(StreamError::Unavailable)?;
        if !inner.readable {
            return Ok(Bytes::new());
        }

        let mut buf = Vec::new();
        resource.read_to_end(&mut buf)?;
        inner.eof = true;
        Ok(Bytes::from(buf))
    }

    /// Rewinds when seekable, then reads the whole stream.
    pub fn read_all(&self) -> Result<Bytes, StreamError> {
        if self.is_seekable() {
            self.rewind()?;
        }
        self.contents()
    }

    pub fn metadata(&self) -> Option<StreamMetadata> {
        let inner = self.lock();
        inner.resource.as_ref()?;
        Some(StreamMetadata { mode: inner.mode.clone(), seekable: inner.seekable, uri: inner.uri.clone(), eof: inner.eof })
    }

    /// Looks up a single metadata entry by key: `mode`, `seekable`, `uri` or `eof`.
    pub fn metadata_value(&self, key: &str) -> Option<String> {
        let metadata = self.metadata()?;
        match key {
            "mode" => Some(metadata.mode),
            "seekable" => Some(metadata.seekable.to_string()),
            "uri" => metadata.uri,
            "eof" => Some(metadata.eof.to_string()),
            _ => None,
        }
    }

    /// Releases the underlying resource. The stream is unusable afterwards.
    pub fn detach(&self) -> Option<Box<dyn StreamResource>> {
        let mut inner = self.lock();
        let resource = inner.resource.take()?;
        inner.readable = false;
        inner.writable = false;
        inner.seekable = false;
        inner.size = None;
        Some(resource)
    }

    /// Flushes and drops the underlying resource.
    pub fn close(&self) {
        if let Some(mut resource) = self.detach()
            && let Err(e) = resource.flush()
        {
            warn!(cause = %e, "failed to flush stream on close");
        }
    }
}

impl Default for Stream {
    fn default() -> Self {
        Self::memory()
    }
}

impl From<Vec<u8>> for Stream {
    fn from(value: Vec<u8>) -> Self {
        Self::from_bytes(value)
    }
}

impl From<Bytes> for Stream {
    fn from(value: Bytes) -> Self {
        Self::from_bytes(value)
    }
}

impl From<&str> for Stream {
    fn from(value: &str) -> Self {
        Self::from_bytes(value.as_bytes())
    }
}

impl From<String> for Stream {
    fn from(value: String) -> Self {
        Self::from_bytes(value)
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("Stream")
            .field("attached", &inner.resource.is_some())
            .field("mode", &inner.mode)
            .field("readable", &inner.readable)
            .field("writable", &inner.writable)
            .field("seekable", &inner.seekable)
            .field("uri", &inner.uri)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Access {
    Read,
    Write,
    Append,
    CreateNew,
    Create,
}

/// An fopen-style mode: one of `r`, `w`, `a`, `x`, `c`, an optional `b`/`t` flag and an optional `+`.
#[derive(Debug, Copy, Clone)]
struct OpenMode {
    access: Access,
    plus: bool,
}

impl OpenMode {
    fn parse(mode: &str) -> Result<Self, StreamError> {
        let mut chars = mode.chars();
        let access = match chars.next() {
            Some('r') => Access::Read,
            Some('w') => Access::Write,
            Some('a') => Access::Append,
            Some('x') => Access::CreateNew,
            Some('c') => Access::Create,
            _ => return Err(StreamError::invalid_mode(mode)),
        };

        let rest = chars.as_str();
        let rest = rest.strip_prefix(['b', 't']).unwrap_or(rest);
        let plus = match rest {
            "" => false,
            "+" => true,
            _ => return Err(StreamError::invalid_mode(mode)),
        };

        Ok(Self { access, plus })
    }

    fn readable(self) -> bool {
        self.plus || self.access == Access::Read
    }

    fn writable(self) -> bool {
        self.plus || self.access != Access::Read
    }

    fn open_options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        options.read(self.readable());
        match self.access {
            Access::Read => options.write(self.plus),
            Access::Write => options.write(true).create(true).truncate(true),
            Access::Append => options.append(true).create(true),
            Access::CreateNew => options.write(true).create_new(true),
            Access::Create => options.write(true).create(true),
        };
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A resource that refuses to seek, like a pipe.
    struct Pipe(Cursor<Vec<u8>>);

    impl Read for Pipe {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl Write for Pipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Seek for Pipe {
        fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
            Err(io::Error::new(io::ErrorKind::Unsupported, "pipe"))
        }
    }

    impl StreamResource for Pipe {
        fn is_seekable(&self) -> bool {
            false
        }
    }

    #[test]
    fn memory_stream_read_write() {
        let stream = Stream::memory();
        assert!(stream.is_readable());
        assert!(stream.is_writable());
        assert!(stream.is_seekable());

        assert_eq!(stream.write(b"hello world").unwrap(), 11);
        assert_eq!(stream.tell().unwrap(), 11);

        stream.rewind().unwrap();
        assert_eq!(stream.read(5).unwrap(), Bytes::from_static(b"hello"));
        assert!(!stream.eof());
        assert_eq!(stream.contents().unwrap(), Bytes::from_static(b" world"));
        assert!(stream.eof());
    }

    #[test]
    fn from_bytes_starts_at_the_beginning() {
        let stream = Stream::from("e04su3su;6");
        assert_eq!(stream.tell().unwrap(), 0);
        assert_eq!(stream.contents().unwrap(), Bytes::from_static(b"e04su3su;6"));
        assert_eq!(stream.size(), Some(10));
    }

    #[test]
    fn read_past_end_sets_eof() {
        let stream = Stream::from("abc");
        assert_eq!(stream.read(10).unwrap(), Bytes::from_static(b"abc"));
        assert!(stream.eof());

        stream.seek(SeekFrom::Start(1)).unwrap();
        assert!(!stream.eof());
        assert_eq!(stream.read(1).unwrap(), Bytes::from_static(b"b"));
    }

    #[test]
    fn size_is_invalidated_by_write() {
        let stream = Stream::from("1234");
        assert_eq!(stream.size(), Some(4));

        stream.seek(SeekFrom::End(0)).unwrap();
        stream.write(b"5678").unwrap();
        assert_eq!(stream.size(), Some(8));
    }

    #[test]
    fn read_all_rewinds_first() {
        let stream = Stream::from("rewind me");
        stream.read(6).unwrap();
        assert_eq!(stream.read_all().unwrap(), Bytes::from_static(b"rewind me"));
    }

    #[test]
    fn modes_drive_capabilities() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.txt");
        std::fs::write(&path, b"sample").unwrap();

        let read_only = Stream::open(&path, "rb").unwrap();
        assert!(read_only.is_readable());
        assert!(!read_only.is_writable());
        assert_eq!(read_only.write(b"ignored").unwrap(), 0);
        assert_eq!(read_only.contents().unwrap(), Bytes::from_static(b"sample"));

        let read_write = Stream::open(&path, "r+").unwrap();
        assert!(read_write.is_readable());
        assert!(read_write.is_writable());
        assert_eq!(read_write.metadata_value("mode").as_deref(), Some("r+"));
        assert_eq!(read_write.metadata_value("uri"), Some(path.display().to_string()));

        let append = Stream::open(&path, "a").unwrap();
        assert!(!append.is_readable());
        assert!(append.is_writable());
        assert_eq!(append.write(b"!").unwrap(), 1);
        assert_eq!(append.read(3).unwrap(), Bytes::new());
        assert_eq!(std::fs::read(&path).unwrap(), b"sample!");
    }

    #[test]
    fn invalid_modes_are_rejected() {
        for mode in ["", "z", "rw", "r++", "wbt", "+r"] {
            let result = Stream::from_resource(Cursor::new(Vec::new()), mode);
            assert!(matches!(result, Err(StreamError::InvalidMode { .. })), "mode {mode:?}");
        }
    }

    #[test]
    fn open_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = Stream::open(dir.path().join("missing.txt"), "r");
        assert!(matches!(result, Err(StreamError::Open { .. })));
    }

    #[test]
    fn seek_errors() {
        let pipe = Stream::from_resource(Pipe(Cursor::new(Vec::new())), "r+").unwrap();
        assert!(!pipe.is_seekable());
        assert!(matches!(pipe.seek(SeekFrom::Start(0)), Err(StreamError::NotSeekable)));

        let stream = Stream::memory();
        assert!(matches!(stream.seek(SeekFrom::Current(-1)), Err(StreamError::Seek { .. })));
    }

    #[test]
    fn detach_releases_the_resource() {
        let stream = Stream::from("detach");
        let resource = stream.detach();
        assert!(resource.is_some());

        assert_eq!(stream.size(), None);
        assert!(!stream.is_readable());
        assert!(!stream.is_writable());
        assert!(!stream.is_seekable());
        assert!(stream.eof());
        assert_eq!(stream.metadata(), None);
        assert!(stream.detach().is_none());

        assert!(matches!(stream.read(1), Err(StreamError::Unavailable)));
        assert!(matches!(stream.write(b"x"), Err(StreamError::Unavailable)));
        assert!(matches!(stream.seek(SeekFrom::Start(0)), Err(StreamError::Unavailable)));
        assert!(matches!(stream.tell(), Err(StreamError::Unavailable)));
        assert!(matches!(stream.contents(), Err(StreamError::Unavailable)));
    }

    #[test]
    fn close_behaves_like_detach() {
        let stream = Stream::from("close");
        stream.close();
        assert_eq!(stream.size(), None);
        assert!(matches!(stream.read(1), Err(StreamError::Unavailable)));
    }
}
