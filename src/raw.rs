//! The serialization boundary.
//!
//! Collections do not depend on any serialization framework. They only need
//! two capabilities, writing a raw buffer ([`RawWrite`](self::RawWrite)) and
//! reading it back ([`RawRead`](self::RawRead)), which the caller injects.
//! Each buffer is framed as a little-endian `u64` length followed by the
//! bytes, so a source returns exactly the buffers the sink was given, in
//! order.
//!
//! Provided implementations are `Vec<u8>` (sink), [`SliceReader`] (source) and
//! [`SpillFile`], a memory-mapped temporary file that is both.

use std::env;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use memmap2::MmapMut;
use uuid::Uuid;

use crate::value::{DecodeError, SizedValue, Value};

const FRAME_HEADER: usize = 8;

/// A sink of raw buffers.
pub trait RawWrite {
    /// Writes one buffer.
    fn write_raw_buffer(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// A source of raw buffers produced by a [`RawWrite`](self::RawWrite).
pub trait RawRead {
    /// Reads the next buffer.
    ///
    /// # Errors
    ///
    /// Returns an error of kind `InvalidData` when the source is exhausted or
    /// malformed, or any I/O error encountered.
    fn read_raw_buffer(&mut self) -> io::Result<Vec<u8>>;
}

/// A collection that can cross the serialization boundary.
///
/// Reading follows the construct-then-read lifecycle: the collection is
/// created with its settings first and then its contents are replaced by what
/// the source holds.
pub trait Persist {
    /// Writes the collection into the sink.
    fn write_to<W: RawWrite>(&self, sink: &mut W) -> io::Result<()>;

    /// Replaces the contents of the collection by those read from the source.
    fn read_from<R: RawRead>(&mut self, source: &mut R) -> io::Result<()>;
}

impl RawWrite for Vec<u8> {
    fn write_raw_buffer(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
        self.extend_from_slice(bytes);
        Ok(())
    }
}

impl<W: RawWrite + ?Sized> RawWrite for &mut W {
    fn write_raw_buffer(&mut self, bytes: &[u8]) -> io::Result<()> {
        (**self).write_raw_buffer(bytes)
    }
}

impl<R: RawRead + ?Sized> RawRead for &mut R {
    fn read_raw_buffer(&mut self) -> io::Result<Vec<u8>> {
        (**self).read_raw_buffer()
    }
}

/// Reads framed buffers from a byte slice.
///
/// # Examples
///
/// ```
/// use scalaria::raw::{RawRead, RawWrite, SliceReader};
///
/// let mut bytes = Vec::new();
/// bytes.write_raw_buffer(b"hello").unwrap();
///
/// let mut reader = SliceReader::new(&bytes);
/// assert_eq!(reader.read_raw_buffer().unwrap(), b"hello");
/// assert!(reader.is_finished());
/// ```
pub struct SliceReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> SliceReader<'a> {
    /// Creates a reader starting at the beginning of `bytes`.
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    /// Returns `true` if all buffers were read.
    pub fn is_finished(&self) -> bool {
        self.position == self.bytes.len()
    }
}

impl RawRead for SliceReader<'_> {
    fn read_raw_buffer(&mut self) -> io::Result<Vec<u8>> {
        Ok(take_frame(self.bytes, &mut self.position)?.to_vec())
    }
}

fn take_frame<'a>(bytes: &'a [u8], position: &mut usize) -> Result<&'a [u8], DecodeError> {
    let header = take(bytes, *position, FRAME_HEADER)?;
    let len = u64::from_bytes(header)? as usize;
    let frame = take(bytes, *position + FRAME_HEADER, len)?;
    *position += FRAME_HEADER + len;
    Ok(frame)
}

fn take(bytes: &[u8], start: usize, len: usize) -> Result<&[u8], DecodeError> {
    let available = bytes.len().saturating_sub(start);
    if len > available {
        return Err(DecodeError::Truncated {
            needed: len,
            available,
        });
    }

    Ok(&bytes[start..start + len])
}

// The mapping of an empty file fails on some platforms, so the file always
// has at least this many bytes.
const SPILL_INITIAL_LEN: u64 = 4096;

/// A temporary file, mapped into memory, that collections can be spilled to
/// and read back from.
///
/// Buffers are appended at the end of the written data. Reading starts at
/// the beginning and proceeds independently of writing; use
/// [`rewind`](self::SpillFile::rewind) to read again. The file is deleted when
/// the value is dropped.
///
/// # Examples
///
/// ```
/// use scalaria::raw::{RawRead, RawWrite, SpillFile};
///
/// let mut file = SpillFile::create().unwrap();
/// file.write_raw_buffer(&[1, 2, 3]).unwrap();
/// assert_eq!(file.read_raw_buffer().unwrap(), vec![1, 2, 3]);
/// ```
pub struct SpillFile {
    path: PathBuf,
    file: File,
    map: MmapMut,
    tail: usize,
    position: usize,
}

impl SpillFile {
    /// Creates a new file in the temporary directory of the system.
    pub fn create() -> io::Result<Self> {
        Self::create_at(temp_path())
    }

    /// Creates a new file at given path. The path must not exist.
    pub fn create_at(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.set_len(SPILL_INITIAL_LEN)?;

        // SAFETY: The file was just created by us under a unique name and is
        // not shared, so no one else modifies it while it is mapped.
        let map = unsafe { MmapMut::map_mut(&file)? };

        tracing::debug!(path = %path.display(), "created spill file");

        Ok(Self {
            path,
            file,
            map,
            tail: 0,
            position: 0,
        })
    }

    /// Returns the path of the underlying file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the number of bytes written so far.
    pub fn byte_len(&self) -> usize {
        self.tail
    }

    /// Moves the reading position back to the first buffer.
    pub fn rewind(&mut self) {
        self.position = 0;
    }

    /// Flushes the written buffers to the file.
    pub fn flush(&self) -> io::Result<()> {
        self.map.flush()
    }

    fn reserve(&mut self, additional: usize) -> io::Result<()> {
        let required = self.tail + additional;
        if required <= self.map.len() {
            return Ok(());
        }

        let new_len = std::cmp::max(2 * self.map.len(), required);
        self.map.flush()?;
        self.file.set_len(new_len as u64)?;

        // SAFETY: See `create_at`. The old mapping is replaced, so no slice
        // into it outlives the remapping.
        self.map = unsafe { MmapMut::map_mut(&self.file)? };

        tracing::debug!(path = %self.path.display(), len = new_len, "grew spill file");
        Ok(())
    }
}

impl RawWrite for SpillFile {
    fn write_raw_buffer(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.reserve(FRAME_HEADER + bytes.len())?;

        let start = self.tail;
        self.map[start..start + FRAME_HEADER].copy_from_slice(&(bytes.len() as u64).to_le_bytes());
        self.map[start + FRAME_HEADER..start + FRAME_HEADER + bytes.len()].copy_from_slice(bytes);
        self.tail += FRAME_HEADER + bytes.len();

        Ok(())
    }
}

impl RawRead for SpillFile {
    fn read_raw_buffer(&mut self) -> io::Result<Vec<u8>> {
        Ok(take_frame(&self.map[..self.tail], &mut self.position)?.to_vec())
    }
}

impl Drop for SpillFile {
    fn drop(&mut self) {
        // Nothing sensible can be done when removing the file fails.
        let _ = fs::remove_file(&self.path);
    }
}

/// Returns a unique path in the temporary directory.
pub fn temp_path() -> PathBuf {
    let name = format!("{}", Uuid::new_v4());
    let mut path = env::temp_dir().join(name);
    path.set_extension("scalaria");
    path
}

pub(crate) fn write_u8<W: RawWrite>(sink: &mut W, value: u8) -> io::Result<()> {
    sink.write_raw_buffer(&[value])
}

pub(crate) fn read_u8<R: RawRead>(source: &mut R) -> io::Result<u8> {
    let bytes = source.read_raw_buffer()?;
    Ok(u8::from_bytes(&bytes)?)
}

pub(crate) fn write_bool<W: RawWrite>(sink: &mut W, value: bool) -> io::Result<()> {
    write_u8(sink, value as u8)
}

pub(crate) fn read_bool<R: RawRead>(source: &mut R) -> io::Result<bool> {
    let bytes = source.read_raw_buffer()?;
    Ok(bool::from_bytes(&bytes)?)
}

pub(crate) fn write_usize<W: RawWrite>(sink: &mut W, value: usize) -> io::Result<()> {
    sink.write_raw_buffer(&(value as u64).to_le_bytes())
}

pub(crate) fn read_usize<R: RawRead>(source: &mut R) -> io::Result<usize> {
    let bytes = source.read_raw_buffer()?;
    Ok(u64::from_bytes(&bytes)? as usize)
}

/// Writes fixed-size values back-to-back as a single buffer.
pub(crate) fn write_sized<W: RawWrite, T: SizedValue>(sink: &mut W, values: &[T]) -> io::Result<()> {
    let mut buf = Vec::with_capacity(values.len() * T::size());
    for value in values {
        value.to_bytes(&mut buf);
    }
    sink.write_raw_buffer(&buf)
}

pub(crate) fn read_sized<R: RawRead, T: SizedValue>(source: &mut R) -> io::Result<Vec<T>> {
    let bytes = source.read_raw_buffer()?;
    let size = T::size();

    if size == 0 || bytes.len() % size != 0 {
        return Err(DecodeError::Inconsistent("buffer length is not a multiple of value size").into());
    }

    bytes
        .chunks_exact(size)
        .map(|chunk| T::from_bytes(chunk).map_err(io::Error::from))
        .collect()
}

/// Writes values of arbitrary size as a single buffer, each prefixed by its
/// length.
pub(crate) fn write_unsized<'a, W, T, I>(sink: &mut W, values: I) -> io::Result<()>
where
    W: RawWrite,
    T: Value + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut buf = Vec::new();
    let mut item = Vec::new();

    for value in values {
        item.clear();
        value.to_bytes(&mut item);
        buf.extend_from_slice(&(item.len() as u32).to_le_bytes());
        buf.extend_from_slice(&item);
    }

    sink.write_raw_buffer(&buf)
}

pub(crate) fn read_unsized<R: RawRead, T: Value>(source: &mut R) -> io::Result<Vec<T>> {
    let bytes = source.read_raw_buffer()?;
    let mut values = Vec::new();
    let mut position = 0;

    while position < bytes.len() {
        let header = take(&bytes, position, 4)?;
        let len = u32::from_bytes(header)? as usize;
        values.push(T::from_bytes(take(&bytes, position + 4, len)?)?);
        position += 4 + len;
    }

    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_are_returned_in_order() {
        let mut bytes = Vec::new();
        bytes.write_raw_buffer(b"foo").unwrap();
        bytes.write_raw_buffer(b"").unwrap();
        bytes.write_raw_buffer(b"bonjour").unwrap();

        let mut reader = SliceReader::new(&bytes);
        assert_eq!(reader.read_raw_buffer().unwrap(), b"foo");
        assert_eq!(reader.read_raw_buffer().unwrap(), b"");
        assert_eq!(reader.read_raw_buffer().unwrap(), b"bonjour");
        assert!(reader.is_finished());
    }

    #[test]
    fn exhausted_source_is_invalid_data() {
        let mut bytes = Vec::new();
        bytes.write_raw_buffer(b"foo").unwrap();
        bytes.truncate(bytes.len() - 1);

        let mut reader = SliceReader::new(&bytes);
        let err = reader.read_raw_buffer().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let mut empty = SliceReader::new(&[]);
        assert_eq!(
            empty.read_raw_buffer().unwrap_err().kind(),
            io::ErrorKind::InvalidData
        );
    }

    #[test]
    fn sized_and_unsized_helpers() {
        let mut bytes = Vec::new();
        write_sized(&mut bytes, &[1i32, -2, 3]).unwrap();
        write_unsized(&mut bytes, &["a".to_string(), String::new(), "xyz".to_string()]).unwrap();
        write_usize(&mut bytes, 42).unwrap();
        write_bool(&mut bytes, true).unwrap();

        let mut reader = SliceReader::new(&bytes);
        assert_eq!(read_sized::<_, i32>(&mut reader).unwrap(), vec![1, -2, 3]);
        assert_eq!(
            read_unsized::<_, String>(&mut reader).unwrap(),
            vec!["a".to_string(), String::new(), "xyz".to_string()]
        );
        assert_eq!(read_usize(&mut reader).unwrap(), 42);
        assert!(read_bool(&mut reader).unwrap());
    }

    #[test]
    fn sized_buffer_of_wrong_length() {
        let mut bytes = Vec::new();
        bytes.write_raw_buffer(&[0, 0, 0]).unwrap();

        let mut reader = SliceReader::new(&bytes);
        assert!(read_sized::<_, i32>(&mut reader).is_err());
    }

    #[test]
    fn spill_file_grows_and_reads_back() {
        let mut file = SpillFile::create().unwrap();
        let path = file.path().to_path_buf();
        let big = vec![7u8; 3 * SPILL_INITIAL_LEN as usize];

        file.write_raw_buffer(b"head").unwrap();
        file.write_raw_buffer(&big).unwrap();
        file.flush().unwrap();
        assert_eq!(file.byte_len(), 2 * FRAME_HEADER + 4 + big.len());

        assert_eq!(file.read_raw_buffer().unwrap(), b"head");
        assert_eq!(file.read_raw_buffer().unwrap(), big);
        assert!(file.read_raw_buffer().is_err());

        file.rewind();
        assert_eq!(file.read_raw_buffer().unwrap(), b"head");

        drop(file);
        assert!(!path.exists());
    }
}
