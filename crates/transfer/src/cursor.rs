use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::TransferError;

/// Positioned binary reader over one seekable handle.
///
/// The cursor owns both the handle and the logical position, and every
/// operation leaves the handle's real offset equal to [`position`](Self::position).
pub struct ByteCursor<R> {
    handle: R,
    position: u64,
}

impl ByteCursor<File> {
    /// Opens `path` for reading with the cursor at offset 0.
    pub fn open(path: &Path) -> Result<Self, TransferError> {
        let file = File::open(path)?;
        Ok(Self::new(file)?)
    }
}

impl<R: Read + Seek> ByteCursor<R> {
    /// Wraps an already opened handle, starting at its current offset.
    pub fn new(mut handle: R) -> io::Result<Self> {
        let position = handle.stream_position()?;
        Ok(Self { handle, position })
    }

    /// Current logical position.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Moves to an absolute offset.
    pub fn set_position(&mut self, position: u64) -> io::Result<()> {
        self.position = self.handle.seek(SeekFrom::Start(position))?;
        Ok(())
    }

    /// Seeks forward by `length` bytes.
    pub fn advance(&mut self, length: u64) -> io::Result<()> {
        let target = self.position.checked_add(length).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot advance {length} bytes from position {}", self.position),
            )
        })?;
        self.set_position(target)
    }

    /// Seeks backward by `length` bytes.
    ///
    /// Moving before offset 0 is a caller error; the position is left
    /// untouched and `InvalidInput` is returned.
    pub fn retreat(&mut self, length: u64) -> io::Result<()> {
        let target = self.position.checked_sub(length).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot retreat {length} bytes from position {}", self.position),
            )
        })?;
        self.set_position(target)
    }

    /// Reads up to `length` bytes.
    ///
    /// The position always advances by `length`, even when fewer bytes were
    /// available. The handle is seeked past the short fall so both stay equal;
    /// callers must not infer the amount read from the position.
    pub fn read_bytes(&mut self, length: usize) -> io::Result<Vec<u8>> {
        let target = self.position.checked_add(length as u64).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("cannot read {length} bytes from position {}", self.position),
            )
        })?;

        let mut buf = Vec::with_capacity(length.min(crate::DEFAULT_CHUNK_SIZE));
        if let Err(e) = self
            .handle
            .by_ref()
            .take(length as u64)
            .read_to_end(&mut buf)
        {
            self.position = self.handle.stream_position()?;
            return Err(e);
        }

        if buf.len() < length {
            self.handle.seek(SeekFrom::Start(target))?;
        }
        self.position = target;
        Ok(buf)
    }

    /// Reads one byte as its unsigned value.
    ///
    /// At end of input returns `UnexpectedEof` without moving.
    pub fn read_byte(&mut self) -> io::Result<u8> {
        let mut byte = [0u8; 1];
        self.handle.read_exact(&mut byte)?;
        self.position += 1;
        Ok(byte[0])
    }

    /// Compares the next byte with `expected` without consuming it.
    pub fn peek_byte_equals(&mut self, expected: u8) -> io::Result<bool> {
        Ok(self.peek()? == Some(expected))
    }

    /// Returns `true` when no further bytes can be read.
    pub fn is_at_end(&mut self) -> io::Result<bool> {
        Ok(self.peek()?.is_none())
    }

    /// The handle's actual offset, as reported by the handle itself.
    pub fn true_offset(&mut self) -> io::Result<u64> {
        self.handle.stream_position()
    }

    /// Releases the handle.
    pub fn close(self) {
        drop(self.handle);
    }

    fn peek(&mut self) -> io::Result<Option<u8>> {
        let mut byte = [0u8; 1];
        let n = self.handle.read(&mut byte)?;
        self.handle.seek(SeekFrom::Start(self.position))?;
        Ok((n == 1).then_some(byte[0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn cursor_over(data: &[u8]) -> ByteCursor<Cursor<Vec<u8>>> {
        ByteCursor::new(Cursor::new(data.to_vec())).unwrap()
    }

    fn assert_in_sync<R: Read + Seek>(cursor: &mut ByteCursor<R>) {
        let real = cursor.true_offset().unwrap();
        assert_eq!(cursor.position(), real);
    }

    #[test]
    fn advance_then_retreat_restores_position() {
        let mut cursor = cursor_over(&[0u8; 64]);
        cursor.set_position(5).unwrap();

        cursor.advance(10).unwrap();
        assert_eq!(cursor.position(), 15);
        assert_in_sync(&mut cursor);

        cursor.retreat(10).unwrap();
        assert_eq!(cursor.position(), 5);
        assert_in_sync(&mut cursor);
    }

    #[test]
    fn retreat_before_start_is_rejected() {
        let mut cursor = cursor_over(b"abc");
        cursor.advance(2).unwrap();

        let err = cursor.retreat(3).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(cursor.position(), 2);
        assert_in_sync(&mut cursor);
    }

    #[test]
    fn read_past_max_offset_is_rejected() {
        let mut cursor = cursor_over(b"abc");
        cursor.set_position(u64::MAX - 1).unwrap();

        let err = cursor.read_bytes(10).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        assert_eq!(cursor.position(), u64::MAX - 1);
        assert_in_sync(&mut cursor);
    }

    #[test]
    fn read_bytes_advances_by_length() {
        let mut cursor = cursor_over(b"0123456789");
        let data = cursor.read_bytes(4).unwrap();
        assert_eq!(&data, b"0123");
        assert_eq!(cursor.position(), 4);
        assert_in_sync(&mut cursor);
    }

    #[test]
    fn short_read_still_advances_by_requested_length() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("short.bin");
        std::fs::write(&path, [7u8; 30]).unwrap();

        let mut cursor = ByteCursor::open(&path).unwrap();
        cursor.set_position(20).unwrap();

        let data = cursor.read_bytes(100).unwrap();
        assert_eq!(data.len(), 10);
        assert_eq!(cursor.position(), 120);
        assert_in_sync(&mut cursor);
        assert!(cursor.is_at_end().unwrap());
    }

    #[test]
    fn read_byte_returns_unsigned_value() {
        let mut cursor = cursor_over(&[0xff, 0x01]);
        assert_eq!(cursor.read_byte().unwrap(), 255);
        assert_eq!(cursor.read_byte().unwrap(), 1);
        assert_eq!(cursor.position(), 2);

        let err = cursor.read_byte().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert_eq!(cursor.position(), 2);
        assert_in_sync(&mut cursor);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut cursor = cursor_over(&[0x00, 0x08]);
        cursor.advance(1).unwrap();

        assert!(cursor.peek_byte_equals(0x08).unwrap());
        assert!(!cursor.peek_byte_equals(0x01).unwrap());
        assert_eq!(cursor.position(), 1);
        assert_in_sync(&mut cursor);

        assert_eq!(cursor.read_byte().unwrap(), 0x08);
        assert!(!cursor.peek_byte_equals(0x08).unwrap());
    }

    #[test]
    fn is_at_end_restores_position() {
        let mut cursor = cursor_over(b"xy");
        assert!(!cursor.is_at_end().unwrap());
        assert_eq!(cursor.position(), 0);
        assert_in_sync(&mut cursor);

        cursor.advance(2).unwrap();
        assert!(cursor.is_at_end().unwrap());
        assert_in_sync(&mut cursor);
    }

    #[test]
    fn open_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        let result = ByteCursor::open(&dir.path().join("missing.bin"));
        assert!(matches!(result, Err(TransferError::Io(_))));
    }

    #[test]
    fn new_starts_at_handle_offset() {
        let mut inner = Cursor::new(b"header:body".to_vec());
        inner.seek(SeekFrom::Start(7)).unwrap();

        let mut cursor = ByteCursor::new(inner).unwrap();
        assert_eq!(cursor.position(), 7);
        assert_eq!(cursor.read_bytes(4).unwrap(), b"body");
        cursor.close();
    }
}
