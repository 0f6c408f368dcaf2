use crate::TransferError;

/// An inclusive byte range `[first, last]` resolved against a resource size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub first: u64,
    pub last: u64,
}

impl ByteRange {
    /// Parses a single-range `Range` header value (`bytes=first-[last]`).
    ///
    /// - `Ok(None)`: the header is malformed or uses an unsupported form
    ///   (multiple ranges, suffix ranges, other units); serve the whole resource.
    /// - A missing `last` resolves to `size - 1`; a `last` past the end is
    ///   clamped to `size - 1`.
    /// - `Err(RangeNotSatisfiable)`: `first` lies beyond the resource or
    ///   after `last`.
    pub fn parse(header: &str, size: u64) -> Result<Option<Self>, TransferError> {
        let Some((unit, bounds)) = header.trim().split_once('=') else {
            return Ok(None);
        };
        if !unit.trim().eq_ignore_ascii_case("bytes") || bounds.contains(',') {
            return Ok(None);
        }
        let Some((first, last)) = bounds.trim().split_once('-') else {
            return Ok(None);
        };

        let Ok(first) = first.trim().parse::<u64>() else {
            return Ok(None);
        };
        let last = match last.trim() {
            "" => size.saturating_sub(1),
            raw => match raw.parse::<u64>() {
                Ok(last) => last.min(size.saturating_sub(1)),
                Err(_) => return Ok(None),
            },
        };

        if size == 0 || first >= size || first > last {
            return Err(TransferError::RangeNotSatisfiable { first, last, size });
        }

        Ok(Some(Self { first, last }))
    }

    /// Number of bytes covered by the range.
    pub fn len(&self) -> u64 {
        self.last - self.first + 1
    }

    /// Always `false`: a resolved range covers at least one byte.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `Content-Range` header value for a resource of `size` bytes.
    pub fn content_range(&self, size: u64) -> String {
        format!("bytes {}-{}/{size}", self.first, self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_closed_range() {
        let range = ByteRange::parse("bytes=200-499", 1000).unwrap().unwrap();
        assert_eq!(range, ByteRange { first: 200, last: 499 });
        assert_eq!(range.len(), 300);
        assert_eq!(range.content_range(1000), "bytes 200-499/1000");
    }

    #[test]
    fn open_range_resolves_to_last_byte() {
        let range = ByteRange::parse("bytes=200-", 1000).unwrap().unwrap();
        assert_eq!(range.last, 999);
        assert_eq!(range.len(), 800);
    }

    #[test]
    fn last_past_end_is_clamped() {
        let range = ByteRange::parse("bytes=900-5000", 1000).unwrap().unwrap();
        assert_eq!(range.last, 999);
    }

    #[test]
    fn malformed_headers_are_ignored() {
        for header in ["", "bytes", "items=0-1", "bytes=a-b", "bytes=0-1,4-5", "bytes=-500"] {
            assert!(ByteRange::parse(header, 1000).unwrap().is_none(), "{header}");
        }
    }

    #[test]
    fn start_beyond_size_is_unsatisfiable() {
        let result = ByteRange::parse("bytes=1000-", 1000);
        assert!(matches!(
            result,
            Err(TransferError::RangeNotSatisfiable { first: 1000, size: 1000, .. })
        ));
    }

    #[test]
    fn inverted_range_is_unsatisfiable() {
        assert!(ByteRange::parse("bytes=500-100", 1000).is_err());
    }

    #[test]
    fn single_byte_range() {
        let range = ByteRange::parse("bytes=0-0", 10).unwrap().unwrap();
        assert_eq!(range.len(), 1);
    }
}
