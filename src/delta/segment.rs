//! Segment descriptors.

/// One run of document bytes.
///
/// `Source` refers to `start..start + length` of the document's file source.
/// `Memory` refers to the same range of the document's memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataSegment {
    Source { start: u64, length: u64 },
    Memory { start: u64, length: u64 },
}

impl DataSegment {
    pub fn start(&self) -> u64 {
        match *self {
            DataSegment::Source { start, .. } | DataSegment::Memory { start, .. } => start,
        }
    }

    pub fn length(&self) -> u64 {
        match *self {
            DataSegment::Source { length, .. } | DataSegment::Memory { length, .. } => length,
        }
    }

    pub fn end(&self) -> u64 {
        self.start() + self.length()
    }

    pub fn is_source(&self) -> bool {
        matches!(self, DataSegment::Source { .. })
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, DataSegment::Memory { .. })
    }

    /// Same kind and backing position, different length.
    pub fn with_length(&self, length: u64) -> Self {
        match *self {
            DataSegment::Source { start, .. } => DataSegment::Source { start, length },
            DataSegment::Memory { start, .. } => DataSegment::Memory { start, length },
        }
    }

    /// Drops the first `offset` bytes.
    pub fn skip(&self, offset: u64) -> Self {
        debug_assert!(offset <= self.length());
        match *self {
            DataSegment::Source { start, length } => DataSegment::Source {
                start: start + offset,
                length: length - offset,
            },
            DataSegment::Memory { start, length } => DataSegment::Memory {
                start: start + offset,
                length: length - offset,
            },
        }
    }

    /// Splits into `..offset` and `offset..`. Both halves must be non-empty.
    pub fn split(&self, offset: u64) -> (Self, Self) {
        debug_assert!(offset > 0 && offset < self.length());
        (self.with_length(offset), self.skip(offset))
    }

    /// `offset..offset + length` of this segment.
    pub fn slice(&self, offset: u64, length: u64) -> Self {
        self.skip(offset).with_length(length)
    }

    /// True if `next` continues this segment in the same backing store.
    pub fn can_merge(&self, next: &DataSegment) -> bool {
        match (self, next) {
            (DataSegment::Source { .. }, DataSegment::Source { start, .. })
            | (DataSegment::Memory { .. }, DataSegment::Memory { start, .. }) => {
                self.end() == *start
            }
            _ => false,
        }
    }
}
