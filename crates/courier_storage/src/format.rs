//! On-disk layout of a queue file.
//!
//! ```text
//! offset 0            HEADER_LEN
//! ┌──────────────────┬──────────────┬─────────┬──────────────┬─────────┬───
//! │ FileHeader (33)  │ Descriptor   │ payload │ Descriptor   │ payload │ ...
//! └──────────────────┴──────────────┴─────────┴──────────────┴─────────┴───
//! ```
//!
//! All integers are little-endian and the structures are packed. Each
//! descriptor records its own offset and the length of the payload that
//! immediately follows it, so the records form a forward chain starting at
//! `FileHeader::first_offset`.

/// Current file format version.
pub const FORMAT_VERSION: u8 = 1;

/// Size of the encoded [`FileHeader`].
/// version (1) + file_length (8) + element_count (8) + first (8) + last (8)
pub const HEADER_LEN: u64 = 33;

/// Size of the encoded [`ElementDescriptor`].
/// offset (8) + length (8)
pub const DESCRIPTOR_LEN: u64 = 16;

/// The fixed-size header at offset 0 of a queue file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    /// Format version.
    pub version: u8,
    /// File length when the header was written. Informational only.
    pub file_length: u64,
    /// Number of live records.
    pub element_count: u64,
    /// Offset of the oldest record's descriptor.
    pub first_offset: u64,
    /// Offset of the newest record's descriptor.
    pub last_offset: u64,
}

impl Default for FileHeader {
    fn default() -> Self {
        Self::empty()
    }
}

impl FileHeader {
    /// The header of an empty queue: no records, both offsets just past the
    /// header.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            version: FORMAT_VERSION,
            file_length: 0,
            element_count: 0,
            first_offset: HEADER_LEN,
            last_offset: HEADER_LEN,
        }
    }

    /// Creates a header for the current format version.
    #[must_use]
    pub const fn new(element_count: u64, first_offset: u64, last_offset: u64) -> Self {
        Self {
            version: FORMAT_VERSION,
            file_length: 0,
            element_count,
            first_offset,
            last_offset,
        }
    }

    /// Sets the informational file length.
    #[must_use]
    pub const fn with_file_length(mut self, file_length: u64) -> Self {
        self.file_length = file_length;
        self
    }

    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_LEN as usize] {
        let mut buf = [0u8; HEADER_LEN as usize];
        buf[0] = self.version;
        buf[1..9].copy_from_slice(&self.file_length.to_le_bytes());
        buf[9..17].copy_from_slice(&self.element_count.to_le_bytes());
        buf[17..25].copy_from_slice(&self.first_offset.to_le_bytes());
        buf[25..33].copy_from_slice(&self.last_offset.to_le_bytes());
        buf
    }

    /// Decodes and validates a header.
    ///
    /// Returns `None` if the buffer is short, the version is unknown, or the
    /// offsets are inconsistent.
    #[must_use]
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_LEN as usize {
            return None;
        }
        let header = Self {
            version: bytes[0],
            file_length: read_u64(&bytes[1..9]),
            element_count: read_u64(&bytes[9..17]),
            first_offset: read_u64(&bytes[17..25]),
            last_offset: read_u64(&bytes[25..33]),
        };
        header.is_valid().then_some(header)
    }

    /// Checks the header's internal invariants.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        if self.version != FORMAT_VERSION {
            return false;
        }
        if self.first_offset < HEADER_LEN || self.last_offset < self.first_offset {
            return false;
        }
        if self.element_count == 0 {
            return self.first_offset == self.last_offset;
        }
        true
    }
}

/// The fixed-size descriptor preceding every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ElementDescriptor {
    /// The descriptor's own file offset.
    pub offset: u64,
    /// Payload length in bytes.
    pub length: usize,
}

impl Default for ElementDescriptor {
    fn default() -> Self {
        Self::empty()
    }
}

impl ElementDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub const fn new(offset: u64, length: usize) -> Self {
        Self { offset, length }
    }

    /// The descriptor of an empty queue, located just past the header.
    #[must_use]
    pub const fn empty() -> Self {
        Self::new(HEADER_LEN, 0)
    }

    /// Returns true for a zero-length descriptor.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Offset of this record's payload.
    #[must_use]
    pub const fn payload_offset(&self) -> u64 {
        self.offset.saturating_add(DESCRIPTOR_LEN)
    }

    /// Offset of the descriptor that follows this record.
    #[must_use]
    pub const fn next_offset(&self) -> u64 {
        self.payload_offset().saturating_add(self.length as u64)
    }

    /// Total on-disk size of the record (descriptor plus payload).
    #[must_use]
    pub const fn record_len(&self) -> u64 {
        DESCRIPTOR_LEN.saturating_add(self.length as u64)
    }

    /// Encodes the descriptor.
    #[must_use]
    pub fn encode(&self) -> [u8; DESCRIPTOR_LEN as usize] {
        let mut buf = [0u8; DESCRIPTOR_LEN as usize];
        buf[0..8].copy_from_slice(&self.offset.to_le_bytes());
        buf[8..16].copy_from_slice(&(self.length as u64).to_le_bytes());
        buf
    }

    /// Decodes a descriptor that was read at `position`.
    ///
    /// Returns `None` if the buffer is short, the stored offset does not
    /// match `position` (a zeroed or misplaced descriptor), or the record
    /// would end past the largest representable offset.
    #[must_use]
    pub fn decode_at(bytes: &[u8], position: u64) -> Option<Self> {
        if bytes.len() < DESCRIPTOR_LEN as usize {
            return None;
        }
        let offset = read_u64(&bytes[0..8]);
        let raw_length = read_u64(&bytes[8..16]);
        if offset != position {
            return None;
        }
        let length = usize::try_from(raw_length).ok()?;
        let fits = offset
            .checked_add(DESCRIPTOR_LEN)
            .and_then(|payload| payload.checked_add(raw_length))
            .is_some();
        fits.then_some(Self { offset, length })
    }
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_header_invariant() {
        let header = FileHeader::empty();
        assert_eq!(header.element_count, 0);
        assert_eq!(header.first_offset, header.last_offset);
        assert_eq!(header.first_offset, HEADER_LEN);
        assert!(header.is_valid());
    }

    #[test]
    fn header_encoding_is_packed_little_endian() {
        let header = FileHeader::new(3, 40, 90).with_file_length(120);
        let bytes = header.encode();

        assert_eq!(bytes.len(), HEADER_LEN as usize);
        assert_eq!(bytes[0], FORMAT_VERSION);
        assert_eq!(&bytes[1..9], &120u64.to_le_bytes());
        assert_eq!(&bytes[9..17], &3u64.to_le_bytes());
        assert_eq!(FileHeader::decode(&bytes), Some(header));
    }

    #[test]
    fn header_rejects_short_buffer() {
        let bytes = FileHeader::empty().encode();
        assert!(FileHeader::decode(&bytes[..20]).is_none());
    }

    #[test]
    fn header_rejects_unknown_version() {
        let mut bytes = FileHeader::empty().encode();
        bytes[0] = 9;
        assert!(FileHeader::decode(&bytes).is_none());
    }

    #[test]
    fn header_rejects_inconsistent_offsets() {
        // first offset inside the header
        assert!(!FileHeader::new(1, 4, 40).is_valid());
        // last before first
        assert!(!FileHeader::new(2, 80, 40).is_valid());
        // empty but offsets differ
        assert!(!FileHeader::new(0, 40, 80).is_valid());
    }

    #[test]
    fn descriptor_offsets() {
        let element = ElementDescriptor::new(HEADER_LEN, 5);
        assert_eq!(element.payload_offset(), HEADER_LEN + DESCRIPTOR_LEN);
        assert_eq!(element.next_offset(), HEADER_LEN + DESCRIPTOR_LEN + 5);
        assert_eq!(element.record_len(), DESCRIPTOR_LEN + 5);
        assert!(!element.is_empty());
        assert!(ElementDescriptor::empty().is_empty());
    }

    #[test]
    fn descriptor_decode_checks_position() {
        let element = ElementDescriptor::new(100, 7);
        let bytes = element.encode();

        assert_eq!(ElementDescriptor::decode_at(&bytes, 100), Some(element));
        assert!(ElementDescriptor::decode_at(&bytes, 101).is_none());
        assert!(ElementDescriptor::decode_at(&[0u8; 16], 100).is_none());
        assert!(ElementDescriptor::decode_at(&bytes[..8], 100).is_none());
    }

    #[test]
    fn descriptor_decode_rejects_overflowing_length() {
        let mut bytes = [0u8; DESCRIPTOR_LEN as usize];
        bytes[0..8].copy_from_slice(&HEADER_LEN.to_le_bytes());
        bytes[8..16].copy_from_slice(&(u64::MAX - 8).to_le_bytes());

        assert!(ElementDescriptor::decode_at(&bytes, HEADER_LEN).is_none());
    }

    #[test]
    fn descriptor_offsets_saturate() {
        let element = ElementDescriptor::new(u64::MAX - 4, 10);
        assert_eq!(element.payload_offset(), u64::MAX);
        assert_eq!(element.next_offset(), u64::MAX);
    }
}
