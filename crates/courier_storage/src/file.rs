//! File-backed element store.

use crate::error::{StorageError, StorageResult};
use crate::format::{ElementDescriptor, FileHeader, DESCRIPTOR_LEN, HEADER_LEN};
use crate::options::StoreOptions;
use crate::store::{ElementIter, ElementStore};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Chunk size used when zero-filling removed records.
const ZERO_CHUNK: usize = 64 * 1024;

/// A durable element store backed by a single file.
///
/// Records are appended after the current tail and consumed from the head.
/// The file only grows forward; once it is large and mostly consumed, the
/// live records are slid back to just after the header (see
/// [`FileElementStore::compact`]).
///
/// # Durability
///
/// Each `add` writes the descriptor, then the payload, then the header. A
/// crash before the header write leaves the previous state intact: the new
/// record is simply invisible.
///
/// # Thread Safety
///
/// All access goes through one mutex, so adds from application threads and
/// removes from the drain worker are serialized.
///
/// # Example
///
/// ```no_run
/// use courier_storage::{ElementStore, FileElementStore, StoreOptions};
/// use std::path::Path;
///
/// let store = FileElementStore::open(Path::new("events"), StoreOptions::default()).unwrap();
/// store.add(b"persistent record").unwrap();
/// assert_eq!(store.peek().unwrap(), Some(b"persistent record".to_vec()));
/// ```
#[derive(Debug)]
pub struct FileElementStore {
    path: PathBuf,
    options: StoreOptions,
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    file: File,
    sync_writes: bool,
    header: FileHeader,
    first: ElementDescriptor,
    last: ElementDescriptor,
}

/// Result of walking a queue file's record chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyReport {
    /// Records the header claims are live.
    pub element_count: u64,
    /// Records reached by walking the chain.
    pub records_walked: u64,
    /// Bytes occupied by the walked records.
    pub live_bytes: u64,
    /// Length of the file.
    pub file_len: u64,
    /// Problems found.
    pub errors: Vec<String>,
}

impl VerifyReport {
    /// Returns true if the chain matched the header.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty() && self.records_walked == self.element_count
    }
}

impl FileElementStore {
    /// Opens or creates a store at the given path.
    ///
    /// An existing file is validated: an unreadable header yields an empty
    /// store, and a broken chain is trimmed to its longest readable prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path, options: StoreOptions) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut inner = Inner {
            file,
            sync_writes: options.sync_writes,
            header: FileHeader::empty(),
            first: ElementDescriptor::empty(),
            last: ElementDescriptor::empty(),
        };
        inner.load()?;

        info!(
            path = %path.display(),
            elements = inner.header.element_count,
            "opened queue file"
        );

        Ok(Self {
            path: path.to_path_buf(),
            options,
            inner: Mutex::new(inner),
        })
    }

    /// Opens or creates a store, creating parent directories if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot
    /// be opened.
    pub fn open_with_create_dirs(path: &Path, options: StoreOptions) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path, options)
    }

    /// Returns the path to the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the options the store was opened with.
    #[must_use]
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Returns the current in-memory header.
    #[must_use]
    pub fn header(&self) -> FileHeader {
        self.inner.lock().header
    }

    /// Returns the length of the backing file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file metadata cannot be read.
    pub fn file_len(&self) -> StorageResult<u64> {
        self.inner.lock().file_len()
    }

    /// Returns the bytes occupied by the header and the live records.
    #[must_use]
    pub fn used_bytes(&self) -> u64 {
        self.inner.lock().used_bytes()
    }

    /// Slides the live records to just after the header and truncates the
    /// file.
    ///
    /// The live region is read into memory in one piece, so memory use is
    /// proportional to the live data.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure or if the record chain is broken.
    pub fn compact(&self) -> StorageResult<()> {
        self.inner.lock().compact()
    }

    /// Walks the record chain and reports any inconsistency.
    ///
    /// # Errors
    ///
    /// Returns an error only on I/O failure; format problems are reported
    /// in the [`VerifyReport`].
    pub fn verify(&self) -> StorageResult<VerifyReport> {
        self.inner.lock().verify()
    }
}

impl ElementStore for FileElementStore {
    fn size(&self) -> u64 {
        self.inner.lock().header.element_count
    }

    fn add(&self, data: &[u8]) -> StorageResult<()> {
        if data.is_empty() {
            debug!(path = %self.path.display(), "ignoring empty record");
            return Ok(());
        }
        self.inner.lock().add(data, &self.options)
    }

    fn peek(&self) -> StorageResult<Option<Vec<u8>>> {
        let mut inner = self.inner.lock();
        if inner.header.element_count == 0 {
            return Ok(None);
        }
        let first = inner.first;
        inner.read_payload(&first)
    }

    fn peek_many(&self, max: u64) -> StorageResult<Vec<Vec<u8>>> {
        let mut inner = self.inner.lock();
        let take = max.min(inner.header.element_count);
        let mut records = Vec::with_capacity(usize::try_from(take).unwrap_or(0));
        let mut cursor = inner.first;

        for index in 0..take {
            let Some(payload) = inner.read_payload(&cursor)? else {
                warn!(offset = cursor.offset, "record payload past end of file");
                break;
            };
            records.push(payload);

            if index + 1 < take {
                match inner.read_descriptor(cursor.next_offset())? {
                    Some(next) => cursor = next,
                    None => {
                        warn!(offset = cursor.next_offset(), "unreadable element descriptor");
                        break;
                    }
                }
            }
        }

        Ok(records)
    }

    fn remove(&self, n: u64) -> StorageResult<()> {
        self.inner.lock().remove(n)
    }

    fn clear(&self) -> StorageResult<()> {
        self.inner.lock().clear()
    }

    fn iter(&self) -> ElementIter<'_> {
        let (first, remaining) = {
            let inner = self.inner.lock();
            (inner.first, inner.header.element_count)
        };
        Box::new(FileElementIter {
            store: self,
            next: Some(first),
            remaining,
        })
    }

    fn is_durable(&self) -> bool {
        true
    }
}

impl Inner {
    fn file_len(&self) -> StorageResult<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Reads `len` bytes at `offset`, or `None` if the range ends past EOF.
    fn read_at(&mut self, offset: u64, len: usize) -> StorageResult<Option<Vec<u8>>> {
        let Some(end) = offset.checked_add(len as u64) else {
            return Ok(None);
        };
        if end > self.file_len()? {
            return Ok(None);
        }

        let mut buffer = vec![0u8; len];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut buffer)?;
        Ok(Some(buffer))
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> StorageResult<()> {
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data)?;
        if self.sync_writes {
            self.file.sync_data()?;
        }
        Ok(())
    }

    fn truncate(&mut self, len: u64) -> StorageResult<()> {
        self.file.set_len(len)?;
        if self.sync_writes {
            self.file.sync_all()?;
        }
        Ok(())
    }

    fn read_header(&mut self) -> StorageResult<Option<FileHeader>> {
        Ok(self
            .read_at(0, HEADER_LEN as usize)?
            .and_then(|bytes| FileHeader::decode(&bytes)))
    }

    fn read_descriptor(&mut self, offset: u64) -> StorageResult<Option<ElementDescriptor>> {
        Ok(self
            .read_at(offset, DESCRIPTOR_LEN as usize)?
            .and_then(|bytes| ElementDescriptor::decode_at(&bytes, offset)))
    }

    fn read_payload(&mut self, element: &ElementDescriptor) -> StorageResult<Option<Vec<u8>>> {
        self.read_at(element.payload_offset(), element.length)
    }

    fn write_descriptor(&mut self, element: &ElementDescriptor) -> StorageResult<()> {
        self.write_at(element.offset, &element.encode())
    }

    /// Writes a header describing the current first/last descriptors.
    fn commit_header(&mut self, element_count: u64, file_length: u64) -> StorageResult<()> {
        let header = FileHeader::new(element_count, self.first.offset, self.last.offset)
            .with_file_length(file_length);
        self.write_at(0, &header.encode())?;
        self.header = header;
        Ok(())
    }

    fn used_bytes(&self) -> u64 {
        if self.header.element_count == 0 {
            return HEADER_LEN;
        }
        HEADER_LEN + self.last.record_len() + (self.last.offset - self.first.offset)
    }

    fn load(&mut self) -> StorageResult<()> {
        if self.file_len()? == 0 {
            return Ok(());
        }

        let header = match self.read_header()? {
            Some(header) => header,
            None => {
                warn!("unreadable queue file header, starting empty");
                return Ok(());
            }
        };
        if header.element_count == 0 {
            return Ok(());
        }

        let Some(first) = self.read_descriptor(header.first_offset)? else {
            warn!(
                offset = header.first_offset,
                "unreadable first element, starting empty"
            );
            return Ok(());
        };

        self.adopt_chain(header, first)
    }

    /// Walks the chain from `first` and keeps its longest readable prefix,
    /// at most `header.element_count` records long.
    ///
    /// Every descriptor is checked, so a break anywhere in the chain is
    /// found at open rather than by a later `remove`.
    fn adopt_chain(&mut self, header: FileHeader, first: ElementDescriptor) -> StorageResult<()> {
        let expected = header.element_count;
        let file_len = self.file_len()?;
        let mut cursor = Some(first);
        let mut last = None;
        let mut count = 0u64;

        while let Some(element) = cursor {
            if count == expected || element.is_empty() || element.next_offset() > file_len {
                break;
            }
            last = Some(element);
            count += 1;
            cursor = if count < expected {
                self.read_descriptor(element.next_offset())?
            } else {
                None
            };
        }

        let Some(last) = last else {
            warn!("no readable records in queue file, starting empty");
            return Ok(());
        };

        self.first = first;
        self.last = last;
        if count == expected && last.offset == header.last_offset {
            self.header = header;
        } else {
            warn!(
                expected,
                recovered = count,
                "queue file chain broken, keeping readable prefix"
            );
            self.header = FileHeader::new(count, first.offset, last.offset);
        }
        Ok(())
    }

    fn add(&mut self, data: &[u8], options: &StoreOptions) -> StorageResult<()> {
        if options.should_compact(self.file_len()?, self.used_bytes()) {
            self.compact()?;
        }

        let was_empty = self.header.element_count == 0;
        let offset = if was_empty {
            self.last.offset
        } else {
            self.last.next_offset()
        };
        let element = ElementDescriptor::new(offset, data.len());

        self.write_descriptor(&element)?;
        self.write_at(element.payload_offset(), data)?;

        self.last = element;
        if was_empty {
            self.first = element;
        }

        let file_length = self.file_len()?;
        self.commit_header(self.header.element_count + 1, file_length)
    }

    fn remove(&mut self, n: u64) -> StorageResult<()> {
        let amount = n.min(self.header.element_count);
        if amount == 0 {
            return Ok(());
        }
        let remaining = self.header.element_count - amount;
        if remaining == 0 {
            return self.clear();
        }

        let mut cursor = self.first;
        for _ in 0..amount {
            let next_offset = cursor.next_offset();
            match self.read_descriptor(next_offset)? {
                Some(next) => cursor = next,
                None => {
                    // Nothing past a broken link can be read again.
                    warn!(
                        offset = next_offset,
                        dropped = remaining,
                        "unreadable element descriptor, dropping rest of queue"
                    );
                    return self.clear();
                }
            }
        }

        let start = self.first.offset;
        self.first = cursor;
        let file_length = self.file_len()?;
        self.commit_header(remaining, file_length)?;

        // Removed records are contiguous: [old first, new first).
        self.zero_fill(start, cursor.offset)
    }

    fn zero_fill(&mut self, start: u64, end: u64) -> StorageResult<()> {
        let zeros = [0u8; ZERO_CHUNK];
        let mut remaining = end.saturating_sub(start);
        self.file.seek(SeekFrom::Start(start))?;
        while remaining > 0 {
            let chunk = remaining.min(ZERO_CHUNK as u64) as usize;
            self.file.write_all(&zeros[..chunk])?;
            remaining -= chunk as u64;
        }
        if self.sync_writes {
            self.file.sync_data()?;
        }
        Ok(())
    }

    fn clear(&mut self) -> StorageResult<()> {
        let element = ElementDescriptor::empty();
        self.first = element;
        self.last = element;

        let file_length = element.payload_offset();
        self.commit_header(0, file_length)?;
        self.write_descriptor(&element)?;
        self.truncate(file_length)
    }

    fn compact(&mut self) -> StorageResult<()> {
        let count = self.header.element_count;
        if count == 0 {
            return self.clear();
        }

        let start = self.first.offset;
        let end = self.last.next_offset();
        let len = usize::try_from(end - start)
            .map_err(|_| StorageError::Corrupted(format!("live region too large: {start}..{end}")))?;
        let Some(mut live) = self.read_at(start, len)? else {
            warn!(start, end, "live region past end of file, skipping compaction");
            return Ok(());
        };

        let before = self.file_len()?;
        let shift = start - HEADER_LEN;
        let new_eof = HEADER_LEN + live.len() as u64;

        if shift == 0 {
            if before > new_eof {
                self.truncate(new_eof)?;
            }
            return Ok(());
        }

        // Descriptors carry their own offset, so rebase each one in place.
        let mut pos = 0usize;
        for _ in 0..count {
            let descriptor_end = pos + DESCRIPTOR_LEN as usize;
            let element = live
                .get(pos..descriptor_end)
                .and_then(|bytes| ElementDescriptor::decode_at(bytes, start + pos as u64))
                .ok_or_else(|| {
                    StorageError::Corrupted(format!(
                        "broken element chain at offset {}",
                        start + pos as u64
                    ))
                })?;
            let moved = ElementDescriptor::new(element.offset - shift, element.length);
            live[pos..descriptor_end].copy_from_slice(&moved.encode());
            pos = descriptor_end + element.length;
        }

        self.first = ElementDescriptor::new(HEADER_LEN, self.first.length);
        self.last = ElementDescriptor::new(new_eof - self.last.record_len(), self.last.length);

        self.commit_header(count, new_eof)?;
        self.write_at(HEADER_LEN, &live)?;
        self.truncate(new_eof)?;

        info!(
            elements = count,
            before,
            after = new_eof,
            "compacted queue file"
        );
        Ok(())
    }

    fn verify(&mut self) -> StorageResult<VerifyReport> {
        let file_len = self.file_len()?;
        let mut report = VerifyReport {
            element_count: self.header.element_count,
            records_walked: 0,
            live_bytes: 0,
            file_len,
            errors: Vec::new(),
        };

        if file_len > 0 && self.read_header()?.is_none() {
            report.errors.push("header unreadable or invalid".into());
        }

        let mut cursor = self.first;
        let mut walked_last = None;
        while report.records_walked < report.element_count {
            if cursor.next_offset() > file_len {
                report.errors.push(format!(
                    "record at offset {} extends past end of file ({} > {})",
                    cursor.offset,
                    cursor.next_offset(),
                    file_len
                ));
                break;
            }
            report.records_walked += 1;
            report.live_bytes += cursor.record_len();
            walked_last = Some(cursor);

            if report.records_walked < report.element_count {
                match self.read_descriptor(cursor.next_offset())? {
                    Some(next) => cursor = next,
                    None => {
                        report.errors.push(format!(
                            "unreadable element descriptor at offset {}",
                            cursor.next_offset()
                        ));
                        break;
                    }
                }
            }
        }

        if let Some(last) = walked_last {
            if report.records_walked == report.element_count && last != self.last {
                report.errors.push(format!(
                    "chain ends at offset {} but header points to {}",
                    last.offset, self.last.offset
                ));
            }
        }

        Ok(report)
    }
}

/// Lazy iterator over a [`FileElementStore`]; locks the store per record.
struct FileElementIter<'a> {
    store: &'a FileElementStore,
    next: Option<ElementDescriptor>,
    remaining: u64,
}

impl Iterator for FileElementIter<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.next.take()?;
        if current.is_empty() {
            return None;
        }

        let mut inner = self.store.inner.lock();
        let payload = match inner.read_payload(&current) {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, offset = current.offset, "failed to read record");
                return None;
            }
        };

        self.remaining -= 1;
        if self.remaining > 0 {
            self.next = inner
                .read_descriptor(current.next_offset())
                .unwrap_or_else(|e| {
                    warn!(error = %e, "failed to read element descriptor");
                    None
                });
        }
        Some(payload)
    }
}
