//! Byte storage behind binary properties.

use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::core::BufferWritePolicy;

/// Document buffer shared by every accessor that points into it.
pub type SharedBuffer = Arc<RwLock<Vec<u8>>>;

/// A buffer embedded in the source document, as handed to table construction.
///
/// `byte_offset` is where this buffer starts inside `data` (for example, the
/// binary chunk of a container file holding several buffers back to back).
#[derive(Clone)]
pub struct DocumentBuffer {
    pub data: SharedBuffer,
    pub byte_offset: usize,
}

impl DocumentBuffer {
    /// Wrap owned bytes as a standalone document buffer.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            data: Arc::new(RwLock::new(bytes)),
            byte_offset: 0,
        }
    }

    /// A buffer that starts `byte_offset` bytes into shared storage.
    pub fn with_offset(data: SharedBuffer, byte_offset: usize) -> Self {
        Self { data, byte_offset }
    }
}

impl fmt::Debug for DocumentBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentBuffer")
            .field("len", &self.data.read().len())
            .field("byte_offset", &self.byte_offset)
            .finish()
    }
}

enum Storage {
    /// Document buffer, possibly aliased by other accessors
    Shared(SharedBuffer),
    /// Immutable resource cache entry
    Cached(Arc<[u8]>),
    /// Private to this property
    Owned(Vec<u8>),
}

/// A strided window of elements over some byte storage.
pub(crate) struct BufferView {
    storage: Storage,
    byte_offset: usize,
    byte_stride: usize,
    /// Bytes spanned by all elements, from `byte_offset`.
    byte_length: usize,
}

impl BufferView {
    /// View over a document buffer.
    pub(crate) fn shared(
        data: SharedBuffer,
        byte_offset: usize,
        byte_stride: usize,
        byte_length: usize,
    ) -> Self {
        Self {
            storage: Storage::Shared(data),
            byte_offset,
            byte_stride,
            byte_length,
        }
    }

    /// View over a resolved cache entry.
    pub(crate) fn cached(
        data: Arc<[u8]>,
        byte_offset: usize,
        byte_stride: usize,
        byte_length: usize,
    ) -> Self {
        Self {
            storage: Storage::Cached(data),
            byte_offset,
            byte_stride,
            byte_length,
        }
    }

    /// Dense zero-filled storage.
    pub(crate) fn zeroed(byte_stride: usize, byte_length: usize) -> Self {
        Self {
            storage: Storage::Owned(vec![0u8; byte_length]),
            byte_offset: 0,
            byte_stride,
            byte_length,
        }
    }

    /// Byte position of element `index`, if it does not overflow.
    #[inline]
    fn element_start(&self, index: usize) -> Option<usize> {
        index.checked_mul(self.byte_stride)?.checked_add(self.byte_offset)
    }

    /// Byte range of element `index`, if it lies inside both the view and
    /// the underlying storage.
    fn element_range(
        &self,
        index: usize,
        element_size: usize,
        storage_len: usize,
    ) -> Option<Range<usize>> {
        let start = self.element_start(index)?;
        let end = start.checked_add(element_size)?;
        let view_end = self.byte_offset.saturating_add(self.byte_length);
        (end <= view_end && end <= storage_len).then_some(start..end)
    }

    /// Run `f` over the full underlying bytes.
    fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        match &self.storage {
            Storage::Shared(data) => f(data.read().as_slice()),
            Storage::Cached(data) => f(&data[..]),
            Storage::Owned(data) => f(data.as_slice()),
        }
    }

    /// Run `f` over the bytes of element `index`.
    ///
    /// Returns `None` when the element lies outside the available bytes.
    pub(crate) fn read_element<R>(
        &self,
        index: usize,
        element_size: usize,
        f: impl FnOnce(&[u8]) -> R,
    ) -> Option<R> {
        self.with_bytes(|bytes| {
            let range = self.element_range(index, element_size, bytes.len())?;
            Some(f(&bytes[range]))
        })
    }

    /// Run `f` over the mutable bytes of element `index`.
    ///
    /// Shared storage is copied into private storage first, unless the
    /// policy lets writes alias a document buffer. Returns false (without
    /// copying anything) when the element lies outside the available bytes.
    pub(crate) fn write_element(
        &mut self,
        index: usize,
        element_size: usize,
        policy: BufferWritePolicy,
        f: impl FnOnce(&mut [u8]),
    ) -> bool {
        let storage_len = self.with_bytes(|bytes| bytes.len());
        if self.element_range(index, element_size, storage_len).is_none() {
            return false;
        }

        if let (Storage::Shared(data), BufferWritePolicy::Alias) = (&self.storage, policy) {
            let mut bytes = data.write();
            let Some(range) = self.element_range(index, element_size, bytes.len()) else {
                return false;
            };
            f(&mut bytes[range]);
            return true;
        }

        if !self.is_private() {
            self.detach();
        }
        let Some(range) = self.element_range(index, element_size, self.byte_length) else {
            return false;
        };
        match &mut self.storage {
            Storage::Owned(bytes) if range.end <= bytes.len() => {
                f(&mut bytes[range]);
                true
            }
            _ => false,
        }
    }

    /// Returns true when this view no longer references shared storage.
    pub(crate) fn is_private(&self) -> bool {
        matches!(self.storage, Storage::Owned(_))
    }

    /// Copy this view's byte range into private storage.
    fn detach(&mut self) {
        let copy = self.with_bytes(|bytes| {
            let start = self.byte_offset.min(bytes.len());
            let end = self.byte_offset.saturating_add(self.byte_length).min(bytes.len());
            bytes[start..end].to_vec()
        });
        debug!(bytes = copy.len(), "copying shared buffer range before write");
        self.storage = Storage::Owned(copy);
        self.byte_offset = 0;
    }
}
