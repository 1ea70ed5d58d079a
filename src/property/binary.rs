//! Accessor-backed binary properties.
//!
//! A binary property reads `component_count` components per feature out of
//! a byte buffer and assembles them into a scalar, vector or matrix. Its
//! storage goes through three states:
//!
//! - **Empty** - no buffer at all. Reads of ids below the accessor count
//!   return the zero value of the property's shape; the first write
//!   allocates dense zero-filled storage for `count` elements.
//! - **Pending** - the buffer lives in an external resource that has not
//!   arrived yet. Reads return `None`; writes are dropped.
//! - **Bound** - a view over a document buffer, a cache entry, or private
//!   storage.
//!
//! Reads take `&self`, so a property stays `Pending` after its buffer has
//! arrived and reads view the resolved cache entry directly. The move to
//! `Bound` happens on the first write.

use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, warn};

use super::buffer::{BufferView, DocumentBuffer};
use super::{resolved, StorageState};
use crate::core::{BufferWritePolicy, SharedFetch};
use crate::util::{ComponentType, Components, Error, PropertyValue, Result, ValueShape};

/// Storage parameters of an accessor, as resolved from the schema.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessorInfo {
    pub component_type: ComponentType,
    pub shape: ValueShape,
    /// Number of elements (features) stored.
    pub count: usize,
    /// Map integer components onto `[0, 1]` / `[-1, 1]`. Ignored for floats.
    pub normalized: bool,
}

impl AccessorInfo {
    /// Create accessor info without normalization.
    pub fn new(component_type: ComponentType, shape: ValueShape, count: usize) -> Self {
        Self {
            component_type,
            shape,
            count,
            normalized: false,
        }
    }

    /// Builder-style normalization flag.
    pub fn normalized(mut self, normalized: bool) -> Self {
        self.normalized = normalized;
        self
    }

    /// Size in bytes of one tightly packed element.
    #[inline]
    pub fn element_size(&self) -> usize {
        self.shape.component_count() * self.component_type.num_bytes()
    }
}

/// Where a binary property's bytes come from.
pub enum BinarySource {
    /// No buffer; the property reads as zero until first written.
    Implicit,
    /// A buffer embedded in the document.
    Embedded {
        buffer: DocumentBuffer,
        /// Buffer-view offset plus accessor offset.
        byte_offset: usize,
        byte_stride: Option<usize>,
    },
    /// An external buffer fetched through the resource cache.
    External {
        fetch: SharedFetch<Arc<[u8]>>,
        byte_offset: usize,
        byte_stride: Option<usize>,
    },
}

enum BinaryState {
    Empty {
        /// Size of the dense storage allocated on first write.
        byte_length: usize,
    },
    Pending {
        fetch: SharedFetch<Arc<[u8]>>,
        byte_offset: usize,
        byte_stride: usize,
        byte_length: usize,
    },
    Bound(BufferView),
}

/// Property whose values are encoded in a binary buffer.
pub struct BinaryProperty {
    info: AccessorInfo,
    policy: BufferWritePolicy,
    state: BinaryState,
}

impl BinaryProperty {
    /// Create a binary property.
    ///
    /// Fails when the stride is smaller than one packed element or the
    /// layout does not fit in the address space.
    pub fn new(mut info: AccessorInfo, source: BinarySource, policy: BufferWritePolicy) -> Result<Self> {
        if info.normalized && info.component_type.is_float() {
            debug!(component_type = %info.component_type, "ignoring normalization of float components");
            info.normalized = false;
        }

        let element_size = info.element_size();
        let layout = |byte_stride: Option<usize>| -> Result<(usize, usize)> {
            let stride = byte_stride.unwrap_or(element_size);
            if stride < element_size {
                return Err(Error::schema(format!(
                    "byte stride {stride} is smaller than element size {element_size}"
                )));
            }
            let length = match info.count {
                0 => 0,
                n => (n - 1)
                    .checked_mul(stride)
                    .and_then(|l| l.checked_add(element_size))
                    .ok_or_else(|| Error::schema("accessor byte length overflows"))?,
            };
            Ok((stride, length))
        };

        let state = match source {
            BinarySource::Implicit => {
                let byte_length = element_size
                    .checked_mul(info.count)
                    .ok_or_else(|| Error::schema("implicit accessor byte length overflows"))?;
                BinaryState::Empty { byte_length }
            }
            BinarySource::Embedded { buffer, byte_offset, byte_stride } => {
                let (stride, length) = layout(byte_stride)?;
                let offset = buffer.byte_offset.saturating_add(byte_offset);
                BinaryState::Bound(BufferView::shared(buffer.data, offset, stride, length))
            }
            BinarySource::External { fetch, byte_offset, byte_stride } => {
                let (stride, length) = layout(byte_stride)?;
                BinaryState::Pending {
                    fetch,
                    byte_offset,
                    byte_stride: stride,
                    byte_length: length,
                }
            }
        };

        Ok(Self { info, policy, state })
    }

    /// Create a property with no backing buffer.
    pub fn implicit(info: AccessorInfo, policy: BufferWritePolicy) -> Result<Self> {
        Self::new(info, BinarySource::Implicit, policy)
    }

    /// Storage parameters.
    #[inline]
    pub fn info(&self) -> &AccessorInfo {
        &self.info
    }

    /// Declared value shape.
    #[inline]
    pub fn shape(&self) -> ValueShape {
        self.info.shape
    }

    /// Whether integer components are normalized on read and write.
    #[inline]
    pub fn is_normalized(&self) -> bool {
        self.info.normalized
    }

    /// Current storage state.
    pub fn state(&self) -> StorageState {
        match &self.state {
            BinaryState::Empty { .. } => StorageState::Implicit,
            BinaryState::Pending { fetch, .. } if resolved(fetch).is_none() => StorageState::Pending,
            BinaryState::Pending { .. } | BinaryState::Bound(_) => StorageState::Ready,
        }
    }

    /// Returns true once a write has moved this property onto storage it
    /// does not share with anyone.
    pub fn has_private_storage(&self) -> bool {
        matches!(&self.state, BinaryState::Bound(view) if view.is_private())
    }

    /// Read the value of feature `id`.
    ///
    /// Returns `None` while the buffer is pending, or when the element lies
    /// outside the bytes that actually arrived.
    pub fn get_value(&self, id: usize) -> Option<PropertyValue> {
        let element_size = self.info.element_size();
        match &self.state {
            BinaryState::Empty { .. } => (id < self.info.count).then(|| PropertyValue::zero(self.info.shape)),
            BinaryState::Pending { fetch, byte_offset, byte_stride, byte_length } => {
                let buffer = resolved(fetch)?;
                BufferView::cached(buffer, *byte_offset, *byte_stride, *byte_length)
                    .read_element(id, element_size, |bytes| self.decode(bytes))
            }
            BinaryState::Bound(view) => view.read_element(id, element_size, |bytes| self.decode(bytes)),
        }
    }

    /// Read the value of feature `id` into `out`.
    ///
    /// Returns false (leaving `out` untouched) when the value is unavailable.
    pub fn get_value_into(&self, id: usize, out: &mut PropertyValue) -> bool {
        match self.get_value(id) {
            Some(value) => {
                *out = value;
                true
            }
            None => false,
        }
    }

    /// Encode `value` into the slot of feature `id`.
    ///
    /// Returns false when the write was dropped: the value has the wrong
    /// shape, the buffer is still pending, or the slot lies outside the
    /// available bytes.
    pub fn set_value(&mut self, id: usize, value: &PropertyValue) -> bool {
        let Some(components) = value.components() else {
            return false;
        };
        if components.len() != self.info.shape.component_count() {
            return false;
        }

        let AccessorInfo { component_type, normalized, .. } = self.info;
        let element_size = self.info.element_size();
        let policy = self.policy;
        let Some(view) = self.writable_view() else {
            warn!(id, "dropping write to binary property whose buffer has not arrived");
            return false;
        };

        let width = component_type.num_bytes();
        let written = view.write_element(id, element_size, policy, |bytes| {
            for (slot, component) in bytes.chunks_exact_mut(width).zip(components) {
                let raw = if normalized {
                    component_type.denormalize(component)
                } else {
                    component
                };
                component_type.write(slot, raw);
            }
        });
        if !written {
            warn!(id, "dropping write outside binary property storage");
        }
        written
    }

    /// A future that settles once the external buffer (if any) has arrived.
    pub(crate) fn pending_fetch(&self) -> Option<BoxFuture<'static, ()>> {
        match &self.state {
            BinaryState::Pending { fetch, .. } => Some(fetch.clone().map(|_| ()).boxed()),
            _ => None,
        }
    }

    fn decode(&self, bytes: &[u8]) -> PropertyValue {
        let AccessorInfo { component_type, normalized, shape, .. } = self.info;
        let components: Components = bytes
            .chunks_exact(component_type.num_bytes())
            .map(|chunk| {
                let raw = component_type.read(chunk);
                if normalized {
                    component_type.normalize(raw)
                } else {
                    raw
                }
            })
            .collect();
        PropertyValue::from_components(shape, &components)
    }

    /// Move to the bound state if possible, allocating zeroed storage for
    /// an implicit property and binding a resolved external buffer.
    fn writable_view(&mut self) -> Option<&mut BufferView> {
        match &self.state {
            BinaryState::Empty { byte_length } => {
                let element_size = self.info.element_size();
                debug!(count = self.info.count, bytes = *byte_length, "materializing implicit property");
                self.state = BinaryState::Bound(BufferView::zeroed(element_size, *byte_length));
            }
            BinaryState::Pending { fetch, byte_offset, byte_stride, byte_length } => {
                let buffer = resolved(fetch)?;
                let view = BufferView::cached(buffer, *byte_offset, *byte_stride, *byte_length);
                self.state = BinaryState::Bound(view);
            }
            BinaryState::Bound(_) => {}
        }
        match &mut self.state {
            BinaryState::Bound(view) => Some(view),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{DMat2, DVec3, DVec4};
    use futures::channel::oneshot;

    fn embedded(bytes: Vec<u8>) -> BinarySource {
        BinarySource::Embedded {
            buffer: DocumentBuffer::new(bytes),
            byte_offset: 0,
            byte_stride: None,
        }
    }

    fn pending() -> (oneshot::Sender<Arc<[u8]>>, SharedFetch<Arc<[u8]>>) {
        let (tx, rx) = oneshot::channel::<Arc<[u8]>>();
        let fetch = rx
            .map(|r| r.unwrap_or_else(|_| Arc::from(Vec::new())))
            .boxed()
            .shared();
        (tx, fetch)
    }

    #[test]
    fn test_normalized_unsigned_byte() {
        let info = AccessorInfo::new(ComponentType::Uint8, ValueShape::Scalar, 2).normalized(true);
        let prop = BinaryProperty::new(info, embedded(vec![255, 0]), BufferWritePolicy::default()).unwrap();
        assert_eq!(prop.get_value(0), Some(PropertyValue::Scalar(1.0)));
        assert_eq!(prop.get_value(1), Some(PropertyValue::Scalar(0.0)));
    }

    #[test]
    fn test_normalized_signed_clamps() {
        let info = AccessorInfo::new(ComponentType::Int8, ValueShape::Vec2, 1).normalized(true);
        let prop = BinaryProperty::new(info, embedded(vec![0x80, 0x7f]), BufferWritePolicy::default()).unwrap();
        assert_eq!(
            prop.get_value(0),
            Some(PropertyValue::Vec2(crate::util::DVec2::new(-1.0, 1.0)))
        );
    }

    #[test]
    fn test_normalization_ignored_for_floats() {
        let info = AccessorInfo::new(ComponentType::Float32, ValueShape::Scalar, 1).normalized(true);
        let prop = BinaryProperty::new(info, embedded(2.5f32.to_le_bytes().to_vec()), BufferWritePolicy::default())
            .unwrap();
        assert!(!prop.is_normalized());
        assert_eq!(prop.get_value(0), Some(PropertyValue::Scalar(2.5)));
    }

    #[test]
    fn test_vec3_float_decode() {
        let bytes: Vec<u8> = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]
            .iter()
            .flat_map(|v| v.to_le_bytes())
            .collect();
        let info = AccessorInfo::new(ComponentType::Float32, ValueShape::Vec3, 2);
        let prop = BinaryProperty::new(info, embedded(bytes), BufferWritePolicy::default()).unwrap();
        assert_eq!(prop.get_value(1), Some(PropertyValue::Vec3(DVec3::new(4.0, 5.0, 6.0))));
        assert_eq!(prop.get_value(2), None);
    }

    #[test]
    fn test_strided_layout_with_offsets() {
        // buffer offset 1, view+accessor offset 1, stride 4, u16 scalars
        let bytes = vec![0xee, 0xee, 0x01, 0x00, 0xff, 0xff, 0x02, 0x00, 0xff, 0xff];
        let source = BinarySource::Embedded {
            buffer: DocumentBuffer::with_offset(DocumentBuffer::new(bytes).data, 1),
            byte_offset: 1,
            byte_stride: Some(4),
        };
        let info = AccessorInfo::new(ComponentType::Uint16, ValueShape::Scalar, 2);
        let prop = BinaryProperty::new(info, source, BufferWritePolicy::default()).unwrap();
        assert_eq!(prop.get_value(0), Some(PropertyValue::Scalar(1.0)));
        assert_eq!(prop.get_value(1), Some(PropertyValue::Scalar(2.0)));
    }

    #[test]
    fn test_stride_too_small() {
        let info = AccessorInfo::new(ComponentType::Float32, ValueShape::Vec3, 2);
        let source = BinarySource::Embedded {
            buffer: DocumentBuffer::new(vec![0; 24]),
            byte_offset: 0,
            byte_stride: Some(8),
        };
        let err = BinaryProperty::new(info, source, BufferWritePolicy::default()).err();
        assert!(matches!(err, Some(Error::InvalidSchema(_))));
    }

    #[test]
    fn test_implicit_reads_zero_then_materializes() {
        let info = AccessorInfo::new(ComponentType::Float32, ValueShape::Vec4, 3);
        let mut prop = BinaryProperty::implicit(info, BufferWritePolicy::default()).unwrap();
        assert_eq!(prop.state(), StorageState::Implicit);
        for id in 0..3 {
            assert_eq!(prop.get_value(id), Some(PropertyValue::Vec4(DVec4::ZERO)));
        }

        assert!(prop.set_value(1, &PropertyValue::Vec4(DVec4::new(1.0, 2.0, 3.0, 4.0))));
        assert_eq!(prop.state(), StorageState::Ready);
        assert!(prop.has_private_storage());
        assert_eq!(prop.get_value(0), Some(PropertyValue::Vec4(DVec4::ZERO)));
        assert_eq!(prop.get_value(1), Some(PropertyValue::Vec4(DVec4::new(1.0, 2.0, 3.0, 4.0))));
        assert_eq!(prop.get_value(2), Some(PropertyValue::Vec4(DVec4::ZERO)));
    }

    #[test]
    fn test_implicit_reads_stop_at_accessor_count() {
        let info = AccessorInfo::new(ComponentType::Float32, ValueShape::Scalar, 2);
        let mut prop = BinaryProperty::implicit(info, BufferWritePolicy::default()).unwrap();
        assert_eq!(prop.get_value(1), Some(PropertyValue::Scalar(0.0)));
        assert_eq!(prop.get_value(2), None);

        assert!(prop.set_value(0, &PropertyValue::Scalar(4.0)));
        assert_eq!(prop.get_value(1), Some(PropertyValue::Scalar(0.0)));
        assert_eq!(prop.get_value(2), None);
    }

    #[test]
    fn test_implicit_length_overflow_rejected() {
        let info = AccessorInfo::new(ComponentType::Float32, ValueShape::Vec4, usize::MAX / 8);
        let err = BinaryProperty::implicit(info, BufferWritePolicy::default()).err();
        assert!(matches!(err, Some(Error::InvalidSchema(_))));
    }

    #[test]
    fn test_normalized_write_encodes() {
        let info = AccessorInfo::new(ComponentType::Uint8, ValueShape::Mat2, 1).normalized(true);
        let mut prop = BinaryProperty::implicit(info, BufferWritePolicy::default()).unwrap();
        let m = DMat2::from_cols_array(&[0.0, 0.5, 1.0, 0.25]);
        assert!(prop.set_value(0, &PropertyValue::Mat2(m)));
        let Some(PropertyValue::Mat2(read)) = prop.get_value(0) else {
            panic!("expected Mat2");
        };
        let step = 1.0 / 255.0;
        for (a, b) in read.to_cols_array().iter().zip(m.to_cols_array()) {
            assert!((a - b).abs() <= step, "{a} vs {b}");
        }
    }

    #[test]
    fn test_wrong_shape_write_rejected() {
        let info = AccessorInfo::new(ComponentType::Float32, ValueShape::Vec3, 1);
        let mut prop = BinaryProperty::implicit(info, BufferWritePolicy::default()).unwrap();
        assert!(!prop.set_value(0, &PropertyValue::Scalar(1.0)));
        assert_eq!(prop.state(), StorageState::Implicit);
    }

    #[test]
    fn test_pending_then_bound() {
        let (tx, fetch) = pending();
        let info = AccessorInfo::new(ComponentType::Uint16, ValueShape::Scalar, 2);
        let source = BinarySource::External { fetch, byte_offset: 2, byte_stride: None };
        let mut prop = BinaryProperty::new(info, source, BufferWritePolicy::default()).unwrap();

        assert_eq!(prop.state(), StorageState::Pending);
        assert_eq!(prop.get_value(0), None);
        assert!(!prop.set_value(0, &PropertyValue::Scalar(9.0)));
        assert!(prop.pending_fetch().is_some());

        tx.send(Arc::from(vec![0u8, 0, 7, 0, 8, 0])).unwrap();
        assert_eq!(prop.get_value(0), Some(PropertyValue::Scalar(7.0)));
        assert_eq!(prop.get_value(1), Some(PropertyValue::Scalar(8.0)));
        assert_eq!(prop.state(), StorageState::Ready);

        assert!(prop.set_value(1, &PropertyValue::Scalar(9.0)));
        assert_eq!(prop.get_value(1), Some(PropertyValue::Scalar(9.0)));
        assert!(prop.has_private_storage());
    }

    #[test]
    fn test_failed_buffer_reads_unavailable() {
        let (tx, fetch) = pending();
        drop(tx);
        let info = AccessorInfo::new(ComponentType::Float32, ValueShape::Scalar, 4);
        let source = BinarySource::External { fetch, byte_offset: 0, byte_stride: None };
        let mut prop = BinaryProperty::new(info, source, BufferWritePolicy::default()).unwrap();
        assert_eq!(prop.state(), StorageState::Ready);
        for id in 0..4 {
            assert_eq!(prop.get_value(id), None);
        }
        assert!(!prop.set_value(0, &PropertyValue::Scalar(1.0)));
        assert_eq!(prop.get_value(0), None);
    }

    #[test]
    fn test_copy_on_write_isolates_aliases() {
        let buffer = DocumentBuffer::new(vec![1, 2]);
        let info = AccessorInfo::new(ComponentType::Uint8, ValueShape::Scalar, 2);
        let source = || BinarySource::Embedded { buffer: buffer.clone(), byte_offset: 0, byte_stride: None };
        let mut a = BinaryProperty::new(info, source(), BufferWritePolicy::CopyOnWrite).unwrap();
        let b = BinaryProperty::new(info, source(), BufferWritePolicy::CopyOnWrite).unwrap();

        assert!(a.set_value(0, &PropertyValue::Scalar(42.0)));
        assert_eq!(a.get_value(0), Some(PropertyValue::Scalar(42.0)));
        assert_eq!(b.get_value(0), Some(PropertyValue::Scalar(1.0)));
        assert_eq!(buffer.data.read()[0], 1);
    }

    #[test]
    fn test_alias_policy_writes_through() {
        let buffer = DocumentBuffer::new(vec![1, 2]);
        let info = AccessorInfo::new(ComponentType::Uint8, ValueShape::Scalar, 2);
        let source = || BinarySource::Embedded { buffer: buffer.clone(), byte_offset: 0, byte_stride: None };
        let mut a = BinaryProperty::new(info, source(), BufferWritePolicy::Alias).unwrap();
        let b = BinaryProperty::new(info, source(), BufferWritePolicy::Alias).unwrap();

        assert!(a.set_value(1, &PropertyValue::Scalar(42.0)));
        assert!(!a.has_private_storage());
        assert_eq!(b.get_value(1), Some(PropertyValue::Scalar(42.0)));
        assert_eq!(buffer.data.read()[1], 42);
    }
}
