//! Properties stored as plain JSON arrays.

use futures::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::{debug, warn};

use super::{resolved, StorageState};
use crate::core::{CachedValue, SharedFetch};
use crate::util::ElementType;

enum ArrayState {
    /// Private copy, safe to mutate
    Owned(Vec<Value>),
    /// Array living in a cached external document
    Cached(SharedFetch<CachedValue>),
}

/// Property whose per-feature values are elements of a JSON array.
///
/// Inline arrays are copied out of the schema at construction. External
/// arrays are read straight from the resource cache until the first write,
/// which copies the whole array so the cached document stays untouched.
pub struct ArrayProperty {
    element_type: ElementType,
    state: ArrayState,
}

impl ArrayProperty {
    /// Property over a private copy of `values`.
    pub fn inline(element_type: ElementType, values: &[Value]) -> Self {
        Self {
            element_type,
            state: ArrayState::Owned(values.to_vec()),
        }
    }

    /// Property reading from a cached external document.
    pub fn external(element_type: ElementType, fetch: SharedFetch<CachedValue>) -> Self {
        Self {
            element_type,
            state: ArrayState::Cached(fetch),
        }
    }

    /// Declared element type.
    #[inline]
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Returns true while reads go to the cached document.
    pub fn is_shared_with_cache(&self) -> bool {
        matches!(self.state, ArrayState::Cached(_))
    }

    /// Current storage state.
    pub fn state(&self) -> StorageState {
        match &self.state {
            ArrayState::Cached(fetch) if resolved(fetch).is_none() => StorageState::Pending,
            _ => StorageState::Ready,
        }
    }

    /// Number of elements currently available, if resolved.
    pub fn element_count(&self) -> Option<usize> {
        match &self.state {
            ArrayState::Owned(values) => Some(values.len()),
            ArrayState::Cached(fetch) => {
                let cached = resolved(fetch)?;
                Some(cached.get().and_then(Value::as_array).map_or(0, Vec::len))
            }
        }
    }

    /// Element `id`, or `None` when pending, missing, or out of bounds.
    pub fn get_value(&self, id: usize) -> Option<Value> {
        match &self.state {
            ArrayState::Owned(values) => values.get(id).cloned(),
            ArrayState::Cached(fetch) => {
                let cached = resolved(fetch)?;
                cached.get()?.as_array()?.get(id).cloned()
            }
        }
    }

    /// Replace element `id`, extending the array with nulls when needed.
    ///
    /// Returns false when the external document has not arrived yet.
    pub fn set_value(&mut self, id: usize, value: Value) -> bool {
        if let ArrayState::Cached(fetch) = &self.state {
            let Some(cached) = resolved(fetch) else {
                warn!(id, "dropping write to array whose document has not arrived");
                return false;
            };
            let values = cached.get().and_then(Value::as_array).cloned().unwrap_or_default();
            debug!(key = cached.key(), len = values.len(), "copying cached array before write");
            self.state = ArrayState::Owned(values);
        }

        let ArrayState::Owned(values) = &mut self.state else {
            return false;
        };
        if id >= values.len() {
            values.resize(id + 1, Value::Null);
        }
        values[id] = value;
        true
    }

    pub(crate) fn pending_fetch(&self) -> Option<BoxFuture<'static, ()>> {
        match &self.state {
            ArrayState::Cached(fetch) => Some(fetch.clone().map(|_| ()).boxed()),
            ArrayState::Owned(_) => None,
        }
    }
}
