//! Identity tables shared by every encode call of one connection.

use hookwire_core::collections::map::HashMap;
use hookwire_core::collections::IndexMap;
use hookwire_core::{Callback, ExternalObject};

/// Maps live instances to the ids the receiving side knows them by.
///
/// Instances are keyed by pointer identity. The session keeps a clone of
/// every registered instance, so an address stays reserved for as long as
/// its id is known.
pub struct EncodingSession {
    callable_prefix: String,
    object_ids: HashMap<usize, u64>,
    objects: IndexMap<u64, ExternalObject>,
    callable_ids: HashMap<usize, String>,
    callables: IndexMap<String, Callback>,
    next_object: u64,
    next_callable: u64,
}

impl EncodingSession {
    pub fn new(callable_prefix: impl Into<String>) -> Self {
        Self {
            callable_prefix: callable_prefix.into(),
            object_ids: HashMap::default(),
            objects: IndexMap::default(),
            callable_ids: HashMap::default(),
            callables: IndexMap::default(),
            next_object: 0,
            next_callable: 0,
        }
    }

    /// Id of `object`, registering it on first sight. The flag is true when
    /// the id was assigned by this call.
    pub(crate) fn object_id(&mut self, object: &ExternalObject) -> (u64, bool) {
        if let Some(&id) = self.object_ids.get(&object.identity()) {
            return (id, false);
        }
        let id = self.next_object;
        self.next_object += 1;
        self.object_ids.insert(object.identity(), id);
        self.objects.insert(id, object.clone());
        (id, true)
    }

    pub(crate) fn callable_id(&mut self, callable: &Callback) -> (String, bool) {
        if let Some(id) = self.callable_ids.get(&callable.identity()) {
            return (id.clone(), false);
        }
        let id = format!("{}{}", self.callable_prefix, self.next_callable);
        self.next_callable += 1;
        self.callable_ids.insert(callable.identity(), id.clone());
        self.callables.insert(id.clone(), callable.clone());
        (id, true)
    }

    /// The exact instance registered under `id`.
    pub fn resolve_object(&self, id: u64) -> Option<&ExternalObject> {
        self.objects.get(&id)
    }

    pub fn resolve_callable(&self, id: &str) -> Option<&Callback> {
        self.callables.get(id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn callable_count(&self) -> usize {
        self.callables.len()
    }

    /// Known object ids in registration order.
    pub fn object_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.objects.keys().copied()
    }

    pub fn callable_ids(&self) -> impl Iterator<Item = &str> {
        self.callables.keys().map(String::as_str)
    }

    /// Forget `id`. A later encode of the same instance assigns a fresh id.
    pub fn release_object(&mut self, id: u64) -> Option<ExternalObject> {
        let object = self.objects.shift_remove(&id)?;
        self.object_ids.remove(&object.identity());
        Some(object)
    }

    pub fn release_callable(&mut self, id: &str) -> Option<Callback> {
        let callable = self.callables.shift_remove(id)?;
        self.callable_ids.remove(&callable.identity());
        Some(callable)
    }

    /// Drop every registration. Counters keep growing so ids are never reused.
    pub fn clear(&mut self) {
        self.object_ids.clear();
        self.objects.clear();
        self.callable_ids.clear();
        self.callables.clear();
    }
}

impl Default for EncodingSession {
    fn default() -> Self {
        Self::new(crate::DEFAULT_CALLABLE_PREFIX)
    }
}

impl std::fmt::Debug for EncodingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncodingSession")
            .field("objects", &self.objects.len())
            .field("callables", &self.callables.len())
            .field("next_object", &self.next_object)
            .field("next_callable", &self.next_callable)
            .finish()
    }
}
