//! The renaming lens produced by the minifier and consumed read-through by
//! every downstream phase (distributor, writer). Renaming is never applied
//! destructively in place until the writer consumes the lens — see §3.

use std::sync::Arc;

use ahash::AHashMap;

use crate::items::{MethodId, TypeId};

/// A read-through view of "what did the minifier decide to call this item".
/// Absence of an entry means "keep the original name".
#[derive(Debug, Default, Clone)]
pub struct Lens {
    types: AHashMap<TypeId, Arc<str>>,
    methods: AHashMap<MethodId, Arc<str>>,
}

impl Lens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rename_type(&mut self, ty: TypeId, new_descriptor: Arc<str>) {
        self.types.insert(ty, new_descriptor);
    }

    pub fn rename_method(&mut self, method: MethodId, new_name: Arc<str>) {
        self.methods.insert(method, new_name);
    }

    pub fn renamed_type(&self, ty: TypeId) -> Option<Arc<str>> {
        self.types.get(&ty).cloned()
    }

    pub fn renamed_method(&self, method: MethodId) -> Option<Arc<str>> {
        self.methods.get(&method).cloned()
    }

    pub fn type_count(&self) -> usize {
        self.types.len()
    }

    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    pub fn type_entries(&self) -> impl Iterator<Item = (TypeId, &Arc<str>)> {
        self.types.iter().map(|(&k, v)| (k, v))
    }

    pub fn method_entries(&self) -> impl Iterator<Item = (MethodId, &Arc<str>)> {
        self.methods.iter().map(|(&k, v)| (k, v))
    }
}
