//! The interned item factory: one per compilation, owning every string,
//! type, proto, method reference, and field reference, plus the
//! program/classpath/library class table.
//!
//! Concurrency contract (§5): creation (`create_*`) is serialized through
//! a single write lock; lookups (`get_*`, `definition_for`) take only a
//! read lock and may run concurrently with each other.

use std::sync::{Arc, RwLock};

use ahash::AHashMap;

use crate::class::Class;
use crate::items::{ClassId, FieldId, FieldRef, MethodId, MethodRef, Proto, ProtoId, StringId, Type, TypeId};
use crate::GraphError;

#[derive(Default)]
struct Interner<K, V> {
    values: Vec<V>,
    index: AHashMap<K, u32>,
}

impl<K: std::hash::Hash + Eq + Clone, V> Interner<K, V> {
    fn intern(&mut self, key: K, make: impl FnOnce() -> V) -> u32 {
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = self.values.len() as u32;
        self.values.push(make());
        self.index.insert(key, id);
        id
    }
}

#[derive(Default)]
struct FactoryInner {
    strings: Interner<Arc<str>, Arc<str>>,
    types: Interner<Arc<str>, Type>,
    protos: Interner<Proto, Proto>,
    methods: Interner<MethodRef, MethodRef>,
    fields: Interner<FieldRef, FieldRef>,
    classes: Vec<Class>,
    definitions: AHashMap<TypeId, ClassId>,
}

/// The process-wide-per-compilation interned item factory.
///
/// Implementations must pass this explicitly rather than reach for process
/// global state, so that two compilations (e.g. in tests) never share
/// interning tables.
pub struct Factory {
    inner: RwLock<FactoryInner>,
}

impl Default for Factory {
    fn default() -> Self {
        Self::new()
    }
}

impl Factory {
    pub fn new() -> Self {
        Factory {
            inner: RwLock::new(FactoryInner::default()),
        }
    }

    /// Intern a string. Idempotent: equal bytes always return the same id.
    pub fn create_string(&self, value: &str) -> StringId {
        let mut inner = self.inner.write().expect("factory poisoned");
        let id = inner.strings.intern(Arc::from(value), || Arc::from(value));
        StringId(id)
    }

    pub fn get_string(&self, id: StringId) -> Arc<str> {
        let inner = self.inner.read().expect("factory poisoned");
        inner.strings.values[id.0 as usize].clone()
    }

    /// Intern a type by descriptor (`Lpkg/Name;`, `[I`, `I`, …).
    pub fn create_type(&self, descriptor: &str) -> Result<TypeId, GraphError> {
        if descriptor.is_empty() {
            return Err(GraphError::InvalidDescriptor(descriptor.to_string()));
        }
        let flags = Type::classify(descriptor);
        if flags.contains(crate::items::TypeFlags::IS_CLASS)
            && !descriptor.ends_with(';')
        {
            return Err(GraphError::InvalidDescriptor(descriptor.to_string()));
        }

        let mut inner = self.inner.write().expect("factory poisoned");
        let key: Arc<str> = Arc::from(descriptor);
        let string_id = inner.strings.intern(key.clone(), || key.clone());
        let id = inner.types.intern(key, || Type {
            descriptor: StringId(string_id),
            flags,
            definition: None,
        });
        Ok(TypeId(id))
    }

    pub fn get_type(&self, id: TypeId) -> Type {
        let inner = self.inner.read().expect("factory poisoned");
        inner.types.values[id.0 as usize].clone()
    }

    pub fn type_descriptor(&self, id: TypeId) -> Arc<str> {
        let descriptor_id = self.get_type(id).descriptor;
        self.get_string(descriptor_id)
    }

    pub fn create_proto(&self, return_type: TypeId, parameters: &[TypeId]) -> ProtoId {
        let proto = Proto {
            return_type,
            parameters: parameters.iter().copied().collect(),
        };
        let mut inner = self.inner.write().expect("factory poisoned");
        let id = inner.protos.intern(proto.clone(), || proto);
        ProtoId(id)
    }

    pub fn get_proto(&self, id: ProtoId) -> Proto {
        let inner = self.inner.read().expect("factory poisoned");
        inner.protos.values[id.0 as usize].clone()
    }

    pub fn create_method(&self, holder: TypeId, name: StringId, proto: ProtoId) -> MethodId {
        let method_ref = MethodRef { holder, name, proto };
        let mut inner = self.inner.write().expect("factory poisoned");
        let id = inner.methods.intern(method_ref, || method_ref);
        MethodId(id)
    }

    pub fn get_method(&self, id: MethodId) -> MethodRef {
        let inner = self.inner.read().expect("factory poisoned");
        inner.methods.values[id.0 as usize]
    }

    pub fn create_field(&self, holder: TypeId, name: StringId, field_type: TypeId) -> FieldId {
        let field_ref = FieldRef { holder, name, field_type };
        let mut inner = self.inner.write().expect("factory poisoned");
        let id = inner.fields.intern(field_ref, || field_ref);
        FieldId(id)
    }

    pub fn get_field(&self, id: FieldId) -> FieldRef {
        let inner = self.inner.read().expect("factory poisoned");
        inner.fields.values[id.0 as usize]
    }

    /// Register a class in the application's class table. The factory owns
    /// the index; the application owns the `Class` value (§3: "the
    /// application exclusively owns its classes").
    pub fn define_class(&self, class: Class) -> Result<ClassId, GraphError> {
        class.validate()?;
        let class_type = class.class_type;
        let mut inner = self.inner.write().expect("factory poisoned");
        let id = ClassId(inner.classes.len() as u32);
        inner.classes.push(class);
        inner.definitions.insert(class_type, id);
        inner.types.values[class_type.0 as usize].definition = Some(id);
        Ok(id)
    }

    /// O(1) lookup: type → class, or `None` for library/missing classes.
    pub fn definition_for(&self, ty: TypeId) -> Option<ClassId> {
        let inner = self.inner.read().expect("factory poisoned");
        inner.definitions.get(&ty).copied()
    }

    pub fn with_class<R>(&self, id: ClassId, f: impl FnOnce(&Class) -> R) -> R {
        let inner = self.inner.read().expect("factory poisoned");
        f(&inner.classes[id.0 as usize])
    }

    pub fn mutate_class<R>(&self, id: ClassId, f: impl FnOnce(&mut Class) -> R) -> R {
        let mut inner = self.inner.write().expect("factory poisoned");
        f(&mut inner.classes[id.0 as usize])
    }

    pub fn class_count(&self) -> usize {
        self.inner.read().expect("factory poisoned").classes.len()
    }

    pub fn class_ids(&self) -> Vec<ClassId> {
        let inner = self.inner.read().expect("factory poisoned");
        (0..inner.classes.len() as u32).map(ClassId).collect()
    }

    /// Compute the sort order the factory's type table would have after a
    /// rename lens is applied, keyed by the post-rename descriptor. The
    /// writer driver uses this order to assign the final stable indices —
    /// per spec, indices are only meaningful once assigned after this sort.
    pub fn sorted_type_order(&self, lens: &crate::Lens) -> Vec<TypeId> {
        let inner = self.inner.read().expect("factory poisoned");
        let mut ids: Vec<TypeId> = (0..inner.types.values.len() as u32).map(TypeId).collect();
        ids.sort_by(|&a, &b| {
            let da = lens
                .renamed_type(a)
                .unwrap_or_else(|| inner.types.values[a.0 as usize].descriptor_str(&inner.strings.values));
            let db = lens
                .renamed_type(b)
                .unwrap_or_else(|| inner.types.values[b.0 as usize].descriptor_str(&inner.strings.values));
            da.cmp(&db)
        });
        ids
    }
}

impl Type {
    fn descriptor_str(&self, strings: &[Arc<str>]) -> Arc<str> {
        strings[self.descriptor.0 as usize].clone()
    }
}
