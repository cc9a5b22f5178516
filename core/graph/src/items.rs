//! Interned primitives: strings, types, protos, method references, field
//! references.
//!
//! Every handle here is a small `Copy` index into [`crate::Factory`]'s
//! internal tables rather than a direct reference, per the arena-of-indices
//! design noted for this model: classes reference each other by interned
//! type, never by direct ownership, which keeps the ownership graph acyclic
//! even though the logical class graph has cycles.

use std::fmt;

/// Index into the factory's string table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StringId(pub(crate) u32);

/// Index into the factory's type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TypeId(pub(crate) u32);

/// Index into the factory's proto table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProtoId(pub(crate) u32);

/// Index into the factory's method-reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MethodId(pub(crate) u32);

/// Index into the factory's field-reference table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldId(pub(crate) u32);

/// Index into the factory's class table (a [`crate::Class`] is owned by the
/// application, not the factory, but is still addressed by index).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClassId(pub(crate) u32);

bitflags::bitflags! {
    /// Flag set carried on every [`Type`]: what kind of type it is.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct TypeFlags: u8 {
        const IS_CLASS     = 0b0001;
        const IS_ARRAY     = 0b0010;
        const IS_PRIMITIVE = 0b0100;
        const IS_INTERFACE = 0b1000;
    }
}

/// An interned type: a class descriptor (`Lpkg/Name;`), an array type, or a
/// primitive. Two `Type`s with equal descriptor bytes are always the same
/// `TypeId` — the factory's interner guarantees it.
#[derive(Debug, Clone)]
pub struct Type {
    pub descriptor: StringId,
    pub flags: TypeFlags,
    /// Set once the class this type names has been read (absent for
    /// library/missing classes — a recoverable, not fatal, state).
    pub definition: Option<ClassId>,
}

impl Type {
    pub fn is_class(&self) -> bool {
        self.flags.contains(TypeFlags::IS_CLASS)
    }

    pub fn is_array(&self) -> bool {
        self.flags.contains(TypeFlags::IS_ARRAY)
    }

    pub fn is_primitive(&self) -> bool {
        self.flags.contains(TypeFlags::IS_PRIMITIVE)
    }

    pub fn is_interface(&self) -> bool {
        self.flags.contains(TypeFlags::IS_INTERFACE)
    }

    /// Classify a descriptor string into its flag set. Does not validate
    /// syntax beyond the leading tag byte; callers that need full validation
    /// should use [`crate::Factory::create_type`], which rejects malformed
    /// descriptors.
    pub(crate) fn classify(descriptor: &str) -> TypeFlags {
        match descriptor.as_bytes().first() {
            Some(b'L') => TypeFlags::IS_CLASS,
            Some(b'[') => TypeFlags::IS_ARRAY,
            Some(_) => TypeFlags::IS_PRIMITIVE,
            None => TypeFlags::empty(),
        }
    }
}

/// A method prototype: return type plus parameter types. Two methods with
/// the same name but different protos are different overloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Proto {
    pub return_type: TypeId,
    pub parameters: smallvec::SmallVec<[TypeId; 4]>,
}

/// A reference to a method: holder type, name, and prototype. Identity of
/// `(holder, name, proto)` defines overloading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub holder: TypeId,
    pub name: StringId,
    pub proto: ProtoId,
}

/// A reference to a field: holder type, name, and field type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldRef {
    pub holder: TypeId,
    pub name: StringId,
    pub field_type: TypeId,
}

impl fmt::Display for StringId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "str#{}", self.0)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type#{}", self.0)
    }
}
