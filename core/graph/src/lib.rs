//! The interned program-graph data model.
//!
//! This crate owns the single source of truth for the whole-program
//! compiler pipeline: interned strings/types/protos/method-refs/field-refs,
//! the mutable `Class`/`EncodedMethod`/`EncodedField` objects they describe,
//! the subtype index used for virtual dispatch, and the deterministic
//! total order ("slow-compare") every downstream phase sorts by before it
//! hands a set to the next phase.

pub mod class;
pub mod compare;
pub mod errors;
pub mod factory;
pub mod items;
pub mod lens;
pub mod subtype;

pub use class::{
    AccessFlags, Annotation, AnnotationVisibility, BasicBlock, Class, Code, DebugInfo, DexCode,
    DexInstruction, EncodedField, EncodedMethod, EncodedValue, FieldAccessKind, InvokeKind, IrCode,
    IrInstruction, MoveType, Origin,
};
pub use compare::{compare_fields, compare_methods, compare_types, slow_sort};
pub use errors::GraphError;
pub use factory::Factory;
pub use items::{ClassId, FieldId, FieldRef, MethodId, MethodRef, Proto, ProtoId, StringId, Type, TypeFlags, TypeId};
pub use lens::Lens;
pub use subtype::SubtypeIndex;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let factory = Factory::new();
        let a = factory.create_type("Lcom/example/Foo;").unwrap();
        let b = factory.create_type("Lcom/example/Foo;").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn array_and_primitive_types_are_classified() {
        let factory = Factory::new();
        let arr = factory.create_type("[I").unwrap();
        let prim = factory.create_type("I").unwrap();
        assert!(factory.get_type(arr).is_array());
        assert!(factory.get_type(prim).is_primitive());
    }

    #[test]
    fn malformed_class_descriptor_is_rejected() {
        let factory = Factory::new();
        assert!(factory.create_type("Lcom/example/Foo").is_err());
    }

    #[test]
    fn class_may_not_extend_itself() {
        let factory = Factory::new();
        let ty = factory.create_type("La;").unwrap();
        let err = factory.define_class(Class {
            class_type: ty,
            origin: Origin::Program,
            access_flags: AccessFlags::PUBLIC,
            super_type: Some(ty),
            interfaces: vec![],
            source_file: None,
            annotations: vec![],
            static_fields: vec![],
            instance_fields: vec![],
            direct_methods: vec![],
            virtual_methods: vec![],
        });
        assert!(matches!(err, Err(GraphError::SelfSuperType(_))));
    }
}
