//! Mutable program objects: classes and their encoded members.

use crate::items::{FieldId, MethodId, StringId, TypeId};

bitflags::bitflags! {
    /// Access flags shared by classes, fields, and methods.
    ///
    /// See: <https://source.android.com/docs/core/runtime/dex-format#access-flags>
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AccessFlags: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const VOLATILE = 0x0040;
        const BRIDGE = 0x0040;
        const TRANSIENT = 0x0080;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
        const CONSTRUCTOR = 0x10000;
        const DECLARED_SYNCHRONIZED = 0x20000;
    }
}

impl AccessFlags {
    #[inline]
    pub fn is_public(self) -> bool {
        self.contains(Self::PUBLIC)
    }

    #[inline]
    pub fn is_private(self) -> bool {
        self.contains(Self::PRIVATE)
    }

    #[inline]
    pub fn is_protected(self) -> bool {
        self.contains(Self::PROTECTED)
    }

    #[inline]
    pub fn is_static(self) -> bool {
        self.contains(Self::STATIC)
    }

    #[inline]
    pub fn is_final(self) -> bool {
        self.contains(Self::FINAL)
    }

    #[inline]
    pub fn is_native(self) -> bool {
        self.contains(Self::NATIVE)
    }

    #[inline]
    pub fn is_interface(self) -> bool {
        self.contains(Self::INTERFACE)
    }

    #[inline]
    pub fn is_abstract(self) -> bool {
        self.contains(Self::ABSTRACT)
    }

    #[inline]
    pub fn is_synthetic(self) -> bool {
        self.contains(Self::SYNTHETIC)
    }

    #[inline]
    pub fn is_annotation(self) -> bool {
        self.contains(Self::ANNOTATION)
    }

    #[inline]
    pub fn is_enum(self) -> bool {
        self.contains(Self::ENUM)
    }

    #[inline]
    pub fn is_constructor(self) -> bool {
        self.contains(Self::CONSTRUCTOR)
    }

    /// Dalvik's rule for which vector a method belongs in: constructors,
    /// statics, and privates are "direct"; everything else is "virtual".
    #[inline]
    pub fn is_direct_method(self) -> bool {
        self.is_constructor() || self.is_static() || self.is_private()
    }
}

/// Where a class was read from. Library classes are opaque to the enqueuer
/// (they are "may be anything" roots); classpath classes are resolved for
/// type information but never shrunk or renamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Program,
    Classpath,
    Library,
}

/// Move-type tag carried on every SSA value in [`IrCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveType {
    Single,
    Wide,
    Object,
}

/// A single DEX-register-based instruction, kept as a tagged variant
/// (opcode + formatted operands) rather than one type per opcode — the
/// compact representation noted as equivalent to a one-subclass-per-opcode
/// source layout.
#[derive(Debug, Clone)]
pub struct DexInstruction {
    pub opcode: u16,
    pub operands: smallvec::SmallVec<[i64; 4]>,
}

/// Register-based method body as read from a DEX file, prior to SSA
/// construction.
#[derive(Debug, Clone, Default)]
pub struct DexCode {
    pub registers_size: u16,
    pub ins_size: u16,
    pub outs_size: u16,
    pub instructions: Vec<DexInstruction>,
}

/// The dispatch kind of an `invoke-*` instruction, needed by the enqueuer to
/// pick the right resolution rule (§4.4) and by the call-graph builder to
/// classify edges (§4.5/§4.6 indices).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    Virtual,
    Interface,
    Super,
    Direct,
    Static,
}

/// The read/write × static/instance classification of a field access,
/// needed by the enqueuer's field-resolution rule and the writer's
/// static/instance-fields-read/written indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAccessKind {
    InstanceRead,
    InstanceWrite,
    StaticRead,
    StaticWrite,
}

/// One instruction in the SSA-CFG intermediate representation used by the
/// optimizer passes (§4.6's scheduling, peephole/regalloc bodies
/// themselves out of scope).
#[derive(Debug, Clone)]
pub struct IrInstruction {
    pub opcode: u16,
    pub move_type: Option<MoveType>,
    /// SSA value indices consumed.
    pub uses: smallvec::SmallVec<[u32; 4]>,
    /// SSA value index produced, if any.
    pub def: Option<u32>,
    /// For invoke-* instructions, the referenced method and dispatch kind.
    pub invoked_method: Option<MethodId>,
    pub invoke_kind: Option<InvokeKind>,
    /// For field access instructions, the referenced field and access kind.
    pub accessed_field: Option<FieldId>,
    pub field_access: Option<FieldAccessKind>,
    /// For new-instance / const-class / instance-of / check-cast, the
    /// referenced type.
    pub referenced_type: Option<TypeId>,
}

#[derive(Debug, Clone, Default)]
pub struct BasicBlock {
    pub instructions: Vec<IrInstruction>,
    pub successors: smallvec::SmallVec<[u32; 2]>,
}

#[derive(Debug, Clone, Default)]
pub struct IrCode {
    pub blocks: Vec<BasicBlock>,
}

/// Either representation a method body can be in. Readers produce
/// [`Code::Dex`]; the optimizer lifts it to [`Code::Ir`] before scheduling
/// passes over the call graph.
#[derive(Debug, Clone)]
pub enum Code {
    Dex(DexCode),
    Ir(IrCode),
}

#[derive(Debug, Clone)]
pub enum EncodedValue {
    Byte(i8),
    Short(i16),
    Char(u16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(StringId),
    Type(TypeId),
    Field(FieldId),
    Method(MethodId),
    Enum(FieldId),
    Array(Vec<EncodedValue>),
    Annotation(Box<Annotation>),
    Null,
    Boolean(bool),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationVisibility {
    Build,
    Runtime,
    System,
}

#[derive(Debug, Clone)]
pub struct Annotation {
    pub annotation_type: TypeId,
    pub visibility: AnnotationVisibility,
    pub elements: Vec<(StringId, EncodedValue)>,
}

#[derive(Debug, Clone)]
pub struct DebugInfo {
    pub line_start: u32,
    /// Source-debug fidelity is a Non-goal; this holds only enough to
    /// resolve local-variable type consistency (§7, debug-info
    /// inconsistency) and is otherwise opaque.
    pub local_types: Vec<(u16, TypeId)>,
}

#[derive(Debug, Clone)]
pub struct EncodedMethod {
    pub method_ref: MethodId,
    pub access_flags: AccessFlags,
    pub code: Option<Code>,
    pub debug_info: Option<DebugInfo>,
    pub annotations: Vec<Annotation>,
}

impl EncodedMethod {
    pub fn is_abstract_or_native(&self) -> bool {
        self.code.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct EncodedField {
    pub field_ref: FieldId,
    pub access_flags: AccessFlags,
    pub static_value: Option<EncodedValue>,
    pub annotations: Vec<Annotation>,
}

/// A program, classpath, or library class.
///
/// Invariants (checked by [`Class::validate`]):
/// - `self.class_type != self.super_type`
/// - `self.class_type` does not appear in `self.interfaces`
/// - every method in `direct_methods` satisfies
///   [`AccessFlags::is_direct_method`]; every method in `virtual_methods`
///   does not.
#[derive(Debug, Clone)]
pub struct Class {
    pub class_type: TypeId,
    pub origin: Origin,
    pub access_flags: AccessFlags,
    pub super_type: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    pub source_file: Option<StringId>,
    pub annotations: Vec<Annotation>,
    pub static_fields: Vec<EncodedField>,
    pub instance_fields: Vec<EncodedField>,
    pub direct_methods: Vec<EncodedMethod>,
    pub virtual_methods: Vec<EncodedMethod>,
}

impl Class {
    pub fn validate(&self) -> Result<(), crate::GraphError> {
        if self.super_type == Some(self.class_type) {
            return Err(crate::GraphError::SelfSuperType(self.class_type));
        }
        if self.interfaces.contains(&self.class_type) {
            return Err(crate::GraphError::SelfInterface(self.class_type));
        }
        if self
            .direct_methods
            .iter()
            .any(|m| !m.access_flags.is_direct_method())
            || self
                .virtual_methods
                .iter()
                .any(|m| m.access_flags.is_direct_method())
        {
            return Err(crate::GraphError::BadDirectVirtualPartition(
                self.class_type,
            ));
        }
        Ok(())
    }

    pub fn all_methods(&self) -> impl Iterator<Item = &EncodedMethod> {
        self.direct_methods.iter().chain(self.virtual_methods.iter())
    }

    pub fn all_fields(&self) -> impl Iterator<Item = &EncodedField> {
        self.static_fields.iter().chain(self.instance_fields.iter())
    }

    pub fn has_non_trivial_class_initializer(&self) -> bool {
        self.direct_methods.iter().any(|m| {
            m.access_flags.is_static()
                && m.code
                    .as_ref()
                    .map(|c| match c {
                        Code::Dex(d) => !d.instructions.is_empty(),
                        Code::Ir(cfg) => cfg.blocks.iter().any(|b| !b.instructions.is_empty()),
                    })
                    .unwrap_or(false)
        })
    }
}
