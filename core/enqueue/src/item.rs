//! `Item`: a tagged sum over the three kinds of program item a keep rule or
//! liveness event can name. Expressed as an enum rather than an inheritance
//! hierarchy so every dispatch site is exhaustiveness-checked (§9 design
//! note).

use shrinker_graph::{ClassId, FieldId, MethodId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Item {
    Class(ClassId),
    Method(MethodId),
    Field(FieldId),
}

impl From<ClassId> for Item {
    fn from(id: ClassId) -> Self {
        Item::Class(id)
    }
}

impl From<MethodId> for Item {
    fn from(id: MethodId) -> Self {
        Item::Method(id)
    }
}

impl From<FieldId> for Item {
    fn from(id: FieldId) -> Self {
        Item::Field(id)
    }
}

/// Why an item ended up in a given set, kept for `-whyareyoukeeping`
/// diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeepReason {
    /// Rule index into the configuration's rule list.
    Rule(usize),
    Instantiated,
    InvokedVirtual,
    InvokedInterface,
    InvokedSuper(MethodId),
    FieldAccess,
    ClassInitializer,
    Annotation,
    Supertype,
    Interface,
    DependentSurvival(Item),
}
