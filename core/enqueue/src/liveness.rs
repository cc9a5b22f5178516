//! `AppInfoWithLiveness`: the frozen, sorted output of the enqueuer
//! fixpoint (§4.4).

use shrinker_graph::{FieldId, MethodId, TypeId};

#[derive(Debug, Default)]
pub struct AppInfoWithLiveness {
    pub live_types: Vec<TypeId>,
    pub instantiated_types: Vec<TypeId>,
    pub live_methods: Vec<MethodId>,
    pub live_fields: Vec<FieldId>,
    pub targeted_methods: Vec<MethodId>,

    pub virtual_invokes: Vec<(MethodId, MethodId)>,
    pub interface_invokes: Vec<(MethodId, MethodId)>,
    pub super_invokes: Vec<(MethodId, MethodId)>,
    pub direct_invokes: Vec<(MethodId, MethodId)>,
    pub static_invokes: Vec<(MethodId, MethodId)>,

    pub instance_fields_read: Vec<(MethodId, FieldId)>,
    pub instance_fields_written: Vec<(MethodId, FieldId)>,
    pub static_fields_read: Vec<(MethodId, FieldId)>,
    pub static_fields_written: Vec<(MethodId, FieldId)>,
}
