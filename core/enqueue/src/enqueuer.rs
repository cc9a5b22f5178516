//! The liveness-fixpoint enqueuer (§4.4) — the hardest part. Single-threaded
//! per §5: the work-list drain is sequential, and sibling work at every fork
//! point is sorted by `slow_compare` so the fixpoint is deterministic.

use std::collections::VecDeque;

use ahash::{AHashMap, AHashSet};
use shrinker_graph::{
    compare_fields, compare_methods, compare_types, slow_sort, Code, Factory, FieldAccessKind,
    FieldId, InvokeKind, MethodId, ProtoId, StringId, SubtypeIndex, TypeId,
};

use crate::item::{Item, KeepReason};
use crate::liveness::AppInfoWithLiveness;
use crate::rootset::RootSet;
use crate::EnqueueError;

#[derive(Debug)]
enum Event {
    MarkInstantiated(TypeId, KeepReason),
    MarkMethodLive(MethodId, KeepReason),
    MarkMethodKept(MethodId, KeepReason),
    MarkFieldKept(FieldId, KeepReason),
    MarkReachableSuper(MethodId, MethodId),
}

pub struct Enqueuer<'a> {
    factory: &'a Factory,
    subtypes: &'a SubtypeIndex,
    ignore_missing: bool,

    live_types: AHashSet<TypeId>,
    instantiated_types: AHashSet<TypeId>,
    live_methods: AHashMap<MethodId, KeepReason>,
    live_fields: AHashMap<FieldId, KeepReason>,
    targeted_methods: AHashSet<MethodId>,
    pinned_methods: AHashSet<MethodId>,
    pinned_fields: AHashSet<FieldId>,

    reachable_virtual_methods: AHashMap<TypeId, AHashSet<MethodId>>,
    super_invoke_dependencies: AHashMap<MethodId, AHashSet<MethodId>>,

    virtual_invokes: Vec<(MethodId, MethodId)>,
    interface_invokes: Vec<(MethodId, MethodId)>,
    super_invokes: Vec<(MethodId, MethodId)>,
    direct_invokes: Vec<(MethodId, MethodId)>,
    static_invokes: Vec<(MethodId, MethodId)>,
    instance_fields_read: Vec<(MethodId, FieldId)>,
    instance_fields_written: Vec<(MethodId, FieldId)>,
    static_fields_read: Vec<(MethodId, FieldId)>,
    static_fields_written: Vec<(MethodId, FieldId)>,

    missing: AHashSet<String>,
    worklist: VecDeque<Event>,
}

impl<'a> Enqueuer<'a> {
    pub fn new(factory: &'a Factory, subtypes: &'a SubtypeIndex, ignore_missing: bool) -> Self {
        Enqueuer {
            factory,
            subtypes,
            ignore_missing,
            live_types: AHashSet::default(),
            instantiated_types: AHashSet::default(),
            live_methods: AHashMap::default(),
            live_fields: AHashMap::default(),
            targeted_methods: AHashSet::default(),
            pinned_methods: AHashSet::default(),
            pinned_fields: AHashSet::default(),
            reachable_virtual_methods: AHashMap::default(),
            super_invoke_dependencies: AHashMap::default(),
            virtual_invokes: Vec::new(),
            interface_invokes: Vec::new(),
            super_invokes: Vec::new(),
            direct_invokes: Vec::new(),
            static_invokes: Vec::new(),
            instance_fields_read: Vec::new(),
            instance_fields_written: Vec::new(),
            static_fields_read: Vec::new(),
            static_fields_written: Vec::new(),
            missing: AHashSet::default(),
            worklist: VecDeque::new(),
        }
    }

    pub fn run(mut self, root_set: &RootSet) -> Result<AppInfoWithLiveness, EnqueueError> {
        self.seed(root_set);
        while let Some(event) = self.worklist.pop_front() {
            self.process(event);
        }

        if !self.ignore_missing {
            if let Some(descriptor) = self.missing.iter().next() {
                return Err(EnqueueError::MissingReference { kind: "class", descriptor: descriptor.clone() });
            }
        }

        Ok(self.freeze())
    }

    fn seed(&mut self, root_set: &RootSet) {
        let mut items: Vec<Item> = root_set.no_shrinking.iter().copied().collect();
        items.sort_by(|a, b| self.compare_items(*a, *b));
        for item in items {
            self.seed_item(item, KeepReason::Rule(0));
        }
        // Conditional survival: every dependency of a rooted item is rooted
        // in turn (`includeDescriptorClasses`, §4.3 step 4).
        let mut deps: Vec<(Item, Item)> = Vec::new();
        for (item, targets) in &root_set.dependent_no_shrinking {
            if root_set.no_shrinking.contains(item) {
                for dep in targets.keys() {
                    deps.push((*item, *dep));
                }
            }
        }
        deps.sort_by(|a, b| self.compare_items(a.1, b.1));
        for (item, dep) in deps {
            self.seed_item(dep, KeepReason::DependentSurvival(item));
        }
    }

    fn seed_item(&mut self, item: Item, reason: KeepReason) {
        match item {
            Item::Class(class_id) => {
                let ty = self.factory.with_class(class_id, |c| c.class_type);
                self.pinned_methods.extend(self.factory.with_class(class_id, |c| {
                    c.all_methods().map(|m| m.method_ref).collect::<Vec<_>>()
                }));
                self.pinned_fields.extend(self.factory.with_class(class_id, |c| {
                    c.all_fields().map(|f| f.field_ref).collect::<Vec<_>>()
                }));
                self.worklist.push_back(Event::MarkInstantiated(ty, reason));
            }
            Item::Method(method_id) => {
                self.pinned_methods.insert(method_id);
                self.worklist.push_back(Event::MarkMethodKept(method_id, reason));
            }
            Item::Field(field_id) => {
                self.pinned_fields.insert(field_id);
                self.worklist.push_back(Event::MarkFieldKept(field_id, reason));
            }
        }
    }

    fn compare_items(&self, a: Item, b: Item) -> std::cmp::Ordering {
        use std::cmp::Ordering;
        match (a, b) {
            (Item::Class(x), Item::Class(y)) => {
                let tx = self.factory.with_class(x, |c| c.class_type);
                let ty = self.factory.with_class(y, |c| c.class_type);
                compare_types(self.factory, tx, ty)
            }
            (Item::Method(x), Item::Method(y)) => compare_methods(self.factory, x, y),
            (Item::Field(x), Item::Field(y)) => compare_fields(self.factory, x, y),
            (Item::Class(_), _) => Ordering::Less,
            (_, Item::Class(_)) => Ordering::Greater,
            (Item::Method(_), Item::Field(_)) => Ordering::Less,
            (Item::Field(_), Item::Method(_)) => Ordering::Greater,
        }
    }

    fn process(&mut self, event: Event) {
        match event {
            Event::MarkInstantiated(ty, reason) => self.mark_instantiated(ty, reason),
            Event::MarkMethodLive(method_id, reason) => self.mark_method_live(method_id, reason),
            Event::MarkMethodKept(method_id, reason) => {
                self.pinned_methods.insert(method_id);
                self.mark_method_live(method_id, reason);
            }
            Event::MarkFieldKept(field_id, reason) => {
                self.pinned_fields.insert(field_id);
                self.mark_field_live(field_id, reason);
            }
            Event::MarkReachableSuper(from, target) => {
                self.super_invoke_dependencies.entry(from).or_default().insert(target);
                if self.live_methods.contains_key(&from) {
                    self.worklist.push_back(Event::MarkMethodLive(target, KeepReason::InvokedSuper(from)));
                }
            }
        }
    }

    fn mark_type_live(&mut self, ty: TypeId, reason: KeepReason) {
        if !self.live_types.insert(ty) {
            return;
        }
        log::debug!("type {} live ({:?})", self.factory.type_descriptor(ty), reason);
        let Some(class_id) = self.factory.definition_for(ty) else {
            let descriptor = self.factory.type_descriptor(ty);
            if self.factory.get_type(ty).is_class() {
                self.missing.insert(descriptor.to_string());
            }
            return;
        };
        let (super_type, interfaces, has_clinit) = self.factory.with_class(class_id, |c| {
            (c.super_type, c.interfaces.clone(), c.has_non_trivial_class_initializer())
        });
        if let Some(super_type) = super_type {
            self.mark_type_live(super_type, KeepReason::Supertype);
        }
        for iface in interfaces {
            self.mark_type_live(iface, KeepReason::Interface);
        }
        if has_clinit {
            let clinit = self.factory.with_class(class_id, |c| {
                c.direct_methods
                    .iter()
                    .find(|m| {
                        m.access_flags.is_static()
                            && self.factory.get_string(self.factory.get_method(m.method_ref).name).as_ref()
                                == "<clinit>"
                    })
                    .map(|m| m.method_ref)
            });
            if let Some(clinit) = clinit {
                self.worklist.push_back(Event::MarkMethodLive(clinit, KeepReason::ClassInitializer));
            }
        }
    }

    fn mark_instantiated(&mut self, ty: TypeId, reason: KeepReason) {
        let newly = self.instantiated_types.insert(ty);
        self.mark_type_live(ty, reason.clone());
        if newly {
            self.transition_methods_for_instantiated_class(ty);
        }
    }

    /// Walk up `ty`'s super-chain; a reachable-but-undispatched virtual
    /// method becomes live the first time a derived (or equal) class is
    /// instantiated, unless a more-derived override already claimed its
    /// signature.
    fn transition_methods_for_instantiated_class(&mut self, ty: TypeId) {
        let mut shadowed: AHashSet<(StringId, ProtoId)> = AHashSet::default();
        let mut current = Some(ty);
        while let Some(current_ty) = current {
            if let Some(class_id) = self.factory.definition_for(current_ty) {
                let own_signatures: Vec<(StringId, ProtoId)> = self.factory.with_class(class_id, |c| {
                    c.virtual_methods
                        .iter()
                        .map(|m| {
                            let mr = self.factory.get_method(m.method_ref);
                            (mr.name, mr.proto)
                        })
                        .collect()
                });
                for sig in own_signatures {
                    shadowed.insert(sig);
                }
            }
            if let Some(methods) = self.reachable_virtual_methods.get(&current_ty).cloned() {
                let mut methods: Vec<MethodId> = methods.into_iter().collect();
                slow_sort(self.factory, &mut methods, compare_methods);
                for method_id in methods {
                    let mr = self.factory.get_method(method_id);
                    if shadowed.insert((mr.name, mr.proto)) {
                        self.worklist.push_back(Event::MarkMethodLive(method_id, KeepReason::Instantiated));
                    }
                }
            }
            current = self
                .factory
                .definition_for(current_ty)
                .and_then(|cid| self.factory.with_class(cid, |c| c.super_type));
        }
    }

    fn mark_method_live(&mut self, method_id: MethodId, reason: KeepReason) {
        if self.live_methods.contains_key(&method_id) {
            return;
        }
        self.live_methods.insert(method_id, reason);
        let method_ref = self.factory.get_method(method_id);
        self.mark_type_live(method_ref.holder, KeepReason::Instantiated);

        if let Some(targets) = self.super_invoke_dependencies.get(&method_id).cloned() {
            let mut targets: Vec<MethodId> = targets.into_iter().collect();
            slow_sort(self.factory, &mut targets, compare_methods);
            for target in targets {
                self.worklist.push_back(Event::MarkMethodLive(target, KeepReason::InvokedSuper(method_id)));
            }
        }

        let Some(class_id) = self.factory.definition_for(method_ref.holder) else {
            return;
        };
        let code = self.factory.with_class(class_id, |c| {
            c.all_methods()
                .find(|m| m.method_ref == method_id)
                .and_then(|m| m.code.clone())
        });
        let Some(Code::Ir(ir)) = code else {
            return;
        };
        for block in &ir.blocks {
            for instr in &block.instructions {
                if let (Some(callee), Some(kind)) = (instr.invoked_method, instr.invoke_kind) {
                    self.handle_invoke(method_id, callee, kind);
                }
                if let (Some(field), Some(kind)) = (instr.accessed_field, instr.field_access) {
                    self.handle_field_access(method_id, field, kind);
                }
            }
        }
    }

    fn mark_field_live(&mut self, field_id: FieldId, reason: KeepReason) {
        if self.live_fields.contains_key(&field_id) {
            return;
        }
        self.live_fields.insert(field_id, reason.clone());
        let field_ref = self.factory.get_field(field_id);
        self.mark_type_live(field_ref.holder, reason);
    }

    fn handle_invoke(&mut self, caller: MethodId, callee: MethodId, kind: InvokeKind) {
        let callee_ref = self.factory.get_method(callee);
        let name = callee_ref.name;
        let proto = callee_ref.proto;
        let holder = callee_ref.holder;

        match kind {
            InvokeKind::Static => {
                self.static_invokes.push((caller, callee));
                self.worklist.push_back(Event::MarkMethodLive(callee, KeepReason::InvokedInterface));
            }
            InvokeKind::Direct => {
                self.direct_invokes.push((caller, callee));
                self.worklist.push_back(Event::MarkMethodLive(callee, KeepReason::InvokedInterface));
            }
            InvokeKind::Super => {
                self.super_invokes.push((caller, callee));
                self.worklist.push_back(Event::MarkReachableSuper(caller, callee));
            }
            InvokeKind::Virtual | InvokeKind::Interface => {
                if kind == InvokeKind::Virtual {
                    self.virtual_invokes.push((caller, callee));
                } else {
                    self.interface_invokes.push((caller, callee));
                }
                self.targeted_methods.insert(callee);
                let targets = self.resolve_dispatch_targets(holder, name, proto, kind);
                for (owner, target) in targets {
                    self.reachable_virtual_methods.entry(owner).or_default().insert(target);
                    if self.instantiated_types.contains(&owner) {
                        let reason = if kind == InvokeKind::Virtual {
                            KeepReason::InvokedVirtual
                        } else {
                            KeepReason::InvokedInterface
                        };
                        self.worklist.push_back(Event::MarkMethodLive(target, reason));
                    }
                }
            }
        }
    }

    /// All `(owner_type, method_id)` virtual/interface dispatch targets of
    /// `(holder, name, proto)`: the declared method itself (if `holder`
    /// defines it) plus every override found walking subtypes, stopping a
    /// branch at the first override (a shadow).
    fn resolve_dispatch_targets(
        &self,
        holder: TypeId,
        name: StringId,
        proto: ProtoId,
        kind: InvokeKind,
    ) -> Vec<(TypeId, MethodId)> {
        let mut targets = Vec::new();
        if let Some(class_id) = self.factory.definition_for(holder) {
            let own = self.factory.with_class(class_id, |c| {
                c.virtual_methods
                    .iter()
                    .find(|m| {
                        let mr = self.factory.get_method(m.method_ref);
                        mr.name == name && mr.proto == proto
                    })
                    .map(|m| m.method_ref)
            });
            if let Some(method_id) = own {
                targets.push((holder, method_id));
            }
        }
        let visit = |subtype: TypeId, targets: &mut Vec<(TypeId, MethodId)>| -> bool {
            let Some(class_id) = self.factory.definition_for(subtype) else {
                return false;
            };
            let own = self.factory.with_class(class_id, |c| {
                c.virtual_methods
                    .iter()
                    .find(|m| {
                        let mr = self.factory.get_method(m.method_ref);
                        mr.name == name && mr.proto == proto
                    })
                    .map(|m| m.method_ref)
            });
            if let Some(method_id) = own {
                targets.push((subtype, method_id));
                true
            } else {
                false
            }
        };
        let mut found = targets.clone();
        match kind {
            InvokeKind::Interface => {
                self.subtypes.for_all_implements_subtypes(holder, |subtype| visit(subtype, &mut found));
            }
            _ => {
                self.subtypes.for_all_extends_subtypes(holder, |subtype| visit(subtype, &mut found));
            }
        }
        found
    }

    fn handle_field_access(&mut self, method_id: MethodId, field_id: FieldId, kind: FieldAccessKind) {
        match kind {
            FieldAccessKind::StaticRead => {
                self.static_fields_read.push((method_id, field_id));
                self.worklist.push_back(Event::MarkMethodLive(method_id, KeepReason::FieldAccess));
                self.mark_field_live(field_id, KeepReason::FieldAccess);
            }
            FieldAccessKind::StaticWrite => {
                self.static_fields_written.push((method_id, field_id));
                self.mark_field_live(field_id, KeepReason::FieldAccess);
            }
            FieldAccessKind::InstanceRead => {
                self.instance_fields_read.push((method_id, field_id));
                self.mark_field_live(field_id, KeepReason::FieldAccess);
            }
            FieldAccessKind::InstanceWrite => {
                self.instance_fields_written.push((method_id, field_id));
                self.mark_field_live(field_id, KeepReason::FieldAccess);
            }
        }
    }

    fn freeze(self) -> AppInfoWithLiveness {
        let factory = self.factory;
        let mut live_types: Vec<TypeId> = self.live_types.into_iter().collect();
        slow_sort(factory, &mut live_types, compare_types);
        let mut instantiated_types: Vec<TypeId> = self.instantiated_types.into_iter().collect();
        slow_sort(factory, &mut instantiated_types, compare_types);
        let mut live_methods: Vec<MethodId> = self.live_methods.into_keys().collect();
        slow_sort(factory, &mut live_methods, compare_methods);
        let mut live_fields: Vec<FieldId> = self.live_fields.into_keys().collect();
        slow_sort(factory, &mut live_fields, compare_fields);
        let mut targeted_methods: Vec<MethodId> = self.targeted_methods.into_iter().collect();
        slow_sort(factory, &mut targeted_methods, compare_methods);

        let mut virtual_invokes = self.virtual_invokes;
        virtual_invokes.sort_by(|a, b| compare_methods(factory, a.1, b.1));
        let mut interface_invokes = self.interface_invokes;
        interface_invokes.sort_by(|a, b| compare_methods(factory, a.1, b.1));
        let mut super_invokes = self.super_invokes;
        super_invokes.sort_by(|a, b| compare_methods(factory, a.1, b.1));
        let mut direct_invokes = self.direct_invokes;
        direct_invokes.sort_by(|a, b| compare_methods(factory, a.1, b.1));
        let mut static_invokes = self.static_invokes;
        static_invokes.sort_by(|a, b| compare_methods(factory, a.1, b.1));

        let mut instance_fields_read = self.instance_fields_read;
        instance_fields_read.sort_by(|a, b| compare_fields(factory, a.1, b.1));
        let mut instance_fields_written = self.instance_fields_written;
        instance_fields_written.sort_by(|a, b| compare_fields(factory, a.1, b.1));
        let mut static_fields_read = self.static_fields_read;
        static_fields_read.sort_by(|a, b| compare_fields(factory, a.1, b.1));
        let mut static_fields_written = self.static_fields_written;
        static_fields_written.sort_by(|a, b| compare_fields(factory, a.1, b.1));

        AppInfoWithLiveness {
            live_types,
            instantiated_types,
            live_methods,
            live_fields,
            targeted_methods,
            virtual_invokes,
            interface_invokes,
            super_invokes,
            direct_invokes,
            static_invokes,
            instance_fields_read,
            instance_fields_written,
            static_fields_read,
            static_fields_written,
        }
    }
}
