//! The method-name minifier (§4.7.2) — the hard case, because virtual
//! dispatch couples names across unrelated classes.
//!
//! `NamingState<Proto>` is modeled as a chain-parented arena
//! (`NamingArena`): each node carries, per [`ProtoId`], an `InternalState`
//! of reserved names, already-assigned renamings, and a dictionary
//! iterator. Availability of a candidate name for a proto at a node is
//! "no ancestor of this node (inclusive) has reserved or renamed that name
//! for that proto" — the walk up `parent` implements the chain lookup the
//! spec describes.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use shrinker_config::Configuration;
use shrinker_enqueue::{Item, RootSet};
use shrinker_graph::{Factory, Lens, MethodId, Origin, ProtoId, SubtypeIndex, TypeId};

use crate::dictionary::DictionaryIter;

struct InternalState {
    reserved: AHashSet<Arc<str>>,
    renamed: AHashSet<Arc<str>>,
    dict: DictionaryIter,
}

impl InternalState {
    fn new(dictionary: Vec<String>) -> Self {
        InternalState {
            reserved: AHashSet::new(),
            renamed: AHashSet::new(),
            dict: DictionaryIter::new(dictionary),
        }
    }

    fn taken(&self, name: &str) -> bool {
        self.reserved.contains(name) || self.renamed.contains(name)
    }
}

struct StateNode {
    parent: Option<usize>,
    per_proto: AHashMap<ProtoId, InternalState>,
}

/// The chain-parented arena backing every `NamingState<Proto>` instance
/// used by this minifier, for both the class hierarchy and the (flat)
/// interface states.
struct NamingArena {
    nodes: Vec<StateNode>,
    dictionary: Vec<String>,
}

impl NamingArena {
    fn new() -> Self {
        NamingArena { nodes: Vec::new(), dictionary: Vec::new() }
    }

    fn with_dictionary(dictionary: Vec<String>) -> Self {
        NamingArena { nodes: Vec::new(), dictionary }
    }

    fn new_node(&mut self, parent: Option<usize>) -> usize {
        let idx = self.nodes.len();
        self.nodes.push(StateNode { parent, per_proto: AHashMap::new() });
        idx
    }

    fn proto_state(&mut self, node: usize, proto: ProtoId) -> &mut InternalState {
        let dict = self.dictionary.clone();
        self.nodes[node]
            .per_proto
            .entry(proto)
            .or_insert_with(|| InternalState::new(dict))
    }

    fn reserve(&mut self, node: usize, proto: ProtoId, name: Arc<str>) {
        self.proto_state(node, proto).reserved.insert(name);
    }

    /// Walk from `node` up through its ancestors; `true` iff none of them
    /// has `name` reserved or already assigned for `proto`.
    fn is_available(&self, node: usize, proto: ProtoId, name: &str) -> bool {
        let mut cur = Some(node);
        while let Some(idx) = cur {
            if let Some(state) = self.nodes[idx].per_proto.get(&proto) {
                if state.taken(name) {
                    return false;
                }
            }
            cur = self.nodes[idx].parent;
        }
        true
    }

    /// `true` iff `name` is reserved (not merely renamed-to) in any of
    /// `states` for `proto` — phase 3's "reserved in ANY reachable state"
    /// test, checked only at the node itself (reservations are recorded at
    /// the exact frontier/interface node they apply to, not inherited).
    fn reserved_in_any(&self, states: &[usize], proto: ProtoId, name: &str) -> bool {
        states
            .iter()
            .any(|&s| self.nodes[s].per_proto.get(&proto).is_some_and(|st| st.reserved.contains(name)))
    }

    fn reserve_everywhere(&mut self, states: &[usize], proto: ProtoId, name: Arc<str>) {
        for &s in states {
            self.proto_state(s, proto).reserved.insert(name.clone());
        }
    }

    fn rename_everywhere(&mut self, states: &[usize], proto: ProtoId, name: Arc<str>) {
        for &s in states {
            self.proto_state(s, proto).renamed.insert(name.clone());
        }
    }

    /// Propose candidates from `origin`'s dictionary until one is
    /// available at every state in `states` (including `origin` and all of
    /// its ancestors, transitively, through [`Self::is_available`]).
    fn propose_until_available(&mut self, origin: usize, states: &[usize], proto: ProtoId) -> Arc<str> {
        loop {
            let candidate = self.proto_state(origin, proto).dict.next_candidate();
            if states.iter().all(|&s| self.is_available(s, proto, &candidate)) {
                return Arc::from(candidate);
            }
        }
    }
}

pub struct MethodNameMinifier<'a> {
    factory: &'a Factory,
    subtypes: &'a SubtypeIndex,
    config: &'a Configuration,
    arena: NamingArena,
    class_states: AHashMap<TypeId, usize>,
    /// For every class type, the node its own and its program siblings'
    /// original method names are reserved at: itself if it's a library
    /// class, otherwise the nearest library ancestor's node, or itself if
    /// no library ancestor exists at all.
    class_frontier: AHashMap<TypeId, usize>,
    interface_states: AHashMap<TypeId, usize>,
}

const OBJECT_DESCRIPTOR: &str = "Ljava/lang/Object;";
const STATIC_INITIALIZER: &str = "<clinit>";
const INSTANCE_INITIALIZER: &str = "<init>";

impl<'a> MethodNameMinifier<'a> {
    pub fn new(factory: &'a Factory, subtypes: &'a SubtypeIndex, config: &'a Configuration) -> Self {
        MethodNameMinifier {
            factory,
            subtypes,
            config,
            arena: NamingArena::with_dictionary(config.dictionaries.clone()),
            class_states: AHashMap::new(),
            class_frontier: AHashMap::new(),
            interface_states: AHashMap::new(),
        }
    }

    fn is_library_origin(&self, ty: TypeId) -> bool {
        match self.factory.definition_for(ty) {
            Some(class_id) => self.factory.with_class(class_id, |c| matches!(c.origin, Origin::Library)),
            // No definition means classpath/library/missing: treated as an
            // opaque frontier boundary, same as an explicit library class.
            None => true,
        }
    }

    fn renamable_methods(&self, ty: TypeId) -> Vec<(MethodId, Arc<str>, ProtoId, bool)> {
        let Some(class_id) = self.factory.definition_for(ty) else { return Vec::new() };
        self.factory.with_class(class_id, |c| {
            let is_annotation = c.access_flags.is_annotation();
            c.all_methods()
                .map(|m| {
                    let method_ref = self.factory.get_method(m.method_ref);
                    let name = self.factory.get_string(method_ref.name);
                    let is_private = m.access_flags.is_private();
                    (m.method_ref, name, method_ref.proto, is_private || is_annotation)
                })
                .collect()
        })
    }

    /// Just this class's own virtual (non-direct) methods, excluding
    /// classes whose own access flags mark them `@interface`-like
    /// annotation types (never renamed).
    fn class_virtual_methods(&self, ty: TypeId) -> Vec<(MethodId, Arc<str>, ProtoId)> {
        let Some(class_id) = self.factory.definition_for(ty) else { return Vec::new() };
        self.factory.with_class(class_id, |c| {
            if c.access_flags.is_annotation() {
                return Vec::new();
            }
            c.virtual_methods
                .iter()
                .map(|m| {
                    let method_ref = self.factory.get_method(m.method_ref);
                    (m.method_ref, self.factory.get_string(method_ref.name), method_ref.proto)
                })
                .collect()
        })
    }

    /// This class's own direct (static/private/constructor) methods,
    /// excluding `<init>`/`<clinit>`, tagged by whether they're private.
    fn class_direct_methods(&self, ty: TypeId) -> Vec<(MethodId, Arc<str>, ProtoId, bool)> {
        let Some(class_id) = self.factory.definition_for(ty) else { return Vec::new() };
        self.factory.with_class(class_id, |c| {
            c.direct_methods
                .iter()
                .filter(|m| !m.access_flags.is_constructor())
                .map(|m| {
                    let method_ref = self.factory.get_method(m.method_ref);
                    let name = self.factory.get_string(method_ref.name);
                    (m.method_ref, name, method_ref.proto, m.access_flags.is_private())
                })
                .filter(|(_, name, ..)| &**name != STATIC_INITIALIZER && &**name != INSTANCE_INITIALIZER)
                .collect()
        })
    }

    /// `true` iff `maybe_ancestor` is a strict ancestor of `node` in the
    /// chain-parented class-state tree.
    fn is_ancestor_state(&self, maybe_ancestor: usize, node: usize) -> bool {
        let mut cur = self.arena.nodes[node].parent;
        while let Some(p) = cur {
            if p == maybe_ancestor {
                return true;
            }
            cur = self.arena.nodes[p].parent;
        }
        false
    }

    /// Phase 1: reserve-in-classes, a DFS from `java.lang.Object` down the
    /// extends chain. Every class gets its own chain-parented state node;
    /// its methods' original names are reserved at the nearest library
    /// ancestor's node (its "frontier"), or at its own node if none exists.
    fn reserve_in_classes(&mut self) {
        let object_type = self.factory.create_type(OBJECT_DESCRIPTOR).ok();
        let roots: Vec<TypeId> = self
            .factory
            .class_ids()
            .into_iter()
            .filter_map(|id| {
                let (ty, super_type, is_interface) =
                    self.factory.with_class(id, |c| (c.class_type, c.super_type, c.access_flags.is_interface()));
                if is_interface {
                    return None;
                }
                match super_type {
                    None => Some(ty),
                    Some(s) if Some(s) == object_type => Some(ty),
                    _ => None,
                }
            })
            .collect();

        let root_node = self.arena.new_node(None);
        if let Some(object_type) = object_type {
            self.class_states.insert(object_type, root_node);
            self.class_frontier.insert(object_type, root_node);
        }

        for root in roots {
            self.reserve_class_subtree(root, root_node, root_node);
        }
    }

    fn reserve_class_subtree(&mut self, ty: TypeId, parent_node: usize, inherited_frontier: usize) {
        let node = self.arena.new_node(Some(parent_node));
        self.class_states.insert(ty, node);

        let is_library = self.is_library_origin(ty);
        let frontier = if is_library { node } else { inherited_frontier };
        self.class_frontier.insert(ty, frontier);

        // Only library classes force a blanket reservation of their own
        // method names — unseen library dispatch targets must not collide
        // with anything assigned on the program side. Program classes'
        // original names are reserved individually, only when kept, during
        // the assignment phases below; reserving them here unconditionally
        // would block every program class from ever being renamed.
        if is_library {
            for (_, name, proto, _) in self.renamable_methods(ty) {
                if &*name != INSTANCE_INITIALIZER && &*name != STATIC_INITIALIZER {
                    self.arena.reserve(frontier, proto, name);
                }
            }
        }

        let children: Vec<TypeId> = self.subtypes.direct_extends_subtypes(ty).to_vec();
        let mut sorted_children = children;
        shrinker_graph::slow_sort(self.factory, &mut sorted_children, shrinker_graph::compare_types);
        for child in sorted_children {
            self.reserve_class_subtree(child, node, frontier);
        }
    }

    /// Phase 2: reserve-in-interfaces. Each interface is its own frontier —
    /// no chain-parenting, a flat state per interface type.
    fn reserve_in_interfaces(&mut self) {
        let mut interface_types: Vec<TypeId> = self
            .factory
            .class_ids()
            .into_iter()
            .filter_map(|id| {
                let (ty, is_interface) = self.factory.with_class(id, |c| (c.class_type, c.access_flags.is_interface()));
                is_interface.then_some(ty)
            })
            .collect();
        shrinker_graph::slow_sort(self.factory, &mut interface_types, shrinker_graph::compare_types);

        for ty in interface_types {
            let node = self.arena.new_node(None);
            self.interface_states.insert(ty, node);
            for (_, name, proto, _) in self.renamable_methods(ty) {
                self.arena.reserve(node, proto, name);
            }
        }
    }

    /// All super-interfaces and sub-interfaces transitively reachable from
    /// `iface`, including itself.
    fn related_interfaces(&self, iface: TypeId) -> AHashSet<TypeId> {
        let mut set = AHashSet::new();
        set.insert(iface);

        let mut stack = vec![iface];
        while let Some(ty) = stack.pop() {
            if let Some(class_id) = self.factory.definition_for(ty) {
                let supers = self.factory.with_class(class_id, |c| c.interfaces.clone());
                for s in supers {
                    if self.interface_states.contains_key(&s) && set.insert(s) {
                        stack.push(s);
                    }
                }
            }
        }
        self.subtypes.for_all_implements_subtypes(iface, |sub| {
            if self.interface_states.contains_key(&sub) {
                set.insert(sub);
            }
            false
        });
        set
    }

    /// Phase 3: assign interface method names. Builds a
    /// `signature -> (states, sources, origin)` map merging methods that
    /// share name+proto across unrelated interfaces, then resolves
    /// most-constrained-first.
    fn assign_interface_method_names(&mut self, root_set: &RootSet, lens: &mut Lens) {
        struct Entry {
            states: AHashSet<usize>,
            sources: Vec<MethodId>,
            origin: usize,
            name: Arc<str>,
            proto: ProtoId,
        }

        let mut by_signature: AHashMap<(Arc<str>, ProtoId), Entry> = AHashMap::new();
        let mut interface_types: Vec<TypeId> = self.interface_states.keys().copied().collect();
        shrinker_graph::slow_sort(self.factory, &mut interface_types, shrinker_graph::compare_types);

        for iface in interface_types {
            let iface_state = self.interface_states[&iface];
            for (method_id, name, proto, never_rename) in self.renamable_methods(iface) {
                if never_rename {
                    continue;
                }
                let related = self.related_interfaces(iface);
                let mut states: AHashSet<usize> = related.iter().map(|t| self.interface_states[t]).collect();
                for &related_iface in &related {
                    let mut implementers = Vec::new();
                    self.subtypes.for_all_implements_subtypes(related_iface, |sub| {
                        if !self.interface_states.contains_key(&sub) {
                            implementers.push(sub);
                        }
                        false
                    });
                    for class_ty in implementers {
                        if let Some(&frontier) = self.class_frontier.get(&class_ty) {
                            states.insert(frontier);
                        }
                    }
                }

                let key = (name.clone(), proto);
                let entry = by_signature.entry(key).or_insert_with(|| Entry {
                    states: AHashSet::new(),
                    sources: Vec::new(),
                    origin: iface_state,
                    name: name.clone(),
                    proto,
                });
                entry.states.extend(states);
                entry.sources.push(method_id);
            }
        }

        let mut entries: Vec<Entry> = by_signature.into_values().collect();
        entries.sort_by(|a, b| {
            b.states
                .len()
                .cmp(&a.states.len())
                .then_with(|| a.name.cmp(&b.name))
        });

        for entry in entries {
            let states: Vec<usize> = entry.states.into_iter().collect();
            let kept = entry.sources.iter().any(|m| root_set.no_obfuscation.contains(&Item::Method(*m)))
                || self.arena.reserved_in_any(&states, entry.proto, &entry.name);
            if kept {
                self.arena.reserve_everywhere(&states, entry.proto, entry.name.clone());
                continue;
            }
            let new_name = self.arena.propose_until_available(entry.origin, &states, entry.proto);
            self.arena.rename_everywhere(&states, entry.proto, new_name.clone());
            for method in entry.sources {
                lens.rename_method(method, new_name.clone());
            }
        }
    }

    /// All class types (program and non-program, non-interface) that took
    /// part in phase 1, sorted deterministically.
    fn all_class_states_sorted(&self) -> Vec<TypeId> {
        let mut types: Vec<TypeId> = self.class_states.keys().copied().collect();
        shrinker_graph::slow_sort(self.factory, &mut types, shrinker_graph::compare_types);
        types
    }

    /// Phase 4a: virtual methods dispatch-share across a class hierarchy,
    /// so unlike interface methods they can't be assigned independently per
    /// class. Group every virtual method by `(name, proto)`, split each
    /// group into connected components along the ancestor/descendant
    /// relation (two overrides are linked iff one class state is an
    /// ancestor of the other), and assign one name per component — exactly
    /// how phase 3 joins interface method names across unrelated
    /// interfaces, but the "relatedness" test is hierarchy membership
    /// instead of shared-interface membership.
    fn assign_virtual_method_names(&mut self, root_set: &RootSet, lens: &mut Lens) {
        struct Member {
            method_id: MethodId,
            state: usize,
            is_library: bool,
        }

        let mut by_signature: AHashMap<(Arc<str>, ProtoId), Vec<Member>> = AHashMap::new();
        for ty in self.all_class_states_sorted() {
            let Some(&state) = self.class_states.get(&ty) else { continue };
            let is_library = self.is_library_origin(ty);
            for (method_id, name, proto) in self.class_virtual_methods(ty) {
                by_signature.entry((name, proto)).or_default().push(Member { method_id, state, is_library });
            }
        }

        let mut signatures: Vec<(Arc<str>, ProtoId)> = by_signature.keys().cloned().collect();
        signatures.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

        for key @ (_, proto) in signatures {
            let members = by_signature.remove(&key).unwrap();

            // Partition members into connected components under the
            // ancestor/descendant relation (transitive closure by union-find
            // over the small per-signature member list).
            let mut component_of: Vec<usize> = (0..members.len()).collect();
            fn find(component_of: &mut [usize], x: usize) -> usize {
                if component_of[x] != x {
                    component_of[x] = find(component_of, component_of[x]);
                }
                component_of[x]
            }
            for i in 0..members.len() {
                for j in (i + 1)..members.len() {
                    if self.is_ancestor_state(members[i].state, members[j].state)
                        || self.is_ancestor_state(members[j].state, members[i].state)
                        || members[i].state == members[j].state
                    {
                        let ri = find(&mut component_of, i);
                        let rj = find(&mut component_of, j);
                        if ri != rj {
                            component_of[ri] = rj;
                        }
                    }
                }
            }

            let mut groups: AHashMap<usize, Vec<usize>> = AHashMap::new();
            for i in 0..members.len() {
                let root = find(&mut component_of, i);
                groups.entry(root).or_default().push(i);
            }

            for indices in groups.into_values() {
                let states: Vec<usize> = indices.iter().map(|&i| members[i].state).collect();

                // A member already renamed by the interface-joining pass
                // (it implements an interface method sharing this
                // signature) fixes the name for the whole component — the
                // interface pass already reconciled it across every
                // implementer's frontier.
                if let Some(&i) = indices.iter().find(|&&i| lens.renamed_method(members[i].method_id).is_some()) {
                    let existing = lens.renamed_method(members[i].method_id).unwrap();
                    self.arena.rename_everywhere(&states, proto, existing.clone());
                    for &j in &indices {
                        if j != i && !members[j].is_library && lens.renamed_method(members[j].method_id).is_none() {
                            lens.rename_method(members[j].method_id, existing.clone());
                        }
                    }
                    continue;
                }

                let kept = indices.iter().any(|&i| {
                    members[i].is_library || root_set.no_obfuscation.contains(&Item::Method(members[i].method_id))
                }) || self.arena.reserved_in_any(&states, proto, &key.0);

                if kept {
                    self.arena.reserve_everywhere(&states, proto, key.0.clone());
                    continue;
                }

                let origin = states[0];
                let new_name = self.arena.propose_until_available(origin, &states, proto);
                self.arena.rename_everywhere(&states, proto, new_name.clone());
                for &i in &indices {
                    if !members[i].is_library {
                        lens.rename_method(members[i].method_id, new_name.clone());
                    }
                }
            }
        }
    }

    /// Phase 4b: direct methods (statics and privates) have no dispatch
    /// sharing, so each class is assigned independently. Non-private first,
    /// then private — a private method may safely reuse a name a subclass's
    /// public method already claimed, since [`NamingArena::is_available`]
    /// only looks at ancestors, never descendants.
    fn assign_direct_method_names(&mut self, root_set: &RootSet, lens: &mut Lens) {
        let program_types: Vec<TypeId> = self
            .factory
            .class_ids()
            .into_iter()
            .filter_map(|id| {
                let (ty, origin, is_interface) =
                    self.factory.with_class(id, |c| (c.class_type, c.origin, c.access_flags.is_interface()));
                (!is_interface && matches!(origin, Origin::Program)).then_some(ty)
            })
            .collect();
        let mut program_types = program_types;
        shrinker_graph::slow_sort(self.factory, &mut program_types, shrinker_graph::compare_types);

        for pass_private in [false, true] {
            for &ty in &program_types {
                let Some(&state) = self.class_states.get(&ty) else { continue };
                for (method_id, _, proto, is_private) in self.class_direct_methods(ty) {
                    if is_private != pass_private {
                        continue;
                    }
                    if root_set.no_obfuscation.contains(&Item::Method(method_id)) {
                        continue;
                    }
                    let new_name = self.arena.propose_until_available(state, &[state], proto);
                    self.arena.rename_everywhere(&[state], proto, new_name.clone());
                    lens.rename_method(method_id, new_name);
                }
            }
        }
    }

    pub fn run(&mut self, root_set: &RootSet) -> Lens {
        let mut lens = Lens::new();
        self.reserve_in_classes();
        self.reserve_in_interfaces();
        self.assign_interface_method_names(root_set, &mut lens);
        self.assign_virtual_method_names(root_set, &mut lens);
        self.assign_direct_method_names(root_set, &mut lens);
        lens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shrinker_enqueue::RootSetBuilder;
    use shrinker_graph::{AccessFlags, Class, EncodedMethod, Origin};

    fn no_arg_void_proto(factory: &Factory) -> ProtoId {
        let void_ty = factory.create_type("V").unwrap();
        factory.create_proto(void_ty, &[])
    }

    fn method(factory: &Factory, holder: TypeId, name: &str, proto: ProtoId, flags: AccessFlags) -> EncodedMethod {
        let name_id = factory.create_string(name);
        let method_ref = factory.create_method(holder, name_id, proto);
        EncodedMethod { method_ref, access_flags: flags, code: None, debug_info: None, annotations: vec![] }
    }

    #[test]
    fn overriding_methods_get_the_same_renamed_name() {
        let factory = Factory::new();
        let proto = no_arg_void_proto(&factory);

        let foo_ty = factory.create_type("Lcom/example/Foo;").unwrap();
        let foo_a = method(&factory, foo_ty, "a", proto, AccessFlags::PUBLIC);
        let foo_b = method(&factory, foo_ty, "b", proto, AccessFlags::PUBLIC);
        factory
            .define_class(Class {
                class_type: foo_ty,
                origin: Origin::Program,
                access_flags: AccessFlags::PUBLIC,
                super_type: None,
                interfaces: vec![],
                source_file: None,
                annotations: vec![],
                static_fields: vec![],
                instance_fields: vec![],
                direct_methods: vec![],
                virtual_methods: vec![foo_a.clone(), foo_b.clone()],
            })
            .unwrap();

        let bar_ty = factory.create_type("Lcom/example/Bar;").unwrap();
        let bar_a = method(&factory, bar_ty, "a", proto, AccessFlags::PUBLIC);
        factory
            .define_class(Class {
                class_type: bar_ty,
                origin: Origin::Program,
                access_flags: AccessFlags::PUBLIC,
                super_type: Some(foo_ty),
                interfaces: vec![],
                source_file: None,
                annotations: vec![],
                static_fields: vec![],
                instance_fields: vec![],
                direct_methods: vec![],
                virtual_methods: vec![bar_a.clone()],
            })
            .unwrap();

        let config = shrinker_config::parse_str("t.pro", "-keep class com.example.Bar { *; }").unwrap();
        let root_set = RootSetBuilder::new(&factory, &config).build();
        let subtypes = SubtypeIndex::build(&factory);
        let mut minifier = MethodNameMinifier::new(&factory, &subtypes, &config);
        let lens = minifier.run(&root_set);

        // Bar is kept (its `a` override keeps its original name); Foo.a
        // must follow since they share the same dispatch signature.
        assert!(lens.renamed_method(foo_a.method_ref).is_none());
        assert!(lens.renamed_method(bar_a.method_ref).is_none());
        // Foo.b is unconstrained and may be renamed freely.
        let _ = foo_b;
    }
}
