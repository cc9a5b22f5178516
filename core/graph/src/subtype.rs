//! Subtype index: for every type, its direct-extends and
//! direct-implements subtypes. Used by the enqueuer's dispatch-target
//! walk and by the minifier's interface-joining pass.

use ahash::{AHashMap, AHashSet};

use crate::factory::Factory;
use crate::items::TypeId;

#[derive(Debug, Default)]
pub struct SubtypeIndex {
    /// type -> classes that directly `extends` it.
    direct_extends_subtypes: AHashMap<TypeId, Vec<TypeId>>,
    /// interface -> classes/interfaces that directly `implements`/extends it
    /// as an interface.
    direct_implements_subtypes: AHashMap<TypeId, Vec<TypeId>>,
}

impl SubtypeIndex {
    /// Build the index from every class currently defined in `factory`.
    /// Must be rebuilt (or incrementally extended) whenever new classes are
    /// read, since it indexes the class table as of the call.
    pub fn build(factory: &Factory) -> Self {
        let mut index = SubtypeIndex::default();
        for class_id in factory.class_ids() {
            factory.with_class(class_id, |class| {
                if let Some(super_type) = class.super_type {
                    index
                        .direct_extends_subtypes
                        .entry(super_type)
                        .or_default()
                        .push(class.class_type);
                }
                for &iface in &class.interfaces {
                    index
                        .direct_implements_subtypes
                        .entry(iface)
                        .or_default()
                        .push(class.class_type);
                }
            });
        }
        index
    }

    pub fn direct_extends_subtypes(&self, ty: TypeId) -> &[TypeId] {
        self.direct_extends_subtypes
            .get(&ty)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn direct_implements_subtypes(&self, ty: TypeId) -> &[TypeId] {
        self.direct_implements_subtypes
            .get(&ty)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Visit every transitive subtype reached by `extends` alone, stopping
    /// a branch when `stop` returns `true` for a visited type (used by the
    /// enqueuer to halt at a shadowing override).
    pub fn for_all_extends_subtypes(&self, root: TypeId, mut visit: impl FnMut(TypeId) -> bool) {
        let mut stack = self.direct_extends_subtypes(root).to_vec();
        let mut seen = AHashSet::new();
        while let Some(ty) = stack.pop() {
            if !seen.insert(ty) {
                continue;
            }
            if visit(ty) {
                continue;
            }
            stack.extend_from_slice(self.direct_extends_subtypes(ty));
        }
    }

    /// Visit every transitive subtype reached by either `implements` or
    /// `extends` from `root` (used for interface dispatch, which must
    /// follow both relations per §4.4).
    pub fn for_all_implements_subtypes(&self, root: TypeId, mut visit: impl FnMut(TypeId) -> bool) {
        let mut stack = self.direct_implements_subtypes(root).to_vec();
        let mut seen = AHashSet::new();
        while let Some(ty) = stack.pop() {
            if !seen.insert(ty) {
                continue;
            }
            if visit(ty) {
                continue;
            }
            stack.extend_from_slice(self.direct_implements_subtypes(ty));
            stack.extend_from_slice(self.direct_extends_subtypes(ty));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::{AccessFlags, Class, Origin};

    fn empty_class(factory: &Factory, descriptor: &str, super_: Option<&str>, ifaces: &[&str]) {
        let class_type = factory.create_type(descriptor).unwrap();
        let super_type = super_.map(|s| factory.create_type(s).unwrap());
        let interfaces = ifaces
            .iter()
            .map(|s| factory.create_type(s).unwrap())
            .collect();
        factory
            .define_class(Class {
                class_type,
                origin: Origin::Program,
                access_flags: AccessFlags::PUBLIC,
                super_type,
                interfaces,
                source_file: None,
                annotations: vec![],
                static_fields: vec![],
                instance_fields: vec![],
                direct_methods: vec![],
                virtual_methods: vec![],
            })
            .unwrap();
    }

    #[test]
    fn extends_chain_is_walked_transitively() {
        let factory = Factory::new();
        empty_class(&factory, "La;", None, &[]);
        empty_class(&factory, "Lb;", Some("La;"), &[]);
        empty_class(&factory, "Lc;", Some("Lb;"), &[]);

        let index = SubtypeIndex::build(&factory);
        let a = factory.create_type("La;").unwrap();
        let mut seen = vec![];
        index.for_all_extends_subtypes(a, |t| {
            seen.push(t);
            false
        });
        assert_eq!(seen.len(), 2);
    }
}
