//! Virtual-file distributor (§4.8): partitions surviving program classes
//! into DEX files subject to the 65 536 method/field/type-reference cap
//! per file.

use ahash::AHashMap;
use ahash::AHashSet;
use shrinker_graph::{compare_types, slow_sort, ClassId, Factory, FieldId, MethodId, TypeId};

use crate::errors::DistributeError;

/// Every DEX's constant pool is capped at 65 536 entries per kind.
pub const MAX_REFERENCES_PER_DEX: usize = 65_536;

/// The reference triple a class contributes to whatever DEX holds it:
/// its own type plus supertype/interfaces, the method refs of its declared
/// methods, and the field refs of its declared fields. This is the "delta"
/// fill-files computes before deciding whether a class fits.
#[derive(Debug, Default, Clone)]
pub struct ClassReferences {
    pub types: Vec<TypeId>,
    pub methods: Vec<MethodId>,
    pub fields: Vec<FieldId>,
}

pub fn class_references(factory: &Factory, class_id: ClassId) -> ClassReferences {
    factory.with_class(class_id, |c| {
        let mut types = vec![c.class_type];
        types.extend(c.super_type);
        types.extend(c.interfaces.iter().copied());

        let mut methods = Vec::new();
        for m in c.direct_methods.iter().chain(c.virtual_methods.iter()) {
            methods.push(m.method_ref);
            let method_ref = factory.get_method(m.method_ref);
            let proto = factory.get_proto(method_ref.proto);
            types.push(proto.return_type);
            types.extend(proto.parameters.iter().copied());
        }

        let mut fields = Vec::new();
        for f in c.static_fields.iter().chain(c.instance_fields.iter()) {
            fields.push(f.field_ref);
            types.push(factory.get_field(f.field_ref).field_type);
        }

        ClassReferences { types, methods, fields }
    })
}

/// One output DEX file under construction: the running set of distinct
/// references it already carries, plus the classes assigned to it.
#[derive(Debug, Default)]
pub struct VirtualDex {
    pub id: u32,
    pub classes: Vec<ClassId>,
    types: AHashSet<TypeId>,
    methods: AHashSet<MethodId>,
    fields: AHashSet<FieldId>,
}

impl VirtualDex {
    fn new(id: u32) -> Self {
        VirtualDex { id, ..Default::default() }
    }

    fn delta(&self, refs: &ClassReferences) -> (usize, usize, usize) {
        let new_types = refs.types.iter().filter(|t| !self.types.contains(t)).count();
        let new_methods = refs.methods.iter().filter(|m| !self.methods.contains(m)).count();
        let new_fields = refs.fields.iter().filter(|f| !self.fields.contains(f)).count();
        (new_types, new_methods, new_fields)
    }

    fn fits(&self, refs: &ClassReferences) -> bool {
        let (dt, dm, df) = self.delta(refs);
        self.types.len() + dt <= MAX_REFERENCES_PER_DEX
            && self.methods.len() + dm <= MAX_REFERENCES_PER_DEX
            && self.fields.len() + df <= MAX_REFERENCES_PER_DEX
    }

    fn add(&mut self, class_id: ClassId, refs: &ClassReferences) {
        self.classes.push(class_id);
        self.types.extend(refs.types.iter().copied());
        self.methods.extend(refs.methods.iter().copied());
        self.fields.extend(refs.fields.iter().copied());
    }
}

/// The four distribution modes (§4.8).
pub enum Mode {
    /// One DEX per class — used for incremental builds.
    FilePerClass,
    /// All classes in a single DEX; fails if it overflows.
    MonoDex,
    /// Greedy bin-packing with deterministic ordering. `minimal_main_dex`
    /// restricts the primary DEX to classes transitively reachable from
    /// `main_dex_roots`.
    FillFiles { minimal_main_dex: bool },
    /// Each class's package is looked up in an explicit package→dex table.
    PackageMap { assignments: AHashMap<TypeId, u32> },
}

pub struct Distribution {
    pub dexes: Vec<VirtualDex>,
    pub main_dex_list: Vec<ClassId>,
}

pub struct Distributor<'a> {
    factory: &'a Factory,
}

impl<'a> Distributor<'a> {
    pub fn new(factory: &'a Factory) -> Self {
        Distributor { factory }
    }

    /// `classes` must already be the surviving (post-enqueue) set.
    /// `main_dex_roots` names the types whose transitive type-reference
    /// closure must land in the primary DEX; for `FilePerClass`/`MonoDex`/
    /// `PackageMap` it is only used to compute the reported main-dex list,
    /// not to influence packing.
    pub fn run(
        &self,
        classes: &[ClassId],
        mode: &Mode,
        main_dex_roots: &AHashSet<TypeId>,
    ) -> Result<Distribution, DistributeError> {
        let mut sorted = classes.to_vec();
        slow_sort(self.factory, &mut sorted, |f, a, b| {
            let ta = f.with_class(a, |c| c.class_type);
            let tb = f.with_class(b, |c| c.class_type);
            compare_types(f, ta, tb)
        });

        match mode {
            Mode::FilePerClass => self.file_per_class(&sorted, main_dex_roots),
            Mode::MonoDex => self.mono_dex(&sorted, main_dex_roots),
            Mode::FillFiles { minimal_main_dex } => {
                self.fill_files(&sorted, main_dex_roots, *minimal_main_dex)
            }
            Mode::PackageMap { assignments } => self.package_map(&sorted, assignments, main_dex_roots),
        }
    }

    fn class_name(&self, class_id: ClassId) -> String {
        let ty = self.factory.with_class(class_id, |c| c.class_type);
        self.factory.type_descriptor(ty).to_string()
    }

    fn main_dex_list(&self, classes: &[ClassId], main_dex_roots: &AHashSet<TypeId>) -> Vec<ClassId> {
        let closure = self.transitive_closure(classes, main_dex_roots);
        classes
            .iter()
            .copied()
            .filter(|&id| {
                let ty = self.factory.with_class(id, |c| c.class_type);
                closure.contains(&ty)
            })
            .collect()
    }

    /// Reachability over declared supertype/interface/field-type/proto-type
    /// edges, starting from `roots`. Used to decide which classes a
    /// `minimal-main-dex` build must keep in the primary file.
    fn transitive_closure(&self, classes: &[ClassId], roots: &AHashSet<TypeId>) -> AHashSet<TypeId> {
        let by_type: AHashMap<TypeId, ClassId> = classes
            .iter()
            .map(|&id| (self.factory.with_class(id, |c| c.class_type), id))
            .collect();

        let mut seen: AHashSet<TypeId> = roots.clone();
        let mut stack: Vec<TypeId> = roots.iter().copied().collect();
        while let Some(ty) = stack.pop() {
            let Some(&class_id) = by_type.get(&ty) else { continue };
            let refs = class_references(self.factory, class_id);
            for next in refs.types {
                if seen.insert(next) {
                    stack.push(next);
                }
            }
        }
        seen
    }

    fn file_per_class(
        &self,
        classes: &[ClassId],
        main_dex_roots: &AHashSet<TypeId>,
    ) -> Result<Distribution, DistributeError> {
        let mut dexes = Vec::with_capacity(classes.len());
        for (index, &class_id) in classes.iter().enumerate() {
            let refs = class_references(self.factory, class_id);
            let mut dex = VirtualDex::new(index as u32);
            if !dex.fits(&refs) {
                return Err(DistributeError::CapacityExceeded {
                    dex_index: dex.id,
                    class: self.class_name(class_id),
                });
            }
            dex.add(class_id, &refs);
            dexes.push(dex);
        }
        Ok(Distribution { dexes, main_dex_list: self.main_dex_list(classes, main_dex_roots) })
    }

    fn mono_dex(
        &self,
        classes: &[ClassId],
        main_dex_roots: &AHashSet<TypeId>,
    ) -> Result<Distribution, DistributeError> {
        let mut dex = VirtualDex::new(0);
        for &class_id in classes {
            let refs = class_references(self.factory, class_id);
            if !dex.fits(&refs) {
                return Err(DistributeError::CapacityExceeded {
                    dex_index: 0,
                    class: self.class_name(class_id),
                });
            }
            dex.add(class_id, &refs);
        }
        Ok(Distribution { dexes: vec![dex], main_dex_list: self.main_dex_list(classes, main_dex_roots) })
    }

    fn fill_files(
        &self,
        classes: &[ClassId],
        main_dex_roots: &AHashSet<TypeId>,
        minimal_main_dex: bool,
    ) -> Result<Distribution, DistributeError> {
        let main_dex_list = self.main_dex_list(classes, main_dex_roots);
        let main_dex_set: AHashSet<ClassId> = main_dex_list.iter().copied().collect();

        let mut dexes: Vec<VirtualDex> = vec![VirtualDex::new(0)];

        let mut primary_classes = Vec::new();
        let mut rest_classes = Vec::new();
        for &class_id in classes {
            if minimal_main_dex && main_dex_set.contains(&class_id) {
                primary_classes.push(class_id);
            } else {
                rest_classes.push(class_id);
            }
        }
        if !minimal_main_dex {
            rest_classes = classes.to_vec();
        }

        for &class_id in &primary_classes {
            let refs = class_references(self.factory, class_id);
            if !dexes[0].fits(&refs) {
                return Err(DistributeError::CapacityExceeded {
                    dex_index: 0,
                    class: self.class_name(class_id),
                });
            }
            dexes[0].add(class_id, &refs);
        }

        for class_id in rest_classes {
            let refs = class_references(self.factory, class_id);
            let target = dexes.iter_mut().find(|dex| dex.fits(&refs));
            match target {
                Some(dex) => dex.add(class_id, &refs),
                None => {
                    let mut dex = VirtualDex::new(dexes.len() as u32);
                    if !dex.fits(&refs) {
                        return Err(DistributeError::CapacityExceeded {
                            dex_index: dex.id,
                            class: self.class_name(class_id),
                        });
                    }
                    dex.add(class_id, &refs);
                    dexes.push(dex);
                }
            }
        }

        dexes.retain(|dex| !dex.classes.is_empty());
        for (index, dex) in dexes.iter_mut().enumerate() {
            dex.id = index as u32;
        }

        Ok(Distribution { dexes, main_dex_list })
    }

    fn package_map(
        &self,
        classes: &[ClassId],
        assignments: &AHashMap<TypeId, u32>,
        main_dex_roots: &AHashSet<TypeId>,
    ) -> Result<Distribution, DistributeError> {
        let max_id = assignments.values().copied().max().unwrap_or(0);
        let mut dexes: Vec<VirtualDex> = (0..=max_id).map(VirtualDex::new).collect();

        for &class_id in classes {
            let ty = self.factory.with_class(class_id, |c| c.class_type);
            let &dex_index = assignments
                .get(&ty)
                .ok_or_else(|| DistributeError::UnmappedPackage(self.class_name(class_id)))?;
            let refs = class_references(self.factory, class_id);
            let dex = &mut dexes[dex_index as usize];
            if !dex.fits(&refs) {
                return Err(DistributeError::CapacityExceeded {
                    dex_index,
                    class: self.class_name(class_id),
                });
            }
            dex.add(class_id, &refs);
        }

        dexes.retain(|dex| !dex.classes.is_empty());
        for (index, dex) in dexes.iter_mut().enumerate() {
            dex.id = index as u32;
        }

        Ok(Distribution { dexes, main_dex_list: self.main_dex_list(classes, main_dex_roots) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shrinker_graph::{AccessFlags, Class, EncodedMethod, Origin};

    fn class(factory: &Factory, descriptor: &str, methods: usize) -> ClassId {
        let class_type = factory.create_type(descriptor).unwrap();
        let virtual_methods = (0..methods)
            .map(|i| {
                let name = factory.create_string(&format!("m{i}"));
                let ret = factory.create_type("V").unwrap();
                let proto = factory.create_proto(ret, &[]);
                EncodedMethod {
                    method_ref: factory.create_method(class_type, name, proto),
                    access_flags: AccessFlags::PUBLIC,
                }
            })
            .collect();
        factory
            .define_class(Class {
                class_type,
                origin: Origin::Program,
                access_flags: AccessFlags::PUBLIC,
                super_type: None,
                interfaces: vec![],
                source_file: None,
                annotations: vec![],
                static_fields: vec![],
                instance_fields: vec![],
                direct_methods: vec![],
                virtual_methods,
            })
            .unwrap()
    }

    #[test]
    fn mono_dex_keeps_every_class_in_one_file() {
        let factory = Factory::new();
        let a = class(&factory, "Lcom/example/A;", 2);
        let b = class(&factory, "Lcom/example/B;", 2);
        let dist = Distributor::new(&factory)
            .run(&[a, b], &Mode::MonoDex, &Default::default())
            .unwrap();
        assert_eq!(dist.dexes.len(), 1);
        assert_eq!(dist.dexes[0].classes.len(), 2);
    }

    #[test]
    fn file_per_class_opens_one_dex_each() {
        let factory = Factory::new();
        let a = class(&factory, "Lcom/example/A;", 1);
        let b = class(&factory, "Lcom/example/B;", 1);
        let dist = Distributor::new(&factory)
            .run(&[a, b], &Mode::FilePerClass, &Default::default())
            .unwrap();
        assert_eq!(dist.dexes.len(), 2);
    }

    #[test]
    fn fill_files_packs_greedily_and_ids_are_contiguous() {
        let factory = Factory::new();
        let classes: Vec<ClassId> = (0..3)
            .map(|i| class(&factory, &format!("Lcom/example/C{i};"), 1))
            .collect();
        let dist = Distributor::new(&factory)
            .run(&classes, &Mode::FillFiles { minimal_main_dex: false }, &Default::default())
            .unwrap();
        for (index, dex) in dist.dexes.iter().enumerate() {
            assert_eq!(dex.id, index as u32);
        }
        let total: usize = dist.dexes.iter().map(|d| d.classes.len()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn mono_dex_rejects_overflow() {
        let factory = Factory::new();
        let a = class(&factory, "Lcom/example/A;", MAX_REFERENCES_PER_DEX + 1);
        let err = Distributor::new(&factory)
            .run(&[a], &Mode::MonoDex, &Default::default())
            .unwrap_err();
        assert!(matches!(err, DistributeError::CapacityExceeded { .. }));
    }
}
