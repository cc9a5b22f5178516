//! The class-name minifier (§4.7.1).
//!
//! Produces the `Type -> String` half of the [`shrinker_graph::Lens`]:
//! every program class not covered by a `no-obfuscation` keep rule is
//! renamed, subject to `keep-package-name`, the configured
//! `package_obfuscation_mode`, and (in keep-inner-class mode) the
//! `@EnclosingClass` annotation chain.

use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use shrinker_config::{Configuration, PackageObfuscationMode};
use shrinker_enqueue::{Item, RootSet};
use shrinker_graph::{Annotation, EncodedValue, Factory, Lens, TypeId};

use crate::namespace::Namespace;

const ENCLOSING_CLASS_ANNOTATION: &str = "Ldalvik/annotation/EnclosingClass;";
const SIGNATURE_ANNOTATION: &str = "Ldalvik/annotation/Signature;";

/// Output of the class-name minifier: the `Type` half of the rename lens,
/// plus every rewritten `Signature` annotation body (keyed by the class
/// that carried it), since a generic signature is free text the [`Lens`]
/// itself has no slot for.
#[derive(Debug, Default)]
pub struct ClassRenameResult {
    pub lens: Lens,
    pub rewritten_signatures: AHashMap<TypeId, String>,
}

pub struct ClassNameMinifier<'a> {
    factory: &'a Factory,
    config: &'a Configuration,
    namespaces: AHashMap<String, Namespace>,
    /// Per-outer-class state used only to mint `$`-joined inner-class
    /// suffixes in keep-inner-class mode.
    inner_namespaces: AHashMap<TypeId, Namespace>,
    package_renames: AHashMap<String, String>,
    used_type_names: AHashSet<Arc<str>>,
    used_package_prefixes: AHashSet<String>,
}

impl<'a> ClassNameMinifier<'a> {
    pub fn new(factory: &'a Factory, config: &'a Configuration) -> Self {
        ClassNameMinifier {
            factory,
            config,
            namespaces: AHashMap::new(),
            inner_namespaces: AHashMap::new(),
            package_renames: AHashMap::new(),
            used_type_names: AHashSet::new(),
            used_package_prefixes: AHashSet::new(),
        }
    }

    fn dictionary(&self) -> Vec<String> {
        self.config.dictionaries.clone()
    }

    fn namespace_for_key(&mut self, key: &str) -> &mut Namespace {
        let dict = self.dictionary();
        self.namespaces
            .entry(key.to_string())
            .or_insert_with(|| Namespace::new(key.to_string(), dict.clone(), dict))
    }

    /// `enclosing_class_of(ty)`: the `@EnclosingClass` target, if the
    /// class's annotation set carries one.
    fn enclosing_class_of(&self, ty: TypeId) -> Option<TypeId> {
        let class_id = self.factory.definition_for(ty)?;
        self.factory.with_class(class_id, |class| {
            class
                .annotations
                .iter()
                .find(|a| &*self.factory.type_descriptor(a.annotation_type) == ENCLOSING_CLASS_ANNOTATION)
                .and_then(|a| {
                    a.elements.iter().find_map(|(_, value)| match value {
                        EncodedValue::Type(t) => Some(*t),
                        _ => None,
                    })
                })
        })
    }

    fn package_of(descriptor: &str) -> &str {
        // `Lcom/example/Foo;` -> `com/example`
        let inner = &descriptor[1..descriptor.len() - 1];
        match inner.rfind('/') {
            Some(idx) => &inner[..idx],
            None => "",
        }
    }

    /// Register `ty`'s current descriptor as used, and, in keep-inner-class
    /// mode, walk up the `@EnclosingClass` chain registering every ancestor
    /// too — so a reserved inner class never ends up with a renamed
    /// enclosing class, which would otherwise desynchronize the `$`-joined
    /// name (§4.7.1 step 1).
    fn reserve(&mut self, ty: TypeId, reserved: &mut AHashSet<TypeId>) {
        let mut current = Some(ty);
        let mut guard = 0;
        while let Some(t) = current {
            guard += 1;
            if guard > 10_000 || !reserved.insert(t) {
                break;
            }
            self.used_type_names.insert(self.factory.type_descriptor(t));
            current = if self.config.keep_inner_class {
                self.enclosing_class_of(t)
            } else {
                None
            };
        }
    }

    /// Resolve (creating lazily) the package-rename destination for
    /// `old_package`, per `package_obfuscation_mode`.
    fn renamed_package(&mut self, old_package: &str) -> String {
        if let Some(existing) = self.package_renames.get(old_package) {
            return existing.clone();
        }
        let new_package = match self.config.package_obfuscation_mode {
            PackageObfuscationMode::Repackage => {
                self.config.package_prefix.clone().unwrap_or_default()
            }
            PackageObfuscationMode::Flatten => {
                let root_key = self.config.package_prefix.clone().unwrap_or_default();
                let used = self.used_package_prefixes.clone();
                let fresh = self.namespace_for_key(&root_key).next_package_prefix(&used);
                self.used_package_prefixes.insert(fresh.clone());
                fresh
            }
            PackageObfuscationMode::None => self.renamed_package_none(old_package),
        };
        self.package_renames.insert(old_package.to_string(), new_package.clone());
        new_package
    }

    /// `package_obfuscation_mode == none`: recursively derive a fresh
    /// prefix for each segment, parented at the already-renamed parent
    /// package's namespace (`La/b/c` derives its prefix from `La/b`'s
    /// state).
    fn renamed_package_none(&mut self, old_package: &str) -> String {
        if old_package.is_empty() {
            return self.config.package_prefix.clone().unwrap_or_default();
        }
        if let Some(existing) = self.package_renames.get(old_package) {
            return existing.clone();
        }
        let parent = match old_package.rfind('/') {
            Some(idx) => &old_package[..idx],
            None => "",
        };
        let parent_new = self.renamed_package_none(parent);
        let used = self.used_package_prefixes.clone();
        let fresh = self.namespace_for_key(&parent_new).next_package_prefix(&used);
        self.used_package_prefixes.insert(fresh.clone());
        self.package_renames.insert(old_package.to_string(), fresh.clone());
        fresh
    }

    /// Rename a single non-reserved, non-inner class, returning its new
    /// descriptor.
    fn rename_class(&mut self, ty: TypeId, descriptor: &str, keep_package_name: bool) -> Arc<str> {
        let old_package = Self::package_of(descriptor);
        let namespace_key = if keep_package_name {
            old_package.to_string()
        } else {
            self.renamed_package(old_package)
        };
        let used = self.used_type_names.clone();
        let name = self.namespace_for_key(&namespace_key).next_type_name(&used);
        self.used_type_names.insert(name.clone());
        name
    }

    /// Rename an inner class in keep-inner-class mode: reuse the outer
    /// class's own per-outer state to mint a `$`-joined suffix.
    fn rename_inner_class(&mut self, outer_new_descriptor: &Arc<str>, outer: TypeId) -> Arc<str> {
        let dict = self.dictionary();
        let state = self
            .inner_namespaces
            .entry(outer)
            .or_insert_with(|| Namespace::new(String::new(), dict.clone(), dict));
        let used_suffixes: AHashSet<Arc<str>> = AHashSet::new();
        let suffix_descriptor = state.next_type_name(&used_suffixes);
        // `next_type_name` always returns `L<suffix>;`; strip the wrapper.
        let suffix = &suffix_descriptor[1..suffix_descriptor.len() - 1];
        let outer_body = &outer_new_descriptor[1..outer_new_descriptor.len() - 1];
        let descriptor: Arc<str> = Arc::from(format!("L{outer_body}${suffix};"));
        self.used_type_names.insert(descriptor.clone());
        descriptor
    }

    /// Rewrite an array descriptor (`[[...[Lbase;`) by renaming only the
    /// base component type.
    fn rename_array(descriptor: &str, base_new: &str) -> String {
        let depth = descriptor.bytes().take_while(|&b| b == b'[').count();
        format!("{}{}", "[".repeat(depth), base_new)
    }

    /// Run the class-name minifier over every program class, returning the
    /// type half of the rename lens.
    pub fn run(&mut self, root_set: &RootSet) -> ClassRenameResult {
        let mut lens = Lens::new();
        let mut reserved: AHashSet<TypeId> = AHashSet::new();

        let no_obfuscation_types: Vec<TypeId> = root_set
            .no_obfuscation
            .iter()
            .filter_map(|item| match item {
                Item::Class(class_id) => Some(self.factory.with_class(*class_id, |c| c.class_type)),
                _ => None,
            })
            .collect();
        for ty in no_obfuscation_types {
            self.reserve(ty, &mut reserved);
        }

        let keep_package_name_types: AHashSet<TypeId> = root_set
            .keep_package_name
            .iter()
            .filter_map(|item| match item {
                Item::Class(class_id) => Some(self.factory.with_class(*class_id, |c| c.class_type)),
                _ => None,
            })
            .collect();

        // Non-inner classes first (top-level package resolution must exist
        // before an inner class can reuse its outer's renamed descriptor).
        let mut program_types = Vec::new();
        for class_id in self.factory.class_ids() {
            let (class_type, origin) = self.factory.with_class(class_id, |c| (c.class_type, c.origin));
            if !matches!(origin, shrinker_graph::Origin::Program) {
                continue;
            }
            program_types.push(class_type);
        }
        shrinker_graph::slow_sort(self.factory, &mut program_types, shrinker_graph::compare_types);

        let mut remaining: Vec<TypeId> = Vec::new();
        for &ty in &program_types {
            if reserved.contains(&ty) {
                continue;
            }
            let is_inner = self.config.keep_inner_class && self.enclosing_class_of(ty).is_some();
            if !is_inner {
                remaining.push(ty);
            }
        }
        for ty in remaining {
            let descriptor = self.factory.type_descriptor(ty);
            let keep_pkg = keep_package_name_types.contains(&ty);
            let new_name = self.rename_class(ty, &descriptor, keep_pkg);
            lens.rename_type(ty, new_name);
        }

        // Second pass: inner classes, processed in ascending nesting depth
        // so an outer's renamed descriptor is available when its inner is
        // resolved (a class nested N levels deep depends on N-1 prior
        // resolutions).
        if self.config.keep_inner_class {
            let mut inner_types: Vec<TypeId> = program_types
                .iter()
                .copied()
                .filter(|ty| !reserved.contains(ty) && self.enclosing_class_of(*ty).is_some())
                .collect();
            let mut progress = true;
            while progress && !inner_types.is_empty() {
                progress = false;
                let mut next_round = Vec::new();
                for ty in inner_types {
                    let outer = self.enclosing_class_of(ty).expect("filtered above");
                    let outer_descriptor = if reserved.contains(&outer) {
                        Some(self.factory.type_descriptor(outer))
                    } else {
                        lens.renamed_type(outer)
                    };
                    let Some(outer_descriptor) = outer_descriptor else {
                        // outer is itself an unresolved inner class; defer.
                        next_round.push(ty);
                        continue;
                    };
                    let new_name = self.rename_inner_class(&outer_descriptor, outer);
                    lens.rename_type(ty, new_name);
                    progress = true;
                }
                inner_types = next_round;
            }
        }

        self.rewrite_array_descriptors(&mut lens, &program_types);
        let rewritten_signatures = self.rewrite_signatures(&lens, &program_types);
        ClassRenameResult { lens, rewritten_signatures }
    }

    fn rewrite_array_descriptors(&self, lens: &mut Lens, program_types: &[TypeId]) {
        for &ty in program_types {
            let ty_data = self.factory.get_type(ty);
            if !ty_data.is_array() {
                continue;
            }
            let descriptor = self.factory.type_descriptor(ty);
            let depth = descriptor.bytes().take_while(|&b| b == b'[').count();
            let base = &descriptor[depth..];
            if let Some(base_ty) = self.factory.create_type(base).ok().filter(|_| base.starts_with('L')) {
                if let Some(new_base) = lens.renamed_type(base_ty) {
                    lens.rename_type(ty, Arc::from(Self::rename_array(&descriptor, &new_base)));
                }
            }
        }
    }

    /// Parse every `Signature` annotation's `(symbol | identifier |
    /// type-name | inner-type-name)` event stream and re-emit it with each
    /// embedded type name renamed through `lens`.
    fn rewrite_signatures(&self, lens: &Lens, program_types: &[TypeId]) -> AHashMap<TypeId, String> {
        let mut out = AHashMap::new();
        for &ty in program_types {
            let Some(class_id) = self.factory.definition_for(ty) else { continue };
            let raw = self.factory.with_class(class_id, |c| {
                c.annotations
                    .iter()
                    .find(|a| &*self.factory.type_descriptor(a.annotation_type) == SIGNATURE_ANNOTATION)
                    .map(|a| {
                        a.elements
                            .iter()
                            .filter_map(|(_, value)| match value {
                                EncodedValue::String(s) => Some(self.factory.get_string(*s)),
                                EncodedValue::Array(items) => Some(Arc::from(
                                    items
                                        .iter()
                                        .filter_map(|v| match v {
                                            EncodedValue::String(s) => {
                                                Some(self.factory.get_string(*s).to_string())
                                            }
                                            _ => None,
                                        })
                                        .collect::<String>(),
                                )),
                                _ => None,
                            })
                            .collect::<Vec<_>>()
                            .join("")
                    })
            });
            let Some(raw) = raw else { continue };
            if raw.is_empty() {
                continue;
            }
            let rewritten = rewrite_signature_text(&raw, |descriptor| {
                self.factory
                    .create_type(descriptor)
                    .ok()
                    .and_then(|t| lens.renamed_type(t))
                    .map(|s| s.to_string())
            });
            out.insert(ty, rewritten);
        }
        out
    }
}

/// Parse a JVM/Dalvik generic-signature string into rename-aware events and
/// rewrite every embedded type name through `rename`. Kept as a free
/// function (rather than a method) so it can be unit tested without a
/// populated factory.
pub fn rewrite_signature_text(signature: &str, rename: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(signature.len());
    let bytes = signature.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'L' {
            let start = i;
            let mut end = i + 1;
            while end < bytes.len() && bytes[end] != b';' && bytes[end] != b'<' && bytes[end] != b'.' {
                end += 1;
            }
            let type_name = &signature[start..end];
            let descriptor = format!("{type_name};");
            if let Some(renamed) = rename(&descriptor) {
                out.push_str(renamed.trim_end_matches(';'));
            } else {
                out.push_str(type_name);
            }
            i = end;
        } else {
            out.push(bytes[i] as char);
            i += 1;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use shrinker_enqueue::RootSetBuilder;
    use shrinker_graph::{AccessFlags, Class, Origin};

    fn empty_class(factory: &Factory, descriptor: &str) {
        let class_type = factory.create_type(descriptor).unwrap();
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
                virtual_methods: vec![],
            })
            .unwrap();
    }

    #[test]
    fn unkept_class_gets_renamed() {
        let factory = Factory::new();
        empty_class(&factory, "Lcom/example/Foo;");
        let config = shrinker_config::parse_str("t.pro", "-dontoptimize").unwrap();
        let root_set = RootSetBuilder::new(&factory, &config).build();
        let mut minifier = ClassNameMinifier::new(&factory, &config);
        let result = minifier.run(&root_set);
        let foo = factory.create_type("Lcom/example/Foo;").unwrap();
        assert!(result.lens.renamed_type(foo).is_some());
    }

    #[test]
    fn kept_class_keeps_its_name() {
        let factory = Factory::new();
        empty_class(&factory, "Lcom/example/Foo;");
        let config = shrinker_config::parse_str("t.pro", "-keep class com.example.Foo").unwrap();
        let root_set = RootSetBuilder::new(&factory, &config).build();
        let mut minifier = ClassNameMinifier::new(&factory, &config);
        let result = minifier.run(&root_set);
        let foo = factory.create_type("Lcom/example/Foo;").unwrap();
        assert!(result.lens.renamed_type(foo).is_none());
    }

    #[test]
    fn signature_text_rewrites_embedded_type() {
        let rewritten = rewrite_signature_text("Ljava/util/List<Lcom/example/Foo;>;", |d| {
            if d == "Lcom/example/Foo;" {
                Some("La;".to_string())
            } else {
                None
            }
        });
        assert_eq!(rewritten, "Ljava/util/List<La;>;");
    }
}
