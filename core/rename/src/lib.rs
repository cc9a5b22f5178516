//! Name minification (§4.7): renders a program's class and method names
//! into a single `Lens`, consumed read-through by the distributor and the
//! writer. Two independent sub-minifiers feed it:
//!
//! - [`classes::ClassNameMinifier`] — class (and package) names, plus
//!   rewritten `Signature` annotation text.
//! - [`methods::MethodNameMinifier`] — method names, where virtual dispatch
//!   forces names to stay synchronized across overriding methods and
//!   interface implementations.
//!
//! Neither touches the program in place; [`NameMinifier::run`] only builds
//! the lens the writer will apply later.

mod classes;
mod dictionary;
mod errors;
mod methods;
mod namespace;

pub use classes::{rewrite_signature_text, ClassNameMinifier, ClassRenameResult};
pub use dictionary::{identifier, DictionaryIter};
pub use errors::RenameError;
pub use methods::MethodNameMinifier;
pub use namespace::Namespace;

use ahash::AHashMap;
use shrinker_config::Configuration;
use shrinker_enqueue::RootSet;
use shrinker_graph::{Factory, Lens, SubtypeIndex, TypeId};

/// Combined output of the class- and method-name minifiers: one `Lens`
/// spanning both type and method renamings, plus the class minifier's
/// rewritten `Signature` annotation bodies.
#[derive(Debug, Default)]
pub struct MinifyResult {
    pub lens: Lens,
    pub rewritten_signatures: AHashMap<TypeId, String>,
}

/// Drives both sub-minifiers over a single program and merges their output
/// into one [`Lens`]. `-dontobfuscate` (`config.obfuscate == false`) is the
/// caller's concern: skip constructing this at all and pass the identity
/// `Lens` downstream instead.
pub struct NameMinifier<'a> {
    factory: &'a Factory,
    subtypes: &'a SubtypeIndex,
    config: &'a Configuration,
}

impl<'a> NameMinifier<'a> {
    pub fn new(factory: &'a Factory, subtypes: &'a SubtypeIndex, config: &'a Configuration) -> Self {
        NameMinifier { factory, subtypes, config }
    }

    pub fn run(&self, root_set: &RootSet) -> MinifyResult {
        let ClassRenameResult { mut lens, rewritten_signatures } =
            ClassNameMinifier::new(self.factory, self.config).run(root_set);

        let method_lens = MethodNameMinifier::new(self.factory, self.subtypes, self.config).run(root_set);
        for (method, name) in method_lens.method_entries() {
            lens.rename_method(method, name.clone());
        }

        MinifyResult { lens, rewritten_signatures }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shrinker_enqueue::RootSetBuilder;
    use shrinker_graph::{AccessFlags, Class, EncodedMethod, Origin};

    #[test]
    fn combined_lens_carries_both_type_and_method_renames() {
        let factory = Factory::new();
        let void = factory.create_type("V").unwrap();
        let proto = factory.create_proto(void, &[]);
        let foo_ty = factory.create_type("Lcom/example/Foo;").unwrap();
        let name = factory.create_string("doWork");
        let method_ref = factory.create_method(foo_ty, name, proto);
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
                virtual_methods: vec![EncodedMethod {
                    method_ref,
                    access_flags: AccessFlags::PUBLIC,
                    code: None,
                    debug_info: None,
                    annotations: vec![],
                }],
            })
            .unwrap();

        let config = shrinker_config::parse_str("t.pro", "-dontoptimize").unwrap();
        let root_set = RootSetBuilder::new(&factory, &config).build();
        let subtypes = SubtypeIndex::build(&factory);
        let result = NameMinifier::new(&factory, &subtypes, &config).run(&root_set);

        assert!(result.lens.renamed_type(foo_ty).is_some());
        assert!(result.lens.renamed_method(method_ref).is_some());
    }
}
