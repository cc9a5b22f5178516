//! Root-set builder (§4.3) and liveness-fixpoint enqueuer (§4.4).

pub mod enqueuer;
pub mod errors;
pub mod item;
pub mod liveness;
pub mod pattern;
pub mod rootset;

pub use enqueuer::Enqueuer;
pub use errors::EnqueueError;
pub use item::{Item, KeepReason};
pub use liveness::AppInfoWithLiveness;
pub use rootset::{RootSet, RootSetBuilder};

#[cfg(test)]
mod tests {
    use super::*;
    use shrinker_config::parse_str;
    use shrinker_graph::{AccessFlags, Class, Factory, Origin, SubtypeIndex};

    fn class(factory: &Factory, descriptor: &str, super_: Option<&str>) -> shrinker_graph::ClassId {
        let class_type = factory.create_type(descriptor).unwrap();
        let super_type = super_.map(|s| factory.create_type(s).unwrap());
        factory
            .define_class(Class {
                class_type,
                origin: Origin::Program,
                access_flags: AccessFlags::PUBLIC,
                super_type,
                interfaces: vec![],
                source_file: None,
                annotations: vec![],
                static_fields: vec![],
                instance_fields: vec![],
                direct_methods: vec![],
                virtual_methods: vec![],
            })
            .unwrap()
    }

    #[test]
    fn kept_class_is_instantiated_and_live() {
        let factory = Factory::new();
        let foo = class(&factory, "Lcom/example/Foo;", None);
        let config = parse_str("t.pro", "-keep class com.example.Foo").unwrap();
        let root_set = RootSetBuilder::new(&factory, &config).build();
        let subtypes = SubtypeIndex::build(&factory);
        let enqueuer = Enqueuer::new(&factory, &subtypes, false);
        let info = enqueuer.run(&root_set).unwrap();
        let foo_type = factory.with_class(foo, |c| c.class_type);
        assert!(info.live_types.contains(&foo_type));
        assert!(info.instantiated_types.contains(&foo_type));
    }

    #[test]
    fn unkept_class_is_not_live() {
        let factory = Factory::new();
        class(&factory, "Lcom/example/Foo;", None);
        class(&factory, "Lcom/example/Bar;", None);
        let config = parse_str("t.pro", "-keep class com.example.Foo").unwrap();
        let root_set = RootSetBuilder::new(&factory, &config).build();
        let subtypes = SubtypeIndex::build(&factory);
        let enqueuer = Enqueuer::new(&factory, &subtypes, false);
        let info = enqueuer.run(&root_set).unwrap();
        let bar_type = factory.create_type("Lcom/example/Bar;").unwrap();
        assert!(!info.live_types.contains(&bar_type));
    }

    #[test]
    fn kept_class_marks_supertype_live() {
        let factory = Factory::new();
        class(&factory, "Lcom/example/Base;", None);
        class(&factory, "Lcom/example/Derived;", Some("Lcom/example/Base;"));
        let config = parse_str("t.pro", "-keep class com.example.Derived").unwrap();
        let root_set = RootSetBuilder::new(&factory, &config).build();
        let subtypes = SubtypeIndex::build(&factory);
        let enqueuer = Enqueuer::new(&factory, &subtypes, false);
        let info = enqueuer.run(&root_set).unwrap();
        let base_type = factory.create_type("Lcom/example/Base;").unwrap();
        assert!(info.live_types.contains(&base_type));
    }
}
