//! Call-site counting (§4.6): for each non-pinned live method, the number
//! of call sites targeting it (i.e. its in-degree) keyed for the inliner.

use ahash::AHashSet;
use shrinker_graph::MethodId;

use crate::graph::CallGraph;

#[derive(Debug, Default)]
pub struct CallSiteCounts {
    pub single_call_site: AHashSet<MethodId>,
    pub double_call_site: AHashSet<MethodId>,
}

pub fn count_call_sites(graph: &CallGraph, pinned: &AHashSet<MethodId>) -> CallSiteCounts {
    let mut counts = CallSiteCounts::default();
    for method in graph.nodes() {
        if pinned.contains(&method) {
            continue;
        }
        match graph.callers(method).count() {
            1 => {
                counts.single_call_site.insert(method);
            }
            2 => {
                counts.double_call_site.insert(method);
            }
            _ => {}
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use shrinker_enqueue::AppInfoWithLiveness;

    #[test]
    fn single_and_double_call_sites_are_classified() {
        use shrinker_graph::{AccessFlags, Class, Factory, Origin};

        let factory = Factory::new();
        let mk = |name: &str| {
            let holder = factory.create_type(&format!("L{name};")).unwrap();
            let void = factory.create_type("V").unwrap();
            let name_id = factory.create_string("m");
            let proto = factory.create_proto(void, &[]);
            let method_id = factory.create_method(holder, name_id, proto);
            factory
                .define_class(Class {
                    class_type: holder,
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
            method_id
        };
        let caller1 = mk("C1");
        let caller2 = mk("C2");
        let single_target = mk("S");
        let double_target = mk("D");

        let mut info = AppInfoWithLiveness::default();
        info.live_methods = vec![caller1, caller2, single_target, double_target];
        info.direct_invokes = vec![
            (caller1, single_target),
            (caller1, double_target),
            (caller2, double_target),
        ];
        let graph = CallGraph::build(&info);
        let counts = count_call_sites(&graph, &AHashSet::default());
        assert!(counts.single_call_site.contains(&single_target));
        assert!(counts.double_call_site.contains(&double_target));
    }
}
