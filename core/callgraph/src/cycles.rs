//! Cycle breaking (§4.5): DFS with (marked, on-stack) coloring. Back-edges
//! are removed and recorded in `breakers`; callees are visited in
//! `slow_compare` order so the set of removed edges is deterministic.

use ahash::{AHashMap, AHashSet};
use shrinker_graph::{compare_methods, Factory, MethodId};

use crate::graph::CallGraph;

pub type Breakers = AHashMap<MethodId, AHashSet<MethodId>>;

#[derive(Debug, Default)]
enum Color {
    #[default]
    White,
    Gray,
    Black,
}

/// Remove edges that would close a cycle, recording each removal. Running
/// this a second time over the result removes zero edges (testable
/// property 6).
pub fn break_cycles(factory: &Factory, graph: &mut CallGraph) -> Breakers {
    let mut breakers: Breakers = AHashMap::default();
    let mut color: AHashMap<MethodId, Color> = AHashMap::default();
    let mut to_remove: Vec<(MethodId, MethodId)> = Vec::new();

    let mut roots: Vec<MethodId> = graph.nodes().collect();
    shrinker_graph::slow_sort(factory, &mut roots, compare_methods);

    for root in roots {
        if matches!(color.get(&root), None | Some(Color::White)) {
            visit(factory, graph, root, &mut color, &mut to_remove);
        }
    }

    for (caller, callee) in to_remove {
        graph.remove_edge(caller, callee);
        breakers.entry(caller).or_default().insert(callee);
    }
    breakers
}

fn visit(
    factory: &Factory,
    graph: &CallGraph,
    node: MethodId,
    color: &mut AHashMap<MethodId, Color>,
    to_remove: &mut Vec<(MethodId, MethodId)>,
) {
    color.insert(node, Color::Gray);
    let mut callees: Vec<MethodId> = graph.callees(node).collect();
    shrinker_graph::slow_sort(factory, &mut callees, compare_methods);
    for callee in callees {
        match color.get(&callee) {
            Some(Color::Gray) => {
                to_remove.push((node, callee));
            }
            Some(Color::Black) => {}
            _ => visit(factory, graph, callee, color, to_remove),
        }
    }
    color.insert(node, Color::Black);
}

#[cfg(test)]
mod tests {
    use super::*;
    use shrinker_enqueue::AppInfoWithLiveness;
    use shrinker_graph::{Class, Origin};

    fn method(factory: &Factory, class_descriptor: &str, name: &str) -> MethodId {
        let holder = factory.create_type(class_descriptor).unwrap();
        let void = factory.create_type("V").unwrap();
        let name_id = factory.create_string(name);
        let proto = factory.create_proto(void, &[]);
        let method_id = factory.create_method(holder, name_id, proto);
        if factory.definition_for(holder).is_none() {
            factory
                .define_class(Class {
                    class_type: holder,
                    origin: Origin::Program,
                    access_flags: shrinker_graph::AccessFlags::PUBLIC,
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
        method_id
    }

    #[test]
    fn four_node_cycle_breaks_exactly_one_edge() {
        let factory = Factory::new();
        let a = method(&factory, "La;", "a");
        let b = method(&factory, "Lb;", "b");
        let c = method(&factory, "Lc;", "c");
        let d = method(&factory, "Ld;", "d");

        let mut info = AppInfoWithLiveness::default();
        info.live_methods = vec![a, b, c, d];
        info.direct_invokes = vec![(a, b), (b, c), (c, d), (d, a)];

        let mut graph = CallGraph::build(&info);
        let breakers = break_cycles(&factory, &mut graph);
        let removed: usize = breakers.values().map(|s| s.len()).sum();
        assert_eq!(removed, 1);

        let second_pass = break_cycles(&factory, &mut graph);
        let removed_again: usize = second_pass.values().map(|s| s.len()).sum();
        assert_eq!(removed_again, 0);
    }
}
