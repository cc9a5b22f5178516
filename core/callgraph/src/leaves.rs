//! Leaf iteration (§4.5): repeatedly extract and remove out-degree-0 nodes,
//! returning each extraction as a scheduling layer for bottom-up IR passes.

use shrinker_graph::{compare_methods, Factory, MethodId};

use crate::graph::CallGraph;

/// Extract leaf layers from `graph`, consuming it. `permute` may reorder a
/// layer in place (for test determinism); it never changes which methods
/// land in which layer — a requirement the permutation hook can't violate
/// since it only reorders an already-finalized `Vec`.
pub fn leaf_layers(
    factory: &Factory,
    mut graph: CallGraph,
    mut permute: impl FnMut(&mut Vec<MethodId>),
) -> Vec<Vec<MethodId>> {
    let mut layers = Vec::new();
    while graph.node_count() > 0 {
        let mut layer: Vec<MethodId> =
            graph.nodes().filter(|&m| graph.out_degree(m) == 0).collect();
        if layer.is_empty() {
            // A cycle survived `break_cycles` (should not happen after a
            // full pass); break out rather than loop forever.
            layer = graph.nodes().collect();
        }
        shrinker_graph::slow_sort(factory, &mut layer, compare_methods);
        for &method in &layer {
            graph.remove_node(method);
        }
        permute(&mut layer);
        layers.push(layer);
    }
    layers
}

#[cfg(test)]
mod tests {
    use super::*;
    use shrinker_enqueue::AppInfoWithLiveness;
    use shrinker_graph::{AccessFlags, Class, Origin};

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
        method_id
    }

    #[test]
    fn chain_is_layered_bottom_up() {
        let factory = Factory::new();
        let a = method(&factory, "La;", "a");
        let b = method(&factory, "Lb;", "b");
        let c = method(&factory, "Lc;", "c");

        let mut info = AppInfoWithLiveness::default();
        info.live_methods = vec![a, b, c];
        info.direct_invokes = vec![(a, b), (b, c)];
        let graph = CallGraph::build(&info);

        let layers = leaf_layers(&factory, graph, |_| {});
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0], vec![c]);
        assert_eq!(layers[1], vec![b]);
        assert_eq!(layers[2], vec![a]);
    }
}
