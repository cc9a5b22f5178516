//! The call graph (§4.5): nodes are live methods, edges caller→callee, with
//! a maintained reverse-edge index.

use ahash::{AHashMap, AHashSet};
use shrinker_enqueue::AppInfoWithLiveness;
use shrinker_graph::MethodId;

#[derive(Debug, Default)]
pub struct CallGraph {
    nodes: AHashSet<MethodId>,
    edges: AHashMap<MethodId, AHashSet<MethodId>>,
    reverse: AHashMap<MethodId, AHashSet<MethodId>>,
    self_recursive: AHashSet<MethodId>,
}

impl CallGraph {
    /// Build from the enqueuer's already-extracted invoke indices rather
    /// than re-walking method IR — the use-registry walk happened once, in
    /// the enqueuer, and its edges are reused here (§4.4/§4.5 share the
    /// same invoke index, avoiding discovering it twice).
    pub fn build(info: &AppInfoWithLiveness) -> Self {
        let mut graph = CallGraph::default();
        for &method_id in &info.live_methods {
            graph.nodes.insert(method_id);
        }
        let edge_lists = [
            &info.virtual_invokes,
            &info.interface_invokes,
            &info.super_invokes,
            &info.direct_invokes,
            &info.static_invokes,
        ];
        for edges in edge_lists {
            for &(caller, callee) in *edges {
                graph.add_edge(caller, callee);
            }
        }
        graph
    }

    fn add_edge(&mut self, caller: MethodId, callee: MethodId) {
        if caller == callee {
            self.self_recursive.insert(caller);
            return;
        }
        self.nodes.insert(caller);
        self.nodes.insert(callee);
        self.edges.entry(caller).or_default().insert(callee);
        self.reverse.entry(callee).or_default().insert(caller);
    }

    pub fn nodes(&self) -> impl Iterator<Item = MethodId> + '_ {
        self.nodes.iter().copied()
    }

    pub fn callees(&self, method: MethodId) -> impl Iterator<Item = MethodId> + '_ {
        self.edges.get(&method).into_iter().flat_map(|s| s.iter().copied())
    }

    pub fn callers(&self, method: MethodId) -> impl Iterator<Item = MethodId> + '_ {
        self.reverse.get(&method).into_iter().flat_map(|s| s.iter().copied())
    }

    pub fn out_degree(&self, method: MethodId) -> usize {
        self.edges.get(&method).map_or(0, |s| s.len())
    }

    pub fn is_self_recursive(&self, method: MethodId) -> bool {
        self.self_recursive.contains(&method)
    }

    pub fn edge_count(&self) -> usize {
        self.edges.values().map(|s| s.len()).sum()
    }

    pub(crate) fn remove_edge(&mut self, caller: MethodId, callee: MethodId) {
        if let Some(set) = self.edges.get_mut(&caller) {
            set.remove(&callee);
        }
        if let Some(set) = self.reverse.get_mut(&callee) {
            set.remove(&caller);
        }
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn remove_node(&mut self, method: MethodId) {
        self.nodes.remove(&method);
        if let Some(callees) = self.edges.remove(&method) {
            for callee in callees {
                if let Some(set) = self.reverse.get_mut(&callee) {
                    set.remove(&method);
                }
            }
        }
        if let Some(callers) = self.reverse.remove(&method) {
            for caller in callers {
                if let Some(set) = self.edges.get_mut(&caller) {
                    set.remove(&method);
                }
            }
        }
    }
}
