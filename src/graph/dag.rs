//! dag.rs
//! Dependency ordering shared by the projection render context and the
//! graph model execution order.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::HashMap;
use std::hash::Hash;

/// Result of a Kahn ordering. `unresolved` keeps every key whose
/// dependencies could not be satisfied (cycles or unknown keys), in
/// insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct KahnOrder<K> {
    pub order: Vec<K>,
    pub unresolved: Vec<K>,
}

impl<K> KahnOrder<K> {
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Orders `nodes` so that every key comes after its dependencies.
///
/// The ready set is a stack: the most recently unblocked key runs first.
/// Dependencies on keys that are not part of `nodes` are never satisfied.
pub fn kahn_order<K, I>(nodes: I) -> KahnOrder<K>
where
    K: Clone + Eq + Hash,
    I: IntoIterator<Item = (K, Vec<K>)>,
{
    let nodes: Vec<(K, Vec<K>)> = nodes.into_iter().collect();
    let mut graph: DiGraph<K, ()> = DiGraph::with_capacity(nodes.len(), nodes.len());
    let mut index: HashMap<K, NodeIndex> = HashMap::with_capacity(nodes.len());

    // 1. Real nodes first so indices follow insertion order
    for (key, _) in &nodes {
        if !index.contains_key(key) {
            let idx = graph.add_node(key.clone());
            index.insert(key.clone(), idx);
        }
    }
    let real_count = graph.node_count();

    // 2. Edges dependency -> dependent; unknown dependencies become phantom nodes
    for (key, deps) in &nodes {
        let target = index[key];
        for dep in deps {
            let source = match index.get(dep) {
                Some(&idx) => idx,
                None => {
                    let idx = graph.add_node(dep.clone());
                    index.insert(dep.clone(), idx);
                    idx
                }
            };
            graph.update_edge(source, target, ());
        }
    }

    // 3. In-degrees and the initial stack
    let mut in_degree: Vec<usize> = graph
        .node_indices()
        .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
        .collect();
    let mut stack: Vec<NodeIndex> = (0..real_count)
        .map(NodeIndex::new)
        .filter(|n| in_degree[n.index()] == 0)
        .collect();
    let mut done = vec![false; graph.node_count()];
    let mut order = Vec::with_capacity(real_count);

    // 4. Retire nodes, unblocking dependents in insertion order
    while let Some(node) = stack.pop() {
        done[node.index()] = true;
        order.push(graph[node].clone());

        let mut dependents: Vec<NodeIndex> = graph.neighbors_directed(node, Direction::Outgoing).collect();
        dependents.sort();
        for child in dependents {
            in_degree[child.index()] -= 1;
            if in_degree[child.index()] == 0 {
                stack.push(child);
            }
        }
    }

    let unresolved = (0..real_count)
        .filter(|&i| !done[i])
        .map(|i| graph[NodeIndex::new(i)].clone())
        .collect();

    KahnOrder { order, unresolved }
}
