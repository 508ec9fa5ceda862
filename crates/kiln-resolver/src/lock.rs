//! Conversion between resolved graphs and `Kiln.lock` records.
//!
//! Nodes are written root first, then breadth-first along dependencies in
//! declaration order, so the same graph always produces the same bytes.

use std::collections::{HashMap, VecDeque};

use kiln_core::identity::BinaryIdentity;
use kiln_core::lockfile::{LockedDependency, LockedNode, Lockfile};
use kiln_core::reference::PackageReference;
use petgraph::stable_graph::NodeIndex;

use crate::error::ResolveError;
use crate::graph::{DepEdge, DependencyGraph, GraphNode};

/// Snapshot a resolved graph. Every node must already have an identity.
pub fn write(graph: &DependencyGraph) -> Result<Lockfile, ResolveError> {
    let root = graph.root.ok_or_else(|| lock_error("graph has no root"))?;

    let mut order = Vec::new();
    let mut positions: HashMap<NodeIndex, usize> = HashMap::new();
    let mut queue = VecDeque::from([root]);
    positions.insert(root, 0);
    while let Some(idx) = queue.pop_front() {
        order.push(idx);
        for (dep, _) in graph.dependencies_of(idx) {
            if !positions.contains_key(&dep) {
                positions.insert(dep, positions.len());
                queue.push_back(dep);
            }
        }
    }

    let mut lockfile = Lockfile::new();
    for idx in order {
        let node = graph.node(idx);
        let identity = node
            .identity
            .as_ref()
            .ok_or_else(|| lock_error(format!("{} has no binary identity", node.reference)))?;
        let dependencies = graph
            .dependencies_of(idx)
            .into_iter()
            .map(|(dep, edge)| LockedDependency {
                index: positions[&dep],
                build: edge.build,
                private: edge.private,
            })
            .collect();
        lockfile.nodes.push(LockedNode {
            reference: node.reference.to_string(),
            package_id: identity.to_string(),
            coexist: node.coexist,
            overridden: node.overridden,
            settings: node.settings.clone(),
            options: node.options.clone(),
            dependencies,
        });
    }
    Ok(lockfile)
}

/// Rebuild a fully pinned graph from a lockfile without consulting any
/// provider.
pub fn read(lockfile: &Lockfile) -> Result<DependencyGraph, ResolveError> {
    if lockfile.nodes.is_empty() {
        return Err(lock_error("lockfile has no nodes"));
    }

    let mut graph = DependencyGraph::new();
    let mut indices = Vec::with_capacity(lockfile.nodes.len());
    for record in &lockfile.nodes {
        let reference = PackageReference::parse(&record.reference)
            .map_err(|e| lock_error(e.to_string()))?;
        let mut node = GraphNode::new(reference);
        node.settings = record.settings.clone();
        node.options = record.options.clone();
        node.identity = Some(BinaryIdentity::new(record.package_id.clone()));
        node.overridden = record.overridden;
        node.coexist = record.coexist;
        node.pinned = true;

        let key = node.key();
        if graph.find(&key).is_some() {
            return Err(lock_error(format!("`{key}` is recorded twice")));
        }
        indices.push(graph.add_node(node));
    }
    graph.set_root(indices[0]);

    for (record, &from) in lockfile.nodes.iter().zip(&indices) {
        for (order, dep) in record.dependencies.iter().enumerate() {
            let &to = indices.get(dep.index).ok_or_else(|| {
                lock_error(format!(
                    "{} depends on node {} which does not exist",
                    record.reference, dep.index
                ))
            })?;
            graph.add_edge(
                from,
                to,
                DepEdge {
                    order,
                    build: dep.build,
                    private: dep.private,
                },
            );
        }
    }

    if let Some(cycle) = graph.find_cycle() {
        return Err(ResolveError::Cycle {
            path: graph.labels(&cycle),
        });
    }
    Ok(graph)
}

fn lock_error(message: impl Into<String>) -> ResolveError {
    ResolveError::Lockfile {
        message: message.into(),
    }
}
