//! Binary identity computation.
//!
//! The identity hashes a node's name, version, binary-relevant settings and
//! options, and one contribution per non-build dependency in declaration
//! order. How much of a dependency leaks in is set by the consumer's
//! [`PackageIdMode`].

use kiln_core::identity::BinaryIdentity;
use kiln_core::recipe::PackageIdMode;
use kiln_util::hash::Fingerprinter;
use petgraph::stable_graph::NodeIndex;
use tracing::trace;

use crate::error::ResolveError;
use crate::graph::{DependencyGraph, GraphNode};

/// Identity of the node at `idx`. Dependencies must already carry theirs.
pub fn compute_identity(graph: &DependencyGraph, idx: NodeIndex) -> BinaryIdentity {
    let node = graph.node(idx);
    let mut fp = Fingerprinter::new();
    fp.field("name", &node.reference.name)
        .field("version", node.reference.version.as_str());

    for (key, value) in &node.settings {
        if !node.binary_insensitive_keys.contains(key) {
            fp.field(&format!("setting.{key}"), value);
        }
    }
    for (key, value) in &node.options {
        if !node.binary_insensitive_keys.contains(key) {
            fp.field(&format!("option.{key}"), value);
        }
    }

    for (dep, edge) in graph.dependencies_of(idx) {
        if edge.build {
            continue;
        }
        if let Some(contribution) = dependency_contribution(node.package_id_mode, graph.node(dep)) {
            fp.field("requires", &contribution);
        }
    }

    BinaryIdentity::new(fp.finish())
}

fn dependency_contribution(mode: PackageIdMode, dep: &GraphNode) -> Option<String> {
    let reference = &dep.reference;
    match mode {
        PackageIdMode::FullPackage => Some(format!(
            "{}:{}",
            reference.short(),
            dep.identity.as_ref().map_or("", BinaryIdentity::as_str)
        )),
        PackageIdMode::FullVersion => Some(reference.short()),
        PackageIdMode::Semver => {
            let major = reference
                .version
                .major()
                .map_or_else(|| reference.version.to_string(), |m| m.to_string());
            Some(format!("{}/{major}.Y.Z", reference.name))
        }
        PackageIdMode::Unrelated => None,
    }
}

/// Fill in the identity of every node, dependencies first.
///
/// Pinned nodes keep the identity recorded in the lockfile.
pub fn assign_identities(graph: &mut DependencyGraph) -> Result<(), ResolveError> {
    let Some(order) = graph.dependencies_first() else {
        let path = graph.find_cycle().unwrap_or_default();
        return Err(ResolveError::Cycle {
            path: graph.labels(&path),
        });
    };

    for idx in order {
        let node = graph.node(idx);
        if node.pinned && node.identity.is_some() {
            continue;
        }
        let identity = compute_identity(graph, idx);
        trace!("{} -> {}", graph.node(idx).reference, identity);
        graph.node_mut(idx).identity = Some(identity);
    }
    Ok(())
}
