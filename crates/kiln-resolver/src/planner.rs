//! Build order planning.
//!
//! Packages are grouped into levels: every package's dependencies sit in
//! earlier levels, so the packages within one level can be built in
//! parallel. Levels are sorted by reference for stable output. The root
//! consumer is never part of the plan.

use std::collections::HashMap;
use std::fmt;

use kiln_core::config::BuildPolicy;
use kiln_core::identity::BinaryIdentity;
use kiln_core::recipe::BinaryCache;
use kiln_core::reference::PackageReference;
use petgraph::stable_graph::NodeIndex;
use tracing::debug;

use crate::error::{FetchFailure, ResolveError};
use crate::graph::DependencyGraph;
use crate::package_id;
use crate::retry::{self, RetryPolicy};

/// What has to happen to make a package's binary available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeAction {
    /// Build from source.
    Build,
    /// A matching binary is in the cache.
    Download,
    /// Not cached and the policy forbids building it.
    Missing,
}

impl fmt::Display for NodeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            NodeAction::Build => "build",
            NodeAction::Download => "download",
            NodeAction::Missing => "missing",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedNode {
    pub index: NodeIndex,
    pub reference: PackageReference,
    pub identity: BinaryIdentity,
    pub action: NodeAction,
}

/// Ordered build levels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPlan {
    pub levels: Vec<Vec<PlannedNode>>,
}

impl BuildPlan {
    /// Every planned package, level by level.
    pub fn nodes(&self) -> impl Iterator<Item = &PlannedNode> {
        self.levels.iter().flatten()
    }

    /// Level and entry of the package called `name`.
    pub fn find(&self, name: &str) -> Option<(usize, &PlannedNode)> {
        self.levels.iter().enumerate().find_map(|(level, nodes)| {
            nodes
                .iter()
                .find(|n| n.reference.name == name)
                .map(|n| (level, n))
        })
    }

    pub fn count(&self, action: NodeAction) -> usize {
        self.nodes().filter(|n| n.action == action).count()
    }

    /// No package is missing.
    pub fn is_complete(&self) -> bool {
        self.count(NodeAction::Missing) == 0
    }

    pub fn len(&self) -> usize {
        self.nodes().count()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

impl fmt::Display for BuildPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (level, nodes) in self.levels.iter().enumerate() {
            writeln!(f, "Level {level}:")?;
            for node in nodes {
                writeln!(
                    f,
                    "  {:<9}{} [{}]",
                    node.action.to_string(),
                    node.reference,
                    node.identity.short()
                )?;
            }
        }
        Ok(())
    }
}

/// Order `graph` into build levels and decide an action for every package.
///
/// Cache lookups go through `retry`; a cache that keeps failing aborts the
/// plan. With [`BuildPolicy::Always`] the cache is never consulted.
pub fn plan(
    graph: &DependencyGraph,
    cache: Option<&dyn BinaryCache>,
    policy: BuildPolicy,
    retry: &RetryPolicy,
) -> Result<BuildPlan, ResolveError> {
    if let Some(cycle) = graph.find_cycle() {
        return Err(ResolveError::Cycle {
            path: graph.labels(&cycle),
        });
    }

    let with_ids;
    let graph = if graph.node_indices().any(|i| graph.node(i).identity.is_none()) {
        let mut copy = graph.clone();
        package_id::assign_identities(&mut copy)?;
        with_ids = copy;
        &with_ids
    } else {
        graph
    };

    let root = graph.root;
    let mut pending: HashMap<NodeIndex, usize> = graph
        .node_indices()
        .filter(|&idx| Some(idx) != root)
        .map(|idx| (idx, graph.dependencies_of(idx).len()))
        .collect();
    let total = pending.len();

    let mut ready: Vec<NodeIndex> = pending
        .iter()
        .filter(|&(_, &count)| count == 0)
        .map(|(&idx, _)| idx)
        .collect();
    let mut levels = Vec::new();
    let mut placed = 0usize;

    while !ready.is_empty() {
        ready.sort_by(|a, b| {
            let (a, b) = (&graph.node(*a).reference, &graph.node(*b).reference);
            a.name.cmp(&b.name).then_with(|| a.version.cmp(&b.version))
        });

        let mut next = Vec::new();
        for &idx in &ready {
            for (dependent, _) in graph.dependents_of(idx) {
                if let Some(count) = pending.get_mut(&dependent) {
                    *count -= 1;
                    if *count == 0 {
                        next.push(dependent);
                    }
                }
            }
        }

        let mut level = Vec::with_capacity(ready.len());
        for &idx in &ready {
            level.push(planned(graph, idx, cache, policy, retry)?);
        }
        placed += level.len();
        levels.push(level);
        ready = next;
    }

    if placed != total {
        let path = graph.find_cycle().unwrap_or_default();
        return Err(ResolveError::Cycle {
            path: graph.labels(&path),
        });
    }
    Ok(BuildPlan { levels })
}

fn planned(
    graph: &DependencyGraph,
    idx: NodeIndex,
    cache: Option<&dyn BinaryCache>,
    policy: BuildPolicy,
    retry: &RetryPolicy,
) -> Result<PlannedNode, ResolveError> {
    let node = graph.node(idx);
    let reference = node.reference.clone();
    let identity = node
        .identity
        .clone()
        .unwrap_or_else(|| package_id::compute_identity(graph, idx));

    let action = match policy {
        BuildPolicy::Always => NodeAction::Build,
        BuildPolicy::Missing | BuildPolicy::Never => {
            let cached = match cache {
                Some(cache) => is_cached(cache, &reference, &identity, retry)?,
                None => false,
            };
            match (cached, policy) {
                (true, _) => NodeAction::Download,
                (false, BuildPolicy::Never) => NodeAction::Missing,
                (false, _) => NodeAction::Build,
            }
        }
    };
    debug!("{reference} [{}]: {action}", identity.short());

    Ok(PlannedNode {
        index: idx,
        reference,
        identity,
        action,
    })
}

fn is_cached(
    cache: &dyn BinaryCache,
    reference: &PackageReference,
    identity: &BinaryIdentity,
    retry: &RetryPolicy,
) -> Result<bool, ResolveError> {
    let what = format!("binary {reference}:{}", identity.short());
    match retry::run(retry, &what, || cache.has(reference, identity)) {
        Ok(found) => Ok(found),
        Err(ResolveError::ProviderFetch {
            kind: FetchFailure::NotFound,
            ..
        }) => Ok(false),
        Err(e) => Err(e),
    }
}
