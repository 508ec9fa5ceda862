//! Dependency graph arena and traversal.
//!
//! Nodes live in a `StableDiGraph` so that retiring a subtree during
//! expansion never invalidates the indices of surviving nodes.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::fmt;

use kiln_core::identity::BinaryIdentity;
use kiln_core::recipe::PackageIdMode;
use kiln_core::reference::PackageReference;
use kiln_core::settings::ValueMap;
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

/// A package instance in the resolved graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphNode {
    pub reference: PackageReference,
    pub settings: ValueMap,
    pub options: ValueMap,
    /// Binary identity, filled in once all dependencies are final.
    pub identity: Option<BinaryIdentity>,
    /// Version came from an override rather than the original request.
    pub overridden: bool,
    /// Taken verbatim from a lockfile record.
    pub pinned: bool,
    /// Keyed by `name/version` instead of `name`.
    pub coexist: bool,
    /// `settings.<key>` / `options.<key>` entries whose value differs from
    /// the recipe default.
    pub overridden_keys: BTreeSet<String>,
    pub binary_insensitive_keys: BTreeSet<String>,
    pub package_id_mode: PackageIdMode,
    /// Bumped whenever the node is (re)expanded; queued work carrying an
    /// older serial is stale.
    pub(crate) serial: u64,
}

impl GraphNode {
    pub fn new(reference: PackageReference) -> Self {
        Self {
            reference,
            settings: ValueMap::new(),
            options: ValueMap::new(),
            identity: None,
            overridden: false,
            pinned: false,
            coexist: false,
            overridden_keys: BTreeSet::new(),
            binary_insensitive_keys: BTreeSet::new(),
            package_id_mode: PackageIdMode::default(),
            serial: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.reference.name
    }

    /// Index key: the package name, or `name/version` for coexisting nodes.
    pub fn key(&self) -> String {
        node_key(&self.reference.name, &self.reference.version.to_string(), self.coexist)
    }
}

pub(crate) fn node_key(name: &str, version: &str, coexist: bool) -> String {
    if coexist {
        format!("{name}/{version}")
    } else {
        name.to_string()
    }
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference)?;
        if let Some(id) = &self.identity {
            write!(f, " [{}]", id.short())?;
        }
        Ok(())
    }
}

/// Edge label: how the consumer requires the dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepEdge {
    /// Position of the requirement in the consumer's declaration list.
    pub order: usize,
    pub build: bool,
    pub private: bool,
}

impl DepEdge {
    pub fn new(order: usize) -> Self {
        Self {
            order,
            build: false,
            private: false,
        }
    }
}

/// A resolved dependency graph backed by petgraph.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: StableDiGraph<GraphNode, DepEdge>,
    /// Lookup from node key to node index.
    index: HashMap<String, NodeIndex>,
    pub root: Option<NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self {
            graph: StableDiGraph::new(),
            index: HashMap::new(),
            root: None,
        }
    }

    /// Add or retrieve a node. If the key already exists, returns the existing index.
    pub fn add_node(&mut self, node: GraphNode) -> NodeIndex {
        let key = node.key();
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.graph.add_node(node);
        self.index.insert(key, idx);
        idx
    }

    /// Set the root node of the graph (the consumer itself).
    pub fn set_root(&mut self, idx: NodeIndex) {
        self.root = Some(idx);
    }

    /// Add a dependency edge from `from` to `to`. A second edge between the
    /// same pair is ignored.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex, edge: DepEdge) {
        if !self.graph.edges(from).any(|e| e.target() == to) {
            self.graph.add_edge(from, to, edge);
        }
    }

    /// Look up a node by key (`name`, or `name/version` when coexisting).
    pub fn find(&self, key: &str) -> Option<NodeIndex> {
        self.index.get(key).copied()
    }

    /// Get the node data for an index.
    pub fn node(&self, idx: NodeIndex) -> &GraphNode {
        &self.graph[idx]
    }

    pub(crate) fn node_mut(&mut self, idx: NodeIndex) -> &mut GraphNode {
        &mut self.graph[idx]
    }

    /// Renumber every node's outgoing edge orders to `0..n`, keeping their
    /// relative order. Deduplicated or retired requirements leave gaps.
    pub(crate) fn compact_edge_orders(&mut self) {
        let nodes: Vec<NodeIndex> = self.graph.node_indices().collect();
        for idx in nodes {
            let mut edges: Vec<(EdgeIndex, usize)> = self
                .graph
                .edges_directed(idx, Direction::Outgoing)
                .map(|e| (e.id(), e.weight().order))
                .collect();
            edges.sort_by_key(|&(_, order)| order);
            for (order, (edge, _)) in edges.into_iter().enumerate() {
                self.graph[edge].order = order;
            }
        }
    }

    /// Whether `idx` still holds the node expanded under `serial`.
    pub(crate) fn is_live(&self, idx: NodeIndex, serial: u64) -> bool {
        self.graph
            .node_weight(idx)
            .is_some_and(|n| n.serial == serial)
    }

    pub fn contains(&self, idx: NodeIndex) -> bool {
        self.graph.contains_node(idx)
    }

    /// Every node index, root included, in arena order.
    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// All resolved nodes (excluding root).
    pub fn all_nodes(&self) -> Vec<&GraphNode> {
        self.graph
            .node_indices()
            .filter(|&idx| Some(idx) != self.root)
            .map(|idx| &self.graph[idx])
            .collect()
    }

    /// Direct dependencies of a node, in declaration order.
    pub fn dependencies_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, &DepEdge)> {
        let mut deps: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| (e.target(), e.weight()))
            .collect();
        deps.sort_by_key(|(_, edge)| edge.order);
        deps
    }

    /// Reverse dependencies (who depends on this node), sorted by reference.
    pub fn dependents_of(&self, idx: NodeIndex) -> Vec<(NodeIndex, &DepEdge)> {
        let mut dependents: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Incoming)
            .map(|e| (e.source(), e.weight()))
            .collect();
        dependents.sort_by_key(|(source, _)| self.graph[*source].reference.to_string());
        dependents
    }

    /// Drop every outgoing edge of `idx`.
    pub(crate) fn clear_dependencies(&mut self, idx: NodeIndex) {
        let edges: Vec<_> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .map(|e| e.id())
            .collect();
        for edge in edges {
            self.graph.remove_edge(edge);
        }
    }

    /// Remove every node the root can no longer reach and return them.
    pub(crate) fn prune_unreachable(&mut self) -> Vec<GraphNode> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        let mut reachable = HashSet::new();
        let mut queue = VecDeque::from([root]);
        while let Some(idx) = queue.pop_front() {
            if reachable.insert(idx) {
                queue.extend(self.graph.neighbors_directed(idx, Direction::Outgoing));
            }
        }

        let dead: Vec<_> = self
            .graph
            .node_indices()
            .filter(|idx| !reachable.contains(idx))
            .collect();
        let mut removed = Vec::with_capacity(dead.len());
        for idx in dead {
            if let Some(node) = self.graph.remove_node(idx) {
                self.index.remove(&node.key());
                removed.push(node);
            }
        }
        removed
    }

    /// Node path `from -> ... -> to` along dependency edges, if one exists.
    pub fn path_between(&self, from: NodeIndex, to: NodeIndex) -> Option<Vec<NodeIndex>> {
        let mut path = Vec::new();
        let mut visited = HashSet::new();
        if self.dfs_path(from, to, &mut path, &mut visited) {
            Some(path)
        } else {
            None
        }
    }

    /// Some dependency cycle, as a closed node path (`a -> b -> a`).
    pub fn find_cycle(&self) -> Option<Vec<NodeIndex>> {
        let start = petgraph::algo::toposort(&self.graph, None).err()?.node_id();
        for (dep, _) in self.dependencies_of(start) {
            if let Some(mut back) = self.path_between(dep, start) {
                back.insert(0, start);
                return Some(back);
            }
        }
        Some(vec![start, start])
    }

    /// References along a node path, for diagnostics.
    pub fn labels(&self, path: &[NodeIndex]) -> Vec<String> {
        path.iter()
            .map(|&idx| self.graph[idx].reference.to_string())
            .collect()
    }

    /// Nodes in dependency order: every node after all of its dependencies.
    /// `None` if the graph has a cycle.
    pub fn dependencies_first(&self) -> Option<Vec<NodeIndex>> {
        let mut order = petgraph::algo::toposort(&self.graph, None).ok()?;
        order.reverse();
        Some(order)
    }

    /// The runtime closure of `idx`: its non-build dependencies plus
    /// whatever those expose transitively. Private edges hide their target
    /// from consumers further up.
    pub fn runtime_closure(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut seen = HashSet::new();
        let mut closure = Vec::new();
        let mut queue: VecDeque<NodeIndex> = self
            .dependencies_of(idx)
            .into_iter()
            .filter(|(_, edge)| !edge.build)
            .map(|(dep, _)| dep)
            .collect();

        while let Some(dep) = queue.pop_front() {
            if dep == idx || !seen.insert(dep) {
                continue;
            }
            closure.push(dep);
            queue.extend(
                self.dependencies_of(dep)
                    .into_iter()
                    .filter(|(_, edge)| !edge.build && !edge.private)
                    .map(|(next, _)| next),
            );
        }
        closure
    }

    /// Print the dependency tree to a string, listing build requirements
    /// of the root in their own section.
    pub fn print_tree(&self, max_depth: Option<usize>) -> String {
        let mut output = String::new();
        let root = match self.root {
            Some(r) => r,
            None => return output,
        };

        output.push_str(&format!("{}\n", self.graph[root]));

        let (build_deps, host_deps): (Vec<_>, Vec<_>) = self
            .dependencies_of(root)
            .into_iter()
            .partition(|(_, edge)| edge.build);

        let show_headers = !build_deps.is_empty();
        let mut visited = HashSet::new();
        visited.insert(root);

        let sections = [("[requires]", &host_deps), ("[build-requires]", &build_deps)];
        let total_sections = sections.iter().filter(|(_, d)| !d.is_empty()).count();
        let mut sections_printed = 0usize;

        for (label, deps_list) in sections {
            if deps_list.is_empty() {
                continue;
            }
            sections_printed += 1;
            if show_headers {
                output.push_str(&format!("{label}\n"));
            }
            let is_last_section = sections_printed == total_sections;
            let count = deps_list.len();
            for (i, (idx, edge)) in deps_list.iter().enumerate() {
                let is_last = i == count - 1 && is_last_section;
                self.print_subtree(&mut output, *idx, edge, "", is_last, 1, max_depth, &mut visited);
            }
        }

        output
    }

    #[allow(clippy::too_many_arguments)]
    fn print_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        edge: &DepEdge,
        prefix: &str,
        is_last: bool,
        depth: usize,
        max_depth: Option<usize>,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        let node = &self.graph[idx];
        let mut marks = String::new();
        if edge.build && depth > 1 {
            marks.push_str(" (build)");
        }
        if edge.private {
            marks.push_str(" (private)");
        }
        if node.overridden {
            marks.push_str(" (overridden)");
        }
        if !node.overridden_keys.is_empty() {
            let keys: Vec<&str> = node.overridden_keys.iter().map(String::as_str).collect();
            marks.push_str(&format!(" (overrides: {})", keys.join(", ")));
        }
        output.push_str(&format!("{prefix}{connector}{node}{marks}\n"));

        if let Some(max) = max_depth {
            if depth >= max {
                return;
            }
        }

        if !visited.insert(idx) {
            return;
        }

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let deps = self.dependencies_of(idx);
        let count = deps.len();
        for (i, (child, child_edge)) in deps.iter().enumerate() {
            let is_last = i == count - 1;
            self.print_subtree(
                output,
                *child,
                child_edge,
                &child_prefix,
                is_last,
                depth + 1,
                max_depth,
                visited,
            );
        }

        visited.remove(&idx);
    }

    /// Find the path from root to a specific dependency.
    ///
    /// Accepts a node key (`name` or `name/version`); a bare name also
    /// finds the first coexisting version of that package.
    pub fn find_path(&self, target_key: &str) -> Option<Vec<&GraphNode>> {
        let root = self.root?;
        let target = self.resolve_key(target_key)?;
        let path = self.path_between(root, target)?;
        Some(path.iter().map(|&idx| &self.graph[idx]).collect())
    }

    fn resolve_key(&self, key: &str) -> Option<NodeIndex> {
        if let Some(&idx) = self.index.get(key) {
            return Some(idx);
        }
        let mut candidates: Vec<_> = self
            .index
            .iter()
            .filter(|(k, _)| k.split('/').next() == Some(key))
            .collect();
        candidates.sort_by(|a, b| a.0.cmp(b.0));
        candidates.first().map(|(_, &idx)| idx)
    }

    fn dfs_path(
        &self,
        current: NodeIndex,
        target: NodeIndex,
        path: &mut Vec<NodeIndex>,
        visited: &mut HashSet<NodeIndex>,
    ) -> bool {
        path.push(current);
        if current == target {
            return true;
        }
        if !visited.insert(current) {
            path.pop();
            return false;
        }
        for (next, _) in self.dependencies_of(current) {
            if self.dfs_path(next, target, path, visited) {
                return true;
            }
        }
        path.pop();
        false
    }

    /// Build an inverted dependency tree (reverse edges) for a single package.
    pub fn print_inverted_tree(&self, target_key: &str) -> String {
        let mut output = String::new();
        let Some(idx) = self.resolve_key(target_key) else {
            return output;
        };

        output.push_str(&format!("{}\n", self.graph[idx]));

        let mut visited = HashSet::new();
        visited.insert(idx);

        let dependents = self.dependents_of(idx);
        let count = dependents.len();
        for (i, (dep_idx, _)) in dependents.iter().enumerate() {
            let is_last = i == count - 1;
            self.print_inverted_subtree(&mut output, *dep_idx, "", is_last, &mut visited);
        }

        output
    }

    fn print_inverted_subtree(
        &self,
        output: &mut String,
        idx: NodeIndex,
        prefix: &str,
        is_last: bool,
        visited: &mut HashSet<NodeIndex>,
    ) {
        let connector = if is_last { "└── " } else { "├── " };
        output.push_str(&format!("{prefix}{connector}{}\n", self.graph[idx]));

        if !visited.insert(idx) {
            return;
        }

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        let dependents = self.dependents_of(idx);
        let count = dependents.len();
        for (i, (dep_idx, _)) in dependents.iter().enumerate() {
            let is_last = i == count - 1;
            self.print_inverted_subtree(output, *dep_idx, &child_prefix, is_last, visited);
        }

        visited.remove(&idx);
    }

    /// Number of nodes (excluding root).
    pub fn len(&self) -> usize {
        let total = self.graph.node_count();
        if self.root.is_some() {
            total.saturating_sub(1)
        } else {
            total
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DependencyGraph {
    fn default() -> Self {
        Self::new()
    }
}
