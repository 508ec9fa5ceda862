//! Graph expansion: breadth-first work queue with overrides, version
//! conflicts, cycle detection and lockfile pinning.
//!
//! Each package name maps to a single node unless its requirements ask to
//! coexist. When an override or `take-highest` replaces a node's version,
//! the node is re-expanded in place and whatever only the old version
//! needed is retired. Queued work from a retired expansion is recognised
//! by its stale serial and skipped.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::rc::Rc;

use kiln_core::config::{EngineConfig, OverridePolicy};
use kiln_core::identity::BinaryIdentity;
use kiln_core::lockfile::Lockfile;
use kiln_core::recipe::{Recipe, RecipeProvider};
use kiln_core::reference::PackageReference;
use kiln_core::requirement::{Requirement, RequirementSet};
use kiln_core::settings::Profile;
use kiln_core::version::{Version, VersionExpr};
use petgraph::stable_graph::NodeIndex;
use tracing::{debug, info, trace, warn};

use crate::conflict::{EventKind, ResolutionEvent, ResolutionReport};
use crate::error::ResolveError;
use crate::graph::{node_key, DepEdge, DependencyGraph, GraphNode};
use crate::package_id;
use crate::propagate::{Directives, Propagator};
use crate::retry::{self, RetryPolicy};

/// The output of dependency resolution.
#[derive(Debug)]
pub struct ResolutionResult {
    pub graph: DependencyGraph,
    /// Overrides, take-highest choices and option disagreements.
    pub report: ResolutionReport,
}

/// Entry in the BFS queue: one requirement of one expanded node.
struct QueueEntry {
    parent: NodeIndex,
    parent_serial: u64,
    requirement: Requirement,
    /// Position of the requirement in the parent's declaration list.
    order: usize,
    /// Root to parent, inclusive.
    path: Rc<Vec<PathStep>>,
    /// Override requirements declared by ancestors; upstream wins.
    overrides: Rc<BTreeMap<String, Requirement>>,
    directives: Rc<Directives>,
}

/// One node on a requesting path, as it was when the entry was queued.
///
/// A later replacement can retire any ancestor except the parent, so the
/// path never indexes the graph.
#[derive(Debug, Clone)]
struct PathStep {
    name: String,
    label: String,
}

impl PathStep {
    fn of(node: &GraphNode) -> Self {
        Self {
            name: node.name().to_string(),
            label: node.reference.to_string(),
        }
    }
}

/// A node built from a recipe, not yet placed in the graph.
struct Expansion {
    node: GraphNode,
    requires: Vec<Requirement>,
    directives: Directives,
}

/// Resolve `requirements` into a complete dependency graph.
///
/// With a lockfile, every package it records is pinned to the recorded
/// revision, configuration and identity; only names absent from the
/// lockfile are resolved against `provider`. A live requirement the pinned
/// version does not satisfy fails with [`ResolveError::StaleLock`].
pub fn resolve(
    requirements: &RequirementSet,
    profile: &Profile,
    provider: &dyn RecipeProvider,
    lockfile: Option<&Lockfile>,
    config: &EngineConfig,
) -> Result<ResolutionResult, ResolveError> {
    let mut session = Session {
        provider,
        config,
        propagator: Propagator::new(profile, &requirements.options),
        lockfile,
        retry: RetryPolicy::from(&config.retry),
        graph: DependencyGraph::new(),
        report: ResolutionReport::new(),
        queue: VecDeque::new(),
        versions: HashMap::new(),
        recipes: HashMap::new(),
        origins: HashMap::new(),
        next_serial: 0,
    };
    session.seed(requirements);
    while let Some(entry) = session.queue.pop_front() {
        session.process(entry)?;
    }
    session.finish()
}

struct Session<'a> {
    provider: &'a dyn RecipeProvider,
    config: &'a EngineConfig,
    propagator: Propagator<'a>,
    lockfile: Option<&'a Lockfile>,
    retry: RetryPolicy,
    graph: DependencyGraph,
    report: ResolutionReport,
    queue: VecDeque<QueueEntry>,
    versions: HashMap<String, Vec<Version>>,
    /// Keyed by reference without revision.
    recipes: HashMap<String, Recipe>,
    /// First requesting path of each node key, for diagnostics.
    origins: HashMap<String, Vec<String>>,
    next_serial: u64,
}

impl Session<'_> {
    fn seed(&mut self, requirements: &RequirementSet) {
        let effective = self.propagator.root(&requirements.root.name);
        let mut root = GraphNode::new(requirements.root.clone());
        root.settings = effective.settings;
        root.options = effective.options;
        root.serial = self.bump_serial();
        let step = PathStep::of(&root);
        let key = root.key();

        let idx = self.graph.add_node(root);
        self.graph.set_root(idx);
        self.origins.insert(key, vec![step.label.clone()]);

        info!(
            "Resolving {} ({} direct requirements)",
            requirements.root,
            requirements.requires.len()
        );
        let overrides = collect_overrides(&BTreeMap::new(), &requirements.requires);
        self.enqueue_children(
            idx,
            &requirements.requires,
            Rc::new(vec![step]),
            Rc::new(overrides),
            Rc::new(Directives::new()),
        );
    }

    fn enqueue_children(
        &mut self,
        parent: NodeIndex,
        requires: &[Requirement],
        path: Rc<Vec<PathStep>>,
        overrides: Rc<BTreeMap<String, Requirement>>,
        directives: Rc<Directives>,
    ) {
        let parent_serial = self.graph.node(parent).serial;
        for (order, requirement) in requires.iter().enumerate() {
            self.queue.push_back(QueueEntry {
                parent,
                parent_serial,
                requirement: requirement.clone(),
                order,
                path: Rc::clone(&path),
                overrides: Rc::clone(&overrides),
                directives: Rc::clone(&directives),
            });
        }
    }

    fn process(&mut self, entry: QueueEntry) -> Result<(), ResolveError> {
        if !self.graph.is_live(entry.parent, entry.parent_serial) {
            trace!("Skipping {} from a retired expansion", entry.requirement);
            return Ok(());
        }

        let mut req = entry.requirement.clone();
        let mut forced = req.is_override;

        if let Some(upstream) = entry.overrides.get(&req.name) {
            if upstream.to_string() != req.to_string() {
                if let (VersionExpr::Exact(forced_version), VersionExpr::Exact(displaced)) =
                    (&upstream.version, &req.version)
                {
                    self.check_override_policy(&req.name, forced_version, displaced, &entry, &req)?;
                }
                debug!("{req} overridden to {upstream}");
                self.report.add(ResolutionEvent {
                    name: req.name.clone(),
                    requested: req.version.to_string(),
                    resolved: upstream.version.to_string(),
                    kind: EventKind::Override,
                    path: labels(&entry.path),
                });
                req.version = upstream.version.clone();
                req.user = upstream.user.clone();
                req.channel = upstream.channel.clone();
                req.revision = upstream.revision.clone();
            }
            forced = true;
        }

        if !req.coexist {
            if let Some(pos) = entry.path.iter().position(|step| step.name == req.name) {
                let mut path = labels(&entry.path[pos..]);
                path.push(entry.path[pos].label.clone());
                return Err(ResolveError::Cycle { path });
            }
        }

        if let VersionExpr::Alias(alias) = &req.version {
            let version = self.resolve_alias(&req.name, alias)?;
            debug!("{}/({alias}) resolved to {version}", req.name);
            req.version = VersionExpr::Exact(version);
        }

        if let Some(lock) = self.lockfile {
            if let Some((record, reference)) = self.pinned_record(lock, &req, &entry)? {
                let key = node_key(&reference.name, reference.version.as_str(), req.coexist);
                let idx = match self.graph.find(&key) {
                    Some(idx) => idx,
                    None => self.expand_pinned(lock, record, reference, &entry)?,
                };
                return self.attach(&entry, idx, &req);
            }
        }

        if !req.coexist {
            if let Some(idx) = self.graph.find(&req.name) {
                return self.merge_into(idx, &req, forced, &entry);
            }
        }

        let version = self.select_version(&req, &entry)?;
        if req.coexist {
            let key = node_key(&req.name, version.as_str(), true);
            if let Some(idx) = self.graph.find(&key) {
                return self.attach(&entry, idx, &req);
            }
        }

        let expansion = self.expand(&req, version, forced, &entry)?;
        let idx = self.insert(expansion, &entry);
        self.attach(&entry, idx, &req)
    }

    /// A requirement reached a package that already has a node.
    fn merge_into(
        &mut self,
        idx: NodeIndex,
        req: &Requirement,
        forced: bool,
        entry: &QueueEntry,
    ) -> Result<(), ResolveError> {
        let existing = self.graph.node(idx).reference.clone();
        let existing_forced = self.graph.node(idx).overridden;

        if req.satisfied_by(&existing) {
            if forced {
                self.graph.node_mut(idx).overridden = true;
            }
            self.check_option_agreement(idx, req, entry);
            return self.attach(entry, idx, req);
        }

        match (forced, existing_forced) {
            (true, false) => {
                let version = self.select_version(req, entry)?;
                self.check_override_policy(&req.name, &version, &existing.version, entry, req)?;
                self.replace(idx, req, version, true, entry, EventKind::Override)?;
            }
            (false, true) => {
                if let VersionExpr::Exact(displaced) = &req.version {
                    self.check_override_policy(
                        &req.name,
                        &existing.version,
                        displaced,
                        entry,
                        req,
                    )?;
                }
                debug!("{req} overridden by {existing}");
                self.report.add(ResolutionEvent {
                    name: req.name.clone(),
                    requested: req.version.to_string(),
                    resolved: existing.version.to_string(),
                    kind: EventKind::Override,
                    path: labels(&entry.path),
                });
            }
            (true, true) => {
                return Err(self.conflict(idx, req, entry, "two overrides disagree"));
            }
            (false, false) if self.config.resolver.take_highest => {
                let candidate = self.select_version(req, entry)?;
                if candidate > existing.version {
                    self.replace(idx, req, candidate, false, entry, EventKind::TakeHighest)?;
                } else {
                    debug!("Keeping {existing} over {req} (take-highest)");
                    self.report.add(ResolutionEvent {
                        name: req.name.clone(),
                        requested: req.version.to_string(),
                        resolved: existing.version.to_string(),
                        kind: EventKind::TakeHighest,
                        path: labels(&entry.path),
                    });
                }
            }
            (false, false) => {
                return Err(self.conflict(idx, req, entry, "incompatible requirements"));
            }
        }

        if !self.graph.is_live(entry.parent, entry.parent_serial) {
            return Ok(());
        }
        self.attach(entry, idx, req)
    }

    /// Re-expand the node at `idx` as `version`, retiring its old subtree.
    fn replace(
        &mut self,
        idx: NodeIndex,
        req: &Requirement,
        version: Version,
        forced: bool,
        entry: &QueueEntry,
        kind: EventKind,
    ) -> Result<(), ResolveError> {
        let old = self.graph.node(idx).reference.clone();
        info!("{}: {} -> {} ({kind})", req.name, old.version, version);
        self.report.add(ResolutionEvent {
            name: req.name.clone(),
            requested: old.version.to_string(),
            resolved: version.to_string(),
            kind,
            path: labels(&entry.path),
        });

        let expansion = self.expand(req, version, forced, entry)?;
        self.graph.clear_dependencies(idx);
        for retired in self.graph.prune_unreachable() {
            debug!("Retired {}", retired.reference);
            self.origins.remove(&retired.key());
        }

        let Expansion {
            node,
            requires,
            directives,
        } = expansion;
        let key = node.key();
        let origin = self.requesting_path(entry, req);
        *self.graph.node_mut(idx) = node;
        self.origins.insert(key, origin);

        let path = child_path(&entry.path, self.graph.node(idx));
        let overrides = collect_overrides(&entry.overrides, &requires);
        self.enqueue_children(idx, &requires, path, Rc::new(overrides), Rc::new(directives));
        Ok(())
    }

    /// Fetch the recipe for `name/version` and compute the node's values.
    fn expand(
        &mut self,
        req: &Requirement,
        version: Version,
        forced: bool,
        entry: &QueueEntry,
    ) -> Result<Expansion, ResolveError> {
        let mut reference = PackageReference::new(req.name.clone(), version);
        reference.user = req.user.clone();
        reference.channel = req.channel.clone();
        reference.revision = req.revision.clone();

        let recipe = self.recipe(&reference)?;
        if reference.revision.is_none() {
            reference.revision = recipe.revision.clone();
        }

        let effective =
            self.propagator
                .compute(&req.name, &recipe, &entry.directives, &req.options);
        let mut node = GraphNode::new(reference);
        node.settings = effective.settings;
        node.options = effective.options;
        node.overridden_keys = effective.overridden_keys;
        node.overridden = forced;
        node.coexist = req.coexist;
        node.binary_insensitive_keys = recipe.binary_insensitive_keys.clone();
        node.package_id_mode = recipe.package_id_mode;
        node.serial = self.bump_serial();

        Ok(Expansion {
            node,
            requires: recipe.requires.clone(),
            directives: entry.directives.descend(&recipe.default_options),
        })
    }

    /// Place a fresh expansion in the graph and queue its requirements.
    fn insert(&mut self, expansion: Expansion, entry: &QueueEntry) -> NodeIndex {
        let Expansion {
            node,
            requires,
            directives,
        } = expansion;
        let key = node.key();
        let mut origin = labels(&entry.path);
        origin.push(node.reference.to_string());
        debug!("Added {}", node.reference);

        let idx = self.graph.add_node(node);
        self.origins.insert(key, origin);

        let path = child_path(&entry.path, self.graph.node(idx));
        let overrides = collect_overrides(&entry.overrides, &requires);
        self.enqueue_children(idx, &requires, path, Rc::new(overrides), Rc::new(directives));
        idx
    }

    /// The lockfile record pinning `req`, if its name is locked.
    fn pinned_record(
        &self,
        lock: &Lockfile,
        req: &Requirement,
        entry: &QueueEntry,
    ) -> Result<Option<(usize, PackageReference)>, ResolveError> {
        let mut stale = None;
        for (index, record) in lock.nodes.iter().enumerate().skip(1) {
            if record.coexist != req.coexist {
                continue;
            }
            let reference = parse_locked(&record.reference)?;
            if reference.name != req.name {
                continue;
            }
            if req.satisfied_by(&reference) {
                return Ok(Some((index, reference)));
            }
            stale.get_or_insert(reference);
        }

        match stale {
            Some(locked) if !req.coexist => Err(ResolveError::StaleLock {
                name: req.name.clone(),
                locked: locked.to_string(),
                requested: req.to_string(),
                path: self.requesting_path(entry, req),
            }),
            _ => Ok(None),
        }
    }

    /// Add a node straight from its lockfile record.
    fn expand_pinned(
        &mut self,
        lock: &Lockfile,
        record_index: usize,
        reference: PackageReference,
        entry: &QueueEntry,
    ) -> Result<NodeIndex, ResolveError> {
        let record = &lock.nodes[record_index];
        let mut requires = Vec::with_capacity(record.dependencies.len());
        for dep in &record.dependencies {
            let target = lock.nodes.get(dep.index).ok_or_else(|| ResolveError::Lockfile {
                message: format!(
                    "{} depends on node {} which does not exist",
                    record.reference, dep.index
                ),
            })?;
            let mut req = Requirement::exact(&parse_locked(&target.reference)?);
            req.build = dep.build;
            req.private = dep.private;
            req.coexist = target.coexist;
            requires.push(req);
        }

        let mut node = GraphNode::new(reference);
        node.settings = record.settings.clone();
        node.options = record.options.clone();
        node.identity = Some(BinaryIdentity::new(record.package_id.clone()));
        node.overridden = record.overridden;
        node.coexist = record.coexist;
        node.pinned = true;
        node.serial = self.bump_serial();
        debug!("Pinned {} from lockfile", node.reference);

        Ok(self.insert(
            Expansion {
                node,
                requires,
                directives: (*entry.directives).clone(),
            },
            entry,
        ))
    }

    /// Connect the requesting node to `idx`, refusing to close a cycle.
    fn attach(
        &mut self,
        entry: &QueueEntry,
        idx: NodeIndex,
        req: &Requirement,
    ) -> Result<(), ResolveError> {
        let from = entry.parent;
        let back = if from == idx {
            Some(vec![idx])
        } else {
            self.graph.path_between(idx, from)
        };
        if let Some(back) = back {
            let mut cycle = vec![from];
            cycle.extend(back);
            return Err(ResolveError::Cycle {
                path: self.graph.labels(&cycle),
            });
        }

        self.graph.add_edge(
            from,
            idx,
            DepEdge {
                order: entry.order,
                build: req.build,
                private: req.private,
            },
        );
        Ok(())
    }

    /// Highest available version matching the requirement.
    fn select_version(
        &mut self,
        req: &Requirement,
        entry: &QueueEntry,
    ) -> Result<Version, ResolveError> {
        match &req.version {
            VersionExpr::Exact(version) => Ok(version.clone()),
            VersionExpr::Alias(alias) => self.resolve_alias(&req.name, alias),
            VersionExpr::Range(range) => {
                let available = self.versions(&req.name)?;
                if let Some(best) = available.iter().filter(|v| range.contains(v)).max() {
                    trace!("{req} selected {best}");
                    return Ok(best.clone());
                }
                let mut sorted = available.clone();
                sorted.sort();
                Err(ResolveError::UnresolvableRange {
                    name: req.name.clone(),
                    expression: req.version.to_string(),
                    available: sorted.iter().map(ToString::to_string).collect(),
                    path: self.requesting_path(entry, req),
                })
            }
        }
    }

    fn versions(&mut self, name: &str) -> Result<&Vec<Version>, ResolveError> {
        if !self.versions.contains_key(name) {
            let provider = self.provider;
            let listed = retry::run(&self.retry, &format!("versions of {name}"), || {
                provider.list_versions(name)
            })?;
            self.versions.insert(name.to_string(), listed);
        }
        Ok(&self.versions[name])
    }

    fn recipe(&mut self, reference: &PackageReference) -> Result<Recipe, ResolveError> {
        let mut cache_key = reference.clone();
        cache_key.revision = None;
        let cache_key = cache_key.to_string();
        if let Some(recipe) = self.recipes.get(&cache_key) {
            return Ok(recipe.clone());
        }

        let provider = self.provider;
        let recipe = retry::run(&self.retry, &format!("recipe {reference}"), || {
            provider.get_recipe(reference)
        })?;
        self.recipes.insert(cache_key, recipe.clone());
        Ok(recipe)
    }

    fn resolve_alias(&self, name: &str, alias: &str) -> Result<Version, ResolveError> {
        let provider = self.provider;
        retry::run(&self.retry, &format!("{name}/({alias})"), || {
            provider.resolve_alias(name, alias)
        })
    }

    /// Warn when a second requester would configure a node differently.
    /// The first configuration is kept.
    fn check_option_agreement(&mut self, idx: NodeIndex, req: &Requirement, entry: &QueueEntry) {
        let node = self.graph.node(idx);
        if node.pinned {
            return;
        }
        let mut cache_key = node.reference.clone();
        cache_key.revision = None;
        let Some(recipe) = self.recipes.get(&cache_key.to_string()) else {
            return;
        };

        let wanted = self
            .propagator
            .compute(&req.name, recipe, &entry.directives, &req.options)
            .options;
        if wanted != node.options {
            let path = labels(&entry.path);
            warn!(
                "{} is already configured as {:?}; ignoring {:?} requested via {}",
                node.reference,
                node.options,
                wanted,
                path.join(" -> ")
            );
            self.report.add(ResolutionEvent {
                name: req.name.clone(),
                requested: format_options(&wanted),
                resolved: format_options(&node.options),
                kind: EventKind::OptionMismatch,
                path,
            });
        }
    }

    fn check_override_policy(
        &self,
        name: &str,
        forced: &Version,
        displaced: &Version,
        entry: &QueueEntry,
        req: &Requirement,
    ) -> Result<(), ResolveError> {
        if self.config.resolver.override_policy != OverridePolicy::SameMajor
            || forced.major() == displaced.major()
        {
            return Ok(());
        }
        Err(ResolveError::Conflict {
            name: name.to_string(),
            existing: format!("{name}/{forced}"),
            requested: format!("{name}/{displaced}"),
            existing_path: labels(&entry.path),
            requested_path: self.requesting_path(entry, req),
            reason: format!("override to {forced} crosses the major version of {displaced}"),
        })
    }

    fn conflict(
        &self,
        idx: NodeIndex,
        req: &Requirement,
        entry: &QueueEntry,
        reason: &str,
    ) -> ResolveError {
        let existing = self.graph.node(idx);
        ResolveError::Conflict {
            name: req.name.clone(),
            existing: existing.reference.to_string(),
            requested: req.to_string(),
            existing_path: self.origins.get(&existing.key()).cloned().unwrap_or_default(),
            requested_path: self.requesting_path(entry, req),
            reason: reason.to_string(),
        }
    }

    fn requesting_path(&self, entry: &QueueEntry, req: &Requirement) -> Vec<String> {
        let mut path = labels(&entry.path);
        path.push(req.to_string());
        path
    }

    fn bump_serial(&mut self) -> u64 {
        self.next_serial += 1;
        self.next_serial
    }

    fn finish(mut self) -> Result<ResolutionResult, ResolveError> {
        for retired in self.graph.prune_unreachable() {
            debug!("Retired {}", retired.reference);
        }
        self.graph.compact_edge_orders();
        package_id::assign_identities(&mut self.graph)?;
        info!(
            "Resolved {} packages ({} version adjustments)",
            self.graph.len(),
            self.report.len()
        );
        Ok(ResolutionResult {
            graph: self.graph,
            report: self.report,
        })
    }
}

fn collect_overrides(
    inherited: &BTreeMap<String, Requirement>,
    requires: &[Requirement],
) -> BTreeMap<String, Requirement> {
    let mut overrides = inherited.clone();
    for req in requires.iter().filter(|r| r.is_override) {
        overrides.entry(req.name.clone()).or_insert_with(|| req.clone());
    }
    overrides
}

fn child_path(path: &[PathStep], node: &GraphNode) -> Rc<Vec<PathStep>> {
    let mut next = path.to_vec();
    next.push(PathStep::of(node));
    Rc::new(next)
}

fn labels(path: &[PathStep]) -> Vec<String> {
    path.iter().map(|step| step.label.clone()).collect()
}

fn parse_locked(reference: &str) -> Result<PackageReference, ResolveError> {
    PackageReference::parse(reference).map_err(|e| ResolveError::Lockfile {
        message: e.to_string(),
    })
}

fn format_options(options: &kiln_core::settings::ValueMap) -> String {
    options
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}
