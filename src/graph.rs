//! The target graph, a graph between build targets and their deps, and the
//! reachability queries run over it.
//!
//! A graph is a snapshot: it is built once by the loader and only read by
//! queries, so queries may run concurrently from several threads.

use crate::densemap::{self, DenseMap};
use rustc_hash::{FxHashMap, FxHashSet};

/// Id for Node entries in a Graph.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);
impl densemap::Index for NodeId {
    fn index(&self) -> usize {
        self.0 as usize
    }
}
impl From<usize> for NodeId {
    fn from(u: usize) -> NodeId {
        NodeId(u as u32)
    }
}

/// Attributes of a target that appeared as a key in the dependency dump.
#[derive(Debug, Default)]
pub struct NodeInfo {
    pub deps: Vec<NodeId>,
}

/// A build target, identified by its label.
#[derive(Debug)]
pub struct Node {
    pub name: String,
    /// None for labels only ever seen as a dependency of another target
    /// (a dangling reference); such nodes are leaves.
    pub info: Option<NodeInfo>,
}

pub type NodeSet = FxHashSet<NodeId>;

#[derive(Debug, Default)]
pub struct Graph {
    nodes: DenseMap<NodeId, Node>,
    by_name: FxHashMap<String, NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    /// Look up the id for a label, interning it as a dangling node if unseen.
    pub fn node_id(&mut self, name: &str) -> NodeId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = self.nodes.push(Node {
            name: name.to_owned(),
            info: None,
        });
        self.by_name.insert(name.to_owned(), id);
        id
    }

    /// Record a target and its deps.  A later call for the same label replaces
    /// the earlier deps.
    pub fn add_target(&mut self, name: &str, deps: Vec<NodeId>) -> NodeId {
        let id = self.node_id(name);
        self.nodes[id].info = Some(NodeInfo { deps });
        id
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id].name
    }

    /// Deps of a node; empty for dangling nodes.
    pub fn deps(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id].info {
            Some(info) => &info.deps,
            None => &[],
        }
    }

    /// All targets that appeared as keys of the dump, excluding dangling ones.
    pub fn keys(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .filter(|(_, node)| node.info.is_some())
            .map(|(id, _)| id)
    }

    /// Number of keyed targets.
    pub fn len(&self) -> usize {
        self.keys().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Labels of a set of nodes, sorted.
    pub fn names<'a>(&'a self, set: &NodeSet) -> Vec<&'a str> {
        let mut names: Vec<&str> = set.iter().map(|&id| self.name(id)).collect();
        names.sort_unstable();
        names
    }
}

/// Closure of `known` over the deps relation.
///
/// Each node is expanded at most once, so diamonds and cycles are cheap and
/// terminate.  Dangling references land in the result without expansion.
pub fn reachable(known: impl IntoIterator<Item = NodeId>, graph: &Graph) -> NodeSet {
    let mut reachable = NodeSet::default();
    let mut to_visit: Vec<NodeId> = known.into_iter().collect();
    while let Some(id) = to_visit.pop() {
        if !reachable.insert(id) {
            continue;
        }
        to_visit.extend(
            graph
                .deps(id)
                .iter()
                .filter(|dep| !reachable.contains(*dep)),
        );
    }
    reachable
}

/// Keys of the graph not reachable from `known`: forgotten targets.
pub fn unreachable(known: impl IntoIterator<Item = NodeId>, graph: &Graph) -> NodeSet {
    let reachable = reachable(known, graph);
    graph.keys().filter(|id| !reachable.contains(id)).collect()
}

/// The members of `targets` that no other member of `targets` depends on.
///
/// Applied to an unreachable set, this yields the roots of the dead subgraphs,
/// i.e. the minimal set of targets to delete.
///
/// A target's dependency on itself does not count, so a target whose only
/// incoming edge is a self edge is still a source.  This differs from gn's
/// find_unreachable.py, which subtracts every dep and so drops such a target.
pub fn source_targets(targets: &NodeSet, graph: &Graph) -> NodeSet {
    let mut sources = targets.clone();
    for &id in targets {
        for dep in graph.deps(id) {
            if *dep != id {
                sources.remove(dep);
            }
        }
    }
    sources
}
