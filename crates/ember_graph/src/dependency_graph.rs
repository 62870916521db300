//! A generic DAG over arbitrary nodes, with refcount-based culling (§4.2).
//!
//! The frame graph builds one of these per frame: pass nodes and resource
//! nodes are both plain [`NodeIdx`] values here, and an edge from `a` to `b`
//! means "`b` is needed to produce `a`'s effect" — i.e. `a` depends on `b`'s
//! still being alive. Culling walks the graph backward from nodes nothing
//! depends on, the same leaf-stripping idea the teacher's pipeline cache
//! uses to retire stale program variants, generalized to a full graph.

use ember_core::ids::NodeIdx;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Edge {
    pub from: NodeIdx,
    pub to: NodeIdx,
}

struct Node {
    /// Number of edges leaving this node (how many other nodes it feeds).
    refcount: i32,
    is_target: bool,
}

/// A dependency DAG with refcount culling.
///
/// A node survives `cull()` iff it is a target, or some surviving node
/// still needs it. Targets are culling roots: they are never pushed onto
/// the culling stack and their refcount is never decremented, so anything
/// that produces a target (transitively) always survives too.
#[derive(Default)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

impl DependencyGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_node(&mut self) -> NodeIdx {
        let idx = NodeIdx::from(self.nodes.len());
        self.nodes.push(Node {
            refcount: 0,
            is_target: false,
        });
        idx
    }

    pub fn make_target(&mut self, node: NodeIdx) {
        self.nodes[node.as_usize()].is_target = true;
    }

    #[must_use]
    pub fn is_target(&self, node: NodeIdx) -> bool {
        self.nodes[node.as_usize()].is_target
    }

    /// Appends an edge and returns its index, stable for the lifetime of
    /// this graph; callers use it to keep parallel per-edge data (e.g. the
    /// frame graph's accumulated usage bits) aligned with `edges()`.
    pub fn link(&mut self, edge: Edge) -> usize {
        let idx = self.edges.len();
        self.edges.push(edge);
        idx
    }

    pub fn incoming(&self, node: NodeIdx) -> impl Iterator<Item = (usize, Edge)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.to == node)
            .map(|(i, e)| (i, *e))
    }

    pub fn outgoing(&self, node: NodeIdx) -> impl Iterator<Item = (usize, Edge)> + '_ {
        self.edges
            .iter()
            .enumerate()
            .filter(move |(_, e)| e.from == node)
            .map(|(i, e)| (i, *e))
    }

    /// Raw refcount left after [`cull`](Self::cull): 0 for anything not a
    /// target and not (transitively) depended on.
    #[must_use]
    pub fn refcount(&self, node: NodeIdx) -> i32 {
        let n = &self.nodes[node.as_usize()];
        if n.is_target {
            n.refcount.max(1)
        } else {
            n.refcount
        }
    }

    #[must_use]
    pub fn is_culled(&self, node: NodeIdx) -> bool {
        let n = &self.nodes[node.as_usize()];
        !n.is_target && n.refcount == 0
    }

    /// Recomputes every node's refcount from the current edge set, then
    /// removes (in refcount terms) everything no surviving node needs.
    ///
    /// 1. refcount(n) := number of edges leaving n.
    /// 2. every non-target node with refcount 0 is pushed onto a stack.
    /// 3. while the stack is non-empty, pop a node and, for each of its
    ///    incoming edges, decrement the refcount of the edge's source node;
    ///    if that reaches 0 and the source isn't a target, push it too.
    pub fn cull(&mut self) {
        for node in &mut self.nodes {
            node.refcount = 0;
        }
        for edge in &self.edges {
            self.nodes[edge.from.as_usize()].refcount += 1;
        }
        let mut stack: Vec<usize> = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.refcount == 0 && !n.is_target)
            .map(|(i, _)| i)
            .collect();
        while let Some(i) = stack.pop() {
            let sources: Vec<usize> = self
                .edges
                .iter()
                .filter(|e| e.to.as_usize() == i)
                .map(|e| e.from.as_usize())
                .collect();
            for src in sources {
                if self.nodes[src].is_target {
                    continue;
                }
                self.nodes[src].refcount -= 1;
                if self.nodes[src].refcount == 0 {
                    stack.push(src);
                }
            }
        }
    }

    /// An edge is live only if neither endpoint was culled; compiled
    /// passes use this to skip dead reads/writes when resolving usage.
    #[must_use]
    pub fn edge_is_live(&self, edge: Edge) -> bool {
        !self.is_culled(edge.from) && !self.is_culled(edge.to)
    }

    /// Debug-only cycle check: repeatedly strip nodes with no outgoing
    /// edges (to not-yet-stripped nodes). A non-empty remainder with no
    /// strippable leaf means the graph has a cycle.
    #[must_use]
    pub fn is_acyclic(&self) -> bool {
        let n = self.nodes.len();
        let mut removed = vec![false; n];
        let mut remaining = n;
        while remaining > 0 {
            let leaf = (0..n).find(|&i| {
                !removed[i]
                    && !self
                        .edges
                        .iter()
                        .any(|e| e.from.as_usize() == i && !removed[e.to.as_usize()])
            });
            match leaf {
                Some(i) => {
                    removed[i] = true;
                    remaining -= 1;
                }
                None => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_chain_survives_when_last_node_is_target() {
        let mut g = DependencyGraph::new();
        let a = g.new_node();
        let b = g.new_node();
        let c = g.new_node();
        g.make_target(c);
        g.link(Edge { from: a, to: b });
        g.link(Edge { from: b, to: c });
        g.cull();
        assert!(!g.is_culled(a));
        assert!(!g.is_culled(b));
        assert!(!g.is_culled(c));
    }

    #[test]
    fn dangling_branch_is_culled() {
        let mut g = DependencyGraph::new();
        let a = g.new_node();
        let b = g.new_node();
        let unused = g.new_node();
        g.make_target(b);
        g.link(Edge { from: a, to: b });
        // `unused` has no outgoing edges and isn't a target.
        assert!(g.is_acyclic());
        g.cull();
        assert!(!g.is_culled(a));
        assert!(!g.is_culled(b));
        assert!(g.is_culled(unused));
    }

    #[test]
    fn target_refcount_is_never_zero() {
        let mut g = DependencyGraph::new();
        let t = g.new_node();
        g.make_target(t);
        g.cull();
        assert!(g.refcount(t) >= 1);
        assert!(!g.is_culled(t));
    }

    #[test]
    fn cycle_is_detected() {
        let mut g = DependencyGraph::new();
        let a = g.new_node();
        let b = g.new_node();
        g.link(Edge { from: a, to: b });
        g.link(Edge { from: b, to: a });
        assert!(!g.is_acyclic());
    }
}
