use std::collections::HashMap;

use crate::graph::{Edge, EdgeKind, FlowGraph, JumpType, NodeId, NodeMapping, Successors};

/// Accumulates nodes and edges. Edge roles are checked as they are added, the shape of
/// every branch is checked once in [`FlowGraphBuilder::build`].
#[derive(Debug, Clone)]
pub struct FlowGraphBuilder<T> {
    values: Vec<Option<T>>,
    edges: Vec<Vec<Edge>>,
    start: NodeId,
    end: NodeId
}

impl<T> FlowGraphBuilder<T> {
    /// A builder holding a single no-op node that is both start and end.
    pub fn new() -> FlowGraphBuilder<T> {
        FlowGraphBuilder {
            values: vec![None],
            edges: vec![Vec::new()],
            start: NodeId(0),
            end: NodeId(0)
        }
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn end(&self) -> NodeId {
        self.end
    }

    pub fn set_start(&mut self, node: NodeId) {
        self.start = node;
    }

    pub fn set_end(&mut self, node: NodeId) {
        self.end = node;
    }

    pub fn value(&self, node: NodeId) -> Option<&T> {
        self.values[node.0].as_ref()
    }

    pub fn add_node(&mut self, value: T) -> NodeId {
        self.add_slot(Some(value))
    }

    pub fn add_nop(&mut self) -> NodeId {
        self.add_slot(None)
    }

    fn add_slot(&mut self, value: Option<T>) -> NodeId {
        self.values.push(value);
        self.edges.push(Vec::new());
        NodeId(self.values.len() - 1)
    }

    /// Control flows from `source` to `sink`. The source must not have any edge yet.
    pub fn link(&mut self, source: NodeId, sink: NodeId) {
        if !self.edges[source.0].is_empty() {
            panic!("tried to add a second sink {} to the non-branch node {}", sink, source);
        }

        self.edges[source.0].push(Edge { kind: EdgeKind::Plain, to: sink });
    }

    /// The edge taken when the jump condition of `branch_point` is not met.
    pub fn link_non_jump_branch(&mut self, branch_point: NodeId, sink: NodeId) {
        for edge in &self.edges[branch_point.0] {
            match edge.kind {
                EdgeKind::Plain => panic!("tried to add a branch edge to the non-branch node {}", branch_point),
                EdgeKind::NonJump => panic!("tried to add a second non-jump branch {} at {}", sink, branch_point),
                EdgeKind::Jump(_) => {}
            }
        }

        self.edges[branch_point.0].push(Edge { kind: EdgeKind::NonJump, to: sink });
    }

    pub fn link_jump_branch(&mut self, branch_point: NodeId, sink: NodeId, jump_type: JumpType) {
        for edge in &self.edges[branch_point.0] {
            match edge.kind {
                EdgeKind::Plain => panic!("tried to add a branch edge to the non-branch node {}", branch_point),
                EdgeKind::Jump(_) => panic!("tried to add a second jump branch {} at {}", sink, branch_point),
                EdgeKind::NonJump => {}
            }
        }

        self.edges[branch_point.0].push(Edge { kind: EdgeKind::Jump(jump_type), to: sink });
    }

    pub fn append(&mut self, value: T) -> NodeId {
        let node = self.add_node(value);
        self.append_node(node);
        node
    }

    pub fn append_nop(&mut self) -> NodeId {
        let node = self.add_nop();
        self.append_node(node);
        node
    }

    pub fn append_node(&mut self, node: NodeId) {
        self.link(self.end, node);
        self.end = node;
    }

    /// Creates a no-op node, makes both nodes flow into it and makes it the end.
    pub fn set_end_to_sink_for(&mut self, node: NodeId, other_node: NodeId) -> NodeId {
        let sink = self.add_nop();
        self.link(node, sink);
        self.link(other_node, sink);
        self.end = sink;
        sink
    }

    fn edges_into(&self, node: NodeId) -> Vec<(NodeId, usize)> {
        let mut incoming = Vec::new();
        for (source, edges) in self.edges.iter().enumerate() {
            for (index, edge) in edges.iter().enumerate() {
                if edge.to == node {
                    incoming.push((NodeId(source), index));
                }
            }
        }

        incoming
    }

    /// Validates the shape of every node and freezes the graph.
    pub fn build(self) -> FlowGraph<T> {
        let mut successors = Vec::with_capacity(self.edges.len());
        let mut predecessors = vec![Vec::new(); self.edges.len()];

        for (index, edges) in self.edges.iter().enumerate() {
            let node = NodeId(index);
            let node_successors = match edges.as_slice() {
                [] => Successors::None,
                [Edge { kind: EdgeKind::Plain, to }] => Successors::Single(*to),
                [edge] => panic!("branch node {} only has its {:?} edge", node, edge.kind),
                [first, second] => match (first.kind, second.kind) {
                    (EdgeKind::NonJump, EdgeKind::Jump(jump_type)) => {
                        Successors::Branch { non_jump: first.to, jump: second.to, jump_type }
                    }
                    (EdgeKind::Jump(jump_type), EdgeKind::NonJump) => {
                        Successors::Branch { non_jump: second.to, jump: first.to, jump_type }
                    }
                    (first, second) => {
                        panic!("node {} has two edges that do not form a branch: {:?} and {:?}", node, first, second)
                    }
                },
                _ => panic!("node {} has {} outgoing edges", node, edges.len())
            };

            for sink in node_successors.nodes() {
                predecessors[sink.0].push(node);
            }

            successors.push(node_successors);
        }

        FlowGraph {
            values: self.values,
            successors,
            predecessors,
            start: self.start,
            end: self.end
        }
    }
}

impl<T: Clone> FlowGraphBuilder<T> {
    pub(crate) fn from_graph(graph: &FlowGraph<T>) -> FlowGraphBuilder<T> {
        let edges = (0..graph.arena_size())
            .map(|index| graph.edges_of(NodeId(index)))
            .collect::<Vec<_>>();

        FlowGraphBuilder {
            values: graph.values.clone(),
            edges,
            start: graph.start,
            end: graph.end
        }
    }

    /// Merges every node and edge of `graph` into this builder, keeping branch roles.
    /// The merged nodes get new handles, returned as a mapping from the old ones.
    pub fn copy_in(&mut self, graph: &FlowGraph<T>) -> NodeMapping {
        let mut mapping = HashMap::new();
        for index in 0..graph.arena_size() {
            let old = NodeId(index);
            let new = self.add_slot(graph.values[index].clone());
            mapping.insert(old, new);
        }

        for index in 0..graph.arena_size() {
            let source = mapping[&NodeId(index)];
            for edge in graph.edges_of(NodeId(index)) {
                self.edges[source.0].push(Edge { kind: edge.kind, to: mapping[&edge.to] });
            }
        }

        mapping
    }

    /// Copies `graph` in and links the current end to it. Its end becomes the end.
    pub fn append_graph(&mut self, graph: &FlowGraph<T>) -> NodeMapping {
        let mapping = self.copy_in(graph);
        self.link(self.end, mapping[&graph.start()]);
        self.end = mapping[&graph.end()];
        mapping
    }

    /// Substitutes `replacement` for `node`.
    ///
    /// Every edge into `node` is redirected to the replacement's start and every edge out
    /// of `node` leaves from the replacement's end, both keeping their roles. If `node` was
    /// the start or the end, the designation moves to the replacement. The replaced node is
    /// left disconnected in the arena.
    pub fn replace(&mut self, node: NodeId, replacement: &FlowGraph<T>) -> NodeMapping {
        let mapping = self.copy_in(replacement);
        let new_start = mapping[&replacement.start()];
        let new_end = mapping[&replacement.end()];

        let outgoing = std::mem::replace(&mut self.edges[node.0], Vec::new());
        for (source, index) in self.edges_into(node) {
            self.edges[source.0][index].to = new_start;
        }

        if !outgoing.is_empty() && !self.edges[new_end.0].is_empty() {
            panic!("the end {} of the replacement for {} already has outgoing edges", new_end, node);
        }

        for edge in outgoing {
            let to = if edge.to == node { new_start } else { edge.to };
            self.edges[new_end.0].push(Edge { kind: edge.kind, to });
        }

        if self.start == node {
            self.start = new_start;
        }

        if self.end == node {
            self.end = new_end;
        }

        mapping
    }

    /// Bypasses every no-op node that falls through to a single other node. The start, the end
    /// and the nodes in `keep` stay, as does a no-op whose removal would give a branch the same
    /// sink on both edges. Returns the number of bypassed nodes.
    pub fn remove_nops(&mut self, keep: &[NodeId]) -> usize {
        let mut removed = 0;
        for index in 0..self.values.len() {
            let node = NodeId(index);
            if self.values[index].is_some() || node == self.start || node == self.end || keep.contains(&node) {
                continue;
            }

            let next = match self.edges[index].as_slice() {
                [Edge { kind: EdgeKind::Plain, to }] if *to != node => *to,
                _ => continue
            };

            let incoming = self.edges_into(node);
            let joins_branch = incoming.iter().any(|(source, _)| {
                self.edges[source.0].len() == 2 && self.edges[source.0].iter().any(|edge| edge.to == next)
            });

            if joins_branch {
                continue;
            }

            for (source, edge_index) in incoming {
                self.edges[source.0][edge_index].to = next;
            }

            self.edges[index].clear();
            removed += 1;
        }

        removed
    }
}

/// A graph holding a single no-op node.
pub fn nop<T>() -> FlowGraph<T> {
    FlowGraphBuilder::new().build()
}

/// A graph holding exactly one node with the given value.
pub fn single<T>(value: T) -> FlowGraph<T> {
    let mut builder = FlowGraphBuilder::new();
    builder.values[0] = Some(value);
    builder.build()
}

/// A graph that runs the values in order. The first value takes the seed slot.
pub fn sequence<T>(values: Vec<T>) -> FlowGraph<T> {
    let mut builder = FlowGraphBuilder::new();
    for (index, value) in values.into_iter().enumerate() {
        if index == 0 {
            builder.values[0] = Some(value);
        } else {
            builder.append(value);
        }
    }

    builder.build()
}

#[test]
#[should_panic]
fn test_double_link1() {
    let mut builder = FlowGraphBuilder::<i32>::new();
    let first = builder.add_node(1);
    let second = builder.add_node(2);
    builder.link(builder.start(), first);
    builder.link(builder.start(), second);
}

#[test]
#[should_panic]
fn test_double_jump_branch1() {
    let mut builder = FlowGraphBuilder::<i32>::new();
    let first = builder.add_node(1);
    let second = builder.add_node(2);
    let branch = builder.start();
    builder.link_jump_branch(branch, first, JumpType::Jz);
    builder.link_jump_branch(branch, second, JumpType::Jnz);
}

#[test]
#[should_panic]
fn test_incomplete_branch1() {
    let mut builder = FlowGraphBuilder::<i32>::new();
    let first = builder.add_node(1);
    builder.link_jump_branch(builder.start(), first, JumpType::Jz);
    builder.build();
}

#[test]
fn test_branch_roles_any_order1() {
    let mut builder = FlowGraphBuilder::<i32>::new();
    let first = builder.add_node(1);
    let second = builder.add_node(2);
    let branch = builder.start();
    builder.link_non_jump_branch(branch, second);
    builder.link_jump_branch(branch, first, JumpType::Jl);
    let graph = builder.build();

    assert_eq!(first, graph.jump_successor(branch));
    assert_eq!(second, graph.non_jump_successor(branch));
}

#[test]
fn test_replace_middle1() {
    let mut builder = FlowGraphBuilder::new();
    let first = builder.append(1);
    let middle = builder.append(2);
    let last = builder.append(3);
    let graph = builder.build();

    let mut builder = graph.to_builder();
    let mapping = builder.replace(middle, &sequence(vec![20, 21]));
    let graph = builder.build();

    let new_first = mapping[&NodeId(0)];
    let new_second = mapping[&NodeId(1)];
    assert_eq!(vec![new_first], graph.sinks(first));
    assert_eq!(vec![new_second], graph.sinks(new_first));
    assert_eq!(vec![last], graph.sinks(new_second));
    assert_eq!(Some(&21), graph.value(new_second));
    assert!(!graph.nodes().contains(&middle));
}

#[test]
fn test_replace_keeps_branch_roles1() {
    let mut builder = FlowGraphBuilder::new();
    let branch = builder.append(0);
    let then_node = builder.add_node(1);
    let else_node = builder.add_node(2);
    builder.link_jump_branch(branch, then_node, JumpType::Jne);
    builder.link_non_jump_branch(branch, else_node);
    builder.set_end_to_sink_for(then_node, else_node);
    let graph = builder.build();

    let mut builder = graph.to_builder();
    let mapping = builder.replace(then_node, &single(10));
    let then_replacement = mapping[&NodeId(0)];
    let mapping = builder.replace(branch, &sequence(vec![5, 6]));
    let new_branch = mapping[&NodeId(1)];
    let graph = builder.build();

    assert_eq!(then_replacement, graph.jump_successor(new_branch));
    assert_eq!(else_node, graph.non_jump_successor(new_branch));
    assert_eq!(JumpType::Jne, graph.jump_type(new_branch));
}

#[test]
fn test_replace_start_end_and_self_loop1() {
    let mut builder = FlowGraphBuilder::new();
    let node = builder.add_node(1);
    builder.set_start(node);
    builder.set_end(node);
    let looping = builder.add_node(2);
    builder.link(node, looping);
    builder.link(looping, looping);
    let graph = builder.build();

    let mut builder = graph.to_builder();
    let mapping = builder.replace(node, &sequence(vec![10, 11]));
    let mapping_loop = builder.replace(looping, &sequence(vec![20, 21]));
    let graph = builder.build();

    assert_eq!(mapping[&NodeId(0)], graph.start());
    assert_eq!(mapping[&NodeId(1)], graph.end());
    let loop_start = mapping_loop[&NodeId(0)];
    let loop_end = mapping_loop[&NodeId(1)];
    assert_eq!(vec![loop_start], graph.sinks(graph.end()));
    assert_eq!(vec![loop_start], graph.sinks(loop_end));
}

#[test]
fn test_remove_nops1() {
    let mut builder = FlowGraphBuilder::new();
    let branch = builder.append(1);
    let then_nop = builder.add_nop();
    let else_nop = builder.add_nop();
    builder.link_jump_branch(branch, then_nop, JumpType::Jne);
    builder.link_non_jump_branch(branch, else_nop);
    let join = builder.set_end_to_sink_for(then_nop, else_nop);
    let kept = builder.append_nop();
    let last = builder.append(2);

    assert_eq!(2, builder.remove_nops(&[kept]));
    let graph = builder.build();
    println!("{:?}", graph.nodes());

    assert_eq!(vec![branch], graph.sinks(graph.start()));
    assert_eq!(kept, graph.jump_successor(branch));
    assert_eq!(else_nop, graph.non_jump_successor(branch));
    assert_eq!(vec![kept], graph.sinks(else_nop));
    assert_eq!(vec![last], graph.sinks(kept));
    assert!(!graph.nodes().contains(&then_nop));
    assert!(!graph.nodes().contains(&join));
}
