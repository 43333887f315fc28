use std::collections::{BTreeSet, HashMap};
use std::fmt;

pub mod builder;
pub mod bcr;

pub use builder::{nop, sequence, single, FlowGraphBuilder};
pub use bcr::{BcrFlowGraph, BcrFlowGraphBuilder};

/// Handle of a node inside the arena of one graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JumpType {
    Jz,
    Jnz,
    Js,
    Jns,
    Jo,
    Jno,
    Jl,
    Jle,
    Jge,
    Jg,
    Je,
    Jne
}

impl JumpType {
    pub fn mnemonic(&self) -> &'static str {
        match self {
            JumpType::Jz => "jz",
            JumpType::Jnz => "jnz",
            JumpType::Js => "js",
            JumpType::Jns => "jns",
            JumpType::Jo => "jo",
            JumpType::Jno => "jno",
            JumpType::Jl => "jl",
            JumpType::Jle => "jle",
            JumpType::Jge => "jge",
            JumpType::Jg => "jg",
            JumpType::Je => "je",
            JumpType::Jne => "jne"
        }
    }
}

impl fmt::Display for JumpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}

/// The role an outgoing edge plays for its source node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    Plain,
    NonJump,
    Jump(JumpType)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub kind: EdgeKind,
    pub to: NodeId
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Successors {
    None,
    Single(NodeId),
    Branch { non_jump: NodeId, jump: NodeId, jump_type: JumpType }
}

impl Successors {
    pub fn nodes(&self) -> Vec<NodeId> {
        match self {
            Successors::None => Vec::new(),
            Successors::Single(node) => vec![*node],
            Successors::Branch { non_jump, jump, .. } => vec![*non_jump, *jump]
        }
    }
}

/// Maps the nodes of a graph that was merged into a builder to their new handles.
pub type NodeMapping = HashMap<NodeId, NodeId>;

/// A validated flow graph. Built once by a [`FlowGraphBuilder`] and read-only afterwards;
/// rewrites go through [`FlowGraph::to_builder`].
#[derive(Debug, Clone)]
pub struct FlowGraph<T> {
    pub(crate) values: Vec<Option<T>>,
    pub(crate) successors: Vec<Successors>,
    pub(crate) predecessors: Vec<Vec<NodeId>>,
    pub(crate) start: NodeId,
    pub(crate) end: NodeId
}

impl<T> FlowGraph<T> {
    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn end(&self) -> NodeId {
        self.end
    }

    /// The number of slots in the arena, including nodes that are no longer connected.
    pub fn arena_size(&self) -> usize {
        self.values.len()
    }

    pub fn value(&self, node: NodeId) -> Option<&T> {
        self.values[node.0].as_ref()
    }

    pub fn has_value(&self, node: NodeId) -> bool {
        self.values[node.0].is_some()
    }

    pub fn successors(&self, node: NodeId) -> &Successors {
        &self.successors[node.0]
    }

    pub fn sinks(&self, node: NodeId) -> Vec<NodeId> {
        self.successors[node.0].nodes()
    }

    pub fn predecessors(&self, node: NodeId) -> &[NodeId] {
        &self.predecessors[node.0]
    }

    pub fn is_branch(&self, node: NodeId) -> bool {
        match self.successors[node.0] {
            Successors::Branch { .. } => true,
            _ => false
        }
    }

    pub fn non_jump_successor(&self, node: NodeId) -> NodeId {
        match self.successors[node.0] {
            Successors::Branch { non_jump, .. } => non_jump,
            _ => panic!("node {} is not a branch", node)
        }
    }

    pub fn jump_successor(&self, node: NodeId) -> NodeId {
        match self.successors[node.0] {
            Successors::Branch { jump, .. } => jump,
            _ => panic!("node {} is not a branch", node)
        }
    }

    pub fn jump_type(&self, node: NodeId) -> JumpType {
        match self.successors[node.0] {
            Successors::Branch { jump_type, .. } => jump_type,
            _ => panic!("node {} is not a branch", node)
        }
    }

    /// The start, the end and every node that takes part in an edge, in ascending order.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes = BTreeSet::new();
        nodes.insert(self.start);
        nodes.insert(self.end);

        for (index, successors) in self.successors.iter().enumerate() {
            let sinks = successors.nodes();
            if !sinks.is_empty() {
                nodes.insert(NodeId(index));
                nodes.extend(sinks);
            }
        }

        nodes.into_iter().collect()
    }

    pub fn reachable_from(&self, node: NodeId) -> BTreeSet<NodeId> {
        let mut reachable = BTreeSet::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if reachable.insert(current) {
                stack.extend(self.sinks(current));
            }
        }

        reachable
    }

    pub(crate) fn edges_of(&self, node: NodeId) -> Vec<Edge> {
        match self.successors[node.0] {
            Successors::None => Vec::new(),
            Successors::Single(to) => vec![Edge { kind: EdgeKind::Plain, to }],
            Successors::Branch { non_jump, jump, jump_type } => vec![
                Edge { kind: EdgeKind::NonJump, to: non_jump },
                Edge { kind: EdgeKind::Jump(jump_type), to: jump }
            ]
        }
    }
}

impl<T: Clone> FlowGraph<T> {
    /// A builder holding the same nodes under the same handles.
    pub fn to_builder(&self) -> FlowGraphBuilder<T> {
        FlowGraphBuilder::from_graph(self)
    }
}

impl<T: fmt::Display> fmt::Display for FlowGraph<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in self.nodes() {
            write!(f, "{}", node)?;
            if node == self.start {
                write!(f, " [start]")?;
            }
            if node == self.end {
                write!(f, " [end]")?;
            }

            match self.value(node) {
                Some(value) => write!(f, ": {}", value)?,
                None => write!(f, ": nop")?
            }

            match self.successors(node) {
                Successors::None => {}
                Successors::Single(sink) => write!(f, " -> {}", sink)?,
                Successors::Branch { non_jump, jump, jump_type } => {
                    write!(f, " -> {}, {} {}", non_jump, jump_type, jump)?
                }
            }

            writeln!(f)?;
        }

        Ok(())
    }
}

#[test]
fn test_linear_graph1() {
    let mut builder = FlowGraphBuilder::new();
    let first = builder.append(1);
    let second = builder.append(2);
    let graph = builder.build();

    assert_eq!(vec![graph.start(), first, second], graph.nodes());
    assert_eq!(second, graph.end());
    assert_eq!(&Successors::Single(first), graph.successors(graph.start()));
    assert_eq!(&[first][..], graph.predecessors(second));
    assert_eq!(Some(&2), graph.value(second));
    assert!(!graph.has_value(graph.start()));
}

#[test]
fn test_branch1() {
    let mut builder = FlowGraphBuilder::new();
    let branch = builder.append(0);
    let then_node = builder.add_node(1);
    let else_node = builder.add_node(2);
    builder.link_jump_branch(branch, then_node, JumpType::Jne);
    builder.link_non_jump_branch(branch, else_node);
    builder.set_end_to_sink_for(then_node, else_node);
    let graph = builder.build();

    println!("{}", graph);
    assert!(graph.is_branch(branch));
    assert_eq!(then_node, graph.jump_successor(branch));
    assert_eq!(else_node, graph.non_jump_successor(branch));
    assert_eq!(JumpType::Jne, graph.jump_type(branch));
    assert_eq!(2, graph.predecessors(graph.end()).len());
    assert_eq!(graph.nodes().into_iter().collect::<BTreeSet<_>>(), graph.reachable_from(graph.start()));
}

#[test]
#[should_panic]
fn test_jump_successor_of_plain_node1() {
    let mut builder = FlowGraphBuilder::new();
    let node = builder.append(1);
    let graph = builder.build();
    graph.jump_successor(node);
}
