use std::collections::BTreeSet;
use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::graph::{FlowGraph, FlowGraphBuilder, NodeId, NodeMapping};

/// A flow graph with break, continue and return terminals. Control constructs nested
/// inside the graph escape through the terminals, which the enclosing construct links to
/// its own targets.
#[derive(Debug, Clone)]
pub struct BcrFlowGraph<T> {
    graph: FlowGraph<T>,
    break_terminal: NodeId,
    continue_terminal: NodeId,
    return_terminal: NodeId
}

impl<T> BcrFlowGraph<T> {
    pub fn graph(&self) -> &FlowGraph<T> {
        &self.graph
    }

    pub fn into_graph(self) -> FlowGraph<T> {
        self.graph
    }

    pub fn break_terminal(&self) -> NodeId {
        self.break_terminal
    }

    pub fn continue_terminal(&self) -> NodeId {
        self.continue_terminal
    }

    pub fn return_terminal(&self) -> NodeId {
        self.return_terminal
    }

    pub fn terminals(&self) -> [NodeId; 3] {
        [self.break_terminal, self.continue_terminal, self.return_terminal]
    }

    /// Whether control can reach the terminal from inside the graph.
    pub fn is_terminal_used(&self, terminal: NodeId) -> bool {
        !self.graph.predecessors(terminal).is_empty()
    }

    /// The nodes of the inner graph together with the three terminals.
    pub fn nodes(&self) -> Vec<NodeId> {
        let mut nodes = self.graph.nodes().into_iter().collect::<BTreeSet<_>>();
        nodes.extend(self.terminals().iter().cloned());
        nodes.into_iter().collect()
    }
}

impl<T: Clone> BcrFlowGraph<T> {
    pub fn to_builder(&self) -> BcrFlowGraphBuilder<T> {
        BcrFlowGraphBuilder {
            graph: self.graph.to_builder(),
            break_terminal: self.break_terminal,
            continue_terminal: self.continue_terminal,
            return_terminal: self.return_terminal
        }
    }
}

impl<T> Deref for BcrFlowGraph<T> {
    type Target = FlowGraph<T>;

    fn deref(&self) -> &FlowGraph<T> {
        &self.graph
    }
}

impl<T: fmt::Display> fmt::Display for BcrFlowGraph<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.graph)?;
        writeln!(
            f,
            "break: {}, continue: {}, return: {}",
            self.break_terminal,
            self.continue_terminal,
            self.return_terminal
        )
    }
}

#[derive(Debug, Clone)]
pub struct BcrFlowGraphBuilder<T> {
    graph: FlowGraphBuilder<T>,
    break_terminal: NodeId,
    continue_terminal: NodeId,
    return_terminal: NodeId
}

impl<T> BcrFlowGraphBuilder<T> {
    pub fn new() -> BcrFlowGraphBuilder<T> {
        let mut graph = FlowGraphBuilder::new();
        let break_terminal = graph.add_nop();
        let continue_terminal = graph.add_nop();
        let return_terminal = graph.add_nop();

        BcrFlowGraphBuilder {
            graph,
            break_terminal,
            continue_terminal,
            return_terminal
        }
    }

    pub fn break_terminal(&self) -> NodeId {
        self.break_terminal
    }

    pub fn continue_terminal(&self) -> NodeId {
        self.continue_terminal
    }

    pub fn return_terminal(&self) -> NodeId {
        self.return_terminal
    }

    pub fn build(self) -> BcrFlowGraph<T> {
        BcrFlowGraph {
            graph: self.graph.build(),
            break_terminal: self.break_terminal,
            continue_terminal: self.continue_terminal,
            return_terminal: self.return_terminal
        }
    }
}

impl<T: Clone> BcrFlowGraphBuilder<T> {
    /// Like [`FlowGraphBuilder::replace`], also moving a terminal designation held by `node`
    /// to the replacement's end.
    pub fn replace(&mut self, node: NodeId, replacement: &FlowGraph<T>) -> NodeMapping {
        let mapping = self.graph.replace(node, replacement);
        let new_end = mapping[&replacement.end()];

        for terminal in [&mut self.break_terminal, &mut self.continue_terminal, &mut self.return_terminal].iter_mut() {
            if **terminal == node {
                **terminal = new_end;
            }
        }

        mapping
    }

    /// Like [`FlowGraphBuilder::remove_nops`], keeping the three terminals.
    pub fn remove_nops(&mut self) -> usize {
        let terminals = [self.break_terminal, self.continue_terminal, self.return_terminal];
        self.graph.remove_nops(&terminals)
    }

    /// Copies a nested construct in and links each of its used terminals to the given
    /// target inside this graph.
    pub fn copy_in_attached(&mut self,
                            inner: &BcrFlowGraph<T>,
                            break_target: NodeId,
                            continue_target: NodeId,
                            return_target: NodeId) -> NodeMapping {
        let mapping = self.graph.copy_in(inner.graph());
        let targets = [
            (inner.break_terminal, break_target),
            (inner.continue_terminal, continue_target),
            (inner.return_terminal, return_target)
        ];

        for (terminal, target) in targets.iter() {
            if inner.is_terminal_used(*terminal) {
                self.graph.link(mapping[terminal], *target);
            }
        }

        mapping
    }

    /// Copies a nested construct in so that its terminals escape to this graph's terminals.
    pub fn copy_in_escaping(&mut self, inner: &BcrFlowGraph<T>) -> NodeMapping {
        let (break_target, continue_target, return_target) =
            (self.break_terminal, self.continue_terminal, self.return_terminal);
        self.copy_in_attached(inner, break_target, continue_target, return_target)
    }
}

impl<T> Deref for BcrFlowGraphBuilder<T> {
    type Target = FlowGraphBuilder<T>;

    fn deref(&self) -> &FlowGraphBuilder<T> {
        &self.graph
    }
}

impl<T> DerefMut for BcrFlowGraphBuilder<T> {
    fn deref_mut(&mut self) -> &mut FlowGraphBuilder<T> {
        &mut self.graph
    }
}

#[test]
fn test_terminal_moves_on_replace1() {
    let mut builder = BcrFlowGraphBuilder::new();
    let node = builder.append(1);
    let break_terminal = builder.break_terminal();
    builder.link(node, break_terminal);
    let graph = builder.build();

    let mut builder = graph.to_builder();
    let mapping = builder.replace(break_terminal, &crate::graph::builder::sequence(vec![5, 6]));
    let graph = builder.build();

    assert_eq!(mapping[&NodeId(1)], graph.break_terminal());
    assert_eq!(vec![mapping[&NodeId(0)]], graph.sinks(node));
    assert!(graph.nodes().contains(&graph.continue_terminal()));
}

#[test]
fn test_copy_in_attached1() {
    let mut inner = BcrFlowGraphBuilder::new();
    let inner_node = inner.append(1);
    let inner_break = inner.break_terminal();
    inner.link(inner_node, inner_break);
    let inner = inner.build();

    let mut outer = BcrFlowGraphBuilder::new();
    let exit = outer.add_node(2);
    let mapping = outer.copy_in_attached(&inner, exit, exit, exit);
    let start = outer.end();
    outer.link(start, mapping[&inner.start()]);
    outer.set_end(exit);
    let outer = outer.build();

    assert!(outer.reachable_from(outer.start()).contains(&exit));
    assert_eq!(vec![exit], outer.sinks(mapping[&inner_break]));
    assert!(outer.sinks(mapping[&inner.continue_terminal()]).is_empty());
}
