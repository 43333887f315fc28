use std::collections::{BTreeMap, HashSet};

use crate::analysis::dataflow::{AnalysisSpec, Confluence, DataFlowAnalyzer, DataFlowResult};
use crate::graph::{FlowGraph, NodeId};

/// Forward, intersection. OUT holds every node that dominates the node, itself included.
pub struct DominatorSpec;

impl<T> AnalysisSpec<T> for DominatorSpec {
    type Fact = NodeId;

    fn is_forward(&self) -> bool {
        true
    }

    fn gen_set(&self, _graph: &FlowGraph<T>, node: NodeId, _flowing_in: &HashSet<NodeId>) -> HashSet<NodeId> {
        let mut gen_set = HashSet::new();
        gen_set.insert(node);
        gen_set
    }

    fn must_kill(&self, _graph: &FlowGraph<T>, _node: NodeId, _candidate: &NodeId) -> bool {
        false
    }

    fn confluence(&self) -> Confluence {
        Confluence::Intersection
    }

    fn gens_immune_to_kills(&self) -> bool {
        true
    }
}

pub fn dominators<T>(graph: &FlowGraph<T>) -> DataFlowResult<NodeId> {
    DataFlowAnalyzer::new(DominatorSpec).calculate(graph)
}

/// The immediate dominator of every node reachable from the start, except the start itself.
pub fn dominator_tree<T>(graph: &FlowGraph<T>) -> BTreeMap<NodeId, NodeId> {
    let result = dominators(graph);
    let mut tree = BTreeMap::new();

    for node in graph.reachable_from(graph.start()) {
        // The strict dominators form a chain; the closest one has the most dominators itself.
        let immediate = result.out_set(node)
            .iter()
            .filter(|dominator| **dominator != node)
            .max_by_key(|dominator| (result.out_set(**dominator).len(), **dominator));

        if let Some(immediate) = immediate {
            tree.insert(node, *immediate);
        }
    }

    tree
}

#[cfg(test)]
fn tree_of(edges: &[(NodeId, NodeId)]) -> BTreeMap<NodeId, NodeId> {
    edges.iter().cloned().collect()
}

#[test]
fn test_diamond_dominators1() {
    use crate::graph::{FlowGraphBuilder, JumpType};

    let mut builder = FlowGraphBuilder::new();
    let branch = builder.append(1);
    let left = builder.add_node(2);
    let right = builder.add_node(3);
    builder.link_jump_branch(branch, left, JumpType::Jne);
    builder.link_non_jump_branch(branch, right);
    let join = builder.set_end_to_sink_for(left, right);
    let graph = builder.build();

    let result = dominators(&graph);
    assert!(DataFlowAnalyzer::new(DominatorSpec).is_fixed_point(&graph, &result));
    assert_eq!(
        &[graph.start(), branch, join].iter().cloned().collect::<HashSet<_>>(),
        result.out_set(join)
    );

    let tree = dominator_tree(&graph);
    println!("{:?}", tree);
    assert_eq!(
        tree_of(&[(branch, graph.start()), (left, branch), (right, branch), (join, branch)]),
        tree
    );
}

#[test]
fn test_loop_dominators1() {
    use crate::graph::{FlowGraphBuilder, JumpType};

    let mut builder = FlowGraphBuilder::new();
    let header = builder.append(1);
    let branch = builder.append(2);
    let body = builder.add_node(3);
    let latch = builder.add_node(4);
    let exit = builder.add_node(5);
    builder.link_jump_branch(branch, body, JumpType::Jne);
    builder.link_non_jump_branch(branch, exit);
    builder.link(body, latch);
    builder.link(latch, header);
    builder.set_end(exit);
    let graph = builder.build();

    let result = dominators(&graph);
    assert!(!result.out_set(header).contains(&latch));
    assert!(result.out_set(latch).contains(&header));

    let tree = dominator_tree(&graph);
    println!("{:?}", tree);
    assert_eq!(
        tree_of(&[(header, graph.start()), (branch, header), (body, branch), (latch, body), (exit, branch)]),
        tree
    );
}

#[test]
fn test_unreachable_code_is_left_out1() {
    use crate::construction;
    use crate::model::{FieldDescriptor, Location, NativeExpression, ScopeTable, ScopeType, Variable};

    let mut scopes = ScopeTable::new(vec![FieldDescriptor::scalar(Variable::new("g"))]);
    let local = scopes.add_scope(scopes.global_scope(), ScopeType::Local, vec![]);
    let body = construction::block(vec![
        construction::return_statement(None, local),
        construction::assignment(Location::scalar("g"), NativeExpression::int(1), local)
    ]);
    let graph = construction::procedure(body);
    let tree = dominator_tree(graph.graph());

    let dead = graph.nodes()
        .into_iter()
        .find(|node| graph.value(*node).map(|statement| statement.statement.to_string() == "g = 1").unwrap_or(false))
        .unwrap();
    assert!(!tree.contains_key(&dead));
    assert!(tree.contains_key(&graph.end()));
}
