use std::collections::HashSet;

use crate::analysis::dataflow::{AnalysisSpec, Confluence, DataFlowAnalyzer, DataFlowResult};
use crate::graph::{FlowGraph, NodeId};
use crate::model::{ScopeTable, ScopedStatement, ScopedVariable};

/// Whether the statement is an assignment nothing observes: its target is not live
/// afterwards, it is not a global and evaluating it calls nothing.
pub fn is_dead_assignment(statement: &ScopedStatement, live_after: &HashSet<ScopedVariable>, scopes: &ScopeTable) -> bool {
    let assignment = match statement.statement.assignment() {
        Some(assignment) => assignment,
        None => return false
    };

    let assigned = ScopedVariable::of_location(&assignment.location, statement.scope, scopes);
    !live_after.contains(&assigned)
        && !assigned.is_global(scopes)
        && !statement.statement.contains_method_call()
}

/// Backward, union. IN holds the variables live on exit from the node.
pub struct LivenessSpec<'a> {
    scopes: &'a ScopeTable
}

impl<'a> LivenessSpec<'a> {
    pub fn new(scopes: &'a ScopeTable) -> LivenessSpec<'a> {
        LivenessSpec {
            scopes
        }
    }
}

impl<'a> AnalysisSpec<ScopedStatement> for LivenessSpec<'a> {
    type Fact = ScopedVariable;

    fn is_forward(&self) -> bool {
        false
    }

    fn gen_set(&self,
               graph: &FlowGraph<ScopedStatement>,
               node: NodeId,
               flowing_in: &HashSet<ScopedVariable>) -> HashSet<ScopedVariable> {
        match graph.value(node) {
            Some(statement) if !is_dead_assignment(statement, flowing_in, self.scopes) => {
                statement.reads(self.scopes).into_iter().collect()
            }
            _ => HashSet::new()
        }
    }

    /// Only a scalar write ends a live range; an array write leaves the other slots alive.
    fn must_kill(&self, graph: &FlowGraph<ScopedStatement>, node: NodeId, candidate: &ScopedVariable) -> bool {
        graph.value(node)
            .and_then(|statement| statement.assigned_scalar(self.scopes))
            .map(|assigned| &assigned == candidate)
            .unwrap_or(false)
    }

    fn confluence(&self) -> Confluence {
        Confluence::Union
    }

    fn gens_immune_to_kills(&self) -> bool {
        true
    }

    fn universe(&self, graph: &FlowGraph<ScopedStatement>, nodes: &[NodeId]) -> HashSet<ScopedVariable> {
        nodes.iter()
            .filter_map(|node| graph.value(*node))
            .flat_map(|statement| statement.reads(self.scopes))
            .collect()
    }
}

pub fn live_variables(graph: &FlowGraph<ScopedStatement>, scopes: &ScopeTable) -> DataFlowResult<ScopedVariable> {
    DataFlowAnalyzer::new(LivenessSpec::new(scopes)).calculate(graph)
}

#[cfg(test)]
fn scopes() -> (ScopeTable, crate::model::ScopeId) {
    use crate::model::{FieldDescriptor, ScopeType, Variable};

    let mut scopes = ScopeTable::new(vec![FieldDescriptor::scalar(Variable::new("g"))]);
    let local = scopes.add_scope(
        scopes.global_scope(),
        ScopeType::Local,
        vec![
            FieldDescriptor::scalar(Variable::new("x")),
            FieldDescriptor::scalar(Variable::new("y")),
            FieldDescriptor::array(Variable::new("arr"), 4)
        ]
    );
    (scopes, local)
}

#[test]
fn test_dead_assignment_reads_nothing1() {
    use crate::construction;
    use crate::model::{Location, NativeExpression, Variable};

    let (scopes, local) = scopes();
    let body = construction::block(vec![
        construction::assignment(Location::scalar("y"), NativeExpression::int(1), local),
        construction::assignment(Location::scalar("x"), NativeExpression::scalar("y"), local)
    ]);
    let graph = construction::procedure(body);
    let result = live_variables(graph.graph(), &scopes);

    let y = ScopedVariable::resolve(&Variable::new("y"), local, &scopes);
    let first = graph.nodes()
        .into_iter()
        .find(|node| graph.value(*node).map(|statement| statement.to_string().starts_with("y = 1")).unwrap_or(false))
        .unwrap();

    assert!(!result.in_set(first).contains(&y));
    assert!(is_dead_assignment(graph.value(first).unwrap(), result.in_set(first), &scopes));
}

#[test]
fn test_array_write_keeps_array_live1() {
    use crate::construction;
    use crate::model::{Location, NativeExpression, Variable};

    let (scopes, local) = scopes();
    let body = construction::block(vec![
        construction::assignment(Location::array("arr", NativeExpression::int(0)), NativeExpression::int(1), local),
        construction::assignment(Location::array("arr", NativeExpression::int(1)), NativeExpression::int(2), local),
        construction::assignment(
            Location::scalar("g"),
            NativeExpression::Location(Location::array("arr", NativeExpression::int(0))),
            local
        )
    ]);
    let graph = construction::procedure(body);
    let result = live_variables(graph.graph(), &scopes);

    let arr = ScopedVariable::resolve(&Variable::new("arr"), local, &scopes);
    let first = graph.nodes()
        .into_iter()
        .find(|node| graph.value(*node).map(|statement| statement.to_string().starts_with("arr[0] = 1")).unwrap_or(false))
        .unwrap();

    assert!(result.in_set(first).contains(&arr));
}
