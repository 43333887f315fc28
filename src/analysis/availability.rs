use std::collections::HashSet;

use crate::analysis::dataflow::{AnalysisSpec, Confluence, DataFlowAnalyzer, DataFlowResult};
use crate::graph::{FlowGraph, NodeId};
use crate::model::{ScopeTable, ScopedExpression, ScopedStatement};

/// Forward, intersection. Expressions containing a call are never available, and
/// arguments of calls are not looked into.
pub struct AvailabilitySpec<'a> {
    scopes: &'a ScopeTable
}

impl<'a> AvailabilitySpec<'a> {
    pub fn new(scopes: &'a ScopeTable) -> AvailabilitySpec<'a> {
        AvailabilitySpec {
            scopes
        }
    }
}

/// The expression a node makes available, if any.
pub fn computed_expression(statement: &ScopedStatement, scopes: &ScopeTable) -> Option<ScopedExpression> {
    if statement.statement.contains_method_call() {
        return None;
    }

    statement.statement
        .expression()
        .map(|expression| ScopedExpression::new(expression, statement.scope, scopes))
}

impl<'a> AnalysisSpec<ScopedStatement> for AvailabilitySpec<'a> {
    type Fact = ScopedExpression;

    fn is_forward(&self) -> bool {
        true
    }

    fn gen_set(&self,
               graph: &FlowGraph<ScopedStatement>,
               node: NodeId,
               _flowing_in: &HashSet<ScopedExpression>) -> HashSet<ScopedExpression> {
        graph.value(node)
            .and_then(|statement| computed_expression(statement, self.scopes))
            .into_iter()
            .collect()
    }

    fn must_kill(&self, graph: &FlowGraph<ScopedStatement>, node: NodeId, candidate: &ScopedExpression) -> bool {
        match graph.value(node) {
            Some(statement) => {
                statement.redefined(self.scopes)
                    .iter()
                    .any(|variable| candidate.uses(variable))
            }
            None => false
        }
    }

    fn confluence(&self) -> Confluence {
        Confluence::Intersection
    }

    fn gens_immune_to_kills(&self) -> bool {
        false
    }
}

pub fn available_expressions(graph: &FlowGraph<ScopedStatement>, scopes: &ScopeTable) -> DataFlowResult<ScopedExpression> {
    DataFlowAnalyzer::new(AvailabilitySpec::new(scopes)).calculate(graph)
}

#[test]
fn test_join_requires_every_path1() {
    use crate::construction;
    use crate::model::{BinaryOperator, FieldDescriptor, Location, NativeExpression, ScopeType, Variable};

    let mut scopes = ScopeTable::new(vec![FieldDescriptor::scalar(Variable::new("g"))]);
    let local = scopes.add_scope(
        scopes.global_scope(),
        ScopeType::Local,
        ["a", "b", "x", "y"].iter().map(|name| FieldDescriptor::scalar(Variable::new(name))).collect()
    );
    let a_plus_b = || NativeExpression::binary(BinaryOperator::Add, NativeExpression::scalar("a"), NativeExpression::scalar("b"));
    let a_times_b = || NativeExpression::binary(BinaryOperator::Mul, NativeExpression::scalar("a"), NativeExpression::scalar("b"));

    let body = construction::block(vec![
        construction::assignment(Location::scalar("x"), a_plus_b(), local),
        construction::if_statement(
            NativeExpression::scalar("g"),
            local,
            construction::assignment(Location::scalar("y"), a_times_b(), local),
            None
        ),
        construction::assignment(Location::scalar("g"), NativeExpression::int(0), local)
    ]);
    let graph = construction::procedure(body);
    let result = available_expressions(graph.graph(), &scopes);

    let join = graph.nodes()
        .into_iter()
        .find(|node| graph.value(*node).map(|statement| statement.statement.to_string() == "g = 0").unwrap_or(false))
        .unwrap();

    assert!(result.in_set(join).contains(&ScopedExpression::new(&a_plus_b(), local, &scopes)));
    assert!(!result.in_set(join).contains(&ScopedExpression::new(&a_times_b(), local, &scopes)));
}
