use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::analysis::dataflow::{AnalysisSpec, Confluence, DataFlowAnalyzer, DataFlowResult};
use crate::graph::{FlowGraph, NodeId};
use crate::model::{ScopeTable, ScopedStatement, ScopedVariable};

/// The variable may have last been written at the node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReachingDefinition {
    pub variable: ScopedVariable,
    pub node: NodeId
}

/// Forward, union. The start node defines every variable with the value it has on entry,
/// so a variable that can reach a use without being assigned never looks constant.
pub struct ReachingDefinitionsSpec<'a> {
    scopes: &'a ScopeTable
}

impl<'a> ReachingDefinitionsSpec<'a> {
    pub fn new(scopes: &'a ScopeTable) -> ReachingDefinitionsSpec<'a> {
        ReachingDefinitionsSpec {
            scopes
        }
    }

    fn entry_definitions(&self, node: NodeId) -> Vec<ReachingDefinition> {
        self.scopes
            .scope_ids()
            .flat_map(|scope| {
                self.scopes.variables(scope)
                    .iter()
                    .map(move |field| ReachingDefinition {
                        variable: ScopedVariable::new(field.variable.clone(), scope),
                        node
                    })
            })
            .collect()
    }
}

impl<'a> AnalysisSpec<ScopedStatement> for ReachingDefinitionsSpec<'a> {
    type Fact = ReachingDefinition;

    fn is_forward(&self) -> bool {
        true
    }

    fn gen_set(&self,
               graph: &FlowGraph<ScopedStatement>,
               node: NodeId,
               _flowing_in: &HashSet<ReachingDefinition>) -> HashSet<ReachingDefinition> {
        let mut definitions = HashSet::new();
        if node == graph.start() {
            definitions.extend(self.entry_definitions(node));
        }

        if let Some(statement) = graph.value(node) {
            definitions.extend(
                statement.redefined(self.scopes)
                    .into_iter()
                    .map(|variable| ReachingDefinition { variable, node })
            );
        }

        definitions
    }

    fn must_kill(&self, graph: &FlowGraph<ScopedStatement>, node: NodeId, candidate: &ReachingDefinition) -> bool {
        if candidate.node == node {
            return false;
        }

        graph.value(node)
            .and_then(|statement| statement.assigned_scalar(self.scopes))
            .map(|assigned| assigned == candidate.variable)
            .unwrap_or(false)
    }

    fn confluence(&self) -> Confluence {
        Confluence::Union
    }

    fn gens_immune_to_kills(&self) -> bool {
        true
    }
}

pub fn reaching_definitions(graph: &FlowGraph<ScopedStatement>, scopes: &ScopeTable) -> DataFlowResult<ReachingDefinition> {
    DataFlowAnalyzer::new(ReachingDefinitionsSpec::new(scopes)).calculate(graph)
}

/// Groups the definitions in a fact set by variable.
pub fn definitions_by_variable(definitions: &HashSet<ReachingDefinition>) -> BTreeMap<&ScopedVariable, BTreeSet<NodeId>> {
    let mut grouped = BTreeMap::new();
    for definition in definitions {
        grouped.entry(&definition.variable)
            .or_insert_with(BTreeSet::new)
            .insert(definition.node);
    }

    grouped
}

#[cfg(test)]
fn one_sided_assignment() -> (crate::ir::ProcedureIr, NodeId, NodeId) {
    use crate::construction;
    use crate::model::{FieldDescriptor, Location, NativeExpression, ScopeType, Variable};

    let mut scopes = ScopeTable::new(vec![FieldDescriptor::scalar(Variable::new("g"))]);
    let local = scopes.add_scope(scopes.global_scope(), ScopeType::Local, vec![FieldDescriptor::scalar(Variable::new("x"))]);
    let body = construction::block(vec![
        construction::if_statement(
            NativeExpression::scalar("g"),
            local,
            construction::assignment(Location::scalar("x"), NativeExpression::int(1), local),
            None
        ),
        construction::assignment(Location::scalar("g"), NativeExpression::scalar("x"), local)
    ]);

    let ir = crate::ir::ProcedureIr::new("test", construction::procedure(body), scopes, local);
    let find = |text: &str| {
        ir.statements()
            .into_iter()
            .find(|(_, statement)| statement.statement.to_string() == text)
            .map(|(node, _)| node)
            .unwrap()
    };

    let assignment = find("x = 1");
    let use_node = find("g = x");
    (ir, assignment, use_node)
}

#[test]
fn test_entry_definition_reaches1() {
    let (ir, assignment, use_node) = one_sided_assignment();
    let result = reaching_definitions(ir.graph.graph(), &ir.scopes);
    let definitions = definitions_by_variable(result.in_set(use_node));

    let x = ScopedVariable::resolve(&crate::model::Variable::new("x"), ir.scope, &ir.scopes);
    let expected = vec![ir.graph.start(), assignment].into_iter().collect::<BTreeSet<_>>();
    assert_eq!(Some(&expected), definitions.get(&x));
}

#[test]
fn test_killed_after_assignment1() {
    let (ir, assignment, _) = one_sided_assignment();
    let result = reaching_definitions(ir.graph.graph(), &ir.scopes);
    let x = ScopedVariable::resolve(&crate::model::Variable::new("x"), ir.scope, &ir.scopes);

    let reaching_x = result.out_set(assignment)
        .iter()
        .filter(|definition| definition.variable == x)
        .map(|definition| definition.node)
        .collect::<Vec<_>>();
    assert_eq!(vec![assignment], reaching_x);
}
