use std::collections::BTreeSet;

use tracing::debug;

use crate::analysis::reaching_definitions::{definitions_by_variable, reaching_definitions};
use crate::context::CompilationContext;
use crate::graph::{single, FlowGraph, NodeId};
use crate::ir::ProcedureIr;
use crate::model::{Literal, NativeExpression, ScopedStatement, ScopedVariable};
use crate::optimization::DataFlowOptimizer;

/// Replaces reads of scalars whose every reaching definition assigns the same literal.
pub struct ConstantPropagator;

/// The literal all definitions assign, if they agree.
fn common_constant(graph: &FlowGraph<ScopedStatement>, definitions: &BTreeSet<NodeId>) -> Option<Literal> {
    let mut constant = None;
    for node in definitions {
        let literal = graph.value(*node)
            .and_then(|statement| statement.statement.assignment())
            .filter(|assignment| assignment.is_constant_scalar_assignment())
            .and_then(|assignment| assignment.expression.literal())?;

        match constant {
            None => constant = Some(literal),
            Some(current) if current != literal => return None,
            Some(_) => {}
        }
    }

    constant
}

impl DataFlowOptimizer for ConstantPropagator {
    fn name(&self) -> &'static str {
        "constant propagation"
    }

    fn optimized(&self, ir: ProcedureIr, _context: &mut CompilationContext) -> ProcedureIr {
        let reaching = reaching_definitions(ir.graph.graph(), &ir.scopes);
        let mut builder = ir.graph.to_builder();
        let mut propagated_statements = 0;

        for (node, statement) in ir.statements() {
            let expression = match statement.statement.expression() {
                Some(expression) => expression,
                None => continue
            };

            let definitions = definitions_by_variable(reaching.in_set(node));
            let mut propagated = expression.clone();
            for location in expression.locations() {
                if !location.is_scalar() {
                    continue;
                }

                let variable = ScopedVariable::of_location(location, statement.scope, &ir.scopes);
                let constant = definitions.get(&variable)
                    .and_then(|nodes| common_constant(ir.graph.graph(), nodes));

                if let Some(constant) = constant {
                    propagated = propagated.with_location_replaced(location, &NativeExpression::Literal(constant));
                }
            }

            if &propagated != expression {
                debug!("{}: {} becomes {}", node, expression, propagated);
                let replacement = statement.with_statement(statement.statement.with_expression(propagated));
                builder.replace(node, &single(replacement));
                propagated_statements += 1;
            }
        }

        if propagated_statements == 0 {
            return ir;
        }

        let graph = builder.build();
        ir.with_graph(graph)
    }
}
