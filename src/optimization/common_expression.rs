use std::collections::HashMap;

use tracing::debug;

use crate::analysis::availability::available_expressions;
use crate::context::CompilationContext;
use crate::graph::{sequence, single};
use crate::ir::ProcedureIr;
use crate::model::{Assignment, Location, NativeExpression, ScopeId, ScopeTable, ScopedExpression, Statement, Variable};
use crate::optimization::DataFlowOptimizer;

const TEMPORARY_PREFIX: &str = "cse_temp";

/// Stores every complex expression in a temporary when it is computed and reads the
/// temporary wherever the expression is already available.
pub struct CommonExpressionEliminator;

struct Temporaries<'a> {
    context: &'a mut CompilationContext,
    scopes: &'a mut ScopeTable,
    procedure_scope: ScopeId,
    temporaries: HashMap<ScopedExpression, Variable>
}

impl<'a> Temporaries<'a> {
    fn temporary_for(&mut self, expression: &ScopedExpression) -> Variable {
        if let Some(temporary) = self.temporaries.get(expression) {
            return temporary.clone();
        }

        let temporary = self.context.fresh_temporary(TEMPORARY_PREFIX);
        let scope = self.scopes.innermost_local(expression.scope).unwrap_or(self.procedure_scope);
        self.scopes.add_temporary(scope, temporary.clone());
        self.temporaries.insert(expression.clone(), temporary.clone());
        temporary
    }
}

impl DataFlowOptimizer for CommonExpressionEliminator {
    fn name(&self) -> &'static str {
        "common subexpression elimination"
    }

    fn optimized(&self, ir: ProcedureIr, context: &mut CompilationContext) -> ProcedureIr {
        let availability = available_expressions(ir.graph.graph(), &ir.scopes);
        let mut builder = ir.graph.to_builder();
        let mut scopes = ir.scopes.clone();
        let mut temporaries = Temporaries {
            context,
            scopes: &mut scopes,
            procedure_scope: ir.scope,
            temporaries: HashMap::new()
        };

        for (node, statement) in ir.statements() {
            if statement.statement.contains_method_call() {
                continue;
            }

            let expression = match statement.statement.expression() {
                Some(expression) if expression.is_complex_enough() => expression,
                _ => continue
            };

            let scoped = ScopedExpression::new(expression, statement.scope, &ir.scopes);
            let temporary = temporaries.temporary_for(&scoped);
            let read = NativeExpression::variable(&temporary);

            if availability.in_set(node).contains(&scoped) {
                debug!("{}: {} is available in {}", node, expression, temporary);
                builder.replace(node, &single(statement.with_statement(statement.statement.with_expression(read))));
            } else {
                let store = statement.with_statement(
                    Statement::Assignment(Assignment::compiler(Location::Scalar(temporary.clone()), expression.clone()))
                );

                builder.replace(
                    node,
                    &sequence(vec![store, statement.with_statement(statement.statement.with_expression(read))])
                );
            }
        }

        if temporaries.temporaries.is_empty() {
            return ir;
        }

        let graph = builder.build();
        ProcedureIr {
            graph,
            scopes,
            ..ir
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::construction;
    use crate::context::CompilationContext;
    use crate::ir::ProcedureIr;
    use crate::model::{BinaryOperator, FieldDescriptor, Location, NativeExpression, ScopeId, ScopeTable, ScopeType, Variable};
    use crate::optimization::DataFlowOptimizer;
    use crate::optimization::common_expression::CommonExpressionEliminator;

    fn scopes() -> (ScopeTable, ScopeId) {
        let mut scopes = ScopeTable::new(vec![FieldDescriptor::scalar(Variable::new("g"))]);
        let local = scopes.add_scope(
            scopes.global_scope(),
            ScopeType::Local,
            vec![
                FieldDescriptor::scalar(Variable::new("a")),
                FieldDescriptor::scalar(Variable::new("b")),
                FieldDescriptor::scalar(Variable::new("x")),
                FieldDescriptor::scalar(Variable::new("y"))
            ]
        );
        (scopes, local)
    }

    fn a_plus_b() -> NativeExpression {
        NativeExpression::binary(BinaryOperator::Add, NativeExpression::scalar("a"), NativeExpression::scalar("b"))
    }

    fn statement_texts(ir: &ProcedureIr) -> Vec<String> {
        ir.statements()
            .into_iter()
            .map(|(_, statement)| statement.statement.to_string())
            .collect()
    }

    #[test]
    fn test_reuse1() {
        let (scopes, local) = scopes();
        let body = construction::block(vec![
            construction::assignment(Location::scalar("x"), a_plus_b(), local),
            construction::assignment(Location::scalar("y"), a_plus_b(), local)
        ]);
        let ir = ProcedureIr::new("test", construction::procedure(body), scopes, local);

        let ir = CommonExpressionEliminator.optimized(ir, &mut CompilationContext::new());
        println!("{}", ir);

        assert_eq!(
            vec!["%cse_temp0 = a + b".to_owned(), "x = %cse_temp0".to_owned(), "y = %cse_temp0".to_owned()],
            statement_texts(&ir)
        );
        assert!(ir.scopes.declares(local, &Variable::compiler("cse_temp0")));
    }

    #[test]
    fn test_killed_by_redefinition1() {
        let (scopes, local) = scopes();
        let body = construction::block(vec![
            construction::assignment(Location::scalar("x"), a_plus_b(), local),
            construction::assignment(Location::scalar("a"), NativeExpression::int(3), local),
            construction::assignment(Location::scalar("y"), a_plus_b(), local)
        ]);
        let ir = ProcedureIr::new("test", construction::procedure(body), scopes, local);

        let ir = CommonExpressionEliminator.optimized(ir, &mut CompilationContext::new());
        let stores = statement_texts(&ir)
            .into_iter()
            .filter(|text| text.starts_with("%cse_temp0 = "))
            .count();
        assert_eq!(2, stores);
    }

    #[test]
    fn test_calls_are_left_alone1() {
        let (scopes, local) = scopes();
        let call = NativeExpression::call("f", vec![NativeExpression::scalar("a")]);
        let body = construction::block(vec![
            construction::assignment(Location::scalar("x"), call.clone(), local),
            construction::assignment(Location::scalar("y"), call, local)
        ]);
        let ir = ProcedureIr::new("test", construction::procedure(body), scopes, local);

        let ir = CommonExpressionEliminator.optimized(ir, &mut CompilationContext::new());
        assert_eq!(vec!["x = f(a)".to_owned(), "y = f(a)".to_owned()], statement_texts(&ir));
    }
}
