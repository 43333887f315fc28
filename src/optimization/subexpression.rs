use std::collections::VecDeque;

use tracing::trace;

use crate::context::CompilationContext;
use crate::graph::sequence;
use crate::ir::ProcedureIr;
use crate::model::{Assignment, Location, NativeExpression, ScopedStatement, Statement};
use crate::optimization::DataFlowOptimizer;

const TEMPORARY_PREFIX: &str = "see_temp";

/// Rewrites nested expressions into a chain of temporaries, one operator per statement.
/// Non-leaf operands are hoisted left to right. Leaf operands stay in place and are read
/// after every hoisted operand, so in `g + f()` the call runs before `g` is read.
pub struct SubexpressionExpander;

fn is_expandable(statement: &ScopedStatement) -> bool {
    statement.statement
        .expression()
        .map(|expression| expression.is_expandable())
        .unwrap_or(false)
}

impl DataFlowOptimizer for SubexpressionExpander {
    fn name(&self) -> &'static str {
        "subexpression expansion"
    }

    fn optimized(&self, ir: ProcedureIr, context: &mut CompilationContext) -> ProcedureIr {
        let mut builder = ir.graph.to_builder();
        let mut scopes = ir.scopes.clone();
        let mut queue = ir.statements()
            .into_iter()
            .filter(|(_, statement)| is_expandable(statement))
            .map(|(node, _)| node)
            .collect::<VecDeque<_>>();

        if queue.is_empty() {
            return ir;
        }

        while let Some(node) = queue.pop_front() {
            let statement = match builder.value(node) {
                Some(statement) => statement.clone(),
                None => continue
            };

            let expression = match statement.statement.expression() {
                Some(expression) if expression.is_expandable() => expression,
                _ => continue
            };

            let (index, operand) = match expression.children().into_iter().enumerate().find(|(_, child)| !child.is_leaf()) {
                Some((index, operand)) => (index, operand.clone()),
                None => continue
            };

            let temporary = context.fresh_temporary(TEMPORARY_PREFIX);
            let scope = scopes.innermost_local(statement.scope).unwrap_or(ir.scope);
            scopes.add_temporary(scope, temporary.clone());
            trace!("{}: hoisting {} into {}", node, operand, temporary);

            let hoisted = statement.with_statement(
                Statement::Assignment(Assignment::compiler(Location::Scalar(temporary.clone()), operand))
            );
            let rest = statement.with_statement(
                statement.statement.with_expression(
                    expression.with_child_replaced(index, &NativeExpression::variable(&temporary))
                )
            );

            let replacement = sequence(vec![hoisted, rest]);
            let mapping = builder.replace(node, &replacement);
            for replacement_node in replacement.nodes() {
                let new_node = mapping[&replacement_node];
                if builder.value(new_node).map(is_expandable).unwrap_or(false) {
                    queue.push_back(new_node);
                }
            }
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
    use crate::model::{BinaryOperator, FieldDescriptor, Location, NativeExpression, ScopeId, ScopeTable, ScopeType, Statement, Variable};
    use crate::optimization::DataFlowOptimizer;
    use crate::optimization::subexpression::SubexpressionExpander;

    fn scopes() -> (ScopeTable, ScopeId) {
        let mut scopes = ScopeTable::new(vec![]);
        let local = scopes.add_scope(
            scopes.global_scope(),
            ScopeType::Local,
            ["a", "b", "c", "d", "x"].iter().map(|name| FieldDescriptor::scalar(Variable::new(name))).collect()
        );
        (scopes, local)
    }

    fn statement_texts(ir: &ProcedureIr) -> Vec<String> {
        ir.statements()
            .into_iter()
            .map(|(_, statement)| statement.statement.to_string())
            .collect()
    }

    #[test]
    fn test_expand1() {
        let (scopes, local) = scopes();
        let expression = NativeExpression::binary(
            BinaryOperator::Add,
            NativeExpression::binary(BinaryOperator::Mul, NativeExpression::scalar("a"), NativeExpression::scalar("b")),
            NativeExpression::binary(BinaryOperator::Mul, NativeExpression::scalar("c"), NativeExpression::scalar("d"))
        );
        let body = construction::assignment(Location::scalar("x"), expression, local);
        let ir = ProcedureIr::new("test", construction::procedure(body), scopes, local);

        let ir = SubexpressionExpander.optimized(ir, &mut CompilationContext::new());
        println!("{}", ir);

        assert_eq!(
            vec![
                "%see_temp0 = a * b".to_owned(),
                "%see_temp1 = c * d".to_owned(),
                "x = %see_temp0 + %see_temp1".to_owned()
            ],
            statement_texts(&ir)
        );

        for (_, statement) in ir.statements() {
            assert!(!statement.statement.expression().map(|expression| expression.is_nested()).unwrap_or(false));
        }

        assert!(ir.scopes.declares(local, &Variable::compiler("see_temp1")));
    }

    #[test]
    fn test_short_circuit_untouched1() {
        let (scopes, local) = scopes();
        let condition = NativeExpression::binary(
            BinaryOperator::And,
            NativeExpression::binary(BinaryOperator::Less, NativeExpression::scalar("a"), NativeExpression::scalar("b")),
            NativeExpression::binary(BinaryOperator::Less, NativeExpression::scalar("c"), NativeExpression::scalar("d"))
        );
        let body = construction::statement(Statement::Compare(condition), local);
        let ir = ProcedureIr::new("test", construction::procedure(body), scopes, local);

        let ir = SubexpressionExpander.optimized(ir, &mut CompilationContext::new());
        assert_eq!(1, ir.statements().len());
    }
}
