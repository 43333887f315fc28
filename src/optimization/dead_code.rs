use tracing::debug;

use crate::analysis::liveness::{is_dead_assignment, live_variables};
use crate::context::CompilationContext;
use crate::graph::nop;
use crate::ir::ProcedureIr;
use crate::optimization::DataFlowOptimizer;

/// Replaces assignments whose value is never read with no-ops.
pub struct DeadCodeEliminator;

impl DataFlowOptimizer for DeadCodeEliminator {
    fn name(&self) -> &'static str {
        "dead code elimination"
    }

    fn optimized(&self, ir: ProcedureIr, _context: &mut CompilationContext) -> ProcedureIr {
        let liveness = live_variables(ir.graph.graph(), &ir.scopes);
        let mut builder = ir.graph.to_builder();
        let mut eliminated = 0;

        for (node, statement) in ir.statements() {
            if is_dead_assignment(statement, liveness.in_set(node), &ir.scopes) {
                debug!("{}: {} is dead", node, statement);
                builder.replace(node, &nop());
                eliminated += 1;
            }
        }

        if eliminated == 0 {
            return ir;
        }

        let graph = builder.build();
        ir.with_graph(graph)
    }
}

#[cfg(test)]
mod tests {
    use crate::construction;
    use crate::context::CompilationContext;
    use crate::ir::ProcedureIr;
    use crate::model::{FieldDescriptor, Location, NativeExpression, ScopeTable, ScopeType, Statement, Variable};
    use crate::optimization::DataFlowOptimizer;
    use crate::optimization::dead_code::DeadCodeEliminator;

    fn procedure(body: Vec<construction::Fragment>, scopes: ScopeTable, scope: crate::model::ScopeId) -> ProcedureIr {
        ProcedureIr::new("test", construction::procedure(construction::block(body)), scopes, scope)
    }

    fn scopes() -> (ScopeTable, crate::model::ScopeId) {
        let mut scopes = ScopeTable::new(vec![FieldDescriptor::scalar(Variable::new("g"))]);
        let local = scopes.add_scope(
            scopes.global_scope(),
            ScopeType::Local,
            vec![FieldDescriptor::scalar(Variable::new("x")), FieldDescriptor::scalar(Variable::new("y"))]
        );
        (scopes, local)
    }

    #[test]
    fn test_removes_overwritten1() {
        let (scopes, local) = scopes();
        let ir = procedure(
            vec![
                construction::assignment(Location::scalar("x"), NativeExpression::int(1), local),
                construction::assignment(Location::scalar("x"), NativeExpression::int(2), local),
                construction::assignment(Location::scalar("g"), NativeExpression::scalar("x"), local)
            ],
            scopes,
            local
        );

        let ir = DeadCodeEliminator.optimized(ir, &mut CompilationContext::new());
        println!("{}", ir);

        let statements = ir.statements()
            .into_iter()
            .map(|(_, statement)| statement.to_string())
            .collect::<Vec<_>>();
        assert_eq!(2, statements.len());
        assert!(statements[0].contains("x = 2"));
        assert!(statements[1].contains("g = x"));
    }

    #[test]
    fn test_keeps_calls_and_globals1() {
        let (scopes, local) = scopes();
        let ir = procedure(
            vec![
                construction::assignment(Location::scalar("y"), NativeExpression::call("f", vec![]), local),
                construction::assignment(Location::scalar("g"), NativeExpression::int(3), local),
                construction::statement(Statement::Return(None), local)
            ],
            scopes,
            local
        );

        let ir = DeadCodeEliminator.optimized(ir, &mut CompilationContext::new());
        assert_eq!(3, ir.statements().len());
    }
}
