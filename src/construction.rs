//! Assembles procedure graphs from per-construct fragments. Every fragment is a
//! [`BcrFlowGraph`]; nested fragments are spliced into the enclosing one by linking their
//! break, continue and return terminals to the targets of the enclosing construct.

use crate::graph::{BcrFlowGraph, BcrFlowGraphBuilder, JumpType, NodeId};
use crate::model::{
    Assignment,
    AssignmentOperation,
    BinaryOperator,
    FieldDescriptor,
    Location,
    NativeExpression,
    ScopeId,
    ScopeTable,
    ScopeType,
    ScopedStatement,
    Statement,
    Variable
};

pub type Fragment = BcrFlowGraph<ScopedStatement>;

const WHILE_MAX_REPETITIONS: &str = "while_max_repetitions";
const FOR_RANGE_END: &str = "for_range_end";

pub fn statement(statement: Statement, scope: ScopeId) -> Fragment {
    let mut builder = BcrFlowGraphBuilder::new();
    builder.append(ScopedStatement::new(statement, scope));
    builder.build()
}

pub fn assignment(location: Location, expression: NativeExpression, scope: ScopeId) -> Fragment {
    statement(Statement::Assignment(Assignment::set(location, expression)), scope)
}

/// Runs the fragments in order. Their terminals escape to the terminals of the block.
pub fn block(parts: Vec<Fragment>) -> Fragment {
    let mut builder = BcrFlowGraphBuilder::new();
    for part in &parts {
        let mapping = builder.copy_in_escaping(part);
        builder.append_node(mapping[&part.start()]);
        builder.set_end(mapping[&part.end()]);
    }

    builder.build()
}

pub fn break_statement() -> Fragment {
    let builder = BcrFlowGraphBuilder::<ScopedStatement>::new();
    let terminal = builder.break_terminal();
    escape_to(builder, terminal)
}

pub fn continue_statement() -> Fragment {
    let builder = BcrFlowGraphBuilder::<ScopedStatement>::new();
    let terminal = builder.continue_terminal();
    escape_to(builder, terminal)
}

pub fn return_statement(value: Option<NativeExpression>, scope: ScopeId) -> Fragment {
    let mut builder = BcrFlowGraphBuilder::new();
    builder.append(ScopedStatement::new(Statement::Return(value), scope));
    let terminal = builder.return_terminal();
    escape_to(builder, terminal)
}

fn escape_to(mut builder: BcrFlowGraphBuilder<ScopedStatement>, terminal: NodeId) -> Fragment {
    let current = builder.end();
    builder.link(current, terminal);

    // Whatever follows the escape is unreachable.
    let unreachable = builder.add_nop();
    builder.set_end(unreachable);
    builder.build()
}

/// `compare condition; branch` jumping to `then` when the condition holds.
pub fn if_statement(condition: NativeExpression, scope: ScopeId, then: Fragment, otherwise: Option<Fragment>) -> Fragment {
    let mut builder = BcrFlowGraphBuilder::new();
    builder.append(ScopedStatement::new(Statement::Compare(condition), scope));
    let branch = builder.append(ScopedStatement::new(Statement::BranchSource, scope));

    let then_mapping = builder.copy_in_escaping(&then);
    builder.link_jump_branch(branch, then_mapping[&then.start()], JumpType::Jne);

    let else_end = match &otherwise {
        Some(otherwise) => {
            let else_mapping = builder.copy_in_escaping(otherwise);
            builder.link_non_jump_branch(branch, else_mapping[&otherwise.start()]);
            else_mapping[&otherwise.end()]
        }
        None => {
            let nop = builder.add_nop();
            builder.link_non_jump_branch(branch, nop);
            nop
        }
    };

    builder.set_end_to_sink_for(then_mapping[&then.end()], else_end);
    builder.build()
}

pub fn while_loop(condition: NativeExpression, scope: ScopeId, body: Fragment) -> Fragment {
    let mut builder = BcrFlowGraphBuilder::new();
    let loop_start = builder.append_nop();
    builder.append(ScopedStatement::new(Statement::Compare(condition), scope));
    let branch = builder.append(ScopedStatement::new(Statement::BranchSource, scope));
    let exit = builder.add_nop();

    let return_terminal = builder.return_terminal();
    let body_mapping = builder.copy_in_attached(&body, exit, loop_start, return_terminal);
    builder.link_jump_branch(branch, body_mapping[&body.start()], JumpType::Jne);
    builder.link_non_jump_branch(branch, exit);
    builder.link(body_mapping[&body.end()], loop_start);

    builder.set_end(exit);
    builder.build()
}

/// A while loop that also stops after `max_repetitions` iterations, counted in a compiler
/// variable declared in a new scope.
pub fn bounded_while_loop(condition: NativeExpression,
                          max_repetitions: NativeExpression,
                          scope: ScopeId,
                          scopes: &mut ScopeTable,
                          body: Fragment) -> Fragment {
    let counter = Variable::compiler(WHILE_MAX_REPETITIONS);
    let loop_scope = scopes.add_scope(scope, ScopeType::Local, vec![FieldDescriptor::scalar(counter.clone())]);
    let counter_location = Location::Scalar(counter.clone());

    let mut builder = BcrFlowGraphBuilder::new();
    builder.append(ScopedStatement::new(
        Statement::Assignment(Assignment::compiler(counter_location.clone(), NativeExpression::int(0))),
        loop_scope
    ));

    let loop_start = builder.append_nop();
    let below_limit = NativeExpression::binary(BinaryOperator::Less, NativeExpression::variable(&counter), max_repetitions);
    builder.append(ScopedStatement::new(Statement::Compare(below_limit), loop_scope));
    let limit_branch = builder.append(ScopedStatement::new(Statement::BranchSource, loop_scope));

    let compare = builder.add_node(ScopedStatement::new(Statement::Compare(condition), scope));
    let branch = builder.add_node(ScopedStatement::new(Statement::BranchSource, scope));
    builder.link(compare, branch);

    let exit = builder.add_nop();
    builder.link_jump_branch(limit_branch, compare, JumpType::Jne);
    builder.link_non_jump_branch(limit_branch, exit);

    let increment_start = builder.add_nop();
    let increment = builder.add_node(ScopedStatement::new(
        Statement::Assignment(Assignment {
            location: counter_location,
            operation: AssignmentOperation::PlusEquals,
            expression: NativeExpression::int(1),
            from_compiler: true
        }),
        loop_scope
    ));
    builder.link(increment_start, increment);
    builder.link(increment, loop_start);

    let return_terminal = builder.return_terminal();
    let body_mapping = builder.copy_in_attached(&body, exit, increment_start, return_terminal);
    builder.link_jump_branch(branch, body_mapping[&body.start()], JumpType::Jne);
    builder.link_non_jump_branch(branch, exit);
    builder.link(body_mapping[&body.end()], increment_start);

    builder.set_end(exit);
    builder.build()
}

/// `for (variable = range_start, range_end) body`, counting up by one. The range end is
/// evaluated once into a compiler variable declared in a new scope.
pub fn for_loop(variable: Location,
                range_start: NativeExpression,
                range_end: NativeExpression,
                scope: ScopeId,
                scopes: &mut ScopeTable,
                body: Fragment) -> Fragment {
    let end_variable = Variable::compiler(FOR_RANGE_END);
    let loop_scope = scopes.add_scope(scope, ScopeType::Local, vec![FieldDescriptor::scalar(end_variable.clone())]);

    let mut builder = BcrFlowGraphBuilder::new();
    builder.append(ScopedStatement::new(
        Statement::Assignment(Assignment::compiler(variable.clone(), range_start)),
        scope
    ));
    builder.append(ScopedStatement::new(
        Statement::Assignment(Assignment::compiler(Location::Scalar(end_variable.clone()), range_end)),
        loop_scope
    ));

    let loop_start = builder.append_nop();
    let comparison = NativeExpression::binary(
        BinaryOperator::Less,
        NativeExpression::Location(variable.clone()),
        NativeExpression::variable(&end_variable)
    );
    builder.append(ScopedStatement::new(Statement::Compare(comparison), loop_scope));
    let branch = builder.append(ScopedStatement::new(Statement::BranchSource, loop_scope));
    let exit = builder.add_nop();

    let increment_start = builder.add_nop();
    let increment = builder.add_node(ScopedStatement::new(
        Statement::Assignment(Assignment {
            location: variable,
            operation: AssignmentOperation::PlusEquals,
            expression: NativeExpression::int(1),
            from_compiler: true
        }),
        scope
    ));
    builder.link(increment_start, increment);
    builder.link(increment, loop_start);

    let return_terminal = builder.return_terminal();
    let body_mapping = builder.copy_in_attached(&body, exit, increment_start, return_terminal);
    builder.link_jump_branch(branch, body_mapping[&body.start()], JumpType::Jne);
    builder.link_non_jump_branch(branch, exit);
    builder.link(body_mapping[&body.end()], increment_start);

    builder.set_end(exit);
    builder.build()
}

/// Closes a procedure body: falling off the end and every return reach a single end node.
pub fn procedure(body: Fragment) -> Fragment {
    if body.is_terminal_used(body.break_terminal()) || body.is_terminal_used(body.continue_terminal()) {
        panic!("break or continue outside of a loop");
    }

    let mut builder = BcrFlowGraphBuilder::new();
    let mapping = builder.copy_in(body.graph());
    builder.append_node(mapping[&body.start()]);

    let exit = builder.add_nop();
    builder.link(mapping[&body.end()], exit);
    if body.is_terminal_used(body.return_terminal()) {
        builder.link(mapping[&body.return_terminal()], exit);
    }

    builder.set_end(exit);
    builder.build()
}

#[cfg(test)]
fn scopes_with_locals(names: &[&str]) -> (ScopeTable, ScopeId) {
    let mut scopes = ScopeTable::new(vec![]);
    let parameters = scopes.add_scope(scopes.global_scope(), ScopeType::Parameter, vec![]);
    let local = scopes.add_scope(
        parameters,
        ScopeType::Local,
        names.iter().map(|name| FieldDescriptor::scalar(Variable::new(name))).collect()
    );
    (scopes, local)
}

#[test]
fn test_if_else1() {
    let (_, scope) = scopes_with_locals(&["x"]);
    let graph = procedure(if_statement(
        NativeExpression::boolean(true),
        scope,
        assignment(Location::scalar("x"), NativeExpression::int(1), scope),
        Some(assignment(Location::scalar("x"), NativeExpression::int(2), scope))
    ));

    println!("{}", graph);
    let branch = graph.nodes()
        .into_iter()
        .find(|node| graph.is_branch(*node))
        .unwrap();

    assert_eq!(Some(&Statement::BranchSource), graph.value(branch).map(|statement| &statement.statement));
    assert_eq!(JumpType::Jne, graph.jump_type(branch));
    assert!(graph.reachable_from(graph.start()).contains(&graph.end()));
}

#[test]
fn test_loop_break_and_return1() {
    let (mut scopes, scope) = scopes_with_locals(&["x"]);
    let body = block(vec![
        assignment(Location::scalar("x"), NativeExpression::int(1), scope),
        if_statement(NativeExpression::scalar("x"), scope, break_statement(), None),
        if_statement(NativeExpression::boolean(false), scope, return_statement(Some(NativeExpression::int(0)), scope), None),
        continue_statement()
    ]);

    let graph = procedure(for_loop(
        Location::scalar("x"),
        NativeExpression::int(0),
        NativeExpression::int(10),
        scope,
        &mut scopes,
        body
    ));

    println!("{}", graph);
    let reachable = graph.reachable_from(graph.start());
    assert!(reachable.contains(&graph.end()));

    let returns = graph.nodes()
        .into_iter()
        .filter(|node| match graph.value(*node) {
            Some(ScopedStatement { statement: Statement::Return(_), .. }) => true,
            _ => false
        })
        .collect::<Vec<_>>();
    assert_eq!(1, returns.len());
    assert!(graph.reachable_from(returns[0]).contains(&graph.end()));
    assert!(!graph.is_terminal_used(graph.return_terminal()));
}

#[test]
#[should_panic]
fn test_break_outside_loop1() {
    procedure(block(vec![break_statement()]));
}
