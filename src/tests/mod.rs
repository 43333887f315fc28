use iced_x86::Register;

use crate::analysis::liveness::live_variables;
use crate::analysis::reaching_definitions::{definitions_by_variable, reaching_definitions};
use crate::construction;
use crate::context::CompilationContext;
use crate::graph::{NodeId, Successors};
use crate::ir::ProcedureIr;
use crate::model::{
    BinaryOperator,
    FieldDescriptor,
    Location,
    NativeExpression,
    ScopeId,
    ScopeTable,
    ScopeType,
    ScopedVariable,
    Statement,
    Variable
};
use crate::optimization::register_allocation::graph_coloring::ColoringError;
use crate::optimization::{compile_procedure, optimize, register_allocation, Settings};

mod properties;

fn scalars(names: &[&str]) -> Vec<FieldDescriptor> {
    names.iter().map(|name| FieldDescriptor::scalar(Variable::new(name))).collect()
}

/// Globals `g` and `out`, parameter `p` and the given locals.
fn procedure_scopes(locals: &[&str]) -> (ScopeTable, ScopeId) {
    let mut scopes = ScopeTable::new(scalars(&["g", "out"]));
    let parameters = scopes.add_scope(scopes.global_scope(), ScopeType::Parameter, scalars(&["p"]));
    let local = scopes.add_scope(parameters, ScopeType::Local, scalars(locals));
    (scopes, local)
}

fn add(left: NativeExpression, right: NativeExpression) -> NativeExpression {
    NativeExpression::binary(BinaryOperator::Add, left, right)
}

fn scalar(name: &str) -> NativeExpression {
    NativeExpression::scalar(name)
}

fn node_of(ir: &ProcedureIr, text: &str) -> NodeId {
    ir.statements()
        .into_iter()
        .find(|(_, statement)| statement.statement.to_string() == text)
        .map(|(node, _)| node)
        .unwrap_or_else(|| panic!("no statement '{}' in\n{}", text, ir))
}

/// Statements of a procedure without branches, in execution order.
fn straight_line(ir: &ProcedureIr) -> Vec<String> {
    let mut texts = Vec::new();
    let mut current = ir.graph.start();
    loop {
        if let Some(statement) = ir.graph.value(current) {
            texts.push(statement.statement.to_string());
        }

        match ir.graph.successors(current) {
            Successors::Single(next) => current = *next,
            Successors::None => break,
            Successors::Branch { .. } => panic!("{} branches", current)
        }
    }

    texts
}

/// Settings running only the named passes.
fn only(names: &[&str]) -> Settings {
    Settings {
        expand_subexpressions: names.contains(&"see"),
        eliminate_common_expressions: names.contains(&"cse"),
        propagate_constants: names.contains(&"cp"),
        eliminate_dead_code: names.contains(&"dce"),
        ..Settings::default()
    }
}

#[test]
fn test_overwritten_definition1() {
    let (scopes, local) = procedure_scopes(&["x"]);
    let body = construction::block(vec![
        construction::assignment(Location::scalar("x"), NativeExpression::int(1), local),
        construction::assignment(Location::scalar("x"), NativeExpression::int(2), local),
        construction::assignment(Location::scalar("out"), scalar("x"), local)
    ]);
    let ir = ProcedureIr::new("overwritten", construction::procedure(body), scopes, local);

    let first = node_of(&ir, "x = 1");
    let second = node_of(&ir, "x = 2");
    let use_node = node_of(&ir, "out = x");
    let x = ScopedVariable::resolve(&Variable::new("x"), local, &ir.scopes);

    let reaching = reaching_definitions(ir.graph.graph(), &ir.scopes);
    let definitions = definitions_by_variable(reaching.in_set(use_node));
    assert_eq!(Some(&vec![second].into_iter().collect()), definitions.get(&x));

    let liveness = live_variables(ir.graph.graph(), &ir.scopes);
    assert!(!liveness.in_set(first).contains(&x));
    assert!(liveness.in_set(second).contains(&x));

    let optimized = optimize(ir, &mut CompilationContext::new(), &only(&["dce"]));
    assert_eq!(vec!["x = 2".to_owned(), "out = x".to_owned()], straight_line(&optimized));

    let nops = optimized.graph.graph().nodes()
        .into_iter()
        .filter(|node| !optimized.graph.has_value(*node))
        .filter(|node| *node != optimized.graph.start() && *node != optimized.graph.end())
        .count();
    assert_eq!(0, nops);
}

#[test]
fn test_constant_propagation_then_dead_code1() {
    let (scopes, local) = procedure_scopes(&["x"]);
    let body = construction::block(vec![
        construction::assignment(Location::scalar("x"), NativeExpression::int(5), local),
        construction::assignment(Location::scalar("out"), add(scalar("x"), NativeExpression::int(1)), local)
    ]);
    let ir = ProcedureIr::new("propagate", construction::procedure(body), scopes, local);

    let optimized = optimize(ir, &mut CompilationContext::new(), &only(&["cp", "dce"]));
    println!("{}", optimized);
    assert_eq!(vec!["out = 5 + 1".to_owned()], straight_line(&optimized));
}

#[test]
fn test_common_expression1() {
    let (scopes, local) = procedure_scopes(&["a", "b", "x", "y"]);
    let body = construction::block(vec![
        construction::assignment(Location::scalar("x"), add(scalar("a"), scalar("b")), local),
        construction::assignment(Location::scalar("y"), add(scalar("a"), scalar("b")), local),
        construction::assignment(Location::scalar("out"), add(scalar("x"), scalar("y")), local)
    ]);
    let ir = ProcedureIr::new("common", construction::procedure(body), scopes, local);

    let optimized = optimize(ir, &mut CompilationContext::new(), &only(&["cse"]));
    assert_eq!(
        vec![
            "%cse_temp0 = a + b".to_owned(),
            "x = %cse_temp0".to_owned(),
            "y = %cse_temp0".to_owned(),
            "%cse_temp1 = x + y".to_owned(),
            "out = %cse_temp1".to_owned()
        ],
        straight_line(&optimized)
    );
}

#[test]
fn test_call_kills_global_expression1() {
    let (scopes, local) = procedure_scopes(&["x", "y"]);
    let body = construction::block(vec![
        construction::assignment(Location::scalar("x"), add(scalar("g"), NativeExpression::int(1)), local),
        construction::statement(Statement::MethodCall(NativeExpression::call("touch", vec![])), local),
        construction::assignment(Location::scalar("y"), add(scalar("g"), NativeExpression::int(1)), local),
        construction::assignment(Location::scalar("out"), add(scalar("x"), scalar("y")), local)
    ]);
    let ir = ProcedureIr::new("call", construction::procedure(body), scopes, local);

    let optimized = optimize(ir, &mut CompilationContext::new(), &only(&["cse"]));
    let stores = straight_line(&optimized)
        .into_iter()
        .filter(|text| text == "%cse_temp0 = g + 1")
        .count();
    assert_eq!(2, stores);
}

#[test]
fn test_loop_carried_liveness1() {
    let (mut scopes, local) = procedure_scopes(&["i", "total"]);
    let body = construction::block(vec![
        construction::assignment(Location::scalar("total"), NativeExpression::int(0), local),
        construction::for_loop(
            Location::scalar("i"),
            NativeExpression::int(0),
            scalar("p"),
            local,
            &mut scopes,
            construction::assignment(Location::scalar("total"), add(scalar("total"), scalar("i")), local)
        ),
        construction::assignment(Location::scalar("out"), scalar("total"), local)
    ]);
    let ir = ProcedureIr::new("loop", construction::procedure(body), scopes, local);

    let total = ScopedVariable::resolve(&Variable::new("total"), local, &ir.scopes);
    let liveness = live_variables(ir.graph.graph(), &ir.scopes);
    let accumulate = node_of(&ir, "total = total + i");
    let initialize = node_of(&ir, "total = 0");
    assert!(liveness.in_set(accumulate).contains(&total));
    assert!(liveness.in_set(initialize).contains(&total));

    let optimized = optimize(ir, &mut CompilationContext::new(), &Settings::default());
    println!("{}", optimized);
    assert!(optimized.statements().iter().any(|(_, statement)| statement.statement.to_string() == "total = 0"));
}

#[test]
fn test_shadowed_constant1() {
    let (mut scopes, local) = procedure_scopes(&["x"]);
    let inner = scopes.add_scope(local, ScopeType::Local, scalars(&["x"]));
    let body = construction::block(vec![
        construction::assignment(Location::scalar("x"), scalar("p"), local),
        construction::assignment(Location::scalar("x"), NativeExpression::int(3), inner),
        construction::assignment(Location::scalar("g"), scalar("x"), inner),
        construction::assignment(Location::scalar("out"), scalar("x"), local)
    ]);
    let ir = ProcedureIr::new("shadow", construction::procedure(body), scopes, local);

    let optimized = optimize(ir, &mut CompilationContext::new(), &only(&["cp"]));
    assert_eq!(
        vec!["x = p".to_owned(), "x = 3".to_owned(), "g = 3".to_owned(), "out = x".to_owned()],
        straight_line(&optimized)
    );
}

#[test]
fn test_expand_then_eliminate1() {
    let (scopes, local) = procedure_scopes(&["a", "b", "c", "x", "y"]);
    let product = || NativeExpression::binary(BinaryOperator::Mul, scalar("b"), scalar("c"));
    let body = construction::block(vec![
        construction::assignment(Location::scalar("x"), add(scalar("a"), product()), local),
        construction::assignment(Location::scalar("y"), NativeExpression::binary(BinaryOperator::Sub, product(), scalar("a")), local),
        construction::assignment(Location::scalar("out"), add(scalar("x"), scalar("y")), local)
    ]);
    let ir = ProcedureIr::new("expand", construction::procedure(body), scopes, local);

    let optimized = optimize(ir, &mut CompilationContext::new(), &Settings::default());
    println!("{}", optimized);

    let multiplications = straight_line(&optimized)
        .into_iter()
        .filter(|text| text.ends_with("= b * c"))
        .count();
    assert_eq!(1, multiplications);

    for (_, statement) in optimized.statements() {
        let nested = statement.statement.expression().map(|expression| expression.is_nested()).unwrap_or(false);
        assert!(!nested, "{} is nested", statement);
    }
}

#[test]
fn test_clique_allocation1() {
    let clique = || {
        let (scopes, local) = procedure_scopes(&["a", "b", "c"]);
        let body = construction::block(vec![
            construction::assignment(Location::scalar("a"), scalar("p"), local),
            construction::assignment(Location::scalar("b"), scalar("g"), local),
            construction::assignment(Location::scalar("c"), add(scalar("p"), scalar("g")), local),
            construction::statement(
                Statement::MethodCall(NativeExpression::call("use3", vec![scalar("a"), scalar("b"), scalar("c")])),
                local
            )
        ]);
        ProcedureIr::new("clique", construction::procedure(body), scopes, local)
    };

    let settings = |registers: Vec<Register>| Settings {
        allocation: register_allocation::Settings { registers },
        ..only(&[])
    };

    let result = compile_procedure(clique(), &mut CompilationContext::new(), &settings(vec![Register::RAX, Register::RCX]));
    assert_eq!(
        Some(ColoringError::Uncolorable { remaining: 3, palette_size: 2 }),
        result.err()
    );

    let compiled = compile_procedure(
        clique(),
        &mut CompilationContext::new(),
        &settings(vec![Register::RAX, Register::RCX, Register::RDX])
    ).unwrap();

    assert_eq!(3, compiled.allocation.num_allocated_registers());
    let call = node_of(&compiled.ir, "use3(a, b, c)");
    let before_call = compiled.ir.graph.predecessors(call)[0];
    assert_eq!(3, compiled.allocation.alive_registers_at(before_call).len());
    assert!(compiled.allocation.alive_registers_at(call).is_empty());
}

#[test]
fn test_unread_call_result_allocation1() {
    let (scopes, local) = procedure_scopes(&["x", "y"]);
    let body = construction::block(vec![
        construction::assignment(Location::scalar("y"), scalar("p"), local),
        construction::assignment(Location::scalar("x"), NativeExpression::call("f", vec![]), local),
        construction::assignment(Location::scalar("out"), scalar("y"), local),
        construction::assignment(Location::scalar("x"), add(scalar("p"), scalar("g")), local),
        construction::assignment(Location::scalar("g"), scalar("x"), local)
    ]);
    let ir = ProcedureIr::new("clobber", construction::procedure(body), scopes, local);

    let compiled = compile_procedure(ir, &mut CompilationContext::new(), &only(&["dce"])).unwrap();
    println!("{}", compiled.ir);

    let x = ScopedVariable::resolve(&Variable::new("x"), local, &compiled.ir.scopes);
    let y = ScopedVariable::resolve(&Variable::new("y"), local, &compiled.ir.scopes);
    let call = node_of(&compiled.ir, "x = f()");

    assert!(compiled.allocation.get_register(&x).is_some());
    assert_ne!(compiled.allocation.get_register(&x), compiled.allocation.get_register(&y));

    let alive = compiled.allocation.alive_registers_at(call)
        .into_iter()
        .map(|(variable, _)| variable)
        .collect::<Vec<_>>();
    assert_eq!(vec![x, y], alive);
}

#[test]
fn test_default_pipeline1() {
    let (scopes, local) = procedure_scopes(&["x", "unused"]);
    let body = construction::block(vec![
        construction::assignment(Location::scalar("x"), NativeExpression::int(2), local),
        construction::assignment(Location::scalar("unused"), add(scalar("p"), scalar("x")), local),
        construction::return_statement(Some(add(scalar("x"), scalar("p"))), local)
    ]);
    let ir = ProcedureIr::new("pipeline", construction::procedure(body), scopes, local);

    let mut context = CompilationContext::new();
    let compiled = compile_procedure(ir, &mut context, &Settings::default()).unwrap();
    println!("{}", compiled.ir);

    let texts = compiled.ir.statements()
        .into_iter()
        .map(|(_, statement)| statement.statement.to_string())
        .collect::<Vec<_>>();
    assert!(texts.iter().all(|text| !text.starts_with("unused")));
    assert!(texts.iter().all(|text| !text.starts_with("x =")));
}
