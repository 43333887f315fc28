use tracing_subscriber::EnvFilter;

use flowopt::construction;
use flowopt::context::CompilationContext;
use flowopt::ir::ProcedureIr;
use flowopt::model::{
    Assignment,
    AssignmentOperation,
    BinaryOperator,
    CallArgument,
    FieldDescriptor,
    Location,
    MethodCall,
    NativeExpression,
    ScopeTable,
    ScopeType,
    Statement,
    Variable
};
use flowopt::optimization::{compile_procedure, Settings};

fn scalars(names: &[&str]) -> Vec<FieldDescriptor> {
    names.iter().map(|name| FieldDescriptor::scalar(Variable::new(name))).collect()
}

fn binary(operator: BinaryOperator, left: NativeExpression, right: NativeExpression) -> NativeExpression {
    NativeExpression::binary(operator, left, right)
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut context = CompilationContext::new();
    let mut scopes = ScopeTable::new(scalars(&["result"]));
    let parameters = scopes.add_scope(scopes.global_scope(), ScopeType::Parameter, scalars(&["n"]));
    let local = scopes.add_scope(parameters, ScopeType::Local, scalars(&["a", "b", "i", "sum", "unused"]));

    let a_plus_b = || binary(BinaryOperator::Add, NativeExpression::scalar("a"), NativeExpression::scalar("b"));

    let loop_body = construction::block(vec![
        construction::statement(
            Statement::Assignment(Assignment::new(
                Location::scalar("sum"),
                AssignmentOperation::PlusEquals,
                binary(BinaryOperator::Mul, a_plus_b(), NativeExpression::scalar("i"))
            )),
            local
        ),
        construction::if_statement(
            binary(BinaryOperator::Greater, NativeExpression::scalar("sum"), NativeExpression::int(100)),
            local,
            construction::break_statement(),
            None
        )
    ]);

    let message = context.intern_string("result: %d\n");
    let print = MethodCall::new(
        "printf",
        vec![
            CallArgument::StringLiteral(message),
            CallArgument::Expression(NativeExpression::scalar("result"))
        ]
    );

    let body = construction::block(vec![
        construction::assignment(Location::scalar("a"), NativeExpression::int(4), local),
        construction::assignment(
            Location::scalar("b"),
            binary(BinaryOperator::Mul, NativeExpression::scalar("n"), NativeExpression::int(2)),
            local
        ),
        construction::assignment(Location::scalar("unused"), a_plus_b(), local),
        construction::assignment(Location::scalar("sum"), NativeExpression::int(0), local),
        construction::for_loop(
            Location::scalar("i"),
            NativeExpression::int(0),
            NativeExpression::scalar("n"),
            local,
            &mut scopes,
            loop_body
        ),
        construction::assignment(
            Location::scalar("result"),
            binary(
                BinaryOperator::Add,
                binary(BinaryOperator::Mul, a_plus_b(), NativeExpression::int(3)),
                NativeExpression::scalar("sum")
            ),
            local
        ),
        construction::statement(Statement::call(print), local),
        construction::return_statement(Some(NativeExpression::scalar("sum")), local)
    ]);

    let ir = ProcedureIr::new("accumulate", construction::procedure(body), scopes, local);
    println!("{}", ir);

    match compile_procedure(ir, &mut context, &Settings::default()) {
        Ok(compiled) => {
            println!("{}", compiled.ir);

            for (variable, allocated) in compiled.allocation.allocated() {
                println!("{} -> {:?}", variable, allocated.register);
            }

            for (id, text) in context.string_literals() {
                println!("string {}: {:?}", id.0, text);
            }
        }
        Err(error) => {
            eprintln!("register allocation failed: {}", error);
            std::process::exit(1);
        }
    }
}
