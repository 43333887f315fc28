use proptest::prelude::*;

use crate::analysis::availability::AvailabilitySpec;
use crate::analysis::dataflow::DataFlowAnalyzer;
use crate::analysis::liveness::LivenessSpec;
use crate::analysis::reaching_definitions::ReachingDefinitionsSpec;
use crate::construction::{self, Fragment};
use crate::context::CompilationContext;
use crate::graph::{FlowGraph, FlowGraphBuilder, JumpType, NodeId};
use crate::ir::ProcedureIr;
use crate::model::{
    Assignment,
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
use crate::optimization::constant_propagation::ConstantPropagator;
use crate::optimization::dead_code::DeadCodeEliminator;
use crate::optimization::register_allocation::graph_coloring::{ColoringError, InterferenceGraph};
use crate::optimization::{compile_procedure, optimize, DataFlowOptimizer, Settings};

const TARGETS: [&str; 5] = ["a", "b", "c", "d", "g"];
const READABLE: [&str; 6] = ["a", "b", "c", "d", "g", "p"];

#[derive(Debug, Clone)]
enum Shape {
    Assign { target: usize, value: NativeExpression },
    Branch { condition: NativeExpression, target: usize, value: NativeExpression, otherwise: Option<NativeExpression> },
    Loop { condition: NativeExpression, target: usize, value: NativeExpression, early_exit: Option<NativeExpression> },
    Call { argument: NativeExpression }
}

fn operator() -> impl Strategy<Value = BinaryOperator> {
    prop_oneof![
        Just(BinaryOperator::Add),
        Just(BinaryOperator::Sub),
        Just(BinaryOperator::Mul),
        Just(BinaryOperator::Less),
        Just(BinaryOperator::And)
    ]
}

fn expression() -> impl Strategy<Value = NativeExpression> {
    let leaf = prop_oneof![
        (0..READABLE.len()).prop_map(|index| NativeExpression::scalar(READABLE[index])),
        (0..4i64).prop_map(NativeExpression::int)
    ];

    leaf.prop_recursive(3, 12, 2, |inner| {
        (operator(), inner.clone(), inner)
            .prop_map(|(operator, left, right)| NativeExpression::binary(operator, left, right))
    })
}

fn shape() -> impl Strategy<Value = Shape> {
    let target = 0..TARGETS.len();
    prop_oneof![
        (target.clone(), expression())
            .prop_map(|(target, value)| Shape::Assign { target, value }),
        (expression(), target.clone(), expression(), proptest::option::of(expression()))
            .prop_map(|(condition, target, value, otherwise)| Shape::Branch { condition, target, value, otherwise }),
        (expression(), target, expression(), proptest::option::of(expression()))
            .prop_map(|(condition, target, value, early_exit)| Shape::Loop { condition, target, value, early_exit }),
        expression().prop_map(|argument| Shape::Call { argument })
    ]
}

fn program() -> impl Strategy<Value = Vec<Shape>> {
    proptest::collection::vec(shape(), 1..8)
}

fn assign(target: usize, value: &NativeExpression, scope: ScopeId) -> Fragment {
    construction::assignment(Location::scalar(TARGETS[target]), value.clone(), scope)
}

fn scalars(names: &[&str]) -> Vec<FieldDescriptor> {
    names.iter().map(|name| FieldDescriptor::scalar(Variable::new(name))).collect()
}

fn build(program: &[Shape]) -> ProcedureIr {
    let mut scopes = ScopeTable::new(scalars(&["g"]));
    let parameters = scopes.add_scope(scopes.global_scope(), ScopeType::Parameter, scalars(&["p"]));
    let local = scopes.add_scope(parameters, ScopeType::Local, scalars(&["a", "b", "c", "d"]));

    let mut parts = program.iter()
        .map(|shape| match shape {
            Shape::Assign { target, value } => assign(*target, value, local),
            Shape::Branch { condition, target, value, otherwise } => {
                construction::if_statement(
                    condition.clone(),
                    local,
                    assign(*target, value, local),
                    otherwise.as_ref().map(|otherwise| assign(*target, otherwise, local))
                )
            }
            Shape::Loop { condition, target, value, early_exit } => {
                let mut body = vec![assign(*target, value, local)];
                if let Some(early_exit) = early_exit {
                    body.push(construction::if_statement(early_exit.clone(), local, construction::break_statement(), None));
                }

                construction::while_loop(condition.clone(), local, construction::block(body))
            }
            Shape::Call { argument } => {
                construction::statement(Statement::MethodCall(NativeExpression::call("sink", vec![argument.clone()])), local)
            }
        })
        .collect::<Vec<_>>();

    parts.push(construction::return_statement(Some(NativeExpression::scalar("a")), local));
    ProcedureIr::new("generated", construction::procedure(construction::block(parts)), scopes, local)
}

#[derive(Debug, Clone)]
enum Line {
    Assign { target: usize, value: NativeExpression },
    Call { argument: NativeExpression }
}

fn line() -> impl Strategy<Value = Line> {
    prop_oneof![
        3 => (0..TARGETS.len(), expression()).prop_map(|(target, value)| Line::Assign { target, value }),
        1 => expression().prop_map(|argument| Line::Call { argument })
    ]
}

/// A straight-line graph with a `BranchSource` in front of `lines[branch_at]`. With `jump_to`,
/// the branch source also jumps to `lines[jump_to]`; otherwise it falls through plainly.
/// Both variants number their nodes identically.
fn straight_line_graph(lines: &[Line],
                       branch_at: usize,
                       jump_to: Option<usize>,
                       scope: ScopeId) -> (FlowGraph<ScopedStatement>, Vec<NodeId>) {
    let mut builder = FlowGraphBuilder::new();
    let mut nodes = Vec::new();
    let mut branch_source = None;

    for (index, line) in lines.iter().enumerate() {
        if index == branch_at {
            branch_source = Some(builder.append(ScopedStatement::new(Statement::BranchSource, scope)));
        }

        let statement = match line {
            Line::Assign { target, value } => {
                Statement::Assignment(Assignment::set(Location::scalar(TARGETS[*target]), value.clone()))
            }
            Line::Call { argument } => Statement::MethodCall(NativeExpression::call("sink", vec![argument.clone()]))
        };

        let node = builder.add_node(ScopedStatement::new(statement, scope));
        match (branch_source, jump_to) {
            (Some(source), Some(_)) if index == branch_at => builder.link_non_jump_branch(source, node),
            _ => builder.link(builder.end(), node)
        }
        builder.set_end(node);
        nodes.push(node);
    }

    if let (Some(source), Some(jump_to)) = (branch_source, jump_to) {
        builder.link_jump_branch(source, nodes[jump_to], JumpType::Jne);
    }

    (builder.build(), nodes)
}

fn check_well_formed(graph: &FlowGraph<ScopedStatement>) -> Result<(), TestCaseError> {
    let nodes = graph.nodes();
    prop_assert!(nodes.contains(&graph.start()));
    prop_assert!(nodes.contains(&graph.end()));
    prop_assert!(graph.reachable_from(graph.start()).contains(&graph.end()));
    prop_assert!(graph.sinks(graph.end()).is_empty());

    for node in nodes {
        for sink in graph.sinks(node) {
            prop_assert!(graph.predecessors(sink).contains(&node), "{} -> {} has no back link", node, sink);
        }

        for predecessor in graph.predecessors(node) {
            prop_assert!(graph.sinks(*predecessor).contains(&node));
        }

        let is_branch_source = graph.value(node)
            .map(|statement| statement.statement == Statement::BranchSource)
            .unwrap_or(false);
        prop_assert_eq!(is_branch_source, graph.is_branch(node));
    }

    Ok(())
}

fn check_fixed_points(ir: &ProcedureIr) -> Result<(), TestCaseError> {
    let graph = ir.graph.graph();

    let reaching = DataFlowAnalyzer::new(ReachingDefinitionsSpec::new(&ir.scopes));
    prop_assert!(reaching.is_fixed_point(graph, &reaching.calculate(graph)));

    let liveness = DataFlowAnalyzer::new(LivenessSpec::new(&ir.scopes));
    prop_assert!(liveness.is_fixed_point(graph, &liveness.calculate(graph)));

    let availability = DataFlowAnalyzer::new(AvailabilitySpec::new(&ir.scopes));
    prop_assert!(availability.is_fixed_point(graph, &availability.calculate(graph)));

    Ok(())
}

proptest! {
    #[test]
    fn prop_analyses_reach_fixed_point(program in program()) {
        let ir = build(&program);
        check_well_formed(ir.graph.graph())?;
        check_fixed_points(&ir)?;
    }

    #[test]
    fn prop_analyses_are_deterministic(program in program()) {
        let ir = build(&program);
        let graph = ir.graph.graph();
        let liveness = DataFlowAnalyzer::new(LivenessSpec::new(&ir.scopes));
        let first = liveness.calculate(graph);
        let second = liveness.calculate(graph);

        prop_assert_eq!(first.iterations(), second.iterations());
        for node in graph.nodes() {
            prop_assert_eq!(first.in_set(node), second.in_set(node));
            prop_assert_eq!(first.out_set(node), second.out_set(node));
        }
    }

    #[test]
    fn prop_optimized_graph_is_well_formed(program in program()) {
        let optimized = optimize(build(&program), &mut CompilationContext::new(), &Settings::default());
        check_well_formed(optimized.graph.graph())?;
        check_fixed_points(&optimized)?;

        for (node, statement) in optimized.statements() {
            let expandable = statement.statement.expression().map(|expression| expression.is_expandable()).unwrap_or(false);
            prop_assert!(!expandable, "{}: {} is still expandable", node, statement);
        }
    }

    #[test]
    fn prop_passes_never_add_statements(program in program()) {
        let mut context = CompilationContext::new();
        let ir = build(&program);
        let before = ir.statements().len();

        let propagated = ConstantPropagator.optimized(ir, &mut context);
        prop_assert_eq!(before, propagated.statements().len());

        let eliminated = DeadCodeEliminator.optimized(propagated, &mut context);
        prop_assert!(eliminated.statements().len() <= before);
    }

    #[test]
    fn prop_coloring_is_proper(num_nodes in 0..12usize,
                               edges in proptest::collection::vec((0..12usize, 0..12usize), 0..30),
                               palette_size in 0..6usize) {
        let edges = edges.into_iter()
            .filter(|(first, second)| *first < num_nodes && *second < num_nodes)
            .collect::<Vec<_>>();
        let graph = InterferenceGraph::from_edges(num_nodes, &edges);
        let max_degree = (0..num_nodes).map(|node| graph.degree(node)).max().unwrap_or(0);

        match graph.color(palette_size) {
            Ok(colors) => {
                prop_assert_eq!(num_nodes, colors.len());
                for node in 0..num_nodes {
                    prop_assert!(colors[node] < palette_size);
                    for neighbour in graph.neighbours(node) {
                        prop_assert_ne!(colors[node], colors[*neighbour]);
                    }
                }
            }
            Err(ColoringError::Uncolorable { remaining, palette_size: reported }) => {
                prop_assert_eq!(palette_size, reported);
                prop_assert!(remaining > 0);
                prop_assert!(max_degree >= palette_size);
            }
        }
    }

    #[test]
    fn prop_allocation_respects_interference(program in program()) {
        let compiled = compile_procedure(build(&program), &mut CompilationContext::new(), &Settings::default());
        if let Ok(compiled) = compiled {
            let allocated = compiled.allocation.allocated().collect::<Vec<_>>();
            for (index, (first_variable, first)) in allocated.iter().enumerate() {
                prop_assert_eq!(Some(first.register), compiled.allocation.get_register(first_variable));
                for (_, second) in allocated.iter().skip(index + 1) {
                    if first.live_range.conflicts_with(&second.live_range) {
                        prop_assert_ne!(first.register, second.register);
                    }
                }
            }
        }
    }

    #[test]
    fn prop_analyses_are_monotone(lines in proptest::collection::vec(line(), 2..10),
                                  branch_at in 0..10usize,
                                  jump_to in 0..10usize) {
        let branch_at = branch_at % lines.len();
        let jump_to = jump_to % lines.len();
        prop_assume!(jump_to != branch_at);

        let mut scopes = ScopeTable::new(scalars(&["g"]));
        let parameters = scopes.add_scope(scopes.global_scope(), ScopeType::Parameter, scalars(&["p"]));
        let local = scopes.add_scope(parameters, ScopeType::Local, scalars(&["a", "b", "c", "d"]));

        let (fewer, nodes) = straight_line_graph(&lines, branch_at, None, local);
        let (more, _) = straight_line_graph(&lines, branch_at, Some(jump_to), local);
        prop_assert_eq!(fewer.nodes(), more.nodes());
        prop_assert_eq!(1, fewer.predecessors(nodes[jump_to]).len());
        prop_assert_eq!(2, more.predecessors(nodes[jump_to]).len());

        let reaching = DataFlowAnalyzer::new(ReachingDefinitionsSpec::new(&scopes));
        let (before, after) = (reaching.calculate(&fewer), reaching.calculate(&more));
        for node in fewer.nodes() {
            prop_assert!(before.in_set(node).is_subset(after.in_set(node)), "reaching definitions shrank at {}", node);
            prop_assert!(before.out_set(node).is_subset(after.out_set(node)));
        }

        let liveness = DataFlowAnalyzer::new(LivenessSpec::new(&scopes));
        let (before, after) = (liveness.calculate(&fewer), liveness.calculate(&more));
        for node in fewer.nodes() {
            prop_assert!(before.in_set(node).is_subset(after.in_set(node)), "liveness shrank at {}", node);
            prop_assert!(before.out_set(node).is_subset(after.out_set(node)));
        }

        let availability = DataFlowAnalyzer::new(AvailabilitySpec::new(&scopes));
        let (before, after) = (availability.calculate(&fewer), availability.calculate(&more));
        for node in fewer.nodes() {
            prop_assert!(after.in_set(node).is_subset(before.in_set(node)), "availability grew at {}", node);
            prop_assert!(after.out_set(node).is_subset(before.out_set(node)));
        }
    }
}
