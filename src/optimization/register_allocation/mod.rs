use std::collections::{BTreeMap, BTreeSet, HashSet};

use iced_x86::Register;
use tracing::debug;

use crate::analysis::liveness::live_variables;
use crate::graph::NodeId;
use crate::ir::ProcedureIr;
use crate::model::{ScopeType, ScopedVariable};

pub mod graph_coloring;

use graph_coloring::{ColoringError, InterferenceGraph};

pub type AllocationResult<T> = Result<T, ColoringError>;

lazy_static! {
    static ref DEFAULT_REGISTERS: Vec<Register> = {
        vec![
            Register::RAX,
            Register::RCX,
            Register::RDX,
            Register::RSI,
            Register::RDI,
            Register::R8,
            Register::R9,
            Register::R10,
            Register::R11
        ]
    };
}

/// The nodes at whose exit a local scalar is live, together with the nodes that assign it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LiveRange {
    pub variable: ScopedVariable,
    pub nodes: BTreeSet<NodeId>
}

impl LiveRange {
    pub fn conflicts_with(&self, other: &LiveRange) -> bool {
        !self.nodes.is_disjoint(&other.nodes)
    }
}

pub struct Settings {
    pub registers: Vec<Register>
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            registers: DEFAULT_REGISTERS.clone()
        }
    }
}

#[derive(Debug, Clone)]
pub struct AllocatedRegister {
    pub register: Register,
    pub live_range: LiveRange
}

/// Registers assigned to local scalars. Variables without an entry live in memory.
pub struct RegisterAllocation {
    registers: BTreeMap<ScopedVariable, AllocatedRegister>
}

impl RegisterAllocation {
    pub fn new(allocated: Vec<(LiveRange, Register)>) -> RegisterAllocation {
        let mut registers = BTreeMap::new();
        for (live_range, register) in allocated {
            registers.insert(live_range.variable.clone(), AllocatedRegister { register, live_range });
        }

        RegisterAllocation {
            registers
        }
    }

    /// Number of distinct hardware registers in use.
    pub fn num_allocated_registers(&self) -> usize {
        self.registers.values()
            .map(|allocated| allocated.register)
            .collect::<HashSet<_>>()
            .len()
    }

    pub fn num_allocated_variables(&self) -> usize {
        self.registers.len()
    }

    pub fn get_register(&self, variable: &ScopedVariable) -> Option<Register> {
        self.registers.get(variable).map(|allocated| allocated.register)
    }

    pub fn allocated(&self) -> impl Iterator<Item=(&ScopedVariable, &AllocatedRegister)> {
        self.registers.iter()
    }

    pub fn alive_registers_at(&self, node: NodeId) -> Vec<(ScopedVariable, Register)> {
        self.registers
            .iter()
            .filter(|(_, allocated)| allocated.live_range.nodes.contains(&node))
            .map(|(variable, allocated)| (variable.clone(), allocated.register))
            .collect()
    }
}

/// Live ranges of the scalars declared in local scopes, ordered by variable.
/// An assignment belongs to its target's range even when the value is never read, since the
/// write still clobbers the register.
pub fn compute_live_ranges(ir: &ProcedureIr) -> Vec<LiveRange> {
    let liveness = live_variables(ir.graph.graph(), &ir.scopes);
    let is_register_candidate = |variable: &ScopedVariable| {
        ir.scopes.scope_type(variable.scope) == ScopeType::Local && !variable.is_array(&ir.scopes)
    };

    let mut ranges = BTreeMap::new();
    for node in ir.graph.nodes() {
        let assigned = ir.graph.value(node).and_then(|statement| statement.assigned_scalar(&ir.scopes));
        for variable in liveness.in_set(node).iter().chain(assigned.iter()) {
            if !is_register_candidate(variable) {
                continue;
            }

            ranges.entry(variable.clone())
                .or_insert_with(BTreeSet::new)
                .insert(node);
        }
    }

    ranges.into_iter()
        .map(|(variable, nodes)| LiveRange { variable, nodes })
        .collect()
}

/// Colors the interference graph of the procedure's local scalars with the configured registers.
pub fn allocate(ir: &ProcedureIr, settings: &Settings) -> AllocationResult<RegisterAllocation> {
    let live_ranges = compute_live_ranges(ir);
    let interference = InterferenceGraph::new(&live_ranges);
    let colors = interference.color(settings.registers.len())?;

    debug!(
        "allocated {} live ranges of {} to {} registers",
        live_ranges.len(),
        ir.name,
        colors.iter().collect::<BTreeSet<_>>().len()
    );

    Ok(RegisterAllocation::new(
        live_ranges.into_iter()
            .zip(colors)
            .map(|(live_range, color)| (live_range, settings.registers[color]))
            .collect()
    ))
}

#[cfg(test)]
fn print_allocation(ir: &ProcedureIr, live_ranges: &[LiveRange], allocation: &RegisterAllocation) {
    println!("{}", ir);

    for live_range in live_ranges {
        println!("{}: {:?}", live_range.variable, live_range.nodes);
    }

    println!();

    for (variable, allocated) in allocation.allocated() {
        println!("{}: {:?}", variable, allocated.register);
    }
}

#[cfg(test)]
fn clique_procedure() -> ProcedureIr {
    use crate::construction;
    use crate::model::{BinaryOperator, FieldDescriptor, Location, NativeExpression, ScopeTable, Variable};

    let mut scopes = ScopeTable::new(vec![FieldDescriptor::scalar(Variable::new("out"))]);
    let local = scopes.add_scope(
        scopes.global_scope(),
        ScopeType::Local,
        vec![
            FieldDescriptor::scalar(Variable::new("a")),
            FieldDescriptor::scalar(Variable::new("b")),
            FieldDescriptor::scalar(Variable::new("c"))
        ]
    );

    let sum = NativeExpression::binary(
        BinaryOperator::Add,
        NativeExpression::binary(BinaryOperator::Add, NativeExpression::scalar("a"), NativeExpression::scalar("b")),
        NativeExpression::scalar("c")
    );

    let body = construction::block(vec![
        construction::assignment(Location::scalar("a"), NativeExpression::int(1), local),
        construction::assignment(Location::scalar("b"), NativeExpression::int(2), local),
        construction::assignment(Location::scalar("c"), NativeExpression::int(3), local),
        construction::assignment(Location::scalar("out"), sum, local)
    ]);

    ProcedureIr::new("clique", construction::procedure(body), scopes, local)
}

#[test]
fn test_allocate1() {
    let ir = clique_procedure();
    let live_ranges = compute_live_ranges(&ir);
    let allocation = allocate(&ir, &Settings::default()).unwrap();

    print_allocation(&ir, &live_ranges, &allocation);
    assert_eq!(3, live_ranges.len());
    assert_eq!(3, allocation.num_allocated_registers());
    assert_eq!(3, allocation.num_allocated_variables());
}

#[test]
fn test_allocate2() {
    let ir = clique_procedure();
    let result = allocate(&ir, &Settings { registers: vec![Register::RAX, Register::RCX] });

    assert_eq!(
        Some(ColoringError::Uncolorable { remaining: 3, palette_size: 2 }),
        result.err()
    );
}

#[test]
fn test_allocate3() {
    let ir = clique_procedure();
    let allocation = allocate(&ir, &Settings { registers: vec![Register::R8, Register::R9, Register::R10] }).unwrap();
    let a = ScopedVariable::resolve(&crate::model::Variable::new("a"), ir.scope, &ir.scopes);
    let out = ScopedVariable::resolve(&crate::model::Variable::new("out"), ir.scope, &ir.scopes);

    assert!(allocation.get_register(&a).is_some());
    assert_eq!(None, allocation.get_register(&out));

    let registers = allocation.allocated()
        .map(|(_, allocated)| allocated.register)
        .collect::<HashSet<_>>();
    assert_eq!(3, registers.len());
}
