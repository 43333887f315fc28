use tracing::{debug, info};

use crate::context::CompilationContext;
use crate::ir::ProcedureIr;

pub mod dead_code;
pub mod constant_propagation;
pub mod common_expression;
pub mod subexpression;
pub mod register_allocation;

use register_allocation::{AllocationResult, RegisterAllocation};

/// A pass that rewrites a procedure using dataflow facts computed on its current graph.
pub trait DataFlowOptimizer {
    fn name(&self) -> &'static str;

    fn optimized(&self, ir: ProcedureIr, context: &mut CompilationContext) -> ProcedureIr;
}

pub struct Settings {
    pub expand_subexpressions: bool,
    pub eliminate_common_expressions: bool,
    pub propagate_constants: bool,
    pub eliminate_dead_code: bool,
    /// Rounds of constant propagation followed by dead code elimination.
    pub rounds: usize,
    pub allocation: register_allocation::Settings
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            expand_subexpressions: true,
            eliminate_common_expressions: true,
            propagate_constants: true,
            eliminate_dead_code: true,
            rounds: 1,
            allocation: register_allocation::Settings::default()
        }
    }
}

pub fn run_optimizer(optimizer: &dyn DataFlowOptimizer, ir: ProcedureIr, context: &mut CompilationContext) -> ProcedureIr {
    let before = ir.statements().len();
    let ir = optimizer.optimized(ir, context);
    debug!("{} on {}: {} -> {} statements", optimizer.name(), ir.name, before, ir.statements().len());
    ir
}

/// Normalization and common subexpression elimination run once; each of them introduces
/// fresh temporaries. Constant propagation and dead code elimination then run `rounds` times.
/// The no-op nodes left behind by the rewrites are bypassed at the end.
pub fn optimize(ir: ProcedureIr, context: &mut CompilationContext, settings: &Settings) -> ProcedureIr {
    let mut ir = ir;

    if settings.expand_subexpressions {
        ir = run_optimizer(&subexpression::SubexpressionExpander, ir, context);
    }

    if settings.eliminate_common_expressions {
        ir = run_optimizer(&common_expression::CommonExpressionEliminator, ir, context);
    }

    for _ in 0..settings.rounds {
        if settings.propagate_constants {
            ir = run_optimizer(&constant_propagation::ConstantPropagator, ir, context);
        }

        if settings.eliminate_dead_code {
            ir = run_optimizer(&dead_code::DeadCodeEliminator, ir, context);
        }
    }

    ir.without_nops()
}

pub struct CompiledProcedure {
    pub ir: ProcedureIr,
    pub allocation: RegisterAllocation
}

/// Optimizes the procedure and assigns registers to its local scalars.
pub fn compile_procedure(ir: ProcedureIr,
                         context: &mut CompilationContext,
                         settings: &Settings) -> AllocationResult<CompiledProcedure> {
    let ir = optimize(ir, context, settings);
    let allocation = register_allocation::allocate(&ir, &settings.allocation)?;
    info!(
        "compiled {}: {} statements, {} variables in {} registers",
        ir.name,
        ir.statements().len(),
        allocation.num_allocated_variables(),
        allocation.num_allocated_registers()
    );

    Ok(CompiledProcedure {
        ir,
        allocation
    })
}
