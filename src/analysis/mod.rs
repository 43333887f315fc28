pub mod dataflow;
pub mod reaching_definitions;
pub mod liveness;
pub mod availability;
pub mod dominators;

pub use dataflow::{AnalysisSpec, Confluence, DataFlowAnalyzer, DataFlowResult};
pub use reaching_definitions::{reaching_definitions, ReachingDefinition, ReachingDefinitionsSpec};
pub use liveness::{live_variables, LivenessSpec};
pub use availability::{available_expressions, AvailabilitySpec};
pub use dominators::{dominator_tree, dominators, DominatorSpec};
