use std::fmt;

use crate::graph::{BcrFlowGraph, NodeId};
use crate::model::{ScopeId, ScopeTable, ScopedStatement};

/// One procedure as seen by the analyses and optimizers: its flow graph, the scopes its
/// statements refer to and its outermost local scope.
#[derive(Debug, Clone)]
pub struct ProcedureIr {
    pub name: String,
    pub graph: BcrFlowGraph<ScopedStatement>,
    pub scopes: ScopeTable,
    pub scope: ScopeId
}

impl ProcedureIr {
    pub fn new(name: &str, graph: BcrFlowGraph<ScopedStatement>, scopes: ScopeTable, scope: ScopeId) -> ProcedureIr {
        ProcedureIr {
            name: name.to_owned(),
            graph,
            scopes,
            scope
        }
    }

    pub fn with_graph(self, graph: BcrFlowGraph<ScopedStatement>) -> ProcedureIr {
        ProcedureIr {
            graph,
            ..self
        }
    }

    /// The same procedure with its fall-through no-op nodes bypassed.
    pub fn without_nops(self) -> ProcedureIr {
        let mut builder = self.graph.to_builder();
        if builder.remove_nops() == 0 {
            return self;
        }

        let graph = builder.build();
        self.with_graph(graph)
    }

    /// The nodes holding a statement, in ascending order.
    pub fn statements(&self) -> Vec<(NodeId, &ScopedStatement)> {
        self.graph
            .nodes()
            .into_iter()
            .filter_map(|node| self.graph.value(node).map(|statement| (node, statement)))
            .collect()
    }
}

impl fmt::Display for ProcedureIr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "procedure {}:", self.name)?;
        write!(f, "{}", self.graph)
    }
}
