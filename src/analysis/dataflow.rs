use std::collections::{BTreeSet, HashMap, HashSet};
use std::hash::Hash;

use tracing::debug;

use crate::graph::{FlowGraph, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confluence {
    Union,
    Intersection
}

/// Describes one dataflow analysis over graphs holding values of type `T`.
pub trait AnalysisSpec<T> {
    type Fact: Clone + Eq + Hash;

    fn is_forward(&self) -> bool;

    /// The facts the node contributes. `flowing_in` is the merged set arriving at the node
    /// in the direction of the analysis.
    fn gen_set(&self, graph: &FlowGraph<T>, node: NodeId, flowing_in: &HashSet<Self::Fact>) -> HashSet<Self::Fact>;

    fn must_kill(&self, graph: &FlowGraph<T>, node: NodeId, candidate: &Self::Fact) -> bool;

    fn confluence(&self) -> Confluence;

    /// If true, `OUT = GEN ∪ (IN − KILL)`, otherwise `OUT = (GEN ∪ IN) − KILL`.
    fn gens_immune_to_kills(&self) -> bool;

    /// Every fact the analysis can produce for the given nodes.
    fn universe(&self, graph: &FlowGraph<T>, nodes: &[NodeId]) -> HashSet<Self::Fact> {
        let nothing = HashSet::new();
        nodes.iter()
            .flat_map(|node| self.gen_set(graph, *node, &nothing))
            .collect()
    }

    fn apply_confluence_operator(&self,
                                 inputs: &[&HashSet<Self::Fact>],
                                 universe: &HashSet<Self::Fact>) -> HashSet<Self::Fact> {
        match self.confluence() {
            Confluence::Union => {
                let mut merged = HashSet::new();
                for input in inputs {
                    merged.extend(input.iter().cloned());
                }
                merged
            }
            Confluence::Intersection => {
                match inputs.split_first() {
                    None => universe.clone(),
                    Some((first, rest)) => {
                        first.iter()
                            .filter(|fact| rest.iter().all(|input| input.contains(*fact)))
                            .cloned()
                            .collect()
                    }
                }
            }
        }
    }
}

/// Fact sets per node. For backward analyses IN is the set merged from the successors.
#[derive(Debug, Clone)]
pub struct DataFlowResult<F> {
    in_sets: HashMap<NodeId, HashSet<F>>,
    out_sets: HashMap<NodeId, HashSet<F>>,
    iterations: usize,
    empty: HashSet<F>
}

impl<F: Eq + Hash> DataFlowResult<F> {
    /// The IN set of the node, empty for nodes outside the analyzed graph.
    pub fn in_set(&self, node: NodeId) -> &HashSet<F> {
        self.in_sets.get(&node).unwrap_or(&self.empty)
    }

    pub fn out_set(&self, node: NodeId) -> &HashSet<F> {
        self.out_sets.get(&node).unwrap_or(&self.empty)
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }
}

pub struct DataFlowAnalyzer<S> {
    spec: S
}

impl<S> DataFlowAnalyzer<S> {
    pub fn new(spec: S) -> DataFlowAnalyzer<S> {
        DataFlowAnalyzer {
            spec
        }
    }

    fn entry<T>(&self, graph: &FlowGraph<T>) -> NodeId where S: AnalysisSpec<T> {
        if self.spec.is_forward() {
            graph.start()
        } else {
            graph.end()
        }
    }

    fn sources<T>(&self, graph: &FlowGraph<T>, node: NodeId) -> Vec<NodeId> where S: AnalysisSpec<T> {
        if self.spec.is_forward() {
            graph.predecessors(node).to_vec()
        } else {
            graph.sinks(node)
        }
    }

    fn sinks<T>(&self, graph: &FlowGraph<T>, node: NodeId) -> Vec<NodeId> where S: AnalysisSpec<T> {
        if self.spec.is_forward() {
            graph.sinks(node)
        } else {
            graph.predecessors(node).to_vec()
        }
    }

    fn transfer<T>(&self,
                   graph: &FlowGraph<T>,
                   node: NodeId,
                   in_set: &HashSet<<S as AnalysisSpec<T>>::Fact>) -> HashSet<<S as AnalysisSpec<T>>::Fact> where S: AnalysisSpec<T> {
        let gen_set = self.spec.gen_set(graph, node, in_set);
        if self.spec.gens_immune_to_kills() {
            let mut out_set = in_set.iter()
                .filter(|fact| !self.spec.must_kill(graph, node, fact))
                .cloned()
                .collect::<HashSet<_>>();
            out_set.extend(gen_set);
            out_set
        } else {
            gen_set.iter()
                .chain(in_set.iter())
                .filter(|fact| !self.spec.must_kill(graph, node, fact))
                .cloned()
                .collect()
        }
    }

    /// Runs the worklist algorithm until no OUT set changes.
    pub fn calculate<T>(&self, graph: &FlowGraph<T>) -> DataFlowResult<<S as AnalysisSpec<T>>::Fact> where S: AnalysisSpec<T> {
        let nodes = graph.nodes();
        let entry = self.entry(graph);
        let universe = self.spec.universe(graph, &nodes);
        let initial = match self.spec.confluence() {
            Confluence::Union => HashSet::new(),
            Confluence::Intersection => universe.clone()
        };

        let mut in_sets = HashMap::new();
        let mut out_sets = HashMap::new();
        for node in &nodes {
            in_sets.insert(*node, initial.clone());
            out_sets.insert(*node, initial.clone());
        }

        let nothing = HashSet::new();
        in_sets.insert(entry, HashSet::new());
        out_sets.insert(entry, self.spec.gen_set(graph, entry, &nothing));

        let mut changed = nodes.iter()
            .cloned()
            .filter(|node| *node != entry)
            .collect::<BTreeSet<_>>();

        let mut iterations = 0;
        while let Some(node) = changed.iter().next().cloned() {
            changed.remove(&node);
            iterations += 1;

            let sources = self.sources(graph, node);
            let inputs = sources.iter()
                .map(|source| &out_sets[source])
                .collect::<Vec<_>>();
            let in_set = self.spec.apply_confluence_operator(&inputs, &universe);
            let out_set = self.transfer(graph, node, &in_set);
            in_sets.insert(node, in_set);

            if out_set != out_sets[&node] {
                out_sets.insert(node, out_set);
                for sink in self.sinks(graph, node) {
                    if sink != entry {
                        changed.insert(sink);
                    }
                }
            }
        }

        debug!("dataflow analysis over {} nodes converged after {} iterations", nodes.len(), iterations);

        DataFlowResult {
            in_sets,
            out_sets,
            iterations,
            empty: HashSet::new()
        }
    }

    /// Whether every node of `graph` satisfies its dataflow equations in `result`.
    pub fn is_fixed_point<T>(&self, graph: &FlowGraph<T>, result: &DataFlowResult<<S as AnalysisSpec<T>>::Fact>) -> bool where S: AnalysisSpec<T> {
        let nodes = graph.nodes();
        let entry = self.entry(graph);
        let universe = self.spec.universe(graph, &nodes);
        let nothing = HashSet::new();

        nodes.iter().all(|node| {
            if *node == entry {
                return result.in_set(entry).is_empty()
                    && result.out_set(entry) == &self.spec.gen_set(graph, entry, &nothing);
            }

            let sources = self.sources(graph, *node);
            let inputs = sources.iter()
                .map(|source| result.out_set(*source))
                .collect::<Vec<_>>();
            let in_set = self.spec.apply_confluence_operator(&inputs, &universe);
            let out_set = self.transfer(graph, *node, &in_set);
            &in_set == result.in_set(*node) && &out_set == result.out_set(*node)
        })
    }
}

#[cfg(test)]
struct LabelSpec {
    forward: bool,
    confluence: Confluence
}

#[cfg(test)]
impl AnalysisSpec<i32> for LabelSpec {
    type Fact = i32;

    fn is_forward(&self) -> bool {
        self.forward
    }

    fn gen_set(&self, graph: &FlowGraph<i32>, node: NodeId, _flowing_in: &HashSet<i32>) -> HashSet<i32> {
        graph.value(node).into_iter().map(|value| value.abs()).collect()
    }

    fn must_kill(&self, graph: &FlowGraph<i32>, node: NodeId, candidate: &i32) -> bool {
        graph.value(node).map(|value| *value == -candidate).unwrap_or(false)
    }

    fn confluence(&self) -> Confluence {
        self.confluence
    }

    fn gens_immune_to_kills(&self) -> bool {
        true
    }
}

#[cfg(test)]
fn diamond() -> (FlowGraph<i32>, NodeId, NodeId, NodeId) {
    use crate::graph::{FlowGraphBuilder, JumpType};

    let mut builder = FlowGraphBuilder::new();
    let branch = builder.append(1);
    let left = builder.add_node(2);
    let right = builder.add_node(-1);
    builder.link_jump_branch(branch, left, JumpType::Jz);
    builder.link_non_jump_branch(branch, right);
    let join = builder.set_end_to_sink_for(left, right);
    (builder.build(), left, right, join)
}

#[test]
fn test_union_forward1() {
    let (graph, left, right, join) = diamond();
    let analyzer = DataFlowAnalyzer::new(LabelSpec { forward: true, confluence: Confluence::Union });
    let result = analyzer.calculate(&graph);

    assert_eq!(&[1, 2].iter().cloned().collect::<HashSet<_>>(), result.out_set(left));
    assert_eq!(&[1].iter().cloned().collect::<HashSet<_>>(), result.out_set(right));
    assert_eq!(&[1, 2].iter().cloned().collect::<HashSet<_>>(), result.in_set(join));
    assert!(analyzer.is_fixed_point(&graph, &result));
}

#[test]
fn test_intersection_forward1() {
    let (graph, _, _, join) = diamond();
    let analyzer = DataFlowAnalyzer::new(LabelSpec { forward: true, confluence: Confluence::Intersection });
    let result = analyzer.calculate(&graph);

    assert_eq!(&[1].iter().cloned().collect::<HashSet<_>>(), result.in_set(join));
    assert!(analyzer.is_fixed_point(&graph, &result));
}

#[test]
fn test_backward1() {
    let (graph, left, _, _) = diamond();
    let analyzer = DataFlowAnalyzer::new(LabelSpec { forward: false, confluence: Confluence::Union });
    let result = analyzer.calculate(&graph);

    assert_eq!(&[1, 2].iter().cloned().collect::<HashSet<_>>(), result.out_set(graph.start()));
    assert!(result.in_set(left).is_empty());
    assert!(analyzer.is_fixed_point(&graph, &result));
}
