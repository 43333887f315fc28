use std::collections::BTreeSet;

use thiserror::Error;
use tracing::trace;

use crate::optimization::register_allocation::LiveRange;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ColoringError {
    #[error("{remaining} live ranges could not be simplified with {palette_size} registers")]
    Uncolorable { remaining: usize, palette_size: usize }
}

pub type ColoringResult<T> = Result<T, ColoringError>;

/// Undirected graph over live ranges, identified by their index. Two ranges interfere if
/// they share a node.
#[derive(Debug, Clone)]
pub struct InterferenceGraph {
    neighbours: Vec<BTreeSet<usize>>
}

impl InterferenceGraph {
    pub fn new(live_ranges: &[LiveRange]) -> InterferenceGraph {
        let mut edges = Vec::new();
        for (first_index, first) in live_ranges.iter().enumerate() {
            for (second_index, second) in live_ranges.iter().enumerate().skip(first_index + 1) {
                if first.conflicts_with(second) {
                    edges.push((first_index, second_index));
                }
            }
        }

        InterferenceGraph::from_edges(live_ranges.len(), &edges)
    }

    pub fn from_edges(num_nodes: usize, edges: &[(usize, usize)]) -> InterferenceGraph {
        let mut neighbours = vec![BTreeSet::new(); num_nodes];
        for &(first, second) in edges {
            if first != second {
                neighbours[first].insert(second);
                neighbours[second].insert(first);
            }
        }

        InterferenceGraph {
            neighbours
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.neighbours.len()
    }

    pub fn neighbours(&self, node: usize) -> &BTreeSet<usize> {
        &self.neighbours[node]
    }

    pub fn degree(&self, node: usize) -> usize {
        self.neighbours[node].len()
    }

    pub fn interferes(&self, first: usize, second: usize) -> bool {
        self.neighbours[first].contains(&second)
    }

    /// Kempe's heuristic: repeatedly remove a node of degree below `palette_size`, then color in
    /// reverse removal order with the lowest color no neighbour has.
    pub fn color(&self, palette_size: usize) -> ColoringResult<Vec<usize>> {
        let num_nodes = self.num_nodes();
        let mut removed = vec![false; num_nodes];
        let mut degrees = (0..num_nodes).map(|node| self.degree(node)).collect::<Vec<_>>();
        let mut stack = Vec::new();

        while let Some(node) = (0..num_nodes).find(|node| !removed[*node] && degrees[*node] < palette_size) {
            removed[node] = true;
            stack.push(node);
            for neighbour in &self.neighbours[node] {
                if !removed[*neighbour] {
                    degrees[*neighbour] -= 1;
                }
            }
        }

        let uncolorable = ColoringError::Uncolorable {
            remaining: num_nodes - stack.len(),
            palette_size
        };

        if stack.len() < num_nodes {
            return Err(uncolorable);
        }

        let mut colors = vec![0; num_nodes];
        let mut colored = vec![false; num_nodes];
        while let Some(node) = stack.pop() {
            let taken = self.neighbours[node]
                .iter()
                .filter(|neighbour| colored[**neighbour])
                .map(|neighbour| colors[*neighbour])
                .collect::<BTreeSet<_>>();

            let color = (0..palette_size)
                .find(|color| !taken.contains(color))
                .ok_or_else(|| uncolorable.clone())?;

            trace!("live range {} colored {}", node, color);
            colors[node] = color;
            colored[node] = true;
        }

        Ok(colors)
    }
}

#[cfg(test)]
fn assert_proper(graph: &InterferenceGraph, colors: &[usize]) {
    for node in 0..graph.num_nodes() {
        for neighbour in graph.neighbours(node) {
            assert_ne!(colors[node], colors[*neighbour], "{} and {} share a color", node, neighbour);
        }
    }
}

#[test]
fn test_color_triangle1() {
    let graph = InterferenceGraph::from_edges(3, &[(0, 1), (1, 2), (0, 2)]);
    assert!(graph.interferes(2, 0));

    assert_eq!(
        Err(ColoringError::Uncolorable { remaining: 3, palette_size: 2 }),
        graph.color(2)
    );

    let colors = graph.color(3).unwrap();
    println!("{:?}", colors);
    assert_proper(&graph, &colors);
    assert_eq!(3, colors.iter().collect::<BTreeSet<_>>().len());
}

#[test]
fn test_color_chain1() {
    let graph = InterferenceGraph::from_edges(4, &[(0, 1), (1, 2), (2, 3)]);
    let colors = graph.color(2).unwrap();

    println!("{:?}", colors);
    assert_proper(&graph, &colors);
}

#[test]
fn test_color_no_interference1() {
    let graph = InterferenceGraph::from_edges(3, &[]);
    assert!(!graph.interferes(0, 1));
    assert_eq!(vec![0, 0, 0], graph.color(1).unwrap());
    assert_eq!(Vec::<usize>::new(), InterferenceGraph::from_edges(0, &[]).color(0).unwrap());
}

#[test]
fn test_color_empty_palette1() {
    let graph = InterferenceGraph::from_edges(1, &[]);
    assert!(graph.color(0).is_err());
}

#[test]
fn test_uncolorable_message1() {
    let error = ColoringError::Uncolorable { remaining: 3, palette_size: 2 };
    assert_eq!("3 live ranges could not be simplified with 2 registers", error.to_string());
}
