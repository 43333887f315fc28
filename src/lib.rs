#[macro_use]
extern crate lazy_static;

pub mod graph;
pub mod model;
pub mod context;
pub mod ir;
pub mod construction;
pub mod analysis;
pub mod optimization;

#[cfg(test)]
mod tests;
