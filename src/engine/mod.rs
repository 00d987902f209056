//! Core engine: the resolve, scan, select and persist cycle.

pub mod scanner;
pub mod resolver;
pub mod accountant;
pub mod cycle;
