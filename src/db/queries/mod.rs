//! Database queries

pub mod department;
