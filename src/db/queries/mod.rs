//! Database queries

pub mod appointment;
