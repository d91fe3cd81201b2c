//! Core domain types and logic.

pub mod position;
pub mod account;
pub mod calendar;
pub mod contract;
pub mod simulation;
pub mod config_validation;
pub mod error;
