//! Core domain types and logic.

pub mod action;
pub mod config_validation;
pub mod context;
pub mod error;
pub mod evaluation;
pub mod filter;
pub mod generator;
pub mod monte_carlo;
pub mod planner;
pub mod planner_config;
pub mod risk;
pub mod scoring;
pub mod stochastic;
