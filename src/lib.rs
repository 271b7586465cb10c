//! Agent Orchestrator - streaming supervision of a command-line coding agent.

pub mod agent;
pub mod cli;
pub mod config;
pub mod display;
pub mod status;
pub mod supervisor;
