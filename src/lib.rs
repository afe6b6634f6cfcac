//! Reagent: a bounded ReAct agent.
//!
//! Turns a natural-language query into an answer by alternating between
//! asking a text model what to do next and running tools, keeping an
//! auditable transcript of every step.

pub mod agent;
pub mod config;
pub mod inference;
pub mod tools;
pub mod types;

pub use agent::{Agent, ExecutionReport, Outcome};
