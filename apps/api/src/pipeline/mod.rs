//! Orchestration core: shared state, the stage graph, node implementations,
//! the `advance` driver, and the collaborators they depend on.

pub mod budget;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod gap;
pub mod generative;
pub mod graph;
pub mod handlers;
pub mod nodes;
pub mod ports;
pub mod prompts;
pub mod router;
pub mod session;
pub mod state;

#[cfg(test)]
pub mod testing;
