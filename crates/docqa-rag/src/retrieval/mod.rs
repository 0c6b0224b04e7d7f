//! Retrieval: question in, grounded answer out

mod orchestrator;

pub use orchestrator::Retriever;
