//! Turn execution: persist, frame, call the model, persist the reply.

pub mod orchestrator;
pub mod title;
