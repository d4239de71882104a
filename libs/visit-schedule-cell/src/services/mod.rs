pub mod evaluator;
pub mod expander;
pub mod notifier;
pub mod orchestrator;
