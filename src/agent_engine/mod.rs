pub mod engine;
pub mod event_bus;
pub mod history;
pub mod instructions;
pub mod loop_control;
pub mod state;
pub mod transitions;
