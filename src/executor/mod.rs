#[cfg(feature = "chrome")]
pub mod chrome;
pub mod coordinator;
pub mod dispatcher;
pub mod input;
pub mod text_input;
