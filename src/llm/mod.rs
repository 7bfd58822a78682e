pub mod client;
pub mod parse;
pub mod provider;
pub mod providers;
pub mod retry;
pub mod simulate;
pub mod types;
