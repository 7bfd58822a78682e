pub mod cache;
pub mod screenshot;
pub mod types;
