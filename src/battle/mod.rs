pub mod actor;
pub mod rules;
pub mod supervisor;
pub mod types;
