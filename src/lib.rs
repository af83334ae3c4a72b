pub mod args;
pub mod dashboard;
