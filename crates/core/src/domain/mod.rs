pub mod execution;
pub mod news;
