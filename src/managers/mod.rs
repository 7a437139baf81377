pub mod pipeline;
pub mod ssh;
