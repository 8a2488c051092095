pub mod history;
pub mod invocation;
