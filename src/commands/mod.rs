pub mod apply;
pub mod exec;
pub mod hosts;
pub mod push;
