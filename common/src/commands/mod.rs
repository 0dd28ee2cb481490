//! Command and response definitions, one submodule per handling module

pub mod inflate;
pub mod measurer;
pub mod monitor;
pub mod settings;
