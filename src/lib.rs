#[macro_use]
extern crate log;

pub use error::{Error, Result};

#[macro_use]
mod macros;

pub mod cli;
pub mod context;
pub mod driver;
pub mod enums;
pub mod env;
mod error;
pub mod hooks;
pub mod logger;
pub mod plugins;
pub mod report;
pub mod runner;
pub mod settings;
pub mod spec;
pub mod step;
pub mod trace;

#[cfg(test)]
mod tests;
