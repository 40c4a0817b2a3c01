//! JSON-lines input and output used by the command-line driver.

pub mod reader;
pub mod script;
pub mod writer;
