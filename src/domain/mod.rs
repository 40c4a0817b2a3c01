//! Domain types and the ports the infrastructure layer implements.

pub mod cart;
pub mod ids;
pub mod money;
pub mod order;
pub mod ports;
pub mod product;
pub mod submission;
