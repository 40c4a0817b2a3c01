//! Application layer: order submission and payment orchestration.
//!
//! A single [`capacity::CapacityGate`] bounds concurrent payment work. The
//! [`gateway::OrderGateway`] runs orders inline or publishes them, and the
//! [`consumer::QueueConsumer`] drains the published ones through the same gate.

pub mod capacity;
pub mod consumer;
pub mod gateway;
pub mod processor;
