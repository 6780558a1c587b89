//! The task/finished dual-queue protocol (`spec.md` §4.3, §4.4): a
//! durable, competing-consumer task queue feeding the worker pool, paired
//! with a broadcast completion channel that wakes every gateway request
//! waiting on a given block.

pub mod client;
pub mod finished_bus;
pub mod server;
pub mod task_queue;

pub use client::{FinishedBusClient, HttpBusClient, TaskQueueClient};
pub use finished_bus::FinishedBus;
pub use server::BusState;
pub use task_queue::TaskQueueStore;
