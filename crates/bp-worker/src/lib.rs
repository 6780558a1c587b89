//! Classifier worker service (`spec.md` §4.6): consumes block-compute
//! tasks, publishes completions.

pub mod kernel;
pub mod raw_client;
pub mod server;
pub mod worker;

pub use kernel::{ClassifierKernel, ConstantClassifierKernel};
pub use raw_client::{RawClient, ReqwestRawClient};
pub use server::WorkerInfo;
pub use worker::{process_task, TaskError};
