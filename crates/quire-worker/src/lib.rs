//! Quire Worker
//!
//! An [`Invoker`](quire_pipeline::Invoker) that runs each worker as a chat
//! completion against an OpenAI-compatible API. A worker's instructions live
//! in `{prompts_dir}/{slug}.md`, where the slug is the worker name in
//! lowercase kebab-case.

mod error;
mod http;

pub use error::WorkerError;
pub use http::{HttpInvoker, HttpInvokerConfig, slug};
