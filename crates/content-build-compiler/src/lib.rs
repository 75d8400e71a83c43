//! Compiler-worker cache and IPC protocol for the content build pipeline.
//!
//! A data compiler is an external, long-lived subprocess that speaks a
//! small request/response protocol (see [`ipc`]) over its stdin/stdout.
//! The [`cache::CompilerCache`] owns one [`worker::Worker`] per resource
//! type named in a project's pipeline definition, and routes
//! [`cache::BuildInput`] submissions to the right worker, queuing one
//! request per worker at a time. See `spec.md` §4.6/§4.7 for the wire
//! protocol and dispatch rules this module implements.

pub mod cache;
pub mod error;
pub mod ipc;
pub mod pipeline;
pub mod worker;

pub use cache::{BuildInput, BuildOutcome, CacheEvent, CompilerCache};
pub use error::{Error, Result};
pub use pipeline::{CompilerDef, PipelineDefinition};
