//! Data model for patch canvases and the hosted generation model.
//!
//! Patches live on a [`Canvas`] in the local rendering convention; the model
//! speaks in [`RemotePatchRecord`]s. The [`convert`] module maps between them.

#![allow(clippy::all)]

pub mod canvas;
pub mod convert;
pub mod job;
pub mod patch;
pub mod remote;

pub use canvas::Canvas;
pub use job::{GenerationJob, JobOutput, JobStatus};
pub use patch::{ImageRef, LocalAttributes, Patch, PatchId, Position};
pub use remote::{MetadataError, RecordId, RemoteAttributes, RemotePatchRecord, parse_metadata};
