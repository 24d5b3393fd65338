//! Tracking remote generation jobs to completion.
//!
//! [`poll_job`] is the sequential status loop. [`JobService`] runs create,
//! poll and metadata fetch on worker threads for hosts that drive their own
//! event loop.

#![allow(clippy::all)]

pub mod cancel;
pub mod poll;
pub mod service;

pub use cancel::CancelToken;
pub use poll::{Delay, JobOutcome, PollError, PollPolicy, TokenDelay, poll_job};
pub use service::{GeneratedResult, JobError, JobEvent, JobService};
