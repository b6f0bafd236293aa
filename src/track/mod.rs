// src/track/mod.rs

//! Tracker core: the registry of specs, the dependency network, the
//! priority queue and the scheduler that drives tasks through their
//! lifecycle.
//!
//! Everything here is synchronous and purely in-memory. The async runner
//! in [`crate::runner`] wraps a [`Scheduler`] and feeds executor outcomes
//! back into it.

pub mod network;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod status;
pub mod task;

pub use network::{ConcreteEdges, EdgeKind, NetNode, Network};
pub use queue::TrackQueue;
pub use registry::{Registry, ReusePolicy};
pub use scheduler::Scheduler;
pub use status::{ArtifactStatus, TaskStatus};
pub use task::{Task, CMD_KEY, JOB_HEAD_KEY};

/// Most pops one call to [`Scheduler::next_for`] spends before yielding.
pub const MAX_LOOP: usize = 100;

/// Floor a deferred entry's priority may decay to before it is halted.
pub const MIN_PRIORITY: i32 = -10;
