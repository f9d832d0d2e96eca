//! In-process task-graph job system.
//!
//! A [`Bucket`] is a reusable graph template: nodes that run closures, wired
//! with dependency edges. A [`Plan`] is one execution instance of a bucket
//! that may repeat for several rounds. An [`Executor`] owns a fixed pool of
//! worker threads shared by every submitted plan.
//!
//! - A node runs once all its static predecessors have finished in the
//!   current round. The worker that makes a successor ready keeps running it
//!   itself, so a dependency chain stays on one thread.
//! - Closures returning `usize` become branch nodes: they pick exactly one of
//!   their successors by index, with no join counting on that edge.
//! - Plans that share a bucket or any bit of their resource tag never run
//!   at the same time. Deferred plans are admitted in submission order.
//!
//! Key modules:
//! - `bucket`: graph building, arming and `parallel_for`/`parallel_each`
//!   fan-out.
//! - `plan`: per-run configuration (predicate, hooks, tag) and the
//!   completion handle.
//! - `executor`: worker pool, admission control and dispatch.
//! - `queue`: the bounded FIFO of ready nodes.
//!
//! Quick start:
//! 1. Build a `Bucket` with `emplace`, `placeholder` and `precede` /
//!    `depend_on`.
//! 2. Wrap it in an `Arc` and create a `Plan`, optionally with `do_n`,
//!    `predicate`, hooks and a `tag`.
//! 3. `Executor::submit` the plan and wait on the returned `Completion`, or
//!    call `Executor::wait_for_all`.
//!
//! The graph must be acyclic; see [`Bucket::topological_order`] for an
//! up-front check.

/// Graph templates and their builder surface.
///
/// Nodes live in an arena owned by the bucket and are addressed by
/// [`NodeId`]. Wiring requires `&mut Bucket`, so the topology is frozen once
/// the bucket is shared with a plan.
pub mod bucket;
/// Executor settings.
pub mod config;
/// The worker pool.
///
/// Contains admission control (which plans run, which wait), the worker
/// loop with in-thread continuation, and round completion.
pub mod executor;
/// Plans: one execution instance of a bucket.
pub mod plan;
/// Bounded multi-producer multi-consumer FIFO used for ready nodes.
pub mod queue;
mod sync;
/// Callables bound to nodes and plan hooks.
///
/// Defines `Executable`, with its three call conventions, and the `Task`
/// trait that picks the convention from a closure's return type.
pub mod task;
/// Identifiers and small aliases shared across the crate.
pub mod types;
mod utils;

pub use crate::{
    bucket::{Bucket, BucketError, NodeKind},
    config::ExecutorConfig,
    executor::{Executor, ExecutorError},
    plan::{Completion, Plan},
    queue::WorkQueue,
    task::{Executable, Task},
    types::{NodeId, ResourceMask},
};
