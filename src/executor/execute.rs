use crate::{
    bucket::NodeKind,
    executor::{Job, Shared},
    plan::Instance,
    sync::{Arc, lock},
    types::NodeId,
};
use core::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, debug_span, error, trace};

impl Shared {
    /// Worker thread body: runs jobs until the queue is closed and drained.
    pub(super) fn work(&self, index: usize) {
        let span = debug_span!("worker", index);
        let _entered = span.enter();
        trace!("worker started");
        while let Some(job) = self.queue.dequeue() {
            self.run(job);
        }
        trace!("worker stopped");
    }

    /// Runs `job`, then keeps running the first successor each node makes
    /// ready, so that a dependency chain stays on this thread.
    fn run(&self, job: Job) {
        let Job { plan, node } = job;
        let mut next = Some(node);
        while let Some(node) = next {
            next = self.dispatch(&plan, node);
            // A continued successor is already counted, so only the node that
            // made nothing ready can close the round.
            if plan.settle() {
                debug_assert!(next.is_none(), "Shared::run: [1]");
                self.complete_round(&plan);
            }
        }
    }

    /// Executes one node and returns the successor this thread continues
    /// with, if any. Every other ready successor is queued.
    fn dispatch(&self, plan: &Arc<Instance>, id: NodeId) -> Option<NodeId> {
        let bucket = &plan.bucket;
        let node = bucket.node(id);
        let kind = node.kind();
        trace!(plan = %plan.id, node = %id, %kind, "dispatch");

        if kind == NodeKind::Branch {
            // A branch commits to one edge and skips join counting for it.
            let choice = node
                .work()
                .and_then(|work| guarded(plan, "branch", || work.invoke_branch()));
            node.rearm();
            let next = choice.and_then(|index| node.successors().get(index).copied());
            trace!(plan = %plan.id, node = %id, ?choice, ?next, "branch selected");
            if next.is_some() {
                plan.track();
            }
            return next;
        }

        if let Some(work) = node.work() {
            let _ = guarded(plan, "action", || work.invoke_action());
        }
        node.rearm();

        let mut next = None;
        for &child in node.successors() {
            if !bucket.node(child).release() {
                continue;
            }
            plan.track();
            if next.is_none() {
                next = Some(child);
            } else {
                self.queue.enqueue(Job {
                    plan: plan.clone(),
                    node: child,
                });
            }
        }
        next
    }

    /// Called by the worker that finished the last node of a round.
    fn complete_round(&self, plan: &Arc<Instance>) {
        let again = plan
            .predicate
            .as_ref()
            .and_then(|predicate| guarded(plan, "predicate", || predicate.invoke_predicate()))
            .unwrap_or(false);
        if again {
            let round = plan.renew();
            trace!(plan = %plan.id, round, "plan renewed");
            self.release_entries(plan);
            return;
        }

        // Released before the completion signal, so that a submitter woken by
        // it can hand the bucket to another executor.
        plan.bucket.unclaim();
        finish(plan);
        let admitted = {
            let mut schedule = lock(&self.schedule);
            let admitted = schedule.retire(plan.id);
            if schedule.is_idle() {
                self.idle.notify_all();
            }
            admitted
        };
        for next in &admitted {
            self.start(next);
        }
    }

    /// Runs the prepare hook, arms the bucket and queues the entry nodes of
    /// a freshly admitted plan.
    pub(super) fn start(&self, plan: &Arc<Instance>) {
        if let Some(on_prepare) = &plan.on_prepare {
            let _ = guarded(plan, "on_prepare", || on_prepare.invoke_action());
        }
        plan.arm();
        debug!(
            plan = %plan.id,
            bucket = %plan.bucket_id(),
            entries = plan.entries.len(),
            "plan started"
        );
        self.release_entries(plan);
    }

    fn release_entries(&self, plan: &Arc<Instance>) {
        for &node in &plan.entries {
            self.queue.enqueue(Job {
                plan: plan.clone(),
                node,
            });
        }
    }
}

/// Runs the done hook and publishes the completion signal.
pub(super) fn finish(plan: &Instance) {
    if let Some(on_done) = &plan.on_done {
        let _ = guarded(plan, "on_done", || on_done.invoke_action());
    }
    debug!(plan = %plan.id, rounds = plan.round(), "plan finished");
    plan.completion.signal();
}

/// Runs user code, turning a panic into `None` so that the worker survives
/// and the round still completes.
fn guarded<R>(plan: &Instance, what: &'static str, f: impl FnOnce() -> R) -> Option<R> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            error!(
                plan = %plan.id,
                what,
                panic = panic_message(payload.as_ref()),
                "user code panicked"
            );
            None
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "<non-string panic payload>"
    }
}
