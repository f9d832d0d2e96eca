use crate::{
    plan::Instance,
    sync::Arc,
    types::{BucketId, HashSet, IndexMap, PlanId, ResourceMask},
};
use std::collections::VecDeque;
use tracing::debug;

/// Admission control: which plans run and which wait.
///
/// Two plans conflict when they share a bucket or any resource bit. No two
/// admitted plans ever conflict.
#[derive(Debug, Default)]
pub(super) struct Schedule {
    /// Admitted plans, in admission order.
    doing: IndexMap<PlanId, Arc<Instance>>,
    /// Deferred plans, in submission order.
    waiting: VecDeque<Arc<Instance>>,
    /// Union of the admitted plans' tags.
    busy_tags: ResourceMask,
    /// Buckets of the admitted plans.
    busy_buckets: HashSet<BucketId>,
}

impl Schedule {
    fn conflicts(&self, plan: &Instance) -> bool {
        self.busy_tags & plan.tag != 0 || self.busy_buckets.contains(&plan.bucket_id())
    }

    fn admit(&mut self, plan: Arc<Instance>) {
        self.busy_tags |= plan.tag;
        self.busy_buckets.insert(plan.bucket_id());
        let replaced = self.doing.insert(plan.id, plan);
        assert!(replaced.is_none(), "Schedule::admit: [1]");
    }

    /// Admits `plan` if it conflicts with no admitted plan, otherwise queues
    /// it. Returns whether it was admitted; the caller then starts it.
    pub(super) fn submit(&mut self, plan: Arc<Instance>) -> bool {
        if self.conflicts(&plan) {
            debug!(
                plan = %plan.id,
                bucket = %plan.bucket_id(),
                tag = plan.tag,
                waiting = self.waiting.len() + 1,
                "plan deferred"
            );
            self.waiting.push_back(plan);
            return false;
        }
        debug!(plan = %plan.id, bucket = %plan.bucket_id(), tag = plan.tag, "plan admitted");
        self.admit(plan);
        true
    }

    /// Removes a finished plan and admits, in submission order, every
    /// waiting plan that no longer conflicts. Returns the newly admitted
    /// plans for the caller to start.
    pub(super) fn retire(&mut self, id: PlanId) -> Vec<Arc<Instance>> {
        let removed = self.doing.shift_remove(&id);
        assert!(removed.is_some(), "Schedule::retire: [1]");

        self.busy_tags = self.doing.values().fold(0, |tags, plan| tags | plan.tag);
        self.busy_buckets = self.doing.values().map(|plan| plan.bucket_id()).collect();

        let mut admitted = Vec::new();
        for plan in core::mem::take(&mut self.waiting) {
            if self.conflicts(&plan) {
                self.waiting.push_back(plan);
            } else {
                debug!(plan = %plan.id, bucket = %plan.bucket_id(), tag = plan.tag, "plan admitted");
                admitted.push(plan.clone());
                self.admit(plan);
            }
        }
        admitted
    }

    pub(super) fn is_idle(&self) -> bool {
        self.doing.is_empty() && self.waiting.is_empty()
    }

    pub(super) fn admitted(&self) -> usize {
        self.doing.len()
    }

    pub(super) fn waiting(&self) -> usize {
        self.waiting.len()
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use crate::{bucket::Bucket, plan::Plan};

    fn bucket() -> Arc<Bucket> {
        let mut bucket = Bucket::new();
        bucket.emplace(|| {});
        Arc::new(bucket)
    }

    fn instance(id: u64, bucket: &Arc<Bucket>, tag: ResourceMask) -> Arc<Instance> {
        Arc::new(
            Plan::new(bucket.clone())
                .tag(tag)
                .into_instance(PlanId::from(id)),
        )
    }

    fn ids(plans: &[Arc<Instance>]) -> Vec<PlanId> {
        plans.iter().map(|plan| plan.id).collect()
    }

    #[test]
    fn shared_tag_bit_defers() {
        let mut schedule = Schedule::default();
        assert!(schedule.submit(instance(1, &bucket(), 0b0001)));
        assert!(schedule.submit(instance(2, &bucket(), 0b0010)));
        assert!(!schedule.submit(instance(3, &bucket(), 0b0011)));
        assert!(schedule.submit(instance(4, &bucket(), 0)));
        assert_eq!((schedule.admitted(), schedule.waiting()), (3, 1));
    }

    #[test]
    fn shared_bucket_defers_even_without_tags() {
        let mut schedule = Schedule::default();
        let shared = bucket();
        assert!(schedule.submit(instance(1, &shared, 0)));
        assert!(!schedule.submit(instance(2, &shared, 0)));
        assert_eq!(ids(&schedule.retire(PlanId::from(1))), vec![PlanId::from(2)]);
        assert!(!schedule.is_idle());
        assert!(schedule.retire(PlanId::from(2)).is_empty());
        assert!(schedule.is_idle());
    }

    #[test]
    fn waiting_plans_admitted_in_submission_order() {
        let mut schedule = Schedule::default();
        assert!(schedule.submit(instance(1, &bucket(), 0b01)));
        for id in 2..=4 {
            assert!(!schedule.submit(instance(id, &bucket(), 0b01)));
        }
        assert!(!schedule.submit(instance(5, &bucket(), 0b11)));

        assert_eq!(ids(&schedule.retire(PlanId::from(1))), vec![PlanId::from(2)]);
        assert_eq!(ids(&schedule.retire(PlanId::from(2))), vec![PlanId::from(3)]);
        assert_eq!(ids(&schedule.retire(PlanId::from(3))), vec![PlanId::from(4)]);
        assert_eq!(ids(&schedule.retire(PlanId::from(4))), vec![PlanId::from(5)]);
    }

    #[test]
    fn retire_admits_every_compatible_waiter() {
        let mut schedule = Schedule::default();
        assert!(schedule.submit(instance(1, &bucket(), 0b111)));
        assert!(!schedule.submit(instance(2, &bucket(), 0b001)));
        assert!(!schedule.submit(instance(3, &bucket(), 0b011)));
        assert!(!schedule.submit(instance(4, &bucket(), 0b100)));

        // 3 collides with 2, which was admitted just before it in the scan.
        assert_eq!(
            ids(&schedule.retire(PlanId::from(1))),
            vec![PlanId::from(2), PlanId::from(4)]
        );
        assert_eq!(schedule.waiting(), 1);
    }
}
