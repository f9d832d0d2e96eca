#![allow(missing_docs)]
#![cfg(feature = "loom")]

use core::time::Duration;
use jobgraph::{Bucket, Executor, Plan, WorkQueue};
use loom::{
    model::Builder,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};
use std::sync::Arc;

fn model(f: impl Fn() + Sync + Send + 'static) {
    let mut builder = Builder::new();
    builder.preemption_bound = Some(2);
    builder.max_branches = 10_000;
    builder.check(f);
}

#[test]
fn queue_hands_items_between_threads() {
    model(|| {
        let queue = Arc::new(WorkQueue::new(4, Duration::ZERO));
        let producers: Vec<_> = [1, 2]
            .into_iter()
            .map(|item| {
                let queue = queue.clone();
                thread::spawn(move || queue.enqueue(item))
            })
            .collect();

        let mut got = [queue.dequeue(), queue.dequeue()];
        got.sort_unstable();
        assert_eq!(got, [Some(1), Some(2)]);
        for producer in producers {
            producer.join().unwrap();
        }
        assert!(queue.is_empty());
    });
}

#[test]
fn close_releases_a_parked_consumer() {
    model(|| {
        let queue = Arc::new(WorkQueue::<u8>::new(2, Duration::ZERO));
        let consumer = {
            let queue = queue.clone();
            thread::spawn(move || queue.dequeue())
        };
        queue.close();
        assert_eq!(consumer.join().unwrap(), None);
    });
}

#[test]
fn diamond_runs_each_node_once() {
    model(|| {
        let executor = Executor::new(2).unwrap();
        let runs = Arc::new([(); 4].map(|()| AtomicUsize::new(0)));
        let early = Arc::new(AtomicUsize::new(0));

        let mut bucket = Bucket::new();
        let nodes = [0, 1, 2, 3].map(|i| {
            let (runs, early) = (runs.clone(), early.clone());
            bucket.emplace(move || {
                if i == 3
                    && (runs[1].load(Ordering::Acquire) == 0 || runs[2].load(Ordering::Acquire) == 0)
                {
                    early.fetch_add(1, Ordering::Relaxed);
                }
                runs[i].fetch_add(1, Ordering::Release);
            })
        });
        bucket.precede(nodes[0], [nodes[1], nodes[2]]);
        bucket.depend_on(nodes[3], [nodes[1], nodes[2]]);

        executor.submit(Plan::new(Arc::new(bucket))).wait();
        executor.shutdown();
        assert!(runs.iter().all(|run| run.load(Ordering::Relaxed) == 1));
        assert_eq!(early.load(Ordering::Relaxed), 0);
    });
}

#[test]
fn repeated_branch_plan_completes() {
    model(|| {
        let executor = Executor::new(1).unwrap();
        let hits = Arc::new(AtomicUsize::new(0));

        let mut bucket = Bucket::new();
        let branch = bucket.emplace(|| 1_usize);
        let skipped = bucket.placeholder();
        let target = bucket.emplace({
            let hits = hits.clone();
            move || {
                hits.fetch_add(1, Ordering::Relaxed);
            }
        });
        bucket.precede(branch, [skipped, target]);

        executor.submit(Plan::new(Arc::new(bucket)).do_n(2)).wait();
        executor.shutdown();
        assert_eq!(hits.load(Ordering::Relaxed), 2);
    });
}
