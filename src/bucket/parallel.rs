use crate::{
    bucket::{Bucket, Node},
    task::Executable,
    types::NodeId,
    utils::{RangeSplitInto, hardware_concurrency},
};
use std::sync::Arc;

impl Bucket {
    /// Expands a parallel loop over `0..n` with one chunk per hardware thread.
    ///
    /// See [`Bucket::parallel_for_chunks`].
    pub fn parallel_for<F>(&mut self, n: usize, f: F) -> (NodeId, NodeId)
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.parallel_for_chunks(n, hardware_concurrency(), f)
    }

    /// Expands a parallel loop over `0..n` into a fan-out/fan-in block.
    ///
    /// The range is cut into `chunks` contiguous pieces (the first
    /// `n % chunks` get one extra index) and each non-empty piece becomes an
    /// action node calling `f` on its indices in ascending order. All chunk
    /// nodes depend on the returned `begin` placeholder and precede the
    /// returned `end` placeholder, so the block can be wired into a larger
    /// graph through those two nodes. Every index is visited exactly once per
    /// round; nothing is guaranteed about the order across chunks.
    pub fn parallel_for_chunks<F>(&mut self, n: usize, chunks: usize, f: F) -> (NodeId, NodeId)
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        self.fan_out((0..n).split_into(chunks), move |range| {
            let f = f.clone();
            move || range.clone().for_each(|index| f(index))
        })
    }

    /// Expands a parallel loop over `items` with one chunk per hardware
    /// thread.
    ///
    /// See [`Bucket::parallel_each_chunks`].
    pub fn parallel_each<T, F>(&mut self, items: impl Into<Arc<[T]>>, f: F) -> (NodeId, NodeId)
    where
        T: Send + Sync + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.parallel_each_chunks(items, hardware_concurrency(), f)
    }

    /// Same partitioning as [`Bucket::parallel_for_chunks`], over the
    /// elements of `items` instead of an index range.
    pub fn parallel_each_chunks<T, F>(
        &mut self,
        items: impl Into<Arc<[T]>>,
        chunks: usize,
        f: F,
    ) -> (NodeId, NodeId)
    where
        T: Send + Sync + 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let items: Arc<[T]> = items.into();
        let f = Arc::new(f);
        self.fan_out((0..items.len()).split_into(chunks), move |range| {
            let (items, f) = (items.clone(), f.clone());
            move || items[range.clone()].iter().for_each(|item| f(item))
        })
    }

    fn fan_out<R, W>(
        &mut self,
        ranges: impl Iterator<Item = R>,
        mut chunk: impl FnMut(R) -> W,
    ) -> (NodeId, NodeId)
    where
        W: Fn() + Send + Sync + 'static,
    {
        let begin = self.placeholder();
        let end = self.placeholder();
        let mut empty = true;
        for range in ranges {
            let node = self.push(Node::new(Some(Executable::action(chunk(range)))));
            self.depend_on(node, [begin]);
            self.precede(node, [end]);
            empty = false;
        }
        if empty {
            self.precede(begin, [end]);
        }
        (begin, end)
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use crate::bucket::{Bucket, NodeKind};

    #[test]
    fn chunks_sit_between_begin_and_end() {
        let mut bucket = Bucket::new();
        let (begin, end) = bucket.parallel_for_chunks(10, 4, |_| {});

        assert_eq!(bucket.len(), 6);
        assert_eq!(bucket.kind(begin), NodeKind::Placeholder);
        assert_eq!(bucket.kind(end), NodeKind::Placeholder);
        assert_eq!(bucket.successors(begin).len(), 4);
        assert_eq!(bucket.predecessors(end), bucket.successors(begin));
        for &chunk in bucket.successors(begin) {
            assert_eq!(bucket.kind(chunk), NodeKind::Action);
            assert_eq!(bucket.predecessors(chunk), &[begin]);
            assert_eq!(bucket.successors(chunk), &[end]);
        }
        assert_eq!(bucket.entries().collect::<Vec<_>>(), vec![begin]);
    }

    #[test]
    fn empty_loop_links_begin_to_end() {
        let mut bucket = Bucket::new();
        let (begin, end) = bucket.parallel_each_chunks(Vec::<u8>::new(), 3, |_: &u8| {});

        assert_eq!(bucket.len(), 2);
        assert_eq!(bucket.successors(begin), &[end]);
    }

    #[test]
    fn more_chunks_than_items() {
        let mut bucket = Bucket::new();
        let (begin, _) = bucket.parallel_each_chunks(vec![1, 2], 8, |_: &i32| {});
        assert_eq!(bucket.successors(begin).len(), 2);
    }
}
