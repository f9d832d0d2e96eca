use core::{num::NonZeroUsize, ops::Range};

pub(crate) trait RangeSplitInto {
    /// Splits the range into at most `parts` contiguous, non-empty pieces.
    ///
    /// The first `len % parts` pieces receive one extra element. Empty pieces
    /// are not produced, so fewer than `parts` ranges come back when the range
    /// is shorter than `parts`.
    fn split_into(&self, parts: usize) -> impl Iterator<Item = Range<usize>>;
}

impl RangeSplitInto for Range<usize> {
    #[inline]
    fn split_into(&self, parts: usize) -> impl Iterator<Item = Range<usize>> {
        let len = self
            .end
            .checked_sub(self.start)
            .expect("RangeSplitInto::split_into");
        let parts = parts.max(1);
        let (base, extra) = (len / parts, len % parts);
        let mut start = self.start;
        (0..parts)
            .map(move |part| {
                let size = base + usize::from(part < extra);
                let piece = start..start + size;
                start = piece.end;
                piece
            })
            .filter(|piece| !piece.is_empty())
    }
}

/// Number of hardware threads, the default fan-out of parallel loops.
pub(crate) fn hardware_concurrency() -> usize {
    std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
}
