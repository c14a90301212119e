/// One candidate recognition sample: a fixed-width slice of the source
/// recording. `index` is the emission order within the plan, not the
/// underlying window number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub index: usize,
    pub start_ms: u64,
    pub duration_ms: u64,
}

/// Lazy plan over fixed-width, non-overlapping windows of the recording,
/// keeping only every `stride`-th window starting from `start_offset_ms`.
///
/// The plan computes offsets only; materializing a segment is the codec's
/// job. The final window is truncated to the end of the recording.
#[derive(Debug, Clone)]
pub struct SegmentPlan {
    total_duration_ms: u64,
    segment_duration_ms: u64,
    stride: u64,
    start_offset_ms: u64,
    next_window: u64,
    emitted: usize,
}

impl SegmentPlan {
    pub fn new(
        total_duration_ms: u64,
        segment_duration_ms: u64,
        stride: u64,
        start_offset_ms: u64,
    ) -> Self {
        Self {
            total_duration_ms,
            segment_duration_ms,
            stride: stride.max(1),
            start_offset_ms,
            next_window: 0,
            emitted: 0,
        }
    }

    /// Total number of segments the full plan yields:
    /// `ceil((total - offset) / duration / stride)`.
    pub fn planned_len(&self) -> usize {
        let remaining = self.total_duration_ms.saturating_sub(self.start_offset_ms);
        remaining.div_ceil(self.segment_duration_ms * self.stride) as usize
    }
}

impl Iterator for SegmentPlan {
    type Item = Segment;

    fn next(&mut self) -> Option<Segment> {
        let start_ms = self
            .start_offset_ms
            .checked_add(self.next_window.checked_mul(self.segment_duration_ms)?)?;
        if start_ms >= self.total_duration_ms {
            return None;
        }

        let duration_ms = self
            .segment_duration_ms
            .min(self.total_duration_ms - start_ms);
        let segment = Segment {
            index: self.emitted,
            start_ms,
            duration_ms,
        };

        self.next_window += self.stride;
        self.emitted += 1;
        Some(segment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_length_matches_ceil_formula() {
        for (total, duration, stride, offset) in [
            (180_000u64, 30_000u64, 2u64, 45_000u64),
            (180_000, 30_000, 1, 0),
            (180_000, 30_000, 3, 0),
            (29_999, 30_000, 1, 0),
            (30_001, 30_000, 2, 0),
            (600_000, 30_000, 2, 45_000),
        ] {
            let plan = SegmentPlan::new(total, duration, stride, offset);
            let want = ((total - offset) as f64 / duration as f64 / stride as f64).ceil() as usize;
            assert_eq!(plan.planned_len(), want, "formula for {total}/{duration}/{stride}/{offset}");
            assert_eq!(plan.count(), want, "iterator for {total}/{duration}/{stride}/{offset}");
        }
    }

    #[test]
    fn windows_lie_within_bounds_and_respect_stride() {
        let segments: Vec<Segment> = SegmentPlan::new(180_000, 30_000, 2, 45_000).collect();
        let starts: Vec<u64> = segments.iter().map(|s| s.start_ms).collect();
        assert_eq!(starts, vec![45_000, 105_000, 165_000]);

        for (i, segment) in segments.iter().enumerate() {
            assert_eq!(segment.index, i);
            assert!(segment.start_ms >= 45_000);
            assert!(segment.start_ms < 180_000);
            assert!(segment.start_ms + segment.duration_ms <= 180_000);
        }
    }

    #[test]
    fn final_window_is_truncated() {
        let last = SegmentPlan::new(180_000, 30_000, 2, 45_000)
            .last()
            .expect("nonempty plan");
        assert_eq!(last.start_ms, 165_000);
        assert_eq!(last.duration_ms, 15_000);
    }

    #[test]
    fn offset_past_end_yields_empty_plan() {
        let mut plan = SegmentPlan::new(120_000, 30_000, 2, 120_000);
        assert_eq!(plan.planned_len(), 0);
        assert!(plan.next().is_none());

        let mut past = SegmentPlan::new(120_000, 30_000, 2, 500_000);
        assert_eq!(past.planned_len(), 0);
        assert!(past.next().is_none());
    }

    #[test]
    fn stride_one_keeps_every_window() {
        let starts: Vec<u64> = SegmentPlan::new(90_000, 30_000, 1, 0)
            .map(|s| s.start_ms)
            .collect();
        assert_eq!(starts, vec![0, 30_000, 60_000]);
    }
}
