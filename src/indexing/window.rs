use std::ops::Range;

/// One position of the trailing window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowStep {
    /// Position of the reference event.
    pub index: usize,
    /// Positions that dropped out of the window since the previous step.
    pub expired: Range<usize>,
    /// Earlier positions whose timestamp lies in `[t - window, t]`.
    pub window: Range<usize>,
}

/// Iterator over time-sorted timestamps yielding, for each event, the earlier
/// events inside its trailing window.
///
/// Events sharing a timestamp are ordered by their position, so an event only
/// ever sees the ones before it. The lower edge of the window is inclusive.
pub struct WindowScanner<'a> {
    timestamps: &'a [i64],
    window_ms: i64,
    next: usize,
    start: usize,
}

impl<'a> WindowScanner<'a> {
    /// Creates a scanner over `timestamps`, which must be sorted ascending.
    pub fn new(timestamps: &'a [i64], window_ms: i64) -> Self {
        debug_assert!(timestamps.windows(2).all(|w| w[0] <= w[1]));
        Self { timestamps, window_ms: window_ms.max(0), next: 0, start: 0 }
    }
}

impl Iterator for WindowScanner<'_> {
    type Item = WindowStep;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next;
        let timestamp = *self.timestamps.get(index)?;
        let lower = timestamp.saturating_sub(self.window_ms);

        let expired_from = self.start;
        while self.start < index && self.timestamps[self.start] < lower {
            self.start += 1;
        }

        self.next += 1;
        Some(WindowStep { index, expired: expired_from..self.start, window: self.start..index })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.timestamps.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for WindowScanner<'_> {}
