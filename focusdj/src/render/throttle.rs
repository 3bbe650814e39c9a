use std::time::{Duration, Instant};

/// Coalescing throttle around a pure computation.
///
/// `schedule` only records the newest input. `poll` runs the computation when
/// a window has elapsed since it was opened, always on the newest input, and
/// never more than once per window. Until then callers keep getting the last
/// committed output.
pub struct Throttle<I, O> {
    window: Duration,
    compute: Box<dyn FnMut(&I) -> O + Send>,
    pending: Option<I>,
    window_start: Option<Instant>,
    committed: Option<O>,
    runs: u64,
}

impl<I, O> Throttle<I, O> {
    pub fn new(
        window: Duration,
        compute: impl FnMut(&I) -> O + Send + 'static,
    ) -> Self {
        Self {
            window,
            compute: Box::new(compute),
            pending: None,
            window_start: None,
            committed: None,
            runs: 0,
        }
    }

    /// Replaces any pending input with `input` and returns the last
    /// committed output.
    pub fn schedule(&mut self, input: I, now: Instant) -> Option<&O> {
        if self.window_start.is_none() {
            self.window_start = Some(now);
        }
        self.pending = Some(input);
        self.committed.as_ref()
    }

    /// Runs the pending computation if its window has closed. Returns the new
    /// output when one was produced.
    pub fn poll(&mut self, now: Instant) -> Option<&O> {
        let start = self.window_start?;
        if now.duration_since(start) < self.window {
            return None;
        }
        self.run()
    }

    /// Runs any pending computation immediately.
    pub fn flush(&mut self) -> Option<&O> {
        self.window_start?;
        self.run()
    }

    /// Time until `poll` would produce output, if anything is pending.
    pub fn time_until_due(&self, now: Instant) -> Option<Duration> {
        self.window_start
            .map(|start| (start + self.window).saturating_duration_since(now))
    }

    pub fn latest(&self) -> Option<&O> {
        self.committed.as_ref()
    }

    pub fn runs(&self) -> u64 {
        self.runs
    }

    fn run(&mut self) -> Option<&O> {
        self.window_start = None;
        let input = self.pending.take()?;
        self.runs += 1;
        self.committed = Some((self.compute)(&input));
        self.committed.as_ref()
    }
}
