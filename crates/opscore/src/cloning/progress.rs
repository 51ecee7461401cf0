//! Progress reporting for the fetch and clone stages.
//!
//! Stages report every update to a [`ProgressSink`] through a
//! [`MonotonicProgress`] computed from one ordered table of [`Phase`]s per
//! stage. Rescaling two stages into one bar ([`ScaledProgress`]) and
//! deciding how often to render ([`ProgressThrottler`]) belong to the
//! caller.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Receives progress values in `[0, 100]`.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report(&self, value: f64);
}

/// Discards every update.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

#[async_trait]
impl ProgressSink for NoProgress {
    async fn report(&self, _value: f64) {}
}

/// Adapter for a synchronous callback.
pub struct FnProgress<F>(pub F);

#[async_trait]
impl<F> ProgressSink for FnProgress<F>
where
    F: Fn(f64) + Send + Sync,
{
    async fn report(&self, value: f64) {
        (self.0)(value);
    }
}

/// Adapter for an asynchronous callback; the stage awaits it before going on.
pub struct AsyncFnProgress<F>(pub F);

#[async_trait]
impl<F, Fut> ProgressSink for AsyncFnProgress<F>
where
    F: Fn(f64) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    async fn report(&self, value: f64) {
        (self.0)(value).await;
    }
}

/// A window of a stage's `0..100` range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Phase {
    pub name: &'static str,
    pub start: f64,
    pub end: f64,
}

impl Phase {
    const fn new(name: &'static str, start: f64, end: f64) -> Self {
        Self { name, start, end }
    }

    /// Value after `done` of `total` items. An empty phase is complete.
    pub fn at(&self, done: usize, total: usize) -> f64 {
        if total == 0 {
            return self.end;
        }
        let fraction = done.min(total) as f64 / total as f64;
        self.start + fraction * (self.end - self.start)
    }
}

/// Checkpoints of the fetch stage.
pub mod fetch_phase {
    use super::Phase;

    pub const PROJECT: Phase = Phase::new("project", 0.0, 5.0);
    pub const ISSUES: Phase = Phase::new("issues", 5.0, 40.0);
    pub const CHECKLISTS: Phase = Phase::new("checklists", 40.0, 55.0);
    pub const LINKS: Phase = Phase::new("links", 55.0, 75.0);
    pub const COMMENTS: Phase = Phase::new("comments", 75.0, 90.0);
    pub const CLOSURE: Phase = Phase::new("closure", 90.0, 100.0);
}

/// Checkpoints of the clone stage.
pub mod clone_phase {
    use super::Phase;

    pub const PROJECT: Phase = Phase::new("project", 0.0, 8.0);
    pub const ISSUES: Phase = Phase::new("issues", 8.0, 40.0);
    pub const PARENTS: Phase = Phase::new("parents", 40.0, 50.0);
    pub const CHECKLISTS: Phase = Phase::new("checklists", 50.0, 65.0);
    pub const LINKS: Phase = Phase::new("links", 65.0, 80.0);
    pub const COMMENTS: Phase = Phase::new("comments", 80.0, 100.0);
}

pub const FETCH_PHASES: [Phase; 6] = [
    fetch_phase::PROJECT,
    fetch_phase::ISSUES,
    fetch_phase::CHECKLISTS,
    fetch_phase::LINKS,
    fetch_phase::COMMENTS,
    fetch_phase::CLOSURE,
];

pub const CLONE_PHASES: [Phase; 6] = [
    clone_phase::PROJECT,
    clone_phase::ISSUES,
    clone_phase::PARENTS,
    clone_phase::CHECKLISTS,
    clone_phase::LINKS,
    clone_phase::COMMENTS,
];

/// Stage-side reporter: clamps to `[0, 100]` and never goes backwards.
pub struct MonotonicProgress<'a> {
    sink: &'a dyn ProgressSink,
    last: Option<f64>,
}

impl<'a> MonotonicProgress<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self { sink, last: None }
    }

    /// Reports `value` unless it would not move the bar forward.
    pub async fn emit(&mut self, value: f64) {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 100.0) };
        if self.last.is_some_and(|last| value <= last) {
            return;
        }
        self.last = Some(value);
        self.sink.report(value).await;
    }

    pub async fn phase(&mut self, phase: &Phase, done: usize, total: usize) {
        self.emit(phase.at(done, total)).await;
    }

    /// Emits the terminal 100 exactly once.
    pub async fn finish(&mut self) {
        self.emit(100.0).await;
    }

    pub fn last(&self) -> Option<f64> {
        self.last
    }
}

/// Maps a stage's `0..100` onto `[start, end]` of an outer sink.
pub struct ScaledProgress<'a> {
    inner: &'a dyn ProgressSink,
    start: f64,
    end: f64,
}

impl<'a> ScaledProgress<'a> {
    pub fn new(inner: &'a dyn ProgressSink, start: f64, end: f64) -> Self {
        Self { inner, start, end }
    }
}

#[async_trait]
impl ProgressSink for ScaledProgress<'_> {
    async fn report(&self, value: f64) {
        let fraction = value.clamp(0.0, 100.0) / 100.0;
        self.inner.report(self.start + fraction * (self.end - self.start)).await;
    }
}

/// Caller-owned render throttle: at most one render per interval, but the
/// final 100 always goes through.
#[derive(Debug, Clone)]
pub struct ProgressThrottler {
    interval: Duration,
    last_render: Option<Instant>,
}

impl ProgressThrottler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_render: None,
        }
    }

    pub fn should_render(&mut self, value: f64) -> bool {
        self.should_render_at(value, Instant::now())
    }

    pub fn should_render_at(&mut self, value: f64, now: Instant) -> bool {
        let due = value >= 100.0
            || self
                .last_render
                .map_or(true, |last| now.saturating_duration_since(last) >= self.interval);
        if due {
            self.last_render = Some(now);
        }
        due
    }
}

impl Default for ProgressThrottler {
    fn default() -> Self {
        Self::new(crate::core::config::progress::render_interval())
    }
}

/// Forwards to `inner` only what the throttler lets through.
pub struct ThrottledProgress<S> {
    inner: S,
    throttler: Mutex<ProgressThrottler>,
}

impl<S: ProgressSink> ThrottledProgress<S> {
    pub fn new(inner: S, throttler: ProgressThrottler) -> Self {
        Self {
            inner,
            throttler: Mutex::new(throttler),
        }
    }
}

#[async_trait]
impl<S: ProgressSink> ProgressSink for ThrottledProgress<S> {
    async fn report(&self, value: f64) {
        let render = self
            .throttler
            .lock()
            .map(|mut throttler| throttler.should_render(value))
            .unwrap_or(true);
        if render {
            self.inner.report(value).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// Sink remembering every value it got.
    #[derive(Default, Clone)]
    struct Recorder(Arc<Mutex<Vec<f64>>>);

    impl Recorder {
        fn values(&self) -> Vec<f64> {
            self.0.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProgressSink for Recorder {
        async fn report(&self, value: f64) {
            self.0.lock().unwrap().push(value);
        }
    }

    fn assert_contiguous(table: &[Phase]) {
        assert_eq!(table.first().unwrap().start, 0.0);
        assert_eq!(table.last().unwrap().end, 100.0);
        for pair in table.windows(2) {
            assert_eq!(pair[0].end, pair[1].start, "{} -> {}", pair[0].name, pair[1].name);
            assert!(pair[0].start < pair[0].end);
        }
    }

    #[test]
    fn test_phase_tables_are_contiguous() {
        assert_contiguous(&FETCH_PHASES);
        assert_contiguous(&CLONE_PHASES);
        assert_eq!(clone_phase::ISSUES.start, clone_phase::PROJECT.end);
    }

    #[test]
    fn test_phase_interpolation() {
        let phase = fetch_phase::CHECKLISTS;
        assert_eq!(phase.at(0, 3), 40.0);
        assert_eq!(phase.at(3, 3), 55.0);
        assert_eq!(phase.at(0, 0), 55.0);
        assert_eq!(phase.at(7, 3), 55.0);
        assert!((phase.at(1, 3) - 45.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_monotonic_progress_never_goes_back() {
        let recorder = Recorder::default();
        let mut progress = MonotonicProgress::new(&recorder);

        progress.emit(10.0).await;
        progress.emit(5.0).await;
        progress.emit(10.0).await;
        progress.emit(150.0).await;
        progress.finish().await;

        assert_eq!(recorder.values(), vec![10.0, 100.0]);
        assert_eq!(progress.last(), Some(100.0));
    }

    #[tokio::test]
    async fn test_monotonic_progress_clamps_negative_first_value() {
        let recorder = Recorder::default();
        let mut progress = MonotonicProgress::new(&recorder);
        progress.emit(-3.0).await;
        progress.finish().await;
        assert_eq!(recorder.values(), vec![0.0, 100.0]);
    }

    #[tokio::test]
    async fn test_scaled_progress_maps_into_window() {
        let recorder = Recorder::default();
        let scaled = ScaledProgress::new(&recorder, 50.0, 100.0);
        scaled.report(0.0).await;
        scaled.report(50.0).await;
        scaled.report(100.0).await;
        assert_eq!(recorder.values(), vec![50.0, 75.0, 100.0]);
    }

    #[test]
    fn test_throttler_lets_final_value_through() {
        let mut throttler = ProgressThrottler::new(Duration::from_secs(1));
        let t0 = Instant::now();

        assert!(throttler.should_render_at(1.0, t0));
        assert!(!throttler.should_render_at(2.0, t0 + Duration::from_millis(300)));
        assert!(throttler.should_render_at(100.0, t0 + Duration::from_millis(400)));
        assert!(throttler.should_render_at(3.0, t0 + Duration::from_millis(1500)));
    }

    #[tokio::test]
    async fn test_throttled_progress_always_renders_completion() {
        let recorder = Recorder::default();
        let throttled = ThrottledProgress::new(recorder.clone(), ProgressThrottler::new(Duration::from_secs(3600)));

        for value in [1.0, 20.0, 60.0, 99.0, 100.0] {
            throttled.report(value).await;
        }

        assert_eq!(recorder.values(), vec![1.0, 100.0]);
    }

    #[tokio::test]
    async fn test_callback_adapters() {
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sync_seen = seen.clone();
        FnProgress(move |v| sync_seen.lock().unwrap().push(v)).report(1.0).await;

        let async_seen = seen.clone();
        AsyncFnProgress(move |v| {
            let seen = async_seen.clone();
            async move {
                tokio::task::yield_now().await;
                seen.lock().unwrap().push(v);
            }
        })
        .report(2.0)
        .await;

        NoProgress.report(3.0).await;
        assert_eq!(*seen.lock().unwrap(), vec![1.0, 2.0]);
    }
}
