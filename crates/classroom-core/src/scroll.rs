//! Scroll position persistence.
//!
//! Keeps a scrollable element and a stored scroll offset in step across
//! navigation:
//!
//! - when the dependency value changes (a different list is shown), the
//!   stored offset is written into the element;
//! - later scroll events read the element's offset and report it through
//!   the persist callback so the session can store it.
//!
//! Writing the offset makes the element fire a scroll event of its own.
//! Reporting that event would store the value just restored, and a second
//! restore racing it could store a stale one. Every restore therefore opens
//! a suppression window (100 ms by default) during which scroll events are
//! ignored. The window closes from a cancellable task on the tokio runtime;
//! a new restore aborts the pending task so only one window is ever open.
//!
//! ```ignore
//! let mut scroll = ScrollPersistence::new(move |offset| {
//!     provider.update_teacher_state(TeacherStatePatch::new().scroll_position(offset));
//! })?;
//! scroll.bind(list_view);
//!
//! // on every render
//! scroll.sync(session.teacher_state.scroll_position, (class_id, subject_id));
//!
//! // from the element's scroll handler
//! scroll.handle_scroll();
//! ```

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// How long scroll events are ignored after a restore.
pub const DEFAULT_SUPPRESSION_WINDOW: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollConfig {
    pub suppression_window: Duration,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            suppression_window: DEFAULT_SUPPRESSION_WINDOW,
        }
    }
}

#[derive(Error, Debug)]
pub enum ScrollError {
    #[error("scroll persistence needs a tokio runtime: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),
}

/// A scrollable element.
pub trait ScrollTarget: Send + Sync {
    /// Current vertical scroll offset.
    fn scroll_top(&self) -> f64;

    /// Move the element to `offset`.
    fn set_scroll_top(&self, offset: f64);
}

type PersistFn = Box<dyn Fn(f64) + Send + Sync>;

/// Restores and reports the scroll offset of one element.
///
/// `D` is the dependency value; a restore happens whenever
/// [`sync`](Self::sync) sees a value different from the previous one.
pub struct ScrollPersistence<D> {
    runtime: Handle,
    config: ScrollConfig,
    target: Option<Arc<dyn ScrollTarget>>,
    on_persist: PersistFn,
    /// Last offset known to be stored.
    stored_offset: f64,
    deps: Option<D>,
    /// Generation of the open suppression window, if any.
    suppression: Arc<Mutex<Option<u64>>>,
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl<D: PartialEq> ScrollPersistence<D> {
    /// Create with the default suppression window.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<F>(on_persist: F) -> Result<Self, ScrollError>
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        Self::with_config(ScrollConfig::default(), on_persist)
    }

    pub fn with_config<F>(config: ScrollConfig, on_persist: F) -> Result<Self, ScrollError>
    where
        F: Fn(f64) + Send + Sync + 'static,
    {
        Ok(Self {
            runtime: Handle::try_current()?,
            config,
            target: None,
            on_persist: Box::new(on_persist),
            stored_offset: 0.0,
            deps: None,
            suppression: Arc::new(Mutex::new(None)),
            generation: 0,
            timer: None,
        })
    }

    /// Attach the element to restore into and read from.
    ///
    /// The next [`sync`](Self::sync) restores into it whatever its deps.
    pub fn bind(&mut self, target: Arc<dyn ScrollTarget>) {
        self.target = Some(target);
        self.deps = None;
    }

    /// Detach the element and close any open window.
    pub fn unbind(&mut self) {
        self.target = None;
        self.cancel_window();
    }

    /// Feed the current stored offset and dependency value.
    ///
    /// Restores when `deps` differs from the previous call (the first call
    /// after [`bind`](Self::bind) always counts as a change). Without a
    /// bound element only the stored offset is recorded.
    pub fn sync(&mut self, stored_offset: f64, deps: D) {
        self.stored_offset = stored_offset;

        if self.target.is_none() || self.deps.as_ref() == Some(&deps) {
            return;
        }
        self.deps = Some(deps);
        self.restore();
    }

    /// Handle a scroll event from the bound element.
    ///
    /// Inside a suppression window the event is ignored. Otherwise a live
    /// offset that differs from the stored one is reported.
    pub fn handle_scroll(&mut self) {
        if self.is_restoring() {
            return;
        }
        let Some(target) = &self.target else {
            return;
        };

        let offset = target.scroll_top();
        if offset != self.stored_offset {
            self.stored_offset = offset;
            (self.on_persist)(offset);
        }
    }

    /// True while a suppression window is open.
    pub fn is_restoring(&self) -> bool {
        self.suppression
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn restore(&mut self) {
        self.cancel_window();

        let Some(target) = &self.target else {
            return;
        };
        if self.stored_offset <= 0.0 {
            return;
        }

        self.generation += 1;
        let generation = self.generation;
        *self
            .suppression
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(generation);

        log::trace!("Restoring scroll offset {}", self.stored_offset);
        target.set_scroll_top(self.stored_offset);

        let suppression = Arc::clone(&self.suppression);
        let window = self.config.suppression_window;
        self.timer = Some(self.runtime.spawn(async move {
            tokio::time::sleep(window).await;
            let mut active = suppression.lock().unwrap_or_else(PoisonError::into_inner);
            if *active == Some(generation) {
                *active = None;
            }
        }));
    }

    fn cancel_window(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        *self
            .suppression
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl<D> Drop for ScrollPersistence<D> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[derive(Default)]
    struct FakeList {
        offset: Mutex<f64>,
        writes: Mutex<Vec<f64>>,
    }

    impl FakeList {
        /// The user drags the list to `offset`.
        fn user_scroll(&self, offset: f64) {
            *self.offset.lock().unwrap() = offset;
        }

        fn writes(&self) -> Vec<f64> {
            self.writes.lock().unwrap().clone()
        }
    }

    impl ScrollTarget for FakeList {
        fn scroll_top(&self) -> f64 {
            *self.offset.lock().unwrap()
        }

        fn set_scroll_top(&self, offset: f64) {
            *self.offset.lock().unwrap() = offset;
            self.writes.lock().unwrap().push(offset);
        }
    }

    fn setup() -> (
        ScrollPersistence<&'static str>,
        Arc<FakeList>,
        Arc<Mutex<Vec<f64>>>,
    ) {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reported);
        let mut scroll = ScrollPersistence::new(move |offset| {
            sink.lock().unwrap().push(offset);
        })
        .unwrap();

        let list = Arc::new(FakeList::default());
        scroll.bind(list.clone());
        (scroll, list, reported)
    }

    fn reported(sink: &Arc<Mutex<Vec<f64>>>) -> Vec<f64> {
        sink.lock().unwrap().clone()
    }

    #[test]
    fn new_outside_runtime_is_error() {
        let result = ScrollPersistence::<u32>::new(|_| {});
        assert!(matches!(result, Err(ScrollError::NoRuntime(_))));
    }

    #[test]
    fn default_window_is_100ms() {
        assert_eq!(
            ScrollConfig::default().suppression_window,
            Duration::from_millis(100)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn restore_then_suppress_then_report() {
        let (mut scroll, list, sink) = setup();

        scroll.sync(340.0, "lessons");
        assert_eq!(list.scroll_top(), 340.0);
        assert!(scroll.is_restoring());

        sleep(Duration::from_millis(50)).await;
        list.user_scroll(360.0);
        scroll.handle_scroll();
        assert!(reported(&sink).is_empty());

        sleep(Duration::from_millis(100)).await;
        assert!(!scroll.is_restoring());
        list.user_scroll(380.0);
        scroll.handle_scroll();
        assert_eq!(reported(&sink), vec![380.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_offset_does_not_restore() {
        let (mut scroll, list, sink) = setup();

        scroll.sync(0.0, "lessons");
        assert!(list.writes().is_empty());
        assert!(!scroll.is_restoring());

        list.user_scroll(25.0);
        scroll.handle_scroll();
        assert_eq!(reported(&sink), vec![25.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn unchanged_deps_do_not_restore_again() {
        let (mut scroll, list, _sink) = setup();

        scroll.sync(340.0, "lessons");
        sleep(Duration::from_millis(150)).await;
        scroll.sync(340.0, "lessons");
        scroll.sync(500.0, "lessons");

        assert_eq!(list.writes(), vec![340.0]);
        assert!(!scroll.is_restoring());
    }

    #[tokio::test(start_paused = true)]
    async fn dependency_change_restores_new_offset() {
        let (mut scroll, list, _sink) = setup();

        scroll.sync(340.0, "units");
        sleep(Duration::from_millis(150)).await;
        scroll.sync(90.0, "lessons");

        assert_eq!(list.writes(), vec![340.0, 90.0]);
        assert_eq!(list.scroll_top(), 90.0);
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_changes_keep_a_single_window() {
        let (mut scroll, list, sink) = setup();

        scroll.sync(340.0, "units");
        sleep(Duration::from_millis(60)).await;
        scroll.sync(200.0, "lessons");

        // The first window would have closed at 100ms; the second runs to 160ms.
        sleep(Duration::from_millis(60)).await;
        list.user_scroll(210.0);
        scroll.handle_scroll();
        assert!(reported(&sink).is_empty());
        assert!(scroll.is_restoring());

        sleep(Duration::from_millis(50)).await;
        list.user_scroll(220.0);
        scroll.handle_scroll();
        assert_eq!(reported(&sink), vec![220.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn change_to_zero_offset_closes_open_window() {
        let (mut scroll, list, sink) = setup();

        scroll.sync(340.0, "units");
        scroll.sync(0.0, "lessons");
        assert!(!scroll.is_restoring());

        list.user_scroll(15.0);
        scroll.handle_scroll();
        assert_eq!(reported(&sink), vec![15.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_matching_stored_offset_is_not_reported() {
        let (mut scroll, list, sink) = setup();

        scroll.sync(0.0, "lessons");
        scroll.sync(120.0, "lessons");
        list.user_scroll(120.0);
        scroll.handle_scroll();

        assert!(reported(&sink).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_scroll_reports_each_new_offset_once() {
        let (mut scroll, list, sink) = setup();
        scroll.sync(0.0, "lessons");

        list.user_scroll(10.0);
        scroll.handle_scroll();
        scroll.handle_scroll();
        list.user_scroll(30.0);
        scroll.handle_scroll();

        assert_eq!(reported(&sink), vec![10.0, 30.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn unbound_target_is_ignored() {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reported);
        let mut scroll = ScrollPersistence::new(move |offset| {
            sink.lock().unwrap().push(offset);
        })
        .unwrap();

        scroll.sync(340.0, "lessons");
        scroll.handle_scroll();

        assert!(!scroll.is_restoring());
        assert!(reported.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn sync_before_bind_restores_after_bind() {
        let mut scroll = ScrollPersistence::new(|_| {}).unwrap();
        scroll.sync(340.0, "lessons");

        let list = Arc::new(FakeList::default());
        scroll.bind(list.clone());
        assert!(list.writes().is_empty());

        scroll.sync(340.0, "lessons");
        assert_eq!(list.writes(), vec![340.0]);
        assert!(scroll.is_restoring());
    }

    #[tokio::test(start_paused = true)]
    async fn rebinding_restores_into_new_element() {
        let (mut scroll, first, _sink) = setup();
        scroll.sync(340.0, "lessons");
        sleep(Duration::from_millis(150)).await;

        let second = Arc::new(FakeList::default());
        scroll.bind(second.clone());
        scroll.sync(340.0, "lessons");

        assert_eq!(first.writes(), vec![340.0]);
        assert_eq!(second.writes(), vec![340.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn unbind_closes_window() {
        let (mut scroll, _list, _sink) = setup();

        scroll.sync(340.0, "lessons");
        assert!(scroll.is_restoring());

        scroll.unbind();
        assert!(!scroll.is_restoring());
    }

    #[tokio::test(start_paused = true)]
    async fn custom_window_length() {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reported);
        let config = ScrollConfig {
            suppression_window: Duration::from_millis(500),
        };
        let mut scroll = ScrollPersistence::with_config(config, move |offset| {
            sink.lock().unwrap().push(offset);
        })
        .unwrap();
        let list = Arc::new(FakeList::default());
        scroll.bind(list.clone());

        scroll.sync(340.0, 1u32);
        sleep(Duration::from_millis(300)).await;
        assert!(scroll.is_restoring());
        sleep(Duration::from_millis(250)).await;
        assert!(!scroll.is_restoring());
    }

    #[tokio::test(start_paused = true)]
    async fn restores_through_session_provider() {
        use crate::session::{SessionConfig, SessionProvider, TeacherStatePatch};
        use crate::storage::MemoryStorage;

        let provider = SessionProvider::new(Arc::new(MemoryStorage::new()), SessionConfig::default());
        provider.update_teacher_state(TeacherStatePatch::new().scroll_position(340.0));

        let writer = provider.clone();
        let mut scroll = ScrollPersistence::new(move |offset| {
            writer.update_teacher_state(TeacherStatePatch::new().scroll_position(offset));
        })
        .unwrap();
        let list = Arc::new(FakeList::default());
        scroll.bind(list.clone());

        scroll.sync(provider.session().teacher_state.scroll_position, "c1/s1");
        assert_eq!(list.scroll_top(), 340.0);

        sleep(Duration::from_millis(150)).await;
        list.user_scroll(512.0);
        scroll.handle_scroll();

        assert_eq!(provider.session().teacher_state.scroll_position, 512.0);
    }
}
