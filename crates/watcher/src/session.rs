//! Watch session: the reconciliation state machine
//!
//! Every session runs as one tokio task that owns all mutable state
//! (children, timers, retry budgets). The caller keeps a [`WatchSession`]
//! handle that receives events and can close the task. Reconciliation is a
//! sequence of named phases:
//!
//! ```text
//! subscribe root ──► list root ──► diff children ──► stat + subscribe each new entry
//!      │                 │                                    │
//!      ▼                 ▼                                    ▼
//!  missing / retry    file mode                     yield between entries
//! ```
//!
//! Only one reconciliation runs at a time. Requests that arrive while one
//! is in flight are merged into a single follow-up pass.

use crate::config::WatchOptions;
use crate::debounce::DebounceTable;
use crate::error::{ErrorCode, PlatformError, Result, WatchError};
use crate::event::{EntryStat, RawKind, RawNotification, WatchEvent};
use crate::filter::NameFilter;
use crate::platform::{Adapters, RawSink, Subscription};
use crate::poll::MissingPoller;
use crate::reconcile::ChildSet;
use crate::retry::{RetryBudget, RetryPolicy};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Notify};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace, warn};

/// Key of the root subscription and the root debounce slot
const ROOT_KEY: &str = "";

/// Observable shape of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// First reconciliation has not finished yet
    Initializing,
    WatchingFile,
    WatchingDirectory,
    /// Root does not exist; the missing-path poller is active
    Missing,
    Closed,
}

struct ActiveSubscription {
    generation: u64,
    handle: Box<dyn Subscription>,
}

/// State shared between the handle and the session task
///
/// Subscriptions live here so that `close()` can release every native
/// watch before it returns.
struct Shared {
    closed: AtomicBool,
    wake: Notify,
    subscriptions: Mutex<HashMap<String, ActiveSubscription>>,
    phase: Mutex<Phase>,
}

impl Shared {
    fn new() -> Self {
        Self {
            closed: AtomicBool::new(false),
            wake: Notify::new(),
            subscriptions: Mutex::new(HashMap::new()),
            phase: Mutex::new(Phase::Initializing),
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns true only for the call that actually closed the session
    fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        let released = mem::take(&mut *self.subscriptions.lock());
        drop(released);
        *self.phase.lock() = Phase::Closed;
        self.wake.notify_one();
        true
    }

    fn insert_subscription(&self, key: &str, subscription: ActiveSubscription) -> bool {
        let mut subscriptions = self.subscriptions.lock();
        if self.is_closed() {
            return false;
        }
        subscriptions.insert(key.to_string(), subscription);
        true
    }

    fn release_subscription(&self, key: &str) -> bool {
        let released = self.subscriptions.lock().remove(key);
        match released {
            Some(subscription) => {
                trace!("Released {}", subscription.handle.path().display());
                true
            }
            None => false,
        }
    }

    fn has_subscription(&self, key: &str) -> bool {
        self.subscriptions.lock().contains_key(key)
    }

    fn subscription_generation(&self, key: &str) -> Option<u64> {
        self.subscriptions.lock().get(key).map(|s| s.generation)
    }

    fn subscription_count(&self) -> usize {
        self.subscriptions.lock().len()
    }

    fn set_phase(&self, next: Phase) {
        let mut phase = self.phase.lock();
        if *phase != next && *phase != Phase::Closed {
            debug!("Session phase {:?} -> {:?}", *phase, next);
            *phase = next;
        }
    }
}

/// Closes a session from anywhere, without borrowing the handle
#[derive(Clone)]
pub struct CloseHandle {
    shared: Arc<Shared>,
}

impl CloseHandle {
    pub fn close(&self) {
        self.shared.close();
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }
}

/// Handle to a watched root path
///
/// Created by [`WatchSession::open`]. The first reconciliation runs on the
/// next scheduling turn, so no event can be missed between `open` and the
/// first call to [`next_event`](WatchSession::next_event). Dropping the
/// handle closes the session.
pub struct WatchSession {
    root: PathBuf,
    events: mpsc::UnboundedReceiver<WatchEvent>,
    shared: Arc<Shared>,
}

impl WatchSession {
    /// Watch `path` using the native notification and listing adapters
    pub fn open(path: impl Into<PathBuf>, options: WatchOptions) -> Result<Self> {
        Self::open_with(path, options, Adapters::native())
    }

    /// Watch `path` through the given adapters
    pub fn open_with(
        path: impl Into<PathBuf>,
        options: WatchOptions,
        adapters: Adapters,
    ) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| WatchError::NoRuntime)?;
        let filter = NameFilter::from_options(&options)?;
        let root: PathBuf = path.into();
        if filter.is_active() {
            debug!("Reporting only matching children of {}", root.display());
        }

        let (event_tx, events) = mpsc::unbounded_channel();
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared::new());

        let session = Session {
            root: root.clone(),
            filter,
            retry: RetryPolicy::from_options(&options),
            adapters,
            shared: Arc::clone(&shared),
            events: event_tx,
            raw_tx,
            raw_rx,
            ready: false,
            listed: false,
            exists: false,
            is_file: false,
            entries: ChildSet::new(),
            timers: DebounceTable::new(options.change_timeout()),
            poller: MissingPoller::new(options.missing_poll()),
            root_budget: None,
            root_retry_at: None,
            generation: 0,
            reconciling: false,
            reconcile_again: false,
            reconcile_pending: false,
        };

        info!("Watching {}", root.display());
        runtime.spawn(session.run());

        Ok(Self {
            root,
            events,
            shared,
        })
    }

    /// Wait for the next event; `None` once the session is closed
    pub async fn next_event(&mut self) -> Option<WatchEvent> {
        if self.shared.is_closed() {
            return None;
        }
        let event = self.events.recv().await?;
        if self.shared.is_closed() {
            return None;
        }
        Some(event)
    }

    /// Next event if one is already queued
    pub fn try_next_event(&mut self) -> Option<WatchEvent> {
        if self.shared.is_closed() {
            return None;
        }
        self.events.try_recv().ok()
    }

    /// Stop watching: releases every subscription and discards pending timers
    ///
    /// Idempotent; no event is delivered after the first call.
    pub fn close(&self) {
        if self.shared.close() {
            info!("Closed watch on {}", self.root.display());
        }
    }

    pub fn close_handle(&self) -> CloseHandle {
        CloseHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn phase(&self) -> Phase {
        *self.shared.phase.lock()
    }

    /// Number of native subscriptions currently held
    pub fn active_subscriptions(&self) -> usize {
        self.shared.subscription_count()
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.close();
    }
}

/// Why work on a single entry stopped early
enum EntryFailure {
    /// Permission retries ran out
    Exhausted,
    /// A non-recoverable platform error
    Fatal(PlatformError),
    /// The session was closed mid-operation
    Closed,
}

/// Session task state
struct Session {
    root: PathBuf,
    filter: NameFilter,
    retry: RetryPolicy,
    adapters: Adapters,
    shared: Arc<Shared>,
    events: mpsc::UnboundedSender<WatchEvent>,
    raw_tx: mpsc::UnboundedSender<RawNotification>,
    raw_rx: mpsc::UnboundedReceiver<RawNotification>,

    ready: bool,
    /// The pre-ready `list` event has been emitted
    listed: bool,
    exists: bool,
    is_file: bool,
    entries: ChildSet,
    timers: DebounceTable<WatchEvent>,
    poller: MissingPoller,

    /// Budget carried across root subscribe retries
    root_budget: Option<RetryBudget>,
    root_retry_at: Option<Instant>,
    /// Incremented per subscription so stale notifications can be dropped
    generation: u64,

    reconciling: bool,
    reconcile_again: bool,
    reconcile_pending: bool,
}

impl Session {
    async fn run(mut self) {
        // Never reconcile inline with open()
        tokio::task::yield_now().await;
        self.request_reconcile();

        loop {
            if mem::take(&mut self.reconcile_pending) {
                self.reconcile().await;
            }
            if self.is_closed() {
                break;
            }

            let deadline = self.next_deadline();
            tokio::select! {
                biased;
                _ = self.shared.wake.notified() => {}
                Some(raw) = self.raw_rx.recv() => self.on_raw(raw),
                _ = sleep_until_deadline(deadline) => self.fire_due(),
            }
        }

        self.teardown();
    }

    fn is_closed(&self) -> bool {
        self.shared.is_closed()
    }

    fn request_reconcile(&mut self) {
        if self.reconciling {
            self.reconcile_again = true;
        } else {
            self.reconcile_pending = true;
        }
    }

    async fn reconcile(&mut self) {
        if self.reconciling {
            self.reconcile_again = true;
            return;
        }

        self.reconciling = true;
        loop {
            self.reconcile_cycle().await;
            if self.is_closed() || !mem::take(&mut self.reconcile_again) {
                break;
            }
            debug!("Running coalesced reconciliation for {}", self.root.display());
        }
        self.reconciling = false;
    }

    async fn reconcile_cycle(&mut self) {
        if self.is_closed() {
            return;
        }
        debug!("Reconciling {}", self.root.display());

        if !self.shared.has_subscription(ROOT_KEY) {
            match self.subscribe(ROOT_KEY) {
                Ok(()) => {
                    self.root_budget = None;
                    self.poller.disarm();
                    self.announce_root();
                }
                Err(err) => match err.code {
                    ErrorCode::NotFound => {
                        self.root_budget = None;
                        self.timers.cancel(ROOT_KEY);
                        self.mark_missing();
                        self.finish_cycle();
                        return;
                    }
                    ErrorCode::TransientPermission => {
                        let mut budget = self
                            .root_budget
                            .take()
                            .unwrap_or_else(|| self.retry.budget());
                        if let Some(delay) = budget.consume() {
                            debug!(
                                "{}; retrying root subscription in {:?} ({} left)",
                                err,
                                delay,
                                budget.remaining()
                            );
                            self.root_budget = Some(budget);
                            self.root_retry_at = Some(Instant::now() + delay);
                            // The scheduled retry is the follow-up pass
                            self.reconcile_again = false;
                            return;
                        }
                        warn!("Permission retries exhausted for {}", self.root.display());
                        self.fatal(err);
                        self.finish_cycle();
                        return;
                    }
                    _ => {
                        self.root_budget = None;
                        self.fatal(err);
                        self.finish_cycle();
                        return;
                    }
                },
            }
        }

        let fs = Arc::clone(&self.adapters.fs);
        let listing = fs.list(&self.root).await;
        if self.is_closed() {
            return;
        }

        let settled = match listing {
            Ok(names) => self.watch_directory(names).await,
            Err(err) => {
                match err.code {
                    ErrorCode::NotADirectory => self.watch_file(),
                    ErrorCode::NotFound => {
                        // Vanished between subscribe and list
                        self.release_root();
                        self.mark_missing();
                    }
                    _ => self.fatal(err),
                }
                true
            }
        };

        // An unsettled first pass leaves ready to the forced rescan
        if settled && !self.is_closed() {
            self.finish_cycle();
        }
    }

    fn finish_cycle(&mut self) {
        if !self.ready {
            self.ready = true;
            self.emit(WatchEvent::Ready { error: None });
        }
    }

    /// Root confirmed present; emits `add` when it (re)appeared after ready
    fn announce_root(&mut self) {
        if self.ready && !self.exists {
            self.emit(WatchEvent::Add {
                name: None,
                stat: None,
            });
        }
        self.exists = true;
    }

    /// Root confirmed absent: forget its contents and start polling
    fn mark_missing(&mut self) {
        self.forget_children();
        self.poller.arm(Instant::now());
        self.shared.set_phase(Phase::Missing);

        let existed = mem::replace(&mut self.exists, false);
        if !existed || !self.ready {
            return;
        }
        if self.is_file {
            // A watched file is usually replaced, not deleted; the
            // replacement shows up as `add`
            debug!("Suppressing remove for watched file {}", self.root.display());
        } else {
            self.emit(WatchEvent::Remove { name: None });
        }
    }

    fn watch_file(&mut self) {
        if !self.entries.is_empty() {
            self.forget_children();
        }
        self.is_file = true;
        self.shared.set_phase(Phase::WatchingFile);
        self.announce_root();
    }

    /// Returns false when the pass must be repeated before it counts
    async fn watch_directory(&mut self, names: Vec<String>) -> bool {
        if self.is_file {
            self.timers.cancel(ROOT_KEY);
        }
        self.is_file = false;
        self.shared.set_phase(Phase::WatchingDirectory);

        let first_listing = !self.ready && !self.listed;
        if first_listing {
            self.listed = true;
            self.emit(WatchEvent::List {
                names: names.clone(),
            });
        }
        self.announce_root();
        self.reconcile_children(&names, first_listing).await
    }

    async fn reconcile_children(&mut self, names: &[String], first_listing: bool) -> bool {
        // Everything established before ready is discovery, not addition
        let first_discovery = !self.ready;
        let diff = self.entries.reconcile(names, first_listing);
        let mut added = diff.added;
        if !first_listing {
            // Files replaced in place lost their subscription with the old node
            for name in names {
                if self.is_orphaned(name) && !added.contains(name) {
                    debug!("Re-establishing replaced {}", name);
                    added.push(name.clone());
                }
            }
        }

        for name in diff.dropped_dirs {
            self.emit(WatchEvent::RemoveDir { name });
        }

        for name in diff.dropped {
            self.release_child(&name);
            if self.filter.matches(&name) {
                self.emit(WatchEvent::Remove { name: Some(name) });
            }
        }

        let mut pending: VecDeque<String> = added.into();
        while let Some(name) = pending.pop_front() {
            // Let close() land before touching more native resources
            tokio::task::yield_now().await;
            self.pump();
            if self.is_closed() {
                return true;
            }

            match self.establish_child(&name, first_discovery).await {
                Ok(()) => {}
                Err(EntryFailure::Closed) => return true,
                Err(EntryFailure::Exhausted) => {
                    warn!("Permission retries exhausted for {}; rescanning", name);
                    self.abandon(&name, pending);
                    self.reconcile_again = true;
                    return false;
                }
                Err(EntryFailure::Fatal(err)) => {
                    self.abandon(&name, pending);
                    self.report_error(err);
                    return true;
                }
            }
        }
        true
    }

    /// A known, reportable file without a live subscription
    fn is_orphaned(&self, name: &str) -> bool {
        self.entries.contains(name)
            && !self.entries.is_directory(name)
            && self.filter.matches(name)
            && !self.shared.has_subscription(name)
    }

    /// Stat, classify and subscribe one newly listed entry
    async fn establish_child(
        &mut self,
        name: &str,
        first_discovery: bool,
    ) -> std::result::Result<(), EntryFailure> {
        let path = self.root.join(name);

        let Some(stat) = self.stat_entry(&path).await? else {
            trace!("{} vanished before stat", path.display());
            self.entries.forget(name);
            return Ok(());
        };

        if stat.is_dir() {
            self.entries.mark_directory(name);
            let name = name.to_string();
            self.emit(if first_discovery {
                WatchEvent::ChildDir { name, stat }
            } else {
                WatchEvent::AddDir { name, stat }
            });
            return Ok(());
        }

        if !self.filter.matches(name) {
            trace!("Skipping filtered entry {}", name);
            return Ok(());
        }

        if !self.subscribe_entry(name).await? {
            trace!("{} vanished before subscribe", path.display());
            self.entries.forget(name);
            return Ok(());
        }

        if first_discovery {
            self.emit(WatchEvent::Child {
                name: name.to_string(),
                stat,
            });
        } else {
            let event_name = name.to_string();
            self.timers.arm(name, Instant::now(), move || WatchEvent::Add {
                name: Some(event_name),
                stat: Some(stat),
            });
        }
        Ok(())
    }

    /// `Ok(None)` when the entry no longer exists
    async fn stat_entry(
        &mut self,
        path: &Path,
    ) -> std::result::Result<Option<EntryStat>, EntryFailure> {
        let fs = Arc::clone(&self.adapters.fs);
        let mut budget = self.retry.budget();

        loop {
            let result = fs.stat(path).await;
            if self.is_closed() {
                return Err(EntryFailure::Closed);
            }

            match result {
                Ok(stat) => return Ok(Some(stat)),
                Err(err) => match err.code {
                    ErrorCode::NotFound | ErrorCode::NotADirectory => return Ok(None),
                    ErrorCode::TransientPermission => self.ease(&mut budget, &err).await?,
                    ErrorCode::Other(_) => return Err(EntryFailure::Fatal(err)),
                },
            }
        }
    }

    /// `Ok(false)` when the entry no longer exists
    async fn subscribe_entry(&mut self, name: &str) -> std::result::Result<bool, EntryFailure> {
        let mut budget = self.retry.budget();

        loop {
            match self.subscribe(name) {
                Ok(()) => return Ok(true),
                Err(err) => match err.code {
                    ErrorCode::NotFound | ErrorCode::NotADirectory => return Ok(false),
                    ErrorCode::TransientPermission => self.ease(&mut budget, &err).await?,
                    ErrorCode::Other(_) => return Err(EntryFailure::Fatal(err)),
                },
            }
        }
    }

    /// Wait out one permission retry
    async fn ease(
        &mut self,
        budget: &mut RetryBudget,
        err: &PlatformError,
    ) -> std::result::Result<(), EntryFailure> {
        let Some(delay) = budget.consume() else {
            return Err(EntryFailure::Exhausted);
        };
        debug!("{}; retrying in {:?} ({} left)", err, delay, budget.remaining());

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.shared.wake.notified() => {}
        }
        self.pump();

        if self.is_closed() {
            Err(EntryFailure::Closed)
        } else {
            Ok(())
        }
    }

    /// Drop `name` and everything still queued so a later pass rediscovers them
    fn abandon(&mut self, name: &str, rest: VecDeque<String>) {
        self.release_child(name);
        self.entries.forget(name);
        for name in rest {
            self.release_child(&name);
            self.entries.forget(&name);
        }
    }

    fn subscribe(&mut self, key: &str) -> std::result::Result<(), PlatformError> {
        let path = self.path_for(key);
        self.generation += 1;
        let generation = self.generation;

        let sink = RawSink::new(key, generation, self.raw_tx.clone());
        let handle = self.adapters.notifier.subscribe(&path, sink)?;
        trace!("Subscribed to {} (generation {})", path.display(), generation);

        // If close() won the race the handle is dropped right here
        self.shared.insert_subscription(
            key,
            ActiveSubscription {
                generation,
                handle,
            },
        );
        Ok(())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        if key.is_empty() {
            self.root.clone()
        } else {
            self.root.join(key)
        }
    }

    fn release_root(&mut self) {
        self.shared.release_subscription(ROOT_KEY);
        self.timers.cancel(ROOT_KEY);
    }

    fn release_child(&mut self, name: &str) {
        self.shared.release_subscription(name);
        self.timers.cancel(name);
    }

    fn forget_children(&mut self) {
        let names: Vec<String> = self.entries.names().map(str::to_string).collect();
        for name in &names {
            self.release_child(name);
        }
        self.entries.clear();
    }

    /// Root-level failure: the root is no longer considered present
    fn fatal(&mut self, err: PlatformError) {
        self.exists = false;
        self.report_error(err);
    }

    fn report_error(&mut self, err: PlatformError) {
        warn!("Watch on {} failed: {}", self.root.display(), err);
        if !self.ready {
            self.ready = true;
            self.emit(WatchEvent::Ready {
                error: Some(err.clone()),
            });
        }
        self.emit(WatchEvent::Error { error: err });
    }

    fn on_raw(&mut self, raw: RawNotification) {
        if self.is_closed() {
            return;
        }
        if self.shared.subscription_generation(&raw.key) != Some(raw.generation) {
            trace!("Dropping stale notification for {:?}", raw.key);
            return;
        }
        trace!("Raw {:?} {:?} via {:?}", raw.kind, raw.name, raw.key);

        if raw.key.is_empty() {
            if self.is_file && raw.kind == RawKind::Rename {
                // The watched file itself went away; its replacement is new
                self.release_root();
                self.exists = false;
                self.request_reconcile();
                return;
            }
            let unknown_child = raw
                .name
                .as_deref()
                .is_some_and(|name| !self.entries.contains(name));
            if raw.kind == RawKind::Rename || (!self.is_file && unknown_child) {
                self.request_reconcile();
            }
            if self.is_file && raw.kind == RawKind::Change {
                self.arm_change(ROOT_KEY);
            }
        } else {
            match raw.kind {
                RawKind::Rename => {
                    // The subscription died with the node it watched
                    self.release_child(&raw.key);
                    self.request_reconcile();
                }
                RawKind::Change => self.arm_change(&raw.key),
            }
        }
    }

    fn arm_change(&mut self, key: &str) {
        let name = (!key.is_empty()).then(|| key.to_string());
        self.timers
            .arm(key, Instant::now(), move || WatchEvent::Change { name });
    }

    /// Handle notifications and due timers without leaving the current cycle
    fn pump(&mut self) {
        while let Ok(raw) = self.raw_rx.try_recv() {
            self.on_raw(raw);
        }
        self.fire_due();
    }

    fn fire_due(&mut self) {
        let now = Instant::now();

        for (_, event) in self.timers.take_due(now) {
            self.emit(event);
        }

        if self.poller.take_due(now) {
            debug!("Polling for missing {}", self.root.display());
            self.request_reconcile();
        }

        if self.root_retry_at.is_some_and(|at| at <= now) {
            self.root_retry_at = None;
            self.request_reconcile();
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        [
            self.timers.next_deadline(),
            self.poller.deadline(),
            self.root_retry_at,
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn emit(&self, event: WatchEvent) {
        if self.is_closed() {
            return;
        }
        debug!("Emit {} {:?}", event.kind(), event.name());
        let _ = self.events.send(event);
    }

    fn teardown(&mut self) {
        self.shared.close();
        self.timers.clear();
        self.poller.disarm();
        self.root_retry_at = None;
        self.entries.clear();
        debug!("Session task for {} finished", self.root.display());
    }
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
