//! Watch mode: re-run task lists when watched files change
//!
//! The coordinator is a single loop over a channel of [`ChangeEvent`]s. Changed
//! paths are matched against every [`WatchBinding`]; matched bindings are
//! queued and run together once the debounce window has passed without new
//! events. Runs never overlap: events that arrive while tasks are running
//! wait in the channel and are coalesced into the next run.

use crate::error::ConfigResult;
use crate::runner::glob::{build_globset, compile, sample_paths};
use crate::runner::mapping::{with_extension, MappingRule};
use crate::runner::task::{Executor, RunReport};
use anyhow::Context as _;
use globset::GlobSet;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// How long the loop blocks on the channel before checking the debouncer
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Watched patterns bound to an ordered list of tasks or aliases
#[derive(Debug, Clone)]
pub struct WatchBinding {
    pub name: String,
    pub patterns: Vec<String>,
    pub tasks: Vec<String>,
    matcher: GlobSet,
}

impl WatchBinding {
    pub fn new(name: impl Into<String>, patterns: Vec<String>, tasks: Vec<String>) -> ConfigResult<Self> {
        let matcher = build_globset(&patterns)?;
        Ok(WatchBinding {
            name: name.into(),
            patterns,
            tasks,
            matcher,
        })
    }

    /// Whether a root-relative path is watched by this binding
    pub fn matches(&self, rel: &str) -> bool {
        self.matcher.is_match(rel)
    }

    /// Find an output of `rule` that this binding would react to
    ///
    /// Returns the matching watch pattern and the offending output path.
    /// Both directions are sampled: outputs built from the rule's include
    /// patterns are tested against the binding, and paths generated from the
    /// binding's patterns are tested against the rule's output pattern. A
    /// literal watched file that the rule writes is found either way. Two
    /// patterns can still intersect only on paths neither side samples, so
    /// the check rejects the common cases rather than every overlap.
    pub fn overlaps(&self, rule: &MappingRule, root: &Path) -> Option<(String, String)> {
        let dest = rule.dest.as_deref()?;
        let dest = dest.strip_prefix(root).unwrap_or(dest);

        if !rule.expand {
            let dest = slash_path(dest);
            return self.first_match(&dest).map(|pattern| (pattern, dest));
        }

        let outputs = rule
            .includes
            .iter()
            .flat_map(|pattern| sample_paths(pattern))
            .map(|sample| slash_path(&output_path(rule, dest, Path::new(&sample))));
        for output in outputs {
            if let Some(pattern) = self.first_match(&output) {
                return Some((pattern, output));
            }
        }

        let output_globs: Vec<_> = rule
            .includes
            .iter()
            .filter_map(|pattern| {
                let output = slash_path(&output_path(rule, dest, Path::new(pattern)));
                compile(&output).ok()
            })
            .collect();
        for pattern in &self.patterns {
            for sample in sample_paths(pattern) {
                if output_globs.iter().any(|glob| glob.is_match(&sample)) {
                    return Some((pattern.clone(), sample));
                }
            }
        }

        None
    }

    fn first_match(&self, rel: &str) -> Option<String> {
        self.matcher
            .matches(rel)
            .first()
            .map(|&idx| self.patterns[idx].clone())
    }
}

/// Where an expand rule writes a source at `rel`; also works on patterns
fn output_path(rule: &MappingRule, dest: &Path, rel: &Path) -> PathBuf {
    let rel = if rule.flatten {
        rel.file_name().map(PathBuf::from).unwrap_or_else(|| rel.to_path_buf())
    } else {
        rel.to_path_buf()
    };
    let rel = match &rule.ext {
        Some(ext) => with_extension(&rel, ext, rule.ext_dot),
        None => rel,
    };
    dest.join(rel)
}

/// What happened to a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
    Access,
    Other,
}

impl From<&EventKind> for ChangeKind {
    fn from(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Modify(_) => ChangeKind::Modified,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Access(_) => ChangeKind::Access,
            EventKind::Any | EventKind::Other => ChangeKind::Other,
        }
    }
}

/// A single filesystem change notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeEvent {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        ChangeEvent {
            path: path.into(),
            kind,
        }
    }
}

/// Collects triggered bindings until the window passes without new events
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    pending: Vec<String>,
    last: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Debouncer {
            window,
            pending: Vec::new(),
            last: None,
        }
    }

    /// Queue a binding; repeated bindings keep their first position
    pub fn add(&mut self, binding: &str, now: Instant) {
        if !self.pending.iter().any(|b| b == binding) {
            self.pending.push(binding.to_string());
        }
        self.last = Some(now);
    }

    pub fn ready(&self, now: Instant) -> bool {
        match self.last {
            Some(last) => !self.pending.is_empty() && now.duration_since(last) >= self.window,
            None => false,
        }
    }

    pub fn take(&mut self) -> Vec<String> {
        self.last = None;
        std::mem::take(&mut self.pending)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Drives task runs from change events
pub struct WatchCoordinator<'a> {
    executor: Executor<'a>,
    bindings: &'a [WatchBinding],
    roots: Vec<PathBuf>,
    debouncer: Debouncer,
    shutdown: Arc<AtomicBool>,
}

impl fmt::Debug for WatchCoordinator<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchCoordinator")
            .field("bindings", &self.bindings.len())
            .field("roots", &self.roots)
            .field("debouncer", &self.debouncer)
            .finish()
    }
}

impl<'a> WatchCoordinator<'a> {
    /// Create a coordinator for the executor's project
    ///
    /// The shutdown flag is the executor context's cancellation flag, so
    /// stopping the loop also stops a run at its next mapping.
    pub fn new(executor: Executor<'a>) -> Self {
        let project = executor.project();
        let root = project.root.clone();
        let mut roots = vec![root.clone()];
        if let Ok(canonical) = root.canonicalize() {
            if canonical != root {
                roots.push(canonical);
            }
        }

        WatchCoordinator {
            bindings: &project.watch,
            debouncer: Debouncer::new(Duration::from_millis(project.watch_options.debounce)),
            shutdown: executor.context().cancel_flag(),
            executor,
            roots,
        }
    }

    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Process events until shutdown or until the event source disconnects
    ///
    /// `on_report` is called after every binding run. Returns the number of
    /// debounced runs performed.
    pub fn run(&mut self, events: Receiver<ChangeEvent>, mut on_report: impl FnMut(&str, &RunReport)) -> usize {
        let mut runs = 0;

        while !self.shutdown.load(Ordering::SeqCst) {
            match events.recv_timeout(POLL_INTERVAL) {
                Ok(event) => self.handle_event(&event, Instant::now()),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    if !self.debouncer.is_empty() {
                        self.trigger(&mut on_report);
                        runs += 1;
                    }
                    debug!("event source disconnected");
                    break;
                }
            }

            if self.debouncer.ready(Instant::now()) {
                self.trigger(&mut on_report);
                runs += 1;
            }
        }

        info!(runs, "watch stopped");
        runs
    }

    /// Queue every binding whose patterns match the event's path
    pub fn handle_event(&mut self, event: &ChangeEvent, now: Instant) {
        if event.kind == ChangeKind::Access {
            return;
        }
        let Some(rel) = self.relative(&event.path) else {
            debug!(path = %event.path.display(), "change outside the project root");
            return;
        };

        for binding in self.bindings {
            if binding.matches(&rel) {
                debug!(path = %rel, binding = %binding.name, "change matched");
                self.debouncer.add(&binding.name, now);
            }
        }
    }

    fn trigger(&mut self, on_report: &mut impl FnMut(&str, &RunReport)) {
        let queued = self.debouncer.take();
        info!("change detected, running: {}", queued.join(", "));

        for name in queued {
            let Some(binding) = self.bindings.iter().find(|b| b.name == name) else {
                continue;
            };

            match self.executor.run_sequence(&binding.tasks) {
                Ok(report) => {
                    if !report.is_success() {
                        warn!(binding = %binding.name, "watch run failed; waiting for further changes");
                    }
                    on_report(&binding.name, &report);
                }
                Err(e) => error!(binding = %binding.name, "{}", e),
            }

            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }
        }
    }

    fn relative(&self, path: &Path) -> Option<String> {
        self.roots
            .iter()
            .find_map(|root| path.strip_prefix(root).ok())
            .or_else(|| path.is_relative().then_some(path))
            .map(slash_path)
    }
}

/// Keeps the underlying watcher alive; dropping it stops notifications
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Watch `root` recursively and forward changes as [`ChangeEvent`]s
pub fn subscribe(root: &Path) -> anyhow::Result<(WatcherHandle, Receiver<ChangeEvent>)> {
    let (tx, rx) = mpsc::channel();

    let mut watcher = RecommendedWatcher::new(
        move |res: notify::Result<Event>| match res {
            Ok(event) => {
                let kind = ChangeKind::from(&event.kind);
                for path in event.paths {
                    // The receiver is gone once the loop has stopped
                    let _ = tx.send(ChangeEvent { path, kind });
                }
            }
            Err(err) => warn!("file watch error: {}", err),
        },
        Config::default(),
    )
    .context("failed to create file watcher")?;

    watcher
        .watch(root, RecursiveMode::Recursive)
        .with_context(|| format!("failed to watch {}", root.display()))?;

    info!("watching {}", root.display());
    Ok((WatcherHandle { _inner: watcher }, rx))
}

fn slash_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
