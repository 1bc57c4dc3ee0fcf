//! In-memory task collection with derived indices and durable persistence.
//!
//! The store owns three structures that must stay consistent after every
//! public mutation:
//!
//! - `tasks`: the authoritative collection, in insertion order
//! - `by_id`: primary index, id -> position, exactly one entry per task
//! - `by_tag`: tag index, normalized tag -> ids; a task with k tags appears
//!   in exactly k buckets, and empty buckets are pruned
//!
//! A fourth structure, the view cache, memoizes the last filtered view and
//! is invalidated by a dirty flag on every mutation. The flag is set
//! unconditionally; no attempt is made to prove a mutation could not have
//! affected the cached filter.
//!
//! Mutations take `&mut self`, so the borrow checker enforces the
//! single-mutator assumption. Persistence is delegated to a
//! [`DurableFile`], the only component that touches the filesystem.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use chrono::Utc;

use crate::config::{Config, GuardConfig, StoreConfig};
use crate::durable::DurableFile;
use crate::error::{Error, Result};
use crate::tags::{self, TagWarning};
use crate::task::Task;

/// Per-tag completion statistics, computed by scanning one bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TagStats {
    pub done: usize,
    pub total: usize,
}

/// Non-fatal save-time warning from the data-loss guard.
///
/// The guard detects and reports; it never blocks, because refusing a
/// deliberate bulk delete would itself be a correctness bug.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreWarning {
    /// Saving an empty collection over a previously non-empty one
    AllTasksDropped { previous: usize },
    /// The count dropped past the configured ratio from a non-trivial count
    SteepShrink { previous: usize, current: usize },
}

impl fmt::Display for StoreWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreWarning::AllTasksDropped { previous } => write!(
                f,
                "saving an empty task list over {previous} previously saved task(s)"
            ),
            StoreWarning::SteepShrink { previous, current } => write!(
                f,
                "task count dropped from {previous} to {current} since the last save"
            ),
        }
    }
}

/// Memoized result of applying a filter predicate to the collection.
///
/// `revision` increments on every recompute, so a caller holding a previous
/// revision can tell whether anything changed without comparing contents.
#[derive(Debug, Clone, Default)]
pub struct FilteredView {
    key: String,
    ids: Vec<u64>,
    revision: u64,
}

impl FilteredView {
    /// Filter key this view was computed for
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Matching task ids, in collection order
    pub fn ids(&self) -> &[u64] {
        &self.ids
    }

    /// Recompute counter; unchanged means the cached view was reused
    pub fn revision(&self) -> u64 {
        self.revision
    }
}

/// The durable task store.
pub struct TaskStore {
    tasks: Vec<Task>,
    next_id: u64,
    by_id: HashMap<u64, usize>,
    by_tag: HashMap<String, Vec<u64>>,
    view: FilteredView,
    view_dirty: bool,
    last_saved_count: Option<usize>,
    config: StoreConfig,
    guard: GuardConfig,
}

impl TaskStore {
    /// Construct an empty store; call [`TaskStore::load`] to populate it.
    pub fn new(config: Config) -> Self {
        Self {
            tasks: Vec::new(),
            next_id: 1,
            by_id: HashMap::new(),
            by_tag: HashMap::new(),
            view: FilteredView::default(),
            view_dirty: true,
            last_saved_count: None,
            config: config.store,
            guard: config.guard,
        }
    }

    /// Full ordered collection, for callers that sort or paginate outside
    /// the store
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Next id the store will assign
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Create a task from raw field values.
    ///
    /// `tag_input` is a free-form comma-separated string; normalization
    /// warnings go through `warn` and the task is created with the valid
    /// subset. Validation runs before any structure is touched, so a failed
    /// add leaves the store unchanged.
    pub fn add(
        &mut self,
        name: &str,
        comment: &str,
        description: &str,
        priority: u8,
        tag_input: &str,
        warn: impl FnMut(TagWarning),
    ) -> Result<&Task> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "task name cannot be empty".to_string(),
            ));
        }
        self.check_priority(priority)?;

        let tags = tags::normalize(tag_input, self.config.max_tags, warn);
        let task = Task::new(self.next_id, name, comment, description, priority, tags);

        let id = task.id;
        let pos = self.tasks.len();
        for tag in &task.tags {
            self.by_tag.entry(tag.clone()).or_default().push(id);
        }
        self.by_id.insert(id, pos);
        self.tasks.push(task);
        self.next_id += 1;
        self.view_dirty = true;

        Ok(&self.tasks[pos])
    }

    /// O(1) lookup through the primary index
    pub fn get_by_id(&self, id: u64) -> Option<&Task> {
        self.by_id.get(&id).map(|&pos| &self.tasks[pos])
    }

    /// Remove a task, unlinking it from both indices and pruning any tag
    /// bucket that becomes empty. Returns the removed task, or `None` if
    /// the id is unknown.
    pub fn remove(&mut self, id: u64) -> Option<Task> {
        let pos = self.by_id.remove(&id)?;
        let task = self.tasks.remove(pos);

        // Positions after the removed slot shift down by one.
        for entry in self.by_id.values_mut() {
            if *entry > pos {
                *entry -= 1;
            }
        }
        for tag in &task.tags {
            self.unlink_tag(tag, id);
        }
        self.view_dirty = true;

        Some(task)
    }

    /// Edit a task in place. The store snapshots the tag list before the
    /// closure runs and reconciles the tag index afterwards, so a closure
    /// that rewrites `tags` cannot leave the buckets stale. `updated_at`
    /// is bumped and the view cache dirtied whether or not the closure
    /// changed anything.
    ///
    /// # Panics
    /// Panics if the closure changes the task id. Ids are store-assigned
    /// identity; changing one is a programming error, not a recoverable
    /// condition.
    pub fn edit<F>(&mut self, id: u64, f: F) -> Result<&Task>
    where
        F: FnOnce(&mut Task),
    {
        let pos = *self
            .by_id
            .get(&id)
            .ok_or_else(|| Error::InvalidArgument(format!("no task with id {id}")))?;
        let old_tags = self.tasks[pos].tags.clone();

        {
            let task = &mut self.tasks[pos];
            f(task);
            assert_eq!(task.id, id, "task id must not change during edit");
            task.updated_at = Utc::now();
        }

        if self.tasks[pos].tags != old_tags {
            self.reconcile_tags(pos, id, &old_tags);
        }
        self.view_dirty = true;

        Ok(&self.tasks[pos])
    }

    /// Flip the done flag through the edit path, so `completed_at`,
    /// `updated_at`, and the view cache all stay correct.
    pub fn set_done(&mut self, id: u64, done: bool) -> Result<&Task> {
        self.edit(id, |task| task.set_done(done))
    }

    /// Replace a task's tags from a raw tag string, with normalization
    /// warnings through `warn`. The id is checked first so warnings are
    /// only emitted for an operation that can proceed.
    pub fn set_tags(
        &mut self,
        id: u64,
        tag_input: &str,
        warn: impl FnMut(TagWarning),
    ) -> Result<&Task> {
        if !self.by_id.contains_key(&id) {
            return Err(Error::InvalidArgument(format!("no task with id {id}")));
        }
        let tags = tags::normalize(tag_input, self.config.max_tags, warn);
        self.edit(id, move |task| task.tags = tags)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Per-tag `{done, total}` counts. Each bucket is scanned once; the
    /// full collection is never walked.
    pub fn tags_with_stats(&self) -> BTreeMap<String, TagStats> {
        let mut stats = BTreeMap::new();
        for (tag, bucket) in &self.by_tag {
            let mut entry = TagStats {
                done: 0,
                total: bucket.len(),
            };
            for id in bucket {
                let pos = self.by_id[id];
                if self.tasks[pos].done {
                    entry.done += 1;
                }
            }
            stats.insert(tag.clone(), entry);
        }
        stats
    }

    /// Filtered view of the collection, memoized per `key`.
    ///
    /// When `key` matches the cached key and no mutation happened since,
    /// the cached view is returned as-is (same revision). Otherwise the
    /// predicate is applied to the collection in order and the cache is
    /// repopulated with a new revision. The predicate itself comes from an
    /// external filter-expression evaluator; the store only owns caching.
    pub fn filtered_view<P>(&mut self, key: &str, predicate: P) -> &FilteredView
    where
        P: Fn(&Task) -> bool,
    {
        if !self.view_dirty && self.view.key == key {
            return &self.view;
        }

        let ids = self
            .tasks
            .iter()
            .filter(|task| predicate(task))
            .map(|task| task.id)
            .collect();
        self.view = FilteredView {
            key: key.to_string(),
            ids,
            revision: self.view.revision + 1,
        };
        self.view_dirty = false;

        &self.view
    }

    // =========================================================================
    // Persistence
    // =========================================================================

    /// Populate the store from disk.
    ///
    /// An absent file is a first run: the store starts empty and this is
    /// not an error. Corruption (primary and all backups unreadable)
    /// propagates; the documented caller fallback is to start from an
    /// empty collection while leaving the corrupt files on disk.
    pub fn load(&mut self, file: &DurableFile) -> Result<()> {
        let tasks = match file.load_with_recovery::<Vec<Task>>() {
            Ok(tasks) => tasks,
            Err(Error::NotFound(path)) => {
                tracing::info!(path = %path.display(), "no task file yet, starting empty");
                Vec::new()
            }
            Err(err) => return Err(err),
        };

        self.tasks = tasks;
        self.next_id = self
            .tasks
            .iter()
            .map(|task| task.id)
            .max()
            .map_or(1, |max| max + 1);
        self.rebuild_indices();
        self.view_dirty = true;
        self.last_saved_count = Some(self.tasks.len());

        Ok(())
    }

    /// Write the full collection to disk with backup rotation.
    ///
    /// Runs the data-loss guard first: a save that drops every task, or
    /// shrinks the collection past the configured ratio from a non-trivial
    /// count, is reported through `warn` and `tracing` but still written.
    pub fn save(&mut self, file: &DurableFile, mut warn: impl FnMut(StoreWarning)) -> Result<()> {
        let current = self.tasks.len();
        if let Some(previous) = self.last_saved_count {
            if current == 0 && previous > 0 {
                tracing::warn!(previous, "saving an empty task list over existing tasks");
                warn(StoreWarning::AllTasksDropped { previous });
            } else if previous >= self.guard.min_previous
                && (current as f64) < (previous as f64) * (1.0 - self.guard.shrink_ratio)
            {
                tracing::warn!(previous, current, "task count dropped sharply since last save");
                warn(StoreWarning::SteepShrink { previous, current });
            }
        }

        file.save_with_backup(&self.tasks, self.config.indent, true)?;
        self.last_saved_count = Some(current);
        Ok(())
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn check_priority(&self, priority: u8) -> Result<()> {
        if priority < self.config.priority_min || priority > self.config.priority_max {
            return Err(Error::InvalidArgument(format!(
                "priority {priority} out of range {}..={}",
                self.config.priority_min, self.config.priority_max
            )));
        }
        Ok(())
    }

    fn unlink_tag(&mut self, tag: &str, id: u64) {
        if let Some(bucket) = self.by_tag.get_mut(tag) {
            bucket.retain(|&entry| entry != id);
            if bucket.is_empty() {
                self.by_tag.remove(tag);
            }
        }
    }

    fn reconcile_tags(&mut self, pos: usize, id: u64, old_tags: &[String]) {
        let new_tags = self.tasks[pos].tags.clone();
        for tag in old_tags {
            if !new_tags.contains(tag) {
                self.unlink_tag(tag, id);
            }
        }
        for tag in &new_tags {
            if !old_tags.contains(tag) {
                self.by_tag.entry(tag.clone()).or_default().push(id);
            }
        }
    }

    fn rebuild_indices(&mut self) {
        self.by_id.clear();
        self.by_tag.clear();
        for (pos, task) in self.tasks.iter().enumerate() {
            self.by_id.insert(task.id, pos);
            for tag in &task.tags {
                self.by_tag.entry(tag.clone()).or_default().push(task.id);
            }
        }
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new(Config::default())
    }
}
