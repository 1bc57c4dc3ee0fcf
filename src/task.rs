//! Task model and wire format.
//!
//! In memory a task carries a single canonical `tags` list. The historical
//! file format also has a single-value `tag` field mirroring `tags[0]`; that
//! mirror exists only at the serialization boundary (`TaskRecord`), so the
//! two can never drift apart while the process is running. On read, a file
//! that predates the `tags` list is back-filled from the legacy field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single task. Identity is the store-assigned `id`; everything else is
/// caller-editable through the store's `edit` path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TaskRecord", into = "TaskRecord")]
pub struct Task {
    pub id: u64,
    pub name: String,
    pub comment: String,
    pub description: String,
    pub priority: u8,
    pub done: bool,
    /// Normalized lowercase tags, deduplicated, bounded by config.
    pub tags: Vec<String>,
    /// Set once at creation, never changed.
    pub created_at: DateTime<Utc>,
    /// Bumped on every mutating edit.
    pub updated_at: DateTime<Utc>,
    /// Set on the `done` false->true transition, cleared on true->false.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        id: u64,
        name: impl Into<String>,
        comment: impl Into<String>,
        description: impl Into<String>,
        priority: u8,
        tags: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            comment: comment.into(),
            description: description.into(),
            priority,
            done: false,
            tags,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Flip the done flag, maintaining `completed_at`: stamped on the
    /// false->true transition, cleared on true->false, untouched otherwise.
    pub fn set_done(&mut self, done: bool) {
        if done && !self.done {
            self.completed_at = Some(Utc::now());
        } else if !done && self.done {
            self.completed_at = None;
        }
        self.done = done;
    }
}

/// On-disk shape of a task. Key differences from [`Task`]:
/// the legacy `tag` mirror, and `completed_at` written as an empty string
/// when unset.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TaskRecord {
    id: u64,
    name: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    description: String,
    priority: u8,
    /// Legacy single-tag field; always `tags[0]` or empty on write.
    #[serde(default)]
    tag: String,
    #[serde(default)]
    tags: Vec<String>,
    done: bool,
    created_at: DateTime<Utc>,
    #[serde(default, with = "empty_or_rfc3339")]
    completed_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

impl From<TaskRecord> for Task {
    fn from(record: TaskRecord) -> Self {
        // Best-effort back-fill for files written before the tags list.
        let tags = if record.tags.is_empty() && !record.tag.is_empty() {
            vec![record.tag]
        } else {
            record.tags
        };
        Task {
            id: record.id,
            name: record.name,
            comment: record.comment,
            description: record.description,
            priority: record.priority,
            done: record.done,
            tags,
            created_at: record.created_at,
            updated_at: record.updated_at,
            completed_at: record.completed_at,
        }
    }
}

impl From<Task> for TaskRecord {
    fn from(task: Task) -> Self {
        TaskRecord {
            id: task.id,
            name: task.name,
            comment: task.comment,
            description: task.description,
            priority: task.priority,
            tag: task.tags.first().cloned().unwrap_or_default(),
            tags: task.tags,
            done: task.done,
            created_at: task.created_at,
            completed_at: task.completed_at,
            updated_at: task.updated_at,
        }
    }
}

/// Serde adapter for the historical `completed_at` encoding: an ISO-8601
/// string when set, the empty string when not.
mod empty_or_rfc3339 {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            None => serializer.serialize_str(""),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        if raw.is_empty() {
            return Ok(None);
        }
        DateTime::parse_from_rfc3339(&raw)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Task {
        Task::new(1, "Fix bug", "", "crash on start", 2, vec!["work".to_string()])
    }

    #[test]
    fn new_task_starts_todo() {
        let task = sample();
        assert!(!task.done);
        assert!(task.completed_at.is_none());
        assert_eq!(task.created_at, task.updated_at);
    }

    #[test]
    fn done_transitions_manage_completed_at() {
        let mut task = sample();

        task.set_done(true);
        assert!(task.done);
        assert!(task.completed_at.is_some());

        // Marking done again keeps the original completion timestamp.
        let first = task.completed_at;
        task.set_done(true);
        assert_eq!(task.completed_at, first);

        task.set_done(false);
        assert!(!task.done);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn serializes_legacy_tag_mirror() {
        let task = Task::new(
            7,
            "n",
            "c",
            "d",
            1,
            vec!["alpha".to_string(), "beta".to_string()],
        );
        let json = serde_json::to_value(&task).expect("serialize");
        assert_eq!(json["tag"], "alpha");
        assert_eq!(json["tags"][0], "alpha");
        assert_eq!(json["tags"][1], "beta");
    }

    #[test]
    fn serializes_empty_tag_when_untagged() {
        let task = Task::new(7, "n", "", "", 1, Vec::new());
        let json = serde_json::to_value(&task).expect("serialize");
        assert_eq!(json["tag"], "");
        assert_eq!(json["completed_at"], "");
    }

    #[test]
    fn backfills_tags_from_legacy_field() {
        let json = r#"{
            "id": 3,
            "name": "old task",
            "comment": "",
            "description": "",
            "priority": 1,
            "tag": "legacy",
            "done": false,
            "created_at": "2023-05-01T10:00:00Z",
            "completed_at": "",
            "updated_at": "2023-05-01T10:00:00Z"
        }"#;
        let task: Task = serde_json::from_str(json).expect("deserialize");
        assert_eq!(task.tags, vec!["legacy".to_string()]);
        assert!(task.completed_at.is_none());
    }

    #[test]
    fn tags_list_wins_over_legacy_field() {
        let json = r#"{
            "id": 3,
            "name": "t",
            "priority": 1,
            "tag": "stale",
            "tags": ["fresh", "other"],
            "done": true,
            "created_at": "2023-05-01T10:00:00Z",
            "completed_at": "2023-05-02T11:30:00+00:00",
            "updated_at": "2023-05-02T11:30:00Z"
        }"#;
        let task: Task = serde_json::from_str(json).expect("deserialize");
        assert_eq!(task.tags, vec!["fresh".to_string(), "other".to_string()]);
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn round_trips_through_json() {
        let mut task = sample();
        task.set_done(true);

        let json = serde_json::to_string(&task).expect("serialize");
        let back: Task = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, task);
    }
}
