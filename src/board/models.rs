//! Domain model: projects, grids, screen elements, and scheduled tasks.
//!
//! A `Project` is the top-level document aggregate. Its identity is the
//! user-chosen `name` plus the immutable `project_type` — never the on-disk
//! filename, which is a lossy sanitized derivation (see `store::sanitize`).

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Project type
// ============================================================================

/// Where a project lives. Immutable after creation.
///
/// `Hosted` projects broadcast lifecycle events to every connected session;
/// `Local` projects never broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    Local,
    Hosted,
}

impl ProjectType {
    /// Directory name under the store root (`projects/local`, `projects/hosted`).
    pub fn dir_name(&self) -> &'static str {
        match self {
            ProjectType::Local => "local",
            ProjectType::Hosted => "hosted",
        }
    }

    pub const ALL: [ProjectType; 2] = [ProjectType::Local, ProjectType::Hosted];
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for ProjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(ProjectType::Local),
            "hosted" => Ok(ProjectType::Hosted),
            other => Err(format!("unknown project type: {other}")),
        }
    }
}

// ============================================================================
// Task priority
// ============================================================================

/// Task priority, stored on the wire as its numeric code (1 = High, 3 = Low).
///
/// Decoding accepts numbers and numeric strings; anything else is a hard
/// serialization error rather than a silent default, so corrupted documents
/// surface instead of being masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn code(&self) -> u8 {
        match self {
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    pub fn from_code(code: i64) -> Result<Self, String> {
        match code {
            1 => Ok(Priority::High),
            2 => Ok(Priority::Medium),
            3 => Ok(Priority::Low),
            other => Err(format!("priority code out of range: {other}")),
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

struct PriorityVisitor;

impl<'de> Visitor<'de> for PriorityVisitor {
    type Value = Priority;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a priority code (1-3) as a number or numeric string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Priority, E> {
        Priority::from_code(v).map_err(E::custom)
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Priority, E> {
        self.visit_i64(v as i64)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Priority, E> {
        if v.fract() != 0.0 {
            return Err(E::custom(format!("priority is not an integer: {v}")));
        }
        self.visit_i64(v as i64)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Priority, E> {
        let code: i64 = v
            .trim()
            .parse()
            .map_err(|_| E::custom(format!("priority is not numeric: {v:?}")))?;
        Priority::from_code(code).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(PriorityVisitor)
    }
}

// ============================================================================
// Scheduled task
// ============================================================================

/// A to-do item with priority, due time, and completion tracking.
///
/// Invariant: `completion_time` and `completed_by` are `Some` iff `is_done`
/// is true. `mark_done` / `mark_incomplete` maintain this; mutate through
/// them, not the fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    #[serde(default)]
    pub task_name: String,
    #[serde(default)]
    pub priority: Priority,
    /// Timestamp string. Legacy documents carry arbitrary text here, so the
    /// field stays a string; use [`ScheduledTask::parse_due_time`].
    #[serde(default, deserialize_with = "string_or_number")]
    pub due_time: String,
    #[serde(default)]
    pub is_done: bool,
    #[serde(default)]
    pub notified: bool,
    #[serde(default, deserialize_with = "string_or_number")]
    pub creation_time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<String>,
}

impl ScheduledTask {
    pub fn new(task_name: impl Into<String>, priority: Priority, due_time: DateTime<Utc>) -> Self {
        Self {
            task_name: task_name.into(),
            priority,
            due_time: due_time.to_rfc3339(),
            is_done: false,
            notified: false,
            creation_time: Utc::now().to_rfc3339(),
            completion_time: None,
            completed_by: None,
        }
    }

    /// Mark the task complete, recording who and when.
    pub fn mark_done(&mut self, completed_by: impl Into<String>, at: DateTime<Utc>) {
        self.is_done = true;
        self.completion_time = Some(at.to_rfc3339());
        self.completed_by = Some(completed_by.into());
    }

    /// Clear completion state. Resets `completion_time` and `completed_by`
    /// together with `is_done`.
    pub fn mark_incomplete(&mut self) {
        self.is_done = false;
        self.completion_time = None;
        self.completed_by = None;
    }

    pub fn parse_due_time(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.due_time)
    }

    pub fn parse_completion_time(&self) -> Option<DateTime<Utc>> {
        self.completion_time.as_deref().and_then(parse_timestamp)
    }
}

/// Accept a string or a bare number for legacy timestamp fields.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    struct StringOrNumber;

    impl<'de> Visitor<'de> for StringOrNumber {
        type Value = String;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a string or number")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(StringOrNumber)
}

/// Best-effort timestamp parsing for legacy documents.
///
/// Accepts RFC 3339, a bare `YYYY-MM-DDTHH:MM:SS[.fff]` (assumed UTC), a bare
/// date, and epoch seconds or milliseconds. Returns `None` for anything else.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }
    if let Ok(epoch) = raw.parse::<i64>() {
        // Heuristic: values past the year ~33658 as seconds are milliseconds.
        return if epoch.abs() >= 1_000_000_000_000 {
            DateTime::from_timestamp_millis(epoch)
        } else {
            DateTime::from_timestamp(epoch, 0)
        };
    }
    None
}

// ============================================================================
// Screen elements
// ============================================================================

fn default_scale() -> f64 {
    1.0
}

/// Fields shared by every placeable element: name, position, scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementBase {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub x_pos: f64,
    #[serde(default)]
    pub y_pos: f64,
    #[serde(default = "default_scale")]
    pub x_scale: f64,
    #[serde(default = "default_scale")]
    pub y_scale: f64,
}

impl Default for ElementBase {
    fn default() -> Self {
        Self {
            name: String::new(),
            x_pos: 0.0,
            y_pos: 0.0,
            x_scale: 1.0,
            y_scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TextDocument {
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default)]
    pub text_field: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Image {
    #[serde(flatten)]
    pub base: ElementBase,
    /// Server-relative URL (`/projects/{type}/{name}_assets/{file}`).
    #[serde(default)]
    pub image_path: String,
    /// Legacy inline binary (base64). Preserved for round-trip fidelity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Video {
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default)]
    pub video_path: String,
    /// Legacy inline binary (base64). Preserved for round-trip fidelity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ToDoList {
    #[serde(flatten)]
    pub base: ElementBase,
    #[serde(default)]
    pub scheduled_tasks: Vec<ScheduledTask>,
    #[serde(default)]
    pub collaborators: BTreeSet<String>,
    #[serde(default)]
    pub tags: BTreeSet<String>,
}

/// Polymorphic placeable unit. An explicit sum type with exhaustive matching
/// everywhere — never dispatch on stringly-typed class names.
///
/// `Unrecognized` carries an element object that matched neither the `type`
/// discriminant nor any structural predicate. It round-trips through the
/// codec unchanged and is never silently dropped, but callers must not treat
/// it as any known variant.
#[derive(Debug, Clone, PartialEq)]
pub enum ScreenElement {
    TextDocument(TextDocument),
    Image(Image),
    Video(Video),
    ToDoList(ToDoList),
    Unrecognized(serde_json::Map<String, serde_json::Value>),
}

impl ScreenElement {
    /// Element name, or `None` for unrecognized objects without one.
    pub fn name(&self) -> Option<&str> {
        match self {
            ScreenElement::TextDocument(e) => Some(&e.base.name),
            ScreenElement::Image(e) => Some(&e.base.name),
            ScreenElement::Video(e) => Some(&e.base.name),
            ScreenElement::ToDoList(e) => Some(&e.base.name),
            ScreenElement::Unrecognized(raw) => raw.get("name").and_then(|v| v.as_str()),
        }
    }

    pub fn is_unrecognized(&self) -> bool {
        matches!(self, ScreenElement::Unrecognized(_))
    }
}

// ============================================================================
// Grid and project
// ============================================================================

/// Named sub-collection of elements within a project. Grid names are unique
/// within a project, case-sensitive.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Grid {
    pub name: String,
    pub elements: Vec<ScreenElement>,
}

impl Grid {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            elements: Vec::new(),
        }
    }
}

/// Top-level document aggregate, identified by `name` + `project_type`.
///
/// The file *is* the state: every mutation round-trips through the store,
/// there is no in-memory-only persistent state on the server.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub owner_name: String,
    pub name: String,
    pub project_type: ProjectType,
    pub grids: Vec<Grid>,
    /// RFC 3339 timestamp stamped by the store on save.
    pub last_modified: Option<String>,
}

impl Project {
    pub fn new(
        name: impl Into<String>,
        project_type: ProjectType,
        owner_name: impl Into<String>,
    ) -> Self {
        Self {
            owner_name: owner_name.into(),
            name: name.into(),
            project_type,
            grids: Vec::new(),
            last_modified: None,
        }
    }

    /// Find a grid by its case-sensitive name.
    pub fn grid(&self, name: &str) -> Option<&Grid> {
        self.grids.iter().find(|g| g.name == name)
    }

    /// Iterate every to-do list in the project together with its grid name.
    pub fn todo_lists(&self) -> impl Iterator<Item = (&str, &ToDoList)> {
        self.grids.iter().flat_map(|g| {
            g.elements.iter().filter_map(move |e| match e {
                ScreenElement::ToDoList(list) => Some((g.name.as_str(), list)),
                _ => None,
            })
        })
    }
}

/// Lightweight listing entry: no element bodies are deserialized to build it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub name: String,
    pub owner_name: String,
    pub grid_count: usize,
    pub last_modified: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================
