use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use std::fmt;

// Priority of a task. Anything the backend sends that we do not recognise
// (including null or a missing field) is treated as medium.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn from_name(name: &str) -> Priority {
        match name.trim().to_ascii_lowercase().as_str() {
            "high" => Priority::High,
            "low" => Priority::Low,
            _ => Priority::Medium,
        }
    }

    /// Ranking used by the priority sort: high=3, medium=2, low=1.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }

    pub fn cycle(self) -> Priority {
        match self {
            Priority::High => Priority::Medium,
            Priority::Medium => Priority::Low,
            Priority::Low => Priority::High,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(LenientName::deserialize(deserializer)?
            .as_str()
            .map(Priority::from_name)
            .unwrap_or_default())
    }
}

// A string field that may also arrive as null, a number or anything else.
// Only strings carry a name; every other shape falls back to the default.
#[derive(Deserialize)]
#[serde(untagged)]
enum LenientName {
    Name(String),
    Other(de::IgnoredAny),
}

impl LenientName {
    fn as_str(&self) -> Option<&str> {
        match self {
            LenientName::Name(name) => Some(name.as_str()),
            LenientName::Other(_) => None,
        }
    }
}

// Recurrence rule. Expanding occurrences is the backend's job; the client
// only shows it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Repeat {
    #[default]
    #[serde(rename = "")]
    None,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Repeat {
    pub fn from_name(name: &str) -> Repeat {
        match name.trim().to_ascii_lowercase().as_str() {
            "daily" => Repeat::Daily,
            "weekly" => Repeat::Weekly,
            "monthly" => Repeat::Monthly,
            "yearly" => Repeat::Yearly,
            _ => Repeat::None,
        }
    }

    pub fn cycle(self) -> Repeat {
        match self {
            Repeat::None => Repeat::Daily,
            Repeat::Daily => Repeat::Weekly,
            Repeat::Weekly => Repeat::Monthly,
            Repeat::Monthly => Repeat::Yearly,
            Repeat::Yearly => Repeat::None,
        }
    }

    pub fn label(self) -> Option<&'static str> {
        match self {
            Repeat::None => None,
            Repeat::Daily => Some("daily"),
            Repeat::Weekly => Some("weekly"),
            Repeat::Monthly => Some("monthly"),
            Repeat::Yearly => Some("yearly"),
        }
    }
}

impl<'de> Deserialize<'de> for Repeat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(LenientName::deserialize(deserializer)?
            .as_str()
            .map(Repeat::from_name)
            .unwrap_or_default())
    }
}

// Subtask struct
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subtask {
    pub id: i64,
    #[serde(default)]
    pub todo_id: i64,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

// Task struct, the read model returned by GET /api/todos
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, deserialize_with = "timestamp::deserialize_optional")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "timestamp::deserialize_optional")]
    pub remind_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub repeat: Repeat,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub subtasks: Vec<Subtask>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn completed_subtasks(&self) -> usize {
        self.subtasks.iter().filter(|s| s.completed).count()
    }
}

// Project struct, pure reference data
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub color: String,
    #[serde(default, deserialize_with = "timestamp::deserialize_optional")]
    pub created_at: Option<DateTime<Utc>>,
}

pub const DEFAULT_PROJECT_COLOR: &str = "#64748B";

/// Body of `POST /api/todos`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub remind_at: Option<DateTime<Utc>>,
    pub repeat: Repeat,
    pub tags: Vec<String>,
    pub project_id: Option<i64>,
}

/// Body of `PUT /api/todos/{id}`. Only fields that are set are sent.
///
/// The backend applies `completed` on its own, but treats the detail fields
/// as one unit: they are only read when `title` is present and then every
/// one of them is overwritten. Detail edits therefore start from
/// [`TaskUpdate::details`] so unchanged fields are sent back as they are.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TaskUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remind_at: Option<Option<DateTime<Utc>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat: Option<Repeat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<Option<i64>>,
}

impl TaskUpdate {
    pub fn completed(completed: bool) -> TaskUpdate {
        TaskUpdate {
            completed: Some(completed),
            ..TaskUpdate::default()
        }
    }

    /// Every detail field of `task` as it stands; override the ones that change.
    pub fn details(task: &Task) -> TaskUpdate {
        TaskUpdate {
            title: Some(task.title.clone()),
            description: Some(task.description.clone()),
            completed: None,
            priority: Some(task.priority),
            due_date: Some(task.due_date),
            remind_at: Some(task.remind_at),
            repeat: Some(task.repeat),
            tags: Some(task.tags.clone()),
            project_id: Some(task.project_id),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewProject {
    pub name: String,
    pub description: String,
    pub color: String,
}

impl NewProject {
    pub fn named(name: impl Into<String>) -> NewProject {
        NewProject {
            name: name.into(),
            description: String::new(),
            color: DEFAULT_PROJECT_COLOR.to_string(),
        }
    }
}

/// Body of `PUT /api/projects/{id}`. The backend replaces all three fields.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectUpdate {
    pub name: String,
    pub description: String,
    pub color: String,
}

impl ProjectUpdate {
    pub fn renamed(project: &Project, name: impl Into<String>) -> ProjectUpdate {
        ProjectUpdate {
            name: name.into(),
            description: project.description.clone(),
            color: project.color.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewSubtask {
    pub title: String,
}

/// Body of `PUT /api/subtasks/{id}`. Title and state are both written.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SubtaskUpdate {
    pub title: String,
    pub completed: bool,
}

impl SubtaskUpdate {
    pub fn completed(subtask: &Subtask, completed: bool) -> SubtaskUpdate {
        SubtaskUpdate {
            title: subtask.title.clone(),
            completed,
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parses the timestamp shapes the backend and the user may produce:
/// RFC 3339, naive `YYYY-MM-DDTHH:MM[:SS]` and date-only `YYYY-MM-DD`.
/// Naive forms are read in the local time zone.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

mod timestamp {
    use super::parse_timestamp;
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer};

    // Go's zero time, sent by some backends instead of null.
    const ZERO_TIME: &str = "0001-01-01T00:00:00Z";

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        parse_timestamp(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}")))
    }

    pub fn deserialize_optional<'de, D: Deserializer<'de>>(
        d: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        match Option::<String>::deserialize(d)? {
            None => Ok(None),
            Some(raw) if raw.trim().is_empty() || raw == ZERO_TIME => Ok(None),
            Some(raw) => parse_timestamp(&raw)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid timestamp: {raw}"))),
        }
    }
}

#[cfg(test)]
pub mod test_support {
    use super::*;

    pub fn at(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw)
            .expect("valid rfc3339 in test")
            .with_timezone(&Utc)
    }

    pub fn task(id: i64, title: &str) -> Task {
        Task {
            id,
            title: title.to_string(),
            description: String::new(),
            completed: false,
            priority: Priority::Medium,
            due_date: None,
            remind_at: None,
            repeat: Repeat::None,
            tags: Vec::new(),
            project_id: None,
            subtasks: Vec::new(),
            created_at: at("2024-01-01T00:00:00Z"),
        }
    }

    pub fn due(id: i64, due: &str) -> Task {
        Task {
            due_date: Some(at(due)),
            ..task(id, &format!("task {id}"))
        }
    }

    pub fn ids(tasks: &[Task]) -> Vec<i64> {
        tasks.iter().map(|t| t.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::at;
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_from_backend_json() {
        let raw = json!({
            "id": 7,
            "title": "Pay rent",
            "description": "",
            "completed": false,
            "priority": "high",
            "due_date": "2024-06-15T08:00:00Z",
            "remind_at": null,
            "repeat": "monthly",
            "tags": ["home", "money"],
            "project_id": 2,
            "subtasks": [
                {"id": 1, "todo_id": 7, "title": "transfer", "completed": true,
                 "created_at": "2024-06-01T10:00:00Z"}
            ],
            "created_at": "2024-06-01T09:00:00+02:00"
        });
        let task: Task = serde_json::from_value(raw).unwrap();
        assert_eq!(task.priority, Priority::High);
        assert_eq!(task.due_date, Some(at("2024-06-15T08:00:00Z")));
        assert_eq!(task.repeat, Repeat::Monthly);
        assert_eq!(task.project_id, Some(2));
        assert_eq!(task.created_at, at("2024-06-01T07:00:00Z"));
        assert_eq!(task.completed_subtasks(), 1);
    }

    #[test]
    fn test_missing_and_unknown_fields_fall_back() {
        let raw = json!({
            "id": 1,
            "title": "Bare",
            "priority": "urgent",
            "due_date": "0001-01-01T00:00:00Z",
            "tags": null,
            "created_at": "2024-06-01T09:00:00Z"
        });
        let task: Task = serde_json::from_value(raw).unwrap();
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.due_date, None);
        assert_eq!(task.repeat, Repeat::None);
        assert!(task.tags.is_empty());
        assert!(task.subtasks.is_empty());
        assert_eq!(task.project_id, None);
        assert_eq!(task.description, "");
    }

    #[test]
    fn test_null_priority_is_medium() {
        let raw = json!({"id": 1, "title": "x", "priority": null, "created_at": "2024-06-01T09:00:00Z"});
        let task: Task = serde_json::from_value(raw).unwrap();
        assert_eq!(task.priority, Priority::Medium);
    }

    #[test]
    fn test_non_string_priority_and_repeat_fall_back() {
        let raw = json!({
            "id": 1,
            "title": "x",
            "priority": 3,
            "repeat": {"every": "day"},
            "created_at": "2024-06-01T09:00:00Z"
        });
        let task: Task = serde_json::from_value(raw).unwrap();
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.repeat, Repeat::None);
    }

    #[test]
    fn test_details_update_carries_every_field() {
        let task = Task {
            description: "first of the month".into(),
            priority: Priority::High,
            due_date: Some(at("2024-07-01T09:00:00Z")),
            repeat: Repeat::Monthly,
            tags: vec!["home".into()],
            project_id: Some(2),
            ..test_support::task(7, "Pay rent")
        };
        let update = TaskUpdate {
            priority: Some(Priority::Low),
            ..TaskUpdate::details(&task)
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({
                "title": "Pay rent",
                "description": "first of the month",
                "priority": "low",
                "due_date": "2024-07-01T09:00:00Z",
                "remind_at": null,
                "repeat": "monthly",
                "tags": ["home"],
                "project_id": 2
            })
        );
    }

    #[test]
    fn test_project_rename_keeps_description_and_color() {
        let project = Project {
            id: 3,
            name: "Home".into(),
            description: "chores".into(),
            color: "#FF0000".into(),
            created_at: None,
        };
        assert_eq!(
            serde_json::to_value(ProjectUpdate::renamed(&project, "House")).unwrap(),
            json!({"name": "House", "description": "chores", "color": "#FF0000"})
        );
    }

    #[test]
    fn test_priority_rank_is_total() {
        assert!(Priority::High.rank() > Priority::Medium.rank());
        assert!(Priority::Medium.rank() > Priority::Low.rank());
    }

    #[test]
    fn test_task_update_only_sends_set_fields() {
        let update = TaskUpdate {
            due_date: Some(None),
            ..TaskUpdate::completed(true)
        };
        let body = serde_json::to_value(&update).unwrap();
        assert_eq!(body, json!({"completed": true, "due_date": null}));
    }

    #[test]
    fn test_new_task_body_shape() {
        let body = serde_json::to_value(NewTask {
            title: "Write report".into(),
            priority: Priority::Low,
            tags: vec!["work".into()],
            ..NewTask::default()
        })
        .unwrap();
        assert_eq!(
            body,
            json!({
                "title": "Write report",
                "description": "",
                "priority": "low",
                "due_date": null,
                "remind_at": null,
                "repeat": "",
                "tags": ["work"],
                "project_id": null
            })
        );
    }

    #[test]
    fn test_parse_timestamp_shapes() {
        assert_eq!(
            parse_timestamp("2024-06-15T08:00:00Z"),
            Some(at("2024-06-15T08:00:00Z"))
        );
        assert!(parse_timestamp("2024-06-15T08:00").is_some());
        assert!(parse_timestamp("2024-06-15").is_some());
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("   "), None);
        assert_eq!(parse_timestamp("next tuesday"), None);
    }
}
