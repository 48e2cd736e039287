use crate::models::{parse_timestamp, NewTask, Priority, Repeat};
use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use regex::{Captures, Regex};
use std::sync::OnceLock;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("could not read `{0}` as a date (try 2024-06-15 or 2024-06-15T09:30)")]
    InvalidDate(String),
}

/// Quick-add input split into its parts. `!high` sets the priority, `#tag`
/// adds a tag and `@2024-06-15` (or `@today`, `@tomorrow`) sets the due date.
/// `^2024-06-15T09:00` sets a reminder and `*weekly` a repeat rule.
#[derive(Debug, PartialEq)]
pub struct ParsedTask {
    pub title: String,
    pub priority: Option<Priority>,
    pub tags: Vec<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub remind_at: Option<DateTime<Utc>>,
    pub repeat: Repeat,
}

impl ParsedTask {
    pub fn into_new_task(self, description: String, project_id: Option<i64>) -> NewTask {
        NewTask {
            title: self.title,
            description,
            priority: self.priority.unwrap_or_default(),
            due_date: self.due_date,
            remind_at: self.remind_at,
            repeat: self.repeat,
            tags: self.tags,
            project_id,
        }
    }
}

fn priority_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)!(high|medium|low|h|m|l)\b").unwrap())
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\s)#([\w-]+)").unwrap())
}

fn due_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\s)@(\S+)").unwrap())
}

fn remind_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|\s)\^(\S+)").unwrap())
}

fn repeat_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)(?:^|\s)\*(daily|weekly|monthly|yearly)\b").unwrap())
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap())
}

pub fn parse_task_input<Tz: TimeZone>(input: &str, now: &DateTime<Tz>) -> ParsedTask {
    let mut priority = None;

    // Priority, first one wins
    for caps in priority_re().captures_iter(input) {
        if priority.is_none() {
            priority = Some(priority_from_token(&caps[1]));
        }
    }
    let text = priority_re().replace_all(input, " ");

    let mut tags: Vec<String> = Vec::new();
    for caps in tag_re().captures_iter(&text) {
        let tag = caps[1].to_string();
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    let text = tag_re().replace_all(&text, " ");

    let repeat = repeat_re()
        .captures(&text)
        .map(|caps| Repeat::from_name(&caps[1]))
        .unwrap_or_default();
    let text = repeat_re().replace_all(&text, " ");

    let (text, remind_at) = take_date_token(remind_re(), &text, now);
    let (text, due_date) = take_date_token(due_re(), &text, now);

    let title = whitespace_re().replace_all(&text, " ").trim().to_string();

    ParsedTask {
        title,
        priority,
        tags,
        due_date,
        remind_at,
        repeat,
    }
}

// Removes every readable date token matched by `re` and returns the first
// date. Unreadable tokens stay in the text.
fn take_date_token<Tz: TimeZone>(
    re: &Regex,
    text: &str,
    now: &DateTime<Tz>,
) -> (String, Option<DateTime<Utc>>) {
    let mut first = None;
    let text = re.replace_all(text, |caps: &Captures<'_>| match resolve_due(&caps[1], now) {
        Some(date) => {
            if first.is_none() {
                first = Some(date);
            }
            " ".to_string()
        }
        None => caps[0].to_string(),
    });
    (text.into_owned(), first)
}

/// Turns a due-date or reminder field into the value sent to the backend.
/// An empty field means "no date" and is sent as null.
pub fn normalize_due_date(raw: &str) -> Result<Option<DateTime<Utc>>, ParseError> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_timestamp(raw)
        .map(Some)
        .ok_or_else(|| ParseError::InvalidDate(raw.trim().to_string()))
}

/// Splits a comma or space separated tag field, dropping a leading `#`.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(|t| t.trim_start_matches('#'))
        .filter(|t| !t.is_empty())
    {
        if !tags.iter().any(|existing| existing == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

fn priority_from_token(token: &str) -> Priority {
    match token.to_ascii_lowercase().as_str() {
        "h" | "high" => Priority::High,
        "l" | "low" => Priority::Low,
        _ => Priority::Medium,
    }
}

fn resolve_due<Tz: TimeZone>(token: &str, now: &DateTime<Tz>) -> Option<DateTime<Utc>> {
    let relative = match token.to_ascii_lowercase().as_str() {
        "today" => Some(now.date_naive()),
        "tomorrow" => now.date_naive().checked_add_days(Days::new(1)),
        _ => None,
    };
    match relative {
        Some(date) => start_of_day(date, &now.timezone()),
        None => parse_timestamp(token),
    }
}

fn start_of_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_hms_opt(0, 0, 0)?)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
