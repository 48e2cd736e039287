use crate::models::Task;
use chrono::{DateTime, Days, Duration, TimeZone, Utc};
use std::cmp::Ordering;

/// First-stage inclusion rule. The date based views (`Today`, `Upcoming`,
/// `Overdue`) are the smart views; `Calendar` shows everything and leaves
/// the layout to the calendar projection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum View {
    #[default]
    All,
    Inbox,
    Today,
    Upcoming,
    Overdue,
    Project,
    Calendar,
}

impl View {
    pub const ALL: [View; 7] = [
        View::All,
        View::Inbox,
        View::Today,
        View::Upcoming,
        View::Overdue,
        View::Project,
        View::Calendar,
    ];

    pub fn from_name(name: &str) -> View {
        match name.trim() {
            "inbox" => View::Inbox,
            "today" => View::Today,
            "upcoming" => View::Upcoming,
            "overdue" => View::Overdue,
            "project" => View::Project,
            "calendar" => View::Calendar,
            _ => View::All,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            View::All => "all",
            View::Inbox => "inbox",
            View::Today => "today",
            View::Upcoming => "upcoming",
            View::Overdue => "overdue",
            View::Project => "project",
            View::Calendar => "calendar",
        }
    }

    pub fn next(self) -> View {
        let i = View::ALL.iter().position(|v| *v == self).unwrap_or(0);
        View::ALL[(i + 1) % View::ALL.len()]
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOption {
    #[default]
    CreatedDesc,
    DueAsc,
    DueDesc,
    PriorityDesc,
}

impl SortOption {
    pub fn from_name(name: &str) -> SortOption {
        match name.trim() {
            "due_asc" => SortOption::DueAsc,
            "due_desc" => SortOption::DueDesc,
            "priority_desc" => SortOption::PriorityDesc,
            _ => SortOption::CreatedDesc,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SortOption::CreatedDesc => "created_desc",
            SortOption::DueAsc => "due_asc",
            SortOption::DueDesc => "due_desc",
            SortOption::PriorityDesc => "priority_desc",
        }
    }

    pub fn next(self) -> SortOption {
        match self {
            SortOption::CreatedDesc => SortOption::DueAsc,
            SortOption::DueAsc => SortOption::DueDesc,
            SortOption::DueDesc => SortOption::PriorityDesc,
            SortOption::PriorityDesc => SortOption::CreatedDesc,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Active,
    Completed,
}

impl StatusFilter {
    pub fn from_name(name: &str) -> StatusFilter {
        match name.trim() {
            "active" => StatusFilter::Active,
            "completed" => StatusFilter::Completed,
            _ => StatusFilter::All,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Active => "active",
            StatusFilter::Completed => "completed",
        }
    }

    pub fn next(self) -> StatusFilter {
        match self {
            StatusFilter::All => StatusFilter::Active,
            StatusFilter::Active => StatusFilter::Completed,
            StatusFilter::Completed => StatusFilter::All,
        }
    }

    fn keeps(self, task: &Task) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Active => !task.completed,
            StatusFilter::Completed => task.completed,
        }
    }
}

/// Everything that decides which tasks are listed and in what order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TaskQuery {
    pub view: View,
    /// Only consulted when `view` is [`View::Project`].
    pub project_id: Option<i64>,
    pub search: String,
    pub sort: SortOption,
    pub status: StatusFilter,
}

/// Produces the ordered subset of `tasks` to display.
///
/// Stages run in order: view predicate, text search, stable sort, status
/// filter. `now` is the instant the smart views are evaluated against and its
/// time zone is the calendar used for "today". The input is never reordered;
/// the result is a fresh vector.
pub fn filter_sort<Tz: TimeZone>(tasks: &[Task], query: &TaskQuery, now: &DateTime<Tz>) -> Vec<Task> {
    let window = Window::new(now);
    let needle = if query.search.trim().is_empty() {
        None
    } else {
        Some(query.search.to_lowercase())
    };

    let mut items: Vec<Task> = tasks
        .iter()
        .filter(|task| window.admits(task, query))
        .filter(|task| needle.as_deref().map_or(true, |q| matches_search(task, q)))
        .cloned()
        .collect();

    items.sort_by(|a, b| compare(a, b, query.sort));
    items.retain(|task| query.status.keeps(task));
    items
}

// Instants and the local date a call is evaluated against.
struct Window<Tz: TimeZone> {
    tz: Tz,
    now: DateTime<Utc>,
    horizon: DateTime<Utc>,
    today: chrono::NaiveDate,
}

impl<Tz: TimeZone> Window<Tz> {
    fn new(now: &DateTime<Tz>) -> Window<Tz> {
        // A week ahead on the local calendar, so a DST change inside the
        // window does not shift the boundary by an hour.
        let horizon = now
            .clone()
            .checked_add_days(Days::new(7))
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| now.with_timezone(&Utc) + Duration::days(7));
        Window {
            tz: now.timezone(),
            now: now.with_timezone(&Utc),
            horizon,
            today: now.date_naive(),
        }
    }

    fn admits(&self, task: &Task, query: &TaskQuery) -> bool {
        match query.view {
            View::Inbox => task.project_id.is_none(),
            View::Project => match query.project_id {
                Some(id) => task.project_id == Some(id),
                None => true,
            },
            View::Today => task
                .due_date
                .is_some_and(|due| due.with_timezone(&self.tz).date_naive() == self.today),
            // Instant comparison: something due earlier today drops out once
            // its time has passed.
            View::Upcoming => task
                .due_date
                .is_some_and(|due| due >= self.now && due <= self.horizon),
            View::Overdue => !task.completed && task.due_date.is_some_and(|due| due < self.now),
            View::All | View::Calendar => true,
        }
    }
}

fn matches_search(task: &Task, needle: &str) -> bool {
    task.title.to_lowercase().contains(needle)
        || task.description.to_lowercase().contains(needle)
        || task.tags.iter().any(|tag| tag.to_lowercase().contains(needle))
}

fn compare(a: &Task, b: &Task, sort: SortOption) -> Ordering {
    match sort {
        SortOption::DueAsc => undated_last(a.due_date, b.due_date, |x, y| x.cmp(&y)),
        SortOption::DueDesc => undated_last(a.due_date, b.due_date, |x, y| y.cmp(&x)),
        SortOption::PriorityDesc => b
            .priority
            .rank()
            .cmp(&a.priority.rank())
            .then_with(|| b.created_at.cmp(&a.created_at)),
        SortOption::CreatedDesc => b.created_at.cmp(&a.created_at),
    }
}

// Undated tasks go to the bottom in both directions; only the dated
// comparison is flipped for a descending sort.
fn undated_last(
    a: Option<DateTime<Utc>>,
    b: Option<DateTime<Utc>>,
    dated: impl Fn(DateTime<Utc>, DateTime<Utc>) -> Ordering,
) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => dated(x, y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_support::{at, due, ids, task};
    use crate::models::Priority;
    use chrono::FixedOffset;
    use pretty_assertions::assert_eq;

    fn query(view: View) -> TaskQuery {
        TaskQuery {
            view,
            ..TaskQuery::default()
        }
    }

    fn sorted(sort: SortOption) -> TaskQuery {
        TaskQuery {
            sort,
            ..TaskQuery::default()
        }
    }

    // 2024-06-15 noon UTC, with tasks either side of it.
    fn june_fixture() -> (Vec<Task>, DateTime<Utc>) {
        let tasks = vec![
            Task {
                priority: Priority::High,
                ..due(1, "2024-06-14T00:00:00Z")
            },
            Task {
                priority: Priority::Low,
                ..due(2, "2024-06-15T08:00:00Z")
            },
            due(3, "2024-06-15T18:00:00Z"),
            due(4, "2024-06-16T00:00:00Z"),
            task(5, "undated"),
        ];
        (tasks, at("2024-06-15T12:00:00Z"))
    }

    #[test]
    fn test_today_keeps_only_tasks_on_the_local_date() {
        let (tasks, now) = june_fixture();
        let result = filter_sort(&tasks, &query(View::Today), &now);
        let mut got = ids(&result);
        got.sort();
        assert_eq!(got, vec![2, 3]);
    }

    #[test]
    fn test_today_uses_the_clock_time_zone() {
        // 00:30 on the 15th in UTC+2 is still the 14th in UTC.
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        let now = tz.with_ymd_and_hms(2024, 6, 15, 0, 30, 0).unwrap();
        let tasks = vec![
            due(1, "2024-06-14T23:00:00Z"),
            due(2, "2024-06-14T21:00:00Z"),
        ];
        let result = filter_sort(&tasks, &query(View::Today), &now);
        assert_eq!(ids(&result), vec![1]);
    }

    #[test]
    fn test_overdue_is_strictly_before_now_and_incomplete() {
        let (mut tasks, now) = june_fixture();
        tasks.push(Task {
            completed: true,
            ..due(6, "2024-06-10T00:00:00Z")
        });
        let result = filter_sort(&tasks, &query(View::Overdue), &now);
        let mut got = ids(&result);
        got.sort();
        // The 08:00 task has passed as well; the completed one is excluded.
        assert_eq!(got, vec![1, 2]);
    }

    #[test]
    fn test_upcoming_is_an_instant_window() {
        let (mut tasks, now) = june_fixture();
        tasks.push(due(7, "2024-06-22T12:00:00Z"));
        tasks.push(due(8, "2024-06-22T12:00:01Z"));
        tasks.push(due(9, "2024-06-15T12:00:00Z"));
        let result = filter_sort(&tasks, &query(View::Upcoming), &now);
        let mut got = ids(&result);
        got.sort();
        assert_eq!(got, vec![3, 4, 7, 9]);
    }

    #[test]
    fn test_inbox_and_project_views() {
        let tasks = vec![
            Task {
                project_id: Some(1),
                ..task(1, "a")
            },
            Task {
                project_id: Some(2),
                ..task(2, "b")
            },
            task(3, "c"),
        ];
        let now = at("2024-06-15T12:00:00Z");

        assert_eq!(ids(&filter_sort(&tasks, &query(View::Inbox), &now)), vec![3]);

        let project = TaskQuery {
            view: View::Project,
            project_id: Some(2),
            ..TaskQuery::default()
        };
        assert_eq!(ids(&filter_sort(&tasks, &project, &now)), vec![2]);

        // No project chosen yet: nothing is filtered out.
        let unscoped = query(View::Project);
        assert_eq!(filter_sort(&tasks, &unscoped, &now).len(), 3);
    }

    #[test]
    fn test_search_matches_title_description_and_tags() {
        let tasks = vec![
            task(1, "Buy MILK"),
            Task {
                description: "remember the milkman".into(),
                ..task(2, "Errand")
            },
            Task {
                tags: vec!["Milk-run".into()],
                ..task(3, "Shop")
            },
            task(4, "Unrelated"),
        ];
        let q = TaskQuery {
            search: "milk".into(),
            ..TaskQuery::default()
        };
        let mut got = ids(&filter_sort(&tasks, &q, &at("2024-06-15T12:00:00Z")));
        got.sort();
        assert_eq!(got, vec![1, 2, 3]);
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let tasks = vec![task(1, "a"), task(2, "b")];
        let q = TaskQuery {
            search: "   ".into(),
            ..TaskQuery::default()
        };
        assert_eq!(filter_sort(&tasks, &q, &at("2024-06-15T12:00:00Z")).len(), 2);
    }

    #[test]
    fn test_due_sorts_put_undated_last_in_both_directions() {
        let tasks = vec![
            task(1, "none"),
            due(2, "2024-01-20T10:00:00Z"),
            due(3, "2024-01-10T10:00:00Z"),
            task(4, "none either"),
        ];
        let now = at("2024-01-15T12:00:00Z");
        assert_eq!(
            ids(&filter_sort(&tasks, &sorted(SortOption::DueAsc), &now)),
            vec![3, 2, 1, 4]
        );
        assert_eq!(
            ids(&filter_sort(&tasks, &sorted(SortOption::DueDesc), &now)),
            vec![2, 3, 1, 4]
        );
    }

    #[test]
    fn test_priority_sort_breaks_ties_by_newest() {
        let tasks = vec![
            Task {
                priority: Priority::Low,
                ..task(1, "low")
            },
            Task {
                priority: Priority::High,
                ..task(2, "high")
            },
            Task {
                priority: Priority::Medium,
                ..task(3, "medium")
            },
            Task {
                priority: Priority::High,
                created_at: at("2024-03-01T00:00:00Z"),
                ..task(4, "newer high")
            },
        ];
        let result = filter_sort(&tasks, &sorted(SortOption::PriorityDesc), &at("2024-06-15T12:00:00Z"));
        assert_eq!(ids(&result), vec![4, 2, 3, 1]);
    }

    #[test]
    fn test_created_desc_is_the_fallback() {
        let tasks = vec![
            Task {
                created_at: at("2024-01-01T00:00:00Z"),
                ..task(1, "old")
            },
            Task {
                created_at: at("2024-05-01T00:00:00Z"),
                ..task(2, "new")
            },
        ];
        let q = sorted(SortOption::from_name("by_vibes"));
        assert_eq!(q.sort, SortOption::CreatedDesc);
        assert_eq!(ids(&filter_sort(&tasks, &q, &at("2024-06-15T12:00:00Z"))), vec![2, 1]);
    }

    #[test]
    fn test_status_filter_runs_last() {
        let tasks = vec![
            Task {
                completed: true,
                ..task(1, "done")
            },
            task(2, "open"),
        ];
        let now = at("2024-06-15T12:00:00Z");
        let active = TaskQuery {
            status: StatusFilter::Active,
            ..TaskQuery::default()
        };
        let completed = TaskQuery {
            status: StatusFilter::Completed,
            ..TaskQuery::default()
        };
        assert_eq!(ids(&filter_sort(&tasks, &active, &now)), vec![2]);
        assert_eq!(ids(&filter_sort(&tasks, &completed, &now)), vec![1]);
    }

    #[test]
    fn test_input_is_untouched_and_output_is_repeatable() {
        let (tasks, now) = june_fixture();
        let before = tasks.clone();
        let q = TaskQuery {
            sort: SortOption::DueDesc,
            ..TaskQuery::default()
        };
        let first = filter_sort(&tasks, &q, &now);
        let second = filter_sort(&tasks, &q, &now);
        assert_eq!(tasks, before);
        assert_eq!(first, second);
    }

    #[test]
    fn test_names_round_trip_with_fallbacks() {
        for view in View::ALL {
            assert_eq!(View::from_name(view.name()), view);
        }
        assert_eq!(View::from_name("someday"), View::All);
        assert_eq!(StatusFilter::from_name("archived"), StatusFilter::All);
        assert_eq!(View::Calendar.next(), View::All);
    }
}
