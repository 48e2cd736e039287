use crate::models::Task;
use chrono::{DateTime, Datelike, Days, Months, NaiveDate, TimeZone};

const MONTH_CELLS: usize = 42;
const WEEK_CELLS: usize = 7;
// Reference dates are kept this far from the ends of the date range so a
// whole grid always fits.
const EDGE_DAYS: u64 = 62;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CalendarMode {
    #[default]
    Month,
    Week,
}

impl CalendarMode {
    pub fn from_name(name: &str) -> CalendarMode {
        match name.trim() {
            "week" => CalendarMode::Week,
            _ => CalendarMode::Month,
        }
    }

    pub fn toggle(self) -> CalendarMode {
        match self {
            CalendarMode::Month => CalendarMode::Week,
            CalendarMode::Week => CalendarMode::Month,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

/// One grid position, bound to a single date.
#[derive(Debug, PartialEq)]
pub struct DayCell<'a> {
    pub date: NaiveDate,
    /// False for the leading and trailing days of neighbouring months.
    pub in_current_period: bool,
    pub tasks: Vec<&'a Task>,
}

/// Lays `tasks` out on a month (6 x 7) or week (1 x 7) grid starting on a
/// Sunday. A task lands in the cell matching the calendar date of its due
/// date in `tz`; undated tasks are left out.
pub fn project_calendar<'a, Tz: TimeZone>(
    tasks: &'a [Task],
    reference: NaiveDate,
    mode: CalendarMode,
    tz: &Tz,
) -> Vec<DayCell<'a>> {
    let reference = clamp_reference(reference);
    let (start, len) = grid_bounds(reference, mode);

    let mut cells: Vec<DayCell<'a>> = start
        .iter_days()
        .take(len)
        .map(|date| DayCell {
            date,
            in_current_period: match mode {
                CalendarMode::Month => {
                    date.month() == reference.month() && date.year() == reference.year()
                }
                CalendarMode::Week => true,
            },
            tasks: Vec::new(),
        })
        .collect();

    for task in tasks {
        let Some(due) = task.due_date else {
            continue;
        };
        let date = due.with_timezone(tz).date_naive();
        let offset = date.signed_duration_since(start).num_days();
        if let Ok(index) = usize::try_from(offset) {
            if let Some(cell) = cells.get_mut(index) {
                cell.tasks.push(task);
            }
        }
    }

    cells
}

/// Moves the reference date one period. Month steps keep the day of month
/// where possible and clamp to the last day otherwise (Jan 31 -> Feb 29).
pub fn shift(reference: NaiveDate, mode: CalendarMode, direction: Direction) -> NaiveDate {
    let moved = match (mode, direction) {
        (CalendarMode::Month, Direction::Next) => reference.checked_add_months(Months::new(1)),
        (CalendarMode::Month, Direction::Previous) => reference.checked_sub_months(Months::new(1)),
        (CalendarMode::Week, Direction::Next) => reference.checked_add_days(Days::new(7)),
        (CalendarMode::Week, Direction::Previous) => reference.checked_sub_days(Days::new(7)),
    };
    moved.unwrap_or(reference)
}

pub fn today<Tz: TimeZone>(now: &DateTime<Tz>) -> NaiveDate {
    now.date_naive()
}

/// Header label for the grid, e.g. "June 2024" or "Jun 9 - Jun 15, 2024".
pub fn period_title(reference: NaiveDate, mode: CalendarMode) -> String {
    let reference = clamp_reference(reference);
    match mode {
        CalendarMode::Month => reference.format("%B %Y").to_string(),
        CalendarMode::Week => {
            let (start, _) = grid_bounds(reference, mode);
            let end = start.checked_add_days(Days::new(6)).unwrap_or(start);
            if start.year() == end.year() {
                format!("{} - {}", start.format("%b %-d"), end.format("%b %-d, %Y"))
            } else {
                format!("{} - {}", start.format("%b %-d, %Y"), end.format("%b %-d, %Y"))
            }
        }
    }
}

fn grid_bounds(reference: NaiveDate, mode: CalendarMode) -> (NaiveDate, usize) {
    match mode {
        CalendarMode::Month => {
            let first = reference.with_day(1).unwrap_or(reference);
            (sunday_on_or_before(first), MONTH_CELLS)
        }
        CalendarMode::Week => (sunday_on_or_before(reference), WEEK_CELLS),
    }
}

fn sunday_on_or_before(date: NaiveDate) -> NaiveDate {
    date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_sunday())))
        .unwrap_or(date)
}

fn clamp_reference(reference: NaiveDate) -> NaiveDate {
    let earliest = NaiveDate::MIN
        .checked_add_days(Days::new(EDGE_DAYS))
        .unwrap_or(NaiveDate::MIN);
    let latest = NaiveDate::MAX
        .checked_sub_days(Days::new(EDGE_DAYS))
        .unwrap_or(NaiveDate::MAX);
    reference.clamp(earliest, latest)
}
