use crate::app::{ActiveInput, App, InputMode};
use crate::calendar::{self, CalendarMode, DayCell};
use crate::filter::View;
use crate::models::{Priority, Task};
use crate::store::Backend;
use chrono::{DateTime, Datelike, Local, NaiveDate, Utc};
use crossterm::event::{self, Event as CEvent, KeyEventKind};
use ratatui::{
    backend::Backend as TerminalBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;

const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

fn centered_rect_absolute(width: u16, height: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length((r.height.saturating_sub(height)) / 2),
                Constraint::Length(height),
                Constraint::Length((r.height.saturating_sub(height) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints(
            [
                Constraint::Length((r.width.saturating_sub(width)) / 2),
                Constraint::Length(width),
                Constraint::Length((r.width.saturating_sub(width) + 1) / 2),
            ]
            .as_ref(),
        )
        .split(popup_layout[1])[1]
}

fn key_hint(key: &'static str, action: &'static str) -> [Span<'static>; 2] {
    [
        Span::styled(format!(" {} ", key), Style::default().fg(Color::Red)),
        Span::raw(format!(": {} ", action)),
    ]
}

fn get_legend(input_mode: &InputMode, view: View) -> Text<'static> {
    let hints: Vec<[Span<'static>; 2]> = match input_mode {
        InputMode::Normal if view == View::Calendar => vec![
            key_hint("q", "Quit"),
            key_hint("h/l", "Prev/Next"),
            key_hint("t", "Today"),
            key_hint("m", "Month/Week"),
            key_hint("v", "View"),
            key_hint("a", "Add Task"),
            key_hint("r", "Refresh"),
        ],
        InputMode::Normal => vec![
            key_hint("q", "Quit"),
            key_hint("j/k", "Down/Up"),
            key_hint("v", "View"),
            key_hint("P", "Project"),
            key_hint("o", "Sort"),
            key_hint("f", "Status"),
            key_hint("/", "Search"),
            key_hint("a", "Add"),
            key_hint("x", "Done"),
            key_hint("d", "Delete"),
            key_hint("p", "Priority"),
            key_hint("D", "Due"),
            key_hint("w", "Remind"),
            key_hint("y", "Repeat"),
            key_hint("T", "Tags"),
            key_hint("M", "Move"),
            key_hint("s", "Subtask"),
            key_hint("c", "Check Subtask"),
            key_hint("e", "Edit Title"),
            key_hint("C", "Clear Subtasks"),
            key_hint("N", "New Project"),
            key_hint("R/X", "Rename/Delete Project"),
            key_hint("r", "Refresh"),
        ],
        InputMode::Editing => vec![
            key_hint("i", "Insert"),
            key_hint("Tab", "Switch Field"),
            key_hint("Enter", "Submit"),
            key_hint("Esc", "Cancel"),
        ],
        InputMode::Insert => vec![key_hint("Esc", "Done Typing")],
        InputMode::Search => vec![key_hint("Enter", "Keep"), key_hint("Esc", "Clear")],
        InputMode::Prompt(_) => vec![key_hint("Enter", "Submit"), key_hint("Esc", "Cancel")],
    };
    Text::from(Line::from(hints.into_iter().flatten().collect::<Vec<_>>()))
}

fn priority_style(priority: Priority) -> Style {
    match priority {
        Priority::High => Style::default().fg(Color::Red),
        Priority::Medium => Style::default().fg(Color::Yellow),
        Priority::Low => Style::default().fg(Color::Blue),
    }
}

fn format_due(due: &DateTime<Utc>) -> String {
    due.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn task_line<'a>(task: &'a Task, now: &DateTime<Local>) -> Line<'a> {
    let mut spans = Vec::new();
    if task.completed {
        spans.push(Span::styled("DONE ", Style::default().fg(Color::Green)));
    }
    spans.push(Span::styled(
        format!("[{}] ", &task.priority.as_str()[..1].to_uppercase()),
        priority_style(task.priority),
    ));
    spans.push(Span::raw(task.title.as_str()));
    if let Some(due) = &task.due_date {
        let overdue = !task.completed && *due < now.with_timezone(&Utc);
        let style = if overdue {
            Style::default().fg(Color::Red)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!("  {}", format_due(due)), style));
    }
    for tag in &task.tags {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(
            format!("#{}", tag),
            Style::default().fg(Color::Cyan),
        ));
    }
    if !task.subtasks.is_empty() {
        spans.push(Span::styled(
            format!("  ({}/{})", task.completed_subtasks(), task.subtasks.len()),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

fn detail_lines<B: Backend>(app: &App<B>, task: &Task) -> Vec<Line<'static>> {
    let bold = Style::default().add_modifier(Modifier::BOLD);
    let field = |name: &'static str, value: String| {
        Line::from(vec![Span::styled(name, bold), Span::raw(value)])
    };

    let mut lines: Vec<Line<'static>> = vec![
        Line::from(Span::styled(task.title.clone(), bold)),
        Line::from(""),
        field(
            "Status: ",
            if task.completed { "done" } else { "open" }.to_string(),
        ),
        field("Priority: ", task.priority.to_string()),
        field(
            "Due Date: ",
            task.due_date
                .as_ref()
                .map(format_due)
                .unwrap_or_else(|| "No due date".to_string()),
        ),
    ];

    if let Some(remind_at) = &task.remind_at {
        lines.push(field("Reminder: ", format_due(remind_at)));
    }
    if let Some(repeat) = task.repeat.label() {
        lines.push(field("Repeats: ", repeat.to_string()));
    }

    let project = task
        .project_id
        .and_then(|id| app.store.project(id))
        .map(|p| p.name.clone())
        .unwrap_or_else(|| "Inbox".to_string());
    lines.push(field("Project: ", project));

    // tags
    lines.push(Line::from(vec![Span::styled("Tags: ", bold)]));
    if task.tags.is_empty() {
        lines.push(Line::from(Span::raw("No tags".to_string())));
    } else {
        let mut tag_spans: Vec<Span<'static>> = Vec::new();
        for (i, tag) in task.tags.iter().enumerate() {
            if i > 0 {
                tag_spans.push(Span::raw(" ".to_string()));
            }
            tag_spans.push(Span::styled(
                format!(" {} ", tag),
                Style::default().bg(Color::Yellow).fg(Color::Black),
            ));
        }
        lines.push(Line::from(tag_spans));
    }

    lines.push(Line::from(vec![Span::styled("Description: ", bold)]));
    if task.description.trim().is_empty() {
        lines.push(Line::from(Span::raw("No description".to_string())));
    } else {
        lines.extend(task.description.lines().map(|l| Line::from(l.to_string())));
    }

    if !task.subtasks.is_empty() {
        lines.push(Line::from(vec![Span::styled("Subtasks: ", bold)]));
        for subtask in &task.subtasks {
            let mark = if subtask.completed { "[x] " } else { "[ ] " };
            lines.push(Line::from(format!("{}{}", mark, subtask.title)));
        }
    }

    lines
}

fn draw_header<B: Backend>(f: &mut Frame<'_>, app: &App<B>, area: Rect) {
    let mut spans = vec![
        Span::styled(
            format!(" {} ", app.view_title()),
            Style::default().fg(Color::Black).bg(Color::Green),
        ),
        Span::raw(format!(
            "  sort: {}  status: {}",
            app.query.sort.name(),
            app.query.status.name()
        )),
    ];
    if !app.query.search.is_empty() || app.input_mode == InputMode::Search {
        spans.push(Span::styled(
            format!("  search: {}", app.query.search),
            Style::default().fg(Color::Yellow),
        ));
        if app.input_mode == InputMode::Search {
            spans.push(Span::styled("_", Style::default().add_modifier(Modifier::SLOW_BLINK)));
        }
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_list<B: Backend>(f: &mut Frame<'_>, app: &mut App<B>, area: Rect, now: &DateTime<Local>) {
    let visible = app.visible_tasks(now);

    let chunks = if app.show_detail {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(65), Constraint::Percentage(35)].as_ref())
            .split(area)
    } else {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(100)].as_ref())
            .split(area)
    };

    let list_title = format!("Tasks ({})", visible.len());

    // Left panel: Task list
    let tasks_widget = if !visible.is_empty() {
        let items: Vec<ListItem> = visible
            .iter()
            .map(|task| ListItem::new(task_line(task, now)))
            .collect();

        List::new(items)
            .block(Block::default().borders(Borders::ALL).title(list_title))
            .highlight_style(
                Style::default()
                    .fg(Color::Green)
                    .add_modifier(Modifier::BOLD),
            )
            .highlight_symbol(">> ")
    } else {
        List::new(vec![ListItem::new("No tasks available")])
            .block(Block::default().borders(Borders::ALL).title(list_title))
    };

    f.render_stateful_widget(tasks_widget, chunks[0], &mut app.state);

    if !app.show_detail {
        return;
    }

    // Right panel: Task details
    let detail_block = Block::default().borders(Borders::ALL).title("Task Details");
    let selected = app.state.selected().and_then(|i| visible.get(i));
    let paragraph = match selected {
        Some(task) => Paragraph::new(detail_lines(app, task)),
        None => Paragraph::new("Select a task to view details"),
    };
    f.render_widget(paragraph.block(detail_block).wrap(Wrap { trim: true }), chunks[1]);
}

fn draw_calendar<B: Backend>(f: &mut Frame<'_>, app: &App<B>, area: Rect, now: &DateTime<Local>) {
    let cells = calendar::project_calendar(
        app.store.tasks(),
        app.calendar_reference,
        app.calendar_mode,
        &Local,
    );
    let today = calendar::today(now);

    let block = Block::default()
        .borders(Borders::ALL)
        .title(calendar::period_title(app.calendar_reference, app.calendar_mode));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = match app.calendar_mode {
        CalendarMode::Month => 6,
        CalendarMode::Week => 1,
    };

    let mut row_constraints = vec![Constraint::Length(1)];
    row_constraints.extend((0..rows).map(|_| Constraint::Ratio(1, rows)));
    let row_areas = Layout::default()
        .direction(Direction::Vertical)
        .constraints(row_constraints)
        .split(inner);

    let columns = |row: Rect| {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, 7); 7])
            .split(row)
    };

    for (col, name) in columns(row_areas[0]).iter().zip(WEEKDAYS) {
        f.render_widget(
            Paragraph::new(name)
                .alignment(Alignment::Center)
                .style(Style::default().add_modifier(Modifier::BOLD)),
            *col,
        );
    }

    for (row, week) in cells.chunks(7).enumerate() {
        let Some(row_area) = row_areas.get(row + 1) else {
            break;
        };
        for (col, cell) in columns(*row_area).iter().zip(week) {
            f.render_widget(day_cell(cell, today), *col);
        }
    }
}

fn day_cell<'a>(cell: &DayCell<'a>, today: NaiveDate) -> Paragraph<'a> {
    let mut header_style = Style::default();
    if !cell.in_current_period {
        header_style = header_style.fg(Color::DarkGray);
    }
    if cell.date == today {
        header_style = header_style.fg(Color::Black).bg(Color::Green);
    }

    let mut lines = vec![Line::from(Span::styled(
        format!("{:>2}", cell.date.day()),
        header_style,
    ))];
    for task in cell.tasks.iter().copied() {
        let style = if task.completed {
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::CROSSED_OUT)
        } else {
            priority_style(task.priority)
        };
        lines.push(Line::from(Span::styled(task.title.as_str(), style)));
    }

    let border_style = if cell.in_current_period {
        Style::default()
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).border_style(border_style))
        .wrap(Wrap { trim: true })
}

// Inner width of a popup covering 60% of `area`.
fn popup_width(area: Rect) -> u16 {
    let width = u32::from(area.width) * 60 / 100;
    u16::try_from(width).unwrap_or(area.width).saturating_sub(2)
}

fn draw_task_form<B: Backend>(f: &mut Frame<'_>, app: &App<B>, area: Rect) {
    let popup_width = popup_width(area);

    let title_lines = calculate_wrapped_lines(&app.new_task_title, popup_width).max(1) as u16;
    let description_lines =
        calculate_wrapped_lines(&app.new_task_description, popup_width).max(1) as u16;

    let popup_height = std::cmp::min(
        title_lines + description_lines + 4,
        area.height.saturating_sub(2),
    );
    let popup_area = centered_rect_absolute(popup_width + 2, popup_height, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(title_lines + 2), Constraint::Min(0)].as_ref())
        .split(popup_area);

    let field_style = |input: ActiveInput| {
        if app.active_input == input {
            if app.input_mode == InputMode::Insert {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::Green)
            }
        } else {
            Style::default().fg(Color::DarkGray)
        }
    };

    let title = Paragraph::new(app.new_task_title.as_str())
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .title("New Task (!high #tag @2024-06-15 ^2024-06-14T09:00 *weekly)")
                .borders(Borders::ALL)
                .border_style(field_style(ActiveInput::Title)),
        )
        .wrap(Wrap { trim: false });

    let description = Paragraph::new(app.new_task_description.as_str())
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .title("Description")
                .borders(Borders::ALL)
                .border_style(field_style(ActiveInput::Description)),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, popup_area);
    f.render_widget(title, chunks[0]);
    f.render_widget(description, chunks[1]);
}

fn draw_prompt(f: &mut Frame<'_>, title: &str, input: &str, area: Rect) {
    let popup_area = centered_rect_absolute(popup_width(area) + 2, 3, area);
    let popup = Paragraph::new(input)
        .style(Style::default().fg(Color::White))
        .block(
            Block::default()
                .title(title.to_string())
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Green)),
        );
    f.render_widget(Clear, popup_area);
    f.render_widget(popup, popup_area);
}

pub fn draw<B: Backend>(f: &mut Frame<'_>, app: &mut App<B>, now: &DateTime<Local>) {
    let size = f.area();

    // Header, body, status line and footer
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(0)
        .constraints(
            [
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Length(2),
            ]
            .as_ref(),
        )
        .split(size);

    let body_chunk = chunks[1];

    draw_header(f, app, chunks[0]);

    if app.query.view == View::Calendar {
        draw_calendar(f, app, body_chunk, now);
    } else {
        draw_list(f, app, body_chunk, now);
    }

    match app.input_mode {
        InputMode::Editing | InputMode::Insert => draw_task_form(f, app, body_chunk),
        InputMode::Prompt(prompt) => draw_prompt(f, prompt.title(), &app.prompt_input, body_chunk),
        InputMode::Normal | InputMode::Search => {}
    }

    if let Some(message) = &app.status_message {
        f.render_widget(
            Paragraph::new(message.as_str()).style(Style::default().fg(Color::Yellow)),
            chunks[2],
        );
    }

    // Render the legend in the footer
    let legend = Paragraph::new(get_legend(&app.input_mode, app.query.view))
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });

    f.render_widget(legend, chunks[3]);
}

pub async fn run_app<T: TerminalBackend, B: Backend>(
    terminal: &mut Terminal<T>,
    mut app: App<B>,
) -> io::Result<()> {
    loop {
        let now = Local::now();
        terminal.draw(|f| draw(f, &mut app, &now))?;

        // Handle input
        if event::poll(Duration::from_millis(100))? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                let should_quit = app.handle_input(key, &Local::now()).await;
                if should_quit {
                    return Ok(());
                }
            }
        }
    }
}

fn calculate_wrapped_lines(text: &str, max_width: u16) -> usize {
    if max_width == 0 {
        return 0;
    }
    let mut line_count = 0;
    for line in text.lines() {
        let line_width = line.chars().count() as u16;
        line_count += line_width.div_ceil(max_width) as usize;
    }
    line_count
}
