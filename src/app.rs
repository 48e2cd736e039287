use crate::calendar::{self, CalendarMode, Direction};
use crate::filter::{filter_sort, TaskQuery, View};
use crate::models::{NewProject, Project, ProjectUpdate, SubtaskUpdate, Task, TaskUpdate};
use crate::parser::{normalize_due_date, parse_tags, parse_task_input};
use crate::store::{Backend, Store};
use chrono::{DateTime, Local, NaiveDate};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::widgets::ListState;
use tracing::warn;

pub struct App<B: Backend> {
    pub store: Store<B>,
    pub query: TaskQuery,
    pub state: ListState,
    pub input_mode: InputMode,
    pub active_input: ActiveInput,
    pub new_task_title: String,
    pub new_task_description: String,
    pub prompt_input: String,
    pub show_detail: bool,
    pub calendar_mode: CalendarMode,
    pub calendar_reference: NaiveDate,
    pub status_message: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
    Insert,
    Search,
    Prompt(Prompt),
}

/// Single-line inputs that act on the selected task (or create a project).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prompt {
    Title,
    DueDate,
    Reminder,
    Tags,
    Subtask,
    Project,
    RenameProject,
}

impl Prompt {
    pub fn title(self) -> &'static str {
        match self {
            Prompt::Title => "Title",
            Prompt::DueDate => "Due date (YYYY-MM-DD[THH:MM], empty to clear)",
            Prompt::Reminder => "Remind at (YYYY-MM-DD[THH:MM], empty to clear)",
            Prompt::Tags => "Tags (comma separated)",
            Prompt::Subtask => "New subtask",
            Prompt::Project => "New project name",
            Prompt::RenameProject => "Rename project",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActiveInput {
    Title,
    Description,
}

impl<B: Backend> App<B> {
    pub fn new(store: Store<B>, query: TaskQuery, calendar_mode: CalendarMode, today: NaiveDate) -> App<B> {
        let mut app = App {
            store,
            query,
            state: ListState::default(),
            input_mode: InputMode::Normal,
            active_input: ActiveInput::Title,
            new_task_title: String::new(),
            new_task_description: String::new(),
            prompt_input: String::new(),
            show_detail: true,
            calendar_mode,
            calendar_reference: today,
            status_message: None,
        };
        app.clamp_selection(app.store.tasks().len());
        app
    }

    /// The list as it should be shown right now. Recomputed on every call.
    pub fn visible_tasks(&self, now: &DateTime<Local>) -> Vec<Task> {
        filter_sort(self.store.tasks(), &self.query, now)
    }

    pub fn selected_task(&self, now: &DateTime<Local>) -> Option<Task> {
        let selected = self.state.selected()?;
        self.visible_tasks(now).into_iter().nth(selected)
    }

    pub fn current_project(&self) -> Option<&Project> {
        match self.query.view {
            View::Project => self.query.project_id.and_then(|id| self.store.project(id)),
            _ => None,
        }
    }

    pub fn view_title(&self) -> String {
        match self.current_project() {
            Some(project) => format!("Project: {}", project.name),
            None => capitalize(self.query.view.name()),
        }
    }

    fn clamp_selection(&mut self, len: usize) {
        let selected = match self.state.selected() {
            _ if len == 0 => None,
            Some(i) if i >= len => Some(len - 1),
            Some(i) => Some(i),
            None => Some(0),
        };
        self.state.select(selected);
    }

    pub fn next(&mut self, len: usize) {
        if len == 0 {
            self.state.select(None);
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    pub fn previous(&mut self, len: usize) {
        if len == 0 {
            self.state.select(None);
            return;
        }
        let i = match self.state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        self.state.select(Some(i));
    }

    fn report(&mut self, ok: bool, done: &str) {
        self.status_message = Some(if ok {
            done.to_string()
        } else {
            format!("{} failed (see log)", done)
        });
    }

    pub async fn refresh(&mut self, now: &DateTime<Local>) {
        let ok = self.store.refresh_all().await;
        self.report(ok, "Refreshed");
        self.after_change(now);
    }

    fn after_change(&mut self, now: &DateTime<Local>) {
        let len = self.visible_tasks(now).len();
        self.clamp_selection(len);
    }

    fn cycle_project_view(&mut self) {
        let projects = self.store.projects();
        if projects.is_empty() {
            self.status_message = Some("No projects yet (press N to add one)".to_string());
            return;
        }
        let next = match self.query.project_id.and_then(|id| projects.iter().position(|p| p.id == id)) {
            Some(i) if self.query.view == View::Project => projects[(i + 1) % projects.len()].id,
            _ => projects[0].id,
        };
        self.query.view = View::Project;
        self.query.project_id = Some(next);
    }

    // Inbox, then each project in turn.
    fn next_assignment(&self, current: Option<i64>) -> Option<i64> {
        let projects = self.store.projects();
        match current.and_then(|id| projects.iter().position(|p| p.id == id)) {
            None => projects.first().map(|p| p.id),
            Some(i) => projects.get(i + 1).map(|p| p.id),
        }
    }

    fn open_prompt(&mut self, prompt: Prompt, initial: String) {
        self.prompt_input = initial;
        self.input_mode = InputMode::Prompt(prompt);
    }

    /// Returns true when the app should quit.
    pub async fn handle_input(&mut self, key: KeyEvent, now: &DateTime<Local>) -> bool {
        match self.input_mode {
            InputMode::Normal => return self.handle_normal(key, now).await,
            InputMode::Editing => self.handle_editing(key, now).await,
            InputMode::Insert => match key.code {
                KeyCode::Char(c) => match self.active_input {
                    ActiveInput::Title => self.new_task_title.push(c),
                    ActiveInput::Description => self.new_task_description.push(c),
                },
                KeyCode::Backspace => match self.active_input {
                    ActiveInput::Title => {
                        self.new_task_title.pop();
                    }
                    ActiveInput::Description => {
                        self.new_task_description.pop();
                    }
                },
                KeyCode::Esc => {
                    self.input_mode = InputMode::Editing;
                }
                _ => {}
            },
            InputMode::Search => match key.code {
                KeyCode::Char(c) => {
                    self.query.search.push(c);
                    self.after_change(now);
                }
                KeyCode::Backspace => {
                    self.query.search.pop();
                    self.after_change(now);
                }
                KeyCode::Enter => self.input_mode = InputMode::Normal,
                KeyCode::Esc => {
                    self.query.search.clear();
                    self.input_mode = InputMode::Normal;
                    self.after_change(now);
                }
                _ => {}
            },
            InputMode::Prompt(prompt) => match key.code {
                KeyCode::Char(c) => self.prompt_input.push(c),
                KeyCode::Backspace => {
                    self.prompt_input.pop();
                }
                KeyCode::Enter => {
                    self.submit_prompt(prompt, now).await;
                    self.prompt_input.clear();
                    self.input_mode = InputMode::Normal;
                }
                KeyCode::Esc => {
                    self.prompt_input.clear();
                    self.input_mode = InputMode::Normal;
                }
                _ => {}
            },
        }
        false
    }

    async fn handle_normal(&mut self, key: KeyEvent, now: &DateTime<Local>) -> bool {
        let len = self.visible_tasks(now).len();
        let in_calendar = self.query.view == View::Calendar;
        // The calendar draws no list, so there is nothing selected to act on.
        let selected = if in_calendar {
            None
        } else {
            self.selected_task(now)
        };

        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('j') | KeyCode::Down if !in_calendar => self.next(len),
            KeyCode::Char('k') | KeyCode::Up if !in_calendar => self.previous(len),
            KeyCode::Char('h') | KeyCode::Left if in_calendar => {
                self.calendar_reference =
                    calendar::shift(self.calendar_reference, self.calendar_mode, Direction::Previous);
            }
            KeyCode::Char('l') | KeyCode::Right if in_calendar => {
                self.calendar_reference =
                    calendar::shift(self.calendar_reference, self.calendar_mode, Direction::Next);
            }
            KeyCode::Char('t') if in_calendar => {
                self.calendar_reference = calendar::today(now);
            }
            KeyCode::Char('m') if in_calendar => {
                self.calendar_mode = self.calendar_mode.toggle();
            }
            KeyCode::Char('v') => {
                self.query.view = self.query.view.next();
                self.state.select(None);
                self.after_change(now);
            }
            KeyCode::Char('P') => {
                self.cycle_project_view();
                self.state.select(None);
                self.after_change(now);
            }
            KeyCode::Char('o') => {
                self.query.sort = self.query.sort.next();
                self.after_change(now);
            }
            KeyCode::Char('f') => {
                self.query.status = self.query.status.next();
                self.after_change(now);
            }
            KeyCode::Char('/') => {
                self.input_mode = InputMode::Search;
            }
            KeyCode::Char('r') => self.refresh(now).await,
            KeyCode::Enter => self.show_detail = !self.show_detail,
            KeyCode::Char('a') => {
                self.input_mode = InputMode::Editing;
                self.new_task_title.clear();
                self.new_task_description.clear();
                self.active_input = ActiveInput::Title;
            }
            KeyCode::Char('N') => self.open_prompt(Prompt::Project, String::new()),
            KeyCode::Char('R') => {
                if let Some(name) = self.current_project().map(|p| p.name.clone()) {
                    self.open_prompt(Prompt::RenameProject, name);
                }
            }
            KeyCode::Char('X') => {
                if let Some(id) = self.current_project().map(|p| p.id) {
                    let ok = self.store.delete_project(id).await;
                    self.report(ok, "Project deleted");
                    if ok {
                        self.query.view = View::Inbox;
                        self.query.project_id = None;
                    }
                    self.after_change(now);
                }
            }
            KeyCode::Char('e') => {
                if let Some(task) = selected {
                    self.open_prompt(Prompt::Title, task.title);
                }
            }
            KeyCode::Char('x') | KeyCode::Char(' ') => {
                if let Some(task) = selected {
                    let ok = self.store.toggle_task(task.id).await;
                    self.report(ok, "Updated");
                    self.after_change(now);
                }
            }
            KeyCode::Char('d') => {
                if let Some(task) = selected {
                    let ok = self.store.delete_task(task.id).await;
                    self.report(ok, "Deleted");
                    self.after_change(now);
                }
            }
            KeyCode::Char('p') => {
                if let Some(task) = selected {
                    let update = TaskUpdate {
                        priority: Some(task.priority.cycle()),
                        ..TaskUpdate::details(&task)
                    };
                    let ok = self.store.update_task(task.id, update).await;
                    self.report(ok, "Updated");
                    self.after_change(now);
                }
            }
            KeyCode::Char('M') => {
                if let Some(task) = selected {
                    let update = TaskUpdate {
                        project_id: Some(self.next_assignment(task.project_id)),
                        ..TaskUpdate::details(&task)
                    };
                    let ok = self.store.update_task(task.id, update).await;
                    self.report(ok, "Moved");
                    self.after_change(now);
                }
            }
            KeyCode::Char('c') => {
                if let Some(subtask) = selected
                    .as_ref()
                    .and_then(|task| task.subtasks.iter().find(|s| !s.completed))
                {
                    let update = SubtaskUpdate::completed(subtask, true);
                    let ok = self.store.update_subtask(subtask.id, update).await;
                    self.report(ok, "Subtask done");
                }
            }
            KeyCode::Char('C') => {
                let done: Vec<i64> = selected
                    .map(|task| {
                        task.subtasks
                            .iter()
                            .filter(|s| s.completed)
                            .map(|s| s.id)
                            .collect()
                    })
                    .unwrap_or_default();
                if !done.is_empty() {
                    let mut ok = true;
                    for id in done {
                        ok &= self.store.delete_subtask(id).await;
                    }
                    self.report(ok, "Cleared subtasks");
                }
            }
            KeyCode::Char('D') => {
                if let Some(task) = selected {
                    let initial = task
                        .due_date
                        .map(|due| due.with_timezone(&Local).format("%Y-%m-%dT%H:%M").to_string())
                        .unwrap_or_default();
                    self.open_prompt(Prompt::DueDate, initial);
                }
            }
            KeyCode::Char('w') => {
                if let Some(task) = selected {
                    let initial = task
                        .remind_at
                        .map(|at| at.with_timezone(&Local).format("%Y-%m-%dT%H:%M").to_string())
                        .unwrap_or_default();
                    self.open_prompt(Prompt::Reminder, initial);
                }
            }
            KeyCode::Char('y') => {
                if let Some(task) = selected {
                    let update = TaskUpdate {
                        repeat: Some(task.repeat.cycle()),
                        ..TaskUpdate::details(&task)
                    };
                    let ok = self.store.update_task(task.id, update).await;
                    self.report(ok, "Updated");
                    self.after_change(now);
                }
            }
            KeyCode::Char('T') => {
                if let Some(task) = selected {
                    self.open_prompt(Prompt::Tags, task.tags.join(", "));
                }
            }
            KeyCode::Char('s') => {
                if selected.is_some() {
                    self.open_prompt(Prompt::Subtask, String::new());
                }
            }
            _ => {}
        }
        false
    }

    async fn handle_editing(&mut self, key: KeyEvent, now: &DateTime<Local>) {
        match key.code {
            KeyCode::Char('i') => {
                self.input_mode = InputMode::Insert;
            }
            KeyCode::Tab => {
                self.active_input = match self.active_input {
                    ActiveInput::Title => ActiveInput::Description,
                    ActiveInput::Description => ActiveInput::Title,
                };
            }
            KeyCode::Enter => {
                let parsed = parse_task_input(&self.new_task_title, now);
                if parsed.title.is_empty() {
                    self.status_message = Some("Task title cannot be empty".to_string());
                    return;
                }
                let project_id = self.current_project().map(|p| p.id);
                let task = parsed.into_new_task(self.new_task_description.trim().to_string(), project_id);
                let ok = self.store.add_task(task).await;
                self.report(ok, "Added");
                self.new_task_title.clear();
                self.new_task_description.clear();
                self.input_mode = InputMode::Normal;
                self.after_change(now);
            }
            KeyCode::Esc => {
                self.new_task_title.clear();
                self.new_task_description.clear();
                self.input_mode = InputMode::Normal;
            }
            _ => {}
        }
    }

    async fn submit_prompt(&mut self, prompt: Prompt, now: &DateTime<Local>) {
        match prompt {
            Prompt::Project => {
                let name = self.prompt_input.trim();
                if !name.is_empty() {
                    let ok = self.store.add_project(NewProject::named(name)).await;
                    self.report(ok, "Project added");
                }
                return;
            }
            Prompt::RenameProject => {
                let name = self.prompt_input.trim();
                let renamed = self
                    .current_project()
                    .filter(|_| !name.is_empty())
                    .map(|p| (p.id, ProjectUpdate::renamed(p, name)));
                if let Some((id, update)) = renamed {
                    let ok = self.store.update_project(id, update).await;
                    self.report(ok, "Project renamed");
                }
                return;
            }
            _ => {}
        }

        let Some(task) = self.selected_task(now) else {
            return;
        };
        let ok = match prompt {
            Prompt::Title => {
                let title = self.prompt_input.trim().to_string();
                if title.is_empty() {
                    self.status_message = Some("Task title cannot be empty".to_string());
                    return;
                }
                let update = TaskUpdate {
                    title: Some(title),
                    ..TaskUpdate::details(&task)
                };
                self.store.update_task(task.id, update).await
            }
            Prompt::DueDate | Prompt::Reminder => match normalize_due_date(&self.prompt_input) {
                Ok(date) => {
                    let mut update = TaskUpdate::details(&task);
                    if prompt == Prompt::Reminder {
                        update.remind_at = Some(date);
                    } else {
                        update.due_date = Some(date);
                    }
                    self.store.update_task(task.id, update).await
                }
                Err(err) => {
                    warn!("{}", err);
                    self.status_message = Some(err.to_string());
                    return;
                }
            },
            Prompt::Tags => {
                let update = TaskUpdate {
                    tags: Some(parse_tags(&self.prompt_input)),
                    ..TaskUpdate::details(&task)
                };
                self.store.update_task(task.id, update).await
            }
            Prompt::Subtask => {
                let title = self.prompt_input.trim().to_string();
                if title.is_empty() {
                    return;
                }
                self.store.add_subtask(task.id, &title).await
            }
            Prompt::Project | Prompt::RenameProject => false,
        };
        self.report(ok, "Updated");
        self.after_change(now);
    }
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
