use crate::api::ApiError;
use crate::models::{
    NewProject, NewSubtask, NewTask, Project, ProjectUpdate, SubtaskUpdate, Task, TaskUpdate,
};
use tracing::{error, info};

/// The REST operations the client relies on.
#[allow(async_fn_in_trait)]
pub trait Backend {
    async fn fetch_tasks(&self) -> Result<Vec<Task>, ApiError>;
    async fn create_task(&self, task: &NewTask) -> Result<(), ApiError>;
    async fn update_task(&self, id: i64, update: &TaskUpdate) -> Result<(), ApiError>;
    async fn delete_task(&self, id: i64) -> Result<(), ApiError>;
    async fn create_subtask(&self, task_id: i64, subtask: &NewSubtask) -> Result<(), ApiError>;
    async fn update_subtask(&self, id: i64, update: &SubtaskUpdate) -> Result<(), ApiError>;
    async fn delete_subtask(&self, id: i64) -> Result<(), ApiError>;
    async fn fetch_projects(&self) -> Result<Vec<Project>, ApiError>;
    async fn create_project(&self, project: &NewProject) -> Result<(), ApiError>;
    async fn update_project(&self, id: i64, update: &ProjectUpdate) -> Result<(), ApiError>;
    async fn delete_project(&self, id: i64) -> Result<(), ApiError>;
}

/// Cached copies of the backend collections.
///
/// Every mutation is followed by a full refetch and the cache is replaced
/// wholesale, never patched from a response body. A failed call is logged
/// and the cache keeps its last good value. Each method reports whether it
/// went through so the UI can say so.
pub struct Store<B: Backend> {
    backend: B,
    tasks: Vec<Task>,
    projects: Vec<Project>,
}

impl<B: Backend> Store<B> {
    pub fn new(backend: B) -> Store<B> {
        Store {
            backend,
            tasks: Vec::new(),
            projects: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn task(&self, id: i64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn project(&self, id: i64) -> Option<&Project> {
        self.projects.iter().find(|p| p.id == id)
    }

    pub async fn refresh_tasks(&mut self) -> bool {
        match self.backend.fetch_tasks().await {
            Ok(tasks) => {
                info!(count = tasks.len(), "fetched tasks");
                self.tasks = tasks;
                true
            }
            Err(err) => {
                error!("failed to fetch tasks: {}", err);
                false
            }
        }
    }

    pub async fn refresh_projects(&mut self) -> bool {
        match self.backend.fetch_projects().await {
            Ok(projects) => {
                info!(count = projects.len(), "fetched projects");
                self.projects = projects;
                true
            }
            Err(err) => {
                error!("failed to fetch projects: {}", err);
                false
            }
        }
    }

    pub async fn refresh_all(&mut self) -> bool {
        let tasks = self.refresh_tasks().await;
        let projects = self.refresh_projects().await;
        tasks && projects
    }

    pub async fn add_task(&mut self, task: NewTask) -> bool {
        let result = self.backend.create_task(&task).await;
        self.after_task_mutation("add task", result).await
    }

    pub async fn update_task(&mut self, id: i64, update: TaskUpdate) -> bool {
        let result = self.backend.update_task(id, &update).await;
        self.after_task_mutation("update task", result).await
    }

    pub async fn toggle_task(&mut self, id: i64) -> bool {
        let Some(completed) = self.task(id).map(|t| t.completed) else {
            return false;
        };
        self.update_task(id, TaskUpdate::completed(!completed)).await
    }

    pub async fn delete_task(&mut self, id: i64) -> bool {
        let result = self.backend.delete_task(id).await;
        self.after_task_mutation("delete task", result).await
    }

    pub async fn add_subtask(&mut self, task_id: i64, title: &str) -> bool {
        let subtask = NewSubtask {
            title: title.to_string(),
        };
        let result = self.backend.create_subtask(task_id, &subtask).await;
        self.after_task_mutation("add subtask", result).await
    }

    pub async fn update_subtask(&mut self, id: i64, update: SubtaskUpdate) -> bool {
        let result = self.backend.update_subtask(id, &update).await;
        self.after_task_mutation("update subtask", result).await
    }

    pub async fn delete_subtask(&mut self, id: i64) -> bool {
        let result = self.backend.delete_subtask(id).await;
        self.after_task_mutation("delete subtask", result).await
    }

    pub async fn add_project(&mut self, project: NewProject) -> bool {
        let result = self.backend.create_project(&project).await;
        self.after_project_mutation("add project", result).await
    }

    pub async fn update_project(&mut self, id: i64, update: ProjectUpdate) -> bool {
        let result = self.backend.update_project(id, &update).await;
        self.after_project_mutation("update project", result).await
    }

    /// Tasks are refetched as well since the backend may unassign them.
    pub async fn delete_project(&mut self, id: i64) -> bool {
        let result = self.backend.delete_project(id).await;
        if self.after_project_mutation("delete project", result).await {
            self.refresh_tasks().await
        } else {
            false
        }
    }

    async fn after_task_mutation(&mut self, action: &str, result: Result<(), ApiError>) -> bool {
        match result {
            Ok(()) => self.refresh_tasks().await,
            Err(err) => {
                error!("failed to {}: {}", action, err);
                false
            }
        }
    }

    async fn after_project_mutation(
        &mut self,
        action: &str,
        result: Result<(), ApiError>,
    ) -> bool {
        match result {
            Ok(()) => self.refresh_projects().await,
            Err(err) => {
                error!("failed to {}: {}", action, err);
                false
            }
        }
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use crate::models::{test_support, Subtask};
    use reqwest::StatusCode;
    use serde_json::Value;
    use std::cell::{Cell, RefCell};

    /// In-memory backend that assigns ids and can be told to fail. Updates
    /// are applied the way the REST server applies them, and every PUT body
    /// is kept as JSON in `bodies`.
    #[derive(Default)]
    pub struct FakeBackend {
        pub tasks: RefCell<Vec<Task>>,
        pub projects: RefCell<Vec<Project>>,
        pub calls: RefCell<Vec<String>>,
        pub bodies: RefCell<Vec<Value>>,
        pub fail_writes: Cell<bool>,
        pub fail_reads: Cell<bool>,
        next_id: Cell<i64>,
    }

    impl FakeBackend {
        fn id(&self) -> i64 {
            let id = self.next_id.get() + 1;
            self.next_id.set(id);
            id
        }

        fn record(&self, call: String) {
            self.calls.borrow_mut().push(call);
        }

        fn record_body<T: serde::Serialize>(&self, body: &T) {
            let value = serde_json::to_value(body).expect("serializable body");
            self.bodies.borrow_mut().push(value);
        }

        fn check(&self, failing: bool, method: &'static str) -> Result<(), ApiError> {
            if failing {
                Err(ApiError::Status {
                    method,
                    url: "http://fake/api".into(),
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    body: "boom".into(),
                })
            } else {
                Ok(())
            }
        }
    }

    impl Backend for FakeBackend {
        async fn fetch_tasks(&self) -> Result<Vec<Task>, ApiError> {
            self.record("GET todos".into());
            self.check(self.fail_reads.get(), "GET")?;
            Ok(self.tasks.borrow().clone())
        }

        async fn create_task(&self, task: &NewTask) -> Result<(), ApiError> {
            self.record(format!("POST todos {}", task.title));
            self.check(self.fail_writes.get(), "POST")?;
            let id = self.id();
            self.tasks.borrow_mut().push(Task {
                priority: task.priority,
                due_date: task.due_date,
                remind_at: task.remind_at,
                repeat: task.repeat,
                tags: task.tags.clone(),
                project_id: task.project_id,
                description: task.description.clone(),
                ..test_support::task(id, &task.title)
            });
            Ok(())
        }

        async fn update_task(&self, id: i64, update: &TaskUpdate) -> Result<(), ApiError> {
            self.record(format!("PUT todos/{}", id));
            self.record_body(update);
            self.check(self.fail_writes.get(), "PUT")?;
            if let Some(task) = self.tasks.borrow_mut().iter_mut().find(|t| t.id == id) {
                if let Some(completed) = update.completed {
                    task.completed = completed;
                }
                // Details are only read when a title is sent, and then every
                // missing one is reset.
                if let Some(title) = &update.title {
                    task.title = title.clone();
                    task.description = update.description.clone().unwrap_or_default();
                    task.priority = update.priority.unwrap_or_default();
                    task.due_date = update.due_date.flatten();
                    task.remind_at = update.remind_at.flatten();
                    task.repeat = update.repeat.unwrap_or_default();
                    task.tags = update.tags.clone().unwrap_or_default();
                    task.project_id = update.project_id.flatten();
                }
            }
            Ok(())
        }

        async fn delete_task(&self, id: i64) -> Result<(), ApiError> {
            self.record(format!("DELETE todos/{}", id));
            self.check(self.fail_writes.get(), "DELETE")?;
            self.tasks.borrow_mut().retain(|t| t.id != id);
            Ok(())
        }

        async fn create_subtask(&self, task_id: i64, subtask: &NewSubtask) -> Result<(), ApiError> {
            self.record(format!("POST todos/{}/subtasks", task_id));
            self.check(self.fail_writes.get(), "POST")?;
            let id = self.id();
            if let Some(task) = self.tasks.borrow_mut().iter_mut().find(|t| t.id == task_id) {
                task.subtasks.push(Subtask {
                    id,
                    todo_id: task_id,
                    title: subtask.title.clone(),
                    completed: false,
                    created_at: test_support::at("2024-01-01T00:00:00Z"),
                });
            }
            Ok(())
        }

        async fn update_subtask(&self, id: i64, update: &SubtaskUpdate) -> Result<(), ApiError> {
            self.record(format!("PUT subtasks/{}", id));
            self.record_body(update);
            self.check(self.fail_writes.get(), "PUT")?;
            for task in self.tasks.borrow_mut().iter_mut() {
                for subtask in task.subtasks.iter_mut().filter(|s| s.id == id) {
                    subtask.title = update.title.clone();
                    subtask.completed = update.completed;
                }
            }
            Ok(())
        }

        async fn delete_subtask(&self, id: i64) -> Result<(), ApiError> {
            self.record(format!("DELETE subtasks/{}", id));
            self.check(self.fail_writes.get(), "DELETE")?;
            for task in self.tasks.borrow_mut().iter_mut() {
                task.subtasks.retain(|s| s.id != id);
            }
            Ok(())
        }

        async fn fetch_projects(&self) -> Result<Vec<Project>, ApiError> {
            self.record("GET projects".into());
            self.check(self.fail_reads.get(), "GET")?;
            Ok(self.projects.borrow().clone())
        }

        async fn create_project(&self, project: &NewProject) -> Result<(), ApiError> {
            self.record(format!("POST projects {}", project.name));
            self.check(self.fail_writes.get(), "POST")?;
            let id = self.id();
            self.projects.borrow_mut().push(Project {
                id,
                name: project.name.clone(),
                description: project.description.clone(),
                color: project.color.clone(),
                created_at: None,
            });
            Ok(())
        }

        async fn update_project(&self, id: i64, update: &ProjectUpdate) -> Result<(), ApiError> {
            self.record(format!("PUT projects/{}", id));
            self.record_body(update);
            self.check(self.fail_writes.get(), "PUT")?;
            if let Some(project) = self.projects.borrow_mut().iter_mut().find(|p| p.id == id) {
                project.name = update.name.clone();
                project.description = update.description.clone();
                project.color = update.color.clone();
            }
            Ok(())
        }

        async fn delete_project(&self, id: i64) -> Result<(), ApiError> {
            self.record(format!("DELETE projects/{}", id));
            self.check(self.fail_writes.get(), "DELETE")?;
            self.projects.borrow_mut().retain(|p| p.id != id);
            for task in self.tasks.borrow_mut().iter_mut() {
                if task.project_id == Some(id) {
                    task.project_id = None;
                }
            }
            Ok(())
        }
    }
}
