use crate::models::{
    NewProject, NewSubtask, NewTask, Project, ProjectUpdate, SubtaskUpdate, Task, TaskUpdate,
};
use crate::store::Backend;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: &'static str,
        url: String,
        status: StatusCode,
        body: String,
    },
}

/// Thin client for the todo REST backend. Responses to mutating calls are
/// only checked for success; callers refetch the lists afterwards.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> ApiClient {
        ApiClient {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    async fn send(
        &self,
        method: &'static str,
        url: String,
        request: RequestBuilder,
    ) -> Result<Response, ApiError> {
        debug!(method, url = %url, "sending request");
        let res = request.send().await?;

        if res.status().is_success() {
            Ok(res)
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(ApiError::Status {
                method,
                url,
                status,
                body,
            })
        }
    }

    // Lists may come back as a JSON null when the table is empty.
    async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let url = self.url(path);
        let res = self.send("GET", url.clone(), self.client.get(&url)).await?;
        Ok(res.json::<Option<Vec<T>>>().await?.unwrap_or_default())
    }

    async fn post<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let url = self.url(path);
        self.send("POST", url.clone(), self.client.post(&url).json(body))
            .await?;
        Ok(())
    }

    async fn put<B: serde::Serialize>(&self, path: &str, body: &B) -> Result<(), ApiError> {
        let url = self.url(path);
        self.send("PUT", url.clone(), self.client.put(&url).json(body))
            .await?;
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), ApiError> {
        let url = self.url(path);
        self.send("DELETE", url.clone(), self.client.delete(&url))
            .await?;
        Ok(())
    }
}

impl Backend for ApiClient {
    async fn fetch_tasks(&self) -> Result<Vec<Task>, ApiError> {
        self.get_list("todos").await
    }

    async fn create_task(&self, task: &NewTask) -> Result<(), ApiError> {
        self.post("todos", task).await
    }

    async fn update_task(&self, id: i64, update: &TaskUpdate) -> Result<(), ApiError> {
        self.put(&format!("todos/{}", id), update).await
    }

    async fn delete_task(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("todos/{}", id)).await
    }

    async fn create_subtask(&self, task_id: i64, subtask: &NewSubtask) -> Result<(), ApiError> {
        self.post(&format!("todos/{}/subtasks", task_id), subtask)
            .await
    }

    async fn update_subtask(&self, id: i64, update: &SubtaskUpdate) -> Result<(), ApiError> {
        self.put(&format!("subtasks/{}", id), update).await
    }

    async fn delete_subtask(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("subtasks/{}", id)).await
    }

    async fn fetch_projects(&self) -> Result<Vec<Project>, ApiError> {
        self.get_list("projects").await
    }

    async fn create_project(&self, project: &NewProject) -> Result<(), ApiError> {
        self.post("projects", project).await
    }

    async fn update_project(&self, id: i64, update: &ProjectUpdate) -> Result<(), ApiError> {
        self.put(&format!("projects/{}", id), update).await
    }

    async fn delete_project(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("projects/{}", id)).await
    }
}
