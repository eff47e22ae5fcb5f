/*
 *     Copyright (C) 2023  Fritz Ochsmann
 *
 *     This program is free software: you can redistribute it and/or modify
 *     it under the terms of the GNU Affero General Public License as published
 *     by the Free Software Foundation, either version 3 of the License, or
 *     (at your option) any later version.
 *
 *     This program is distributed in the hope that it will be useful,
 *     but WITHOUT ANY WARRANTY; without even the implied warranty of
 *     MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *     GNU Affero General Public License for more details.
 *
 *     You should have received a copy of the GNU Affero General Public License
 *     along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use crate::database::definitions::account::Account;
use crate::database::definitions::task::state::{TaskPriority, TaskStatus};
use crate::database::definitions::task::{Task, TaskFilter, TaskRequest};
use crate::prelude::*;
use crate::validation::{choice_filter, id_filter};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Router};

/// Task routes of regular users. Tasks can not be deleted here.
pub fn router(state: ApplicationState) -> Router {
    Router::new()
        .route("/tasks/", get(list_tasks).post(create_task))
        .route(
            "/tasks/{id}/",
            get(get_task).put(update_task).patch(patch_task),
        )
        .route_layer(require_session!(state, Permission::Authenticated))
        .with_state(state)
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TaskQuery {
    user: Option<String>,
    project: Option<String>,
    status: Option<String>,
    priority: Option<String>,
    search: Option<String>,
}

impl TaskQuery {
    pub fn to_filter(&self) -> Result<TaskFilter> {
        Ok(TaskFilter::default()
            .set_user(id_filter("user", self.user.as_deref())?)
            .set_project(id_filter("project", self.project.as_deref())?)
            .set_status(choice_filter::<TaskStatus>("status", self.status.as_deref())?)
            .set_priority(choice_filter::<TaskPriority>(
                "priority",
                self.priority.as_deref(),
            )?)
            .set_search(self.search.clone())
            .to_owned())
    }
}

pub(crate) async fn list(
    state: &ApplicationState,
    scope: Scope,
    filter: TaskFilter,
) -> Result<Json<Vec<Task>>> {
    Ok(Json(filter.list(state.connection(), scope).await?))
}

pub(crate) async fn create(
    state: &ApplicationState,
    scope: Scope,
    data: TaskRequest,
) -> Result<(StatusCode, Json<Task>)> {
    let task = data
        .to_writer(state.connection(), scope, None, false)
        .await?
        .await?;
    info!("Created task {}", task.id());

    Ok((StatusCode::CREATED, Json(task)))
}

pub(crate) async fn retrieve(state: &ApplicationState, scope: Scope, id: i64) -> Result<Json<Task>> {
    Ok(Json(Task::get(state.connection(), scope, id).await?))
}

pub(crate) async fn update(
    state: &ApplicationState,
    scope: Scope,
    id: i64,
    data: TaskRequest,
    partial: bool,
) -> Result<Json<Task>> {
    let task = Task::get(state.connection(), scope, id).await?;
    let task = data
        .to_writer(state.connection(), scope, Some(&task), partial)
        .await?
        .await?;

    Ok(Json(task))
}

async fn list_tasks(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Query(query): Query<TaskQuery>,
) -> Result<Json<Vec<Task>>> {
    // the user filter has no meaning inside the own scope
    let filter = query.to_filter()?.set_user(None).to_owned();
    list(&state, Scope::owned_by(&account), filter).await
}

async fn create_task(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Json(data): Json<TaskRequest>,
) -> Result<(StatusCode, Json<Task>)> {
    create(&state, Scope::owned_by(&account), data).await
}

async fn get_task(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Path(id): Path<i64>,
) -> Result<Json<Task>> {
    retrieve(&state, Scope::owned_by(&account), id).await
}

async fn update_task(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Path(id): Path<i64>,
    Json(data): Json<TaskRequest>,
) -> Result<Json<Task>> {
    update(&state, Scope::owned_by(&account), id, data, false).await
}

async fn patch_task(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Path(id): Path<i64>,
    Json(data): Json<TaskRequest>,
) -> Result<Json<Task>> {
    update(&state, Scope::owned_by(&account), id, data, true).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::definitions::project::Project;
    use crate::database::definitions::task::FOREIGN_PROJECT;
    use crate::tests::prelude::*;
    use crate::validation::FieldErrors;
    use axum::BoxError;
    use chrono::{Days, Utc};
    use serde_json::Value;

    async fn personal_project(suite: &TestSuite, user: &TestUser) -> Project {
        suite
            .server()
            .get("/projects/")
            .authorization(user.header())
            .await
            .json::<Vec<Project>>()
            .remove(0)
    }

    async fn create(suite: &TestSuite, user: &TestUser, data: Value) -> Task {
        suite
            .server()
            .post("/tasks/")
            .authorization(user.header())
            .json(&data)
            .await
            .json::<Task>()
    }

    #[tokio::test]
    async fn test_create() -> std::result::Result<(), BoxError> {
        let suite = TestSuite::init().await?;
        let jane = suite.register("jane@example.com").await?;
        let john = suite.register("john@example.com").await?;
        let project = personal_project(&suite, &jane).await;
        let foreign = personal_project(&suite, &john).await;

        let response = suite
            .server()
            .post("/tasks/")
            .authorization(jane.header())
            .json(&json!({
                "title": "Write report",
                "due_date": "2099-01-01",
                "project": project.id(),
                "user": john.profile.id,
            }))
            .await;
        assert_eq!(StatusCode::CREATED, response.status_code());
        let task = response.json::<Task>();
        assert_eq!(jane.profile.id, *task.user());
        assert_eq!("Personal", task.project_name());
        assert_eq!(TaskPriority::Medium, *task.priority());
        assert_eq!(TaskStatus::Todo, *task.status());
        assert!(!task.is_overdue());

        // foreign and unknown projects are rejected alike
        for project in [json!(foreign.id()), json!(9999)] {
            let response = suite
                .server()
                .post("/tasks/")
                .authorization(jane.header())
                .json(&json!({ "title": "Sneaky", "due_date": "2099-01-01", "project": project }))
                .await;
            assert_eq!(StatusCode::BAD_REQUEST, response.status_code());
            assert_eq!(
                Some(&vec![FOREIGN_PROJECT.to_owned()]),
                response.json::<FieldErrors>().get("project")
            );
        }

        let response = suite
            .server()
            .post("/tasks/")
            .authorization(jane.header())
            .json(&json!({
                "title": "",
                "due_date": "01.01.2099",
                "priority": "urgent",
                "project": project.id(),
            }))
            .await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status_code());
        let errors = response.json::<FieldErrors>();
        for field in ["title", "due_date", "priority"] {
            assert!(errors.get(field).is_some(), "missing error for {field}");
        }

        // a value of the wrong type is blamed on its field
        let response = suite
            .server()
            .post("/tasks/")
            .authorization(jane.header())
            .json(&json!({ "title": 5, "due_date": "2099-01-01", "project": project.id() }))
            .await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status_code());
        let errors = response.json::<FieldErrors>();
        assert!(errors.get("title").is_some());
        assert!(errors.get("due_date").is_none());

        Ok(())
    }

    #[tokio::test]
    async fn test_list_filters() -> std::result::Result<(), BoxError> {
        let suite = TestSuite::init().await?;
        let jane = suite.register("jane@example.com").await?;
        let john = suite.register("john@example.com").await?;
        let project = personal_project(&suite, &jane).await;
        let foreign = personal_project(&suite, &john).await;

        let yesterday = Utc::now()
            .date_naive()
            .checked_sub_days(Days::new(1))
            .unwrap()
            .to_string();
        let late = create(
            &suite,
            &jane,
            json!({ "title": "Late", "due_date": yesterday, "priority": "low", "project": project.id() }),
        )
        .await;
        let urgent = create(
            &suite,
            &jane,
            json!({
                "title": "Urgent 100%",
                "description": "Call the bank",
                "due_date": "2099-01-01",
                "priority": "high",
                "status": "in-progress",
                "project": project.id(),
            }),
        )
        .await;
        let done = create(
            &suite,
            &jane,
            json!({ "title": "Done", "due_date": yesterday, "status": "completed", "project": project.id() }),
        )
        .await;
        create(
            &suite,
            &john,
            json!({ "title": "Foreign bank", "due_date": "2099-01-01", "project": foreign.id() }),
        )
        .await;

        let list = |query: &'static [(&'static str, &'static str)]| {
            let mut request = suite.server().get("/tasks/").authorization(jane.header());
            for (key, value) in query {
                request = request.add_query_param(key, value);
            }
            request
        };

        let tasks = list(&[]).await.json::<Vec<Task>>();
        let ids: Vec<i64> = tasks.iter().map(|task| *task.id()).collect();
        assert_eq!(vec![*done.id(), *late.id(), *urgent.id()], ids);
        assert!(tasks[1].is_overdue());
        assert!(!tasks[0].is_overdue());

        let tasks = list(&[("search", "BANK")]).await.json::<Vec<Task>>();
        assert_eq!(1, tasks.len());
        assert_eq!(urgent.id(), tasks[0].id());

        // wildcards match literally
        let tasks = list(&[("search", "%")]).await.json::<Vec<Task>>();
        assert_eq!(1, tasks.len());

        let tasks = list(&[("status", "completed")]).await.json::<Vec<Task>>();
        assert_eq!(1, tasks.len());
        let tasks = list(&[("priority", "high"), ("project", "all")])
            .await
            .json::<Vec<Task>>();
        assert_eq!(1, tasks.len());

        // another owner's project or user never widens the scope
        let foreign_project = foreign.id().to_string();
        let mut request = suite.server().get("/tasks/").authorization(jane.header());
        request = request.add_query_param("project", &foreign_project);
        assert!(request.await.json::<Vec<Task>>().is_empty());
        let foreign_user = john.profile.id.to_string();
        let tasks = suite
            .server()
            .get("/tasks/")
            .authorization(jane.header())
            .add_query_param("user", &foreign_user)
            .await
            .json::<Vec<Task>>();
        assert_eq!(3, tasks.len());
        assert!(tasks.iter().all(|task| *task.user() == jane.profile.id));

        let response = list(&[("status", "doing")]).await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status_code());
        let response = list(&[("project", "abc")]).await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status_code());

        Ok(())
    }

    #[tokio::test]
    async fn test_search_folds_unicode_case() -> std::result::Result<(), BoxError> {
        let suite = TestSuite::init().await?;
        let jane = suite.register("jane@example.com").await?;
        let project = personal_project(&suite, &jane).await;
        let task = create(
            &suite,
            &jane,
            json!({ "title": "Über École", "due_date": "2099-01-01", "project": project.id() }),
        )
        .await;
        create(
            &suite,
            &jane,
            json!({ "title": "Groceries", "due_date": "2099-01-01", "project": project.id() }),
        )
        .await;

        for search in ["Über", "École", "über", "Über École", "ÉCOLE"] {
            let tasks = suite
                .server()
                .get("/tasks/")
                .authorization(jane.header())
                .add_query_param("search", search)
                .await
                .json::<Vec<Task>>();
            assert_eq!(1, tasks.len(), "{search}");
            assert_eq!(task.id(), tasks[0].id());
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_update() -> std::result::Result<(), BoxError> {
        let suite = TestSuite::init().await?;
        let jane = suite.register("jane@example.com").await?;
        let john = suite.register("john@example.com").await?;
        let project = personal_project(&suite, &jane).await;
        let task = create(
            &suite,
            &jane,
            json!({ "title": "Draft", "due_date": "2099-01-01", "project": project.id() }),
        )
        .await;
        let path = format!("/tasks/{}/", task.id());

        let response = suite
            .server()
            .patch(&path)
            .authorization(jane.header())
            .json(&json!({ "status": "completed" }))
            .await;
        assert_eq!(StatusCode::OK, response.status_code());
        let patched = response.json::<Task>();
        assert_eq!(TaskStatus::Completed, *patched.status());
        assert_eq!("Draft", patched.title());

        let response = suite
            .server()
            .put(&path)
            .authorization(jane.header())
            .json(&json!({ "title": "Final" }))
            .await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status_code());
        let errors = response.json::<FieldErrors>();
        assert!(errors.get("due_date").is_some());
        assert!(errors.get("project").is_some());

        let response = suite
            .server()
            .put(&path)
            .authorization(jane.header())
            .json(&json!({ "title": "Final", "due_date": "2099-02-01", "project": project.id() }))
            .await;
        assert_eq!(StatusCode::OK, response.status_code());
        assert_eq!("Final", response.json::<Task>().title());

        let response = suite
            .server()
            .get(&path)
            .authorization(john.header())
            .await;
        assert_eq!(StatusCode::NOT_FOUND, response.status_code());

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_not_allowed() -> std::result::Result<(), BoxError> {
        let suite = TestSuite::init().await?;
        let jane = suite.register("jane@example.com").await?;
        let project = personal_project(&suite, &jane).await;
        let task = create(
            &suite,
            &jane,
            json!({ "title": "Keep", "due_date": "2099-01-01", "project": project.id() }),
        )
        .await;
        let path = format!("/tasks/{}/", task.id());

        let response = suite
            .server()
            .delete(&path)
            .authorization(jane.header())
            .await;
        assert_eq!(StatusCode::METHOD_NOT_ALLOWED, response.status_code());

        let response = suite
            .server()
            .get(&path)
            .authorization(jane.header())
            .await;
        assert_eq!(StatusCode::OK, response.status_code());

        Ok(())
    }
}
