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
use crate::database::definitions::project::Project;
use crate::database::definitions::task::state::{TaskPriority, TaskStatus};
use crate::prelude::*;
use crate::validation::{self, choice, date, does_not_exist, primary_key, FieldErrors, TaskTitle};
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqliteExecutor};
use std::future::{Future, IntoFuture};
use std::pin::Pin;

pub mod state;

pub const FOREIGN_PROJECT: &str = "You can only assign tasks to your own projects";

const SELECT_TASK: &str = "SELECT task.id, task.title, task.description, task.due_date,
        task.priority, task.status, task.project_id AS project, project.name AS project_name,
        task.user_id AS user, account.username AS user_name, task.created_at, task.updated_at
    FROM task
        JOIN project ON project.id = task.project_id
        JOIN account ON account.id = task.user_id
    WHERE 1 = 1";

const ORDER_TASKS: &str = " ORDER BY task.due_date,
    CASE task.priority WHEN 'high' THEN 3 WHEN 'medium' THEN 2 ELSE 1 END DESC, task.id";

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Getters, sqlx::FromRow)]
#[get = "pub"]
pub struct Task {
    id: i64,
    title: String,
    description: Option<String>,
    due_date: NaiveDate,
    priority: TaskPriority,
    status: TaskStatus,
    project: i64,
    project_name: String,
    user: i64,
    user_name: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    #[serde(default)]
    is_overdue: bool,
}

/// The current date in UTC, which decides whether a task is overdue.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

impl Task {
    pub fn is_overdue_on(&self, today: NaiveDate) -> bool {
        self.status.is_open() && self.due_date < today
    }

    /// Whether the title or description contains the already lowercased term.
    fn mentions(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self
                .description
                .as_deref()
                .is_some_and(|description| description.to_lowercase().contains(needle))
    }

    fn with_overdue(mut self, today: NaiveDate) -> Self {
        self.is_overdue = self.is_overdue_on(today);
        self
    }

    pub async fn find<'e, E>(executor: E, scope: Scope, id: i64) -> Result<Option<Self>>
    where
        E: SqliteExecutor<'e>,
    {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_TASK);
        query.push(" AND task.id = ").push_bind(id);
        scope.restrict(&mut query, "task.user_id");

        let task = sql_span!(
            query.build_query_as::<Task>().fetch_optional(executor),
            "find task"
        )
        .await?;

        Ok(task.map(|task| task.with_overdue(today())))
    }

    /// Like [Task::find] but reports records outside the scope as missing.
    pub async fn get(connection: &DatabaseConnection, scope: Scope, id: i64) -> Result<Self> {
        Self::find(connection, scope, id)
            .await?
            .ok_or(ApplicationError::NotFound)
    }

    /// The newest tasks of all owners.
    pub async fn recent(connection: &DatabaseConnection, limit: i64) -> Result<Vec<Self>> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_TASK);
        query
            .push(" ORDER BY task.created_at DESC, task.id DESC LIMIT ")
            .push_bind(limit);

        let today = today();
        Ok(sql_span!(
            query.build_query_as::<Task>().fetch_all(connection),
            "recent tasks"
        )
        .await?
        .into_iter()
        .map(|task| task.with_overdue(today))
        .collect())
    }

    #[instrument(skip(connection))]
    pub async fn delete(&self, connection: &DatabaseConnection) -> Result<()> {
        sql_span!(
            sqlx::query("DELETE FROM task WHERE id = ?")
                .bind(self.id)
                .execute(connection),
            "delete task"
        )
        .await?;

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Getters, Setters)]
#[get = "pub"]
#[set = "pub"]
pub struct TaskFilter {
    user: Option<i64>,
    project: Option<i64>,
    status: Option<TaskStatus>,
    priority: Option<TaskPriority>,
    search: Option<String>,
}

impl TaskFilter {
    /// Appends the conditions of this filter to a query ending in a `WHERE` clause.
    fn apply(&self, query: &mut QueryBuilder<'_, Sqlite>, scope: Scope) {
        scope.restrict(query, "task.user_id");

        if let Some(user) = self.user {
            query.push(" AND task.user_id = ").push_bind(user);
        }
        if let Some(project) = self.project {
            query.push(" AND task.project_id = ").push_bind(project);
        }
        if let Some(status) = self.status {
            query.push(" AND task.status = ").push_bind(status);
        }
        if let Some(priority) = self.priority {
            query.push(" AND task.priority = ").push_bind(priority);
        }
    }

    pub async fn list(&self, connection: &DatabaseConnection, scope: Scope) -> Result<Vec<Task>> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_TASK);
        self.apply(&mut query, scope);
        query.push(ORDER_TASKS);

        // sqlite only folds ascii, so the search term is matched here
        let needle = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|search| !search.is_empty())
            .map(str::to_lowercase);

        let today = today();
        Ok(sql_span!(
            query.build_query_as::<Task>().fetch_all(connection),
            "list tasks"
        )
        .await?
        .into_iter()
        .filter(|task| needle.as_deref().map_or(true, |needle| task.mentions(needle)))
        .map(|task| task.with_overdue(today))
        .collect())
    }
}

/// The payload of task writes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskRequest {
    title: Option<String>,
    #[serde(default, deserialize_with = "validation::double_option")]
    description: Option<Option<String>>,
    due_date: Option<String>,
    priority: Option<String>,
    status: Option<String>,
    project: Option<Value>,
    user: Option<Value>,
}

impl TaskRequest {
    /// Validates the payload against the scope of the caller.
    ///
    /// In an owned scope the task always belongs to the caller and may only reference one of
    /// the caller's projects. An unrestricted scope accepts any project and any `user`, which
    /// defaults to the owner of the project on creation.
    #[instrument(skip(self, connection))]
    pub async fn to_writer<'a>(
        self,
        connection: &'a DatabaseConnection,
        scope: Scope,
        target: Option<&'a Task>,
        partial: bool,
    ) -> Result<WriteTask<'a>> {
        let mut errors = FieldErrors::new();

        let title = errors.field(
            "title",
            self.title.as_deref().map(TaskTitle::parse),
            !partial,
        );
        let due_date = errors.field("due_date", self.due_date.as_deref().map(date), !partial);
        let priority = errors.field(
            "priority",
            self.priority.as_deref().map(choice::<TaskPriority>),
            false,
        );
        let status = errors.field(
            "status",
            self.status.as_deref().map(choice::<TaskStatus>),
            false,
        );

        let project = match errors.field("project", self.project.as_ref().map(primary_key), !partial)
        {
            Some(id) => {
                let project = Project::find(connection, Scope::Unrestricted, id).await?;
                match (scope, project) {
                    (Scope::Unrestricted, Some(project)) => Some(project),
                    (Scope::Unrestricted, None) => {
                        errors.add("project", does_not_exist(id));
                        None
                    }
                    (Scope::Owned(_), Some(project)) if scope.permits(*project.user()) => {
                        Some(project)
                    }
                    // foreign and missing projects are indistinguishable for the caller
                    (Scope::Owned(_), _) => {
                        errors.add("project", FOREIGN_PROJECT);
                        None
                    }
                }
            }
            None => None,
        };

        let owner = match scope {
            Scope::Owned(id) => target.is_none().then_some(id),
            Scope::Unrestricted => match errors.field("user", self.user.as_ref().map(primary_key), false)
            {
                Some(id) => {
                    if Account::from_id(connection, id).await?.is_some() {
                        Some(id)
                    } else {
                        errors.add("user", does_not_exist(id));
                        None
                    }
                }
                None if target.is_none() => project.as_ref().map(|project| *project.user()),
                None => None,
            },
        };

        errors.finish()?;

        Ok(WriteTask {
            title: title.map(String::from),
            description: self.description.map(validation::description),
            due_date,
            priority,
            status,
            project: project.map(|project| *project.id()),
            owner,
            connection,
            target,
        })
    }
}

#[derive(Clone, Getters, Setters)]
#[get = "pub"]
pub struct WriteTask<'a> {
    #[set = "pub"]
    title: Option<String>,
    #[set = "pub"]
    description: Option<Option<String>>,
    #[set = "pub"]
    due_date: Option<NaiveDate>,
    #[set = "pub"]
    priority: Option<TaskPriority>,
    #[set = "pub"]
    status: Option<TaskStatus>,
    #[set = "pub"]
    project: Option<i64>,
    #[set = "pub"]
    owner: Option<i64>,
    connection: &'a DatabaseConnection,
    #[set = "pub"]
    target: Option<&'a Task>,
}

impl<'a> From<&'a DatabaseConnection> for WriteTask<'a> {
    fn from(connection: &'a DatabaseConnection) -> Self {
        Self {
            title: None,
            description: None,
            due_date: None,
            priority: None,
            status: None,
            project: None,
            owner: None,
            connection,
            target: None,
        }
    }
}

impl<'a> WriteTask<'a> {
    #[instrument(skip_all)]
    pub(crate) async fn write(self, connection: &mut SqliteConnection) -> Result<Task> {
        let now = Utc::now();

        let id = if let Some(target) = self.target {
            let mut query = QueryBuilder::<Sqlite>::new("UPDATE task SET updated_at = ");
            query.push_bind(now);
            if let Some(title) = self.title {
                query.push(", title = ").push_bind(title);
            }
            if let Some(description) = self.description {
                query.push(", description = ").push_bind(description);
            }
            if let Some(due_date) = self.due_date {
                query.push(", due_date = ").push_bind(due_date);
            }
            if let Some(priority) = self.priority {
                query.push(", priority = ").push_bind(priority);
            }
            if let Some(status) = self.status {
                query.push(", status = ").push_bind(status);
            }
            if let Some(project) = self.project {
                query.push(", project_id = ").push_bind(project);
            }
            if let Some(owner) = self.owner {
                query.push(", user_id = ").push_bind(owner);
            }
            query.push(" WHERE id = ").push_bind(target.id);

            sql_span!(query.build().execute(&mut *connection), "update task").await?;
            target.id
        } else {
            let (Some(title), Some(due_date), Some(project), Some(owner)) =
                (self.title, self.due_date, self.project, self.owner)
            else {
                error!("Tried to create a task without title, due date, project or owner");
                return Err(ApplicationError::InternalServerError);
            };

            sql_span!(
                sqlx::query(
                    "INSERT INTO task (title, description, due_date, priority, status, project_id, user_id, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(title)
                .bind(self.description.flatten())
                .bind(due_date)
                .bind(self.priority.unwrap_or_default())
                .bind(self.status.unwrap_or_default())
                .bind(project)
                .bind(owner)
                .bind(now)
                .bind(now)
                .execute(&mut *connection),
                "create task"
            )
            .await?
            .last_insert_rowid()
        };

        Task::find(&mut *connection, Scope::Unrestricted, id)
            .await?
            .ok_or(ApplicationError::InternalServerError)
    }
}

impl<'a> IntoFuture for WriteTask<'a> {
    type Output = Result<Task>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let mut transaction = self.connection.begin().await?;
            let task = self.write(&mut transaction).await?;
            transaction.commit().await?;

            Ok(task)
        })
    }
}
