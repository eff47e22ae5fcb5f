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
use crate::prelude::*;
use crate::validation::{self, does_not_exist, primary_key, Color, FieldErrors, ProjectName};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqliteExecutor};
use std::future::{Future, IntoFuture};
use std::pin::Pin;

pub const DUPLICATE_NAME: &str = "You already have a project with this name.";

const SELECT_PROJECT: &str = "SELECT project.id, project.name, project.description, project.color,
        project.user_id AS user, account.username AS user_name,
        (SELECT COUNT(*) FROM task WHERE task.project_id = project.id) AS task_count,
        project.created_at, project.updated_at
    FROM project JOIN account ON account.id = project.user_id
    WHERE 1 = 1";

#[derive(Clone, Debug, PartialEq, Getters, Serialize, Deserialize, sqlx::FromRow)]
#[get = "pub"]
pub struct Project {
    id: i64,
    name: String,
    description: Option<String>,
    color: String,
    user: i64,
    user_name: String,
    task_count: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Project {
    pub async fn find<'e, E>(executor: E, scope: Scope, id: i64) -> Result<Option<Self>>
    where
        E: SqliteExecutor<'e>,
    {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_PROJECT);
        query.push(" AND project.id = ").push_bind(id);
        scope.restrict(&mut query, "project.user_id");

        Ok(sql_span!(
            query.build_query_as::<Project>().fetch_optional(executor),
            "find project"
        )
        .await?)
    }

    /// Like [Project::find] but reports records outside the scope as missing.
    pub async fn get(connection: &DatabaseConnection, scope: Scope, id: i64) -> Result<Self> {
        Self::find(connection, scope, id)
            .await?
            .ok_or(ApplicationError::NotFound)
    }

    /// The newest projects of all owners.
    pub async fn recent(connection: &DatabaseConnection, limit: i64) -> Result<Vec<Self>> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_PROJECT);
        query
            .push(" ORDER BY project.created_at DESC, project.id DESC LIMIT ")
            .push_bind(limit);

        Ok(sql_span!(
            query.build_query_as::<Project>().fetch_all(connection),
            "recent projects"
        )
        .await?)
    }

    /// Whether the owner already has another project with exactly this name.
    pub async fn name_taken(
        connection: &DatabaseConnection,
        owner: i64,
        name: &str,
        exclude: Option<i64>,
    ) -> Result<bool> {
        Ok(sql_span!(
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM project WHERE user_id = ? AND name = ? AND id IS NOT ?)",
            )
            .bind(owner)
            .bind(name)
            .bind(exclude)
            .fetch_one(connection)
        )
        .await?)
    }

    /// Deletes the project together with its tasks.
    #[instrument(skip(connection))]
    pub async fn delete(&self, connection: &DatabaseConnection) -> Result<()> {
        sql_span!(
            sqlx::query("DELETE FROM project WHERE id = ?")
                .bind(self.id)
                .execute(connection),
            "delete project"
        )
        .await?;

        Ok(())
    }
}

#[derive(Debug, Clone, Default, Getters, Setters)]
#[get = "pub"]
#[set = "pub"]
pub struct ProjectFilter {
    user: Option<i64>,
}

impl ProjectFilter {
    pub async fn list(&self, connection: &DatabaseConnection, scope: Scope) -> Result<Vec<Project>> {
        let mut query = QueryBuilder::<Sqlite>::new(SELECT_PROJECT);
        scope.restrict(&mut query, "project.user_id");
        if let Some(user) = self.user {
            query.push(" AND project.user_id = ").push_bind(user);
        }
        query.push(" ORDER BY project.name, project.id");

        Ok(sql_span!(
            query.build_query_as::<Project>().fetch_all(connection),
            "list projects"
        )
        .await?)
    }
}

/// The payload of project writes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectRequest {
    name: Option<String>,
    #[serde(default, deserialize_with = "validation::double_option")]
    description: Option<Option<String>>,
    color: Option<String>,
    user: Option<Value>,
}

impl ProjectRequest {
    /// Validates the payload against the scope of the caller.
    ///
    /// Outside of an unrestricted scope the owner is always the caller and a given `user` is
    /// ignored. `partial` relaxes the required fields for PATCH requests.
    #[instrument(skip(self, connection))]
    pub async fn to_writer<'a>(
        self,
        connection: &'a DatabaseConnection,
        scope: Scope,
        target: Option<&'a Project>,
        partial: bool,
    ) -> Result<WriteProject<'a>> {
        let mut errors = FieldErrors::new();

        let name = errors.field(
            "name",
            self.name.as_deref().map(ProjectName::parse),
            !partial,
        );
        let color = errors.field("color", self.color.as_deref().map(Color::parse), false);

        let owner = match scope {
            Scope::Owned(id) => Some(id),
            Scope::Unrestricted => {
                match errors.field("user", self.user.as_ref().map(primary_key), !partial) {
                    Some(id) => {
                        if Account::from_id(connection, id).await?.is_some() {
                            Some(id)
                        } else {
                            errors.add("user", does_not_exist(id));
                            None
                        }
                    }
                    None => None,
                }
            }
        };

        // the uniqueness of the name is checked against the resulting record
        let effective_owner = owner.or(target.map(|project| project.user));
        let effective_name = name
            .as_ref()
            .map(ProjectName::as_ref)
            .or(target.map(|project| project.name.as_str()));
        if let (Some(owner), Some(name)) = (effective_owner, effective_name) {
            if Project::name_taken(connection, owner, name, target.map(|project| project.id))
                .await?
            {
                errors.add("name", DUPLICATE_NAME);
            }
        }

        errors.finish()?;

        Ok(WriteProject {
            name: name.map(String::from),
            description: self.description.map(validation::description),
            color: color.map(String::from),
            owner,
            connection,
            target,
        })
    }
}

#[derive(Clone, Getters, Setters)]
#[get = "pub"]
pub struct WriteProject<'a> {
    #[set = "pub"]
    name: Option<String>,
    #[set = "pub"]
    description: Option<Option<String>>,
    #[set = "pub"]
    color: Option<String>,
    #[set = "pub"]
    owner: Option<i64>,
    connection: &'a DatabaseConnection,
    #[set = "pub"]
    target: Option<&'a Project>,
}

impl<'a> From<&'a DatabaseConnection> for WriteProject<'a> {
    fn from(connection: &'a DatabaseConnection) -> Self {
        Self {
            name: None,
            description: None,
            color: None,
            owner: None,
            connection,
            target: None,
        }
    }
}

/// Reports a violated `(name, owner)` constraint like the failed pre-check.
fn name_conflict(error: sqlx::Error) -> ApplicationError {
    let error = ApplicationError::from(error);
    if error.is_unique_violation() {
        FieldErrors::single("name", DUPLICATE_NAME).into()
    } else {
        error
    }
}

impl<'a> WriteProject<'a> {
    #[instrument(skip_all)]
    pub(crate) async fn write(self, connection: &mut SqliteConnection) -> Result<Project> {
        let now = Utc::now();

        let id = if let Some(target) = self.target {
            let mut query = QueryBuilder::<Sqlite>::new("UPDATE project SET updated_at = ");
            query.push_bind(now);
            if let Some(name) = self.name {
                query.push(", name = ").push_bind(name);
            }
            if let Some(description) = self.description {
                query.push(", description = ").push_bind(description);
            }
            if let Some(color) = self.color {
                query.push(", color = ").push_bind(color);
            }
            if let Some(owner) = self.owner {
                query.push(", user_id = ").push_bind(owner);
            }
            query.push(" WHERE id = ").push_bind(target.id);

            sql_span!(query.build().execute(&mut *connection), "update project")
                .await
                .map_err(name_conflict)?;
            target.id
        } else {
            let (Some(name), Some(owner)) = (self.name, self.owner) else {
                error!("Tried to create a project without name or owner");
                return Err(ApplicationError::InternalServerError);
            };

            sql_span!(
                sqlx::query(
                    "INSERT INTO project (name, description, color, user_id, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?)",
                )
                .bind(name)
                .bind(self.description.flatten())
                .bind(self.color.unwrap_or_else(|| Color::default().into()))
                .bind(owner)
                .bind(now)
                .bind(now)
                .execute(&mut *connection),
                "create project"
            )
            .await
            .map_err(name_conflict)?
            .last_insert_rowid()
        };

        Project::find(&mut *connection, Scope::Unrestricted, id)
            .await?
            .ok_or(ApplicationError::InternalServerError)
    }
}

impl<'a> IntoFuture for WriteProject<'a> {
    type Output = Result<Project>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let mut transaction = self.connection.begin().await?;
            let project = self.write(&mut transaction).await?;
            transaction.commit().await?;

            Ok(project)
        })
    }
}
