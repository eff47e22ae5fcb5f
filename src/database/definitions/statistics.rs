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

use crate::database::definitions::account::{Account, Profile};
use crate::database::definitions::project::Project;
use crate::database::definitions::task::{today, Task};
use crate::prelude::*;
use sqlx::{QueryBuilder, Sqlite};

/// Number of records listed in each of the recent activity sections.
pub const RECENT_LIMIT: i64 = 5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TaskStatistics {
    pub total_tasks: i64,
    pub todo_tasks: i64,
    pub in_progress_tasks: i64,
    pub completed_tasks: i64,
    pub overdue_tasks: i64,
}

impl TaskStatistics {
    /// Counts the tasks in the scope, optionally limited to one project.
    pub async fn collect(
        connection: &DatabaseConnection,
        scope: Scope,
        project: Option<i64>,
    ) -> Result<Self> {
        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT COUNT(*) AS total_tasks,
                COALESCE(SUM(task.status = 'todo'), 0) AS todo_tasks,
                COALESCE(SUM(task.status = 'in-progress'), 0) AS in_progress_tasks,
                COALESCE(SUM(task.status = 'completed'), 0) AS completed_tasks,
                COALESCE(SUM(task.status IN ('todo', 'in-progress') AND task.due_date < ",
        );
        query
            .push_bind(today())
            .push("), 0) AS overdue_tasks FROM task WHERE 1 = 1");
        scope.restrict(&mut query, "task.user_id");
        if let Some(project) = project {
            query.push(" AND task.project_id = ").push_bind(project);
        }

        Ok(sql_span!(
            query.build_query_as::<TaskStatistics>().fetch_one(connection),
            "task statistics"
        )
        .await?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminStatistics {
    pub total_users: i64,
    pub total_projects: i64,
    #[serde(flatten)]
    pub tasks: TaskStatistics,
    pub recent_users: Vec<Profile>,
    pub recent_projects: Vec<Project>,
    pub recent_tasks: Vec<Task>,
}

impl AdminStatistics {
    #[instrument(skip_all)]
    pub async fn collect(connection: &DatabaseConnection) -> Result<Self> {
        let (total_users, total_projects): (i64, i64) = sql_span!(
            sqlx::query_as(
                "SELECT (SELECT COUNT(*) FROM account WHERE NOT is_staff),
                    (SELECT COUNT(*) FROM project)",
            )
            .fetch_one(connection),
            "record counts"
        )
        .await?;

        Ok(Self {
            total_users,
            total_projects,
            tasks: TaskStatistics::collect(connection, Scope::Unrestricted, None).await?,
            recent_users: Account::recent(connection, RECENT_LIMIT)
                .await?
                .iter()
                .map(Profile::from)
                .collect(),
            recent_projects: Project::recent(connection, RECENT_LIMIT).await?,
            recent_tasks: Task::recent(connection, RECENT_LIMIT).await?,
        })
    }
}
