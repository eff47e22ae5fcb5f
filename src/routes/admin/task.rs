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
use crate::database::definitions::task::{Task, TaskRequest};
use crate::prelude::*;
use crate::routes::task::{create, list, retrieve, update, TaskQuery};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Router};

pub fn router(state: ApplicationState) -> Router {
    Router::new()
        .route("/admin/tasks/", get(list_tasks).post(create_task))
        .route(
            "/admin/tasks/{id}/",
            get(get_task)
                .put(update_task)
                .patch(patch_task)
                .delete(delete_task),
        )
        .route_layer(require_session!(state, Permission::Staff))
        .with_state(state)
}

async fn list_tasks(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Query(query): Query<TaskQuery>,
) -> Result<Json<Vec<Task>>> {
    // priority is not among the filters of the admin listing
    let filter = query.to_filter()?.set_priority(None).to_owned();
    list(&state, Scope::staff(&account)?, filter).await
}

async fn create_task(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Json(data): Json<TaskRequest>,
) -> Result<(StatusCode, Json<Task>)> {
    create(&state, Scope::staff(&account)?, data).await
}

async fn get_task(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Path(id): Path<i64>,
) -> Result<Json<Task>> {
    retrieve(&state, Scope::staff(&account)?, id).await
}

async fn update_task(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Path(id): Path<i64>,
    Json(data): Json<TaskRequest>,
) -> Result<Json<Task>> {
    update(&state, Scope::staff(&account)?, id, data, false).await
}

async fn patch_task(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Path(id): Path<i64>,
    Json(data): Json<TaskRequest>,
) -> Result<Json<Task>> {
    update(&state, Scope::staff(&account)?, id, data, true).await
}

async fn delete_task(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let task = Task::get(state.connection(), Scope::staff(&account)?, id).await?;
    task.delete(state.connection()).await?;
    info!("Deleted task {}", task.id());

    Ok(StatusCode::NO_CONTENT)
}
