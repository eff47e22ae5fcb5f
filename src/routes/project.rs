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
use crate::database::definitions::project::{Project, ProjectFilter, ProjectRequest};
use crate::prelude::*;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Router};

pub fn router(state: ApplicationState) -> Router {
    Router::new()
        .route("/projects/", get(list_projects).post(create_project))
        .route(
            "/projects/{id}/",
            get(get_project)
                .put(update_project)
                .patch(patch_project)
                .delete(delete_project),
        )
        .route_layer(require_session!(state, Permission::Authenticated))
        .with_state(state)
}

pub(crate) async fn list(
    state: &ApplicationState,
    scope: Scope,
    filter: ProjectFilter,
) -> Result<Json<Vec<Project>>> {
    Ok(Json(filter.list(state.connection(), scope).await?))
}

pub(crate) async fn create(
    state: &ApplicationState,
    scope: Scope,
    data: ProjectRequest,
) -> Result<(StatusCode, Json<Project>)> {
    let project = data
        .to_writer(state.connection(), scope, None, false)
        .await?
        .await?;
    info!("Created project {}", project.id());

    Ok((StatusCode::CREATED, Json(project)))
}

pub(crate) async fn retrieve(state: &ApplicationState, scope: Scope, id: i64) -> Result<Json<Project>> {
    Ok(Json(Project::get(state.connection(), scope, id).await?))
}

pub(crate) async fn update(
    state: &ApplicationState,
    scope: Scope,
    id: i64,
    data: ProjectRequest,
    partial: bool,
) -> Result<Json<Project>> {
    let project = Project::get(state.connection(), scope, id).await?;
    let project = data
        .to_writer(state.connection(), scope, Some(&project), partial)
        .await?
        .await?;

    Ok(Json(project))
}

pub(crate) async fn destroy(state: &ApplicationState, scope: Scope, id: i64) -> Result<StatusCode> {
    let project = Project::get(state.connection(), scope, id).await?;
    project.delete(state.connection()).await?;
    info!("Deleted project {}", project.id());

    Ok(StatusCode::NO_CONTENT)
}

async fn list_projects(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
) -> Result<Json<Vec<Project>>> {
    list(&state, Scope::owned_by(&account), ProjectFilter::default()).await
}

async fn create_project(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Json(data): Json<ProjectRequest>,
) -> Result<(StatusCode, Json<Project>)> {
    create(&state, Scope::owned_by(&account), data).await
}

async fn get_project(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Path(id): Path<i64>,
) -> Result<Json<Project>> {
    retrieve(&state, Scope::owned_by(&account), id).await
}

async fn update_project(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Path(id): Path<i64>,
    Json(data): Json<ProjectRequest>,
) -> Result<Json<Project>> {
    update(&state, Scope::owned_by(&account), id, data, false).await
}

async fn patch_project(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Path(id): Path<i64>,
    Json(data): Json<ProjectRequest>,
) -> Result<Json<Project>> {
    update(&state, Scope::owned_by(&account), id, data, true).await
}

async fn delete_project(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    destroy(&state, Scope::owned_by(&account), id).await
}
