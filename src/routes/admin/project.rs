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
use crate::routes::project::{create, destroy, list, retrieve, update};
use crate::validation::id_filter;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Extension, Router};

pub fn router(state: ApplicationState) -> Router {
    Router::new()
        .route("/admin/projects/", get(list_projects).post(create_project))
        .route(
            "/admin/projects/{id}/",
            get(get_project)
                .put(update_project)
                .patch(patch_project)
                .delete(delete_project),
        )
        .route_layer(require_session!(state, Permission::Staff))
        .with_state(state)
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ProjectQuery {
    user: Option<String>,
}

async fn list_projects(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Query(query): Query<ProjectQuery>,
) -> Result<Json<Vec<Project>>> {
    let filter = ProjectFilter::default()
        .set_user(id_filter("user", query.user.as_deref())?)
        .to_owned();
    list(&state, Scope::staff(&account)?, filter).await
}

async fn create_project(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Json(data): Json<ProjectRequest>,
) -> Result<(StatusCode, Json<Project>)> {
    create(&state, Scope::staff(&account)?, data).await
}

async fn get_project(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Path(id): Path<i64>,
) -> Result<Json<Project>> {
    retrieve(&state, Scope::staff(&account)?, id).await
}

async fn update_project(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Path(id): Path<i64>,
    Json(data): Json<ProjectRequest>,
) -> Result<Json<Project>> {
    update(&state, Scope::staff(&account)?, id, data, false).await
}

async fn patch_project(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Path(id): Path<i64>,
    Json(data): Json<ProjectRequest>,
) -> Result<Json<Project>> {
    update(&state, Scope::staff(&account)?, id, data, true).await
}

async fn delete_project(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    destroy(&state, Scope::staff(&account)?, id).await
}

#[cfg(test)]
mod tests {
    use crate::database::definitions::project::{Project, DUPLICATE_NAME};
    use crate::tests::prelude::*;
    use crate::validation::{does_not_exist, FieldErrors, REQUIRED};
    use axum::http::StatusCode;
    use axum::BoxError;

    #[tokio::test]
    async fn test_list() -> Result<(), BoxError> {
        let suite = TestSuite::init().await?;
        let jane = suite.register("jane@example.com").await?;
        suite.register("john@example.com").await?;
        let root = suite.register_staff("root@example.com").await?;

        let projects = suite
            .server()
            .get("/admin/projects/")
            .authorization(root.header())
            .await
            .json::<Vec<Project>>();
        assert_eq!(3, projects.len());

        let user = jane.profile.id.to_string();
        let projects = suite
            .server()
            .get("/admin/projects/")
            .authorization(root.header())
            .add_query_param("user", &user)
            .await
            .json::<Vec<Project>>();
        assert_eq!(1, projects.len());
        assert_eq!("jane", projects[0].user_name());

        let response = suite
            .server()
            .get("/admin/projects/")
            .authorization(root.header())
            .add_query_param("user", "jane")
            .await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status_code());

        Ok(())
    }

    #[tokio::test]
    async fn test_create_and_move() -> Result<(), BoxError> {
        let suite = TestSuite::init().await?;
        let jane = suite.register("jane@example.com").await?;
        let john = suite.register("john@example.com").await?;
        let root = suite.register_staff("root@example.com").await?;

        let response = suite
            .server()
            .post("/admin/projects/")
            .authorization(root.header())
            .json(&json!({ "name": "Audit" }))
            .await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status_code());
        assert_eq!(
            Some(&vec![REQUIRED.to_owned()]),
            response.json::<FieldErrors>().get("user")
        );

        let response = suite
            .server()
            .post("/admin/projects/")
            .authorization(root.header())
            .json(&json!({ "name": "Audit", "user": 9999 }))
            .await;
        assert_eq!(
            Some(&vec![does_not_exist(9999)]),
            response.json::<FieldErrors>().get("user")
        );

        let response = suite
            .server()
            .post("/admin/projects/")
            .authorization(root.header())
            .json(&json!({ "name": "Audit", "user": jane.profile.id }))
            .await;
        assert_eq!(StatusCode::CREATED, response.status_code());
        let project = response.json::<Project>();
        assert_eq!(jane.profile.id, *project.user());

        let response = suite
            .server()
            .post("/admin/projects/")
            .authorization(root.header())
            .json(&json!({ "name": "Audit", "user": jane.profile.id }))
            .await;
        assert_eq!(
            Some(&vec![DUPLICATE_NAME.to_owned()]),
            response.json::<FieldErrors>().get("name")
        );

        // moving the project re-checks the name against the new owner
        let path = format!("/admin/projects/{}/", project.id());
        let response = suite
            .server()
            .patch(&path)
            .authorization(root.header())
            .json(&json!({ "user": john.profile.id }))
            .await;
        assert_eq!(StatusCode::OK, response.status_code());
        assert_eq!("john", response.json::<Project>().user_name());

        let response = suite
            .server()
            .patch(&path)
            .authorization(root.header())
            .json(&json!({ "name": "Personal" }))
            .await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status_code());

        let response = suite.server().delete(&path).authorization(root.header()).await;
        assert_eq!(StatusCode::NO_CONTENT, response.status_code());
        let response = suite.server().get(&path).authorization(root.header()).await;
        assert_eq!(StatusCode::NOT_FOUND, response.status_code());

        Ok(())
    }
}
