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
use crate::database::definitions::statistics::TaskStatistics;
use crate::prelude::*;
use crate::validation::id_filter;
use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Router};

pub fn router(state: ApplicationState) -> Router {
    Router::new()
        .route("/dashboard/stats/", get(statistics))
        .route_layer(require_session!(state, Permission::Authenticated))
        .with_state(state)
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct StatisticsQuery {
    project: Option<String>,
}

/// Task counts of the caller, optionally limited to one project.
async fn statistics(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
    Query(query): Query<StatisticsQuery>,
) -> Result<Json<TaskStatistics>> {
    let project = id_filter("project", query.project.as_deref())?;
    let statistics =
        TaskStatistics::collect(state.connection(), Scope::owned_by(&account), project).await?;

    Ok(Json(statistics))
}
