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
use crate::prelude::*;
use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Router};

pub fn router(state: ApplicationState) -> Router {
    Router::new()
        .route("/admin/users/", get(list_users))
        .route_layer(require_session!(state, Permission::Staff))
        .with_state(state)
}

async fn list_users(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
) -> Result<Json<Vec<Profile>>> {
    Scope::staff(&account)?;
    let accounts = Account::list(state.connection()).await?;

    Ok(Json(accounts.iter().map(Profile::from).collect()))
}
