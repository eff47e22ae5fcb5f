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

use crate::prelude::*;
use axum::Router;

pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod extractor;
pub mod project;
pub mod task;

/// Assembles the routers of all resources. Every route carries its full path.
pub fn router(state: ApplicationState) -> Router {
    Router::new()
        .merge(auth::router(state.clone()))
        .merge(project::router(state.clone()))
        .merge(task::router(state.clone()))
        .merge(dashboard::router(state.clone()))
        .merge(admin::router(state))
}
