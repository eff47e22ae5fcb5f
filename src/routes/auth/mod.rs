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

use crate::auth::{Authenticate, Registration, EMAIL_TAKEN, USERNAME_TAKEN};
use crate::database::definitions::account::{Account, Profile};
use crate::prelude::*;
use crate::validation::{
    EmailAddress, FieldErrors, Password, PersonName, Username, BLANK, NON_FIELD_ERRORS,
};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Router};
use serde_json::Value;

pub const PASSWORD_MISMATCH: &str = "Passwords don't match";

pub fn router(state: ApplicationState) -> Router {
    Router::new()
        .route("/auth/logout/", post(logout))
        .route("/auth/user/", get(current_user))
        .route_layer(require_session!(state, Permission::Authenticated))
        .route("/auth/register/", post(register))
        .route("/auth/login/", post(login))
        .with_state(state)
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct RegisterRequest {
    username: Option<String>,
    email: Option<String>,
    password: Option<String>,
    password_confirm: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
}

impl RegisterRequest {
    async fn validate(self, connection: &DatabaseConnection) -> Result<Registration> {
        let mut errors = FieldErrors::new();

        let email = errors.require("email", self.email.as_deref().map(EmailAddress::parse));

        // the email doubles as username when none is given
        let username = match self.username.as_deref().map(str::trim) {
            Some(username) if !username.is_empty() => {
                errors.check("username", Username::parse(username))
            }
            _ => email
                .as_ref()
                .and_then(|email| errors.check("username", Username::parse(email.as_str()))),
        };

        if let Some(email) = email.as_ref() {
            if Account::email_taken(connection, email.as_str()).await? {
                errors.add("email", EMAIL_TAKEN);
            }
        }
        if let Some(username) = username.as_ref() {
            if Account::username_taken(connection, username.as_str()).await? {
                errors.add("username", USERNAME_TAKEN);
            }
        }

        let password = errors.require("password", self.password.as_deref().map(Password::parse));
        let confirmation = errors.require(
            "password_confirm",
            self.password_confirm.as_deref().map(|value| {
                if value.is_empty() {
                    Err(BLANK.to_owned())
                } else {
                    Ok(value)
                }
            }),
        );
        let first_name =
            errors.require("first_name", self.first_name.as_deref().map(PersonName::parse));
        let last_name = errors.require("last_name", self.last_name.as_deref().map(PersonName::parse));

        // the confirmation is only compared once every field is valid
        if errors.is_empty() {
            if let (Some(password), Some(confirmation)) = (password.as_ref(), confirmation) {
                if password.as_str() != confirmation {
                    errors.add(NON_FIELD_ERRORS, PASSWORD_MISMATCH);
                }
            }
        }

        match (username, email, password, first_name, last_name) {
            (Some(username), Some(email), Some(password), Some(first_name), Some(last_name))
                if errors.is_empty() =>
            {
                Ok(Registration {
                    username,
                    email,
                    password,
                    first_name,
                    last_name,
                })
            }
            _ => Err(errors.into()),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

/// The answer to a successful registration or login.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SessionResponse {
    pub user: Profile,
    pub token: String,
    pub message: String,
}

fn present(value: &str) -> std::result::Result<&str, String> {
    if value.trim().is_empty() {
        Err(BLANK.to_owned())
    } else {
        Ok(value)
    }
}

async fn register(
    State(state): State<ApplicationState>,
    Json(data): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<SessionResponse>)> {
    let registration = data.validate(state.connection()).await?;
    let (account, token) = crate::auth::register(state.connection(), registration).await?;

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            user: account.profile(),
            token: token.key().clone(),
            message: "User registered successfully".to_owned(),
        }),
    ))
}

async fn login(
    State(state): State<ApplicationState>,
    Json(data): Json<LoginRequest>,
) -> Result<Json<SessionResponse>> {
    let mut errors = FieldErrors::new();
    let email = errors.require("email", data.email.as_deref().map(present));
    let password = errors.require("password", data.password.as_deref().map(present));
    errors.finish()?;

    let (Some(email), Some(password)) = (email, password) else {
        return Err(ApplicationError::InvalidCredentials);
    };

    let account = crate::auth::authenticate(state.connection(), email.trim(), password).await?;
    let token = account.start_session(state.connection()).await?;
    info!("Account {} logged in", account.id());

    Ok(Json(SessionResponse {
        user: account.profile(),
        token: token.key().clone(),
        message: "Login successful".to_owned(),
    }))
}

async fn logout(
    Extension(account): Extension<Account>,
    State(state): State<ApplicationState>,
) -> Result<Json<Value>> {
    account.logout(state.connection()).await.map_err(|error| {
        error!("Failed to revoke the token of {}: {}", account.id(), error);
        ApplicationError::BadRequest("Error logging out".to_owned())
    })?;

    Ok(Json(json!({ "message": "Successfully logged out" })))
}

async fn current_user(Extension(account): Extension<Account>) -> Json<Profile> {
    Json(account.profile())
}
