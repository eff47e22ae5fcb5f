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

use crate::validation::FieldErrors;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

pub const PERMISSION_DENIED: &str = "You do not have permission to perform this action.";

#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Authentication credentials were not provided.")]
    Unauthorized,
    #[error("Invalid token.")]
    InvalidToken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("Not found.")]
    NotFound,
    #[error("Invalid input: {0:?}")]
    Validation(FieldErrors),
    #[error(transparent)]
    DatabaseError(#[from] sqlx::Error),
    #[error(transparent)]
    PasswordHashError(#[from] argon2::password_hash::Error),
    #[error("Internal error occurred")]
    InternalServerError,
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

impl ApplicationError {
    /// Whether the error stems from a missing or unusable credential.
    pub fn is_authentication(&self) -> bool {
        matches!(
            self,
            ApplicationError::Unauthorized
                | ApplicationError::InvalidToken
                | ApplicationError::InvalidCredentials
        )
    }

    /// Whether the error is a storage constraint violation on a unique index.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            ApplicationError::DatabaseError(sqlx::Error::Database(error)) => {
                error.is_unique_violation()
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ApplicationError>;

macro_rules! log_test_error {
    ($error:expr) => {
        #[cfg(test)]
        {
            println!("Err: {:?}", $error.to_string());
        }
    };
}

impl IntoResponse for ApplicationError {
    fn into_response(self) -> Response {
        match self {
            ApplicationError::Unauthorized
            | ApplicationError::InvalidToken
            | ApplicationError::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": self.to_string() })),
            ),
            ApplicationError::BadRequest(error) => {
                log_test_error!(error);
                (StatusCode::BAD_REQUEST, Json(json!({ "error": error })))
            }
            ApplicationError::Forbidden(error) => {
                log_test_error!(error);
                (StatusCode::FORBIDDEN, Json(json!({ "error": error })))
            }
            ApplicationError::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": self.to_string() })),
            ),
            ApplicationError::Validation(errors) => {
                log_test_error!(format!("{:?}", errors));
                (StatusCode::BAD_REQUEST, Json(json!(errors)))
            }
            _ => {
                error!("Err: {}", self.to_string());

                #[cfg(test)]
                {
                    println!("Err: {:?}", self.to_string());
                }

                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "Error occurred while processing the request"})),
                )
            }
        }
        .into_response()
    }
}
