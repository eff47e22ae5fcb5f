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

use crate::auth::token::Token;
use crate::database::definitions::account::Account;
use crate::prelude::*;
use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

/// Guards the routes it is layered on with the given [Permission].
///
/// ```ignore
/// Router::new()
///     .route("/projects/", get(list_projects))
///     .route_layer(require_session!(state, Permission::Authenticated))
/// ```
#[macro_export]
macro_rules! require_session {
    ($state:expr, $permission:expr) => {
        axum::middleware::from_fn_with_state(
            ($state.clone(), $permission),
            $crate::auth::middleware::require_session,
        )
    };
}

/// Reads the token key from `Authorization: Token <key>` or `Authorization: Bearer <key>`.
fn token_key(headers: &HeaderMap) -> Result<&str> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApplicationError::Unauthorized)?;

    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(key), None)
            if scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer") =>
        {
            Ok(key)
        }
        (Some(scheme), _, _)
            if scheme.eq_ignore_ascii_case("token") || scheme.eq_ignore_ascii_case("bearer") =>
        {
            Err(ApplicationError::InvalidToken)
        }
        _ => Err(ApplicationError::Unauthorized),
    }
}

async fn authenticate(
    state: &ApplicationState,
    permission: &Permission,
    headers: &HeaderMap,
) -> Result<Account> {
    let account = Token::validate(token_key(headers)?, state.connection()).await?;
    account.has_permission(permission)?;

    Ok(account)
}

pub async fn require_session(
    State((state, permission)): State<(ApplicationState, Permission)>,
    mut request: Request,
    next: Next,
) -> Response {
    let result = authenticate(&state, &permission, request.headers()).await;
    match result {
        Ok(account) => {
            request.extensions_mut().insert(account);
            next.run(request).await
        }
        Err(error) => permission.reject(error).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_token_key() {
        assert_eq!("abc", token_key(&headers("Token abc")).unwrap());
        assert_eq!("abc", token_key(&headers("Bearer abc")).unwrap());
        assert!(matches!(
            token_key(&HeaderMap::new()),
            Err(ApplicationError::Unauthorized)
        ));
        assert!(matches!(
            token_key(&headers("Basic abc")),
            Err(ApplicationError::Unauthorized)
        ));
        assert!(matches!(
            token_key(&headers("Token")),
            Err(ApplicationError::InvalidToken)
        ));
        assert!(matches!(
            token_key(&headers("Token a b")),
            Err(ApplicationError::InvalidToken)
        ));
    }
}
