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
use crate::prelude::*;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqliteExecutor};
use std::future::{Future, IntoFuture};
use std::pin::Pin;

const ALPHABET: [char; 62] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i',
    'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B',
    'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U',
    'V', 'W', 'X', 'Y', 'Z',
];

const KEY_LENGTH: usize = 40;

#[derive(Clone, Debug, PartialEq, Getters, sqlx::FromRow)]
#[get = "pub"]
pub struct Token {
    key: String,
    user_id: i64,
    created_at: DateTime<Utc>,
}

impl Token {
    /// Resolves the owner of a token. Unknown keys and disabled owners are rejected.
    #[instrument(skip_all)]
    pub async fn validate(key: &str, connection: &DatabaseConnection) -> Result<Account> {
        let account: Option<Account> = sql_span!(
            sqlx::query_as(
                "SELECT account.* FROM token JOIN account ON account.id = token.user_id WHERE token.key = ?",
            )
            .bind(key)
            .fetch_optional(connection),
            "validate token"
        )
        .await?;

        match account {
            Some(account) if *account.is_active() => Ok(account),
            Some(_) => {
                warn!("Rejected the token of a disabled account");
                Err(ApplicationError::InvalidToken)
            }
            None => Err(ApplicationError::InvalidToken),
        }
    }

    pub async fn of<'e, E>(executor: E, user_id: i64) -> Result<Option<Token>>
    where
        E: SqliteExecutor<'e>,
    {
        Ok(sql_span!(
            sqlx::query_as::<_, Token>("SELECT * FROM token WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(executor),
            "token of account"
        )
        .await?)
    }
}

/// Returns the token of the target, creating one if it has none yet.
#[derive(Clone, Debug)]
pub struct IssueToken<'a> {
    target: i64,
    connection: &'a DatabaseConnection,
}

impl<'a> IssueToken<'a> {
    pub fn new(target: i64, connection: &'a DatabaseConnection) -> Self {
        Self { target, connection }
    }

    #[instrument(skip_all)]
    pub(crate) async fn write(self, connection: &mut SqliteConnection) -> Result<Token> {
        let key = nanoid::nanoid!(KEY_LENGTH, &ALPHABET);

        // a concurrent login may have created the token in the meantime
        sql_span!(
            sqlx::query(
                "INSERT INTO token (key, user_id, created_at) VALUES (?, ?, ?) ON CONFLICT (user_id) DO NOTHING",
            )
            .bind(key)
            .bind(self.target)
            .bind(Utc::now())
            .execute(&mut *connection),
            "issue token"
        )
        .await?;

        Token::of(&mut *connection, self.target)
            .await?
            .ok_or(ApplicationError::InternalServerError)
    }
}

impl<'a> IntoFuture for IssueToken<'a> {
    type Output = Result<Token>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let mut transaction = self.connection.begin().await?;
            let token = self.write(&mut transaction).await?;
            transaction.commit().await?;

            Ok(token)
        })
    }
}

/// Deletes the token of the target, if there is one.
#[derive(Clone, Debug)]
pub struct RevokeToken<'a> {
    target: i64,
    connection: &'a DatabaseConnection,
}

impl<'a> RevokeToken<'a> {
    pub fn new(target: i64, connection: &'a DatabaseConnection) -> Self {
        Self { target, connection }
    }
}

impl<'a> IntoFuture for RevokeToken<'a> {
    type Output = Result<()>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            sql_span!(
                sqlx::query("DELETE FROM token WHERE user_id = ?")
                    .bind(self.target)
                    .execute(self.connection),
                "revoke token"
            )
            .await?;

            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::definitions::account::WriteAccount;
    use axum::BoxError;

    #[tokio::test]
    async fn test_issue_and_revoke() -> std::result::Result<(), BoxError> {
        let connection = crate::database::connect("sqlite::memory:", 1).await?.connection;
        let account = WriteAccount::from(&connection)
            .set_username(Some("jane"))
            .set_email(Some("jane@example.com"))
            .set_password(Some("password"))
            .to_owned()
            .await?;

        let token = IssueToken::new(*account.id(), &connection).await?;
        assert_eq!(KEY_LENGTH, token.key().len());
        assert!(token.key().chars().all(|c| c.is_ascii_alphanumeric()));

        // issuing again hands out the same token
        assert_eq!(token, IssueToken::new(*account.id(), &connection).await?);
        assert_eq!(
            account,
            Token::validate(token.key(), &connection).await?
        );

        RevokeToken::new(*account.id(), &connection).await?;
        assert!(matches!(
            Token::validate(token.key(), &connection).await,
            Err(ApplicationError::InvalidToken)
        ));
        // revoking twice is fine
        RevokeToken::new(*account.id(), &connection).await?;

        let token = IssueToken::new(*account.id(), &connection).await?;
        sqlx::query("UPDATE account SET is_active = FALSE")
            .execute(&connection)
            .await?;
        assert!(matches!(
            Token::validate(token.key(), &connection).await,
            Err(ApplicationError::InvalidToken)
        ));

        Ok(())
    }
}
