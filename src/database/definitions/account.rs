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
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHasher};
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqliteExecutor};
use std::future::{Future, IntoFuture};
use std::pin::Pin;

#[derive(Clone, Debug, PartialEq, Getters, sqlx::FromRow)]
#[get = "pub"]
pub struct Account {
    id: i64,
    username: String,
    email: String,
    password: String,
    first_name: String,
    last_name: String,
    is_staff: bool,
    is_superuser: bool,
    is_active: bool,
    date_joined: DateTime<Utc>,
}

/// The public representation of an account.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub name: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl From<&Account> for Profile {
    fn from(account: &Account) -> Self {
        Self {
            id: account.id,
            email: account.email.clone(),
            username: account.username.clone(),
            name: account.display_name(),
            is_staff: account.is_staff,
            is_superuser: account.is_superuser,
        }
    }
}

impl Account {
    /// "first last", falling back to the username when both are empty.
    pub fn display_name(&self) -> String {
        let name = format!("{} {}", self.first_name, self.last_name);
        let name = name.trim();

        if name.is_empty() {
            self.username.clone()
        } else {
            name.to_owned()
        }
    }

    pub fn profile(&self) -> Profile {
        Profile::from(self)
    }

    pub async fn from_id<'e, E>(executor: E, id: i64) -> Result<Option<Self>>
    where
        E: SqliteExecutor<'e>,
    {
        Ok(sql_span!(
            sqlx::query_as::<_, Account>("SELECT * FROM account WHERE id = ?")
                .bind(id)
                .fetch_optional(executor),
            "account by id"
        )
        .await?)
    }

    pub async fn from_email<'e, E>(executor: E, email: &str) -> Result<Option<Self>>
    where
        E: SqliteExecutor<'e>,
    {
        Ok(sql_span!(
            sqlx::query_as::<_, Account>("SELECT * FROM account WHERE email = ?")
                .bind(email)
                .fetch_optional(executor),
            "account by email"
        )
        .await?)
    }

    pub async fn email_taken(connection: &DatabaseConnection, email: &str) -> Result<bool> {
        Ok(sql_span!(
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM account WHERE email = ?)")
                .bind(email)
                .fetch_one(connection)
        )
        .await?)
    }

    pub async fn username_taken(connection: &DatabaseConnection, username: &str) -> Result<bool> {
        Ok(sql_span!(
            sqlx::query_scalar::<_, bool>(
                "SELECT EXISTS(SELECT 1 FROM account WHERE username = ?)"
            )
            .bind(username)
            .fetch_one(connection)
        )
        .await?)
    }

    pub async fn list(connection: &DatabaseConnection) -> Result<Vec<Self>> {
        Ok(sql_span!(
            sqlx::query_as::<_, Account>("SELECT * FROM account ORDER BY id").fetch_all(connection),
            "list accounts"
        )
        .await?)
    }

    /// The newest regular (non staff) accounts.
    pub async fn recent(connection: &DatabaseConnection, limit: i64) -> Result<Vec<Self>> {
        Ok(sql_span!(
            sqlx::query_as::<_, Account>(
                "SELECT * FROM account WHERE NOT is_staff ORDER BY date_joined DESC, id DESC LIMIT ?",
            )
            .bind(limit)
            .fetch_all(connection),
            "recent accounts"
        )
        .await?)
    }
}

#[derive(Clone, Getters, Setters)]
#[get = "pub"]
pub struct WriteAccount<'a> {
    #[set = "pub"]
    username: Option<&'a str>,
    #[set = "pub"]
    email: Option<&'a str>,
    #[set = "pub"]
    password: Option<&'a str>,
    #[set = "pub"]
    first_name: Option<&'a str>,
    #[set = "pub"]
    last_name: Option<&'a str>,
    #[set = "pub"]
    is_staff: bool,
    #[set = "pub"]
    is_superuser: bool,
    connection: &'a DatabaseConnection,
}

impl<'a> From<&'a DatabaseConnection> for WriteAccount<'a> {
    fn from(connection: &'a DatabaseConnection) -> Self {
        Self {
            username: None,
            email: None,
            password: None,
            first_name: None,
            last_name: None,
            is_staff: false,
            is_superuser: false,
            connection,
        }
    }
}

impl<'a> WriteAccount<'a> {
    /// Creates the account on the given connection, which may be part of a larger transaction.
    #[instrument(skip_all)]
    pub(crate) async fn write(self, connection: &mut SqliteConnection) -> Result<Account> {
        let (Some(username), Some(email), Some(password)) =
            (self.username, self.email, self.password)
        else {
            error!("Tried to create an account without credentials");
            return Err(ApplicationError::InternalServerError);
        };

        // the salt is part of the resulting PHC string
        let password = Argon2::default()
            .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))?
            .to_string();

        let id = sql_span!(
            sqlx::query(
                "INSERT INTO account (username, email, password, first_name, last_name, is_staff, is_superuser, is_active, date_joined)
                 VALUES (?, ?, ?, ?, ?, ?, ?, TRUE, ?)",
            )
            .bind(username)
            .bind(email)
            .bind(password)
            .bind(self.first_name.unwrap_or_default())
            .bind(self.last_name.unwrap_or_default())
            .bind(self.is_staff)
            .bind(self.is_superuser)
            .bind(Utc::now())
            .execute(&mut *connection),
            "create account"
        )
        .await?
        .last_insert_rowid();

        Account::from_id(&mut *connection, id)
            .await?
            .ok_or(ApplicationError::InternalServerError)
    }
}

impl<'a> IntoFuture for WriteAccount<'a> {
    type Output = Result<Account>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send + 'a>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(async move {
            let mut transaction = self.connection.begin().await?;
            let account = self.write(&mut transaction).await?;
            transaction.commit().await?;

            Ok(account)
        })
    }
}
