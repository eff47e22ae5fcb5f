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

use crate::auth::token::{IssueToken, RevokeToken, Token};
use crate::database::definitions::account::{Account, WriteAccount};
use crate::database::definitions::project::WriteProject;
use crate::prelude::*;
use crate::validation::{EmailAddress, FieldErrors, Password, PersonName, Username};
use argon2::{Argon2, PasswordHash, PasswordVerifier};
use async_trait::async_trait;

pub mod authz;
pub mod middleware;
pub mod token;

pub const EMAIL_TAKEN: &str = "A user with this email already exists.";
pub const USERNAME_TAKEN: &str = "A user with this username already exists.";

const PERSONAL_PROJECT: &str = "Personal";
const PERSONAL_DESCRIPTION: &str = "Personal tasks";
const PERSONAL_COLOR: &str = "blue";

#[async_trait]
pub trait Authenticate {
    fn login(&self, password: &str) -> Result<()>;
    async fn logout(&self, connection: &DatabaseConnection) -> Result<()>;
    async fn start_session(&self, connection: &DatabaseConnection) -> Result<Token>;
}

#[async_trait]
impl Authenticate for Account {
    #[instrument(skip_all)]
    fn login(&self, password: &str) -> Result<()> {
        let hash =
            PasswordHash::new(self.password()).map_err(|_| ApplicationError::InvalidCredentials)?;
        Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .map_err(|_| ApplicationError::InvalidCredentials)?;

        // disabled accounts are indistinguishable from wrong credentials
        if !*self.is_active() {
            return Err(ApplicationError::InvalidCredentials);
        }

        Ok(())
    }

    async fn logout(&self, connection: &DatabaseConnection) -> Result<()> {
        RevokeToken::new(*self.id(), connection).await
    }

    async fn start_session(&self, connection: &DatabaseConnection) -> Result<Token> {
        IssueToken::new(*self.id(), connection).await
    }
}

/// Looks up the account behind an email and password pair.
#[instrument(skip(connection, password))]
pub async fn authenticate(
    connection: &DatabaseConnection,
    email: &str,
    password: &str,
) -> Result<Account> {
    let account = Account::from_email(connection, email)
        .await?
        .ok_or(ApplicationError::InvalidCredentials)?;
    account.login(password)?;

    Ok(account)
}

/// A validated registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub username: Username,
    pub email: EmailAddress,
    pub password: Password,
    pub first_name: PersonName,
    pub last_name: PersonName,
}

/// Reports a violated unique index of the account table as a field error.
fn registration_conflict(error: ApplicationError) -> ApplicationError {
    if let ApplicationError::DatabaseError(sqlx::Error::Database(database)) = &error {
        if database.is_unique_violation() {
            return if database.message().contains("account.email") {
                FieldErrors::single("email", EMAIL_TAKEN).into()
            } else {
                FieldErrors::single("username", USERNAME_TAKEN).into()
            };
        }
    }

    error
}

/// Creates the account, its token and its personal project in one transaction.
#[instrument(skip_all, fields(username = registration.username.as_str()))]
pub async fn register(
    connection: &DatabaseConnection,
    registration: Registration,
) -> Result<(Account, Token)> {
    let mut transaction = connection.begin().await?;

    let account = WriteAccount::from(connection)
        .set_username(Some(registration.username.as_str()))
        .set_email(Some(registration.email.as_str()))
        .set_password(Some(registration.password.as_str()))
        .set_first_name(Some(registration.first_name.as_ref()))
        .set_last_name(Some(registration.last_name.as_ref()))
        .to_owned()
        .write(&mut transaction)
        .await
        .map_err(registration_conflict)?;

    let token = IssueToken::new(*account.id(), connection)
        .write(&mut transaction)
        .await?;

    WriteProject::from(connection)
        .set_name(Some(PERSONAL_PROJECT.to_owned()))
        .set_description(Some(Some(PERSONAL_DESCRIPTION.to_owned())))
        .set_color(Some(PERSONAL_COLOR.to_owned()))
        .set_owner(Some(*account.id()))
        .to_owned()
        .write(&mut transaction)
        .await?;

    transaction.commit().await?;
    info!("Registered account {}", account.id());

    Ok((account, token))
}

/// Ensures the configured administrator exists. An existing account is left untouched.
#[instrument(skip(connection, password))]
pub async fn bootstrap_admin(
    connection: &DatabaseConnection,
    username: &str,
    email: &str,
    password: &str,
) -> Result<()> {
    if Account::email_taken(connection, email).await? {
        info!("Administrator {} already exists", email);
        return Ok(());
    }

    WriteAccount::from(connection)
        .set_username(Some(username))
        .set_email(Some(email))
        .set_password(Some(password))
        .set_is_staff(true)
        .set_is_superuser(true)
        .to_owned()
        .await?;
    info!("Created administrator {}", email);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::definitions::project::{Project, ProjectFilter};
    use crate::database::definitions::task::WriteTask;
    use axum::BoxError;
    use chrono::NaiveDate;

    fn registration(username: &str, email: &str) -> Registration {
        Registration {
            username: Username::parse(username).unwrap(),
            email: EmailAddress::parse(email).unwrap(),
            password: Password::parse("password").unwrap(),
            first_name: PersonName::parse("Jane").unwrap(),
            last_name: PersonName::parse("Doe").unwrap(),
        }
    }

    #[tokio::test]
    async fn test_register() -> std::result::Result<(), BoxError> {
        let connection = crate::database::connect("sqlite::memory:", 1).await?.connection;

        let (account, token) =
            register(&connection, registration("jane", "jane@example.com")).await?;
        assert_eq!(account.id(), token.user_id());
        assert_eq!("Jane Doe", account.display_name());

        let projects: Vec<Project> = ProjectFilter::default()
            .list(&connection, Scope::owned_by(&account))
            .await?;
        assert_eq!(1, projects.len());
        assert_eq!("Personal", projects[0].name());
        assert_eq!(Some("Personal tasks".to_owned()), *projects[0].description());
        assert_eq!("blue", projects[0].color());

        // the storage constraints are reported per field and roll back everything
        for (username, email, field) in [
            ("other", "jane@example.com", "email"),
            ("jane", "other@example.com", "username"),
        ] {
            match register(&connection, registration(username, email)).await {
                Err(ApplicationError::Validation(errors)) => assert!(errors.get(field).is_some()),
                other => panic!("unexpected result {other:?}"),
            }
        }
        assert_eq!(1, ProjectFilter::default().list(&connection, Scope::Unrestricted).await?.len());

        Ok(())
    }

    #[tokio::test]
    async fn test_authenticate() -> std::result::Result<(), BoxError> {
        let connection = crate::database::connect("sqlite::memory:", 1).await?.connection;
        let (account, token) =
            register(&connection, registration("jane", "jane@example.com")).await?;

        assert_eq!(
            account,
            authenticate(&connection, "jane@example.com", "password").await?
        );
        for (email, password) in [
            ("jane@example.com", "wrong"),
            ("nobody@example.com", "password"),
        ] {
            assert!(matches!(
                authenticate(&connection, email, password).await,
                Err(ApplicationError::InvalidCredentials)
            ));
        }

        // logging in again reuses the token
        assert_eq!(token, account.start_session(&connection).await?);
        account.logout(&connection).await?;
        assert_ne!(token, account.start_session(&connection).await?);

        sqlx::query("UPDATE account SET is_active = FALSE")
            .execute(&connection)
            .await?;
        assert!(matches!(
            authenticate(&connection, "jane@example.com", "password").await,
            Err(ApplicationError::InvalidCredentials)
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_deleted_account_takes_its_records() -> std::result::Result<(), BoxError> {
        let connection = crate::database::connect("sqlite::memory:", 1).await?.connection;
        let (jane, _) = register(&connection, registration("jane", "jane@example.com")).await?;
        let (john, _) = register(&connection, registration("john", "john@example.com")).await?;

        let personal = ProjectFilter::default()
            .list(&connection, Scope::owned_by(&jane))
            .await?;
        WriteTask::from(&connection)
            .set_title(Some("Report".to_owned()))
            .set_due_date(Some(NaiveDate::from_ymd_opt(2099, 1, 1).unwrap()))
            .set_project(Some(*personal[0].id()))
            .set_owner(Some(*jane.id()))
            .to_owned()
            .await?;

        sqlx::query("DELETE FROM account WHERE id = ?")
            .bind(jane.id())
            .execute(&connection)
            .await?;

        for (table, remaining) in [("project", 1), ("task", 0), ("token", 1)] {
            let (count,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
                .fetch_one(&connection)
                .await?;
            assert_eq!(remaining, count, "{table}");
        }
        // only john's records are left
        let projects = ProjectFilter::default()
            .list(&connection, Scope::Unrestricted)
            .await?;
        assert_eq!(john.id(), projects[0].user());

        Ok(())
    }

    #[tokio::test]
    async fn test_bootstrap_admin() -> std::result::Result<(), BoxError> {
        let connection = crate::database::connect("sqlite::memory:", 1).await?.connection;

        bootstrap_admin(&connection, "admin", "root@example.com", "secret1").await?;
        bootstrap_admin(&connection, "admin", "root@example.com", "changed").await?;

        let admin = authenticate(&connection, "root@example.com", "secret1").await?;
        assert!(*admin.is_staff());
        assert!(*admin.is_superuser());
        assert_eq!(1, Account::list(&connection).await?.len());

        Ok(())
    }
}
