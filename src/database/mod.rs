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

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use version_compare::{Cmp, Version};

pub mod definitions;

pub type DatabaseConnection = SqlitePool;

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub connection: DatabaseConnection,
    pub url: String,
}

/// Schema changes applied on top of `up.sql`, keyed by the crate version introducing them.
const MIGRATIONS: &[(&str, &str)] = &[];

pub async fn connect(url: &str, max_connections: u32) -> Result<ConnectionInfo> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);

    // every connection to an in-memory database opens a fresh one, so the pool must not grow
    let in_memory = url.contains(":memory:") || url.contains("mode=memory");
    let pool_options = if in_memory {
        SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        SqlitePoolOptions::new().max_connections(max_connections)
    };

    let connection = pool_options.connect_with(options).await?;
    info!("Established database connection");

    // execute the up queries
    sqlx::raw_sql(include_str!("./up.sql"))
        .execute(&connection)
        .await?;
    info!("Initiated tables");

    // perform the migrations
    migrate(&connection, env!("CARGO_PKG_VERSION"), MIGRATIONS).await?;

    Ok(ConnectionInfo {
        connection,
        url: url.to_owned(),
    })
}

pub async fn migrate(
    client: &DatabaseConnection,
    current_version: &str,
    migrations: &[(&str, &str)],
) -> Result<()> {
    // fetch the last migrated version
    let last: Option<String> = sql_span!(
        sqlx::query_scalar(
            "SELECT version FROM migration ORDER BY created_at DESC, id DESC LIMIT 1",
        )
        .fetch_optional(client),
        "last migration"
    )
    .await?;

    let current =
        Version::from(current_version).ok_or(ApplicationError::InternalServerError)?;

    if let Some(last) = last {
        // only proceed if the last version is older than the current version
        let previous = Version::from(last.as_str()).ok_or(ApplicationError::InternalServerError)?;
        if previous.compare_to(&current, Cmp::Ge) {
            return Ok(());
        }

        let mut transaction = client.begin().await?;
        for (version, migration) in migrations {
            let target = Version::from(version).ok_or(ApplicationError::InternalServerError)?;
            if target.compare_to(&previous, Cmp::Gt) && target.compare_to(&current, Cmp::Le) {
                info!("Executing migration to {version}");
                sqlx::raw_sql(migration).execute(&mut *transaction).await?;
            }
        }

        sqlx::query("INSERT INTO migration (version, created_at) VALUES (?, ?)")
            .bind(current_version)
            .bind(chrono::Utc::now())
            .execute(&mut *transaction)
            .await?;
        transaction.commit().await?;
    } else {
        // insert the current version as the last version
        sqlx::query("INSERT INTO migration (version, created_at) VALUES (?, ?)")
            .bind(current_version)
            .bind(chrono::Utc::now())
            .execute(client)
            .await?;
    }

    Ok(())
}

#[macro_export]
macro_rules! sql_span {
    ($expr: expr) => {{
        use tracing::Instrument;
        ($expr).instrument(info_span!("Database Request"))
    }};
    ($expr: expr, $title: expr) => {{
        use tracing::Instrument;
        ($expr).instrument(info_span!(concat!("Database Request: ", $title)))
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::BoxError;

    async fn versions(connection: &DatabaseConnection) -> std::result::Result<Vec<String>, BoxError> {
        Ok(
            sqlx::query_scalar("SELECT version FROM migration ORDER BY id")
                .fetch_all(connection)
                .await?,
        )
    }

    #[tokio::test]
    async fn test_connect_records_version() -> std::result::Result<(), BoxError> {
        let info = connect("sqlite::memory:", 1).await?;
        assert_eq!(
            vec![env!("CARGO_PKG_VERSION").to_owned()],
            versions(&info.connection).await?
        );

        // running the migrations again is a no-op
        migrate(&info.connection, env!("CARGO_PKG_VERSION"), MIGRATIONS).await?;
        assert_eq!(1, versions(&info.connection).await?.len());

        Ok(())
    }

    #[tokio::test]
    async fn test_migrate_applies_newer_migrations() -> std::result::Result<(), BoxError> {
        let connection = connect("sqlite::memory:", 1).await?.connection;
        sqlx::query("UPDATE migration SET version = '0.0.1'")
            .execute(&connection)
            .await?;

        migrate(
            &connection,
            "0.0.3",
            &[
                ("0.0.1", "CREATE TABLE skipped (id INTEGER);"),
                ("0.0.2", "CREATE TABLE applied (id INTEGER);"),
            ],
        )
        .await?;

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('skipped', 'applied')",
        )
        .fetch_all(&connection)
        .await?;
        assert_eq!(vec!["applied".to_owned()], tables);
        assert_eq!(
            Some("0.0.3"),
            versions(&connection).await?.last().map(String::as_str)
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() -> std::result::Result<(), BoxError> {
        let connection = connect("sqlite::memory:", 1).await?.connection;
        let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
            .fetch_one(&connection)
            .await?;
        assert_eq!(1, enabled);

        Ok(())
    }
}
