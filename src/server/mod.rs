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
use lazy_static::lazy_static;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

pub mod state;

#[derive(Deserialize, Debug, Clone)]
pub struct Config {
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub database_max_connections: u32,
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

cfg_if::cfg_if! {
    if #[cfg(test)] {
        fn default_database_url() -> String {
            "sqlite::memory:".to_owned()
        }
    } else {
        fn default_database_url() -> String {
            "sqlite://taskdeck.db".to_owned()
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_bind_address() -> String {
    "0.0.0.0:8000".to_owned()
}

fn default_admin_username() -> String {
    "admin".to_owned()
}

impl Config {
    /// The bootstrap administrator, if both of its credentials are configured.
    pub fn admin(&self) -> Option<(&str, &str, &str)> {
        match (self.admin_email.as_deref(), self.admin_password.as_deref()) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some((self.admin_username.as_str(), email, password))
            }
            _ => None,
        }
    }
}

lazy_static! {
    pub static ref CONFIGURATION: Config = match envy::from_env::<Config>() {
        Ok(config) => config,
        Err(error) => panic!("Invalid configuration: {error}"),
    };
}

pub async fn init() -> std::result::Result<(), Box<dyn std::error::Error>> {
    lazy_static::initialize(&CONFIGURATION);

    let (axum_sender, axum_receiver) = kanal::unbounded_async::<()>();

    let info = crate::database::connect(
        CONFIGURATION.database_url.as_str(),
        CONFIGURATION.database_max_connections,
    )
    .await?;
    info!("Using database {}", info.url);

    if let Some((username, email, password)) = CONFIGURATION.admin() {
        crate::auth::bootstrap_admin(&info.connection, username, email, password).await?;
    }

    let state = ApplicationState::from(info);
    let router = crate::routes::router(state)
        .layer(CompressionLayer::new().gzip(true))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(CONFIGURATION.bind_address.as_str()).await?;
    info!("Listening on {}", listener.local_addr()?);

    let server = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                axum_receiver.recv().await.ok();
            })
            .await
    });

    if let Err(error) = tokio::signal::ctrl_c().await {
        error!("Unable to listen for shutdown signal: {}", error);
    }

    info!("Received shutdown signal... Shutting down...");
    axum_sender.send(()).await?;
    server.await??;

    Ok(())
}
