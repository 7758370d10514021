use std::sync::Arc;
use std::time::Duration;

use chrono_tz::Tz;
use log::{error, info};
use mongodb::{error::Error as DbError, Client as MongoClient, Database};
use reqwest::Url;
use rocket::{
    fairing::{Fairing, Info, Kind},
    figment::Figment,
    Build, Rocket,
};
use serde::{de::Error as _, Deserialize, Deserializer};
use thiserror::Error;

use crate::{
    lifecycle::{DispatchSettings, OrgClock},
    mail::{HttpMailer, Mailer},
    model::mongodb::ensure_indexes_exist,
    storage::{DocumentStore, SupabaseStorage},
    store::{MongoStore, Store},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // non-secrets
    #[serde(deserialize_with = "deserialize_timezone")]
    timezone: Tz,
    site_url: String,
    #[serde(default)]
    internal_scheduler: bool,
    #[serde(default = "default_invitation_concurrency")]
    invitation_concurrency: usize,
    #[serde(default = "default_http_timeout_secs")]
    http_timeout_secs: u64,
    trigger_url: Option<String>,
    // secrets
    trigger_current_signing_key: String,
    trigger_next_signing_key: String,
}

impl Config {
    /// The organisation's timezone, in which elections are scheduled.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn clock(&self) -> OrgClock {
        OrgClock::new(self.timezone)
    }

    /// Public URL of the voting site, used in invitation links.
    pub fn site_url(&self) -> &str {
        &self.site_url
    }

    /// Whether to run ticks from an in-process hourly timer.
    pub fn internal_scheduler(&self) -> bool {
        self.internal_scheduler
    }

    pub fn dispatch_settings(&self) -> DispatchSettings {
        DispatchSettings {
            site_url: self.site_url.clone(),
            concurrency: self.invitation_concurrency,
        }
    }

    /// Timeout for every outgoing HTTP call. A timed-out call is a failure.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// The URL the trigger is expected to sign for, if checked.
    pub fn trigger_url(&self) -> Option<&str> {
        self.trigger_url.as_deref()
    }

    /// Keys a trigger request may be signed with: the current one, then
    /// the next one during key rotation.
    pub fn trigger_signing_keys(&self) -> [&[u8]; 2] {
        [
            self.trigger_current_signing_key.as_bytes(),
            self.trigger_next_signing_key.as_bytes(),
        ]
    }

    #[cfg(test)]
    pub fn example() -> Self {
        Self {
            timezone: chrono_tz::Asia::Manila,
            site_url: "https://eboto.example".to_string(),
            internal_scheduler: false,
            invitation_concurrency: 4,
            http_timeout_secs: 5,
            trigger_url: Some("https://eboto.example/api/do-election-processing".to_string()),
            trigger_current_signing_key: "current-signing-key".to_string(),
            trigger_next_signing_key: "next-signing-key".to_string(),
        }
    }
}

fn deserialize_timezone<'de, D>(deserializer: D) -> Result<Tz, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    name.parse()
        .map_err(|e| D::Error::custom(format!("unknown timezone `{name}`: {e}")))
}

fn default_invitation_concurrency() -> usize {
    8
}

fn default_http_timeout_secs() -> u64 {
    10
}

/// Errors setting up the server's collaborators.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] rocket::figment::Error),
    #[error("Invalid URL in `{key}`: {reason}")]
    Url { key: &'static str, reason: String },
    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to connect to database: {0}")]
    Db(#[from] DbError),
}

impl SetupError {
    /// Log this error, in detail for configuration errors.
    fn log(self, what: &str) {
        error!("Failed to set up {what}");
        match self {
            Self::Config(e) => rocket::config::pretty_print_error(e),
            e => error!("{e}"),
        }
    }
}

fn parse_url(key: &'static str, value: &str) -> Result<Url, SetupError> {
    Url::parse(value).map_err(|e| SetupError::Url {
        key,
        reason: e.to_string(),
    })
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // non-secrets
    #[serde(default = "default_db_name")]
    db_name: String,
    // secrets
    db_uri: String,
}

fn default_db_name() -> String {
    "eboto".to_string()
}

/// Connect to the configured database and make sure its indexes exist.
pub async fn connect_database(figment: &Figment) -> Result<(MongoClient, Database), SetupError> {
    let config = figment.extract::<DbConfig>()?;
    let client = MongoClient::with_uri_str(config.db_uri).await?;
    let db = client.database(&config.db_name);
    ensure_indexes_exist(&db).await?;
    Ok((client, db))
}

/// The HTTP client shared by all outgoing calls.
pub fn http_client(config: &Config) -> Result<reqwest::Client, SetupError> {
    Ok(reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()?)
}

/// Configuration for the transactional email API.
#[derive(Deserialize)]
struct MailConfig {
    // non-secrets
    mail_api_url: String,
    mail_from: String,
    // secrets
    mail_api_key: String,
}

pub fn mailer(figment: &Figment, client: reqwest::Client) -> Result<HttpMailer, SetupError> {
    let config = figment.extract::<MailConfig>()?;
    let endpoint = parse_url("mail_api_url", &config.mail_api_url)?;
    Ok(HttpMailer::new(
        client,
        endpoint,
        config.mail_api_key,
        config.mail_from,
    ))
}

/// Configuration for the result document store.
#[derive(Deserialize)]
struct StorageConfig {
    // non-secrets
    storage_url: String,
    #[serde(default = "default_storage_bucket")]
    storage_bucket: String,
    // secrets
    storage_key: String,
}

fn default_storage_bucket() -> String {
    "eboto-mo".to_string()
}

pub fn document_store(
    figment: &Figment,
    client: reqwest::Client,
) -> Result<SupabaseStorage, SetupError> {
    let config = figment.extract::<StorageConfig>()?;
    let base = parse_url("storage_url", &config.storage_url)?;
    Ok(SupabaseStorage::new(
        client,
        base,
        config.storage_key,
        config.storage_bucket,
    ))
}

/// A fairing that loads the application config and puts it in managed state.
/// This could easily be achieved using `AdHoc::config`, but is written out
/// explicitly for symmetry with the other fairings and control over error
/// messages.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                SetupError::from(e).log("application config");
                return Err(rocket);
            }
        };
        info!("Organisation timezone is {}", config.timezone().name());

        rocket = rocket.manage(config);
        Ok(rocket)
    }
}

/// A fairing that connects to MongoDB, ensures the indexes exist, and places
/// the `Client`, the `Database` and a `Store` over it into managed state.
pub struct DatabaseFairing;

#[rocket::async_trait]
impl Fairing for DatabaseFairing {
    fn info(&self) -> Info {
        Info {
            name: "MongoDB",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        info!("Connecting to database...");
        let (client, db) = match connect_database(rocket.figment()).await {
            Ok(connection) => connection,
            Err(e) => {
                e.log("database");
                return Err(rocket);
            }
        };
        info!("...database connection online!");

        let store: Arc<dyn Store> = Arc::new(MongoStore::new(&db));
        rocket = rocket.manage(client).manage(db).manage(store);
        Ok(rocket)
    }
}

/// A fairing that builds the email sender and the document store and places
/// them into managed state. Depends on `Config` being managed, so must be
/// attached after [`ConfigFairing`].
pub struct CollaboratorFairing;

#[rocket::async_trait]
impl Fairing for CollaboratorFairing {
    fn info(&self) -> Info {
        Info {
            name: "HTTP collaborators",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, mut rocket: Rocket<Build>) -> rocket::fairing::Result {
        let built = match rocket.state::<Config>() {
            Some(config) => http_client(config).and_then(|client| {
                let mailer = mailer(rocket.figment(), client.clone())?;
                let storage = document_store(rocket.figment(), client)?;
                Ok((mailer, storage))
            }),
            None => {
                error!("Config was not available when building collaborators");
                return Err(rocket);
            }
        };
        let (mailer, storage) = match built {
            Ok(collaborators) => collaborators,
            Err(e) => {
                e.log("collaborators");
                return Err(rocket);
            }
        };
        info!("Loaded email and storage config");

        let mailer: Arc<dyn Mailer> = Arc::new(mailer);
        let storage: Arc<dyn DocumentStore> = Arc::new(storage);
        rocket = rocket.manage(mailer).manage(storage);
        Ok(rocket)
    }
}
