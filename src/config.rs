use std::path::PathBuf;

use mongodb::Client as MongoClient;
use rocket::{
    fairing::{Fairing, Info, Kind},
    Build, Rocket,
};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::images::ImageStore;
use crate::model::{
    db::settings::ensure_settings_exist,
    mongodb::{ensure_indexes_exist, Coll},
};

/// Application configuration, derived from `Rocket.toml` and `ROCKET_*`
/// environment variables. This struct becomes managed state and can be
/// inspected by any endpoint.
#[derive(Deserialize)]
pub struct Config {
    // secrets
    admin_password: String,
}

impl Config {
    /// Check a submitted admin secret. This is a plain equality check
    /// against the configured value; nothing is hashed or rate-limited.
    pub fn authorize(&self, password: &str) -> Result<()> {
        if !self.admin_password.is_empty() && password == self.admin_password {
            Ok(())
        } else {
            Err(Error::Unauthorized("Invalid admin password".to_string()))
        }
    }

    /// The configured secret, for tests that act as the admin.
    #[cfg(test)]
    pub fn admin_password(&self) -> &str {
        &self.admin_password
    }
}

/// A fairing that loads the application config and puts it in managed state.
pub struct ConfigFairing;

#[rocket::async_trait]
impl Fairing for ConfigFairing {
    fn info(&self) -> Info {
        Info {
            name: "Config",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<Config>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load application config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        if config.admin_password.is_empty() {
            warn!("`admin_password` is empty; every admin request will be refused");
        }

        Ok(rocket.manage(config))
    }
}

/// Configuration for the database.
#[derive(Deserialize)]
struct DbConfig {
    // secrets
    db_uri: String,
}

/// A fairing that loads the MongoDB config, connects to the database,
/// performs any setup necessary, and places both a `Client` and a `Database`
/// into managed state.
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
        let config = match rocket.figment().extract::<DbConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load database config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        info!("Loaded database config, connecting...");
        let client = match MongoClient::with_uri_str(config.db_uri).await {
            Ok(client) => client,
            Err(e) => {
                error!("Failed to connect to database: {e}");
                return Err(rocket);
            }
        };
        let db = client.database(&get_database_name());

        // The vote uniqueness guarantee lives in these indexes.
        if let Err(e) = ensure_indexes_exist(&db).await {
            error!("Failed to create database indexes: {e}");
            return Err(rocket);
        }

        // The settings singleton is provisioned once and only updated afterwards.
        if let Err(e) = ensure_settings_exist(&Coll::from_db(&db)).await {
            error!("Failed to provision settings: {e}");
            return Err(rocket);
        }
        info!("...database connection online!");

        rocket = rocket.manage(client).manage(db);
        Ok(rocket)
    }
}

/// Get the name of the database to use (production version).
#[cfg(not(test))]
fn get_database_name() -> String {
    "livevote".to_string()
}

/// Get the name of the database to use (test version).
/// Use a random name to avoid collisions between tests.
#[cfg(test)]
fn get_database_name() -> String {
    let random: u32 = rand::random();
    let db = format!("test{random}");
    info!("Using database {db}");
    db
}

/// Configuration for contestant photo storage.
#[derive(Deserialize)]
struct ImageConfig {
    // non-secrets
    image_dir: PathBuf,
    image_base_url: String,
}

/// A fairing that loads the image storage config, creates the storage
/// directory, and places an [`ImageStore`] into managed state.
pub struct ImageStoreFairing;

#[rocket::async_trait]
impl Fairing for ImageStoreFairing {
    fn info(&self) -> Info {
        Info {
            name: "Image store",
            kind: Kind::Ignite,
        }
    }

    async fn on_ignite(&self, rocket: Rocket<Build>) -> rocket::fairing::Result {
        let config = match rocket.figment().extract::<ImageConfig>() {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load image storage config");
                rocket::config::pretty_print_error(e);
                return Err(rocket);
            }
        };
        let store = ImageStore::new(get_image_dir(config.image_dir), &config.image_base_url);
        if let Err(e) = store.prepare().await {
            error!(
                "Failed to create image directory {}: {e}",
                store.dir().display()
            );
            return Err(rocket);
        }
        info!("Storing images in {}", store.dir().display());

        Ok(rocket.manage(store))
    }
}

/// Get the image directory to use (production version).
#[cfg(not(test))]
fn get_image_dir(configured: PathBuf) -> PathBuf {
    configured
}

/// Get the image directory to use (test version).
/// Use a fresh temporary directory to avoid collisions between tests.
#[cfg(test)]
fn get_image_dir(_configured: PathBuf) -> PathBuf {
    let random: u32 = rand::random();
    std::env::temp_dir().join(format!("livevote-images-{random}"))
}

/// Drop a test's database and remove its image directory.
#[cfg(test)]
pub async fn discard_test_state(db: mongodb::Database, image_dir: PathBuf) {
    db.drop(None).await.unwrap();
    match rocket::tokio::fs::remove_dir_all(&image_dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => panic!("Failed to remove {}: {e}", image_dir.display()),
    }
}
