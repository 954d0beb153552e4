#[macro_use]
extern crate rocket;

#[cfg(test)]
#[macro_use]
extern crate backend_test;

use rocket::{Build, Rocket};

pub mod api;
pub mod config;
pub mod error;
pub mod identity;
pub mod images;
pub mod logging;
pub mod model;

pub use config::Config;
use config::{ConfigFairing, DatabaseFairing, ImageStoreFairing};
use logging::LoggerFairing;

/// Build the server. Configuration, the database connection and image
/// storage are all set up when the returned rocket ignites.
pub fn build() -> Rocket<Build> {
    rocket::build()
        .mount("/", api::routes())
        .register("/", error::catchers())
        .attach(LoggerFairing)
        .attach(ConfigFairing)
        .attach(DatabaseFairing)
        .attach(ImageStoreFairing)
}
