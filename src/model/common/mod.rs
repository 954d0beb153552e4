//! Domain logic shared between the server and the voter client.

pub mod results;
pub mod schedule;
