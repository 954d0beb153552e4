use std::ops::Deref;

use mongodb::{
    bson::doc, error::Error as DbError, options::IndexOptions, Collection, Database, IndexModel,
};
use rocket::{
    http::Status,
    request::{self, FromRequest, Request},
    State,
};

use crate::model::db::{
    contestant::{Contestant, NewContestant},
    settings::Settings,
    vote::{NewVote, Vote},
};

/// A type that can be directly inserted/read to/from the database.
pub trait MongoCollection {
    /// The name of the collection.
    const NAME: &'static str;
}

/// A database collection of the given type.
pub struct Coll<T>(Collection<T>);

impl<T> Coll<T>
where
    T: MongoCollection,
{
    /// Get a handle on this collection in the given database.
    pub fn from_db(db: &Database) -> Self {
        Self(db.collection(T::NAME))
    }
}

// `Derive(Clone)` would only derive if `T: Clone`, but we don't need that bound.
impl<T> Clone for Coll<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> Deref for Coll<T> {
    type Target = Collection<T>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[rocket::async_trait]
impl<'r, T> FromRequest<'r> for Coll<T>
where
    T: MongoCollection,
{
    type Error = ();

    /// Wrap the managed [`Database`] in a typed collection.
    async fn from_request(req: &'r Request<'_>) -> request::Outcome<Self, Self::Error> {
        match req.guard::<&State<Database>>().await {
            request::Outcome::Success(db) => request::Outcome::Success(Coll::from_db(db)),
            _ => {
                error!("Database is not in managed state");
                request::Outcome::Failure((Status::InternalServerError, ()))
            }
        }
    }
}

// Contestant collections
const CONTESTANTS: &str = "contestants";
impl MongoCollection for Contestant {
    const NAME: &'static str = CONTESTANTS;
}
impl MongoCollection for NewContestant {
    const NAME: &'static str = CONTESTANTS;
}

// Vote collections
const VOTES: &str = "votes";
impl MongoCollection for Vote {
    const NAME: &'static str = VOTES;
}
impl MongoCollection for NewVote {
    const NAME: &'static str = VOTES;
}

// Settings collection
const SETTINGS: &str = "settings";
impl MongoCollection for Settings {
    const NAME: &'static str = SETTINGS;
}

/// Ensure that all the required indexes exist on the given database.
///
/// This operation is idempotent.
pub async fn ensure_indexes_exist(db: &Database) -> Result<(), DbError> {
    debug!("Ensuring collection indexes exist");

    // One vote per voter session, enforced by the database itself.
    let unique = IndexOptions::builder().unique(true).build();
    let session_index = IndexModel::builder()
        .keys(doc! {"session_id": 1})
        .options(unique)
        .build();
    Coll::<Vote>::from_db(db)
        .create_index(session_index, None)
        .await?;

    // Cascading deletes look votes up by contestant.
    let contestant_index = IndexModel::builder()
        .keys(doc! {"contestant_id": 1})
        .build();
    Coll::<Vote>::from_db(db)
        .create_index(contestant_index, None)
        .await?;

    Ok(())
}
