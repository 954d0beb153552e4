use std::path::PathBuf;

use chrono::Utc;
use mongodb::{bson::doc, options::FindOptions};
use rocket::{fs::NamedFile, futures::TryStreamExt, serde::json::Json, Route, State};

use crate::error::Result;
use crate::images::ImageStore;
use crate::model::{
    api::{contestant::ContestantDesc, results::Results, settings::ScheduleDesc, vote::VoteCheck},
    common::{results::ranking, schedule::VotingStatus},
    db::{contestant::Contestant, settings::Settings, vote::Vote},
    mongodb::Coll,
};

pub fn routes() -> Vec<Route> {
    routes![
        get_contestants,
        get_results,
        get_settings,
        get_status,
        check_vote,
        get_image,
    ]
}

/// All contestants, most votes first. Ties keep creation order.
#[get("/contestants")]
async fn get_contestants(contestants: Coll<Contestant>) -> Result<Json<Vec<ContestantDesc>>> {
    let contestants = contestants_in_order(&contestants).await?;
    let ranked = ranking(&contestants).into_iter().cloned().collect();
    Ok(Json(ranked))
}

#[get("/results")]
async fn get_results(contestants: Coll<Contestant>) -> Result<Json<Results>> {
    let contestants = contestants_in_order(&contestants).await?;
    Ok(Json(Results::from_contestants(&contestants)))
}

#[get("/settings")]
async fn get_settings(settings: Coll<Settings>) -> Result<Json<ScheduleDesc>> {
    let settings = Settings::load(&settings).await?;
    Ok(Json(settings.into()))
}

/// The schedule evaluated against the server's clock.
#[get("/status")]
async fn get_status(settings: Coll<Settings>) -> Result<Json<VotingStatus>> {
    let settings = Settings::load(&settings).await?;
    Ok(Json(settings.window().evaluate(Utc::now())))
}

#[get("/votes/<session_id>")]
async fn check_vote(session_id: &str, votes: Coll<Vote>) -> Result<Json<VoteCheck>> {
    let count = votes
        .count_documents(doc! { "session_id": session_id.trim() }, None)
        .await?;
    Ok(Json(VoteCheck { voted: count > 0 }))
}

#[get("/images/<file..>")]
async fn get_image(file: PathBuf, store: &State<ImageStore>) -> Option<NamedFile> {
    let path = store.path_for(&file).ok()?;
    NamedFile::open(path).await.ok()
}

/// Every contestant, in the order they were created.
async fn contestants_in_order(contestants: &Coll<Contestant>) -> Result<Vec<ContestantDesc>> {
    let options = FindOptions::builder()
        .sort(doc! { "created_at": 1, "_id": 1 })
        .build();
    let descs = contestants
        .find(None, options)
        .await?
        .map_ok(ContestantDesc::from)
        .try_collect()
        .await?;
    Ok(descs)
}
