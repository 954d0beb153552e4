use chrono::{DateTime, Utc};
use mongodb::{
    bson::{doc, oid::Error as IdError, Document},
    Client,
};
use rocket::{form::Form, serde::json::Json, Route, State};

use crate::error::{Error, Result};
use crate::images::ImageStore;
use crate::model::{
    api::{
        admin::AdminCredential,
        contestant::{
            clean_name, ContestantDeletion, ContestantDesc, ContestantUpdateForm,
            CreatedContestant, NewContestantForm,
        },
        settings::{ScheduleDesc, ScheduleUpdate},
        Done,
    },
    db::{
        contestant::{Contestant, NewContestant},
        settings::Settings,
        vote::Vote,
    },
    mongodb::{Coll, Id},
};
use crate::Config;

pub fn routes() -> Vec<Route> {
    routes![
        verify_admin,
        update_settings,
        create_contestant,
        update_contestant,
        delete_contestant,
        reset_votes,
    ]
}

#[post("/admin/verify", data = "<credential>", format = "json")]
async fn verify_admin(
    credential: Json<AdminCredential>,
    config: &State<Config>,
) -> Result<Json<Done>> {
    config.authorize(&credential.password)?;
    Ok(Json(Done::ok()))
}

#[put("/admin/settings", data = "<update>", format = "json")]
async fn update_settings(
    update: Json<ScheduleUpdate>,
    config: &State<Config>,
    settings: Coll<Settings>,
) -> Result<Json<ScheduleDesc>> {
    config.authorize(&update.password)?;
    update.validate()?;

    Settings::store_window(&settings, update.start, update.end).await?;
    info!(
        "Voting window set to {} .. {}",
        describe(update.start),
        describe(update.end)
    );

    let stored = Settings::load(&settings).await?;
    Ok(Json(stored.into()))
}

#[post("/admin/contestants", data = "<form>")]
async fn create_contestant(
    mut form: Form<NewContestantForm<'_>>,
    config: &State<Config>,
    store: &State<ImageStore>,
    contestants: Coll<Contestant>,
) -> Result<Json<CreatedContestant>> {
    config.authorize(form.password.as_deref().unwrap_or_default())?;

    let name = form
        .name
        .as_deref()
        .and_then(clean_name)
        .ok_or_else(|| Error::Validation("Contestant name is required".to_string()))?;
    let image = form
        .image
        .as_mut()
        .ok_or_else(|| Error::Validation("Contestant image is required".to_string()))?;

    let image_url = store.store(image).await?;
    let contestant = Contestant {
        id: Id::new(),
        contestant: NewContestant::new(name, image_url.clone()),
    };
    if let Err(e) = contestants.insert_one(&contestant, None).await {
        // Don't leave an unreferenced photo behind.
        store.remove(&image_url).await?;
        return Err(e.into());
    }
    info!("Created contestant {} ({})", contestant.id, contestant.name);

    Ok(Json(CreatedContestant {
        id: contestant.id.to_string(),
        image_url,
    }))
}

#[post("/admin/contestants/<contestant_id>", data = "<form>")]
async fn update_contestant(
    contestant_id: std::result::Result<Id, IdError>,
    mut form: Form<ContestantUpdateForm<'_>>,
    config: &State<Config>,
    store: &State<ImageStore>,
    contestants: Coll<Contestant>,
) -> Result<Json<ContestantDesc>> {
    config.authorize(form.password.as_deref().unwrap_or_default())?;
    let contestant_id = parse_contestant_id(contestant_id)?;

    // Browsers submit empty fields for untouched inputs.
    let name = form.name.as_deref().and_then(clean_name);
    let image = form.image.as_mut().filter(|image| image.len() > 0);
    if name.is_none() && image.is_none() {
        return Err(Error::Validation(
            "Provide a new name and/or image".to_string(),
        ));
    }

    let existing = contestants
        .find_one(contestant_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Contestant {contestant_id}")))?;

    let image_url = match image {
        Some(image) => Some(store.store(image).await?),
        None => None,
    };

    let mut changes = Document::new();
    if let Some(name) = &name {
        changes.insert("name", name.as_str());
    }
    if let Some(image_url) = &image_url {
        changes.insert("image_url", image_url.as_str());
    }
    let update = doc! { "$set": changes };
    let matched = match contestants
        .update_one(contestant_id.as_doc(), update, None)
        .await
    {
        Ok(result) => result.matched_count,
        Err(e) => {
            if let Some(image_url) = &image_url {
                store.remove(image_url).await?;
            }
            return Err(e.into());
        }
    };
    if matched == 0 {
        // Deleted while the new photo was being stored.
        if let Some(image_url) = &image_url {
            store.remove(image_url).await?;
        }
        return Err(Error::not_found(format!("Contestant {contestant_id}")));
    }

    if image_url.is_some() {
        store.remove(&existing.image_url).await?;
    }
    info!("Updated contestant {contestant_id}");

    let updated = contestants
        .find_one(contestant_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Contestant {contestant_id}")))?;
    Ok(Json(updated.into()))
}

#[delete("/admin/contestants/<contestant_id>", data = "<deletion>", format = "json")]
async fn delete_contestant(
    contestant_id: std::result::Result<Id, IdError>,
    deletion: Json<ContestantDeletion>,
    config: &State<Config>,
    store: &State<ImageStore>,
    db_client: &State<Client>,
    contestants: Coll<Contestant>,
    votes: Coll<Vote>,
) -> Result<Json<Done>> {
    config.authorize(&deletion.password)?;
    let contestant_id = parse_contestant_id(contestant_id)?;

    let contestant = contestants
        .find_one(contestant_id.as_doc(), None)
        .await?
        .ok_or_else(|| Error::not_found(format!("Contestant {contestant_id}")))?;
    if let Some(image_url) = &deletion.image_url {
        if image_url != &contestant.image_url {
            warn!("Ignoring stale image URL {image_url} for contestant {contestant_id}");
        }
    }

    // Remove the contestant and every vote cast for them together.
    {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let filter = doc! {
            "contestant_id": contestant_id,
        };
        let removed_votes = votes
            .delete_many_with_session(filter, None, &mut session)
            .await?;

        let result = contestants
            .delete_one_with_session(contestant_id.as_doc(), None, &mut session)
            .await?;
        if result.deleted_count == 0 {
            session.abort_transaction().await?;
            return Err(Error::not_found(format!("Contestant {contestant_id}")));
        }

        session.commit_transaction().await?;
        info!(
            "Deleted contestant {contestant_id} and {} vote(s)",
            removed_votes.deleted_count
        );
    }

    store.remove(&contestant.image_url).await?;
    Ok(Json(Done::ok()))
}

#[post("/admin/reset", data = "<credential>", format = "json")]
async fn reset_votes(
    credential: Json<AdminCredential>,
    config: &State<Config>,
    db_client: &State<Client>,
    contestants: Coll<Contestant>,
    votes: Coll<Vote>,
) -> Result<Json<Done>> {
    config.authorize(&credential.password)?;

    // Votes and tallies are cleared together so they never disagree.
    let mut session = db_client.start_session(None).await?;
    session.start_transaction(None).await?;

    let removed = votes
        .delete_many_with_session(doc! {}, None, &mut session)
        .await?;
    let update = doc! {
        "$set": { "vote_count": 0_i64 }
    };
    contestants
        .update_many_with_session(doc! {}, update, None, &mut session)
        .await?;

    session.commit_transaction().await?;
    info!("Reset all tallies, removing {} vote(s)", removed.deleted_count);

    Ok(Json(Done::ok()))
}

/// Report malformed IDs as bad input rather than letting the route forward.
fn parse_contestant_id(param: std::result::Result<Id, IdError>) -> Result<Id> {
    param.map_err(|e| Error::Validation(format!("Malformed contestant ID: {e}")))
}

fn describe(instant: Option<DateTime<Utc>>) -> String {
    instant.map_or_else(|| "unset".to_string(), |i| i.to_rfc3339())
}
