use chrono::Utc;
use mongodb::bson::doc;
use rocket::{serde::json::Json, Route};

use crate::error::{Error, Result};
use crate::model::{
    api::{vote::VoteRequest, Done},
    db::{
        contestant::Contestant,
        settings::Settings,
        vote::{NewVote, Vote},
    },
    mongodb::{Coll, DbErrorExt},
};

pub fn routes() -> Vec<Route> {
    routes![submit_vote]
}

/// Record one vote for one contestant.
///
/// The unique index on `votes.session_id` decides whether a session has
/// already voted, so concurrent submissions from the same session cannot
/// both get through. The tally is bumped with a single `$inc`, so
/// concurrent votes from different sessions never lose an update.
#[post("/vote", data = "<request>", format = "json")]
async fn submit_vote(
    request: Json<VoteRequest>,
    settings: Coll<Settings>,
    contestants: Coll<Contestant>,
    new_votes: Coll<NewVote>,
    votes: Coll<Vote>,
) -> Result<Json<Done>> {
    let (session_id, contestant_id) = request.0.validate()?;

    // The client only gates voting for display; the server clock decides.
    let status = Settings::load(&settings).await?.window().evaluate(Utc::now());
    if !status.is_active() {
        return Err(Error::VotingClosed(status.describe()));
    }

    if contestants
        .find_one(contestant_id.as_doc(), None)
        .await?
        .is_none()
    {
        return Err(Error::Validation(format!(
            "Contestant '{contestant_id}' does not exist"
        )));
    }

    record_vote(
        &contestants,
        &new_votes,
        &votes,
        NewVote::new(session_id, contestant_id),
    )
    .await?;

    info!("Recorded vote for contestant {contestant_id}");
    Ok(Json(Done::ok()))
}

/// Insert `vote` and bump its contestant's tally.
///
/// If the contestant is gone by the time the tally is bumped, the vote is
/// removed again and the session stays free to vote.
async fn record_vote(
    contestants: &Coll<Contestant>,
    new_votes: &Coll<NewVote>,
    votes: &Coll<Vote>,
    vote: NewVote,
) -> Result<()> {
    let inserted = new_votes.insert_one(&vote, None).await;
    if let Err(ref e) = inserted {
        if e.is_duplicate_key() {
            return Err(Error::DuplicateVote(
                "This session has already voted".to_string(),
            ));
        }
    }
    let vote_id = inserted?.inserted_id;

    let update = doc! {
        "$inc": { "vote_count": 1 }
    };
    let result = contestants
        .update_one(vote.contestant_id.as_doc(), update, None)
        .await?;
    if result.matched_count == 0 {
        votes.delete_one(doc! { "_id": vote_id }, None).await?;
        return Err(Error::Validation(format!(
            "Contestant '{}' does not exist",
            vote.contestant_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use mongodb::Database;
    use rocket::{
        futures::future::join_all,
        http::{ContentType, Status},
        local::asynchronous::Client,
        serde::json::serde_json::json,
    };

    use crate::error::ErrorBody;
    use crate::model::{db::contestant::NewContestant, mongodb::Id};

    use super::*;

    #[backend_test(open)]
    async fn vote_recorded(client: Client, db: Database) {
        let id = insert_contestant(&db, "Ada").await;

        let response = vote(&client, "session-1", &id.to_string()).await;
        assert_eq!(Status::Ok, response);

        assert_eq!(tally(&db, id).await, 1);
        let recorded = Coll::<Vote>::from_db(&db)
            .find_one(doc! { "session_id": "session-1" }, None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(recorded.contestant_id, id);
    }

    #[backend_test(open)]
    async fn duplicate_vote_rejected(client: Client, db: Database) {
        let ada = insert_contestant(&db, "Ada").await;
        let grace = insert_contestant(&db, "Grace").await;

        assert_eq!(Status::Ok, vote(&client, "session-1", &ada.to_string()).await);

        // Same session, same or different contestant: rejected, nothing changes.
        for target in [ada, grace] {
            let response = client
                .post(uri!(submit_vote))
                .header(ContentType::JSON)
                .body(json!(VoteRequest::new("session-1", target.to_string())).to_string())
                .dispatch()
                .await;
            assert_eq!(Status::Conflict, response.status());
            let body = response.into_json::<ErrorBody>().await.unwrap();
            assert_eq!(body.error, "This session has already voted");
        }

        assert_eq!(tally(&db, ada).await, 1);
        assert_eq!(tally(&db, grace).await, 0);
        assert_eq!(vote_count(&db).await, 1);
    }

    #[backend_test(open)]
    async fn invalid_votes_rejected(client: Client, db: Database) {
        let id = insert_contestant(&db, "Ada").await;

        // Missing fields.
        let response = client
            .post(uri!(submit_vote))
            .header(ContentType::JSON)
            .body(json!({}).to_string())
            .dispatch()
            .await;
        assert_eq!(Status::BadRequest, response.status());
        assert_eq!(Status::BadRequest, vote(&client, "", &id.to_string()).await);
        assert_eq!(Status::BadRequest, vote(&client, "session-1", "").await);

        // Malformed and unknown contestants.
        assert_eq!(Status::BadRequest, vote(&client, "session-1", "nobody").await);
        assert_eq!(
            Status::BadRequest,
            vote(&client, "session-1", &Id::new().to_string()).await
        );

        assert_eq!(tally(&db, id).await, 0);
        assert_eq!(vote_count(&db).await, 0);

        // The session was never burned, so it can still vote.
        assert_eq!(Status::Ok, vote(&client, "session-1", &id.to_string()).await);
    }

    #[backend_test]
    async fn vote_for_deleted_contestant_withdrawn(
        db: Database,
        contestants: Coll<Contestant>,
        new_votes: Coll<NewVote>,
        votes: Coll<Vote>,
    ) {
        let gone = insert_contestant(&db, "Ada").await;
        contestants.delete_one(gone.as_doc(), None).await.unwrap();

        // As if the contestant vanished after the handler's existence check.
        let vote = NewVote::new("session-1".to_string(), gone);
        let err = record_vote(&contestants, &new_votes, &votes, vote)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{err:?}");
        assert_eq!(vote_count(&db).await, 0);

        // The session is free to vote again.
        let grace = insert_contestant(&db, "Grace").await;
        let vote = NewVote::new("session-1".to_string(), grace);
        record_vote(&contestants, &new_votes, &votes, vote)
            .await
            .unwrap();
        assert_eq!(tally(&db, grace).await, 1);
        assert_eq!(vote_count(&db).await, 1);
    }

    #[backend_test]
    async fn unscheduled_voting_rejected(client: Client, db: Database) {
        let id = insert_contestant(&db, "Ada").await;

        assert_eq!(Status::Forbidden, vote(&client, "session-1", &id.to_string()).await);
        assert_eq!(tally(&db, id).await, 0);
        assert_eq!(vote_count(&db).await, 0);
    }

    #[backend_test]
    async fn votes_outside_window_rejected(client: Client, db: Database, settings: Coll<Settings>) {
        let id = insert_contestant(&db, "Ada").await;
        let now = Utc::now();

        // Not open yet.
        Settings::store_window(
            &settings,
            Some(now + Duration::hours(1)),
            Some(now + Duration::hours(2)),
        )
        .await
        .unwrap();
        assert_eq!(Status::Forbidden, vote(&client, "session-1", &id.to_string()).await);

        // Already over.
        Settings::store_window(
            &settings,
            Some(now - Duration::hours(2)),
            Some(now - Duration::hours(1)),
        )
        .await
        .unwrap();
        assert_eq!(Status::Forbidden, vote(&client, "session-1", &id.to_string()).await);

        assert_eq!(tally(&db, id).await, 0);
        assert_eq!(vote_count(&db).await, 0);
    }

    #[backend_test(open)]
    async fn concurrent_votes_all_counted(client: Client, db: Database) {
        const VOTERS: usize = 25;
        let id = insert_contestant(&db, "Ada").await;
        let contestant = id.to_string();

        let sessions = (0..VOTERS).map(|i| format!("session-{i}")).collect::<Vec<_>>();
        let statuses = join_all(sessions.iter().map(|s| vote(&client, s, &contestant))).await;

        assert!(statuses.iter().all(|s| *s == Status::Ok));
        assert_eq!(tally(&db, id).await, VOTERS as u64);
        assert_eq!(vote_count(&db).await, VOTERS as u64);
    }

    #[backend_test(open)]
    async fn concurrent_duplicates_counted_once(client: Client, db: Database) {
        let id = insert_contestant(&db, "Ada").await;
        let contestant = id.to_string();

        let statuses = join_all((0..10).map(|_| vote(&client, "same-session", &contestant))).await;

        let accepted = statuses.iter().filter(|s| **s == Status::Ok).count();
        let rejected = statuses.iter().filter(|s| **s == Status::Conflict).count();
        assert_eq!(accepted, 1);
        assert_eq!(rejected, 9);
        assert_eq!(tally(&db, id).await, 1);
        assert_eq!(vote_count(&db).await, 1);
    }

    async fn vote(client: &Client, session_id: &str, contestant_id: &str) -> Status {
        client
            .post(uri!(submit_vote))
            .header(ContentType::JSON)
            .body(json!(VoteRequest::new(session_id, contestant_id)).to_string())
            .dispatch()
            .await
            .status()
    }

    async fn insert_contestant(db: &Database, name: &str) -> Id {
        Coll::<NewContestant>::from_db(db)
            .insert_one(NewContestant::example_named(name, 0), None)
            .await
            .unwrap()
            .inserted_id
            .as_object_id()
            .unwrap()
            .into()
    }

    async fn tally(db: &Database, id: Id) -> u64 {
        Coll::<Contestant>::from_db(db)
            .find_one(id.as_doc(), None)
            .await
            .unwrap()
            .unwrap()
            .vote_count
    }

    async fn vote_count(db: &Database) -> u64 {
        Coll::<Vote>::from_db(db)
            .count_documents(None, None)
            .await
            .unwrap()
    }
}
