//! A command-line voter client.
//! It keeps a persistent voter identity on disk and talks to the server's
//! public API, so it sees exactly what any other voter would.

use std::fmt::Write as _;
use std::io;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use clap::{Arg, ArgAction, ArgMatches, Command};
use reqwest::blocking::{Client, Response};
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use livevote_backend::{
    error::ErrorBody,
    identity::{IdentityProvider, VoterSession},
    model::api::{
        results::Results,
        settings::ScheduleDesc,
        vote::{VoteCheck, VoteRequest},
        Done,
    },
};

const PROGRAM_NAME: &str = "voter-cli";

const ABOUT_TEXT: &str = "Vote in, and follow, a live contestant vote.

EXIT CODES:
     0: Success.
     1: Error talking to the server or reading the identity file.
     2: The vote was refused.";

const SERVER: &str = "SERVER";
const IDENTITY: &str = "IDENTITY";
const CONTESTANT_ID: &str = "CONTESTANT_ID";

const DEFAULT_SERVER: &str = "http://localhost:8000";
const DEFAULT_IDENTITY: &str = ".voter_session_id";

/// How often `watch` refreshes.
const REFRESH_INTERVAL: Duration = Duration::from_secs(1);

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(SERVER)
                .long("server")
                .help("Base URL of the voting server")
                .action(ArgAction::Set)
                .default_value(DEFAULT_SERVER),
        )
        .arg(
            Arg::new(IDENTITY)
                .long("identity")
                .help("File holding this client's voter session identifier")
                .action(ArgAction::Set)
                .default_value(DEFAULT_IDENTITY),
        )
        .subcommand_required(true)
        .subcommand(Command::new("id").about("Print this client's voter session identifier"))
        .subcommand(Command::new("status").about("Show whether voting is open"))
        .subcommand(Command::new("results").about("Show the live results"))
        .subcommand(
            Command::new("vote").about("Cast this client's vote").arg(
                Arg::new(CONTESTANT_ID)
                    .help("ID of the contestant to vote for, as listed by `results`")
                    .action(ArgAction::Set)
                    .required(true),
            ),
        )
        .subcommand(Command::new("watch").about("Follow the status and results live"))
}

/// Errors that this program may produce.
#[derive(Debug, Error)]
enum Error {
    #[error("Could not load voter identity: {0}")]
    Identity(#[from] io::Error),
    #[error("Could not reach the server: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with an error body.
    #[error("{0}")]
    Server(String),
    /// Refused locally, without asking the server.
    #[error("{0}")]
    Refused(String),
}

/// Thin blocking wrapper around the public API.
struct VoterClient {
    http: Client,
    server: String,
}

impl VoterClient {
    fn new(server: &str) -> Result<Self, Error> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            http,
            server: server.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.server)
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let response = self.http.get(self.url(path)).send()?;
        Ok(Self::check(response)?.json()?)
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T, Error> {
        let response = self.http.post(self.url(path)).json(body).send()?;
        Ok(Self::check(response)?.json()?)
    }

    /// Turn error statuses into the server's own message.
    fn check(response: Response) -> Result<Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .json::<ErrorBody>()
            .map(|body| body.error)
            .unwrap_or_else(|_| status.to_string());
        Err(Error::Server(message))
    }

    fn schedule(&self) -> Result<ScheduleDesc, Error> {
        self.get("/settings")
    }

    fn results(&self) -> Result<Results, Error> {
        self.get("/results")
    }

    fn session(&self, identity: &IdentityProvider) -> Result<VoterSession, Error> {
        let id = identity.session_id()?;
        let check: VoteCheck = self.get(&format!("/votes/{id}"))?;
        Ok(VoterSession::new(id, check.voted))
    }

    fn vote(&self, request: &VoteRequest) -> Result<Done, Error> {
        self.post("/vote", request)
    }
}

/// The ranking as a table, most votes first.
fn render_results(results: &Results) -> String {
    if results.ranking.is_empty() {
        return "No contestants yet.\n".to_string();
    }

    let width = results
        .ranking
        .iter()
        .map(|s| s.contestant.name.chars().count())
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for (position, standing) in results.ranking.iter().enumerate() {
        let votes = standing.contestant.vote_count;
        // Writing to a `String` cannot fail.
        let _ = writeln!(
            out,
            "{:>2}. {:<width$}  {:>5} vote{}  {:>5.1}%{}  [{}]",
            position + 1,
            standing.contestant.name,
            votes,
            if votes != 1 { "s" } else { " " },
            standing.percentage,
            if standing.leading { " *" } else { "  " },
            standing.contestant.id,
        );
    }
    let _ = writeln!(
        out,
        "Total: {}  Highest: {}  Average: {:.1}",
        results.total, results.max, results.average
    );
    out
}

fn render_session(session: &VoterSession) -> String {
    if session.has_voted() {
        format!("Session {}: already voted", session.id())
    } else {
        format!("Session {}: not voted yet", session.id())
    }
}

fn vote(client: &VoterClient, identity: &IdentityProvider, contestant_id: &str) -> Result<(), Error> {
    let mut session = client.session(identity)?;
    if session.has_voted() {
        return Err(Error::Refused(
            "This session has already voted".to_string(),
        ));
    }

    // Advisory only: the server makes the final call on its own clock.
    let status = client.schedule()?.window().evaluate(Utc::now());
    if !status.is_active() {
        return Err(Error::Refused(status.describe()));
    }

    client.vote(&VoteRequest::new(session.id(), contestant_id))?;
    session.mark_voted();
    println!("Vote recorded. {}", render_session(&session));
    Ok(())
}

/// Refresh the full picture once per interval, until interrupted.
fn watch(client: &VoterClient, identity: &IdentityProvider) -> Result<(), Error> {
    let mut session = client.session(identity)?;
    loop {
        let status = client.schedule()?.window().evaluate(Utc::now());
        let results = client.results()?;
        if !session.has_voted() {
            session = client.session(identity)?;
        }

        // Clear the screen and home the cursor.
        print!("\x1b[2J\x1b[H");
        println!("{}", status.describe());
        println!("{}\n", render_session(&session));
        print!("{}", render_results(&results));

        thread::sleep(REFRESH_INTERVAL);
    }
}

/// Run the requested subcommand and return the exit code.
fn run(args: &ArgMatches) -> u8 {
    // Arguments with defaults are guaranteed to be present.
    let server: &String = args.get_one(SERVER).unwrap();
    let identity = IdentityProvider::new(args.get_one::<String>(IDENTITY).unwrap());

    let result = VoterClient::new(server).and_then(|client| match args.subcommand() {
        Some(("id", _)) => {
            println!("{}", identity.session_id()?);
            Ok(())
        }
        Some(("status", _)) => {
            let status = client.schedule()?.window().evaluate(Utc::now());
            println!("{}", status.describe());
            println!("{}", render_session(&client.session(&identity)?));
            Ok(())
        }
        Some(("results", _)) => {
            print!("{}", render_results(&client.results()?));
            Ok(())
        }
        Some(("vote", vote_args)) => {
            // Required argument is guaranteed to be present.
            let contestant_id: &String = vote_args.get_one(CONTESTANT_ID).unwrap();
            vote(&client, &identity, contestant_id)
        }
        Some(("watch", _)) => watch(&client, &identity),
        _ => unreachable!("a subcommand is required"),
    });

    match result {
        Ok(()) => 0,
        Err(err @ Error::Refused(_)) => {
            println!("Vote refused: {err}");
            2
        }
        Err(err) => {
            println!("Error: {err}");
            1
        }
    }
}

fn main() {
    let args = cli().get_matches();
    let exit_code = run(&args);
    std::process::exit(exit_code.into())
}
