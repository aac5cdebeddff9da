//! Command-line front end for the topic API.
//!
//! # Responsibility
//! - Map subcommands onto `TopicApi` calls.
//! - Print the `{status, body}` envelope as JSON on stdout.
//!
//! # Invariants
//! - Exit code is non-zero whenever the response status is 400 or above.

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use log::info;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use topicvote_api::{parse_instant, ApiConfig, ApiResponse, TopicApi};
use topicvote_core::{core_version, SessionManager};

#[derive(Parser, Debug)]
#[command(name = "topicvote", author, version, about)]
struct Cli {
    /// SQLite file; overrides TOPICVOTE_DB_PATH.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List topics, optionally by window (active|recently-finished|coming-soon).
    List {
        #[arg(long)]
        filter: Option<String>,
    },
    /// Show one topic.
    Get { id: String },
    /// Create a topic.
    Create {
        #[command(flatten)]
        credential: Credential,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: String,
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
    },
    /// Extend a topic's start and/or end date.
    Update {
        #[command(flatten)]
        credential: Credential,
        id: String,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
    },
    /// Delete a topic and its votes.
    Delete {
        #[command(flatten)]
        credential: Credential,
        id: String,
    },
    /// Cast a vote on a topic.
    Vote {
        id: String,
        #[arg(long)]
        national_id: String,
        #[arg(long)]
        rating: String,
    },
    /// Print the core version.
    Version,
}

/// Credential issued by the external identity service.
#[derive(Args, Debug)]
struct Credential {
    #[arg(long)]
    user: Option<String>,
    #[arg(long)]
    token: Option<String>,
    /// Credential expiration (RFC 3339 or YYYY-MM-DD); defaults to the session TTL.
    #[arg(long, value_parser = parse_expiry)]
    expires: Option<DateTime<Utc>>,
}

fn parse_expiry(raw: &str) -> Result<DateTime<Utc>, String> {
    parse_instant(raw).ok_or_else(|| format!("unrecognized date `{raw}`"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match ApiConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(2);
        }
    };
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Err(err) = config.init_logging() {
        eprintln!("logging init failed: {err}");
        return ExitCode::from(2);
    }

    let mut api = match TopicApi::open(&config) {
        Ok(api) => api,
        Err(err) => {
            eprintln!("failed to open `{}`: {err}", config.db_path.display());
            return ExitCode::from(2);
        }
    };

    let mut sessions = SessionManager::with_ttl(config.session_ttl);
    let response = run(&mut api, &mut sessions, cli.command);
    print_response(&response)
}

fn run(api: &mut TopicApi, sessions: &mut SessionManager, command: Command) -> ApiResponse {
    let now = api.now();
    info!(
        "event=cli_command module=cli status=start command={}",
        command.name()
    );
    match command {
        Command::List { filter } => api.list(filter.as_deref()),
        Command::Get { id } => api.get(&id),
        Command::Create {
            credential,
            title,
            description,
            start,
            end,
        } => {
            credential.login(sessions, now);
            let payload = json!({
                "title": title,
                "description": description,
                "startDate": start,
                "endDate": end,
            });
            api.create(sessions.active(now), &payload)
        }
        Command::Update {
            credential,
            id,
            start,
            end,
        } => {
            credential.login(sessions, now);
            let payload = json!({ "startDate": start, "endDate": end });
            api.update(sessions.active(now), &id, &payload)
        }
        Command::Delete { credential, id } => {
            credential.login(sessions, now);
            api.delete(sessions.active(now), &id)
        }
        Command::Vote {
            id,
            national_id,
            rating,
        } => api.vote(&id, &json!({ "nationalId": national_id, "rating": rating })),
        Command::Version => ApiResponse {
            status: 200,
            body: json!({ "version": core_version() }),
        },
    }
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::List { .. } => "list",
            Self::Get { .. } => "get",
            Self::Create { .. } => "create",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Vote { .. } => "vote",
            Self::Version => "version",
        }
    }
}

impl Credential {
    /// Starts a session when both user and token were given.
    fn login(self, sessions: &mut SessionManager, now: DateTime<Utc>) {
        let (Some(user), Some(token)) = (self.user, self.token) else {
            return;
        };
        sessions.login(user, token, self.expires, now);
    }
}

fn print_response(response: &ApiResponse) -> ExitCode {
    let envelope: Value = json!({ "status": response.status, "body": response.body });
    match serde_json::to_string_pretty(&envelope) {
        Ok(text) => println!("{text}"),
        Err(err) => {
            eprintln!("failed to encode response: {err}");
            return ExitCode::FAILURE;
        }
    }
    if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
