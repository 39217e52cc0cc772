//! Spark CLI
//!
//! Thin wrapper around spark-core functions for command-line usage. Tags
//! are simulated by files passed with `--tag`.
//!
//! ## Usage
//!
//! ```bash
//! # Create an account
//! spark -u alice -p secret signup --bio "Hello"
//!
//! # Show or edit interests
//! spark -u alice -p secret interests show
//! spark -u alice -p secret interests add media Podcasts
//!
//! # Write your profile to a tag
//! spark -u alice -p secret --tag /tmp/tag.txt tag write
//!
//! # Read a peer's tag and connect
//! spark -u bob -p hunter2 --tag /tmp/tag.txt tag read --yes
//!
//! # List connections and the leaderboard
//! spark -u bob -p hunter2 connection list
//! spark leaderboard
//! ```

mod file_tag;

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use spark_core::{
    ConfirmOutcome, ConnectionId, Coordinate, InterestCategory, RecordOutcome, SessionConfig,
    SessionFailure, SharedInterests, SparkEngine,
};
use tokio::sync::broadcast::error::RecvError;

use crate::file_tag::FileTagTransport;

/// Spark - proximity profile exchange
#[derive(Parser)]
#[command(name = "spark")]
#[command(version = "0.1.0")]
#[command(about = "Spark - exchange profiles over near-field tags")]
#[command(
    long_about = "Write your username and interests to a tag, read someone else's, and keep track of the people you share interests with."
)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Data directory (default: ~/.spark/data)
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Username to act as
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Password for --user
    #[arg(short, long, global = true)]
    password: Option<String>,

    /// File standing in for a tag in range (repeat for several tags)
    #[arg(long = "tag", global = true)]
    tags: Vec<PathBuf>,

    /// Delay before polling again when several tags are in range
    #[arg(long, global = true, default_value = "500")]
    retry_ms: u64,

    /// Give up if no single tag is found within this many seconds
    #[arg(long, global = true, default_value = "60")]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account for --user / --password
    Signup {
        /// Short bio
        #[arg(short, long, default_value = "")]
        bio: String,
    },

    /// Profile management
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },

    /// Interest management
    Interests {
        #[command(subcommand)]
        action: InterestsAction,
    },

    /// Connection management
    Connection {
        #[command(subcommand)]
        action: ConnectionAction,
    },

    /// Everyone ranked by number of connections
    Leaderboard {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Tag sessions
    Tag {
        #[command(subcommand)]
        action: TagAction,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Show your profile
    Show,

    /// Delete your account and all its connections
    Delete {
        /// Skip the confirmation notice
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum InterestsAction {
    /// Show your interests
    Show,

    /// Add an interest
    Add {
        /// academic, sports or media
        category: String,
        interest: String,
    },

    /// Remove an interest
    Remove {
        /// academic, sports or media
        category: String,
        interest: String,
    },
}

#[derive(Subcommand)]
enum ConnectionAction {
    /// List your connections
    List {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Record a connection without a tag
    Add {
        /// Peer's username
        username: String,

        #[command(flatten)]
        meta: EncounterMeta,
    },

    /// Delete a connection
    Delete {
        /// Connection ID
        id: String,
    },
}

#[derive(Subcommand)]
enum TagAction {
    /// Write your profile to the tag
    Write,

    /// Read a peer's profile from the tag and offer to connect
    Read {
        /// Connect without asking
        #[arg(short, long)]
        yes: bool,

        #[command(flatten)]
        meta: EncounterMeta,
    },

    /// Print the payload `tag write` would store
    Payload,
}

/// Optional metadata attached to a new connection
#[derive(clap::Args)]
struct EncounterMeta {
    /// Photo file to attach
    #[arg(long)]
    photo: Option<PathBuf>,

    /// Latitude of the encounter
    #[arg(long, requires = "lon", allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Longitude of the encounter
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lon: Option<f64>,
}

impl EncounterMeta {
    fn load(&self) -> Result<(Option<Vec<u8>>, Option<Coordinate>)> {
        let photo = match &self.photo {
            Some(path) => Some(
                std::fs::read(path)
                    .map_err(|e| anyhow::anyhow!("Cannot read photo '{}': {}", path.display(), e))?,
            ),
            None => None,
        };
        let coordinate = match self.lat.zip(self.lon) {
            Some((lat, lon)) => Some(
                Coordinate::try_new(lat, lon)
                    .map_err(|e| anyhow::anyhow!("Invalid location '{}, {}': {}", lat, lon, e))?,
            ),
            None => None,
        };
        Ok((photo, coordinate))
    }
}

#[derive(Serialize)]
struct LeaderboardEntry {
    rank: usize,
    username: String,
    connections: usize,
}

fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .init();
}

/// Get the default data directory (~/.spark/data)
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".spark")
        .join("data")
}

/// Parse an interest category name
fn parse_category(s: &str) -> Result<InterestCategory> {
    s.parse().map_err(|e| anyhow::anyhow!("{}", e))
}

/// Parse a connection ID, with or without its `conn_` prefix
fn parse_connection_id(s: &str) -> Result<ConnectionId> {
    let raw = s.strip_prefix("conn_").unwrap_or(s);
    ConnectionId::from_string(raw).map_err(|e| anyhow::anyhow!("Invalid connection ID '{}': {}", s, e))
}

/// Log in with the global credentials
fn log_in(engine: &SparkEngine, user: Option<&str>, password: Option<&str>) -> Result<()> {
    let (Some(user), Some(password)) = (user, password) else {
        anyhow::bail!("This command needs --user and --password");
    };
    engine.log_in(user, password)?;
    Ok(())
}

fn format_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Ask on stdin whether to connect.
///
/// Runs inside an async session, so the blocking read is moved off the
/// runtime's worker with `block_in_place`.
fn ask(peer: &str, shared: &SharedInterests) -> bool {
    tokio::task::block_in_place(|| read_answer(peer, shared))
}

fn read_answer(peer: &str, shared: &SharedInterests) -> bool {
    println!("{} shares your interest in: {}", peer, shared);
    print!("Connect with {}? [y/N] ", peer);
    let _ = std::io::stdout().flush();

    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Turn a session failure into the CLI's result
fn session_failed(failure: SessionFailure) -> Result<()> {
    if failure.is_cancellation() {
        println!("{}", failure);
        return Ok(());
    }
    anyhow::bail!("{}", failure)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    let data_dir = cli.data_dir.clone().unwrap_or_else(default_data_dir);
    let config = SessionConfig::default()
        .with_retry_delay(Duration::from_millis(cli.retry_ms))
        .with_session_timeout(Duration::from_secs(cli.timeout_secs));
    let transport = Arc::new(FileTagTransport::new(cli.tags.clone()));
    let engine = SparkEngine::open(&data_dir, transport, config)?;

    let user = cli.user.as_deref();
    let password = cli.password.as_deref();

    match cli.command {
        Commands::Signup { bio } => {
            let (Some(user), Some(password)) = (user, password) else {
                anyhow::bail!("signup needs --user and --password");
            };
            let id = engine.sign_up(user, password, &bio)?;
            println!("Created account: {}", user);
            println!("  ID: {}", id);
        }

        Commands::Profile { action } => {
            log_in(&engine, user, password)?;
            match action {
                ProfileAction::Show => {
                    let Some(profile) = engine.current_user() else {
                        anyhow::bail!("No user is logged in");
                    };
                    println!("Profile: {}", profile.username);
                    println!("  ID: {}", profile.id);
                    if !profile.bio.is_empty() {
                        println!("  Bio: {}", profile.bio);
                    }
                    println!("  Created: {}", format_timestamp(profile.created_at));
                    println!("  Connections: {}", profile.connection_count());
                }

                ProfileAction::Delete { force } => {
                    if !force {
                        println!("WARNING: Deleting your account is IRREVERSIBLE!");
                        println!();
                        println!("All of your connections will be lost.");
                        println!();
                        println!("To confirm, run: spark profile delete --force");
                    } else {
                        engine.delete_account();
                        println!("Account deleted.");
                    }
                }
            }
        }

        Commands::Interests { action } => {
            log_in(&engine, user, password)?;
            match action {
                InterestsAction::Show => {
                    let interests = engine.current_interests().unwrap_or_default();
                    for category in InterestCategory::ALL {
                        println!("{}: {}", category, interests.category(category).join(", "));
                    }
                }

                InterestsAction::Add { category, interest } => {
                    let category = parse_category(&category)?;
                    engine.add_interest(category, &interest)?;
                    println!("Added {} interest: {}", category, interest.trim());
                }

                InterestsAction::Remove { category, interest } => {
                    let category = parse_category(&category)?;
                    if engine.remove_interest(category, &interest)? {
                        println!("Removed {} interest: {}", category, interest);
                    } else {
                        println!("{} interests do not contain '{}'", category, interest);
                    }
                }
            }
        }

        Commands::Connection { action } => {
            log_in(&engine, user, password)?;
            let store = engine.store();
            match action {
                ConnectionAction::List { json } => {
                    let connections = engine
                        .current_user()
                        .map(|p| p.connections)
                        .unwrap_or_default();
                    if json {
                        println!("{}", serde_json::to_string_pretty(&connections)?);
                    } else if connections.is_empty() {
                        println!("No connections yet.");
                    } else {
                        println!("Connections ({}):", connections.len());
                        println!();
                        for conn in connections {
                            println!("  {} {}", conn.id.to_string_repr(), conn.username);
                            println!("    Date: {}", conn.date.to_rfc3339());
                            if let Some(photo) = &conn.photo {
                                // First 8 bytes as a fingerprint
                                let head = &photo[..photo.len().min(8)];
                                println!("    Photo: {} bytes ({})", photo.len(), hex::encode(head));
                            }
                            if let Some(location) = conn.location {
                                println!("    Location: {}", location);
                            }
                        }
                    }
                }

                ConnectionAction::Add { username, meta } => {
                    let (photo, coordinate) = meta.load()?;
                    let Some(conn) = store.write().add_connection(&username, photo, coordinate) else {
                        anyhow::bail!("No user is logged in");
                    };
                    println!("Connected with {}", conn.username);
                    println!("  ID: {}", conn.id.to_string_repr());
                }

                ConnectionAction::Delete { id } => {
                    let id = parse_connection_id(&id)?;
                    if store.write().remove_connection(&id) {
                        println!("Connection deleted.");
                    } else {
                        anyhow::bail!("Connection not found: {}", id);
                    }
                }
            }
        }

        Commands::Leaderboard { json } => {
            let entries: Vec<LeaderboardEntry> = engine
                .leaderboard()
                .into_iter()
                .enumerate()
                .map(|(i, (username, connections))| LeaderboardEntry {
                    rank: i + 1,
                    username,
                    connections,
                })
                .collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else if entries.is_empty() {
                println!("No profiles yet.");
            } else {
                for entry in entries {
                    println!("{:>3}. {} ({})", entry.rank, entry.username, entry.connections);
                }
            }
        }

        Commands::Tag { action } => {
            log_in(&engine, user, password)?;

            let mut notices = engine.subscribe_notices();
            tokio::spawn(async move {
                loop {
                    match notices.recv().await {
                        Ok(notice) => eprintln!("{}", notice.message),
                        Err(RecvError::Lagged(_)) => continue,
                        Err(RecvError::Closed) => break,
                    }
                }
            });

            match action {
                TagAction::Payload => {
                    let Some(payload) = engine.current_payload() else {
                        anyhow::bail!("No user is logged in");
                    };
                    println!("{}", String::from_utf8_lossy(&payload));
                }

                TagAction::Write => match engine.share_profile()?.outcome().await {
                    Ok(_) => println!("Profile written to tag."),
                    Err(failure) => return session_failed(failure),
                },

                TagAction::Read { yes, meta } => {
                    let (photo, coordinate) = meta.load()?;
                    let mut metadata = Some((photo, coordinate));
                    let mut prompt = |peer: &str, shared: &SharedInterests| {
                        if !yes && !ask(peer, shared) {
                            return ConfirmOutcome::Cancel;
                        }
                        let (photo, coordinate) = metadata.take().unwrap_or_default();
                        ConfirmOutcome::Connect { photo, coordinate }
                    };

                    let encounter = match engine.exchange(&mut prompt).await {
                        Ok(encounter) => encounter,
                        Err(failure) => return session_failed(failure),
                    };

                    let peer = &encounter.peer.username;
                    match encounter.outcome {
                        RecordOutcome::Recorded(conn) => {
                            println!("Connected with {}", peer);
                            println!("  ID: {}", conn.id.to_string_repr());
                            println!("  Shared: {}", encounter.shared);
                        }
                        RecordOutcome::NoSharedInterests => {
                            println!("No shared interests with {}.", peer);
                        }
                        RecordOutcome::Declined => {
                            println!("Connection with {} cancelled.", peer);
                        }
                        RecordOutcome::NoCurrentUser => anyhow::bail!("No user is logged in"),
                    }
                }
            }
        }
    }

    Ok(())
}
