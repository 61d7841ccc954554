use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;
use validator::Validate;

use cellar::{
    open_storage, ApiClient, BoardStore, CellarError, Config, FindIdRequest, LoginRequest, Post,
    PostPayload, RegisterRequest, Result, SessionStore,
};

/// Command-line client for the Cellar shop API.
#[derive(Parser, Debug)]
#[command(name = "cellar", version, about = "Cellar shop board client")]
struct Cli {
    /// Path to the config file.
    #[arg(long = "config", global = true, default_value = "config.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List board posts.
    Posts,

    /// Log in and keep the session.
    Login {
        /// Email, user id, or phone number.
        id: String,
        /// Password.
        password: String,
    },

    /// Forget the stored session.
    Logout,

    /// Show the logged-in user.
    Whoami,

    /// Register a new account.
    #[command(name = "sign-up")]
    SignUp {
        /// Email address.
        email: String,
        /// Real name.
        name: String,
        /// Password.
        password: String,
        /// Mobile number (010-XXXX-XXXX).
        phone: String,
        /// Login id.
        #[arg(long)]
        user_id: Option<String>,
    },

    /// Write a post.
    Write {
        /// Title.
        title: String,
        /// Content.
        content: String,
    },

    /// Edit a post.
    Edit {
        /// Post ID.
        id: i64,
        /// New title.
        title: String,
        /// New content.
        content: String,
    },

    /// Delete a post.
    Delete {
        /// Post ID.
        id: i64,
    },

    /// Look up an account id.
    #[command(name = "find-id")]
    FindId {
        /// Real name.
        name: String,
        /// Mobile number.
        phone: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load_with_env(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {e}", cli.config);
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = cellar::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to stderr-only logging
        cellar::logging::init_stderr(&config.logging.level);
    }

    match run(cli.command, &config).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Run one command. `Ok(false)` means the command ran but did not succeed.
async fn run(command: Commands, config: &Config) -> Result<bool> {
    config.validate()?;

    let client = Arc::new(ApiClient::new(&config.api)?);
    let storage = open_storage(&config.storage)?;
    let session = Arc::new(SessionStore::new(client.clone(), storage));
    let board = BoardStore::new(client.clone(), session.clone());
    info!("Using API at {}", client.base_url());

    match command {
        Commands::Posts => {
            let loaded = board.fetch_posts().await;
            if !loaded {
                return Ok(report_board(false, &board));
            }
            let posts = board.posts();
            if posts.is_empty() {
                println!("No posts.");
            }
            let user = session.user();
            let me = user.as_ref().and_then(|profile| profile.username());
            for post in posts {
                println!("{}", post_line(&post, me));
            }
            Ok(true)
        }
        Commands::Login { id, password } => {
            match session.login(&LoginRequest::new(id, password)).await {
                Some(profile) => {
                    println!("Logged in as {}.", profile.username().unwrap_or("unknown user"));
                    Ok(true)
                }
                None => {
                    eprintln!("Login failed.");
                    Ok(false)
                }
            }
        }
        Commands::Logout => {
            session.logout();
            println!("Logged out.");
            Ok(true)
        }
        Commands::Whoami => {
            match session.user() {
                Some(profile) => {
                    println!("{}", profile.username().unwrap_or("unknown user"));
                    if let Some(email) = profile.email() {
                        println!("{email}");
                    }
                }
                None => println!("Not logged in."),
            }
            Ok(true)
        }
        Commands::SignUp {
            email,
            name,
            password,
            phone,
            user_id,
        } => {
            let mut request = RegisterRequest::new(email, name, password, phone);
            if let Some(user_id) = user_id {
                request = request.with_user_id(user_id);
            }
            request
                .validate()
                .map_err(|e| CellarError::Validation(e.to_string()))?;

            let outcome = session.sign_up(&request).await;
            println!("{outcome}");
            Ok(outcome.is_success())
        }
        Commands::Write { title, content } => {
            let payload = checked_payload(title, content)?;
            let accepted = board.create_post(&payload).await;
            Ok(report_board(accepted, &board))
        }
        Commands::Edit { id, title, content } => {
            let payload = checked_payload(title, content)?;
            let accepted = board.update_post(id, &payload).await;
            Ok(report_board(accepted, &board))
        }
        Commands::Delete { id } => {
            let accepted = board.delete_post(id).await;
            Ok(report_board(accepted, &board))
        }
        Commands::FindId { name, phone } => {
            let found = session.find_id(&FindIdRequest::new(name, phone)).await?;
            println!("User ID: {}", found.user_id);
            if let Some(email) = found.email {
                println!("Email: {email}");
            }
            if let Some(message) = found.message {
                println!("{message}");
            }
            Ok(true)
        }
    }
}

fn checked_payload(title: String, content: String) -> Result<PostPayload> {
    let payload = PostPayload::new(title, content);
    payload
        .validate()
        .map_err(|e| CellarError::Validation(e.to_string()))?;
    Ok(payload)
}

/// One listing row. Posts written by `me` are starred.
fn post_line(post: &Post, me: Option<&str>) -> String {
    let mark = match me {
        Some(username) if post.is_written_by(username) => '*',
        _ => ' ',
    };
    format!(
        "{mark}#{:<5} {}  by {} ({}, {} views)",
        post.id, post.title, post.author_username, post.created_at, post.views
    )
}

/// Lines a finished board command prints, and its exit status.
#[derive(Debug, PartialEq)]
struct Report {
    stdout: Vec<String>,
    stderr: Vec<String>,
    success: bool,
}

impl Report {
    /// `accepted` is what the server said about the command itself. An
    /// error left behind by the follow-up re-fetch only earns a warning.
    fn new(accepted: bool, message: Option<String>, error: Option<String>) -> Self {
        let stderr = match error {
            Some(error) if accepted => vec![format!("Warning: {error}")],
            Some(error) => vec![error],
            None => Vec::new(),
        };
        Self {
            stdout: message.into_iter().collect(),
            stderr,
            success: accepted,
        }
    }

    fn print(&self) {
        for line in &self.stdout {
            println!("{line}");
        }
        for line in &self.stderr {
            eprintln!("{line}");
        }
    }
}

/// Print the board's message and error. Returns `accepted`.
fn report_board(accepted: bool, board: &BoardStore) -> bool {
    let report = Report::new(accepted, board.message(), board.error());
    report.print();
    report.success
}
