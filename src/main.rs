use std::io::BufRead;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use secrecy::SecretString;
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use skyfare::api::{BookingRequest, NewFlight};
use skyfare::bulk::{FirstFetch, JobPoller, JobSnapshot, PollOutcome};
use skyfare::config::TokenStoreKind;
use skyfare::storage::{KeychainTokenStore, MemoryTokenStore, TokenStore};
use skyfare::{ApiClient, AppError, ClientConfig, Session};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
/// Command-line client for the flight search and booking API
struct Cli {
    /// Base URL of the API (overrides SKYFARE_API_URL)
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,

    /// Keep the session token in memory only
    #[arg(long, global = true)]
    no_keychain: bool,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    json_errors: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Search flights between two airports on a date
    Search {
        #[arg(long)]
        source: String,
        #[arg(long)]
        destination: String,
        /// Travel date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
    },
    /// List known airport codes
    Airports,
    /// Book seats on a flight
    Book {
        #[arg(long, value_name = "FLIGHT_ID")]
        flight: Uuid,
        #[arg(long, default_value = "1")]
        seats: u32,
        /// Book on behalf of another user (admin)
        #[arg(long, value_name = "USER_ID")]
        user: Option<Uuid>,
    },
    /// List your bookings
    Bookings,
    /// Cancel a confirmed booking
    Cancel {
        #[arg(value_name = "BOOKING_ID")]
        id: Uuid,
    },
    /// Create an account
    Register {
        #[arg(long)]
        username: String,
        /// Read from stdin when omitted
        #[arg(long, env = "SKYFARE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Log in and store the session token
    Login {
        #[arg(long)]
        username: String,
        /// Read from stdin when omitted
        #[arg(long, env = "SKYFARE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// Forget the stored session token
    Logout,
    /// Create a flight (admin)
    CreateFlight(FlightArgs),
    /// Show a flight (admin)
    GetFlight {
        #[arg(value_name = "FLIGHT_ID")]
        id: Uuid,
    },
    /// Replace a flight's details (admin)
    UpdateFlight {
        #[arg(value_name = "FLIGHT_ID")]
        id: Uuid,
        #[command(flatten)]
        flight: FlightArgs,
    },
    /// Delete a flight (admin)
    DeleteFlight {
        #[arg(value_name = "FLIGHT_ID")]
        id: Uuid,
    },
    /// Upload a CSV of flights for background processing (admin)
    BulkUpload {
        #[arg(value_name = "CSV_FILE")]
        file: Option<PathBuf>,
        /// Poll the job until it finishes
        #[arg(long)]
        wait: bool,
        #[command(flatten)]
        poll: PollArgs,
    },
    /// Show the status of a bulk upload job (admin)
    BulkStatus {
        #[arg(value_name = "JOB_ID")]
        job_id: String,
        /// Poll the job until it finishes
        #[arg(long)]
        wait: bool,
        #[command(flatten)]
        poll: PollArgs,
    },
}

#[derive(Args)]
struct FlightArgs {
    #[arg(long)]
    flight_number: String,
    #[arg(long)]
    source: String,
    #[arg(long)]
    destination: String,
    /// Departure time (YYYY-MM-DDTHH:MM:SS)
    #[arg(long)]
    departure: NaiveDateTime,
    /// Arrival time (YYYY-MM-DDTHH:MM:SS)
    #[arg(long)]
    arrival: NaiveDateTime,
    #[arg(long)]
    total_seats: u32,
    #[arg(long)]
    price: f64,
}

impl From<FlightArgs> for NewFlight {
    fn from(args: FlightArgs) -> Self {
        NewFlight {
            flight_number: args.flight_number,
            source: args.source,
            destination: args.destination,
            departure_ts: args.departure,
            arrival_ts: args.arrival,
            total_seats: args.total_seats,
            price: args.price,
        }
    }
}

#[derive(Args)]
struct PollArgs {
    /// Seconds between status fetches (overrides SKYFARE_POLL_INTERVAL_SECS)
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,
    /// Wait one interval before the first fetch
    #[arg(long)]
    delayed_start: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skyfare=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let json_errors = cli.json_errors;
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", render_error(&e, json_errors));
            ExitCode::FAILURE
        }
    }
}

/// Formats an error for the terminal, never exposing raw internals.
fn render_error(error: &AppError, json: bool) -> String {
    if json {
        if let Ok(text) = serde_json::to_string(error) {
            return text;
        }
    }

    let presentation = error.to_presentation();
    match presentation.action {
        Some(action) => format!(
            "{}: {}\n  {}",
            presentation.title, presentation.message, action
        ),
        None => format!("{}: {}", presentation.title, presentation.message),
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &cli.api_url {
        config.base_url = skyfare::config::parse_base_url(url)?;
    }
    if cli.no_keychain {
        config.token_store = TokenStoreKind::Memory;
    }

    let store: Arc<dyn TokenStore> = match config.token_store {
        TokenStoreKind::Keychain => Arc::new(KeychainTokenStore::new()),
        TokenStoreKind::Memory => Arc::new(MemoryTokenStore::new()),
    };
    let session = Session::restore(store).await?;
    let client = ApiClient::new(&config, session)?;

    match cli.command {
        Command::Search {
            source,
            destination,
            date,
        } => print_json(&client.search_flights(&source, &destination, date).await?),
        Command::Airports => {
            for airport in client.list_airports().await? {
                println!("{}", airport);
            }
            Ok(())
        }
        Command::Book {
            flight,
            seats,
            user,
        } => {
            let request = BookingRequest {
                flight_id: flight,
                seats,
                user_id: user,
            };
            print_json(&client.create_booking(&request).await?)
        }
        Command::Bookings => print_json(&client.my_bookings().await?),
        Command::Cancel { id } => print_json(&client.cancel_booking(id).await?),
        Command::Register { username, password } => {
            let password = password_or_stdin(password)?;
            let user = client.register(&username, &password).await?;
            println!("Registered {} ({})", user.username, user.id);
            Ok(())
        }
        Command::Login { username, password } => {
            let password = password_or_stdin(password)?;
            client.login(&username, &password).await?;
            println!("Logged in as {}", username);
            Ok(())
        }
        Command::Logout => {
            client.logout().await?;
            println!("Logged out");
            Ok(())
        }
        Command::CreateFlight(args) => {
            let flight = NewFlight::from(args);
            print_json(&client.create_flight(&flight).await?)
        }
        Command::GetFlight { id } => print_json(&client.get_flight(id).await?),
        Command::UpdateFlight { id, flight } => {
            let flight = NewFlight::from(flight);
            print_json(&client.update_flight(id, &flight).await?)
        }
        Command::DeleteFlight { id } => print_json(&client.delete_flight(id).await?),
        Command::BulkUpload { file, wait, poll } => {
            let accepted = client.submit_bulk_upload(file.as_deref()).await?;
            println!("Job {} accepted ({})", accepted.job_id, accepted.status);
            if let Some(message) = &accepted.message {
                println!("{}", message);
            }
            if wait {
                watch_job(client, &config, &accepted.job_id, &poll).await?;
            }
            Ok(())
        }
        Command::BulkStatus { job_id, wait, poll } => {
            if wait {
                watch_job(client, &config, &job_id, &poll).await
            } else {
                print_snapshot(&client.bulk_upload_status(&job_id).await?);
                Ok(())
            }
        }
    }
}

/// Polls a job to completion, printing each snapshot. Ctrl-C stops polling.
async fn watch_job(
    client: ApiClient,
    config: &ClientConfig,
    job_id: &str,
    args: &PollArgs,
) -> Result<(), AppError> {
    let mut poll_config = config.clone();
    if let Some(secs) = args.interval {
        poll_config.poll_interval = Duration::from_secs(secs);
    }
    if args.delayed_start {
        poll_config.first_fetch = FirstFetch::AfterInterval;
    }

    let mut handle = JobPoller::from_config(client, &poll_config).spawn(job_id);
    let cancel = handle.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    while let Some(snapshot) = handle.next().await {
        print_snapshot(&snapshot);
    }

    match handle.join().await? {
        PollOutcome::Finished { snapshot, fetches } => {
            println!("Finished {} after {} status checks", snapshot.status, fetches);
            for error in &snapshot.errors {
                println!("  {}", error);
            }
            Ok(())
        }
        PollOutcome::Cancelled { .. } => Err(AppError::Cancelled),
    }
}

fn print_snapshot(snapshot: &JobSnapshot) {
    println!(
        "{:<12} created={} updated={} failed={}",
        snapshot.status.as_str(),
        snapshot.created,
        snapshot.updated,
        snapshot.failed
    );
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::Internal(format!("Failed to format output: {}", e)))?;
    println!("{}", text);
    Ok(())
}

fn password_or_stdin(password: Option<String>) -> Result<SecretString, AppError> {
    if let Some(password) = password {
        return Ok(SecretString::from(password));
    }

    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| AppError::Validation(format!("Failed to read password: {}", e)))?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err(AppError::Validation("Password must not be empty.".into()));
    }
    Ok(SecretString::from(password))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_errors_carry_presentation_fields() {
        let text = render_error(&AppError::DuplicateUsername, true);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["title"], "Registration Failed");
        assert_eq!(value["message"], "Username already registered.");
        assert_eq!(value["action"], "Choose a different username");
    }

    #[test]
    fn plain_errors_show_title_message_and_action() {
        let text = render_error(&AppError::Cancelled, false);
        assert_eq!(text, "Cancelled: The operation was cancelled.");

        let text = render_error(&AppError::NotAuthenticated, false);
        assert!(text.starts_with("Not Logged In: You need to log in to continue."));
        assert!(text.contains("skyfare login"));
    }

    #[test]
    fn json_errors_hide_secrets() {
        let error = AppError::Validation("Authorization: Bearer abc123".into());
        let text = render_error(&error, true);
        assert!(!text.contains("abc123"));
    }
}
