//! Conservatory - terminal dashboard for the enrollment office.
//!
//! With no arguments this opens the dashboard. A handful of one-shot
//! commands cover the office routines that are handy to script:
//!
//! ```text
//! conservatory --login
//! conservatory --tasks [--json]
//! conservatory --generate-contract <template-id> <student-id>
//! conservatory --send-reminders [--dry-run] [--student <id>]...
//! conservatory --record-payment <schedule-id> [YYYY-MM-DD]
//! ```

mod app;
mod ui;

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDate};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use conservatory_core::auth::{CredentialStore, Session};
use conservatory_core::format::format_currency;
use conservatory_core::notify::Notifier;
use conservatory_core::reminders::{ReminderOptions, ReminderOutcome};
use conservatory_core::{Config, Services};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

const LOG_FILE_PREFIX: &str = "conservatory.log";

const USAGE: &str = "Usage:
  conservatory                                   Open the dashboard
  conservatory --login                           Sign in and save the session
  conservatory --tasks [--json]                  Print the open-task list
  conservatory --generate-contract <template> <student>
  conservatory --send-reminders [--dry-run] [--student <id>]...
  conservatory --record-payment <schedule> [YYYY-MM-DD]";

// ============================================================================
// Command line
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Dashboard,
    Help,
    Login,
    Tasks { json: bool },
    GenerateContract { template_id: String, student_id: String },
    SendReminders(ReminderOptions),
    RecordPayment { schedule_id: String, paid_on: Option<NaiveDate> },
}

fn parse_args(args: &[String]) -> Result<Command> {
    let Some(first) = args.first() else {
        return Ok(Command::Dashboard);
    };
    let rest = &args[1..];
    let command = match first.as_str() {
        "-h" | "--help" => Command::Help,
        "--login" => Command::Login,
        "--tasks" => Command::Tasks {
            json: rest.iter().any(|a| a == "--json"),
        },
        "--generate-contract" => match rest {
            [template_id, student_id] => Command::GenerateContract {
                template_id: template_id.clone(),
                student_id: student_id.clone(),
            },
            _ => bail!("--generate-contract takes <template-id> <student-id>"),
        },
        "--send-reminders" => {
            let mut options = ReminderOptions::default();
            let mut iter = rest.iter();
            while let Some(arg) = iter.next() {
                match arg.as_str() {
                    "--dry-run" => options.dry_run = true,
                    "--student" => {
                        let id = iter
                            .next()
                            .ok_or_else(|| anyhow!("--student needs an id"))?;
                        options
                            .student_ids
                            .get_or_insert_with(Vec::new)
                            .push(id.clone());
                    }
                    other => bail!("Unknown option for --send-reminders: {}", other),
                }
            }
            Command::SendReminders(options)
        }
        "--record-payment" => match rest {
            [schedule_id] => Command::RecordPayment {
                schedule_id: schedule_id.clone(),
                paid_on: None,
            },
            [schedule_id, date] => Command::RecordPayment {
                schedule_id: schedule_id.clone(),
                paid_on: Some(
                    NaiveDate::parse_from_str(date, "%Y-%m-%d")
                        .with_context(|| format!("Invalid payment date: {}", date))?,
                ),
            },
            _ => bail!("--record-payment takes <schedule-id> [YYYY-MM-DD]"),
        },
        other => bail!("Unknown command: {}", other),
    };
    Ok(command)
}

// ============================================================================
// Logging
// ============================================================================

fn env_filter() -> EnvFilter {
    // RUST_LOG controls the level (e.g., RUST_LOG=conservatory_core=debug)
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
}

/// CLI commands log to stderr.
fn init_cli_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(env_filter())
        .init();
}

/// The dashboard owns the terminal, so it logs to a daily file in the
/// cache directory instead. The guard must live until exit.
fn init_tui_tracing(log_dir: PathBuf) -> WorkerGuard {
    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(env_filter())
        .init();
    guard
}

// ============================================================================
// Entry point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(e) => {
            eprintln!("Error: {}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };

    match command {
        Command::Dashboard => run_dashboard().await,
        Command::Help => {
            println!("{}", USAGE);
            Ok(())
        }
        other => {
            init_cli_tracing();
            run_command(other).await
        }
    }
}

async fn run_dashboard() -> Result<()> {
    let log_dir = Config::default()
        .cache_dir()
        .unwrap_or_else(|_| PathBuf::from("./cache"));
    let _guard = init_tui_tracing(log_dir);
    info!("Conservatory dashboard starting");

    let mut app = App::new()?;
    app.load_from_cache();

    if !app.is_authenticated() {
        app.start_login();
    } else {
        app.refresh_background();
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(e) = result {
        eprintln!("Error: {}", e);
    }

    info!("Conservatory dashboard shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        terminal.draw(|f| render(f, app))?;

        // Poll with a timeout so background results get drawn
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }
                if handle_input(app, key).await? {
                    return Ok(());
                }
            }
        }

        app.check_background_tasks();

        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}

// ============================================================================
// One-shot commands
// ============================================================================

fn load_config() -> Config {
    match Config::load() {
        Ok(config) => config.with_env(),
        Err(e) => {
            eprintln!("Warning: ignoring unreadable config: {:#}", e);
            Config::default().with_env()
        }
    }
}

/// Services signed in with the saved session.
fn connect() -> Result<Services> {
    let config = load_config();
    let mut session = Session::new(config.cache_dir()?);
    if !session.load()? {
        bail!("No saved session. Run `conservatory --login` first.");
    }
    let token = session.token().map(str::to_string);
    // Failures surface as errors here, so notices are not collected
    let (notifier, _notices) = Notifier::channel();
    Services::connect(config, token, notifier)
}

async fn run_command(command: Command) -> Result<()> {
    match command {
        Command::Login => login().await,
        Command::Tasks { json } => {
            let tasks = connect()?.open_tasks().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&tasks)?);
            } else if tasks.is_empty() {
                println!("Nothing to do.");
            } else {
                for task in &tasks {
                    println!("[{:<6}] {} - {}", task.urgency.label(), task.title, task.detail);
                }
            }
            Ok(())
        }
        Command::GenerateContract {
            template_id,
            student_id,
        } => {
            let generated = connect()?
                .generate_contract(&template_id, &student_id)
                .await?;
            println!(
                "Generated contract {} ({}) - monthly {}, registration {}",
                generated.contract.contract_number,
                generated.contract.season,
                format_currency(generated.contract.monthly_tuition),
                format_currency(generated.contract.registration_fee),
            );
            println!("Document: {}", generated.document.title);
            Ok(())
        }
        Command::SendReminders(options) => {
            let report = connect()?.send_reminders(&options).await?;
            for item in &report.items {
                let outcome = match &item.outcome {
                    ReminderOutcome::Sent { message_id } => format!("sent ({})", message_id),
                    ReminderOutcome::DryRun => "would send".to_string(),
                    ReminderOutcome::Failed { reason } => format!("FAILED: {}", reason),
                };
                println!(
                    "{} {} to {} - {} day(s) overdue: {}",
                    item.due_date,
                    format_currency(item.amount),
                    item.recipient.as_deref().unwrap_or("(no email)"),
                    item.days_overdue,
                    outcome
                );
            }
            println!(
                "{} reminder(s): {} sent, {} failed",
                report.items.len(),
                report.sent(),
                report.failed()
            );
            if report.failed() > 0 {
                bail!("{} reminder(s) failed", report.failed());
            }
            Ok(())
        }
        Command::RecordPayment {
            schedule_id,
            paid_on,
        } => {
            let paid_on = paid_on.unwrap_or_else(|| Local::now().date_naive());
            let schedule = connect()?.record_payment(&schedule_id, paid_on).await?;
            println!(
                "Recorded {} for {} on {}",
                format_currency(schedule.amount),
                schedule.label(),
                paid_on
            );
            Ok(())
        }
        Command::Dashboard | Command::Help => Ok(()),
    }
}

/// Interactive sign-in; offers the keychain password when one is stored.
async fn login() -> Result<()> {
    let mut config = load_config();
    println!("\n=== Conservatory Login ===\n");

    let email = match config.last_email.clone() {
        Some(last) => {
            let input = prompt(&format!("Email [{}]: ", last))?;
            if input.is_empty() {
                last
            } else {
                input
            }
        }
        None => prompt("Email: ")?,
    };
    if email.is_empty() {
        bail!("Email is required");
    }

    let password = match CredentialStore::get_password(&email) {
        Ok(stored) => {
            let answer = prompt("Use stored password? [Y/n]: ")?;
            if answer.eq_ignore_ascii_case("n") {
                rpassword::prompt_password("Password: ")?
            } else {
                stored
            }
        }
        Err(_) => rpassword::prompt_password("Password: ")?,
    };

    println!("\nAuthenticating...");
    let session_data = app::authenticate(&config, &email, &password).await?;

    if let Err(e) = CredentialStore::store(&email, &password) {
        eprintln!("Warning: could not store password in keychain: {}", e);
    }
    config.last_email = Some(email);
    config.save()?;

    let mut session = Session::new(config.cache_dir()?);
    session.update(session_data);
    session.save()?;

    println!("Login successful!\n");
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
