use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use shleepy::{
    AppConfig, BackendClient, Clock, FriendRequestOutcome, LeaderboardEntry, SessionStore, Shleepy,
    SignUpForm, SleepEntry, SystemClock, duration::split_hours, export::export_sleep_csv,
    models::ProfileUpdate,
};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(name = "shleepy")]
#[command(about = "Log your sleep, track your streak, compare with friends")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        username: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign in and remember the session
    Login {
        #[arg(long)]
        email: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Sign out and forget the session
    Logout,
    /// Log a night of sleep
    Log {
        /// Hours slept
        #[arg(long, conflicts_with_all = ["bed", "wake"])]
        hours: Option<f64>,
        /// Bed time, HH:MM
        #[arg(long, requires = "wake")]
        bed: Option<NaiveTime>,
        /// Wake time, HH:MM
        #[arg(long, requires = "bed")]
        wake: Option<NaiveTime>,
        /// Night to log, YYYY-MM-DD (defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Show how long you slept last night
    Today,
    /// Week in review for you or a friend
    Week {
        /// Friend's user id
        #[arg(long)]
        friend: Option<String>,
    },
    /// Statistics page: trend and hour distribution
    Stats,
    /// Friends as sheep in the night sky
    Sky,
    /// Friends ranked by today's sleep
    Leaderboard,
    /// Incoming friend requests
    Requests,
    /// People you might know
    Suggest,
    /// Send a friend request
    Add { username: String },
    /// Accept a friend request
    Accept { id: i64 },
    /// Deny a friend request
    Deny { id: i64 },
    /// Show or edit your profile
    Profile {
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        username: Option<String>,
    },
    /// Export your sleep history to CSV
    Export {
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::level_filters::LevelFilter::INFO.into())
        .parse_lossy("shleepy=debug");

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = AppConfig::load().context("Failed to load configuration")?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    rt.block_on(run(args.command, config))
}

fn read_password(password: Option<String>) -> Result<String> {
    if let Some(password) = password {
        return Ok(password);
    }
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

async fn run(command: Command, config: AppConfig) -> Result<()> {
    let client = BackendClient::new(
        config.backend.url.clone(),
        config.backend.anon_key.clone(),
        &config.network,
    )?;
    let store = SessionStore::new(config.session_path());
    let clock = Arc::new(SystemClock);
    let app = Shleepy::new(client, config.stats.clone(), clock.clone());

    match command {
        Command::Signup {
            email,
            name,
            username,
            password,
        } => {
            let form = SignUpForm {
                email,
                password: read_password(password)?,
                display_name: name,
                username,
            };
            app.sign_up(&form).await?;
            println!("Account created successfully! Please log in.");
        }
        Command::Login { email, password } => {
            let password = read_password(password)?;
            let session = app.client().sign_in(&email, &password).await?;
            store.save(&session)?;
            println!("Logged in successfully!");
        }
        Command::Logout => {
            if let Some(session) = store.load()? {
                if let Err(e) = app.client().sign_out(&session).await {
                    tracing::warn!("Backend sign-out failed: {}", e);
                }
            }
            store.clear()?;
            println!("Sign out successful.");
        }
        Command::Log {
            hours,
            bed,
            wake,
            date,
        } => {
            let entry = match (hours, bed, wake) {
                (Some(hours), _, _) => SleepEntry::Hours(hours),
                (None, Some(bed), Some(wake)) => SleepEntry::Times { bed, wake },
                _ => anyhow::bail!("Pass either --hours or both --bed and --wake"),
            };
            let session = store.require(clock.as_ref())?;
            let stored = app.log_sleep(&session, entry, date).await?;
            let (h, m) = split_hours(stored.hours_slept);
            println!("Logged {} hours {} mins for {}", h, m, stored.sleep_date);
        }
        Command::Today => {
            let session = store.require(clock.as_ref())?;
            let hours = app
                .today(&session)
                .await?
                .map(|r| r.hours_slept)
                .unwrap_or(0.0);
            let (h, m) = split_hours(hours);
            println!("{}", clock.now_local().format("%A, %B %-d, %Y"));
            println!("{} hours {} mins slept overnight", h, m);
        }
        Command::Week { friend } => {
            let session = store.require(clock.as_ref())?;
            let user_id = friend.as_deref().unwrap_or(&session.user_id);
            let summary = app.week_in_review(&session, user_id).await?;
            println!("Week in Review");
            println!("{}", summary);
        }
        Command::Stats => {
            let session = store.require(clock.as_ref())?;
            let page = app.stats_page(&session).await?;
            if page.records.is_empty() {
                println!("No sleep logs found. Start logging your sleep!");
                return Ok(());
            }
            println!("Sleep at a Glance");
            for record in &page.trend {
                println!(
                    "  {}  {:>5.1}h  {}",
                    record.sleep_date.format("%m/%d"),
                    record.hours_slept,
                    hour_bar(record.hours_slept)
                );
            }
            println!("Sleep Hour Distribution");
            for (hour, count) in page.distribution.iter().enumerate() {
                println!("  {}h  {:>3}  {}", hour, count, "#".repeat(*count));
            }
            println!("{}", page.summary);
        }
        Command::Sky => {
            let session = store.require(clock.as_ref())?;
            let entries = app.leaderboard(&session).await?;
            print!("{}", render_sky(&entries));
        }
        Command::Leaderboard => {
            let session = store.require(clock.as_ref())?;
            let entries = app.leaderboard(&session).await?;
            if entries.is_empty() {
                println!("No friends found for the leaderboard.");
            }
            for (rank, entry) in entries.iter().enumerate() {
                println!(
                    "{:>3}  {:<24} {}",
                    rank + 1,
                    entry.display_name,
                    format_hours(entry.hours_today)
                );
            }
        }
        Command::Requests => {
            let session = store.require(clock.as_ref())?;
            let requests = app.friend_requests(&session).await?;
            if requests.is_empty() {
                println!("No pending friend requests.");
            }
            for request in requests {
                let (name, username) = request
                    .requester
                    .map(|r| (r.display_name, r.username))
                    .unwrap_or((None, None));
                println!(
                    "{:>6}  {} (@{})",
                    request.id,
                    name.unwrap_or_else(|| "Unknown User".to_string()),
                    username.unwrap_or_else(|| "unknown".to_string())
                );
            }
        }
        Command::Suggest => {
            let session = store.require(clock.as_ref())?;
            for profile in app.suggestions(&session).await? {
                println!(
                    "{} (@{})",
                    profile.label(),
                    profile.username.as_deref().unwrap_or("unknown")
                );
            }
        }
        Command::Add { username } => {
            let session = store.require(clock.as_ref())?;
            match app.send_friend_request(&session, &username).await? {
                FriendRequestOutcome::Sent => println!("Friend request sent!"),
                FriendRequestOutcome::Updated => println!("Friend request updated!"),
            }
        }
        Command::Accept { id } => {
            let session = store.require(clock.as_ref())?;
            app.accept_request(&session, id).await?;
            println!("Friend request accepted!");
        }
        Command::Deny { id } => {
            let session = store.require(clock.as_ref())?;
            app.deny_request(&session, id).await?;
            println!("Friend request denied.");
        }
        Command::Profile {
            display_name,
            username,
        } => {
            let session = store.require(clock.as_ref())?;
            let update = ProfileUpdate {
                display_name,
                username,
            };
            if !update.is_empty() {
                app.edit_profile(&session, &update).await?;
                println!("Your profile has been updated!");
            }
            let profile = app.profile(&session).await?;
            let week = app.week_in_review(&session, &session.user_id).await?;
            println!(
                "Hello, {}!",
                profile
                    .as_ref()
                    .and_then(|p| p.display_name.clone())
                    .unwrap_or_else(|| "Unknown User".to_string())
            );
            println!(
                "@{}",
                profile
                    .and_then(|p| p.username)
                    .unwrap_or_else(|| "unknown".to_string())
            );
            println!("Week in Review: {}", week);
        }
        Command::Export { dir } => {
            let session = store.require(clock.as_ref())?;
            let records = app.history(&session).await?;
            let path = export_sleep_csv(&records, &dir, clock.as_ref())?;
            println!("Exported {} logs to {}", records.len(), path.display());
        }
    }

    Ok(())
}

/// One `#` per hour, capped at a full day.
fn hour_bar(hours: f64) -> String {
    "#".repeat(hours.clamp(0.0, 24.0).round() as usize)
}

fn format_hours(hours: Option<f64>) -> String {
    match hours {
        Some(hours) => format!("{} hours slept", hours),
        None => "No data today".to_string(),
    }
}

/// Ten bands of sky with the ground below. Friends who slept longer float higher.
fn render_sky(entries: &[LeaderboardEntry]) -> String {
    const ROWS: usize = 10;
    if entries.is_empty() {
        return "No friends in the sky yet. Add some with `shleepy add <username>`.\n".to_string();
    }
    let mut out = String::new();
    for row in 0..=ROWS {
        let sheep: Vec<String> = entries
            .iter()
            .filter(|e| (e.sky_depth() * ROWS as f64).round() as usize == row)
            .map(|e| format!("(o) {} - {}", e.display_name, format_hours(e.hours_today)))
            .collect();
        let edge = if row == ROWS { "_" } else { " " };
        out.push_str(&format!("{}| {}\n", edge, sheep.join("   ")));
    }
    out
}
