pub mod config;
pub mod db;
pub mod error;
pub mod importer;
pub mod models;
pub mod planner;
pub mod utils;

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;

use config::{AppConfig, ConfigStore};
use db::Store;
use models::Interest;
use planner::window::DayWindow;
use planner::{DayLayout, Filter, Planner, ShareBoost};

#[derive(Parser, Debug)]
#[command(
    name = "fringe-planner",
    version,
    about = "Plans festival days around bookings and friends' interests"
)]
pub struct Cli {
    /// Config file to use instead of the one in the data directory.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Lay out one day as JSON columns.
    Day {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        date: NaiveDate,
        /// `like`, `love`, `booked` or a category name.
        #[arg(long = "hide")]
        hide: Vec<String>,
        #[arg(long)]
        boost: Option<ShareBoost>,
        #[arg(long)]
        no_shared: bool,
        /// Keep events that have already started.
        #[arg(long)]
        past: bool,
    },
    /// Import a tab-separated programme export.
    Import {
        path: PathBuf,
        #[arg(long)]
        year: Option<i32>,
    },
    Venue {
        name: String,
        /// `(lat,long)` as published by the venue list.
        #[arg(long)]
        latlong: Option<String>,
    },
    User {
        email: String,
        #[arg(long)]
        arrive: NaiveDate,
        #[arg(long)]
        depart: NaiveDate,
    },
    /// Set a show-level interest; `none` clears it.
    Interest {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        show: i64,
        #[arg(long)]
        level: String,
    },
    Book {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        performance: i64,
    },
    #[command(name = "sold-out")]
    SoldOut {
        #[arg(long)]
        performance: i64,
    },
    Share {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        with: String,
    },
    Unshare {
        #[arg(long)]
        user: i64,
        #[arg(long)]
        with: String,
    },
    Shares {
        #[arg(long)]
        user: i64,
    },
    Days {
        #[arg(long)]
        user: i64,
    },
    /// Show the stored defaults, updating any that are given.
    Config {
        #[arg(long)]
        timezone: Option<String>,
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        boost: Option<ShareBoost>,
        #[arg(long = "hide")]
        hide: Option<Vec<String>>,
    },
}

#[derive(Serialize)]
struct DayOutput<'a> {
    date: NaiveDate,
    digest: String,
    layout: &'a DayLayout,
}

#[derive(Serialize)]
struct SharesOutput {
    shared_by: Vec<String>,
    shared_with: Vec<String>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("failed to render output")?;
    println!("{text}");
    Ok(())
}

fn open_store(config: &AppConfig) -> Result<Store> {
    let path = config.resolved_database_path();
    Store::open(&path).with_context(|| format!("failed to open database {}", path.display()))
}

fn update_config(
    config_store: &ConfigStore,
    timezone: Option<String>,
    year: Option<i32>,
    boost: Option<ShareBoost>,
    hide: Option<Vec<String>>,
) -> Result<()> {
    if let Some(name) = &timezone {
        name.parse::<chrono_tz::Tz>()
            .map_err(|err| anyhow::anyhow!("unknown timezone {name}: {err}"))?;
    }
    let updated = config_store
        .update(|config| {
            if let Some(name) = timezone {
                config.timezone = name;
            }
            if let Some(year) = year {
                config.festival_year = year;
            }
            if let Some(boost) = boost {
                config.default_boost = boost;
            }
            if let Some(hide) = hide {
                config.hidden = hide;
            }
        })
        .context("failed to save config")?;
    print_json(&updated)
}

pub fn run() -> Result<()> {
    execute(Cli::parse())
}

pub fn execute(cli: Cli) -> Result<()> {
    let config_store = match cli.config {
        Some(path) => ConfigStore::load_from(path),
        None => ConfigStore::load(),
    };
    let config = config_store.read().with_env_overrides();

    match cli.command {
        Commands::Config {
            timezone,
            year,
            boost,
            hide,
        } => update_config(&config_store, timezone, year, boost, hide),
        Commands::Day {
            user,
            date,
            hide,
            boost,
            no_shared,
            past,
        } => {
            let store = open_store(&config)?;
            let hidden = if hide.is_empty() { &config.hidden } else { &hide };
            let mut filter = Filter::from_hidden(hidden);
            filter.show_past = past;
            let boost = boost.unwrap_or(config.default_boost);
            let layout = Planner::new(&store, &store, config.tz()?)
                .at(Utc::now())
                .compute_day_layout(user, date, &filter, boost, !no_shared)
                .with_context(|| format!("failed to plan {date} for user {user}"))?;
            let digest = layout.digest()?;
            print_json(&DayOutput {
                date,
                digest,
                layout: &layout,
            })
        }
        Commands::Import { path, year } => {
            let store = open_store(&config)?;
            let year = year.unwrap_or(config.festival_year);
            let summary = importer::import_file(&store, &path, year, config.tz()?)
                .with_context(|| format!("failed to import {}", path.display()))?;
            println!(
                "imported {} shows, {} performances",
                summary.shows, summary.performances
            );
            Ok(())
        }
        Commands::Venue { name, latlong } => {
            let id = open_store(&config)?.upsert_venue(&name, latlong.as_deref())?;
            println!("{id}");
            Ok(())
        }
        Commands::User {
            email,
            arrive,
            depart,
        } => {
            if depart <= arrive {
                bail!("departure {depart} must come after arrival {arrive}");
            }
            let tz = config.tz()?;
            let start = DayWindow::for_date(arrive, tz)?.start;
            let end = DayWindow::for_date(depart, tz)?.start;
            let id = open_store(&config)?
                .create_user(&email, start.with_timezone(&Utc), end.with_timezone(&Utc))
                .with_context(|| format!("failed to create user {email}"))?;
            println!("{id}");
            Ok(())
        }
        Commands::Interest { user, show, level } => {
            let store = open_store(&config)?;
            match level.trim() {
                "none" => store.remove_interest(user, show)?,
                raw => match Interest::parse(raw) {
                    Some(interest) => store.set_interest(user, show, &interest)?,
                    None => bail!("interest level must not be empty"),
                },
            }
            Ok(())
        }
        Commands::Book { user, performance } => {
            open_store(&config)?
                .mark_booked(user, performance)
                .with_context(|| format!("failed to book performance {performance}"))?;
            Ok(())
        }
        Commands::SoldOut { performance } => {
            open_store(&config)?.mark_sold_out(performance)?;
            Ok(())
        }
        Commands::Share { user, with } => {
            open_store(&config)?.share(user, with.trim())?;
            Ok(())
        }
        Commands::Unshare { user, with } => {
            open_store(&config)?.unshare(user, with.trim())?;
            Ok(())
        }
        Commands::Shares { user } => {
            let (shared_by, shared_with) = open_store(&config)?.share_emails(user)?;
            print_json(&SharesOutput {
                shared_by,
                shared_with,
            })
        }
        Commands::Days { user } => {
            for day in open_store(&config)?.visit_days(user, config.tz()?)? {
                println!("{day}");
            }
            Ok(())
        }
    }
}
