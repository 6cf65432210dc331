use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::process::ExitCode;

use survey_stats::analytics::{self, ClickAnalytics};
use survey_stats::report::{self, MESSAGE_LIMIT};
use survey_stats::{samples, Config, Database, EventStore, Result};

#[derive(Parser)]
#[command(name = "survey-stats", about = "Survey bot analytics and reports")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store the built-in sample polls
    Seed,
    /// Answer distribution report for one poll
    PollReport { poll_id: String },
    /// Click analytics, optionally limited to one poll
    ClickReport {
        #[arg(long)]
        poll: Option<String>,
        /// Include bars, the daily timeline and the funnel
        #[arg(long)]
        full: bool,
    },
    /// Engagement card for one user
    Engagement { user_id: i64 },
    /// Stress level from a user's answers to a poll
    Stress { poll_id: String, user_id: i64 },
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let database = match Database::new(&config).await {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to initialize database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(cli.command, &config, &database).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: &Config, database: &Database) -> Result<()> {
    match command {
        Command::Seed => {
            let created = samples::seed(database).await?;
            info!("Seeded {} sample poll(s)", created);
        }
        Command::PollReport { poll_id } => {
            warn!("ADMIN - poll_report - poll_id={}", poll_id);
            let poll = database.require_poll(&poll_id).await?;
            let analysis = analytics::analyze_poll(database, &poll.id).await?;
            emit(&format!("{}\n\n{}", poll.title, report::format_poll_report(&analysis)));
        }
        Command::ClickReport { poll, full } => {
            warn!("ADMIN - click_report - poll_id={:?}", poll);
            let clicks = ClickAnalytics::new(database).with_timeline_days(config.timeline_days);
            let stats = clicks.click_statistics(poll.as_deref()).await?;

            let text = if full {
                let funnel = match poll.as_deref() {
                    Some(poll_id) => Some(clicks.click_funnel(poll_id).await?),
                    None => None,
                };
                report::format_full_click_report(&stats, funnel.as_deref())
            } else {
                report::format_click_report(&stats)
            };
            emit(&text);
        }
        Command::Engagement { user_id } => {
            let engagement = ClickAnalytics::new(database).user_engagement(user_id).await?;
            emit(&report::format_engagement(&engagement));
        }
        Command::Stress { poll_id, user_id } => {
            let responses = database.get_responses(&poll_id).await?;
            let mut found = false;
            for response in responses.iter().filter(|r| r.user_id == user_id) {
                found = true;
                let assessment = analytics::assess_stress(response.answers.values().map(String::as_str));
                emit(&report::format_stress(&assessment));
            }
            if !found {
                warn!("User {} has no responses for poll {}", user_id, poll_id);
                emit(&report::format_stress(&analytics::StressAssessment::NoData));
            }
        }
    }

    Ok(())
}

fn emit(text: &str) {
    for chunk in report::split_message(text, MESSAGE_LIMIT) {
        println!("{}", chunk);
    }
}
