//! Run one election lifecycle tick by hand, e.g. to catch up on an hour the
//! trigger missed. Uses the same configuration as the server.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Arg, ArgAction, ArgMatches, Command};
use rocket::serde::json::serde_json;

use eboto_lifecycle::{
    config::{connect_database, document_store, http_client, mailer, Config, SetupError},
    error::Result as LifecycleResult,
    lifecycle::{decision::Transition, LifecycleEngine, TickReport},
    model::db::Election,
    store::MongoStore,
};

const PROGRAM_NAME: &str = "process-tick";

const ABOUT_TEXT: &str = "Run one election lifecycle tick against the configured database.

EXIT CODES:
     0: Every due election was processed (or, with --dry-run, planned).
     2: The tick ran, but some elections failed.
 Other: Error.";

const AT: &str = "at";
const DRY_RUN: &str = "dry-run";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(AT)
                .long(AT)
                .help("Process the tick as if it were this RFC 3339 instant [default: now]")
                .value_parser(parse_instant)
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new(DRY_RUN)
                .long(DRY_RUN)
                .help("Print what the tick would do without doing it")
                .action(ArgAction::SetTrue),
        )
}

fn parse_instant(value: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(value)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 instant: {e}"))
}

/// Build the engine from `Rocket.toml` and `ROCKET_*` environment variables.
async fn engine() -> Result<LifecycleEngine, SetupError> {
    let figment = rocket::Config::figment();
    let config: Config = figment.extract()?;
    let (_, db) = connect_database(&figment).await?;
    let client = http_client(&config)?;
    Ok(LifecycleEngine::new(
        Arc::new(MongoStore::new(&db)),
        Arc::new(mailer(&figment, client.clone())?),
        Arc::new(document_store(&figment, client)?),
        config.clock(),
        config.dispatch_settings(),
    ))
}

/// Run the tick, report the outcome, and return the exit code.
async fn run(args: &ArgMatches) -> u8 {
    let now = args.get_one::<DateTime<Utc>>(AT).copied().unwrap_or_else(Utc::now);
    let engine = match engine().await {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Setup failed: {e}");
            return 1;
        }
    };

    if args.get_flag(DRY_RUN) {
        return match engine.plan_tick(now).await {
            Ok(plans) => print_plans(&plans),
            Err(e) => {
                eprintln!("Planning failed: {e}");
                1
            }
        };
    }

    match engine.process_tick(now).await {
        Ok(report) => {
            match serde_json::to_string_pretty(&report) {
                Ok(json) => println!("{json}"),
                Err(_) => println!("{report:?}"),
            }
            report_exit_code(&report)
        }
        Err(e) => {
            eprintln!("Tick failed: {e}");
            1
        }
    }
}

fn report_exit_code(report: &TickReport) -> u8 {
    if report.failures.is_empty() {
        0
    } else {
        2
    }
}

/// Print one line per planned election. An election that could not be
/// planned fails the dry run the way it would fail the tick.
fn print_plans(plans: &[(Election, LifecycleResult<Transition>)]) -> u8 {
    let mut exit_code = 0;
    for (election, transition) in plans {
        let label = format!("{} {} ({})", election.id, election.slug, election.name);
        match transition {
            Ok(transition) => println!("{label}: {transition:?}"),
            Err(e) => {
                println!("{label}: {e}");
                exit_code = 2;
            }
        }
    }
    exit_code
}

#[rocket::main]
async fn main() {
    if let Err(e) = log4rs::init_file("log4rs.yaml", log4rs_dynamic_filters::default_deserializers()) {
        eprintln!("Logging disabled: {e}");
    }
    let args = cli().get_matches();
    let exit_code = run(&args).await;
    std::process::exit(exit_code.into())
}
