//!
//! membership-admin binary
//! -----------------------
//! Offline maintenance against a store directory: the integrity audit and the expiry
//! reminder run. Both read `MEMBERSHIP_*` configuration like the server does.

use std::env;
use std::fs;
use std::io::{self, Write};

use anyhow::{anyhow, Context, Result};
use tracing_subscriber::{fmt, EnvFilter};

use membership::config::Config;
use membership::store::Store;
use membership::system_paths::integrity_report_file;
use membership::{expiry, integrity, server};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} integrity [--output <file>] [--root <db_root>]\n  {program} expiry-reminders [--root <db_root>]\n\nCommands:\n  integrity          run every integrity check; the report goes to stdout, or to <file>\n                     when --output is given, and the run summary is stored\n  expiry-reminders   email administrators about users expiring in 4 to 32 days\n\nFlags:\n  --root <path>      store directory (default: MEMBERSHIP_DB_FOLDER or membership_db)\n  --output <file>    integrity report path; use '-' for the default under .system/integrity\n  -h, --help         show this help"
    );
}

struct Args {
    command: String,
    root: Option<String>,
    output: Option<String>,
}

fn parse_args(mut argv: impl Iterator<Item = String>) -> Result<Option<Args>> {
    let mut command = None;
    let mut root = None;
    let mut output = None;
    while let Some(arg) = argv.next() {
        match arg.as_str() {
            "-h" | "--help" => return Ok(None),
            "--root" => root = Some(argv.next().ok_or_else(|| anyhow!("--root needs a path"))?),
            "--output" => output = Some(argv.next().ok_or_else(|| anyhow!("--output needs a path"))?),
            other if command.is_none() && !other.starts_with('-') => command = Some(other.to_string()),
            other => return Err(anyhow!("unexpected argument '{}'", other)),
        }
    }
    Ok(command.map(|command| Args { command, root, output }))
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("warn"))?;
    fmt().with_env_filter(filter).with_writer(io::stderr).init();

    let mut argv = env::args();
    let program = argv.next().unwrap_or_else(|| "membership-admin".to_string());
    let Some(args) = parse_args(argv)? else {
        print_usage(&program);
        return Ok(());
    };
    let mut config = Config::from_env()?;
    if let Some(root) = args.root {
        config.db_root = root.into();
    }
    let store = Store::open(&config.db_root).with_context(|| format!("opening store under {:?}", config.db_root))?;

    match args.command.as_str() {
        "integrity" => {
            let run = match args.output.as_deref() {
                None => integrity::run_all(&store, &mut io::stdout().lock())?,
                Some(path) => {
                    let next_id = store.read(|t| t.integrity_runs.len_all() as u64 + 1);
                    let path = match path {
                        "-" => integrity_report_file(&config.db_root, next_id),
                        p => p.into(),
                    };
                    if let Some(parent) = path.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    let mut file = io::BufWriter::new(fs::File::create(&path).with_context(|| format!("creating {:?}", path))?);
                    let run = integrity::run_all(&store, &mut file)?;
                    file.flush()?;
                    eprintln!("report written to {}", path.display());
                    run
                }
            };
            eprintln!("run {}: {} records inspected, {} errors", run.id, run.records_inspected, run.errors_found);
            if run.errors_found > 0 {
                std::process::exit(1);
            }
        }
        "expiry-reminders" => {
            let collaborators = server::collaborators_for(&config)?;
            let today = chrono::Utc::now().date_naive();
            let summary = expiry::send_reminders(&store, collaborators.notifier.as_ref(), today).await;
            println!(
                "{} users expiring, {} reminders sent, {} failed",
                summary.expiring_users, summary.sent, summary.failed
            );
        }
        other => {
            print_usage(&program);
            return Err(anyhow!("unknown command '{}'", other));
        }
    }
    Ok(())
}
