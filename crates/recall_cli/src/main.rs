//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `recall_core` linkage with deterministic output.
//! - Optionally open a note database and print cached entity counts.
//!
//! Usage: `recall_cli [DB_PATH] [CONFIG_JSON]`. Set `RECALL_LOG_DIR` to an
//! absolute directory to enable file logging.

use log::error;
use recall_core::{default_log_level, init_logging, Session, SessionConfig, SqliteRemoteStore};
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    println!("recall_core ping={}", recall_core::ping());
    println!("recall_core version={}", recall_core::core_version());

    if let Ok(log_dir) = std::env::var("RECALL_LOG_DIR") {
        if let Err(err) = init_logging(default_log_level(), &log_dir) {
            eprintln!("recall_cli logging disabled: {err}");
        }
    }

    let mut args = std::env::args().skip(1);
    let Some(db_path) = args.next() else {
        return ExitCode::SUCCESS;
    };

    match summarize(&db_path, args.next()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_summary module=cli status=error error={message}");
            eprintln!("recall_cli error: {message}");
            ExitCode::FAILURE
        }
    }
}

async fn summarize(db_path: &str, config_path: Option<String>) -> Result<(), String> {
    let config = match config_path {
        Some(path) => SessionConfig::load(&path).map_err(|err| err.to_string())?,
        None => SessionConfig::default(),
    };
    let remote = SqliteRemoteStore::open(db_path).map_err(|err| err.to_string())?;
    let session = Session::new(Arc::new(remote), config);
    session.refresh_all().await.map_err(|err| err.to_string())?;

    let store = session.store();
    println!("notes={}", store.notes().len());
    println!("tags={}", store.tags().len());
    println!("folders={}", store.folders().len());
    Ok(())
}
