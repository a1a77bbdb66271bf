//! Interactive scanning station on stdin.
//!
//! Every line is a barcode to scan unless it starts with `-` (unscan),
//! `!` (return) or `:` (a station command).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::NaiveDate;
use dispatch_client::{
    ActionReport, ConfirmGate, DispatchApi, ExportBook, Session, SingleFlight, default_file_name,
};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::warn;

use crate::display;

type StdinLines = Arc<Mutex<Lines<BufReader<Stdin>>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationCommand {
    Empty,
    Scan(String),
    Unscan(String),
    Return(String),
    Reload,
    Status,
    Export(Option<PathBuf>),
    Finalize(NaiveDate),
    Quit,
    Invalid(String),
}

impl StationCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return StationCommand::Empty;
        }
        if let Some(barcode) = line.strip_prefix('-') {
            return StationCommand::Unscan(barcode.trim().to_string());
        }
        if let Some(barcode) = line.strip_prefix('!') {
            return StationCommand::Return(barcode.trim().to_string());
        }
        let Some(command) = line.strip_prefix(':') else {
            return StationCommand::Scan(line.to_string());
        };

        let mut parts = command.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("reload"), None) => StationCommand::Reload,
            (Some("status"), None) => StationCommand::Status,
            (Some("export"), path) => StationCommand::Export(path.map(PathBuf::from)),
            (Some("finalize"), Some(date)) => match parse_date(date) {
                Ok(date) => StationCommand::Finalize(date),
                Err(e) => StationCommand::Invalid(e),
            },
            (Some("finalize"), None) => {
                StationCommand::Invalid("usage: :finalize <YYYY-MM-DD>".to_string())
            }
            (Some("quit" | "q"), None) => StationCommand::Quit,
            _ => StationCommand::Invalid(format!("unknown command: {line}")),
        }
    }
}

/// `YYYY-MM-DD`, as the finalize procedure expects it.
pub fn parse_date(s: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .map_err(|e| format!("invalid date {s:?} (expected YYYY-MM-DD): {e}"))
}

/// Asks on stdout and reads the answer from the station's own stdin.
struct StdinConfirm {
    lines: StdinLines,
}

#[async_trait]
impl ConfirmGate for StdinConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        let mut stdout = tokio::io::stdout();
        let _ = stdout.write_all(format!("{prompt} [y/N] ").as_bytes()).await;
        let _ = stdout.flush().await;
        match self.lines.lock().await.next_line().await {
            Ok(Some(answer)) => is_yes(&answer),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "could not read confirmation");
                false
            }
        }
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub async fn run<A: DispatchApi>(api: A, dispatch_id: &str) -> anyhow::Result<()> {
    let mut session = Session::open(api, dispatch_id)
        .await
        .with_context(|| format!("opening dispatch {dispatch_id}"))?;
    display::print_status(session.dispatch_id(), session.meta(), session.mirror());
    display::print_session(session.mirror());

    let lines: StdinLines = Arc::new(Mutex::new(BufReader::new(tokio::io::stdin()).lines()));
    let gate = SingleFlight::new(StdinConfirm {
        lines: lines.clone(),
    });
    let mut input = String::new();

    loop {
        let next = lines.lock().await.next_line().await?;
        let Some(line) = next else {
            break;
        };

        match StationCommand::parse(&line) {
            StationCommand::Empty => {}
            StationCommand::Scan(barcode) => {
                input = barcode;
                let report = session.submit_scan(&mut input).await?;
                show(&session, &report);
            }
            StationCommand::Unscan(barcode) => {
                input = barcode;
                let report = session.submit_unscan(&mut input, &gate).await?;
                show(&session, &report);
            }
            StationCommand::Return(barcode) => {
                input = barcode;
                let report = session.submit_return(&mut input).await?;
                show(&session, &report);
            }
            StationCommand::Reload => {
                if let Err(e) = session.refresh_meta().await {
                    eprintln!("  status refresh failed: {e}");
                }
                match session.reload().await {
                    Ok(report) => println!("  reloaded {} rows", report.rows),
                    Err(e) => eprintln!("  reload failed: {e}"),
                }
                display::print_session(session.mirror());
            }
            StationCommand::Status => {
                display::print_status(session.dispatch_id(), session.meta(), session.mirror());
            }
            StationCommand::Export(path) => {
                let path = path.unwrap_or_else(|| {
                    PathBuf::from(default_file_name(
                        session.dispatch_id(),
                        chrono::Local::now().date_naive(),
                    ))
                });
                match ExportBook::from_mirror(session.mirror()).write_xlsx(&path) {
                    Ok(()) => println!("  exported to {}", path.display()),
                    Err(e) => eprintln!("  export failed: {e}"),
                }
            }
            StationCommand::Finalize(date) => {
                match session.finalize(&date.format("%Y-%m-%d").to_string()).await {
                    Ok(resp) => println!("  {}", resp.msg),
                    Err(e) => eprintln!("  finalize failed: {e}"),
                }
                display::print_status(session.dispatch_id(), session.meta(), session.mirror());
            }
            StationCommand::Quit => break,
            StationCommand::Invalid(message) => eprintln!("  {message}"),
        }
    }
    Ok(())
}

fn show<A: DispatchApi>(session: &Session<A>, report: &ActionReport) {
    let feedback = report.feedback();
    if !feedback.is_empty() {
        println!("{feedback}");
    }
    match &report.reload {
        Some(Err(e)) => eprintln!("  reload failed, showing unconfirmed state: {e}"),
        Some(Ok(reload)) if reload.stale => {
            eprintln!("  an older reload replaced newer data; run :reload")
        }
        _ => {}
    }
    display::print_session(session.mirror());
}
