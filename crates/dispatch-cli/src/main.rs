mod display;
mod station;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use dispatch_client::{ExportBook, RelayClient, Session, default_file_name};
use dispatch_relay::RelayConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "dispatch", author, version, about = "Dispatch scanning relay and station")]
struct Cli {
    /// Relay base URL used by the client commands.
    #[arg(
        long,
        env = "RELAY_URL",
        default_value = "http://127.0.0.1:8787",
        global = true
    )]
    relay_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the relay in front of the backend procedures.
    Serve {
        #[arg(long, env = "RELAY_BIND", default_value = "0.0.0.0:8787")]
        bind: SocketAddr,
        #[arg(long, env = "SUPABASE_URL")]
        remote_url: String,
        #[arg(long, env = "SUPABASE_SERVICE_ROLE_KEY", hide_env_values = true)]
        service_key: String,
        /// Fixed allowed origin; otherwise the request origin, or `*`.
        #[arg(long, env = "CORS_ORIGIN")]
        cors_origin: Option<String>,
    },
    /// Scan interactively from stdin.
    Station {
        #[arg(long)]
        dispatch: String,
    },
    /// Print SKU counts for a dispatch.
    List {
        #[arg(long)]
        dispatch: String,
    },
    /// Write the dispatch workbook.
    Export {
        #[arg(long)]
        dispatch: String,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Close a dispatch.
    Finalize {
        #[arg(long)]
        dispatch: String,
        #[arg(long, value_parser = station::parse_date)]
        date: NaiveDate,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!("dispatch v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Serve {
            bind,
            remote_url,
            service_key,
            cors_origin,
        } => {
            let config = RelayConfig::new(&remote_url, service_key)
                .with_bind(bind)
                .with_cors_origin(cors_origin);
            dispatch_relay::serve(config).await
        }
        Command::Station { dispatch } => {
            station::run(RelayClient::new(&cli.relay_url)?, &dispatch).await
        }
        Command::List { dispatch } => {
            let session = open(&cli.relay_url, &dispatch).await?;
            display::print_status(session.dispatch_id(), session.meta(), session.mirror());
            print!("{}", display::render_skus(session.mirror()));
            Ok(())
        }
        Command::Export { dispatch, out } => {
            let session = open(&cli.relay_url, &dispatch).await?;
            let path = out.unwrap_or_else(|| {
                PathBuf::from(default_file_name(&dispatch, chrono::Local::now().date_naive()))
            });
            let book = ExportBook::from_mirror(session.mirror());
            book.write_xlsx(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!(
                "Exported {} items across {} SKUs to {}",
                book.total(),
                book.summary.len(),
                path.display()
            );
            Ok(())
        }
        Command::Finalize { dispatch, date } => {
            let mut session = open(&cli.relay_url, &dispatch).await?;
            let resp = session
                .finalize(&date.format("%Y-%m-%d").to_string())
                .await
                .with_context(|| format!("finalizing dispatch {dispatch}"))?;
            println!("{}", resp.msg);
            display::print_status(session.dispatch_id(), session.meta(), session.mirror());
            Ok(())
        }
    }
}

async fn open(relay_url: &str, dispatch_id: &str) -> anyhow::Result<Session<RelayClient>> {
    Session::open(RelayClient::new(relay_url)?, dispatch_id)
        .await
        .with_context(|| format!("loading dispatch {dispatch_id} from {relay_url}"))
}
