use clap::{Args, Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use std::io;
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::sync::Arc;
use threedgate::application::factory::PaymentProviderFactory;
use threedgate::application::orchestrator::{Collection, Gate, Outcome, PaymentOrchestrator};
use threedgate::config::GatewayConfig;
use threedgate::domain::attempt::PaymentForm;
use threedgate::domain::ports::SessionStoreBox;
use threedgate::domain::session::SessionId;
use threedgate::infrastructure::in_memory::InMemorySessionStore;
use threedgate::interfaces::console::callback_reader::{CallbackReader, parse_payload};
use threedgate::interfaces::console::presenter::{JsonPresenter, Presenter};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Gateway configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to persistent session database (optional). If provided, uses RocksDB.
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List supported banks and their selector codes
    Banks,
    /// Submit card data for a session
    Collect(CollectArgs),
    /// Build the redirect form for the session's attempt
    Gate {
        #[arg(long)]
        session: String,
        /// Address of the cardholder's browser
        #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
        client_ip: IpAddr,
    },
    /// Feed the bank's callback payload (urlencoded; read from stdin if omitted)
    Callback {
        #[arg(long)]
        session: String,
        #[arg(long)]
        payload: Option<String>,
    },
    /// Show the session's result once
    Outcome {
        #[arg(long)]
        session: String,
    },
    /// Show where the session's payment stands
    State {
        #[arg(long)]
        session: String,
    },
}

#[derive(Args)]
struct CollectArgs {
    #[arg(long)]
    session: String,
    #[arg(long, default_value = "")]
    holder: String,
    #[arg(long, default_value = "")]
    card: String,
    #[arg(long, default_value = "")]
    month: String,
    #[arg(long, default_value = "")]
    year: String,
    #[arg(long, default_value = "")]
    cvv: String,
    #[arg(long, default_value = "1")]
    installment: String,
    #[arg(long, default_value = "")]
    bank: String,
}

impl From<CollectArgs> for PaymentForm {
    fn from(args: CollectArgs) -> Self {
        PaymentForm {
            card_holder_name: args.holder,
            card_number: args.card,
            expire_month: args.month,
            expire_year: args.year,
            cvv: args.cvv,
            installment: args.installment,
            bank: args.bank,
        }
    }
}

fn open_sessions(db_path: Option<PathBuf>) -> Result<SessionStoreBox> {
    #[cfg(feature = "storage-rocksdb")]
    if let Some(db_path) = db_path {
        use threedgate::infrastructure::rocksdb::RocksDBSessionStore;
        let store = RocksDBSessionStore::open(db_path).into_diagnostic()?;
        return Ok(Box::new(store));
    }

    #[cfg(not(feature = "storage-rocksdb"))]
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }

    Ok(Box::new(InMemorySessionStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let stdout = io::stdout();
    let mut presenter = JsonPresenter::new(stdout.lock());

    if let Command::Banks = cli.command {
        return presenter.banks().into_diagnostic();
    }

    let config = match cli.config {
        Some(path) => GatewayConfig::from_path(path).into_diagnostic()?,
        None => GatewayConfig::default(),
    };
    let providers = PaymentProviderFactory::from_credentials(&config.banks).into_diagnostic()?;
    let sessions = open_sessions(cli.db_path)?;
    let orchestrator = PaymentOrchestrator::new(sessions, Arc::new(providers), config.checkout);

    match cli.command {
        Command::Banks => {}
        Command::Collect(args) => {
            let session = SessionId::new(args.session.as_str());
            let form = PaymentForm::from(args);
            let rendered = match orchestrator.collect(&session, &form).await.into_diagnostic()? {
                Collection::Accepted => presenter.accepted(),
                Collection::Rejected(errors) => presenter.validation_errors(&errors),
            };
            rendered.into_diagnostic()?;
        }
        Command::Gate { session, client_ip } => {
            let session = SessionId::new(session);
            let gate = orchestrator
                .issue_gate(&session, client_ip)
                .await
                .into_diagnostic()?;
            let rendered = match gate {
                Gate::Redirect { form, order_number } => presenter.redirect(&form, &order_number),
                Gate::Restart => presenter.restart(),
            };
            rendered.into_diagnostic()?;
        }
        Command::Callback { session, payload } => {
            let session = SessionId::new(session);
            let payload = match payload {
                Some(body) => parse_payload(body.as_bytes()),
                None => CallbackReader::new(io::stdin().lock())
                    .payload()
                    .into_diagnostic()?,
            };
            let resolution = orchestrator
                .callback(&session, &payload)
                .await
                .into_diagnostic()?;
            presenter.resolution(resolution).into_diagnostic()?;
        }
        Command::Outcome { session } => {
            let session = SessionId::new(session);
            let rendered = match orchestrator.outcome(&session).await.into_diagnostic()? {
                Outcome::Show(result) => presenter.result(&result),
                Outcome::Restart => presenter.restart(),
            };
            rendered.into_diagnostic()?;
        }
        Command::State { session } => {
            let session = SessionId::new(session);
            let state = orchestrator.state(&session).await.into_diagnostic()?;
            presenter.state(state).into_diagnostic()?;
        }
    }

    Ok(())
}
