use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use token_balance_card::config::Config;
use token_balance_card::{BalanceResolver, ChainEndpoint, ViewerIdentity};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Look up a viewer's token balance the way the balance card does.
#[derive(Debug, Parser)]
#[command(name = "token-balance-card", version)]
struct Cli {
    /// Numeric platform user id (e.g. a Farcaster fid)
    #[arg(long)]
    fid: Option<u64>,

    /// Wallet address the platform reported for the viewer
    #[arg(long)]
    address: Option<String>,

    /// Treat --address as platform-attested
    #[arg(long, requires = "address")]
    verified: bool,

    /// Free text typed by the viewer
    #[arg(long)]
    text: Option<String>,

    /// Read every candidate address and print the total
    #[arg(long)]
    all: bool,

    /// Print the full outcome as JSON instead of the card line
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn identity(&self) -> ViewerIdentity {
        let mut identity = ViewerIdentity::default();
        if let Some(fid) = self.fid {
            identity = identity.with_numeric_id(fid);
        }
        if let Some(address) = &self.address {
            identity = identity.with_claim(address.clone(), self.verified);
        }
        if let Some(text) = &self.text {
            identity = identity.with_raw_text(text.clone());
        }
        identity
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "token_balance_card=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::from_env()?;
    let endpoint = config.endpoint()?;
    print_banner(&config, &endpoint);

    let resolver = BalanceResolver::from_config(&config);
    let identity = cli.identity();
    info!("🔍 Resolving balance for {:?}", identity);

    if cli.all {
        match resolver.resolve_all(&identity, &endpoint).await {
            Ok(portfolio) if cli.json => println!("{}", serde_json::to_string_pretty(&portfolio)?),
            Ok(portfolio) => {
                for entry in &portfolio.entries {
                    let line = match (&entry.balance, entry.failure) {
                        (Some(balance), _) => format!("{} {}", balance.formatted, endpoint.token_symbol),
                        (None, Some(reason)) => reason.to_string(),
                        (None, None) => "-".to_string(),
                    };
                    let source = format!("{:?}", entry.candidate.source);
                    println!("{:<44} {:<18} {}", entry.candidate.address, source, line);
                }
                println!("Total: {} {}", portfolio.total.formatted, endpoint.token_symbol);
            }
            Err(outcome) if cli.json => println!("{}", serde_json::to_string_pretty(&outcome)?),
            Err(outcome) => println!("{}", outcome.headline(&endpoint.token_symbol)),
        }
        return Ok(());
    }

    let outcome = resolver.resolve_balance(&identity, &endpoint).await;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!("{}", outcome.headline(&endpoint.token_symbol));
    }

    Ok(())
}

fn print_banner(config: &Config, endpoint: &ChainEndpoint) {
    eprintln!("🪙 {} balance check", endpoint.token_symbol);
    eprintln!("   • Chain: {} via {}", endpoint.chain_id, endpoint.rpc_url);
    eprintln!("   • Token: {}", endpoint.token_contract);
    eprintln!(
        "   • Directory lookup: {}",
        if config.directory.api_key.is_some() { "enabled" } else { "disabled" }
    );
    eprintln!(
        "   • Fiat estimate: {}",
        config.price_feed.pair.as_deref().unwrap_or("disabled")
    );
}
