//! Price scanning CLI application.
//!
//! This binary provides a command-line interface for the pricescan library:
//! detecting prices in text, converting amounts and managing the local
//! exchange-rate file.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use pricescan::conversion::FormatOptions;
use pricescan::rates::{
    CoinGeckoSource, FrankfurterSource, JsonFileRateStore, MemoryRateStore, RefreshOutcome,
};
use pricescan::{
    BtcDisplay, Config, Conversion, ConversionEngine, CurrencyCode, DetectedPrice, PageDocument,
    PriceScanner, RateAcquisition, RateSnapshot, RateStore, ScanSession,
};

/// Price detection and conversion tool
///
/// Finds prices in text and converts them using locally stored exchange rates.
/// Run `pricescan rates refresh --rates-file FILE` once to fetch rates.
#[derive(Parser)]
#[command(name = "pricescan")]
#[command(version, about, long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Exchange-rate file (overrides the configured store path)
    #[arg(long, global = true, value_name = "FILE")]
    rates_file: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect prices in text (argument, file or stdin)
    Scan(ScanArgs),

    /// Convert an amount into the target currencies
    Convert {
        /// Amount to convert
        amount: f64,

        /// Currency of the amount
        currency: CurrencyCode,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Manage the local exchange-rate file
    Rates {
        #[command(subcommand)]
        command: RatesCommand,
    },
}

#[derive(Subcommand)]
enum RatesCommand {
    /// Fetch fresh rates (with retry) and persist them
    Refresh {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the persisted rates
    Show {
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct ScanArgs {
    /// Text to scan (reads stdin when neither TEXT nor --file is given)
    #[arg(conflicts_with = "file")]
    text: Option<String>,

    /// Read the text to scan from a file
    #[arg(short, long, value_name = "FILE")]
    file: Option<PathBuf>,

    /// Base currency used for ambiguous symbols
    #[arg(long, value_name = "CODE")]
    base: Option<CurrencyCode>,

    /// Currency already known for the page
    #[arg(long, value_name = "CODE", conflicts_with = "page")]
    page_currency: Option<CurrencyCode>,

    /// JSON page description used to detect the page currency
    #[arg(long, value_name = "FILE")]
    page: Option<PathBuf>,

    /// Text surrounding the scanned text
    #[arg(long, value_name = "TEXT")]
    nearby: Option<String>,

    /// Also print conversions using the rate file
    #[arg(long)]
    convert: bool,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Args)]
struct OutputArgs {
    /// Target currencies, comma separated (defaults to the configured list)
    #[arg(long, value_name = "CODES", value_delimiter = ',')]
    to: Vec<CurrencyCode>,

    /// Bitcoin display mode: native, sats or dynamic
    #[arg(long, value_name = "MODE", value_parser = parse_btc_display)]
    btc_display: Option<BtcDisplay>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn parse_btc_display(value: &str) -> Result<BtcDisplay, String> {
    match value.to_ascii_lowercase().as_str() {
        "native" | "btc" => Ok(BtcDisplay::Native),
        "sats" => Ok(BtcDisplay::Sats),
        "dynamic" => Ok(BtcDisplay::Dynamic),
        other => Err(format!(
            "unknown display mode '{other}' (expected native, sats or dynamic)"
        )),
    }
}

#[derive(Serialize)]
struct ScanRecord<'a> {
    #[serde(flatten)]
    price: &'a DetectedPrice,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    conversions: Vec<Conversion>,
}

/// Command handler holding the resolved configuration.
struct PriceScanHandler {
    config: Config,
    store: Option<JsonFileRateStore>,
    verbose: bool,
}

impl PriceScanHandler {
    fn new(config: Config, rates_file: Option<PathBuf>, verbose: bool) -> Self {
        let store = rates_file
            .or_else(|| config.acquisition.store_path.clone())
            .map(JsonFileRateStore::new);
        Self {
            config,
            store,
            verbose,
        }
    }

    fn targets(&self, output: &OutputArgs) -> Vec<CurrencyCode> {
        if output.to.is_empty() {
            self.config.target_currencies.clone()
        } else {
            output.to.clone()
        }
    }

    fn format_options(&self, output: &OutputArgs) -> FormatOptions {
        let mut options = self.config.format_options();
        if let Some(mode) = output.btc_display {
            options.btc_display = mode;
        }
        options
    }

    fn load_snapshot(&self) -> Result<Option<RateSnapshot>> {
        let Some(store) = &self.store else {
            return Ok(None);
        };
        store
            .load()
            .with_context(|| format!("Failed to read rates from {}", store.path().display()))
    }

    /// Conversion engine over the persisted rates.
    fn engine(&self, options: FormatOptions) -> Result<ConversionEngine> {
        let snapshot = self.load_snapshot()?.ok_or_else(|| {
            anyhow::anyhow!(
                "No exchange rates available. Run `pricescan rates refresh --rates-file FILE` first."
            )
        })?;
        if self.verbose {
            println!("Using rates fetched at {}", snapshot.fetched_at);
        }
        Ok(ConversionEngine::with_options(
            Arc::new(snapshot.rates),
            options,
        ))
    }

    fn scan(&self, args: &ScanArgs) -> Result<()> {
        let text = read_input(args.text.as_deref(), args.file.as_deref())?;
        let scanner = PriceScanner::from_config(&self.config);
        let options = self.format_options(&args.output);

        let mut session = ScanSession::new(
            &scanner,
            args.base.unwrap_or(self.config.base_currency),
        )
        .with_targets(self.targets(&args.output));
        if let Some(currency) = args.page_currency {
            session = session.with_page_currency(currency);
        }
        if let Some(path) = &args.page {
            session = session.with_page(read_page(path)?);
        }

        let prices = match &args.nearby {
            Some(nearby) => session.scan_with_nearby(&text, nearby),
            None => session.scan(&text),
        };

        let engine = if args.convert {
            Some(self.engine(options)?)
        } else {
            None
        };

        let records: Vec<ScanRecord<'_>> = prices
            .iter()
            .map(|price| ScanRecord {
                price,
                conversions: engine
                    .as_ref()
                    .map(|engine| session.conversions(engine, price))
                    .unwrap_or_default(),
            })
            .collect();

        if args.output.json {
            println!("{}", serde_json::to_string_pretty(&records)?);
            return Ok(());
        }

        if self.verbose {
            println!("Base currency: {}", session.base_currency());
            if let Some(page) = session.page_currency() {
                println!("Page currency: {page}");
            }
        }

        if records.is_empty() {
            println!("⚠ No prices found");
            return Ok(());
        }

        for record in &records {
            let price = record.price;
            println!(
                "{}..{}\t{}\t{}\t{}",
                price.start,
                price.end,
                price.text,
                pricescan::conversion::format_display(price.amount, price.currency, &options),
                price.currency
            );
            if self.verbose {
                println!(
                    "  pattern: {}, resolved by: {:?}, format: {:?}",
                    price.pattern_id, price.resolved_by, price.format
                );
            }
            for conversion in record.conversions.iter().skip(1) {
                println!("  = {}", conversion.formatted);
            }
        }
        println!("✓ Found {} price(s)", records.len());

        Ok(())
    }

    fn convert(&self, amount: f64, currency: CurrencyCode, output: &OutputArgs) -> Result<()> {
        if !amount.is_finite() || amount < 0.0 {
            anyhow::bail!("Amount must be a non-negative number, got {amount}");
        }

        let engine = self.engine(self.format_options(output))?;
        let conversions = engine.conversions(amount, currency, &self.targets(output));

        if output.json {
            println!("{}", serde_json::to_string_pretty(&conversions)?);
            return Ok(());
        }

        for conversion in &conversions {
            println!("{}\t{}", conversion.currency, conversion.formatted);
        }
        if conversions.len() == 1 {
            println!("⚠ No rates available for the requested targets");
        }

        Ok(())
    }

    async fn refresh_rates(&self, json: bool) -> Result<()> {
        let acquisition_config = &self.config.acquisition;
        let timeout = acquisition_config.request_timeout();
        let fiat = FrankfurterSource::new(acquisition_config.fiat_endpoint.as_str(), timeout)
            .context("Failed to set up fiat rate source")?;
        let crypto = CoinGeckoSource::new(&acquisition_config.crypto_endpoint, timeout)
            .context("Failed to set up crypto rate source")?;

        let store: Arc<dyn RateStore> = match &self.store {
            Some(store) => Arc::new(store.clone()),
            None => Arc::new(MemoryRateStore::new()),
        };

        let acquisition = RateAcquisition::new(
            Arc::new(fiat),
            Arc::new(crypto),
            store,
            acquisition_config.settings(),
        );

        let snapshot = match acquisition
            .refresh()
            .await
            .with_context(|| "Rate refresh failed")?
        {
            RefreshOutcome::Updated(snapshot) => snapshot,
            RefreshOutcome::AlreadyRunning => anyhow::bail!("A refresh is already running"),
        };

        if json {
            println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
            return Ok(());
        }

        if self.verbose {
            print_rates(&snapshot);
        }
        match &self.store {
            Some(store) => println!(
                "✓ Fetched {} rate(s) → {}",
                snapshot.rates.len(),
                store.path().display()
            ),
            None => println!(
                "✓ Fetched {} rate(s) (not persisted, pass --rates-file to keep them)",
                snapshot.rates.len()
            ),
        }

        Ok(())
    }

    fn show_rates(&self, json: bool) -> Result<()> {
        let store = self.store.as_ref().ok_or_else(|| {
            anyhow::anyhow!("No rate file configured. Use --rates-file or acquisition.store_path.")
        })?;
        let snapshot = self
            .load_snapshot()?
            .ok_or_else(|| anyhow::anyhow!("No rates stored at {}", store.path().display()))?;

        if json {
            println!("{}", serde_json::to_string_pretty(&snapshot)?);
            return Ok(());
        }

        print_rates(&snapshot);
        Ok(())
    }
}

fn print_rates(snapshot: &RateSnapshot) {
    let age = snapshot.age(chrono::Utc::now());
    println!(
        "Rates fetched at {} ({} min ago)",
        snapshot.fetched_at.to_rfc3339(),
        age.num_minutes()
    );
    for (currency, rate) in snapshot.rates.iter() {
        println!("  {:<9}{rate:>20.8}", currency.code());
    }
}

fn read_input(text: Option<&str>, file: Option<&Path>) -> Result<String> {
    if let Some(text) = text {
        return Ok(text.to_string());
    }
    if let Some(path) = file {
        return std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()));
    }
    let mut buffer = String::new();
    io::stdin()
        .read_to_string(&mut buffer)
        .context("Failed to read stdin")?;
    Ok(buffer)
}

fn read_page(path: &Path) -> Result<PageDocument> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read page description {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Invalid page description in {}", path.display()))
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let json = std::env::var("PRICESCAN_LOG_FORMAT")
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(io::stderr))
            .init();
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(Config::default()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(cli.config.as_deref())?;
    let handler = PriceScanHandler::new(config, cli.rates_file, cli.verbose);

    match &cli.command {
        Commands::Scan(args) => handler.scan(args)?,
        Commands::Convert {
            amount,
            currency,
            output,
        } => handler.convert(*amount, *currency, output)?,
        Commands::Rates { command } => match command {
            RatesCommand::Refresh { json } => handler.refresh_rates(*json).await?,
            RatesCommand::Show { json } => handler.show_rates(*json)?,
        },
    }

    Ok(())
}
