//! Nudge application binary - composition root.
//!
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Initialize logging
//! 3. Open the SQLite reminder store
//! 4. Build the gated model client, temporal resolver and draft extractor
//! 5. Run the console transport against the dispatcher

mod cli;
mod console;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use nudge_core::{LogChannel, Materializer, MessageChannel, NoopCalendarSync, NudgeConfig};
use nudge_draft::{DraftBatchExtractor, ExtractorSettings};
use nudge_flow::{Dispatcher, FlowContext};
use nudge_llm::{AdmissionGate, CompletionService, GatedCompletion, OllamaClient};
use nudge_storage::{Database, SqliteReminderStore};
use nudge_temporal::TemporalResolver;

use cli::{expand_home, CliArgs};
use console::{Console, StdoutChannel};

fn database_path(args: &CliArgs, config: &NudgeConfig) -> PathBuf {
    if let Some(ref db) = args.db {
        return db.clone();
    }
    let db_path = PathBuf::from(&config.storage.db_path);
    if db_path.is_absolute() {
        db_path
    } else {
        expand_home(&config.general.data_dir).join(db_path)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = NudgeConfig::load_or_default(&config_file);
    if let Some(tz) = args.resolve_timezone() {
        config.general.timezone = tz;
    }
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }

    // Tracing. Logs go to stderr so they do not interleave with replies.
    let filter = args.resolve_log_filter(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting Nudge v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), timezone = %config.timezone(), "Configuration loaded");

    // Storage.
    let db_path = database_path(&args, &config);
    let db = Database::new(&db_path)?;
    let store = Arc::new(SqliteReminderStore::new(Arc::new(db)));

    // Model client behind the process-wide admission gate.
    let client = OllamaClient::from_config(&config.llm)?;
    let llm: Arc<dyn CompletionService> = Arc::new(GatedCompletion::new(
        client,
        AdmissionGate::new(config.llm.max_in_flight),
    ));
    tracing::info!(
        base_url = %config.llm.base_url,
        model = %config.llm.model,
        max_in_flight = config.llm.max_in_flight,
        "Model client ready"
    );

    let resolver = TemporalResolver::with_fallback(llm.clone()).verbose(config.flows.datetime_parse_debug);
    let materializer = Materializer::new(store.clone(), Arc::new(NoopCalendarSync));
    let ctx = FlowContext::from_config(&config, materializer, resolver.clone());
    let extractor = DraftBatchExtractor::new(llm, store, resolver, ExtractorSettings::from_config(&config));
    let dispatcher = Dispatcher::new(ctx, extractor);

    let channel: Box<dyn MessageChannel> = if args.headless {
        Box::new(LogChannel)
    } else {
        Box::new(StdoutChannel)
    };
    Console::new(dispatcher, channel, args.conversation).run().await?;
    Ok(())
}
