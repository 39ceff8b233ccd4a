mod logging;
mod output;
mod providers;

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::future::join_all;
use modelpick_catalog::{
    Catalog, RefreshOptions, TracingTelemetry, load_provider_config, save_provider_config,
};
use modelpick_registry::{ModelsDevSource, ProviderDirectory, Registry};
use modelpick_store::SqliteStore;
use tracing::debug;

type CliResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "modelpick", version, about = "Browse and manage the AI model catalog")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Catalog database (defaults to `MODELPICK_DB`, then the user data dir).
    #[arg(long, global = true, value_name = "PATH")]
    db: Option<PathBuf>,

    /// Never contact providers.
    #[arg(long, global = true)]
    offline: bool,

    /// Serve provider listings from a local models.dev `api.json`.
    #[arg(long, global = true, value_name = "PATH")]
    models_json: Option<PathBuf>,

    /// Print catalog snapshots as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// List providers and their catalog status (default).
    Providers,
    /// List a provider's models.
    Models {
        provider: String,
        /// Include models the provider no longer lists.
        #[arg(long)]
        all: bool,
        /// Refresh the provider first.
        #[arg(long)]
        refresh: bool,
    },
    /// Fetch live model listings. Without a provider, refreshes every
    /// provider with stored credentials.
    Refresh {
        provider: Option<String>,
        /// Fetch even when the provider's configuration is incomplete.
        #[arg(long)]
        force: bool,
    },
    /// Add a model id by hand.
    AddModel { provider: String, model: String },
    /// Remove a hand-added model.
    RemoveModel { provider: String, model: String },
    /// Store an API key for a provider.
    SetKey { provider: String, key: String },
}

#[tokio::main]
async fn main() -> CliResult {
    let Cli {
        command,
        db,
        offline,
        models_json,
        json,
        verbose,
    } = Cli::parse();

    let _ = dotenvy::dotenv();
    logging::init(verbose);

    let source = match &models_json {
        Some(path) => ModelsDevSource::pinned_from_str(&std::fs::read_to_string(path)?)?,
        None => ModelsDevSource::new(),
    };
    let registry = Arc::new(Registry::new());
    providers::register_all(&registry, Arc::new(source));

    let db_path = modelpick_app::resolve_catalog_db_path(db.as_deref())?;
    debug!(path = %db_path.display(), "opening catalog database");
    let store = Arc::new(SqliteStore::open(&db_path)?);

    let catalog = Catalog::builder(registry.clone(), store)
        .telemetry(TracingTelemetry)
        .build();
    catalog.initialize(false).await;

    let host = Host {
        catalog,
        registry,
        offline,
        json,
    };
    match command.unwrap_or(Command::Providers) {
        Command::Providers => host.print_providers(),
        Command::Models {
            provider,
            all,
            refresh,
        } => {
            if refresh {
                host.refresh_one(&provider, RefreshOptions::default()).await?;
            }
            host.print_models(&provider, all)
        }
        Command::Refresh { provider, force } => {
            let options = RefreshOptions { force };
            match provider {
                Some(provider) => {
                    host.refresh_one(&provider, options).await?;
                    host.print_models(&provider, false)
                }
                None => {
                    host.refresh_every(options).await?;
                    host.print_providers()
                }
            }
        }
        Command::AddModel { provider, model } => {
            host.catalog.add_user_model(&provider, &model).await;
            host.print_models(&provider, false)
        }
        Command::RemoveModel { provider, model } => {
            host.catalog.remove_user_model(&provider, &model).await;
            host.print_models(&provider, false)
        }
        Command::SetKey { provider, key } => host.set_key(&provider, &key).await,
    }
}

struct Host {
    catalog: Catalog,
    registry: Arc<Registry>,
    offline: bool,
    json: bool,
}

impl Host {
    fn print_providers(&self) -> CliResult {
        let snapshot = self.catalog.snapshot();
        let mut out = io::stdout().lock();
        if self.json {
            writeln!(out, "{}", serde_json::to_string_pretty(&*snapshot)?)?;
        } else {
            output::print_providers(&mut out, &snapshot)?;
        }
        Ok(())
    }

    fn print_models(&self, provider_id: &str, all: bool) -> CliResult {
        let snapshot = self.catalog.snapshot();
        let provider = snapshot
            .provider(provider_id)
            .ok_or_else(|| format!("unknown provider: {provider_id}"))?;
        let mut out = io::stdout().lock();
        if self.json {
            let models: Vec<_> = provider
                .models
                .iter()
                .filter(|model| all || model.record.visible)
                .collect();
            writeln!(out, "{}", serde_json::to_string_pretty(&models)?)?;
        } else {
            output::print_models(&mut out, provider, all)?;
        }
        Ok(())
    }

    fn ensure_online(&self) -> CliResult {
        if self.offline {
            return Err("refusing to contact providers in --offline mode".into());
        }
        Ok(())
    }

    async fn refresh_one(&self, provider_id: &str, options: RefreshOptions) -> CliResult {
        self.ensure_online()?;
        if !self.registry.has_provider(provider_id) {
            return Err(format!("unknown provider: {provider_id}").into());
        }
        self.catalog.refresh(provider_id, options).await;
        Ok(())
    }

    async fn refresh_every(&self, options: RefreshOptions) -> CliResult {
        self.ensure_online()?;
        if !options.force {
            self.catalog.refresh_all().await;
            return Ok(());
        }
        let ids = self.registry.provider_ids();
        join_all(ids.iter().map(|id| self.catalog.refresh(id, options))).await;
        Ok(())
    }

    async fn set_key(&self, provider_id: &str, key: &str) -> CliResult {
        if !self.registry.has_provider(provider_id) {
            return Err(format!("unknown provider: {provider_id}").into());
        }
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("no API key provided for {provider_id}").into());
        }

        let storage = self.catalog.storage().as_ref();
        let mut config = load_provider_config(storage, provider_id).await?;
        config.insert("api_key".to_string(), key.to_string());
        save_provider_config(storage, provider_id, config).await?;
        eprintln!("stored API key for {provider_id}");

        if self.offline {
            return self.print_providers();
        }
        self.catalog
            .refresh(provider_id, RefreshOptions::default())
            .await;
        self.print_models(provider_id, false)
    }
}
