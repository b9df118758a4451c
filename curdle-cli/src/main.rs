//! Curdle CLI - exercises the caching library from the command line.
//!
//! `curdle demo` runs a canned lookup scenario through the caching layer and
//! prints per-provider statistics as JSON; `curdle config` shows the
//! effective settings. Both accept an optional INI file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;

use curdle::providers::{LocalMapCacheProvider, MokaCacheProvider, NullCacheProvider};
use curdle::{
    BoxError, CacheError, CacheKey, CacheProfile, CacheSettings, Cacheable, CachingLayer, CallArg,
    ConfigError, MethodCall, ProviderRegistry, RegistryError, TypeToken,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("failed to render statistics: {0}")]
    Render(#[from] serde_json::Error),
}

#[derive(Debug, Parser)]
#[command(name = "curdle", about = "Transparent method-result caching", version)]
struct Cli {
    /// Path to an INI settings file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a canned caching scenario and print provider statistics
    Demo,
    /// Print the effective settings
    Config,
}

/// Demo entity keyed by its id field.
#[derive(Debug)]
struct UserRecord {
    id: i64,
    name: String,
}

impl Cacheable for UserRecord {
    fn identity(&self) -> Result<Option<CacheKey>, BoxError> {
        Ok(Some(self.id.into()))
    }

    fn type_token(&self) -> TypeToken {
        TypeToken::of::<UserRecord>()
    }
}

fn load_settings(path: Option<&PathBuf>) -> Result<CacheSettings, CliError> {
    match path {
        Some(path) => Ok(CacheSettings::from_ini(path)?),
        None => Ok(CacheSettings::default()),
    }
}

fn build_layer(settings: &CacheSettings) -> Result<CachingLayer, CliError> {
    let local = LocalMapCacheProvider::with_store_capacity(settings.max_entries_per_store);
    let registry = ProviderRegistry::builder()
        .register(Arc::new(local))?
        .register(Arc::new(MokaCacheProvider::new()))?
        .register(Arc::new(NullCacheProvider::new()))?
        .with_default_provider(&settings.default_provider)
        .with_default_ttl_ms(settings.default_ttl_ms)
        .build()?;
    Ok(CachingLayer::new(Arc::new(registry))
        .with_store_ttl_overrides(settings.store_ttl_ms.clone()))
}

async fn run_demo(settings: CacheSettings) -> Result<(), CliError> {
    let layer = build_layer(&settings)?;
    let profile = CacheProfile::for_type::<UserRecord>().with_ttl_ms(2_000);

    println!("Looking up user 42 three times (one load expected):");
    for round in 1..=3 {
        let call = MethodCall::new("find", "UserService", vec![CallArg::Key(42i64.into())]);
        let cached = layer
            .retrieve::<UserRecord, _, _>(&call, &profile, |key| async move {
                info!(key = %key, "Loading from backing source");
                tokio::time::sleep(Duration::from_millis(150)).await;
                let id = match key {
                    CacheKey::Int(id) => id,
                    _ => 0,
                };
                Ok(Some(UserRecord {
                    id,
                    name: "Ada Lovelace".to_string(),
                }))
            })
            .await?;
        match cached {
            Some(user) => println!("  round {round}: {} (id {})", user.name, user.id),
            None => println!("  round {round}: not found"),
        }
    }

    println!("Saving user 42 invalidates the entry:");
    let updated = UserRecord {
        id: 42,
        name: "Ada L.".to_string(),
    };
    let call = MethodCall::new("save", "UserService", vec![CallArg::Entity(&updated)]);
    layer.remove(&call, &profile).await?;
    let call = MethodCall::new("find", "UserService", vec![CallArg::Key(42i64.into())]);
    let reloaded = layer
        .retrieve::<UserRecord, _, _>(&call, &profile, |_key| async {
            Ok(Some(UserRecord {
                id: 42,
                name: "Ada L.".to_string(),
            }))
        })
        .await?;
    if let Some(user) = reloaded {
        println!("  reloaded: {} (id {})", user.name, user.id);
    }

    println!("Waiting out the 2 s TTL:");
    tokio::time::sleep(Duration::from_millis(2_200)).await;
    let call = MethodCall::new("find", "UserService", vec![CallArg::Key(42i64.into())]);
    layer
        .retrieve::<UserRecord, _, _>(&call, &profile, |_key| async {
            println!("  entry expired, loader ran again");
            Ok(Some(UserRecord {
                id: 42,
                name: "Ada L.".to_string(),
            }))
        })
        .await?;

    let stats: Vec<_> = layer
        .registry()
        .providers()
        .map(|provider| provider.stats())
        .collect();
    println!("Provider statistics:");
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn print_settings(settings: &CacheSettings) {
    println!("default_provider      = {}", settings.default_provider);
    println!("default_ttl_ms        = {}", settings.default_ttl_ms);
    match settings.max_entries_per_store {
        Some(max) => println!("max_entries_per_store = {max}"),
        None => println!("max_entries_per_store = unbounded"),
    }
    if !settings.store_ttl_ms.is_empty() {
        println!("store TTL overrides:");
        let mut overrides: Vec<_> = settings.store_ttl_ms.iter().collect();
        overrides.sort();
        for (store, ttl_ms) in overrides {
            println!("  {store} = {ttl_ms}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_ref())?;

    match cli.command {
        Command::Demo => run_demo(settings).await,
        Command::Config => {
            print_settings(&settings);
            Ok(())
        }
    }
}
