use std::{collections::HashSet, process};

use confreader::{
    ConfigReader, Lookup,
    application::{error::AppError, repos::DistributedCache},
    cache::keys,
    config::{self, Command, GetArgs, KeyArgs, SetArgs, Settings, WatchArgs},
    domain::{
        convert::{convert, validate_entry_value},
        entities::{ConfigEntry, validate_name, validate_value_len},
    },
    infra::{db::PostgresRepositories, error::InfraError, redis::RedisCache, telemetry},
};
use tokio::time::{self, MissedTickBehavior};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let chain = error.chain();
    if dispatcher::has_been_set() {
        error!(error = %error, causes = ?chain, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, causes = ?chain, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    match cli_args.command {
        Command::Get(args) => run_get(&settings, args).await,
        Command::Dump => run_dump(&settings).await,
        Command::Watch(args) => run_watch(&settings, args).await,
        Command::Set(args) => run_set(&settings, args).await,
        Command::Deactivate(args) => run_deactivate(&settings, args).await,
        Command::Apps => run_apps(&settings).await,
        Command::Purge => run_purge(&settings).await,
        Command::Migrate => run_migrate(&settings).await,
    }
}

async fn open_reader(settings: &Settings) -> Result<ConfigReader, AppError> {
    let options = settings.reader.reader_options()?;
    Ok(ConfigReader::connect(options).await?)
}

async fn open_repositories(settings: &Settings) -> Result<PostgresRepositories, AppError> {
    let url = settings.reader.require_durable_store_connection()?;
    let pool = PostgresRepositories::connect(url, settings.reader.max_connections.get())
        .await
        .map_err(InfraError::from)?;
    Ok(PostgresRepositories::new(pool))
}

async fn run_get(settings: &Settings, args: GetArgs) -> Result<(), AppError> {
    let reader = open_reader(settings).await?;
    let lookup = reader.lookup::<String>(&args.key).await;
    reader.shutdown().await;

    let raw = match (lookup, args.default) {
        (Lookup::Found(raw), _) => raw,
        (Lookup::NotFound, Some(default)) => default,
        (Lookup::NotFound, None) => return Err(AppError::NotFound(args.key)),
        (Lookup::ConversionFailed(err), _) => return Err(err.into()),
    };

    let value = convert(&raw, args.read_as.type_tag()).map_err(|err| err.with_key(&args.key))?;
    println!("{value}");
    Ok(())
}

async fn run_dump(settings: &Settings) -> Result<(), AppError> {
    let reader = open_reader(settings).await?;
    let snapshot = reader.get_all_snapshot();

    println!(
        "# {} generation={} loaded_at={} entries={}",
        reader.application_name(),
        snapshot.generation(),
        snapshot.loaded_at(),
        snapshot.len()
    );
    for key in snapshot.sorted_keys() {
        if let Some(value) = snapshot.get(key) {
            println!("{key}={value}");
        }
    }

    reader.shutdown().await;
    Ok(())
}

async fn run_watch(settings: &Settings, args: WatchArgs) -> Result<(), AppError> {
    let reader = open_reader(settings).await?;
    let filter: HashSet<String> = args.keys.into_iter().collect();
    let mut last_generation = 0;

    let mut ticker = time::interval(settings.reader.refresh_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        application = reader.application_name(),
        interval_secs = settings.reader.refresh_interval.as_secs(),
        "Watching configuration; press Ctrl-C to stop"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let snapshot = reader.get_all_snapshot();
                if snapshot.generation() == last_generation {
                    continue;
                }
                last_generation = snapshot.generation();
                println!("# generation={} loaded_at={}", snapshot.generation(), snapshot.loaded_at());
                for key in snapshot.sorted_keys() {
                    if !filter.is_empty() && !filter.contains(key) {
                        continue;
                    }
                    if let Some(value) = snapshot.get(key) {
                        println!("{key}={value}");
                    }
                }
            }
        }
    }

    reader.shutdown().await;
    Ok(())
}

async fn run_set(settings: &Settings, args: SetArgs) -> Result<(), AppError> {
    let application_name = settings.reader.require_application_name()?;
    validate_name("key", &args.key)?;
    validate_value_len(&args.value)?;

    let entry = ConfigEntry::new(application_name, args.key, args.value, args.value_type);
    validate_entry_value(&entry)?;

    let repositories = open_repositories(settings).await?;
    repositories.upsert_entry(&entry).await?;
    info!(
        application = %entry.application_name,
        key = %entry.key,
        value_type = %entry.value_type,
        "Configuration entry saved"
    );
    Ok(())
}

async fn run_deactivate(settings: &Settings, args: KeyArgs) -> Result<(), AppError> {
    let application_name = settings.reader.require_application_name()?;
    let repositories = open_repositories(settings).await?;
    if !repositories
        .set_active(application_name, &args.key, false)
        .await?
    {
        return Err(AppError::NotFound(args.key));
    }
    info!(application = application_name, key = %args.key, "Configuration entry deactivated");
    Ok(())
}

async fn run_apps(settings: &Settings) -> Result<(), AppError> {
    let repositories = open_repositories(settings).await?;
    for name in repositories.list_application_names().await? {
        println!("{name}");
    }
    Ok(())
}

async fn run_purge(settings: &Settings) -> Result<(), AppError> {
    let application_name = settings.reader.require_application_name()?;
    let url = settings
        .reader
        .distributed_cache_connection
        .as_deref()
        .ok_or_else(|| AppError::validation("reader.distributed_cache_connection must be set"))?;

    let cache = RedisCache::connect(url).await?;
    let removed = cache
        .delete_by_prefix(&keys::application_prefix(application_name))
        .await?;
    println!("{removed}");
    Ok(())
}

async fn run_migrate(settings: &Settings) -> Result<(), AppError> {
    let repositories = open_repositories(settings).await?;
    PostgresRepositories::run_migrations(repositories.pool())
        .await
        .map_err(InfraError::from)?;
    repositories
        .health_check()
        .await
        .map_err(InfraError::from)?;
    info!("Database migrations applied");
    Ok(())
}
