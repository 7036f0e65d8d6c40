use std::{io, process, sync::Arc};

use clap::Parser;
use pricebook::{
    commands::{self, Outcome},
    config::{BackendKind, CliArgs, CliCommand, Config, LoggingConfig},
    mutator::TableMutator,
    sqlite_storage::SqliteStorage,
    storage::{FileStorage, InMemoryStorage, KeyValueStore, StorageError},
};
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    if logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn open_backend(config: &Config) -> Result<Arc<dyn KeyValueStore>, StorageError> {
    let backend: Arc<dyn KeyValueStore> = match config.storage.backend {
        BackendKind::Memory => Arc::new(InMemoryStorage::new()),
        BackendKind::File => Arc::new(FileStorage::new(&config.storage.path)?),
        BackendKind::Sqlite => Arc::new(SqliteStorage::new(&config.storage.path)?),
    };
    Ok(backend)
}

fn main() {
    let cli = CliArgs::parse();
    let config = Config::load(&cli);
    init_tracing(&config.logging);

    if let Err(e) = config.validate() {
        eprintln!("Error: invalid config: {}", e);
        process::exit(1);
    }

    let backend = match open_backend(&config) {
        Ok(backend) => backend,
        Err(e) => {
            eprintln!("Error: failed to open storage: {}", e);
            process::exit(1);
        }
    };
    tracing::info!(backend = ?config.storage.backend, path = %config.storage.path, "Storage opened");

    let mut mutator = TableMutator::open(backend, config.store_tables(), config.comparison);
    let command = cli.command.unwrap_or(CliCommand::Show);

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();

    match commands::execute(&mut mutator, &command, &mut input, &mut output) {
        Ok(Outcome::Report(report)) => print!("{}", report),
        Ok(Outcome::Cancelled) => println!("Nothing cleared."),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
