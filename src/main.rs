use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};

use sizedq::logging;
use sizedq::models::{QueueHandle, QueueRegistry};
use sizedq::storage::{
    Config, ConfigStorage, JsonSnapshotStorage, LoadOutcome, SnapshotStorage, TomlConfigStorage,
    ensure_directories,
};

#[derive(Parser)]
#[command(name = "sizedq")]
#[command(about = "Named bounded queues with JSON snapshots", long_about = None)]
struct Cli {
    /// Snapshot file (overrides the configured one)
    #[arg(short, long, global = true)]
    snapshot: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new empty queue
    Create {
        /// Unique queue name
        name: String,
        /// Maximum number of items
        capacity: usize,
    },

    /// Insert a value at the back of a queue (JSON, or plain text)
    Insert { queue: String, value: String },

    /// Pop the front value of a queue
    Pop { queue: String },

    /// Show one queue, or every queue
    Show { queue: Option<String> },

    /// List queue names
    List,

    /// Remove every queue from the snapshot
    Clear,

    /// Run the Tasks/Messages walkthrough against a scratch snapshot
    Demo {
        /// Scratch snapshot file (default: <tmp>/sizedq-demo.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (data_dir, config_dir) = ensure_directories()?;
    let config_storage = TomlConfigStorage::new(config_dir.join("sizedq.toml"));
    let (config, created) = load_config(&config_storage)?;
    init_logging(&config, &data_dir)?;

    // The logger did not exist yet when the default config was written
    if created {
        log::info!("Created default configuration at {:?}", config_storage.path());
    }

    let snapshot_path = cli
        .snapshot
        .unwrap_or_else(|| config.snapshot_path(&data_dir));
    let storage = JsonSnapshotStorage::new(snapshot_path);

    match cli.command {
        Commands::Create { name, capacity } => cmd_create(&storage, &name, capacity),
        Commands::Insert { queue, value } => cmd_insert(&storage, &queue, &value),
        Commands::Pop { queue } => cmd_pop(&storage, &queue),
        Commands::Show { queue } => cmd_show(&storage, queue.as_deref()),
        Commands::List => cmd_list(&storage),
        Commands::Clear => cmd_clear(&storage),
        Commands::Demo { output } => {
            let path = output.unwrap_or_else(|| std::env::temp_dir().join("sizedq-demo.json"));
            cmd_demo(&path)
        }
    }
}

/// Load the config, reporting whether the default file had to be created
fn load_config(storage: &TomlConfigStorage) -> Result<(Config, bool)> {
    let created = !storage.path().exists();
    let config = storage.load()?;
    Ok((config, created))
}

fn init_logging(config: &Config, data_dir: &Path) -> Result<()> {
    if config.general.file_logging {
        logging::init_file_logger(
            config.log_path(data_dir),
            &config.general.log_level,
            &config.general.console_level,
        )
    } else {
        logging::init_stderr_logger(&config.general.log_level);
        Ok(())
    }
}

/// Load the registry from the snapshot, starting empty if there is none
fn load_registry(storage: &JsonSnapshotStorage) -> Result<QueueRegistry> {
    let mut registry = QueueRegistry::new();

    let outcome = storage
        .load(&mut registry)
        .with_context(|| format!("Failed to load snapshot {:?}", storage.path()))?;

    if let LoadOutcome::Loaded(report) = outcome
        && !report.skipped.is_empty()
    {
        log::warn!(
            "{} malformed queues in {:?} were dropped",
            report.skipped.len(),
            storage.path()
        );
    }

    Ok(registry)
}

fn lookup(registry: &QueueRegistry, name: &str) -> Result<QueueHandle> {
    registry
        .get(name)
        .ok_or_else(|| anyhow!("Queue '{}' not found", name))
}

/// Parse a CLI value as JSON, keeping it as a string when that fails
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn cmd_create(storage: &JsonSnapshotStorage, name: &str, capacity: usize) -> Result<()> {
    let mut registry = load_registry(storage)?;
    registry.create(name, capacity)?;
    storage.save(&registry)?;

    println!("Queue '{}' created with capacity {}", name, capacity);
    Ok(())
}

fn cmd_insert(storage: &JsonSnapshotStorage, queue: &str, raw: &str) -> Result<()> {
    let registry = load_registry(storage)?;
    let handle = lookup(&registry, queue)?;

    let message = insert_raw(&handle, queue, raw)?;
    storage.save(&registry)?;

    println!("{}", message);
    Ok(())
}

/// Insert a CLI value, returning the line to report
fn insert_raw(handle: &QueueHandle, queue: &str, raw: &str) -> Result<String> {
    let value = parse_value(raw);
    let message = format!("Item {} inserted into queue '{}'", value, queue);
    handle.borrow_mut().insert(value)?;
    Ok(message)
}

fn cmd_pop(storage: &JsonSnapshotStorage, queue: &str) -> Result<()> {
    let registry = load_registry(storage)?;
    let handle = lookup(&registry, queue)?;

    let popped = handle.borrow_mut().pop();
    match popped {
        Some(value) => {
            storage.save(&registry)?;
            println!("{}", value);
        }
        None => println!("(empty)"),
    }

    Ok(())
}

fn cmd_show(storage: &JsonSnapshotStorage, queue: Option<&str>) -> Result<()> {
    let registry = load_registry(storage)?;

    match queue {
        Some(name) => println!("{}", lookup(&registry, name)?.borrow()),
        None => {
            for name in registry.sorted_names() {
                println!("{}", lookup(&registry, &name)?.borrow());
            }
            if registry.is_empty() {
                println!("(no queues)");
            }
        }
    }

    Ok(())
}

fn cmd_list(storage: &JsonSnapshotStorage) -> Result<()> {
    let registry = load_registry(storage)?;

    for name in registry.sorted_names() {
        println!("{}", name);
    }

    Ok(())
}

fn cmd_clear(storage: &JsonSnapshotStorage) -> Result<()> {
    let mut registry = load_registry(storage)?;
    let count = registry.len();
    registry.clear();
    storage.save(&registry)?;

    println!("Cleared {} queues", count);
    Ok(())
}

/// Walk through create, insert, save, clear and load on a fresh registry
fn cmd_demo(path: &Path) -> Result<()> {
    let storage = JsonSnapshotStorage::new(path.to_path_buf());
    let mut registry = QueueRegistry::new();

    println!("--- Creating queues ---");
    let tasks = registry.create("Tasks", 3)?;
    let messages = registry.create("Messages", 2)?;

    for task in ["Task A", "Task B", "Task C"] {
        tasks.borrow_mut().insert(Value::from(task))?;
    }
    messages.borrow_mut().insert(Value::from("Msg 1"))?;
    println!("{}", tasks.borrow());
    println!("{}", messages.borrow());

    if let Err(e) = tasks.borrow_mut().insert(Value::from("Task D")) {
        println!("Insert rejected: {}", e);
    }
    if let Err(e) = registry.create("Tasks", 5) {
        println!("Create rejected: {}", e);
    }

    println!("\n--- Save / clear / load ---");
    let saved = storage.save(&registry)?;
    println!("Saved {} queues to {:?}", saved, storage.path());

    registry.clear();
    println!("Cleared registry, tracked queues: {:?}", registry.names());

    let outcome = storage.load(&mut registry)?;
    println!(
        "Loaded {} queues, tracked queues: {:?}",
        outcome.loaded_count(),
        registry.sorted_names()
    );

    let loaded_tasks = lookup(&registry, "Tasks")?;
    let loaded_messages = lookup(&registry, "Messages")?;
    println!("Loaded: {}", loaded_tasks.borrow());
    println!("Loaded: {}", loaded_messages.borrow());
    println!("Is Tasks full? {}", loaded_tasks.borrow().is_full());

    let popped = loaded_messages.borrow_mut().pop();
    println!("Popped from Messages: {:?}", popped);
    let popped = loaded_messages.borrow_mut().pop();
    println!("Popped from empty Messages: {:?}", popped);
    println!("Messages after pops: {}", loaded_messages.borrow());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sizedq::QueueError;
    use std::sync::atomic::{AtomicU64, Ordering};

    static NEXT_ID: AtomicU64 = AtomicU64::new(1);

    fn unique_dir(prefix: &str) -> PathBuf {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "sizedq-main-{prefix}-{}-{id}",
            std::process::id()
        ))
    }

    #[test]
    fn test_insert_raw_parses_values() {
        let mut registry = QueueRegistry::new();
        let handle = registry.create("q", 2).unwrap();

        let message = insert_raw(&handle, "q", "42").unwrap();
        assert_eq!(message, "Item 42 inserted into queue 'q'");
        let message = insert_raw(&handle, "q", "hello").unwrap();
        assert_eq!(message, r#"Item "hello" inserted into queue 'q'"#);

        let items: Vec<Value> = handle.borrow().items().cloned().collect();
        assert_eq!(items, vec![json!(42), json!("hello")]);

        let err = insert_raw(&handle, "q", "overflow").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<QueueError>(),
            Some(QueueError::QueueFull { .. })
        ));
        assert_eq!(handle.borrow().len(), 2);
    }

    #[test]
    fn test_load_config_reports_creation() {
        let dir = unique_dir("config");
        let storage = TomlConfigStorage::new(dir.join("sizedq.toml"));

        let (config, created) = load_config(&storage).unwrap();
        assert!(created);
        assert_eq!(config.general.log_level, "info");

        let (_, created) = load_config(&storage).unwrap();
        assert!(!created);

        std::fs::remove_dir_all(&dir).ok();
    }
}
