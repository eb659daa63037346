//! Trackpad Glyphs - Trackpad gesture capture and symbol recognition
//!
//! Records symbols drawn on the trackpad, trains a recognizer on them and
//! classifies new drawings, one at a time or continuously.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use trackpad_glyphs::app::cli::{Cli, Commands, ConfigAction};
use trackpad_glyphs::app::config::Config;
use trackpad_glyphs::capture::{system_source, Recorder, SystemCursor};
use trackpad_glyphs::classifier::{ModelKind, SymbolClassifier};
use trackpad_glyphs::service::{GlyphService, Recognition};
use trackpad_glyphs::storage::{DrawingStore, ExportRecord, JsonDrawingStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments first so we can use --verbose to set log level
    let cli = Cli::parse_args();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = if cli.config.is_some() {
        Config::load(&config_path)?
    } else {
        Config::load_default()?
    };

    match cli.command {
        Commands::Init { force } => run_init(force, &config_path, &config)?,
        Commands::Collect { label, count } => run_collect(&label, count, &config).await?,
        Commands::Train { model } => run_train(model.as_deref(), &config).await?,
        Commands::Predict { model, feedback } => {
            run_predict(model.as_deref(), feedback, &config).await?
        }
        Commands::Listen { model, timeout_ms } => {
            run_listen(model.as_deref(), timeout_ms, &config).await?
        }
        Commands::Stats => run_stats(&config)?,
        Commands::Delete { label, force } => run_delete(&label, force, &config).await?,
        Commands::Export { file } => run_export(&file, &config)?,
        Commands::Import { file, model } => run_import(&file, model.as_deref(), &config).await?,
        Commands::Reset { model, all, force } => {
            run_reset(model.as_deref(), all, force, &config).await?
        }
        Commands::Config { action } => run_config(action, &config_path, &config)?,
    }

    Ok(())
}

fn model_kind(model: Option<&str>, config: &Config) -> anyhow::Result<ModelKind> {
    Ok(match model {
        Some(name) => name.parse::<ModelKind>()?,
        None => config.classifier.kind()?,
    })
}

fn open_store(config: &Config) -> anyhow::Result<Arc<JsonDrawingStore>> {
    Ok(Arc::new(JsonDrawingStore::open(config.storage.drawings_dir())?))
}

/// Wire the store, classifier and recorder described by `config`
fn build_service(model: Option<&str>, config: &Config) -> anyhow::Result<GlyphService> {
    let kind = model_kind(model, config)?;
    let classifier = SymbolClassifier::with_settings(
        kind,
        config.classifier.model_base(),
        config.classifier.settings(),
    );
    let recorder = Recorder::new(
        system_source(),
        Box::new(SystemCursor),
        config.capture.recorder_config(),
    );

    Ok(GlyphService::new(
        Arc::new(recorder),
        Arc::new(classifier),
        open_store(config)?,
    )
    .with_auto_timeout(config.auto_mode.timeout())
    .with_seed_file(config.storage.seed_file.clone()))
}

/// Print `message` and read one trimmed line from stdin
async fn prompt(message: &str) -> anyhow::Result<String> {
    print!("{}", message);
    io::stdout().flush()?;
    let line = tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        io::stdin().read_line(&mut line).map(|_| line)
    })
    .await??;
    Ok(line.trim().to_string())
}

fn print_recognition(recognition: &Recognition) {
    let top = &recognition.top;
    if top.is_sentinel() {
        println!("  No prediction ({})", top.label);
        return;
    }
    println!("  Prediction: {} (confidence {:.2})", top.label, top.confidence);
    if !recognition.candidates.is_empty() {
        let others: Vec<String> = recognition
            .candidates
            .iter()
            .map(|p| format!("{} ({:.2})", p.label, p.confidence))
            .collect();
        println!("  Alternatives: {}", others.join(", "));
    }
}

fn run_init(force: bool, config_path: &Path, config: &Config) -> anyhow::Result<()> {
    if config_path.exists() && !force {
        anyhow::bail!(
            "Config already exists at {:?}. Use --force to overwrite.",
            config_path
        );
    }

    config.save(config_path)?;
    println!("Created config at {:?}", config_path);
    println!("\nConfig content:\n{}", config.to_toml()?);

    let drawings_dir = config.storage.drawings_dir();
    let models_dir = config
        .classifier
        .model_base()
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(&drawings_dir)?;
    std::fs::create_dir_all(&models_dir)?;

    println!("\nCreated directories:");
    println!("  Drawings: {:?}", drawings_dir);
    println!("  Models: {:?}", models_dir);

    Ok(())
}

async fn run_collect(label: &str, count: u32, config: &Config) -> anyhow::Result<()> {
    let label = label.trim();
    if label.is_empty() {
        anyhow::bail!("Label must not be empty");
    }

    let service = build_service(None, config)?;
    let target = config.capture.cursor_target();
    let mut saved = 0;

    println!("Collecting {} drawing(s) of '{}'", count, label);
    for i in 1..=count {
        let answer = prompt(&format!("\n[{}/{}] Press Enter to draw (q to quit) ", i, count)).await?;
        if answer.eq_ignore_ascii_case("q") {
            break;
        }

        service.reset_cursor(target);
        service.start_recording()?;
        prompt("  Drawing... press Enter when done ").await?;
        let drawing = service.stop_recording();

        if drawing.is_empty() {
            warn!("Nothing was drawn; discarding");
            continue;
        }

        let id = service.store().save(label, &drawing)?;
        saved += 1;
        println!(
            "  Saved {} stroke(s), {} point(s) as {}",
            drawing.stroke_count(),
            drawing.point_count(),
            id
        );
    }

    println!("\nSaved {} drawing(s) of '{}'", saved, label);
    if saved > 0 {
        println!("Run 'glyphs train' to update the model");
    }
    Ok(())
}

async fn run_train(model: Option<&str>, config: &Config) -> anyhow::Result<()> {
    let service = build_service(model, config)?;
    let kind = service.classifier().kind();
    info!(model = %kind, "Training from stored drawings");

    let trained = service.retrain().await?;
    println!("Trained {} model on {} drawing(s)", kind, trained);
    println!("  Saved to {:?}", service.classifier().model_path());
    Ok(())
}

async fn run_predict(model: Option<&str>, feedback: bool, config: &Config) -> anyhow::Result<()> {
    let service = build_service(model, config)?;
    let classifier = Arc::clone(service.classifier());
    if !tokio::task::spawn_blocking(move || classifier.load()).await? {
        anyhow::bail!(
            "No trained {} model found. Run 'glyphs train --model {}' first.",
            service.classifier().kind(),
            service.classifier().kind()
        );
    }

    let target = config.capture.cursor_target();
    loop {
        let answer = prompt("\nPress Enter to draw (q to quit) ").await?;
        if answer.eq_ignore_ascii_case("q") {
            break;
        }

        service.reset_cursor(target);
        service.start_recording()?;
        prompt("  Drawing... press Enter when done ").await?;
        let recognition = service.stop_and_recognize().await?;

        if recognition.drawing.is_empty() {
            println!("  Nothing was drawn");
            continue;
        }
        print_recognition(&recognition);

        if feedback {
            teach_from_feedback(&service, recognition).await?;
        }
    }

    Ok(())
}

/// Ask whether the prediction was right and teach the confirmed label
async fn teach_from_feedback(service: &GlyphService, recognition: Recognition) -> anyhow::Result<()> {
    let answer = prompt("  Correct? [y / n / actual label] ").await?;
    let label = match answer.as_str() {
        "" => return Ok(()),
        "y" | "Y" if !recognition.top.is_sentinel() => recognition.top.label.clone(),
        "y" | "Y" => return Ok(()),
        "n" | "N" => {
            let label = prompt("  Actual label (blank to skip): ").await?;
            if label.is_empty() {
                return Ok(());
            }
            label
        }
        other => other.to_string(),
    };

    let outcome = service.teach(&label, recognition.drawing).await?;
    if outcome.model_updated {
        println!("  Learned '{}'", label);
    } else {
        println!("  Saved '{}'; retrain to include it in this model", label);
    }
    Ok(())
}

async fn run_listen(model: Option<&str>, timeout_ms: Option<u64>, config: &Config) -> anyhow::Result<()> {
    if !config.auto_mode.enabled {
        anyhow::bail!("Auto mode is disabled (auto_mode.enabled = false)");
    }

    let mut service = build_service(model, config)?;
    if let Some(ms) = timeout_ms {
        service = service.with_auto_timeout(std::time::Duration::from_millis(ms));
    }

    if !service.warm_start().await? {
        anyhow::bail!("No model available. Collect drawings and run 'glyphs train' first.");
    }

    let stop = Arc::new(Notify::new());
    let stop_handler = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        stop_handler.notify_one();
    })?;

    service.reset_cursor(config.capture.cursor_target());
    let mut results = service.start_auto()?;
    println!("Listening... draw symbols, pause to finish each. Press Ctrl+C to stop");

    loop {
        tokio::select! {
            received = results.recv() => match received {
                Some(recognition) => {
                    print_recognition(&recognition);
                    service.reset_cursor(config.capture.cursor_target());
                }
                None => break,
            },
            _ = stop.notified() => break,
        }
    }

    service.stop_auto().await?;
    println!("Stopped listening");
    Ok(())
}

fn run_stats(config: &Config) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let counts = store.label_counts()?;

    if counts.is_empty() {
        println!("No drawings in {:?}", store.dir());
        println!("Collect some with: glyphs collect <label>");
        return Ok(());
    }

    let total: usize = counts.values().sum();
    println!("Drawings in {:?}:", store.dir());
    for (label, count) in &counts {
        println!("  {:<12} {}", label, count);
    }
    println!("\n  {} label(s), {} drawing(s)", counts.len(), total);
    Ok(())
}

async fn run_delete(label: &str, force: bool, config: &Config) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let count = store.label_counts()?.get(label).copied().unwrap_or(0);
    if count == 0 {
        anyhow::bail!("No drawings found for label '{}'", label);
    }

    if !force {
        let answer = prompt(&format!("Delete {} drawing(s) of '{}'? [y/N] ", count, label)).await?;
        if !answer.eq_ignore_ascii_case("y") {
            println!("Cancelled");
            return Ok(());
        }
    }

    let removed = store.delete_label(label)?;
    println!("Deleted {} drawing(s) of '{}'", removed, label);
    println!("Run 'glyphs train' to update the model");
    Ok(())
}

fn run_export(file: &Path, config: &Config) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let records = store.export()?;
    std::fs::write(file, serde_json::to_string_pretty(&records)?)?;
    println!("Exported {} drawing(s) to {:?}", records.len(), file);
    Ok(())
}

async fn run_import(file: &Path, model: Option<&str>, config: &Config) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("Import file not found: {:?}", file);
    }
    let records: Vec<ExportRecord> = serde_json::from_str(&std::fs::read_to_string(file)?)?;
    let offered = records.len();

    let service = build_service(model, config)?;
    let imported = service.import(records).await?;
    println!("Imported {} of {} record(s) from {:?}", imported, offered, file);
    if imported > 0 && service.classifier().is_trained() {
        println!(
            "Retrained {} model on {} drawing(s)",
            service.classifier().kind(),
            service.classifier().example_count()
        );
    }
    Ok(())
}

async fn run_reset(model: Option<&str>, all: bool, force: bool, config: &Config) -> anyhow::Result<()> {
    let service = build_service(model, config)?;
    let kind = service.classifier().kind();

    if !force {
        let what = if all {
            format!("the {} model and every stored drawing", kind)
        } else {
            format!("the {} model", kind)
        };
        let answer = prompt(&format!("Delete {}? [y/N] ", what)).await?;
        if !answer.eq_ignore_ascii_case("y") {
            println!("Cancelled");
            return Ok(());
        }
    }

    if all {
        let removed = service.reset_all().await?;
        println!("Deleted {} drawing(s) and the {} model", removed, kind);
    } else {
        service.classifier().reset()?;
        println!("Deleted the {} model at {:?}", kind, service.classifier().model_path());
    }
    Ok(())
}

fn run_config(action: ConfigAction, config_path: &Path, config: &Config) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("Configuration ({:?}):\n", config_path);
            println!("{}", config.to_toml()?);
        }
        ConfigAction::Get { key } => {
            let table: toml::Table = toml::from_str(&config.to_toml()?)?;
            match lookup(&table, &key) {
                Some(value) => println!("{} = {}", key, value),
                None => anyhow::bail!("Configuration key '{}' not found", key),
            }
        }
        ConfigAction::Set { key, value } => {
            let mut table: toml::Table = toml::from_str(&config.to_toml()?)?;
            let parsed = parse_value(&value);
            if !assign(&mut table, &key, parsed) {
                anyhow::bail!("Unknown configuration key '{}'", key);
            }

            let updated: Config = toml::from_str(&toml::to_string(&table)?)?;
            updated.validate()?;
            updated.save(config_path)?;
            println!("Set {} = {}", key, value);
        }
    }

    Ok(())
}

/// Resolve a dotted key such as `classifier.model`
fn lookup<'a>(table: &'a toml::Table, key: &str) -> Option<&'a toml::Value> {
    let (section, leaf) = key.split_once('.')?;
    table.get(section)?.as_table()?.get(leaf)
}

/// Replace an existing dotted key, or add an optional one the section knows about
fn assign(table: &mut toml::Table, key: &str, value: toml::Value) -> bool {
    let Some((section, leaf)) = key.split_once('.') else {
        return false;
    };
    let Some(section_table) = table.get_mut(section).and_then(toml::Value::as_table_mut) else {
        return false;
    };
    let optional = matches!(
        (section, leaf),
        ("capture", "cursor_target_x" | "cursor_target_y")
            | ("classifier", "model_dir")
            | ("storage", "data_dir" | "seed_file")
    );
    if !section_table.contains_key(leaf) && !optional {
        return false;
    }
    section_table.insert(leaf.to_string(), value);
    true
}

/// Interpret a command-line value as TOML, falling back to a plain string
fn parse_value(raw: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("v = {}", raw))
        .ok()
        .and_then(|mut t| t.remove("v"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}
