//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use crate::HistoryAction;
use crate::PredictArgs;
use crate::render::{self, TerminalChartSink};
use homeval_core::analytics::feature_labels;
use homeval_core::chart::ids;
use homeval_core::config::workspace_config_path;
use homeval_core::error::ExportError;
use homeval_core::types::{display_model_name, format_currency};
use homeval_core::{
    AutoConfirm, Confirmation, ExportFormat, HomevalConfig, Location, Outcome, PredictionForm,
    PredictionRecord, Session, SnapshotStatus,
};
use std::path::Path;
use std::sync::Arc;

const NOTICE_WIDTH: usize = 78;

/// Asks on the terminal before destructive actions.
struct DialoguerConfirm;

impl Confirmation for DialoguerConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    config_file: Option<&Path>,
    quiet: bool,
) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace, config_file).await,
        Commands::Predict(args) => {
            let (config, mut session) = open_session(workspace, config_file)?;
            handle_predict(args, &mut session, &config, quiet).await
        }
        Commands::History { action } => {
            let (config, mut session) = open_session(workspace, config_file)?;
            handle_history(action, &mut session, &config, workspace)
        }
        Commands::Analytics => {
            let (_, mut session) = open_session(workspace, config_file)?;
            session.attach_sink(Arc::new(TerminalChartSink::new()));
            Ok(())
        }
        Commands::Export { index, format, out } => {
            let (config, mut session) = open_session(workspace, config_file)?;
            let dir = out.unwrap_or_else(|| config.export.resolve_output_dir(workspace));
            handle_export(&mut session, index, format, &dir)
        }
    }
}

/// Load configuration and open the persisted session, reporting a reset history.
fn open_session(
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<(HomevalConfig, Session)> {
    let config = homeval_core::load_config(Some(workspace), config_file)
        .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
    let session = Session::open(workspace, &config)?;
    if let Some(warning) = session.history().load_warning() {
        eprintln!(
            "{}",
            textwrap::fill(
                &format!("Warning: {}. Starting with an empty history.", warning.error),
                NOTICE_WIDTH
            )
        );
    }
    Ok((config, session))
}

async fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let toml_str = toml::to_string_pretty(&HomevalConfig::default())?;
            std::fs::write(&config_path, &toml_str)?;
            println!(
                "Created default configuration at: {}",
                config_path.display()
            );
            Ok(())
        }
        ConfigAction::Show => {
            if config_file.is_none() && !homeval_core::config_exists(Some(workspace)) {
                eprintln!("No configuration file found, showing defaults. Run `homeval config init` to create one.");
            }
            let config = homeval_core::load_config(Some(workspace), config_file)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}

async fn handle_predict(
    args: PredictArgs,
    session: &mut Session,
    config: &HomevalConfig,
    quiet: bool,
) -> anyhow::Result<()> {
    let form = if args.no_input {
        PredictionForm {
            bedrooms: args.bedrooms.unwrap_or_default(),
            bathrooms: args.bathrooms.unwrap_or_default(),
            sqft: args.sqft.unwrap_or_default(),
            location: args.location.unwrap_or_default(),
            age: args.age.unwrap_or_default(),
            model_type: args.model.unwrap_or_default(),
        }
    } else {
        prompt_form(args, &config.predictor.model_types)?
    };

    tracing::info!(predictor = session.predictor().name(), "Submitting prediction");
    let outcome = session.submit(&form).await;
    match &outcome {
        Outcome::Recorded { record, .. } => {
            println!("Predicted price: {}", format_currency(record.price));
            if !quiet {
                println!();
                print_record(record);
            }
            if let Some(notice) = outcome.notice() {
                eprintln!("{}", textwrap::fill(&notice, NOTICE_WIDTH));
            }
            Ok(())
        }
        Outcome::Invalid(_) | Outcome::Failed(_) | Outcome::Discarded { .. } => {
            let notice = outcome
                .notice()
                .unwrap_or_else(|| "Prediction was superseded".to_string());
            anyhow::bail!(textwrap::fill(&notice, NOTICE_WIDTH))
        }
    }
}

/// Fill in whatever the flags left out.
fn prompt_form(args: PredictArgs, model_types: &[String]) -> anyhow::Result<PredictionForm> {
    let bedrooms = prompt_field(args.bedrooms, "Bedrooms", "3")?;
    let bathrooms = prompt_field(args.bathrooms, "Bathrooms", "2")?;
    let sqft = prompt_field(args.sqft, "Square feet", "1500")?;
    let location = match args.location {
        Some(location) => location,
        None => {
            let names: Vec<String> = Location::ALL
                .iter()
                .map(|l| format!("{} ({})", l.name(), l.code()))
                .collect();
            let choice = dialoguer::Select::new()
                .with_prompt("Location")
                .items(&names)
                .default(1)
                .interact()?;
            Location::ALL[choice].code().to_string()
        }
    };
    let age = prompt_field(args.age, "Age (years)", "10")?;
    let model_type = match args.model {
        Some(model) => model,
        None if model_types.is_empty() => prompt_field(None, "Model", "random_forest")?,
        None => {
            let names: Vec<String> = model_types.iter().map(|m| display_model_name(m)).collect();
            let choice = dialoguer::Select::new()
                .with_prompt("Model")
                .items(&names)
                .default(0)
                .interact()?;
            model_types[choice].clone()
        }
    };

    Ok(PredictionForm {
        bedrooms,
        bathrooms,
        sqft,
        location,
        age,
        model_type,
    })
}

fn prompt_field(given: Option<String>, prompt: &str, default: &str) -> anyhow::Result<String> {
    match given {
        Some(value) => Ok(value),
        None => Ok(dialoguer::Input::<String>::new()
            .with_prompt(prompt)
            .default(default.to_string())
            .interact_text()?),
    }
}

fn handle_history(
    action: HistoryAction,
    session: &mut Session,
    config: &HomevalConfig,
    workspace: &Path,
) -> anyhow::Result<()> {
    match action {
        HistoryAction::List => {
            print!("{}", render::history_table(session.history().recent_first()));
            Ok(())
        }
        HistoryAction::Show { index } => {
            if session.view(index).is_none() {
                anyhow::bail!(
                    "No prediction at index {} (history has {})",
                    index,
                    session.history().len()
                );
            }
            if let Some(record) = session.current() {
                print_record(record);
            }
            Ok(())
        }
        HistoryAction::Clear { yes } => {
            let status = if yes {
                session.clear_history(&AutoConfirm(true))
            } else {
                session.clear_history(&DialoguerConfirm)
            };
            match status {
                None => println!("History left unchanged."),
                Some(SnapshotStatus::Saved) => println!("Prediction history cleared."),
                Some(SnapshotStatus::Degraded(err)) => {
                    println!("Prediction history cleared for this session.");
                    eprintln!("Warning: {err}");
                }
            }
            Ok(())
        }
        HistoryAction::Export { out } => {
            let dir = out.unwrap_or_else(|| config.export.resolve_output_dir(workspace));
            let file = match session.export_history() {
                Ok(file) => file,
                Err(err) => return report_nothing_to_export(err),
            };
            let path = file.write_to(&dir)?;
            println!("Exported {} predictions to {}", session.history().len(), path.display());
            Ok(())
        }
    }
}

fn handle_export(
    session: &mut Session,
    index: Option<usize>,
    format: ExportFormat,
    dir: &Path,
) -> anyhow::Result<()> {
    let index = index.or_else(|| session.history().len().checked_sub(1));
    if let Some(index) = index {
        if session.view(index).is_none() {
            anyhow::bail!(
                "No prediction at index {} (history has {})",
                index,
                session.history().len()
            );
        }
    }
    let file = match session.export_current(format) {
        Ok(file) => file,
        Err(err) => return report_nothing_to_export(err),
    };
    let path = file.write_to(dir)?;
    println!("Exported prediction to {}", path.display());
    Ok(())
}

/// An empty export is a notice, not a failure. Anything else is an error.
fn report_nothing_to_export(err: ExportError) -> anyhow::Result<()> {
    match err {
        ExportError::NoCurrentRecord | ExportError::EmptyHistory => {
            println!("{err}");
            Ok(())
        }
        other => Err(other.into()),
    }
}

fn print_record(record: &PredictionRecord) {
    let location = match Location::from_code(record.location) {
        Some(location) => location.name().to_string(),
        None => record.location.to_string(),
    };
    println!("Date:      {}", record.timestamp.format("%Y-%m-%d %H:%M:%S"));
    println!("Price:     {}", format_currency(record.price));
    println!("Bedrooms:  {}", record.bedrooms);
    println!("Bathrooms: {}", record.bathrooms);
    println!("Sq Ft:     {}", record.sqft);
    println!("Location:  {}", location);
    println!("Age:       {}", record.age);
    println!("Model:     {}", display_model_name(&record.model_type));
    println!();
    print!(
        "{}",
        render::bar_chart(
            ids::FEATURE_IMPACT,
            &feature_labels(),
            &record.importance_or_estimate().values()
        )
    );
}
