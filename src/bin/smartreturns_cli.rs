use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use smartreturns_engine::{
    config::{self, EngineConfig},
    ml::{
        engine::PredictionEngine,
        forecasting::ForecastResult,
        risk::{RiskAssessment, RiskInputs},
        routing_model::HubCapacity,
    },
    models::{ReturnCountRow, ReturnOutcome, ReturnRecord, TrainingDatasets},
};
use tracing::debug;

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::load_config().context("failed to load configuration")?;
    config::init_tracing(&config.log_level, config.log_json);

    let model_path = cli.model.clone().unwrap_or_else(|| config.model_path.clone());
    debug!(model = %model_path.display(), "resolved model path");
    let context = CliContext { config, model_path };

    match cli.command {
        Commands::Train(args) => handle_train(&context, args, cli.json)?,
        Commands::Predict(args) => handle_predict(&context, args, cli.json)?,
        Commands::Forecast(args) => handle_forecast(&context, args, cli.json)?,
        Commands::Risk(args) => handle_risk(&context, args, cli.json)?,
        Commands::Anomalies(args) => handle_anomalies(&context, args, cli.json)?,
        Commands::Insights(args) => handle_insights(&context, args)?,
        Commands::Hubs(args) => handle_hubs(&context, args)?,
        Commands::Status => handle_status(&context, cli.json)?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "smartreturns",
    about = "Train and query the SmartReturns disposition engine",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[arg(
        long,
        global = true,
        help = "Model file to read or write; defaults to model_path from configuration"
    )]
    model: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train every component with a dataset in the input file and save the models
    Train(InputArgs),
    /// Recommend dispositions for one record or an array of records
    Predict(InputArgs),
    /// Project recovered value for the coming periods
    Forecast(ForecastArgs),
    /// Score operational risk from a set of ratios
    Risk(InputArgs),
    /// Compare current return counts with the trained baseline
    Anomalies(InputArgs),
    /// Summarise historical outcomes
    Insights(InputArgs),
    /// Assign returned items to processing hubs
    Hubs(HubArgs),
    /// Show which components are trained
    Status,
}

#[derive(Args)]
struct InputArgs {
    #[arg(long, short, help = "Path to a JSON input file")]
    input: PathBuf,
}

#[derive(Args)]
struct ForecastArgs {
    #[arg(long, default_value_t = 6, help = "Number of 30 day periods to project")]
    periods: u32,
    #[arg(long, help = "Restrict the projection to one product category")]
    category: Option<String>,
}

#[derive(Args)]
struct HubArgs {
    #[arg(long, help = "JSON array of return records")]
    items: PathBuf,
    #[arg(long, help = "JSON array of {hub_id, capacity} objects")]
    hubs: PathBuf,
}

/// Accepts a single record object or an array of them.
#[derive(Deserialize)]
#[serde(untagged)]
enum PredictInput {
    One(Box<ReturnRecord>),
    Many(Vec<ReturnRecord>),
}

struct CliContext {
    config: EngineConfig,
    model_path: PathBuf,
}

impl CliContext {
    fn fresh_engine(&self) -> Result<PredictionEngine> {
        PredictionEngine::new(&self.config).context("failed to build prediction engine")
    }

    fn trained_engine(&self) -> Result<PredictionEngine> {
        let mut engine = self.fresh_engine()?;
        if !self.model_path.exists() {
            bail!(
                "no trained models at {}; run `smartreturns train` first",
                self.model_path.display()
            );
        }
        engine
            .load_models(&self.model_path)
            .with_context(|| format!("failed to load models from {}", self.model_path.display()))?;
        Ok(engine)
    }
}

fn handle_train(context: &CliContext, args: InputArgs, json: bool) -> Result<()> {
    let datasets: TrainingDatasets = read_json(&args.input)?;
    let mut engine = if context.model_path.exists() {
        context.trained_engine()?
    } else {
        context.fresh_engine()?
    };

    let report = engine.train_models(&datasets).context("training failed")?;
    engine
        .save_models(&context.model_path)
        .with_context(|| format!("failed to save models to {}", context.model_path.display()))?;

    if json {
        print_json(&report)?;
    } else {
        if let Some(metrics) = &report.disposition {
            println!(
                "Disposition: accuracy {:.3}, cv {:.3} ± {:.3} ({} train / {} test)",
                metrics.accuracy, metrics.cv_mean, metrics.cv_std, metrics.n_train, metrics.n_test
            );
        }
        if let Some(metrics) = &report.forecasting {
            println!(
                "Forecasting: MAE {:.2}, R² {:.3}, MAPE {:.1}%",
                metrics.mae, metrics.r2_score, metrics.mape
            );
        }
        if let Some(baseline) = &report.anomaly_detection {
            println!(
                "Anomaly baseline: {:.1} ± {:.1} returns per day across {} categories",
                baseline.daily_mean,
                baseline.daily_std,
                baseline.category_means.len()
            );
        }
        println!("Models saved to: {}", context.model_path.display());
    }
    Ok(())
}

fn handle_predict(context: &CliContext, args: InputArgs, json: bool) -> Result<()> {
    let engine = context.trained_engine()?;
    let results = match read_json::<PredictInput>(&args.input)? {
        PredictInput::One(record) => vec![engine.predict_disposition(&record)?],
        PredictInput::Many(records) => engine.predict_batch(&records)?,
    };

    if json {
        print_json(&results)?;
    } else {
        for result in &results {
            println!(
                "- {} ({:.0}% confident) • value {:.2} • {} day(s){}",
                result.recommended_action,
                result.confidence * 100.0,
                result.estimated_value,
                result.processing_time,
                result
                    .marketplace
                    .as_deref()
                    .map(|m| format!(" • list on {}", m))
                    .unwrap_or_default()
            );
            println!("  {}", result.reasoning);
        }
    }
    Ok(())
}

fn handle_forecast(context: &CliContext, args: ForecastArgs, json: bool) -> Result<()> {
    let engine = context.trained_engine()?;
    let forecast = engine.forecast_demand(args.periods, args.category.as_deref())?;
    if json {
        print_json(&forecast)?;
    } else {
        render_forecast(&forecast);
    }
    Ok(())
}

fn handle_risk(context: &CliContext, args: InputArgs, json: bool) -> Result<()> {
    let inputs: RiskInputs = read_json(&args.input)?;
    let assessment = context.fresh_engine()?.assess_risk(&inputs)?;
    if json {
        print_json(&assessment)?;
    } else {
        render_risk(&assessment);
    }
    Ok(())
}

fn handle_anomalies(context: &CliContext, args: InputArgs, json: bool) -> Result<()> {
    let engine = context.trained_engine()?;
    let current: Vec<ReturnCountRow> = read_json(&args.input)?;
    let anomalies = engine.detect_anomalies(&current)?;

    if json {
        print_json(&anomalies)?;
    } else if anomalies.is_empty() {
        println!("No anomalies detected.");
    } else {
        for anomaly in &anomalies {
            println!("- [{}] {}", anomaly.severity, anomaly.description);
        }
    }
    Ok(())
}

fn handle_insights(context: &CliContext, args: InputArgs) -> Result<()> {
    let outcomes: Vec<ReturnOutcome> = read_json(&args.input)?;
    print_json(&context.fresh_engine()?.generate_insights(&outcomes))
}

fn handle_hubs(context: &CliContext, args: HubArgs) -> Result<()> {
    let items: Vec<ReturnRecord> = read_json(&args.items)?;
    let hubs: Vec<HubCapacity> = read_json(&args.hubs)?;
    print_json(&context.fresh_engine()?.optimize_hub_assignment(&items, &hubs)?)
}

fn handle_status(context: &CliContext, json: bool) -> Result<()> {
    let engine = if context.model_path.exists() {
        context.trained_engine()?
    } else {
        context.fresh_engine()?
    };
    let status = engine.model_status();

    if json {
        print_json(&status)?;
    } else {
        let rows = [
            ("disposition", &status.disposition),
            ("forecasting", &status.forecasting),
            ("anomaly_detection", &status.anomaly_detection),
        ];
        for (name, component) in rows {
            println!(
                "{:<18} {:<18} {}",
                name,
                component.algorithm,
                if component.trained { "trained" } else { "untrained" }
            );
        }
        match status.last_trained_at {
            Some(at) => println!("Last trained: {}", at.to_rfc3339()),
            None => println!("Never trained"),
        }
    }
    Ok(())
}

fn render_forecast(forecast: &ForecastResult) {
    println!(
        "Trend {} • seasonality {:.3} • holdout MAE {:.2}",
        forecast.trend, forecast.seasonality_factor, forecast.accuracy.mae
    );
    for point in &forecast.predictions {
        println!(
            "  {:>2}. {} {:>12.2}  [{:.2}, {:.2}]",
            point.period, point.date, point.predicted_value, point.lower_bound, point.upper_bound
        );
    }
}

fn render_risk(assessment: &RiskAssessment) {
    println!(
        "Risk {} ({:.1})",
        assessment.risk_level, assessment.overall_score
    );
    for (component, score) in &assessment.component_scores {
        println!("  {:<18} {:>6.1}", component, score);
    }
    for recommendation in &assessment.recommendations {
        println!("  * {}", recommendation);
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid JSON in {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
