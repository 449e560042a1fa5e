//! skysatisfy: airline passenger segmentation, recommendations and anomaly detection
//!
//! This is the main entrypoint that loads the pretrained artifacts, runs the
//! requested analysis and writes its CSV output and charts.

use anyhow::{Context, Result};
use clap::Parser;
use env_logger::Env;
use skysatisfy::anomaly;
use skysatisfy::artifacts;
use skysatisfy::cli::{Args, Command};
use skysatisfy::satisfaction::{Satisfaction, SatisfactionModel};
use skysatisfy::segment::Segmenter;
use skysatisfy::{viz, AnalysisSession, PassengerTable};
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

fn main() -> ExitCode {
    // Parse command-line arguments
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("✗ Error: {:#}", err);
            // exit code 2: the upload or arguments need fixing
            let recoverable = err
                .downcast_ref::<skysatisfy::Error>()
                .map(skysatisfy::Error::is_recoverable)
                .unwrap_or(false);
            if recoverable {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let start_time = Instant::now();
    match &args.command {
        Command::Segment {
            input,
            output,
            plot_dir,
            json,
        } => run_segmentation(args, input, output, plot_dir.as_deref(), *json)?,
        Command::Predict { .. } => run_prediction_mode(args)?,
        Command::Anomaly {
            input,
            output,
            anomalies_only,
            preview,
            plot_dir,
            json,
            ..
        } => run_anomaly_detection(
            args,
            input,
            output,
            anomalies_only.as_deref(),
            *preview,
            plot_dir.as_deref(),
            *json,
        )?,
        Command::Satisfaction {
            input,
            output,
            top,
            plot_dir,
        } => run_satisfaction(args, input, output, *top, plot_dir.as_deref())?,
        Command::PredictSatisfaction { top, .. } => run_manual_satisfaction(args, *top)?,
    }

    if args.verbose {
        println!("\nTotal processing time: {:.2}s", start_time.elapsed().as_secs_f64());
    }
    Ok(())
}

fn load_table(input: &Path) -> Result<PassengerTable> {
    let table = PassengerTable::from_path(input)
        .with_context(|| format!("failed to read passengers from {}", input.display()))?;
    println!("✓ Data loaded: {} passengers", table.len());
    Ok(table)
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))
}

/// Segment every passenger of an upload
fn run_segmentation(args: &Args, input: &Path, output: &Path, plot_dir: Option<&Path>, json: bool) -> Result<()> {
    println!("=== Passenger Segmentation ===\n");

    let loaded = artifacts::segmentation(&args.artifact_paths())?;
    println!("✓ Model loaded: {} clusters", loaded.model.n_clusters());

    let table = load_table(input)?;

    // Assign clusters
    let segmenter = Segmenter::new(&loaded.encoders, &loaded.model);
    let mut session = AnalysisSession::new();
    let result = session.segment_upload(&segmenter, &table)?;
    println!("✓ Passengers segmented");

    // Save results
    result.table().write_path(output)?;
    println!("✓ Results saved to: {}", output.display());

    if json {
        println!("{}", serde_json::to_string_pretty(&result.report())?);
    } else {
        viz::print_segmentation_summary(result);
    }

    // Generate visualizations
    if let Some(dir) = plot_dir {
        ensure_dir(dir)?;
        viz::create_cluster_size_chart(&result.cluster_sizes(), &dir.join("cluster_sizes.svg"))?;
        for recommendation in result.recommendations() {
            if recommendation.recommendation.is_empty() {
                continue;
            }
            let cluster = recommendation.cluster;
            viz::create_service_chart(
                cluster,
                recommendation.recommendation.services(),
                false,
                &dir.join(format!("cluster_{}_improve.svg", cluster)),
            )?;
            viz::create_service_chart(
                cluster,
                &result.strongest(cluster),
                true,
                &dir.join(format!("cluster_{}_top.svg", cluster)),
            )?;
        }
        println!("\n✓ Visualizations generated in {}", dir.display());
    }

    Ok(())
}

/// Run prediction mode for a single passenger
fn run_prediction_mode(args: &Args) -> Result<()> {
    println!("=== Prediction Mode ===");

    let Some(record) = args.command.passenger_record()? else {
        return Ok(());
    };
    println!(
        "Input: age={}, {}, {}, {}, distance={}",
        record.age, record.customer_type, record.travel_type, record.class, record.flight_distance
    );

    let loaded = artifacts::segmentation(&args.artifact_paths())?;
    let segmenter = Segmenter::new(&loaded.encoders, &loaded.model);
    let mut session = AnalysisSession::new();
    let result = session.segment_passenger(&segmenter, record)?;

    let passenger = &result.passengers()[0];
    println!("\n✓ Predicted Cluster: {}", passenger.cluster);
    println!("  Age group: {}", passenger.age_group);
    println!("  Flight category: {}", passenger.flight_category);

    let recommendation = result.recommendation(passenger.cluster);
    if !recommendation.recommendation.is_empty() {
        println!();
        print!("{}", recommendation);
    }

    Ok(())
}

/// Label the unusual passengers of an upload
fn run_anomaly_detection(
    args: &Args,
    input: &Path,
    output: &Path,
    anomalies_only: Option<&Path>,
    preview: usize,
    plot_dir: Option<&Path>,
    json: bool,
) -> Result<()> {
    println!("=== Anomaly Detection ===\n");

    let config = args
        .command
        .detector_config()
        .context("anomaly settings missing")?;
    let table = load_table(input)?;

    // Score passengers
    let detect_start = Instant::now();
    let report = anomaly::detect(&table, &config)?;
    println!("✓ Passengers scored with {}", report.method);
    if args.verbose {
        println!("  Detection time: {:.2}s", detect_start.elapsed().as_secs_f64());
    }

    report.annotate(&table).write_path(output)?;
    println!("✓ Results saved to: {}", output.display());
    if let Some(path) = anomalies_only {
        report.anomalies(&table).write_path(path)?;
        println!("✓ Anomalies saved to: {}", path.display());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&report.summary())?);
    } else {
        viz::print_anomaly_summary(&table, &report, preview);
    }

    if let Some(dir) = plot_dir {
        ensure_dir(dir)?;
        viz::create_anomaly_scatter(&table, &report, &dir.join("anomaly_scatter.svg"))?;
        viz::create_arrival_delay_chart(&table, &report, &dir.join("arrival_delay.svg"))?;
        println!("\n✓ Visualizations generated in {}", dir.display());
    }

    Ok(())
}

/// Predict satisfaction for every passenger of an upload
fn run_satisfaction(args: &Args, input: &Path, output: &Path, top: usize, plot_dir: Option<&Path>) -> Result<()> {
    println!("=== Satisfaction Prediction ===\n");

    let model: &SatisfactionModel = artifacts::satisfaction_model(&args.artifact_paths())?;
    println!("✓ Model loaded: {} trees", model.trees.len());

    let table = load_table(input)?;
    let predictions = model.predict_table(&table)?;
    predictions.annotate(&table).write_path(output)?;
    println!("✓ Results saved to: {}", output.display());

    let importances = model.ranked_importances(top);
    viz::print_satisfaction_summary(&predictions, &importances);

    if let Some(dir) = plot_dir {
        ensure_dir(dir)?;
        viz::create_importance_chart(&importances, &dir.join("feature_importances.svg"))?;
        println!("\n✓ Visualizations generated in {}", dir.display());
    }

    Ok(())
}

/// Predict satisfaction for a single manually entered passenger
fn run_manual_satisfaction(args: &Args, top: usize) -> Result<()> {
    println!("=== Satisfaction Prediction Mode ===");

    let Some(features) = args.command.manual_features()? else {
        return Ok(());
    };

    let model: &SatisfactionModel = artifacts::satisfaction_model(&args.artifact_paths())?;
    let prediction = model.predict_manual(&features)?;
    match prediction {
        Satisfaction::Satisfied => println!("\n✓ The passenger is likely to be Satisfied."),
        Satisfaction::NeutralOrDissatisfied => {
            println!("\n✓ The passenger is likely Neutral or Dissatisfied.")
        }
    }

    viz::print_importances(&model.ranked_importances(top));
    Ok(())
}
