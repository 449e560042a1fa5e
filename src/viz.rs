//! SVG charts and console summaries for segmentation, anomaly and satisfaction results

use crate::anomaly::{AnomalyLabel, AnomalyReport};
use crate::data::{PassengerTable, ARRIVAL_DELAY, DEPARTURE_DELAY, FLIGHT_DISTANCE};
use crate::model::ClusterId;
use crate::recommend::ServiceScore;
use crate::satisfaction::{FeatureImportance, SatisfactionPredictions};
use crate::segment::SegmentationResult;
use anyhow::{bail, Result};
use plotters::prelude::*;
use std::collections::BTreeMap;
use std::path::Path;

/// Color palette for different clusters
const CLUSTER_COLORS: [RGBColor; 5] = [RED, BLUE, GREEN, YELLOW, MAGENTA];

fn cluster_color(cluster: ClusterId) -> RGBColor {
    CLUSTER_COLORS[cluster % CLUSTER_COLORS.len()]
}

fn label_color(label: AnomalyLabel) -> RGBColor {
    match label {
        AnomalyLabel::Normal => BLUE,
        AnomalyLabel::Anomaly => RED,
    }
}

/// Horizontal bars, first entry on top, each annotated with its value
fn horizontal_bars(
    output_path: &Path,
    title: &str,
    x_desc: &str,
    bars: &[(String, f64)],
    x_max: f64,
    color: RGBColor,
) -> Result<()> {
    let n = bars.len().max(1);
    let root = SVGBackend::new(output_path, (900, 120 + 50 * n as u32)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 24))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(10)
        .build_cartesian_2d(0f64..x_max, 0f64..n as f64)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(0)
        .x_desc(x_desc)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(bars.iter().enumerate().map(|(i, (_, value))| {
        let top = (n - i) as f64;
        Rectangle::new([(0.0, top - 0.85), (*value, top - 0.15)], color.mix(0.7).filled())
    }))?;
    chart.draw_series(bars.iter().enumerate().map(|(i, (label, value))| {
        let top = (n - i) as f64;
        Text::new(
            format!("{} ({:.2})", label, value),
            (x_max * 0.01, top - 0.6),
            ("sans-serif", 14),
        )
    }))?;

    root.present()?;
    Ok(())
}

/// Bar chart of a cluster's best (`strongest`) or weakest service averages
///
/// # Arguments
/// * `cluster` - Cluster the services belong to
/// * `scores` - Service averages in display order
/// * `strongest` - Title and color the chart as top services
/// * `output_path` - Path to save the SVG chart
///
/// # Returns
/// * Result indicating success or failure
pub fn create_service_chart(
    cluster: ClusterId,
    scores: &[ServiceScore],
    strongest: bool,
    output_path: &Path,
) -> Result<()> {
    let title = if strongest {
        format!("Cluster {}: top {} services", cluster, scores.len())
    } else {
        format!("Cluster {}: services to improve", cluster)
    };
    let bars: Vec<(String, f64)> = scores.iter().map(|s| (s.service.to_string(), s.mean)).collect();
    horizontal_bars(output_path, &title, "Average rating", &bars, 5.0, cluster_color(cluster))?;
    println!("Service chart saved to: {}", output_path.display());
    Ok(())
}

/// Passenger count per cluster
pub fn create_cluster_size_chart(sizes: &BTreeMap<ClusterId, usize>, output_path: &Path) -> Result<()> {
    let Some(&last_cluster) = sizes.keys().next_back() else {
        bail!("no clusters to chart");
    };
    let max_size = sizes.values().copied().max().unwrap_or(1).max(1) as f64;

    let root = SVGBackend::new(output_path, (600, 400)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Cluster Sizes", ("sans-serif", 30))
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(-0.5f64..(last_cluster as f64 + 0.5), 0f64..(max_size * 1.1))?;

    chart
        .configure_mesh()
        .x_desc("Cluster ID")
        .y_desc("Number of Passengers")
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    chart.draw_series(sizes.iter().map(|(&cluster, &size)| {
        Rectangle::new(
            [(cluster as f64 - 0.4, 0.0), (cluster as f64 + 0.4, size as f64)],
            cluster_color(cluster).filled(),
        )
    }))?;

    root.present()?;
    println!("Cluster size chart saved to: {}", output_path.display());
    Ok(())
}

/// Flight distance against departure delay, colored by anomaly label
///
/// # Arguments
/// * `table` - Scored passengers
/// * `report` - Detector output for `table`
/// * `output_path` - Path to save the SVG chart
///
/// # Returns
/// * Result indicating success or failure
pub fn create_anomaly_scatter(table: &PassengerTable, report: &AnomalyReport, output_path: &Path) -> Result<()> {
    let distances = table.numeric_column(FLIGHT_DISTANCE)?;
    let delays = table.numeric_column_or(DEPARTURE_DELAY, 0.0)?;
    if distances.is_empty() {
        bail!("no passengers to plot");
    }

    let x_min = distances.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let x_max = distances.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let y_min = delays.iter().fold(f64::INFINITY, |a, &b| a.min(b));
    let y_max = delays.iter().fold(f64::NEG_INFINITY, |a, &b| a.max(b));
    let x_pad = ((x_max - x_min) * 0.05).max(1.0);
    let y_pad = ((y_max - y_min) * 0.05).max(1.0);

    let root = SVGBackend::new(output_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Anomaly Detection ({})", report.method),
            ("sans-serif", 30),
        )
        .margin(10)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d((x_min - x_pad)..(x_max + x_pad), (y_min - y_pad)..(y_max + y_pad))?;

    chart
        .configure_mesh()
        .x_desc(FLIGHT_DISTANCE)
        .y_desc(DEPARTURE_DELAY)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for label in [AnomalyLabel::Normal, AnomalyLabel::Anomaly] {
        let color = label_color(label);
        let points = distances
            .iter()
            .zip(delays.iter())
            .zip(report.labels.iter())
            .filter(|(_, &l)| l == label)
            .map(|((&x, &y), _)| Circle::new((x, y), 3, color.mix(0.7).filled()));

        chart
            .draw_series(points)?
            .label(label.label())
            .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    println!("Anomaly scatter plot saved to: {}", output_path.display());
    Ok(())
}

/// Five-number summary; whiskers in the box chart span min to max
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxStats {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl BoxStats {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);
        Some(Self {
            min: sorted[0],
            q1: quantile(&sorted, 0.25),
            median: quantile(&sorted, 0.5),
            q3: quantile(&sorted, 0.75),
            max: sorted[sorted.len() - 1],
        })
    }
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

/// Arrival delay distribution of normal vs anomalous passengers
pub fn create_arrival_delay_chart(table: &PassengerTable, report: &AnomalyReport, output_path: &Path) -> Result<()> {
    let delays = table.numeric_column_or(ARRIVAL_DELAY, 0.0)?;
    let groups: Vec<(AnomalyLabel, BoxStats)> = [AnomalyLabel::Normal, AnomalyLabel::Anomaly]
        .into_iter()
        .filter_map(|label| {
            let values: Vec<f64> = delays
                .iter()
                .zip(report.labels.iter())
                .filter(|(_, &l)| l == label)
                .map(|(&d, _)| d)
                .collect();
            BoxStats::from_values(&values).map(|stats| (label, stats))
        })
        .collect();
    if groups.is_empty() {
        bail!("no passengers to plot");
    }

    let y_min = groups.iter().map(|(_, s)| s.min).fold(f64::INFINITY, f64::min);
    let y_max = groups.iter().map(|(_, s)| s.max).fold(f64::NEG_INFINITY, f64::max);
    let y_pad = ((y_max - y_min) * 0.05).max(1.0);

    let root = SVGBackend::new(output_path, (600, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Arrival Delay by Anomaly Label", ("sans-serif", 26))
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(-0.5f64..1.5f64, (y_min - y_pad)..(y_max + y_pad))?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(0)
        .y_desc(ARRIVAL_DELAY)
        .axis_desc_style(("sans-serif", 15))
        .draw()?;

    for (x, (label, stats)) in groups.iter().enumerate() {
        let x = x as f64;
        let color = label_color(*label);
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(x, stats.min), (x, stats.max)],
            BLACK.stroke_width(1),
        )))?;
        chart
            .draw_series(std::iter::once(Rectangle::new(
                [(x - 0.3, stats.q1), (x + 0.3, stats.q3)],
                color.mix(0.5).filled(),
            )))?
            .label(label.label())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(x - 0.3, stats.median), (x + 0.3, stats.median)],
            BLACK.stroke_width(2),
        )))?;
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    println!("Arrival delay chart saved to: {}", output_path.display());
    Ok(())
}

/// Classifier feature importances, most important on top
pub fn create_importance_chart(importances: &[FeatureImportance], output_path: &Path) -> Result<()> {
    if importances.is_empty() {
        bail!("no feature importances to chart");
    }
    let x_max = importances.iter().map(|f| f.importance).fold(0.0, f64::max).max(1e-6) * 1.1;
    let bars: Vec<(String, f64)> = importances
        .iter()
        .map(|f| (f.feature.clone(), f.importance))
        .collect();
    horizontal_bars(output_path, "Top Feature Importances", "Importance", &bars, x_max, BLUE)?;
    println!("Feature importance chart saved to: {}", output_path.display());
    Ok(())
}

/// Print a table with one padded column per header
pub fn print_table(table: &PassengerTable) {
    let widths: Vec<usize> = table
        .headers()
        .iter()
        .enumerate()
        .map(|(i, h)| {
            table
                .rows()
                .iter()
                .map(|r| r[i].len())
                .chain(std::iter::once(h.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(widths.iter())
            .map(|(c, &w)| format!("{:w$}", c, w = w))
            .collect::<Vec<_>>()
            .join(" | ")
    };
    println!("  {}", line(table.headers()));
    println!(
        "  {}",
        widths.iter().map(|&w| "-".repeat(w)).collect::<Vec<_>>().join("-|-")
    );
    for row in table.rows() {
        println!("  {}", line(row));
    }
}

/// Print cluster statistics and per-cluster recommendations to console
pub fn print_segmentation_summary(result: &SegmentationResult) {
    println!("\n=== Segmentation Summary ===");
    println!("Total passengers: {}", result.len());

    println!("\nCluster sizes:");
    for (cluster, size) in result.cluster_sizes() {
        let percentage = size as f64 / result.len().max(1) as f64 * 100.0;
        println!("  Cluster {}: {} passengers ({:.1}%)", cluster, size, percentage);
    }

    println!("\n=== Recommendations ===");
    for recommendation in result.recommendations() {
        print!("{}", recommendation);
        if !recommendation.recommendation.is_empty() {
            let strongest = result.strongest(recommendation.cluster);
            let names: Vec<&str> = strongest.iter().map(|s| s.service).collect();
            println!("  Strongest: {}", names.join(", "));
        } else {
            println!();
        }
    }
}

pub fn print_anomaly_summary(table: &PassengerTable, report: &AnomalyReport, preview_rows: usize) {
    let summary = report.summary();
    println!("\n=== Anomaly Detection ({}) ===", report.method);
    println!("Contamination: {}", report.contamination);
    println!("Normal passengers: {}", summary.normal);
    println!("Anomalous passengers: {}", summary.anomaly);

    if summary.anomaly > 0 {
        println!("\nFirst {} anomalous passengers:", preview_rows.min(summary.anomaly));
        print_table(&report.preview(table, preview_rows));
    }
}

pub fn print_satisfaction_summary(predictions: &SatisfactionPredictions, importances: &[FeatureImportance]) {
    let (satisfied, other) = predictions.counts();
    println!("\n=== Satisfaction Prediction ===");
    println!("Satisfied: {}", satisfied);
    println!("Neutral or Dissatisfied: {}", other);
    print_importances(importances);
}

/// Print ranked feature importances, one per line
pub fn print_importances(importances: &[FeatureImportance]) {
    if importances.is_empty() {
        return;
    }
    println!("\nTop feature importances:");
    for (i, f) in importances.iter().enumerate() {
        println!("  {:2}. {:35} {:.4}", i + 1, f.feature, f.importance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::DetectionMethod;
    use crate::data::ServiceRatings;
    use crate::recommend::strongest_services;
    use std::fs;
    use tempfile::tempdir;

    fn scatter_table() -> (PassengerTable, AnomalyReport) {
        let table = PassengerTable::new(
            vec![
                FLIGHT_DISTANCE.to_string(),
                DEPARTURE_DELAY.to_string(),
                ARRIVAL_DELAY.to_string(),
            ],
            vec![
                vec!["300".into(), "0".into(), "5".into()],
                vec!["900".into(), "15".into(), "".into()],
                vec!["1200".into(), "3".into(), "0".into()],
                vec!["4000".into(), "400".into(), "390".into()],
            ],
        )
        .unwrap();
        let report = AnomalyReport {
            method: DetectionMethod::IsolationForest,
            contamination: 0.25,
            labels: vec![
                AnomalyLabel::Normal,
                AnomalyLabel::Normal,
                AnomalyLabel::Normal,
                AnomalyLabel::Anomaly,
            ],
            scores: vec![-0.4, -0.45, -0.42, -0.8],
        };
        (table, report)
    }

    fn assert_svg(path: &Path) {
        let content = fs::read_to_string(path).unwrap();
        assert!(content.contains("<svg"));
    }

    #[test]
    fn test_box_stats() {
        let stats = BoxStats::from_values(&[4.0, 1.0, 3.0, 2.0, 5.0]).unwrap();
        assert_eq!(stats.min, 1.0);
        assert_eq!(stats.q1, 2.0);
        assert_eq!(stats.median, 3.0);
        assert_eq!(stats.q3, 4.0);
        assert_eq!(stats.max, 5.0);

        let even = BoxStats::from_values(&[1.0, 2.0]).unwrap();
        assert_eq!(even.median, 1.5);
        assert!(BoxStats::from_values(&[]).is_none());
    }

    #[test]
    fn test_create_service_chart() {
        let ratings = [ServiceRatings::new([4, 3, 5, 2, 1, 4, 4, 3, 5, 2, 1, 3, 4, 5]).unwrap()];
        let scores = strongest_services(ratings.iter());
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("cluster_0_top.svg");

        create_service_chart(0, &scores, true, &output_path).unwrap();
        assert_svg(&output_path);
    }

    #[test]
    fn test_create_cluster_size_chart() {
        let sizes = BTreeMap::from([(0, 12), (2, 5), (3, 30)]);
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("sizes.svg");

        create_cluster_size_chart(&sizes, &output_path).unwrap();
        assert_svg(&output_path);
        assert!(create_cluster_size_chart(&BTreeMap::new(), &output_path).is_err());
    }

    #[test]
    fn test_create_anomaly_charts() {
        let (table, report) = scatter_table();
        let temp_dir = tempdir().unwrap();
        let scatter = temp_dir.path().join("scatter.svg");
        let boxes = temp_dir.path().join("arrival_delay.svg");

        create_anomaly_scatter(&table, &report, &scatter).unwrap();
        create_arrival_delay_chart(&table, &report, &boxes).unwrap();
        assert_svg(&scatter);
        assert_svg(&boxes);
    }

    #[test]
    fn test_create_importance_chart() {
        let importances = vec![
            FeatureImportance {
                feature: "Online boarding".to_string(),
                importance: 0.4,
            },
            FeatureImportance {
                feature: "Class".to_string(),
                importance: 0.1,
            },
        ];
        let temp_dir = tempdir().unwrap();
        let output_path = temp_dir.path().join("importances.svg");

        create_importance_chart(&importances, &output_path).unwrap();
        assert_svg(&output_path);
        assert!(create_importance_chart(&[], &output_path).is_err());
    }
}
