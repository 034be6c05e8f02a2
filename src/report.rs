//! Persisting and visualising experiment results.
//!
//! Nothing here computes anything beyond formatting: the results table is written as CSV,
//! and the trade-off plot puts chattering on the x-axis against RMSE on the y-axis.

use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;

use plotters::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::control_strategies::{BoundaryLayer, ControllerKind};
use crate::error::ReportError;
use crate::experiment::{MetricsRecord, TrialSeries};
use crate::robot::DOF;

/// Written in the boundary-layer column of inverse dynamics rows.
pub const NOT_APPLICABLE: &str = "N/A";

#[derive(Debug, Serialize, Deserialize)]
struct ResultRow {
    #[serde(rename = "Controller")]
    controller: String,
    #[serde(rename = "BoundaryLayerWidth")]
    boundary_layer_width: String,
    #[serde(rename = "RMSE")]
    rmse: f64,
    #[serde(rename = "Chattering")]
    chattering: f64,
}

impl From<&MetricsRecord> for ResultRow {
    fn from(r: &MetricsRecord) -> Self {
        ResultRow {
            controller: r.controller.tag().to_string(),
            boundary_layer_width: r
                .controller
                .boundary_layer()
                .map(|phi| phi.to_string())
                .unwrap_or_else(|| NOT_APPLICABLE.to_string()),
            rmse: r.rmse,
            chattering: r.chattering,
        }
    }
}

impl ResultRow {
    fn into_record(self) -> Result<MetricsRecord, String> {
        let controller = match self.controller.as_str() {
            "ID" => ControllerKind::InverseDynamics,
            "SMC" => {
                let phi: f64 = self
                    .boundary_layer_width
                    .parse()
                    .map_err(|_| {
                        format!("bad boundary layer width {:?}", self.boundary_layer_width)
                    })?;
                ControllerKind::SlidingMode(
                    BoundaryLayer::new(phi)
                        .ok_or_else(|| format!("boundary layer width {} is not positive", phi))?,
                )
            }
            other => return Err(format!("unknown controller {:?}", other)),
        };
        Ok(MetricsRecord {
            controller,
            rmse: self.rmse,
            chattering: self.chattering,
        })
    }
}

fn create_parent_dir(path: &Path) -> Result<(), ReportError> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => {
            fs::create_dir_all(dir).map_err(|source| ReportError::Io {
                path: dir.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

/// Write the results table: a header row plus one row per trial.
pub fn persist(records: &[MetricsRecord], path: &Path) -> Result<(), ReportError> {
    let csv_err = |source| ReportError::Csv {
        path: path.to_path_buf(),
        source,
    };

    create_parent_dir(path)?;
    let mut wtr = csv::Writer::from_path(path).map_err(csv_err)?;
    for record in records {
        wtr.serialize(ResultRow::from(record)).map_err(csv_err)?;
    }
    wtr.flush().map_err(|e| csv_err(e.into()))?;

    info!(path = %path.display(), rows = records.len(), "results table written");
    Ok(())
}

/// Read a results table written by [`persist`].
pub fn load(path: &Path) -> Result<Vec<MetricsRecord>, ReportError> {
    let mut rdr = csv::Reader::from_path(path).map_err(|source| ReportError::Csv {
        path: path.to_path_buf(),
        source,
    })?;

    rdr.deserialize::<ResultRow>()
        .enumerate()
        .map(|(i, row)| {
            row.map_err(|source| ReportError::Csv {
                path: path.to_path_buf(),
                source,
            })?
            .into_record()
            .map_err(|message| ReportError::Malformed {
                path: path.to_path_buf(),
                row: i + 1,
                message,
            })
        })
        .collect()
}

/// Write a per-step trace of one trial: time, joint positions and sliding variable.
pub fn write_trace(series: &TrialSeries, path: &Path) -> Result<(), ReportError> {
    let csv_err = |source| ReportError::Csv {
        path: path.to_path_buf(),
        source,
    };

    create_parent_dir(path)?;
    let mut wtr = csv::Writer::from_path(path).map_err(csv_err)?;

    let header: Vec<String> = std::iter::once("t".to_string())
        .chain((0..DOF).map(|j| format!("q{}", j)))
        .chain((0..DOF).map(|j| format!("s{}", j)))
        .collect();
    wtr.write_record(&header).map_err(csv_err)?;

    for c in 0..series.len() {
        let row: Vec<String> = std::iter::once(series.time[c])
            .chain(series.position.column(c).iter().copied())
            .chain(series.sliding.column(c).iter().copied())
            .map(|v| v.to_string())
            .collect();
        wtr.write_record(&row).map_err(csv_err)?;
    }
    wtr.flush().map_err(|e| csv_err(e.into()))?;
    Ok(())
}

fn plot_error<E: fmt::Display>(path: &Path) -> impl Fn(E) -> ReportError + '_ {
    move |e| ReportError::Plot {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Axis range covering `values` with some padding, never degenerate.
fn padded_range(values: impl Iterator<Item = f64>) -> std::ops::Range<f64> {
    let (lo, hi) = values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !lo.is_finite() || !hi.is_finite() {
        return 0.0..1.0;
    }
    let pad = 0.1 * (hi - lo).abs().max(1e-3);
    (lo - pad).max(0.0)..hi + pad
}

/// Scatter plot of RMSE against chattering, one marker per trial.
pub fn render_tradeoff_plot(records: &[MetricsRecord], path: &Path) -> Result<(), ReportError> {
    let err = plot_error(path);
    create_parent_dir(path)?;

    let root = BitMapBackend::new(path, (2400, 1800)).into_drawing_area();
    root.fill(&WHITE).map_err(&err)?;

    let x_range = padded_range(records.iter().map(|r| r.chattering));
    let y_range = padded_range(records.iter().map(|r| r.rmse));

    let mut chart = ChartBuilder::on(&root)
        .margin(40)
        .caption("Robustness vs Chattering Trade-Off", ("sans-serif", 72))
        .x_label_area_size(120)
        .y_label_area_size(160)
        .build_cartesian_2d(x_range, y_range)
        .map_err(&err)?;

    chart
        .configure_mesh()
        .x_desc("Chattering (mean ‖s‖)")
        .y_desc("RMSE (tracking error)")
        .axis_desc_style(("sans-serif", 52))
        .label_style(("sans-serif", 40))
        .x_label_formatter(&|v| format!("{:.3}", v))
        .y_label_formatter(&|v| format!("{:.3}", v))
        .bold_line_style(&RGBColor(160, 160, 160))
        .light_line_style(&RGBColor(225, 225, 225))
        .draw()
        .map_err(&err)?;

    for (i, record) in records.iter().enumerate() {
        let point = (record.chattering, record.rmse);
        match record.controller {
            ControllerKind::InverseDynamics => {
                chart
                    .draw_series(std::iter::once(Circle::new(point, 22, BLUE.filled())))
                    .map_err(&err)?
                    .label(record.controller.to_string())
                    .legend(|(x, y)| Circle::new((x, y), 12, BLUE.filled()));
            }
            ControllerKind::SlidingMode(_) => {
                let color = Palette99::pick(i).to_rgba();
                chart
                    .draw_series(std::iter::once(Cross::new(point, 22, color.stroke_width(6))))
                    .map_err(&err)?
                    .label(record.controller.to_string())
                    .legend(move |(x, y)| Cross::new((x, y), 12, color.stroke_width(4)));
            }
        }
    }

    if !records.is_empty() {
        chart
            .configure_series_labels()
            .background_style(&WHITE.mix(0.85))
            .border_style(&BLACK)
            .label_font(("sans-serif", 40))
            .draw()
            .map_err(&err)?;
    }

    root.present().map_err(&err)?;
    info!(path = %path.display(), "trade-off plot written");
    Ok(())
}

/// Plain-text table of the results, for the terminal.
pub fn summary_table(records: &[MetricsRecord]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<12} {:>10} {:>12} {:>12}",
        "Controller", "phi", "RMSE", "Chattering"
    );
    for r in records {
        let row = ResultRow::from(r);
        let _ = writeln!(
            out,
            "{:<12} {:>10} {:>12.6} {:>12.6}",
            row.controller, row.boundary_layer_width, row.rmse, row.chattering
        );
    }
    out
}
