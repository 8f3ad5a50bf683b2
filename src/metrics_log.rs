//! Append-only CSV metrics log and its bar-chart rendering.
//!
//! One [`MetricsRow`] per answered query. The header is written only when
//! the file is created (or found empty); later runs append rows.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use regdoc_core::metrics::MetricsRow;

pub struct MetricsLog {
    path: PathBuf,
}

impl MetricsLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one row, creating the file (with header) and its parent
    /// directory if needed.
    pub fn append(&self, row: &MetricsRow) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create log directory {}", parent.display())
                })?;
            }
        }

        let needs_header = std::fs::metadata(&self.path)
            .map(|m| m.len() == 0)
            .unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open metrics log {}", self.path.display()))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);
        writer.serialize(row)?;
        writer.flush()?;

        tracing::debug!(path = %self.path.display(), "metrics row appended");
        println!("Logged metrics for: {}", row.query);
        Ok(())
    }

    /// All rows in file order. Fails if the file is missing, has no
    /// `query` column, or contains a malformed row.
    pub fn read_rows(&self) -> Result<Vec<MetricsRow>> {
        let mut reader = csv::Reader::from_path(&self.path)
            .with_context(|| format!("Failed to open metrics log {}", self.path.display()))?;
        let has_query = reader.headers()?.iter().any(|h| h == "query");
        if !has_query {
            anyhow::bail!("metrics log has no 'query' column");
        }
        let mut rows = Vec::new();
        for record in reader.deserialize() {
            rows.push(record?);
        }
        Ok(rows)
    }
}

/// Render latency and average score per query as an SVG bar chart.
///
/// Returns `false` (after printing why) when there is nothing to plot.
pub fn render_plot(log_path: &Path, out_path: &Path) -> Result<bool> {
    if !log_path.is_file() {
        println!("No metrics file yet.");
        return Ok(false);
    }

    let rows = match MetricsLog::new(log_path).read_rows() {
        Ok(rows) if !rows.is_empty() => rows,
        Ok(_) | Err(_) => {
            println!(
                "No data or 'query' column missing in {} - skipping plot.",
                log_path.display()
            );
            return Ok(false);
        }
    };

    std::fs::write(out_path, bar_chart_svg(&rows))
        .with_context(|| format!("Failed to write plot {}", out_path.display()))?;
    println!("Saved {}", out_path.display());
    Ok(true)
}

const BAR_WIDTH: f64 = 18.0;
const GROUP_GAP: f64 = 24.0;
const PLOT_HEIGHT: f64 = 240.0;
const MARGIN_LEFT: f64 = 60.0;
const MARGIN_TOP: f64 = 50.0;
const LABEL_SPACE: f64 = 160.0;
const LATENCY_COLOR: &str = "#1f77b4";
const SCORE_COLOR: &str = "#ff7f0e";

fn bar_chart_svg(rows: &[MetricsRow]) -> String {
    let group_width = BAR_WIDTH * 2.0 + GROUP_GAP;
    let width = MARGIN_LEFT + group_width * rows.len() as f64 + 40.0;
    let height = MARGIN_TOP + PLOT_HEIGHT + LABEL_SPACE;
    let max = rows
        .iter()
        .flat_map(|r| [r.latency_sec, r.avg_score])
        .fold(0.0_f64, f64::max);
    let scale = if max > 0.0 { PLOT_HEIGHT / max } else { 0.0 };
    let baseline = MARGIN_TOP + PLOT_HEIGHT;

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width:.0}" height="{height:.0}" font-family="sans-serif" font-size="11">"#
    );
    let _ = writeln!(
        svg,
        r#"<text x="{:.1}" y="24" font-size="16" text-anchor="middle">Query Metrics Overview</text>"#,
        width / 2.0
    );
    let _ = writeln!(
        svg,
        r#"<line x1="{MARGIN_LEFT}" y1="{baseline}" x2="{:.1}" y2="{baseline}" stroke="black"/>"#,
        width - 20.0
    );
    let _ = writeln!(
        svg,
        r#"<line x1="{MARGIN_LEFT}" y1="{MARGIN_TOP}" x2="{MARGIN_LEFT}" y2="{baseline}" stroke="black"/>"#
    );
    let _ = writeln!(
        svg,
        r#"<text x="{:.1}" y="{:.1}" text-anchor="end">{:.2}</text>"#,
        MARGIN_LEFT - 4.0,
        MARGIN_TOP + 4.0,
        max
    );

    for (i, row) in rows.iter().enumerate() {
        let x = MARGIN_LEFT + GROUP_GAP / 2.0 + group_width * i as f64;
        for (j, (value, color)) in [(row.latency_sec, LATENCY_COLOR), (row.avg_score, SCORE_COLOR)]
            .into_iter()
            .enumerate()
        {
            let h = (value.max(0.0) * scale).min(PLOT_HEIGHT);
            let _ = writeln!(
                svg,
                r#"<rect x="{:.1}" y="{:.1}" width="{BAR_WIDTH}" height="{:.1}" fill="{color}"/>"#,
                x + BAR_WIDTH * j as f64,
                baseline - h,
                h
            );
        }
        let lx = x + BAR_WIDTH;
        let ly = baseline + 10.0;
        let _ = writeln!(
            svg,
            r#"<text x="{lx:.1}" y="{ly:.1}" text-anchor="end" transform="rotate(-60 {lx:.1} {ly:.1})">{}</text>"#,
            escape_xml(&truncate_label(&row.query, 40))
        );
    }

    let legend_x = width - 150.0;
    for (k, (name, color)) in [("latency_sec", LATENCY_COLOR), ("avg_score", SCORE_COLOR)]
        .into_iter()
        .enumerate()
    {
        let y = MARGIN_TOP + 16.0 * k as f64;
        let _ = writeln!(
            svg,
            r#"<rect x="{legend_x:.1}" y="{:.1}" width="10" height="10" fill="{color}"/><text x="{:.1}" y="{:.1}">{name}</text>"#,
            y - 9.0,
            legend_x + 14.0,
            y
        );
    }

    svg.push_str("</svg>\n");
    svg
}

fn truncate_label(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(query: &str, latency: f64, score: f64) -> MetricsRow {
        MetricsRow {
            query: query.to_string(),
            latency_sec: latency,
            num_chunks: 3,
            avg_score: score,
            answer: "Answer, with a comma\nand a newline [source: a.pdf, page: 0]".to_string(),
        }
    }

    #[test]
    fn header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = MetricsLog::new(dir.path().join("logs").join("metrics.csv"));
        log.append(&row("first", 1.2, 0.4)).unwrap();
        log.append(&row("second", 0.8, 0.6)).unwrap();

        let text = std::fs::read_to_string(log.path()).unwrap();
        assert_eq!(
            text.matches("query,latency_sec,num_chunks,avg_score,answer").count(),
            1
        );
        assert!(text.starts_with(&MetricsRow::HEADER.join(",")));

        let rows = log.read_rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].query, "second");
        assert_eq!(rows[0].answer, row("first", 1.2, 0.4).answer);
    }

    #[test]
    fn plot_without_log_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("plot.svg");
        assert!(!render_plot(&dir.path().join("missing.csv"), &out).unwrap());
        assert!(!out.exists());
    }

    #[test]
    fn plot_with_header_only_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("metrics.csv");
        std::fs::write(&log, "query,latency_sec,num_chunks,avg_score,answer\n").unwrap();
        let out = dir.path().join("plot.svg");
        assert!(!render_plot(&log, &out).unwrap());
        assert!(!out.exists());
    }

    #[test]
    fn plot_without_query_column_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("metrics.csv");
        std::fs::write(&log, "foo,bar\n1,2\n").unwrap();
        let out = dir.path().join("plot.svg");
        assert!(!render_plot(&log, &out).unwrap());
    }

    #[test]
    fn plot_draws_two_bars_per_query() {
        let dir = tempfile::tempdir().unwrap();
        let log = MetricsLog::new(dir.path().join("metrics.csv"));
        log.append(&row("CSRD <thresholds> & scope", 2.5, 0.35)).unwrap();
        log.append(&row("GEG heat pumps", 1.0, 0.5)).unwrap();

        let out = dir.path().join("plot.svg");
        assert!(render_plot(log.path(), &out).unwrap());
        let svg = std::fs::read_to_string(&out).unwrap();
        assert!(svg.starts_with("<svg"));
        // 2 queries x 2 bars + 2 legend swatches
        assert_eq!(svg.matches("<rect").count(), 6);
        assert!(svg.contains("CSRD &lt;thresholds&gt; &amp; scope"));
    }

    #[test]
    fn long_labels_are_truncated() {
        let label = truncate_label(&"x".repeat(100), 40);
        assert_eq!(label.chars().count(), 40);
        assert!(label.ends_with("..."));
    }
}
