//! SVG charts rendered with plotters

use crate::db::queries::{MonthlyTrend, RatingCount};
use crate::error::{PipelineError, Result};
use itertools::Itertools;
use plotters::prelude::*;
use std::error::Error;
use std::path::Path;

type DrawResult = std::result::Result<(), Box<dyn Error>>;

const CHART_SIZE: (u32, u32) = (1400, 700);

fn chart_error(path: &Path, e: Box<dyn Error>) -> PipelineError {
    PipelineError::Chart(format!("{}: {}", path.display(), e))
}

/// Month as a running index so consecutive months are adjacent on the axis
pub fn month_index(year: i32, month: i32) -> i32 {
    year * 12 + (month - 1)
}

fn month_label(index: &i32) -> String {
    format!("{}-{:02}", index.div_euclid(12), index.rem_euclid(12) + 1)
}

/// Per-bank series of `(month index, mean sentiment)`, months ascending.
/// Months without a mean are left out.
pub fn trend_series(rows: &[MonthlyTrend]) -> Vec<(String, Vec<(i32, f64)>)> {
    rows.iter()
        .map(|r| r.bank_name.as_str())
        .unique()
        .map(|bank| {
            let mut points: Vec<(i32, f64)> = rows
                .iter()
                .filter(|r| r.bank_name == bank)
                .filter_map(|r| {
                    r.average_sentiment
                        .map(|avg| (month_index(r.review_year, r.review_month), avg))
                })
                .collect();
            points.sort_by_key(|(month, _)| *month);
            (bank.to_string(), points)
        })
        .filter(|(_, points)| !points.is_empty())
        .collect()
}

/// Monthly mean sentiment, one line per bank
pub fn render_sentiment_trend(rows: &[MonthlyTrend], path: &Path) -> Result<()> {
    let series = trend_series(rows);
    if series.is_empty() {
        return Err(PipelineError::Empty("no monthly sentiment to plot".to_string()));
    }
    draw_sentiment_trend(&series, path).map_err(|e| chart_error(path, e))
}

fn draw_sentiment_trend(series: &[(String, Vec<(i32, f64)>)], path: &Path) -> DrawResult {
    let points = series.iter().flat_map(|(_, pts)| pts.iter());
    let (mut x_min, mut x_max) = (i32::MAX, i32::MIN);
    let (mut y_min, mut y_max) = (0f64, 1f64);
    for (x, y) in points {
        x_min = x_min.min(*x);
        x_max = x_max.max(*x);
        y_min = y_min.min(*y);
        y_max = y_max.max(*y);
    }

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Monthly Average Sentiment Trend by Bank", ("sans-serif", 28))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d(x_min..x_max + 1, y_min..y_max)?;

    chart
        .configure_mesh()
        .x_desc("Month")
        .y_desc("Average Sentiment Score")
        .x_label_formatter(&month_label)
        .draw()?;

    for (idx, (bank, pts)) in series.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        chart
            .draw_series(LineSeries::new(pts.clone(), color.stroke_width(2)))?
            .label(bank.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2)));
        chart.draw_series(pts.iter().map(|(x, y)| Circle::new((*x, *y), 4, color.filled())))?;
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Review counts per star rating, bars grouped by bank
pub fn render_rating_distribution(rows: &[RatingCount], path: &Path) -> Result<()> {
    if rows.is_empty() {
        return Err(PipelineError::Empty("no ratings to plot".to_string()));
    }
    draw_rating_distribution(rows, path).map_err(|e| chart_error(path, e))
}

fn draw_rating_distribution(rows: &[RatingCount], path: &Path) -> DrawResult {
    let banks: Vec<&str> = rows.iter().map(|r| r.bank_name.as_str()).unique().collect();
    let max_count = rows.iter().map(|r| r.rating_count).max().unwrap_or(0).max(1) as f64;
    let bar_width = 0.8 / banks.len() as f64;

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Rating Distribution (1-5 Stars) by Bank", ("sans-serif", 28))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(70)
        .build_cartesian_2d(0.5f64..5.5f64, 0f64..max_count * 1.1)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(5)
        .x_label_formatter(&|x| format!("{:.0}", x))
        .x_desc("Rating")
        .y_desc("Number of Reviews")
        .draw()?;

    for (idx, bank) in banks.iter().enumerate() {
        let color = Palette99::pick(idx).to_rgba();
        let offset = -0.4 + idx as f64 * bar_width;
        chart
            .draw_series(rows.iter().filter(|r| r.bank_name == *bank).map(|r| {
                let x0 = r.rating as f64 + offset;
                Rectangle::new([(x0, 0.0), (x0 + bar_width, r.rating_count as f64)], color.filled())
            }))?
            .label(*bank)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperLeft)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

/// Horizontal bar chart of keyword counts, most frequent on top
pub fn render_keyword_chart(keywords: &[(String, usize)], path: &Path) -> Result<()> {
    if keywords.is_empty() {
        return Err(PipelineError::Empty("no pain point keywords to plot".to_string()));
    }
    draw_keyword_chart(keywords, path).map_err(|e| chart_error(path, e))
}

fn draw_keyword_chart(keywords: &[(String, usize)], path: &Path) -> DrawResult {
    // Bottom-up so the first keyword lands on the top row
    let rows: Vec<&(String, usize)> = keywords.iter().rev().collect();
    let n = rows.len() as i32;
    let max_count = rows.iter().map(|(_, c)| *c).max().unwrap_or(0).max(1) as f64;

    let root = SVGBackend::new(path, CHART_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Common Keywords in Low Sentiment (Pain Point) Reviews", ("sans-serif", 28))
        .margin(15)
        .x_label_area_size(50)
        .y_label_area_size(140)
        .build_cartesian_2d(0f64..max_count * 1.1, (0..n).into_segmented())?;

    let label = |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(i) => rows
            .get(*i as usize)
            .map(|(word, _)| word.clone())
            .unwrap_or_default(),
        _ => String::new(),
    };

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(rows.len())
        .y_label_formatter(&label)
        .x_desc("Occurrences")
        .draw()?;

    chart.draw_series(rows.iter().enumerate().map(|(i, (_, count))| {
        let i = i as i32;
        Rectangle::new(
            [(0.0, SegmentValue::Exact(i)), (*count as f64, SegmentValue::Exact(i + 1))],
            RED.mix(0.7).filled(),
        )
    }))?;

    root.present()?;
    Ok(())
}
