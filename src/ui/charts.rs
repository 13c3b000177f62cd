use crate::model::{Candle, ChartType, Interval};
use chrono::Local;
use num_format::{Locale, ToFormattedString};
use ratatui::{
    backend::Backend,
    layout::Rect,
    style::{Color, Style},
    symbols,
    text::Span,
    widgets::{Axis, Bar, BarChart, BarGroup, Block, Borders, Chart, Dataset, GraphType, Paragraph, Sparkline},
    Frame,
};
use rust_decimal::prelude::ToPrimitive;

/// Vertical resolution of the area fill.
const AREA_FILL_ROWS: usize = 40;

/// `[min, max]` of `values`, padded so flat series still get a visible range.
pub fn price_bounds(values: impl Iterator<Item = f64>) -> Option<[f64; 2]> {
    let (min, max) = values.fold(None, |acc: Option<(f64, f64)>, v| match acc {
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        None => Some((v, v)),
    })?;

    let range = max - min;
    let pad = if range > 0.0 { range * 0.02 } else { 1.0 };
    Some([min - pad, max + pad])
}

/// Points under each close, down to `floor`, drawn as the area fill.
pub fn area_fill(points: &[(f64, f64)], floor: f64) -> Vec<(f64, f64)> {
    let Some(top) = points.iter().map(|p| p.1).reduce(f64::max) else {
        return Vec::new();
    };
    let step = (top - floor) / AREA_FILL_ROWS as f64;
    if step <= 0.0 {
        return Vec::new();
    }

    points
        .iter()
        .flat_map(|&(x, y)| {
            (0..AREA_FILL_ROWS)
                .map(move |k| floor + k as f64 * step)
                .take_while(move |&level| level < y)
                .map(move |level| (x, level))
        })
        .collect()
}

/// Bar heights relative to `baseline`, in cents so small moves stay visible.
pub fn bar_heights(closes: &[f64], baseline: f64) -> Vec<u64> {
    closes
        .iter()
        .map(|c| ((c - baseline).max(0.0) * 100.0).round() as u64)
        .collect()
}

fn time_label(candle: &Candle, interval: Interval) -> String {
    let local = candle.open_time.with_timezone(&Local);
    match interval {
        Interval::H1 => local.format("%m-%d %H:%M").to_string(),
        Interval::D1 | Interval::W1 => local.format("%Y-%m-%d").to_string(),
    }
}

fn placeholder<B: Backend>(f: &mut Frame<B>, area: Rect, title: &str, message: &str) {
    let message = Paragraph::new(message.to_string())
        .block(Block::default().borders(Borders::ALL).title(title.to_string()));
    f.render_widget(message, area);
}

pub fn render_price_chart<B: Backend>(
    f: &mut Frame<B>,
    area: Rect,
    title: &str,
    candles: &[Candle],
    sma: Option<&[Option<f64>]>,
    chart_type: ChartType,
    interval: Interval,
) {
    if candles.len() < 2 {
        placeholder(f, area, title, "Insufficient data for chart");
        return;
    }

    match chart_type {
        ChartType::Candlestick => render_candle_chart(f, area, title, candles),
        ChartType::Bar => render_bar_chart(f, area, title, candles),
        ChartType::Line | ChartType::Area => {
            render_line_chart(f, area, title, candles, sma, chart_type == ChartType::Area, interval)
        }
    }
}

fn render_line_chart<B: Backend>(
    f: &mut Frame<B>,
    area: Rect,
    title: &str,
    candles: &[Candle],
    sma: Option<&[Option<f64>]>,
    filled: bool,
    interval: Interval,
) {
    let points: Vec<(f64, f64)> = candles
        .iter()
        .enumerate()
        .map(|(i, c)| (i as f64, c.close_f64()))
        .collect();
    let sma_points: Vec<(f64, f64)> = sma
        .unwrap_or(&[])
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i as f64, v)))
        .collect();

    let Some([y_min, y_max]) = price_bounds(points.iter().chain(&sma_points).map(|p| p.1)) else {
        return;
    };
    let fill_points = if filled {
        area_fill(&points, y_min)
    } else {
        Vec::new()
    };

    let mut datasets = Vec::new();
    if filled {
        datasets.push(
            Dataset::default()
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Blue))
                .data(&fill_points),
        );
    }
    datasets.push(
        Dataset::default()
            .name("Close Price")
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(Color::LightBlue))
            .data(&points),
    );
    if !sma_points.is_empty() {
        datasets.push(
            Dataset::default()
                .name("20-Period MA")
                .marker(symbols::Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(Color::Yellow))
                .data(&sma_points),
        );
    }

    let last = candles.len() - 1;
    let x_labels = vec![
        Span::raw(time_label(&candles[0], interval)),
        Span::raw(time_label(&candles[last / 2], interval)),
        Span::raw(time_label(&candles[last], interval)),
    ];
    let y_labels = vec![
        Span::raw(format!("{:.2}", y_min)),
        Span::raw(format!("{:.2}", (y_min + y_max) / 2.0)),
        Span::raw(format!("{:.2}", y_max)),
    ];

    let chart = Chart::new(datasets)
        .block(Block::default().borders(Borders::ALL).title(title.to_string()))
        .x_axis(
            Axis::default()
                .title("Date")
                .style(Style::default().fg(Color::Gray))
                .bounds([0.0, last as f64])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .title("Price")
                .style(Style::default().fg(Color::Gray))
                .bounds([y_min, y_max])
                .labels(y_labels),
        );
    f.render_widget(chart, area);
}

fn render_bar_chart<B: Backend>(f: &mut Frame<B>, area: Rect, title: &str, candles: &[Candle]) {
    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let inner = block.inner(area);
    if inner.width == 0 {
        return;
    }

    // keep only the bars that fit, newest last
    let visible = candles.len().min(inner.width as usize);
    let shown = &candles[candles.len() - visible..];
    let closes: Vec<f64> = shown.iter().map(Candle::close_f64).collect();
    let Some([baseline, _]) = price_bounds(closes.iter().copied()) else {
        return;
    };

    let bars: Vec<Bar> = bar_heights(&closes, baseline)
        .into_iter()
        .map(|height| Bar::default().value(height).text_value(String::new()))
        .collect();
    let bar_width = (inner.width / visible as u16).max(1);

    let chart = BarChart::default()
        .block(block)
        .bar_width(bar_width)
        .bar_gap(0)
        .bar_style(Style::default().fg(Color::Blue))
        .data(BarGroup::default().bars(&bars));
    f.render_widget(chart, area);
}

/// Screen row for `price` inside `area`, top row for `min + range`.
/// Prices outside the range are pinned to the edge rows.
fn candle_row(price: f64, min_price: f64, price_range: f64, area: Rect) -> u16 {
    let rows = area.height.saturating_sub(1) as f64;
    let offset = (((price - min_price) / price_range) * rows).round().clamp(0.0, rows) as u16;
    area.y + area.height.saturating_sub(1) - offset
}

fn render_candle_chart<B: Backend>(f: &mut Frame<B>, area: Rect, title: &str, candles: &[Candle]) {
    let to_f64 = |d: rust_decimal::Decimal| d.to_f64().unwrap_or(0.0);

    let chart_block = Block::default().borders(Borders::ALL).title(title.to_string());
    let inner_area = chart_block.inner(area);
    if inner_area.height < 3 || inner_area.width < 10 {
        return;
    }

    let candle_width: u16 = 1;
    let candle_spacing: u16 = 1;
    let fits = (inner_area.width / (candle_width + candle_spacing)) as usize;
    let shown = &candles[candles.len().saturating_sub(fits)..];

    let min_price = shown.iter().map(|c| to_f64(c.low)).fold(f64::INFINITY, f64::min);
    let max_price = shown.iter().map(|c| to_f64(c.high)).fold(f64::NEG_INFINITY, f64::max);
    let price_range = max_price - min_price;
    if price_range <= 0.0 {
        placeholder(f, area, title, "No price variation to display");
        return;
    }
    f.render_widget(chart_block, area);

    let to_y = |price: f64| candle_row(price, min_price, price_range, inner_area);

    for (i, candle) in shown.iter().enumerate() {
        let x = inner_area.x + (i as u16 * (candle_width + candle_spacing));
        if x >= inner_area.right() {
            break;
        }

        let open_y = to_y(to_f64(candle.open));
        let close_y = to_y(to_f64(candle.close));
        let high_y = to_y(to_f64(candle.high));
        let low_y = to_y(to_f64(candle.low));

        let color = if candle.is_bullish() { Color::Green } else { Color::Red };

        // wick, screen rows grow downwards
        for y in high_y..=low_y {
            let wick = Paragraph::new("│").style(Style::default().fg(color));
            f.render_widget(wick, Rect::new(x, y, 1, 1));
        }

        for y in open_y.min(close_y)..=open_y.max(close_y) {
            let body = Paragraph::new("█").style(Style::default().fg(color));
            f.render_widget(body, Rect::new(x, y, candle_width, 1));
        }
    }

    let top_label = Paragraph::new(format!("{:.2}", max_price)).style(Style::default().fg(Color::Gray));
    let bottom_label = Paragraph::new(format!("{:.2}", min_price)).style(Style::default().fg(Color::Gray));
    let label_width = 12.min(inner_area.width);
    f.render_widget(
        top_label,
        Rect::new(inner_area.right() - label_width, inner_area.y, label_width, 1),
    );
    f.render_widget(
        bottom_label,
        Rect::new(inner_area.right() - label_width, inner_area.bottom() - 1, label_width, 1),
    );
}

pub fn format_volume(volume: u64) -> String {
    volume.to_formatted_string(&Locale::en)
}

pub fn render_volume<B: Backend>(f: &mut Frame<B>, area: Rect, candles: &[Candle]) {
    let volumes: Vec<u64> = candles
        .iter()
        .map(|c| c.volume.round().to_u64().unwrap_or(0))
        .collect();
    let title = match volumes.last() {
        Some(last) => format!("Trading Volume (last {})", format_volume(*last)),
        None => "Trading Volume".to_string(),
    };

    let block = Block::default().borders(Borders::ALL).title(title);
    let width = block.inner(area).width as usize;
    let shown = &volumes[volumes.len().saturating_sub(width)..];

    let sparkline = Sparkline::default()
        .block(block)
        .data(shown)
        .bar_set(symbols::bar::NINE_LEVELS)
        .style(Style::default().fg(Color::Cyan));
    f.render_widget(sparkline, area);
}
