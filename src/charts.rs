//! The two report figures, rendered as standalone SVG.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};

use crate::alliance::DiseaseCategory;
use crate::error::KiraError;
use crate::report::escape_html;
use crate::uniprot::VariantSpan;

pub const DISEASE_CHART_FILE: &str = "disease_annotations_plot.svg";
pub const VARIANT_CHART_FILE: &str = "variations_plot.svg";

const DISEASE_COLOUR: &str = "#30b683";
const NATURAL_COLOUR: &str = "#16abe5";
const MUTAGENESIS_COLOUR: &str = "#30b683";
const FONT: &str = "Lexend, Helvetica, Arial, sans-serif";

/// Horizontal bar chart of disease categories. Expects rows already filtered and sorted; the
/// first row is drawn at the bottom.
pub fn disease_chart_svg(rows: &[&DiseaseCategory]) -> Option<String> {
    if rows.is_empty() {
        return None;
    }
    let row_height = 28.0;
    let left = 260.0;
    let right = 760.0;
    let top = 60.0;
    let plot_height = row_height * rows.len() as f64;
    let bottom = top + plot_height;
    let width = 800.0;
    let height = bottom + 70.0;

    let max = rows.iter().map(|row| row.count).max().unwrap_or(1).max(1);
    let step = max.div_ceil(5).max(1);
    let axis_max = step * max.div_ceil(step);
    let scale = (right - left) / axis_max as f64;

    let mut svg = open_svg(width, height);
    title(&mut svg, width, "Figure 1: Disease Annotation Level by Category");

    for (index, row) in rows.iter().enumerate() {
        let y = bottom - row_height * (index as f64 + 1.0) + 4.0;
        let bar = row.count as f64 * scale;
        let _ = writeln!(
            svg,
            r#"<rect x="{left:.2}" y="{y:.2}" width="{bar:.2}" height="{:.2}" fill="{DISEASE_COLOUR}"/>"#,
            row_height - 8.0
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.2}" y="{:.2}" font-size="12" text-anchor="end">{}</text>"#,
            left - 8.0,
            y + (row_height - 8.0) / 2.0 + 4.0,
            escape_html(row.name)
        );
    }

    let mut tick = 0;
    while tick <= axis_max {
        let x = left + tick as f64 * scale;
        let _ = writeln!(
            svg,
            r##"<line x1="{x:.2}" y1="{bottom:.2}" x2="{x:.2}" y2="{:.2}" stroke="#333" stroke-width="0.5"/>"##,
            bottom + 5.0
        );
        let _ = writeln!(
            svg,
            r#"<text x="{x:.2}" y="{:.2}" font-size="11" text-anchor="middle">{tick}</text>"#,
            bottom + 18.0
        );
        tick += step;
    }
    axes(&mut svg, left, top, right, bottom);
    let _ = writeln!(
        svg,
        r#"<text x="{:.2}" y="{:.2}" font-size="13" text-anchor="middle">Annotation Count</text>"#,
        (left + right) / 2.0,
        bottom + 42.0
    );
    let _ = writeln!(
        svg,
        r#"<text x="16" y="{:.2}" font-size="13" text-anchor="middle" transform="rotate(-90 16 {:.2})">Disease Category</text>"#,
        (top + bottom) / 2.0,
        (top + bottom) / 2.0
    );
    svg.push_str("</svg>\n");
    Some(svg)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    Natural,
    Mutagenesis,
}

/// One stacked rectangle of the variant chart, in sequence and frequency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantBar {
    pub kind: VariantKind,
    pub start: u64,
    pub width: u64,
    pub base: usize,
    pub height: usize,
}

fn count_spans(spans: &[VariantSpan]) -> BTreeMap<(u64, u64), usize> {
    let mut counts = BTreeMap::new();
    for span in spans {
        *counts.entry((span.start, span.end)).or_insert(0) += 1;
    }
    counts
}

/// Natural variants sit on a baseline of 1; mutagenesis on the same span stacks on top of them.
pub fn variant_bars(natural: &[VariantSpan], mutagenesis: &[VariantSpan]) -> Vec<VariantBar> {
    let natural_counts = count_spans(natural);
    let mutagenesis_counts = count_spans(mutagenesis);
    let mut bars = Vec::new();
    for (&(start, end), &count) in &natural_counts {
        bars.push(VariantBar {
            kind: VariantKind::Natural,
            start,
            width: end.saturating_sub(start) + 1,
            base: 1,
            height: count,
        });
    }
    for (&(start, end), &count) in &mutagenesis_counts {
        bars.push(VariantBar {
            kind: VariantKind::Mutagenesis,
            start,
            width: end.saturating_sub(start) + 1,
            base: natural_counts.get(&(start, end)).copied().unwrap_or(0) + 1,
            height: count,
        });
    }
    bars
}

/// Upper bound of the frequency axis: highest combined count on any span, plus two.
pub fn variant_axis_max(natural: &[VariantSpan], mutagenesis: &[VariantSpan]) -> Option<usize> {
    let mut combined = count_spans(natural);
    for (span, count) in count_spans(mutagenesis) {
        *combined.entry(span).or_insert(0) += count;
    }
    combined.values().max().map(|max| max + 2)
}

/// `None` when the sequence length is unusable or there is nothing to plot.
pub fn variant_chart_svg(
    natural: &[VariantSpan],
    mutagenesis: &[VariantSpan],
    sequence_length: u64,
) -> Option<String> {
    if sequence_length == 0 {
        return None;
    }
    let y_max = variant_axis_max(natural, mutagenesis)?;

    let width = 800.0;
    let height = 440.0;
    let left = 70.0;
    let right = 770.0;
    let top = 50.0;
    let bottom = 340.0;
    let x_scale = (right - left) / sequence_length as f64;
    let y_scale = (bottom - top) / y_max as f64;

    let mut svg = open_svg(width, height);
    title(&mut svg, width, "Figure 2: Mutagenesis and Natural Variations");
    let _ = writeln!(
        svg,
        r#"<clipPath id="plot"><rect x="{left}" y="{top}" width="{:.2}" height="{:.2}"/></clipPath>"#,
        right - left,
        bottom - top
    );
    svg.push_str("<g clip-path=\"url(#plot)\">\n");
    for bar in variant_bars(natural, mutagenesis) {
        let colour = match bar.kind {
            VariantKind::Natural => NATURAL_COLOUR,
            VariantKind::Mutagenesis => MUTAGENESIS_COLOUR,
        };
        let x = left + bar.start as f64 * x_scale;
        let w = bar.width as f64 * x_scale;
        let y = bottom - (bar.base + bar.height) as f64 * y_scale;
        let h = bar.height as f64 * y_scale;
        let _ = writeln!(
            svg,
            r#"<rect x="{x:.2}" y="{y:.2}" width="{w:.2}" height="{h:.2}" fill="{colour}" stroke="black" stroke-width="0.1"/>"#
        );
    }
    svg.push_str("</g>\n");

    for tick in ticks(sequence_length, 8) {
        let x = left + tick as f64 * x_scale;
        let _ = writeln!(
            svg,
            r#"<text x="{x:.2}" y="{:.2}" font-size="11" text-anchor="middle">{tick}</text>"#,
            bottom + 16.0
        );
    }
    for tick in ticks(y_max as u64, 6) {
        let y = bottom - tick as f64 * y_scale;
        let _ = writeln!(
            svg,
            r#"<text x="{:.2}" y="{:.2}" font-size="11" text-anchor="end">{tick}</text>"#,
            left - 6.0,
            y + 4.0
        );
    }
    axes(&mut svg, left, top, right, bottom);
    let _ = writeln!(
        svg,
        r#"<text x="{:.2}" y="{:.2}" font-size="13" text-anchor="middle">Location</text>"#,
        (left + right) / 2.0,
        bottom + 36.0
    );
    let _ = writeln!(
        svg,
        r#"<text x="18" y="{:.2}" font-size="13" text-anchor="middle" transform="rotate(-90 18 {:.2})">Frequency</text>"#,
        (top + bottom) / 2.0,
        (top + bottom) / 2.0
    );

    let legend_y = bottom + 62.0;
    let legend_x = width / 2.0 - 110.0;
    for (offset, (label, colour)) in [("Natural", NATURAL_COLOUR), ("Mutagenesis", MUTAGENESIS_COLOUR)]
        .iter()
        .enumerate()
    {
        let x = legend_x + offset as f64 * 120.0;
        let _ = writeln!(
            svg,
            r#"<rect x="{x:.2}" y="{:.2}" width="14" height="14" fill="{colour}" stroke="black" stroke-width="0.5"/>"#,
            legend_y - 11.0
        );
        let _ = writeln!(
            svg,
            r#"<text x="{:.2}" y="{legend_y:.2}" font-size="12">{label}</text>"#,
            x + 20.0
        );
    }
    svg.push_str("</svg>\n");
    Some(svg)
}

pub fn write_chart(dir: &Utf8Path, file_name: &str, svg: &str) -> Result<Utf8PathBuf, KiraError> {
    fs::create_dir_all(dir).map_err(|err| KiraError::Filesystem(err.to_string()))?;
    let path = dir.join(file_name);
    fs::write(&path, svg).map_err(|err| KiraError::Filesystem(err.to_string()))?;
    Ok(path)
}

fn open_svg(width: f64, height: f64) -> String {
    format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\" font-family=\"{FONT}\">\n<rect width=\"100%\" height=\"100%\" fill=\"white\"/>\n"
    )
}

fn title(svg: &mut String, width: f64, text: &str) {
    let _ = writeln!(
        svg,
        r#"<text x="{:.2}" y="30" font-size="16" text-anchor="middle">{}</text>"#,
        width / 2.0,
        escape_html(text)
    );
}

fn axes(svg: &mut String, left: f64, top: f64, right: f64, bottom: f64) {
    let _ = writeln!(
        svg,
        r##"<path d="M{left:.2} {top:.2} V{bottom:.2} H{right:.2}" fill="none" stroke="#333" stroke-width="1"/>"##
    );
}

/// Roughly `count` evenly spaced integer ticks from zero up to `max`.
fn ticks(max: u64, count: u64) -> Vec<u64> {
    let step = max.div_ceil(count.max(1)).max(1);
    (0..=max).step_by(step as usize).collect()
}
