//! PNG figures for the analyses, drawn with `plotters`.
//!
//! Every chart renders to a fixed-size bitmap. Drawing errors are collected
//! into a boxed error inside the drawing closure and surfaced as
//! [`TmrError::Plot`].

use crate::error::{Result, TmrError};
use crate::respiration::ProcessedRsp;
use crate::staging::SleepStage;
use crate::stats::descriptive::{mean, std_dev};
use plotters::coord::Shift;
use plotters::prelude::*;
use statrs::distribution::{ContinuousCDF, StudentsT};
use std::error::Error;
use std::path::Path;

type DrawResult = std::result::Result<(), Box<dyn Error>>;
type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

pub const CHART_SIZE: (u32, u32) = (1000, 700);
pub const WIDE_CHART_SIZE: (u32, u32) = (1600, 600);
const PANEL_CHART_SIZE: (u32, u32) = (1600, 1200);

const PALETTE: [RGBColor; 5] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
];
const INDIAN_RED: RGBColor = RGBColor(205, 92, 92);

fn render<F>(path: &Path, size: (u32, u32), draw: F) -> Result<()>
where
    F: FnOnce(&Area) -> DrawResult,
{
    let root = BitMapBackend::new(path, size).into_drawing_area();
    let result = root
        .fill(&WHITE)
        .map_err(Box::<dyn Error>::from)
        .and_then(|_| draw(&root))
        .and_then(|_| root.present().map_err(Box::<dyn Error>::from));
    result.map_err(|e| TmrError::Plot(format!("{}: {}", path.display(), e)))?;
    log::info!("Saved figure {}", path.display());
    Ok(())
}

fn value_range<'a, I: IntoIterator<Item = &'a f64>>(values: I) -> (f64, f64) {
    let (lo, hi) = values
        .into_iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    if lo == hi {
        return (lo - 1.0, hi + 1.0);
    }
    let margin = (hi - lo) * 0.05;
    (lo - margin, hi + margin)
}

/// Formatter for category axes: integer positions map to their label.
fn category_label(labels: &[String], x: f64) -> String {
    let i = x.round();
    if (x - i).abs() > 1e-6 || i < 0.0 {
        return String::new();
    }
    labels.get(i as usize).cloned().unwrap_or_default()
}

/// Half-width of the 95 % t confidence interval of the mean.
pub fn t_interval_half_width(x: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = x.iter().cloned().filter(|v| v.is_finite()).collect();
    let n = finite.len();
    if n < 2 {
        return None;
    }
    let t = StudentsT::new(0.0, 1.0, (n - 1) as f64).ok()?;
    Some(t.inverse_cdf(0.975) * std_dev(&finite) / (n as f64).sqrt())
}

/// Bars of counts, one group per category and one bar per series.
///
/// The chart has no caption; `legend_title` heads the series legend.
pub fn grouped_bar_chart(
    path: &Path,
    legend_title: &str,
    x_desc: &str,
    y_desc: &str,
    categories: &[String],
    series: &[(String, Vec<f64>)],
) -> Result<()> {
    render(path, CHART_SIZE, |root| {
        let y_max = series
            .iter()
            .flat_map(|(_, v)| v.iter())
            .cloned()
            .fold(0.0, f64::max)
            * 1.15;
        let n = categories.len();
        let mut chart = ChartBuilder::on(root)
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(-0.5..(n as f64 - 0.5), 0.0..y_max.max(1.0))?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n.max(2))
            .x_label_formatter(&|x: &f64| category_label(categories, *x))
            .x_desc(x_desc)
            .y_desc(y_desc)
            .draw()?;

        // Label-only entry: the legend heading.
        chart
            .draw_series(std::iter::empty::<Rectangle<(f64, f64)>>())?
            .label(legend_title);

        let width = 0.8 / series.len().max(1) as f64;
        for (j, (name, values)) in series.iter().enumerate() {
            let color = PALETTE[j % PALETTE.len()];
            chart
                .draw_series(values.iter().enumerate().map(|(i, &v)| {
                    let x0 = i as f64 - 0.4 + j as f64 * width;
                    Rectangle::new([(x0, 0.0), (x0 + width, v)], color.mix(0.8).filled())
                }))?
                .label(name.as_str())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], color.filled()));
        }

        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
        Ok(())
    })
}

/// Mean of each group as a bar with a 95 % t-interval error bar.
pub fn mean_bar_chart(
    path: &Path,
    title: &str,
    x_desc: &str,
    y_desc: &str,
    groups: &[(String, Vec<f64>)],
) -> Result<()> {
    let stats: Vec<(f64, f64)> = groups
        .iter()
        .map(|(_, v)| {
            let finite: Vec<f64> = v.iter().cloned().filter(|x| x.is_finite()).collect();
            (mean(&finite), t_interval_half_width(&finite).unwrap_or(0.0))
        })
        .collect();
    let labels: Vec<String> = groups.iter().map(|(name, _)| name.clone()).collect();

    render(path, CHART_SIZE, |root| {
        let tops = stats.iter().map(|(m, h)| m + h);
        let bottoms = stats.iter().map(|(m, h)| m - h);
        let y_max = tops.fold(0.0, f64::max);
        let y_min = bottoms.fold(0.0, f64::min);
        let pad = (y_max - y_min).max(1e-9) * 0.1;
        let n = groups.len();

        let mut chart = ChartBuilder::on(root)
            .caption(title, ("sans-serif", 24))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(70)
            .build_cartesian_2d(-0.5..(n as f64 - 0.5), (y_min - pad)..(y_max + pad))?;

        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(n.max(2))
            .x_label_formatter(&|x: &f64| category_label(&labels, *x))
            .x_desc(x_desc)
            .y_desc(y_desc)
            .draw()?;

        chart.draw_series(stats.iter().enumerate().map(|(i, &(m, _))| {
            let x = i as f64;
            Rectangle::new(
                [(x - 0.35, 0.0), (x + 0.35, m)],
                PALETTE[i % PALETTE.len()].mix(0.8).filled(),
            )
        }))?;

        for (i, &(m, h)) in stats.iter().enumerate() {
            if h <= 0.0 || !m.is_finite() {
                continue;
            }
            let x = i as f64;
            let style = BLACK.stroke_width(2);
            chart.draw_series(std::iter::once(PathElement::new(
                vec![(x, m - h), (x, m + h)],
                style,
            )))?;
            for cap in [m - h, m + h] {
                chart.draw_series(std::iter::once(PathElement::new(
                    vec![(x - 0.08, cap), (x + 0.08, cap)],
                    style,
                )))?;
            }
        }
        Ok(())
    })
}

/// Hypnogram positions: wake on top, deep sleep at the bottom.
fn stage_level(stage: SleepStage) -> f64 {
    match stage {
        SleepStage::N3 => 0.0,
        SleepStage::N2 => 1.0,
        SleepStage::N1 => 2.0,
        SleepStage::Rem => 3.0,
        SleepStage::Wake => 4.0,
    }
}

const STAGE_LEVEL_LABELS: [&str; 5] = ["N3", "N2", "N1", "R", "W"];

/// Step plot of the predicted stages over time (hours) with cue markers.
pub fn hypnogram_chart(
    path: &Path,
    stages: &[SleepStage],
    epoch_seconds: f64,
    cue_hours: &[f64],
) -> Result<()> {
    let epoch_hours = epoch_seconds / 3600.0;
    let end = (stages.len() as f64 * epoch_hours).max(epoch_hours);

    render(path, WIDE_CHART_SIZE, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption("Hypnogram", ("sans-serif", 24))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(50)
            .build_cartesian_2d(0.0..end, -0.5..4.5)?;

        chart
            .configure_mesh()
            .y_labels(5)
            .y_label_formatter(&|y: &f64| {
                let i = y.round();
                if (y - i).abs() < 1e-6 && (0.0..=4.0).contains(&i) {
                    STAGE_LEVEL_LABELS[i as usize].to_string()
                } else {
                    String::new()
                }
            })
            .x_desc("Time [hrs]")
            .y_desc("Stage")
            .draw()?;

        let steps = stages.iter().enumerate().flat_map(|(i, &s)| {
            let level = stage_level(s);
            [
                (i as f64 * epoch_hours, level),
                ((i + 1) as f64 * epoch_hours, level),
            ]
        });
        chart.draw_series(LineSeries::new(steps, BLACK.stroke_width(2)))?;

        if !cue_hours.is_empty() {
            chart
                .draw_series(cue_hours.iter().map(|&t| {
                    PathElement::new(vec![(t, -0.5), (t, 4.5)], GREEN.mix(0.5))
                }))?
                .label("Cues")
                .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], GREEN));
            chart
                .configure_series_labels()
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()?;
        }
        Ok(())
    })
}

/// Per-epoch stage probabilities stacked to one.
pub fn probability_chart(path: &Path, proba: &[[f64; 5]], epoch_seconds: f64) -> Result<()> {
    let epoch_hours = epoch_seconds / 3600.0;
    let end = (proba.len() as f64 * epoch_hours).max(epoch_hours);

    render(path, WIDE_CHART_SIZE, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption("Stage probabilities", ("sans-serif", 24))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(0.0..end, 0.0..1.0)?;

        chart
            .configure_mesh()
            .x_desc("Time [hrs]")
            .y_desc("Probability")
            .draw()?;

        let mut lower = vec![0.0; proba.len()];
        for (k, stage) in SleepStage::ALL.iter().enumerate() {
            let upper: Vec<f64> = lower.iter().zip(proba).map(|(l, p)| l + p[k]).collect();
            let mut outline: Vec<(f64, f64)> = upper
                .iter()
                .enumerate()
                .flat_map(|(i, &u)| {
                    [(i as f64 * epoch_hours, u), ((i + 1) as f64 * epoch_hours, u)]
                })
                .collect();
            outline.extend(lower.iter().enumerate().rev().flat_map(|(i, &l)| {
                [((i + 1) as f64 * epoch_hours, l), (i as f64 * epoch_hours, l)]
            }));
            let color = PALETTE[k % PALETTE.len()];
            chart
                .draw_series(std::iter::once(Polygon::new(outline, color.mix(0.8).filled())))?
                .label(stage.label())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], color.filled()));
            lower = upper;
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
        Ok(())
    })
}

/// Event codes against their time of occurrence in hours.
pub fn events_chart(path: &Path, events: &[(f64, i32)]) -> Result<()> {
    let (t0, t1) = value_range(events.iter().map(|(t, _)| t));
    let codes: Vec<f64> = events.iter().map(|(_, c)| *c as f64).collect();
    let (c0, c1) = value_range(&codes);

    render(path, WIDE_CHART_SIZE, |root| {
        let mut chart = ChartBuilder::on(root)
            .caption("Events", ("sans-serif", 24))
            .margin(15)
            .x_label_area_size(45)
            .y_label_area_size(60)
            .build_cartesian_2d(t0.min(0.0)..t1, c0..c1)?;

        chart
            .configure_mesh()
            .x_desc("Time [hrs]")
            .y_desc("Event code")
            .draw()?;

        chart.draw_series(
            events
                .iter()
                .map(|&(t, c)| Circle::new((t, c as f64), 3, PALETTE[0].filled())),
        )?;
        Ok(())
    })
}

/// Contiguous `true` runs of a mask as `[start, end)` index pairs.
fn runs(mask: &[bool]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut start = None;
    for (i, &m) in mask.iter().enumerate() {
        match (m, start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                out.push((s, i));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        out.push((s, mask.len()));
    }
    out
}

/// One trace of an EOG panel, with optional highlighted stretches.
pub struct Trace<'a> {
    pub name: &'a str,
    pub values: &'a [f64],
    pub highlight: Option<&'a [bool]>,
}

/// Stacked time-series panels sharing one time axis (seconds).
pub fn eog_chart(path: &Path, title: &str, times: &[f64], traces: &[Trace]) -> Result<()> {
    let (t0, t1) = value_range(times);

    render(path, PANEL_CHART_SIZE, |root| {
        let root = root.titled(title, ("sans-serif", 28))?;
        let panels = root.split_evenly((traces.len().max(1), 1));
        for (panel, trace) in panels.iter().zip(traces) {
            let (y0, y1) = value_range(trace.values);
            let mut chart = ChartBuilder::on(panel)
                .caption(trace.name, ("sans-serif", 18))
                .margin(10)
                .x_label_area_size(35)
                .y_label_area_size(70)
                .build_cartesian_2d(t0..t1, y0..y1)?;
            chart
                .configure_mesh()
                .x_desc("Time (seconds)")
                .y_desc("Amplitude (uV)")
                .draw()?;

            chart.draw_series(LineSeries::new(
                times.iter().cloned().zip(trace.values.iter().cloned()),
                &BLACK,
            ))?;
            if let Some(mask) = trace.highlight {
                for (s, e) in runs(mask) {
                    chart.draw_series(LineSeries::new(
                        (s..e).map(|i| (times[i], trace.values[i])),
                        INDIAN_RED.stroke_width(2),
                    ))?;
                }
            }
        }
        Ok(())
    })
}

/// Raw and cleaned respiration with breath markers, plus rate and amplitude.
pub fn respiration_chart(path: &Path, title: &str, rsp: &ProcessedRsp) -> Result<()> {
    let sf = rsp.sampling_rate;
    let times: Vec<f64> = (0..rsp.raw.len()).map(|i| i as f64 / sf).collect();
    let (t0, t1) = value_range(&times);

    render(path, PANEL_CHART_SIZE, |root| {
        let root = root.titled(title, ("sans-serif", 28))?;
        let panels = root.split_evenly((3, 1));

        let (y0, y1) = value_range(rsp.raw.iter().chain(&rsp.clean));
        let mut chart = ChartBuilder::on(&panels[0])
            .caption("Raw and cleaned signal", ("sans-serif", 18))
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(60)
            .build_cartesian_2d(t0..t1, y0..y1)?;
        chart.configure_mesh().draw()?;
        chart
            .draw_series(LineSeries::new(
                times.iter().cloned().zip(rsp.raw.iter().cloned()),
                RGBColor(180, 180, 180),
            ))?
            .label("Raw")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RGBColor(180, 180, 180)));
        chart
            .draw_series(LineSeries::new(
                times.iter().cloned().zip(rsp.clean.iter().cloned()),
                &PALETTE[4],
            ))?
            .label("Cleaned")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], PALETTE[4]));
        chart
            .draw_series(
                rsp.peaks
                    .iter()
                    .map(|&i| Circle::new((times[i], rsp.clean[i]), 4, PALETTE[3].filled())),
            )?
            .label("Exhalation onsets")
            .legend(|(x, y)| Circle::new((x + 10, y), 4, PALETTE[3].filled()));
        chart
            .draw_series(
                rsp.troughs
                    .iter()
                    .map(|&i| Circle::new((times[i], rsp.clean[i]), 4, PALETTE[2].filled())),
            )?
            .label("Inhalation onsets")
            .legend(|(x, y)| Circle::new((x + 10, y), 4, PALETTE[2].filled()));
        chart
            .configure_series_labels()
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;

        for (panel, (name, values, color)) in panels[1..].iter().zip([
            ("Breathing rate (breaths/min)", &rsp.rate, PALETTE[1]),
            ("Breathing amplitude", &rsp.amplitude, PALETTE[0]),
        ]) {
            let (y0, y1) = value_range(values.iter());
            let mut chart = ChartBuilder::on(panel)
                .caption(name, ("sans-serif", 18))
                .margin(10)
                .x_label_area_size(35)
                .y_label_area_size(60)
                .build_cartesian_2d(t0..t1, y0..y1)?;
            chart.configure_mesh().x_desc("Time (seconds)").draw()?;
            chart.draw_series(LineSeries::new(
                times
                    .iter()
                    .cloned()
                    .zip(values.iter().cloned())
                    .filter(|(_, v)| v.is_finite()),
                &color,
            ))?;
        }
        Ok(())
    })
}
