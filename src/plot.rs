// plot.rs — Line plot of an (x, y) series into a minifb-ready framebuffer.
//
// Charting (coordinate mapping, mesh, axis labels, the polyline) is done
// by plotters on a `BitMapBackend` over an in-memory RGB buffer. `Canvas`
// owns that buffer and converts it to the 0RGB `u32` pixels minifb
// displays:
//
//   xs, ys ──plot_curve──▶ Canvas (RGB888) ──to_0rgb──▶ Vec<u32> ──▶ minifb
//
// Data bounds are taken from the series itself; y always includes 0,
// which is where a density curve starts.
//
// Text needs a system font. `PlotStyle::labels = false` skips the caption
// and the mesh so a plot can be drawn on font-less machines too.

use plotters::prelude::*;
use thiserror::Error;

/// Errors from plotting a series.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlotError {
    #[error("x and y lengths differ ({x} vs {y})")]
    LengthMismatch { x: usize, y: usize },
    #[error("need at least two points, got {0}")]
    TooFewPoints(usize),
    #[error("series contains a non-finite value")]
    NonFinite,
    #[error("canvas {width}x{height} too small for margin {margin}")]
    CanvasTooSmall { width: usize, height: usize, margin: u32 },
    /// plotters failed to draw; carries its message.
    #[error("drawing failed: {0}")]
    Drawing(String),
}

fn drawing(e: impl std::fmt::Display) -> PlotError {
    PlotError::Drawing(e.to_string())
}

/// Labels, colours and layout for [`plot_curve`].
#[derive(Debug, Clone, PartialEq)]
pub struct PlotStyle {
    pub caption: Option<String>,
    pub x_desc: String,
    pub y_desc: String,
    /// Draw the caption, mesh and axis labels.
    pub labels: bool,
    pub background: RGBColor,
    pub line: RGBColor,
    /// Blank border around the chart, in pixels.
    pub margin: u32,
}

impl Default for PlotStyle {
    fn default() -> Self {
        PlotStyle {
            caption: None,
            x_desc: "E".into(),
            y_desc: "g(E)".into(),
            labels: true,
            background: WHITE,
            line: BLUE,
            margin: 10,
        }
    }
}

/// An RGB888 framebuffer that plotters draws into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    rgb: Vec<u8>,
    width: usize,
    height: usize,
}

impl Canvas {
    pub fn new(width: usize, height: usize) -> Self {
        Canvas { rgb: vec![0; width * height * 3], width, height }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Raw RGB bytes, three per pixel, row-major.
    pub fn rgb(&self) -> &[u8] {
        &self.rgb
    }

    /// Pixel at (x, y) as 0RGB, or `None` outside the canvas.
    pub fn get(&self, x: usize, y: usize) -> Option<u32> {
        (x < self.width && y < self.height).then(|| {
            let i = (y * self.width + x) * 3;
            pack(&self.rgb[i..i + 3])
        })
    }

    /// Row-major 0RGB pixels, ready for `minifb::Window::update_with_buffer`.
    pub fn to_0rgb(&self) -> Vec<u32> {
        self.rgb.chunks_exact(3).map(pack).collect()
    }
}

#[inline]
fn pack(p: &[u8]) -> u32 {
    (u32::from(p[0]) << 16) | (u32::from(p[1]) << 8) | u32::from(p[2])
}

/// Data-space extent of a plotted series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Bounds {
    fn of(xs: &[f64], ys: &[f64]) -> Self {
        let (x_min, x_max) = min_max(xs);
        let (y_lo, y_hi) = min_max(ys);
        let mut b = Bounds { x_min, x_max, y_min: y_lo.min(0.0), y_max: y_hi.max(0.0) };
        // Flat series still need a non-zero span.
        if b.x_max == b.x_min {
            b.x_max = b.x_min + 1.0;
        }
        if b.y_max == b.y_min {
            b.y_max = b.y_min + 1.0;
        }
        b
    }
}

fn min_max(v: &[f64]) -> (f64, f64) {
    v.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)))
}

/// Plot `ys` against `xs` as a line series, replacing the canvas contents.
///
/// Returns the data bounds of the chart.
pub fn plot_curve(
    canvas: &mut Canvas,
    xs: &[f64],
    ys: &[f64],
    style: &PlotStyle,
) -> Result<Bounds, PlotError> {
    if xs.len() != ys.len() {
        return Err(PlotError::LengthMismatch { x: xs.len(), y: ys.len() });
    }
    if xs.len() < 2 {
        return Err(PlotError::TooFewPoints(xs.len()));
    }
    if xs.iter().chain(ys).any(|v| !v.is_finite()) {
        return Err(PlotError::NonFinite);
    }
    let m = style.margin as usize;
    if canvas.width <= 2 * m + 1 || canvas.height <= 2 * m + 1 {
        return Err(PlotError::CanvasTooSmall {
            width: canvas.width,
            height: canvas.height,
            margin: style.margin,
        });
    }

    let bounds = Bounds::of(xs, ys);
    let size = (canvas.width as u32, canvas.height as u32);
    let root = BitMapBackend::with_buffer(&mut canvas.rgb, size).into_drawing_area();
    root.fill(&style.background).map_err(drawing)?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(style.margin);
    if style.labels {
        builder.x_label_area_size(30).y_label_area_size(60);
        if let Some(caption) = &style.caption {
            builder.caption(caption, ("sans-serif", 20));
        }
    }
    let mut chart = builder
        .build_cartesian_2d(bounds.x_min..bounds.x_max, bounds.y_min..bounds.y_max)
        .map_err(drawing)?;

    if style.labels {
        chart
            .configure_mesh()
            .x_desc(style.x_desc.as_str())
            .y_desc(style.y_desc.as_str())
            .draw()
            .map_err(drawing)?;
    }

    chart
        .draw_series(LineSeries::new(xs.iter().copied().zip(ys.iter().copied()), &style.line))
        .map_err(drawing)?;
    root.present().map_err(drawing)?;
    Ok(bounds)
}
