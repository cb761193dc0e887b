use {
    crate::{ClusterResult, DisplayMode, Point, PointSet, displacement},
    itertools::Itertools,
    serde_json::json,
    std::io::{self, Write},
    textplots::{Chart, Plot, Shape},
};

const PLOT_WIDTH: u32 = 160;
const PLOT_HEIGHT: u32 = 60;
const TRACE_POINTS: usize = 72;

/// Writes the input points, optional per-iteration positions and the final
/// centroids in one of the display modes.
pub struct Reporter<W: Write> {
    mode: DisplayMode,
    out: W,
}

impl Reporter<io::Stdout> {
    pub fn stdout(mode: DisplayMode) -> Self {
        Reporter::new(mode, io::stdout())
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(mode: DisplayMode, out: W) -> Self {
        Reporter { mode, out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn report(&mut self, points: &PointSet, result: &ClusterResult) -> io::Result<()> {
        match self.mode {
            DisplayMode::Text => self.text(points, result),
            DisplayMode::Json => self.json(points, result),
            DisplayMode::Plot => self.plot(points, result),
        }?;
        self.out.flush()
    }

    fn text(&mut self, points: &PointSet, result: &ClusterResult) -> io::Result<()> {
        writeln!(self.out)?;
        for (i, p) in points.iter().enumerate() {
            writeln!(self.out, "Point {}: {}", i + 1, p)?;
        }

        for positions in &result.history {
            writeln!(self.out)?;
            writeln!(self.out, "{}", positions.iter().join("    "))?;
        }

        write!(self.out, "\n\n")?;
        for (i, c) in result.centroids.iter().enumerate() {
            writeln!(self.out, "Cluster {}: {}", i + 1, c)?;
        }
        Ok(())
    }

    fn json(&mut self, points: &PointSet, result: &ClusterResult) -> io::Result<()> {
        for (i, p) in points.iter().enumerate() {
            let line = json!({"kind": "point", "index": i, "x": p.x, "y": p.y});
            writeln!(self.out, "{line}")?;
        }

        for (iteration, positions) in result.history.iter().enumerate() {
            let centroids: Vec<[f64; 2]> = positions.iter().map(|p| [p.x, p.y]).collect();
            let line = json!({"kind": "iteration", "iteration": iteration, "centroids": centroids});
            writeln!(self.out, "{line}")?;
        }

        for (i, (c, count)) in result.centroids.iter().zip(&result.counts).enumerate() {
            let line = json!({"kind": "cluster", "index": i, "x": c.x, "y": c.y, "count": count});
            writeln!(self.out, "{line}")?;
        }

        let summary = json!({
            "kind": "summary",
            "iterations": result.iterations,
            "version": result.version,
            "inertia": result.inertia(points),
            "counts": result.counts,
        });
        writeln!(self.out, "{summary}")
    }

    fn plot(&mut self, points: &PointSet, result: &ClusterResult) -> io::Result<()> {
        let (xmin, xmax) = padded_range(points.iter().chain(&result.centroids).map(|p| p.x));
        let (ymin, ymax) = padded_range(points.iter().chain(&result.centroids).map(|p| p.y));

        let point_xy = as_f32(points.iter());
        let centroid_xy = as_f32(result.centroids.iter());
        let scatter = Shape::Points(&point_xy);
        let centroids = Shape::Points(&centroid_xy);
        let mut chart = Chart::new_with_y_range(PLOT_WIDTH, PLOT_HEIGHT, xmin, xmax, ymin, ymax);
        let chart = chart.lineplot(&scatter).lineplot(&centroids);
        chart.axis();
        chart.figures();

        writeln!(self.out, "{} points, {} clusters", points.len(), result.centroids.len())?;
        writeln!(self.out, "{chart}")?;

        for (i, c) in result.centroids.iter().enumerate() {
            writeln!(self.out, "Cluster {}: {}", i + 1, c)?;
        }

        let trace = displacement_trace(result);
        if !trace.is_empty() {
            let config = rasciigraph::Config::default()
                .with_height(12)
                .with_caption("centroid displacement per iteration".to_string());
            writeln!(self.out)?;
            writeln!(self.out, "{}", rasciigraph::plot(trace, config))?;
        }
        Ok(())
    }
}

fn as_f32<'a>(points: impl Iterator<Item = &'a Point>) -> Vec<(f32, f32)> {
    points.map(|p| (p.x as f32, p.y as f32)).collect()
}

fn padded_range(values: impl Iterator<Item = f64>) -> (f32, f32) {
    let (lo, hi) = values.minmax().into_option().unwrap_or((0.0, 0.0));
    let pad = ((hi - lo) * 0.05).max(1.0);
    ((lo - pad) as f32, (hi + pad) as f32)
}

/// Total squared centroid movement between consecutive recorded iterations
/// (the last one measured against the final centroids), bucketed down to a
/// width that fits a terminal. Each bucket keeps its largest value.
pub fn displacement_trace(result: &ClusterResult) -> Vec<f64> {
    let steps: Vec<f64> = result
        .history
        .iter()
        .chain(std::iter::once(&result.centroids))
        .tuple_windows()
        .map(|(previous, current)| displacement(current, previous))
        .collect();

    if steps.len() <= TRACE_POINTS {
        return steps;
    }
    let bucket = steps.len().div_ceil(TRACE_POINTS);
    steps
        .chunks(bucket)
        .map(|c| c.iter().copied().fold(0.0, f64::max))
        .collect()
}
