use {
    crate::InputError,
    std::{fmt, ops::Index, str::FromStr, sync::Arc},
};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Point {
        Point { x, y }
    }

    pub fn squared_distance(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.x, self.y)
    }
}

/// Parses `<float>,<float>`, e.g. `1,3` or `-2,4.43`. Surrounding whitespace
/// is tolerated; non-finite coordinates are not.
impl FromStr for Point {
    type Err = InputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || InputError::Malformed { arg: s.to_string() };

        let (x, y) = s.split_once(',').ok_or_else(malformed)?;
        let x: f64 = x.trim().parse().map_err(|_| malformed())?;
        let y: f64 = y.trim().parse().map_err(|_| malformed())?;

        let point = Point { x, y };
        if !point.is_finite() {
            return Err(malformed());
        }
        Ok(point)
    }
}

/// The input coordinates. Never mutated after construction, so every worker
/// reads it through a shared handle without locking.
#[derive(Debug, Clone)]
pub struct PointSet {
    points: Arc<[Point]>,
}

impl PointSet {
    pub fn new(points: Vec<Point>) -> Result<PointSet, InputError> {
        if points.is_empty() {
            return Err(InputError::Empty);
        }
        Ok(PointSet {
            points: points.into(),
        })
    }

    pub fn parse<I, S>(args: I) -> Result<PointSet, InputError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let points: Result<Vec<Point>, _> = args.into_iter().map(|a| a.as_ref().parse()).collect();
        PointSet::new(points?)
    }

    /// Loader-side check that there are enough points to seed `clusters` centroids.
    pub fn require_clusters(&self, clusters: usize) -> Result<(), InputError> {
        if self.len() < clusters {
            return Err(InputError::TooFewPoints {
                points: self.len(),
                clusters,
            });
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }
}

impl Index<usize> for PointSet {
    type Output = Point;

    fn index(&self, index: usize) -> &Point {
        &self.points[index]
    }
}

impl<'a> IntoIterator for &'a PointSet {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
