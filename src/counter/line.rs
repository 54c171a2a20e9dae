//! Counting lines and the registry that owns them.

use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::geometry::Point;

pub type ClassId = u32;
pub type TrackId = u64;

/// BGR colours handed out to lines created through [`LineAuthoring`].
pub const DEFAULT_PALETTE: [[u8; 3]; 6] = [
    [0, 0, 255],
    [0, 255, 0],
    [255, 0, 0],
    [0, 255, 255],
    [255, 0, 255],
    [255, 255, 0],
];

/// Crossing direction, derived from the sign of the side value after the crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub const ALL: [Direction; 2] = [Direction::Up, Direction::Down];

    /// `Down` for points on the positive side, `Up` otherwise (including on the line).
    #[inline]
    pub fn from_side(side: f32) -> Self {
        if side > 0.0 { Self::Down } else { Self::Up }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
        }
    }
}

/// Per-direction, per-class crossing counts of one line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionCounts {
    #[serde(default)]
    pub up: BTreeMap<ClassId, u64>,
    #[serde(default)]
    pub down: BTreeMap<ClassId, u64>,
}

impl DirectionCounts {
    pub fn get(&self, direction: Direction) -> &BTreeMap<ClassId, u64> {
        match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
        }
    }

    pub fn get_mut(&mut self, direction: Direction) -> &mut BTreeMap<ClassId, u64> {
        match direction {
            Direction::Up => &mut self.up,
            Direction::Down => &mut self.down,
        }
    }

    pub fn increment(&mut self, direction: Direction, class: ClassId) {
        *self.get_mut(direction).entry(class).or_insert(0) += 1;
    }

    pub fn count(&self, direction: Direction, class: ClassId) -> u64 {
        self.get(direction).get(&class).copied().unwrap_or(0)
    }

    pub fn total(&self, direction: Direction) -> u64 {
        self.get(direction).values().sum()
    }
}

/// Crossing state of one track relative to one line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackedObject {
    pub prev_side: f32,
    pub class: ClassId,
    /// Once set, never cleared.
    pub counted: bool,
}

/// A counting segment plus its accumulated crossing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountingLine {
    #[serde(default)]
    pub name: String,
    pub start_point: Point,
    pub end_point: Point,
    #[serde(default)]
    pub color: Option<[u8; 3]>,
    #[serde(default)]
    pub counts: DirectionCounts,
    #[serde(default)]
    pub tracked_objects: BTreeMap<TrackId, TrackedObject>,
}

impl CountingLine {
    pub fn new(name: impl Into<String>, start_point: Point, end_point: Point) -> Self {
        Self {
            name: name.into(),
            start_point,
            end_point,
            color: None,
            counts: DirectionCounts::default(),
            tracked_objects: BTreeMap::new(),
        }
    }

    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = Some(color);
        self
    }

    pub fn summary(&self) -> LineCounts {
        LineCounts {
            name: self.name.clone(),
            up: self.counts.up.clone(),
            down: self.counts.down.clone(),
            total_up: self.counts.total(Direction::Up),
            total_down: self.counts.total(Direction::Down),
        }
    }
}

/// Snapshot of one line's counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineCounts {
    pub name: String,
    pub up: BTreeMap<ClassId, u64>,
    pub down: BTreeMap<ClassId, u64>,
    pub total_up: u64,
    pub total_down: u64,
}

/// Interactive collaborator that lets a user draw counting segments.
pub trait LineAuthoring {
    /// Return the drawn segments as `(start, end)` pairs, in drawing order.
    fn draw_lines(&mut self) -> Result<Vec<(Point, Point)>>;
}

/// Owns every counting line of a run.
///
/// Line names are unique. Lines are never removed while a run is in progress.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineRegistry {
    lines: Vec<CountingLine>,
}

impl LineRegistry {
    /// Build a registry, naming anonymous lines `Line-{index}`.
    pub fn new(mut lines: Vec<CountingLine>) -> Result<Self> {
        for (index, line) in lines.iter_mut().enumerate() {
            if line.name.is_empty() {
                line.name = format!("Line-{}", index + 1);
            }
        }

        let mut seen = HashSet::new();
        for line in &lines {
            if !seen.insert(line.name.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "duplicate counting line name: {}",
                    line.name
                )));
            }
        }

        Ok(Self { lines })
    }

    /// Load persisted line geometry. A missing file yields an empty registry.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "no line geometry found, counting disabled");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<CountingLine> = serde_json::from_str(&content)?;
        info!(path = %path.display(), lines = lines.len(), "loaded line geometry");
        Self::new(lines)
    }

    /// Persist geometry and current crossing state as JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.lines)?)?;
        Ok(())
    }

    /// Let `drawer` author new lines, persist them to `path` and load them back.
    pub fn author(drawer: &mut dyn LineAuthoring, path: impl AsRef<Path>) -> Result<Self> {
        let lines = drawer
            .draw_lines()?
            .into_iter()
            .enumerate()
            .map(|(i, (start, end))| {
                CountingLine::new(format!("Line{}", i + 1), start, end)
                    .with_color(DEFAULT_PALETTE[i % DEFAULT_PALETTE.len()])
            })
            .collect();

        Self::new(lines)?.save(&path)?;
        Self::load(path)
    }

    pub fn lines(&self) -> &[CountingLine] {
        &self.lines
    }

    pub fn lines_mut(&mut self) -> &mut [CountingLine] {
        &mut self.lines
    }

    pub fn get(&self, name: &str) -> Option<&CountingLine> {
        self.lines.iter().find(|l| l.name == name)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn counts(&self) -> Vec<LineCounts> {
        self.lines.iter().map(CountingLine::summary).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_from_side() {
        assert_eq!(Direction::from_side(3.0), Direction::Down);
        assert_eq!(Direction::from_side(-3.0), Direction::Up);
        assert_eq!(Direction::from_side(0.0), Direction::Up);
    }

    #[test]
    fn test_counts_increment_and_total() {
        let mut counts = DirectionCounts::default();
        counts.increment(Direction::Up, 2);
        counts.increment(Direction::Up, 2);
        counts.increment(Direction::Up, 0);
        counts.increment(Direction::Down, 7);

        assert_eq!(counts.count(Direction::Up, 2), 2);
        assert_eq!(counts.count(Direction::Down, 2), 0);
        assert_eq!(counts.total(Direction::Up), 3);
        assert_eq!(counts.total(Direction::Down), 1);
    }

    #[test]
    fn test_registry_names_anonymous_lines() {
        let registry = LineRegistry::new(vec![
            CountingLine::new("", Point::new(0.0, 0.0), Point::new(1.0, 0.0)),
            CountingLine::new("gate", Point::new(0.0, 1.0), Point::new(1.0, 1.0)),
        ])
        .unwrap();

        assert_eq!(registry.lines()[0].name, "Line-1");
        assert!(registry.get("gate").is_some());
    }

    #[test]
    fn test_registry_rejects_duplicate_names() {
        let result = LineRegistry::new(vec![
            CountingLine::new("a", Point::new(0.0, 0.0), Point::new(1.0, 0.0)),
            CountingLine::new("a", Point::new(0.0, 1.0), Point::new(1.0, 1.0)),
        ]);
        assert!(matches!(result, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_load_defaults_runtime_state() {
        let json = r#"[
            {"start_point": [0, 300], "end_point": [640, 300], "name": "Line1", "color": [0, 0, 255]},
            {"start_point": [400, 0], "end_point": [400, 480]}
        ]"#;
        let lines: Vec<CountingLine> = serde_json::from_str(json).unwrap();
        let registry = LineRegistry::new(lines).unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lines()[0].color, Some([0, 0, 255]));
        assert_eq!(registry.lines()[1].name, "Line-2");
        assert!(registry.lines()[1].tracked_objects.is_empty());
        assert_eq!(registry.lines()[1].counts, DirectionCounts::default());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let registry = LineRegistry::load(dir.path().join("absent.json")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_save_then_load_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines").join("geometry.json");

        let mut line = CountingLine::new("door", Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        line.counts.increment(Direction::Down, 3);
        line.tracked_objects.insert(
            9,
            TrackedObject {
                prev_side: 1.5,
                class: 3,
                counted: true,
            },
        );
        let registry = LineRegistry::new(vec![line]).unwrap();
        registry.save(&path).unwrap();

        let loaded = LineRegistry::load(&path).unwrap();
        assert_eq!(loaded, registry);
    }

    struct ScriptedDrawer(Vec<(Point, Point)>);

    impl LineAuthoring for ScriptedDrawer {
        fn draw_lines(&mut self) -> Result<Vec<(Point, Point)>> {
            Ok(std::mem::take(&mut self.0))
        }
    }

    #[test]
    fn test_author_names_colours_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines_geometry.json");
        let mut drawer = ScriptedDrawer(vec![
            (Point::new(0.0, 300.0), Point::new(640.0, 300.0)),
            (Point::new(400.0, 0.0), Point::new(400.0, 480.0)),
        ]);

        let registry = LineRegistry::author(&mut drawer, &path).unwrap();

        assert!(path.exists());
        assert_eq!(registry.lines()[0].name, "Line1");
        assert_eq!(registry.lines()[1].name, "Line2");
        assert_eq!(registry.lines()[1].color, Some(DEFAULT_PALETTE[1]));
    }
}
