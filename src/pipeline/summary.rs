//! Aggregate statistics of one run and their text/CSV reports.

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, TimeDelta};

use crate::counter::{Direction, LineCounts, LineRegistry};
use crate::error::Result;
use crate::integration::class_name;

const RULE: &str = "================================================================================";
const LINE_RULE: &str = "----------------------------------------";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Upper median, `sorted[len / 2]`
    pub median: f64,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub model: String,
    /// `None` when tracking is disabled
    pub tracker: Option<String>,
    pub input_path: PathBuf,
    pub output_path: Option<PathBuf>,
    pub frame_skip: u32,
    pub started_at: Option<DateTime<Local>>,
    pub finished_at: Option<DateTime<Local>>,
    /// Source frames read, processed or skipped
    pub frames_read: u64,
    pub frames_processed: u64,
    pub total_detections: u64,
    /// Run ended on a user quit
    pub cancelled: bool,
    pub lines: Vec<LineCounts>,
    fps_samples: Vec<f64>,
    class_names: &'static [&'static str],
}

impl RunSummary {
    pub fn new(model: impl Into<String>, class_names: &'static [&'static str]) -> Self {
        Self {
            model: model.into(),
            tracker: None,
            input_path: PathBuf::new(),
            output_path: None,
            frame_skip: 1,
            started_at: None,
            finished_at: None,
            frames_read: 0,
            frames_processed: 0,
            total_detections: 0,
            cancelled: false,
            lines: Vec::new(),
            fps_samples: Vec::new(),
            class_names,
        }
    }

    pub fn start(&mut self) {
        self.started_at = Some(Local::now());
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Local::now());
    }

    pub fn record_detections(&mut self, count: usize) {
        self.total_detections += count as u64;
    }

    /// Count one processed frame. Non-positive or non-finite FPS samples are dropped.
    pub fn record_frame(&mut self, fps: f64) {
        self.frames_processed += 1;
        if fps.is_finite() && fps > 0.0 {
            self.fps_samples.push(fps);
        }
    }

    /// Snapshot the per-line counts.
    pub fn fold_lines(&mut self, registry: &LineRegistry) {
        self.lines = registry.counts();
    }

    pub fn fps_samples(&self) -> &[f64] {
        &self.fps_samples
    }

    pub fn fps_stats(&self) -> Option<FpsStats> {
        if self.fps_samples.is_empty() {
            return None;
        }
        let mut sorted = self.fps_samples.clone();
        sorted.sort_by(f64::total_cmp);
        Some(FpsStats {
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
            median: sorted[sorted.len() / 2],
        })
    }

    pub fn duration(&self) -> Option<TimeDelta> {
        Some(self.finished_at? - self.started_at?)
    }

    pub fn detections_per_frame(&self) -> Option<f64> {
        (self.frames_processed > 0)
            .then(|| self.total_detections as f64 / self.frames_processed as f64)
    }

    pub fn total_up(&self) -> u64 {
        self.lines.iter().map(|l| l.total_up).sum()
    }

    pub fn total_down(&self) -> u64 {
        self.lines.iter().map(|l| l.total_down).sum()
    }

    pub fn class_name(&self, class_id: u32) -> String {
        class_name(self.class_names, class_id)
    }

    /// Human-readable report.
    pub fn report(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_report(&mut out);
        out
    }

    fn write_report(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "{RULE}")?;
        writeln!(out, "OBJECT COUNTING SUMMARY FOR MODEL: {}", self.model)?;
        writeln!(out, "{RULE}")?;

        writeln!(out, "\nPROCESSING INFORMATION:")?;
        writeln!(out, "  Input Video: {}", self.input_path.display())?;
        match &self.output_path {
            Some(path) => writeln!(out, "  Output Video: {}", path.display())?,
            None => writeln!(out, "  Output Video: None")?,
        }
        writeln!(out, "  Model: {}", self.model)?;
        writeln!(out, "  Tracking Algorithm: {}", self.tracker.as_deref().unwrap_or("None"))?;

        writeln!(out, "\nTIMING:")?;
        if let (Some(start), Some(end), Some(duration)) =
            (self.started_at, self.finished_at, self.duration())
        {
            writeln!(out, "  Start: {}", start.format("%Y-%m-%d %H:%M:%S"))?;
            writeln!(out, "  End: {}", end.format("%Y-%m-%d %H:%M:%S"))?;
            writeln!(out, "  Duration: {}", format_duration(duration))?;
            writeln!(out, "  Total Seconds: {:.2}", duration.num_milliseconds() as f64 / 1000.0)?;
        }

        writeln!(out, "\nPERFORMANCE:")?;
        if let Some(fps) = self.fps_stats() {
            writeln!(out, "  Average FPS: {:.2}", fps.mean)?;
            writeln!(out, "  Median FPS: {:.2}", fps.median)?;
            writeln!(out, "  Min FPS: {:.2}", fps.min)?;
            writeln!(out, "  Max FPS: {:.2}", fps.max)?;
        }
        writeln!(out, "  Frames Processed: {}", self.frames_processed)?;
        writeln!(out, "  Frame Skip Rate: {}", self.frame_skip)?;
        writeln!(out, "  Total Detections: {}", self.total_detections)?;
        if let Some(avg) = self.detections_per_frame() {
            writeln!(out, "  Average Detections per Frame: {avg:.2}")?;
        }
        if self.cancelled {
            writeln!(out, "  Stopped early by user")?;
        }

        writeln!(out, "\nCOUNTING STATISTICS:")?;
        writeln!(out, "  Total Up: {}", self.total_up())?;
        writeln!(out, "  Total Down: {}", self.total_down())?;
        writeln!(out, "  Total Objects: {}", self.total_up() + self.total_down())?;

        for line in &self.lines {
            writeln!(out, "\nLine: {}", line.name)?;
            writeln!(out, "{LINE_RULE}")?;
            for direction in Direction::ALL {
                let counts = match direction {
                    Direction::Up => &line.up,
                    Direction::Down => &line.down,
                };
                writeln!(out, "\n{} Direction:", direction.as_str().to_uppercase())?;
                if counts.is_empty() {
                    writeln!(out, "  No objects counted")?;
                }
                for (&class_id, count) in counts {
                    writeln!(out, "  {}: {count}", self.class_name(class_id))?;
                }
            }
            writeln!(out, "\nTotals:")?;
            writeln!(out, "  Total Up: {}", line.total_up)?;
            writeln!(out, "  Total Down: {}", line.total_down)?;
            writeln!(out, "  Overall Total: {}", line.total_up + line.total_down)?;
        }
        Ok(())
    }

    /// One row per (line, direction, class) with a non-zero entry.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("Model,Line,Direction,Class_ID,Class_Name,Count\n");
        for line in &self.lines {
            for direction in Direction::ALL {
                let counts = match direction {
                    Direction::Up => &line.up,
                    Direction::Down => &line.down,
                };
                for (&class_id, count) in counts {
                    out.push_str(&format!(
                        "{},{},{},{class_id},{},{count}\n",
                        csv_field(&self.model),
                        csv_field(&line.name),
                        direction.as_str(),
                        csv_field(&self.class_name(class_id)),
                    ));
                }
            }
        }
        out
    }

    /// Write `counter_summary_{model}.txt` and `.csv` into `dir`.
    pub fn export(&self, dir: impl AsRef<Path>) -> Result<(PathBuf, PathBuf)> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let stem = format!("counter_summary_{}", self.model);
        let txt_path = dir.join(format!("{stem}.txt"));
        let csv_path = dir.join(format!("{stem}.csv"));

        let mut txt = BufWriter::new(File::create(&txt_path)?);
        txt.write_all(self.report().as_bytes())?;
        txt.flush()?;

        let mut csv = BufWriter::new(File::create(&csv_path)?);
        csv.write_all(self.to_csv().as_bytes())?;
        csv.flush()?;

        Ok((txt_path, csv_path))
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// `H:MM:SS.ffffff`
fn format_duration(duration: TimeDelta) -> String {
    let micros = duration.num_microseconds().unwrap_or(i64::MAX).max(0);
    let secs = micros / 1_000_000;
    format!(
        "{}:{:02}:{:02}.{:06}",
        secs / 3600,
        (secs / 60) % 60,
        secs % 60,
        micros % 1_000_000
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counter::CountingLine;
    use crate::geometry::Point;
    use crate::integration::COCO_80;

    fn summary_with_counts() -> RunSummary {
        let mut line = CountingLine::new("A", Point::new(0.0, 300.0), Point::new(640.0, 300.0));
        line.counts.increment(Direction::Down, 2);
        line.counts.increment(Direction::Down, 2);
        line.counts.increment(Direction::Up, 0);
        line.counts.increment(Direction::Up, 99);
        let empty = CountingLine::new("B", Point::new(400.0, 0.0), Point::new(400.0, 480.0));
        let registry = LineRegistry::new(vec![line, empty]).unwrap();

        let mut summary = RunSummary::new("yolov8n", &COCO_80);
        summary.fold_lines(&registry);
        summary
    }

    #[test]
    fn test_fps_stats_upper_median() {
        let mut summary = RunSummary::new("yolov8n", &COCO_80);
        for fps in [10.0, 40.0, 20.0, 30.0, 0.0, f64::INFINITY] {
            summary.record_frame(fps);
        }

        assert_eq!(summary.frames_processed, 6);
        let stats = summary.fps_stats().unwrap();
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 40.0);
        assert_eq!(stats.mean, 25.0);
        assert_eq!(stats.median, 30.0);
    }

    #[test]
    fn test_no_fps_samples() {
        let summary = RunSummary::new("yolov8n", &COCO_80);
        assert!(summary.fps_stats().is_none());
        assert!(summary.detections_per_frame().is_none());
    }

    #[test]
    fn test_totals_and_detection_average() {
        let mut summary = summary_with_counts();
        summary.record_detections(3);
        summary.record_frame(10.0);
        summary.record_detections(1);
        summary.record_frame(10.0);

        assert_eq!(summary.total_up(), 2);
        assert_eq!(summary.total_down(), 2);
        assert_eq!(summary.detections_per_frame(), Some(2.0));
    }

    #[test]
    fn test_csv_rows() {
        let csv = summary_with_counts().to_csv();
        let rows: Vec<&str> = csv.lines().collect();
        assert_eq!(
            rows,
            vec![
                "Model,Line,Direction,Class_ID,Class_Name,Count",
                "yolov8n,A,up,0,person,1",
                "yolov8n,A,up,99,Class 99,1",
                "yolov8n,A,down,2,car,2",
            ]
        );
    }

    #[test]
    fn test_report_sections() {
        let report = summary_with_counts().report();
        assert!(report.contains("OBJECT COUNTING SUMMARY FOR MODEL: yolov8n"));
        assert!(report.contains("Tracking Algorithm: None"));
        assert!(report.contains("Line: A"));
        assert!(report.contains("  car: 2"));
        assert!(report.contains("  Class 99: 1"));
        assert!(report.contains("Line: B"));
        assert!(report.contains("No objects counted"));
        assert!(report.contains("  Total Objects: 4"));
    }

    #[test]
    fn test_export_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("Summary");
        let (txt, csv) = summary_with_counts().export(&out).unwrap();

        assert_eq!(txt, out.join("counter_summary_yolov8n.txt"));
        assert_eq!(csv, out.join("counter_summary_yolov8n.csv"));
        assert!(fs::read_to_string(csv).unwrap().starts_with("Model,Line"));
        assert!(fs::read_to_string(txt).unwrap().contains("COUNTING STATISTICS"));
    }

    #[test]
    fn test_duration_format() {
        let d = TimeDelta::milliseconds(3_723_500);
        assert_eq!(format_duration(d), "1:02:03.500000");
    }
}
