use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

fn timestamp_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

fn append_json_line<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> io::Result<()> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    serde_json::to_writer(&mut file, value)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err))?;
    file.write_all(b"\n")
}

#[derive(Debug, Serialize)]
pub struct LabelingLogEntry {
    pub timestamp_ms: u128,
    pub total_rows: usize,
    pub kept_rows: usize,
    pub inertia: f64,
    pub iterations: usize,
    pub cluster_sizes: Vec<usize>,
}

pub fn log_labeling_run(
    log_dir: &Path,
    total_rows: usize,
    kept_rows: usize,
    inertia: f64,
    iterations: usize,
    cluster_sizes: &[usize],
) -> io::Result<()> {
    let entry = LabelingLogEntry {
        timestamp_ms: timestamp_ms(),
        total_rows,
        kept_rows,
        inertia,
        iterations,
        cluster_sizes: cluster_sizes.to_vec(),
    };
    append_json_line(log_dir.join("labeling.jsonl"), &entry)
}

#[derive(Debug, Serialize)]
pub struct TrainingLogEntry {
    pub timestamp_ms: u128,
    pub pair_id: String,
    pub accuracy: f64,
    pub train_rows: usize,
    pub test_rows: usize,
    pub elapsed_ms: u128,
}

pub fn log_training_run(
    log_dir: &Path,
    pair_id: &str,
    accuracy: f64,
    stats: &crate::learner::TrainingStats,
) -> io::Result<()> {
    let entry = TrainingLogEntry {
        timestamp_ms: timestamp_ms(),
        pair_id: pair_id.to_string(),
        accuracy,
        train_rows: stats.train_rows,
        test_rows: stats.test_rows,
        elapsed_ms: stats.elapsed_ms,
    };
    append_json_line(log_dir.join("training.jsonl"), &entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::learner::TrainingStats;

    #[test]
    fn training_runs_append_one_line_each() {
        let dir = tempfile::tempdir().unwrap();
        let stats = TrainingStats {
            train_rows: 80,
            test_rows: 20,
            elapsed_ms: 5,
        };
        log_training_run(dir.path(), "a", 0.9, &stats).unwrap();
        log_training_run(dir.path(), "b", 0.8, &stats).unwrap();

        let contents = fs::read_to_string(dir.path().join("training.jsonl")).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["pair_id"], "a");
        assert_eq!(first["test_rows"], 20);
    }

    #[test]
    fn labeling_log_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let log_dir = dir.path().join("nested/logs");
        log_labeling_run(&log_dir, 10, 8, 1.5, 4, &[2, 2, 2, 1, 1]).unwrap();
        assert!(log_dir.join("labeling.jsonl").exists());
    }
}
