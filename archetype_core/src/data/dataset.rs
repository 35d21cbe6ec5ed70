//! Tabular survey datasets
//!
//! Reads the tab-separated raw corpus, writes and reads the labeled CSV that
//! connects the labeler to the trainer, and performs the stratified
//! train/test split.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use ndarray::{Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::checkpoint::write_atomic;
use crate::data::survey::{NUM_ARCHETYPES, NUM_QUESTIONS};
use crate::error::{EngineError, EngineResult};

/// Name of the archetype column shared by the labeler (writer) and the
/// trainer (reader).
pub const LABEL_COLUMN: &str = "personality_type";

/// Field values treated as missing when reading the raw corpus.
const MISSING_MARKERS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NULL", "null", "NaN", "nan", "-NaN", "-nan", "None", "<NA>", "#N/A",
    "#NA", "#N/A N/A", "1.#IND", "-1.#IND", "1.#QNAN", "-1.#QNAN",
];

fn is_missing(field: &str) -> bool {
    let field = field.trim();
    MISSING_MARKERS.iter().any(|marker| *marker == field)
}

fn open(path: &Path, context: &str) -> EngineResult<File> {
    match File::open(path) {
        Ok(file) => Ok(file),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            Err(EngineError::missing_input(path, context))
        }
        Err(err) => Err(EngineError::malformed(path, err.to_string())),
    }
}

fn parse_features(
    record: &StringRecord,
    path: &Path,
    line: u64,
    headers: &[String],
) -> EngineResult<[f64; NUM_QUESTIONS]> {
    let mut row = [0.0; NUM_QUESTIONS];
    for (col, slot) in row.iter_mut().enumerate() {
        let field = record.get(col).unwrap_or("").trim();
        let value: f64 = field.parse().map_err(|_| {
            EngineError::malformed(
                path,
                format!(
                    "line {}: column '{}' is not numeric: '{}'",
                    line, headers[col], field
                ),
            )
        })?;
        if !value.is_finite() {
            return Err(EngineError::malformed(
                path,
                format!("line {}: column '{}' is not finite", line, headers[col]),
            ));
        }
        *slot = value;
    }
    Ok(row)
}

fn into_matrix(rows: Vec<[f64; NUM_QUESTIONS]>) -> Array2<f64> {
    let n = rows.len();
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((n, NUM_QUESTIONS), flat)
        .unwrap_or_else(|_| Array2::zeros((0, NUM_QUESTIONS)))
}

/// Complete rows of the raw survey corpus, first 50 columns only
#[derive(Debug, Clone)]
pub struct RawSurvey {
    /// Header names of the 50 question columns
    pub headers: Vec<String>,
    /// One row per kept respondent
    pub features: Array2<f64>,
    /// Rows in the file before dropping incomplete ones
    pub total_rows: usize,
}

impl RawSurvey {
    pub fn len(&self) -> usize {
        self.features.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.features.nrows() == 0
    }
}

/// Read the tab-separated raw corpus, dropping every row that has a missing
/// value in any column.
pub fn read_raw_dataset(path: &Path) -> EngineResult<RawSurvey> {
    let file = open(path, "raw survey dataset")?;
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .from_reader(file);

    let header_record = reader
        .headers()
        .map_err(|err| EngineError::malformed(path, err.to_string()))?
        .clone();
    if header_record.len() < NUM_QUESTIONS {
        return Err(EngineError::malformed(
            path,
            format!(
                "expected at least {} columns, found {}",
                NUM_QUESTIONS,
                header_record.len()
            ),
        ));
    }
    let width = header_record.len();
    let headers: Vec<String> = header_record
        .iter()
        .take(NUM_QUESTIONS)
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    let mut total_rows = 0;
    for result in reader.records() {
        let record = result.map_err(|err| EngineError::malformed(path, err.to_string()))?;
        total_rows += 1;

        // Short rows count as missing trailing values.
        if record.len() < width || record.iter().any(is_missing) {
            continue;
        }

        let line = record.position().map(|p| p.line()).unwrap_or(0);
        rows.push(parse_features(&record, path, line, &headers)?);
    }

    tracing::info!(
        "Read {} survey rows from {}, kept {} complete rows",
        total_rows,
        path.display(),
        rows.len()
    );

    Ok(RawSurvey {
        headers,
        features: into_matrix(rows),
        total_rows,
    })
}

/// Raw answers paired with their cluster-assigned archetype
#[derive(Debug, Clone)]
pub struct LabeledDataset {
    pub headers: Vec<String>,
    pub features: Array2<f64>,
    pub labels: Vec<usize>,
}

impl LabeledDataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Rows selected by `indices`, in that order
    pub fn select(&self, indices: &[usize]) -> (Array2<f64>, Vec<usize>) {
        let features = self.features.select(Axis(0), indices);
        let labels = indices.iter().map(|&i| self.labels[i]).collect();
        (features, labels)
    }
}

/// Write the labeled dataset, atomically replacing any previous file.
pub fn write_labeled_dataset(
    path: &Path,
    headers: &[String],
    features: ArrayView2<'_, f64>,
    labels: &[usize],
) -> EngineResult<()> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    let persistence = |err: csv::Error| EngineError::persistence(path, std::io::Error::from(err));

    let mut header_row: Vec<&str> = headers.iter().map(String::as_str).collect();
    header_row.push(LABEL_COLUMN);
    writer.write_record(&header_row).map_err(persistence)?;

    for (row, label) in features.outer_iter().zip(labels) {
        let mut fields: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        fields.push(label.to_string());
        writer.write_record(&fields).map_err(persistence)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|err| EngineError::persistence(path, err.into_error()))?;
    write_atomic(path, &bytes).map_err(|err| EngineError::persistence(path, err))
}

/// Read the labeled dataset: the first 50 columns are features, the
/// archetype id comes from [`LABEL_COLUMN`].
pub fn read_labeled_dataset(path: &Path) -> EngineResult<LabeledDataset> {
    let file = open(path, "labeled dataset")?;
    let mut reader = ReaderBuilder::new().has_headers(true).from_reader(file);

    let header_record = reader
        .headers()
        .map_err(|err| EngineError::malformed(path, err.to_string()))?
        .clone();
    let label_idx = header_record
        .iter()
        .position(|h| h.trim() == LABEL_COLUMN)
        .ok_or_else(|| {
            EngineError::malformed(path, format!("label column '{}' not found", LABEL_COLUMN))
        })?;
    if label_idx < NUM_QUESTIONS {
        return Err(EngineError::malformed(
            path,
            format!(
                "expected {} feature columns before '{}', found {}",
                NUM_QUESTIONS, LABEL_COLUMN, label_idx
            ),
        ));
    }
    let headers: Vec<String> = header_record
        .iter()
        .take(NUM_QUESTIONS)
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|err| EngineError::malformed(path, err.to_string()))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        rows.push(parse_features(&record, path, line, &headers)?);

        let raw = record.get(label_idx).unwrap_or("").trim();
        let label = raw
            .parse::<usize>()
            .ok()
            .filter(|l| *l < NUM_ARCHETYPES)
            .ok_or_else(|| {
                EngineError::malformed(
                    path,
                    format!("line {}: invalid archetype label '{}'", line, raw),
                )
            })?;
        labels.push(label);
    }

    Ok(LabeledDataset {
        headers,
        features: into_matrix(rows),
        labels,
    })
}

/// Row indices of a stratified train/test split
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Split row indices so that both partitions keep the class proportions of
/// `labels`.
///
/// The test partition holds `ceil(n * test_fraction)` rows. Each class
/// contributes the floor of its proportional share; leftover rows go to the
/// classes with the largest fractional remainder, lower ids first on ties.
/// No class gives up its last training row, so a test fraction close to one
/// may hold out fewer rows than requested.
pub fn stratified_split(labels: &[usize], test_fraction: f64, seed: u64) -> EngineResult<Split> {
    let n = labels.len();
    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(idx);
    }

    if let Some((class, members)) = by_class.iter().find(|(_, m)| m.len() < 2) {
        return Err(EngineError::invalid_input(
            "labels",
            format!(
                "archetype {} has {} row(s); stratified splitting needs at least 2 per class",
                class,
                members.len()
            ),
        ));
    }

    let n_test = (n as f64 * test_fraction).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(EngineError::invalid_input(
            "labels",
            format!(
                "{} rows cannot be split with test fraction {}",
                n, test_fraction
            ),
        ));
    }

    // Every class keeps at least one training row.
    let mut quotas: Vec<(usize, usize, f64)> = by_class
        .iter()
        .map(|(&class, members)| {
            let exact = members.len() as f64 * n_test as f64 / n as f64;
            let quota = (exact.floor() as usize).min(members.len() - 1);
            (class, quota, exact - exact.floor())
        })
        .collect();
    let assigned: usize = quotas.iter().map(|(_, q, _)| q).sum();
    let mut order: Vec<usize> = (0..quotas.len()).collect();
    order.sort_by(|&a, &b| {
        quotas[b]
            .2
            .partial_cmp(&quotas[a].2)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(quotas[a].0.cmp(&quotas[b].0))
    });
    let mut remaining = n_test.saturating_sub(assigned);
    for &i in &order {
        if remaining == 0 {
            break;
        }
        let (class, quota, _) = quotas[i];
        if quota + 1 < by_class[&class].len() {
            quotas[i].1 += 1;
            remaining -= 1;
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n - n_test);
    let mut test = Vec::with_capacity(n_test);
    for (class, quota, _) in quotas {
        let mut members = by_class[&class].clone();
        members.shuffle(&mut rng);
        let (held_out, kept) = members.split_at(quota);
        test.extend_from_slice(held_out);
        train.extend_from_slice(kept);
    }
    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    Ok(Split { train, test })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn tsv_header(extra: &[&str]) -> String {
        let mut cols: Vec<String> = (0..NUM_QUESTIONS).map(|i| format!("Q{}", i + 1)).collect();
        cols.extend(extra.iter().map(|s| s.to_string()));
        cols.join("\t")
    }

    fn tsv_row(value: &str, extra: &[&str]) -> String {
        let mut cols = vec![value.to_string(); NUM_QUESTIONS];
        cols.extend(extra.iter().map(|s| s.to_string()));
        cols.join("\t")
    }

    #[test]
    fn test_raw_reader_drops_incomplete_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.tsv");
        let mut file = File::create(&path).unwrap();
        writeln!(file, "{}", tsv_header(&["country"])).unwrap();
        writeln!(file, "{}", tsv_row("3", &["NZ"])).unwrap();
        // Missing value in an extra column still drops the row.
        writeln!(file, "{}", tsv_row("4", &["NULL"])).unwrap();
        let mut holes = vec!["2".to_string(); NUM_QUESTIONS];
        holes[7] = String::new();
        writeln!(file, "{}\tUS", holes.join("\t")).unwrap();
        writeln!(file, "{}", tsv_row("5", &["DE"])).unwrap();
        drop(file);

        let raw = read_raw_dataset(&path).unwrap();
        assert_eq!(raw.total_rows, 4);
        assert_eq!(raw.len(), 2);
        assert_eq!(raw.headers[0], "Q1");
        assert_eq!(raw.headers.len(), NUM_QUESTIONS);
        assert_eq!(raw.features[[0, 0]], 3.0);
        assert_eq!(raw.features[[1, 49]], 5.0);
    }

    #[test]
    fn test_raw_reader_missing_file() {
        let err = read_raw_dataset(Path::new("/nonexistent/data-final.csv")).unwrap_err();
        assert_eq!(err.kind(), "missing_input");
    }

    #[test]
    fn test_raw_reader_rejects_narrow_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("narrow.tsv");
        std::fs::write(&path, "a\tb\n1\t2\n").unwrap();
        let err = read_raw_dataset(&path).unwrap_err();
        assert_eq!(err.kind(), "malformed_data");
    }

    #[test]
    fn test_raw_reader_rejects_non_numeric_answer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.tsv");
        let mut answers = vec!["3".to_string(); NUM_QUESTIONS];
        answers[12] = "often".to_string();
        let contents = format!(
            "{}\n{}\n{}\tFR\n",
            tsv_header(&["country"]),
            tsv_row("2", &["IT"]),
            answers.join("\t")
        );
        std::fs::write(&path, contents).unwrap();

        let err = read_raw_dataset(&path).unwrap_err();
        assert_eq!(err.kind(), "malformed_data");
        assert!(err.to_string().contains("Q13"));
    }

    #[test]
    fn test_labeled_roundtrip_keeps_headers_and_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/labeled.csv");
        let headers: Vec<String> = (0..NUM_QUESTIONS).map(|i| format!("Q{}", i)).collect();
        let features = Array2::from_shape_fn((3, NUM_QUESTIONS), |(r, c)| (r + c % 5) as f64);
        let labels = vec![0, 4, 2];

        write_labeled_dataset(&path, &headers, features.view(), &labels).unwrap();
        let dataset = read_labeled_dataset(&path).unwrap();

        assert_eq!(dataset.headers, headers);
        assert_eq!(dataset.labels, labels);
        assert_eq!(dataset.features, features);
    }

    #[test]
    fn test_labeled_reader_requires_label_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labeled.csv");
        let header: Vec<String> = (0..=NUM_QUESTIONS).map(|i| format!("c{}", i)).collect();
        std::fs::write(&path, format!("{}\n", header.join(","))).unwrap();
        let err = read_labeled_dataset(&path).unwrap_err();
        assert!(err.to_string().contains(LABEL_COLUMN));
    }

    #[test]
    fn test_labeled_reader_rejects_unknown_archetype() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labeled.csv");
        let headers: Vec<String> = (0..NUM_QUESTIONS).map(|i| format!("Q{}", i)).collect();
        let features = Array2::from_elem((2, NUM_QUESTIONS), 3.0);
        write_labeled_dataset(&path, &headers, features.view(), &[1, NUM_ARCHETYPES]).unwrap();

        let err = read_labeled_dataset(&path).unwrap_err();
        assert_eq!(err.kind(), "malformed_data");
        assert!(err.to_string().contains("invalid archetype label"));
    }

    #[test]
    fn test_stratified_split_preserves_proportions() {
        let mut labels = Vec::new();
        for (class, count) in [(0, 50), (1, 30), (2, 15), (3, 3), (4, 2)] {
            labels.extend(std::iter::repeat(class).take(count));
        }
        let split = stratified_split(&labels, 0.2, 42).unwrap();

        assert_eq!(split.test.len(), 20);
        assert_eq!(split.train.len(), 80);

        let mut test_counts = [0usize; NUM_ARCHETYPES];
        for &i in &split.test {
            test_counts[labels[i]] += 1;
        }
        assert_eq!(test_counts[0], 10);
        assert_eq!(test_counts[1], 6);
        assert_eq!(test_counts[2], 3);

        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..labels.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_stratified_split_is_deterministic() {
        let labels: Vec<usize> = (0..200).map(|i| i % 5).collect();
        let a = stratified_split(&labels, 0.2, 7).unwrap();
        let b = stratified_split(&labels, 0.2, 7).unwrap();
        assert_eq!(a.train, b.train);
        assert_eq!(a.test, b.test);
    }

    #[test]
    fn test_stratified_split_keeps_a_training_row_per_class() {
        let mut labels = vec![0, 0];
        labels.extend(std::iter::repeat(1).take(10));
        let split = stratified_split(&labels, 0.9, 42).unwrap();

        for class in [0, 1] {
            assert!(split.train.iter().any(|&i| labels[i] == class));
            assert!(split.test.iter().any(|&i| labels[i] == class));
        }
        assert_eq!(split.train.len() + split.test.len(), labels.len());
    }

    #[test]
    fn test_stratified_split_rejects_singleton_class() {
        let labels = vec![0, 0, 0, 1];
        let err = stratified_split(&labels, 0.2, 42).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }
}
