//! Versioned artifact persistence for fitted models.
//!
//! Artifacts are written with a deterministic bincode codec inside an
//! [`ArtifactEnvelope`] carrying a schema version, the artifact kind and the
//! pair id of the training run that produced it. The classifier and the
//! standardizer of one run share a pair id; [`load_pair`] refuses anything
//! else so that a model is never combined with a foreign scale.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use bincode::Options;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current on-disk schema version.
pub const ARTIFACT_VERSION: u32 = 1;

/// Errors that can occur while saving or loading artifacts.
#[derive(Debug)]
pub enum CheckpointError {
    /// Underlying I/O failure while reading or writing artifact files.
    Io(std::io::Error),
    /// Serialization or deserialization error from the binary codec.
    Serialization(bincode::Error),
    /// The file was well formed but has an incompatible schema version.
    VersionMismatch { expected: u32, found: u32 },
    /// The file holds a different artifact than the one requested.
    KindMismatch {
        expected: ArtifactKind,
        found: ArtifactKind,
    },
    /// Classifier and standardizer come from different training runs.
    PairMismatch { classifier: Uuid, standardizer: Uuid },
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointError::Io(err) => write!(f, "I/O error while accessing artifact: {err}"),
            CheckpointError::Serialization(err) => {
                write!(f, "Failed to (de)serialize artifact payload: {err}")
            }
            CheckpointError::VersionMismatch { expected, found } => write!(
                f,
                "Artifact version mismatch: expected {expected}, found {found}",
            ),
            CheckpointError::KindMismatch { expected, found } => write!(
                f,
                "Artifact kind mismatch: expected {expected:?}, found {found:?}",
            ),
            CheckpointError::PairMismatch {
                classifier,
                standardizer,
            } => write!(
                f,
                "Classifier (run {classifier}) and standardizer (run {standardizer}) were not trained together",
            ),
        }
    }
}

impl std::error::Error for CheckpointError {}

impl From<std::io::Error> for CheckpointError {
    fn from(err: std::io::Error) -> Self {
        CheckpointError::Io(err)
    }
}

impl From<bincode::Error> for CheckpointError {
    fn from(err: bincode::Error) -> Self {
        CheckpointError::Serialization(err)
    }
}

/// Deterministic binary codec options shared by all artifacts.
fn codec() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_little_endian()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    Classifier,
    Standardizer,
}

/// Header plus payload as stored on disk.
#[derive(Debug, Serialize, Deserialize)]
pub struct ArtifactEnvelope<T> {
    pub version: u32,
    pub kind: ArtifactKind,
    pub pair_id: Uuid,
    pub payload: T,
}

/// Types that can be stored as one half of an artifact pair.
pub trait Artifact: Serialize + DeserializeOwned {
    const KIND: ArtifactKind;
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn ensure_parent(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

fn write_envelope<T: Artifact>(
    path: &Path,
    pair_id: Uuid,
    payload: &T,
) -> Result<(), CheckpointError> {
    ensure_parent(path)?;
    let envelope = ArtifactEnvelope {
        version: ARTIFACT_VERSION,
        kind: T::KIND,
        pair_id,
        payload,
    };
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    codec().serialize_into(&mut writer, &envelope)?;
    writer.flush()?;
    writer.get_ref().sync_all()?;
    Ok(())
}

/// Read one artifact and verify its header.
pub fn read_artifact<T: Artifact>(path: &Path) -> Result<(Uuid, T), CheckpointError> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let envelope: ArtifactEnvelope<T> = codec().deserialize_from(&mut reader)?;
    if envelope.version != ARTIFACT_VERSION {
        return Err(CheckpointError::VersionMismatch {
            expected: ARTIFACT_VERSION,
            found: envelope.version,
        });
    }
    if envelope.kind != T::KIND {
        return Err(CheckpointError::KindMismatch {
            expected: T::KIND,
            found: envelope.kind,
        });
    }
    Ok((envelope.pair_id, envelope.payload))
}

/// Atomically replace a single file with `contents`.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), CheckpointError> {
    ensure_parent(path)?;
    let staging = staging_path(path);
    {
        let mut file = File::create(&staging)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&staging, path).map_err(|err| {
        let _ = fs::remove_file(&staging);
        CheckpointError::Io(err)
    })
}

/// Which file of the pair an error refers to.
#[derive(Debug)]
pub struct PairError {
    pub path: PathBuf,
    pub error: CheckpointError,
}

/// Write classifier and standardizer as one matched pair.
///
/// Both files are staged and flushed before either replaces its
/// predecessor. If the second rename fails the first is removed again, so a
/// failed run never leaves a mixed pair behind.
pub fn save_pair<C: Artifact, S: Artifact>(
    classifier_path: &Path,
    classifier: &C,
    standardizer_path: &Path,
    standardizer: &S,
) -> Result<Uuid, PairError> {
    let pair_id = Uuid::new_v4();
    let classifier_tmp = staging_path(classifier_path);
    let standardizer_tmp = staging_path(standardizer_path);

    let staged = write_envelope(&classifier_tmp, pair_id, classifier)
        .map_err(|error| PairError {
            path: classifier_path.to_path_buf(),
            error,
        })
        .and_then(|_| {
            write_envelope(&standardizer_tmp, pair_id, standardizer).map_err(|error| PairError {
                path: standardizer_path.to_path_buf(),
                error,
            })
        });
    if let Err(err) = staged {
        let _ = fs::remove_file(&classifier_tmp);
        let _ = fs::remove_file(&standardizer_tmp);
        return Err(err);
    }

    if let Err(err) = fs::rename(&standardizer_tmp, standardizer_path) {
        let _ = fs::remove_file(&classifier_tmp);
        let _ = fs::remove_file(&standardizer_tmp);
        return Err(PairError {
            path: standardizer_path.to_path_buf(),
            error: err.into(),
        });
    }
    if let Err(err) = fs::rename(&classifier_tmp, classifier_path) {
        let _ = fs::remove_file(&classifier_tmp);
        let _ = fs::remove_file(standardizer_path);
        return Err(PairError {
            path: classifier_path.to_path_buf(),
            error: err.into(),
        });
    }

    Ok(pair_id)
}

/// Load a matched pair written by [`save_pair`].
pub fn load_pair<C: Artifact, S: Artifact>(
    classifier_path: &Path,
    standardizer_path: &Path,
) -> Result<(Uuid, C, S), PairError> {
    let (classifier_id, classifier) =
        read_artifact::<C>(classifier_path).map_err(|error| PairError {
            path: classifier_path.to_path_buf(),
            error,
        })?;
    let (standardizer_id, standardizer) =
        read_artifact::<S>(standardizer_path).map_err(|error| PairError {
            path: standardizer_path.to_path_buf(),
            error,
        })?;
    if classifier_id != standardizer_id {
        return Err(PairError {
            path: standardizer_path.to_path_buf(),
            error: CheckpointError::PairMismatch {
                classifier: classifier_id,
                standardizer: standardizer_id,
            },
        });
    }
    Ok((classifier_id, classifier, standardizer))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Weights(Vec<f64>);

    impl Artifact for Weights {
        const KIND: ArtifactKind = ArtifactKind::Classifier;
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Scale(Vec<f64>);

    impl Artifact for Scale {
        const KIND: ArtifactKind = ArtifactKind::Standardizer;
    }

    #[test]
    fn test_pair_roundtrip_shares_id() {
        let dir = tempfile::tempdir().unwrap();
        let c = dir.path().join("model/rf.bin");
        let s = dir.path().join("model/scaler.bin");

        let id = save_pair(&c, &Weights(vec![1.0, 2.0]), &s, &Scale(vec![0.5])).unwrap();
        let (loaded_id, weights, scale) = load_pair::<Weights, Scale>(&c, &s).unwrap();

        assert_eq!(id, loaded_id);
        assert_eq!(weights, Weights(vec![1.0, 2.0]));
        assert_eq!(scale, Scale(vec![0.5]));
        assert!(!staging_path(&c).exists());
        assert!(!staging_path(&s).exists());
    }

    #[test]
    fn test_mixed_pair_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let c = dir.path().join("rf.bin");
        let s = dir.path().join("scaler.bin");
        let other_c = dir.path().join("other_rf.bin");
        let other_s = dir.path().join("other_scaler.bin");

        save_pair(&c, &Weights(vec![1.0]), &s, &Scale(vec![1.0])).unwrap();
        save_pair(&other_c, &Weights(vec![2.0]), &other_s, &Scale(vec![2.0])).unwrap();

        let err = load_pair::<Weights, Scale>(&c, &other_s).unwrap_err();
        assert!(matches!(err.error, CheckpointError::PairMismatch { .. }));
    }

    #[test]
    fn test_kind_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let c = dir.path().join("rf.bin");
        let s = dir.path().join("scaler.bin");
        save_pair(&c, &Weights(vec![1.0]), &s, &Scale(vec![1.0])).unwrap();

        let err = read_artifact::<Scale>(&c).unwrap_err();
        assert!(matches!(err, CheckpointError::KindMismatch { .. }));
    }

    #[test]
    fn test_truncated_file_fails_to_decode() {
        let dir = tempfile::tempdir().unwrap();
        let c = dir.path().join("rf.bin");
        fs::write(&c, [1u8, 0, 0]).unwrap();
        let err = read_artifact::<Weights>(&c).unwrap_err();
        assert!(matches!(err, CheckpointError::Serialization(_)));
    }

    #[test]
    fn test_failed_second_rename_removes_first_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let c = dir.path().join("rf.bin");
        let s = dir.path().join("scaler.bin");
        // A non-empty directory cannot be replaced by a file.
        fs::create_dir_all(c.join("occupied")).unwrap();

        let err = save_pair(&c, &Weights(vec![1.0]), &s, &Scale(vec![1.0])).unwrap_err();
        assert_eq!(err.path, c);
        assert!(matches!(err.error, CheckpointError::Io(_)));
        assert!(!s.exists());
        assert!(!staging_path(&c).exists());
        assert!(!staging_path(&s).exists());
    }

    #[test]
    fn test_write_atomic_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.csv");
        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second");
        assert!(!staging_path(&path).exists());
    }
}
