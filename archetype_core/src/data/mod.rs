//! Survey vocabulary and tabular dataset I/O.

pub mod dataset;
pub mod survey;

pub use dataset::{
    read_labeled_dataset, read_raw_dataset, stratified_split, write_labeled_dataset,
    LabeledDataset, RawSurvey, Split, LABEL_COLUMN,
};
pub use survey::{
    Archetype, Response, TraitDimension, TraitScores, ARCHETYPE_NAMES, NUM_ARCHETYPES,
    NUM_QUESTIONS, QUESTIONS_PER_DIMENSION,
};
