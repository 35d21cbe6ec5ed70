//! Survey vocabulary: answer slots, trait dimensions and archetypes.

use std::borrow::Cow;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Number of answers in one survey response.
pub const NUM_QUESTIONS: usize = 50;

/// Number of consecutive answer slots owned by each trait dimension.
pub const QUESTIONS_PER_DIMENSION: usize = 10;

/// Number of archetypes produced by clustering.
pub const NUM_ARCHETYPES: usize = 5;

/// Lowest and highest valid Likert answer.
pub const ANSWER_RANGE: (f64, f64) = (1.0, 5.0);

/// Human-readable archetype names, indexed by archetype id.
pub const ARCHETYPE_NAMES: [&str; NUM_ARCHETYPES] = [
    "Analytical Thinker",
    "Social Leader",
    "Creative Adventurer",
    "Harmonious Supporter",
    "Organized Planner",
];

/// The five personality axes measured by the survey
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum TraitDimension {
    Extraversion = 0,
    EmotionalStability = 1,
    Agreeableness = 2,
    Conscientiousness = 3,
    Openness = 4,
}

impl TraitDimension {
    /// Get dimension from index (0-4)
    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(TraitDimension::Extraversion),
            1 => Some(TraitDimension::EmotionalStability),
            2 => Some(TraitDimension::Agreeableness),
            3 => Some(TraitDimension::Conscientiousness),
            4 => Some(TraitDimension::Openness),
            _ => None,
        }
    }

    /// All dimensions in answer-slot order
    pub fn all() -> [TraitDimension; 5] {
        [
            TraitDimension::Extraversion,
            TraitDimension::EmotionalStability,
            TraitDimension::Agreeableness,
            TraitDimension::Conscientiousness,
            TraitDimension::Openness,
        ]
    }

    /// Three-letter code used in question identifiers, e.g. `EXT`
    pub fn code(&self) -> &'static str {
        match self {
            TraitDimension::Extraversion => "EXT",
            TraitDimension::EmotionalStability => "EST",
            TraitDimension::Agreeableness => "AGR",
            TraitDimension::Conscientiousness => "CSN",
            TraitDimension::Openness => "OPN",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            TraitDimension::Extraversion => "Extraversion",
            TraitDimension::EmotionalStability => "Emotional Stability",
            TraitDimension::Agreeableness => "Agreeableness",
            TraitDimension::Conscientiousness => "Conscientiousness",
            TraitDimension::Openness => "Openness",
        }
    }

    /// Answer slots owned by this dimension
    pub fn slots(&self) -> std::ops::Range<usize> {
        let start = *self as usize * QUESTIONS_PER_DIMENSION;
        start..start + QUESTIONS_PER_DIMENSION
    }

    /// Identifier of the 1-based `number`-th question of this dimension
    pub fn question_key(&self, number: usize) -> String {
        format!("{}{}", self.code(), number)
    }
}

impl fmt::Display for TraitDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Archetype id assigned by clustering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Archetype(pub usize);

impl Archetype {
    pub fn all() -> impl Iterator<Item = Archetype> {
        (0..NUM_ARCHETYPES).map(Archetype)
    }

    pub fn id(&self) -> usize {
        self.0
    }

    pub fn is_known(&self) -> bool {
        self.0 < NUM_ARCHETYPES
    }

    /// Display name, or `cluster N` for ids outside the fixed table
    pub fn name(&self) -> Cow<'static, str> {
        match ARCHETYPE_NAMES.get(self.0) {
            Some(name) => Cow::Borrowed(name),
            None => Cow::Owned(format!("cluster {}", self.0)),
        }
    }
}

/// A validated set of 50 Likert answers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    answers: Vec<f64>,
}

impl Response {
    pub fn new(answers: &[f64]) -> EngineResult<Self> {
        if answers.len() != NUM_QUESTIONS {
            return Err(EngineError::invalid_input(
                "answers",
                format!(
                    "expected exactly {} answers, got {}",
                    NUM_QUESTIONS,
                    answers.len()
                ),
            ));
        }

        let (low, high) = ANSWER_RANGE;
        if let Some((idx, value)) = answers
            .iter()
            .enumerate()
            .find(|(_, v)| !(**v >= low && **v <= high))
        {
            return Err(EngineError::invalid_input(
                format!("answers[{}]", idx),
                format!(
                    "question {} must be between {} and {}, got {}",
                    idx + 1,
                    low,
                    high,
                    value
                ),
            ));
        }

        Ok(Self {
            answers: answers.to_vec(),
        })
    }

    pub fn answers(&self) -> &[f64] {
        &self.answers
    }

    /// Mean raw answer of one dimension, on the 1-5 scale
    pub fn trait_score(&self, dimension: TraitDimension) -> f64 {
        let slots = &self.answers[dimension.slots()];
        slots.iter().sum::<f64>() / slots.len() as f64
    }

    pub fn trait_scores(&self) -> TraitScores {
        TraitScores {
            ext: self.trait_score(TraitDimension::Extraversion),
            est: self.trait_score(TraitDimension::EmotionalStability),
            agr: self.trait_score(TraitDimension::Agreeableness),
            csn: self.trait_score(TraitDimension::Conscientiousness),
            opn: self.trait_score(TraitDimension::Openness),
        }
    }
}

/// Per-dimension mean answers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraitScores {
    pub ext: f64,
    pub est: f64,
    pub agr: f64,
    pub csn: f64,
    pub opn: f64,
}

impl TraitScores {
    pub fn get(&self, dimension: TraitDimension) -> f64 {
        match dimension {
            TraitDimension::Extraversion => self.ext,
            TraitDimension::EmotionalStability => self.est,
            TraitDimension::Agreeableness => self.agr,
            TraitDimension::Conscientiousness => self.csn,
            TraitDimension::Openness => self.opn,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_slots_are_contiguous() {
        let mut next = 0;
        for dim in TraitDimension::all() {
            let slots = dim.slots();
            assert_eq!(slots.start, next);
            assert_eq!(slots.len(), QUESTIONS_PER_DIMENSION);
            next = slots.end;
        }
        assert_eq!(next, NUM_QUESTIONS);
    }

    #[test]
    fn test_dimension_from_index() {
        assert_eq!(TraitDimension::from_index(0), Some(TraitDimension::Extraversion));
        assert_eq!(TraitDimension::from_index(4), Some(TraitDimension::Openness));
        assert_eq!(TraitDimension::from_index(5), None);
    }

    #[test]
    fn test_question_key() {
        assert_eq!(TraitDimension::Extraversion.question_key(3), "EXT3");
        assert_eq!(TraitDimension::Openness.question_key(10), "OPN10");
    }

    #[test]
    fn test_archetype_names_and_fallback() {
        assert_eq!(Archetype(0).name(), "Analytical Thinker");
        assert_eq!(Archetype(4).name(), "Organized Planner");
        assert_eq!(Archetype(7).name(), "cluster 7");
        assert!(!Archetype(7).is_known());
    }

    #[test]
    fn test_response_rejects_wrong_length() {
        for len in [0, 49, 51] {
            let err = Response::new(&vec![3.0; len]).unwrap_err();
            assert_eq!(err.kind(), "invalid_input");
        }
    }

    #[test]
    fn test_response_rejects_out_of_range() {
        for bad in [0.0, 6.0, 0.99, 5.01, f64::NAN] {
            let mut answers = vec![3.0; NUM_QUESTIONS];
            answers[17] = bad;
            let err = Response::new(&answers).unwrap_err();
            assert_eq!(err.kind(), "invalid_input");
            assert!(err.to_string().contains("question 18"));
        }
    }

    #[test]
    fn test_trait_score_is_exact_mean() {
        let mut answers = vec![3.0; NUM_QUESTIONS];
        answers[..10].copy_from_slice(&[5.0, 4.0, 5.0, 4.0, 5.0, 4.0, 5.0, 4.0, 5.0, 4.0]);
        let response = Response::new(&answers).unwrap();
        let scores = response.trait_scores();
        assert_eq!(scores.ext, 4.5);
        assert_eq!(scores.est, 3.0);
        assert_eq!(scores.get(TraitDimension::Openness), 3.0);
    }
}
