//! Confidence aggregation.
//!
//! A [`Confidence`] collects one probability per claimant for a single
//! [`MappingKind`] and folds them into one scalar with an [`Aggregation`]
//! function. A [`KindDistribution`] holds exactly one confidence per kind.
//!
//! ```text
//!   claimant A ── 0.8 ─┐
//!   claimant B ── 0.6 ─┼──► Aggregation (average | min | max | median) ──► 0.7
//!   claimant C ── 0.7 ─┘
//! ```
//!
//! A claimant holds at most one observation per confidence: a repeated
//! `add_observation` from the same claimant overwrites its earlier value.
//! When two confidences are merged, a claimant present on both sides keeps the
//! larger of its two values.

use crate::claimant::Claimant;
use crate::error::{MentionError, Operation, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============================================================================
// Kinds
// ============================================================================

/// Semantic role of a mention
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MappingKind {
    Name,
    Type,
}

impl MappingKind {
    pub const ALL: [MappingKind; 2] = [MappingKind::Name, MappingKind::Type];
}

impl fmt::Display for MappingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingKind::Name => f.write_str("NAME"),
            MappingKind::Type => f.write_str("TYPE"),
        }
    }
}

// ============================================================================
// Aggregation
// ============================================================================

/// Function folding per-claimant probabilities into one value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Average,
    Min,
    Max,
    Median,
}

impl Aggregation {
    /// Apply to a set of values; the empty set aggregates to 0.
    ///
    /// Values are sorted first so the result does not depend on the order in
    /// which observations arrived.
    pub fn apply(self, values: &[f64]) -> f64 {
        if values.is_empty() {
            return 0.0;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        let n = sorted.len();
        match self {
            Aggregation::Average => sorted.iter().sum::<f64>() / n as f64,
            Aggregation::Min => sorted[0],
            Aggregation::Max => sorted[n - 1],
            Aggregation::Median => {
                if n % 2 == 1 {
                    sorted[n / 2]
                } else {
                    (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
                }
            }
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Aggregation::Average => "average",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
            Aggregation::Median => "median",
        };
        f.write_str(name)
    }
}

pub(crate) fn check_probability(operation: Operation, probability: f64) -> Result<()> {
    if probability.is_nan() || !(0.0..=1.0).contains(&probability) {
        return Err(MentionError::invalid(
            operation,
            format!("probability {probability} outside [0, 1]"),
        ));
    }
    Ok(())
}

// ============================================================================
// Confidence
// ============================================================================

/// One claimant's vote
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub claimant: Claimant,
    pub probability: f64,
}

/// Aggregated belief of several claimants in one kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
    aggregation: Aggregation,
    observations: Vec<Observation>,
}

impl Default for Confidence {
    fn default() -> Self {
        Self::new(Aggregation::default())
    }
}

impl Confidence {
    pub fn new(aggregation: Aggregation) -> Self {
        Self {
            aggregation,
            observations: Vec::new(),
        }
    }

    /// Confidence seeded with one observation
    pub fn with_observation(
        aggregation: Aggregation,
        claimant: Claimant,
        probability: f64,
    ) -> Result<Self> {
        let mut confidence = Self::new(aggregation);
        confidence.add_observation(claimant, probability)?;
        Ok(confidence)
    }

    /// Record a claimant's probability, overwriting its earlier value
    pub fn add_observation(&mut self, claimant: Claimant, probability: f64) -> Result<()> {
        check_probability(Operation::AddObservation, probability)?;
        match self
            .observations
            .iter_mut()
            .find(|o| o.claimant == claimant)
        {
            Some(existing) => existing.probability = probability,
            None => self.observations.push(Observation {
                claimant,
                probability,
            }),
        }
        Ok(())
    }

    /// Aggregated value; 0 when nobody voted
    pub fn value(&self) -> f64 {
        let values: Vec<f64> = self.observations.iter().map(|o| o.probability).collect();
        self.aggregation.apply(&values)
    }

    /// Union of both observation sets, keeping this side's aggregation
    pub fn merge(&self, other: &Confidence) -> Confidence {
        let mut merged = self.clone();
        for observation in &other.observations {
            match merged
                .observations
                .iter_mut()
                .find(|o| o.claimant == observation.claimant)
            {
                Some(existing) => {
                    existing.probability = existing.probability.max(observation.probability)
                }
                None => merged.observations.push(observation.clone()),
            }
        }
        merged
    }

    /// Claimants that contributed to this confidence
    pub fn claimants(&self) -> BTreeSet<Claimant> {
        self.observations
            .iter()
            .map(|o| o.claimant.clone())
            .collect()
    }

    pub fn probability_of(&self, claimant: &Claimant) -> Option<f64> {
        self.observations
            .iter()
            .find(|o| &o.claimant == claimant)
            .map(|o| o.probability)
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn aggregation(&self) -> Aggregation {
        self.aggregation
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Confidence{{{}=>{:.3}}}", self.aggregation, self.value())
    }
}

// ============================================================================
// Kind Distribution
// ============================================================================

/// One confidence per kind
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KindDistribution {
    name: Confidence,
    #[serde(rename = "type")]
    type_: Confidence,
}

impl KindDistribution {
    pub fn new(aggregation: Aggregation) -> Self {
        Self {
            name: Confidence::new(aggregation),
            type_: Confidence::new(aggregation),
        }
    }

    /// Distribution carrying a single vote
    pub fn with_vote(
        aggregation: Aggregation,
        kind: MappingKind,
        claimant: Claimant,
        probability: f64,
    ) -> Result<Self> {
        let mut distribution = Self::new(aggregation);
        distribution.add(kind, claimant, probability)?;
        Ok(distribution)
    }

    pub fn get(&self, kind: MappingKind) -> &Confidence {
        match kind {
            MappingKind::Name => &self.name,
            MappingKind::Type => &self.type_,
        }
    }

    fn get_mut(&mut self, kind: MappingKind) -> &mut Confidence {
        match kind {
            MappingKind::Name => &mut self.name,
            MappingKind::Type => &mut self.type_,
        }
    }

    pub fn add(&mut self, kind: MappingKind, claimant: Claimant, probability: f64) -> Result<()> {
        self.get_mut(kind).add_observation(claimant, probability)
    }

    /// Per-kind merge
    pub fn merge(&self, other: &KindDistribution) -> KindDistribution {
        KindDistribution {
            name: self.name.merge(&other.name),
            type_: self.type_.merge(&other.type_),
        }
    }

    pub fn probability(&self, kind: MappingKind) -> f64 {
        self.get(kind).value()
    }

    /// Winning kind; ties go to NAME
    pub fn kind(&self) -> MappingKind {
        if self.name.value() >= self.type_.value() {
            MappingKind::Name
        } else {
            MappingKind::Type
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (MappingKind, &Confidence)> {
        MappingKind::ALL.into_iter().map(|kind| (kind, self.get(kind)))
    }

    /// Claimants over all kinds
    pub fn claimants(&self) -> BTreeSet<Claimant> {
        let mut claimants = self.name.claimants();
        claimants.extend(self.type_.claimants());
        claimants
    }

    pub fn has_provenance(&self) -> bool {
        !self.name.is_empty() || !self.type_.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn c(name: &str) -> Claimant {
        Claimant::new(name)
    }

    #[test]
    fn empty_confidence_is_zero() {
        assert_eq!(Confidence::default().value(), 0.0);
        assert_eq!(Aggregation::Median.apply(&[]), 0.0);
    }

    #[test]
    fn average_of_distinct_claimants() {
        let mut confidence = Confidence::new(Aggregation::Average);
        confidence.add_observation(c("a"), 0.8).unwrap();
        confidence.add_observation(c("b"), 0.6).unwrap();
        assert_relative_eq!(confidence.value(), 0.7, epsilon = 1e-12);
    }

    #[test]
    fn same_claimant_overwrites() {
        let mut confidence = Confidence::new(Aggregation::Average);
        confidence.add_observation(c("a"), 0.8).unwrap();
        confidence.add_observation(c("a"), 0.2).unwrap();
        assert_eq!(confidence.observations().len(), 1);
        assert_relative_eq!(confidence.value(), 0.2);
    }

    #[test]
    fn out_of_range_probability_is_rejected() {
        let mut confidence = Confidence::default();
        for bad in [-0.1, 1.01, f64::NAN] {
            let err = confidence.add_observation(c("a"), bad).unwrap_err();
            assert!(matches!(err, MentionError::InvalidArgument { .. }));
        }
        assert!(confidence.is_empty());
    }

    #[test]
    fn aggregations() {
        let values = [0.2, 0.9, 0.4, 0.5];
        assert_relative_eq!(Aggregation::Average.apply(&values), 0.5, epsilon = 1e-12);
        assert_relative_eq!(Aggregation::Min.apply(&values), 0.2);
        assert_relative_eq!(Aggregation::Max.apply(&values), 0.9);
        assert_relative_eq!(Aggregation::Median.apply(&values), 0.45, epsilon = 1e-12);
        assert_relative_eq!(Aggregation::Median.apply(&[0.3, 0.1, 0.7]), 0.3);
    }

    #[test]
    fn merge_unions_and_keeps_larger_value_per_claimant() {
        let mut left = Confidence::new(Aggregation::Average);
        left.add_observation(c("a"), 0.4).unwrap();
        left.add_observation(c("b"), 0.6).unwrap();
        let mut right = Confidence::new(Aggregation::Average);
        right.add_observation(c("a"), 0.9).unwrap();
        right.add_observation(c("c"), 0.3).unwrap();

        let merged = left.merge(&right);
        assert_eq!(merged.claimants().len(), 3);
        assert_eq!(merged.probability_of(&c("a")), Some(0.9));
        assert_relative_eq!(merged.value(), (0.9 + 0.6 + 0.3) / 3.0, epsilon = 1e-12);
        assert_relative_eq!(right.merge(&left).value(), merged.value(), epsilon = 1e-12);
    }

    #[test]
    fn distribution_ties_go_to_name() {
        let mut distribution = KindDistribution::new(Aggregation::Average);
        assert_eq!(distribution.kind(), MappingKind::Name);
        distribution.add(MappingKind::Type, c("a"), 0.5).unwrap();
        assert_eq!(distribution.kind(), MappingKind::Type);
        distribution.add(MappingKind::Name, c("b"), 0.5).unwrap();
        assert_eq!(distribution.kind(), MappingKind::Name);
        assert!(distribution.has_provenance());
        assert_eq!(distribution.claimants().len(), 2);
    }
}
