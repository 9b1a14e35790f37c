use serde::{Deserialize, Serialize};

use crate::error::AccumError;

/// How buffered probability vectors are folded into one belief state.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Accumulation {
    /// Element-wise sum. After normalization this equals averaging the trials.
    #[serde(alias = "sum")]
    Mean,
    /// Element-wise product (multiplicative evidence fusion).
    #[default]
    #[serde(alias = "prod")]
    Bayesian,
}

impl Accumulation {
    /// Fold every vector of the buffer, element-wise. Returns an empty vector
    /// for an empty buffer.
    ///
    /// A zero anywhere in a class column zeroes that class under `Bayesian`
    /// until the offending vector leaves the buffer.
    pub fn fold<'a, I>(self, vectors: I) -> Vec<f64>
    where
        I: IntoIterator<Item = &'a [f64]>,
    {
        let mut iter = vectors.into_iter();
        let mut acc = match iter.next() {
            Some(first) => first.to_vec(),
            None => return Vec::new(),
        };
        for v in iter {
            for (a, x) in acc.iter_mut().zip(v) {
                match self {
                    Accumulation::Mean => *a += x,
                    Accumulation::Bayesian => *a *= x,
                }
            }
        }
        acc
    }

    pub fn name(self) -> &'static str {
        match self {
            Accumulation::Mean => "mean",
            Accumulation::Bayesian => "bayesian",
        }
    }
}

/// How a normalized belief state turns into one confidence number.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Scoring {
    /// Highest over second-highest normalized score.
    #[default]
    Ratio,
    /// Highest normalized score.
    Highest,
    /// Iterations since the last reset; ignores the scores.
    #[serde(alias = "iterations")]
    Iteration,
}

impl Scoring {
    pub fn score(self, scores: &[f64], iterations: u64) -> Result<f64, AccumError> {
        match self {
            Scoring::Ratio => {
                let (first, second) = top_two(scores)
                    .ok_or(AccumError::InsufficientClasses { classes: scores.len() })?;
                // A zero runner-up gives +inf, which clears any finite threshold.
                Ok(first / second)
            }
            Scoring::Highest => Ok(scores.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
            Scoring::Iteration => Ok(iterations as f64),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Scoring::Ratio => "ratio",
            Scoring::Highest => "highest",
            Scoring::Iteration => "iteration",
        }
    }
}

/// Scale scores so they sum to 1.
pub fn normalize(scores: &[f64]) -> Result<Vec<f64>, AccumError> {
    let sum: f64 = scores.iter().sum();
    if !sum.is_finite() || sum <= 0.0 {
        return Err(AccumError::DegenerateAccumulation { sum });
    }
    Ok(scores.iter().map(|s| s / sum).collect())
}

/// Index of the highest score; ties resolve to the lowest index.
pub fn argmax(scores: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &s) in scores.iter().enumerate() {
        match best {
            Some((_, b)) if s <= b => {}
            _ => best = Some((i, s)),
        }
    }
    best.map(|(i, _)| i)
}

fn top_two(scores: &[f64]) -> Option<(f64, f64)> {
    if scores.len() < 2 {
        return None;
    }
    let mut first = f64::NEG_INFINITY;
    let mut second = f64::NEG_INFINITY;
    for &s in scores {
        if s > first {
            second = first;
            first = s;
        } else if s > second {
            second = s;
        }
    }
    Some((first, second))
}
