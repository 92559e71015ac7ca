//! Per-question correctness under a weight matrix.

use labgrade_core::model::Answer;
use labgrade_core::scores::WeightMatrix;

/// Score of one question, relative to a perfect answer.
///
/// Every proposition contributes `weight(expected, observed)`; the sum is
/// divided by the best achievable sum `Σ weight(expected, expected)`.
/// A missing answer, or a proposition left out, counts as observed `false`.
/// A question whose best achievable sum is zero scores 0.
pub fn question_score(expected: &Answer, observed: Option<&Answer>, weights: &WeightMatrix) -> f64 {
    let mut obtained = 0.0;
    let mut best = 0.0;
    for (proposition, expected_flag) in expected.propositions() {
        let observed_flag = observed.is_some_and(|answer| answer.value_of(proposition));
        obtained += weights.weight(expected_flag, observed_flag);
        best += weights.weight(expected_flag, expected_flag);
    }
    if best == 0.0 {
        0.0
    } else {
        obtained / best
    }
}
