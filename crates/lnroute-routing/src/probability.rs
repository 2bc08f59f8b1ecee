use lnroute_core::Msat;

use crate::effective::EdgeView;

/// Probability that `amount` fits through an edge whose liquidity is known to
/// lie in `[lo, hi]`, assuming it is uniformly distributed over that range.
pub fn uniform_success(lo: Msat, hi: Msat, amount: Msat) -> f64 {
    if amount <= lo {
        return 1.0;
    }
    if amount > hi {
        return 0.0;
    }
    let hi = u128::from(hi.msat()) + 1;
    let numerator = hi - u128::from(amount.msat());
    let denominator = hi - u128::from(lo.msat());
    numerator as f64 / denominator as f64
}

/// Success estimate for one hop carrying `amount` when `used` of the edge is
/// already spoken for by earlier parts of the same payment.
pub fn edge_success_probability(edge: &EdgeView, amount: Msat, used: Msat) -> f64 {
    let hi = edge.liquidity_ceiling().saturating_sub(used);
    let lo = edge.liquidity_floor().saturating_sub(used);
    uniform_success(lo, hi, amount)
}

/// Convert a probability to parts per million, clamped to `[0, 1_000_000]`.
pub fn to_ppm(probability: f64) -> u32 {
    if probability.is_nan() {
        return 0;
    }
    (probability.clamp(0.0, 1.0) * 1_000_000.0).round() as u32
}
