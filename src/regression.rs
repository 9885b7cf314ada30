/// Bayesian-style shrinkage of an observed rate toward a population prior.
///
/// `constant` expresses how many denominator units of evidence weigh the same
/// as the prior. With no evidence (`denominator <= 0`, or no observed rate at
/// all) the result is the replacement level exactly.
pub fn shrink_toward(
    raw: Option<f64>,
    denominator: f64,
    constant: f64,
    replacement: f64,
) -> f64 {
    let Some(raw) = raw else {
        return replacement;
    };
    if denominator <= 0.0 {
        return replacement;
    }
    let w = evidence_weight(denominator, constant);
    w * raw + (1.0 - w) * replacement
}

/// Fraction of the estimate carried by the observation: `N / (N + C)`.
pub fn evidence_weight(denominator: f64, constant: f64) -> f64 {
    denominator / (denominator + constant)
}
