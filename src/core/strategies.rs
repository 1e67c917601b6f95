//! Rule-of-thumb allocations to compare against the lifecycle recommendation.

use serde::Serialize;

use super::engine::recommend;
use super::error::{AllocationError, Result};
use super::models::DiscountCurve;
use super::types::{ConstraintsSpec, InvestorProfile, MarketAssumptions, RecommendOptions};

pub const LIFECYCLE_STRATEGY: &str = "Lifecycle (human capital)";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyRow {
    pub name: String,
    pub allocation: f64,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompareOptions {
    pub n_minus_age: u32,
    pub recommend: RecommendOptions,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            n_minus_age: 100,
            recommend: RecommendOptions::default(),
        }
    }
}

pub fn sixty_forty() -> f64 {
    0.60
}

pub fn n_minus_age(age: u32, n: u32) -> f64 {
    ((f64::from(n) - f64::from(age)) / 100.0).clamp(0.0, 1.0)
}

/// Smooth target-date glide path, an approximation of typical fund glide
/// paths rather than a fitted model.
///
/// With `y` years to retirement: `0.50 + 0.40 * (1 - e^(-y/15))` while
/// working and `0.30 + 0.20 * e^(y/7.5)` after retirement. The two halves meet
/// at 50% with equal slope.
pub fn target_date_glide(age: u32, retirement_age: u32) -> f64 {
    let years_to_retirement = f64::from(retirement_age) - f64::from(age);
    let allocation = if years_to_retirement >= 0.0 {
        0.50 + 0.40 * (1.0 - (-years_to_retirement / 15.0).exp())
    } else {
        0.30 + 0.20 * (years_to_retirement / 7.5).exp()
    };
    allocation.clamp(0.0, 1.0)
}

/// The lifecycle recommendation followed by the built-in heuristics and any
/// user-supplied `(name, allocation)` pairs, in that order.
pub fn compare(
    profile: &InvestorProfile,
    market: &MarketAssumptions,
    curve: &DiscountCurve,
    constraints: &ConstraintsSpec,
    extra_strategies: &[(String, f64)],
    options: &CompareOptions,
) -> Result<Vec<StrategyRow>> {
    let result = recommend(profile, market, curve, constraints, &options.recommend)?;
    let age = profile.age;
    let n = options.n_minus_age;

    let mut rows = vec![
        StrategyRow {
            name: LIFECYCLE_STRATEGY.to_string(),
            allocation: result.alpha_recommended,
            description: "Human-capital-adjusted Merton rule".to_string(),
        },
        StrategyRow {
            name: "60/40".to_string(),
            allocation: sixty_forty(),
            description: "Classic fixed 60% equity / 40% bonds".to_string(),
        },
        StrategyRow {
            name: format!("{n}-minus-age"),
            allocation: n_minus_age(age, n),
            description: format!("Equity = ({n} - {age}) / 100"),
        },
        StrategyRow {
            name: "Target-Date Fund".to_string(),
            allocation: target_date_glide(age, profile.retirement_age),
            description: "Parametric TDF glide path (approximation)".to_string(),
        },
    ];

    let (lower, upper) = (constraints.lower_bound(), constraints.upper_bound());
    for (name, allocation) in extra_strategies {
        if !allocation.is_finite() || *allocation < lower || *allocation > upper {
            return Err(AllocationError::configuration(format!(
                "strategy '{name}' allocation {allocation} is outside [{lower}, {upper}]"
            )));
        }
        rows.push(StrategyRow {
            name: name.clone(),
            allocation: *allocation,
            description: "User-supplied".to_string(),
        });
    }

    Ok(rows)
}
