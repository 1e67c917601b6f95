use tracing::{debug, warn};

use super::error::{AllocationError, Result};
use super::explain::build_explanation;
use super::human_capital;
use super::models::DiscountCurve;
use super::solver::solve;
use super::types::{
    AllocationComponents, AllocationResult, ConstraintsSpec, InvestorProfile, MarketAssumptions,
    RecommendOptions, WealthPolicy,
};

/// Recommended stock share for one investor.
///
/// The baseline share from the two-tier solver is scaled by `1 + H/W` and the
/// result is clamped into the bounds implied by `constraints`.
pub fn recommend(
    profile: &InvestorProfile,
    market: &MarketAssumptions,
    curve: &DiscountCurve,
    constraints: &ConstraintsSpec,
    options: &RecommendOptions,
) -> Result<AllocationResult> {
    market.validate()?;
    constraints.validate()?;

    let mut warnings = Vec::new();
    let gamma = profile.gamma()?;
    if let Some(message) = profile.risk.ambiguity() {
        warn!(detail = %message, "ambiguous risk preference");
        warnings.push(message);
    }

    let share = solve(market, gamma, constraints, options.variant)?;

    let wealth = profile.investable_wealth;
    if !wealth.is_finite() {
        return Err(AllocationError::domain("investable_wealth must be finite"));
    }
    if wealth <= 0.0 && options.wealth_policy == WealthPolicy::Reject {
        return Err(AllocationError::domain(format!(
            "non-positive wealth: investable_wealth must be > 0, got {wealth}"
        )));
    }

    let human_capital = human_capital::present_value(profile, curve, options.t_max)?;
    let lower_bound = constraints.lower_bound();
    let upper_bound = constraints.upper_bound();

    let (hw_ratio, alpha_unconstrained) = if wealth > 0.0 {
        let ratio = human_capital / wealth;
        // A zero baseline stays zero even when H/W overflows.
        let alpha = if share.alpha == 0.0 {
            0.0
        } else {
            share.alpha * (1.0 + ratio)
        };
        (ratio, alpha)
    } else {
        let message = format!(
            "investable_wealth is {wealth}; treating H/W as unbounded and allocating fully"
        );
        warn!(detail = %message, "wealth fallback applied");
        warnings.push(message);
        let ratio = if human_capital > 0.0 { f64::INFINITY } else { 0.0 };
        let alpha = if share.alpha > 0.0 {
            upper_bound
        } else {
            share.alpha
        };
        (ratio, alpha)
    };

    let alpha_recommended = alpha_unconstrained.clamp(lower_bound, upper_bound);
    let leverage_applied = share.leverage_applied && alpha_recommended > 1.0;

    debug!(
        gamma = %format!("{gamma:.4}"),
        alpha_unlev = %format!("{:.4}", share.alpha_unlev),
        alpha_star = %format!("{:.4}", share.alpha),
        human_capital = %format!("{human_capital:.0}"),
        hw_ratio = %format!("{hw_ratio:.4}"),
        alpha_recommended = %format!("{alpha_recommended:.4}"),
        leverage_applied,
        "allocation computed"
    );

    let components = AllocationComponents {
        gamma,
        alpha_unlev: share.alpha_unlev,
        alpha_lev: share.alpha_lev,
        alpha_star: share.alpha,
        alpha_unconstrained,
        alpha_recommended,
        human_capital,
        investable_wealth: wealth,
        hw_ratio,
        lower_bound,
        upper_bound,
        leverage_applied,
        borrowing_cost_drag: share.borrowing_cost_drag,
        mu: market.mu,
        r: market.r,
        sigma: market.sigma,
        borrowing_spread: market.borrowing_spread,
        real: market.real,
        t_max: options.t_max,
        variant: options.variant,
    };
    let explain = build_explanation(&components);

    Ok(AllocationResult {
        alpha_star: share.alpha,
        alpha_unconstrained,
        alpha_recommended,
        human_capital,
        leverage_applied,
        borrowing_cost_drag: share.borrowing_cost_drag,
        explain,
        components,
        warnings,
    })
}
