use super::error::{AllocationError, Result};
use super::types::{AlphaVariant, ConstraintsSpec, MarketAssumptions};

/// Baseline risky share from the two-tier lending/borrowing rule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskyShare {
    pub alpha: f64,
    pub leverage_applied: bool,
    /// Equity share lost to the borrowing spread, `alpha_unlev - alpha_lev`
    /// (or `alpha_unlev - 1` when the spread rejects leverage).
    pub borrowing_cost_drag: f64,
    pub alpha_unlev: f64,
    pub alpha_lev: Option<f64>,
}

fn equity_premium(market: &MarketAssumptions, rate: f64, variant: AlphaVariant) -> f64 {
    match variant {
        AlphaVariant::Merton => market.mu - rate,
        AlphaVariant::LogReturn => {
            (1.0 + market.mu).ln() - (1.0 + rate).ln() + 0.5 * market.sigma * market.sigma
        }
    }
}

pub fn solve(
    market: &MarketAssumptions,
    gamma: f64,
    constraints: &ConstraintsSpec,
    variant: AlphaVariant,
) -> Result<RiskyShare> {
    if !gamma.is_finite() || gamma <= 0.0 {
        return Err(AllocationError::domain(format!(
            "gamma must be > 0, got {gamma}"
        )));
    }
    if !market.sigma.is_finite() || market.sigma <= 0.0 {
        return Err(AllocationError::domain(format!(
            "sigma must be > 0, got {}",
            market.sigma
        )));
    }

    let scale = gamma * market.sigma * market.sigma;
    let alpha_unlev = equity_premium(market, market.r, variant) / scale;

    // Lending regime: the investor's own capital covers the optimal share.
    if alpha_unlev <= 1.0 || !constraints.allow_leverage {
        return Ok(RiskyShare {
            alpha: alpha_unlev,
            leverage_applied: false,
            borrowing_cost_drag: 0.0,
            alpha_unlev,
            alpha_lev: None,
        });
    }

    let alpha_lev = equity_premium(market, market.borrowing_rate(), variant) / scale;
    if alpha_lev > 1.0 {
        return Ok(RiskyShare {
            alpha: alpha_lev.min(constraints.max_leverage),
            leverage_applied: true,
            borrowing_cost_drag: alpha_unlev - alpha_lev,
            alpha_unlev,
            alpha_lev: Some(alpha_lev),
        });
    }

    // The spread absorbs the whole benefit of borrowing.
    Ok(RiskyShare {
        alpha: 1.0,
        leverage_applied: false,
        borrowing_cost_drag: alpha_unlev - 1.0,
        alpha_unlev,
        alpha_lev: Some(alpha_lev),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn market(mu: f64, r: f64, sigma: f64, borrowing_spread: f64) -> MarketAssumptions {
        MarketAssumptions {
            mu,
            r,
            sigma,
            real: true,
            borrowing_spread,
        }
    }

    fn leverage(max_leverage: f64) -> ConstraintsSpec {
        ConstraintsSpec {
            allow_leverage: true,
            max_leverage,
            ..ConstraintsSpec::default()
        }
    }

    fn merton(m: &MarketAssumptions, gamma: f64, c: &ConstraintsSpec) -> RiskyShare {
        solve(m, gamma, c, AlphaVariant::Merton).expect("valid inputs")
    }

    #[test]
    fn lending_regime_uses_risk_free_rate() {
        let share = merton(
            &market(0.05, 0.02, 0.18, 0.0),
            4.0,
            &ConstraintsSpec::default(),
        );
        assert_approx(share.alpha, 0.03 / (4.0 * 0.18 * 0.18));
        assert!(!share.leverage_applied);
        assert_eq!(share.borrowing_cost_drag, 0.0);
        assert_eq!(share.alpha_lev, None);
    }

    #[test]
    fn leverage_disabled_returns_raw_alpha() {
        let share = merton(
            &market(0.10, 0.02, 0.10, 0.0),
            2.0,
            &ConstraintsSpec::default(),
        );
        assert_approx(share.alpha, 4.0);
        assert!(!share.leverage_applied);
    }

    #[test]
    fn spread_that_kills_the_benefit_returns_full_equity() {
        let m = market(0.05, 0.02, 0.10, 0.03);
        let share = merton(&m, 1.2, &leverage(2.0));
        assert!(share.alpha_unlev > 1.0);
        assert!(share.alpha_lev.unwrap() <= 1.0);
        assert_eq!(share.alpha, 1.0);
        assert!(!share.leverage_applied);
        assert_approx(share.borrowing_cost_drag, share.alpha_unlev - 1.0);
        assert!(share.borrowing_cost_drag > 0.0);
    }

    #[test]
    fn beneficial_leverage_reports_drag_before_cap() {
        let m = market(0.10, 0.02, 0.10, 0.01);
        let share = merton(&m, 2.0, &leverage(1.5));
        // alpha_unlev = 4.0, alpha_lev = 3.5, capped at 1.5
        assert!(share.leverage_applied);
        assert_eq!(share.alpha, 1.5);
        assert_approx(share.borrowing_cost_drag, 0.5);
    }

    #[test]
    fn zero_spread_makes_leverage_frictionless() {
        let m = market(0.10, 0.02, 0.10, 0.0);
        let share = merton(&m, 2.0, &leverage(5.0));
        assert_eq!(share.alpha_lev, Some(share.alpha_unlev));
        assert_eq!(share.borrowing_cost_drag, 0.0);
        assert_approx(share.alpha, 4.0);
    }

    #[test]
    fn alpha_lev_of_exactly_one_is_not_leverage() {
        // Dyadic inputs so both shares are exact: 0.5 / 0.25 and 0.25 / 0.25.
        let m = market(0.5, 0.0, 0.5, 0.25);
        let share = merton(&m, 1.0, &leverage(3.0));
        assert_eq!(share.alpha_unlev, 2.0);
        assert_eq!(share.alpha_lev, Some(1.0));
        assert_eq!(share.alpha, 1.0);
        assert!(!share.leverage_applied);
    }

    #[test]
    fn premium_below_borrowing_rate_never_levers() {
        let m = market(0.04, 0.02, 0.10, 0.03);
        let share = merton(&m, 1.0, &leverage(3.0));
        assert!(share.alpha_lev.unwrap() <= 0.0);
        assert_eq!(share.alpha, 1.0);
        assert!(!share.leverage_applied);
    }

    #[test]
    fn log_return_variant_adds_variance_term() {
        let m = market(0.05, 0.02, 0.18, 0.0);
        let c = ConstraintsSpec::default();
        let merton_alpha = merton(&m, 4.0, &c).alpha;
        let log_alpha = solve(&m, 4.0, &c, AlphaVariant::LogReturn).unwrap().alpha;
        assert!(log_alpha > merton_alpha);
    }

    #[test]
    fn non_positive_gamma_or_sigma_is_domain_error() {
        let c = ConstraintsSpec::default();
        let m = market(0.05, 0.02, 0.18, 0.0);
        for gamma in [0.0, -1.0, f64::NAN] {
            let err = solve(&m, gamma, &c, AlphaVariant::Merton).expect_err("bad gamma");
            assert!(matches!(err, AllocationError::Domain(_)));
        }
        let err = solve(&market(0.05, 0.02, 0.0, 0.0), 4.0, &c, AlphaVariant::Merton)
            .expect_err("bad sigma");
        assert!(matches!(err, AllocationError::Domain(_)));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_alpha_unlev_decreasing_in_gamma_and_sigma(
            premium_bp in 1u32..800,
            sigma_bp in 500u32..4000,
            gamma_cents in 50u32..2000,
            bump in 1u32..500
        ) {
            let m = market(0.02 + f64::from(premium_bp) / 10_000.0, 0.02, f64::from(sigma_bp) / 10_000.0, 0.0);
            let c = ConstraintsSpec::default();
            let gamma = f64::from(gamma_cents) / 100.0;
            let base = merton(&m, gamma, &c).alpha_unlev;
            let more_averse = merton(&m, gamma + f64::from(bump) / 100.0, &c).alpha_unlev;
            let riskier = MarketAssumptions { sigma: m.sigma + f64::from(bump) / 10_000.0, ..m };
            let more_volatile = merton(&riskier, gamma, &c).alpha_unlev;
            prop_assert!(more_averse < base);
            prop_assert!(more_volatile < base);
        }

        #[test]
        fn prop_levered_alpha_respects_cap(
            premium_bp in 100u32..1500,
            spread_bp in 0u32..400,
            gamma_cents in 50u32..400,
            max_lev_cents in 100u32..400
        ) {
            let m = market(0.02 + f64::from(premium_bp) / 10_000.0, 0.02, 0.12, f64::from(spread_bp) / 10_000.0);
            let c = leverage(f64::from(max_lev_cents) / 100.0);
            let share = merton(&m, f64::from(gamma_cents) / 100.0, &c);
            if share.leverage_applied {
                prop_assert!(share.alpha > 1.0);
                prop_assert!(share.alpha <= c.max_leverage);
                prop_assert!(share.borrowing_cost_drag >= 0.0);
            }
            if let Some(alpha_lev) = share.alpha_lev {
                if alpha_lev > c.max_leverage {
                    prop_assert_eq!(share.alpha, c.max_leverage);
                }
            }
        }
    }
}
