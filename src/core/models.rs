//! Pluggable income, benefit, mortality and discounting models.
//!
//! Each family is a closed enum. The human-capital calculator only talks to
//! them through [`CashFlowModel`], [`SurvivalModel`] and [`DiscountModel`].

use super::error::{AllocationError, Result};
use super::schedule::Schedule;
use super::types::InvestorProfile;

pub trait CashFlowModel {
    fn expected(&self, age: u32, profile: &InvestorProfile) -> f64;
    fn validate(&self) -> Result<()>;
}

/// Cumulative probability of surviving from `from_age` to `to_age`.
pub trait SurvivalModel {
    fn survival(&self, from_age: u32, to_age: u32) -> f64;
    fn validate(&self) -> Result<()>;
}

/// Growth factor `D(from, to)`: what 1 unit today compounds to by `to_age`.
pub trait DiscountModel {
    fn factor(&self, from_age: u32, to_age: u32) -> f64;
    fn validate(&self) -> Result<()>;
}

/// Cocco-Gomes-Maenhout (2005) log-income polynomials in `age / 10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Education {
    NoHighSchool,
    HighSchool,
    College,
}

impl Education {
    pub fn coefficients(self) -> [f64; 4] {
        match self {
            Self::NoHighSchool | Self::HighSchool => [-2.1700, 2.7004, -0.1682, -0.0323],
            Self::College => [-4.3148, 5.3810, -0.1682, -0.0323],
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self> {
        match tag {
            "no_hs" => Ok(Self::NoHighSchool),
            "hs" => Ok(Self::HighSchool),
            "college" => Ok(Self::College),
            other => Err(AllocationError::configuration(format!(
                "unknown education level '{other}', expected one of no_hs, hs, college"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IncomeModel {
    Flat,
    Growth {
        g: f64,
    },
    /// Age/income curve rescaled so it passes through the current income.
    Profile {
        coefficients: [f64; 4],
    },
    Schedule(Schedule),
}

impl IncomeModel {
    pub fn profile(education: Education) -> Self {
        Self::Profile {
            coefficients: education.coefficients(),
        }
    }
}

fn log_income(age: u32, coefficients: &[f64; 4]) -> f64 {
    let x = f64::from(age) / 10.0;
    coefficients[0] + x * (coefficients[1] + x * (coefficients[2] + x * coefficients[3]))
}

impl CashFlowModel for IncomeModel {
    fn expected(&self, age: u32, profile: &InvestorProfile) -> f64 {
        let base = profile.base_income();
        let income = match self {
            Self::Flat => base,
            Self::Growth { g } => {
                let years = i32::try_from(i64::from(age) - i64::from(profile.age)).unwrap_or(0);
                base * (1.0 + g).powi(years)
            }
            Self::Profile { coefficients } => {
                // Multiplicative anchoring: the shape comes from the curve, the
                // level from the stated income at the current age.
                let shift = log_income(age, coefficients) - log_income(profile.age, coefficients);
                base * shift.exp()
            }
            Self::Schedule(schedule) => schedule.evaluate(age),
        };
        income.max(0.0)
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::Flat | Self::Schedule(_) => Ok(()),
            Self::Growth { g } => {
                if !g.is_finite() || *g <= -1.0 {
                    return Err(AllocationError::configuration(format!(
                        "income growth rate must be finite and > -1, got {g}"
                    )));
                }
                Ok(())
            }
            Self::Profile { coefficients } => {
                if coefficients.iter().any(|c| !c.is_finite()) {
                    return Err(AllocationError::configuration(
                        "income profile coefficients must be finite",
                    ));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BenefitModel {
    None,
    /// `annual_benefit` when positive, otherwise `replacement_rate` times
    /// current income.
    Flat {
        annual_benefit: f64,
        replacement_rate: f64,
    },
    Schedule(Schedule),
}

impl CashFlowModel for BenefitModel {
    fn expected(&self, age: u32, profile: &InvestorProfile) -> f64 {
        let benefit = match self {
            Self::None => 0.0,
            Self::Flat {
                annual_benefit,
                replacement_rate,
            } => {
                if *annual_benefit > 0.0 {
                    *annual_benefit
                } else {
                    profile.base_income() * replacement_rate
                }
            }
            Self::Schedule(schedule) => schedule.evaluate(age),
        };
        benefit.max(0.0)
    }

    fn validate(&self) -> Result<()> {
        if let Self::Flat {
            annual_benefit,
            replacement_rate,
        } = self
        {
            if !annual_benefit.is_finite() || *annual_benefit < 0.0 {
                return Err(AllocationError::configuration(format!(
                    "annual_benefit must be >= 0, got {annual_benefit}"
                )));
            }
            if !replacement_rate.is_finite() || *replacement_rate < 0.0 {
                return Err(AllocationError::configuration(format!(
                    "replacement_rate must be >= 0, got {replacement_rate}"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MortalityModel {
    None,
    /// Gompertz survival with modal age at death `mode` and dispersion
    /// `dispersion` (both in years).
    Parametric {
        mode: f64,
        dispersion: f64,
    },
    Table(Schedule),
}

impl MortalityModel {
    pub const DEFAULT_MODE: f64 = 88.0;
    pub const DEFAULT_DISPERSION: f64 = 10.0;

    pub fn gompertz() -> Self {
        Self::Parametric {
            mode: Self::DEFAULT_MODE,
            dispersion: Self::DEFAULT_DISPERSION,
        }
    }
}

impl SurvivalModel for MortalityModel {
    fn survival(&self, from_age: u32, to_age: u32) -> f64 {
        if to_age <= from_age {
            return 1.0;
        }
        match self {
            Self::None => 1.0,
            Self::Parametric { mode, dispersion } => {
                let hazard = |age: u32| ((f64::from(age) - mode) / dispersion).exp();
                (hazard(from_age) - hazard(to_age)).exp().clamp(0.0, 1.0)
            }
            Self::Table(table) => (from_age..to_age)
                .map(|age| {
                    if age < table.first_age() {
                        1.0
                    } else {
                        table.evaluate(age)
                    }
                })
                .product::<f64>()
                .clamp(0.0, 1.0),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            Self::None => Ok(()),
            Self::Parametric { mode, dispersion } => {
                if !mode.is_finite() {
                    return Err(AllocationError::configuration(
                        "mortality mode must be finite",
                    ));
                }
                if !dispersion.is_finite() || *dispersion <= 0.0 {
                    return Err(AllocationError::configuration(format!(
                        "mortality dispersion must be > 0, got {dispersion}"
                    )));
                }
                Ok(())
            }
            Self::Table(table) => {
                if let Some(bad) = table
                    .points()
                    .iter()
                    .find(|p| !(0.0..=1.0).contains(&p.value))
                {
                    return Err(AllocationError::data_source(format!(
                        "survival probability at age {} must be within [0, 1], got {}",
                        bad.age, bad.value
                    )));
                }
                Ok(())
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TermPoint {
    /// First elapsed year (1-based) the rate applies to.
    pub from_year: u32,
    pub rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiscountCurve {
    Constant { rate: f64 },
    /// Piecewise-constant annual rates; `points` sorted by `from_year`.
    TermStructure { points: Vec<TermPoint> },
}

impl Default for DiscountCurve {
    fn default() -> Self {
        Self::Constant { rate: 0.02 }
    }
}

impl DiscountCurve {
    pub fn term_structure(mut points: Vec<TermPoint>) -> Result<Self> {
        points.sort_by_key(|p| p.from_year);
        let curve = Self::TermStructure { points };
        curve.validate()?;
        Ok(curve)
    }

    pub fn rate_for_year(&self, year: u32) -> f64 {
        match self {
            Self::Constant { rate } => *rate,
            Self::TermStructure { points } => points
                .iter()
                .take_while(|p| p.from_year <= year)
                .last()
                .or_else(|| points.first())
                .map_or(0.0, |p| p.rate),
        }
    }
}

impl DiscountModel for DiscountCurve {
    fn factor(&self, from_age: u32, to_age: u32) -> f64 {
        if to_age <= from_age {
            return 1.0;
        }
        let years = to_age - from_age;
        match self {
            Self::Constant { rate } => (1.0 + rate).powi(years as i32),
            Self::TermStructure { .. } => (1..=years)
                .map(|year| 1.0 + self.rate_for_year(year))
                .product(),
        }
    }

    fn validate(&self) -> Result<()> {
        let check = |rate: f64| {
            if !rate.is_finite() || rate <= -1.0 {
                return Err(AllocationError::configuration(format!(
                    "discount rate must be finite and > -1, got {rate}"
                )));
            }
            Ok(())
        };
        match self {
            Self::Constant { rate } => check(*rate),
            Self::TermStructure { points } => {
                if points.is_empty() {
                    return Err(AllocationError::configuration(
                        "term_structure discount curve needs at least one point",
                    ));
                }
                points.iter().try_for_each(|p| check(p.rate))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::RiskPreference;
    use proptest::prelude::{prop_assert, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn profile(age: u32, income: f64) -> InvestorProfile {
        InvestorProfile::new(
            age,
            67,
            100_000.0,
            Some(income),
            RiskPreference::Tolerance { tolerance: 5 },
        )
    }

    #[test]
    fn flat_income_is_constant() {
        let p = profile(30, 70_000.0);
        for age in [30, 40, 50, 60] {
            assert_approx(IncomeModel::Flat.expected(age, &p), 70_000.0);
        }
    }

    #[test]
    fn growth_income_compounds_per_elapsed_year() {
        let p = profile(30, 50_000.0);
        let model = IncomeModel::Growth { g: 0.03 };
        assert_approx(model.expected(30, &p), 50_000.0);
        assert_approx(model.expected(35, &p), 50_000.0 * 1.03_f64.powi(5));
    }

    #[test]
    fn negative_growth_never_goes_below_zero() {
        let p = profile(30, 50_000.0);
        let model = IncomeModel::Growth { g: -0.5 };
        assert!(model.expected(60, &p) >= 0.0);
    }

    #[test]
    fn profile_income_is_anchored_to_current_income() {
        let p = profile(30, 80_000.0);
        let model = IncomeModel::profile(Education::College);
        assert_approx(model.expected(30, &p), 80_000.0);
    }

    #[test]
    fn profile_anchoring_holds_outside_working_ages() {
        let p = profile(18, 20_000.0);
        let model = IncomeModel::profile(Education::HighSchool);
        assert_approx(model.expected(18, &p), 20_000.0);
    }

    #[test]
    fn college_profile_peaks_in_midlife() {
        let p = profile(25, 50_000.0);
        let model = IncomeModel::profile(Education::College);
        let peak_age = (25..67)
            .max_by(|a, b| {
                model
                    .expected(*a, &p)
                    .total_cmp(&model.expected(*b, &p))
            })
            .unwrap();
        assert!((45..=60).contains(&peak_age), "peak at {peak_age}");
    }

    #[test]
    fn unknown_education_is_configuration_error() {
        let err = Education::from_tag("phd").expect_err("must reject");
        assert!(matches!(err, AllocationError::Configuration(_)));
    }

    #[test]
    fn schedule_income_interpolates() {
        let p = profile(30, 0.0);
        let schedule = Schedule::from_pairs(&[(30, 50_000.0), (40, 60_000.0)]).unwrap();
        let model = IncomeModel::Schedule(schedule);
        assert_approx(model.expected(35, &p), 55_000.0);
        assert_approx(model.expected(45, &p), 0.0);
    }

    #[test]
    fn flat_benefit_prefers_annual_amount() {
        let p = profile(70, 100_000.0);
        let model = BenefitModel::Flat {
            annual_benefit: 25_000.0,
            replacement_rate: 0.4,
        };
        assert_approx(model.expected(75, &p), 25_000.0);
    }

    #[test]
    fn flat_benefit_falls_back_to_replacement_rate() {
        let p = profile(70, 100_000.0);
        let model = BenefitModel::Flat {
            annual_benefit: 0.0,
            replacement_rate: 0.4,
        };
        assert_approx(model.expected(75, &p), 40_000.0);
        assert_approx(BenefitModel::None.expected(75, &p), 0.0);
    }

    #[test]
    fn gompertz_survival_is_bounded_and_non_increasing() {
        let model = MortalityModel::gompertz();
        let mut previous = 1.0;
        for to_age in 40..=110 {
            let s = model.survival(40, to_age);
            assert!((0.0..=1.0).contains(&s));
            assert!(s <= previous + 1e-12);
            previous = s;
        }
        assert!(model.survival(40, 110) < 0.05);
    }

    #[test]
    fn gompertz_requires_positive_dispersion() {
        let model = MortalityModel::Parametric {
            mode: 88.0,
            dispersion: 0.0,
        };
        assert!(matches!(
            model.validate(),
            Err(AllocationError::Configuration(_))
        ));
    }

    #[test]
    fn table_survival_is_running_product() {
        let table = Schedule::from_pairs(&[(60, 0.99), (61, 0.98), (62, 0.97)]).unwrap();
        let model = MortalityModel::Table(table);
        assert_approx(model.survival(60, 61), 0.99);
        assert_approx(model.survival(60, 63), 0.99 * 0.98 * 0.97);
        // Before the table start survival is certain, past its end it is zero.
        assert_approx(model.survival(58, 61), 0.99);
        assert_approx(model.survival(60, 64), 0.0);
    }

    #[test]
    fn table_probabilities_outside_unit_interval_are_rejected() {
        let table = Schedule::from_pairs(&[(60, 1.2)]).unwrap();
        let err = MortalityModel::Table(table).validate().expect_err("must reject");
        assert!(matches!(err, AllocationError::DataSource(_)));
    }

    #[test]
    fn constant_curve_compounds() {
        let curve = DiscountCurve::Constant { rate: 0.03 };
        assert_approx(curve.factor(30, 30), 1.0);
        assert_approx(curve.factor(30, 40), 1.03_f64.powi(10));
    }

    #[test]
    fn term_structure_accumulates_period_by_period() {
        let curve = DiscountCurve::term_structure(vec![
            TermPoint {
                from_year: 3,
                rate: 0.04,
            },
            TermPoint {
                from_year: 1,
                rate: 0.02,
            },
        ])
        .unwrap();
        assert_approx(curve.rate_for_year(1), 0.02);
        assert_approx(curve.rate_for_year(2), 0.02);
        assert_approx(curve.rate_for_year(3), 0.04);
        assert_approx(curve.rate_for_year(30), 0.04);
        assert_approx(curve.factor(50, 54), 1.02 * 1.02 * 1.04 * 1.04);
    }

    #[test]
    fn flat_term_structure_matches_constant_curve() {
        let term = DiscountCurve::term_structure(vec![TermPoint {
            from_year: 1,
            rate: 0.025,
        }])
        .unwrap();
        let constant = DiscountCurve::Constant { rate: 0.025 };
        for to_age in 41..=100 {
            let a = term.factor(40, to_age);
            let b = constant.factor(40, to_age);
            assert!((a - b).abs() <= 1e-9 * b);
        }
    }

    #[test]
    fn empty_term_structure_is_configuration_error() {
        let err = DiscountCurve::term_structure(Vec::new()).expect_err("must reject");
        assert!(matches!(err, AllocationError::Configuration(_)));
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(32))]

        #[test]
        fn prop_income_models_never_negative(
            age in 18u32..66,
            offset in 0u32..40,
            income in 0u32..400_000,
            g_bp in -3000i32..1000
        ) {
            let p = profile(age, f64::from(income));
            let models = [
                IncomeModel::Flat,
                IncomeModel::Growth { g: f64::from(g_bp) / 10_000.0 },
                IncomeModel::profile(Education::College),
                IncomeModel::profile(Education::NoHighSchool),
            ];
            for model in &models {
                prop_assert!(model.expected(age + offset, &p) >= 0.0);
            }
        }

        #[test]
        fn prop_gompertz_monotone(
            from in 20u32..90,
            step in 1u32..30,
            mode in 70u32..100,
            dispersion in 2u32..20
        ) {
            let model = MortalityModel::Parametric {
                mode: f64::from(mode),
                dispersion: f64::from(dispersion),
            };
            let near = model.survival(from, from + step);
            let far = model.survival(from, from + step + 1);
            prop_assert!(far <= near + 1e-12);
            prop_assert!((0.0..=1.0).contains(&near));
        }
    }
}
