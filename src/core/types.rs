use serde::{Deserialize, Serialize};

use super::error::{AllocationError, Result};
use super::models::{BenefitModel, IncomeModel, MortalityModel};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketAssumptions {
    pub mu: f64,
    pub r: f64,
    pub sigma: f64,
    /// Informational: whether `mu`, `r` and the discount curve are real rates.
    pub real: bool,
    pub borrowing_spread: f64,
}

impl Default for MarketAssumptions {
    fn default() -> Self {
        Self {
            mu: 0.05,
            r: 0.02,
            sigma: 0.18,
            real: true,
            borrowing_spread: 0.0,
        }
    }
}

impl MarketAssumptions {
    pub fn validate(&self) -> Result<()> {
        if !self.mu.is_finite() || !self.r.is_finite() {
            return Err(AllocationError::domain("mu and r must be finite"));
        }
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(AllocationError::domain(format!(
                "sigma must be > 0, got {}",
                self.sigma
            )));
        }
        if !self.borrowing_spread.is_finite() || self.borrowing_spread < 0.0 {
            return Err(AllocationError::configuration(format!(
                "borrowing_spread must be >= 0, got {}",
                self.borrowing_spread
            )));
        }
        Ok(())
    }

    pub fn borrowing_rate(&self) -> f64 {
        self.r + self.borrowing_spread
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConstraintsSpec {
    pub allow_leverage: bool,
    pub max_leverage: f64,
    pub allow_short: bool,
    /// Floor for the allocation; only honoured when `allow_short` is set.
    pub min_allocation: f64,
}

impl Default for ConstraintsSpec {
    fn default() -> Self {
        Self {
            allow_leverage: false,
            max_leverage: 1.0,
            allow_short: false,
            min_allocation: 0.0,
        }
    }
}

impl ConstraintsSpec {
    pub fn validate(&self) -> Result<()> {
        if !self.max_leverage.is_finite() || self.max_leverage < 1.0 {
            return Err(AllocationError::configuration(format!(
                "max_leverage must be >= 1.0, got {}",
                self.max_leverage
            )));
        }
        if !self.min_allocation.is_finite() {
            return Err(AllocationError::configuration(
                "min_allocation must be finite",
            ));
        }
        if self.lower_bound() > self.upper_bound() {
            return Err(AllocationError::configuration(format!(
                "min_allocation {} exceeds the upper allocation bound {}",
                self.lower_bound(),
                self.upper_bound()
            )));
        }
        Ok(())
    }

    pub fn upper_bound(&self) -> f64 {
        if self.allow_leverage {
            self.max_leverage
        } else {
            1.0
        }
    }

    pub fn lower_bound(&self) -> f64 {
        if self.allow_short {
            self.min_allocation
        } else {
            0.0
        }
    }
}

/// Log-linear map from the 1-10 tolerance scale to relative risk aversion.
///
/// `rt = 1` gives gamma 10, `rt = 5` about 4.47 and `rt = 10` gives 2.
pub fn risk_tolerance_to_gamma(rt: u32) -> Result<f64> {
    if !(1..=10).contains(&rt) {
        return Err(AllocationError::domain(format!(
            "risk_tolerance must be between 1 and 10, got {rt}"
        )));
    }
    Ok(10.0 * 0.2_f64.powf(f64::from(rt - 1) / 9.0))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum RiskPreference {
    Tolerance { tolerance: u32 },
    Aversion { aversion: f64 },
    /// Both inputs were supplied; the explicit aversion wins.
    Both { tolerance: u32, aversion: f64 },
}

impl RiskPreference {
    pub fn from_fields(tolerance: Option<u32>, aversion: Option<f64>) -> Result<Self> {
        match (tolerance, aversion) {
            (Some(tolerance), None) => Ok(Self::Tolerance { tolerance }),
            (None, Some(aversion)) => Ok(Self::Aversion { aversion }),
            (Some(tolerance), Some(aversion)) => Ok(Self::Both {
                tolerance,
                aversion,
            }),
            (None, None) => Err(AllocationError::domain(
                "must provide either risk_tolerance (1-10) or risk_aversion (gamma)",
            )),
        }
    }

    pub fn gamma(&self) -> Result<f64> {
        match *self {
            Self::Tolerance { tolerance } => risk_tolerance_to_gamma(tolerance),
            Self::Aversion { aversion } => validate_aversion(aversion),
            Self::Both {
                tolerance,
                aversion,
            } => {
                risk_tolerance_to_gamma(tolerance)?;
                validate_aversion(aversion)
            }
        }
    }

    pub fn ambiguity(&self) -> Option<String> {
        let Self::Both {
            tolerance,
            aversion,
        } = *self
        else {
            return None;
        };
        let implied = risk_tolerance_to_gamma(tolerance).ok()?;
        if (implied - aversion).abs() <= 1e-9 {
            return None;
        }
        Some(format!(
            "both risk_tolerance={tolerance} (gamma {implied:.2}) and risk_aversion={aversion} \
             were given; using risk_aversion"
        ))
    }
}

fn validate_aversion(aversion: f64) -> Result<f64> {
    if !aversion.is_finite() || aversion <= 0.0 {
        return Err(AllocationError::domain(format!(
            "risk_aversion (gamma) must be > 0, got {aversion}"
        )));
    }
    Ok(aversion)
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvestorProfile {
    pub age: u32,
    pub retirement_age: u32,
    pub investable_wealth: f64,
    pub after_tax_income: Option<f64>,
    pub risk: RiskPreference,
    pub income_model: IncomeModel,
    pub benefit_model: BenefitModel,
    pub mortality_model: MortalityModel,
}

impl InvestorProfile {
    /// Profile with flat income, no benefits and no mortality.
    pub fn new(
        age: u32,
        retirement_age: u32,
        investable_wealth: f64,
        after_tax_income: Option<f64>,
        risk: RiskPreference,
    ) -> Self {
        Self {
            age,
            retirement_age,
            investable_wealth,
            after_tax_income,
            risk,
            income_model: IncomeModel::Flat,
            benefit_model: BenefitModel::None,
            mortality_model: MortalityModel::None,
        }
    }

    pub fn gamma(&self) -> Result<f64> {
        self.risk.gamma()
    }

    /// Current after-tax income; missing or negative income counts as zero.
    pub fn base_income(&self) -> f64 {
        self.after_tax_income
            .filter(|income| income.is_finite())
            .unwrap_or(0.0)
            .max(0.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlphaVariant {
    /// Arithmetic equity premium `mu - r`.
    #[default]
    Merton,
    /// Log-return premium `ln(1+mu) - ln(1+r) + sigma^2 / 2`.
    LogReturn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WealthPolicy {
    #[default]
    Reject,
    /// Treat non-positive wealth as an unbounded H/W ratio.
    FullAllocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecommendOptions {
    pub t_max: u32,
    pub variant: AlphaVariant,
    pub wealth_policy: WealthPolicy,
}

impl Default for RecommendOptions {
    fn default() -> Self {
        Self {
            t_max: 100,
            variant: AlphaVariant::Merton,
            wealth_policy: WealthPolicy::Reject,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationComponents {
    pub gamma: f64,
    pub alpha_unlev: f64,
    pub alpha_lev: Option<f64>,
    pub alpha_star: f64,
    pub alpha_unconstrained: f64,
    pub alpha_recommended: f64,
    pub human_capital: f64,
    pub investable_wealth: f64,
    pub hw_ratio: f64,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub leverage_applied: bool,
    pub borrowing_cost_drag: f64,
    pub mu: f64,
    pub r: f64,
    pub sigma: f64,
    pub borrowing_spread: f64,
    pub real: bool,
    pub t_max: u32,
    pub variant: AlphaVariant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AllocationResult {
    pub alpha_star: f64,
    pub alpha_unconstrained: f64,
    pub alpha_recommended: f64,
    pub human_capital: f64,
    pub leverage_applied: bool,
    pub borrowing_cost_drag: f64,
    pub explain: String,
    pub components: AllocationComponents,
    pub warnings: Vec<String>,
}
