use super::error::Result;
use super::models::{CashFlowModel, DiscountCurve, DiscountModel, SurvivalModel};
use super::types::InvestorProfile;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HumanCapitalTerm {
    pub age: u32,
    pub cash_flow: f64,
    pub survival: f64,
    pub discount_factor: f64,
    pub present_value: f64,
}

/// Cash flow at `age`: income before retirement, benefits from retirement on.
pub fn cash_flow_at(profile: &InvestorProfile, age: u32) -> f64 {
    if age < profile.retirement_age {
        profile.income_model.expected(age, profile)
    } else {
        profile.benefit_model.expected(age, profile)
    }
}

/// Every positive cash flow from `profile.age + 1` through `t_max`.
pub fn human_capital_terms(
    profile: &InvestorProfile,
    curve: &DiscountCurve,
    t_max: u32,
) -> Result<Vec<HumanCapitalTerm>> {
    profile.income_model.validate()?;
    profile.benefit_model.validate()?;
    profile.mortality_model.validate()?;
    curve.validate()?;

    let current_age = profile.age;
    let terms = (current_age.saturating_add(1)..=t_max)
        .filter_map(|age| {
            let cash_flow = cash_flow_at(profile, age);
            if cash_flow <= 0.0 {
                return None;
            }
            let survival = profile.mortality_model.survival(current_age, age);
            let discount_factor = curve.factor(current_age, age);
            Some(HumanCapitalTerm {
                age,
                cash_flow,
                survival,
                discount_factor,
                present_value: cash_flow * survival / discount_factor,
            })
        })
        .collect();
    Ok(terms)
}

/// Present value of future labour income and retirement benefits.
///
/// `H = sum_{s=t+1}^{t_max} CF(s) * S(t,s) / D(t,s)`. The horizon is fixed by
/// `t_max`, independent of the mortality model.
pub fn present_value(profile: &InvestorProfile, curve: &DiscountCurve, t_max: u32) -> Result<f64> {
    Ok(human_capital_terms(profile, curve, t_max)?
        .iter()
        .map(|term| term.present_value)
        .sum())
}
