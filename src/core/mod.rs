mod engine;
mod error;
mod explain;
mod human_capital;
mod models;
mod schedule;
mod solver;
mod strategies;
mod types;

pub use engine::recommend;
pub use error::{AllocationError, Result};
pub use explain::{
    DISCLAIMER, LEVERAGE_DISCLOSURES, build_explanation, format_currency, format_percent,
};
pub use human_capital::{HumanCapitalTerm, cash_flow_at, human_capital_terms, present_value};
pub use models::{
    BenefitModel, CashFlowModel, DiscountCurve, DiscountModel, Education, IncomeModel,
    MortalityModel, SurvivalModel, TermPoint,
};
pub use schedule::{Schedule, SchedulePoint};
pub use solver::{RiskyShare, solve};
pub use strategies::{
    CompareOptions, LIFECYCLE_STRATEGY, StrategyRow, compare, n_minus_age, sixty_forty,
    target_date_glide,
};
pub use types::{
    AllocationComponents, AllocationResult, AlphaVariant, ConstraintsSpec, InvestorProfile,
    MarketAssumptions, RecommendOptions, RiskPreference, WealthPolicy, risk_tolerance_to_gamma,
};
