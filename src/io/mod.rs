//! Profile loading: JSON profile documents and CSV-backed schedules.
//!
//! The engine in [`crate::core`] never touches the filesystem. This module
//! turns a serialized profile into validated value objects and materializes
//! any CSV schedules the profile references.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::core::{
    AllocationError, AlphaVariant, BenefitModel, CashFlowModel, CompareOptions, ConstraintsSpec,
    DiscountCurve, DiscountModel, Education, IncomeModel, InvestorProfile, MarketAssumptions,
    MortalityModel, RecommendOptions, Result, RiskPreference, Schedule, SchedulePoint,
    SurvivalModel, TermPoint, WealthPolicy,
};

/// Everything a single allocation request needs.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedProfile {
    pub profile: InvestorProfile,
    pub market: MarketAssumptions,
    pub curve: DiscountCurve,
    pub constraints: ConstraintsSpec,
    pub strategies: Vec<(String, f64)>,
    pub options: CompareOptions,
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Directory relative CSV paths are resolved against.
    pub base_dir: Option<PathBuf>,
    /// Whether `csv` / `path` sections may read from disk.
    pub allow_external_files: bool,
}

#[derive(Debug, Deserialize)]
struct ProfileDocument {
    age: Option<u32>,
    #[serde(default = "default_retirement_age")]
    retirement_age: u32,
    investable_wealth: Option<f64>,
    after_tax_income: Option<f64>,
    risk_tolerance: Option<u32>,
    risk_aversion: Option<f64>,
    income_model: Option<Value>,
    benefit_model: Option<Value>,
    mortality_model: Option<Value>,
    discount_curve: Option<Value>,
    #[serde(default)]
    market: MarketDocument,
    #[serde(default)]
    constraints: ConstraintsDocument,
    #[serde(default)]
    strategies: Vec<StrategyDocument>,
    #[serde(default)]
    options: OptionsDocument,
}

fn default_retirement_age() -> u32 {
    67
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct MarketDocument {
    mu: f64,
    r: f64,
    sigma: f64,
    real: bool,
    borrowing_spread: f64,
}

impl Default for MarketDocument {
    fn default() -> Self {
        let m = MarketAssumptions::default();
        Self {
            mu: m.mu,
            r: m.r,
            sigma: m.sigma,
            real: m.real,
            borrowing_spread: m.borrowing_spread,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct ConstraintsDocument {
    allow_leverage: bool,
    max_leverage: f64,
    allow_short: bool,
    min_allocation: f64,
}

impl Default for ConstraintsDocument {
    fn default() -> Self {
        let c = ConstraintsSpec::default();
        Self {
            allow_leverage: c.allow_leverage,
            max_leverage: c.max_leverage,
            allow_short: c.allow_short,
            min_allocation: c.min_allocation,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StrategyDocument {
    name: String,
    allocation: f64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct OptionsDocument {
    t_max: u32,
    variant: AlphaVariant,
    wealth_policy: WealthPolicy,
    n_minus_age: u32,
}

impl Default for OptionsDocument {
    fn default() -> Self {
        let o = CompareOptions::default();
        Self {
            t_max: o.recommend.t_max,
            variant: o.recommend.variant,
            wealth_policy: o.recommend.wealth_policy,
            n_minus_age: o.n_minus_age,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PointDocument {
    age: u32,
    value: f64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IncomeDocument {
    Flat,
    Growth {
        #[serde(default)]
        g: f64,
    },
    Profile {
        education: Option<String>,
        coefficients: Option<Vec<f64>>,
    },
    Schedule {
        points: Option<Vec<PointDocument>>,
        path: Option<PathBuf>,
    },
    Csv {
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum BenefitDocument {
    None,
    Flat {
        #[serde(default)]
        annual_benefit: f64,
        #[serde(default)]
        replacement_rate: f64,
    },
    Schedule {
        points: Option<Vec<PointDocument>>,
        path: Option<PathBuf>,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MortalityDocument {
    None,
    Parametric {
        #[serde(default = "default_mode")]
        mode: f64,
        #[serde(default = "default_dispersion")]
        dispersion: f64,
    },
    Table {
        points: Option<Vec<PointDocument>>,
        path: Option<PathBuf>,
    },
}

fn default_mode() -> f64 {
    MortalityModel::DEFAULT_MODE
}

fn default_dispersion() -> f64 {
    MortalityModel::DEFAULT_DISPERSION
}

#[derive(Debug, Deserialize)]
struct TermPointDocument {
    from_year: u32,
    rate: f64,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CurveDocument {
    Constant {
        #[serde(default = "default_rate")]
        rate: f64,
    },
    TermStructure {
        points: Vec<TermPointDocument>,
    },
}

fn default_rate() -> f64 {
    0.02
}

const INCOME_TYPES: &[&str] = &["flat", "growth", "profile", "schedule", "csv"];
const BENEFIT_TYPES: &[&str] = &["none", "flat", "schedule"];
const MORTALITY_TYPES: &[&str] = &["none", "parametric", "table"];
const CURVE_TYPES: &[&str] = &["constant", "term_structure"];

/// Load a profile document from disk; relative CSV paths resolve against the
/// document's directory.
pub fn load_profile(path: &Path) -> Result<LoadedProfile> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        AllocationError::data_source(format!("failed to read profile '{}': {e}", path.display()))
    })?;
    let options = LoadOptions {
        base_dir: path.parent().map(Path::to_path_buf),
        allow_external_files: true,
    };
    parse_profile(&text, &options)
}

pub fn parse_profile(json: &str, options: &LoadOptions) -> Result<LoadedProfile> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| AllocationError::configuration(format!("invalid profile JSON: {e}")))?;
    profile_from_value(value, options)
}

pub fn profile_from_value(value: Value, options: &LoadOptions) -> Result<LoadedProfile> {
    if !value.is_object() {
        return Err(AllocationError::configuration(
            "expected a JSON object at the top level of the profile",
        ));
    }
    let doc: ProfileDocument = serde_json::from_value(value)
        .map_err(|e| AllocationError::configuration(format!("invalid profile: {e}")))?;

    let age = doc
        .age
        .ok_or_else(|| AllocationError::configuration("missing required field 'age'"))?;
    let investable_wealth = doc.investable_wealth.ok_or_else(|| {
        AllocationError::configuration("missing required field 'investable_wealth'")
    })?;
    let risk = RiskPreference::from_fields(doc.risk_tolerance, doc.risk_aversion)?;
    risk.gamma()?;

    let income_model = build_income(doc.income_model, options)?;
    let benefit_model = build_benefit(doc.benefit_model, options)?;
    let mortality_model = build_mortality(doc.mortality_model, options)?;
    let curve = build_curve(doc.discount_curve)?;
    income_model.validate()?;
    benefit_model.validate()?;
    mortality_model.validate()?;
    curve.validate()?;

    let profile = InvestorProfile {
        age,
        retirement_age: doc.retirement_age,
        investable_wealth,
        after_tax_income: doc.after_tax_income,
        risk,
        income_model,
        benefit_model,
        mortality_model,
    };

    let market = MarketAssumptions {
        mu: doc.market.mu,
        r: doc.market.r,
        sigma: doc.market.sigma,
        real: doc.market.real,
        borrowing_spread: doc.market.borrowing_spread,
    };
    market.validate()?;

    let constraints = ConstraintsSpec {
        allow_leverage: doc.constraints.allow_leverage,
        max_leverage: doc.constraints.max_leverage,
        allow_short: doc.constraints.allow_short,
        min_allocation: doc.constraints.min_allocation,
    };
    constraints.validate()?;

    let strategies = doc
        .strategies
        .into_iter()
        .map(|s| (s.name, s.allocation))
        .collect();

    let options = CompareOptions {
        n_minus_age: doc.options.n_minus_age,
        recommend: RecommendOptions {
            t_max: doc.options.t_max,
            variant: doc.options.variant,
            wealth_policy: doc.options.wealth_policy,
        },
    };

    debug!(age, retirement_age = profile.retirement_age, "profile loaded");

    Ok(LoadedProfile {
        profile,
        market,
        curve,
        constraints,
        strategies,
        options,
    })
}

/// Check the `type` tag against the known variants, defaulting it when absent,
/// then deserialize the section.
fn parse_tagged<T: DeserializeOwned>(
    section: Option<Value>,
    field: &str,
    default_type: &str,
    valid: &[&str],
) -> Result<T> {
    let mut section = match section {
        Some(Value::Object(map)) => map,
        Some(Value::Null) | None => serde_json::Map::new(),
        Some(_) => {
            return Err(AllocationError::configuration(format!(
                "{field} must be an object"
            )));
        }
    };

    let tag = match section.get("type") {
        None => default_type.to_string(),
        Some(Value::String(tag)) => tag.clone(),
        Some(other) => {
            return Err(AllocationError::configuration(format!(
                "{field} type must be a string, got {other}"
            )));
        }
    };
    if !valid.contains(&tag.as_str()) {
        return Err(AllocationError::configuration(format!(
            "{field} type must be one of {valid:?}, got '{tag}'"
        )));
    }
    section.insert("type".to_string(), Value::String(tag));

    serde_json::from_value(Value::Object(section))
        .map_err(|e| AllocationError::configuration(format!("invalid {field}: {e}")))
}

fn schedule_from_points(points: Vec<PointDocument>) -> Result<Schedule> {
    Schedule::new(
        points
            .into_iter()
            .map(|p| SchedulePoint::new(p.age, p.value))
            .collect(),
    )
}

fn external_schedule(
    points: Option<Vec<PointDocument>>,
    path: Option<PathBuf>,
    value_column: &str,
    field: &str,
    options: &LoadOptions,
) -> Result<Schedule> {
    match (points, path) {
        (Some(points), _) => schedule_from_points(points),
        (None, Some(path)) => {
            let path = resolve_path(&path, options)?;
            read_schedule_csv(&path, value_column)
        }
        (None, None) => Err(AllocationError::data_source(format!(
            "{field} requires either 'points' or a 'path' to a CSV file"
        ))),
    }
}

fn resolve_path(path: &Path, options: &LoadOptions) -> Result<PathBuf> {
    if !options.allow_external_files {
        return Err(AllocationError::configuration(format!(
            "reading external file '{}' is not permitted here",
            path.display()
        )));
    }
    match &options.base_dir {
        Some(base) if path.is_relative() => Ok(base.join(path)),
        _ => Ok(path.to_path_buf()),
    }
}

fn build_income(section: Option<Value>, options: &LoadOptions) -> Result<IncomeModel> {
    let doc: IncomeDocument = parse_tagged(section, "income_model", "flat", INCOME_TYPES)?;
    match doc {
        IncomeDocument::Flat => Ok(IncomeModel::Flat),
        IncomeDocument::Growth { g } => Ok(IncomeModel::Growth { g }),
        IncomeDocument::Profile {
            education,
            coefficients,
        } => match coefficients {
            Some(coefficients) => {
                let coefficients: [f64; 4] = coefficients.try_into().map_err(|c: Vec<f64>| {
                    AllocationError::configuration(format!(
                        "income profile needs exactly 4 coefficients, got {}",
                        c.len()
                    ))
                })?;
                Ok(IncomeModel::Profile { coefficients })
            }
            None => {
                let education = Education::from_tag(education.as_deref().unwrap_or("college"))?;
                Ok(IncomeModel::profile(education))
            }
        },
        IncomeDocument::Schedule { points, path } => Ok(IncomeModel::Schedule(
            external_schedule(points, path, "income", "income_model", options)?,
        )),
        IncomeDocument::Csv { path } => {
            let path = path.ok_or_else(|| {
                AllocationError::data_source("csv income model requires a 'path' to the CSV file")
            })?;
            let path = resolve_path(&path, options)?;
            Ok(IncomeModel::Schedule(read_schedule_csv(&path, "income")?))
        }
    }
}

fn build_benefit(section: Option<Value>, options: &LoadOptions) -> Result<BenefitModel> {
    let doc: BenefitDocument = parse_tagged(section, "benefit_model", "none", BENEFIT_TYPES)?;
    match doc {
        BenefitDocument::None => Ok(BenefitModel::None),
        BenefitDocument::Flat {
            annual_benefit,
            replacement_rate,
        } => Ok(BenefitModel::Flat {
            annual_benefit,
            replacement_rate,
        }),
        BenefitDocument::Schedule { points, path } => Ok(BenefitModel::Schedule(
            external_schedule(points, path, "benefit", "benefit_model", options)?,
        )),
    }
}

fn build_mortality(section: Option<Value>, options: &LoadOptions) -> Result<MortalityModel> {
    let doc: MortalityDocument =
        parse_tagged(section, "mortality_model", "none", MORTALITY_TYPES)?;
    match doc {
        MortalityDocument::None => Ok(MortalityModel::None),
        MortalityDocument::Parametric { mode, dispersion } => {
            Ok(MortalityModel::Parametric { mode, dispersion })
        }
        MortalityDocument::Table { points, path } => Ok(MortalityModel::Table(
            external_schedule(points, path, "survival", "mortality_model", options)?,
        )),
    }
}

fn build_curve(section: Option<Value>) -> Result<DiscountCurve> {
    let doc: CurveDocument = parse_tagged(section, "discount_curve", "constant", CURVE_TYPES)?;
    match doc {
        CurveDocument::Constant { rate } => Ok(DiscountCurve::Constant { rate }),
        CurveDocument::TermStructure { points } => DiscountCurve::term_structure(
            points
                .into_iter()
                .map(|p| TermPoint {
                    from_year: p.from_year,
                    rate: p.rate,
                })
                .collect(),
        ),
    }
}

/// Read an `age` column and a value column from a CSV file.
pub fn read_schedule_csv(path: &Path, value_column: &str) -> Result<Schedule> {
    let file = File::open(path).map_err(|e| {
        AllocationError::data_source(format!("failed to open CSV '{}': {e}", path.display()))
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AllocationError::data_source(format!("failed to read CSV headers: {e}")))?
        .clone();
    let column = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let (Some(age_idx), Some(value_idx)) = (column("age"), column(value_column)) else {
        return Err(AllocationError::data_source(format!(
            "CSV '{}' must have 'age' and '{value_column}' columns",
            path.display()
        )));
    };

    let mut points = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        // records() starts after the header line; CSV lines are 1-based.
        let line = idx + 2;
        let record = record
            .map_err(|e| AllocationError::data_source(format!("CSV parse error on line {line}: {e}")))?;
        let field = |i: usize| record.get(i).unwrap_or("");
        let age = field(age_idx).parse::<u32>().map_err(|e| {
            AllocationError::data_source(format!("invalid age on line {line}: {e}"))
        })?;
        let value = field(value_idx).parse::<f64>().map_err(|e| {
            AllocationError::data_source(format!("invalid {value_column} on line {line}: {e}"))
        })?;
        points.push(SchedulePoint::new(age, value));
    }

    Schedule::new(points)
}
