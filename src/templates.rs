//! Named, parameterized queries for common variance analysis patterns.
//!
//! Parameters are checked against strict patterns before they are placed in
//! the SQL text. Rendered SQL still goes through the executor's guard like
//! any other query.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Tables in the warehouse that templates may reference.
pub const KNOWN_TABLES: &[&str] = &[
    "raw_ledger_entries",
    "stg_account_mapping",
    "stg_cost_center_mapping",
    "fct_actuals_monthly",
    "fct_budget_monthly",
    "fct_fx_rates",
    "int_actuals_usd",
    "mart_pnl_report",
    "seed_manifest",
];

const DEFAULT_PERIOD_TABLE: &str = "fct_actuals_monthly";

static PERIOD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}$").expect("constant pattern"));

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("constant pattern"));

/// Errors raised while rendering a template. No SQL is produced.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Unknown template '{name}'. Available: {available}")]
    UnknownTemplate { name: String, available: String },

    #[error("Template '{template}' requires parameter '{param}'")]
    MissingParam {
        template: &'static str,
        param: &'static str,
    },

    #[error("Template '{template}' does not accept parameter '{param}'")]
    UnexpectedParam { template: &'static str, param: String },

    #[error("Invalid period format: '{0}' (expected YYYY-MM)")]
    InvalidPeriod(String),

    #[error("Invalid {param}: '{value}' (only alphanumeric, hyphens, underscores allowed)")]
    InvalidIdentifier { param: &'static str, value: String },

    #[error("Unknown table: {0}")]
    UnknownTable(String),
}

/// How a parameter value is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// `YYYY-MM`.
    Period,
    /// Letters, digits, `_` and `-`.
    Identifier,
    /// One of [`KNOWN_TABLES`].
    Table,
}

/// A parameter accepted by a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

const fn required(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        required: true,
    }
}

const fn optional(name: &'static str, kind: ParamKind) -> ParamSpec {
    ParamSpec {
        name,
        kind,
        required: false,
    }
}

const VARIANCE_SUMMARY_PARAMS: &[ParamSpec] = &[optional("period", ParamKind::Period)];
const ACCOUNT_DETAIL_PARAMS: &[ParamSpec] = &[
    required("account_code", ParamKind::Identifier),
    optional("period", ParamKind::Period),
];
const FX_RATE_HISTORY_PARAMS: &[ParamSpec] = &[optional("currency", ParamKind::Identifier)];
const COST_CENTER_DRILL_PARAMS: &[ParamSpec] = &[
    required("cost_center", ParamKind::Identifier),
    optional("period", ParamKind::Period),
];
const BUDGET_VS_ACTUAL_PARAMS: &[ParamSpec] = &[optional("department", ParamKind::Identifier)];
const PERIOD_OVER_PERIOD_PARAMS: &[ParamSpec] = &[optional("table", ParamKind::Table)];

/// The fixed set of query templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryTemplate {
    VarianceSummary,
    AccountDetail,
    FxRateHistory,
    CostCenterDrill,
    BudgetVsActual,
    PeriodOverPeriod,
    ClassificationCheck,
}

impl QueryTemplate {
    pub const ALL: [QueryTemplate; 7] = [
        Self::VarianceSummary,
        Self::AccountDetail,
        Self::FxRateHistory,
        Self::CostCenterDrill,
        Self::BudgetVsActual,
        Self::PeriodOverPeriod,
        Self::ClassificationCheck,
    ];

    /// Returns the registry name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::VarianceSummary => "variance_summary",
            Self::AccountDetail => "account_detail",
            Self::FxRateHistory => "fx_rate_history",
            Self::CostCenterDrill => "cost_center_drill",
            Self::BudgetVsActual => "budget_vs_actual",
            Self::PeriodOverPeriod => "period_over_period",
            Self::ClassificationCheck => "classification_check",
        }
    }

    /// Returns a one-line description.
    pub fn description(&self) -> &'static str {
        match self {
            Self::VarianceSummary => "P&L variance by department and account type",
            Self::AccountDetail => "Monthly actuals for one account code",
            Self::FxRateHistory => "FX rate history with period-over-period change",
            Self::CostCenterDrill => "Raw ledger entries for one cost center",
            Self::BudgetVsActual => "Budget vs actual comparison by department",
            Self::PeriodOverPeriod => "Period-over-period comparison for a fact table",
            Self::ClassificationCheck => "Ledger entries whose account type disagrees with the mapping",
        }
    }

    /// Returns the accepted parameters.
    pub fn params(&self) -> &'static [ParamSpec] {
        match self {
            Self::VarianceSummary => VARIANCE_SUMMARY_PARAMS,
            Self::AccountDetail => ACCOUNT_DETAIL_PARAMS,
            Self::FxRateHistory => FX_RATE_HISTORY_PARAMS,
            Self::CostCenterDrill => COST_CENTER_DRILL_PARAMS,
            Self::BudgetVsActual => BUDGET_VS_ACTUAL_PARAMS,
            Self::PeriodOverPeriod => PERIOD_OVER_PERIOD_PARAMS,
            Self::ClassificationCheck => &[],
        }
    }

    /// Comma-separated list of all template names.
    pub fn available() -> String {
        Self::ALL
            .iter()
            .map(QueryTemplate::name)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Validates `params` and renders the SQL.
    ///
    /// Empty values count as absent.
    pub fn render(&self, params: &BTreeMap<String, String>) -> Result<String, TemplateError> {
        let args = Args::validate(*self, params)?;

        let sql = match self {
            Self::VarianceSummary => variance_summary(args.get("period")),
            Self::AccountDetail => {
                account_detail(args.require("account_code")?, args.get("period"))
            }
            Self::FxRateHistory => fx_rate_history(args.get("currency")),
            Self::CostCenterDrill => {
                cost_center_drill(args.require("cost_center")?, args.get("period"))
            }
            Self::BudgetVsActual => budget_vs_actual(args.get("department")),
            Self::PeriodOverPeriod => {
                period_over_period(args.get("table").unwrap_or(DEFAULT_PERIOD_TABLE))
            }
            Self::ClassificationCheck => CLASSIFICATION_CHECK.to_string(),
        };
        Ok(sql)
    }
}

impl fmt::Display for QueryTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for QueryTemplate {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.name() == s)
            .ok_or_else(|| TemplateError::UnknownTemplate {
                name: s.to_string(),
                available: Self::available(),
            })
    }
}

/// Renders `name` with `params` in one step.
pub fn render_template(name: &str, params: &BTreeMap<String, String>) -> Result<String, TemplateError> {
    name.parse::<QueryTemplate>()?.render(params)
}

/// Validated parameter values for one render.
struct Args<'a> {
    template: QueryTemplate,
    values: BTreeMap<&'static str, &'a str>,
}

impl<'a> Args<'a> {
    fn validate(
        template: QueryTemplate,
        params: &'a BTreeMap<String, String>,
    ) -> Result<Self, TemplateError> {
        let specs = template.params();

        if let Some(unknown) = params
            .keys()
            .find(|key| !specs.iter().any(|spec| spec.name == key.as_str()))
        {
            return Err(TemplateError::UnexpectedParam {
                template: template.name(),
                param: unknown.clone(),
            });
        }

        let mut values = BTreeMap::new();
        for spec in specs {
            let value = params
                .get(spec.name)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty());
            match value {
                Some(value) => {
                    check_value(spec, value)?;
                    values.insert(spec.name, value);
                }
                None if spec.required => {
                    return Err(TemplateError::MissingParam {
                        template: template.name(),
                        param: spec.name,
                    })
                }
                None => {}
            }
        }

        Ok(Self { template, values })
    }

    fn get(&self, name: &str) -> Option<&'a str> {
        self.values.get(name).copied()
    }

    fn require(&self, name: &'static str) -> Result<&'a str, TemplateError> {
        self.get(name).ok_or(TemplateError::MissingParam {
            template: self.template.name(),
            param: name,
        })
    }
}

fn check_value(spec: &ParamSpec, value: &str) -> Result<(), TemplateError> {
    match spec.kind {
        ParamKind::Period if !PERIOD_RE.is_match(value) => {
            Err(TemplateError::InvalidPeriod(value.to_string()))
        }
        ParamKind::Identifier if !IDENTIFIER_RE.is_match(value) => {
            Err(TemplateError::InvalidIdentifier {
                param: spec.name,
                value: value.to_string(),
            })
        }
        ParamKind::Table if !KNOWN_TABLES.contains(&value) => {
            Err(TemplateError::UnknownTable(value.to_string()))
        }
        _ => Ok(()),
    }
}

/// Joins conditions into a `WHERE` clause, or nothing.
fn where_clause(conditions: impl IntoIterator<Item = String>) -> String {
    let conditions: Vec<String> = conditions.into_iter().collect();
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

fn variance_summary(period: Option<&str>) -> String {
    let filter = where_clause(period.map(|p| format!("period = '{p}'")));
    format!(
        "SELECT
    department,
    account_type,
    period,
    ROUND(SUM(actual_usd), 2) AS total_actual,
    ROUND(SUM(budget_usd), 2) AS total_budget,
    ROUND(SUM(variance_usd), 2) AS total_variance,
    ROUND(AVG(variance_pct), 2) AS avg_variance_pct
FROM mart_pnl_report
{filter}
GROUP BY department, account_type, period
ORDER BY ABS(SUM(variance_usd)) DESC"
    )
}

fn account_detail(account_code: &str, period: Option<&str>) -> String {
    let filter = where_clause(
        std::iter::once(format!("a.account_code = '{account_code}'"))
            .chain(period.map(|p| format!("a.period = '{p}'"))),
    );
    format!(
        "SELECT
    a.account_code,
    m.account_type,
    m.account_name,
    a.cost_center,
    a.currency,
    a.period,
    a.amount_local,
    a.entry_count
FROM fct_actuals_monthly a
JOIN stg_account_mapping m ON a.account_code = m.account_code
{filter}
ORDER BY a.period, a.cost_center"
    )
}

fn fx_rate_history(currency: Option<&str>) -> String {
    let filter = where_clause(currency.map(|c| format!("currency = '{c}'")));
    format!(
        "SELECT
    currency,
    period,
    rate_to_usd,
    LAG(rate_to_usd) OVER (PARTITION BY currency ORDER BY period) AS prev_rate,
    ROUND(
        (rate_to_usd - LAG(rate_to_usd) OVER (PARTITION BY currency ORDER BY period))
        / LAG(rate_to_usd) OVER (PARTITION BY currency ORDER BY period) * 100,
        2
    ) AS pct_change
FROM fct_fx_rates
{filter}
ORDER BY currency, period"
    )
}

fn cost_center_drill(cost_center: &str, period: Option<&str>) -> String {
    let filter = where_clause(
        std::iter::once(format!("r.cost_center = '{cost_center}'"))
            .chain(period.map(|p| format!("r.period = '{p}'"))),
    );
    format!(
        "SELECT
    r.entry_id,
    r.period,
    r.account_code,
    r.account_type,
    r.department,
    r.currency,
    r.amount_local,
    r.description
FROM raw_ledger_entries r
{filter}
ORDER BY r.period, r.account_code"
    )
}

fn budget_vs_actual(department: Option<&str>) -> String {
    let filter = where_clause(department.map(|d| format!("department = '{d}'")));
    format!(
        "SELECT
    department,
    account_type,
    period,
    actual_usd,
    budget_usd,
    variance_usd,
    variance_pct
FROM mart_pnl_report
{filter}
ORDER BY department, account_type, period"
    )
}

fn period_over_period(table: &str) -> String {
    let amount = match table {
        "fct_actuals_monthly" => "amount_local",
        "int_actuals_usd" => "amount_usd",
        _ => return format!("SELECT * FROM {table} ORDER BY period"),
    };
    format!(
        "SELECT
    account_code,
    cost_center,
    period,
    {amount},
    LAG({amount}) OVER (
        PARTITION BY account_code, cost_center ORDER BY period
    ) AS prev_period_amount,
    ROUND(
        {amount} - LAG({amount}) OVER (
            PARTITION BY account_code, cost_center ORDER BY period
        ),
        2
    ) AS period_change
FROM {table}
ORDER BY account_code, cost_center, period"
    )
}

const CLASSIFICATION_CHECK: &str = "SELECT
    r.account_code,
    r.account_type AS ledger_type,
    m.account_type AS mapping_type,
    COUNT(*) AS entry_count,
    ROUND(SUM(r.amount_local), 2) AS total_amount
FROM raw_ledger_entries r
JOIN stg_account_mapping m ON r.account_code = m.account_code
WHERE r.account_type != m.account_type
GROUP BY r.account_code, r.account_type, m.account_type
ORDER BY entry_count DESC";
