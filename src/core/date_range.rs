use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, Result};

/// Longest span a `range` query may cover
pub const MAX_RANGE_DAYS: i64 = 90;

/// How many days back auto mode looks for data (reporting lags 1-3 days)
pub const AUTO_LOOKBACK_DAYS: i64 = 3;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Date filter selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DateFilter {
    Today,
    Yesterday,
    Custom,
    Range,
}

impl DateFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            DateFilter::Today => "today",
            DateFilter::Yesterday => "yesterday",
            DateFilter::Custom => "custom",
            DateFilter::Range => "range",
        }
    }
}

impl std::str::FromStr for DateFilter {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "today" => Ok(DateFilter::Today),
            "yesterday" => Ok(DateFilter::Yesterday),
            "custom" => Ok(DateFilter::Custom),
            "range" => Ok(DateFilter::Range),
            other => Err(GatewayError::InvalidInput(format!(
                "Unknown date_filter '{}': use today, yesterday, custom or range",
                other
            ))),
        }
    }
}

/// Raw date parameters as supplied by a caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateQuery {
    #[serde(default)]
    pub date_filter: Option<DateFilter>,
    #[serde(default)]
    pub custom_date: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
}

/// Validated reporting period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportWindow {
    /// No filter: try today, then each earlier day up to the lookback
    Auto,
    Day(NaiveDate),
    Range { start: NaiveDate, end: NaiveDate },
}

/// One report request to try, with the age of its data in days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub age_days: i64,
}

fn parse_date(value: &str, field: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        GatewayError::InvalidInput(format!("Invalid {} '{}': use YYYY-MM-DD format", field, value))
    })
}

impl DateQuery {
    pub fn today() -> Self {
        Self {
            date_filter: Some(DateFilter::Today),
            ..Self::default()
        }
    }

    pub fn custom(date: impl Into<String>) -> Self {
        Self {
            date_filter: Some(DateFilter::Custom),
            custom_date: Some(date.into()),
            ..Self::default()
        }
    }

    pub fn range(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            date_filter: Some(DateFilter::Range),
            start_date: Some(start.into()),
            end_date: Some(end.into()),
            ..Self::default()
        }
    }

    /// Validate the parameters against `today`
    pub fn resolve(&self, today: NaiveDate) -> Result<ReportWindow> {
        match self.date_filter {
            None => Ok(ReportWindow::Auto),
            Some(DateFilter::Today) => Ok(ReportWindow::Day(today)),
            Some(DateFilter::Yesterday) => Ok(ReportWindow::Day(today - chrono::Duration::days(1))),
            Some(DateFilter::Custom) => {
                let raw = self.custom_date.as_deref().ok_or_else(|| {
                    GatewayError::InvalidInput(
                        "custom_date parameter required when date_filter='custom'".to_string(),
                    )
                })?;
                Ok(ReportWindow::Day(parse_date(raw, "custom_date")?))
            }
            Some(DateFilter::Range) => {
                let (start, end) = match (self.start_date.as_deref(), self.end_date.as_deref()) {
                    (Some(start), Some(end)) => (parse_date(start, "start_date")?, parse_date(end, "end_date")?),
                    _ => {
                        return Err(GatewayError::InvalidInput(
                            "start_date and end_date parameters required when date_filter='range'".to_string(),
                        ))
                    }
                };

                if start > end {
                    return Err(GatewayError::InvalidInput(
                        "start_date cannot be later than end_date".to_string(),
                    ));
                }
                if (end - start).num_days() > MAX_RANGE_DAYS {
                    return Err(GatewayError::InvalidInput(format!(
                        "Date range cannot exceed {} days",
                        MAX_RANGE_DAYS
                    )));
                }

                Ok(ReportWindow::Range { start, end })
            }
        }
    }
}

impl ReportWindow {
    /// Requests to issue in order until one returns data
    pub fn attempts(&self, today: NaiveDate) -> Vec<Attempt> {
        match *self {
            ReportWindow::Auto => (0..=AUTO_LOOKBACK_DAYS)
                .map(|age_days| {
                    let day = today - chrono::Duration::days(age_days);
                    Attempt { start: day, end: day, age_days }
                })
                .collect(),
            ReportWindow::Day(day) => vec![Attempt {
                start: day,
                end: day,
                age_days: (today - day).num_days(),
            }],
            ReportWindow::Range { start, end } => vec![Attempt { start, end, age_days: 0 }],
        }
    }

    /// Human-readable period, e.g. `2025-10-01` or `2025-10-01 to 2025-10-07`
    pub fn label(&self, today: NaiveDate) -> String {
        match *self {
            ReportWindow::Auto => today.format(DATE_FORMAT).to_string(),
            ReportWindow::Day(day) => day.format(DATE_FORMAT).to_string(),
            ReportWindow::Range { start, end } => {
                format!("{} to {}", start.format(DATE_FORMAT), end.format(DATE_FORMAT))
            }
        }
    }
}

pub fn format_date(day: NaiveDate) -> String {
    day.format(DATE_FORMAT).to_string()
}
