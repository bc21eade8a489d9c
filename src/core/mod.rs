pub mod currency;
pub mod date_range;
pub mod report;

pub use date_range::{Attempt, DateFilter, DateQuery, ReportWindow};
pub use report::{
    AccountEarningsSummary, DomainBreakdown, DomainEarnings, DomainSummary, EarningsReport,
    MetricTotals, MultiAccountSummary,
};
