//! Plain-text rendering of session state.

use depot_infra::RefreshSummary;
use depot_inventory::{DepositReport, StackRecord, UsageSummary, WithdrawOutcome};

pub fn rows(records: &[&StackRecord]) -> Vec<String> {
    if records.is_empty() {
        return vec!["(nothing stored)".to_string()];
    }
    let width = records
        .iter()
        .map(|r| r.total().to_string().len())
        .max()
        .unwrap_or(1);
    records
        .iter()
        .map(|r| format!("{:>width$}  {}", r.total(), r.display_name()))
        .collect()
}

pub fn usage(summary: &UsageSummary) -> String {
    format!(
        "{} kinds, {} units, {}/{} slots ({:.0}%)",
        summary.kinds,
        summary.units,
        summary.used_slots,
        summary.total_slots,
        summary.fill_ratio() * 100.0
    )
}

pub fn refresh(summary: &RefreshSummary) -> String {
    format!(
        "scanned {} backends: {} kinds, {} units",
        summary.backends, summary.kinds, summary.units
    )
}

pub fn withdrawal(outcome: &WithdrawOutcome) -> String {
    if outcome.shortfall() == 0 {
        format!("withdrew {} x {}", outcome.withdrawn, outcome.identity)
    } else {
        format!(
            "withdrew {} x {} ({} short)",
            outcome.withdrawn,
            outcome.identity,
            outcome.shortfall()
        )
    }
}

pub fn deposit(report: &DepositReport) -> String {
    match report.leftover() {
        0 => format!("deposited {} units", report.deposited()),
        left => format!("deposited {} units, {} did not fit", report.deposited(), left),
    }
}
