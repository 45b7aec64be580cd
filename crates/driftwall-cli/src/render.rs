//! Plain-text rendering of plans and apply results.

use driftwall_core::{Approval, ApplyResult, DiffAction, DiffItem, Plan};
use std::fmt::Write as _;

const HEADER: &str = "KIND     NAME                           ACTION   RISK      DETAIL";

fn detail_lines(item: &DiffItem) -> Vec<String> {
    if let Some(reason) = &item.block_reason {
        let mut lines = vec![reason.clone()];
        if item.approved {
            lines.push("approved: runs as DELETE".to_string());
        } else {
            lines.push(format!(
                "approve with: driftwall approve {} {} --reason \"...\"",
                item.kind, item.name
            ));
        }
        return lines;
    }
    item.changes.iter().map(ToString::to_string).collect()
}

/// Table of every actionable item followed by the counts. NOP items only
/// appear in the counts.
pub fn format_plan(plan: &Plan) -> String {
    let mut out = String::new();
    if plan.is_drifted() {
        let _ = writeln!(out, "{HEADER}");
    }
    for item in plan.items.iter().filter(|item| item.action != DiffAction::Nop) {
        let details = detail_lines(item);
        let first = details.first().map(String::as_str).unwrap_or("");
        let _ = writeln!(
            out,
            "{:<8} {:<30} {:<8} {:<9} {}",
            item.kind.as_str(),
            item.name,
            item.action.to_string(),
            item.risk_level.to_string(),
            first
        );
        for extra in details.iter().skip(1) {
            let _ = writeln!(out, "{:<59} {}", "", extra);
        }
    }
    let _ = writeln!(
        out,
        "{} to create, {} to modify, {} to delete, {} blocked, {} unchanged",
        plan.create_count, plan.modify_count, plan.delete_count, plan.blocked_count, plan.nop_count
    );
    out
}

pub fn format_apply(result: &ApplyResult) -> String {
    let mut out = String::new();
    for step in &result.applied {
        let _ = writeln!(out, "  done    {step}");
    }
    if let Some(failed) = &result.failed {
        let _ = writeln!(out, "  failed  {failed}");
    }
    let _ = writeln!(
        out,
        "{} step(s) in {:.1}s",
        result.applied.len(),
        result.duration.as_secs_f64()
    );
    out
}

pub fn format_approvals(approvals: &[Approval]) -> String {
    if approvals.is_empty() {
        return "No recorded approvals.\n".to_string();
    }
    let mut out = String::new();
    let _ = writeln!(out, "{:<8} {:<30} {:<20} REASON", "KIND", "NAME", "APPROVED AT");
    for approval in approvals {
        let _ = writeln!(
            out,
            "{:<8} {:<30} {:<20} {}",
            approval.kind.as_str(),
            approval.name,
            approval.approved_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            approval.reason
        );
    }
    out
}
