use super::change::Change;
use crate::model::{DesiredResource, DiffAction, ResourceKind, RiskLevel};
use serde::{Deserialize, Serialize};

/// One reconciliation unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffItem {
    pub kind: ResourceKind,
    pub name: String,
    pub action: DiffAction,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<Change>,
    /// Set exactly when `action` is `Blocked`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub desired: Option<DesiredResource>,
}

impl DiffItem {
    pub(crate) fn new(kind: ResourceKind, name: &str, action: DiffAction, risk: RiskLevel) -> Self {
        Self {
            kind,
            name: name.to_string(),
            action,
            changes: Vec::new(),
            block_reason: None,
            risk_level: risk,
            approved: false,
            desired: None,
        }
    }

    pub(crate) fn blocked(kind: ResourceKind, name: &str, risk: RiskLevel, reason: String) -> Self {
        Self {
            block_reason: Some(reason),
            ..Self::new(kind, name, DiffAction::Blocked, risk)
        }
    }

    pub(crate) fn with_desired(mut self, desired: DesiredResource) -> Self {
        self.desired = Some(desired);
        self
    }

    pub fn is(&self, kind: ResourceKind, name: &str) -> bool {
        self.kind == kind && self.name == name
    }
}

/// Ordered reconciliation plan: creates, then modifies/NOPs, then deletions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub items: Vec<DiffItem>,
    pub create_count: usize,
    pub modify_count: usize,
    pub delete_count: usize,
    pub blocked_count: usize,
    pub nop_count: usize,
    pub has_blocked: bool,
    pub safe_to_apply: bool,
}

impl Plan {
    pub(crate) fn from_items(items: Vec<DiffItem>) -> Self {
        let mut plan = Plan {
            items,
            ..Default::default()
        };
        for item in &plan.items {
            match item.action {
                DiffAction::Create => plan.create_count += 1,
                DiffAction::Modify => plan.modify_count += 1,
                DiffAction::Delete => plan.delete_count += 1,
                DiffAction::Blocked => plan.blocked_count += 1,
                DiffAction::Nop => plan.nop_count += 1,
            }
        }
        plan.has_blocked = plan.blocked_count > 0;
        plan.safe_to_apply = !plan.has_blocked;
        plan
    }

    /// Total actionable items, BLOCKED included.
    pub fn pending(&self) -> usize {
        self.create_count + self.modify_count + self.delete_count + self.blocked_count
    }

    pub fn is_drifted(&self) -> bool {
        self.pending() > 0
    }

    pub fn find(&self, kind: ResourceKind, name: &str) -> Option<&DiffItem> {
        self.items.iter().find(|item| item.is(kind, name))
    }

    /// Record operator approval for a BLOCKED item. Returns whether an item
    /// was flipped; anything not currently BLOCKED is left alone.
    pub fn approve(&mut self, kind: ResourceKind, name: &str) -> bool {
        match self
            .items
            .iter_mut()
            .find(|item| item.is(kind, name) && item.action == DiffAction::Blocked)
        {
            Some(item) => {
                item.approved = true;
                true
            }
            None => false,
        }
    }

    /// Items still waiting on an operator.
    pub fn unapproved_blocked(&self) -> impl Iterator<Item = &DiffItem> {
        self.items
            .iter()
            .filter(|item| item.action == DiffAction::Blocked && !item.approved)
    }
}

/// Stamp recorded approvals onto `plan`. Returns the number of items flipped.
pub fn stamp_approvals(plan: &mut Plan, approvals: &[(ResourceKind, String)]) -> usize {
    approvals
        .iter()
        .filter(|(kind, name)| plan.approve(*kind, name))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_plan() -> Plan {
        Plan::from_items(vec![
            DiffItem::new(ResourceKind::Dataset, "tank/new", DiffAction::Create, RiskLevel::Low),
            DiffItem::new(ResourceKind::Share, "media", DiffAction::Nop, RiskLevel::Low),
            DiffItem::blocked(
                ResourceKind::Pool,
                "old",
                RiskLevel::Critical,
                "manual".into(),
            ),
        ])
    }

    #[test]
    fn tallies_and_flags() {
        let plan = sample_plan();
        assert_eq!(plan.create_count, 1);
        assert_eq!(plan.nop_count, 1);
        assert_eq!(plan.blocked_count, 1);
        assert!(plan.has_blocked);
        assert!(!plan.safe_to_apply);
        assert_eq!(plan.pending(), 2);
    }

    #[test]
    fn approve_only_flips_blocked_items() {
        let mut plan = sample_plan();
        assert!(!plan.approve(ResourceKind::Dataset, "tank/new"));
        assert!(!plan.approve(ResourceKind::Pool, "missing"));
        assert!(plan.approve(ResourceKind::Pool, "old"));
        assert!(plan.find(ResourceKind::Pool, "old").unwrap().approved);
        assert_eq!(plan.unapproved_blocked().count(), 0);
        // approval does not make the plan "safe"
        assert!(plan.has_blocked);
    }

    #[test]
    fn stamping_ignores_stale_approvals() {
        let mut plan = sample_plan();
        let flipped = stamp_approvals(
            &mut plan,
            &[
                (ResourceKind::Pool, "old".to_string()),
                (ResourceKind::Share, "gone".to_string()),
            ],
        );
        assert_eq!(flipped, 1);
    }

    #[test]
    fn serialized_plan_omits_empty_fields() {
        let json = serde_json::to_value(sample_plan()).unwrap();
        let first = &json["items"][0];
        assert_eq!(first["action"], "CREATE");
        assert!(first.get("block_reason").is_none());
        assert_eq!(json["items"][2]["risk_level"], "critical");
    }
}
