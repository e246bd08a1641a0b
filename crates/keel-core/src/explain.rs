//! Recommendation explanation templates
//!
//! Explanations are rendered from a closed set of templates, each
//! carrying exactly the values it interpolates. The tagged inputs are
//! persisted alongside the rendered text so an explanation can always
//! be traced back to the evidence that produced it.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Template inputs, tagged by template
///
/// Adding a template means adding a variant here; there is no
/// free-text path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "template", rename_all = "snake_case")]
pub enum TemplateInputs {
    /// The action advances one of the user's active goals
    GoalAligned {
        action_title: String,
        goal_name: String,
        max_monthly_savings: Decimal,
    },
    /// The user carries reviewable subscriptions
    SubscriptionAudit {
        pattern_count: usize,
        monthly_total: Decimal,
    },
    /// Recent spend in a cuttable category
    CategorySpend {
        action_title: String,
        category: String,
        recent_total: Decimal,
    },
    /// Small effort, concrete payoff
    QuickWin {
        action_title: String,
        est_minutes: i64,
        max_monthly_savings: Decimal,
    },
    /// Fallback when no stronger evidence applies
    GenericSavings {
        action_title: String,
        min_monthly_savings: Decimal,
        max_monthly_savings: Decimal,
    },
}

impl TemplateInputs {
    pub fn template_key(&self) -> &'static str {
        match self {
            Self::GoalAligned { .. } => "goal_aligned",
            Self::SubscriptionAudit { .. } => "subscription_audit",
            Self::CategorySpend { .. } => "category_spend",
            Self::QuickWin { .. } => "quick_win",
            Self::GenericSavings { .. } => "generic_savings",
        }
    }

    /// Render the explanation text
    pub fn render(&self) -> String {
        match self {
            Self::GoalAligned {
                action_title,
                goal_name,
                max_monthly_savings,
            } => format!(
                "{} supports your \"{}\" goal and could free up to ${} a month toward it.",
                action_title, goal_name, max_monthly_savings
            ),
            Self::SubscriptionAudit {
                pattern_count,
                monthly_total,
            } => {
                if *pattern_count == 1 {
                    format!(
                        "You have 1 recurring subscription costing about ${} a month. \
                         Double-check it's still earning its keep.",
                        monthly_total
                    )
                } else {
                    format!(
                        "You have {} recurring subscriptions adding up to about ${} a month. \
                         Reviewing them usually turns up one you no longer use.",
                        pattern_count, monthly_total
                    )
                }
            }
            Self::CategorySpend {
                action_title,
                category,
                recent_total,
            } => format!(
                "You spent ${} on {} in the last 30 days. {} can trim that without giving it up.",
                recent_total, category, action_title
            ),
            Self::QuickWin {
                action_title,
                est_minutes,
                max_monthly_savings,
            } => format!(
                "{} takes about {} minutes and could save up to ${} a month.",
                action_title, est_minutes, max_monthly_savings
            ),
            Self::GenericSavings {
                action_title,
                min_monthly_savings,
                max_monthly_savings,
            } => format!(
                "{} could save ${} to ${} a month.",
                action_title, min_monthly_savings, max_monthly_savings
            ),
        }
    }
}
