//! Submitted reports and their keyword insights.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::types::{TeamId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InsightModule {
    Aftersales,
    Kpi,
    Competitors,
    Sales,
    Marketing,
    Debt,
}

impl InsightModule {
    /// Activity feed category for insights about this module
    pub fn display_name(&self) -> &'static str {
        match self {
            InsightModule::Aftersales => "After Sales",
            InsightModule::Kpi => "KPI",
            InsightModule::Competitors => "Competitors",
            InsightModule::Sales => "Sales Strategy",
            InsightModule::Marketing => "Marketing Strategy",
            InsightModule::Debt => "Debt Collection",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ReportInsight {
    pub module: InsightModule,
    pub insights: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    #[default]
    Processing,
    Processed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDBResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub report_type: String,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    pub status: ReportStatus,
    #[serde(default)]
    pub insights: Vec<ReportInsight>,
    pub created_by: UserId,
    pub team_id: TeamId,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Client fields the server does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct ReportCreateDBRequest {
    pub report_type: String,
    pub title: String,
    pub content: String,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
    pub created_by: UserId,
    pub team_id: TeamId,
}

#[derive(Debug, Clone, Default)]
pub struct ReportUpdateDBRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub report_type: Option<String>,
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default)]
pub struct ReportFilter {
    pub team_id: Option<TeamId>,
    pub created_by: Option<UserId>,
}

impl ReportFilter {
    pub fn matches(&self, report: &ReportDBResponse) -> bool {
        self.team_id.as_ref().is_none_or(|t| &report.team_id == t)
            && self.created_by.is_none_or(|u| report.created_by == u)
    }
}

fn any_of(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// Keyword scan of a report, grouped by CRM module. Modules without hits are omitted.
pub fn analyze_report_content(content: &str) -> Vec<ReportInsight> {
    let text = content.to_lowercase();
    let mut out = Vec::new();
    let mut push = |module: InsightModule, insights: Vec<&str>| {
        if !insights.is_empty() {
            out.push(ReportInsight {
                module,
                insights: insights.into_iter().map(str::to_string).collect(),
            });
        }
    };

    let mut aftersales = Vec::new();
    if any_of(&text, &["customer", "satisfaction", "service"]) {
        aftersales.push("Customer satisfaction metrics identified in report");
        if any_of(&text, &["rating", "score"]) {
            aftersales.push("Performance ratings detected");
        }
    }
    push(InsightModule::Aftersales, aftersales);

    let mut kpi = Vec::new();
    if any_of(&text, &["revenue", "mrr", "target"]) {
        kpi.push("Revenue and target metrics found");
    }
    if any_of(&text, &["retention", "churn"]) {
        kpi.push("Customer retention data identified");
    }
    push(InsightModule::Kpi, kpi);

    let mut competitors = Vec::new();
    if any_of(&text, &["competitor", "market share", "pricing"]) {
        competitors.push("Competitive intelligence data detected");
        if any_of(&text, &["price", "discount", "promotion"]) {
            competitors.push("Pricing and promotional strategies found");
        }
    }
    push(InsightModule::Competitors, competitors);

    let mut sales = Vec::new();
    if any_of(&text, &["sales", "pipeline", "deal"]) {
        sales.push("Sales pipeline and deal information identified");
    }
    if any_of(&text, &["upsell", "cross-sell"]) {
        sales.push("Upsell opportunities detected");
    }
    push(InsightModule::Sales, sales);

    let mut marketing = Vec::new();
    if any_of(&text, &["campaign", "marketing", "lead"]) {
        marketing.push("Marketing campaign data found");
    }
    if any_of(&text, &["roi", "conversion"]) {
        marketing.push("ROI and conversion metrics identified");
    }
    push(InsightModule::Marketing, marketing);

    let mut debt = Vec::new();
    if any_of(&text, &["debt", "payment", "overdue"]) {
        debt.push("Payment and debt collection data detected");
        if any_of(&text, &["outstanding", "recovery"]) {
            debt.push("Outstanding balances and recovery metrics found");
        }
    }
    push(InsightModule::Debt, debt);

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_content_has_no_insights() {
        assert!(analyze_report_content("Weekly notes").is_empty());
    }

    #[test]
    fn test_nested_keywords_need_the_outer_match() {
        // "score" alone does not trigger the after-sales block
        assert!(analyze_report_content("score 10").is_empty());

        let insights = analyze_report_content("Customer survey: average SCORE 4.5");
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].module, InsightModule::Aftersales);
        assert_eq!(insights[0].insights.len(), 2);
    }

    #[test]
    fn test_modules_in_fixed_order() {
        let insights = analyze_report_content("Overdue debt recovery improved; campaign ROI up; revenue on target");
        let modules: Vec<_> = insights.iter().map(|i| i.module).collect();
        assert_eq!(modules, vec![InsightModule::Kpi, InsightModule::Marketing, InsightModule::Debt]);
        assert_eq!(
            insights[2].insights,
            vec![
                "Payment and debt collection data detected",
                "Outstanding balances and recovery metrics found"
            ]
        );
    }

    #[test]
    fn test_display_names() {
        assert_eq!(InsightModule::Sales.display_name(), "Sales Strategy");
        assert_eq!(InsightModule::Kpi.display_name(), "KPI");
    }
}
