//! Report API models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::{IntoParams, ToSchema};

use crate::{
    db::models::{
        ai_reports::AiReport,
        reports::{ReportDBResponse, ReportInsight, ReportStatus, ReportUpdateDBRequest},
    },
    types::{TeamId, UserId},
};

fn default_report_type() -> String {
    "general".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportCreate {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "type", default = "default_report_type")]
    pub report_type: String,
    pub file_name: Option<String>,
    pub file_size: Option<u64>,
}

/// Known report fields. Any other field in the body is stored on the report as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ReportUpdate {
    pub title: Option<String>,
    pub content: Option<String>,
    #[serde(rename = "type")]
    pub report_type: Option<String>,
}

/// Fields of a report a client may not overwrite
const SERVER_FIELDS: &[&str] = &[
    "id",
    "title",
    "content",
    "type",
    "status",
    "insights",
    "createdBy",
    "teamId",
    "createdAt",
    "updatedAt",
];

impl ReportUpdate {
    /// Split a raw update body into the typed fields and free-form extras.
    pub fn from_body(mut body: Map<String, Value>) -> Result<ReportUpdateDBRequest, serde_json::Error> {
        let known: ReportUpdate = serde_json::from_value(Value::Object(body.clone()))?;
        body.retain(|k, _| !SERVER_FIELDS.contains(&k.as_str()));
        Ok(ReportUpdateDBRequest {
            title: known.title,
            content: known.content,
            report_type: known.report_type,
            extra: body,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReportResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub report_type: String,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    pub status: ReportStatus,
    pub insights: Vec<ReportInsight>,
    #[schema(value_type = String, format = "uuid")]
    pub created_by: UserId,
    /// Creator's display name, when they still exist
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by_name: Option<String>,
    pub team_id: TeamId,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[schema(value_type = Object)]
    pub extra: Map<String, Value>,
}

impl From<ReportDBResponse> for ReportResponse {
    fn from(report: ReportDBResponse) -> Self {
        Self {
            id: report.id,
            report_type: report.report_type,
            title: report.title,
            content: report.content,
            file_name: report.file_name,
            file_size: report.file_size,
            status: report.status,
            insights: report.insights,
            created_by: report.created_by,
            created_by_name: None,
            team_id: report.team_id,
            created_at: report.created_at,
            updated_at: report.updated_at,
            extra: report.extra,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReportRecordResponse {
    pub success: bool,
    pub report: ReportResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReportListResponse {
    pub success: bool,
    pub reports: Vec<ReportResponse>,
}

/// Whose saved AI reports to act on. Defaults to the caller.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct AiReportsQuery {
    /// A teammate (admin, same team)
    #[param(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
}

/// An AI analysis to keep. Saving again for the same `date` and `period` replaces it.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AiReportSave {
    pub date: Option<String>,
    pub period: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub insights: Value,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub metrics: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AiReportSavedResponse {
    pub success: bool,
    pub report: AiReport,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_body_split() {
        let body = json!({
            "title": "Q3",
            "type": "quarterly",
            "teamId": "team-x",
            "tags": ["finance"]
        });
        let Value::Object(body) = body else { unreachable!() };
        let update = ReportUpdate::from_body(body).unwrap();
        assert_eq!(update.title.as_deref(), Some("Q3"));
        assert_eq!(update.report_type.as_deref(), Some("quarterly"));
        assert!(update.content.is_none());
        assert_eq!(update.extra.len(), 1);
        assert_eq!(update.extra["tags"], json!(["finance"]));
    }
}
