//! Repository for a user's saved AI reports.

use chrono::Utc;
use tracing::{debug, instrument};

use crate::{
    db::{
        Store,
        errors::Result,
        keys,
        models::ai_reports::{AiReport, AiReportSaveDBRequest},
    },
    types::UserId,
};

pub struct AiReports<'a> {
    store: &'a Store,
}

impl<'a> AiReports<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// In the order they were first saved.
    pub async fn list(&mut self, owner: &UserId) -> Result<Vec<AiReport>> {
        self.store.get_list(&keys::ai_reports(owner)).await
    }

    /// Insert or replace the report for `date` and `period`. A replaced report keeps its
    /// `createdAt` and position.
    #[instrument(skip(self, request), fields(date = %request.date, period = %request.period), err)]
    pub async fn save(&mut self, owner: &UserId, request: AiReportSaveDBRequest) -> Result<AiReport> {
        let key = keys::ai_reports(owner);
        let _guard = self.store.lock(&key).await;
        let mut reports: Vec<AiReport> = self.store.get_list(&key).await?;

        let now = Utc::now();
        let existing = reports
            .iter()
            .position(|r| r.date == request.date && r.period == request.period);
        let report = AiReport {
            date: request.date,
            period: request.period,
            insights: request.insights,
            metrics: request.metrics,
            created_at: existing.map_or(now, |i| reports[i].created_at),
            updated_at: now,
        };
        match existing {
            Some(i) => {
                debug!("Replacing saved AI report");
                reports[i] = report.clone();
            }
            None => reports.push(report.clone()),
        }

        self.store.set_json(&key, &reports).await?;
        Ok(report)
    }

    /// Returns whether a report was removed.
    #[instrument(skip(self), err)]
    pub async fn delete(&mut self, owner: &UserId, date: &str, period: &str) -> Result<bool> {
        let key = keys::ai_reports(owner);
        let _guard = self.store.lock(&key).await;
        let mut reports: Vec<AiReport> = self.store.get_list(&key).await?;

        let before = reports.len();
        reports.retain(|r| !(r.date == date && r.period == period));
        if reports.len() == before {
            return Ok(false);
        }
        self.store.set_json(&key, &reports).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryKv;
    use serde_json::json;
    use std::sync::Arc;
    use uuid::Uuid;

    fn request(date: &str, period: &str, score: i64) -> AiReportSaveDBRequest {
        AiReportSaveDBRequest {
            date: date.to_string(),
            period: period.to_string(),
            insights: json!(["Debt collection slowed this week"]),
            metrics: json!({ "score": score }),
        }
    }

    #[tokio::test]
    async fn test_save_replaces_same_date_and_period() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let mut repo = AiReports::new(&store);
        let owner = Uuid::new_v4();

        let first = repo.save(&owner, request("2025-03-01", "weekly", 60)).await.unwrap();
        repo.save(&owner, request("2025-03-01", "monthly", 70)).await.unwrap();
        let replaced = repo.save(&owner, request("2025-03-01", "weekly", 80)).await.unwrap();

        assert_eq!(replaced.created_at, first.created_at);
        assert!(replaced.updated_at >= first.updated_at);

        let all = repo.list(&owner).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].period, "weekly");
        assert_eq!(all[0].metrics["score"], 80);
    }

    #[tokio::test]
    async fn test_delete_only_matches_both_fields() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let mut repo = AiReports::new(&store);
        let owner = Uuid::new_v4();
        repo.save(&owner, request("2025-03-01", "weekly", 60)).await.unwrap();

        assert!(!repo.delete(&owner, "2025-03-01", "daily").await.unwrap());
        assert!(repo.delete(&owner, "2025-03-01", "weekly").await.unwrap());
        assert!(repo.list(&owner).await.unwrap().is_empty());
        assert!(repo.list(&Uuid::new_v4()).await.unwrap().is_empty());
    }
}
