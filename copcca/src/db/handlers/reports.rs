//! Repository for submitted reports.

use std::collections::HashMap;

use chrono::Utc;
use futures::future::try_join_all;
use tracing::instrument;

use crate::{
    db::{
        Store,
        errors::{DbError, Result},
        handlers::repository::Repository,
        keys,
        models::reports::{
            ReportCreateDBRequest, ReportDBResponse, ReportFilter, ReportStatus, ReportUpdateDBRequest,
            analyze_report_content,
        },
    },
    types::now_ms,
};

/// Text scanned for insights
fn analysis_input(title: &str, content: &str) -> String {
    format!("{content}\n{title}")
}

pub struct Reports<'a> {
    store: &'a Store,
}

impl<'a> Reports<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl<'a> Repository for Reports<'a> {
    type CreateRequest = ReportCreateDBRequest;
    type UpdateRequest = ReportUpdateDBRequest;
    type Response = ReportDBResponse;
    type Id = String;
    type Filter = ReportFilter;

    /// Store a report with its insights already computed.
    #[instrument(skip(self, request), fields(title = %request.title), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let _guard = self.store.lock(keys::REPORT_PREFIX).await;

        let id = loop {
            let candidate = format!("report-{}", now_ms());
            if self.store.get(&keys::report(&candidate)).await?.is_none() {
                break candidate;
            }
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        };

        let report = ReportDBResponse {
            id,
            report_type: request.report_type.clone(),
            title: request.title.clone(),
            content: request.content.clone(),
            file_name: request.file_name.clone(),
            file_size: request.file_size,
            status: ReportStatus::Processed,
            insights: analyze_report_content(&analysis_input(&request.title, &request.content)),
            created_by: request.created_by,
            team_id: request.team_id.clone(),
            created_at: Utc::now(),
            updated_at: None,
            extra: Default::default(),
        };

        self.store.set_json(&keys::report(&report.id), &report).await?;
        Ok(report)
    }

    #[instrument(skip(self), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        self.store.get_json(&keys::report(&id)).await
    }

    #[instrument(skip(self, ids), fields(count = ids.len()), err)]
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>> {
        let store = self.store;
        let found = try_join_all(ids.iter().map(|id| {
            let key = keys::report(id);
            async move { store.get_json::<ReportDBResponse>(&key).await }
        })).await?;
        Ok(found.into_iter().flatten().map(|r| (r.id.clone(), r)).collect())
    }

    /// Matching reports, newest first.
    #[instrument(skip(self, filter), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let mut reports: Vec<ReportDBResponse> = self
            .store
            .values_by_prefix::<ReportDBResponse>(keys::REPORT_PREFIX)
            .await?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reports)
    }

    #[instrument(skip(self), err)]
    async fn delete(&mut self, id: Self::Id) -> Result<bool> {
        self.store.del(&keys::report(&id)).await
    }

    /// Apply changes; new content re-runs the insight analysis.
    #[instrument(skip(self, request), err)]
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response> {
        let key = keys::report(&id);
        let _guard = self.store.lock(&key).await;
        let mut report: ReportDBResponse = self.store.get_json(&key).await?.ok_or(DbError::NotFound)?;

        let content_changed = request.content.as_ref().is_some_and(|c| !c.is_empty() && c != &report.content);

        if let Some(title) = &request.title {
            report.title = title.clone();
        }
        if let Some(content) = &request.content {
            report.content = content.clone();
        }
        if let Some(report_type) = &request.report_type {
            report.report_type = report_type.clone();
        }
        report.extra.extend(request.extra.clone());
        if content_changed {
            report.insights = analyze_report_content(&analysis_input(&report.title, &report.content));
        }
        report.updated_at = Some(Utc::now());

        self.store.set_json(&key, &report).await?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryKv;
    use crate::db::models::reports::InsightModule;
    use std::sync::Arc;
    use uuid::Uuid;

    fn request(team: &str, content: &str) -> ReportCreateDBRequest {
        ReportCreateDBRequest {
            report_type: "quick".into(),
            title: "Weekly".into(),
            content: content.into(),
            file_name: None,
            file_size: None,
            created_by: Uuid::new_v4(),
            team_id: team.into(),
        }
    }

    #[test_log::test(tokio::test)]
    async fn test_create_runs_analysis() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let mut repo = Reports::new(&store);

        let report = repo.create(&request("team-a", "Churn is down, revenue up")).await.unwrap();
        assert!(report.id.starts_with("report-"));
        assert_eq!(report.status, ReportStatus::Processed);
        assert_eq!(report.insights.len(), 1);
        assert_eq!(report.insights[0].module, InsightModule::Kpi);
    }

    #[test_log::test(tokio::test)]
    async fn test_ids_unique_within_a_millisecond() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let mut repo = Reports::new(&store);

        let a = repo.create(&request("team-a", "x")).await.unwrap();
        let b = repo.create(&request("team-a", "y")).await.unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(repo.list(&ReportFilter::default()).await.unwrap().len(), 2);
    }

    #[test_log::test(tokio::test)]
    async fn test_update_reanalyzes_changed_content() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let mut repo = Reports::new(&store);
        let report = repo.create(&request("team-a", "nothing here")).await.unwrap();
        assert!(report.insights.is_empty());

        let update = ReportUpdateDBRequest {
            content: Some("Overdue payments recovered".into()),
            ..Default::default()
        };
        let updated = repo.update(report.id.clone(), &update).await.unwrap();
        assert_eq!(updated.insights[0].module, InsightModule::Debt);
        assert!(updated.updated_at.is_some());

        let team_b = repo
            .list(&ReportFilter {
                team_id: Some("team-b".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(team_b.is_empty());
    }
}
