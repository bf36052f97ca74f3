//! Repository for team SMS settings, credit balances and send logs.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::instrument;

use crate::db::{
    Store,
    errors::Result,
    keys,
    models::sms::{MAX_SMS_LOGS, SmsCredits, SmsLogEntry, SmsSettings},
};

pub struct SmsAccounts<'a> {
    store: &'a Store,
}

impl<'a> SmsAccounts<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub async fn settings(&mut self, team_id: &str) -> Result<SmsSettings> {
        Ok(self
            .store
            .get_json(&keys::sms_settings(team_id))
            .await?
            .unwrap_or_default())
    }

    #[instrument(skip(self, settings), err)]
    pub async fn save_settings(&mut self, team_id: &str, settings: &SmsSettings) -> Result<()> {
        self.store.set_json(&keys::sms_settings(team_id), settings).await
    }

    pub async fn credits(&mut self, team_id: &str) -> Result<SmsCredits> {
        Ok(self
            .store
            .get_json(&keys::sms_credits(team_id))
            .await?
            .unwrap_or_default())
    }

    #[instrument(skip(self), err)]
    pub async fn top_up(&mut self, team_id: &str, amount: Decimal) -> Result<SmsCredits> {
        let key = keys::sms_credits(team_id);
        let _guard = self.store.lock(&key).await;
        let mut credits: SmsCredits = self.store.get_json(&key).await?.unwrap_or_default();

        credits.balance += amount;
        credits.total_purchased += amount;
        credits.updated_at = Some(Utc::now());

        self.store.set_json(&key, &credits).await?;
        Ok(credits)
    }

    /// Take `amount` from the balance. Returns `None`, leaving the balance untouched, when it
    /// is insufficient.
    #[instrument(skip(self), err)]
    pub async fn deduct(&mut self, team_id: &str, amount: Decimal) -> Result<Option<SmsCredits>> {
        let key = keys::sms_credits(team_id);
        let _guard = self.store.lock(&key).await;
        let mut credits: SmsCredits = self.store.get_json(&key).await?.unwrap_or_default();

        if credits.balance < amount {
            return Ok(None);
        }
        credits.balance -= amount;
        credits.total_spent += amount;
        credits.updated_at = Some(Utc::now());

        self.store.set_json(&key, &credits).await?;
        Ok(Some(credits))
    }

    /// Give back an amount taken by [`Self::deduct`] for a message that was not delivered.
    #[instrument(skip(self), err)]
    pub async fn refund(&mut self, team_id: &str, amount: Decimal) -> Result<SmsCredits> {
        let key = keys::sms_credits(team_id);
        let _guard = self.store.lock(&key).await;
        let mut credits: SmsCredits = self.store.get_json(&key).await?.unwrap_or_default();

        credits.balance += amount;
        credits.total_spent = (credits.total_spent - amount).max(Decimal::ZERO);
        credits.updated_at = Some(Utc::now());

        self.store.set_json(&key, &credits).await?;
        Ok(credits)
    }

    #[instrument(skip(self, entry), fields(status = ?entry.status), err)]
    pub async fn append_log(&mut self, team_id: &str, entry: SmsLogEntry) -> Result<()> {
        let key = keys::sms_logs(team_id);
        let _guard = self.store.lock(&key).await;
        let mut logs: Vec<SmsLogEntry> = self.store.get_list(&key).await?;
        logs.insert(0, entry);
        logs.truncate(MAX_SMS_LOGS);
        self.store.set_json(&key, &logs).await
    }

    /// Newest first
    pub async fn logs(&mut self, team_id: &str) -> Result<Vec<SmsLogEntry>> {
        self.store.get_list(&keys::sms_logs(team_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory::MemoryKv;
    use crate::db::models::sms::{SmsProvider, SmsStatus};
    use std::sync::Arc;
    use uuid::Uuid;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn test_credit_arithmetic() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let mut repo = SmsAccounts::new(&store);

        assert_eq!(repo.credits("team-1").await.unwrap().balance, Decimal::ZERO);
        assert!(repo.deduct("team-1", dec("0.02")).await.unwrap().is_none());

        repo.top_up("team-1", dec("0.05")).await.unwrap();
        let after = repo.deduct("team-1", dec("0.02")).await.unwrap().unwrap();
        assert_eq!(after.balance, dec("0.03"));
        assert_eq!(after.total_spent, dec("0.02"));
        assert_eq!(after.total_purchased, dec("0.05"));

        repo.deduct("team-1", dec("0.02")).await.unwrap().unwrap();
        assert!(repo.deduct("team-1", dec("0.02")).await.unwrap().is_none());
        assert_eq!(repo.credits("team-1").await.unwrap().balance, dec("0.01"));
    }

    #[tokio::test]
    async fn test_logs_are_newest_first_and_capped() {
        let store = Store::new(Arc::new(MemoryKv::default()));
        let mut repo = SmsAccounts::new(&store);

        for i in 0..(MAX_SMS_LOGS + 3) {
            let entry = SmsLogEntry {
                id: Uuid::new_v4(),
                team_id: "team-1".into(),
                phone_number: "+255700000001".into(),
                message_body: format!("message {i}"),
                status: SmsStatus::Sent,
                provider: SmsProvider::Demo,
                message_id: None,
                error_message: None,
                debt_id: None,
                invoice_number: None,
                sent_by: None,
                cost: Decimal::ZERO,
                created_at: Utc::now(),
            };
            repo.append_log("team-1", entry).await.unwrap();
        }

        let logs = repo.logs("team-1").await.unwrap();
        assert_eq!(logs.len(), MAX_SMS_LOGS);
        assert_eq!(logs[0].message_body, format!("message {}", MAX_SMS_LOGS + 2));
    }
}
