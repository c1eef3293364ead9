//! Credit ledger service.
//!
//! The ledger is append-only: the balance is the signed sum of an
//! identity's entries, materialized on read, never a separately stored
//! mutable counter that can drift from the log. Concurrent operations for
//! one identity are serialized through a per-identity lock so two racing
//! deductions cannot overspend.
//!
//! The batch flow uses settle-after semantics: cost is computed from the
//! realized outcomes and charged once at the end. The orchestrator never
//! deducts upfront and refunds the complement, because a crash between
//! those two steps would under-refund.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use fable_models::{LedgerEntry, LedgerReason};

use crate::error::{PipelineError, PipelineResult};

/// Persistence interface for ledger entries (relational-store collaborator).
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Append an immutable entry.
    async fn append(&self, entry: LedgerEntry) -> PipelineResult<()>;

    /// All entries for an identity, oldest first.
    async fn entries_for(&self, user_id: &str) -> PipelineResult<Vec<LedgerEntry>>;
}

/// In-memory ledger store.
#[derive(Clone, Default)]
pub struct MemoryLedgerStore {
    entries: Arc<RwLock<HashMap<String, Vec<LedgerEntry>>>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    async fn append(&self, entry: LedgerEntry) -> PipelineResult<()> {
        let mut entries = self.entries.write().await;
        entries.entry(entry.user_id.clone()).or_default().push(entry);
        Ok(())
    }

    async fn entries_for(&self, user_id: &str) -> PipelineResult<Vec<LedgerEntry>> {
        let entries = self.entries.read().await;
        Ok(entries.get(user_id).cloned().unwrap_or_default())
    }
}

/// Authoritative credit balance with atomic deduction and refund.
#[derive(Clone)]
pub struct CreditLedger {
    store: Arc<dyn LedgerStore>,
    /// One lock per identity; deduct/refund for the same identity never
    /// interleave.
    locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl CreditLedger {
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self {
            store,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn lock_for(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        Arc::clone(
            locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Current balance: the signed sum of all entries for the identity.
    pub async fn balance(&self, user_id: &str) -> PipelineResult<i64> {
        let entries = self.store.entries_for(user_id).await?;
        Ok(fable_models::ledger::sum_entries(&entries))
    }

    /// Grant credits (plan purchase, signup bonus, admin top-up).
    pub async fn grant(
        &self,
        user_id: &str,
        amount: i64,
        note: impl Into<String>,
    ) -> PipelineResult<i64> {
        if amount <= 0 {
            return Err(PipelineError::validation("Grant amount must be positive"));
        }
        let lock = self.lock_for(user_id).await;
        let _guard = lock.lock().await;

        self.store
            .append(LedgerEntry::new(user_id, amount, LedgerReason::Grant, note))
            .await?;
        self.balance(user_id).await
    }

    /// Deduct credits atomically.
    ///
    /// Fails without writing an entry when `amount` exceeds the current
    /// balance. Replaying the same `(reason, correlation_id)` pair is a
    /// no-op success so a retried settle-up never double-charges.
    pub async fn deduct(
        &self,
        user_id: &str,
        amount: i64,
        reason: LedgerReason,
        note: impl Into<String>,
        story_id: Option<&str>,
        correlation_id: Option<&str>,
    ) -> PipelineResult<i64> {
        if amount <= 0 {
            return Err(PipelineError::validation(
                "Deduction amount must be positive",
            ));
        }

        let lock = self.lock_for(user_id).await;
        let _guard = lock.lock().await;

        let entries = self.store.entries_for(user_id).await?;

        if let Some(correlation_id) = correlation_id {
            if let Some(existing) = entries.iter().find(|e| {
                e.reason == reason && e.correlation_id.as_deref() == Some(correlation_id)
            }) {
                info!(
                    user_id = %user_id,
                    correlation_id = %correlation_id,
                    entry_id = %existing.id,
                    "Deduction already recorded, skipping replay"
                );
                return Ok(fable_models::ledger::sum_entries(&entries));
            }
        }

        let balance = fable_models::ledger::sum_entries(&entries);
        if amount > balance {
            return Err(PipelineError::InsufficientCredits {
                needed: amount,
                balance,
            });
        }

        let mut entry = LedgerEntry::new(user_id, -amount, reason, note);
        if let Some(story_id) = story_id {
            entry = entry.with_story_id(story_id);
        }
        if let Some(correlation_id) = correlation_id {
            entry = entry.with_correlation_id(correlation_id);
        }
        self.store.append(entry).await?;

        let new_balance = balance - amount;
        info!(
            user_id = %user_id,
            amount,
            reason = reason.as_str(),
            new_balance,
            "Deducted credits"
        );
        Ok(new_balance)
    }

    /// Refund credits (always succeeds unless the store fails).
    pub async fn refund(
        &self,
        user_id: &str,
        amount: i64,
        note: impl Into<String>,
        correlation_id: Option<&str>,
    ) -> PipelineResult<i64> {
        if amount <= 0 {
            return Err(PipelineError::validation("Refund amount must be positive"));
        }

        let lock = self.lock_for(user_id).await;
        let _guard = lock.lock().await;

        let entries = self.store.entries_for(user_id).await?;
        if let Some(correlation_id) = correlation_id {
            if entries.iter().any(|e| {
                e.reason == LedgerReason::RefundAudio
                    && e.correlation_id.as_deref() == Some(correlation_id)
            }) {
                warn!(user_id = %user_id, correlation_id = %correlation_id, "Refund already recorded, skipping replay");
                return Ok(fable_models::ledger::sum_entries(&entries));
            }
        }

        let mut entry = LedgerEntry::new(user_id, amount, LedgerReason::RefundAudio, note);
        if let Some(correlation_id) = correlation_id {
            entry = entry.with_correlation_id(correlation_id);
        }
        self.store.append(entry).await?;

        self.balance(user_id).await
    }

    /// Full entry history for an identity, oldest first.
    pub async fn history(&self, user_id: &str) -> PipelineResult<Vec<LedgerEntry>> {
        self.store.entries_for(user_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> CreditLedger {
        CreditLedger::new(Arc::new(MemoryLedgerStore::new()))
    }

    #[tokio::test]
    async fn test_balance_equals_sum_of_entries() {
        let ledger = ledger();
        ledger.grant("u1", 10, "signup").await.unwrap();
        ledger
            .deduct("u1", 3, LedgerReason::DeductionAudio, "batch", None, None)
            .await
            .unwrap();
        ledger.refund("u1", 1, "correction", None).await.unwrap();

        let entries = ledger.history("u1").await.unwrap();
        let sum: i64 = entries.iter().map(|e| e.amount).sum();
        assert_eq!(ledger.balance("u1").await.unwrap(), sum);
        assert_eq!(sum, 8);
    }

    #[tokio::test]
    async fn test_deduct_never_exceeds_balance() {
        let ledger = ledger();
        ledger.grant("u1", 5, "signup").await.unwrap();

        let err = ledger
            .deduct("u1", 6, LedgerReason::DeductionAudio, "batch", None, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::InsufficientCredits {
                needed: 6,
                balance: 5
            }
        ));

        // No entry was written by the failed deduction.
        assert_eq!(ledger.history("u1").await.unwrap().len(), 1);
        assert_eq!(ledger.balance("u1").await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_deduction_replay_is_idempotent() {
        let ledger = ledger();
        ledger.grant("u1", 10, "signup").await.unwrap();

        ledger
            .deduct(
                "u1",
                2,
                LedgerReason::DeductionAudio,
                "batch",
                Some("story-1"),
                Some("batch-abc"),
            )
            .await
            .unwrap();
        let balance = ledger
            .deduct(
                "u1",
                2,
                LedgerReason::DeductionAudio,
                "batch",
                Some("story-1"),
                Some("batch-abc"),
            )
            .await
            .unwrap();

        assert_eq!(balance, 8);
        assert_eq!(ledger.history("u1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_deductions_never_go_negative() {
        let ledger = ledger();
        ledger.grant("u1", 10, "seed").await.unwrap();

        let mut handles = Vec::new();
        for i in 0..20 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                ledger
                    .deduct(
                        "u1",
                        3,
                        LedgerReason::DeductionAudio,
                        format!("attempt {}", i),
                        None,
                        None,
                    )
                    .await
                    .is_ok()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }

        // 10 credits at 3 apiece: exactly 3 deductions can succeed.
        assert_eq!(successes, 3);
        let balance = ledger.balance("u1").await.unwrap();
        assert_eq!(balance, 1);
        assert!(balance >= 0);
    }

    #[tokio::test]
    async fn test_randomized_mixed_operations_keep_invariants() {
        let ledger = ledger();
        ledger.grant("u1", 50, "seed").await.unwrap();

        let mut handles = Vec::new();
        for i in 0..40 {
            let ledger = ledger.clone();
            handles.push(tokio::spawn(async move {
                // Cheap deterministic mix of operation types and amounts.
                let amount = (i % 7) + 1;
                if i % 3 == 0 {
                    let _ = ledger.refund("u1", amount, "refund", None).await;
                } else {
                    let _ = ledger
                        .deduct(
                            "u1",
                            amount,
                            LedgerReason::DeductionAudio,
                            "deduct",
                            None,
                            None,
                        )
                        .await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let entries = ledger.history("u1").await.unwrap();
        let sum: i64 = entries.iter().map(|e| e.amount).sum();
        let balance = ledger.balance("u1").await.unwrap();
        assert_eq!(balance, sum);
        assert!(balance >= 0, "balance went negative: {}", balance);
    }
}
