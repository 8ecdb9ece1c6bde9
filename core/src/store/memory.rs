//! Implémentation en mémoire du store du registre
//!
//! Chaque table vit derrière un même `RwLock` ; les comptes sont versionnés
//! et réécrits par compare-and-save, ce qui reproduit le comportement
//! attendu d'un moteur documentaire à écriture conditionnelle.

use super::{LedgerStore, SaveOutcome, Versioned};
use crate::account::Account;
use crate::catalog::Plan;
use crate::error::{Result, StoreError};
use crate::funding::{Deposit, Withdrawal};
use crate::referral::{DailyClaimCommissionLog, ReferralRecord};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    accounts: HashMap<Uuid, Versioned<Account>>,
    email_index: HashMap<String, Uuid>,
    code_index: HashMap<String, Uuid>,
    plans: HashMap<Uuid, Plan>,
    referrals: HashMap<Uuid, ReferralRecord>,
    referred_index: HashMap<Uuid, Uuid>,
    commission_logs: HashMap<(Uuid, NaiveDate), DailyClaimCommissionLog>,
    deposits: HashMap<Uuid, Deposit>,
    withdrawals: HashMap<Uuid, Withdrawal>,
    settings: HashMap<String, Value>,
}

/// Store en mémoire, partagé entre tâches
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Crée un store vide
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn insert_account(&self, account: Account) -> Result<()> {
        let mut tables = self.tables.write().await;
        let email = account.email.to_lowercase();
        if tables.email_index.contains_key(&email) {
            return Err(StoreError::UniqueViolation {
                index: format!("compte.email ({email})"),
            }
            .into());
        }
        if tables.code_index.contains_key(&account.referral_code) {
            return Err(StoreError::UniqueViolation {
                index: format!("compte.code_parrainage ({})", account.referral_code),
            }
            .into());
        }
        tables.email_index.insert(email, account.id);
        tables
            .code_index
            .insert(account.referral_code.clone(), account.id);
        tables.accounts.insert(
            account.id,
            Versioned {
                value: account,
                version: 0,
            },
        );
        Ok(())
    }

    async fn fetch_account(&self, id: Uuid) -> Result<Option<Versioned<Account>>> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.get(&id).cloned())
    }

    async fn find_account_by_email(&self, email: &str) -> Result<Option<Uuid>> {
        let tables = self.tables.read().await;
        Ok(tables.email_index.get(&email.to_lowercase()).copied())
    }

    async fn find_account_by_referral_code(&self, code: &str) -> Result<Option<Uuid>> {
        let tables = self.tables.read().await;
        Ok(tables.code_index.get(code).copied())
    }

    async fn compare_and_save_account(
        &self,
        account: &Account,
        expected_version: u64,
    ) -> Result<SaveOutcome> {
        let mut tables = self.tables.write().await;
        match tables.accounts.get_mut(&account.id) {
            Some(doc) if doc.version == expected_version => {
                doc.value = account.clone();
                doc.version += 1;
                Ok(SaveOutcome::Saved)
            }
            Some(_) => Ok(SaveOutcome::Conflict),
            None => Err(StoreError::UniqueViolation {
                index: format!("compte.id ({}) absent à l'écriture", account.id),
            }
            .into()),
        }
    }

    async fn account_ids(&self) -> Result<Vec<Uuid>> {
        let tables = self.tables.read().await;
        Ok(tables.accounts.keys().copied().collect())
    }

    async fn upsert_plan(&self, plan: Plan) -> Result<()> {
        let mut tables = self.tables.write().await;
        let clash = tables.plans.values().find(|p| {
            p.id != plan.id
                && (p.name == plan.name || p.investment_amount == plan.investment_amount)
        });
        if let Some(existing) = clash {
            return Err(StoreError::UniqueViolation {
                index: format!("plan.nom_ou_montant ({})", existing.name),
            }
            .into());
        }
        tables.plans.insert(plan.id, plan);
        Ok(())
    }

    async fn fetch_plan(&self, id: Uuid) -> Result<Option<Plan>> {
        let tables = self.tables.read().await;
        Ok(tables.plans.get(&id).cloned())
    }

    async fn list_plans(&self) -> Result<Vec<Plan>> {
        let tables = self.tables.read().await;
        Ok(tables.plans.values().cloned().collect())
    }

    async fn insert_referral(&self, record: ReferralRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.referred_index.contains_key(&record.referred_id) {
            return Err(StoreError::UniqueViolation {
                index: format!("parrainage.filleul ({})", record.referred_id),
            }
            .into());
        }
        tables.referred_index.insert(record.referred_id, record.id);
        tables.referrals.insert(record.id, record);
        Ok(())
    }

    async fn fetch_referral_by_referred(
        &self,
        referred_id: Uuid,
    ) -> Result<Option<ReferralRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .referred_index
            .get(&referred_id)
            .and_then(|id| tables.referrals.get(id))
            .cloned())
    }

    async fn save_referral(&self, record: ReferralRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.referrals.contains_key(&record.id) {
            return Err(StoreError::UniqueViolation {
                index: format!("parrainage.id ({}) absent à l'écriture", record.id),
            }
            .into());
        }
        tables.referrals.insert(record.id, record);
        Ok(())
    }

    async fn referrals_with_first_activation(&self) -> Result<Vec<ReferralRecord>> {
        let tables = self.tables.read().await;
        Ok(tables
            .referrals
            .values()
            .filter(|r| r.first_plan_activation_date.is_some())
            .cloned()
            .collect())
    }

    async fn insert_commission_log(&self, log: DailyClaimCommissionLog) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let key = (log.referral_record_id, log.day);
        if tables.commission_logs.contains_key(&key) {
            return Ok(false);
        }
        tables.commission_logs.insert(key, log);
        Ok(true)
    }

    async fn commission_log_exists(
        &self,
        referral_record_id: Uuid,
        day: NaiveDate,
    ) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables
            .commission_logs
            .contains_key(&(referral_record_id, day)))
    }

    async fn commission_logs_for_day(
        &self,
        day: NaiveDate,
    ) -> Result<Vec<DailyClaimCommissionLog>> {
        let tables = self.tables.read().await;
        Ok(tables
            .commission_logs
            .values()
            .filter(|l| l.day == day)
            .cloned()
            .collect())
    }

    async fn insert_deposit(&self, deposit: Deposit) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.deposits.insert(deposit.id, deposit);
        Ok(())
    }

    async fn fetch_deposit(&self, id: Uuid) -> Result<Option<Deposit>> {
        let tables = self.tables.read().await;
        Ok(tables.deposits.get(&id).cloned())
    }

    async fn save_deposit(&self, deposit: Deposit) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.deposits.insert(deposit.id, deposit);
        Ok(())
    }

    async fn insert_withdrawal(&self, withdrawal: Withdrawal) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.withdrawals.insert(withdrawal.id, withdrawal);
        Ok(())
    }

    async fn fetch_withdrawal(&self, id: Uuid) -> Result<Option<Withdrawal>> {
        let tables = self.tables.read().await;
        Ok(tables.withdrawals.get(&id).cloned())
    }

    async fn save_withdrawal(&self, withdrawal: Withdrawal) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.withdrawals.insert(withdrawal.id, withdrawal);
        Ok(())
    }

    async fn put_setting(&self, key: &str, value: Value) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.settings.insert(key.to_string(), value);
        Ok(())
    }

    async fn get_setting(&self, key: &str) -> Result<Option<Value>> {
        let tables = self.tables.read().await;
        Ok(tables.settings.get(key).cloned())
    }

    async fn all_settings(&self) -> Result<HashMap<String, Value>> {
        let tables = self.tables.read().await;
        Ok(tables.settings.clone())
    }
}
