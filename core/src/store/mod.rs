//! Couche de persistance abstraite du registre
//!
//! Le store garantit, quel que soit le moteur sous-jacent :
//! - lecture versionnée et écriture conditionnelle (compare-and-save) par
//!   document de compte, le mécanisme d'exclusion mutuelle par compte ;
//! - index uniques : email, code de parrainage, filleul d'un enregistrement
//!   de parrainage, nom et montant de plan, (parrainage, jour) du journal de
//!   commissions.
//!
//! `MemoryStore` est l'implémentation en mémoire utilisée par les tests et
//! le câblage de démonstration.

mod memory;

pub use memory::MemoryStore;

use crate::account::Account;
use crate::catalog::Plan;
use crate::error::{LedgerError, Result, StoreError};
use crate::funding::{Deposit, Withdrawal};
use crate::referral::{DailyClaimCommissionLog, ReferralRecord};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::HashMap;
use uuid::Uuid;

/// Document accompagné de sa version d'écriture
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    /// Contenu du document
    pub value: T,
    /// Version observée à la lecture
    pub version: u64,
}

/// Issue d'une écriture conditionnelle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Écriture acceptée
    Saved,
    /// La version attendue ne correspond plus : relire puis réessayer
    Conflict,
}

/// Contrat de persistance du registre
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // --- comptes ---

    /// Insère un compte neuf en vérifiant l'unicité email / code de parrainage
    async fn insert_account(&self, account: Account) -> Result<()>;

    /// Lit un compte avec sa version
    async fn fetch_account(&self, id: Uuid) -> Result<Option<Versioned<Account>>>;

    /// Résout un email (insensible à la casse) vers un identifiant de compte
    async fn find_account_by_email(&self, email: &str) -> Result<Option<Uuid>>;

    /// Résout un code de parrainage vers un identifiant de compte
    async fn find_account_by_referral_code(&self, code: &str) -> Result<Option<Uuid>>;

    /// Écriture conditionnelle : n'aboutit que si la version attendue est
    /// toujours la version courante
    async fn compare_and_save_account(
        &self,
        account: &Account,
        expected_version: u64,
    ) -> Result<SaveOutcome>;

    /// Identifiants de tous les comptes (parcours des lots planifiés)
    async fn account_ids(&self) -> Result<Vec<Uuid>>;

    // --- plans ---

    /// Insère ou remplace un plan ; un plan neuf doit avoir un nom et un
    /// montant uniques dans le catalogue
    async fn upsert_plan(&self, plan: Plan) -> Result<()>;

    /// Lit un plan
    async fn fetch_plan(&self, id: Uuid) -> Result<Option<Plan>>;

    /// Liste tous les plans du catalogue
    async fn list_plans(&self) -> Result<Vec<Plan>>;

    // --- parrainage ---

    /// Insère un enregistrement de parrainage ; un filleul ne peut
    /// apparaître qu'une fois
    async fn insert_referral(&self, record: ReferralRecord) -> Result<()>;

    /// Enregistrement de parrainage dont le compte donné est le filleul
    async fn fetch_referral_by_referred(&self, referred_id: Uuid)
        -> Result<Option<ReferralRecord>>;

    /// Réécrit un enregistrement de parrainage existant
    async fn save_referral(&self, record: ReferralRecord) -> Result<()>;

    /// Enregistrements dont le filleul a déjà activé au moins un plan
    /// (candidats au lot de commission quotidien)
    async fn referrals_with_first_activation(&self) -> Result<Vec<ReferralRecord>>;

    /// Insère une ligne de journal de commission quotidienne
    ///
    /// Retourne `false` sans rien écrire si une ligne existe déjà pour ce
    /// couple (enregistrement, jour), la garde d'au-plus-une-fois.
    async fn insert_commission_log(&self, log: DailyClaimCommissionLog) -> Result<bool>;

    /// Vrai si une ligne de journal existe pour ce couple (enregistrement, jour)
    async fn commission_log_exists(&self, referral_record_id: Uuid, day: NaiveDate)
        -> Result<bool>;

    /// Lignes du journal pour un jour donné (vues d'audit admin)
    async fn commission_logs_for_day(&self, day: NaiveDate)
        -> Result<Vec<DailyClaimCommissionLog>>;

    // --- dépôts / retraits ---

    /// Insère une demande de dépôt
    async fn insert_deposit(&self, deposit: Deposit) -> Result<()>;

    /// Lit une demande de dépôt
    async fn fetch_deposit(&self, id: Uuid) -> Result<Option<Deposit>>;

    /// Réécrit une demande de dépôt
    async fn save_deposit(&self, deposit: Deposit) -> Result<()>;

    /// Insère une demande de retrait
    async fn insert_withdrawal(&self, withdrawal: Withdrawal) -> Result<()>;

    /// Lit une demande de retrait
    async fn fetch_withdrawal(&self, id: Uuid) -> Result<Option<Withdrawal>>;

    /// Réécrit une demande de retrait
    async fn save_withdrawal(&self, withdrawal: Withdrawal) -> Result<()>;

    // --- configuration ---

    /// Écrit une clé de configuration
    async fn put_setting(&self, key: &str, value: Value) -> Result<()>;

    /// Lit une clé de configuration
    async fn get_setting(&self, key: &str) -> Result<Option<Value>>;

    /// Lit toute la configuration (amorçage du cache)
    async fn all_settings(&self) -> Result<HashMap<String, Value>>;
}

/// Nombre maximal de relectures avant d'abandonner une écriture
/// conditionnelle
const MAX_UPDATE_ATTEMPTS: u32 = 64;

/// Boucle lecture → mutation → écriture conditionnelle sur un compte
///
/// C'est l'unique chemin de mutation d'un compte : la fermeture est
/// ré-exécutée sur un document relu à chaque conflit de version, ce qui
/// sérialise les mutations concurrentes (deux réclamations simultanées ne
/// peuvent pas toutes deux observer le même quota et réussir).
pub async fn update_account<S, F, T>(store: &S, account_id: Uuid, mut mutate: F) -> Result<T>
where
    S: LedgerStore + ?Sized,
    F: FnMut(&mut Account) -> Result<T> + Send,
    T: Send,
{
    for _ in 0..MAX_UPDATE_ATTEMPTS {
        let Some(mut doc) = store.fetch_account(account_id).await? else {
            return Err(LedgerError::not_found("compte", account_id).into());
        };
        let out = mutate(&mut doc.value)?;
        match store
            .compare_and_save_account(&doc.value, doc.version)
            .await?
        {
            SaveOutcome::Saved => return Ok(out),
            SaveOutcome::Conflict => continue,
        }
    }
    Err(StoreError::ConflictRetriesExhausted {
        entity: "compte",
        attempts: MAX_UPDATE_ATTEMPTS,
    }
    .into())
}
