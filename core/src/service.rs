//! Façade du registre : les opérations exposées aux couches de transport
//!
//! `LedgerService` câble le store, le cache de configuration, l'horloge et
//! les moteurs, et expose les contrats appelés par les couches extérieures
//! (API, admin). L'identité est fournie déjà authentifiée par ces couches ;
//! le cœur lui fait confiance sans revérifier.

use crate::account::{Account, ClaimRecord, Investment};
use crate::catalog::Plan;
use crate::clock::Clock;
use crate::engine::{ActivationEngine, ClaimEngine, FundingSource};
use crate::error::{CoreError, LedgerError, Result, StoreError};
use crate::funding::{withdrawal_fee, Deposit, FundingStatus, Withdrawal};
use crate::money::Amount;
use crate::referral::ReferralRecord;
use crate::scheduler::ReconciliationScheduler;
use crate::settings::{keys, ConfigCache};
use crate::store::{update_account, LedgerStore};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Solde visé par un ajustement administratif
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceTarget {
    /// Solde principal
    Main,
    /// Solde bonus
    Bonus,
}

/// Sens d'un ajustement administratif
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentKind {
    /// Crédit
    Credit,
    /// Débit (vérifié, jamais de solde négatif)
    Debit,
}

/// Façade principale du moteur de registre
pub struct LedgerService {
    store: Arc<dyn LedgerStore>,
    config: Arc<ConfigCache>,
    clock: Arc<dyn Clock>,
    activation: ActivationEngine,
    claims: ClaimEngine,
}

impl LedgerService {
    /// Amorce le service : sème la configuration par défaut, charge le
    /// cache, câble les moteurs
    pub async fn bootstrap(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>) -> Result<Self> {
        let config = Arc::new(ConfigCache::bootstrap(store.clone()).await?);
        let activation = ActivationEngine::new(store.clone(), config.clone(), clock.clone());
        let claims = ClaimEngine::new(store.clone(), config.clone(), clock.clone());
        Ok(Self {
            store,
            config,
            clock,
            activation,
            claims,
        })
    }

    /// Cache de configuration partagé
    pub fn config(&self) -> &Arc<ConfigCache> {
        &self.config
    }

    /// Construit le planificateur de réconciliation sur les mêmes
    /// dépendances
    pub fn scheduler(&self) -> ReconciliationScheduler {
        ReconciliationScheduler::new(self.store.clone(), self.config.clone(), self.clock.clone())
    }

    // --- inscription ---

    /// Inscrit un compte, avec parrainage optionnel par code
    ///
    /// La prime d'inscription configurée est créditée sur le solde bonus.
    /// Un code de parrainage inconnu ou porté par un compte bloqué est
    /// ignoré (journalisé) : l'inscription aboutit sans parrainage.
    pub async fn register(&self, email: &str, referral_code: Option<&str>) -> Result<Account> {
        let email = email.trim().to_lowercase();
        if self.store.find_account_by_email(&email).await?.is_some() {
            return Err(LedgerError::DuplicateEmail { email }.into());
        }

        let referrer_id = match referral_code {
            None => None,
            Some(code) => match self.store.find_account_by_referral_code(code).await? {
                None => {
                    warn!(code, "code de parrainage inconnu, inscription sans parrain");
                    None
                }
                Some(id) => match self.store.fetch_account(id).await? {
                    Some(doc) if !doc.value.is_blocked => Some(id),
                    _ => {
                        warn!(code, "parrain bloqué ou introuvable, inscription sans parrain");
                        None
                    }
                },
            },
        };

        let own_code = self.generate_unique_referral_code().await?;
        let bonus = self.config.amount(keys::SIGNUP_BONUS)?;
        let now = self.clock.now_utc();
        let account = Account::new(&email, own_code, referrer_id, bonus, now);
        let account_id = account.id;
        self.store.insert_account(account.clone()).await?;

        if let Some(referrer_id) = referrer_id {
            self.store
                .insert_referral(ReferralRecord::new(referrer_id, account_id, now))
                .await
                .map_err(|e| match e {
                    CoreError::Store(StoreError::UniqueViolation { .. }) => {
                        LedgerError::DuplicateReferral.into()
                    }
                    other => other,
                })?;
        }

        info!(account = %account_id, referred = referrer_id.is_some(), "compte inscrit");
        Ok(account)
    }

    async fn generate_unique_referral_code(&self) -> Result<String> {
        // alphabet sans caractères ambigus (0/O, 1/I)
        const CHARSET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
        const CODE_LEN: usize = 8;
        const MAX_ATTEMPTS: usize = 32;

        for _ in 0..MAX_ATTEMPTS {
            let code: String = {
                use rand::Rng;
                let mut rng = rand::thread_rng();
                (0..CODE_LEN)
                    .map(|_| CHARSET[rng.gen_range(0..CHARSET.len())] as char)
                    .collect()
            };
            if self
                .store
                .find_account_by_referral_code(&code)
                .await?
                .is_none()
            {
                return Ok(code);
            }
        }
        Err(CoreError::Internal {
            message: "génération de code de parrainage épuisée".into(),
        })
    }

    // --- opérations utilisateur ---

    /// Active un plan en le finançant depuis le solde principal
    pub async fn activate_plan(&self, account_id: Uuid, plan_id: Uuid) -> Result<Investment> {
        self.activation
            .activate(account_id, plan_id, FundingSource::Balance)
            .await
    }

    /// Active un plan par octroi administratif, sans débit
    pub async fn grant_plan(&self, account_id: Uuid, plan_id: Uuid) -> Result<Investment> {
        self.activation
            .activate(account_id, plan_id, FundingSource::AdminGrant)
            .await
    }

    /// Réclamation quotidienne bornée sur un investissement actif
    pub async fn claim(
        &self,
        account_id: Uuid,
        investment_id: Uuid,
        display_currency: &str,
    ) -> Result<ClaimRecord> {
        self.claims
            .claim(account_id, investment_id, display_currency)
            .await
    }

    /// Lit un compte
    pub async fn get_account(&self, account_id: Uuid) -> Result<Account> {
        match self.store.fetch_account(account_id).await? {
            Some(doc) => Ok(doc.value),
            None => Err(LedgerError::not_found("compte", account_id).into()),
        }
    }

    // --- dépôts ---

    /// Dépose une demande de dépôt en attente de confirmation manuelle
    pub async fn request_deposit(
        &self,
        account_id: Uuid,
        amount: Amount,
        method: &str,
    ) -> Result<Deposit> {
        let account = self.get_account(account_id).await?;
        if account.is_blocked {
            return Err(LedgerError::Blocked { account_id }.into());
        }
        let deposit = Deposit::new(account_id, amount, method, self.clock.now_utc());
        self.store.insert_deposit(deposit.clone()).await?;
        Ok(deposit)
    }

    /// Confirme un dépôt : crédite le solde principal et lève le verrou de
    /// retrait, une seule fois et irréversiblement
    pub async fn confirm_deposit(&self, deposit_id: Uuid) -> Result<()> {
        let Some(mut deposit) = self.store.fetch_deposit(deposit_id).await? else {
            return Err(LedgerError::not_found("dépôt", deposit_id).into());
        };
        if deposit.status != FundingStatus::Pending {
            return Err(LedgerError::InvalidTransition {
                message: format!("dépôt {deposit_id} déjà décidé"),
            }
            .into());
        }

        let amount = deposit.amount;
        update_account(self.store.as_ref(), deposit.account_id, |account| {
            account.credit_main(amount);
            account.first_deposit_confirmed = true;
            Ok(())
        })
        .await?;

        deposit.status = FundingStatus::Confirmed;
        deposit.decided_at = Some(self.clock.now_utc());
        self.store.save_deposit(deposit).await?;
        info!(deposit = %deposit_id, amount = %amount, "dépôt confirmé");
        Ok(())
    }

    /// Rejette un dépôt en attente ; aucun mouvement d'argent
    pub async fn reject_deposit(&self, deposit_id: Uuid) -> Result<()> {
        let Some(mut deposit) = self.store.fetch_deposit(deposit_id).await? else {
            return Err(LedgerError::not_found("dépôt", deposit_id).into());
        };
        if deposit.status != FundingStatus::Pending {
            return Err(LedgerError::InvalidTransition {
                message: format!("dépôt {deposit_id} déjà décidé"),
            }
            .into());
        }
        deposit.status = FundingStatus::Rejected;
        deposit.decided_at = Some(self.clock.now_utc());
        self.store.save_deposit(deposit).await?;
        Ok(())
    }

    // --- retraits ---

    /// Dépose une demande de retrait : bornes et frais depuis la
    /// configuration, débit immédiat principal puis bonus
    pub async fn request_withdrawal(
        &self,
        account_id: Uuid,
        amount: Amount,
        method: &str,
    ) -> Result<Withdrawal> {
        let minimum = self.config.amount(keys::WITHDRAWAL_MINIMUM)?;
        let maximum = self.config.amount(keys::WITHDRAWAL_MAXIMUM)?;
        let tiers = self.config.withdrawal_fee_tiers()?;
        let now = self.clock.now_utc();
        let method = method.to_string();

        let withdrawal = update_account(self.store.as_ref(), account_id, |account| {
            if account.is_blocked {
                return Err(LedgerError::Blocked { account_id }.into());
            }
            if !account.first_deposit_confirmed {
                return Err(LedgerError::FirstDepositNotMade.into());
            }
            if amount < minimum {
                return Err(LedgerError::BelowMinimum {
                    minimum,
                    requested: amount,
                }
                .into());
            }
            if amount > maximum {
                return Err(LedgerError::AboveMaximum {
                    maximum,
                    requested: amount,
                }
                .into());
            }
            let available = account.main_balance.saturating_add(account.bonus_balance);
            if amount > available {
                return Err(LedgerError::InsufficientFunds {
                    available,
                    required: amount,
                }
                .into());
            }

            let from_main = account.main_balance.min(amount);
            let from_bonus = amount
                .checked_sub(from_main)
                .unwrap_or(Amount::ZERO);
            account.debit_main(from_main)?;
            account.debit_bonus(from_bonus)?;

            Ok(Withdrawal {
                id: Uuid::new_v4(),
                account_id,
                amount,
                fee: withdrawal_fee(&tiers, amount),
                method: method.clone(),
                status: FundingStatus::Pending,
                drawn_from_main: from_main,
                drawn_from_bonus: from_bonus,
                requested_at: now,
                decided_at: None,
            })
        })
        .await?;

        self.store.insert_withdrawal(withdrawal.clone()).await?;
        info!(
            withdrawal = %withdrawal.id,
            amount = %withdrawal.amount,
            fee = %withdrawal.fee,
            "retrait demandé"
        );
        Ok(withdrawal)
    }

    /// Confirme un retrait : les fonds étaient déjà débités à la demande
    pub async fn confirm_withdrawal(&self, withdrawal_id: Uuid) -> Result<()> {
        let Some(mut withdrawal) = self.store.fetch_withdrawal(withdrawal_id).await? else {
            return Err(LedgerError::not_found("retrait", withdrawal_id).into());
        };
        if withdrawal.status != FundingStatus::Pending {
            return Err(LedgerError::InvalidTransition {
                message: format!("retrait {withdrawal_id} déjà décidé"),
            }
            .into());
        }
        withdrawal.status = FundingStatus::Confirmed;
        withdrawal.decided_at = Some(self.clock.now_utc());
        self.store.save_withdrawal(withdrawal).await?;
        Ok(())
    }

    /// Rejette un retrait : restitue l'intégralité du montant demandé sur
    /// le solde principal, quelle que soit la répartition d'origine
    pub async fn reject_withdrawal(&self, withdrawal_id: Uuid) -> Result<()> {
        let Some(mut withdrawal) = self.store.fetch_withdrawal(withdrawal_id).await? else {
            return Err(LedgerError::not_found("retrait", withdrawal_id).into());
        };
        if withdrawal.status != FundingStatus::Pending {
            return Err(LedgerError::InvalidTransition {
                message: format!("retrait {withdrawal_id} déjà décidé"),
            }
            .into());
        }

        let amount = withdrawal.amount;
        update_account(self.store.as_ref(), withdrawal.account_id, |account| {
            account.credit_main(amount);
            Ok(())
        })
        .await?;

        withdrawal.status = FundingStatus::Rejected;
        withdrawal.decided_at = Some(self.clock.now_utc());
        self.store.save_withdrawal(withdrawal).await?;
        info!(withdrawal = %withdrawal_id, amount = %amount, "retrait rejeté et remboursé");
        Ok(())
    }

    // --- administration ---

    /// Ajustement manuel d'un solde ; un débit est vérifié et ne peut pas
    /// rendre le solde négatif
    pub async fn adjust_balance(
        &self,
        account_id: Uuid,
        target: BalanceTarget,
        kind: AdjustmentKind,
        amount: Amount,
    ) -> Result<()> {
        update_account(self.store.as_ref(), account_id, |account| {
            match (target, kind) {
                (BalanceTarget::Main, AdjustmentKind::Credit) => account.credit_main(amount),
                (BalanceTarget::Main, AdjustmentKind::Debit) => account.debit_main(amount)?,
                (BalanceTarget::Bonus, AdjustmentKind::Credit) => account.credit_bonus(amount),
                (BalanceTarget::Bonus, AdjustmentKind::Debit) => account.debit_bonus(amount)?,
            }
            Ok(())
        })
        .await?;
        info!(account = %account_id, amount = %amount, ?target, ?kind, "solde ajusté");
        Ok(())
    }

    /// Suspend ou rétablit un compte ; aucune donnée n'est supprimée
    pub async fn set_blocked(&self, account_id: Uuid, blocked: bool) -> Result<()> {
        update_account(self.store.as_ref(), account_id, |account| {
            account.is_blocked = blocked;
            Ok(())
        })
        .await
    }

    /// Crée ou modifie un plan du catalogue
    ///
    /// Une incohérence `claim_value * claims_per_day != daily_profit_amount`
    /// est signalée mais n'empêche pas l'écriture (attente documentée côté
    /// admin, pas une contrainte dure).
    pub async fn upsert_plan(&self, plan: Plan) -> Result<()> {
        if !plan.is_profit_consistent() {
            warn!(
                plan = %plan.name,
                claim_value = %plan.claim_value,
                claims_per_day = plan.claims_per_day,
                daily = %plan.daily_profit_amount,
                "profit journalier incohérent avec la valeur de réclamation"
            );
        }
        self.store.upsert_plan(plan).await
    }

    /// Retire un plan de l'offre sans toucher aux investissements en cours
    pub async fn deactivate_plan(&self, plan_id: Uuid) -> Result<()> {
        let Some(mut plan) = self.store.fetch_plan(plan_id).await? else {
            return Err(LedgerError::not_found("plan", plan_id).into());
        };
        plan.is_active = false;
        plan.updated_at = self.clock.now_utc();
        self.store.upsert_plan(plan).await
    }

    /// Écrit une clé de configuration et invalide le cache
    pub async fn update_setting(&self, key: &str, value: Value) -> Result<()> {
        self.config.set(key, value).await
    }

    /// Vue d'audit : lignes du journal de commissions pour un jour métier
    pub async fn commission_report(
        &self,
        day: chrono::NaiveDate,
    ) -> Result<Vec<crate::referral::DailyClaimCommissionLog>> {
        self.store.commission_logs_for_day(day).await
    }

    /// Vue d'audit : plans du catalogue
    pub async fn list_plans(&self) -> Result<Vec<Plan>> {
        self.store.list_plans().await
    }
}
