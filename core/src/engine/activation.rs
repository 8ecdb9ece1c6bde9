//! Activation de plan : de l'entrée du catalogue à l'investissement en cours
//!
//! L'activation débite le compte (sauf octroi administratif), calcule
//! l'expiration arrondie à la fin de journée métier, pose l'instantané du
//! plan dans le compte, et déclenche l'évaluation de la commission
//! d'inscription du parrain.

use crate::account::Investment;
use crate::catalog::Plan;
use crate::clock::Clock;
use crate::error::{LedgerError, Result};
use crate::settings::{keys, ConfigCache};
use crate::store::{update_account, LedgerStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Source de financement d'une activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FundingSource {
    /// Débit du solde principal du compte
    Balance,
    /// Octroi administratif, sans débit
    AdminGrant,
}

/// Moteur d'activation de plans
pub struct ActivationEngine {
    store: Arc<dyn LedgerStore>,
    config: Arc<ConfigCache>,
    clock: Arc<dyn Clock>,
}

impl ActivationEngine {
    /// Construit le moteur sur un store, une configuration et une horloge
    pub fn new(store: Arc<dyn LedgerStore>, config: Arc<ConfigCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// Active un plan du catalogue sur un compte
    ///
    /// Préconditions : compte non bloqué, plan actif, aucune instance non
    /// expirée du même plan déjà détenue. En financement par solde, le
    /// compte doit couvrir le montant d'investissement.
    pub async fn activate(
        &self,
        account_id: Uuid,
        plan_id: Uuid,
        funding: FundingSource,
    ) -> Result<Investment> {
        let Some(plan) = self.store.fetch_plan(plan_id).await? else {
            return Err(LedgerError::not_found("plan", plan_id).into());
        };
        if !plan.is_active {
            return Err(LedgerError::Inactive {
                entity: format!("plan {}", plan.name),
            }
            .into());
        }

        let now = self.clock.now_utc();
        let calendar = self.config.calendar()?;
        let expires_at = plan
            .duration
            .as_days()
            .map(|days| calendar.end_of_day_after(now, days));

        let (investment, is_first_ever, referred_by) =
            update_account(self.store.as_ref(), account_id, |account| {
                if account.is_blocked {
                    return Err(LedgerError::Blocked {
                        account_id: account.id,
                    }
                    .into());
                }
                if account.holds_unexpired_plan(plan.id, now) {
                    return Err(LedgerError::AlreadyActive.into());
                }
                if funding == FundingSource::Balance {
                    account.debit_main(plan.investment_amount)?;
                }
                let investment = Investment::snapshot(&plan, now, expires_at);
                account.active_investments.push(investment.clone());
                account.total_plans_activated += 1;
                Ok((
                    investment,
                    account.total_plans_activated == 1,
                    account.referred_by,
                ))
            })
            .await?;

        info!(
            account = %account_id,
            plan = %plan.name,
            amount = %plan.investment_amount,
            expires_at = ?expires_at,
            "plan activé"
        );

        // Commission d'inscription : effet de bord "fire and forget". Un
        // échec ici laisse l'activation commise et l'enregistrement de
        // parrainage en attente, rattrapé par l'audit admin.
        if is_first_ever && referred_by.is_some() {
            if let Err(e) = self.settle_registration_commission(account_id, &plan, now).await {
                warn!(
                    referred = %account_id,
                    error = %e,
                    "commission d'inscription non versée, enregistrement laissé en attente"
                );
            }
        }

        Ok(investment)
    }

    /// Évalue et verse la commission d'inscription du parrain après la
    /// toute première activation du filleul
    async fn settle_registration_commission(
        &self,
        referred_id: Uuid,
        plan: &Plan,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let Some(mut record) = self.store.fetch_referral_by_referred(referred_id).await? else {
            return Ok(());
        };
        if record.status != crate::referral::ReferralStatus::Pending {
            return Ok(());
        }

        record.stamp_first_activation(plan.id, now);

        let enabled = self.config.flag(keys::REGISTRATION_COMMISSION_ENABLED)?;
        let percent = self.config.percent(keys::REGISTRATION_COMMISSION_PERCENT)?;
        let commission = plan.investment_amount.percentage(percent);

        if !enabled || commission.is_zero() {
            // tampon posé, commission non applicable : l'enregistrement
            // reste en attente
            self.store.save_referral(record).await?;
            return Ok(());
        }

        let referrer_id = record.referrer_id;
        let credited = match self.store.fetch_account(referrer_id).await? {
            None => {
                warn!(referrer = %referrer_id, "parrain introuvable, commission ignorée");
                false
            }
            Some(doc) if doc.value.is_blocked => {
                warn!(referrer = %referrer_id, "parrain bloqué, commission ignorée");
                false
            }
            Some(_) => {
                update_account(self.store.as_ref(), referrer_id, |referrer| {
                    referrer.credit_main(commission);
                    referrer.commission_earned = referrer.commission_earned.saturating_add(commission);
                    Ok(())
                })
                .await?;
                true
            }
        };

        if credited {
            record.mark_registration_paid(commission, now);
            info!(
                referrer = %referrer_id,
                referred = %referred_id,
                commission = %commission,
                "commission d'inscription versée"
            );
        }
        self.store.save_referral(record).await?;
        Ok(())
    }
}
