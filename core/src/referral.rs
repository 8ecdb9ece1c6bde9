//! Registre de parrainage et commissions
//!
//! Deux déclencheurs distincts :
//! - commission d'inscription, versée une seule fois à la première
//!   activation de plan du filleul (machine à états Pending → CommissionPaid) ;
//! - commission quotidienne, proportionnelle au total réclamé la veille par
//!   le filleul, garantie au-plus-une-fois par un journal unique
//!   (enregistrement, jour).

use crate::account::Account;
use crate::money::Amount;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// État d'un enregistrement de parrainage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferralStatus {
    /// Commission d'inscription pas encore versée
    Pending,
    /// Commission d'inscription versée
    CommissionPaid,
    /// Parrainage clos sans versement
    Expired,
}

/// Relation parrain → filleul et son état de commission
///
/// Un filleul ne peut être parrainé qu'une fois : `referred_id` est unique
/// dans le store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferralRecord {
    /// Identifiant unique
    pub id: Uuid,
    /// Compte parrain
    pub referrer_id: Uuid,
    /// Compte filleul, unique sur l'ensemble des enregistrements
    pub referred_id: Uuid,
    /// État de la commission d'inscription
    pub status: ReferralStatus,
    /// Commission d'inscription effectivement versée
    pub commission_on_registration: Amount,
    /// Date du versement de la commission d'inscription
    pub registration_commission_paid_at: Option<DateTime<Utc>>,
    /// Premier plan activé par le filleul
    pub first_plan_activated_by_referred: Option<Uuid>,
    /// Date de cette première activation
    pub first_plan_activation_date: Option<DateTime<Utc>>,
    /// Filigrane du dernier versement de commission quotidienne
    pub daily_claim_commission_last_paid_at: Option<DateTime<Utc>>,
    /// Date de création
    pub created_at: DateTime<Utc>,
}

impl ReferralRecord {
    /// Crée un enregistrement en attente
    pub fn new(referrer_id: Uuid, referred_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            referrer_id,
            referred_id,
            status: ReferralStatus::Pending,
            commission_on_registration: Amount::ZERO,
            registration_commission_paid_at: None,
            first_plan_activated_by_referred: None,
            first_plan_activation_date: None,
            daily_claim_commission_last_paid_at: None,
            created_at: now,
        }
    }

    /// Tamponne la première activation du filleul si elle ne l'est pas déjà
    ///
    /// Le tampon est posé même si la commission d'inscription est désactivée
    /// dans la configuration : l'éligibilité à la commission quotidienne ne
    /// dépend que de ce tampon.
    pub fn stamp_first_activation(&mut self, plan_id: Uuid, at: DateTime<Utc>) {
        if self.first_plan_activation_date.is_none() {
            self.first_plan_activated_by_referred = Some(plan_id);
            self.first_plan_activation_date = Some(at);
        }
    }

    /// Marque la commission d'inscription versée (transition unique
    /// Pending → CommissionPaid)
    pub fn mark_registration_paid(&mut self, commission: Amount, at: DateTime<Utc>) {
        self.status = ReferralStatus::CommissionPaid;
        self.commission_on_registration = commission;
        self.registration_commission_paid_at = Some(at);
    }
}

/// Ligne du journal des commissions quotidiennes
///
/// Unicité sur (enregistrement de parrainage, jour) : c'est la garde
/// d'idempotence du lot quotidien.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyClaimCommissionLog {
    /// Identifiant unique
    pub id: Uuid,
    /// Enregistrement de parrainage concerné
    pub referral_record_id: Uuid,
    /// Jour métier couvert (granularité jour, normalisé à minuit)
    pub day: NaiveDate,
    /// Total réclamé par le filleul sur ce jour
    pub total_claims_amount: Amount,
    /// Pourcentage de commission appliqué
    pub commission_percent: f64,
    /// Commission versée au parrain
    pub commission_earned: Amount,
    /// Date du versement
    pub paid_at: DateTime<Utc>,
}

/// Décision de commission quotidienne pour un couple (parrainage, jour)
#[derive(Debug, Clone, PartialEq)]
pub enum DailyCommissionDecision {
    /// Le filleul n'a aucun investissement encore valide sur la fenêtre
    NotEligible,
    /// Aucune réclamation sur la fenêtre : rien à verser, pas de ligne de journal
    NothingClaimed,
    /// Commission à verser
    Payable {
        /// Total réclamé par le filleul sur la fenêtre
        total_claimed: Amount,
        /// Commission calculée, arrondie au centime
        commission: Amount,
    },
}

/// Évalue la commission quotidienne d'un enregistrement sur la fenêtre
/// `[window_start, window_end)`
///
/// Logique pure, sans effet de bord : l'appelant (le lot planifié) applique
/// ensuite la garde d'unicité du journal et le crédit du parrain.
pub fn evaluate_daily_commission(
    record: &ReferralRecord,
    referred: &Account,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    commission_percent: f64,
) -> DailyCommissionDecision {
    if record.first_plan_activation_date.is_none() {
        return DailyCommissionDecision::NotEligible;
    }
    if !referred.holds_investment_valid_after(window_start) {
        return DailyCommissionDecision::NotEligible;
    }

    let total = referred.claimed_between(window_start, window_end);
    if total.is_zero() {
        return DailyCommissionDecision::NothingClaimed;
    }

    DailyCommissionDecision::Payable {
        total_claimed: total,
        commission: total.percentage(commission_percent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{ClaimRecord, Investment};
    use crate::catalog::{Plan, PlanDuration};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 0, 0, 0).unwrap()
    }

    fn referred_with_claims(total_cents: u64, expires_at: Option<DateTime<Utc>>) -> Account {
        let plan = Plan::new(
            "Starter",
            Amount::from_major(500),
            4.18,
            Amount::from_cents(10450),
            Amount::from_cents(2090),
            5,
            PlanDuration::Days(30),
            t0(),
        );
        let mut account = Account::new("b@x.y", "CODE0002", Some(Uuid::new_v4()), Amount::ZERO, t0());
        let inv = Investment::snapshot(&plan, t0(), expires_at);
        if total_cents > 0 {
            account.claim_history.push(ClaimRecord {
                plan_id: plan.id,
                investment_id: inv.id,
                claim_number: 1,
                amount: Amount::from_cents(total_cents),
                currency: "USD".into(),
                claimed_at: t0() + Duration::hours(10),
            });
        }
        account.active_investments.push(inv);
        account.total_plans_activated = 1;
        account
    }

    fn stamped_record() -> ReferralRecord {
        let mut record = ReferralRecord::new(Uuid::new_v4(), Uuid::new_v4(), t0());
        record.stamp_first_activation(Uuid::new_v4(), t0());
        record
    }

    #[test]
    fn test_payable_commission() {
        let referred = referred_with_claims(10_000, None);
        let decision = evaluate_daily_commission(
            &stamped_record(),
            &referred,
            t0(),
            t0() + Duration::days(1),
            20.0,
        );
        assert_eq!(
            decision,
            DailyCommissionDecision::Payable {
                total_claimed: Amount::from_major(100),
                commission: Amount::from_major(20),
            }
        );
    }

    #[test]
    fn test_nothing_claimed() {
        let referred = referred_with_claims(0, None);
        let decision = evaluate_daily_commission(
            &stamped_record(),
            &referred,
            t0(),
            t0() + Duration::days(1),
            20.0,
        );
        assert_eq!(decision, DailyCommissionDecision::NothingClaimed);
    }

    #[test]
    fn test_not_eligible_without_first_activation() {
        let referred = referred_with_claims(10_000, None);
        let record = ReferralRecord::new(Uuid::new_v4(), Uuid::new_v4(), t0());
        let decision =
            evaluate_daily_commission(&record, &referred, t0(), t0() + Duration::days(1), 20.0);
        assert_eq!(decision, DailyCommissionDecision::NotEligible);
    }

    #[test]
    fn test_not_eligible_when_all_investments_expired_before_window() {
        // expiré avant le début de la fenêtre -> inéligible
        let referred = referred_with_claims(10_000, Some(t0() - Duration::days(1)));
        let decision = evaluate_daily_commission(
            &stamped_record(),
            &referred,
            t0(),
            t0() + Duration::days(1),
            20.0,
        );
        assert_eq!(decision, DailyCommissionDecision::NotEligible);
    }

    #[test]
    fn test_stamp_first_activation_is_idempotent() {
        let mut record = ReferralRecord::new(Uuid::new_v4(), Uuid::new_v4(), t0());
        let first_plan = Uuid::new_v4();
        record.stamp_first_activation(first_plan, t0());
        record.stamp_first_activation(Uuid::new_v4(), t0() + Duration::days(1));

        assert_eq!(record.first_plan_activated_by_referred, Some(first_plan));
        assert_eq!(record.first_plan_activation_date, Some(t0()));
    }
}
