//! Agrégat de compte utilisateur : soldes, investissements actifs et
//! historique de réclamations
//!
//! Le compte est le document atomique du registre : toutes les mutations
//! monétaires (activation, réclamation, dépôt, retrait, ajustement admin,
//! versement de commission) passent par une écriture conditionnelle sur ce
//! document (voir `store::update_account`).

use crate::catalog::Plan;
use crate::error::LedgerError;
use crate::money::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Compte utilisateur de la plateforme
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Identifiant unique
    pub id: Uuid,
    /// Email, unique et normalisé en minuscules
    pub email: String,
    /// Code de parrainage unique de ce compte
    pub referral_code: String,
    /// Compte parrain, fixé à la création et jamais modifié
    pub referred_by: Option<Uuid>,
    /// Solde principal
    pub main_balance: Amount,
    /// Solde bonus (prime d'inscription, ajustements admin)
    pub bonus_balance: Amount,
    /// Commissions de parrainage cumulées
    pub commission_earned: Amount,
    /// Investissements en cours (valeurs embarquées, instantanés du plan)
    pub active_investments: Vec<Investment>,
    /// Historique de réclamations, en append seul
    pub claim_history: Vec<ClaimRecord>,
    /// Nombre total de plans activés depuis la création du compte
    ///
    /// Survit à la purge des investissements expirés, contrairement à la
    /// longueur de `active_investments` : c'est le détecteur fiable de
    /// "première activation" pour la commission d'inscription.
    pub total_plans_activated: u64,
    /// Verrou de retrait : passe à vrai, une seule fois, à la confirmation
    /// du premier dépôt
    pub first_deposit_confirmed: bool,
    /// Compte suspendu (bloque les opérations, ne supprime rien)
    pub is_blocked: bool,
    /// Date de création
    pub created_at: DateTime<Utc>,
}

/// Investissement en cours, instantané d'un plan au moment de l'activation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Investment {
    /// Identifiant de cette instance
    pub id: Uuid,
    /// Plan d'origine
    pub plan_id: Uuid,
    /// Nom du plan au moment de l'activation
    pub plan_name: String,
    /// Montant investi
    pub invested_amount: Amount,
    /// Taux de profit journalier (%) au moment de l'activation
    pub daily_profit_rate: f64,
    /// Profit journalier total au moment de l'activation
    pub daily_profit_amount: Amount,
    /// Montant crédité par réclamation
    pub claim_value: Amount,
    /// Quota de réclamations par jour
    pub claims_per_day: u32,
    /// Réclamations effectuées sur le jour métier courant
    pub claims_made_today: u32,
    /// Dernière réclamation
    pub last_claim_at: Option<DateTime<Utc>>,
    /// Date d'activation
    pub activated_at: DateTime<Utc>,
    /// Expiration (fin de journée métier), `None` pour un plan sans durée
    pub expires_at: Option<DateTime<Utc>>,
}

impl Investment {
    /// Construit l'instantané d'un plan activé maintenant
    pub fn snapshot(plan: &Plan, now: DateTime<Utc>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            plan_id: plan.id,
            plan_name: plan.name.clone(),
            invested_amount: plan.investment_amount,
            daily_profit_rate: plan.daily_profit_rate,
            daily_profit_amount: plan.daily_profit_amount,
            claim_value: plan.claim_value,
            claims_per_day: plan.claims_per_day,
            claims_made_today: 0,
            last_claim_at: None,
            activated_at: now,
            expires_at,
        }
    }

    /// Vrai si l'investissement est expiré à l'instant donné
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expiry) => expiry < now,
            None => false,
        }
    }
}

/// Réclamation enregistrée, trace résiduelle même après purge de
/// l'investissement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRecord {
    /// Plan d'origine (instantané)
    pub plan_id: Uuid,
    /// Instance d'investissement concernée
    pub investment_id: Uuid,
    /// Rang de la réclamation dans la journée (1..N)
    pub claim_number: u32,
    /// Montant crédité, toujours dans la devise du registre
    pub amount: Amount,
    /// Étiquette de devise choisie à l'affichage, purement cosmétique ;
    /// aucune conversion
    pub currency: String,
    /// Date de la réclamation
    pub claimed_at: DateTime<Utc>,
}

impl Account {
    /// Crée un compte neuf
    pub fn new(
        email: impl Into<String>,
        referral_code: impl Into<String>,
        referred_by: Option<Uuid>,
        signup_bonus: Amount,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into().to_lowercase(),
            referral_code: referral_code.into(),
            referred_by,
            main_balance: Amount::ZERO,
            bonus_balance: signup_bonus,
            commission_earned: Amount::ZERO,
            active_investments: Vec::new(),
            claim_history: Vec::new(),
            total_plans_activated: 0,
            first_deposit_confirmed: false,
            is_blocked: false,
            created_at: now,
        }
    }

    /// Recherche un investissement actif par identifiant
    pub fn investment(&self, investment_id: Uuid) -> Option<&Investment> {
        self.active_investments
            .iter()
            .find(|i| i.id == investment_id)
    }

    /// Recherche mutable d'un investissement actif
    pub fn investment_mut(&mut self, investment_id: Uuid) -> Option<&mut Investment> {
        self.active_investments
            .iter_mut()
            .find(|i| i.id == investment_id)
    }

    /// Vrai si le compte détient déjà une instance non expirée de ce plan
    pub fn holds_unexpired_plan(&self, plan_id: Uuid, now: DateTime<Utc>) -> bool {
        self.active_investments
            .iter()
            .any(|i| i.plan_id == plan_id && !i.is_expired(now))
    }

    /// Vrai si le compte détient au moins un investissement encore valide
    /// après l'instant donné
    pub fn holds_investment_valid_after(&self, at: DateTime<Utc>) -> bool {
        self.active_investments
            .iter()
            .any(|i| i.expires_at.map_or(true, |e| e > at))
    }

    /// Crédite le solde principal
    pub fn credit_main(&mut self, amount: Amount) {
        self.main_balance = self.main_balance.saturating_add(amount);
    }

    /// Débite le solde principal, échoue avant toute mutation si le solde
    /// est insuffisant
    pub fn debit_main(&mut self, amount: Amount) -> Result<(), LedgerError> {
        match self.main_balance.checked_sub(amount) {
            Some(rest) => {
                self.main_balance = rest;
                Ok(())
            }
            None => Err(LedgerError::InsufficientFunds {
                available: self.main_balance,
                required: amount,
            }),
        }
    }

    /// Crédite le solde bonus
    pub fn credit_bonus(&mut self, amount: Amount) {
        self.bonus_balance = self.bonus_balance.saturating_add(amount);
    }

    /// Débite le solde bonus, avec la même garantie de non-négativité
    pub fn debit_bonus(&mut self, amount: Amount) -> Result<(), LedgerError> {
        match self.bonus_balance.checked_sub(amount) {
            Some(rest) => {
                self.bonus_balance = rest;
                Ok(())
            }
            None => Err(LedgerError::InsufficientFunds {
                available: self.bonus_balance,
                required: amount,
            }),
        }
    }

    /// Somme des réclamations dont la date tombe dans `[start, end)`
    pub fn claimed_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Amount {
        self.claim_history
            .iter()
            .filter(|c| c.claimed_at >= start && c.claimed_at < end)
            .map(|c| c.amount)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PlanDuration;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 10, 0, 0).unwrap()
    }

    fn sample_plan() -> Plan {
        Plan::new(
            "Starter",
            Amount::from_major(500),
            4.18,
            Amount::from_cents(10450),
            Amount::from_cents(2090),
            5,
            PlanDuration::Days(1),
            now(),
        )
    }

    #[test]
    fn test_debit_fails_before_mutating() {
        let mut account = Account::new("User@Example.com", "ABCD1234", None, Amount::ZERO, now());
        account.credit_main(Amount::from_major(100));

        let err = account.debit_main(Amount::from_major(150)).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientFunds {
                available: Amount::from_major(100),
                required: Amount::from_major(150),
            }
        );
        // le solde n'a pas bougé
        assert_eq!(account.main_balance, Amount::from_major(100));
    }

    #[test]
    fn test_email_normalized_lowercase() {
        let account = Account::new("User@Example.com", "ABCD1234", None, Amount::ZERO, now());
        assert_eq!(account.email, "user@example.com");
    }

    #[test]
    fn test_investment_expiry() {
        let plan = sample_plan();
        let expiry = now() + Duration::days(1);
        let inv = Investment::snapshot(&plan, now(), Some(expiry));

        assert!(!inv.is_expired(now()));
        assert!(!inv.is_expired(expiry)); // expire strictement après l'échéance
        assert!(inv.is_expired(expiry + Duration::milliseconds(1)));

        let lifelong = Investment::snapshot(&plan, now(), None);
        assert!(!lifelong.is_expired(now() + Duration::days(10_000)));
    }

    #[test]
    fn test_holds_unexpired_plan() {
        let plan = sample_plan();
        let mut account = Account::new("a@b.c", "CODE0001", None, Amount::ZERO, now());
        account.active_investments.push(Investment::snapshot(
            &plan,
            now(),
            Some(now() + Duration::days(1)),
        ));

        assert!(account.holds_unexpired_plan(plan.id, now()));
        assert!(!account.holds_unexpired_plan(plan.id, now() + Duration::days(2)));
        assert!(!account.holds_unexpired_plan(Uuid::new_v4(), now()));
    }

    #[test]
    fn test_claimed_between_window() {
        let plan = sample_plan();
        let mut account = Account::new("a@b.c", "CODE0001", None, Amount::ZERO, now());
        let inv = Investment::snapshot(&plan, now(), None);

        for (i, offset) in [0i64, 1, 30].into_iter().enumerate() {
            account.claim_history.push(ClaimRecord {
                plan_id: plan.id,
                investment_id: inv.id,
                claim_number: (i + 1) as u32,
                amount: Amount::from_cents(2090),
                currency: "USD".into(),
                claimed_at: now() + Duration::hours(offset),
            });
        }

        // fenêtre couvrant les deux premières réclamations seulement
        let total = account.claimed_between(now(), now() + Duration::hours(2));
        assert_eq!(total, Amount::from_cents(4180));
    }
}
