//! Catalogue des plans d'investissement
//!
//! Les plans sont des modèles gérés par l'administration : coût, profit
//! journalier, valeur et nombre de réclamations, durée. L'activation d'un
//! plan copie un instantané de ces valeurs dans le compte : une édition
//! ultérieure du catalogue ne modifie jamais un investissement en cours.

use crate::money::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Durée d'un plan d'investissement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlanDuration {
    /// Durée exprimée en jours
    Days(u32),
    /// Durée exprimée en semaines
    Weeks(u32),
    /// Plan sans expiration
    Lifelong,
}

impl PlanDuration {
    /// Durée en jours, `None` pour un plan sans expiration
    pub fn as_days(&self) -> Option<i64> {
        match self {
            PlanDuration::Days(d) => Some(i64::from(*d)),
            PlanDuration::Weeks(w) => Some(i64::from(*w) * 7),
            PlanDuration::Lifelong => None,
        }
    }
}

/// Modèle de plan d'investissement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    /// Identifiant unique
    pub id: Uuid,
    /// Nom unique du plan
    pub name: String,
    /// Catégorie optionnelle (affichage uniquement)
    pub category: Option<String>,
    /// Montant d'investissement, unique dans le catalogue
    pub investment_amount: Amount,
    /// Taux de profit journalier (%)
    pub daily_profit_rate: f64,
    /// Profit journalier total attendu
    pub daily_profit_amount: Amount,
    /// Montant crédité par réclamation individuelle
    pub claim_value: Amount,
    /// Nombre de réclamations autorisées par jour
    pub claims_per_day: u32,
    /// Durée du plan
    pub duration: PlanDuration,
    /// Le plan est-il activable
    pub is_active: bool,
    /// Date de création
    pub created_at: DateTime<Utc>,
    /// Dernière modification
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    /// Crée un nouveau plan actif
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        investment_amount: Amount,
        daily_profit_rate: f64,
        daily_profit_amount: Amount,
        claim_value: Amount,
        claims_per_day: u32,
        duration: PlanDuration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            category: None,
            investment_amount,
            daily_profit_rate,
            daily_profit_amount,
            claim_value,
            claims_per_day,
            duration,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Vérifie la cohérence attendue `claim_value * claims_per_day ==
    /// daily_profit_amount`
    ///
    /// Attente documentée côté administration, pas une contrainte dure :
    /// un plan incohérent reste activable mais est signalé.
    pub fn is_profit_consistent(&self) -> bool {
        let expected = self
            .claim_value
            .cents()
            .saturating_mul(u64::from(self.claims_per_day));
        expected == self.daily_profit_amount.cents()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(claim_value: Amount, claims_per_day: u32, daily: Amount) -> Plan {
        Plan::new(
            "Starter",
            Amount::from_major(500),
            4.18,
            daily,
            claim_value,
            claims_per_day,
            PlanDuration::Days(1),
            Utc::now(),
        )
    }

    #[test]
    fn test_duration_as_days() {
        assert_eq!(PlanDuration::Days(10).as_days(), Some(10));
        assert_eq!(PlanDuration::Weeks(2).as_days(), Some(14));
        assert_eq!(PlanDuration::Lifelong.as_days(), None);
    }

    #[test]
    fn test_profit_consistency() {
        // 5 x 20.90 = 104.50
        let ok = plan(Amount::from_cents(2090), 5, Amount::from_cents(10450));
        assert!(ok.is_profit_consistent());

        let bad = plan(Amount::from_cents(2090), 5, Amount::from_major(100));
        assert!(!bad.is_profit_consistent());
    }
}
