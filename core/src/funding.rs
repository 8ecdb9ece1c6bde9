//! Dépôts et retraits à validation manuelle
//!
//! Aucune passerelle de paiement : un opérateur humain confirme ou rejette
//! chaque mouvement. Le registre ne fait que réserver les fonds côté retrait
//! et créditer côté dépôt confirmé.

use crate::money::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Statut d'un mouvement de fonds à validation manuelle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FundingStatus {
    /// En attente de décision opérateur
    Pending,
    /// Confirmé par l'opérateur
    Confirmed,
    /// Rejeté par l'opérateur
    Rejected,
}

/// Demande de dépôt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Deposit {
    /// Identifiant unique
    pub id: Uuid,
    /// Compte déposant
    pub account_id: Uuid,
    /// Montant annoncé
    pub amount: Amount,
    /// Méthode de paiement déclarée (libellé admin)
    pub method: String,
    /// Statut courant
    pub status: FundingStatus,
    /// Date de la demande
    pub requested_at: DateTime<Utc>,
    /// Date de la décision opérateur
    pub decided_at: Option<DateTime<Utc>>,
}

impl Deposit {
    /// Crée une demande en attente
    pub fn new(account_id: Uuid, amount: Amount, method: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            account_id,
            amount,
            method: method.into(),
            status: FundingStatus::Pending,
            requested_at: now,
            decided_at: None,
        }
    }
}

/// Demande de retrait
///
/// Les fonds sont débités à la demande (principal d'abord, bonus ensuite)
/// et restitués intégralement sur le solde principal en cas de rejet ; la
/// répartition d'origine est conservée à titre d'audit uniquement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdrawal {
    /// Identifiant unique
    pub id: Uuid,
    /// Compte retirant
    pub account_id: Uuid,
    /// Montant demandé (débité intégralement à la demande)
    pub amount: Amount,
    /// Frais calculés selon les paliers de configuration
    pub fee: Amount,
    /// Méthode de versement déclarée
    pub method: String,
    /// Statut courant
    pub status: FundingStatus,
    /// Part débitée du solde principal
    pub drawn_from_main: Amount,
    /// Part débitée du solde bonus
    pub drawn_from_bonus: Amount,
    /// Date de la demande
    pub requested_at: DateTime<Utc>,
    /// Date de la décision opérateur
    pub decided_at: Option<DateTime<Utc>>,
}

impl Withdrawal {
    /// Montant net à verser une fois les frais déduits
    pub fn net_payout(&self) -> Amount {
        self.amount.checked_sub(self.fee).unwrap_or(Amount::ZERO)
    }
}

/// Palier de frais de retrait
///
/// Le premier palier dont `up_to` couvre le montant demandé s'applique ;
/// `up_to = None` marque le palier final non borné.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeTier {
    /// Borne supérieure incluse du palier
    pub up_to: Option<Amount>,
    /// Pourcentage de frais appliqué
    pub percent: f64,
}

/// Calcule les frais de retrait pour un montant donné
///
/// Sans palier applicable (liste vide ou aucun palier couvrant), les frais
/// sont nuls.
pub fn withdrawal_fee(tiers: &[FeeTier], amount: Amount) -> Amount {
    for tier in tiers {
        let applies = match tier.up_to {
            Some(bound) => amount <= bound,
            None => true,
        };
        if applies {
            return amount.percentage(tier.percent);
        }
    }
    Amount::ZERO
}
