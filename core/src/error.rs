//! Types d'erreurs pour Rendement Core

use crate::money::Amount;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Type de résultat standard pour le module core
pub type Result<T> = std::result::Result<T, CoreError>;

/// Erreurs principales du module core
#[derive(Error, Debug)]
pub enum CoreError {
    /// Violation d'une règle métier du registre
    #[error("Règle métier violée: {0}")]
    Ledger(#[from] LedgerError),

    /// Défaillance de la couche de persistance
    #[error("Erreur de persistance: {0}")]
    Store(#[from] StoreError),

    /// Configuration absente ou mal typée
    #[error("Erreur de configuration: {message}")]
    Config { message: String },

    /// Invariant interne rompu
    #[error("Erreur interne: {message}")]
    Internal { message: String },
}

impl CoreError {
    /// Extrait l'erreur métier sous-jacente, le cas échéant
    pub fn as_ledger(&self) -> Option<&LedgerError> {
        match self {
            CoreError::Ledger(e) => Some(e),
            _ => None,
        }
    }
}

/// Violations de règles métier, toujours retournées typées à l'appelant
///
/// Les erreurs financières portent le manque ou la limite exacte
/// ("solde 120.00, requis 500.00") pour que l'appelant puisse se corriger
/// sans aller-retour supplémentaire.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    /// Entité introuvable
    #[error("{entity} non trouvé: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Entité désactivée par l'administration
    #[error("{entity} désactivé")]
    Inactive { entity: String },

    /// Solde insuffisant pour couvrir l'opération
    #[error("Solde insuffisant: disponible {available}, requis {required}")]
    InsufficientFunds { available: Amount, required: Amount },

    /// Le compte détient déjà une instance active de ce plan
    #[error("Une instance de ce plan est déjà active sur le compte")]
    AlreadyActive,

    /// Investissement expiré
    #[error("Investissement expiré depuis le {expired_at}")]
    Expired { expired_at: DateTime<Utc> },

    /// Quota de réclamations du jour épuisé
    #[error("Quota journalier atteint: {limit} réclamation(s) par jour")]
    QuotaExceeded { limit: u32 },

    /// Étiquette de devise hors de la liste autorisée
    #[error("Devise d'affichage non autorisée: {currency}")]
    InvalidCurrency { currency: String },

    /// Montant de retrait sous le minimum configuré
    #[error("Montant sous le minimum de retrait: minimum {minimum}, demandé {requested}")]
    BelowMinimum { minimum: Amount, requested: Amount },

    /// Montant de retrait au-dessus du maximum configuré
    #[error("Montant au-dessus du maximum de retrait: maximum {maximum}, demandé {requested}")]
    AboveMaximum { maximum: Amount, requested: Amount },

    /// Aucun premier dépôt confirmé sur le compte
    #[error("Retrait interdit avant confirmation du premier dépôt")]
    FirstDepositNotMade,

    /// Compte suspendu par l'administration
    #[error("Compte bloqué: {account_id}")]
    Blocked { account_id: Uuid },

    /// Le filleul possède déjà un enregistrement de parrainage
    #[error("Ce compte possède déjà un enregistrement de parrainage")]
    DuplicateReferral,

    /// Email déjà pris par un autre compte
    #[error("Adresse email déjà utilisée: {email}")]
    DuplicateEmail { email: String },

    /// Transition d'état de dépôt ou de retrait refusée
    #[error("Transition d'état invalide: {message}")]
    InvalidTransition { message: String },
}

impl LedgerError {
    /// Constructeur raccourci pour les entités manquantes
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

/// Erreurs de la couche de persistance
#[derive(Error, Debug)]
pub enum StoreError {
    /// Écriture conditionnelle toujours en conflit après relectures
    #[error("Conflit d'écriture persistant sur {entity} après {attempts} tentative(s)")]
    ConflictRetriesExhausted { entity: &'static str, attempts: u32 },

    /// Index unique violé
    #[error("Violation d'index unique: {index}")]
    UniqueViolation { index: String },

    /// Document illisible ou inécrivable
    #[error("Erreur de sérialisation: {0}")]
    Serialization(#[from] serde_json::Error),
}
