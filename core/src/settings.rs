//! Configuration de site et cache en mémoire
//!
//! La configuration est un dictionnaire plat clé → valeur JSON, chaque clé
//! étant modifiable indépendamment par l'administration. Les lecteurs
//! passent par un cache processus explicite (`ConfigCache`) : peuplé à
//! l'amorçage, invalidé à chaque écriture. Entre une écriture et son
//! invalidation, servir une valeur périmée est accepté.

use crate::clock::BusinessCalendar;
use crate::error::{CoreError, Result};
use crate::funding::FeeTier;
use crate::money::Amount;
use crate::store::LedgerStore;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Clés de configuration connues du moteur
pub mod keys {
    /// Prime créditée sur le solde bonus à l'inscription (centimes)
    pub const SIGNUP_BONUS: &str = "signup_bonus";
    /// Commission d'inscription activée
    pub const REGISTRATION_COMMISSION_ENABLED: &str = "registration_commission_enabled";
    /// Pourcentage de la commission d'inscription
    pub const REGISTRATION_COMMISSION_PERCENT: &str = "registration_commission_percent";
    /// Pourcentage de la commission quotidienne sur réclamations
    pub const CLAIM_COMMISSION_PERCENT: &str = "claim_commission_percent";
    /// Étiquettes de devise autorisées à la réclamation
    pub const ALLOWED_CLAIM_CURRENCIES: &str = "allowed_claim_currencies";
    /// Montant minimal de retrait (centimes)
    pub const WITHDRAWAL_MINIMUM: &str = "withdrawal_minimum";
    /// Montant maximal de retrait (centimes)
    pub const WITHDRAWAL_MAXIMUM: &str = "withdrawal_maximum";
    /// Paliers de frais de retrait
    pub const WITHDRAWAL_FEE_TIERS: &str = "withdrawal_fee_tiers";
    /// Décalage UTC du fuseau métier, en heures
    pub const BUSINESS_UTC_OFFSET_HOURS: &str = "business_utc_offset_hours";
    /// Durée de plan par défaut, en jours
    pub const DEFAULT_PLAN_DURATION_DAYS: &str = "default_plan_duration_days";
}

/// Valeurs par défaut, semées une seule fois à l'amorçage pour les clés
/// absentes du store
fn default_settings() -> Vec<(&'static str, Value)> {
    vec![
        (keys::SIGNUP_BONUS, json!(1000u64)),
        (keys::REGISTRATION_COMMISSION_ENABLED, json!(true)),
        (keys::REGISTRATION_COMMISSION_PERCENT, json!(10.0)),
        (keys::CLAIM_COMMISSION_PERCENT, json!(5.0)),
        (
            keys::ALLOWED_CLAIM_CURRENCIES,
            json!(["USD", "EUR", "BTC", "ETH", "USDT"]),
        ),
        (keys::WITHDRAWAL_MINIMUM, json!(1000u64)),
        (keys::WITHDRAWAL_MAXIMUM, json!(1_000_000u64)),
        (
            keys::WITHDRAWAL_FEE_TIERS,
            json!([
                { "up_to": 10_000u64, "percent": 5.0 },
                { "up_to": 100_000u64, "percent": 2.5 },
                { "up_to": null, "percent": 1.0 }
            ]),
        ),
        (keys::BUSINESS_UTC_OFFSET_HOURS, json!(0)),
        (keys::DEFAULT_PLAN_DURATION_DAYS, json!(30)),
    ]
}

/// Cache processus de la configuration de site
pub struct ConfigCache {
    store: Arc<dyn LedgerStore>,
    cache: RwLock<HashMap<String, Value>>,
}

impl ConfigCache {
    /// Amorce le cache : sème les valeurs par défaut manquantes puis charge
    /// l'intégralité de la configuration
    pub async fn bootstrap(store: Arc<dyn LedgerStore>) -> Result<Self> {
        for (key, value) in default_settings() {
            if store.get_setting(key).await?.is_none() {
                store.put_setting(key, value).await?;
            }
        }
        let snapshot = store.all_settings().await?;
        Ok(Self {
            store,
            cache: RwLock::new(snapshot),
        })
    }

    /// Écrit une clé puis invalide le cache pour cette clé
    pub async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.store.put_setting(key, value).await?;
        self.invalidate(key).await
    }

    /// Recharge une clé depuis le store (invalidation explicite)
    pub async fn invalidate(&self, key: &str) -> Result<()> {
        let fresh = self.store.get_setting(key).await?;
        let mut cache = self.cache.write().expect("verrou du cache empoisonné");
        match fresh {
            Some(value) => cache.insert(key.to_string(), value),
            None => cache.remove(key),
        };
        Ok(())
    }

    fn raw(&self, key: &str) -> Result<Value> {
        self.cache
            .read()
            .expect("verrou du cache empoisonné")
            .get(key)
            .cloned()
            .ok_or_else(|| CoreError::Config {
                message: format!("clé de configuration absente: {key}"),
            })
    }

    fn typed<T: serde::de::DeserializeOwned>(&self, key: &str) -> Result<T> {
        serde_json::from_value(self.raw(key)?).map_err(|e| CoreError::Config {
            message: format!("clé {key} mal typée: {e}"),
        })
    }

    /// Montant (stocké en centimes)
    pub fn amount(&self, key: &str) -> Result<Amount> {
        Ok(Amount::from_cents(self.typed::<u64>(key)?))
    }

    /// Pourcentage
    pub fn percent(&self, key: &str) -> Result<f64> {
        self.typed(key)
    }

    /// Booléen
    pub fn flag(&self, key: &str) -> Result<bool> {
        self.typed(key)
    }

    /// Entier signé
    pub fn integer(&self, key: &str) -> Result<i64> {
        self.typed(key)
    }

    /// Liste de chaînes
    pub fn string_list(&self, key: &str) -> Result<Vec<String>> {
        self.typed(key)
    }

    /// Paliers de frais de retrait
    pub fn withdrawal_fee_tiers(&self) -> Result<Vec<FeeTier>> {
        self.typed(keys::WITHDRAWAL_FEE_TIERS)
    }

    /// Calendrier métier construit depuis le décalage UTC configuré
    pub fn calendar(&self) -> Result<BusinessCalendar> {
        let hours = self.integer(keys::BUSINESS_UTC_OFFSET_HOURS)?;
        Ok(BusinessCalendar::from_utc_offset_hours(hours as i32))
    }
}
