//! Réclamation quotidienne bornée : le versement du profit d'un
//! investissement actif
//!
//! La vérification de quota, le crédit du solde et l'ajout de
//! l'enregistrement sont appliqués en une seule écriture conditionnelle sur
//! le document de compte : deux réclamations concurrentes ne peuvent pas
//! toutes deux observer un quota disponible et réussir.

use crate::account::ClaimRecord;
use crate::clock::Clock;
use crate::error::{LedgerError, Result};
use crate::settings::{keys, ConfigCache};
use crate::store::{update_account, LedgerStore};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Moteur de réclamations
pub struct ClaimEngine {
    store: Arc<dyn LedgerStore>,
    config: Arc<ConfigCache>,
    clock: Arc<dyn Clock>,
}

impl ClaimEngine {
    /// Construit le moteur sur un store, une configuration et une horloge
    pub fn new(store: Arc<dyn LedgerStore>, config: Arc<ConfigCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// Effectue une réclamation sur un investissement du compte
    ///
    /// `display_currency` est une étiquette d'affichage choisie par
    /// l'utilisateur, validée contre la liste configurée ; elle n'a aucun
    /// effet monétaire.
    pub async fn claim(
        &self,
        account_id: Uuid,
        investment_id: Uuid,
        display_currency: &str,
    ) -> Result<ClaimRecord> {
        let allowed = self.config.string_list(keys::ALLOWED_CLAIM_CURRENCIES)?;
        if !allowed.iter().any(|c| c == display_currency) {
            return Err(LedgerError::InvalidCurrency {
                currency: display_currency.to_string(),
            }
            .into());
        }

        let now = self.clock.now_utc();
        let day_start = self.config.calendar()?.start_of_day(now);
        let currency = display_currency.to_string();

        let record = update_account(self.store.as_ref(), account_id, |account| {
            if account.is_blocked {
                return Err(LedgerError::Blocked {
                    account_id: account.id,
                }
                .into());
            }
            let Some(investment) = account.investment_mut(investment_id) else {
                return Err(LedgerError::not_found("investissement", investment_id).into());
            };
            if let Some(expiry) = investment.expires_at {
                if expiry < now {
                    return Err(LedgerError::Expired { expired_at: expiry }.into());
                }
            }

            // Filet de sécurité : si la remise à zéro planifiée n'est pas
            // encore passée, un compteur de la veille est remis à zéro ici.
            if investment.claims_made_today > 0 {
                if let Some(last) = investment.last_claim_at {
                    if last < day_start {
                        investment.claims_made_today = 0;
                    }
                }
            }

            if investment.claims_made_today >= investment.claims_per_day {
                return Err(LedgerError::QuotaExceeded {
                    limit: investment.claims_per_day,
                }
                .into());
            }

            investment.claims_made_today += 1;
            investment.last_claim_at = Some(now);
            let record = ClaimRecord {
                plan_id: investment.plan_id,
                investment_id: investment.id,
                claim_number: investment.claims_made_today,
                amount: investment.claim_value,
                currency: currency.clone(),
                claimed_at: now,
            };
            account.credit_main(record.amount);
            account.claim_history.push(record.clone());
            Ok(record)
        })
        .await?;

        info!(
            account = %account_id,
            investment = %investment_id,
            amount = %record.amount,
            number = record.claim_number,
            "réclamation créditée"
        );
        Ok(record)
    }
}
