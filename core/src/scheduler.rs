//! Tâches de réconciliation périodiques
//!
//! Trois lots indépendants, épinglés sur le fuseau métier et idempotents :
//! remise à zéro des quotas à minuit, purge des investissements expirés,
//! versement des commissions quotidiennes de la veille. Chaque lot expose un
//! point d'entrée `run_*(now)` directement invocable (re-exécution manuelle,
//! rattrapage), et traite ses entités indépendamment : l'échec d'une entité
//! est journalisé puis ignoré, jamais propagé au reste du lot.

use crate::clock::Clock;
use crate::error::Result;
use crate::referral::{
    evaluate_daily_commission, DailyClaimCommissionLog, DailyCommissionDecision, ReferralRecord,
};
use crate::settings::{keys, ConfigCache};
use crate::store::{update_account, LedgerStore};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Bilan agrégé d'une exécution de lot
#[derive(Debug, Clone)]
pub struct JobReport {
    /// Nom du lot
    pub job: &'static str,
    /// Entités effectivement modifiées
    pub processed: u64,
    /// Entités visitées sans rien à faire
    pub skipped: u64,
    /// Entités en échec (journalisées, jamais bloquantes)
    pub failed: u64,
    /// Instant de l'exécution
    pub ran_at: DateTime<Utc>,
}

impl JobReport {
    fn new(job: &'static str, ran_at: DateTime<Utc>) -> Self {
        Self {
            job,
            processed: 0,
            skipped: 0,
            failed: 0,
            ran_at,
        }
    }
}

/// Planificateur des trois lots de réconciliation
pub struct ReconciliationScheduler {
    store: Arc<dyn LedgerStore>,
    config: Arc<ConfigCache>,
    clock: Arc<dyn Clock>,
}

impl ReconciliationScheduler {
    /// Construit le planificateur sur un store, une configuration et une
    /// horloge
    pub fn new(store: Arc<dyn LedgerStore>, config: Arc<ConfigCache>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    /// Remise à zéro quotidienne des compteurs de réclamations
    ///
    /// Visite chaque compte détenant au moins un compteur non nul ; les
    /// investissements déjà expirés sont laissés tels quels (la purge s'en
    /// charge). Re-exécutable sans effet : remettre 0 à 0 ne change rien.
    pub async fn run_daily_reset(&self, now: DateTime<Utc>) -> JobReport {
        let mut report = JobReport::new("remise_a_zero_quotas", now);
        let ids = match self.store.account_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "parcours des comptes impossible, lot abandonné");
                report.failed += 1;
                return report;
            }
        };

        for account_id in ids {
            let outcome = update_account(self.store.as_ref(), account_id, |account| {
                let mut changed = 0u32;
                for investment in &mut account.active_investments {
                    if investment.claims_made_today > 0 && !investment.is_expired(now) {
                        investment.claims_made_today = 0;
                        changed += 1;
                    }
                }
                Ok(changed)
            })
            .await;

            match outcome {
                Ok(0) => report.skipped += 1,
                Ok(_) => report.processed += 1,
                Err(e) => {
                    warn!(account = %account_id, error = %e, "remise à zéro en échec, compte ignoré");
                    report.failed += 1;
                }
            }
        }

        info!(
            processed = report.processed,
            skipped = report.skipped,
            failed = report.failed,
            "remise à zéro des quotas terminée"
        );
        report
    }

    /// Purge des investissements expirés
    ///
    /// Retire l'entrée de la liste active ; seuls les enregistrements de
    /// réclamation subsistent comme trace. Une entrée déjà purgée n'est
    /// simplement plus trouvée : la re-exécution est sûre.
    pub async fn run_expiry_sweep(&self, now: DateTime<Utc>) -> JobReport {
        let mut report = JobReport::new("purge_expirations", now);
        let ids = match self.store.account_ids().await {
            Ok(ids) => ids,
            Err(e) => {
                error!(error = %e, "parcours des comptes impossible, lot abandonné");
                report.failed += 1;
                return report;
            }
        };

        for account_id in ids {
            let outcome = update_account(self.store.as_ref(), account_id, |account| {
                let before = account.active_investments.len();
                account.active_investments.retain(|i| !i.is_expired(now));
                Ok((before - account.active_investments.len()) as u32)
            })
            .await;

            match outcome {
                Ok(0) => report.skipped += 1,
                Ok(removed) => {
                    info!(account = %account_id, removed, "investissements expirés purgés");
                    report.processed += 1;
                }
                Err(e) => {
                    warn!(account = %account_id, error = %e, "purge en échec, compte ignoré");
                    report.failed += 1;
                }
            }
        }

        info!(
            processed = report.processed,
            skipped = report.skipped,
            failed = report.failed,
            "purge des expirations terminée"
        );
        report
    }

    /// Versement des commissions quotidiennes sur les réclamations de la
    /// veille
    ///
    /// L'unicité du journal sur (enregistrement, jour) garantit
    /// l'au-plus-une-fois même en cas de re-exécution le même jour.
    pub async fn run_commission_payout(&self, now: DateTime<Utc>) -> JobReport {
        let mut report = JobReport::new("commissions_quotidiennes", now);

        let (window_start, window_end, day) = match self.config.calendar() {
            Ok(calendar) => calendar.previous_day_window(now),
            Err(e) => {
                error!(error = %e, "calendrier métier indisponible, lot abandonné");
                report.failed += 1;
                return report;
            }
        };
        let percent = match self.config.percent(keys::CLAIM_COMMISSION_PERCENT) {
            Ok(p) => p,
            Err(e) => {
                error!(error = %e, "pourcentage de commission indisponible, lot abandonné");
                report.failed += 1;
                return report;
            }
        };

        let records = match self.store.referrals_with_first_activation().await {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "parcours des parrainages impossible, lot abandonné");
                report.failed += 1;
                return report;
            }
        };

        for record in records {
            match self
                .settle_daily_commission(record, window_start, window_end, day, percent, now)
                .await
            {
                Ok(true) => report.processed += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!(error = %e, "versement de commission en échec, parrainage ignoré");
                    report.failed += 1;
                }
            }
        }

        info!(
            day = %day,
            processed = report.processed,
            skipped = report.skipped,
            failed = report.failed,
            "commissions quotidiennes terminées"
        );
        report
    }

    /// Exécute les trois lots dans l'ordre du planning : remise à zéro,
    /// purge, commissions
    ///
    /// L'ordre est une commodité de planning, pas une exigence de
    /// correction : les commissions somment les réclamations horodatées de
    /// la veille, pas les compteurs mutables.
    pub async fn run_all(&self, now: DateTime<Utc>) -> Vec<JobReport> {
        vec![
            self.run_daily_reset(now).await,
            self.run_expiry_sweep(now).await,
            self.run_commission_payout(now).await,
        ]
    }

    /// Boucle de planification : déclenche `run_all` peu après chaque minuit
    /// métier
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let now = self.clock.now_utc();
                let calendar = match self.config.calendar() {
                    Ok(c) => c,
                    Err(e) => {
                        error!(error = %e, "calendrier métier indisponible, planificateur arrêté");
                        return;
                    }
                };
                let next_tick =
                    calendar.start_of_day(now) + Duration::days(1) + Duration::minutes(5);
                let wait = (next_tick - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                let run_at = self.clock.now_utc();
                for report in self.run_all(run_at).await {
                    info!(
                        job = report.job,
                        processed = report.processed,
                        skipped = report.skipped,
                        failed = report.failed,
                        "lot planifié exécuté"
                    );
                }
            }
        })
    }

    /// Traite un enregistrement de parrainage pour la fenêtre donnée ;
    /// retourne `true` si une commission a été versée
    async fn settle_daily_commission(
        &self,
        mut record: ReferralRecord,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        day: NaiveDate,
        percent: f64,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(referred) = self.store.fetch_account(record.referred_id).await? else {
            warn!(referred = %record.referred_id, "filleul introuvable, parrainage ignoré");
            return Ok(false);
        };

        let (total_claimed, commission) =
            match evaluate_daily_commission(&record, &referred.value, window_start, window_end, percent)
            {
                DailyCommissionDecision::NotEligible
                | DailyCommissionDecision::NothingClaimed => return Ok(false),
                DailyCommissionDecision::Payable {
                    total_claimed,
                    commission,
                } => (total_claimed, commission),
            };
        if commission.is_zero() {
            return Ok(false);
        }

        // garde d'au-plus-une-fois : une ligne existe déjà pour ce jour
        if self.store.commission_log_exists(record.id, day).await? {
            return Ok(false);
        }

        // le blocage du parrain est vérifié au moment du crédit, pas de
        // l'éligibilité : un blocage en cours de journée suspend le versement
        let referrer_id = record.referrer_id;
        match self.store.fetch_account(referrer_id).await? {
            None => {
                warn!(referrer = %referrer_id, "parrain introuvable, commission ignorée");
                return Ok(false);
            }
            Some(doc) if doc.value.is_blocked => {
                warn!(referrer = %referrer_id, "parrain bloqué, commission suspendue");
                return Ok(false);
            }
            Some(_) => {}
        }

        update_account(self.store.as_ref(), referrer_id, |referrer| {
            referrer.credit_main(commission);
            referrer.commission_earned = referrer.commission_earned.saturating_add(commission);
            Ok(())
        })
        .await?;

        let inserted = self
            .store
            .insert_commission_log(DailyClaimCommissionLog {
                id: Uuid::new_v4(),
                referral_record_id: record.id,
                day,
                total_claims_amount: total_claimed,
                commission_percent: percent,
                commission_earned: commission,
                paid_at: now,
            })
            .await?;
        if !inserted {
            warn!(
                referral = %record.id,
                day = %day,
                "ligne de journal déjà présente après crédit, à signaler à l'audit"
            );
        }

        record.daily_claim_commission_last_paid_at = Some(now);
        self.store.save_referral(record).await?;

        info!(
            referrer = %referrer_id,
            commission = %commission,
            day = %day,
            "commission quotidienne versée"
        );
        Ok(true)
    }
}

/// Somme de contrôle d'un bilan : entités visitées au total
pub fn total_visited(report: &JobReport) -> u64 {
    report.processed + report.skipped + report.failed
}
