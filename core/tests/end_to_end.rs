//! Scénarios de bout en bout du moteur de registre
//!
//! Chaque scénario déroule un parcours complet (inscription, dépôt,
//! activation, réclamations, lots de réconciliation, retrait) sur le store
//! en mémoire avec une horloge pilotée.

use chrono::{Duration, TimeZone, Utc};
use rendement_core::{
    keys, Amount, Clock, FixedClock, LedgerError, LedgerService, MemoryStore, Plan, PlanDuration,
};
use serde_json::json;
use std::sync::Arc;

fn t0() -> chrono::DateTime<Utc> {
    // 15 mars 2024, 09:00 en fuseau métier (décalage UTC par défaut: 0)
    Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap()
}

async fn setup() -> (LedgerService, Arc<FixedClock>) {
    // sortie de logs visible avec `--nocapture`, une seule initialisation
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(FixedClock::new(t0()));
    let service = LedgerService::bootstrap(store, clock.clone()).await.unwrap();
    (service, clock)
}

/// Plan de référence : coût 500.00, 5 réclamations de 20.90 par jour
fn starter_plan(duration: PlanDuration) -> Plan {
    Plan::new(
        "Starter",
        Amount::from_major(500),
        4.18,
        Amount::from_cents(10450),
        Amount::from_cents(2090),
        5,
        duration,
        t0(),
    )
}

#[tokio::test]
async fn full_referral_lifecycle() {
    let (svc, clock) = setup().await;
    svc.update_setting(keys::CLAIM_COMMISSION_PERCENT, json!(20.0))
        .await
        .unwrap();

    let plan = starter_plan(PlanDuration::Days(30));
    svc.upsert_plan(plan.clone()).await.unwrap();

    // inscription parrainée
    let referrer = svc.register("parrain@test.io", None).await.unwrap();
    let referred = svc
        .register("filleul@test.io", Some(&referrer.referral_code))
        .await
        .unwrap();
    assert_eq!(referred.referred_by, Some(referrer.id));

    // dépôt confirmé manuellement
    let deposit = svc
        .request_deposit(referred.id, Amount::from_major(1000), "virement")
        .await
        .unwrap();
    svc.confirm_deposit(deposit.id).await.unwrap();

    // activation : débit et commission d'inscription (10% de 500.00)
    let investment = svc.activate_plan(referred.id, plan.id).await.unwrap();
    let account = svc.get_account(referred.id).await.unwrap();
    assert_eq!(account.main_balance, Amount::from_major(500));

    let sponsor = svc.get_account(referrer.id).await.unwrap();
    assert_eq!(sponsor.main_balance, Amount::from_major(50));
    assert_eq!(sponsor.commission_earned, Amount::from_major(50));

    // cinq réclamations puis quota
    for _ in 0..5 {
        svc.claim(referred.id, investment.id, "USD").await.unwrap();
    }
    let err = svc.claim(referred.id, investment.id, "USD").await.unwrap_err();
    assert_eq!(err.as_ledger(), Some(&LedgerError::QuotaExceeded { limit: 5 }));

    let account = svc.get_account(referred.id).await.unwrap();
    // 500.00 + 5 x 20.90
    assert_eq!(account.main_balance, Amount::from_cents(60450));

    // lendemain : lots de réconciliation
    clock.advance(Duration::hours(16));
    let scheduler = svc.scheduler();
    scheduler.run_all(clock.now_utc()).await;

    // commission quotidienne : 20% des 104.50 réclamés la veille
    let sponsor = svc.get_account(referrer.id).await.unwrap();
    assert_eq!(
        sponsor.commission_earned,
        Amount::from_major(50).saturating_add(Amount::from_cents(2090))
    );

    // re-exécution sans double versement
    scheduler.run_commission_payout(clock.now_utc()).await;
    let sponsor_after = svc.get_account(referrer.id).await.unwrap();
    assert_eq!(sponsor_after.commission_earned, sponsor.commission_earned);

    // le quota est reparti pour la nouvelle journée
    let record = svc.claim(referred.id, investment.id, "USD").await.unwrap();
    assert_eq!(record.claim_number, 1);
}

#[tokio::test]
async fn plan_expiry_lifecycle() {
    let (svc, clock) = setup().await;
    let plan = starter_plan(PlanDuration::Days(1));
    svc.upsert_plan(plan.clone()).await.unwrap();

    let user = svc.register("user@test.io", None).await.unwrap();
    let deposit = svc
        .request_deposit(user.id, Amount::from_major(1000), "virement")
        .await
        .unwrap();
    svc.confirm_deposit(deposit.id).await.unwrap();

    let investment = svc.activate_plan(user.id, plan.id).await.unwrap();

    // une seconde activation du même plan est refusée tant qu'il court
    let err = svc.activate_plan(user.id, plan.id).await.unwrap_err();
    assert_eq!(err.as_ledger(), Some(&LedgerError::AlreadyActive));

    // le lendemain soir, toujours avant 23:59:59.999 : réclamable
    clock.advance(Duration::hours(35));
    svc.claim(user.id, investment.id, "USD").await.unwrap();

    // le surlendemain : expiré, puis purgé par le lot
    clock.advance(Duration::days(1));
    let err = svc.claim(user.id, investment.id, "USD").await.unwrap_err();
    assert!(matches!(err.as_ledger(), Some(LedgerError::Expired { .. })));

    svc.scheduler().run_expiry_sweep(clock.now_utc()).await;
    let account = svc.get_account(user.id).await.unwrap();
    assert!(account.active_investments.is_empty());
    // l'historique de réclamations survit à la purge
    assert_eq!(account.claim_history.len(), 1);

    // une fois purgé, le plan se réactive
    let err = svc.claim(user.id, investment.id, "USD").await.unwrap_err();
    assert!(matches!(err.as_ledger(), Some(LedgerError::NotFound { .. })));
    svc.activate_plan(user.id, plan.id).await.unwrap();
}

#[tokio::test]
async fn withdrawal_gates_and_settlement() {
    let (svc, _clock) = setup().await;
    let user = svc.register("user@test.io", None).await.unwrap();

    // pas de retrait avant le premier dépôt confirmé
    let err = svc
        .request_withdrawal(user.id, Amount::from_major(50), "virement")
        .await
        .unwrap_err();
    assert_eq!(err.as_ledger(), Some(&LedgerError::FirstDepositNotMade));

    // un dépôt rejeté ne crédite rien et ne lève pas le verrou
    let rejected = svc
        .request_deposit(user.id, Amount::from_major(300), "virement")
        .await
        .unwrap();
    svc.reject_deposit(rejected.id).await.unwrap();
    let account = svc.get_account(user.id).await.unwrap();
    assert_eq!(account.main_balance, Amount::ZERO);
    assert!(!account.first_deposit_confirmed);

    // dépôt confirmé : crédit et verrou levé
    let deposit = svc
        .request_deposit(user.id, Amount::from_major(300), "virement")
        .await
        .unwrap();
    svc.confirm_deposit(deposit.id).await.unwrap();

    // retrait de 200.00 : frais 2.5% (palier jusqu'à 1000.00), net 195.00
    let withdrawal = svc
        .request_withdrawal(user.id, Amount::from_major(200), "virement")
        .await
        .unwrap();
    assert_eq!(withdrawal.fee, Amount::from_major(5));
    assert_eq!(withdrawal.net_payout(), Amount::from_major(195));

    // fonds réservés dès la demande
    let account = svc.get_account(user.id).await.unwrap();
    assert_eq!(account.main_balance, Amount::from_major(100));

    svc.confirm_withdrawal(withdrawal.id).await.unwrap();
    let account = svc.get_account(user.id).await.unwrap();
    assert_eq!(account.main_balance, Amount::from_major(100));
}
