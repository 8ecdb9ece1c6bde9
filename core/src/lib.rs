//! Rendement Core Library
//!
//! This is the core ledger and entitlement engine for Rendement, an
//! investment-simulation platform: plan activation, bounded daily claims,
//! two-tier referral commissions, manually approved deposits and
//! withdrawals, and the idempotent daily reconciliation jobs that keep the
//! ledger consistent.
//!
//! # Features
//!
//! - **Fixed-point money**: all balances in unsigned integer cents, no
//!   negative balance is representable
//! - **Plan catalog**: admin-managed plans with end-of-day expiry in a
//!   single business timezone
//! - **Bounded claims**: per-investment daily quota enforced by
//!   conditional writes on the account document
//! - **Referral commissions**: one-shot registration commission and
//!   at-most-once daily claim commission
//! - **Manual funding**: deposits and withdrawals settled by a human
//!   operator, with tiered withdrawal fees
//! - **Reconciliation**: idempotent daily jobs (quota reset, expiry sweep,
//!   commission payout) safe to re-run
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use rendement_core::{LedgerService, MemoryStore, SystemClock};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let clock = Arc::new(SystemClock);
//!     let service = LedgerService::bootstrap(store, clock).await?;
//!
//!     let account = service.register("user@example.com", None).await?;
//!     println!("compte {} inscrit", account.id);
//!
//!     // lance les lots de réconciliation quotidiens
//!     Arc::new(service.scheduler()).spawn();
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - [`money`] - Fixed-point amounts in cents
//! - [`clock`] - Injectable clock and business-timezone calendar
//! - [`catalog`] - Investment plan catalog
//! - [`account`] - Account aggregate: balances, investments, claim history
//! - [`funding`] - Deposits, withdrawals and fee tiers
//! - [`referral`] - Referral records and commission evaluation
//! - [`settings`] - Site configuration and its process cache
//! - [`store`] - Persistence contract and in-memory implementation
//! - [`engine`] - Activation and claim engines
//! - [`scheduler`] - Daily reconciliation jobs
//! - [`service`] - High-level façade wiring everything together

#![warn(missing_docs)]

pub mod account;
pub mod catalog;
pub mod clock;
pub mod engine;
pub mod error;
pub mod funding;
pub mod money;
pub mod referral;
pub mod scheduler;
pub mod service;
pub mod settings;
pub mod store;

pub use account::{Account, ClaimRecord, Investment};
pub use catalog::{Plan, PlanDuration};
pub use clock::{BusinessCalendar, Clock, FixedClock, SystemClock};
pub use engine::{ActivationEngine, ClaimEngine, FundingSource};
pub use error::{CoreError, LedgerError, Result, StoreError};
pub use funding::{Deposit, FeeTier, FundingStatus, Withdrawal};
pub use money::Amount;
pub use referral::{DailyClaimCommissionLog, ReferralRecord, ReferralStatus};
pub use scheduler::{JobReport, ReconciliationScheduler};
pub use service::{AdjustmentKind, BalanceTarget, LedgerService};
pub use settings::{keys, ConfigCache};
pub use store::{LedgerStore, MemoryStore};

/// Version du module core
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Préambule d'imports pour les consommateurs du moteur
pub mod prelude {
    pub use crate::account::{Account, ClaimRecord, Investment};
    pub use crate::catalog::{Plan, PlanDuration};
    pub use crate::clock::{Clock, FixedClock, SystemClock};
    pub use crate::error::{CoreError, LedgerError, Result};
    pub use crate::money::Amount;
    pub use crate::service::LedgerService;
    pub use crate::store::{LedgerStore, MemoryStore};
}
