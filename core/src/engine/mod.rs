//! Moteurs d'activation et de réclamation
//!
//! Les deux moteurs mutent le document de compte par écriture conditionnelle
//! (`store::update_account`) et consultent le catalogue et la configuration
//! pour leurs règles.

pub mod activation;
pub mod claim;

pub use activation::{ActivationEngine, FundingSource};
pub use claim::ClaimEngine;
