//! Montants monétaires en point fixe
//!
//! Tout le registre compte en centimes entiers non signés : aucun solde ne
//! peut devenir négatif et aucune arithmétique flottante ne touche les
//! soldes. Le flottant n'apparaît qu'au calcul de pourcentage, arrondi au
//! centime avant de revenir dans le domaine entier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

/// Montant en centimes de l'unité de compte du registre
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Amount(u64);

impl Amount {
    /// Montant nul
    pub const ZERO: Amount = Amount(0);

    /// Construit un montant depuis des centimes
    pub const fn from_cents(cents: u64) -> Self {
        Amount(cents)
    }

    /// Construit un montant depuis des unités entières
    pub const fn from_major(units: u64) -> Self {
        Amount(units.saturating_mul(100))
    }

    /// Valeur en centimes
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Vrai si le montant est nul
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Addition vérifiée
    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Soustraction vérifiée ; `None` plutôt qu'un solde négatif
    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Amount)
    }

    /// Addition saturante, pour les cumuls où l'échec n'a pas de sens
    pub fn saturating_add(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    /// Pourcentage du montant, arrondi au centime le plus proche
    ///
    /// Un pourcentage négatif ou non fini donne zéro.
    pub fn percentage(&self, percent: f64) -> Amount {
        let raw = (self.0 as f64) * percent / 100.0;
        if !raw.is_finite() || raw <= 0.0 {
            return Amount::ZERO;
        }
        Amount(raw.round() as u64)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, Amount::saturating_add)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Amount {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_display_two_decimal_places() {
        assert_eq!(Amount::from_cents(2090).to_string(), "20.90");
        assert_eq!(Amount::from_cents(5).to_string(), "0.05");
        assert_eq!(Amount::from_major(500).to_string(), "500.00");
        assert_eq!(Amount::ZERO.to_string(), "0.00");
    }

    #[test]
    fn test_percentage_rounds_to_nearest_cent() {
        // 4.18% de 500.00 = 20.90
        assert_eq!(
            Amount::from_major(500).percentage(4.18),
            Amount::from_cents(2090)
        );
        // 30% de 500.00 = 150.00
        assert_eq!(
            Amount::from_major(500).percentage(30.0),
            Amount::from_major(150)
        );
        // 2.5% de 0.01 = 0.00025 -> 0.00
        assert_eq!(Amount::from_cents(1).percentage(2.5), Amount::ZERO);
        // 0.5 centime arrondit vers le haut : 1% de 0.50
        assert_eq!(Amount::from_cents(50).percentage(1.0), Amount::from_cents(1));
    }

    #[test]
    fn test_percentage_degenerate_inputs() {
        assert_eq!(Amount::from_major(100).percentage(-5.0), Amount::ZERO);
        assert_eq!(Amount::from_major(100).percentage(f64::NAN), Amount::ZERO);
        assert_eq!(Amount::ZERO.percentage(50.0), Amount::ZERO);
    }

    #[test]
    fn test_checked_sub_refuses_underflow() {
        let a = Amount::from_cents(100);
        assert_eq!(a.checked_sub(Amount::from_cents(40)), Some(Amount::from_cents(60)));
        assert_eq!(a.checked_sub(Amount::from_cents(101)), None);
    }

    #[test]
    fn test_sum_of_claims() {
        let claims = [
            Amount::from_cents(2090),
            Amount::from_cents(2090),
            Amount::from_cents(2090),
        ];
        assert_eq!(claims.iter().sum::<Amount>(), Amount::from_cents(6270));
    }

    proptest! {
        #[test]
        fn prop_add_then_sub_roundtrips(a in 0u64..=1_000_000_000, b in 0u64..=1_000_000_000) {
            let total = Amount::from_cents(a).checked_add(Amount::from_cents(b)).unwrap();
            prop_assert_eq!(total.checked_sub(Amount::from_cents(b)), Some(Amount::from_cents(a)));
        }

        #[test]
        fn prop_percentage_bounded_by_amount(cents in 0u64..=1_000_000_000, percent in 0.0f64..=100.0) {
            let part = Amount::from_cents(cents).percentage(percent);
            // arrondi au centime : jamais plus d'un demi-centime au-dessus du montant
            prop_assert!(part <= Amount::from_cents(cents.saturating_add(1)));
        }
    }
}
