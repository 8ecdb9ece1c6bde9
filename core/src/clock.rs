//! Horloge injectable et calendrier métier
//!
//! Toutes les règles temporelles (expiration en fin de journée, fenêtre de
//! la veille, remise à zéro des quotas) sont exprimées dans un fuseau métier
//! unique configuré pour la plateforme, pas dans le fuseau de chaque
//! utilisateur. Les moteurs reçoivent l'heure par le trait [`Clock`], ce qui
//! rend chaque scénario temporel pilotable en test.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use std::sync::RwLock;

/// Source d'heure injectable
pub trait Clock: Send + Sync {
    /// Instant courant en UTC
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Horloge système
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Horloge figée et pilotable, pour les tests et les rejeux
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<Utc>>,
}

impl FixedClock {
    /// Horloge figée à l'instant donné
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Replace l'horloge à un instant précis
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.write().expect("horloge empoisonnée") = now;
    }

    /// Avance l'horloge de la durée donnée
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().expect("horloge empoisonnée");
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.now.read().expect("horloge empoisonnée")
    }
}

/// Calendrier du fuseau métier de la plateforme
#[derive(Debug, Clone, Copy)]
pub struct BusinessCalendar {
    offset: FixedOffset,
}

impl BusinessCalendar {
    /// Calendrier pour un décalage UTC en heures entières
    ///
    /// Un décalage hors bornes est ramené dans `[-23, 23]`.
    pub fn from_utc_offset_hours(hours: i32) -> Self {
        let clamped = hours.clamp(-23, 23);
        let offset = FixedOffset::east_opt(clamped * 3600).unwrap_or_else(|| Utc.fix());
        Self { offset }
    }

    fn to_utc(&self, local: NaiveDateTime) -> DateTime<Utc> {
        // un décalage fixe est sans ambiguïté
        match self.offset.from_local_datetime(&local).single() {
            Some(dt) => dt.with_timezone(&Utc),
            None => Utc.from_utc_datetime(&local),
        }
    }

    /// Date métier de l'instant donné
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    /// Minuit métier du jour contenant l'instant donné, en UTC
    pub fn start_of_day(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        self.start_of_date(self.local_date(at))
    }

    /// Minuit métier d'une date donnée, en UTC
    pub fn start_of_date(&self, date: NaiveDate) -> DateTime<Utc> {
        self.to_utc(date.and_hms_opt(0, 0, 0).unwrap_or(NaiveDateTime::MIN))
    }

    /// Échéance d'un plan de `days` jours activé à l'instant donné :
    /// 23:59:59.999 métier du dernier jour
    ///
    /// L'arrondi est en faveur de l'utilisateur : un plan d'un jour activé
    /// à 09:00 reste réclamable jusqu'à la fin du lendemain.
    pub fn end_of_day_after(&self, activated_at: DateTime<Utc>, days: i64) -> DateTime<Utc> {
        let last_day = self.local_date(activated_at) + Duration::days(days);
        let end = last_day
            .and_hms_milli_opt(23, 59, 59, 999)
            .unwrap_or(NaiveDateTime::MIN);
        self.to_utc(end)
    }

    /// Fenêtre `[minuit de la veille, minuit du jour)` et la date de la
    /// veille, pour le lot de commissions quotidiennes
    pub fn previous_day_window(
        &self,
        at: DateTime<Utc>,
    ) -> (DateTime<Utc>, DateTime<Utc>, NaiveDate) {
        let today = self.local_date(at);
        let yesterday = today - Duration::days(1);
        (
            self.start_of_date(yesterday),
            self.start_of_date(today),
            yesterday,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_local_date_follows_business_offset() {
        let calendar = BusinessCalendar::from_utc_offset_hours(3);
        // 22:00 UTC = 01:00 le lendemain en fuseau métier +3
        assert_eq!(
            calendar.local_date(at(2024, 3, 15, 22, 0)),
            NaiveDate::from_ymd_opt(2024, 3, 16).unwrap()
        );
        assert_eq!(
            calendar.local_date(at(2024, 3, 15, 10, 0)),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
    }

    #[test]
    fn test_one_day_plan_expires_end_of_next_day() {
        let calendar = BusinessCalendar::from_utc_offset_hours(0);
        let activated = at(2024, 3, 15, 9, 0);
        let expiry = calendar.end_of_day_after(activated, 1);

        let expected = Utc
            .with_ymd_and_hms(2024, 3, 16, 23, 59, 59)
            .unwrap()
            .checked_add_signed(Duration::milliseconds(999))
            .unwrap();
        assert_eq!(expiry, expected);
    }

    #[test]
    fn test_end_of_day_in_offset_timezone() {
        let calendar = BusinessCalendar::from_utc_offset_hours(2);
        let activated = at(2024, 3, 15, 9, 0);
        // fin du 16 en heure métier +2 = 21:59:59.999 UTC
        let expiry = calendar.end_of_day_after(activated, 1);
        let expected = Utc
            .with_ymd_and_hms(2024, 3, 16, 21, 59, 59)
            .unwrap()
            .checked_add_signed(Duration::milliseconds(999))
            .unwrap();
        assert_eq!(expiry, expected);
    }

    #[test]
    fn test_previous_day_window_covers_yesterday_exactly() {
        let calendar = BusinessCalendar::from_utc_offset_hours(0);
        let (start, end, day) = calendar.previous_day_window(at(2024, 3, 16, 0, 5));

        assert_eq!(start, at(2024, 3, 15, 0, 0));
        assert_eq!(end, at(2024, 3, 16, 0, 0));
        assert_eq!(day, NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());

        // une réclamation d'hier tombe dans la fenêtre, celle de minuit pile
        // aujourd'hui n'y tombe plus (fenêtre semi-ouverte)
        let yesterday_claim = at(2024, 3, 15, 9, 0);
        assert!(yesterday_claim >= start && yesterday_claim < end);
        let midnight_claim = end;
        assert!(!(midnight_claim < end));
    }

    #[test]
    fn test_fixed_clock_advances() {
        let clock = FixedClock::new(at(2024, 3, 15, 9, 0));
        clock.advance(Duration::hours(16));
        assert_eq!(clock.now_utc(), at(2024, 3, 16, 1, 0));
        clock.set(at(2024, 3, 20, 0, 0));
        assert_eq!(clock.now_utc(), at(2024, 3, 20, 0, 0));
    }

    #[test]
    fn test_out_of_range_offset_clamped() {
        let calendar = BusinessCalendar::from_utc_offset_hours(40);
        // ramené à +23, la construction n'échoue jamais
        assert_eq!(
            calendar.local_date(at(2024, 3, 15, 2, 0)),
            NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
        );
    }
}
