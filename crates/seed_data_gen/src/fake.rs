//! Fake data generation helpers.
//!
//! Wraps the `fake` crate and the run's random source. Every random draw
//! made by the generator goes through [`FakeData`], so a seeded RNG makes the
//! whole run reproducible.

use crate::categories::{WeightedPicker, HOST_PREFIXES};
use chrono::{DateTime, TimeDelta, Utc};
use fake::faker::company::en::CompanyName;
use fake::faker::internet::en::{DomainSuffix, SafeEmail, Username, IPv4};
use fake::faker::lorem::en::{Sentence, Word};
use fake::faker::name::en::Name;
use fake::Fake;
use rand::seq::IndexedRandom;
use rand::Rng;
use uuid::Uuid;

/// Fake data generator over an owned RNG
pub struct FakeData<R: Rng> {
    rng: R,
}

impl<R: Rng> FakeData<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Access the underlying RNG
    pub fn rng(&mut self) -> &mut R {
        &mut self.rng
    }

    /// Random (version 4) UUID drawn from this RNG
    pub fn uuid(&mut self) -> Uuid {
        uuid::Builder::from_random_bytes(self.rng.random()).into_uuid()
    }

    pub fn username(&mut self) -> String {
        Username().fake_with_rng(&mut self.rng)
    }

    pub fn email(&mut self) -> String {
        SafeEmail().fake_with_rng(&mut self.rng)
    }

    /// Person name
    pub fn name(&mut self) -> String {
        Name().fake_with_rng(&mut self.rng)
    }

    pub fn company(&mut self) -> String {
        CompanyName().fake_with_rng(&mut self.rng)
    }

    /// Single lowercase word
    pub fn word(&mut self) -> String {
        let word: String = Word().fake_with_rng(&mut self.rng);
        word.to_lowercase()
    }

    pub fn sentence(&mut self) -> String {
        Sentence(4..10).fake_with_rng(&mut self.rng)
    }

    /// Free text of whole sentences, at most `max_chars` long.
    ///
    /// Falls back to a run of words when not even one sentence fits.
    pub fn text(&mut self, max_chars: usize) -> String {
        let mut text = String::new();
        loop {
            let sentence: String = Sentence(3..10).fake_with_rng(&mut self.rng);
            let separator = usize::from(!text.is_empty());
            if text.len() + separator + sentence.len() > max_chars {
                break;
            }
            if separator == 1 {
                text.push(' ');
            }
            text.push_str(&sentence);
        }

        if text.is_empty() {
            loop {
                let word = self.word();
                let separator = usize::from(!text.is_empty());
                if text.len() + separator + word.len() > max_chars {
                    break;
                }
                if separator == 1 {
                    text.push(' ');
                }
                text.push_str(&word);
            }
        }
        text
    }

    pub fn ipv4(&mut self) -> String {
        IPv4().fake_with_rng(&mut self.rng)
    }

    /// Hostname such as `db-07.lorem.com`
    pub fn hostname(&mut self) -> String {
        let prefix = *self.pick(HOST_PREFIXES);
        let num: u32 = self.rng.random_range(1..100);
        let domain = self.word();
        let suffix: String = DomainSuffix().fake_with_rng(&mut self.rng);
        format!("{}-{:02}.{}.{}", prefix, num, domain, suffix)
    }

    /// Generate a random integer in range (inclusive)
    pub fn int_range(&mut self, min: i64, max: i64) -> i64 {
        self.rng.random_range(min..=max)
    }

    /// Generate a float in `[min, max)`
    pub fn float_range(&mut self, min: f64, max: f64) -> f64 {
        self.rng.random_range(min..max)
    }

    /// Pick a random element from a non-empty slice
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> &'a T {
        &items[self.rng.random_range(0..items.len())]
    }

    /// Pick a label from a weighted table
    pub fn weighted(&mut self, picker: &WeightedPicker) -> &'static str {
        picker.pick(&mut self.rng)
    }

    /// Sample `k` distinct ids with `k` uniform in `[min(lower, n), min(upper, n)]`.
    pub fn sample_distinct(&mut self, pool: &[Uuid], lower: usize, upper: usize) -> Vec<Uuid> {
        let upper = upper.min(pool.len());
        let lower = lower.min(upper);
        let count = self.rng.random_range(lower..=upper);
        pool.choose_multiple(&mut self.rng, count).copied().collect()
    }

    /// `now` minus up to `max_days` whole days
    pub fn days_ago(&mut self, now: DateTime<Utc>, max_days: i64) -> DateTime<Utc> {
        now - TimeDelta::days(self.int_range(0, max_days))
    }

    /// `now` minus up to `max_days` days, 23 hours and 59 minutes
    pub fn backdated(&mut self, now: DateTime<Utc>, max_days: i64) -> DateTime<Utc> {
        let days = self.int_range(0, max_days);
        let hours = self.int_range(0, 23);
        let minutes = self.int_range(0, 59);
        now - TimeDelta::days(days) - TimeDelta::hours(hours) - TimeDelta::minutes(minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn fake(seed: u64) -> FakeData<ChaCha8Rng> {
        FakeData::new(ChaCha8Rng::seed_from_u64(seed))
    }

    #[test]
    fn test_deterministic_generation() {
        let mut fake1 = fake(42);
        let mut fake2 = fake(42);

        // Same seed should produce same results
        assert_eq!(fake1.username(), fake2.username());
        assert_eq!(fake1.uuid(), fake2.uuid());
        assert_eq!(fake1.hostname(), fake2.hostname());
        assert_eq!(fake1.text(200), fake2.text(200));
    }

    #[test]
    fn test_uuid_is_version_4() {
        let mut fake = fake(1);
        let id = fake.uuid();
        assert_eq!(id.get_version_num(), 4);
        assert_ne!(id, fake.uuid());
    }

    #[test]
    fn test_text_respects_limit() {
        let mut fake = fake(3);
        for max in [5, 20, 100, 200] {
            for _ in 0..50 {
                let text = fake.text(max);
                assert!(text.len() <= max, "{} > {}", text.len(), max);
            }
        }
        assert!(!fake.text(200).is_empty());
    }

    #[test]
    fn test_email_and_hostname_shape() {
        let mut fake = fake(9);
        assert!(fake.email().contains('@'));
        let host = fake.hostname();
        assert!(host.contains('-'));
        assert_eq!(host.matches('.').count(), 2, "{}", host);
        assert_eq!(fake.ipv4().split('.').count(), 4);
    }

    #[test]
    fn test_sample_distinct_clamps_to_pool() {
        let mut fake = fake(11);
        let pool: Vec<Uuid> = (0..3).map(|_| fake.uuid()).collect();

        let picked = fake.sample_distinct(&pool, 5, 15);
        assert_eq!(picked.len(), 3);

        let empty = fake.sample_distinct(&[], 2, 5);
        assert!(empty.is_empty());

        let large: Vec<Uuid> = (0..40).map(|_| fake.uuid()).collect();
        for _ in 0..100 {
            let mut picked = fake.sample_distinct(&large, 5, 15);
            assert!((5..=15).contains(&picked.len()));
            picked.sort();
            picked.dedup();
            assert!(picked.len() >= 5);
        }
    }

    #[test]
    fn test_backdated_window() {
        let mut fake = fake(5);
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        for _ in 0..500 {
            let ts = fake.backdated(now, 90);
            assert!(ts <= now);
            assert!(now - ts <= TimeDelta::days(90) + TimeDelta::hours(23) + TimeDelta::minutes(59));
        }
    }
}
