//! Order number assignment
//!
//! Numbers are scoped to the calendar day in the server's local time zone:
//! `<PREFIX><YY><MM><DD><SEQ>`. The sequence comes from one of two strategies:
//!
//! - [`SequenceStrategy::DailyCounter`] asks the store to atomically bump a
//!   per-day counter, so concurrent creations never share a sequence.
//! - [`SequenceStrategy::CountToday`] counts the orders already created today
//!   and adds one. Two creations that count before either persists receive
//!   the same number; the store's uniqueness constraint then turns the second
//!   insert into a conflict.

use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use std::str::FromStr;
use std::sync::Arc;

use crate::domain::value_objects::{OrderNumber, UnknownVariant};
use crate::store::{OrderFilter, OrderStore, StoreResult};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SequenceStrategy { #[default] DailyCounter, CountToday }

impl FromStr for SequenceStrategy {
    type Err = UnknownVariant;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "counter" => Ok(Self::DailyCounter),
            "count" => Ok(Self::CountToday),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

/// Midnight at the start of `day` in `tz`, as UTC.
pub fn midnight_in<Tz: TimeZone>(tz: &Tz, day: NaiveDate) -> DateTime<Utc> {
    let midnight = day.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&midnight)
        .earliest()
        // A DST jump can skip local midnight; fall back to treating it as UTC.
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|| midnight.and_utc())
}

/// Midnight at the start of `now`'s local day, as UTC.
pub fn start_of_day<Tz: TimeZone>(now: &DateTime<Tz>) -> DateTime<Utc> {
    midnight_in(&now.timezone(), now.date_naive())
}

#[derive(Clone)]
pub struct OrderNumberGenerator {
    store: Arc<dyn OrderStore>,
    prefix: String,
    strategy: SequenceStrategy,
}

impl OrderNumberGenerator {
    pub fn new(store: Arc<dyn OrderStore>, prefix: impl Into<String>, strategy: SequenceStrategy) -> Self {
        Self { store, prefix: prefix.into(), strategy }
    }

    pub fn prefix(&self) -> &str { &self.prefix }
    pub fn strategy(&self) -> SequenceStrategy { self.strategy }

    pub async fn next(&self) -> StoreResult<OrderNumber> {
        self.next_at(Local::now()).await
    }

    pub async fn next_at<Tz: TimeZone>(&self, now: DateTime<Tz>) -> StoreResult<OrderNumber>
    where
        Tz::Offset: Send,
    {
        let day = now.date_naive();
        let sequence = match self.strategy {
            SequenceStrategy::DailyCounter => self.store.next_daily_sequence(day).await?,
            SequenceStrategy::CountToday => {
                let today = OrderFilter::created_between(start_of_day(&now), now.with_timezone(&Utc));
                let count = self.store.count(&today).await?;
                u32::try_from(count + 1).unwrap_or(u32::MAX)
            }
        };
        Ok(OrderNumber::compose(&self.prefix, day, sequence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::order::tests::draft;
    use crate::domain::aggregates::Order;
    use crate::store::{InMemoryOrderStore, StoreError};
    use chrono::FixedOffset;
    use std::collections::HashSet;

    fn generator(store: &InMemoryOrderStore, strategy: SequenceStrategy) -> OrderNumberGenerator {
        OrderNumberGenerator::new(Arc::new(store.clone()), "TRB", strategy)
    }

    #[test]
    fn test_start_of_day_in_offset_zone() {
        let ist = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
        let now = ist.with_ymd_and_hms(2025, 3, 7, 1, 15, 0).unwrap();
        assert_eq!(start_of_day(&now), Utc.with_ymd_and_hms(2025, 3, 6, 18, 30, 0).unwrap());
    }

    #[tokio::test]
    async fn test_number_format() {
        let store = InMemoryOrderStore::new();
        let now = Local.with_ymd_and_hms(2025, 3, 7, 10, 0, 0).single().unwrap();
        let number = generator(&store, SequenceStrategy::DailyCounter).next_at(now).await.unwrap();
        assert_eq!(number.as_str(), "TRB2503070001");
        let (day, seq) = OrderNumber::parse("TRB", number.as_str()).unwrap();
        assert_eq!((day, seq), (NaiveDate::from_ymd_opt(2025, 3, 7).unwrap(), 1));
    }

    #[tokio::test]
    async fn test_count_strategy_counts_only_today() {
        let store = InMemoryOrderStore::new();
        let gen = generator(&store, SequenceStrategy::CountToday);
        let now = Local::now();
        let yesterday = Order::place(OrderNumber::from_stored("TRB-old"), draft(), Utc::now() - chrono::Duration::days(2)).unwrap();
        store.insert(&yesterday).await.unwrap();
        let first = Order::place(gen.next_at(now).await.unwrap(), draft(), Utc::now()).unwrap();
        assert!(first.order_number.as_str().ends_with("0001"));
        store.insert(&first).await.unwrap();
        let second = gen.next_at(Local::now()).await.unwrap();
        assert!(second.as_str().ends_with("0002"));
    }

    #[tokio::test]
    async fn test_count_strategy_races_into_conflict() {
        let store = InMemoryOrderStore::new();
        let gen = generator(&store, SequenceStrategy::CountToday);
        // Both creations read the count before either one persists.
        let a = gen.next().await.unwrap();
        let b = gen.next().await.unwrap();
        assert_eq!(a, b);
        store.insert(&Order::place(a, draft(), Utc::now()).unwrap()).await.unwrap();
        let err = store.insert(&Order::place(b, draft(), Utc::now()).unwrap()).await.unwrap_err();
        assert!(matches!(err, StoreError::DuplicateOrderNumber(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_counter_strategy_is_unique_under_concurrency() {
        let store = InMemoryOrderStore::new();
        let gen = generator(&store, SequenceStrategy::DailyCounter);
        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let gen = gen.clone();
                let store = store.clone();
                tokio::spawn(async move {
                    let number = gen.next().await.unwrap();
                    store.insert(&Order::place(number.clone(), draft(), Utc::now()).unwrap()).await.unwrap();
                    number
                })
            })
            .collect();
        let mut seen = HashSet::new();
        for task in tasks {
            assert!(seen.insert(task.await.unwrap()));
        }
        assert_eq!(seen.len(), 64);
    }

    #[test]
    fn test_strategy_from_str() {
        assert_eq!("counter".parse::<SequenceStrategy>().unwrap(), SequenceStrategy::DailyCounter);
        assert_eq!("count".parse::<SequenceStrategy>().unwrap(), SequenceStrategy::CountToday);
        assert!("random".parse::<SequenceStrategy>().is_err());
    }
}
