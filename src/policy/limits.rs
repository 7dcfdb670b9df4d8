//! Sliding-window spend ledgers
//!
//! Each window keeps a bounded deque of `(timestamp, amount)` entries and
//! prunes anything older than its span lazily, on both append and query.
//! `resets_at` is the moment the earliest surviving entry ages out.

use std::collections::VecDeque;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::error::WalletError;

/// Hard cap on retained entries per window; oldest entries collapse into
/// their successor's timestamp bucket past this point in pathological volume
const MAX_ENTRIES: usize = 4_096;

/// Native-asset spending caps, in wei
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpendingLimits {
    pub per_transaction: Option<U256>,
    pub per_hour: Option<U256>,
    pub per_day: Option<U256>,
    pub per_week: Option<U256>,
    /// Refuse all sends once the balance falls below this floor
    pub emergency_stop_below: Option<U256>,
}

/// USD-denominated caps for token and bridge-corridor ledgers, whole USD
///
/// One whole unit of a stablecoin counts as one USD for ledger purposes,
/// an accounting convention, not a price feed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsdLimits {
    pub per_transaction: Option<u64>,
    pub per_hour: Option<u64>,
    pub per_day: Option<u64>,
    pub per_week: Option<u64>,
}

/// The three rolling windows every ledger tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Hourly,
    Daily,
    Weekly,
}

impl Window {
    pub fn span(self) -> ChronoDuration {
        match self {
            Window::Hourly => ChronoDuration::hours(1),
            Window::Daily => ChronoDuration::hours(24),
            Window::Weekly => ChronoDuration::days(7),
        }
    }
}

/// One rolling window of spend entries
#[derive(Debug, Clone)]
struct WindowLedger {
    window: Window,
    entries: VecDeque<(DateTime<Utc>, U256)>,
}

impl WindowLedger {
    fn new(window: Window) -> Self {
        WindowLedger {
            window,
            entries: VecDeque::new(),
        }
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.window.span();
        while let Some((ts, _)) = self.entries.front() {
            if *ts <= cutoff {
                self.entries.pop_front();
            } else {
                break;
            }
        }
    }

    fn total(&mut self, now: DateTime<Utc>) -> U256 {
        self.prune(now);
        self.entries
            .iter()
            .fold(U256::zero(), |acc, (_, amount)| acc.saturating_add(*amount))
    }

    fn append(&mut self, now: DateTime<Utc>, amount: U256) {
        self.prune(now);
        if self.entries.len() >= MAX_ENTRIES {
            // Merge the two oldest entries rather than forgetting spend
            if let (Some((_, a)), Some(front)) =
                (self.entries.pop_front(), self.entries.front_mut())
            {
                front.1 = front.1.saturating_add(a);
            }
        }
        self.entries.push_back((now, amount));
    }

    fn resets_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.entries
            .front()
            .map(|(ts, _)| *ts + self.window.span())
            .unwrap_or(now)
    }

    fn entry_count(&self) -> usize {
        self.entries.len()
    }
}

/// Spend totals over the three windows, for snapshots and history views
#[derive(Debug, Clone, Serialize)]
pub struct WindowTotals {
    pub hourly: U256,
    pub daily: U256,
    pub weekly: U256,
    pub entries: usize,
}

/// A full hourly/daily/weekly ledger for one asset or corridor
#[derive(Debug, Clone)]
pub struct SpendLedger {
    hourly: WindowLedger,
    daily: WindowLedger,
    weekly: WindowLedger,
}

impl Default for SpendLedger {
    fn default() -> Self {
        SpendLedger {
            hourly: WindowLedger::new(Window::Hourly),
            daily: WindowLedger::new(Window::Daily),
            weekly: WindowLedger::new(Window::Weekly),
        }
    }
}

impl SpendLedger {
    /// Check the prospective `amount` against each capped window, failing on
    /// the first violation in hourly → daily → weekly order
    pub fn check_at(
        &mut self,
        now: DateTime<Utc>,
        amount: U256,
        per_hour: Option<U256>,
        per_day: Option<U256>,
        per_week: Option<U256>,
    ) -> Result<(), WalletError> {
        if let Some(cap) = per_hour {
            let spent = self.hourly.total(now);
            if spent.saturating_add(amount) > cap {
                return Err(WalletError::HourlyLimitExceeded {
                    amount,
                    spent,
                    limit: cap,
                    resets_at: self.hourly.resets_at(now),
                });
            }
        }
        if let Some(cap) = per_day {
            let spent = self.daily.total(now);
            if spent.saturating_add(amount) > cap {
                return Err(WalletError::DailyLimitExceeded {
                    amount,
                    spent,
                    limit: cap,
                    resets_at: self.daily.resets_at(now),
                });
            }
        }
        if let Some(cap) = per_week {
            let spent = self.weekly.total(now);
            if spent.saturating_add(amount) > cap {
                return Err(WalletError::WeeklyLimitExceeded {
                    amount,
                    spent,
                    limit: cap,
                    resets_at: self.weekly.resets_at(now),
                });
            }
        }
        Ok(())
    }

    /// Record a completed spend in every window
    pub fn record_at(&mut self, now: DateTime<Utc>, amount: U256) {
        self.hourly.append(now, amount);
        self.daily.append(now, amount);
        self.weekly.append(now, amount);
    }

    /// Current totals after lazy pruning
    pub fn totals_at(&mut self, now: DateTime<Utc>) -> WindowTotals {
        WindowTotals {
            hourly: self.hourly.total(now),
            daily: self.daily.total(now),
            weekly: self.weekly.total(now),
            entries: self.weekly.entry_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eth(n: u64) -> U256 {
        U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
    }

    #[test]
    fn test_daily_limit_scenario() {
        // per_day = 10 ETH, prior spends 3 ETH an hour ago and 4 ETH two
        // hours ago: 4 more ETH must fail, 3 more must pass.
        let now = Utc::now();
        let mut ledger = SpendLedger::default();
        ledger.record_at(now - ChronoDuration::hours(2), eth(4));
        ledger.record_at(now - ChronoDuration::hours(1), eth(3));

        let err = ledger
            .check_at(now, eth(4), None, Some(eth(10)), None)
            .unwrap_err();
        match err {
            WalletError::DailyLimitExceeded {
                spent, resets_at, ..
            } => {
                assert_eq!(spent, eth(7));
                // Earliest surviving spend + 24h
                assert_eq!(resets_at, now - ChronoDuration::hours(2) + ChronoDuration::hours(24));
            }
            other => panic!("expected daily limit error, got {other:?}"),
        }

        ledger
            .check_at(now, eth(3), None, Some(eth(10)), None)
            .unwrap();
    }

    #[test]
    fn test_entries_expire_lazily() {
        let now = Utc::now();
        let mut ledger = SpendLedger::default();
        ledger.record_at(now - ChronoDuration::minutes(90), eth(5));
        ledger.record_at(now - ChronoDuration::minutes(10), eth(1));

        // The 90-minute-old entry left the hourly window but not the daily
        assert_eq!(ledger.totals_at(now).hourly, eth(1));
        assert_eq!(ledger.totals_at(now).daily, eth(6));

        ledger
            .check_at(now, eth(4), Some(eth(5)), None, None)
            .unwrap();
    }

    #[test]
    fn test_check_order_hourly_before_daily() {
        let now = Utc::now();
        let mut ledger = SpendLedger::default();
        ledger.record_at(now, eth(5));

        // Violates both windows; the hourly one must win
        let err = ledger
            .check_at(now, eth(10), Some(eth(6)), Some(eth(6)), None)
            .unwrap_err();
        assert_eq!(err.code(), "HOURLY_LIMIT_EXCEEDED");
    }

    #[test]
    fn test_weekly_window() {
        let now = Utc::now();
        let mut ledger = SpendLedger::default();
        ledger.record_at(now - ChronoDuration::days(6), eth(50));
        ledger.record_at(now - ChronoDuration::days(8), eth(50)); // aged out

        let err = ledger
            .check_at(now, eth(60), None, None, Some(eth(100)))
            .unwrap_err();
        assert_eq!(err.code(), "WEEKLY_LIMIT_EXCEEDED");

        ledger
            .check_at(now, eth(50), None, None, Some(eth(100)))
            .unwrap();
    }

    #[test]
    fn test_uncapped_windows_always_pass() {
        let now = Utc::now();
        let mut ledger = SpendLedger::default();
        ledger.record_at(now, eth(1_000_000));
        ledger.check_at(now, eth(1_000_000), None, None, None).unwrap();
    }

    #[test]
    fn test_entry_cap_merges_rather_than_forgets() {
        let now = Utc::now();
        let mut ledger = SpendLedger::default();
        for i in 0..(MAX_ENTRIES + 100) {
            ledger.record_at(now + ChronoDuration::milliseconds(i as i64), U256::one());
        }
        let totals = ledger.totals_at(now + ChronoDuration::seconds(10));
        assert_eq!(totals.weekly, U256::from(MAX_ENTRIES as u64 + 100));
        assert!(totals.entries <= MAX_ENTRIES);
    }
}
