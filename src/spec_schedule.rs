//! Bitmask-based cron schedule evaluation.
//!
//! A [`SpecSchedule`] stores one 64-bit mask per cron field. Bit `n` of a
//! mask is set when value `n` matches that field; bit 63 is the star bit,
//! set only when the source text for the field was `*` or `?`. The star bit
//! drives the day-of-month / day-of-week matching rule.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike};
use chrono_tz::Tz;

/// Sentinel bit marking a field whose source text was a pure wildcard.
pub(crate) const STAR_BIT: u64 = 1 << 63;

/// The legal numeric range of one cron field, plus named aliases where the
/// field has them (months and days of week).
pub(crate) struct Bounds {
    pub min: u32,
    pub max: u32,
    pub names: &'static [(&'static str, u32)],
}

pub(crate) const SECONDS: Bounds = Bounds {
    min: 0,
    max: 59,
    names: &[],
};

pub(crate) const MINUTES: Bounds = Bounds {
    min: 0,
    max: 59,
    names: &[],
};

pub(crate) const HOURS: Bounds = Bounds {
    min: 0,
    max: 23,
    names: &[],
};

pub(crate) const DOM: Bounds = Bounds {
    min: 1,
    max: 31,
    names: &[],
};

pub(crate) const MONTHS: Bounds = Bounds {
    min: 1,
    max: 12,
    names: &[
        ("jan", 1),
        ("feb", 2),
        ("mar", 3),
        ("apr", 4),
        ("may", 5),
        ("jun", 6),
        ("jul", 7),
        ("aug", 8),
        ("sep", 9),
        ("oct", 10),
        ("nov", 11),
        ("dec", 12),
    ],
};

pub(crate) const DOW: Bounds = Bounds {
    min: 0,
    max: 6,
    names: &[
        ("sun", 0),
        ("mon", 1),
        ("tue", 2),
        ("wed", 3),
        ("thu", 4),
        ("fri", 5),
        ("sat", 6),
    ],
};

/// Bits set for every value in `[min, max]` stepping by `step`.
pub(crate) fn get_bits(min: u32, max: u32, step: u32) -> u64 {
    if step == 1 {
        return !(u64::MAX << (max + 1)) & (u64::MAX << min);
    }
    let mut bits = 0u64;
    let mut i = min;
    while i <= max {
        bits |= 1 << i;
        i += step;
    }
    bits
}

/// The full value range of a field plus the star bit.
pub(crate) fn all(bounds: &Bounds) -> u64 {
    get_bits(bounds.min, bounds.max, 1) | STAR_BIT
}

/// A parsed cron expression: one bitmask per field plus the timezone the
/// expression is evaluated in. Immutable after construction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpecSchedule {
    pub(crate) second: u64,
    pub(crate) minute: u64,
    pub(crate) hour: u64,
    pub(crate) dom: u64,
    pub(crate) month: u64,
    pub(crate) dow: u64,
    pub(crate) location: Tz,
}

impl SpecSchedule {
    /// Returns the earliest instant strictly after `after` at which every
    /// field matches, or `None` when no such instant exists within the next
    /// five years (for example `0 0 30 2 *`, which asks for February 30th).
    pub fn next(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        let loc = self.location;

        // Work in the schedule's own location and round up to the next
        // whole second, discarding any sub-second remainder.
        let mut t = after
            .with_timezone(&loc)
            .checked_add_signed(Duration::seconds(1))?;
        let subsec = (t.nanosecond() % 1_000_000_000) as i64;
        t = t.checked_sub_signed(Duration::nanoseconds(subsec))?;

        // Set once a field is advanced, so smaller fields are zeroed exactly
        // once rather than on every pass.
        let mut added = false;
        let year_limit = t.year() + 5;

        'wrap: loop {
            if t.year() > year_limit {
                return None;
            }

            // Find the first matching month.
            while self.month & (1 << t.month()) == 0 {
                if !added {
                    added = true;
                    let start = NaiveDate::from_ymd_opt(t.year(), t.month(), 1)?.and_hms_opt(0, 0, 0)?;
                    t = resolve_local(loc, start)?;
                }
                t = next_month(&t, loc)?;
                if t.month() == 1 {
                    continue 'wrap;
                }
            }

            // Find the first day that satisfies the dom/dow rule.
            while !self.day_matches(&t) {
                if !added {
                    added = true;
                    t = resolve_local(loc, t.date_naive().and_hms_opt(0, 0, 0)?)?;
                }
                t = next_day(&t, loc)?;
                if t.day() == 1 {
                    continue 'wrap;
                }
            }

            while self.hour & (1 << t.hour()) == 0 {
                if !added {
                    added = true;
                    t = t
                        .checked_sub_signed(Duration::minutes(t.minute() as i64))?
                        .checked_sub_signed(Duration::seconds(t.second() as i64))?;
                }
                t = t.checked_add_signed(Duration::hours(1))?;
                if t.hour() == 0 {
                    continue 'wrap;
                }
            }

            while self.minute & (1 << t.minute()) == 0 {
                if !added {
                    added = true;
                    t = t.checked_sub_signed(Duration::seconds(t.second() as i64))?;
                }
                t = t.checked_add_signed(Duration::minutes(1))?;
                if t.minute() == 0 {
                    continue 'wrap;
                }
            }

            while self.second & (1 << t.second()) == 0 {
                if !added {
                    added = true;
                }
                t = t.checked_add_signed(Duration::seconds(1))?;
                if t.second() == 0 {
                    continue 'wrap;
                }
            }

            return Some(t);
        }
    }

    /// The cron dom/dow rule: when either field was written as a wildcard
    /// the other field alone restricts the day, so both must match (the
    /// wildcard side always does). Only when both fields are restricted do
    /// they combine with OR.
    fn day_matches(&self, t: &DateTime<Tz>) -> bool {
        let dom_match = self.dom & (1 << t.day()) > 0;
        let dow_match = self.dow & (1 << t.weekday().num_days_from_sunday()) > 0;

        if self.dom & STAR_BIT > 0 || self.dow & STAR_BIT > 0 {
            return dom_match && dow_match;
        }
        dom_match || dow_match
    }
}

/// Map a naive local time into `loc`. Ambiguous times (clocks rolled back)
/// resolve to the earliest mapping; nonexistent times (clocks sprung
/// forward) are skipped ahead by an hour.
fn resolve_local(loc: Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    match loc.from_local_datetime(&naive) {
        LocalResult::Single(t) => Some(t),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => loc
            .from_local_datetime(&(naive + Duration::hours(1)))
            .earliest(),
    }
}

/// First instant of the month after `t`, preserving the local time of day.
/// Only called once `t` sits on the first of a month at midnight.
fn next_month(t: &DateTime<Tz>, loc: Tz) -> Option<DateTime<Tz>> {
    let (year, month) = if t.month() == 12 {
        (t.year() + 1, 1)
    } else {
        (t.year(), t.month() + 1)
    };
    let naive = NaiveDate::from_ymd_opt(year, month, t.day())?.and_time(t.time());
    resolve_local(loc, naive)
}

/// Same local time on the following calendar day.
fn next_day(t: &DateTime<Tz>, loc: Tz) -> Option<DateTime<Tz>> {
    let naive = t.date_naive().succ_opt()?.and_time(t.time());
    resolve_local(loc, naive)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Tz> {
        Tz::UTC.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    fn schedule(second: u64, minute: u64, hour: u64, dom: u64, month: u64, dow: u64) -> SpecSchedule {
        SpecSchedule {
            second,
            minute,
            hour,
            dom,
            month,
            dow,
            location: Tz::UTC,
        }
    }

    #[test]
    fn get_bits_step_one() {
        assert_eq!(get_bits(0, 2, 1), 0b111);
        assert_eq!(get_bits(1, 3, 1), 0b1110);
        assert_eq!(get_bits(59, 59, 1), 1 << 59);
    }

    #[test]
    fn get_bits_with_step() {
        assert_eq!(get_bits(0, 10, 5), (1 << 0) | (1 << 5) | (1 << 10));
        assert_eq!(get_bits(3, 7, 2), (1 << 3) | (1 << 5) | (1 << 7));
    }

    #[test]
    fn all_sets_star_bit() {
        let bits = all(&HOURS);
        assert_eq!(bits & STAR_BIT, STAR_BIT);
        assert_eq!(bits & !STAR_BIT, get_bits(0, 23, 1));
    }

    #[test]
    fn every_minute_advances_to_the_next_whole_minute() {
        // "* * * * *" with the seconds field defaulted to 0.
        let s = schedule(1 << 0, all(&MINUTES), all(&HOURS), all(&DOM), all(&MONTHS), all(&DOW));

        let next = s.next(&utc(2024, 1, 1, 0, 0, 30)).unwrap();
        assert_eq!(next, utc(2024, 1, 1, 0, 1, 0));

        let after = s.next(&next).unwrap();
        assert_eq!(after, utc(2024, 1, 1, 0, 2, 0));
    }

    #[test]
    fn hourly_rounds_up_to_the_next_hour() {
        // "@hourly"
        let s = schedule(1 << 0, 1 << 0, all(&HOURS), all(&DOM), all(&MONTHS), all(&DOW));

        let next = s.next(&utc(2024, 3, 10, 14, 23, 0)).unwrap();
        assert_eq!(next, utc(2024, 3, 10, 15, 0, 0));
    }

    #[test]
    fn dom_dow_disjunction_takes_the_earlier_day() {
        // "0 0 13 * 5": midnight on the 13th, or any Friday.
        let s = schedule(1 << 0, 1 << 0, 1 << 0, 1 << 13, all(&MONTHS), 1 << 5);

        // 2024-01-05 is the first Friday of 2024, before the 13th.
        let next = s.next(&utc(2024, 1, 1, 0, 0, 0)).unwrap();
        assert_eq!(next, utc(2024, 1, 5, 0, 0, 0));

        // After the Friday fire the 13th comes next.
        let after = s.next(&next).unwrap();
        assert_eq!(after, utc(2024, 1, 12, 0, 0, 0)); // Jan 12 is also a Friday
    }

    #[test]
    fn starred_dow_leaves_dom_in_charge() {
        // "0 0 13 * *": only the 13th, never every day.
        let s = schedule(1 << 0, 1 << 0, 1 << 0, 1 << 13, all(&MONTHS), all(&DOW));

        let next = s.next(&utc(2024, 1, 1, 0, 0, 0)).unwrap();
        assert_eq!(next, utc(2024, 1, 13, 0, 0, 0));
    }

    #[test]
    fn month_rollover_lands_on_day_one() {
        // "0 0 1 2 *": midnight on February 1st.
        let s = schedule(1 << 0, 1 << 0, 1 << 0, 1 << 1, 1 << 2, all(&DOW));

        let next = s.next(&utc(2024, 6, 15, 12, 0, 0)).unwrap();
        assert_eq!(next, utc(2025, 2, 1, 0, 0, 0));
    }

    #[test]
    fn impossible_date_returns_none() {
        // February 30th never exists.
        let s = schedule(1 << 0, 1 << 0, 1 << 0, 1 << 30, 1 << 2, all(&DOW));
        assert!(s.next(&utc(2024, 1, 1, 0, 0, 0)).is_none());
    }

    #[test]
    fn next_is_strictly_after_the_reference() {
        let s = schedule(all(&SECONDS), all(&MINUTES), all(&HOURS), all(&DOM), all(&MONTHS), all(&DOW));
        let t = utc(2024, 5, 5, 5, 5, 5);
        let next = s.next(&t).unwrap();
        assert!(next > t);
        assert_eq!(next, utc(2024, 5, 5, 5, 5, 6));
    }

    #[test]
    fn evaluates_in_its_own_location() {
        // Midnight in New York is 05:00 UTC during winter.
        let s = SpecSchedule {
            second: 1 << 0,
            minute: 1 << 0,
            hour: 1 << 0,
            dom: all(&DOM),
            month: all(&MONTHS),
            dow: all(&DOW),
            location: chrono_tz::America::New_York,
        };

        let next = s.next(&utc(2024, 1, 10, 12, 0, 0)).unwrap();
        assert_eq!(next.with_timezone(&Tz::UTC), utc(2024, 1, 11, 5, 0, 0));
    }
}
