//! Calendar buckets for the "recently met" contact list.
//!
//! Buckets are calendar-relative to `now` in `now`'s timezone: a contact met
//! six days ago lands in `ThisWeek` only if the week has not rolled over since.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, TimeZone, Weekday};
use serde::{Deserialize, Serialize};

use crate::contact::Contact;

/// Ordered newest first: `Today < ThisWeek < ThisMonth < ThisYear < Older`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DateGrouping {
    Today,
    ThisWeek,
    ThisMonth,
    ThisYear,
    Older,
}

impl DateGrouping {
    pub fn all() -> Vec<DateGrouping> {
        vec![
            DateGrouping::Today,
            DateGrouping::ThisWeek,
            DateGrouping::ThisMonth,
            DateGrouping::ThisYear,
            DateGrouping::Older,
        ]
    }

    pub fn title(&self) -> &'static str {
        match self {
            DateGrouping::Today => "Today",
            DateGrouping::ThisWeek => "This Week",
            DateGrouping::ThisMonth => "This Month",
            DateGrouping::ThisYear => "This Year",
            DateGrouping::Older => "Older",
        }
    }

    /// Bucket `date` relative to `now`, with weeks starting on `week_start`.
    pub fn of<Tz: TimeZone>(
        date: &DateTime<impl TimeZone>,
        now: &DateTime<Tz>,
        week_start: WeekStart,
    ) -> DateGrouping {
        let today = now.date_naive();
        let day = date.with_timezone(&now.timezone()).date_naive();

        // Future dates (clock skew between devices) count as today.
        if day >= today {
            return DateGrouping::Today;
        }

        let start_of_week = today - Duration::days(week_start.days_into_week(today.weekday()));
        if day >= start_of_week {
            DateGrouping::ThisWeek
        } else if day.year() == today.year() && day.month() == today.month() {
            DateGrouping::ThisMonth
        } else if day.year() == today.year() {
            DateGrouping::ThisYear
        } else {
            DateGrouping::Older
        }
    }
}

/// First day of the calendar week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WeekStart {
    #[default]
    Monday,
    Sunday,
}

impl WeekStart {
    fn days_into_week(&self, weekday: Weekday) -> i64 {
        match self {
            WeekStart::Monday => weekday.num_days_from_monday() as i64,
            WeekStart::Sunday => weekday.num_days_from_sunday() as i64,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "monday" => Some(WeekStart::Monday),
            "sunday" => Some(WeekStart::Sunday),
            _ => None,
        }
    }
}

/// Bucket with Monday-start weeks.
pub fn bucket_of<Tz: TimeZone>(date: &DateTime<impl TimeZone>, now: &DateTime<Tz>) -> DateGrouping {
    DateGrouping::of(date, now, WeekStart::Monday)
}

/// One bucket of contacts, newest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactSection {
    pub grouping: DateGrouping,
    pub contacts: Vec<Contact>,
}

pub fn build_sections<Tz: TimeZone>(contacts: &[Contact], now: &DateTime<Tz>) -> Vec<ContactSection> {
    build_sections_with(contacts, now, WeekStart::Monday)
}

/// Sort by `create_date` descending (ties by id), bucket, and emit the
/// non-empty buckets in bucket order.
pub fn build_sections_with<Tz: TimeZone>(
    contacts: &[Contact],
    now: &DateTime<Tz>,
    week_start: WeekStart,
) -> Vec<ContactSection> {
    let mut sorted: Vec<&Contact> = contacts.iter().collect();
    sorted.sort_by(|a, b| {
        b.create_date
            .cmp(&a.create_date)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut buckets: BTreeMap<DateGrouping, Vec<Contact>> = BTreeMap::new();
    for contact in sorted {
        buckets
            .entry(DateGrouping::of(&contact.create_date, now, week_start))
            .or_default()
            .push(contact.clone());
    }

    buckets
        .into_iter()
        .map(|(grouping, contacts)| ContactSection { grouping, contacts })
        .collect()
}
