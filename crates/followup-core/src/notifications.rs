//! Daily "follow up with the people you met" reminders.

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use crate::grouping::{DateGrouping, WeekStart};
use crate::store::ContactStore;

pub const DEFAULT_NOTIFICATION_HOUR: u32 = 18;

// Local notifications cannot fire instantly.
const NOW_DELAY_SECS: i64 = 5;

const TITLE: &str = "Time to follow up";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTrigger {
    /// Today at the given time, or tomorrow if that time has already passed.
    SpecificTime { hour: u32, minute: u32 },
    TomorrowAt { hour: u32, minute: u32 },
    Now,
    AfterSeconds(u64),
}

impl NotificationTrigger {
    /// Resolve the trigger to a concrete moment relative to `now`.
    pub fn fire_at<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> DateTime<Utc> {
        match *self {
            NotificationTrigger::SpecificTime { hour, minute } => {
                let today = local_time(now, now.date_naive(), hour, minute);
                match today {
                    Some(at) if at > now.with_timezone(&Utc) => at,
                    _ => local_time(now, now.date_naive() + Duration::days(1), hour, minute)
                        .unwrap_or_else(|| now.with_timezone(&Utc) + Duration::days(1)),
                }
            }
            NotificationTrigger::TomorrowAt { hour, minute } => {
                local_time(now, now.date_naive() + Duration::days(1), hour, minute)
                    .unwrap_or_else(|| now.with_timezone(&Utc) + Duration::days(1))
            }
            NotificationTrigger::Now => now.with_timezone(&Utc) + Duration::seconds(NOW_DELAY_SECS),
            NotificationTrigger::AfterSeconds(secs) => {
                now.with_timezone(&Utc) + Duration::seconds(secs as i64)
            }
        }
    }
}

fn local_time<Tz: TimeZone>(
    now: &DateTime<Tz>,
    day: NaiveDate,
    hour: u32,
    minute: u32,
) -> Option<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    now.timezone()
        .from_local_datetime(&day.and_time(time))
        .earliest()
        .map(|at| at.with_timezone(&Utc))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotificationConfiguration {
    pub trigger: NotificationTrigger,
}

impl NotificationConfiguration {
    pub fn at_hour(hour: u32) -> Self {
        Self {
            trigger: NotificationTrigger::SpecificTime { hour, minute: 0 },
        }
    }
}

impl Default for NotificationConfiguration {
    fn default() -> Self {
        Self::at_hour(DEFAULT_NOTIFICATION_HOUR)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderNotification {
    pub id: String,
    pub title: String,
    pub body: String,
    pub fire_at: DateTime<Utc>,
}

impl ReminderNotification {
    fn new(body: String, fire_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: TITLE.to_string(),
            body,
            fire_at,
        }
    }
}

/// Capability to hand reminders to the platform notification centre.
pub trait Notifier: Send + Sync {
    fn schedule(&self, notification: &ReminderNotification) -> Result<()>;

    fn clear_scheduled(&self) -> Result<()>;
}

pub fn added_contacts_body(count: usize) -> String {
    match count {
        0 => "You didn't add anyone new today. Take a moment to reach out to someone.".to_string(),
        1 => "You met 1 new person today. Don't forget to follow up!".to_string(),
        n => format!("You met {n} new people today. Don't forget to follow up!"),
    }
}

pub fn recently_added_names_body(names: &[&str]) -> String {
    let names = match names {
        [] => return added_contacts_body(0),
        [one] => one.to_string(),
        [first, second] => format!("{first} and {second}"),
        [first, second, rest @ ..] => {
            format!("{first}, {second} and {} others", rest.len())
        }
    };
    format!("You recently met {names}. Why not send them a message?")
}

/// When the background refresh should run: half an hour before the reminder hour.
pub fn refresh_task_time<Tz: TimeZone>(day: &DateTime<Tz>, hour: u32) -> Option<DateTime<Utc>> {
    local_time(day, day.date_naive(), hour.checked_sub(1)?, 30)
}

pub struct ReminderScheduler<N: Notifier> {
    notifier: N,
    configuration: NotificationConfiguration,
    week_start: WeekStart,
}

impl<N: Notifier> ReminderScheduler<N> {
    pub fn new(notifier: N, configuration: NotificationConfiguration, week_start: WeekStart) -> Self {
        Self {
            notifier,
            configuration,
            week_start,
        }
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// The reminder for the contacts met today, without scheduling it.
    pub fn reminder<Tz: TimeZone>(&self, store: &ContactStore, now: &DateTime<Tz>) -> ReminderNotification {
        let met_today = store.contacts_met_within(DateGrouping::Today, now, self.week_start);
        ReminderNotification::new(
            added_contacts_body(met_today.len()),
            self.configuration.trigger.fire_at(now),
        )
    }

    pub fn names_reminder<Tz: TimeZone>(
        &self,
        store: &ContactStore,
        now: &DateTime<Tz>,
    ) -> ReminderNotification {
        let met_today = store.contacts_met_within(DateGrouping::Today, now, self.week_start);
        let names: Vec<&str> = met_today.iter().map(|c| c.name.as_str()).collect();
        ReminderNotification::new(
            recently_added_names_body(&names),
            self.configuration.trigger.fire_at(now),
        )
    }

    /// Drop pending reminders and schedule a fresh one for today's count.
    pub fn reschedule<Tz: TimeZone>(
        &self,
        store: &ContactStore,
        now: &DateTime<Tz>,
    ) -> Result<ReminderNotification> {
        self.notifier.clear_scheduled()?;
        let reminder = self.reminder(store, now);
        self.notifier.schedule(&reminder)?;
        log::info!("Scheduled follow-up reminder for {}", reminder.fire_at);
        Ok(reminder)
    }
}
