use chrono::{DateTime, SubsecRound, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::tags::Tag;

/// A contact as delivered by the address-book source. Only source-owned
/// fields; everything the user curates lives on [`Contact`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactSnapshot {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    /// When the source knows it; otherwise the moment of first observation is used.
    #[serde(default)]
    pub create_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    pub create_date: DateTime<Utc>,
    #[serde(default)]
    pub last_followed_up: Option<DateTime<Utc>>,
    #[serde(default)]
    pub follow_up_count: u32,
    #[serde(default)]
    pub highlighted: bool,
    #[serde(default)]
    pub contained_in_follow_ups: bool,
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Contact {
    /// Timestamps are kept at millisecond precision, the precision they are stored with.
    pub fn new(id: &str, name: &str, create_date: DateTime<Utc>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            phone_number: None,
            note: None,
            create_date: create_date.trunc_subsecs(3),
            last_followed_up: None,
            follow_up_count: 0,
            highlighted: false,
            contained_in_follow_ups: false,
            tags: Vec::new(),
        }
    }

    /// First observation of a contact from the source.
    pub fn from_snapshot(snapshot: &ContactSnapshot, now: DateTime<Utc>) -> Self {
        let mut contact = Self::new(
            &snapshot.id,
            &snapshot.name,
            snapshot.create_date.unwrap_or(now),
        );
        contact.phone_number = snapshot.phone_number.clone();
        contact.note = snapshot.note.clone();
        contact
    }

    /// Refresh source-owned fields, keeping everything the user curated.
    pub fn apply_snapshot(&mut self, snapshot: &ContactSnapshot) {
        self.name = snapshot.name.clone();
        self.phone_number = snapshot.phone_number.clone();
        self.note = snapshot.note.clone();
    }

    /// First whitespace-delimited component of the name.
    pub fn first_name(&self) -> &str {
        self.name.split_whitespace().next().unwrap_or("")
    }

    pub fn mark_as_followed_up(&mut self, now: DateTime<Utc>) {
        self.follow_up_count += 1;
        self.last_followed_up = Some(now.trunc_subsecs(3));
    }

    /// Calendar-day comparison in `now`'s timezone.
    pub fn has_been_followed_up_today<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> bool {
        self.last_followed_up
            .map(|at| at.with_timezone(&now.timezone()).date_naive() == now.date_naive())
            .unwrap_or(false)
    }

    pub fn highlight(&mut self) {
        self.highlighted = true;
    }

    pub fn unhighlight(&mut self) {
        self.highlighted = false;
    }

    pub fn add_to_follow_ups(&mut self) {
        self.contained_in_follow_ups = true;
    }

    pub fn remove_from_follow_ups(&mut self) {
        self.contained_in_follow_ups = false;
    }
}
