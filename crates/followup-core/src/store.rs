use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};

use crate::contact::{Contact, ContactSnapshot};
use crate::error::{FollowUpError, Result};
use crate::grouping::{build_sections_with, ContactSection, DateGrouping, WeekStart};
use crate::tags::{self, Tag, TagColour};

/// In-memory view of every contact the app knows about, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ContactStore {
    contacts: BTreeMap<String, Contact>,
}

impl ContactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_contacts(contacts: Vec<Contact>) -> Self {
        Self {
            contacts: contacts.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn contact(&self, id: &str) -> Option<&Contact> {
        self.contacts.get(id)
    }

    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.values()
    }

    /// Merge contacts delivered by the source. Upsert only, so a full snapshot
    /// and an incremental diff carrying the same changes give the same store.
    /// Returns the ids that changed.
    pub fn update_with_fetched_contacts(
        &mut self,
        snapshots: &[ContactSnapshot],
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let mut changed = Vec::new();
        for snapshot in snapshots {
            match self.contacts.get_mut(&snapshot.id) {
                Some(existing) => {
                    let before = existing.clone();
                    existing.apply_snapshot(snapshot);
                    if *existing != before {
                        changed.push(snapshot.id.clone());
                    }
                }
                None => {
                    self.contacts
                        .insert(snapshot.id.clone(), Contact::from_snapshot(snapshot, now));
                    changed.push(snapshot.id.clone());
                }
            }
        }
        if !changed.is_empty() {
            log::info!(
                "Merged {} fetched contacts, {} new or updated",
                snapshots.len(),
                changed.len()
            );
        }
        changed
    }

    /// Deletion event from the source.
    pub fn remove_contacts(&mut self, ids: &[String]) -> usize {
        ids.iter()
            .filter(|id| self.contacts.remove(id.as_str()).is_some())
            .count()
    }

    pub fn sections<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        week_start: WeekStart,
    ) -> Vec<ContactSection> {
        let contacts: Vec<Contact> = self.contacts.values().cloned().collect();
        build_sections_with(&contacts, now, week_start)
    }

    pub fn contacts_met_within<Tz: TimeZone>(
        &self,
        grouping: DateGrouping,
        now: &DateTime<Tz>,
        week_start: WeekStart,
    ) -> Vec<&Contact> {
        self.contacts
            .values()
            .filter(|c| DateGrouping::of(&c.create_date, now, week_start) == grouping)
            .collect()
    }

    pub fn highlighted(&self) -> Vec<&Contact> {
        self.contacts.values().filter(|c| c.highlighted).collect()
    }

    pub fn follow_ups(&self) -> Vec<&Contact> {
        self.contacts
            .values()
            .filter(|c| c.contained_in_follow_ups)
            .collect()
    }

    /// Apply `f` to the contact with `id`.
    pub fn update<F>(&mut self, id: &str, f: F) -> Result<&Contact>
    where
        F: FnOnce(&mut Contact),
    {
        let contact = self
            .contacts
            .get_mut(id)
            .ok_or_else(|| FollowUpError::ContactNotFound(id.to_string()))?;
        f(contact);
        Ok(contact)
    }

    fn tags_of(&self, id: &str) -> Result<&[Tag]> {
        self.contacts
            .get(id)
            .map(|c| c.tags.as_slice())
            .ok_or_else(|| FollowUpError::ContactNotFound(id.to_string()))
    }

    /// Replace the contact's tag list wholesale.
    pub fn set_tags(&mut self, id: &str, tags: Vec<Tag>) -> Result<&[Tag]> {
        let contact = self.update(id, |c| c.tags = tags)?;
        Ok(&contact.tags)
    }

    pub fn add_tag(&mut self, id: &str, title: &str) -> Result<&[Tag]> {
        let tags = tags::add_tag(self.tags_of(id)?, title)?;
        self.set_tags(id, tags)
    }

    pub fn remove_tag(&mut self, id: &str, tag_id: &str) -> Result<&[Tag]> {
        let tags = tags::remove_tag(self.tags_of(id)?, tag_id);
        self.set_tags(id, tags)
    }

    pub fn reorder_tag(&mut self, id: &str, tag_id: &str, to_index: usize) -> Result<&[Tag]> {
        let tags = tags::reorder(self.tags_of(id)?, tag_id, to_index)?;
        self.set_tags(id, tags)
    }

    pub fn recolour_tag(&mut self, id: &str, tag_id: &str, colour: TagColour) -> Result<&[Tag]> {
        let tags = tags::recolour(self.tags_of(id)?, tag_id, colour)?;
        self.set_tags(id, tags)
    }
}
