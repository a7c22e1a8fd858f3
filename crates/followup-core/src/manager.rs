use anyhow::Result as AnyResult;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::contact::{Contact, ContactSnapshot};
use crate::error::{FollowUpError, Result};
use crate::grouping::{ContactSection, WeekStart};
use crate::storage::ContactRepository;
use crate::store::ContactStore;
use crate::tags::{Tag, TagColour};

/// Capability to read the device address book.
#[async_trait]
pub trait ContactsSource: Send + Sync {
    async fn fetch_contacts(&self) -> AnyResult<Vec<ContactSnapshot>>;
}

/// Keeps the in-memory store and the repository in step: every successful
/// mutation is persisted, failed ones touch neither.
pub struct FollowUpManager<R: ContactRepository> {
    store: ContactStore,
    repository: R,
    week_start: WeekStart,
}

impl<R: ContactRepository> FollowUpManager<R> {
    /// Load everything the repository holds.
    pub fn load(repository: R, week_start: WeekStart) -> Result<Self> {
        let contacts = repository.load_contacts()?;
        log::info!("Loaded {} contacts", contacts.len());
        Ok(Self {
            store: ContactStore::from_contacts(contacts),
            repository,
            week_start,
        })
    }

    pub fn store(&self) -> &ContactStore {
        &self.store
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn week_start(&self) -> WeekStart {
        self.week_start
    }

    pub fn contact(&self, id: &str) -> Result<&Contact> {
        self.store
            .contact(id)
            .ok_or_else(|| FollowUpError::ContactNotFound(id.to_string()))
    }

    pub fn sections<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Vec<ContactSection> {
        self.store.sections(now, self.week_start)
    }

    /// Fetch from the source, merge, persist what changed. Returns the number
    /// of new or updated contacts.
    pub async fn refresh(&mut self, source: &dyn ContactsSource, now: DateTime<Utc>) -> Result<usize> {
        let snapshots = source
            .fetch_contacts()
            .await
            .map_err(FollowUpError::ContactQuery)?;
        self.import(&snapshots, now)
    }

    /// Merge `snapshots` and persist what changed. The store only moves on
    /// once the repository has accepted the whole batch.
    pub fn import(&mut self, snapshots: &[ContactSnapshot], now: DateTime<Utc>) -> Result<usize> {
        let mut merged = self.store.clone();
        let changed = merged.update_with_fetched_contacts(snapshots, now);
        let contacts: Vec<Contact> = changed
            .iter()
            .filter_map(|id| merged.contact(id).cloned())
            .collect();

        self.repository.save_contacts(&contacts)?;
        self.store = merged;
        Ok(changed.len())
    }

    pub fn remove_contacts(&mut self, ids: &[String]) -> Result<usize> {
        self.repository.delete_contacts(ids)?;
        Ok(self.store.remove_contacts(ids))
    }

    fn update_contact<F>(&mut self, id: &str, f: F) -> Result<&Contact>
    where
        F: FnOnce(&mut Contact),
    {
        let mut updated = self.contact(id)?.clone();
        f(&mut updated);
        self.repository.save_contact(&updated)?;
        self.store.update(id, |c| *c = updated)
    }

    pub fn mark_as_followed_up(&mut self, id: &str, now: DateTime<Utc>) -> Result<&Contact> {
        self.update_contact(id, |c| c.mark_as_followed_up(now))
    }

    pub fn highlight(&mut self, id: &str) -> Result<&Contact> {
        self.update_contact(id, Contact::highlight)
    }

    pub fn unhighlight(&mut self, id: &str) -> Result<&Contact> {
        self.update_contact(id, Contact::unhighlight)
    }

    pub fn add_to_follow_ups(&mut self, id: &str) -> Result<&Contact> {
        self.update_contact(id, Contact::add_to_follow_ups)
    }

    pub fn remove_from_follow_ups(&mut self, id: &str) -> Result<&Contact> {
        self.update_contact(id, Contact::remove_from_follow_ups)
    }

    fn commit_tags(&mut self, id: &str, tags: Vec<Tag>) -> Result<&[Tag]> {
        self.repository.save_tags(id, &tags)?;
        self.store.set_tags(id, tags)
    }

    /// Persist a list produced elsewhere, such as a finished drag on a [`crate::TagBoard`].
    pub fn set_tags(&mut self, id: &str, tags: Vec<Tag>) -> Result<&[Tag]> {
        self.contact(id)?;
        self.commit_tags(id, tags)
    }

    pub fn add_tag(&mut self, id: &str, title: &str) -> Result<&[Tag]> {
        let tags = crate::tags::add_tag(&self.contact(id)?.tags, title)?;
        self.commit_tags(id, tags)
    }

    pub fn remove_tag(&mut self, id: &str, tag_id: &str) -> Result<&[Tag]> {
        let tags = crate::tags::remove_tag(&self.contact(id)?.tags, tag_id);
        self.commit_tags(id, tags)
    }

    pub fn reorder_tag(&mut self, id: &str, tag_id: &str, to_index: usize) -> Result<&[Tag]> {
        let tags = crate::tags::reorder(&self.contact(id)?.tags, tag_id, to_index)?;
        self.commit_tags(id, tags)
    }

    pub fn recolour_tag(&mut self, id: &str, tag_id: &str, colour: TagColour) -> Result<&[Tag]> {
        let tags = crate::tags::recolour(&self.contact(id)?.tags, tag_id, colour)?;
        self.commit_tags(id, tags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grouping::DateGrouping;
    use crate::storage::SqliteStore;
    use anyhow::anyhow;
    use chrono::Duration;

    struct FakeSource(Vec<ContactSnapshot>);

    #[async_trait]
    impl ContactsSource for FakeSource {
        async fn fetch_contacts(&self) -> AnyResult<Vec<ContactSnapshot>> {
            Ok(self.0.clone())
        }
    }

    struct DeniedSource;

    #[async_trait]
    impl ContactsSource for DeniedSource {
        async fn fetch_contacts(&self) -> AnyResult<Vec<ContactSnapshot>> {
            Err(anyhow!("access denied"))
        }
    }

    fn snapshot(id: &str, name: &str) -> ContactSnapshot {
        ContactSnapshot {
            id: id.to_string(),
            name: name.to_string(),
            phone_number: None,
            note: None,
            create_date: None,
        }
    }

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn manager() -> FollowUpManager<SqliteStore> {
        FollowUpManager::load(SqliteStore::open_in_memory().unwrap(), WeekStart::Monday).unwrap()
    }

    #[tokio::test]
    async fn test_refresh_persists_new_contacts() {
        let now = at("2024-10-29T10:00:00Z");
        let mut manager = manager();
        let source = FakeSource(vec![snapshot("1", "Jane Doe"), snapshot("2", "Bob")]);

        assert_eq!(manager.refresh(&source, now).await.unwrap(), 2);
        assert_eq!(manager.refresh(&source, now + Duration::hours(1)).await.unwrap(), 0);
        assert_eq!(manager.repository().contact_count().unwrap(), 2);

        let sections = manager.sections(&now);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].grouping, DateGrouping::Today);
    }

    #[tokio::test]
    async fn test_refresh_failure_is_contact_query_error() {
        let mut manager = manager();
        let err = manager.refresh(&DeniedSource, Utc::now()).await.unwrap_err();
        assert!(matches!(err, FollowUpError::ContactQuery(_)));
        assert!(manager.store().is_empty());
    }

    #[test]
    fn test_actions_persist() {
        let now = at("2024-10-29T10:00:00Z");
        let mut manager = manager();
        manager.import(&[snapshot("1", "Jane Doe")], now).unwrap();

        manager.highlight("1").unwrap();
        manager.add_to_follow_ups("1").unwrap();
        let jane = manager.mark_as_followed_up("1", now).unwrap();
        assert_eq!(jane.follow_up_count, 1);

        let tags = manager.add_tag("1", "climbing").unwrap().to_vec();
        manager.add_tag("1", "work").unwrap();
        manager.reorder_tag("1", &tags[0].id, 5).unwrap();

        let reloaded = manager.repository().load_contacts().unwrap();
        let jane = &reloaded[0];
        assert!(jane.highlighted && jane.contained_in_follow_ups);
        assert_eq!(jane.follow_up_count, 1);
        let titles: Vec<_> = jane.tags.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["work", "climbing"]);

        manager.unhighlight("1").unwrap();
        manager.remove_from_follow_ups("1").unwrap();
        assert!(!manager.contact("1").unwrap().highlighted);
    }

    #[test]
    fn test_failed_edits_do_not_persist() {
        let now = at("2024-10-29T10:00:00Z");
        let mut manager = manager();
        manager.import(&[snapshot("1", "Jane Doe")], now).unwrap();
        manager.add_tag("1", "climbing").unwrap();

        assert!(manager.add_tag("1", "").is_err());
        assert!(manager.recolour_tag("1", "ghost", TagColour::Red).is_err());
        assert!(manager.highlight("missing").is_err());

        let reloaded = manager.repository().load_contacts().unwrap();
        assert_eq!(reloaded[0].tags.len(), 1);
        assert_eq!(reloaded[0].tags[0].colour, TagColour::Grey);
    }

    /// Wraps a real store and rejects batch writes while `failing` is set.
    struct FlakyRepository {
        inner: SqliteStore,
        failing: bool,
    }

    impl FlakyRepository {
        fn check(&self) -> Result<()> {
            if self.failing {
                return Err(FollowUpError::Storage(rusqlite::Error::QueryReturnedNoRows));
            }
            Ok(())
        }
    }

    impl ContactRepository for FlakyRepository {
        fn load_contacts(&self) -> Result<Vec<Contact>> {
            self.inner.load_contacts()
        }

        fn save_contact(&mut self, contact: &Contact) -> Result<()> {
            self.check()?;
            self.inner.save_contact(contact)
        }

        fn save_contacts(&mut self, contacts: &[Contact]) -> Result<()> {
            self.check()?;
            self.inner.save_contacts(contacts)
        }

        fn save_tags(&mut self, contact_id: &str, tags: &[Tag]) -> Result<()> {
            self.check()?;
            self.inner.save_tags(contact_id, tags)
        }

        fn delete_contact(&mut self, contact_id: &str) -> Result<()> {
            self.check()?;
            self.inner.delete_contact(contact_id)
        }

        fn delete_contacts(&mut self, contact_ids: &[String]) -> Result<()> {
            self.check()?;
            self.inner.delete_contacts(contact_ids)
        }
    }

    #[test]
    fn test_failed_import_can_be_retried() {
        let now = at("2024-10-29T10:00:00Z");
        let repository = FlakyRepository {
            inner: SqliteStore::open_in_memory().unwrap(),
            failing: true,
        };
        let mut manager = FollowUpManager::load(repository, WeekStart::Monday).unwrap();
        let batch = [snapshot("a", "Ann"), snapshot("b", "Ben"), snapshot("c", "Cy")];

        assert!(manager.import(&batch, now).is_err());
        assert!(manager.store().is_empty());
        assert_eq!(manager.repository().inner.contact_count().unwrap(), 0);

        manager.repository.failing = false;
        assert_eq!(manager.import(&batch, now).unwrap(), 3);
        assert_eq!(manager.repository().inner.contact_count().unwrap(), 3);
        assert_eq!(manager.store().len(), 3);
    }

    #[test]
    fn test_failed_removal_keeps_contacts() {
        let now = at("2024-10-29T10:00:00Z");
        let repository = FlakyRepository {
            inner: SqliteStore::open_in_memory().unwrap(),
            failing: false,
        };
        let mut manager = FollowUpManager::load(repository, WeekStart::Monday).unwrap();
        manager
            .import(&[snapshot("a", "Ann"), snapshot("b", "Ben")], now)
            .unwrap();

        manager.repository.failing = true;
        let ids = vec!["a".to_string(), "b".to_string()];
        assert!(manager.remove_contacts(&ids).is_err());
        assert_eq!(manager.store().len(), 2);
        assert_eq!(manager.repository().inner.contact_count().unwrap(), 2);

        manager.repository.failing = false;
        assert_eq!(manager.remove_contacts(&ids).unwrap(), 2);
        assert!(manager.store().is_empty());
    }

    #[test]
    fn test_remove_contacts() {
        let now = at("2024-10-29T10:00:00Z");
        let mut manager = manager();
        manager
            .import(&[snapshot("1", "Jane"), snapshot("2", "Bob")], now)
            .unwrap();
        assert_eq!(manager.remove_contacts(&["1".to_string()]).unwrap(), 1);
        assert_eq!(manager.repository().contact_count().unwrap(), 1);
        assert!(manager.contact("1").is_err());
    }
}
