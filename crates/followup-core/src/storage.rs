//! Durable storage for contacts and their ordered tags.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::contact::Contact;
use crate::error::Result;
use crate::tags::{Tag, TagColour};

/// Persistence collaborator. Implementations must keep tag order and ids as given.
pub trait ContactRepository {
    fn load_contacts(&self) -> Result<Vec<Contact>>;

    /// Insert or replace a contact together with its tags.
    fn save_contact(&mut self, contact: &Contact) -> Result<()>;

    /// Insert or replace all of `contacts`, or none of them.
    fn save_contacts(&mut self, contacts: &[Contact]) -> Result<()>;

    fn save_tags(&mut self, contact_id: &str, tags: &[Tag]) -> Result<()>;

    fn delete_contact(&mut self, contact_id: &str) -> Result<()>;

    /// Delete all of `contact_ids`, or none of them.
    fn delete_contacts(&mut self, contact_ids: &[String]) -> Result<()>;
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;
            CREATE TABLE IF NOT EXISTS contacts (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                phone_number TEXT,
                note TEXT,
                create_date INTEGER NOT NULL,
                last_followed_up INTEGER,
                follow_up_count INTEGER NOT NULL DEFAULT 0,
                highlighted INTEGER NOT NULL DEFAULT 0,
                contained_in_follow_ups INTEGER NOT NULL DEFAULT 0
            );
            CREATE TABLE IF NOT EXISTS tags (
                id TEXT NOT NULL,
                contact_id TEXT NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
                position INTEGER NOT NULL,
                title TEXT NOT NULL,
                colour TEXT NOT NULL,
                PRIMARY KEY (contact_id, id)
            );
            "#,
        )?;
        Ok(Self { conn })
    }

    pub fn contact_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM contacts", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn last_followed_up(&self, contact_id: &str) -> Result<Option<DateTime<Utc>>> {
        let millis: Option<Option<i64>> = self
            .conn
            .query_row(
                "SELECT last_followed_up FROM contacts WHERE id = ?1",
                params![contact_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(millis.flatten().and_then(from_millis))
    }

    fn load_tags(&self, contact_id: &str) -> Result<Vec<Tag>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, colour FROM tags WHERE contact_id = ?1 ORDER BY position ASC",
        )?;
        let rows = stmt.query_map(params![contact_id], |row| {
            let colour: String = row.get(2)?;
            Ok(Tag {
                id: row.get(0)?,
                title: row.get(1)?,
                colour: TagColour::from_str(&colour).unwrap_or_default(),
            })
        })?;

        let mut tags = Vec::new();
        for tag in rows {
            tags.push(tag?);
        }
        Ok(tags)
    }
}

fn from_millis(millis: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
}

fn write_tags(tx: &rusqlite::Transaction, contact_id: &str, tags: &[Tag]) -> Result<()> {
    tx.execute("DELETE FROM tags WHERE contact_id = ?1", params![contact_id])?;
    for (position, tag) in tags.iter().enumerate() {
        tx.execute(
            "INSERT INTO tags (id, contact_id, position, title, colour) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![tag.id, contact_id, position as i64, tag.title, tag.colour.as_str()],
        )?;
    }
    Ok(())
}

fn write_contact(tx: &rusqlite::Transaction, contact: &Contact) -> Result<()> {
    tx.execute(
        r#"
        INSERT INTO contacts (id, name, phone_number, note, create_date, last_followed_up,
                              follow_up_count, highlighted, contained_in_follow_ups)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(id) DO UPDATE SET
            name=excluded.name,
            phone_number=excluded.phone_number,
            note=excluded.note,
            create_date=excluded.create_date,
            last_followed_up=excluded.last_followed_up,
            follow_up_count=excluded.follow_up_count,
            highlighted=excluded.highlighted,
            contained_in_follow_ups=excluded.contained_in_follow_ups
        "#,
        params![
            contact.id,
            contact.name,
            contact.phone_number,
            contact.note,
            contact.create_date.timestamp_millis(),
            contact.last_followed_up.map(|d| d.timestamp_millis()),
            contact.follow_up_count as i64,
            contact.highlighted,
            contact.contained_in_follow_ups,
        ],
    )?;
    write_tags(tx, &contact.id, &contact.tags)
}

impl ContactRepository for SqliteStore {
    fn load_contacts(&self) -> Result<Vec<Contact>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, name, phone_number, note, create_date, last_followed_up,
                   follow_up_count, highlighted, contained_in_follow_ups
            FROM contacts ORDER BY id
            "#,
        )?;
        let rows = stmt.query_map([], |row| {
            let create_date: i64 = row.get(4)?;
            let last_followed_up: Option<i64> = row.get(5)?;
            let follow_up_count: i64 = row.get(6)?;
            Ok(Contact {
                id: row.get(0)?,
                name: row.get(1)?,
                phone_number: row.get(2)?,
                note: row.get(3)?,
                create_date: from_millis(create_date).unwrap_or_default(),
                last_followed_up: last_followed_up.and_then(from_millis),
                follow_up_count: follow_up_count.max(0) as u32,
                highlighted: row.get(7)?,
                contained_in_follow_ups: row.get(8)?,
                tags: Vec::new(),
            })
        })?;

        let mut contacts = Vec::new();
        for contact in rows {
            let mut contact = contact?;
            contact.tags = self.load_tags(&contact.id)?;
            contacts.push(contact);
        }
        Ok(contacts)
    }

    fn save_contact(&mut self, contact: &Contact) -> Result<()> {
        self.save_contacts(std::slice::from_ref(contact))
    }

    fn save_contacts(&mut self, contacts: &[Contact]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for contact in contacts {
            write_contact(&tx, contact)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn save_tags(&mut self, contact_id: &str, tags: &[Tag]) -> Result<()> {
        let tx = self.conn.transaction()?;
        write_tags(&tx, contact_id, tags)?;
        tx.commit()?;
        log::debug!("Persisted {} tags for {}", tags.len(), contact_id);
        Ok(())
    }

    fn delete_contact(&mut self, contact_id: &str) -> Result<()> {
        self.delete_contacts(&[contact_id.to_string()])
    }

    fn delete_contacts(&mut self, contact_ids: &[String]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for id in contact_ids {
            tx.execute("DELETE FROM contacts WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{add_tag, recolour, reorder};
    use tempfile::TempDir;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn jane() -> Contact {
        let mut contact = Contact::new("1", "Jane Doe", at("2024-10-29T08:00:00Z"));
        contact.phone_number = Some("+447700900123".to_string());
        contact.note = Some("Met at the climbing wall".to_string());
        contact.mark_as_followed_up(at("2024-10-29T12:30:00Z"));
        contact.highlight();
        contact
    }

    #[test]
    fn test_contact_round_trip_on_disk() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("followup.sqlite");

        let mut contact = jane();
        let tags = add_tag(&[], "climbing").unwrap();
        let tags = add_tag(&tags, "work").unwrap();
        contact.tags = recolour(&tags, &tags[1].id, TagColour::Blue).unwrap();

        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.save_contact(&contact).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let loaded = store.load_contacts().unwrap();
        assert_eq!(loaded, vec![contact.clone()]);
        assert_eq!(loaded[0].tags[1].colour, TagColour::Blue);
        assert_eq!(
            store.last_followed_up("1").unwrap(),
            Some(at("2024-10-29T12:30:00Z"))
        );
        assert_eq!(store.last_followed_up("404").unwrap(), None);
    }

    #[test]
    fn test_now_round_trips_exactly() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut contact = Contact::new("1", "Jane", Utc::now());
        contact.mark_as_followed_up(Utc::now());
        store.save_contact(&contact).unwrap();

        let loaded = store.load_contacts().unwrap();
        assert_eq!(loaded[0].create_date, contact.create_date);
        assert_eq!(loaded[0].last_followed_up, contact.last_followed_up);
    }

    #[test]
    fn test_tag_order_and_ids_survive() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let contact = jane();
        store.save_contact(&contact).unwrap();

        let tags = add_tag(&[], "A").unwrap();
        let tags = add_tag(&tags, "B").unwrap();
        let tags = add_tag(&tags, "C").unwrap();
        let tags = reorder(&tags, &tags[2].id.clone(), 0).unwrap();
        store.save_tags(&contact.id, &tags).unwrap();

        let loaded = store.load_contacts().unwrap();
        let titles: Vec<_> = loaded[0].tags.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["C", "A", "B"]);
        let ids: Vec<_> = loaded[0].tags.iter().map(|t| t.id.clone()).collect();
        let expected: Vec<_> = tags.iter().map(|t| t.id.clone()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_open_reports_unusable_directory() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = SqliteStore::open(&blocker.join("followup.sqlite")).err().unwrap();
        assert!(matches!(err, crate::error::FollowUpError::Io(_)));
    }

    #[test]
    fn test_batch_save_is_all_or_nothing() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let first = Contact::new("1", "Jane", at("2024-10-29T08:00:00Z"));
        let second = Contact::new("2", "Bob", at("2024-10-29T09:00:00Z"));
        store.save_contacts(&[first.clone(), second]).unwrap();
        assert_eq!(store.contact_count().unwrap(), 2);

        // Duplicate tag ids violate the (contact_id, id) key and abort the batch.
        let mut renamed = first.clone();
        renamed.name = "Jane Doe".to_string();
        let mut broken = Contact::new("3", "Cy", at("2024-10-29T10:00:00Z"));
        let tag = add_tag(&[], "dup").unwrap().remove(0);
        broken.tags = vec![tag.clone(), tag];
        assert!(store.save_contacts(&[renamed, broken]).is_err());

        let loaded = store.load_contacts().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].name, "Jane");

        store
            .delete_contacts(&["1".to_string(), "2".to_string()])
            .unwrap();
        assert_eq!(store.contact_count().unwrap(), 0);
    }

    #[test]
    fn test_delete_cascades_tags() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut contact = jane();
        contact.tags = add_tag(&[], "A").unwrap();
        store.save_contact(&contact).unwrap();
        assert_eq!(store.contact_count().unwrap(), 1);

        store.delete_contact(&contact.id).unwrap();
        assert_eq!(store.contact_count().unwrap(), 0);
        assert!(store.load_tags(&contact.id).unwrap().is_empty());
    }
}
