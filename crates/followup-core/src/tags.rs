//! Freeform contact tags.
//!
//! Every operation takes the contact's current ordered tag list and returns the
//! new list to persist. The input is never touched, so on error the caller still
//! holds the last good list.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{FollowUpError, Result};

/// Fixed palette a tag can be painted with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TagColour {
    #[default]
    Grey,
    Red,
    Orange,
    Yellow,
    Green,
    Teal,
    Blue,
    Indigo,
    Purple,
    Pink,
}

impl TagColour {
    pub fn all() -> Vec<TagColour> {
        vec![
            TagColour::Grey,
            TagColour::Red,
            TagColour::Orange,
            TagColour::Yellow,
            TagColour::Green,
            TagColour::Teal,
            TagColour::Blue,
            TagColour::Indigo,
            TagColour::Purple,
            TagColour::Pink,
        ]
    }

    /// The colour after this one in the palette, wrapping around.
    pub fn next(&self) -> TagColour {
        let all = Self::all();
        let idx = all.iter().position(|c| c == self).unwrap_or(0);
        all[(idx + 1) % all.len()]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TagColour::Grey => "grey",
            TagColour::Red => "red",
            TagColour::Orange => "orange",
            TagColour::Yellow => "yellow",
            TagColour::Green => "green",
            TagColour::Teal => "teal",
            TagColour::Blue => "blue",
            TagColour::Indigo => "indigo",
            TagColour::Purple => "purple",
            TagColour::Pink => "pink",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim().to_lowercase();
        Self::all().into_iter().find(|c| c.as_str() == s || (s == "gray" && *c == TagColour::Grey))
    }
}

/// A user-named label attached to a contact. Two tags are equal when their ids are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub colour: TagColour,
}

impl Tag {
    pub fn new(title: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            colour: TagColour::default(),
        }
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Tag {}

fn position_of(list: &[Tag], tag_id: &str) -> Option<usize> {
    list.iter().position(|t| t.id == tag_id)
}

/// Append a new tag with a fresh id and the default colour.
pub fn add_tag(list: &[Tag], title: &str) -> Result<Vec<Tag>> {
    let title = title.trim();
    if title.is_empty() {
        return Err(FollowUpError::Validation(
            "tag title must not be empty".to_string(),
        ));
    }

    let mut tags = list.to_vec();
    tags.push(Tag::new(title));
    Ok(tags)
}

/// Remove the tag with `tag_id`. Absent ids leave the list as it was.
pub fn remove_tag(list: &[Tag], tag_id: &str) -> Vec<Tag> {
    list.iter().filter(|t| t.id != tag_id).cloned().collect()
}

/// Move `moved_tag_id` to `to_index`, clamped to the end of the list.
pub fn reorder(list: &[Tag], moved_tag_id: &str, to_index: usize) -> Result<Vec<Tag>> {
    let from = position_of(list, moved_tag_id)
        .ok_or_else(|| FollowUpError::TagNotFound(moved_tag_id.to_string()))?;

    let mut tags = list.to_vec();
    let moved = tags.remove(from);
    let to = to_index.min(tags.len());
    tags.insert(to, moved);
    Ok(tags)
}

pub fn recolour(list: &[Tag], tag_id: &str, colour: TagColour) -> Result<Vec<Tag>> {
    let idx =
        position_of(list, tag_id).ok_or_else(|| FollowUpError::TagNotFound(tag_id.to_string()))?;

    let mut tags = list.to_vec();
    tags[idx].colour = colour;
    Ok(tags)
}

/// Interactive tag editing with optimistic drag-to-reorder.
///
/// `committed` is the source of truth. While a drag is in flight `working`
/// carries the provisional order shown to the user; dropping commits it through
/// [`reorder`], cancelling throws it away.
#[derive(Debug, Clone)]
pub struct TagBoard {
    committed: Vec<Tag>,
    working: Vec<Tag>,
    dragging: Option<String>,
}

impl TagBoard {
    pub fn new(tags: Vec<Tag>) -> Self {
        Self {
            working: tags.clone(),
            committed: tags,
            dragging: None,
        }
    }

    /// The list to display: the provisional order while dragging.
    pub fn tags(&self) -> &[Tag] {
        &self.working
    }

    pub fn committed(&self) -> &[Tag] {
        &self.committed
    }

    pub fn dragging(&self) -> Option<&str> {
        self.dragging.as_deref()
    }

    pub fn begin_drag(&mut self, tag_id: &str) -> Result<()> {
        if position_of(&self.committed, tag_id).is_none() {
            return Err(FollowUpError::TagNotFound(tag_id.to_string()));
        }
        self.working = self.committed.clone();
        self.dragging = Some(tag_id.to_string());
        Ok(())
    }

    /// The dragged tag hovers over `target_id`: move it into the target's slot.
    pub fn drag_over(&mut self, target_id: &str) {
        let Some(dragged) = self.dragging.as_deref() else {
            return;
        };
        if dragged == target_id {
            return;
        }
        let (Some(from), Some(to)) = (
            position_of(&self.working, dragged),
            position_of(&self.working, target_id),
        ) else {
            return;
        };

        let moved = self.working.remove(from);
        self.working.insert(to, moved);
    }

    /// Finish the drag. Returns the new committed list to persist, or `None`
    /// when no drag was in flight.
    pub fn commit_drag(&mut self) -> Option<Result<Vec<Tag>>> {
        let dragged = self.dragging.take()?;
        let Some(to) = position_of(&self.working, &dragged) else {
            self.working = self.committed.clone();
            return Some(Err(FollowUpError::TagNotFound(dragged)));
        };

        let result = reorder(&self.committed, &dragged, to);
        match &result {
            Ok(tags) => {
                log::debug!("Committed tag order after dragging {dragged}");
                self.committed = tags.clone();
                self.working = tags.clone();
            }
            Err(_) => self.working = self.committed.clone(),
        }
        Some(result)
    }

    /// Abandon the drag and show the last committed order again.
    pub fn cancel_drag(&mut self) {
        self.dragging = None;
        self.working = self.committed.clone();
    }

    pub fn add(&mut self, title: &str) -> Result<Vec<Tag>> {
        let tags = add_tag(&self.committed, title)?;
        Ok(self.commit(tags))
    }

    pub fn remove(&mut self, tag_id: &str) -> Vec<Tag> {
        let tags = remove_tag(&self.committed, tag_id);
        self.commit(tags)
    }

    pub fn recolour(&mut self, tag_id: &str, colour: TagColour) -> Result<Vec<Tag>> {
        let tags = recolour(&self.committed, tag_id, colour)?;
        Ok(self.commit(tags))
    }

    /// Tap-to-recolour: paint the tag with the next palette colour.
    pub fn cycle_colour(&mut self, tag_id: &str) -> Result<Vec<Tag>> {
        let current = self
            .committed
            .iter()
            .find(|t| t.id == tag_id)
            .map(|t| t.colour)
            .ok_or_else(|| FollowUpError::TagNotFound(tag_id.to_string()))?;
        self.recolour(tag_id, current.next())
    }

    fn commit(&mut self, tags: Vec<Tag>) -> Vec<Tag> {
        self.dragging = None;
        self.committed = tags.clone();
        self.working = tags.clone();
        tags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titles(tags: &[Tag]) -> Vec<&str> {
        tags.iter().map(|t| t.title.as_str()).collect()
    }

    fn sample() -> Vec<Tag> {
        let tags = add_tag(&[], "A").unwrap();
        add_tag(&tags, "B").unwrap()
    }

    #[test]
    fn test_add_then_move_to_front() {
        let tags = add_tag(&sample(), "C").unwrap();
        let c_id = tags[2].id.clone();
        let tags = reorder(&tags, &c_id, 0).unwrap();
        assert_eq!(titles(&tags), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_add_trims_and_rejects_blank_titles() {
        let tags = add_tag(&[], "  work  ").unwrap();
        assert_eq!(tags[0].title, "work");
        assert_eq!(tags[0].colour, TagColour::Grey);

        let err = add_tag(&tags, "   ").unwrap_err();
        assert!(matches!(err, FollowUpError::Validation(_)));
    }

    #[test]
    fn test_add_then_remove_round_trips() {
        let original = sample();
        let added = add_tag(&original, "x").unwrap();
        let new_id = added.last().unwrap().id.clone();
        assert!(original.iter().all(|t| t.id != new_id));

        let restored = remove_tag(&added, &new_id);
        assert_eq!(restored, original);
        assert_eq!(titles(&restored), titles(&original));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let original = sample();
        let tags = remove_tag(&original, "missing");
        assert_eq!(tags, original);
    }

    #[test]
    fn test_reorder_preserves_ids_and_length() {
        let tags = add_tag(&sample(), "C").unwrap();
        let a_id = tags[0].id.clone();
        let moved = reorder(&tags, &a_id, 99).unwrap();

        assert_eq!(moved.len(), tags.len());
        assert_eq!(titles(&moved), vec!["B", "C", "A"]);
        let mut before: Vec<_> = tags.iter().map(|t| t.id.clone()).collect();
        let mut after: Vec<_> = moved.iter().map(|t| t.id.clone()).collect();
        before.sort();
        after.sort();
        assert_eq!(before, after);
    }

    #[test]
    fn test_reorder_missing_tag() {
        let err = reorder(&sample(), "nope", 0).unwrap_err();
        assert!(matches!(err, FollowUpError::TagNotFound(id) if id == "nope"));
    }

    #[test]
    fn test_recolour_keeps_id() {
        let tags = sample();
        let b_id = tags[1].id.clone();
        let painted = recolour(&tags, &b_id, TagColour::Teal).unwrap();
        assert_eq!(painted[1].id, b_id);
        assert_eq!(painted[1].colour, TagColour::Teal);
        assert_eq!(painted[0].colour, TagColour::Grey);
    }

    #[test]
    fn test_recolour_missing_leaves_list_unchanged() {
        let tags = sample();
        let snapshot = tags.clone();
        let err = recolour(&tags, "ghost", TagColour::Red).unwrap_err();
        assert!(matches!(err, FollowUpError::TagNotFound(_)));
        assert_eq!(tags, snapshot);
        assert!(tags.iter().zip(&snapshot).all(|(a, b)| a.colour == b.colour));
    }

    #[test]
    fn test_colour_cycle_wraps() {
        assert_eq!(TagColour::Grey.next(), TagColour::Red);
        assert_eq!(TagColour::Pink.next(), TagColour::Grey);
        assert_eq!(TagColour::from_str("Gray"), Some(TagColour::Grey));
        assert_eq!(TagColour::from_str("teal"), Some(TagColour::Teal));
        assert_eq!(TagColour::from_str("chartreuse"), None);
    }

    #[test]
    fn test_board_drag_and_drop_commits() {
        let tags = add_tag(&sample(), "C").unwrap();
        let (a, c) = (tags[0].id.clone(), tags[2].id.clone());
        let mut board = TagBoard::new(tags);

        board.begin_drag(&c).unwrap();
        board.drag_over(&a);
        assert_eq!(titles(board.tags()), vec!["C", "A", "B"]);
        assert_eq!(titles(board.committed()), vec!["A", "B", "C"]);

        let committed = board.commit_drag().unwrap().unwrap();
        assert_eq!(titles(&committed), vec!["C", "A", "B"]);
        assert_eq!(titles(board.committed()), vec!["C", "A", "B"]);
        assert!(board.dragging().is_none());
    }

    #[test]
    fn test_board_cancel_reverts() {
        let tags = add_tag(&sample(), "C").unwrap();
        let (a, c) = (tags[0].id.clone(), tags[2].id.clone());
        let mut board = TagBoard::new(tags);

        board.begin_drag(&a).unwrap();
        board.drag_over(&c);
        assert_eq!(titles(board.tags()), vec!["B", "C", "A"]);

        board.cancel_drag();
        assert_eq!(titles(board.tags()), vec!["A", "B", "C"]);
        assert!(board.commit_drag().is_none());
    }

    #[test]
    fn test_board_edits_reset_working_copy() {
        let mut board = TagBoard::new(sample());
        let a = board.committed()[0].id.clone();
        let b = board.committed()[1].id.clone();

        board.begin_drag(&b).unwrap();
        board.drag_over(&a);
        let tags = board.add("C").unwrap();
        assert_eq!(titles(&tags), vec!["A", "B", "C"]);
        assert_eq!(titles(board.tags()), vec!["A", "B", "C"]);
        assert!(board.dragging().is_none());

        let tags = board.cycle_colour(&a).unwrap();
        assert_eq!(tags[0].colour, TagColour::Red);
        assert!(board.begin_drag("ghost").is_err());
    }
}
