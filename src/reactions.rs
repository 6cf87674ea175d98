use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{debug, warn};

use crate::model::{Post, Reaction};
use crate::storage::Store;

/// Fixed storage key holding the JSON reaction map.
pub const REACTIONS_KEY: &str = "reactions";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionKind {
    Like,
    Dislike,
}

/// Applies a like or dislike to `post`. Repeating the same reaction clears
/// it; choosing one always clears the other.
pub fn apply(post: &mut Post, kind: ReactionKind) {
    match kind {
        ReactionKind::Like => {
            post.like = !post.like;
            post.dislike = false;
        }
        ReactionKind::Dislike => {
            post.dislike = !post.dislike;
            post.like = false;
        }
    }
}

pub struct ReactionStore {
    store: Arc<Store>,
    // Entries read from storage for posts this session has not loaded yet.
    carried: BTreeMap<String, Reaction>,
}

impl ReactionStore {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            carried: BTreeMap::new(),
        }
    }

    /// Reads the persisted map. Missing or malformed data reads as empty.
    pub fn load(&self) -> BTreeMap<String, Reaction> {
        let raw = match self.store.get(REACTIONS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return BTreeMap::new(),
            Err(err) => {
                warn!("reactions: read failed: {err:#}");
                return BTreeMap::new();
            }
        };
        match serde_json::from_str::<BTreeMap<String, Reaction>>(&raw) {
            Ok(map) => map,
            Err(err) => {
                warn!("reactions: ignoring malformed stored value: {err}");
                BTreeMap::new()
            }
        }
    }

    /// Merges stored flags into freshly appended posts; posts without a
    /// stored entry get the default (no reaction).
    pub fn reload(&mut self, appended: &mut [Post]) {
        let stored = self.load();
        for post in appended.iter_mut() {
            let reaction = stored.get(post.id.as_str()).copied().unwrap_or_default();
            post.set_reaction(reaction);
        }
        self.carried = stored;
        for post in appended.iter() {
            self.carried.remove(post.id.as_str());
        }
        debug!(
            "reactions: merged into {} posts, {} carried entries",
            appended.len(),
            self.carried.len()
        );
    }

    /// Overwrites the stored map with the reactions of the whole feed.
    pub fn persist(&mut self, feed: &[Post]) -> Result<()> {
        let mut map: BTreeMap<String, Reaction> = self
            .carried
            .iter()
            .filter(|(_, reaction)| !reaction.is_empty())
            .map(|(id, reaction)| (id.clone(), *reaction))
            .collect();
        for post in feed {
            self.carried.remove(post.id.as_str());
            map.insert(post.id.to_string(), post.reaction());
        }
        let encoded = serde_json::to_string(&map).context("reactions: encode map")?;
        self.store
            .put(REACTIONS_KEY, &encoded)
            .context("reactions: persist")?;
        debug!("reactions: persisted {} entries", map.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(ids: &[&str]) -> Vec<Post> {
        ids.iter().map(|id| Post::new(*id, id)).collect()
    }

    fn store() -> Arc<Store> {
        Arc::new(Store::open_in_memory().unwrap())
    }

    #[test]
    fn like_then_dislike_leaves_only_dislike() {
        let mut post = Post::new("1", "one");
        apply(&mut post, ReactionKind::Like);
        apply(&mut post, ReactionKind::Dislike);
        assert!(!post.like);
        assert!(post.dislike);
    }

    #[test]
    fn flags_never_both_set() {
        let mut post = Post::new("1", "one");
        let sequence = [
            ReactionKind::Like,
            ReactionKind::Like,
            ReactionKind::Dislike,
            ReactionKind::Like,
            ReactionKind::Dislike,
            ReactionKind::Dislike,
            ReactionKind::Like,
        ];
        for kind in sequence {
            apply(&mut post, kind);
            assert!(!(post.like && post.dislike));
            match kind {
                ReactionKind::Like => assert!(!post.dislike),
                ReactionKind::Dislike => assert!(!post.like),
            }
        }
    }

    #[test]
    fn repeating_a_reaction_clears_it() {
        let mut post = Post::new("1", "one");
        apply(&mut post, ReactionKind::Like);
        apply(&mut post, ReactionKind::Like);
        assert_eq!(post.reaction(), Reaction::default());
    }

    #[test]
    fn persist_then_reload_round_trips() {
        let store = store();
        let mut reactions = ReactionStore::new(store.clone());
        let mut posts = feed(&["a", "b", "c"]);
        apply(&mut posts[0], ReactionKind::Like);
        apply(&mut posts[2], ReactionKind::Dislike);
        reactions.persist(&posts).unwrap();

        let mut fresh = feed(&["a", "b", "c"]);
        ReactionStore::new(store).reload(&mut fresh);
        for (before, after) in posts.iter().zip(fresh.iter()) {
            assert_eq!(before.reaction(), after.reaction());
        }
    }

    #[test]
    fn malformed_storage_reads_as_defaults() {
        let store = store();
        store.put(REACTIONS_KEY, "not json").unwrap();
        let mut reactions = ReactionStore::new(store);
        let mut posts = feed(&["a"]);
        posts[0].like = true;
        reactions.reload(&mut posts);
        assert_eq!(posts[0].reaction(), Reaction::default());
    }

    #[test]
    fn unseen_entries_survive_persist() {
        let store = store();
        let mut first = ReactionStore::new(store.clone());
        let mut posts = feed(&["a", "b"]);
        apply(&mut posts[1], ReactionKind::Like);
        first.persist(&posts).unwrap();

        let mut second = ReactionStore::new(store.clone());
        let mut shorter = feed(&["a"]);
        second.reload(&mut shorter);
        apply(&mut shorter[0], ReactionKind::Dislike);
        second.persist(&shorter).unwrap();

        let map = second.load();
        assert_eq!(map.get("b").map(|r| r.like), Some(true));
        assert_eq!(map.get("a").map(|r| r.dislike), Some(true));
    }
}
