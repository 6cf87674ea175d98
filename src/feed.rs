use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use log::{debug, info, warn};
use url::Url;

use crate::client::LoadError;
use crate::data::FeedSource;
use crate::loader::{LoadResult, Loader, Request};
use crate::model::{Post, PostId};
use crate::navigation::{Cursor, ViewportScroller};
use crate::reactions::{self, ReactionKind, ReactionStore};
use crate::share::{self, Clipboard, DeepLink, LinkError, LinkScheme, ShareError};
use crate::storage::Store;

pub const DEFAULT_PREFETCH_THRESHOLD: usize = 3;

#[derive(Debug, Clone)]
pub struct Options {
    pub prefetch_threshold: usize,
    pub link_scheme: LinkScheme,
    pub base_url: Url,
}

/// Outcome of applying a finished fetch.
#[derive(Debug)]
pub enum Update {
    Appended(usize),
    Unchanged,
    Failed(LoadError),
}

/// The feed component: the post list, the cursor into it, reactions and
/// share links. All methods run on the caller's thread; only fetches run in
/// the background.
pub struct FeedView {
    posts: Vec<Post>,
    cursor: Cursor,
    loader: Loader,
    reactions: ReactionStore,
    scroller: Box<dyn ViewportScroller>,
    clipboard: Box<dyn Clipboard>,
    options: Options,
    pending_link: Option<PostId>,
    dirty: bool,
}

impl FeedView {
    pub fn new(
        source: Arc<dyn FeedSource>,
        store: Arc<Store>,
        scroller: Box<dyn ViewportScroller>,
        clipboard: Box<dyn Clipboard>,
        options: Options,
    ) -> Self {
        Self {
            posts: Vec::new(),
            cursor: Cursor::pending(),
            loader: Loader::new(source),
            reactions: ReactionStore::new(store),
            scroller,
            clipboard,
            options,
            pending_link: None,
            dirty: true,
        }
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor.get()
    }

    pub fn current(&self) -> Option<&Post> {
        self.cursor
            .valid(self.posts.len())
            .and_then(|index| self.posts.get(index))
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_loading()
    }

    pub fn loads_requested(&self) -> u64 {
        self.loader.requested()
    }

    pub fn pending_link(&self) -> Option<&PostId> {
        self.pending_link.as_ref()
    }

    /// Returns and clears the re-render flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Applies the `postId` parameter of the startup link. A positional link
    /// moves the cursor immediately, without bounds checks; an id link waits
    /// until the post shows up in the feed.
    pub fn decode_startup(&mut self, link: &str) -> Result<(), LinkError> {
        match share::decode(link, self.options.link_scheme)? {
            Some(DeepLink::Position(index)) => {
                info!("deep link: starting at position {}", index + 1);
                self.cursor.set(index);
                self.dirty = true;
            }
            Some(DeepLink::Id(id)) => {
                info!("deep link: waiting for post {id}");
                self.pending_link = Some(id);
                self.resolve_pending_link(0);
            }
            None => {}
        }
        Ok(())
    }

    pub fn load_more(&mut self) {
        if self.loader.request() == Request::Queued {
            debug!("feed: fetch already running, queued follow-up");
        }
        self.dirty = true;
    }

    /// Applies any finished fetch without blocking.
    pub fn poll(&mut self) -> Option<Update> {
        let result = self.loader.poll()?;
        Some(self.apply(result))
    }

    /// Blocks up to `timeout` for the running fetch and applies it.
    pub fn wait(&mut self, timeout: Duration) -> Option<Update> {
        let result = self.loader.wait(timeout)?;
        Some(self.apply(result))
    }

    /// Applies fetches until the loader goes idle or `timeout` elapses,
    /// including prefetches chained by earlier appends.
    pub fn settle(&mut self, timeout: Duration) -> Vec<Update> {
        let deadline = Instant::now() + timeout;
        let mut updates = Vec::new();
        while self.is_loading() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            if let Some(update) = self.wait(remaining) {
                updates.push(update);
            }
        }
        updates
    }

    fn apply(&mut self, result: LoadResult) -> Update {
        let incoming = match result {
            Ok(posts) => posts,
            Err(err) => {
                warn!("feed: load dropped: {err}");
                self.dirty = true;
                return Update::Failed(err);
            }
        };

        let start = self.posts.len();
        let was_valid = self.cursor.valid(start).is_some();
        if incoming.len() <= start {
            debug!("feed: listing has {} posts, nothing new", incoming.len());
            return Update::Unchanged;
        }

        self.posts.extend(incoming.into_iter().skip(start));
        self.reactions.reload(&mut self.posts[start..]);
        let appended = self.posts.len() - start;
        info!("feed: appended {appended} posts ({} total)", self.posts.len());

        self.cursor.start_if_pending(self.posts.len());
        if !was_valid {
            if let Some(index) = self.cursor.valid(self.posts.len()) {
                self.scroller.bring_into_view(index);
            }
        }
        self.resolve_pending_link(start);

        if self.pending_link.is_some()
            || self
                .cursor
                .near_end(self.posts.len(), self.options.prefetch_threshold)
        {
            self.load_more();
        }
        self.dirty = true;
        Update::Appended(appended)
    }

    fn resolve_pending_link(&mut self, from: usize) {
        let Some(id) = self.pending_link.as_ref() else {
            return;
        };
        let found = self
            .posts
            .iter()
            .enumerate()
            .skip(from)
            .find(|(_, post)| &post.id == id)
            .map(|(index, _)| index);
        if let Some(index) = found {
            debug!("deep link: post {id} is at position {}", index + 1);
            self.pending_link = None;
            self.cursor.set(index);
            self.scroller.bring_into_view(index);
            self.dirty = true;
        }
    }

    pub fn advance(&mut self) -> bool {
        if !self.cursor.advance(self.posts.len()) {
            return false;
        }
        self.focus_current();
        if self
            .cursor
            .near_end(self.posts.len(), self.options.prefetch_threshold)
        {
            self.load_more();
        }
        true
    }

    pub fn retreat(&mut self) -> bool {
        if !self.cursor.retreat() {
            return false;
        }
        self.focus_current();
        true
    }

    /// Direct selection. Always asks the loader for more.
    pub fn select_index(&mut self, index: usize) {
        self.cursor.set(index);
        self.focus_current();
        self.load_more();
    }

    pub fn first(&mut self) -> bool {
        if self.posts.is_empty() || self.cursor.get() == Some(0) {
            return false;
        }
        self.cursor.set(0);
        self.focus_current();
        true
    }

    pub fn last(&mut self) -> bool {
        let Some(last) = self.posts.len().checked_sub(1) else {
            return false;
        };
        if self.cursor.get() == Some(last) {
            return false;
        }
        self.cursor.set(last);
        self.focus_current();
        self.load_more();
        true
    }

    // Any user move overrides a deep link that has not resolved yet.
    fn focus_current(&mut self) {
        self.pending_link = None;
        if let Some(index) = self.cursor.get() {
            self.scroller.bring_into_view(index);
        }
        self.dirty = true;
    }

    pub fn like(&mut self) -> Result<bool> {
        self.react(ReactionKind::Like)
    }

    pub fn dislike(&mut self) -> Result<bool> {
        self.react(ReactionKind::Dislike)
    }

    /// Returns false when there is no current post.
    fn react(&mut self, kind: ReactionKind) -> Result<bool> {
        let Some(index) = self.cursor.valid(self.posts.len()) else {
            return Ok(false);
        };
        reactions::apply(&mut self.posts[index], kind);
        self.dirty = true;
        self.reactions.persist(&self.posts)?;
        Ok(true)
    }

    /// Builds the share link for the current post and copies it to the
    /// clipboard.
    pub fn share_link(&mut self) -> Result<Url, ShareError> {
        let index = self
            .cursor
            .valid(self.posts.len())
            .ok_or(ShareError::NoCurrentPost)?;
        let value = match self.options.link_scheme {
            LinkScheme::Id => self.posts[index].id.to_string(),
            LinkScheme::Position => (index + 1).to_string(),
        };
        let url = share::encode(&self.options.base_url, &value);
        self.clipboard.set_text(url.to_string())?;
        info!("share: copied {url}");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{demo_posts, StaticFeedSource};
    use std::cell::RefCell;
    use std::rc::Rc;

    const WAIT: Duration = Duration::from_secs(5);

    #[derive(Clone, Default)]
    struct RecordingScroller(Rc<RefCell<Vec<usize>>>);

    impl ViewportScroller for RecordingScroller {
        fn bring_into_view(&self, index: usize) {
            self.0.borrow_mut().push(index);
        }
    }

    #[derive(Clone, Default)]
    struct MemoryClipboard(Rc<RefCell<Option<String>>>);

    impl Clipboard for MemoryClipboard {
        fn set_text(&mut self, text: String) -> Result<(), ShareError> {
            *self.0.borrow_mut() = Some(text);
            Ok(())
        }
    }

    struct Harness {
        view: FeedView,
        scrolled: RecordingScroller,
        clipboard: MemoryClipboard,
        store: Arc<Store>,
    }

    fn options(scheme: LinkScheme) -> Options {
        Options {
            prefetch_threshold: DEFAULT_PREFETCH_THRESHOLD,
            link_scheme: scheme,
            base_url: Url::parse("http://localhost:8000/index.html").unwrap(),
        }
    }

    fn harness_with(source: StaticFeedSource, scheme: LinkScheme, store: Arc<Store>) -> Harness {
        let scrolled = RecordingScroller::default();
        let clipboard = MemoryClipboard::default();
        let view = FeedView::new(
            Arc::new(source),
            store.clone(),
            Box::new(scrolled.clone()),
            Box::new(clipboard.clone()),
            options(scheme),
        );
        Harness {
            view,
            scrolled,
            clipboard,
            store,
        }
    }

    fn harness(source: StaticFeedSource) -> Harness {
        harness_with(
            source,
            LinkScheme::Id,
            Arc::new(Store::open_in_memory().unwrap()),
        )
    }

    fn loaded(count: usize) -> Harness {
        let mut h = harness(StaticFeedSource::fixed(demo_posts(count)));
        h.view.load_more();
        h.view.settle(WAIT);
        assert_eq!(h.view.len(), count);
        h
    }

    #[test]
    fn first_load_appends_and_starts_cursor() {
        let mut h = harness(StaticFeedSource::fixed(vec![Post::new("1", "post1")]));
        assert_eq!(h.view.cursor(), None);
        h.view.load_more();
        let updates = h.view.settle(WAIT);
        assert!(matches!(updates.first(), Some(Update::Appended(1))));
        assert_eq!(h.view.len(), 1);
        assert_eq!(h.view.posts()[0].id.as_str(), "1");
        assert_eq!(h.view.cursor(), Some(0));
        assert_eq!(h.scrolled.0.borrow().first(), Some(&0));
    }

    #[test]
    fn unchanged_listing_is_a_no_op() {
        let mut h = loaded(4);
        let before: Vec<PostId> = h.view.posts().iter().map(|p| p.id.clone()).collect();
        h.view.load_more();
        let updates = h.view.settle(WAIT);
        assert!(updates.iter().all(|u| matches!(u, Update::Unchanged)));
        let after: Vec<PostId> = h.view.posts().iter().map(|p| p.id.clone()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn feed_only_grows() {
        let mut h = harness(StaticFeedSource::paged(demo_posts(20), 3));
        let mut last_len = 0;
        for _ in 0..8 {
            h.view.load_more();
            h.view.settle(WAIT);
            assert!(h.view.len() >= last_len);
            last_len = h.view.len();
        }
        let ids: Vec<String> = h.view.posts().iter().map(|p| p.id.to_string()).collect();
        let expected: Vec<String> = demo_posts(20)
            .iter()
            .take(ids.len())
            .map(|p| p.id.to_string())
            .collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn prefetch_stops_once_cursor_is_far_from_end() {
        let mut h = harness(StaticFeedSource::paged(demo_posts(9), 2));
        h.view.load_more();
        h.view.settle(WAIT);
        assert_eq!(h.view.len(), 4);
        assert!(!h.view.is_loading());
    }

    #[test]
    fn prefetch_chains_while_cursor_is_near_end() {
        let mut h = harness_with(
            StaticFeedSource::paged(demo_posts(12), 2),
            LinkScheme::Position,
            Arc::new(Store::open_in_memory().unwrap()),
        );
        h.view.decode_startup("http://localhost/?postId=9").unwrap();
        h.view.load_more();
        h.view.settle(WAIT);
        assert_eq!(h.view.len(), 12);
        assert_eq!(h.view.current().unwrap().id.as_str(), "demo-9");
        assert!(!h.view.is_loading());
    }

    #[test]
    fn advance_near_end_requests_more() {
        let mut h = loaded(10);
        h.view.select_index(6);
        h.view.settle(WAIT);
        let before = h.view.loads_requested();
        assert!(h.view.advance());
        assert_eq!(h.view.cursor(), Some(7));
        assert_eq!(h.view.loads_requested(), before + 1);
        h.view.settle(WAIT);
    }

    #[test]
    fn advance_far_from_end_does_not_load() {
        let mut h = loaded(10);
        h.view.select_index(2);
        h.view.settle(WAIT);
        let before = h.view.loads_requested();
        assert!(h.view.advance());
        assert_eq!(h.view.cursor(), Some(3));
        assert_eq!(h.view.loads_requested(), before);
    }

    #[test]
    fn navigation_stops_at_the_ends() {
        let mut h = loaded(3);
        assert!(!h.view.retreat());
        assert_eq!(h.view.cursor(), Some(0));
        assert!(h.view.advance());
        assert!(h.view.advance());
        h.view.settle(WAIT);
        assert!(!h.view.advance());
        assert_eq!(h.view.cursor(), Some(2));
        assert!(h.view.retreat());
        assert_eq!(h.view.cursor(), Some(1));
        assert_eq!(*h.scrolled.0.borrow().last().unwrap(), 1);
    }

    #[test]
    fn retreat_never_loads() {
        let mut h = loaded(5);
        h.view.last();
        h.view.settle(WAIT);
        let before = h.view.loads_requested();
        h.view.retreat();
        h.view.retreat();
        assert_eq!(h.view.loads_requested(), before);
    }

    #[test]
    fn select_index_always_loads() {
        let mut h = loaded(10);
        let before = h.view.loads_requested();
        h.view.select_index(1);
        assert_eq!(h.view.cursor(), Some(1));
        assert_eq!(h.view.loads_requested(), before + 1);
        h.view.settle(WAIT);
    }

    #[test]
    fn like_then_dislike_persists_final_state() {
        let mut h = loaded(3);
        assert!(h.view.like().unwrap());
        assert!(h.view.dislike().unwrap());
        let current = h.view.current().unwrap();
        assert!(!current.like);
        assert!(current.dislike);

        let stored = ReactionStore::new(h.store.clone()).load();
        let entry = stored.get(current.id.as_str()).unwrap();
        assert!(!entry.like);
        assert!(entry.dislike);
    }

    #[test]
    fn reactions_come_back_in_a_new_session() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let mut first = harness_with(
            StaticFeedSource::fixed(demo_posts(4)),
            LinkScheme::Id,
            store.clone(),
        );
        first.view.load_more();
        first.view.settle(WAIT);
        first.view.advance();
        first.view.like().unwrap();
        first.view.settle(WAIT);

        let mut second = harness_with(
            StaticFeedSource::fixed(demo_posts(4)),
            LinkScheme::Id,
            store,
        );
        second.view.load_more();
        second.view.settle(WAIT);
        let flags: Vec<(bool, bool)> = second
            .view
            .posts()
            .iter()
            .map(|p| (p.like, p.dislike))
            .collect();
        assert_eq!(
            flags,
            vec![(false, false), (true, false), (false, false), (false, false)]
        );
    }

    #[test]
    fn react_without_posts_is_ignored() {
        let mut h = harness(StaticFeedSource::fixed(Vec::new()));
        assert!(!h.view.like().unwrap());
        assert!(!h.view.dislike().unwrap());
    }

    #[test]
    fn positional_link_sets_cursor_before_feed_arrives() {
        let mut h = harness_with(
            StaticFeedSource::fixed(demo_posts(5)),
            LinkScheme::Position,
            Arc::new(Store::open_in_memory().unwrap()),
        );
        h.view
            .decode_startup("http://localhost:8000/index.html?postId=3")
            .unwrap();
        assert_eq!(h.view.cursor(), Some(2));
        assert!(h.view.current().is_none());

        h.view.load_more();
        h.view.settle(WAIT);
        assert_eq!(h.view.cursor(), Some(2));
        assert_eq!(h.view.current().unwrap().id.as_str(), "demo-3");
    }

    #[test]
    fn positional_link_past_the_end_stays_out_of_range() {
        let mut h = harness_with(
            StaticFeedSource::fixed(demo_posts(2)),
            LinkScheme::Position,
            Arc::new(Store::open_in_memory().unwrap()),
        );
        h.view.decode_startup("http://localhost/?postId=40").unwrap();
        h.view.load_more();
        h.view.settle(WAIT);
        assert_eq!(h.view.cursor(), Some(39));
        assert!(h.view.current().is_none());
        assert!(matches!(h.view.share_link(), Err(ShareError::NoCurrentPost)));
    }

    #[test]
    fn id_link_resolves_once_post_is_loaded() {
        let mut h = harness(StaticFeedSource::paged(demo_posts(12), 3));
        h.view
            .decode_startup("http://localhost:8000/?postId=demo-8")
            .unwrap();
        assert_eq!(h.view.pending_link().map(PostId::as_str), Some("demo-8"));
        h.view.load_more();
        h.view.settle(WAIT);
        assert!(h.view.pending_link().is_none());
        assert_eq!(h.view.current().unwrap().id.as_str(), "demo-8");
        assert!(h.scrolled.0.borrow().contains(&7));
    }

    #[test]
    fn positional_link_scrolls_once_post_arrives() {
        let mut h = harness_with(
            StaticFeedSource::fixed(demo_posts(30)),
            LinkScheme::Position,
            Arc::new(Store::open_in_memory().unwrap()),
        );
        h.view.decode_startup("http://localhost/?postId=20").unwrap();
        assert!(h.scrolled.0.borrow().is_empty());
        h.view.load_more();
        h.view.settle(WAIT);
        assert_eq!(h.view.current().unwrap().id.as_str(), "demo-20");
        assert_eq!(h.scrolled.0.borrow().as_slice(), &[19]);
    }

    #[test]
    fn user_navigation_cancels_unresolved_id_link() {
        let mut h = harness(StaticFeedSource::paged(demo_posts(12), 3));
        h.view
            .decode_startup("http://localhost/?postId=demo-11")
            .unwrap();
        h.view.load_more();
        assert!(matches!(h.view.wait(WAIT), Some(Update::Appended(3))));
        assert!(h.view.pending_link().is_some());

        assert!(h.view.advance());
        assert!(h.view.pending_link().is_none());
        h.view.settle(WAIT);
        assert_eq!(h.view.cursor(), Some(1));
        assert!(!h.scrolled.0.borrow().contains(&10));
    }

    #[test]
    fn share_link_carries_stable_id() {
        let mut h = harness(StaticFeedSource::fixed(vec![Post::new("abc123", "shared")]));
        h.view.load_more();
        h.view.settle(WAIT);
        let url = h.view.share_link().unwrap();
        assert!(url.as_str().contains("postId=abc123"));
        let copied = h.clipboard.0.borrow().clone().unwrap();
        assert!(copied.contains("postId=abc123"));
        assert!(copied.starts_with("http://localhost:8000/index.html"));
    }

    #[test]
    fn share_link_by_position_round_trips() {
        let mut h = harness_with(
            StaticFeedSource::fixed(demo_posts(4)),
            LinkScheme::Position,
            Arc::new(Store::open_in_memory().unwrap()),
        );
        h.view.load_more();
        h.view.settle(WAIT);
        h.view.advance();
        let url = h.view.share_link().unwrap();
        assert!(url.as_str().ends_with("postId=2"));
        assert_eq!(
            share::decode(url.as_str(), LinkScheme::Position).unwrap(),
            Some(DeepLink::Position(1))
        );
    }

    #[test]
    fn failed_load_leaves_feed_untouched() {
        struct Failing;
        impl FeedSource for Failing {
            fn fetch(&self) -> Result<Vec<Post>, LoadError> {
                Err(LoadError::Status(500))
            }
        }
        let mut view = FeedView::new(
            Arc::new(Failing),
            Arc::new(Store::open_in_memory().unwrap()),
            Box::new(RecordingScroller::default()),
            Box::new(MemoryClipboard::default()),
            options(LinkScheme::Id),
        );
        view.load_more();
        let updates = view.settle(WAIT);
        assert!(matches!(updates.as_slice(), [Update::Failed(LoadError::Status(500))]));
        assert!(view.is_empty());
        assert_eq!(view.cursor(), None);
        assert!(!view.is_loading());
    }
}
