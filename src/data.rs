use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::client::{self, LoadError};
use crate::model::{Author, Image, Post};

/// Source of the post listing. Each fetch returns the full list known to
/// the source so far; the list only ever grows.
pub trait FeedSource: Send + Sync {
    fn fetch(&self) -> Result<Vec<Post>, LoadError>;
}

pub struct HttpFeedSource {
    client: Arc<client::Client>,
}

impl HttpFeedSource {
    pub fn new(client: Arc<client::Client>) -> Self {
        Self { client }
    }
}

impl FeedSource for HttpFeedSource {
    fn fetch(&self) -> Result<Vec<Post>, LoadError> {
        self.client.images()
    }
}

/// In-process source that reveals `step` more posts per fetch, the way a
/// live endpoint grows. Used for the offline demo feed.
pub struct StaticFeedSource {
    posts: Vec<Post>,
    step: usize,
    revealed: Mutex<usize>,
    calls: AtomicUsize,
}

impl StaticFeedSource {
    /// Returns every post on every fetch.
    pub fn fixed(posts: Vec<Post>) -> Self {
        let len = posts.len();
        Self {
            posts,
            step: len.max(1),
            revealed: Mutex::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn paged(posts: Vec<Post>, step: usize) -> Self {
        Self {
            posts,
            step: step.max(1),
            revealed: Mutex::new(0),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn demo() -> Self {
        Self::paged(demo_posts(30), 6)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FeedSource for StaticFeedSource {
    fn fetch(&self) -> Result<Vec<Post>, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut revealed = self.revealed.lock();
        *revealed = (*revealed + self.step).min(self.posts.len());
        Ok(self.posts[..*revealed].to_vec())
    }
}

pub fn demo_posts(count: usize) -> Vec<Post> {
    const AUTHORS: [(&str, Option<&str>); 4] = [
        ("ferris", Some("Ferris the Crab")),
        ("btopro", None),
        ("haxtheweb", Some("HAX")),
        ("pixfeed", Some("pixfeed demo")),
    ];
    (1..=count)
        .map(|n| {
            let (username, name) = AUTHORS[n % AUTHORS.len()];
            Post {
                id: format!("demo-{n}").into(),
                image: Image {
                    src: format!("https://picsum.photos/id/{n}/600/400"),
                    title: format!("Demo image #{n}"),
                    date: format!("2025-01-{:02}", (n % 28) + 1),
                },
                author: Author {
                    name: name.map(str::to_string),
                    username: username.to_string(),
                    pfp: format!("https://github.com/{username}.png"),
                },
                like: false,
                dislike: false,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paged_source_grows_monotonically() {
        let source = StaticFeedSource::paged(demo_posts(5), 2);
        let lens: Vec<usize> = (0..4).map(|_| source.fetch().unwrap().len()).collect();
        assert_eq!(lens, vec![2, 4, 5, 5]);
        assert_eq!(source.calls(), 4);
    }

    #[test]
    fn fixed_source_returns_everything() {
        let source = StaticFeedSource::fixed(demo_posts(3));
        assert_eq!(source.fetch().unwrap().len(), 3);
        assert_eq!(source.fetch().unwrap().len(), 3);
    }

    #[test]
    fn fixed_source_handles_empty_feed() {
        let source = StaticFeedSource::fixed(Vec::new());
        assert!(source.fetch().unwrap().is_empty());
    }

    #[test]
    fn demo_ids_are_unique() {
        let posts = demo_posts(10);
        let mut ids: Vec<_> = posts.iter().map(|post| post.id.clone()).collect();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }
}
