use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable post identifier. The endpoint may send it as a string or a number;
/// both are normalised to their string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "RawId", into = "String")]
pub struct PostId(String);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<RawId> for PostId {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(text) => PostId(text),
            RawId::Int(value) => PostId(value.to_string()),
            RawId::Float(value) => PostId(value.to_string()),
        }
    }
}

impl From<PostId> for String {
    fn from(id: PostId) -> Self {
        id.0
    }
}

impl From<&str> for PostId {
    fn from(value: &str) -> Self {
        PostId(value.to_string())
    }
}

impl From<String> for PostId {
    fn from(value: String) -> Self {
        PostId(value)
    }
}

impl PostId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Image {
    #[serde(default)]
    pub src: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub pfp: String,
}

impl Author {
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.username,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    #[serde(default)]
    pub image: Image,
    #[serde(default)]
    pub author: Author,
    #[serde(default)]
    pub like: bool,
    #[serde(default)]
    pub dislike: bool,
}

impl Post {
    pub fn new(id: impl Into<PostId>, title: &str) -> Self {
        Self {
            id: id.into(),
            image: Image {
                title: title.to_string(),
                ..Image::default()
            },
            author: Author::default(),
            like: false,
            dislike: false,
        }
    }

    pub fn reaction(&self) -> Reaction {
        Reaction {
            like: self.like,
            dislike: self.dislike,
        }
    }

    pub fn set_reaction(&mut self, reaction: Reaction) {
        self.like = reaction.like;
        self.dislike = reaction.dislike && !reaction.like;
    }
}

/// Like/dislike flag pair, as persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    #[serde(default)]
    pub like: bool,
    #[serde(default)]
    pub dislike: bool,
}

impl Reaction {
    pub fn is_empty(&self) -> bool {
        !self.like && !self.dislike
    }
}

/// Body of the images endpoint: either a bare array or `{ "data": [...] }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum Listing {
    Bare(Vec<Post>),
    Wrapped { data: Vec<Post> },
}

impl Listing {
    pub fn into_posts(self) -> Vec<Post> {
        match self {
            Listing::Bare(posts) => posts,
            Listing::Wrapped { data } => data,
        }
    }
}
