use serde::{Deserialize, Serialize};
use url::Url;

use crate::model::PostId;

/// Query parameter carrying the shared post.
pub const POST_ID_PARAM: &str = "postId";

/// How the `postId` parameter identifies a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkScheme {
    /// The post's stable id.
    #[default]
    Id,
    /// 1-based position in the feed.
    Position,
}

impl LinkScheme {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "id" => Some(LinkScheme::Id),
            "position" | "index" => Some(LinkScheme::Position),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeepLink {
    Id(PostId),
    /// 0-based index.
    Position(usize),
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("invalid link: {0}")]
    Url(#[from] url::ParseError),
    #[error("postId {0:?} is not a positive position")]
    InvalidPosition(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ShareError {
    #[error("no post selected")]
    NoCurrentPost,
    #[error("copy link to clipboard: {0}")]
    Clipboard(String),
}

/// Reads the `postId` parameter from `link`, if present.
pub fn decode(link: &str, scheme: LinkScheme) -> Result<Option<DeepLink>, LinkError> {
    let url = Url::parse(link)?;
    let Some(value) = url
        .query_pairs()
        .find(|(key, _)| key == POST_ID_PARAM)
        .map(|(_, value)| value.into_owned())
    else {
        return Ok(None);
    };
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }
    match scheme {
        LinkScheme::Id => Ok(Some(DeepLink::Id(PostId::from(value)))),
        LinkScheme::Position => match value.parse::<usize>() {
            Ok(position) if position >= 1 => Ok(Some(DeepLink::Position(position - 1))),
            _ => Err(LinkError::InvalidPosition(value.to_string())),
        },
    }
}

/// `base` with `postId` set to `value`; other query parameters are kept.
pub fn encode(base: &Url, value: &str) -> Url {
    let kept: Vec<(String, String)> = base
        .query_pairs()
        .filter(|(key, _)| key != POST_ID_PARAM)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    let mut url = base.clone();
    url.set_query(None);
    {
        let mut query = url.query_pairs_mut();
        for (key, value) in &kept {
            query.append_pair(key, value);
        }
        query.append_pair(POST_ID_PARAM, value);
    }
    url
}

/// Write-only access to the system clipboard.
pub trait Clipboard {
    fn set_text(&mut self, text: String) -> Result<(), ShareError>;
}

/// Clipboard backed by `arboard`. The handle is opened on first use so that
/// headless runs never touch the display server.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<arboard::Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: String) -> Result<(), ShareError> {
        if self.inner.is_none() {
            let clipboard = arboard::Clipboard::new()
                .map_err(|err| ShareError::Clipboard(format!("open clipboard: {err}")))?;
            self.inner = Some(clipboard);
        }
        let Some(clipboard) = self.inner.as_mut() else {
            return Err(ShareError::Clipboard("clipboard unavailable".into()));
        };
        clipboard
            .set_text(text)
            .map_err(|err| ShareError::Clipboard(err.to_string()))
    }
}
