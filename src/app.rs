use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::{info, warn};
use url::Url;

use crate::client;
use crate::config::{self, Config};
use crate::data::{FeedSource, HttpFeedSource, StaticFeedSource};
use crate::feed::{self, FeedView, Update};
use crate::logging;
use crate::navigation::{NoopScroller, ViewportScroller};
use crate::share::{self, SystemClipboard};
use crate::storage;
use crate::ui;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_file: Option<PathBuf>,
    /// Startup deep link.
    pub link: Option<String>,
    /// Shorthand for a deep link built from `share.base_url`.
    pub post_id: Option<String>,
    /// Print the feed and exit instead of starting the UI.
    pub list: bool,
}

pub fn run(opts: RunOptions) -> Result<()> {
    let cfg = config::load(config::LoadOptions {
        config_file: opts.config_file.clone(),
        env_prefix: None,
    })
    .context("load config")?;
    logging::init(&cfg.log).context("init logging")?;
    info!("pixfeed {} starting", crate::VERSION);

    let store = Arc::new(
        storage::Store::open(storage::Options {
            path: cfg.storage.path.clone(),
        })
        .context("open storage")?,
    );

    let (source, source_label) = feed_source(&cfg)?;
    let base_url = Url::parse(&cfg.share.base_url)
        .with_context(|| format!("parse share.base_url {:?}", cfg.share.base_url))?;
    let options = feed::Options {
        prefetch_threshold: cfg.feed.prefetch_threshold,
        link_scheme: cfg.share.scheme,
        base_url: base_url.clone(),
    };
    let link = startup_link(&opts, &base_url);

    if opts.list {
        let view = FeedView::new(
            source,
            store,
            Box::new(NoopScroller),
            Box::new(SystemClipboard::new()),
            options,
        );
        return list(view, link.as_deref(), &cfg);
    }

    let scroller = ui::StripScroller::new();
    let mut view = FeedView::new(
        source,
        store,
        Box::new(scroller.clone()) as Box<dyn ViewportScroller>,
        Box::new(SystemClipboard::new()),
        options,
    );

    let mut status = format!("Browsing {source_label}. h/l to move, u/d to react, s to share, q to quit.");
    if let Some(link) = link.as_deref() {
        if let Err(err) = view.decode_startup(link) {
            warn!("ignoring startup link {link:?}: {err}");
            status = format!("Ignoring startup link: {err}");
        }
    }
    view.load_more();

    let mut model = ui::Model::new(view, scroller, status);
    model.run()
}

fn feed_source(cfg: &Config) -> Result<(Arc<dyn FeedSource>, String)> {
    if cfg.feed.endpoint.trim().is_empty() {
        info!("no feed.endpoint configured, using the demo feed");
        return Ok((Arc::new(StaticFeedSource::demo()), "the demo feed".to_string()));
    }
    let client = client::Client::new(client::ClientConfig {
        endpoint: cfg.feed.endpoint.clone(),
        user_agent: if cfg.feed.user_agent.trim().is_empty() {
            format!("pixfeed/{}", crate::VERSION)
        } else {
            cfg.feed.user_agent.clone()
        },
        timeout: Some(cfg.feed.timeout),
        http_client: None,
    })
    .context("create images client")?;
    let label = client.endpoint().to_string();
    Ok((Arc::new(HttpFeedSource::new(Arc::new(client))), label))
}

fn startup_link(opts: &RunOptions, base_url: &Url) -> Option<String> {
    if let Some(link) = opts.link.as_ref() {
        return Some(link.clone());
    }
    opts.post_id
        .as_deref()
        .map(|value| share::encode(base_url, value).to_string())
}

fn list(mut view: FeedView, link: Option<&str>, cfg: &Config) -> Result<()> {
    if let Some(link) = link {
        if let Err(err) = view.decode_startup(link) {
            warn!("ignoring startup link {link:?}: {err}");
            eprintln!("warning: ignoring startup link: {err}");
        }
    }
    view.load_more();
    let timeout = cfg.feed.timeout.saturating_mul(4);
    let updates = view.settle(timeout);

    let failure = updates.into_iter().find_map(|update| match update {
        Update::Failed(err) => Some(err),
        _ => None,
    });
    if view.is_empty() {
        if let Some(err) = failure {
            bail!("load feed: {err}");
        }
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let current = view.cursor();
    for (index, post) in view.posts().iter().enumerate() {
        let marker = if Some(index) == current { '>' } else { ' ' };
        let reaction = if post.like {
            " [liked]"
        } else if post.dislike {
            " [disliked]"
        } else {
            ""
        };
        writeln!(
            out,
            "{marker}{:>4} {} {} @{}{reaction}",
            index + 1,
            post.id,
            post.image.title,
            post.author.username
        )?;
    }
    writeln!(out, "{} posts", view.len())?;
    Ok(())
}
