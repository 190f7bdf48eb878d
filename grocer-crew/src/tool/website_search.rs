//! Website-scoped search
//!
//! The first query crawls the site root and a few same-site pages, splits
//! them into text passages and caches the result. Queries rank passages by
//! term overlap and return the best ones with their source URLs.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;
use tokio::sync::OnceCell;
use tracing::{debug, info, instrument, warn};
use url::Url;

use grocer_error::{Error, Result};
use grocer_llm::ToolDefinition;

use super::Tool;

const USER_AGENT: &str = concat!("grocer/", env!("CARGO_PKG_VERSION"));
const PASSAGE_SELECTOR: &str = "h1, h2, h3, h4, p, li, td, dd";
const MIN_PASSAGE_CHARS: usize = 12;
const MAX_PASSAGE_CHARS: usize = 600;

const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "can", "do", "for", "from", "how", "in",
    "is", "it", "long", "of", "on", "or", "the", "to", "what", "when", "with",
];

#[derive(Debug, Clone, PartialEq)]
struct Passage {
    url: String,
    text: String,
}

/// Crawl state: pages still to visit and what was collected so far
struct Frontier {
    queue: VecDeque<Url>,
    seen_urls: HashSet<String>,
    seen_text: HashSet<String>,
    passages: Vec<Passage>,
}

impl Frontier {
    fn new(root: &Url) -> Self {
        Self {
            queue: VecDeque::new(),
            seen_urls: HashSet::from([root.to_string()]),
            seen_text: HashSet::new(),
            passages: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchArgs {
    #[serde(alias = "query")]
    search_query: String,
}

/// Search tool bound to one website.
pub struct WebsiteSearchTool {
    site: Url,
    name: String,
    client: Client,
    max_pages: usize,
    top_k: usize,
    index: OnceCell<Vec<Passage>>,
}

impl WebsiteSearchTool {
    pub fn new(site: Url, max_pages: usize, top_k: usize) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                Error::network_failed(format!("failed to build HTTP client: {}", e)).set_source(e)
            })?;

        Ok(Self {
            name: tool_name(&site),
            site,
            client,
            max_pages,
            top_k: top_k.max(1),
            index: OnceCell::new(),
        })
    }

    /// Ranked passages for `query`, formatted for the model.
    pub async fn search(&self, query: &str) -> Result<String> {
        let passages = self.index.get_or_try_init(|| self.crawl()).await?;
        let hits = rank(passages, query, self.top_k);
        debug!(tool = %self.name, query, hits = hits.len(), "searched");

        if hits.is_empty() {
            return Ok(format!(
                "No relevant content found on {} for '{}'.",
                self.site, query
            ));
        }

        let mut out = format!("Relevant content from {}:\n", self.site);
        for (i, passage) in hits.iter().enumerate() {
            out.push_str(&format!("\n[{}] {}\nSource: {}\n", i + 1, passage.text, passage.url));
        }
        Ok(out)
    }

    /// The root, then up to `max_pages` linked pages breadth-first.
    /// Failed pages count toward the cap; a failed root fails the crawl.
    #[instrument(skip(self), fields(site = %self.site))]
    async fn crawl(&self) -> Result<Vec<Passage>> {
        let mut frontier = Frontier::new(&self.site);
        let root = self.fetch(&self.site).await?;
        self.absorb(&mut frontier, &self.site, &root)?;

        let mut attempted = 0;
        let mut failed = 0;
        while attempted < self.max_pages {
            let Some(url) = frontier.queue.pop_front() else {
                break;
            };
            attempted += 1;

            match self.fetch(&url).await {
                Ok(body) => self.absorb(&mut frontier, &url, &body)?,
                Err(e) => {
                    warn!(url = %url, error = %e, "skipping page");
                    failed += 1;
                }
            }
        }

        info!(
            pages = 1 + attempted - failed,
            failed,
            passages = frontier.passages.len(),
            "indexed site"
        );
        Ok(frontier.passages)
    }

    fn absorb(&self, frontier: &mut Frontier, url: &Url, body: &str) -> Result<()> {
        let (texts, links) = parse_page(body, url)?;
        for text in texts {
            if frontier.seen_text.insert(text.clone()) {
                frontier.passages.push(Passage {
                    url: url.to_string(),
                    text,
                });
            }
        }
        for link in links {
            if self.in_scope(&link) && frontier.seen_urls.insert(link.to_string()) {
                frontier.queue.push_back(link);
            }
        }
        Ok(())
    }

    async fn fetch(&self, url: &Url) -> Result<String> {
        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            Error::network_failed(format!("failed to fetch {}: {}", url, e))
                .with_operation("website_search::fetch")
                .set_source(e)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::tool_failed(
                self.name.clone(),
                format!("{} returned HTTP {}", url, status.as_u16()),
            )
            .with_operation("website_search::fetch"));
        }

        response.text().await.map_err(|e| {
            Error::network_failed(format!("failed to read {}: {}", url, e))
                .with_operation("website_search::fetch")
                .set_source(e)
        })
    }

    fn in_scope(&self, link: &Url) -> bool {
        link.host_str() == self.site.host_str()
            && link.port_or_known_default() == self.site.port_or_known_default()
            && link.path().starts_with(self.site.path())
    }
}

#[async_trait]
impl Tool for WebsiteSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            self.name.clone(),
            format!(
                "Search the content of {} for a query. Returns the most relevant passages with their source URLs.",
                self.site
            ),
        )
        .with_parameters(serde_json::json!({
            "type": "object",
            "properties": {
                "search_query": {
                    "type": "string",
                    "description": "What to look for, e.g. 'milk refrigerator shelf life'"
                }
            },
            "required": ["search_query"]
        }))
    }

    async fn call(&self, arguments: &str) -> Result<String> {
        let args: SearchArgs = serde_json::from_str(arguments).map_err(|e| {
            Error::tool_failed(self.name.clone(), format!("invalid arguments: {}", e))
        })?;
        if args.search_query.trim().is_empty() {
            return Err(Error::tool_failed(self.name.clone(), "search_query is empty"));
        }
        self.search(&args.search_query).await
    }
}

/// `search_stilltasty_com` for https://www.stilltasty.com/
fn tool_name(site: &Url) -> String {
    let host = site.host_str().unwrap_or("site");
    let host = host.strip_prefix("www.").unwrap_or(host);
    let mut name: String = format!("search_{}", host)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    name.truncate(64);
    name
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::unexpected(format!("bad selector '{}': {}", css, e)))
}

/// Passage texts and outgoing links of one HTML page.
fn parse_page(body: &str, base: &Url) -> Result<(Vec<String>, Vec<Url>)> {
    let doc = Html::parse_document(body);

    let mut texts = Vec::new();
    for el in doc.select(&selector(PASSAGE_SELECTOR)?) {
        let text = el.text().collect::<Vec<_>>().join(" ");
        let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if text.chars().count() < MIN_PASSAGE_CHARS {
            continue;
        }
        texts.push(clip(&text, MAX_PASSAGE_CHARS));
    }

    let mut links = Vec::new();
    for el in doc.select(&selector("a[href]")?) {
        let Some(href) = el.value().attr("href") else {
            continue;
        };
        if href.starts_with('#') || href.starts_with("javascript:") || href.starts_with("mailto:") {
            continue;
        }
        if let Ok(mut resolved) = base.join(href) {
            resolved.set_fragment(None);
            links.push(resolved);
        }
    }

    Ok((texts, links))
}

fn clip(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

fn terms(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|t| t.len() > 1 && !STOPWORDS.contains(&t.as_str()))
        .map(|t| match t.strip_suffix('s') {
            Some(stem) if stem.len() > 2 => stem.to_string(),
            _ => t,
        })
        .collect()
}

/// Top `top_k` passages by share of query terms matched.
/// A verbatim phrase match ranks above any partial overlap.
fn rank<'a>(passages: &'a [Passage], query: &str, top_k: usize) -> Vec<&'a Passage> {
    let query_terms: HashSet<String> = terms(query).into_iter().collect();
    if query_terms.is_empty() {
        return Vec::new();
    }
    let phrase = query.trim().to_lowercase();

    let mut scored: Vec<(f32, &Passage)> = passages
        .iter()
        .filter_map(|p| {
            let passage_terms: HashSet<String> = terms(&p.text).into_iter().collect();
            let matched = query_terms.intersection(&passage_terms).count();
            if matched == 0 {
                return None;
            }
            let mut score = matched as f32 / query_terms.len() as f32;
            if p.text.to_lowercase().contains(&phrase) {
                score += 1.0;
            }
            Some((score, p))
        })
        .collect();

    scored.sort_by(|a, b| b.0.total_cmp(&a.0));
    scored.into_iter().take(top_k).map(|(_, p)| p).collect()
}
