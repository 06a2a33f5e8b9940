//! Priority-scheduled crawler: fetches pages through a bounded worker pool,
//! honoring robots.txt and per-host rate limits, streams HTML for text and
//! outlinks, and hands finished pages to a [`PageIndexer`].

pub mod client;
pub mod html;
pub mod lru;
pub mod pool;
pub mod ratelimiter;
pub mod robots;
pub mod sitemap;
pub mod url_norm;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use url::Url;

use crate::config::Config;
use crate::error::{Result, WftsError};
use crate::model::{CrawlPriority, LinkToken, Passage};
use crate::repository::{self, Repository};
use crate::store::KvStore;

use lru::LruCache;
use pool::WorkerPool;
use ratelimiter::RateLimiter;
use robots::RobotsTxt;
use url_norm::normalize_url;

/// Receives a fetched page's passages for indexing. Implemented by the
/// offline indexing pipeline; kept as a trait so the crawler does not need
/// to know about tokenization, MinHash or persistence.
pub trait PageIndexer: Send + Sync {
    fn index_page(&self, url: &str, passages: &[Passage]) -> Result<()>;
}

pub struct Crawler<S: KvStore, I: PageIndexer> {
    config: Config,
    client: reqwest::Client,
    repo: Arc<Repository<S>>,
    indexer: Arc<I>,
    pool: WorkerPool,
    lru: Arc<LruCache>,
    limiters: Mutex<HashMap<String, Arc<RateLimiter>>>,
    robots: Mutex<HashMap<String, Arc<RobotsTxt>>>,
    visited: Arc<Mutex<HashMap<String, u32>>>,
    sitemap_fetched: Mutex<std::collections::HashSet<String>>,
    cancelled: Arc<AtomicBool>,
}

impl<S: KvStore + 'static, I: PageIndexer + 'static> Crawler<S, I> {
    pub fn new(
        config: Config,
        repo: Arc<Repository<S>>,
        indexer: Arc<I>,
        cancelled: Arc<AtomicBool>,
    ) -> Result<Arc<Self>> {
        let client = client::build_client()
            .map_err(|e| WftsError::HttpPermanent(e.to_string()))?;
        let pool = WorkerPool::new(config.workers_count, config.queue_capacity);
        let lru = Arc::new(LruCache::new((config.workers_count * 10).max(16)));
        let visited = Arc::new(Mutex::new(repo.load_visited_urls()?));

        Ok(Arc::new(Crawler {
            config,
            client,
            repo,
            indexer,
            pool,
            lru,
            limiters: Mutex::new(HashMap::new()),
            robots: Mutex::new(HashMap::new()),
            visited,
            sitemap_fetched: Mutex::new(std::collections::HashSet::new()),
            cancelled,
        }))
    }

    /// Seeds every configured base URL and runs until the pool drains or
    /// cancellation is requested, then flushes the repository and the
    /// visited set.
    pub async fn run(self: &Arc<Self>) -> Result<()> {
        for base in self.config.base_urls.clone() {
            if let Ok(url) = Url::parse(&base) {
                self.submit(url, 0, true);
            } else {
                log::warn!("skipping unparseable base url: {base}");
            }
        }
        self.pool.wait().await;
        self.repo.flush_all()?;
        let visited = self.visited.lock().unwrap().clone();
        self.repo.save_visited_urls(&visited)?;
        Ok(())
    }

    fn submit(self: &Arc<Self>, url: Url, depth: usize, same_domain: bool) {
        if depth > self.config.max_depth_crawl {
            return;
        }
        if self.config.only_same_domain && !same_domain {
            return;
        }
        let priority = CrawlPriority { depth, same_domain }.score();
        let this = self.clone();
        self.pool.submit(
            priority,
            Box::pin(async move {
                if let Err(e) = this.process(url.clone(), depth, same_domain).await {
                    log::warn!("crawl of {url} failed: {e}");
                }
            }),
        );
    }

    async fn process(self: &Arc<Self>, url: Url, depth: usize, same_domain: bool) -> Result<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            return Err(WftsError::Cancelled);
        }
        let Some(normalized) = normalize_url(url.as_str()) else {
            return Ok(());
        };

        let should_fetch = {
            let mut visited = self.visited.lock().unwrap();
            match visited.get(&normalized) {
                Some(&existing_depth) if existing_depth as usize <= depth => false,
                _ => {
                    visited.insert(normalized.clone(), depth as u32);
                    true
                }
            }
        };

        if !should_fetch {
            self.replay_cached_outlinks(&url, depth);
            return Ok(());
        }

        let robots = self.robots_for_host(&url).await;
        if let Some(r) = &robots {
            if !r.is_allowed(client::USER_AGENT, url.path()) {
                return Ok(());
            }
        }
        let host = url.host_str().unwrap_or("").to_string();
        let limiter = self.limiter_for_host(&host, robots.as_deref());
        self.submit_host_sitemap(&url, &host, depth, same_domain);

        let body = client::get_html(&self.client, url.as_str(), &limiter, &self.cancelled).await?;

        if url.as_str().contains("sitemap") {
            let locs = sitemap::decode_sitemap(&body)?;
            for loc in locs {
                if let Ok(u) = Url::parse(&loc) {
                    self.submit(u, depth, same_domain);
                }
            }
            return Err(WftsError::SitemapPage);
        }

        let visited_snapshot = self.visited.lock().unwrap().clone();
        let extracted = html::extract(
            &body,
            &url,
            robots.as_deref(),
            depth,
            &visited_snapshot,
            self.cancelled.clone(),
        );

        self.indexer.index_page(url.as_str(), &extracted.passages)?;

        let link_tokens: Vec<LinkToken> = extracted
            .links
            .iter()
            .map(|l| LinkToken {
                absolute_url: l.url.to_string(),
                same_origin: l.same_origin,
            })
            .collect();
        let hash = repository::sha256_of(url.as_str());
        self.lru.put(hash, link_tokens.clone());
        self.repo.save_urls_to_bank(hash, &link_tokens)?;

        for link in extracted.links {
            if link.already_sufficiently_visited {
                continue;
            }
            self.submit(link.url, depth + 1, link.same_origin);
        }

        Ok(())
    }

    /// A page already visited at a sufficient depth is not re-fetched, but
    /// its cached outlinks are replayed so deeper-first traversals still
    /// discover the pages reachable only through it.
    fn replay_cached_outlinks(self: &Arc<Self>, url: &Url, depth: usize) {
        let hash = repository::sha256_of(url.as_str());
        let links = self
            .lru
            .get(&hash)
            .or_else(|| self.repo.get_urls_by_hash(hash).ok().flatten());
        let Some(links) = links else { return };
        for link in links {
            if let Ok(u) = Url::parse(&link.absolute_url) {
                self.submit(u, depth + 1, link.same_origin);
            }
        }
    }

    /// The first time a host is seen, proactively submits its
    /// `/sitemap.xml` as a crawl task so its `<loc>` entries are discovered
    /// even if no page on the host links to the sitemap directly.
    fn submit_host_sitemap(self: &Arc<Self>, url: &Url, host: &str, depth: usize, same_domain: bool) {
        if host.is_empty() {
            return;
        }
        {
            let mut seen = self.sitemap_fetched.lock().unwrap();
            if !seen.insert(host.to_string()) {
                return;
            }
        }
        let root = format!("{}://{}", url.scheme(), host);
        let sitemap_url = sitemap::sitemap_url_for(&root);
        if let Ok(u) = Url::parse(&sitemap_url) {
            self.submit(u, depth, same_domain);
        }
    }

    async fn robots_for_host(self: &Arc<Self>, url: &Url) -> Option<Arc<RobotsTxt>> {
        let host = url.host_str()?.to_string();
        {
            let cache = self.robots.lock().unwrap();
            if let Some(r) = cache.get(&host) {
                return Some(r.clone());
            }
        }
        let robots_url = format!("{}://{}/robots.txt", url.scheme(), host);
        let parsed = match self
            .client
            .get(&robots_url)
            .timeout(robots::ROBOTS_FETCH_TIMEOUT)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(text) => Arc::new(RobotsTxt::parse(&text)),
                Err(_) => Arc::new(RobotsTxt::default()),
            },
            _ => Arc::new(RobotsTxt::default()),
        };
        self.robots.lock().unwrap().insert(host, parsed.clone());
        Some(parsed)
    }

    fn limiter_for_host(self: &Arc<Self>, host: &str, robots: Option<&RobotsTxt>) -> Arc<RateLimiter> {
        let mut limiters = self.limiters.lock().unwrap();
        if let Some(l) = limiters.get(host) {
            return l.clone();
        }
        let delay = robots
            .and_then(|r| r.wildcard_delay())
            .unwrap_or(ratelimiter::DEFAULT_DELAY_SECS);
        let limiter = RateLimiter::new(delay);
        limiters.insert(host.to_string(), limiter.clone());
        limiter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemStore;
    use std::sync::atomic::AtomicUsize;

    struct CountingIndexer {
        pages: AtomicUsize,
    }

    impl PageIndexer for CountingIndexer {
        fn index_page(&self, _url: &str, _passages: &[Passage]) -> Result<()> {
            self.pages.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn test_config(base: &str) -> Config {
        Config {
            base_urls: vec![base.to_string()],
            index_path: "/tmp/wfts-test-idx".to_string(),
            workers_count: 50,
            max_depth_crawl: 1,
            only_same_domain: false,
            ngram_count: 3,
            max_typo: 2,
            chunk_size: 20,
            tui_border_color: "blue".to_string(),
            log_channel_size: 1000,
            queue_capacity: 100,
            reranker_url: None,
        }
    }

    #[test]
    fn submit_respects_max_depth() {
        // max_depth_crawl=1 in test_config; a depth-2 submission must be a
        // silent no-op rather than panicking or blocking.
        let repo = Arc::new(Repository::new(Arc::new(MemStore::new()), 20).unwrap());
        let indexer = Arc::new(CountingIndexer {
            pages: AtomicUsize::new(0),
        });
        let cancelled = Arc::new(AtomicBool::new(false));
        let crawler = Crawler::new(
            test_config("https://example.com"),
            repo,
            indexer,
            cancelled,
        )
        .unwrap();
        crawler.submit(Url::parse("https://example.com/deep").unwrap(), 5, true);
    }
}
