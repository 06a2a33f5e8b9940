use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use wfts::config::Config;
use wfts::crawler::Crawler;
use wfts::indexer::Indexer;
use wfts::query::QueryEngine;
use wfts::ranking;
use wfts::repository::Repository;
use wfts::reranker::Reranker;
use wfts::store::SledStore;
use wfts::{logging, WftsError};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = Config::load(&config_path)?;

    let store = Arc::new(SledStore::open(&config.index_path)?);
    let repo = Arc::new(Repository::new(store, config.chunk_size)?);
    let indexer = Arc::new(Indexer::new(repo.clone(), config.ngram_count)?);

    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = cancelled.clone();
        ctrlc::set_handler(move || {
            log::warn!("interrupt received, finishing in-flight work and shutting down");
            cancelled.store(true, Ordering::SeqCst);
        })?;
    }

    let crawler = Crawler::new(config.clone(), repo.clone(), indexer.clone(), cancelled.clone())?;
    log::info!("crawl starting from {} seed url(s)", config.base_urls.len());
    crawler.run().await?;
    log::info!("crawl finished, {} documents indexed", repo.get_documents_count()?);

    let reranker = config
        .reranker_url
        .as_ref()
        .and_then(|url| Reranker::new(url.clone()).ok());

    run_query_repl(repo, indexer, reranker, config.ngram_count, config.max_typo).await
}

async fn run_query_repl<S: wfts::store::KvStore + 'static>(
    repo: Arc<Repository<S>>,
    indexer: Arc<Indexer<S>>,
    reranker: Option<Reranker>,
    ngram_count: usize,
    max_typo: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let engine = QueryEngine::new(repo.clone(), ngram_count, max_typo);
    let avg_doc_len = indexer.average_doc_len()?;

    println!("index ready. type a query, or 'q' to quit.");
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line == "q" {
            break;
        }
        if line.is_empty() {
            continue;
        }

        let terms = match engine.resolve(line) {
            Ok(t) => t,
            Err(WftsError::EmptyTokens) => {
                println!("(no usable query terms)");
                continue;
            }
            Err(e) => {
                println!("query error: {e}");
                continue;
            }
        };

        let documents = repo
            .get_all_documents()?
            .into_iter()
            .map(|d| (d.id, d))
            .collect();
        let mut results = ranking::rank(&terms, &documents, avg_doc_len, line, 10);

        if let Some(reranker) = &reranker {
            let order = reranker.rerank(&results).await;
            let by_id: std::collections::HashMap<_, _> =
                results.into_iter().map(|r| (r.id, r)).collect();
            results = order.into_iter().filter_map(|id| by_id.get(&id).cloned()).collect();
        }

        if results.is_empty() {
            println!("no results.");
        }
        for (i, r) in results.iter().enumerate() {
            println!("{}. {} (bm25={:.3})", i + 1, r.url, r.bm25);
        }
    }

    Ok(())
}
