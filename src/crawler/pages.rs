//! Category index crawl
//!
//! All index pages of a category are fetched by a bounded pool of workers that
//! pull page numbers from a shared queue. The pool is joined before anything
//! is merged, and the merge runs in page order, so the resulting map lists
//! urls in the order the site shows them.

use crate::crawler::parser::IndexEntry;
use crate::crawler::source::MarketplaceSource;
use crate::TrackerError;
use indexmap::IndexMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

/// Listing url to boosted flag, in first-seen index order
pub type CombinedUrlMap = IndexMap<String, bool>;

/// The index of one category as far as it could be fetched
#[derive(Debug, Clone, Default)]
pub struct CategoryCrawl {
    pub urls: CombinedUrlMap,
    /// Index pages that could not be fetched, ascending
    pub failed_pages: Vec<u32>,
}

impl CategoryCrawl {
    /// Every index page was fetched
    ///
    /// Only a complete index says anything about listings missing from it.
    pub fn is_complete(&self) -> bool {
        self.failed_pages.is_empty()
    }
}

impl From<CombinedUrlMap> for CategoryCrawl {
    fn from(urls: CombinedUrlMap) -> Self {
        Self {
            urls,
            failed_pages: Vec::new(),
        }
    }
}

/// Crawls every index page of one category
///
/// # Arguments
///
/// * `source` - The marketplace to read from
/// * `category_num` - Category to crawl
/// * `delay` - Delay each worker waits before each of its requests
/// * `concurrency` - Number of workers
///
/// # Returns
///
/// * `Ok(crawl)` - Combined listing map, empty when the category has no
///   pages, and the pages that failed
/// * `Err(TrackerError)` - The page count could not be determined, or no
///   index page could be fetched
pub async fn crawl_category<S>(
    source: Arc<S>,
    category_num: i64,
    delay: Duration,
    concurrency: usize,
) -> Result<CategoryCrawl, TrackerError>
where
    S: MarketplaceSource + ?Sized + 'static,
{
    let total_pages = source.total_pages(category_num).await?;
    if total_pages == 0 {
        tracing::info!("Category {} has no listing pages", category_num);
        return Ok(CategoryCrawl::default());
    }

    tracing::info!(
        "Category {}: fetching {} index pages with {} workers",
        category_num,
        total_pages,
        concurrency
    );

    let queue = Arc::new(Mutex::new((1..=total_pages).collect::<VecDeque<u32>>()));
    let worker_count = concurrency.max(1).min(total_pages as usize);

    let mut workers = JoinSet::new();
    for _ in 0..worker_count {
        let source = Arc::clone(&source);
        let queue = Arc::clone(&queue);

        workers.spawn(async move {
            let mut fetched = Vec::new();
            let mut failed = Vec::new();
            loop {
                let next = queue.lock().await.pop_front();
                let Some(page) = next else {
                    break;
                };

                match source.index_page(category_num, page, delay).await {
                    Ok(entries) => fetched.push((page, entries)),
                    Err(failure) => {
                        tracing::warn!(
                            "Category {} index page {} failed: {}",
                            category_num,
                            page,
                            failure
                        );
                        failed.push(page);
                    }
                }
            }
            (fetched, failed)
        });
    }

    let mut pages = Vec::with_capacity(total_pages as usize);
    let mut failed_pages = Vec::new();
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok((mut fetched, mut failed)) => {
                pages.append(&mut fetched);
                failed_pages.append(&mut failed);
            }
            Err(e) => {
                return Err(TrackerError::Category {
                    category_num,
                    message: format!("index worker panicked: {}", e),
                })
            }
        }
    }

    if pages.is_empty() {
        return Err(TrackerError::Category {
            category_num,
            message: format!("all {} index pages failed", total_pages),
        });
    }

    pages.sort_by_key(|(page, _)| *page);
    failed_pages.sort_unstable();
    let crawl = CategoryCrawl {
        urls: merge_pages(pages),
        failed_pages,
    };

    if crawl.is_complete() {
        tracing::info!(
            "Category {}: {} listings on the index",
            category_num,
            crawl.urls.len()
        );
    } else {
        tracing::warn!(
            "Category {}: {} listings on the index, pages {:?} missing",
            category_num,
            crawl.urls.len(),
            crawl.failed_pages
        );
    }

    Ok(crawl)
}

/// Merges per-page entries, already in page order, into one map
///
/// A url seen again keeps its first position and takes the later flag.
pub fn merge_pages(pages: Vec<(u32, Vec<IndexEntry>)>) -> CombinedUrlMap {
    let mut combined = CombinedUrlMap::new();
    for (_, entries) in pages {
        for entry in entries {
            combined.insert(entry.url, entry.boosted);
        }
    }
    combined
}
