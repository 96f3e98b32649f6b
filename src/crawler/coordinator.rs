//! Session coordinator - drives one tracking session
//!
//! This module contains the session loop that ties everything together,
//! including:
//! - Building the session context (client, robots policy, store)
//! - Choosing a random category order
//! - Crawling each category's index and reconciling it
//! - Recording the run and the session counters

use crate::config::Config;
use crate::crawler::pages::crawl_category;
use crate::crawler::source::{HttpSource, MarketplaceSource};
use crate::crawler::build_http_client;
use crate::model::CategoryDict;
use crate::output::SessionStats;
use crate::reconcile::{CategoryOutcome, ReconcileOptions, Reconciler};
use crate::robots::{fetch_robots, RobotsPolicy};
use crate::storage::{DatasetStore, SqliteStore};
use crate::url::MarketplaceUrls;
use crate::TrackerError;
use rand::seq::SliceRandom;
use std::path::Path;
use std::sync::Arc;

/// Session context, built once per run
pub struct Coordinator<S: ?Sized, D> {
    config: Config,
    categories: CategoryDict,
    source: Arc<S>,
    store: D,
    reconciler: Reconciler,
    stats: SessionStats,
    config_hash: String,
}

impl Coordinator<HttpSource, SqliteStore> {
    /// Creates a coordinator for the live marketplace
    ///
    /// # Arguments
    ///
    /// * `config` - The tracker configuration
    /// * `config_hash` - Hash of the configuration file, stored with the run
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(TrackerError)` - Failed to open the database or build the client
    pub async fn connect(config: Config, config_hash: String) -> Result<Self, TrackerError> {
        let store = SqliteStore::new(Path::new(&config.output.database_path))?;
        let client = build_http_client(&config.user_agent)?;
        let urls = MarketplaceUrls::from_config(&config.source)?;

        let robots = if config.source.respect_robots {
            fetch_robots(&client, &urls, &config.user_agent.crawler_name).await
        } else {
            tracing::warn!("robots.txt is not respected for this session");
            RobotsPolicy::allow_all()
        };

        let source = HttpSource::new(client, robots, urls, config.scraper.max_retries);
        Ok(Self::new(config, Arc::new(source), store, config_hash))
    }
}

impl<S, D> Coordinator<S, D>
where
    S: MarketplaceSource + ?Sized + 'static,
    D: DatasetStore,
{
    /// Creates a coordinator over any source and store
    pub fn new(config: Config, source: Arc<S>, store: D, config_hash: String) -> Self {
        let categories = CategoryDict::new(config.categories.clone());
        let reconciler = Reconciler::new(ReconcileOptions {
            detail_delay: config.scraper.delay(),
            ordering_check: config.scraper.ordering_check,
            full_refresh: config.scraper.full_refresh,
        });

        Self {
            config,
            categories,
            source,
            store,
            reconciler,
            stats: SessionStats::default(),
            config_hash,
        }
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn store(&self) -> &D {
        &self.store
    }

    pub fn into_store(self) -> D {
        self.store
    }

    /// Categories this session covers, in a fresh random order
    ///
    /// The configured subset when given, otherwise every number between the
    /// lowest and highest known category.
    pub fn category_order(&self) -> Vec<i64> {
        let mut order = match &self.config.scraper.categories_to_scrape {
            Some(subset) => {
                let mut unique = subset.clone();
                unique.sort_unstable();
                unique.dedup();
                unique
            }
            None => self.categories.full_range(),
        };

        order.shuffle(&mut rand::thread_rng());
        order
    }

    /// Runs the session over every category
    ///
    /// A failing category is logged and counted; the session moves on. A
    /// storage failure ends the session and marks the run failed.
    pub async fn run(&mut self) -> Result<SessionStats, TrackerError> {
        let run_id = self.store.create_run(&self.config_hash)?;
        let order = self.category_order();
        let start_time = std::time::Instant::now();

        tracing::info!(
            "Starting run {} over {} categories{}",
            run_id,
            order.len(),
            if self.config.scraper.full_refresh {
                " (full refresh)"
            } else {
                ""
            }
        );

        for (i, category_num) in order.iter().copied().enumerate() {
            let Some(name) = self.categories.name_of(category_num).map(str::to_string) else {
                tracing::debug!("No category named {}; skipping", category_num);
                self.stats.categories_unknown += 1;
                continue;
            };

            tracing::info!(
                "[{}/{}] Category {} ({})",
                i + 1,
                order.len(),
                category_num,
                name
            );

            match self.process_category(category_num).await {
                Ok(Some(outcome)) => self.stats.record(&outcome),
                Ok(None) => self.stats.categories_empty += 1,
                Err(e @ (TrackerError::Storage(_) | TrackerError::Database(_))) => {
                    tracing::error!("Category {} ({}): storage failed: {}", category_num, name, e);
                    self.store.fail_run(run_id)?;
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!("Category {} ({}) failed: {}", category_num, name, e);
                    self.stats.categories_failed += 1;
                }
            }
        }

        self.store.complete_run(run_id)?;

        tracing::info!(
            "Run {} completed in {:?}",
            run_id,
            start_time.elapsed()
        );
        self.stats.log_summary();

        Ok(self.stats.clone())
    }

    /// Crawls and reconciles one category
    ///
    /// Returns `None` when the category has no listing pages.
    async fn process_category(
        &mut self,
        category_num: i64,
    ) -> Result<Option<CategoryOutcome>, TrackerError> {
        let crawl = crawl_category(
            Arc::clone(&self.source),
            category_num,
            self.config.scraper.delay(),
            self.config.scraper.concurrency,
        )
        .await?;

        if crawl.urls.is_empty() {
            return Ok(None);
        }

        let outcome = self
            .reconciler
            .run_category(self.source.as_ref(), &mut self.store, category_num, &crawl)
            .await?;

        Ok(Some(outcome))
    }
}

/// Runs one tracking session against the live marketplace
///
/// # Example
///
/// ```no_run
/// use listing_tracker::config::load_config_with_hash;
/// use listing_tracker::crawler::run_session;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let (config, hash) = load_config_with_hash(Path::new("config.toml"))?;
/// let stats = run_session(config, hash).await?;
/// println!("{} new listings", stats.new_listings);
/// # Ok(())
/// # }
/// ```
pub async fn run_session(config: Config, config_hash: String) -> Result<SessionStats, TrackerError> {
    let mut coordinator = Coordinator::connect(config, config_hash).await?;
    coordinator.run().await
}
