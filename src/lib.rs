pub mod api;
pub mod config;
pub mod db;
pub mod feeds;
pub mod geo;
pub mod ledger;
pub mod session;

#[cfg(test)]
mod testing;

pub use db::DbPool;

use anyhow::{Context, Result};
use config::Config;
use std::sync::Arc;

use crate::api::rate_limit::RateLimiter;
use crate::feeds::FeedHub;
use crate::geo::{Geocoder, HttpRegionDirectory, NominatimGeocoder, RegionDirectory};
use crate::ledger::Ledger;
use crate::session::SessionManager;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub sessions: Arc<SessionManager>,
    pub ledger: Arc<Ledger>,
    pub feeds: Arc<FeedHub>,
    pub rate_limiter: Arc<RateLimiter>,
    pub regions: Arc<dyn RegionDirectory>,
    pub geocoder: Arc<dyn Geocoder>,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Result<Self> {
        let regions: Arc<dyn RegionDirectory> = Arc::new(HttpRegionDirectory::new(&config.geo)?);
        let geocoder: Arc<dyn Geocoder> = Arc::new(NominatimGeocoder::new(&config.geo)?);

        let feeds = Arc::new(FeedHub::default());
        let session_ttl = config
            .auth
            .session_ttl()
            .context("auth.session_ttl_days is out of range")?;
        let sessions = Arc::new(SessionManager::new(db.clone(), session_ttl));
        let ledger = Arc::new(Ledger::new(
            db.clone(),
            feeds.clone(),
            config.points.clone(),
        ));
        let rate_limiter = Arc::new(RateLimiter::new(config.rate_limit.clone()));

        Ok(Self {
            config,
            db,
            sessions,
            ledger,
            feeds,
            rate_limiter,
            regions,
            geocoder,
        })
    }

    /// Replace the third-party lookup services
    pub fn with_geo(mut self, regions: Arc<dyn RegionDirectory>, geocoder: Arc<dyn Geocoder>) -> Self {
        self.regions = regions;
        self.geocoder = geocoder;
        self
    }
}
