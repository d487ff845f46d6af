//! IP geolocation with a cache-first policy.
//!
//! Entries already stored for an IP are the cache: the first of them that was
//! geocoded answers every later lookup for that IP. Only a cache miss reaches
//! the external API. Resolution never fails outward; any internal error ends
//! in [`Resolution::Unknown`].

use crate::errors::Result;
use crate::metrics::{GEOCODE_API_CALLS_TOTAL, GEOCODE_CACHE_HITS_TOTAL, GEOCODE_FAILURES_TOTAL};
use crate::model::LocationRecord;
use crate::store::EntryStore;
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, warn};

/// Remote IP geolocation service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn lookup(&self, ip: &str) -> Result<LocationRecord>;

    /// Provider name for logs
    fn name(&self) -> &'static str;
}

/// Outcome of resolving an IP address
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(LocationRecord),
    Unknown,
}

impl Resolution {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }

    pub fn into_record(self) -> LocationRecord {
        match self {
            Resolution::Resolved(record) => record,
            Resolution::Unknown => LocationRecord::unknown(),
        }
    }
}

#[derive(Clone)]
pub struct GeocodeResolver {
    store: Arc<dyn EntryStore>,
    lookup: Arc<dyn GeoLookup>,
}

impl GeocodeResolver {
    pub fn new(store: Arc<dyn EntryStore>, lookup: Arc<dyn GeoLookup>) -> Self {
        Self { store, lookup }
    }

    pub async fn resolve(&self, ip: &str) -> Resolution {
        let ip = ip.trim();
        if ip.parse::<IpAddr>().is_err() {
            debug!("Not geocoding malformed IP address {:?}", ip);
            GEOCODE_FAILURES_TOTAL.inc();
            return Resolution::Unknown;
        }

        match self.store.first_geocoded_for_ip(ip).await {
            Ok(Some(record)) => {
                debug!("Geocode cache hit for {}", ip);
                GEOCODE_CACHE_HITS_TOTAL.inc();
                return Resolution::Resolved(record);
            }
            Ok(None) => {}
            Err(e) => {
                warn!("Geocode cache lookup for {} failed, asking {}: {}", ip, self.lookup.name(), e);
            }
        }

        GEOCODE_API_CALLS_TOTAL.inc();
        match self.lookup.lookup(ip).await {
            Ok(record) if record.is_resolved() => Resolution::Resolved(record),
            Ok(_) => {
                debug!("{} has no location for {}", self.lookup.name(), ip);
                GEOCODE_FAILURES_TOTAL.inc();
                Resolution::Unknown
            }
            Err(e) => {
                warn!("Geocoding failed for IP {}: {}", ip, e);
                GEOCODE_FAILURES_TOTAL.inc();
                Resolution::Unknown
            }
        }
    }
}
