//! ipinfo-style geolocation API client.
//!
//! The upstream answers `GET <template with {ip}>` with a JSON body carrying a
//! combined `"lat,lon"` string in `loc`, plus `city` and `region`.

use crate::errors::{GeocodeError, Result};
use crate::geocode::GeoLookup;
use crate::model::{LocationRecord, UNKNOWN};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{trace, warn};
use ureq::Agent;

pub const DEFAULT_API_URL: &str = "https://ipinfo.io/{ip}/json";

#[derive(Debug, Deserialize)]
struct IpInfoBody {
    loc: Option<String>,
    city: Option<String>,
    region: Option<String>,
}

pub struct IpInfoClient {
    agent: Agent,
    api_url_template: String,
    token: Option<String>,
}

impl IpInfoClient {
    /// `api_url_template` uses `{ip}` as the address placeholder.
    pub fn new(api_url_template: &str, token: Option<String>) -> Self {
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            api_url_template: api_url_template.to_string(),
            token,
        }
    }

    fn request_url(&self, ip: &str) -> String {
        let mut url = self
            .api_url_template
            .replace("{ip}", &urlencoding::encode(ip));

        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            let sep = if url.contains('?') { '&' } else { '?' };
            url.push(sep);
            url.push_str("token=");
            url.push_str(&urlencoding::encode(token));
        }
        url
    }

    fn fetch_sync(agent: &Agent, url: &str) -> std::result::Result<IpInfoBody, GeocodeError> {
        let resp = agent
            .get(url)
            .call()
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;

        if resp.status() != 200 {
            return Err(GeocodeError::Status(resp.status().as_u16()));
        }

        resp.into_body()
            .read_json::<IpInfoBody>()
            .map_err(|e| GeocodeError::Body(e.to_string()))
    }
}

fn parse_location(body: IpInfoBody) -> std::result::Result<LocationRecord, GeocodeError> {
    let loc = body.loc.ok_or(GeocodeError::MissingLocation)?;

    let (lat, lon) = loc
        .split_once(',')
        .ok_or_else(|| GeocodeError::MalformedLocation(loc.clone()))?;
    let latitude: f64 = lat
        .trim()
        .parse()
        .map_err(|_| GeocodeError::MalformedLocation(loc.clone()))?;
    let longitude: f64 = lon
        .trim()
        .parse()
        .map_err(|_| GeocodeError::MalformedLocation(loc.clone()))?;

    Ok(LocationRecord {
        latitude: Some(latitude),
        longitude: Some(longitude),
        city: or_unknown(body.city),
        state: or_unknown(body.region),
    })
}

fn or_unknown(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

#[async_trait]
impl GeoLookup for IpInfoClient {
    async fn lookup(&self, ip: &str) -> Result<LocationRecord> {
        let url = self.request_url(ip);
        let agent = self.agent.clone();
        trace!("Geocoding {} via {}", ip, self.api_url_template);

        // ureq is blocking, keep it off the async workers
        let body = tokio::task::spawn_blocking(move || Self::fetch_sync(&agent, &url))
            .await
            .map_err(|e| {
                warn!("Geocoding task failed: {}", e);
                GeocodeError::Transport(e.to_string())
            })??;

        Ok(parse_location(body)?)
    }

    fn name(&self) -> &'static str {
        "ipinfo"
    }
}
