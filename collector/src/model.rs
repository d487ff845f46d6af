use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Placeholder stored in `city`/`state` when a location is not known.
pub const UNKNOWN: &str = "Unknown";

/// Geolocation resolved for an IP address
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LocationRecord {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: String,
    pub state: String,
}

impl LocationRecord {
    pub fn unknown() -> Self {
        Self {
            latitude: None,
            longitude: None,
            city: UNKNOWN.to_string(),
            state: UNKNOWN.to_string(),
        }
    }

    /// A record counts as resolved once it carries a latitude.
    pub fn is_resolved(&self) -> bool {
        self.latitude.is_some()
    }
}

impl Default for LocationRecord {
    fn default() -> Self {
        Self::unknown()
    }
}

/// A device report ready to be appended to the store
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub xrp_id: String,
    pub platform: Option<String>,
    pub ble: Option<Value>,
    pub timestamp: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub location: LocationRecord,
}

/// A stored device report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TelemetryEntry {
    pub id: Uuid,
    pub xrp_id: String,
    pub platform: Option<String>,
    pub ble: Option<Value>,
    pub timestamp: DateTime<Utc>,
    pub ip_address: String,
    pub user_agent: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub city: String,
    pub state: String,
}

impl TelemetryEntry {
    pub fn from_new(id: Uuid, entry: NewEntry) -> Self {
        let NewEntry {
            xrp_id,
            platform,
            ble,
            timestamp,
            ip_address,
            user_agent,
            location,
        } = entry;

        Self {
            id,
            xrp_id,
            platform,
            ble,
            timestamp,
            ip_address,
            user_agent,
            latitude: location.latitude,
            longitude: location.longitude,
            city: location.city,
            state: location.state,
        }
    }

    pub fn has_coordinates(&self) -> bool {
        self.latitude.is_some() && self.longitude.is_some()
    }

    pub fn location(&self) -> LocationRecord {
        LocationRecord {
            latitude: self.latitude,
            longitude: self.longitude,
            city: self.city.clone(),
            state: self.state.clone(),
        }
    }

    pub fn apply_location(&mut self, location: &LocationRecord) {
        self.latitude = location.latitude;
        self.longitude = location.longitude;
        self.city = location.city.clone();
        self.state = location.state.clone();
    }
}

/// `GET /api/getData` success envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct DataResponse {
    pub status: String,
    pub data: Vec<TelemetryEntry>,
}

/// `GET /api/getData` failure envelope
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusMessage {
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
