use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Device {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }
}

/// Where a create or refresh call originates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSessionOperationContext {
    pub ip: IpAddr,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<Device>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl UserSessionOperationContext {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            device: None,
            location: None,
        }
    }

    pub fn with_device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Persisted next to a refresh token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSessionMetaData {
    #[serde(flatten)]
    pub context: UserSessionOperationContext,
    pub created_at: DateTime<Utc>,
}

impl UserSessionMetaData {
    pub fn new(context: UserSessionOperationContext, created_at: DateTime<Utc>) -> Self {
        Self {
            context,
            created_at,
        }
    }
}

/// Read-only snapshot handed to callers listing active sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueriedUserSessionMetaData {
    #[serde(flatten)]
    pub metadata: UserSessionMetaData,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn metadata_serializes_flat() {
        let ctx = UserSessionOperationContext::new(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_device(Device::new("smartphone", "iPhone 11"));
        let metadata = UserSessionMetaData::new(ctx, Utc::now());

        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["ip"], "127.0.0.1");
        assert_eq!(value["device"]["type"], "smartphone");
        assert!(value.get("location").is_none());

        let back: UserSessionMetaData = serde_json::from_value(value).unwrap();
        assert_eq!(back, metadata);
    }
}
