// src/config.rs
//
// Client configuration: credentials, region, endpoint and concurrency knobs.

use std::env;
use std::time::Duration;

use crate::constants::{
    DEFAULT_MULTIPART_PART_SIZE, DEFAULT_OPERATION_TIMEOUT_SECS, DEFAULT_PARTS_IN_FLIGHT,
    DEFAULT_REGION, DEFAULT_STORAGE_DOMAIN, ENV_MAX_IN_FLIGHT, ENV_OPERATION_TIMEOUT,
    MAX_AUTO_IN_FLIGHT, MIN_AUTO_IN_FLIGHT, MIN_MULTIPART_PART_SIZE,
};
use crate::signature::SigningContext;

/// Runtime parameters used by [`crate::Client`] and the S3 backend.
#[derive(Clone)]
pub struct ClientConfig {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, Ceph, ...).
    pub endpoint: Option<String>,
    /// Host suffix for public object URLs.
    pub storage_domain: String,
    /// Upper bound on concurrently running batch jobs.
    pub max_in_flight: usize,
    pub multipart_part_size: usize,
    pub parts_in_flight: usize,
    pub operation_timeout: Duration,
    pub force_path_style: bool,
}

// Keep the secret out of debug output.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("storage_domain", &self.storage_domain)
            .field("max_in_flight", &self.max_in_flight)
            .field("multipart_part_size", &self.multipart_part_size)
            .field("parts_in_flight", &self.parts_in_flight)
            .field("operation_timeout", &self.operation_timeout)
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}

impl ClientConfig {
    pub fn new(
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        let region = region.into();
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
            region: if region.is_empty() { DEFAULT_REGION.to_string() } else { region },
            endpoint: None,
            storage_domain: DEFAULT_STORAGE_DOMAIN.to_string(),
            max_in_flight: default_max_in_flight(),
            multipart_part_size: DEFAULT_MULTIPART_PART_SIZE,
            parts_in_flight: DEFAULT_PARTS_IN_FLIGHT,
            operation_timeout: Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS),
            force_path_style: false,
        }
    }

    /// Build a config from the process environment (after loading `.env`).
    ///
    /// Reads `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_REGION`,
    /// `AWS_ENDPOINT_URL`, `S3BATCH_MAX_IN_FLIGHT` and
    /// `S3BATCH_OPERATION_TIMEOUT`. Missing credentials are not an error here;
    /// they surface as a session error on first use.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut cfg = Self::new(
            env::var("AWS_ACCESS_KEY_ID").unwrap_or_default(),
            env::var("AWS_SECRET_ACCESS_KEY").unwrap_or_default(),
            env::var("AWS_REGION").unwrap_or_default(),
        );

        if let Ok(endpoint) = env::var("AWS_ENDPOINT_URL") {
            if !endpoint.is_empty() {
                // S3-compatible services generally need path-style addressing
                cfg = cfg.with_endpoint(endpoint).with_force_path_style(true);
            }
        }
        if let Some(n) = env::var(ENV_MAX_IN_FLIGHT).ok().and_then(|s| s.parse().ok()) {
            cfg = cfg.with_max_in_flight(n);
        }
        if let Some(timeout) = env::var(ENV_OPERATION_TIMEOUT)
            .ok()
            .and_then(|s| humantime::parse_duration(&s).ok())
        {
            cfg = cfg.with_operation_timeout(timeout);
        }
        cfg
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_storage_domain(mut self, domain: impl Into<String>) -> Self {
        self.storage_domain = domain.into();
        self
    }

    /// Zero is clamped to one so a batch always makes progress.
    pub fn with_max_in_flight(mut self, n: usize) -> Self {
        self.max_in_flight = n.max(1);
        self
    }

    pub fn with_multipart_part_size(mut self, size: usize) -> Self {
        self.multipart_part_size = size.max(MIN_MULTIPART_PART_SIZE);
        self
    }

    pub fn with_parts_in_flight(mut self, n: usize) -> Self {
        self.parts_in_flight = n.max(1);
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_force_path_style(mut self, on: bool) -> Self {
        self.force_path_style = on;
        self
    }

    pub fn has_credentials(&self) -> bool {
        !self.access_key.is_empty() && !self.secret_key.is_empty()
    }

    /// Public URL of an object: `https://{bucket}.{storage_domain}/{key}`.
    pub fn public_url(&self, bucket: &str, key: &str) -> String {
        format!("https://{}.{}/{}", bucket, self.storage_domain, key)
    }

    pub fn signing_context(&self) -> SigningContext {
        SigningContext {
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            region: self.region.clone(),
            storage_domain: self.storage_domain.clone(),
        }
    }
}

/// Batch concurrency derived from the host core count
fn default_max_in_flight() -> usize {
    let cores = num_cpus::get();
    (cores * 4).clamp(MIN_AUTO_IN_FLIGHT, MAX_AUTO_IN_FLIGHT)
}
