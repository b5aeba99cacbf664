// src/signature.rs
//
//! Browser POST policies signed with AWS Signature Version 4.
//!
//! [`build_signature`] is a pure function of the policy, the account
//! credentials and the issue time. The resulting [`Signature`] serialises to
//! the form fields a browser sends with a direct upload.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::json;
use sha2::Sha256;

use crate::constants::{
    DEFAULT_ACL, DEFAULT_MAX_POST_FILE_SIZE, DEFAULT_POLICY_EXPIRY_MINUTES, SIGNING_ALGORITHM,
    SIGNING_REQUEST_TYPE, SIGNING_SERVICE,
};
use crate::error::{Result, S3Error};

type HmacSha256 = Hmac<Sha256>;

const EXPIRATION_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";
const AMZ_DATE_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const SHORT_DATE_FORMAT: &str = "%Y%m%d";

/// Account material needed to sign a policy.
#[derive(Clone)]
pub struct SigningContext {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub storage_domain: String,
}

impl std::fmt::Debug for SigningContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningContext")
            .field("access_key", &self.access_key)
            .field("region", &self.region)
            .field("storage_domain", &self.storage_domain)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePolicy {
    pub bucket: String,
    /// Uploaded keys must start with this prefix.
    pub key_prefix: String,
    /// Uploaded content types must start with this prefix.
    pub content_type: String,
    /// `public-read` when unset.
    pub acl: Option<String>,
    /// Upper bound of the accepted body size; 40,971,520 bytes when unset.
    pub max_file_size: Option<u64>,
    pub expiry_minutes: i64,
}

impl SignaturePolicy {
    pub fn new(bucket: impl Into<String>, key_prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key_prefix: key_prefix.into(),
            content_type: String::new(),
            acl: None,
            max_file_size: None,
            expiry_minutes: DEFAULT_POLICY_EXPIRY_MINUTES,
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn acl(mut self, acl: impl Into<String>) -> Self {
        self.acl = Some(acl.into());
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = Some(bytes);
        self
    }

    pub fn expiry_minutes(mut self, minutes: i64) -> Self {
        self.expiry_minutes = minutes;
        self
    }

    fn effective_acl(&self) -> &str {
        self.acl.as_deref().filter(|a| !a.is_empty()).unwrap_or(DEFAULT_ACL)
    }

    fn effective_max_size(&self) -> u64 {
        self.max_file_size.filter(|&n| n > 0).unwrap_or(DEFAULT_MAX_POST_FILE_SIZE)
    }
}

/// Signed policy plus every form field a browser upload needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Signature {
    pub key: String,
    pub url: String,
    pub policy: String,
    #[serde(rename = "x-amz-credential")]
    pub credential: String,
    #[serde(rename = "x-amz-algorithm")]
    pub algorithm: String,
    #[serde(rename = "x-amz-signature")]
    pub signature: String,
    #[serde(rename = "x-amz-date")]
    pub date: String,
    pub acl: String,
    #[serde(rename = "content-type")]
    pub content_type: String,
}

/// Sign `policy` as issued at `now`. The policy expires `expiry_minutes`
/// after `now`; the credential scope and `x-amz-date` use the issue time.
///
/// Fails with [`S3Error::InvalidRequest`] when the expiry does not fit in
/// the calendar range.
pub fn build_signature(ctx: &SigningContext, policy: &SignaturePolicy, now: DateTime<Utc>) -> Result<Signature> {
    let expiration = TimeDelta::try_minutes(policy.expiry_minutes)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            S3Error::InvalidRequest(format!("policy expiry of {} minutes is out of range", policy.expiry_minutes))
        })?;
    let amz_date = now.format(AMZ_DATE_FORMAT).to_string();
    let short_date = now.format(SHORT_DATE_FORMAT).to_string();
    let credential = format!(
        "{}/{}/{}/{}/{}",
        ctx.access_key, short_date, ctx.region, SIGNING_SERVICE, SIGNING_REQUEST_TYPE
    );
    let acl = policy.effective_acl().to_string();

    let document = json!({
        "expiration": expiration.format(EXPIRATION_FORMAT).to_string(),
        "conditions": [
            { "bucket": policy.bucket },
            ["starts-with", "$key", policy.key_prefix],
            { "acl": acl },
            ["starts-with", "$content-type", policy.content_type],
            ["content-length-range", 1, policy.effective_max_size()],
            { "x-amz-credential": credential },
            { "x-amz-algorithm": SIGNING_ALGORITHM },
            { "x-amz-date": amz_date },
        ]
    });
    let encoded = STANDARD.encode(document.to_string());

    let key = signing_key(&ctx.secret_key, &short_date, &ctx.region);
    let signature = hex::encode(hmac_sha256(&key, encoded.as_bytes()));

    Ok(Signature {
        key: policy.key_prefix.clone(),
        url: format!("https://{}.{}", policy.bucket, ctx.storage_domain),
        policy: encoded,
        credential,
        algorithm: SIGNING_ALGORITHM.to_string(),
        signature,
        date: amz_date,
        acl,
        content_type: policy.content_type.clone(),
    })
}

fn signing_key(secret: &str, short_date: &str, region: &str) -> Vec<u8> {
    let k_date = hmac_sha256(format!("AWS4{}", secret).as_bytes(), short_date.as_bytes());
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, SIGNING_SERVICE.as_bytes());
    hmac_sha256(&k_service, SIGNING_REQUEST_TYPE.as_bytes())
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
