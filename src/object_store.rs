//! S3 object store client and document URL canonicalization.
//!
//! Uploads source PDFs at ingest time and downloads them at query time for
//! excerpt extraction. Requests are signed with
//! [AWS Signature Version 4](https://docs.aws.amazon.com/AmazonS3/latest/API/sigv4-auth-using-authorization-header.html)
//! using only pure-Rust dependencies (`hmac`, `sha2`), so no C library
//! dependencies are pulled in. Custom endpoints are supported for
//! S3-compatible services (MinIO, LocalStack).
//!
//! # URL forms
//!
//! The canonical internal form is `s3://<bucket>/<key>`. The equivalent
//! virtual-hosted HTTPS form `https://<bucket>.s3.amazonaws.com/<key>` is
//! exposed to end users for browser linking; both resolve to the same bytes
//! and round-trip losslessly through [`S3Location`].
//!
//! # Environment Variables
//!
//! - `AWS_ACCESS_KEY_ID` — required
//! - `AWS_SECRET_ACCESS_KEY` — required
//! - `AWS_SESSION_TOKEN` — optional (temporary credentials / IAM roles)

use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::Duration;

use crate::config::ObjectStoreConfig;
use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// A parsed S3 object location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    pub key: String,
}

impl S3Location {
    /// Parse either URL form. Path-style HTTPS URLs are not part of the
    /// contract and are rejected.
    pub fn parse(url: &str) -> Result<Self> {
        if let Some(rest) = url.strip_prefix("s3://") {
            let (bucket, key) = rest
                .split_once('/')
                .ok_or_else(|| Error::InvalidInput(format!("S3 URL has no key: {}", url)))?;
            if bucket.is_empty() || key.is_empty() {
                return Err(Error::InvalidInput(format!("Invalid S3 URL: {}", url)));
            }
            return Ok(Self {
                bucket: bucket.to_string(),
                key: key.trim_start_matches('/').to_string(),
            });
        }

        if let Some(rest) = url.strip_prefix("https://") {
            if let Some((host, key)) = rest.split_once('/') {
                if let Some(bucket) = host
                    .strip_suffix(".s3.amazonaws.com")
                    .or_else(|| strip_regional_host(host))
                {
                    if !bucket.is_empty() && !key.is_empty() {
                        return Ok(Self {
                            bucket: bucket.to_string(),
                            key: key.to_string(),
                        });
                    }
                }
            }
        }

        Err(Error::InvalidInput(format!("Invalid S3 URL format: {}", url)))
    }

    /// The canonical internal form `s3://bucket/key`.
    pub fn to_uri(&self) -> String {
        format!("s3://{}/{}", self.bucket, self.key)
    }

    /// The browser-facing virtual-hosted HTTPS form.
    pub fn to_https_url(&self) -> String {
        format!("https://{}.s3.amazonaws.com/{}", self.bucket, self.key)
    }
}

/// Strip `<bucket>.s3.<region>.amazonaws.com` hosts to the bucket name.
fn strip_regional_host(host: &str) -> Option<&str> {
    let rest = host.strip_suffix(".amazonaws.com")?;
    let (bucket, s3_region) = rest.split_once(".s3.")?;
    if bucket.is_empty() || s3_region.is_empty() {
        return None;
    }
    Some(bucket)
}

/// Canonicalize any supported URL form to `s3://bucket/key`.
pub fn canonicalize_url(url: &str) -> Result<String> {
    Ok(S3Location::parse(url)?.to_uri())
}

/// AWS credentials read from the environment.
struct AwsCredentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .map_err(|_| Error::Config("AWS_ACCESS_KEY_ID environment variable not set".into()))?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").map_err(|_| {
            Error::Config("AWS_SECRET_ACCESS_KEY environment variable not set".into())
        })?;
        let session_token = std::env::var("AWS_SESSION_TOKEN").ok();

        Ok(Self {
            access_key_id,
            secret_access_key,
            session_token,
        })
    }
}

/// S3 client for uploading judgment PDFs and fetching them back.
pub struct ObjectStoreClient {
    bucket: String,
    region: String,
    endpoint_url: Option<String>,
    client: reqwest::Client,
}

impl ObjectStoreClient {
    pub fn new(config: &ObjectStoreConfig) -> Result<Self> {
        if config.bucket.is_empty() {
            return Err(Error::Config("object_store.bucket is not set".into()));
        }
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(60))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Request(e.to_string()))?;

        Ok(Self {
            bucket: config.bucket.clone(),
            region: config.region.clone(),
            endpoint_url: config.endpoint_url.clone(),
            client,
        })
    }

    /// Upload a local file and return its canonical `s3://` URL.
    pub async fn upload(&self, local_path: &Path, key: &str) -> Result<String> {
        let body = std::fs::read(local_path).map_err(|e| {
            Error::StorageUnavailable(format!("cannot read {}: {}", local_path.display(), e))
        })?;
        self.signed_request(reqwest::Method::PUT, key, body).await?;
        Ok(S3Location {
            bucket: self.bucket.clone(),
            key: key.to_string(),
        }
        .to_uri())
    }

    /// Download an object's bytes by key.
    pub async fn download(&self, key: &str) -> Result<Vec<u8>> {
        let resp = self
            .signed_request(reqwest::Method::GET, key, Vec::new())
            .await?;
        Ok(resp)
    }

    /// Download the object referenced by any supported URL form. The URL's
    /// bucket must match this client's bucket or carry its own resolvable
    /// virtual-hosted host.
    pub async fn download_url(&self, url: &str) -> Result<Vec<u8>> {
        let location = S3Location::parse(url)?;
        if location.bucket == self.bucket {
            return self.download(&location.key).await;
        }
        // Foreign bucket: fetch through the public HTTPS form.
        let resp = self
            .client
            .get(location.to_https_url())
            .send()
            .await
            .map_err(|e| Error::StorageUnavailable(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(Error::StorageUnavailable(format!(
                "GET {} failed (HTTP {})",
                location.to_uri(),
                resp.status()
            )));
        }
        Ok(resp.bytes().await.map_err(Error::from)?.to_vec())
    }

    /// Check whether an object exists (signed HEAD request).
    pub async fn exists(&self, key: &str) -> Result<bool> {
        match self
            .signed_request(reqwest::Method::HEAD, key, Vec::new())
            .await
        {
            Ok(_) => Ok(true),
            Err(Error::StorageUnavailable(msg)) if msg.contains("HTTP 404") => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn host(&self) -> String {
        if let Some(ref endpoint) = self.endpoint_url {
            endpoint
                .trim_start_matches("https://")
                .trim_start_matches("http://")
                .trim_end_matches('/')
                .to_string()
        } else {
            format!("{}.s3.{}.amazonaws.com", self.bucket, self.region)
        }
    }

    fn scheme(&self) -> &'static str {
        match self.endpoint_url {
            Some(ref endpoint) if endpoint.starts_with("http://") => "http",
            _ => "https",
        }
    }

    /// Execute a SigV4-signed request against the bucket and return the
    /// response body.
    async fn signed_request(
        &self,
        method: reqwest::Method,
        key: &str,
        body: Vec<u8>,
    ) -> Result<Vec<u8>> {
        let creds = AwsCredentials::from_env()?;
        let host = self.host();
        let encoded_key = key.split('/').map(uri_encode).collect::<Vec<_>>().join("/");
        let url = format!("{}://{}/{}", self.scheme(), host, encoded_key);

        let now = Utc::now();
        let date_stamp = now.format("%Y%m%d").to_string();
        let amz_date = now.format("%Y%m%dT%H%M%SZ").to_string();

        let payload_hash = hex_sha256(&body);

        let mut headers = vec![
            ("host".to_string(), host.clone()),
            ("x-amz-content-sha256".to_string(), payload_hash.clone()),
            ("x-amz-date".to_string(), amz_date.clone()),
        ];
        if let Some(ref token) = creds.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }
        headers.sort_by(|a, b| a.0.cmp(&b.0));

        let signed_headers: String = headers
            .iter()
            .map(|(k, _)| k.as_str())
            .collect::<Vec<_>>()
            .join(";");

        let canonical_headers: String = headers
            .iter()
            .map(|(k, v)| format!("{}:{}\n", k, v))
            .collect();

        let canonical_uri = format!("/{}", encoded_key);
        let canonical_request = format!(
            "{}\n{}\n\n{}\n{}\n{}",
            method.as_str(),
            canonical_uri,
            canonical_headers,
            signed_headers,
            payload_hash
        );

        let credential_scope = format!("{}/{}/s3/aws4_request", date_stamp, self.region);
        let string_to_sign = format!(
            "AWS4-HMAC-SHA256\n{}\n{}\n{}",
            amz_date,
            credential_scope,
            hex_sha256(canonical_request.as_bytes())
        );

        let signing_key =
            derive_signing_key(&creds.secret_access_key, &date_stamp, &self.region, "s3");
        let signature = hex_hmac_sha256(&signing_key, string_to_sign.as_bytes());

        let authorization = format!(
            "AWS4-HMAC-SHA256 Credential={}/{}, SignedHeaders={}, Signature={}",
            creds.access_key_id, credential_scope, signed_headers, signature
        );

        let mut req = self
            .client
            .request(method, &url)
            .header("Authorization", &authorization)
            .header("x-amz-content-sha256", &payload_hash)
            .header("x-amz-date", &amz_date);

        if let Some(ref token) = creds.session_token {
            req = req.header("x-amz-security-token", token);
        }
        if !body.is_empty() {
            req = req.body(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| Error::StorageUnavailable(format!("S3 request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::StorageUnavailable(format!(
                "S3 request for key '{}' failed (HTTP {})",
                key,
                resp.status().as_u16()
            )));
        }

        Ok(resp.bytes().await.map_err(Error::from)?.to_vec())
    }
}

// ============ AWS SigV4 Helpers ============

/// Compute the hex-encoded SHA-256 hash of data.
fn hex_sha256(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute HMAC-SHA256 of data with the given key.
fn hmac_sha256(key: &[u8], data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}

/// Compute hex-encoded HMAC-SHA256.
fn hex_hmac_sha256(key: &[u8], data: &[u8]) -> String {
    hex::encode(hmac_sha256(key, data))
}

/// Derive the AWS SigV4 signing key for a given date, region, and service.
///
/// ```text
/// kDate    = HMAC("AWS4" + secret, dateStamp)
/// kRegion  = HMAC(kDate, region)
/// kService = HMAC(kRegion, service)
/// kSigning = HMAC(kService, "aws4_request")
/// ```
fn derive_signing_key(secret_key: &str, date_stamp: &str, region: &str, service: &str) -> Vec<u8> {
    let k_date = hmac_sha256(
        format!("AWS4{}", secret_key).as_bytes(),
        date_stamp.as_bytes(),
    );
    let k_region = hmac_sha256(&k_date, region.as_bytes());
    let k_service = hmac_sha256(&k_region, service.as_bytes());
    hmac_sha256(&k_service, b"aws4_request")
}

/// URI-encode a string per RFC 3986 (used in SigV4 canonical requests).
///
/// Encodes all characters except unreserved characters:
/// `A-Z a-z 0-9 - _ . ~`
fn uri_encode(s: &str) -> String {
    let mut result = String::new();
    for byte in s.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char);
            }
            _ => {
                result.push_str(&format!("%{:02X}", byte));
            }
        }
    }
    result
}
