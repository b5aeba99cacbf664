// src/constants.rs
//
// Centralized constants for s3batch to avoid hardcoded values throughout the codebase

/// Default AWS region when none is configured
pub const DEFAULT_REGION: &str = "us-east-1";

/// Canned ACL applied to uploads and signed POST policies unless overridden
pub const DEFAULT_ACL: &str = "public-read";

/// Host suffix used to build public object URLs (`https://{bucket}.{domain}/{key}`)
pub const DEFAULT_STORAGE_DOMAIN: &str = "s3.amazonaws.com";

/// Upper bound of the `content-length-range` condition in signed POST policies (bytes)
pub const DEFAULT_MAX_POST_FILE_SIZE: u64 = 40_971_520;

/// Default lifetime of a signed POST policy (minutes)
pub const DEFAULT_POLICY_EXPIRY_MINUTES: i64 = 15;

/// Signing algorithm tag for SigV4 POST policies
pub const SIGNING_ALGORITHM: &str = "AWS4-HMAC-SHA256";

/// Service name used in the SigV4 key derivation chain
pub const SIGNING_SERVICE: &str = "s3";

/// Terminal request-type tag of the SigV4 key derivation chain
pub const SIGNING_REQUEST_TYPE: &str = "aws4_request";

/// Default multipart upload part size (16 MB)
pub const DEFAULT_MULTIPART_PART_SIZE: usize = 16 * 1024 * 1024;

/// Minimum S3 multipart upload part size (5 MB - AWS requirement)
pub const MIN_MULTIPART_PART_SIZE: usize = 5 * 1024 * 1024;

/// Maximum number of concurrent part uploads for a single multipart upload
pub const DEFAULT_PARTS_IN_FLIGHT: usize = 4;

/// Lower bound for the auto-detected batch concurrency
pub const MIN_AUTO_IN_FLIGHT: usize = 8;

/// Upper bound for the auto-detected batch concurrency
pub const MAX_AUTO_IN_FLIGHT: usize = 64;

/// Default timeout for a single storage operation (seconds)
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 300;

/// Connect timeout for the S3 HTTP client (seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Number of leading body bytes inspected when sniffing a content type
pub const CONTENT_SNIFF_LEN: usize = 512;

/// Read buffer used while gzip-compressing a log file (64 KB)
pub const GZIP_READ_CHUNK: usize = 64 * 1024;

/// Compressed chunks buffered between the gzip task and the upload
pub const GZIP_PIPE_DEPTH: usize = 4;

/// Extension given to compressed log objects
pub const LOG_ARCHIVE_EXTENSION: &str = "gz";

/// Environment override for batch concurrency
pub const ENV_MAX_IN_FLIGHT: &str = "S3BATCH_MAX_IN_FLIGHT";

/// Environment override for the per-operation timeout (humantime, e.g. `90s`)
pub const ENV_OPERATION_TIMEOUT: &str = "S3BATCH_OPERATION_TIMEOUT";
