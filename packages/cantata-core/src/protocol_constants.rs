//! Fixed protocol constants that should NOT be changed.
//!
//! These values are defined by external specifications (UPnP, GENA, SSDP)
//! or by observed device behavior; changing them would break protocol
//! compliance or device compatibility.

// ─────────────────────────────────────────────────────────────────────────────
// SSDP
// ─────────────────────────────────────────────────────────────────────────────

/// Standard SSDP multicast address and port (protocol specification).
pub const SSDP_MULTICAST_ADDR: &str = "239.255.255.250:1900";

/// SSDP search target for the player device class.
pub const SSDP_SEARCH_TARGET: &str = "urn:schemas-upnp-org:device:ZonePlayer:1";

/// Well-known HTTP port players listen on for SOAP and device descriptions.
pub const PLAYER_HTTP_PORT: u16 = 1400;

/// Path of the device description document on every player.
pub const DEVICE_DESCRIPTION_PATH: &str = "/xml/device_description.xml";

// ─────────────────────────────────────────────────────────────────────────────
// GENA (UPnP General Event Notification Architecture)
// ─────────────────────────────────────────────────────────────────────────────

/// GENA subscription timeout requested from players (seconds).
pub const GENA_SUBSCRIPTION_TIMEOUT_SECS: u64 = 300;

/// Time before subscription expiry at which renewal fires (seconds).
pub const GENA_RENEWAL_LEAD_SECS: u64 = 30;

/// Maximum size of a GENA notification body (bytes).
pub const MAX_NOTIFY_BODY_SIZE: usize = 64 * 1024;

/// Path prefix on the callback listener for NOTIFY delivery.
pub const NOTIFY_PATH_PREFIX: &str = "/notify";

// ─────────────────────────────────────────────────────────────────────────────
// HTTP/SOAP
// ─────────────────────────────────────────────────────────────────────────────

/// Default timeout for SOAP and GENA HTTP requests (seconds).
pub const SOAP_TIMEOUT_SECS: u64 = 5;

/// UPnP fault: transition not available / content not ready.
///
/// Emitted by AVTransport when Play is issued before the device has
/// buffered the freshly set URI. Recoverable with a short delay.
pub const UPNP_ERR_TRANSITION_UNAVAILABLE: u32 = 701;

/// UPnP fault: action not valid for this device's group role.
///
/// Emitted by stereo-pair slaves for coordinator-only actions such as
/// BecomeCoordinatorOfStandaloneGroup. Treated as "already fine".
pub const UPNP_ERR_INVALID_FOR_ROLE: u32 = 1023;

// ─────────────────────────────────────────────────────────────────────────────
// Content URI routing
// ─────────────────────────────────────────────────────────────────────────────

/// Settle interval after SetAVTransportURI for http(s) sources (ms).
///
/// Devices need a moment to begin buffering a plain HTTP stream before
/// Play succeeds reliably.
pub const HTTP_SETTLE_MS: u64 = 500;

/// Delay before the single Play retry on UPnP fault 701 (ms).
pub const PLAY_RETRY_DELAY_MS: u64 = 1000;

/// Total time to wait for topology data before attempting playback (ms).
pub const TOPOLOGY_WAIT_MS: u64 = 300;

/// Poll interval while waiting for topology data (ms).
pub const TOPOLOGY_POLL_MS: u64 = 100;

/// Maximum number of items expanded from a library playlist browse.
pub const BROWSE_EXPAND_LIMIT: u32 = 1000;

/// Page size for paged ContentDirectory Browse requests.
pub const BROWSE_PAGE_SIZE: u32 = 100;

// ─────────────────────────────────────────────────────────────────────────────
// Eventing & shutdown
// ─────────────────────────────────────────────────────────────────────────────

/// Capacity of each per-player NOTIFY worker queue.
pub const NOTIFY_WORKER_QUEUE_CAPACITY: usize = 64;

/// Capacity of an SSE consumer's outbound frame buffer.
///
/// A consumer whose buffer fills is considered slow and is detached.
pub const SSE_CONSUMER_BUFFER: usize = 64;

/// Bound on graceful shutdown before forced termination (seconds).
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Persisted state
// ─────────────────────────────────────────────────────────────────────────────

/// Time-to-live of the browsed station cache (milliseconds). 24 hours.
pub const STATION_CACHE_TTL_MS: u64 = 24 * 60 * 60 * 1000;

/// Initial backoff after a bot-detected login failure (hours).
pub const BACKOFF_INITIAL_HOURS: f64 = 24.0;

/// Maximum backoff (hours).
pub const BACKOFF_MAX_HOURS: f64 = 48.0;

/// Multiplicative backoff growth factor on successive failures.
pub const BACKOFF_FACTOR: f64 = 1.5;
