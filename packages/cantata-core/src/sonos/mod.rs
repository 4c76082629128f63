//! UPnP protocol plumbing for the player fleet.
//!
//! # Module Structure
//!
//! - `soap` - SOAP envelope building, transport, fault parsing
//! - `services` - UPnP service definitions (URNs, fallback paths)
//! - `traits` - SOAP transport seam for testability
//! - `device` - device description parsing
//! - `didl` - DIDL-Lite metadata parsing with raw-fragment carry-through
//! - `last_change` - LastChange NOTIFY body parsing
//! - `zone_groups` - ZoneGroupState parsing
//! - `discovery` - SSDP multicast + mDNS discovery
//! - `gena` - subscription lifecycle (coordinator)
//! - `gena_client` - GENA HTTP operations
//! - `gena_store` - subscription table
//! - `listener` - callback HTTP listener for NOTIFY delivery

pub mod device;
pub mod didl;
pub mod discovery;
pub mod gena;
pub mod gena_client;
pub mod gena_store;
pub mod last_change;
pub mod listener;
pub mod services;
pub mod soap;
pub mod traits;
pub mod zone_groups;

#[cfg(test)]
pub(crate) mod test_fixtures;

pub use gena::{GenaError, GenaResult, GenaSubscriptionManager, NotifyHandler};
pub use services::SonosService;
pub use soap::{SoapError, SoapResult, SoapTarget};
pub use traits::{HttpSoapTransport, SoapTransport};
