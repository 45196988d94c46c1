//! Concrete provider adapters: one module per third-party OSINT source.
//!
//! Each adapter owns exactly one upstream integration — endpoint, auth,
//! request shape, response decoding — and a colocated `normalize` that maps
//! its raw payload onto the unified [`crate::record::Record`]. Adapters hold
//! no mutable state of their own; they borrow the engine's shared
//! [`reqwest::Client`] for every call.

pub mod certdb;
pub mod dns;
pub mod geoip;
pub mod portscan;
pub mod threatintel;
pub mod whois;

pub use certdb::CertDbProvider;
pub use dns::DnsProvider;
pub use geoip::GeoIpProvider;
pub use portscan::PortScanProvider;
pub use threatintel::ThreatIntelProvider;
pub use whois::WhoisProvider;
