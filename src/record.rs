//! The unified record: the one data shape every provider produces and the
//! merge engine consumes.

// std
use std::fmt;
// crates.io
use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
// self
use crate::error::{Error, Result};

/// An insertion-ordered set of strings.
///
/// Set-valued record fields use this instead of a bare `HashSet` so that
/// serialization is deterministic (first-seen order) while union/dedup
/// remain set-semantic, per the record's "no duplicates, order not
/// significant for equality" invariant.
pub type OrderedSet = IndexSet<String>;

/// Target kind a record describes. Closed set per the record's `type` invariant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
	/// A domain name, e.g. `example.com`.
	Domain,
	/// An IPv4 or IPv6 address.
	Ip,
	/// A fully qualified URL.
	Url,
	/// An email address.
	Email,
}
impl TargetType {
	/// The human-readable name used in validation error messages.
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Domain => "domain",
			Self::Ip => "ip",
			Self::Url => "url",
			Self::Email => "email",
		}
	}
}
impl fmt::Display for TargetType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// DNS-style resolution facts collected for a target.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Resolved {
	/// A/AAAA records.
	#[serde(default)]
	pub ip: OrderedSet,
	/// MX records, formatted as `"<priority> <host>"`.
	#[serde(default)]
	pub mx: OrderedSet,
	/// NS records.
	#[serde(default)]
	pub ns: OrderedSet,
	/// TXT records, raw text.
	#[serde(default)]
	pub txt: OrderedSet,
}

/// Domain registration facts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Whois {
	/// Registrar name.
	#[serde(default)]
	pub registrar: Option<String>,
	/// Registrant organization.
	#[serde(default)]
	pub org: Option<String>,
	/// Registrant country.
	#[serde(default)]
	pub country: Option<String>,
	/// Contact emails on the registration.
	#[serde(default)]
	pub emails: OrderedSet,
	/// Registration creation timestamp.
	#[serde(default)]
	pub created: Option<DateTime<Utc>>,
	/// Registration last-updated timestamp.
	#[serde(default)]
	pub updated: Option<DateTime<Utc>>,
	/// Registration expiry timestamp.
	#[serde(default)]
	pub expires: Option<DateTime<Utc>>,
}

/// Network locality facts.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
	/// Autonomous system number.
	#[serde(default)]
	pub asn: Option<String>,
	/// Autonomous system name.
	#[serde(default)]
	pub asn_name: Option<String>,
	/// Internet service provider.
	#[serde(default)]
	pub isp: Option<String>,
	/// City.
	#[serde(default)]
	pub city: Option<String>,
	/// Region/state.
	#[serde(default)]
	pub region: Option<String>,
	/// Country.
	#[serde(default)]
	pub country: Option<String>,
}

/// Threat intelligence signal.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Risk {
	/// Risk score in `0..=100`.
	#[serde(default)]
	pub score: Option<u8>,
	/// Threat categories (e.g. `"phishing"`, `"malware"`).
	#[serde(default)]
	pub categories: OrderedSet,
	/// Whether any provider flagged the target as outright malicious.
	#[serde(default)]
	pub malicious: bool,
}

/// The canonical shape every provider produces and the merge engine consumes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
	/// Provider name, or the literal `"merged"`.
	pub source: String,
	/// Target kind.
	#[serde(rename = "type")]
	pub target_type: TargetType,
	/// The query string; immutable identity.
	pub target: String,
	/// DNS-style resolution facts.
	#[serde(default)]
	pub resolved: Resolved,
	/// Registration facts.
	#[serde(default)]
	pub whois: Whois,
	/// Locality facts.
	#[serde(default)]
	pub network: Network,
	/// Threat signal.
	#[serde(default)]
	pub risk: Risk,
	/// Original payload per provider, preserved verbatim.
	#[serde(default)]
	pub raw: IndexMap<String, serde_json::Value>,
}
impl Record {
	/// Construct an empty record for `target` of the given `type`, attributed
	/// to `source`.
	pub fn empty(source: impl Into<String>, target: impl Into<String>, target_type: TargetType) -> Self {
		Self {
			source: source.into(),
			target_type,
			target: target.into(),
			resolved: Resolved::default(),
			whois: Whois::default(),
			network: Network::default(),
			risk: Risk::default(),
			raw: IndexMap::new(),
		}
	}

	/// Validate the record against the invariants in the record's schema.
	///
	/// Total: never panics, returns the first offending field.
	pub fn validate(&self) -> std::result::Result<(), ValidationError> {
		if self.target.is_empty() {
			return Err(ValidationError { field: "target", reason: "must not be empty".into() });
		}
		if !target_matches_type(&self.target, self.target_type) {
			return Err(ValidationError {
				field: "target",
				reason: format!("does not look like a {}", self.target_type),
			});
		}
		if let Some(score) = self.risk.score
			&& score > 100
		{
			return Err(ValidationError { field: "risk.score", reason: "must be within 0..=100".into() });
		}
		if let (Some(created), Some(expires)) = (self.whois.created, self.whois.expires)
			&& created > expires
		{
			return Err(ValidationError {
				field: "whois.expires",
				reason: "must not precede whois.created".into(),
			});
		}

		Ok(())
	}

	/// Two records are semantically equal iff all fields compare equal after
	/// sorting set-valued fields (order-insensitive at the set level).
	pub fn equal_semantically(&self, other: &Self) -> bool {
		fn sorted(set: &OrderedSet) -> Vec<&str> {
			let mut v: Vec<&str> = set.iter().map(String::as_str).collect();
			v.sort_unstable();
			v
		}

		self.source == other.source
			&& self.target_type == other.target_type
			&& self.target == other.target
			&& sorted(&self.resolved.ip) == sorted(&other.resolved.ip)
			&& sorted(&self.resolved.mx) == sorted(&other.resolved.mx)
			&& sorted(&self.resolved.ns) == sorted(&other.resolved.ns)
			&& sorted(&self.resolved.txt) == sorted(&other.resolved.txt)
			&& self.whois.registrar == other.whois.registrar
			&& self.whois.org == other.whois.org
			&& self.whois.country == other.whois.country
			&& sorted(&self.whois.emails) == sorted(&other.whois.emails)
			&& self.whois.created == other.whois.created
			&& self.whois.updated == other.whois.updated
			&& self.whois.expires == other.whois.expires
			&& self.network == other.network
			&& self.risk.score == other.risk.score
			&& sorted(&self.risk.categories) == sorted(&other.risk.categories)
			&& self.risk.malicious == other.risk.malicious
			&& self.raw == other.raw
	}
}

/// A record failed structural validation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("validation failed for {field}: {reason}")]
pub struct ValidationError {
	/// The first offending field.
	pub field: &'static str,
	/// Human-readable reason.
	pub reason: String,
}
impl From<ValidationError> for Error {
	fn from(value: ValidationError) -> Self {
		Error::Validation { field: value.field, reason: value.reason }
	}
}

fn target_matches_type(target: &str, target_type: TargetType) -> bool {
	match target_type {
		TargetType::Ip => target.parse::<std::net::IpAddr>().is_ok(),
		TargetType::Email => {
			let mut parts = target.splitn(2, '@');
			matches!((parts.next(), parts.next()), (Some(local), Some(domain))
				if !local.is_empty() && domain.contains('.'))
		},
		TargetType::Url => url::Url::parse(target).is_ok(),
		TargetType::Domain => {
			!target.is_empty()
				&& target.contains('.')
				&& target
					.chars()
					.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'))
		},
	}
}
