//! Merge engine: `N` unified records for one target combine deterministically
//! into one.

// self
use crate::record::{Record, TargetType};

/// Combine `records` into a single unified record with `source = "merged"`.
///
/// `records` must be given in registry declaration order — single-value
/// fields (registrar, org, network facts, ...) resolve to the first
/// non-empty value in that order, which is the canonical tie-break per the
/// merge policy. Set-valued fields are order-insensitive (plain union).
///
/// Empty input produces an empty record carrying the caller-supplied
/// `target`/`target_type`. A single-record input is relabeled to
/// `source = "merged"` with its original payload folded into `raw`.
pub fn merge(records: &[Record], target: &str, target_type: TargetType) -> Record {
	let mut out = Record::empty("merged", target, target_type);

	for record in records {
		out.resolved.ip.extend(record.resolved.ip.iter().cloned());
		out.resolved.mx.extend(record.resolved.mx.iter().cloned());
		out.resolved.ns.extend(record.resolved.ns.iter().cloned());
		out.resolved.txt.extend(record.resolved.txt.iter().cloned());

		out.whois.emails.extend(record.whois.emails.iter().cloned());

		if out.whois.registrar.is_none() {
			out.whois.registrar = record.whois.registrar.clone();
		}
		if out.whois.org.is_none() {
			out.whois.org = record.whois.org.clone();
		}
		if out.whois.country.is_none() {
			out.whois.country = record.whois.country.clone();
		}

		out.whois.created = earliest(out.whois.created, record.whois.created);
		out.whois.updated = latest(out.whois.updated, record.whois.updated);
		out.whois.expires = latest(out.whois.expires, record.whois.expires);

		if out.network.asn.is_none() {
			out.network.asn = record.network.asn.clone();
		}
		if out.network.asn_name.is_none() {
			out.network.asn_name = record.network.asn_name.clone();
		}
		if out.network.isp.is_none() {
			out.network.isp = record.network.isp.clone();
		}
		if out.network.city.is_none() {
			out.network.city = record.network.city.clone();
		}
		if out.network.region.is_none() {
			out.network.region = record.network.region.clone();
		}
		if out.network.country.is_none() {
			out.network.country = record.network.country.clone();
		}

		out.risk.score = match (out.risk.score, record.risk.score) {
			(None, rhs) => rhs,
			(lhs, None) => lhs,
			(Some(lhs), Some(rhs)) => Some(lhs.max(rhs)),
		};
		out.risk.categories.extend(record.risk.categories.iter().cloned());
		out.risk.malicious = out.risk.malicious || record.risk.malicious;

		for (provider, payload) in &record.raw {
			out.raw.insert(provider.clone(), payload.clone());
		}
	}

	out
}

fn earliest(
	lhs: Option<chrono::DateTime<chrono::Utc>>,
	rhs: Option<chrono::DateTime<chrono::Utc>>,
) -> Option<chrono::DateTime<chrono::Utc>> {
	match (lhs, rhs) {
		(None, rhs) => rhs,
		(lhs, None) => lhs,
		(Some(lhs), Some(rhs)) => Some(lhs.min(rhs)),
	}
}

fn latest(
	lhs: Option<chrono::DateTime<chrono::Utc>>,
	rhs: Option<chrono::DateTime<chrono::Utc>>,
) -> Option<chrono::DateTime<chrono::Utc>> {
	match (lhs, rhs) {
		(None, rhs) => rhs,
		(lhs, None) => lhs,
		(Some(lhs), Some(rhs)) => Some(lhs.max(rhs)),
	}
}
