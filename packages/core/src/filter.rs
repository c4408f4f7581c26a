//! Query-argument filters for `GET /coupons`.
//!
//! The [`FilterRegistry`] is the whitelist of accepted `key=value` pairs. Each
//! accepted pair resolves to a typed [`CouponFilter`]; anything else resolves
//! to an [`UnresolvedArg`]. Callers resolve every pair they were given and
//! reject the request if any pair failed, naming all of them.

use crate::types::{Coupon, Status};

/// A resolved, typed predicate over coupons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CouponFilter {
    /// Keep coupons whose derived status equals this one. Coupons with a
    /// missing timestamp have no status and never match.
    Status(Status),
}

impl CouponFilter {
    pub fn matches(&self, coupon: &Coupon) -> bool {
        match self {
            CouponFilter::Status(status) => coupon.status() == Some(*status),
        }
    }
}

/// The argument names the registry knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKey {
    Status,
}

impl FilterKey {
    pub const ALL: [FilterKey; 1] = [FilterKey::Status];

    pub fn name(&self) -> &'static str {
        match self {
            FilterKey::Status => "status",
        }
    }

    /// Accepted values and the filter each maps to.
    pub fn accepted(&self) -> &'static [(&'static str, CouponFilter)] {
        match self {
            FilterKey::Status => &[
                ("valid", CouponFilter::Status(Status::Valid)),
                ("invalid", CouponFilter::Status(Status::Invalid)),
            ],
        }
    }
}

/// A `key=value` pair the registry does not accept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedArg {
    pub key: String,
    pub value: String,
}

impl std::fmt::Display for UnresolvedArg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Every pair that failed to resolve in one request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid query argument(s): {}", join(.0))]
pub struct InvalidArgs(pub Vec<UnresolvedArg>);

fn join(args: &[UnresolvedArg]) -> String {
    args.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Whitelist of accepted query arguments. Built once and shared.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterRegistry;

impl FilterRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Look up a single pair. Matching is exact and case-sensitive.
    pub fn resolve(&self, key: &str, value: &str) -> Result<CouponFilter, UnresolvedArg> {
        FilterKey::ALL
            .iter()
            .find(|k| k.name() == key)
            .and_then(|k| {
                k.accepted()
                    .iter()
                    .find(|(accepted, _)| *accepted == value)
                    .map(|(_, filter)| *filter)
            })
            .ok_or_else(|| UnresolvedArg {
                key: key.to_string(),
                value: value.to_string(),
            })
    }

    /// Resolve every pair. Fails with all unresolved pairs, in input order, if
    /// there is at least one. An empty input yields no filters.
    pub fn resolve_all<K, V>(&self, args: &[(K, V)]) -> Result<Vec<CouponFilter>, InvalidArgs>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut filters = Vec::with_capacity(args.len());
        let mut unresolved = Vec::new();
        for (key, value) in args {
            match self.resolve(key.as_ref(), value.as_ref()) {
                Ok(filter) => filters.push(filter),
                Err(arg) => unresolved.push(arg),
            }
        }
        if unresolved.is_empty() {
            Ok(filters)
        } else {
            Err(InvalidArgs(unresolved))
        }
    }
}
