//! Claim and identity value types.

// std
use std::collections::BTreeSet;
// crates.io
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use serde_json::Value;

/// Claim type whose first value is reported as the identity name.
pub const NAME_CLAIM_TYPE: &str = "http://schemas.xmlsoap.org/ws/2005/05/identity/claims/nameidentifier";
/// Claim type consulted by [`Identity::is_in_role`].
pub const ROLE_CLAIM_TYPE: &str = "role";
/// Authentication type reported for identities built from whoami claims.
pub const AUTHENTICATION_TYPE: &str = "whoami";

/// Typed key/value fact about the current user.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Claim {
	/// Claim type, e.g. `role` or `sub`.
	#[serde(rename = "type", alias = "Type")]
	pub r#type: String,
	/// Claim value rendered as text.
	#[serde(alias = "Value", deserialize_with = "deserialize_claim_value")]
	pub value: String,
}
impl Claim {
	/// Build a claim from its type and value.
	pub fn new(r#type: impl Into<String>, value: impl Into<String>) -> Self {
		Self { r#type: r#type.into(), value: value.into() }
	}
}

/// Authentication status plus the claims of the current user.
///
/// Identities are never mutated; every refresh produces a new value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Identity {
	authenticated: bool,
	claims: BTreeSet<Claim>,
}
impl Identity {
	/// The unauthenticated identity with no claims.
	pub fn anonymous() -> Self {
		Self::default()
	}

	/// Build an identity from fetched claims; an empty claim list yields the anonymous identity.
	pub fn from_claims<I>(claims: I) -> Self
	where
		I: IntoIterator<Item = Claim>,
	{
		let claims = claims.into_iter().collect::<BTreeSet<_>>();

		Self { authenticated: !claims.is_empty(), claims }
	}

	/// Whether the identity represents a signed-in user.
	pub fn is_authenticated(&self) -> bool {
		self.authenticated
	}

	/// Authentication type, present only for authenticated identities.
	pub fn authentication_type(&self) -> Option<&'static str> {
		self.authenticated.then_some(AUTHENTICATION_TYPE)
	}

	/// All claims attached to the identity.
	pub fn claims(&self) -> impl Iterator<Item = &Claim> {
		self.claims.iter()
	}

	/// Number of claims attached to the identity.
	pub fn claim_count(&self) -> usize {
		self.claims.len()
	}

	/// First claim of the given type.
	pub fn find_first(&self, r#type: &str) -> Option<&Claim> {
		self.claims.iter().find(|claim| claim.r#type == r#type)
	}

	/// Every claim of the given type.
	pub fn find_all<'a>(&'a self, r#type: &'a str) -> impl Iterator<Item = &'a Claim> {
		self.claims.iter().filter(move |claim| claim.r#type == r#type)
	}

	/// Value of the name-identifier claim.
	pub fn name(&self) -> Option<&str> {
		self.find_first(NAME_CLAIM_TYPE).map(|claim| claim.value.as_str())
	}

	/// Whether a `role` claim carries the given value.
	pub fn is_in_role(&self, role: &str) -> bool {
		self.find_all(ROLE_CLAIM_TYPE).any(|claim| claim.value == role)
	}

	/// Whether the identity carries a claim with the given type and value.
	pub fn has_claim(&self, r#type: &str, value: &str) -> bool {
		self.find_all(r#type).any(|claim| claim.value == value)
	}
}

fn deserialize_claim_value<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
	D: Deserializer<'de>,
{
	match Value::deserialize(deserializer)? {
		Value::Null => Err(D::Error::custom("claim value must not be null")),
		Value::String(value) => Ok(value),
		other => Ok(other.to_string()),
	}
}
