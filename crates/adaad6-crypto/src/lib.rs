//! ADAAD-6 Crypto - Content addressing primitives
//!
//! Every persistent value in ADAAD-6 is addressed by the SHA-256 of its
//! canonical JSON form. This crate is the only allowed path for producing
//! that form:
//!
//! - Canonical encoding (sorted keys, no insignificant whitespace)
//! - SHA-256 content hashing and `attach_hash`
//! - HMAC-SHA256 for configuration signatures and readiness gates

pub mod canon;
pub mod hash;
pub mod mac;

pub use canon::{canonical_json, to_canonical_value, CanonError};
pub use hash::{attach_hash, hash_object, node_body, sha256_hex};
pub use mac::{hmac_sha256_hex, verify_hmac_sha256_hex, MAC_ALGORITHM};
