//! Request signing.
//!
//! Every outbound request carries a `SIGNATURE` query parameter: an
//! HMAC-SHA256 over the other request parameters, keyed with the project's
//! shared secret and hex-encoded.
//!
//! Under [`SignatureScheme::Values`] only the parameter *values* are signed:
//! they are rendered to strings, sorted and concatenated. Two parameter sets
//! whose sorted values coincide therefore share a signature regardless of
//! their keys. [`SignatureScheme::KeyValue`] signs sorted `key=value` pairs
//! instead and is available for receivers that verify it.

use std::collections::BTreeMap;

use beatle_core::SignatureScheme;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;

use crate::error::SchedulerError;

type HmacSha256 = Hmac<Sha256>;

/// Outbound request parameters, excluding `SIGNATURE`.
pub type Params = BTreeMap<String, Value>;

/// Name of the query parameter carrying the digest.
pub const SIGNATURE_PARAM: &str = "SIGNATURE";

/// Computes request signatures for one project.
#[derive(Clone)]
pub struct Signer {
    mac: HmacSha256,
    scheme: SignatureScheme,
}

impl Signer {
    pub fn new(key: &str, scheme: SignatureScheme) -> Result<Self, SchedulerError> {
        let mac = HmacSha256::new_from_slice(key.as_bytes())
            .map_err(|e| SchedulerError::Signing(e.to_string()))?;
        Ok(Self { mac, scheme })
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    /// Hex-encoded HMAC-SHA256 of `params` under the configured scheme.
    pub fn sign(&self, params: &Params) -> String {
        let message = match self.scheme {
            SignatureScheme::Values => values_message(params),
            SignatureScheme::KeyValue => key_value_message(params),
        };
        let mut mac = self.mac.clone();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

/// Strings are used verbatim; every other value in compact JSON form.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn values_message(params: &Params) -> String {
    let mut values: Vec<String> = params.values().map(render_value).collect();
    values.sort();
    values.concat()
}

fn key_value_message(params: &Params) -> String {
    // BTreeMap iterates in key order.
    params
        .iter()
        .map(|(k, v)| format!("{k}={}", render_value(v)))
        .collect::<Vec<_>>()
        .join("&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn values_signer(key: &str) -> Signer {
        Signer::new(key, SignatureScheme::Values).unwrap()
    }

    #[test]
    fn signature_is_deterministic() {
        let signer = values_signer("secret");
        let p = params(&[("TASKS", json!(["backup", "report"]))]);
        assert_eq!(signer.sign(&p), signer.sign(&p));
    }

    #[test]
    fn signature_is_64_hex_chars() {
        let sig = values_signer("secret").sign(&Params::new());
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn empty_params_sign_empty_message() {
        // HMAC-SHA256("key", "") is a well-known value.
        let sig = values_signer("key").sign(&Params::new());
        assert_eq!(
            sig,
            "5d5d139563c95b5967b9bd9a8c9b233a9dedb45072794cd232dc1b74832607d0"
        );
    }

    #[test]
    fn changing_key_changes_signature() {
        let p = params(&[("TASKS", json!(["backup"]))]);
        assert_ne!(values_signer("one").sign(&p), values_signer("two").sign(&p));
    }

    #[test]
    fn changing_value_changes_signature() {
        let signer = values_signer("secret");
        let a = params(&[("TASKS", json!(["backup"]))]);
        let b = params(&[("TASKS", json!(["report"]))]);
        assert_ne!(signer.sign(&a), signer.sign(&b));
    }

    #[test]
    fn values_scheme_ignores_insertion_order_and_keys() {
        let signer = values_signer("secret");
        let a = params(&[("A", json!("x")), ("B", json!("y"))]);
        let b = params(&[("C", json!("y")), ("D", json!("x"))]);
        assert_eq!(signer.sign(&a), signer.sign(&b));
    }

    #[test]
    fn values_scheme_sorts_by_string_form() {
        let signer = values_signer("secret");
        let p = params(&[("B", json!("a")), ("A", json!("b"))]);

        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(b"ab");
        let expected = hex::encode(mac.finalize().into_bytes());

        assert_eq!(signer.sign(&p), expected);
    }

    #[test]
    fn non_string_values_use_compact_json() {
        let p = params(&[("TASKS", json!(["backup", "report"]))]);
        assert_eq!(values_message(&p), r#"["backup","report"]"#);
    }

    #[test]
    fn key_value_scheme_distinguishes_keys() {
        let signer = Signer::new("secret", SignatureScheme::KeyValue).unwrap();
        let a = params(&[("A", json!("x")), ("B", json!("y"))]);
        let b = params(&[("C", json!("y")), ("D", json!("x"))]);
        assert_ne!(signer.sign(&a), signer.sign(&b));
        assert_eq!(key_value_message(&a), "A=x&B=y");
    }
}
