//! Property-based tests for the MindVideo proxy.
//!
//! These tests use proptest to verify properties that should hold for all
//! inputs, focusing on credential rotation, request signing and progress
//! parsing.

use mindvideo_proxy::services::{
    credential_rotator::CredentialRotator,
    signer::{digest, Signer},
    task_tracker::{classify, PollOutcome},
    upstream::{PollResponse, TaskSnapshot},
};
use proptest::prelude::*;
use serde_json::json;

/// Generate a non-empty credential pool
fn pool_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-zA-Z0-9]{8,24}", 1..=8)
}

proptest! {
    /// Property: the i-th call returns token (i mod N)
    #[test]
    fn prop_rotation_is_round_robin(tokens in pool_strategy(), calls in 1usize..64) {
        let rotator = CredentialRotator::new(tokens.clone()).unwrap();
        for i in 0..calls {
            prop_assert_eq!(rotator.next(), tokens[i % tokens.len()].as_str());
        }
    }

    /// Property: every token is handed out equally often over whole cycles
    #[test]
    fn prop_rotation_is_fair(size in 1usize..8, cycles in 1usize..10) {
        let tokens: Vec<String> = (0..size).map(|i| format!("t{}", i)).collect();
        let rotator = CredentialRotator::new(tokens.clone()).unwrap();
        let mut counts = vec![0usize; size];
        for _ in 0..size * cycles {
            let token = rotator.next();
            let index = tokens.iter().position(|t| t == token).unwrap();
            counts[index] += 1;
        }
        prop_assert!(counts.iter().all(|&c| c == cycles));
    }

    /// Property: a signature verifies against the digest of its own fields
    #[test]
    fn prop_signature_matches_digest(
        key in "[ -~]{1,32}",
        nonce in "[0-9a-f]{16}",
        timestamp in 0i64..4_000_000_000_000,
    ) {
        let signer = Signer::new(key.clone());
        let signature = signer.sign_with(nonce.clone(), timestamp);
        prop_assert_eq!(&signature.sign, &digest(&nonce, timestamp, &key));
        prop_assert_eq!(signature.sign.len(), 32);
        prop_assert!(signature.sign.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    /// Property: changing the key changes the signature
    #[test]
    fn prop_signature_depends_on_key(
        key_a in "[a-z]{4,16}",
        key_b in "[A-Z]{4,16}",
        nonce in "[0-9a-f]{16}",
        timestamp in 0i64..4_000_000_000_000,
    ) {
        prop_assert_ne!(digest(&nonce, timestamp, &key_a), digest(&nonce, timestamp, &key_b));
    }

    /// Property: generated headers are compact JSON with a 16-char hex nonce
    #[test]
    fn prop_generated_header_shape(key in "[a-zA-Z0-9#*_]{1,16}") {
        let header = Signer::new(key.clone()).generate();
        let parsed: serde_json::Value = serde_json::from_str(&header).unwrap();
        let nonce = parsed["nonce"].as_str().unwrap();
        prop_assert_eq!(nonce.len(), 16);
        prop_assert!(nonce.chars().all(|c| c.is_ascii_hexdigit()));
        let prefix = r#"{"nonce":"#;
        prop_assert!(header.starts_with(prefix), "header: {}", header);
        prop_assert!(!header.contains(' '));
    }

    /// Property: parsed progress is always within 0..=100
    #[test]
    fn prop_progress_is_clamped(raw in -1_000.0f64..1_000.0) {
        let from_number: TaskSnapshot =
            serde_json::from_value(json!({ "task_progress": raw })).unwrap();
        let from_string: TaskSnapshot =
            serde_json::from_value(json!({ "task_progress": raw.to_string() })).unwrap();
        prop_assert!(from_number.task_progress <= 100);
        prop_assert_eq!(from_number.task_progress, from_string.task_progress);
    }

    /// Property: a non-zero response code never produces a terminal outcome
    #[test]
    fn prop_non_zero_code_is_transient(code in prop::num::i64::ANY.prop_filter("non-zero", |c| *c != 0)) {
        let response: PollResponse = serde_json::from_value(json!({
            "code": code,
            "data": [{"task_status": "completed", "task_progress": 100,
                      "results": [{"result_url": "https://cdn/v.mp4"}]}]
        }))
        .unwrap();
        prop_assert!(matches!(classify(Ok(response)), PollOutcome::Transient(_)));
    }
}
