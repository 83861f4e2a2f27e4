//! Round-robin rotation over the upstream credential pool.

use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("credential pool must contain at least one token")]
pub struct EmptyCredentialPool;

/// Hands out upstream bearer tokens in strict round-robin order.
///
/// The pool is immutable after construction; the cursor is the only shared
/// mutable state and is only held for the increment-and-wrap.
pub struct CredentialRotator {
    tokens: Vec<String>,
    cursor: Mutex<usize>,
}

impl std::fmt::Debug for CredentialRotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRotator")
            .field("size", &self.tokens.len())
            .finish_non_exhaustive()
    }
}

impl CredentialRotator {
    pub fn new(tokens: Vec<String>) -> Result<Self, EmptyCredentialPool> {
        if tokens.is_empty() {
            return Err(EmptyCredentialPool);
        }
        Ok(Self {
            tokens,
            cursor: Mutex::new(0),
        })
    }

    /// Return the token at the cursor and advance it, wrapping at the pool size.
    pub fn next(&self) -> &str {
        let index = {
            // A poisoned cursor is still a valid index; keep rotating.
            let mut cursor = self.cursor.lock().unwrap_or_else(|e| e.into_inner());
            let current = *cursor;
            *cursor = (current + 1) % self.tokens.len();
            current
        };
        &self.tokens[index]
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
