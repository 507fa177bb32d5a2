//! Random opaque values: client secrets, authorization codes, access tokens.

use rand::TryRngCore;
use rand::rngs::OsRng;

use crate::error::{OAuthError, OAuthResult};

/// Alphabet random values are drawn from (lower + upper alphanumerics).
const ALPHABET: &[u8; 62] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Length of client secrets.
pub const CLIENT_SECRET_LEN: usize = 64;
/// Length of authorization codes.
pub const AUTHORIZATION_CODE_LEN: usize = 32;
/// Length of access tokens.
pub const ACCESS_TOKEN_LEN: usize = 20;
/// Length of session identifiers.
pub const SESSION_ID_LEN: usize = 32;

/// Generate `len` characters from the OS RNG, one byte per character.
///
/// Each byte is reduced modulo the alphabet size. Values are opaque and only
/// ever compared for equality.
pub fn generate_secret(len: usize) -> OAuthResult<String> {
    let mut bytes = vec![0u8; len];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| OAuthError::internal(format!("random source unavailable: {e}")))?;

    Ok(bytes.iter().map(|b| ALPHABET[usize::from(*b) % ALPHABET.len()] as char).collect())
}
