use base64::{Engine as _, engine::general_purpose};
use rand::prelude::RngExt;
use rand::rng;

/// Generates an opaque authentication token with 256 bits of entropy.
///
/// The token is 32 bytes of cryptographically secure random data encoded as base64url
/// without padding, i.e. 43 characters from `[A-Za-z0-9_-]`.
pub fn generate_token() -> String {
    let mut token_bytes = [0u8; 32];
    rng().fill(&mut token_bytes);

    general_purpose::URL_SAFE_NO_PAD.encode(token_bytes)
}
