//! Authentication scrambles.
//!
//! # mysql_native_password
//!
//! ```text
//! SHA1(password) XOR SHA1(seed + SHA1(SHA1(password)))
//! ```
//!
//! # caching_sha2_password (fast path)
//!
//! ```text
//! SHA256(password) XOR SHA256(SHA256(SHA256(password)) + seed)
//! ```

use sha1::Sha1;
use sha2::{Digest, Sha256};

/// Well-known plugin names.
pub mod plugins {
    pub const MYSQL_NATIVE_PASSWORD: &str = "mysql_native_password";
    pub const CACHING_SHA2_PASSWORD: &str = "caching_sha2_password";
    pub const MYSQL_CLEAR_PASSWORD: &str = "mysql_clear_password";
}

/// Status bytes sent by the server inside an AuthMoreData packet for
/// `caching_sha2_password`.
pub mod caching_sha2 {
    pub const FAST_AUTH_SUCCESS: u8 = 0x03;
    pub const PERFORM_FULL_AUTH: u8 = 0x04;
}

/// Seeds are 20 bytes; servers may append a trailing NUL.
fn trim_seed(seed: &[u8]) -> &[u8] {
    if seed.len() > 20 {
        &seed[..20]
    } else {
        seed
    }
}

fn xor(a: &[u8], b: &[u8]) -> Vec<u8> {
    a.iter().zip(b).map(|(x, y)| x ^ y).collect()
}

/// Computes the `mysql_native_password` response. Empty passwords yield an
/// empty response.
pub fn native_password(password: &str, seed: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }
    let stage1 = Sha1::digest(password.as_bytes());
    let stage2 = Sha1::digest(stage1);

    let mut hasher = Sha1::new();
    hasher.update(trim_seed(seed));
    hasher.update(stage2);
    let mask = hasher.finalize();

    xor(&stage1, &mask)
}

/// Computes the `caching_sha2_password` fast-path response.
pub fn caching_sha2_password(password: &str, seed: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }
    let stage1 = Sha256::digest(password.as_bytes());
    let stage2 = Sha256::digest(stage1);

    let mut hasher = Sha256::new();
    hasher.update(stage2);
    hasher.update(trim_seed(seed));
    let mask = hasher.finalize();

    xor(&stage1, &mask)
}

/// Computes the response for `plugin`, or `None` when the plugin is not
/// supported.
pub fn scramble_for(plugin: &str, password: &str, seed: &[u8]) -> Option<Vec<u8>> {
    match plugin {
        plugins::MYSQL_NATIVE_PASSWORD => Some(native_password(password, seed)),
        plugins::CACHING_SHA2_PASSWORD => Some(caching_sha2_password(password, seed)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEED: &[u8; 20] = b"abcdefghijklmnopqrst";

    #[test]
    fn test_native_password_verifies_like_server() {
        let response = native_password("secret", SEED);
        assert_eq!(response.len(), 20);

        // Server side: SHA1(response XOR SHA1(seed + stored)) == stored
        let stored = Sha1::digest(Sha1::digest(b"secret"));
        let mut hasher = Sha1::new();
        hasher.update(SEED);
        hasher.update(stored);
        let candidate = xor(&response, &hasher.finalize());
        assert_eq!(Sha1::digest(&candidate).as_slice(), stored.as_slice());
    }

    #[test]
    fn test_empty_password() {
        assert!(native_password("", SEED).is_empty());
        assert!(caching_sha2_password("", SEED).is_empty());
    }

    #[test]
    fn test_trailing_nul_in_seed_is_ignored() {
        let mut padded = SEED.to_vec();
        padded.push(0);
        assert_eq!(native_password("pw", &padded), native_password("pw", SEED));
    }

    #[test]
    fn test_caching_sha2_length() {
        assert_eq!(caching_sha2_password("secret", SEED).len(), 32);
    }

    #[test]
    fn test_scramble_for_unknown_plugin() {
        assert!(scramble_for("dialog", "pw", SEED).is_none());
        assert!(scramble_for(plugins::MYSQL_NATIVE_PASSWORD, "pw", SEED).is_some());
    }
}
