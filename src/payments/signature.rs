//! HMAC-SHA256 webhook signatures and payload fingerprints

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// How a provider renders the MAC in its signature header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureEncoding {
    Hex,
    Base64,
}

impl SignatureEncoding {
    fn encode(self, bytes: &[u8]) -> String {
        match self {
            SignatureEncoding::Hex => hex::encode(bytes),
            SignatureEncoding::Base64 => BASE64.encode(bytes),
        }
    }

    fn decode(self, signature: &str) -> Option<Vec<u8>> {
        match self {
            SignatureEncoding::Hex => hex::decode(signature).ok(),
            SignatureEncoding::Base64 => BASE64.decode(signature).ok(),
        }
    }
}

/// Sign a raw body the way the provider would
pub fn sign(secret: &str, payload: &[u8], encoding: SignatureEncoding) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(payload);
    encoding.encode(&mac.finalize().into_bytes())
}

/// Constant-time check of `signature` against the MAC of `payload`
pub fn verify(secret: &str, payload: &[u8], signature: &str, encoding: SignatureEncoding) -> bool {
    let Some(provided) = encoding.decode(signature.trim()) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(payload);
    mac.verify_slice(&provided).is_ok()
}

/// Hex SHA-256 digest, used to derive ids for payloads that carry none
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
