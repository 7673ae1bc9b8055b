use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use anyhow::Result;
use base64::Engine;
use hmac::Mac;
use sha2::Sha256;

type HmacSha256 = hmac::Hmac<Sha256>;

/// Symmetric vault for per-user third-party API keys at rest. One process-wide
/// secret keys both directions; rotating it invalidates every stored
/// ciphertext (no key versioning).
pub struct CredentialVault {
    cipher: Aes256Gcm,
}

/// Derive a 256-bit encryption key from the configured vault secret via
/// HMAC-SHA256(secret, "postforge-vault-v1"), so any secret length yields a
/// valid AES-256 key.
fn derive_key(secret: &str) -> [u8; 32] {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(b"postforge-vault-v1")
        .expect("HMAC can take key of any size");
    mac.update(secret.as_bytes());
    let result = mac.finalize();
    let bytes = result.into_bytes();

    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    key
}

impl CredentialVault {
    pub fn new(secret: &str) -> Self {
        let key = derive_key(secret);
        let cipher = Aes256Gcm::new_from_slice(&key).expect("32-byte key is valid for AES-256");
        Self { cipher }
    }

    /// Encrypt a plaintext value. Returns base64(nonce || ciphertext).
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let nonce_bytes: [u8; 12] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| anyhow::anyhow!("Encryption failed: {}", e))?;

        let mut combined = Vec::with_capacity(12 + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(base64::engine::general_purpose::STANDARD.encode(&combined))
    }

    /// Decrypt a base64(nonce || ciphertext) value. Returns plaintext.
    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let combined = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| anyhow::anyhow!("Base64 decode failed: {}", e))?;

        if combined.len() < 13 {
            return Err(anyhow::anyhow!("Encrypted value too short"));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(12);
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = self
            .cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| anyhow::anyhow!("Decryption failed: {}", e))?;

        String::from_utf8(plaintext).map_err(|e| anyhow::anyhow!("UTF-8 decode failed: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let vault = CredentialVault::new("unit-test-secret");

        let plaintext = "sk-ant-api-key-12345";
        let encrypted = vault.encrypt(plaintext).unwrap();
        assert_ne!(encrypted, plaintext);
        let decrypted = vault.decrypt(&encrypted).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn roundtrip_holds_for_assorted_plaintexts() {
        let vault = CredentialVault::new("unit-test-secret");
        for plaintext in ["k", "a much longer credential value ░ with unicode ключ", "   "] {
            let encrypted = vault.encrypt(plaintext).unwrap();
            assert_eq!(vault.decrypt(&encrypted).unwrap(), plaintext);
        }
    }

    #[test]
    fn encrypt_produces_different_ciphertext_each_time() {
        let vault = CredentialVault::new("unit-test-secret");

        let plaintext = "same-input";
        let a = vault.encrypt(plaintext).unwrap();
        let b = vault.encrypt(plaintext).unwrap();
        assert_ne!(a, b, "random nonce should produce different ciphertext");
        assert_eq!(vault.decrypt(&a).unwrap(), plaintext);
        assert_eq!(vault.decrypt(&b).unwrap(), plaintext);
    }

    #[test]
    fn rotated_secret_cannot_decrypt_old_ciphertext() {
        let old = CredentialVault::new("secret-one");
        let new = CredentialVault::new("secret-two");

        let encrypted = old.encrypt("api-key").unwrap();
        assert!(new.decrypt(&encrypted).is_err());
    }

    #[test]
    fn decrypt_rejects_short_input() {
        let vault = CredentialVault::new("unit-test-secret");
        let short = base64::engine::general_purpose::STANDARD.encode(b"short");
        assert!(vault.decrypt(&short).is_err());
    }

    #[test]
    fn decrypt_rejects_invalid_base64() {
        let vault = CredentialVault::new("unit-test-secret");
        assert!(vault.decrypt("not-valid-base64!!!").is_err());
    }

    #[test]
    fn decrypt_rejects_tampered_ciphertext() {
        let vault = CredentialVault::new("unit-test-secret");
        let encrypted = vault.encrypt("api-key").unwrap();
        let mut bytes = base64::engine::general_purpose::STANDARD
            .decode(&encrypted)
            .unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        let tampered = base64::engine::general_purpose::STANDARD.encode(&bytes);
        assert!(vault.decrypt(&tampered).is_err());
    }
}
