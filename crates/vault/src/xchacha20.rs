//! XChaCha20-Poly1305 implementation of the [`Cipher`] trait.

#[allow(deprecated)] // upstream generic-array 0.x deprecation
use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::RngCore;

use crate::{error::VaultError, traits::Cipher};

/// Version tag for the XChaCha20-Poly1305 cipher.
pub const VERSION_TAG: u8 = 0x01;

const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 16;

/// XChaCha20-Poly1305 AEAD cipher.
///
/// Blob layout: `[nonce: 24 bytes][ciphertext + Poly1305 tag: N + 16 bytes]`.
#[derive(Debug, Default, Clone, Copy)]
pub struct XChaCha20Poly1305Cipher;

impl Cipher for XChaCha20Poly1305Cipher {
    fn version_tag(&self) -> u8 {
        VERSION_TAG
    }

    #[allow(deprecated)]
    fn encrypt(&self, key: &[u8; 32], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, VaultError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);

        let sealed = XChaCha20Poly1305::new(key.into())
            .encrypt(XNonce::from_slice(&nonce_bytes), Payload {
                msg: plaintext,
                aad,
            })
            .map_err(|e| VaultError::CipherError(e.to_string()))?;

        let mut out = Vec::with_capacity(NONCE_LEN + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    #[allow(deprecated)]
    fn decrypt(
        &self,
        key: &[u8; 32],
        ciphertext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, VaultError> {
        if ciphertext.len() < NONCE_LEN + TAG_LEN {
            return Err(VaultError::CipherError("ciphertext too short".to_string()));
        }
        let (nonce_bytes, body) = ciphertext.split_at(NONCE_LEN);
        XChaCha20Poly1305::new(key.into())
            .decrypt(XNonce::from_slice(nonce_bytes), Payload { msg: body, aad })
            .map_err(|e| VaultError::CipherError(e.to_string()))
    }
}
