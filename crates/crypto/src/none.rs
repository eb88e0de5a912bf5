//! The backend used when no encryption is configured

use hearth_core::{Encryption, Error, Result};

/// Fails every operation with [`Error::NoEncryption`]
#[derive(Debug, Clone, Copy, Default)]
pub struct NoEncryption;

impl Encryption for NoEncryption {
    fn encrypt(&self, _plaintext: &[u8]) -> Result<Vec<u8>> {
        Err(Error::NoEncryption)
    }

    fn decrypt(&self, _ciphertext: &[u8]) -> Result<Vec<u8>> {
        Err(Error::NoEncryption)
    }

    fn encrypt_file(&self, _path: &std::path::Path) -> Result<Vec<u8>> {
        Err(Error::NoEncryption)
    }

    fn decrypt_file(&self, _path: &std::path::Path) -> Result<()> {
        Err(Error::NoEncryption)
    }

    fn encrypted_suffix(&self) -> &str {
        ""
    }
}
