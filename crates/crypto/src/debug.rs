//! Logging decorator for any encryption backend

use hearth_core::{Encryption, Result};
use std::path::Path;
use tracing::debug;

/// Logs every call to the wrapped backend and its outcome
#[derive(Debug)]
pub struct DebugEncryption<E> {
    inner: E,
}

impl<E: Encryption> DebugEncryption<E> {
    /// Wrap `inner`
    pub fn new(inner: E) -> Self {
        Self { inner }
    }

    /// The wrapped backend
    pub fn into_inner(self) -> E {
        self.inner
    }
}

fn log<T>(op: &str, len: usize, result: &Result<T>) {
    match result {
        Ok(_) => debug!(op, len, "ok"),
        Err(e) => debug!(op, len, error = %e, "failed"),
    }
}

impl<E: Encryption> Encryption for DebugEncryption<E> {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let result = self.inner.encrypt(plaintext);
        log("encrypt", plaintext.len(), &result);
        result
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let result = self.inner.decrypt(ciphertext);
        log("decrypt", ciphertext.len(), &result);
        result
    }

    fn encrypt_file(&self, path: &Path) -> Result<Vec<u8>> {
        let result = self.inner.encrypt_file(path);
        debug!(op = "encrypt_file", path = %path.display(), ok = result.is_ok());
        result
    }

    fn decrypt_file(&self, path: &Path) -> Result<()> {
        let result = self.inner.decrypt_file(path);
        debug!(op = "decrypt_file", path = %path.display(), ok = result.is_ok());
        result
    }

    fn encrypted_suffix(&self) -> &str {
        self.inner.encrypted_suffix()
    }
}
