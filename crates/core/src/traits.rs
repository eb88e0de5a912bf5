//! Collaborator traits consumed by the engine
//!
//! The engine never talks to an encryption tool or a template engine
//! directly. It goes through these traits so that each backend (age, gpg,
//! minijinja, test doubles) can be swapped without touching the engine.

use crate::Result;
use std::path::Path;

/// Encryption backend
///
/// Satisfied by age, gpg, and a no-op backend that always fails.
///
/// # Examples
///
/// ```ignore
/// fn seal(encryption: &dyn Encryption, secret: &str) -> Result<Vec<u8>> {
///     encryption.encrypt(secret.as_bytes())
/// }
/// ```
pub trait Encryption {
    /// Encrypt plaintext
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Decrypt ciphertext
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;

    /// Encrypt the file at `path`, returning the ciphertext
    fn encrypt_file(&self, path: &Path) -> Result<Vec<u8>> {
        let plaintext = std::fs::read(path)?;
        self.encrypt(&plaintext)
    }

    /// Decrypt the file at `path` in place
    fn decrypt_file(&self, path: &Path) -> Result<()> {
        let ciphertext = std::fs::read(path)?;
        let plaintext = self.decrypt(&ciphertext)?;
        std::fs::write(path, plaintext)?;
        Ok(())
    }

    /// Suffix appended to the source names of encrypted files
    fn encrypted_suffix(&self) -> &str;
}

/// Template renderer
///
/// Uses `serde_json::Value` for the data so the trait stays object safe.
pub trait TemplateRenderer {
    /// Register a named template usable from every other template
    fn add_template(&mut self, name: &str, source: &str) -> Result<()>;

    /// Parse `source` without rendering it
    ///
    /// Used to surface syntax errors while the source state is read.
    fn check(&self, name: &str, source: &str) -> Result<()>;

    /// Render `source` with `data`, using `name` in error messages
    fn render_named_str(&self, name: &str, source: &str, data: &serde_json::Value)
    -> Result<String>;
}

impl<T: Encryption + ?Sized> Encryption for Box<T> {
    fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        (**self).encrypt(plaintext)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        (**self).decrypt(ciphertext)
    }

    fn encrypt_file(&self, path: &Path) -> Result<Vec<u8>> {
        (**self).encrypt_file(path)
    }

    fn decrypt_file(&self, path: &Path) -> Result<()> {
        (**self).decrypt_file(path)
    }

    fn encrypted_suffix(&self) -> &str {
        (**self).encrypted_suffix()
    }
}
