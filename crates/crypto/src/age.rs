//! Age encryption and decryption
//!
//! Output is always ASCII armored. Input may be armored or binary.

use crate::identity::Identity;
use crate::{Error, Recipient, Result};
use hearth_core::Encryption;
use std::io::{Read, Write};

/// Default suffix of encrypted source files
pub const DEFAULT_SUFFIX: &str = ".age";

#[inline]
fn age_error<E: std::fmt::Display>(e: E) -> Error {
    Error::Age(e.to_string())
}

/// Map age decryption errors to our Error type
///
/// Plugin errors are not handled since the `plugin` feature is off.
#[inline]
fn map_decrypt_error(e: age::DecryptError) -> Error {
    match e {
        age::DecryptError::NoMatchingKeys
        | age::DecryptError::InvalidMac
        | age::DecryptError::KeyDecryptionFailed => Error::WrongKey,

        age::DecryptError::DecryptionFailed => Error::DecryptionFailed {
            reason: "Age decryption failed".to_string(),
        },
        age::DecryptError::ExcessiveWork { required, target } => Error::DecryptionFailed {
            reason: format!("Excessive work factor: required {required}, target {target}"),
        },
        age::DecryptError::InvalidHeader => Error::DecryptionFailed {
            reason: "Invalid age header".to_string(),
        },
        age::DecryptError::UnknownFormat => Error::DecryptionFailed {
            reason: "Unknown age format (possibly from a newer version)".to_string(),
        },

        age::DecryptError::Io(io_err) => Error::Io(io_err),
    }
}

/// Encrypt data to `recipients` in ASCII armor format
///
/// # Errors
///
/// - [`Error::NoRecipients`] if `recipients` is empty
/// - [`Error::Age`] if encryption fails
///
/// # Examples
///
/// ```
/// use hearth_crypto::{Identity, decrypt, encrypt};
///
/// let identity = Identity::generate();
/// let encrypted = encrypt(b"secret", &[identity.to_public()]).unwrap();
/// assert!(encrypted.starts_with(b"-----BEGIN AGE ENCRYPTED FILE-----"));
/// assert_eq!(decrypt(&encrypted, &[identity]).unwrap(), b"secret");
/// ```
pub fn encrypt(data: &[u8], recipients: &[Recipient]) -> Result<Vec<u8>> {
    if recipients.is_empty() {
        return Err(Error::NoRecipients);
    }

    let boxed: Vec<Box<dyn age::Recipient + Send>> = recipients.iter().map(Recipient::to_boxed).collect();
    let refs = boxed.iter().map(|r| r.as_ref() as &dyn age::Recipient);
    let encryptor = age::Encryptor::with_recipients(refs)
        .map_err(|_| Error::Age("Failed to create encryptor with recipients".to_string()))?;

    let mut encrypted = Vec::new();
    let armor = age::armor::ArmoredWriter::wrap_output(&mut encrypted, age::armor::Format::AsciiArmor)
        .map_err(age_error)?;
    let mut writer = encryptor.wrap_output(armor).map_err(age_error)?;
    writer.write_all(data).map_err(age_error)?;
    writer
        .finish()
        .and_then(age::armor::ArmoredWriter::finish)
        .map_err(age_error)?;

    Ok(encrypted)
}

/// Decrypt armored or binary data with any of `identities`
///
/// # Errors
///
/// - [`Error::NoIdentity`] if `identities` is empty
/// - [`Error::WrongKey`] if no identity matches
/// - [`Error::DecryptionFailed`] for corrupted input
pub fn decrypt(data: &[u8], identities: &[Identity]) -> Result<Vec<u8>> {
    if identities.is_empty() {
        return Err(Error::NoIdentity);
    }
    let keys = || identities.iter().map(Identity::as_dyn_identity);

    let mut decrypted = Vec::new();
    // ArmoredReader passes binary input through untouched
    let decryptor = age::Decryptor::new(age::armor::ArmoredReader::new(data)).map_err(map_decrypt_error)?;
    let mut reader = decryptor.decrypt(keys()).map_err(map_decrypt_error)?;
    reader.read_to_end(&mut decrypted).map_err(age_error)?;
    Ok(decrypted)
}

/// Age backend
pub struct AgeEncryption {
    recipients: Vec<Recipient>,
    identities: Vec<Identity>,
    suffix: String,
}

impl AgeEncryption {
    /// Backend encrypting to `recipients` and decrypting with `identities`
    #[must_use]
    pub fn new(recipients: Vec<Recipient>, identities: Vec<Identity>) -> Self {
        Self {
            recipients,
            identities,
            suffix: DEFAULT_SUFFIX.to_string(),
        }
    }

    /// Use `suffix` for encrypted source names
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }
}

impl std::fmt::Debug for AgeEncryption {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgeEncryption")
            .field("recipients", &self.recipients.len())
            .field("identities", &self.identities.len())
            .field("suffix", &self.suffix)
            .finish()
    }
}

impl Encryption for AgeEncryption {
    fn encrypt(&self, plaintext: &[u8]) -> hearth_core::Result<Vec<u8>> {
        Ok(encrypt(plaintext, &self.recipients)?)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> hearth_core::Result<Vec<u8>> {
        Ok(decrypt(ciphertext, &self.identities)?)
    }

    fn encrypted_suffix(&self) -> &str {
        &self.suffix
    }
}
