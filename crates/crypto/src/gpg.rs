//! Encryption through the external `gpg` command

use crate::{Error, Result};
use hearth_core::Encryption;
use std::path::PathBuf;
use tracing::debug;

/// Default gpg command
pub const DEFAULT_COMMAND: &str = "gpg";
/// Default suffix of gpg-encrypted source files
pub const DEFAULT_SUFFIX: &str = ".asc";

/// Gpg backend
#[derive(Debug, Clone)]
pub struct GpgEncryption {
    command: String,
    recipient: Option<String>,
    args: Vec<String>,
    suffix: String,
}

impl Default for GpgEncryption {
    fn default() -> Self {
        Self {
            command: DEFAULT_COMMAND.to_string(),
            recipient: None,
            args: Vec::new(),
            suffix: DEFAULT_SUFFIX.to_string(),
        }
    }
}

impl GpgEncryption {
    /// Backend running `command`
    #[must_use]
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Encrypt to `recipient`; without one gpg encrypts symmetrically
    #[must_use]
    pub fn with_recipient(mut self, recipient: impl Into<String>) -> Self {
        self.recipient = Some(recipient.into());
        self
    }

    /// Extra arguments passed before the operation flags
    #[must_use]
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Use `suffix` for encrypted source names
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    fn encrypt_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend(["--armor".to_string(), "--batch".to_string(), "--yes".to_string()]);
        match &self.recipient {
            Some(recipient) => {
                args.extend(["--encrypt".to_string(), "--recipient".to_string(), recipient.clone()]);
            }
            None => args.push("--symmetric".to_string()),
        }
        args.extend(["--output".to_string(), "-".to_string()]);
        args
    }

    fn decrypt_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend(["--batch".to_string(), "--decrypt".to_string(), "--output".to_string(), "-".to_string()]);
        args
    }

    fn program(&self) -> Result<PathBuf> {
        which::which(&self.command).map_err(|_| Error::CommandNotFound {
            command: self.command.clone(),
        })
    }

    #[tracing::instrument(skip(self, input), fields(command = %self.command))]
    fn run(&self, args: &[String], input: &[u8]) -> Result<Vec<u8>> {
        let program = self.program()?;
        debug!(?args, "running gpg");
        let output = duct::cmd(&program, args)
            .stdin_bytes(input.to_vec())
            .stdout_capture()
            .stderr_capture()
            .unchecked()
            .run()?;
        if !output.status.success() {
            return Err(Error::CommandFailed {
                command: format!("{} {}", self.command, args.join(" ")),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(output.stdout)
    }
}

impl Encryption for GpgEncryption {
    fn encrypt(&self, plaintext: &[u8]) -> hearth_core::Result<Vec<u8>> {
        Ok(self.run(&self.encrypt_args(), plaintext)?)
    }

    fn decrypt(&self, ciphertext: &[u8]) -> hearth_core::Result<Vec<u8>> {
        Ok(self.run(&self.decrypt_args(), ciphertext)?)
    }

    fn encrypted_suffix(&self) -> &str {
        &self.suffix
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]

    use super::*;

    #[test]
    fn test_encrypt_args() {
        let gpg = GpgEncryption::default()
            .with_recipient("me@example.com")
            .with_args(vec!["--quiet".to_string()]);
        assert_eq!(
            gpg.encrypt_args(),
            [
                "--quiet",
                "--armor",
                "--batch",
                "--yes",
                "--encrypt",
                "--recipient",
                "me@example.com",
                "--output",
                "-"
            ]
        );
        assert_eq!(gpg.decrypt_args(), ["--quiet", "--batch", "--decrypt", "--output", "-"]);
    }

    #[test]
    fn test_symmetric_without_recipient() {
        assert!(GpgEncryption::default().encrypt_args().contains(&"--symmetric".to_string()));
    }

    #[test]
    fn test_missing_command() {
        let gpg = GpgEncryption::new("hearth-no-such-gpg");
        let err = Encryption::encrypt(&gpg, b"x").unwrap_err();
        assert!(err.to_string().contains("command not found"));
        assert_eq!(gpg.encrypted_suffix(), ".asc");
    }

    #[test]
    fn test_failing_command() {
        let gpg = GpgEncryption::new("false");
        let err = gpg.run(&[], b"").unwrap_err();
        assert!(matches!(err, Error::CommandFailed { .. }));
    }

    #[test]
    fn test_passthrough_command() {
        let gpg = GpgEncryption::new("cat");
        assert_eq!(gpg.run(&[], b"plain").unwrap(), b"plain");
    }
}
