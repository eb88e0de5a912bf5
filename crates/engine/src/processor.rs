//! Content processing for decryption and template rendering
//!
//! Source file contents pass through a fixed pipeline:
//! 1. Read the source file
//! 2. Decrypt if the name carries `encrypted_`
//! 3. Render if the name carries `.tmpl`
//!
//! The order matters: an encrypted template is decrypted first, then rendered.

use crate::attr::FileAttr;
use crate::error::{Error, Result};
use hearth_core::path::AbsPath;
use hearth_core::{Encryption, TemplateRenderer};

/// Decryption and rendering behind the collaborator traits
pub struct ContentProcessor {
    encryption: Box<dyn Encryption>,
    renderer: Box<dyn TemplateRenderer>,
}

impl std::fmt::Debug for ContentProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentProcessor")
            .field("encrypted_suffix", &self.encryption.encrypted_suffix())
            .finish_non_exhaustive()
    }
}

impl ContentProcessor {
    /// A processor using `encryption` and `renderer`
    pub fn new(encryption: Box<dyn Encryption>, renderer: Box<dyn TemplateRenderer>) -> Self {
        Self { encryption, renderer }
    }

    /// Suffix appended to encrypted source names
    pub fn encrypted_suffix(&self) -> &str {
        self.encryption.encrypted_suffix()
    }

    /// Register a shared template
    pub fn add_template(&mut self, name: &str, source: &str) -> Result<()> {
        self.renderer
            .add_template(name, source)
            .map_err(|e| template_err(name, &e))
    }

    /// Parse a template without rendering it
    pub fn check(&self, name: &str, source: &str) -> Result<()> {
        self.renderer.check(name, source).map_err(|e| template_err(name, &e))
    }

    /// Encrypt plaintext for storage in the source directory
    pub fn encrypt(&self, path: &AbsPath, plaintext: &[u8]) -> Result<Vec<u8>> {
        self.encryption
            .encrypt(plaintext)
            .map_err(|e| Error::Decryption {
                path: path.to_string(),
                message: format!("encrypt: {e}"),
            })
    }

    /// Decrypt the contents of `path`
    pub fn decrypt(&self, path: &AbsPath, ciphertext: &[u8]) -> Result<Vec<u8>> {
        self.encryption
            .decrypt(ciphertext)
            .map_err(|e| Error::Decryption {
                path: path.to_string(),
                message: e.to_string(),
            })
    }

    /// Render `contents` as a template named `name`
    pub fn render(&self, name: &str, contents: Vec<u8>, data: &serde_json::Value) -> Result<Vec<u8>> {
        let text = String::from_utf8(contents).map_err(|e| Error::TemplateRender {
            path: name.to_string(),
            message: e.to_string(),
        })?;
        self.renderer
            .render_named_str(name, &text, data)
            .map(String::into_bytes)
            .map_err(|e| template_err(name, &e))
    }

    /// Run the full pipeline on raw source contents
    pub fn process(
        &self,
        path: &AbsPath,
        mut contents: Vec<u8>,
        attr: &FileAttr,
        data: &serde_json::Value,
    ) -> Result<Vec<u8>> {
        if attr.encrypted {
            contents = self.decrypt(path, &contents)?;
        }
        if attr.template {
            contents = self.render(&path.to_string(), contents, data)?;
        }
        Ok(contents)
    }
}

fn template_err(name: &str, err: &hearth_core::Error) -> Error {
    let message = match err {
        hearth_core::Error::Template { message, .. } => message.clone(),
        other => other.to_string(),
    };
    Error::TemplateRender {
        path: name.to_string(),
        message,
    }
}
