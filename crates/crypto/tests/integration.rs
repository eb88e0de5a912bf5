//! End-to-end tests of the encryption backends through the core trait

#![allow(clippy::unwrap_used, clippy::panic)]

use hearth_core::Encryption;
use hearth_crypto::{AgeEncryption, DebugEncryption, Identity, NoEncryption, load_identities};
use tempfile::TempDir;

fn backend_from_key_file(temp: &TempDir) -> AgeEncryption {
    let identity = Identity::generate();
    let key_path = temp.path().join("key.txt");
    std::fs::write(
        &key_path,
        format!("# public key: {}\n{identity}\n", identity.to_public()),
    )
    .unwrap();
    let identities = load_identities(&key_path).unwrap();
    let recipients = identities.iter().map(Identity::to_public).collect();
    AgeEncryption::new(recipients, identities)
}

#[test]
fn test_file_roundtrip_with_key_file() {
    let temp = TempDir::new().unwrap();
    let backend = backend_from_key_file(&temp);

    let plain_path = temp.path().join("secret");
    std::fs::write(&plain_path, b"password=hunter2\n").unwrap();

    let ciphertext = backend.encrypt_file(&plain_path).unwrap();
    let encrypted_path = temp.path().join("encrypted_secret.age");
    std::fs::write(&encrypted_path, &ciphertext).unwrap();

    backend.decrypt_file(&encrypted_path).unwrap();
    assert_eq!(std::fs::read(&encrypted_path).unwrap(), b"password=hunter2\n");
}

#[test]
fn test_debug_decorator_is_transparent() {
    let temp = TempDir::new().unwrap();
    let backend = DebugEncryption::new(backend_from_key_file(&temp));
    let ciphertext = backend.encrypt(b"data").unwrap();
    assert_eq!(backend.decrypt(&ciphertext).unwrap(), b"data");
    assert_eq!(backend.encrypted_suffix(), ".age");
}

#[test]
fn test_boxed_backends() {
    let temp = TempDir::new().unwrap();
    let backends: Vec<Box<dyn Encryption>> = vec![Box::new(backend_from_key_file(&temp)), Box::new(NoEncryption)];
    assert!(backends[0].encrypt(b"x").is_ok());
    assert!(backends[1].encrypt(b"x").is_err());
}
