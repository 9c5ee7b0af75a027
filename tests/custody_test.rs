//! Credential custody through the wallet manager: create, gate, reveal, delete

mod common;

use chainvault::custody::WALLET_RECORD_KEY;
use chainvault::{
    AesGcmCodec, FileStore, GateState, KeyValueStore, NoBiometric, SecretPhrase, Severity,
    UnavailablePolicy, WalletError,
};
use common::*;
use std::sync::Arc;
use std::time::Duration;

const HARDHAT_KEY_0: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

#[tokio::test]
async fn test_import_and_reveal_round_trip() -> anyhow::Result<()> {
    let env = TestEnvironment::new(EnvOptions::default())?;
    let manager = &env.manager;

    let wallet = manager.import_wallet(&format!("  {}  ", TEST_PHRASE)).await?;
    assert_eq!(wallet.address, OWNER);
    assert_eq!(manager.address().as_deref(), Some(OWNER));

    // record on disk carries the address but no plaintext
    let storage = FileStore::new_with_base_dir(env.temp_dir.path().to_path_buf());
    let raw = storage.get(WALLET_RECORD_KEY).await?.expect("record stored");
    let text = String::from_utf8_lossy(&raw);
    assert!(text.contains(OWNER));
    assert!(!text.contains("junk"));

    manager.unlock("Reveal recovery phrase").await?;
    assert_eq!(manager.gate_state(), GateState::Unlocked);

    let phrase = manager.reveal_secret().await?;
    assert_eq!(phrase.expose(), TEST_PHRASE);
    let key = manager.reveal_private_key().await?;
    assert_eq!(hex::encode(key.expose()), HARDHAT_KEY_0);
    Ok(())
}

#[tokio::test]
async fn test_reveal_while_locked_never_decrypts() -> anyhow::Result<()> {
    let codec = CountingCodec::new(Arc::new(AesGcmCodec::new(fast_kdf())));
    let env = TestEnvironment::new(EnvOptions {
        codec: Some(codec.clone()),
        ..EnvOptions::default()
    })?;
    env.manager.create_wallet(SecretPhrase::from(TEST_PHRASE)).await?;

    assert_eq!(env.manager.gate_state(), GateState::Locked);
    assert!(matches!(
        env.manager.reveal_secret().await,
        Err(WalletError::NotAuthenticated)
    ));
    assert!(matches!(
        env.manager.reveal_private_key().await,
        Err(WalletError::NotAuthenticated)
    ));
    assert_eq!(codec.decrypts(), 0);

    let errors = env.errors();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.severity == Severity::High));
    Ok(())
}

#[tokio::test]
async fn test_wrong_key_material_fails_integrity() -> anyhow::Result<()> {
    let env = TestEnvironment::new(EnvOptions::default())?;
    env.manager.import_wallet(TEST_PHRASE).await?;

    let TestEnvironment { temp_dir, .. } = env;
    let other = TestEnvironment::in_dir(
        temp_dir,
        EnvOptions {
            key_material: b"another-device",
            ..EnvOptions::default()
        },
    );

    let restored = other.manager.load_existing_wallet().await?;
    assert_eq!(restored.map(|w| w.address).as_deref(), Some(OWNER));

    other.manager.unlock("Reveal").await?;
    assert!(matches!(
        other.manager.reveal_secret().await,
        Err(WalletError::AuthenticationFailure)
    ));
    assert_eq!(other.errors().last().map(|e| e.severity), Some(Severity::Critical));
    Ok(())
}

#[tokio::test]
async fn test_invalid_phrase_persists_nothing() -> anyhow::Result<()> {
    let env = TestEnvironment::new(EnvOptions::default())?;
    let bad_checksum = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon";

    let err = env.manager.import_wallet(bad_checksum).await.unwrap_err();
    assert!(matches!(err, WalletError::InvalidSecretMaterial(_)));
    assert!(env.manager.load_existing_wallet().await?.is_none());
    assert!(env.manager.address().is_none());
    assert_eq!(env.errors()[0].severity, Severity::Medium);
    Ok(())
}

#[tokio::test]
async fn test_second_wallet_is_rejected() -> anyhow::Result<()> {
    let env = TestEnvironment::new(EnvOptions::default())?;
    env.manager.import_wallet(TEST_PHRASE).await?;

    let err = env.manager.create_new_wallet(12).await.unwrap_err();
    assert!(matches!(err, WalletError::WalletExists(ref address) if address == OWNER));
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_imports_store_one_wallet() -> anyhow::Result<()> {
    let env = TestEnvironment::new(EnvOptions::default())?;
    let other_phrase = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    let (a, b) = tokio::join!(
        env.manager.import_wallet(TEST_PHRASE),
        env.manager.import_wallet(other_phrase),
    );
    let (stored, rejected) = match (a, b) {
        (Ok(wallet), Err(err)) | (Err(err), Ok(wallet)) => (wallet, err),
        (a, b) => anyhow::bail!("expected exactly one import to succeed: {:?} / {:?}", a, b),
    };
    assert!(matches!(rejected, WalletError::WalletExists(ref address) if *address == stored.address));

    let loaded = env.manager.load_existing_wallet().await?;
    assert_eq!(loaded.map(|w| w.address), Some(stored.address));
    Ok(())
}

#[tokio::test]
async fn test_delete_is_idempotent() -> anyhow::Result<()> {
    let env = TestEnvironment::new(EnvOptions::default())?;
    env.manager.import_wallet(TEST_PHRASE).await?;
    env.manager.unlock("Delete wallet").await?;

    env.manager.delete_wallet().await?;
    assert!(env.manager.address().is_none());
    assert_eq!(env.manager.gate_state(), GateState::Locked);
    assert!(env.manager.load_existing_wallet().await?.is_none());

    // nothing stored any more
    env.manager.delete_wallet().await?;
    assert!(env.errors().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_generated_wallet_can_be_backed_up() -> anyhow::Result<()> {
    let env = TestEnvironment::new(EnvOptions::default())?;
    let wallet = env.manager.create_new_wallet(24).await?;
    assert!(wallet.address.starts_with("0x"));
    assert_eq!(wallet.address.len(), 42);

    env.manager.unlock("Back up phrase").await?;
    assert_eq!(env.manager.reveal_secret().await?.word_count(), 24);
    Ok(())
}

#[tokio::test]
async fn test_missing_biometric_denies_by_default() -> anyhow::Result<()> {
    let biometric = ScriptedBiometric::not_enrolled();
    let env = TestEnvironment::new(EnvOptions {
        biometric: biometric.clone(),
        ..EnvOptions::default()
    })?;
    env.manager.import_wallet(TEST_PHRASE).await?;

    assert!(matches!(
        env.manager.unlock("Reveal").await,
        Err(WalletError::CapabilityUnavailable(_))
    ));
    assert_eq!(biometric.prompts(), 0);
    assert!(matches!(
        env.manager.reveal_secret().await,
        Err(WalletError::NotAuthenticated)
    ));
    Ok(())
}

#[tokio::test]
async fn test_development_bypass_is_explicit() -> anyhow::Result<()> {
    let env = TestEnvironment::new(EnvOptions {
        biometric: Arc::new(NoBiometric),
        policy: UnavailablePolicy::DevelopmentBypass,
        ..EnvOptions::default()
    })?;
    env.manager.import_wallet(TEST_PHRASE).await?;

    env.manager.unlock("Reveal").await?;
    assert_eq!(env.manager.reveal_secret().await?.expose(), TEST_PHRASE);
    Ok(())
}

#[tokio::test]
async fn test_denied_prompt_stays_locked() -> anyhow::Result<()> {
    let env = TestEnvironment::new(EnvOptions {
        biometric: ScriptedBiometric::enrolled(false),
        ..EnvOptions::default()
    })?;

    let err = env.manager.unlock("Reveal").await.unwrap_err();
    assert!(matches!(err, WalletError::AuthenticationDenied(_)));
    assert_eq!(env.manager.gate_state(), GateState::Locked);
    assert_eq!(env.errors()[0].severity, Severity::High);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_unlocks_share_one_prompt() -> anyhow::Result<()> {
    let biometric = ScriptedBiometric::enrolled(true);
    let env = TestEnvironment::new(EnvOptions {
        biometric: biometric.clone(),
        ..EnvOptions::default()
    })?;

    let (a, b, c) = tokio::join!(
        env.manager.unlock("first"),
        env.manager.unlock("second"),
        env.manager.unlock("third"),
    );
    assert!(a.is_ok() && b.is_ok() && c.is_ok());
    assert_eq!(biometric.prompts(), 1);
    Ok(())
}

#[tokio::test]
async fn test_unlock_expires_after_freshness_window() -> anyhow::Result<()> {
    let env = TestEnvironment::new(EnvOptions {
        freshness_window: Duration::from_millis(50),
        ..EnvOptions::default()
    })?;
    env.manager.import_wallet(TEST_PHRASE).await?;
    env.manager.unlock("Reveal").await?;
    assert!(env.manager.reveal_secret().await.is_ok());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(env.manager.gate_state(), GateState::TimedOut);
    assert!(matches!(
        env.manager.reveal_secret().await,
        Err(WalletError::NotAuthenticated)
    ));
    Ok(())
}

#[tokio::test]
async fn test_explicit_lock_revokes_access() -> anyhow::Result<()> {
    let env = TestEnvironment::new(EnvOptions::default())?;
    env.manager.import_wallet(TEST_PHRASE).await?;
    env.manager.unlock("Reveal").await?;

    env.manager.lock();
    assert!(matches!(
        env.manager.reveal_secret().await,
        Err(WalletError::NotAuthenticated)
    ));
    Ok(())
}
