//! x25519 ephemeral key agreement.
//!
//! A thin layer over `x25519-dalek`. Secrets zeroize on drop; the shared
//! secret is intentionally neither comparable nor printable.

pub use x25519_dalek::{PublicKey, SharedSecret, StaticSecret};

use crate::status::Error;
use rand_core::{OsRng, RngCore};
use zeroize::Zeroize;

/// Generate an ephemeral keypair from the system CSPRNG.
///
/// Entropy failure is reported, never papered over with zeroed key material.
pub fn keygen() -> Result<(StaticSecret, PublicKey), Error> {
    let mut bytes: [u8; 32] = [0; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::crypto(format!("system entropy unavailable: {e}")))?;
    let secret = StaticSecret::from(bytes);
    bytes.zeroize();
    let public = PublicKey::from(&secret);
    Ok((secret, public))
}

/// Fill `buf` with CSPRNG bytes (hello randomness). Failure is fatal.
pub fn fill_random(buf: &mut [u8]) -> Result<(), Error> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| Error::crypto(format!("system entropy unavailable: {e}")))
}

/// Compute the shared secret, rejecting low-order (non-contributory) peers.
pub fn diffie_hellman(secret: StaticSecret, public: &PublicKey) -> Result<SharedSecret, Error> {
    let shared = secret.diffie_hellman(public);
    if !shared.was_contributory() {
        return Err(Error::crypto(
            "server key share is a low-order point".to_string(),
        ));
    }
    Ok(shared)
}
