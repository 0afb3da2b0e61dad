//! Digital signature solution.
//!
//! Signing/verifying is performed against 32-byte SHA-256 digests of
//! *serialized* messages. `borsh` is used for deterministic serialization, so
//! every type that will get digested must derive `BorshSerialize`; two
//! replicas hashing the same request always produce the identical digest.

use borsh::{BorshDeserialize, BorshSerialize};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest as _, Sha256};

pub type Digest = [u8; 32];

/// RSA modulus size for generated keys. Tests may pass something smaller to
/// `generate_keys`.
pub const KEY_BITS: usize = 2048;

pub fn digest(data: &impl BorshSerialize) -> crate::Result<Digest> {
    Ok(Sha256::digest(borsh::to_vec(data)?).into())
}

/// RSA-PKCS1v15 signature over a `Digest`, carrying the SHA-256 OID.
#[derive(Debug, Clone, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct Signature(Vec<u8>);

impl Signature {
    #[cfg(test)]
    pub(crate) fn corrupt(mut self) -> Self {
        self.0[0] ^= 0x01;
        self
    }
}

#[derive(Debug, Clone)]
pub struct Signer(RsaPrivateKey);

impl Signer {
    pub fn sign(&self, digest: &Digest) -> crate::Result<Signature> {
        Ok(Signature(self.0.sign(Pkcs1v15Sign::new::<Sha256>(), digest)?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verifier(RsaPublicKey);

impl Verifier {
    /// Returns `false` on any cryptographic failure; a malformed signature and
    /// a wrong one are indistinguishable to callers.
    pub fn verify(&self, digest: &Digest, signature: &Signature) -> bool {
        self.0
            .verify(Pkcs1v15Sign::new::<Sha256>(), digest, &signature.0)
            .is_ok()
    }
}

pub fn generate_keys(bits: usize) -> crate::Result<(Signer, Verifier)> {
    let key = RsaPrivateKey::new(&mut rand::thread_rng(), bits)?;
    let verifier = Verifier(RsaPublicKey::from(&key));
    Ok((Signer(key), verifier))
}
