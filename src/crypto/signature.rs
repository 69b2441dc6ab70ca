//! Schnorr signatures over Ristretto, used to unlock pay-to-public-key-hash inputs

use curve25519_dalek::{
    ristretto::{CompressedRistretto, RistrettoPoint},
    scalar::Scalar,
};
use rand::RngCore;

use super::hashing::domain_hash_wide;
use crate::data_structures::PublicKey;

const SIGNATURE_DOMAIN: &str = "wallet_handoff.signature.v1";

fn challenge(nonce_point: &CompressedRistretto, public_key: &PublicKey, message: &[u8]) -> Scalar {
    let wide = domain_hash_wide(
        SIGNATURE_DOMAIN,
        &[nonce_point.as_bytes(), public_key.as_bytes(), message],
    );
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// 64 byte signature `R || s`
pub fn sign(secret: &Scalar, message: &[u8]) -> [u8; 64] {
    let public_key = PublicKey::from_point(&RistrettoPoint::mul_base(secret));
    let mut wide = [0u8; 64];
    rand::thread_rng().fill_bytes(&mut wide);
    let k = Scalar::from_bytes_mod_order_wide(&wide);
    let r = RistrettoPoint::mul_base(&k).compress();
    let s = k + challenge(&r, &public_key, message) * secret;

    let mut out = [0u8; 64];
    out[..32].copy_from_slice(r.as_bytes());
    out[32..].copy_from_slice(s.as_bytes());
    out
}

pub fn verify(public_key: &PublicKey, message: &[u8], signature: &[u8]) -> bool {
    if signature.len() != 64 {
        return false;
    }
    let mut r_bytes = [0u8; 32];
    r_bytes.copy_from_slice(&signature[..32]);
    let mut s_bytes = [0u8; 32];
    s_bytes.copy_from_slice(&signature[32..]);

    let r = CompressedRistretto(r_bytes);
    let (Some(r_point), Ok(p)) = (r.decompress(), public_key.point()) else {
        return false;
    };
    let s: Option<Scalar> = Scalar::from_canonical_bytes(s_bytes).into();
    let Some(s) = s else {
        return false;
    };
    RistrettoPoint::mul_base(&s) == r_point + challenge(&r, public_key, message) * p
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_structures::PrivateKey;

    #[test]
    fn test_sign_and_verify() {
        let key = PrivateKey::random();
        let sig = sign(&key.scalar(), b"tx digest");
        assert!(verify(&key.public_key(), b"tx digest", &sig));
        assert!(!verify(&key.public_key(), b"other digest", &sig));
        assert!(!verify(&PrivateKey::random().public_key(), b"tx digest", &sig));
        assert!(!verify(&key.public_key(), b"tx digest", &sig[..63]));
    }
}
