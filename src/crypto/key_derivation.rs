//! Counterparty key derivation over Ristretto
//!
//! Both parties compute the same shared point `S = a·B = b·A` from their own
//! private key and the other's identity key. An invoice number built from the
//! protocol id and key id is hashed together with `S` into a tweak `h`:
//!
//! - the counterparty's child key is `B + h·G` (derived by us, spendable by them)
//! - our own child key is `(a + h)·G`, spendable with the private scalar `a + h`
//!
//! Because `S` is symmetric, the payer's `B + h·G` equals the payee's own
//! `(b + h)·G` for the same invoice.

use curve25519_dalek::{ristretto::RistrettoPoint, scalar::Scalar};

use super::hashing::domain_hash_wide;
use crate::{
    data_structures::{PrivateKey, PublicKey},
    errors::{WalletError, WalletResult},
    interface::ProtocolId,
};

const DERIVATION_DOMAIN: &str = "wallet_handoff.key_derivation.v1";
const MIN_PROTOCOL_NAME_LEN: usize = 5;
const MAX_PROTOCOL_NAME_LEN: usize = 400;
const MAX_KEY_ID_LEN: usize = 800;

/// Invoice number `"{level}-{protocol}-{keyId}"`
pub fn invoice_number(protocol: &ProtocolId, key_id: &str) -> WalletResult<String> {
    if protocol.security_level() > 2 {
        return Err(WalletError::invalid_argument(
            "protocolID",
            format!("security level {} is not 0, 1 or 2", protocol.security_level()),
        ));
    }
    let name = protocol.name().trim().to_ascii_lowercase();
    if name.len() < MIN_PROTOCOL_NAME_LEN || name.len() > MAX_PROTOCOL_NAME_LEN {
        return Err(WalletError::invalid_argument(
            "protocolID",
            format!(
                "protocol name must be {MIN_PROTOCOL_NAME_LEN}..={MAX_PROTOCOL_NAME_LEN} characters"
            ),
        ));
    }
    if name.contains("  ")
        || !name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == ' ')
    {
        return Err(WalletError::invalid_argument(
            "protocolID",
            "protocol name may only contain letters, digits and single spaces",
        ));
    }
    if key_id.is_empty() || key_id.len() > MAX_KEY_ID_LEN {
        return Err(WalletError::invalid_argument(
            "keyID",
            format!("key id must be 1..={MAX_KEY_ID_LEN} bytes"),
        ));
    }
    Ok(format!("{}-{}-{}", protocol.security_level(), name, key_id))
}

pub fn shared_secret(root: &PrivateKey, counterparty: &PublicKey) -> WalletResult<RistrettoPoint> {
    Ok(root.scalar() * counterparty.point()?)
}

fn tweak(secret: &RistrettoPoint, invoice: &str) -> Scalar {
    let wide = domain_hash_wide(
        DERIVATION_DOMAIN,
        &[secret.compress().as_bytes(), invoice.as_bytes()],
    );
    Scalar::from_bytes_mod_order_wide(&wide)
}

/// Child public key for `invoice`. `for_self` selects our own child key,
/// otherwise the counterparty's.
pub fn derive_public_key(
    root: &PrivateKey,
    counterparty: &PublicKey,
    invoice: &str,
    for_self: bool,
) -> WalletResult<PublicKey> {
    let secret = shared_secret(root, counterparty)?;
    let h = tweak(&secret, invoice);
    let base = if for_self {
        RistrettoPoint::mul_base(&root.scalar())
    } else {
        counterparty.point()?
    };
    Ok(PublicKey::from_point(&(base + RistrettoPoint::mul_base(&h))))
}

/// Private scalar of our own child key for `invoice`
pub fn derive_private_scalar(
    root: &PrivateKey,
    counterparty: &PublicKey,
    invoice: &str,
) -> WalletResult<Scalar> {
    let secret = shared_secret(root, counterparty)?;
    Ok(root.scalar() + tweak(&secret, invoice))
}

/// Linkage for one invoice: the tweak both parties add to their keys
pub fn specific_linkage(
    root: &PrivateKey,
    counterparty: &PublicKey,
    invoice: &str,
) -> WalletResult<[u8; 32]> {
    let secret = shared_secret(root, counterparty)?;
    Ok(tweak(&secret, invoice).to_bytes())
}

/// Public key standing for "anyone": the generator, private scalar one
pub fn anyone_public_key() -> PublicKey {
    PublicKey::from_point(&RistrettoPoint::mul_base(&Scalar::ONE))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment_protocol() -> ProtocolId {
        ProtocolId::new(2, "3241645161d8")
    }

    #[test]
    fn test_invoice_number_format() {
        let invoice = invoice_number(&payment_protocol(), "cHJl c3Vm").unwrap();
        assert_eq!(invoice, "2-3241645161d8-cHJl c3Vm");
    }

    #[test]
    fn test_invoice_number_validation() {
        assert!(invoice_number(&ProtocolId::new(3, "valid name"), "k").is_err());
        assert!(invoice_number(&ProtocolId::new(1, "abc"), "k").is_err());
        assert!(invoice_number(&ProtocolId::new(1, "bad!name"), "k").is_err());
        assert!(invoice_number(&ProtocolId::new(1, "valid name"), "").is_err());
    }

    #[test]
    fn test_counterparty_derivations_agree() {
        let payer = PrivateKey::random();
        let payee = PrivateKey::random();
        let invoice = "2-3241645161d8-a b";

        let from_payer =
            derive_public_key(&payer, &payee.public_key(), invoice, false).unwrap();
        let from_payee =
            derive_public_key(&payee, &payer.public_key(), invoice, true).unwrap();
        assert_eq!(from_payer, from_payee);

        let scalar = derive_private_scalar(&payee, &payer.public_key(), invoice).unwrap();
        assert_eq!(
            PublicKey::from_point(&RistrettoPoint::mul_base(&scalar)),
            from_payee
        );
    }

    #[test]
    fn test_specific_linkage_is_symmetric() {
        let alice = PrivateKey::random();
        let bob = PrivateKey::random();
        let invoice = "2-3241645161d8-x y";
        assert_eq!(
            specific_linkage(&alice, &bob.public_key(), invoice).unwrap(),
            specific_linkage(&bob, &alice.public_key(), invoice).unwrap()
        );
    }

    #[test]
    fn test_distinct_invoices_are_unlinkable() {
        let payer = PrivateKey::random();
        let payee = PrivateKey::random().public_key();
        let a = derive_public_key(&payer, &payee, "2-3241645161d8-a b", false).unwrap();
        let b = derive_public_key(&payer, &payee, "2-3241645161d8-a c", false).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, payee);
    }
}
