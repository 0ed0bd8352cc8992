//! # Key Management
//!
//! secp256k1 key material for Quill signers.
//!
//! A signer holds exactly one private scalar for the lifetime of one
//! invocation. Everything else (public point, identity, signatures) is a
//! pure function of that scalar, which is what lets a downstream validator
//! resolve a proof back to a registered key.
//!
//! ## Security considerations
//!
//! - Private scalars are zeroized on drop (k256's `SigningKey` does this).
//! - Out-of-range scalars (`0` or `>= n`) are rejected at construction,
//!   so every `SigningKeypair` in existence is usable.
//! - Key bytes are never logged, and `Debug` only ever shows the public half.

use k256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use k256::ecdsa::{Signature, SigningKey, VerifyingKey};
use k256::pkcs8::EncodePublicKey;
use k256::FieldBytes;
use std::fmt;

use super::hash::sha256;
use crate::config::{
    COMPRESSED_PUBLIC_KEY_LENGTH, MAX_DER_SIGNATURE_LENGTH, PRIVATE_KEY_LENGTH,
    UNCOMPRESSED_PUBLIC_KEY_LENGTH,
};
use crate::error::SubmitError;

/// A secp256k1 signing keypair.
///
/// `SigningKeypair` intentionally does NOT implement `Serialize`. Private
/// keys reach the process through a [`KeyProvider`](super::KeyProvider) and
/// leave it only by being dropped.
///
/// # Examples
///
/// ```
/// use quill_protocol::crypto::keys::SigningKeypair;
///
/// let kp = SigningKeypair::from_hex(
///     "0000000000000000000000000000000000000000000000000000000000000001",
/// ).unwrap();
/// let sig = kp.sign(b"upload contract template").unwrap();
/// assert!(kp.public_key().verify(b"upload contract template", &sig));
/// ```
#[derive(Clone)]
pub struct SigningKeypair {
    signing_key: SigningKey,
}

/// The public half of a signer, `private · G` on secp256k1.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey {
    key: VerifyingKey,
}

/// A DER-encoded ECDSA signature over `SHA-256(message)`.
///
/// Hex-encoded on the wire. DER is variable length (at most 72 bytes for
/// secp256k1), so the raw bytes are kept as-is rather than in a fixed array.
#[derive(Clone, PartialEq, Eq)]
pub struct EcdsaSignature {
    der: Vec<u8>,
}

impl SigningKeypair {
    /// Build a keypair from a raw 32-byte big-endian scalar.
    ///
    /// Fails with [`SubmitError::KeyFormat`] when the slice is not exactly
    /// 32 bytes or the scalar is outside `[1, n-1]`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SubmitError> {
        if bytes.len() != PRIVATE_KEY_LENGTH {
            return Err(SubmitError::KeyFormat(format!(
                "expected {} bytes, got {}",
                PRIVATE_KEY_LENGTH,
                bytes.len()
            )));
        }
        let signing_key = SigningKey::from_bytes(FieldBytes::from_slice(bytes)).map_err(|_| {
            SubmitError::KeyFormat("scalar is zero or not below the curve order".into())
        })?;
        Ok(Self { signing_key })
    }

    /// Parse a hex-encoded private key.
    ///
    /// Surrounding whitespace and a leading `0x` are tolerated, since key
    /// files and environment variables routinely carry both.
    pub fn from_hex(hex_str: &str) -> Result<Self, SubmitError> {
        let trimmed = hex_str.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        let bytes = hex::decode(digits)
            .map_err(|_| SubmitError::KeyFormat("private key is not valid hex".into()))?;
        Self::from_bytes(&bytes)
    }

    /// Derive the public key. Pure: the same scalar always yields the same point.
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            key: *self.signing_key.verifying_key(),
        }
    }

    /// Sign `SHA-256(message)` with ECDSA.
    ///
    /// The nonce is derived deterministically from the key and digest
    /// (RFC 6979), so signing the same message twice yields the same
    /// signature, and a weak RNG can never leak the key. The result is
    /// low-S normalized.
    pub fn sign(&self, message: &[u8]) -> Result<EcdsaSignature, SubmitError> {
        let digest = sha256(message);
        let signature: Signature = self
            .signing_key
            .sign_prehash(&digest)
            .map_err(|e| SubmitError::Signing(e.to_string()))?;
        Ok(EcdsaSignature::from_signature(&signature))
    }
}

impl fmt::Debug for SigningKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the scalar, not even a prefix of it.
        write!(f, "SigningKeypair(pub={})", self.public_key().to_hex())
    }
}

// ---------------------------------------------------------------------------
// PublicKey
// ---------------------------------------------------------------------------

impl PublicKey {
    /// Parse a SEC1-encoded point (compressed or uncompressed).
    pub fn from_sec1_bytes(bytes: &[u8]) -> Result<Self, SubmitError> {
        if bytes.len() != UNCOMPRESSED_PUBLIC_KEY_LENGTH
            && bytes.len() != COMPRESSED_PUBLIC_KEY_LENGTH
        {
            return Err(SubmitError::KeyFormat(format!(
                "public key must be {} or {} bytes, got {}",
                COMPRESSED_PUBLIC_KEY_LENGTH,
                UNCOMPRESSED_PUBLIC_KEY_LENGTH,
                bytes.len()
            )));
        }
        let key = VerifyingKey::from_sec1_bytes(bytes)
            .map_err(|_| SubmitError::KeyFormat("not a valid secp256k1 point".into()))?;
        Ok(Self { key })
    }

    /// Parse a hex-encoded SEC1 point.
    pub fn from_hex(s: &str) -> Result<Self, SubmitError> {
        let bytes = hex::decode(s.trim())
            .map_err(|_| SubmitError::KeyFormat("public key is not valid hex".into()))?;
        Self::from_sec1_bytes(&bytes)
    }

    /// SEC1 uncompressed encoding: `0x04 || x || y`, 65 bytes.
    pub fn to_uncompressed(&self) -> Vec<u8> {
        self.key.to_encoded_point(false).as_bytes().to_vec()
    }

    /// SEC1 compressed encoding, 33 bytes.
    pub fn to_compressed(&self) -> Vec<u8> {
        self.key.to_encoded_point(true).as_bytes().to_vec()
    }

    /// DER-encoded `SubjectPublicKeyInfo` (id-ecPublicKey, secp256k1,
    /// uncompressed point). This is the encoding the hash-based identity
    /// strategy digests.
    pub fn to_spki_der(&self) -> Result<Vec<u8>, SubmitError> {
        self.key
            .to_public_key_der()
            .map(|doc| doc.as_bytes().to_vec())
            .map_err(|e| SubmitError::KeyFormat(format!("SPKI encoding failed: {e}")))
    }

    /// Hex of the uncompressed encoding. 130 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_uncompressed())
    }

    /// Verify `signature` over `SHA-256(message)`.
    ///
    /// Returns `false` for anything that does not check out, including
    /// signatures whose DER bytes do not parse. Callers that need to know
    /// why can parse with [`EcdsaSignature::to_signature`] themselves.
    pub fn verify(&self, message: &[u8], signature: &EcdsaSignature) -> bool {
        let Ok(sig) = signature.to_signature() else {
            return false;
        };
        let digest = sha256(message);
        self.key.verify_prehash(&digest, &sig).is_ok()
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", &self.to_hex()[..18])
    }
}

// ---------------------------------------------------------------------------
// EcdsaSignature
// ---------------------------------------------------------------------------

impl EcdsaSignature {
    fn from_signature(signature: &Signature) -> Self {
        Self {
            der: signature.to_der().as_bytes().to_vec(),
        }
    }

    /// Wrap DER bytes after checking they parse as a secp256k1 signature.
    pub fn from_der(der: &[u8]) -> Result<Self, SubmitError> {
        if der.len() > MAX_DER_SIGNATURE_LENGTH {
            return Err(SubmitError::Signing(format!(
                "DER signature too long: {} bytes",
                der.len()
            )));
        }
        Signature::from_der(der).map_err(|e| SubmitError::Signing(e.to_string()))?;
        Ok(Self { der: der.to_vec() })
    }

    /// Parse a hex-encoded DER signature.
    pub fn from_hex(s: &str) -> Result<Self, SubmitError> {
        let bytes = hex::decode(s.trim())
            .map_err(|_| SubmitError::Signing("signature is not valid hex".into()))?;
        Self::from_der(&bytes)
    }

    /// Decode into k256's fixed-width signature.
    pub fn to_signature(&self) -> Result<Signature, SubmitError> {
        Signature::from_der(&self.der).map_err(|e| SubmitError::Signing(e.to_string()))
    }

    /// The DER bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.der
    }

    /// Lowercase hex of the DER bytes, as it appears in a proof.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.der)
    }
}

impl fmt::Display for EcdsaSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for EcdsaSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex_str = self.to_hex();
        if hex_str.len() > 16 {
            write!(
                f,
                "EcdsaSignature({}...{})",
                &hex_str[..8],
                &hex_str[hex_str.len() - 8..]
            )
        } else {
            write!(f, "EcdsaSignature({})", hex_str)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY_ONE: &str = "0000000000000000000000000000000000000000000000000000000000000001";
    const CURVE_ORDER: &str = "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141";
    const CURVE_ORDER_MINUS_ONE: &str =
        "fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364140";

    // Uncompressed encoding of the secp256k1 generator point G.
    const GENERATOR_HEX: &str = "0479be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798\
                                 483ada7726a3c4655da4fbfc0e1108a8fd17b448a68554199c47d08ffb10d4b8";

    fn test_keypair() -> SigningKeypair {
        SigningKeypair::from_bytes(&[0x42; 32]).unwrap()
    }

    #[test]
    fn test_scalar_one_derives_generator() {
        let kp = SigningKeypair::from_hex(KEY_ONE).unwrap();
        assert_eq!(kp.public_key().to_hex(), GENERATOR_HEX);
    }

    #[test]
    fn test_zero_scalar_rejected() {
        let err = SigningKeypair::from_bytes(&[0u8; 32]).unwrap_err();
        assert!(matches!(err, SubmitError::KeyFormat(_)));
    }

    #[test]
    fn test_curve_order_rejected() {
        assert!(matches!(
            SigningKeypair::from_hex(CURVE_ORDER),
            Err(SubmitError::KeyFormat(_))
        ));
    }

    #[test]
    fn test_curve_order_minus_one_accepted() {
        assert!(SigningKeypair::from_hex(CURVE_ORDER_MINUS_ONE).is_ok());
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert!(SigningKeypair::from_hex("deadbeef").is_err());
        assert!(SigningKeypair::from_bytes(&[1u8; 33]).is_err());
    }

    #[test]
    fn test_invalid_hex_rejected() {
        assert!(matches!(
            SigningKeypair::from_hex("not-hex-at-all"),
            Err(SubmitError::KeyFormat(_))
        ));
    }

    #[test]
    fn test_hex_prefix_and_whitespace_tolerated() {
        let plain = SigningKeypair::from_hex(KEY_ONE).unwrap();
        let decorated = SigningKeypair::from_hex(&format!("  0x{}\n", KEY_ONE)).unwrap();
        assert_eq!(plain.public_key(), decorated.public_key());
    }

    #[test]
    fn test_public_key_derivation_is_deterministic() {
        let a = test_keypair().public_key();
        let b = test_keypair().public_key();
        assert_eq!(a, b);
        assert_eq!(a.to_hex(), b.to_hex());
    }

    #[test]
    fn test_public_key_encodings() {
        let pk = test_keypair().public_key();
        let uncompressed = pk.to_uncompressed();
        assert_eq!(uncompressed.len(), 65);
        assert_eq!(uncompressed[0], 0x04);

        let compressed = pk.to_compressed();
        assert_eq!(compressed.len(), 33);
        assert!(compressed[0] == 0x02 || compressed[0] == 0x03);

        // Both encodings describe the same point.
        assert_eq!(PublicKey::from_sec1_bytes(&compressed).unwrap(), pk);
        assert_eq!(PublicKey::from_hex(&pk.to_hex()).unwrap(), pk);
    }

    #[test]
    fn test_public_key_length_checked_before_parsing() {
        let pk = test_keypair().public_key();
        let truncated = &pk.to_uncompressed()[..64];
        let err = PublicKey::from_sec1_bytes(truncated).unwrap_err();
        assert!(err.to_string().contains("got 64"));
        assert_eq!(pk.to_uncompressed().len(), UNCOMPRESSED_PUBLIC_KEY_LENGTH);
        assert_eq!(pk.to_compressed().len(), COMPRESSED_PUBLIC_KEY_LENGTH);
    }

    #[test]
    fn test_spki_der_embeds_uncompressed_point() {
        let pk = test_keypair().public_key();
        let der = pk.to_spki_der().unwrap();
        // 23-byte algorithm header + BIT STRING wrapper + 65-byte point.
        assert_eq!(der.len(), 88);
        assert_eq!(der[0], 0x30);
        assert!(der.ends_with(&pk.to_uncompressed()));
    }

    #[test]
    fn test_sign_verify_roundtrip() {
        let kp = test_keypair();
        let sig = kp.sign(b"register provider").unwrap();
        assert!(kp.public_key().verify(b"register provider", &sig));
    }

    #[test]
    fn test_wrong_message_fails_verification() {
        let kp = test_keypair();
        let sig = kp.sign(b"correct message").unwrap();
        assert!(!kp.public_key().verify(b"wrong message", &sig));
    }

    #[test]
    fn test_wrong_key_fails_verification() {
        let kp1 = test_keypair();
        let kp2 = SigningKeypair::from_bytes(&[0x07; 32]).unwrap();
        let sig = kp1.sign(b"message").unwrap();
        assert!(!kp2.public_key().verify(b"message", &sig));
    }

    #[test]
    fn test_deterministic_signatures() {
        // RFC 6979: same key + same message = same nonce = same signature.
        let kp = test_keypair();
        let sig1 = kp.sign(b"determinism is a safety property").unwrap();
        let sig2 = kp.sign(b"determinism is a safety property").unwrap();
        assert_eq!(sig1, sig2);
    }

    #[test]
    fn test_signature_is_der() {
        let sig = test_keypair().sign(b"der please").unwrap();
        let bytes = sig.as_bytes();
        assert_eq!(bytes[0], 0x30, "DER SEQUENCE tag");
        assert_eq!(bytes[1] as usize, bytes.len() - 2, "DER length byte");
        assert!(bytes.len() <= MAX_DER_SIGNATURE_LENGTH);
    }

    #[test]
    fn test_signature_hex_roundtrip() {
        let sig = test_keypair().sign(b"test").unwrap();
        let recovered = EcdsaSignature::from_hex(&sig.to_hex()).unwrap();
        assert_eq!(sig, recovered);
    }

    #[test]
    fn test_malformed_signature_rejected() {
        assert!(EcdsaSignature::from_hex("3006020101020101ff").is_err());
        assert!(EcdsaSignature::from_hex("zz").is_err());
    }

    #[test]
    fn test_debug_does_not_leak_secret() {
        let kp = SigningKeypair::from_bytes(&[0xAB; 32]).unwrap();
        let debug_str = format!("{:?}", kp);
        assert!(debug_str.starts_with("SigningKeypair(pub="));
        assert!(!debug_str.contains(&hex::encode([0xAB; 32])));
    }

    #[test]
    fn test_empty_message_signing() {
        let kp = test_keypair();
        let sig = kp.sign(b"").unwrap();
        assert!(kp.public_key().verify(b"", &sig));
    }
}
