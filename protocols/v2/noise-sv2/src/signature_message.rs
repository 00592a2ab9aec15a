// The certificate exchanged during the handshake: a Schnorr-signed
// statement binding the responder's static key to a validity window, issued
// by the out-of-band pinned authority key.


use const_sv2::SIGNATURE_NOISE_MESSAGE_SIZE;
use secp256k1::{
    hashes::{sha256, Hash},
    schnorr::Signature,
    Keypair, Message, Secp256k1, XOnlyPublicKey,
};

/// The SIGNATURE_NOISE_MESSAGE of the Sv2 handshake.
///
/// Wire layout is 74 bytes: `version:u16 || valid_from:u32 ||
/// not_valid_after:u32 || sig:[u8;64]`, all little-endian. The static key is
/// signed for but not serialized; the initiator reconstructs it from the
/// ElligatorSwift-encoded key received earlier in the same handshake
/// message, converted to x-only form.
pub struct SignatureNoiseMessage {
    pub version: u16,
    /// Start of the validity window, unix seconds.
    pub valid_from: u32,
    /// End of the validity window, unix seconds.
    pub not_valid_after: u32,
    pub signature: [u8; 64],
}

impl From<[u8; SIGNATURE_NOISE_MESSAGE_SIZE]> for SignatureNoiseMessage {
    fn from(value: [u8; SIGNATURE_NOISE_MESSAGE_SIZE]) -> Self {
        let version = u16::from_le_bytes(value[0..2].try_into().unwrap());
        let valid_from = u32::from_le_bytes(value[2..6].try_into().unwrap());
        let not_valid_after = u32::from_le_bytes(value[6..10].try_into().unwrap());
        let signature = value[10..74].try_into().unwrap();
        Self {
            version,
            valid_from,
            not_valid_after,
            signature,
        }
    }
}

impl SignatureNoiseMessage {
    /// Verifies the certificate against the responder's static key under
    /// the pinned authority key, at the current system time.
    pub fn verify(self, static_pk: &XOnlyPublicKey, authority_pk: &XOnlyPublicKey) -> bool {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as u32;
        self.verify_with_now(static_pk, authority_pk, now)
    }

    /// Verifies the certificate at the given timestamp.
    ///
    /// A certificate not yet valid or already expired fails verification
    /// regardless of the signature.
    pub fn verify_with_now(
        self,
        static_pk: &XOnlyPublicKey,
        authority_pk: &XOnlyPublicKey,
        now: u32,
    ) -> bool {
        if self.valid_from > now || self.not_valid_after < now {
            return false;
        }
        let secp = Secp256k1::verification_only();
        let (m, s) = self.split();
        // m = SHA-256(version || valid_from || not_valid_after || static_key)
        let m = [&m[0..10], &static_pk.serialize()].concat();
        let m = Message::from_digest(sha256::Hash::hash(&m).to_byte_array());
        let s = match Signature::from_slice(&s) {
            Ok(s) => s,
            _ => return false,
        };
        secp.verify_schnorr(&s, &m, authority_pk).is_ok()
    }

    /// Signs the first 10 bytes of `msg` together with the static key,
    /// writing the 64-byte Schnorr signature into the remainder of `msg`.
    pub fn sign(
        msg: &mut [u8; SIGNATURE_NOISE_MESSAGE_SIZE],
        static_pk: &XOnlyPublicKey,
        kp: &Keypair,
    ) {
        Self::sign_with_rng(msg, static_pk, kp, &mut rand::thread_rng());
    }

    /// Signs with a caller-provided random number generator, so tests can
    /// be deterministic.
    pub fn sign_with_rng<R: rand::Rng + rand::CryptoRng>(
        msg: &mut [u8; SIGNATURE_NOISE_MESSAGE_SIZE],
        static_pk: &XOnlyPublicKey,
        kp: &Keypair,
        rng: &mut R,
    ) {
        let secp = Secp256k1::signing_only();
        let m = [&msg[0..10], &static_pk.serialize()].concat();
        let m = Message::from_digest(sha256::Hash::hash(&m).to_byte_array());
        let signature = secp.sign_schnorr_with_rng(&m, kp, rng);
        msg[10..].copy_from_slice(signature.as_ref());
    }

    fn split(self) -> ([u8; 10], [u8; 64]) {
        let mut m = [0; 10];
        m[0..2].copy_from_slice(&self.version.to_le_bytes());
        m[2..6].copy_from_slice(&self.valid_from.to_le_bytes());
        m[6..10].copy_from_slice(&self.not_valid_after.to_le_bytes());
        (m, self.signature)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use secp256k1::{Parity, SecretKey};

    fn keypair() -> Keypair {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let kp = Keypair::from_secret_key(&secp, &secret);
        if kp.x_only_public_key().1 == Parity::Even {
            kp
        } else {
            let secret = SecretKey::from_slice(&[0x12; 32]).unwrap();
            Keypair::from_secret_key(&secp, &secret)
        }
    }

    #[test]
    fn valid_certificate_verifies() {
        let authority = keypair();
        let static_kp = keypair();
        let mut msg = [0u8; SIGNATURE_NOISE_MESSAGE_SIZE];
        msg[2..6].copy_from_slice(&100u32.to_le_bytes());
        msg[6..10].copy_from_slice(&200u32.to_le_bytes());
        SignatureNoiseMessage::sign(&mut msg, &static_kp.x_only_public_key().0, &authority);
        let snm = SignatureNoiseMessage::from(msg);
        assert!(snm.verify_with_now(
            &static_kp.x_only_public_key().0,
            &authority.x_only_public_key().0,
            150
        ));
    }

    #[test]
    fn expired_or_premature_certificate_fails() {
        let authority = keypair();
        let static_kp = keypair();
        let mut msg = [0u8; SIGNATURE_NOISE_MESSAGE_SIZE];
        msg[2..6].copy_from_slice(&100u32.to_le_bytes());
        msg[6..10].copy_from_slice(&200u32.to_le_bytes());
        SignatureNoiseMessage::sign(&mut msg, &static_kp.x_only_public_key().0, &authority);
        let static_pk = static_kp.x_only_public_key().0;
        let authority_pk = authority.x_only_public_key().0;
        // Not yet valid.
        assert!(!SignatureNoiseMessage::from(msg).verify_with_now(&static_pk, &authority_pk, 50));
        // Already expired.
        assert!(!SignatureNoiseMessage::from(msg).verify_with_now(&static_pk, &authority_pk, 250));
    }

    #[test]
    fn wrong_authority_fails() {
        let authority = keypair();
        let static_kp = keypair();
        let other = Keypair::from_secret_key(
            &Secp256k1::new(),
            &SecretKey::from_slice(&[0x42; 32]).unwrap(),
        );
        let mut msg = [0u8; SIGNATURE_NOISE_MESSAGE_SIZE];
        msg[6..10].copy_from_slice(&u32::MAX.to_le_bytes());
        SignatureNoiseMessage::sign(&mut msg, &static_kp.x_only_public_key().0, &authority);
        let snm = SignatureNoiseMessage::from(msg);
        assert!(!snm.verify_with_now(
            &static_kp.x_only_public_key().0,
            &other.x_only_public_key().0,
            10
        ));
    }
}
