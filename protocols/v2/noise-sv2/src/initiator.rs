use std::ptr;

use crate::{
    cipher_state::{Cipher, CipherState, GenericCipher},
    error::Error,
    handshake::HandshakeOp,
    signature_message::SignatureNoiseMessage,
    NoiseCodec,
};
use aes_gcm::KeyInit;
use chacha20poly1305::ChaCha20Poly1305;
use const_sv2::{
    ELLSWIFT_ENCODING_SIZE, ENCRYPTED_ELLSWIFT_ENCODING_SIZE,
    ENCRYPTED_SIGNATURE_NOISE_MESSAGE_SIZE, INITIATOR_EXPECTED_HANDSHAKE_MESSAGE_SIZE,
    SIGNATURE_NOISE_MESSAGE_SIZE,
};
use secp256k1::{
    ellswift::{ElligatorSwift, ElligatorSwiftParty},
    Keypair, PublicKey, XOnlyPublicKey,
};

/// The connecting side of the handshake, anonymous at the Noise layer.
///
/// Holds the ephemeral keypair and the pinned authority key under which the
/// responder's certificate must verify.
pub struct Initiator {
    handshake_cipher: Option<ChaCha20Poly1305>,
    k: Option<[u8; 32]>,
    n: u64,
    // Chaining key
    ck: [u8; 32],
    // Handshake hash
    h: [u8; 32],
    // Ephemeral keypair
    e: Keypair,
    // Pinned certificate authority key of the server
    responder_authority_pk: XOnlyPublicKey,
}

impl std::fmt::Debug for Initiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Initiator").finish()
    }
}

impl CipherState<ChaCha20Poly1305> for Initiator {
    fn get_k(&mut self) -> &mut Option<[u8; 32]> {
        &mut self.k
    }

    fn set_k(&mut self, k: Option<[u8; 32]>) {
        self.k = k;
    }

    fn get_n(&self) -> u64 {
        self.n
    }

    fn set_n(&mut self, n: u64) {
        self.n = n;
    }

    fn get_cipher(&mut self) -> &mut Option<ChaCha20Poly1305> {
        &mut self.handshake_cipher
    }
}

impl HandshakeOp<ChaCha20Poly1305> for Initiator {
    fn get_h(&mut self) -> &mut [u8; 32] {
        &mut self.h
    }

    fn get_ck(&mut self) -> &mut [u8; 32] {
        &mut self.ck
    }

    fn set_h(&mut self, data: [u8; 32]) {
        self.h = data;
    }

    fn set_ck(&mut self, data: [u8; 32]) {
        self.ck = data;
    }

    fn set_handshake_cipher(&mut self, cipher: ChaCha20Poly1305) {
        self.handshake_cipher = Some(cipher);
    }
}

impl Initiator {
    /// Builds an initiator from the raw x-only bytes of the pinned
    /// authority public key.
    pub fn from_raw_k(key: [u8; 32]) -> Result<Box<Self>, Error> {
        let pk = XOnlyPublicKey::from_slice(&key).map_err(|_| Error::InvalidRawPublicKey)?;
        Ok(Self::new(pk))
    }

    pub fn new(authority_pk: XOnlyPublicKey) -> Box<Self> {
        let mut self_ = Self {
            handshake_cipher: None,
            k: None,
            n: 0,
            ck: [0; 32],
            h: [0; 32],
            e: Self::generate_key(),
            responder_authority_pk: authority_pk,
        };
        self_.initialize_self();
        Box::new(self_)
    }

    /// Handshake message E: `-> e`.
    ///
    /// Writes the 64-byte ElligatorSwift encoding of a fresh ephemeral
    /// public key and mixes it into the handshake hash.
    pub fn step_0(&mut self) -> Result<[u8; ELLSWIFT_ENCODING_SIZE], aes_gcm::Error> {
        let ellswift_enc_pubkey = ElligatorSwift::from_pubkey(self.e.public_key()).to_array();
        self.mix_hash(&ellswift_enc_pubkey);
        self.encrypt_and_hash(&mut vec![])?;

        Ok(ellswift_enc_pubkey)
    }

    /// Handshake message ES: `<- e, ee, s, es, SIGNATURE_NOISE_MESSAGE`.
    ///
    /// Reads the responder's 234-byte reply, performing the two ECDH
    /// operations in the same order as the responder so both sides arrive
    /// at an identical chaining key, then verifies the certificate under
    /// the pinned authority key. On success the handshake state is split
    /// into the two transport ciphers.
    pub fn step_2(
        &mut self,
        message: [u8; INITIATOR_EXPECTED_HANDSHAKE_MESSAGE_SIZE],
    ) -> Result<NoiseCodec, Error> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as u32;
        self.step_2_with_now(message, now)
    }

    /// [`Initiator::step_2`] at an explicit timestamp, for deterministic
    /// certificate-window tests.
    pub fn step_2_with_now(
        &mut self,
        message: [u8; INITIATOR_EXPECTED_HANDSHAKE_MESSAGE_SIZE],
        now: u32,
    ) -> Result<NoiseCodec, Error> {
        // re
        let mut ellswift_theirs_ephemeral_serialized = [0u8; ELLSWIFT_ENCODING_SIZE];
        ellswift_theirs_ephemeral_serialized.clone_from_slice(&message[..ELLSWIFT_ENCODING_SIZE]);
        self.mix_hash(&ellswift_theirs_ephemeral_serialized);

        // ee
        let e_private_key = self.e.secret_key();
        let ellswift_ours_ephemeral = ElligatorSwift::from_pubkey(self.e.public_key());
        let ellswift_theirs_ephemeral =
            ElligatorSwift::from_array(ellswift_theirs_ephemeral_serialized);
        let ecdh_ephemeral: [u8; 32] = ElligatorSwift::shared_secret(
            ellswift_ours_ephemeral,
            ellswift_theirs_ephemeral,
            e_private_key,
            ElligatorSwiftParty::A,
            None,
        )
        .to_secret_bytes();
        self.mix_key(&ecdh_ephemeral);

        // rs, encrypted (64 bytes ElligatorSwift encoding + 16 bytes MAC)
        let mut to_decrypt = message
            [ELLSWIFT_ENCODING_SIZE..ELLSWIFT_ENCODING_SIZE + ENCRYPTED_ELLSWIFT_ENCODING_SIZE]
            .to_vec();
        self.decrypt_and_hash(&mut to_decrypt)?;

        // es
        let ellswift_theirs_static_serialized: [u8; ELLSWIFT_ENCODING_SIZE] = to_decrypt[..]
            .try_into()
            .map_err(|_| Error::InvalidMessageLength)?;
        let ellswift_theirs_static = ElligatorSwift::from_array(ellswift_theirs_static_serialized);
        let ecdh_static: [u8; 32] = ElligatorSwift::shared_secret(
            ellswift_ours_ephemeral,
            ellswift_theirs_static,
            e_private_key,
            ElligatorSwiftParty::A,
            None,
        )
        .to_secret_bytes();
        self.mix_key(&ecdh_static);

        // Certificate (74 bytes + 16 bytes MAC)
        let mut to_decrypt = message[ELLSWIFT_ENCODING_SIZE + ENCRYPTED_ELLSWIFT_ENCODING_SIZE
            ..INITIATOR_EXPECTED_HANDSHAKE_MESSAGE_SIZE]
            .to_vec();
        if to_decrypt.len() != ENCRYPTED_SIGNATURE_NOISE_MESSAGE_SIZE {
            return Err(Error::InvalidMessageLength);
        }
        self.decrypt_and_hash(&mut to_decrypt)?;

        let plaintext: [u8; SIGNATURE_NOISE_MESSAGE_SIZE] =
            to_decrypt.try_into().map_err(|_| Error::InvalidMessageLength)?;
        let signature_message: SignatureNoiseMessage = plaintext.into();

        // The certificate signs the x-only form of the static key, not the
        // ElligatorSwift encoding that traveled on the wire.
        let rs_pk_xonly = PublicKey::from_ellswift(ellswift_theirs_static)
            .x_only_public_key()
            .0;
        if !signature_message.verify_with_now(&rs_pk_xonly, &self.responder_authority_pk, now) {
            return Err(Error::InvalidCertificate(plaintext));
        }

        let (temp_k1, temp_k2) = Self::hkdf_2(self.get_ck(), &[]);
        let c1 = ChaCha20Poly1305::new(&temp_k1.into());
        let c2 = ChaCha20Poly1305::new(&temp_k2.into());
        let c1: Cipher<ChaCha20Poly1305> = Cipher::from_key_and_cipher(temp_k1, c1);
        let c2: Cipher<ChaCha20Poly1305> = Cipher::from_key_and_cipher(temp_k2, c2);
        let mut encryptor = GenericCipher::ChaCha20Poly1305(c1);
        let mut decryptor = GenericCipher::ChaCha20Poly1305(c2);
        encryptor.erase_k();
        decryptor.erase_k();
        Ok(NoiseCodec {
            encryptor,
            decryptor,
        })
    }

    fn erase(&mut self) {
        if let Some(k) = self.k.as_mut() {
            for b in k {
                unsafe { ptr::write_volatile(b, 0) };
            }
        }
        for b in self.ck.iter_mut() {
            unsafe { ptr::write_volatile(b, 0) };
        }
        for b in self.h.iter_mut() {
            unsafe { ptr::write_volatile(b, 0) };
        }
        self.e.non_secure_erase();
    }
}

impl Drop for Initiator {
    fn drop(&mut self) {
        self.erase();
    }
}
