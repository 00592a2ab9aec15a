use std::{ptr, time::Duration};

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
use secp256k1::{ellswift::ElligatorSwift, Keypair, Secp256k1, SecretKey};

const VERSION: u16 = 0;

/// The listening side of the handshake.
///
/// Holds the long-term static keypair of the process, the authority keypair
/// that signs the static key's certificate, and a fresh ephemeral keypair
/// per handshake.
pub struct Responder {
    handshake_cipher: Option<ChaCha20Poly1305>,
    k: Option<[u8; 32]>,
    n: u64,
    // Chaining key
    ck: [u8; 32],
    // Handshake hash
    h: [u8; 32],
    // Ephemeral keypair
    e: Keypair,
    // Static keypair
    s: Keypair,
    // Authority keypair
    a: Keypair,
    cert_validity: u32,
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder").finish()
    }
}

impl CipherState<ChaCha20Poly1305> for Responder {
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

impl HandshakeOp<ChaCha20Poly1305> for Responder {
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

impl Responder {
    /// Builds a responder from the raw authority key material, checking
    /// that the public half matches the secret, and generating a fresh
    /// static key for the session.
    pub fn from_authority_kp(
        public: &[u8; 32],
        private: &[u8; 32],
        cert_validity: Duration,
    ) -> Result<Box<Self>, Error> {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(private).map_err(|_| Error::InvalidRawPrivateKey)?;
        let kp = Keypair::from_secret_key(&secp, &secret);
        let pub_ = kp.x_only_public_key().0.serialize();
        if public == &pub_[..] {
            Ok(Self::new(kp, Self::generate_key(), cert_validity.as_secs() as u32))
        } else {
            Err(Error::InvalidRawPublicKey)
        }
    }

    /// Builds a responder around a long-term static keypair, so every
    /// connection of the process presents the same static key.
    pub fn new(a: Keypair, s: Keypair, cert_validity: u32) -> Box<Self> {
        let mut self_ = Self {
            handshake_cipher: None,
            k: None,
            n: 0,
            ck: [0; 32],
            h: [0; 32],
            e: Self::generate_key(),
            s,
            a,
            cert_validity,
        };
        self_.initialize_self();
        Box::new(self_)
    }

    /// Processes handshake message E and produces message ES:
    /// `<- e, ee, s, es, SIGNATURE_NOISE_MESSAGE`.
    ///
    /// The 234-byte reply carries the plaintext ephemeral key, the
    /// encrypted static key and the encrypted certificate. Returns the
    /// reply together with the transport codec; the responder is in
    /// transport mode as soon as the reply has been flushed.
    pub fn step_1(
        &mut self,
        ellswift_theirs_ephemeral_serialized: [u8; ELLSWIFT_ENCODING_SIZE],
    ) -> Result<([u8; INITIATOR_EXPECTED_HANDSHAKE_MESSAGE_SIZE], NoiseCodec), aes_gcm::Error>
    {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs() as u32;
        self.step_1_with_now_rng(
            ellswift_theirs_ephemeral_serialized,
            now,
            &mut rand::thread_rng(),
        )
    }

    /// [`Responder::step_1`] at an explicit timestamp and RNG, for
    /// deterministic tests.
    pub fn step_1_with_now_rng<R: rand::Rng + rand::CryptoRng>(
        &mut self,
        ellswift_theirs_ephemeral_serialized: [u8; ELLSWIFT_ENCODING_SIZE],
        now: u32,
        rng: &mut R,
    ) -> Result<([u8; INITIATOR_EXPECTED_HANDSHAKE_MESSAGE_SIZE], NoiseCodec), aes_gcm::Error>
    {
        // re
        self.mix_hash(&ellswift_theirs_ephemeral_serialized[..]);
        self.decrypt_and_hash(&mut vec![])?;

        let mut out = [0; INITIATOR_EXPECTED_HANDSHAKE_MESSAGE_SIZE];

        // e
        let keypair = self.e;
        let ellswift_ours_ephemeral = ElligatorSwift::from_pubkey(keypair.public_key());
        let ellswift_ours_ephemeral_serialized = ellswift_ours_ephemeral.to_array();
        out[..ELLSWIFT_ENCODING_SIZE].copy_from_slice(&ellswift_ours_ephemeral_serialized);
        self.mix_hash(&ellswift_ours_ephemeral_serialized);

        // ee
        let e_private_key = keypair.secret_key();
        let ellswift_theirs_ephemeral =
            ElligatorSwift::from_array(ellswift_theirs_ephemeral_serialized);
        let ecdh_ephemeral = ElligatorSwift::shared_secret(
            ellswift_theirs_ephemeral,
            ellswift_ours_ephemeral,
            e_private_key,
            secp256k1::ellswift::ElligatorSwiftParty::B,
            None,
        )
        .to_secret_bytes();
        self.mix_key(&ecdh_ephemeral);

        // s, encrypted (64 bytes ElligatorSwift encoding + 16 bytes MAC)
        let ellswift_ours_static = ElligatorSwift::from_pubkey(self.s.public_key());
        let mut encrypted_static_pub_k = ellswift_ours_static.to_array().to_vec();
        self.encrypt_and_hash(&mut encrypted_static_pub_k)?;
        out[ELLSWIFT_ENCODING_SIZE..ELLSWIFT_ENCODING_SIZE + ENCRYPTED_ELLSWIFT_ENCODING_SIZE]
            .copy_from_slice(&encrypted_static_pub_k[..ENCRYPTED_ELLSWIFT_ENCODING_SIZE]);

        // es
        let s_private_key = self.s.secret_key();
        let ecdh_static = ElligatorSwift::shared_secret(
            ellswift_theirs_ephemeral,
            ellswift_ours_static,
            s_private_key,
            secp256k1::ellswift::ElligatorSwiftParty::B,
            None,
        )
        .to_secret_bytes();
        self.mix_key(&ecdh_static[..]);

        // Certificate (74 bytes + 16 bytes MAC)
        let not_valid_after = now.saturating_add(self.cert_validity);
        let signature_noise_message = self.get_signature(VERSION, now, not_valid_after, rng);
        let mut signature_part = signature_noise_message.to_vec();
        self.encrypt_and_hash(&mut signature_part)?;
        out[ELLSWIFT_ENCODING_SIZE + ENCRYPTED_ELLSWIFT_ENCODING_SIZE
            ..INITIATOR_EXPECTED_HANDSHAKE_MESSAGE_SIZE]
            .copy_from_slice(&signature_part[..ENCRYPTED_SIGNATURE_NOISE_MESSAGE_SIZE]);

        // Split: cs1 decrypts what the initiator sends, cs2 encrypts our
        // replies.
        let ck = self.get_ck();
        let (temp_k1, temp_k2) = Self::hkdf_2(ck, &[]);
        let c1 = ChaCha20Poly1305::new(&temp_k1.into());
        let c2 = ChaCha20Poly1305::new(&temp_k2.into());
        let c1: Cipher<ChaCha20Poly1305> = Cipher::from_key_and_cipher(temp_k1, c1);
        let c2: Cipher<ChaCha20Poly1305> = Cipher::from_key_and_cipher(temp_k2, c2);
        let mut encryptor = GenericCipher::ChaCha20Poly1305(c2);
        let mut decryptor = GenericCipher::ChaCha20Poly1305(c1);
        encryptor.erase_k();
        decryptor.erase_k();
        let codec = NoiseCodec {
            encryptor,
            decryptor,
        };
        Ok((out, codec))
    }

    fn get_signature<R: rand::Rng + rand::CryptoRng>(
        &self,
        version: u16,
        valid_from: u32,
        not_valid_after: u32,
        rng: &mut R,
    ) -> [u8; SIGNATURE_NOISE_MESSAGE_SIZE] {
        let mut ret = [0; SIGNATURE_NOISE_MESSAGE_SIZE];
        ret[0..2].copy_from_slice(&version.to_le_bytes());
        ret[2..6].copy_from_slice(&valid_from.to_le_bytes());
        ret[6..10].copy_from_slice(&not_valid_after.to_le_bytes());
        SignatureNoiseMessage::sign_with_rng(&mut ret, &self.s.x_only_public_key().0, &self.a, rng);
        ret
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
        self.s.non_secure_erase();
        self.a.non_secure_erase();
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        self.erase();
    }
}
