// Cryptographic operations shared by both sides of the Noise NX handshake:
// hash mixing, HKDF key derivation and the encrypt/decrypt-and-hash steps
// from chapter 5 of the Noise paper.

use crate::{aed_cipher::AeadCipher, cipher_state::CipherState};
use chacha20poly1305::ChaCha20Poly1305;
use const_sv2::NOISE_HASHED_PROTOCOL_NAME_CHACHA;
use secp256k1::{
    hashes::{sha256::Hash as Sha256Hash, Hash},
    rand, Keypair, Secp256k1,
};

pub trait HandshakeOp<Cipher: AeadCipher>: CipherState<Cipher> {
    fn get_h(&mut self) -> &mut [u8; 32];
    fn get_ck(&mut self) -> &mut [u8; 32];
    fn set_h(&mut self, data: [u8; 32]);
    fn set_ck(&mut self, data: [u8; 32]);
    fn set_handshake_cipher(&mut self, cipher: ChaCha20Poly1305);

    // h = SHA-256(h || data)
    fn mix_hash(&mut self, data: &[u8]) {
        let h = self.get_h();
        let mut to_hash = Vec::with_capacity(32 + data.len());
        to_hash.extend_from_slice(h);
        to_hash.extend_from_slice(data);
        *h = Sha256Hash::hash(&to_hash).to_byte_array();
    }

    // Keys are normalized to even parity so the peer can reconstruct the
    // full point from the x-only form without a parity hint.
    fn generate_key() -> Keypair {
        Self::generate_key_with_rng(&mut rand::thread_rng())
    }

    fn generate_key_with_rng<R: rand::Rng + ?Sized>(rng: &mut R) -> Keypair {
        let secp = Secp256k1::new();
        let (secret_key, _) = secp.generate_keypair(rng);
        let kp = Keypair::from_secret_key(&secp, &secret_key);
        if kp.x_only_public_key().1 == crate::PARITY {
            kp
        } else {
            Self::generate_key_with_rng(rng)
        }
    }

    fn hmac_hash(key: &[u8; 32], data: &[u8]) -> [u8; 32] {
        let mut ipad = [0x36u8; 64];
        let mut opad = [0x5cu8; 64];
        for i in 0..32 {
            ipad[i] = key[i] ^ 0x36;
            opad[i] = key[i] ^ 0x5c;
        }

        let mut to_hash = Vec::with_capacity(64 + data.len());
        to_hash.extend_from_slice(&ipad);
        to_hash.extend_from_slice(data);
        let temp = Sha256Hash::hash(&to_hash).to_byte_array();

        to_hash.clear();
        to_hash.extend_from_slice(&opad);
        to_hash.extend_from_slice(&temp);

        Sha256Hash::hash(&to_hash).to_byte_array()
    }

    // Two-output HKDF-SHA256 over the chaining key and fresh key material.
    fn hkdf_2(chaining_key: &[u8; 32], input_key_material: &[u8]) -> ([u8; 32], [u8; 32]) {
        let temp_key = Self::hmac_hash(chaining_key, input_key_material);
        let out_1 = Self::hmac_hash(&temp_key, &[0x1]);
        let out_2 = Self::hmac_hash(&temp_key, &[&out_1[..], &[0x2][..]].concat());
        (out_1, out_2)
    }

    // (ck, k) <- HKDF2(ck, ikm); the new k re-initializes the handshake
    // cipher with a zeroed nonce.
    fn mix_key(&mut self, input_key_material: &[u8]) {
        let ck = self.get_ck();
        let (ck, temp_k) = Self::hkdf_2(ck, input_key_material);
        self.set_ck(ck);
        self.initialize_key(temp_k);
    }

    // Encrypt in place with AD = h, then mix the ciphertext into h. Before
    // the first MixKey there is no k and this reduces to MixHash alone.
    fn encrypt_and_hash(&mut self, plaintext: &mut Vec<u8>) -> Result<(), aes_gcm::Error> {
        if self.get_k().is_some() {
            let h = *self.get_h();
            self.encrypt_with_ad(&h, plaintext)?;
        };
        self.mix_hash(plaintext);
        Ok(())
    }

    // The mirror of encrypt_and_hash: h absorbs the ciphertext as received,
    // before decryption.
    fn decrypt_and_hash(&mut self, ciphertext: &mut Vec<u8>) -> Result<(), aes_gcm::Error> {
        let encrypted = ciphertext.clone();
        if self.get_k().is_some() {
            let h = *self.get_h();
            self.decrypt_with_ad(&h, ciphertext)?;
        };
        self.mix_hash(&encrypted);
        Ok(())
    }

    // ck = SHA-256("Noise_NX_EllSwiftXonly_ChaChaPoly_SHA256")
    // h  = SHA-256(ck)
    fn initialize_self(&mut self) {
        let ck = NOISE_HASHED_PROTOCOL_NAME_CHACHA;
        let h = Sha256Hash::hash(&ck[..]);
        self.set_h(h.to_byte_array());
        self.set_ck(ck);
        self.set_k(None);
    }

    fn initialize_key(&mut self, key: [u8; 32]) {
        self.set_n(0);
        let cipher = ChaCha20Poly1305::from_key(key);
        self.set_handshake_cipher(cipher);
        self.set_k(Some(key));
    }
}
