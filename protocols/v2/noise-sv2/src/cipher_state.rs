use std::ptr;

use crate::aed_cipher::AeadCipher;
use aes_gcm::Aes256Gcm;
use chacha20poly1305::{aead::Buffer, ChaCha20Poly1305};
use const_sv2::{AEAD_MAC_LEN, NOISE_MAX_CHUNK_SIZE};

/// A Noise cipher state: a 32-byte key plus a 64-bit nonce.
///
/// During the handshake each party holds a single cipher state; during the
/// transport phase each party holds two, one per direction. The nonce is
/// consumed in the order prescribed by the Noise paper: the current value is
/// used for the AEAD call and incremented afterwards, on the encrypt side
/// always and on the decrypt side only when authentication succeeded.
/// Exhausting the nonce space is a fatal session error.
pub trait CipherState<Cipher_: AeadCipher>
where
    Self: Sized,
{
    fn get_k(&mut self) -> &mut Option<[u8; 32]>;
    fn set_k(&mut self, k: Option<[u8; 32]>);
    fn get_n(&self) -> u64;
    fn set_n(&mut self, n: u64);
    fn get_cipher(&mut self) -> &mut Option<Cipher_>;

    // Noise nonce layout: 4 zero bytes followed by the little-endian
    // counter.
    fn nonce_to_bytes(&self) -> [u8; 12] {
        let mut res = [0u8; 12];
        let bytes = self.get_n().to_le_bytes();
        res[4..].copy_from_slice(&bytes);
        res
    }

    fn encrypt_with_ad<T: Buffer>(
        &mut self,
        ad: &[u8],
        data: &mut T,
    ) -> Result<(), aes_gcm::Error> {
        let n = self.get_n();
        if n == u64::MAX {
            // Nonce space exhausted; re-keying is not part of the protocol.
            return Err(aes_gcm::Error);
        }
        let nonce = self.nonce_to_bytes();
        if let Some(c) = self.get_cipher() {
            c.encrypt(&nonce, ad, data)?;
            self.set_n(n + 1);
        }
        Ok(())
    }

    fn decrypt_with_ad<T: Buffer>(
        &mut self,
        ad: &[u8],
        data: &mut T,
    ) -> Result<(), aes_gcm::Error> {
        let n = self.get_n();
        if n == u64::MAX {
            return Err(aes_gcm::Error);
        }
        let nonce = self.nonce_to_bytes();
        if let Some(c) = self.get_cipher() {
            c.decrypt(&nonce, ad, data)?;
            self.set_n(n + 1);
        }
        Ok(())
    }
}

#[allow(clippy::large_enum_variant)]
pub enum GenericCipher {
    ChaCha20Poly1305(Cipher<ChaCha20Poly1305>),
    #[allow(dead_code)]
    Aes256Gcm(Cipher<Aes256Gcm>),
}

impl Drop for GenericCipher {
    fn drop(&mut self) {
        self.erase_k();
    }
}

impl GenericCipher {
    pub fn encrypt<T: Buffer>(&mut self, msg: &mut T) -> Result<(), aes_gcm::Error> {
        match self {
            GenericCipher::ChaCha20Poly1305(c) => c.encrypt_with_ad(&[], msg),
            GenericCipher::Aes256Gcm(c) => c.encrypt_with_ad(&[], msg),
        }
    }

    pub fn decrypt<T: Buffer>(&mut self, msg: &mut T) -> Result<(), aes_gcm::Error> {
        match self {
            GenericCipher::ChaCha20Poly1305(c) => c.decrypt_with_ad(&[], msg),
            GenericCipher::Aes256Gcm(c) => c.decrypt_with_ad(&[], msg),
        }
    }

    /// Seals `plaintext` in independently authenticated chunks of at most
    /// [`NOISE_MAX_CHUNK_SIZE`] bytes, appending the result to `output`.
    pub fn encrypt_message(
        &mut self,
        plaintext: &[u8],
        output: &mut Vec<u8>,
    ) -> Result<(), aes_gcm::Error> {
        for chunk in plaintext.chunks(NOISE_MAX_CHUNK_SIZE) {
            let mut sealed = chunk.to_vec();
            self.encrypt(&mut sealed)?;
            output.extend_from_slice(&sealed);
        }
        Ok(())
    }

    /// Opens a message sealed with [`GenericCipher::encrypt_message`],
    /// appending the plaintext to `output`. Fails if any chunk fails to
    /// authenticate.
    pub fn decrypt_message(
        &mut self,
        ciphertext: &[u8],
        output: &mut Vec<u8>,
    ) -> Result<(), aes_gcm::Error> {
        for chunk in ciphertext.chunks(NOISE_MAX_CHUNK_SIZE + AEAD_MAC_LEN) {
            if chunk.len() < AEAD_MAC_LEN {
                return Err(aes_gcm::Error);
            }
            let mut opened = chunk.to_vec();
            self.decrypt(&mut opened)?;
            output.extend_from_slice(&opened);
        }
        Ok(())
    }

    pub fn erase_k(&mut self) {
        match self {
            GenericCipher::ChaCha20Poly1305(c) => {
                if let Some(k) = c.k.as_mut() {
                    for b in k {
                        unsafe { ptr::write_volatile(b, 0) };
                    }
                    c.k = None;
                }
            }
            GenericCipher::Aes256Gcm(c) => {
                if let Some(k) = c.k.as_mut() {
                    for b in k {
                        unsafe { ptr::write_volatile(b, 0) };
                    }
                    c.k = None;
                }
            }
        }
    }
}

pub struct Cipher<C: AeadCipher> {
    k: Option<[u8; 32]>,
    n: u64,
    cipher: Option<C>,
}

impl<C: AeadCipher> Cipher<C> {
    /// Internal use only, the key is retained for the handshake phase.
    pub fn from_key_and_cipher(k: [u8; 32], c: C) -> Self {
        Self {
            k: Some(k),
            n: 0,
            cipher: Some(c),
        }
    }
}

impl<C: AeadCipher> CipherState<C> for Cipher<C> {
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

    fn get_cipher(&mut self) -> &mut Option<C> {
        &mut self.cipher
    }
}
