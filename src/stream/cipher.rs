//! Transparent stream cipher
//!
//! AES-128 in CFB-128 mode. The working IV and the position inside the
//! current keystream block persist across calls, so a stream read or written
//! in arbitrary chunk sizes produces the same bytes as one read or write of
//! the whole buffer. Random access is not supported: the state only ever
//! moves forward.

use aes::Aes128;
use aes::cipher::{BlockEncrypt, KeyInit};
use std::fmt;

use crate::config::SECRET_LEN;

const BLOCK_LEN: usize = 16;

/// Per-stream key schedule and feedback register
pub struct CipherState {
    cipher: Aes128,
    iv: [u8; BLOCK_LEN],
    num: usize,
}

impl CipherState {
    pub fn new(key: &[u8; SECRET_LEN], iv: &[u8; SECRET_LEN]) -> Self {
        Self {
            cipher: Aes128::new(key.into()),
            iv: *iv,
            num: 0,
        }
    }

    /// Encrypt `data` in place, continuing the stream.
    pub fn encrypt(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            self.refill();
            *byte ^= self.iv[self.num];
            self.iv[self.num] = *byte;
            self.num = (self.num + 1) % BLOCK_LEN;
        }
    }

    /// Decrypt `data` in place, continuing the stream.
    pub fn decrypt(&mut self, data: &mut [u8]) {
        for byte in data.iter_mut() {
            self.refill();
            let cipher_byte = *byte;
            *byte ^= self.iv[self.num];
            self.iv[self.num] = cipher_byte;
            self.num = (self.num + 1) % BLOCK_LEN;
        }
    }

    fn refill(&mut self) {
        if self.num == 0 {
            self.cipher.encrypt_block((&mut self.iv).into());
        }
    }
}

impl fmt::Debug for CipherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // key material stays out of logs
        f.debug_struct("CipherState").field("num", &self.num).finish_non_exhaustive()
    }
}
