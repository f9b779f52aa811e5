use rand::distributions::{Alphanumeric, DistString};
use rand::seq::SliceRandom;
use rand::thread_rng;

/// Public id alphabet, without the easily confused `0 O o 1 I l i`.
const ID_ALPHABET: &[u8] = b"23456789abcdefghjkmnpqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ";

/// 43 alphanumeric characters carry just over 256 bits.
const SECRET_KEY_LENGTH: usize = 43;

#[derive(Debug, Clone, Copy)]
pub struct IdGenerator {
    length: usize,
}

impl IdGenerator {
    pub fn new(length: usize) -> Self {
        IdGenerator { length }
    }

    /// Draw a fresh public id. Uniqueness is enforced by the store, not here.
    pub fn new_public_id(&self) -> String {
        let mut rng = thread_rng();
        (0..self.length)
            .filter_map(|_| ID_ALPHABET.choose(&mut rng))
            .map(|&c| c as char)
            .collect()
    }

    pub fn new_secret_key(&self) -> String {
        Alphanumeric.sample_string(&mut thread_rng(), SECRET_KEY_LENGTH)
    }
}
