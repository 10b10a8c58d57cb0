//! ID generation for test and fixture results.
//!
//! Readers may supply their own ids; when they don't, the store mints
//! `<prefix>-<hash>` ids where hash is base36 lowercase (0-9, a-z) over a
//! SHA256 of the reader id, record name, start time and a per-store
//! sequence number.

use sha2::{Digest, Sha256};

/// ID generation configuration.
#[derive(Debug, Clone)]
pub struct IdConfig {
    /// Prefix for minted test result ids.
    pub result_prefix: String,
    /// Prefix for minted fixture ids.
    pub fixture_prefix: String,
    /// Hash length.
    pub hash_length: usize,
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            result_prefix: "tr".to_string(),
            fixture_prefix: "fx".to_string(),
            hash_length: 12,
        }
    }
}

/// Mints unique ids for records that arrive without one.
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    config: IdConfig,
    sequence: u64,
}

impl IdGenerator {
    #[must_use]
    pub const fn new(config: IdConfig) -> Self {
        Self {
            config,
            sequence: 0,
        }
    }

    /// Mint a test result id, retrying with a nonce while `exists` says the
    /// candidate is taken.
    pub fn next_result_id<F>(
        &mut self,
        reader_id: &str,
        name: &str,
        start: Option<i64>,
        exists: F,
    ) -> String
    where
        F: Fn(&str) -> bool,
    {
        let prefix = self.config.result_prefix.clone();
        self.next_id(&prefix, reader_id, name, start, exists)
    }

    /// Mint a fixture id.
    pub fn next_fixture_id<F>(
        &mut self,
        reader_id: &str,
        name: &str,
        start: Option<i64>,
        exists: F,
    ) -> String
    where
        F: Fn(&str) -> bool,
    {
        let prefix = self.config.fixture_prefix.clone();
        self.next_id(&prefix, reader_id, name, start, exists)
    }

    fn next_id<F>(
        &mut self,
        prefix: &str,
        reader_id: &str,
        name: &str,
        start: Option<i64>,
        exists: F,
    ) -> String
    where
        F: Fn(&str) -> bool,
    {
        self.sequence += 1;
        let mut nonce = 0u32;
        loop {
            let seed = generate_id_seed(reader_id, name, start, self.sequence, nonce);
            let id = format!(
                "{prefix}-{}",
                compute_id_hash(&seed, self.config.hash_length)
            );
            if !exists(&id) {
                return id;
            }
            nonce += 1;
        }
    }
}

/// Seed string: `reader | name | start | sequence | nonce`.
#[must_use]
pub fn generate_id_seed(
    reader_id: &str,
    name: &str,
    start: Option<i64>,
    sequence: u64,
    nonce: u32,
) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        reader_id,
        name,
        start.unwrap_or(0),
        sequence,
        nonce
    )
}

/// Compute a base36 hash of the input string with a specific length.
///
/// Uses SHA256, takes the first 8 bytes as a u64 and base36-encodes it,
/// left-padding with '0' up to `length`.
#[must_use]
pub fn compute_id_hash(input: &str, length: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let result = hasher.finalize();

    let mut num = 0u64;
    for &byte in result.iter().take(8) {
        num = (num << 8) | u64::from(byte);
    }

    let mut s = base36_encode(num);
    if s.len() < length {
        s = format!("{s:0>length$}");
    }
    s.chars().take(length).collect()
}

fn base36_encode(mut num: u64) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if num == 0 {
        return "0".to_string();
    }
    let mut chars = Vec::new();
    while num > 0 {
        chars.push(ALPHABET[(num % 36) as usize] as char);
        num /= 36;
    }
    chars.into_iter().rev().collect()
}
