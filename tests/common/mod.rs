//! Helpers shared by the integration tests.

#![allow(dead_code)]

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use curator_dedup::document::DocumentRecord;

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Random lowercase text of `len` characters.
pub fn random_text(rng: &mut StdRng, len: usize) -> String {
    (0..len)
        .map(|_| (b'a' + rng.random_range(0..26u8)) as char)
        .collect()
}

/// Two texts sharing a prefix of `shared` characters, each followed by its own
/// random suffix of `own` characters.
pub fn overlapping_pair(seed: u64, shared: usize, own: usize) -> (String, String) {
    let mut rng = StdRng::seed_from_u64(seed);
    let prefix = random_text(&mut rng, shared);
    let a = format!("{prefix}{}", random_text(&mut rng, own));
    let b = format!("{prefix}{}", random_text(&mut rng, own));
    (a, b)
}

/// Records with identifiers `0..texts.len()`.
pub fn records(texts: &[&str]) -> Vec<DocumentRecord> {
    texts
        .iter()
        .enumerate()
        .map(|(i, t)| DocumentRecord::with_id(i as u64, *t))
        .collect()
}
