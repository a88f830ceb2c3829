//! Character n-gram shingles.

use xxhash_rust::xxh3::xxh3_64;

/// All character n-grams of length `n`, in order, including repeats.
///
/// N-grams are measured in Unicode scalar values, not bytes. Texts shorter
/// than `n` characters (and `n == 0`) yield nothing.
pub fn char_ngrams(text: &str, n: usize) -> Vec<&str> {
    if n == 0 {
        return Vec::new();
    }

    let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    if boundaries.len() < n {
        return Vec::new();
    }
    boundaries.push(text.len());

    (0..=boundaries.len() - 1 - n)
        .map(|i| &text[boundaries[i]..boundaries[i + n]])
        .collect()
}

/// The shingle set of `text` as sorted, distinct 64-bit hashes.
pub fn shingle_hashes(text: &str, n: usize) -> Vec<u64> {
    let mut hashes: Vec<u64> = char_ngrams(text, n)
        .into_iter()
        .map(|gram| xxh3_64(gram.as_bytes()))
        .collect();
    hashes.sort_unstable();
    hashes.dedup();
    hashes
}

/// Exact Jaccard similarity of two sorted, distinct hash sets.
///
/// Two empty sets have similarity 0: an empty shingle set carries no
/// evidence of duplication.
pub fn jaccard(a: &[u64], b: &[u64]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }

    let (mut i, mut j, mut shared) = (0, 0, 0usize);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                shared += 1;
                i += 1;
                j += 1;
            }
        }
    }

    let union = a.len() + b.len() - shared;
    shared as f64 / union as f64
}
