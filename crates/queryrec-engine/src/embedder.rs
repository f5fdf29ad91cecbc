//! Text embedding seam
//!
//! The similarity engine only needs a function from text to fixed-width
//! vectors. `HashedNgramEmbedder` is the built-in model: deterministic,
//! dependency-free at runtime, and good enough to tell "employee: name"
//! apart from "pets: pet age". Callers with a sentence-embedding model
//! plug it in through `TextEmbedder`.

use queryrec_core::EmbeddingConfig;
use sha2::{Digest, Sha256};

/// Maps text items to fixed-width vectors
pub trait TextEmbedder: Send + Sync {
    /// Width of every vector returned by `embed`
    fn dimensions(&self) -> usize;

    /// One vector per input, in input order
    fn embed(&self, texts: &[String]) -> Vec<Vec<f32>>;
}

/// Feature-hashing embedder over word unigrams and character n-grams
///
/// Each word contributes weight 1.0; its character n-grams share another
/// 1.0 between them, so long words do not drown out short ones. Vectors are
/// L2-normalized; text with no word characters embeds to the zero vector.
#[derive(Debug, Clone)]
pub struct HashedNgramEmbedder {
    dimensions: usize,
    ngram: usize,
}

impl HashedNgramEmbedder {
    pub fn new(dimensions: usize, ngram: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            ngram: ngram.max(1),
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(config.dimensions, config.ngram)
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        for word in words(text) {
            self.add_feature(&mut vector, "w", &word, 1.0);

            let grams = char_ngrams(&word, self.ngram);
            let weight = 1.0 / grams.len() as f32;
            for gram in &grams {
                self.add_feature(&mut vector, "c", gram, weight);
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }
        vector
    }

    fn add_feature(&self, vector: &mut [f32], namespace: &str, feature: &str, weight: f32) {
        let mut hasher = Sha256::new();
        hasher.update(namespace.as_bytes());
        hasher.update([0u8]);
        hasher.update(feature.as_bytes());
        let digest = hasher.finalize();

        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(bucket) % self.dimensions as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };

        vector[index] += sign * weight;
    }
}

impl Default for HashedNgramEmbedder {
    fn default() -> Self {
        Self::from_config(&EmbeddingConfig::default())
    }
}

impl TextEmbedder for HashedNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, texts: &[String]) -> Vec<Vec<f32>> {
        texts.iter().map(|t| self.embed_one(t)).collect()
    }
}

/// Lower-cased runs of alphanumeric characters
fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

/// Character n-grams of `#word#`; never empty for a non-empty word
fn char_ngrams(word: &str, n: usize) -> Vec<String> {
    let padded: Vec<char> = std::iter::once('#')
        .chain(word.chars())
        .chain(std::iter::once('#'))
        .collect();

    if padded.len() <= n {
        return vec![padded.into_iter().collect()];
    }

    padded.windows(n).map(|w| w.iter().collect()).collect()
}
