use crate::error::{DisambiguationError, Result};
use std::collections::HashMap;
use ndarray::prelude::*;

/// A trained embedding space that answers neighbour queries.
pub trait EmbeddingModel {
    /// The `k` words closest to `word`, most similar first, `word` itself excluded.
    fn nearest(&self, word: &str, k: usize) -> Result<Vec<String>>;
    /// Cosine similarity in `[-1, 1]`.
    fn similarity(&self, word_a: &str, word_b: &str) -> Result<f32>;
}

pub struct Similarity {
    w: Array2<f32>,
    t2i: HashMap<String, usize>,
    i2t: HashMap<usize, String>
}

impl Similarity {

    pub fn new(mut w: Array2<f32>, t2i: HashMap<String, usize>) -> Result<Similarity> {

        if w.dim().0 != t2i.len() {
            return Err(DisambiguationError::InvalidConfig(format!(
                "inconsistent number of entries in vectors ({}) and tokens ({})", w.dim().0, t2i.len()
            )));
        }

        // normalize w so each row has l2 norm 1, dot products are then cosines
        for mut row in w.axis_iter_mut(Axis(0)) {
            let norm = row.dot(&row).sqrt();
            if norm > 0.0 {
                row.mapv_inplace(|a| a / norm);
            }
        }

        let mut i2t: HashMap<usize, String> = HashMap::new();
        for (t, i) in &t2i {
            if *i >= w.dim().0 {
                return Err(DisambiguationError::InvalidConfig(format!("token {} has index {} outside the vectors", t, i)));
            }
            i2t.insert(*i, t.to_owned());
        }

        Ok(Self { w, t2i, i2t })
    }

    pub fn vocab_size(&self) -> usize {
        self.t2i.len()
    }

    pub fn contains(&self, token: &str) -> bool {
        self.t2i.contains_key(token)
    }

    pub fn extract_vec_from_word(&self, token: &str) -> Result<ArrayView1<f32>> {
        match self.t2i.get(token) {
            Some(i) => Ok(self.w.row(*i)),
            None => Err(DisambiguationError::WordNotFound { word: token.to_string() })
        }
    }

    pub fn find_k_most_similar(&self, vec: &ArrayView1<f32>, k: usize, exclude: Option<&str>) -> Vec<(String, f32)> {

        // multiply all vectors by token vector, of size vocab
        let scores = self.w.dot(vec);
        let mut indexed_scores: Vec<(usize, f32)> = scores.iter().copied().enumerate().collect();

        // sort by most similar in descending order, stable for equal scores
        indexed_scores.sort_by(|(_i, s), (_j, t)| t.total_cmp(s));

        indexed_scores
        .into_iter()
        .filter_map(|(index, score)| self.i2t.get(&index).map(|tok| (tok.to_owned(), score)))
        .filter(|(tok, _)| Some(tok.as_str()) != exclude)
        .take(k)
        .collect()
    }

}

impl EmbeddingModel for Similarity {

    fn nearest(&self, word: &str, k: usize) -> Result<Vec<String>> {
        let vec = self.extract_vec_from_word(word)?;
        let similar = self.find_k_most_similar(&vec, k, Some(word));
        Ok(similar.into_iter().map(|(tok, _)| tok).collect())
    }

    fn similarity(&self, word_a: &str, word_b: &str) -> Result<f32> {
        let vec_a = self.extract_vec_from_word(word_a)?;
        let vec_b = self.extract_vec_from_word(word_b)?;
        Ok(vec_a.dot(&vec_b).clamp(-1.0, 1.0))
    }

}
