use ndarray::concatenate;
use ndarray::prelude::*;
use ndarray::Array;
use ndarray_rand::RandomExt;
use ndarray_rand::rand_distr::Uniform;
use ndarray_stats::QuantileExt;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use crate::config::JsonTrain;
use crate::error::{DisambiguationError, Result};
use log::{debug, info};
use std::iter::zip;
use std::ops::AddAssign;
use std::ops::SubAssign;
use std::time::Instant;


/// GloVe weights trained with AdaGrad over cooccurrence rows of `(token, context, count)`.
pub struct Train {
    w_tokens: Array2<f32>,
    w_context: Array2<f32>,
    b_tokens: Array2<f32>,
    b_context: Array2<f32>,
    ag_w_tok: Array2<f32>,
    ag_w_context: Array2<f32>,
    ag_b_tok: Array2<f32>,
    ag_b_context: Array2<f32>,
    rng: StdRng,
}

struct DisplayProgress {
    epoch_loss: f32,        // sum of the mean losses of the batches in this epoch
    n_batches: usize,       // batches seen in this epoch
    n_slices: usize,        // the number of slices x_mat is divided to
    slice_enumeration: usize, // enumerator over n_slices
}

impl DisplayProgress {

    fn new(n_slices: usize) -> Self {
        Self {
            epoch_loss: 0.0,
            n_batches: 0,
            n_slices,
            slice_enumeration: 0,
        }
    }

    fn reset(&mut self) {
        self.epoch_loss = 0.0;
        self.n_batches = 0;
    }

    fn loss(&self) -> f32 {
        if self.n_batches == 0 { 0.0 } else { self.epoch_loss / self.n_batches as f32 }
    }

}

impl Train {

    fn new(vocab_size: usize, embedding_dim: usize, seed: u64) -> Train {

        let mut rng = StdRng::seed_from_u64(seed);
        let scale = embedding_dim as f32;
        let init = Uniform::new(-0.5f32, 0.5f32);

        Self {
            w_tokens: Array::random_using((vocab_size, embedding_dim), init, &mut rng) / scale,
            w_context: Array::random_using((vocab_size, embedding_dim), init, &mut rng) / scale,
            b_tokens: Array::random_using((vocab_size, 1), init, &mut rng) / scale,
            b_context: Array::random_using((vocab_size, 1), init, &mut rng) / scale,
            ag_w_tok: Array2::from_elem((vocab_size, embedding_dim), 1.0), // init to 1.0 makes the initial eta equal to inital learning rate
            ag_w_context: Array2::from_elem((vocab_size, embedding_dim), 1.0),
            ag_b_tok: Array2::from_elem((vocab_size, 1), 1.0),
            ag_b_context: Array2::from_elem((vocab_size, 1), 1.0),
            rng,
        }
    }

    pub fn get_w_tokens(&self) -> &Array2<f32> {
        &self.w_tokens
    }

    pub fn get_w_context(&self) -> &Array2<f32> {
        &self.w_context
    }

    // the vectors to compute similarities with
    pub fn get_vectors(&self) -> Array2<f32> {
        &self.w_tokens + &self.w_context
    }

    fn weighting_x(xs: &mut Array2<f32>, x_max: f32, alpha: f32) {
        xs.mapv_inplace(|x| {
            if x < x_max {
                (x / x_max).powf(alpha)
            } else {
                1.0
            }
        });
    }

    fn do_training_slice(&mut self,
           slice_arr: &Array2<f32>,
           train_params: &JsonTrain,
           progress_params: &mut DisplayProgress,
        ) -> Result<()> {

            let learning_rate = train_params.learning_rate;

            let slice_len = slice_arr.dim().0;
            debug!("in slice {} / {}, number of examples here: {}", progress_params.slice_enumeration, progress_params.n_slices, slice_len);

            let mut in_slice_order = (0..slice_len).collect::<Vec<usize>>();
            in_slice_order.shuffle(&mut self.rng);

            for chunk_indexes in in_slice_order.chunks(train_params.batch_size) {

                // last batch can be smaller than batch_size
                let rows: Array2<f32> = slice_arr.select(Axis(0), chunk_indexes);
                let is: Vec<usize> = rows.column(0).iter().map(|x| *x as usize).collect();
                let js: Vec<usize> = rows.column(1).iter().map(|x| *x as usize).collect();
                let xs: Array2<f32> = rows.column(2).to_owned().insert_axis(Axis(1));

                // dimensions of (this_batch, embedding_dim) for v
                // dimensions of (this_batch, 1) for b
                let v_tok: Array2<f32> = self.w_tokens.select(Axis(0), &is);
                let v_context: Array2<f32> = self.w_context.select(Axis(0), &js);
                let b_tok: Array2<f32> = self.b_tokens.select(Axis(0), &is);
                let b_context: Array2<f32> = self.b_context.select(Axis(0), &js);

                // the accumulated squared gradients of the same rows
                let g_v_tok: Array2<f32> = self.ag_w_tok.select(Axis(0), &is);
                let g_v_context: Array2<f32> = self.ag_w_context.select(Axis(0), &js);
                let g_b_tok: Array2<f32> = self.ag_b_tok.select(Axis(0), &is);
                let g_b_context: Array2<f32> = self.ag_b_context.select(Axis(0), &js);

                let mut xs_weighted: Array2<f32> = xs.clone();
                Train::weighting_x(&mut xs_weighted, train_params.x_max, train_params.alpha);

                // diff is of size (this_batch, 1)
                let dp: Array2<f32> = (&v_tok * &v_context).sum_axis(Axis(1)).insert_axis(Axis(1));
                let diff: Array2<f32> = &dp + &b_tok + &b_context - &xs.mapv(f32::ln);

                let local_batch_loss: Array2<f32> = 0.5 * &xs_weighted * &diff.mapv(|x| x.powi(2));
                progress_params.epoch_loss += local_batch_loss.mean().unwrap_or(0.0);
                progress_params.n_batches += 1;

                // dl_dw_tok is (this_batch, embedding_dim)
                // dl_db is (this_batch, 1)
                let dl_dw = &xs_weighted * &diff;
                let dl_dw_tok: Array2<f32> = &v_context * &dl_dw;
                let dl_dw_context: Array2<f32> = &v_tok * &dl_dw;
                let dl_db: Array2<f32> = dl_dw;

                let dw_tok_update = learning_rate * &dl_dw_tok / &g_v_tok.mapv(f32::sqrt);
                let dw_context_update = learning_rate * &dl_dw_context / &g_v_context.mapv(f32::sqrt);
                let db_tok_update = learning_rate * &dl_db / &g_b_tok.mapv(f32::sqrt);
                let db_context_update = learning_rate * &dl_db / &g_b_context.mapv(f32::sqrt);

                let sq_w_tok = &dl_dw_tok * &dl_dw_tok;
                let sq_w_context = &dl_dw_context * &dl_dw_context;
                let sq_b = &dl_db * &dl_db;

                // update by index,
                // done in a loop since no select_mut by non-consecutive indexes is available
                for (ll, (ii, jj)) in zip(&is, &js).enumerate() {
                    self.w_tokens.row_mut(*ii).sub_assign(&dw_tok_update.row(ll));
                    self.w_context.row_mut(*jj).sub_assign(&dw_context_update.row(ll));
                    self.b_tokens.row_mut(*ii).sub_assign(&db_tok_update.row(ll));
                    self.b_context.row_mut(*jj).sub_assign(&db_context_update.row(ll));

                    self.ag_w_tok.row_mut(*ii).add_assign(&sq_w_tok.row(ll));
                    self.ag_w_context.row_mut(*jj).add_assign(&sq_w_context.row(ll));
                    self.ag_b_tok.row_mut(*ii).add_assign(&sq_b.row(ll));
                    self.ag_b_context.row_mut(*jj).add_assign(&sq_b.row(ll));
                }
            }

        Ok(())

    }


    fn train(&mut self, x_mat: &[Array2<f32>], train_params: &JsonTrain) -> Result<()> {

        let mut progress_params = DisplayProgress::new(x_mat.len());

        for epoch in 0..train_params.epochs {

            let my_time = Instant::now();
            progress_params.reset();

            // for each epoch shuffle the slices order, the order within each slice is shuffled too
            let mut slices_order = (0..progress_params.n_slices).collect::<Vec<usize>>();
            slices_order.shuffle(&mut self.rng);

            for (rr, m) in slices_order.into_iter().enumerate() {
                progress_params.slice_enumeration = rr + 1;
                self.do_training_slice(&x_mat[m], train_params, &mut progress_params)?;
            }

            let loss = progress_params.loss();
            if !loss.is_finite() {
                return Err(DisambiguationError::Training(format!("loss diverged at epoch {}", epoch)));
            }
            info!("finished epoch {}, loss is {}, took: {} ms...", epoch, loss, my_time.elapsed().as_millis());
        }

        Ok(())

    }

    pub fn run(x_mat_slices: &[Array2<f32>], vocab_size: usize, train_params: &JsonTrain) -> Result<Train> {

        // rebuild the symmetric part of the slices, (i, j, x) adds (j, i, x)
        let mut x_mat_symmetric_slices: Vec<Array2<f32>> = Vec::new();
        for x_mat_slice in x_mat_slices {

            if x_mat_slice.dim().0 == 0 {
                continue;
            }
            if x_mat_slice.dim().1 != 3 {
                return Err(DisambiguationError::Training(format!("cooccurrence rows should have 3 columns, got {}", x_mat_slice.dim().1)));
            }

            let max_index = *x_mat_slice.slice(s![.., ..2usize]).max()
                .map_err(|e| DisambiguationError::Training(e.to_string()))? as usize;
            if max_index >= vocab_size {
                return Err(DisambiguationError::Training(format!("token index {} is outside a vocabulary of {}", max_index, vocab_size)));
            }

            let swapped = x_mat_slice.select(Axis(1), &[1, 0, 2]);
            let symmetric_slice = concatenate(Axis(0), &[x_mat_slice.view(), swapped.view()])?;
            x_mat_symmetric_slices.push(symmetric_slice);

        }

        if x_mat_symmetric_slices.is_empty() {
            return Err(DisambiguationError::Training("no cooccurrences to train on".to_string()));
        }

        let mut trainer = Train::new(vocab_size, train_params.embedding_dim, train_params.seed);
        trainer.train(&x_mat_symmetric_slices, train_params)?;
        Ok(trainer)
    }


}


#[cfg(test)]
mod tests {

    use super::Train;
    use crate::config::JsonTrain;
    use ndarray::{array, Array2};

    fn params() -> JsonTrain {
        JsonTrain { embedding_dim: 8, epochs: 5, batch_size: 2, ..JsonTrain::default() }
    }

    fn toy_slices() -> Vec<Array2<f32>> {
        vec![array![[0.0, 1.0, 1.0], [0.0, 0.0, 0.5], [1.0, 0.0, 2.0], [1.0, 2.0, 0.5], [0.0, 2.0, 1.0]]]
    }

    #[test]
    fn weighting_caps_at_x_max() {
        let mut xs = array![[1.0f32], [100.0], [250.0]];
        Train::weighting_x(&mut xs, 100.0, 0.75);
        assert!((xs[[0, 0]] - 0.01f32.powf(0.75)).abs() < 1e-6);
        assert_eq!(xs[[1, 0]], 1.0);
        assert_eq!(xs[[2, 0]], 1.0);
    }

    #[test]
    fn training_is_seeded() {
        let first = Train::run(&toy_slices(), 3, &params()).unwrap();
        let second = Train::run(&toy_slices(), 3, &params()).unwrap();

        let vecs = first.get_vectors();
        assert_eq!(vecs.dim(), (3, 8));
        assert!(vecs.iter().all(|x| x.is_finite()));
        assert_eq!(vecs, second.get_vectors());
        assert_eq!(first.get_w_tokens() + first.get_w_context(), vecs);
    }

    #[test]
    fn rejects_out_of_vocabulary_rows() {
        assert!(Train::run(&toy_slices(), 2, &params()).is_err());
        assert!(Train::run(&[Array2::zeros((0, 3))], 3, &params()).is_err());
    }

}
