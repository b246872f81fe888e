// imports
use crate::config::{files_handling, JsonTrain};
use crate::error::{DisambiguationError, Result};

use std::collections::HashMap;
use std::ops::Range;
use log::{debug, info};
use ndarray::{Array2, Array1, array, s};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::{prelude::*, ThreadPoolBuilder};
use bincode::{deserialize, serialize};

// characters stripped from every token before counting, digits included
const STRIPPED_CHARS: [char; 14] = ['.', ':', ',', '"', '\'', '(', ')', '[', ']', '|', '/', '?', '!', ';'];

// pivot tokens handled by one counting slice
const IN_PARTS_SIZE: usize = 30000;


/// Vocabulary and co-occurrence counts of a corpus.
///
/// `slices` hold one-sided counts as rows of `(token, context, count)`, the symmetric
/// part is completed right before training.
pub struct Counts {
    pub t2i: HashMap<String, usize>,
    pub slices: Vec<Array2<f32>>
}

impl Counts {

    fn accumulate(line: &str, token2count: &mut HashMap<String, usize>, sequences: &mut Vec<Vec<String>>) {

        let split_sequence = Counts::tokenize(line);
        if split_sequence.is_empty() {
            return;
        }

        // accumulate occurrences of words - how many times each token appears in the corpus
        for tok in &split_sequence {
            let val = token2count.entry(tok.to_owned()).or_insert(0);
            *val += 1;
        }

        sequences.push(split_sequence);

    }

    fn build_vocab(token2count: &HashMap<String, usize>, vocab_size: usize, min_word_frequency: usize, rng: Option<&mut StdRng>) -> HashMap<String, usize> {

        // keeps the `vocab_size` most common tokens that appear at least `min_word_frequency` times.
        // ties are broken alphabetically so the vocabulary does not depend on hash order.
        // the kept tokens are shuffled when a rng is given, so that counting slices match in capacity.
        let mut tup = token2count
        .iter()
        .filter(|(_, v)| **v >= min_word_frequency)
        .map(|(k, v)| (k.as_str(), *v))
        .collect::<Vec<(&str, usize)>>();
        tup.sort_by(|(k1, v1), (k2, v2)| v2.cmp(v1).then_with(|| k1.cmp(k2)));
        tup.truncate(vocab_size);

        if let Some(rng) = rng {
            tup.shuffle(rng);
        }

        info!("using {} tokens out of {} (min frequency {})", tup.len(), token2count.len(), min_word_frequency);
        tup.iter().enumerate().map(|(i, (tok, _))| (tok.to_string(), i)).collect()

    }


    fn count(window_size: usize,
        sequences: &[Vec<String>],
        t2i: &HashMap<String, usize>,
        slice: &Range<usize>) -> HashMap<(usize, usize), f32> {

            // counts right-hand cooccurrences inside the window, weighted by 1 / distance.
            // only pivot tokens whose index falls in `slice` are counted here.
            let mut tup2cooc: HashMap<(usize, usize), f32> = HashMap::new();

            for sequence in sequences {

                let n = sequence.len();
                for i in 0..n {

                    let token_i = match t2i.get(&sequence[i]) {
                        Some(token_i) if slice.contains(token_i) => *token_i,
                        _ => continue
                    };

                    for j in i+1..=(i+window_size).min(n-1) {

                        let context_j = match t2i.get(&sequence[j]) {
                            Some(context_j) => *context_j,
                            None => continue
                        };

                        let dis_count = 1.0 / (j-i) as f32;
                        *tup2cooc.entry((token_i, context_j)).or_insert(0.0) += dis_count;

                    }
                }
            }

            tup2cooc

    }


    fn map_to_ndarray(tup2cooc: &HashMap<(usize, usize), f32>) -> Array2<f32> {
        // row order follows the sorted pairs, training shuffles them anyway
        let mut pairs = tup2cooc.iter().collect::<Vec<_>>();
        pairs.sort_by_key(|(k, _)| **k);

        let mut nd_array: Array2<f32> = Array2::zeros((pairs.len(), 3));
        for (i, (k, v)) in pairs.into_iter().enumerate() {
            let line: Array1<f32> = array![k.0 as f32, k.1 as f32, *v];
            nd_array.slice_mut(s![i, ..]).assign(&line);
        }
        nd_array
    }


    pub fn run(corpus: &[String], params: &JsonTrain, num_threads: usize) -> Result<Counts> {

        // builds the vocabulary of the most common words in the corpus and counts the
        // cooccurrences of every pair, each slice of pivot tokens in its own thread.
        let mut sequences = Vec::new();
        let mut token2count: HashMap<String, usize> = HashMap::new();
        for line in corpus {
            Counts::accumulate(line, &mut token2count, &mut sequences);
        }
        info!("read {} sequences, {} unique tokens", sequences.len(), token2count.len());

        let mut rng = StdRng::seed_from_u64(params.seed);
        let t2i = Counts::build_vocab(&token2count, params.vocab_size, params.min_word_frequency, Some(&mut rng));
        if t2i.len() < 2 {
            return Err(DisambiguationError::Training(format!(
                "corpus yields {} words with frequency >= {}, at least 2 are needed",
                t2i.len(), params.min_word_frequency
            )));
        }

        let ranges: Vec<Range<usize>> = (0..t2i.len()).step_by(IN_PARTS_SIZE).map(|i| i..i+IN_PARTS_SIZE).collect();
        let pool = ThreadPoolBuilder::new().num_threads(num_threads).build()?;
        let slices: Vec<Array2<f32>> = pool.install(|| {
            ranges.par_iter().enumerate().map(|(thread_i, range)| {
                let tup2cooc = Counts::count(params.window_size, &sequences, &t2i, range);
                debug!("thread {} counted {} pairs for vocab slice {:?}", thread_i, tup2cooc.len(), range);
                Counts::map_to_ndarray(&tup2cooc)
            }).collect()
        });

        Ok(Counts { t2i, slices })

    }

    pub fn vocab_size(&self) -> usize {
        self.t2i.len()
    }

    pub fn save(&self, output_dir: &str) -> Result<()> {

        // slices are bincode encoded and zipped one file each
        let encoded = self.slices.iter().map(serialize).collect::<std::result::Result<Vec<Vec<u8>>, _>>()?;
        files_handling::save_output::<Vec<Vec<u8>>>(output_dir, "cooc", &encoded)?;
        files_handling::save_output::<HashMap<String, usize>>(output_dir, "words", &self.t2i)?;
        info!("saved {} cooccurrence chunks and the vocabulary to {}", encoded.len(), output_dir);
        Ok(())

    }

    pub fn load(output_dir: &str) -> Result<Counts> {

        let t2i = files_handling::read_input::<HashMap<String, usize>>(&format!("{}/words", output_dir))?;
        let encoded = files_handling::read_input::<Vec<Vec<u8>>>(&format!("{}/cooc", output_dir))?;
        if encoded.is_empty() {
            return Err(DisambiguationError::FileNotFound { path: format!("{}/cooc*.gz", output_dir) });
        }
        let slices = encoded.iter().map(|slice| deserialize(slice)).collect::<std::result::Result<Vec<Array2<f32>>, _>>()?;
        info!("loaded {} chunks of cooccurrences for {} tokens", slices.len(), t2i.len());
        Ok(Counts { t2i, slices })

    }

}


// defines the behavior needed for tokenizing a corpus
trait Tokenizer {
    fn tokenize(sequence: &str) -> Vec<String>;
}

impl Tokenizer for Counts {
    // split on whitespace, strip digits and punctuation, lower case, drop what is left empty
    fn tokenize(sequence: &str) -> Vec<String> {
        sequence
        .split_whitespace()
        .map(|tok| tok.chars().filter(|c| !c.is_ascii_digit() && !STRIPPED_CHARS.contains(c)).collect::<String>().to_lowercase())
        .filter(|tok| !tok.is_empty())
        .collect()
    }
}
