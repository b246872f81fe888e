// imports
use crate::config::{files_handling, JsonTypes};
use crate::cooccurrence::Counts;
use crate::disambiguate::{Disambiguator, Selection};
use crate::error::Result;
use crate::morphology::Lexicon;
use crate::similarity::{EmbeddingModel, Similarity};
use crate::train::Train;

use log::{info, warn};
use ndarray::Array2;
use std::time::Instant;

pub struct Pipeline {}

impl Pipeline {

    // runs the main procedure -
    // -> embeddings: cooccurrences counting (or loading) and training
    // -> loading test data and morphological analyses
    // -> disambiguation of every test line

    pub fn run(params: &JsonTypes) -> Result<Vec<Selection>> {

        info!("{}", params);

        let test_data = files_handling::read_lines(&params.test_data_path)?;
        info!("loaded {} test lines", test_data.len());
        let lexicon = Lexicon::load(&params.analyses_path)?;

        let similarity = Pipeline::train_embeddings(params)?;
        Pipeline::log_similarities(&similarity, &params.similarity_pairs);

        let timer = Instant::now();
        let disambiguator = Disambiguator::new(&similarity, &lexicon, &params.json_disambiguation);
        let output = disambiguator.run(&test_data)?;
        info!("selected {} options, took {} ms ...", output.len(), timer.elapsed().as_millis());

        if let Some(output_dir) = &params.output_dir {
            files_handling::save_output::<Vec<Selection>>(output_dir, "selections", &output)?;
        }

        Ok(output)

    }

    pub fn train_embeddings(params: &JsonTypes) -> Result<Similarity> {

        // run the cooccurrences count stage unless saved counts are reused
        let timer = Instant::now();
        let counts = match (&params.output_dir, params.reuse_counts) {
            (Some(output_dir), true) => Counts::load(output_dir)?,
            _ => {
                info!("load & vectorize sentences...");
                let corpus = files_handling::read_lines(&params.corpus_path)?;
                let counts = Counts::run(&corpus, &params.json_train, params.num_threads)?;
                if let Some(output_dir) = &params.output_dir {
                    counts.save(output_dir)?;
                }
                counts
            }
        };
        info!("vocabulary of {} tokens ready, took {} ms ...", counts.vocab_size(), timer.elapsed().as_millis());

        let timer = Instant::now();
        info!("fitting embeddings...");
        let trainer = Train::run(&counts.slices, counts.vocab_size(), &params.json_train)?;
        let w: Array2<f32> = trainer.get_vectors();
        if let Some(output_dir) = &params.output_dir {
            files_handling::save_output::<Array2<f32>>(output_dir, "vecs", &w)?;
        }
        info!("finished training, took {} ms ...", timer.elapsed().as_millis());

        Similarity::new(w, counts.t2i)

    }

    fn log_similarities<E: EmbeddingModel>(embeddings: &E, pairs: &[(String, String)]) {
        for (word_a, word_b) in pairs {
            match embeddings.similarity(word_a, word_b) {
                Ok(score) => info!("cosine similarity between '{}' and '{}': {}", word_a, word_b, score),
                Err(e) => warn!("no similarity for '{}' and '{}': {}", word_a, word_b, e)
            }
        }
    }

}


#[cfg(test)]
mod tests {

    use super::Pipeline;
    use crate::config::{JsonDisambiguation, JsonTrain, JsonTypes};
    use crate::error::DisambiguationError;
    use std::fs;
    use std::path::Path;

    const CORPUS: &str = "yaşama sevinci insanı güçlü kılar
yaşama isteği insanı ayakta tutar
güçlü insan yaşama sevinci taşır
koşma ve yürüme sağlığı korur
koşma insanı güçlü kılar
yürüme sağlığı korur
devlet insanı korur
devlet güçlü olmalı
";

    const TEST_DATA: &str = "yaşama yaşa+Verb+Pos^DB+Noun+Inf2+A3sg+Pnon+Nom yaşam+Noun+A3sg+Pnon+Dat yaşa+Verb+Neg+Imp+A2sg
bilinmeyen bil+Verb+Neg+Pass+Pos bilinmeyen+Adj
";

    const ANALYSES: &str = "koşma koş+Verb+Neg+Imp+A2sg koşma+Noun+A3sg+Pnon+Nom koş+Verb+Pos^DB+Noun+Inf2+A3sg+Pnon+Nom
yürüme yürü+Verb+Neg+Imp+A2sg yürüme+Noun+A3sg+Pnon+Nom
insanı insan+Noun+A3sg+Pnon+Acc insan+Noun+A3sg+P3sg+Nom
güçlü güçlü+Adj güç+Noun+A3sg+Pnon+Nom^DB+Adj+With
";

    fn write_inputs(dir: &Path) -> JsonTypes {
        fs::write(dir.join("corpus.txt"), CORPUS).unwrap();
        fs::write(dir.join("test_data.txt"), TEST_DATA).unwrap();
        fs::write(dir.join("analyses.txt"), ANALYSES).unwrap();

        JsonTypes {
            corpus_path: dir.join("corpus.txt").display().to_string(),
            test_data_path: dir.join("test_data.txt").display().to_string(),
            analyses_path: dir.join("analyses.txt").display().to_string(),
            output_dir: Some(dir.join("out").display().to_string()),
            reuse_counts: false,
            num_threads: 2,
            similarity_pairs: vec![("yaşama".to_string(), "insanı".to_string()), ("yaşama".to_string(), "yok".to_string())],
            json_train: JsonTrain { embedding_dim: 10, epochs: 5, batch_size: 4, ..JsonTrain::default() },
            json_disambiguation: JsonDisambiguation { neighbor_k: 3, ..JsonDisambiguation::default() },
        }
    }

    #[test]
    fn end_to_end_on_a_tiny_corpus() {
        let dir = tempfile::tempdir().unwrap();
        let mut params = write_inputs(dir.path());

        let output = Pipeline::run(&params).unwrap();

        // the unknown word is skipped, the known one gets a row per neighbour
        assert!(!output.is_empty());
        assert!(output.len() <= 3);
        for selection in &output {
            assert_eq!(selection.word, "yaşama");
            assert!(selection.index < 3);
            assert!(selection.neighbor.is_some());
        }

        let out = dir.path().join("out");
        for file in ["cooc0.gz", "words.json", "vecs.npy", "selections.json"] {
            assert!(out.join(file).exists(), "{} was not saved", file);
        }

        // saved counts give the same vocabulary and, with the same seed, the same selections
        params.reuse_counts = true;
        fs::remove_file(dir.path().join("corpus.txt")).unwrap();
        let reused = Pipeline::run(&params).unwrap();
        assert_eq!(reused, output);
    }

    #[test]
    fn shipped_resources_run() {
        let params = JsonTypes {
            json_train: JsonTrain { embedding_dim: 16, epochs: 3, ..JsonTrain::default() },
            ..JsonTypes::default()
        };
        let test_words = ["yaşama", "koşma", "yürüme", "çalışma", "huzuru"];

        let output = Pipeline::run(&params).unwrap();
        assert!(!output.is_empty());
        assert!(output.iter().all(|s| test_words.contains(&s.word.as_str())));
        assert!(output.iter().all(|s| !s.features.is_empty()));
    }

    #[test]
    fn missing_corpus_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut params = write_inputs(dir.path());
        params.corpus_path = dir.path().join("nope.txt").display().to_string();

        let err = Pipeline::run(&params).err().unwrap();
        assert!(matches!(err, DisambiguationError::FileNotFound { .. }));
        assert!(!err.is_recoverable());
    }

}
