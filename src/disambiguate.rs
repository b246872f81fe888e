use crate::config::{JsonDisambiguation, SelectionMode};
use crate::error::Result;
use crate::morphology::{Analyzer, Parse, TestCase};
use crate::similarity::EmbeddingModel;
use log::{debug, warn};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt::Display;

// a pool feature must occur more often than this to take part in scoring
const SIGNIFICANCE_THRESHOLD: usize = 1;

/// The candidate chosen for a test word.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub word: String,
    pub index: usize,
    pub features: Vec<String>,
    pub overlap: usize,
    /// The neighbour whose pool produced this row, set in per-neighbour mode.
    pub neighbor: Option<String>,
}

impl Display for Selection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]", self.word, self.features.join(", "))
    }
}

/// Occurrence counts of feature tags gathered from neighbour parses.
#[derive(Clone, Debug, Default)]
pub struct FeaturePool {
    counts: HashMap<String, usize>,
    order: Vec<String>,
}

impl FeaturePool {

    pub fn new() -> FeaturePool {
        FeaturePool::default()
    }

    // the root is not a feature and never enters the pool
    pub fn add_parse(&mut self, parse: &Parse) {
        for feature in &parse.features {
            let count = self.counts.entry(feature.to_owned()).or_insert(0);
            if *count == 0 {
                self.order.push(feature.to_owned());
            }
            *count += 1;
        }
    }

    pub fn from_parses<'a, I: IntoIterator<Item = &'a Parse>>(parses: I) -> FeaturePool {
        let mut pool = FeaturePool::new();
        parses.into_iter().for_each(|parse| pool.add_parse(parse));
        pool
    }

    pub fn count(&self, feature: &str) -> usize {
        self.counts.get(feature).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Features by descending count, first-seen order among equal counts.
    pub fn ranked(&self) -> Vec<(&str, usize)> {
        let mut ranked = self.order
        .iter()
        .map(|feature| (feature.as_str(), self.count(feature)))
        .collect::<Vec<(&str, usize)>>();
        ranked.sort_by(|(_, a), (_, b)| b.cmp(a));
        ranked
    }

    pub fn significant(&self) -> HashSet<&str> {
        self.ranked()
        .into_iter()
        .filter(|(_, count)| *count > SIGNIFICANCE_THRESHOLD)
        .map(|(feature, _)| feature)
        .collect()
    }

}

/// Drops empty entries and escape words, keeping the order of the rest.
pub fn filter_neighbors(neighbors: Vec<String>, escape_words: &BTreeSet<String>) -> Vec<String> {
    neighbors
    .into_iter()
    .filter(|word| !word.trim().is_empty())
    .filter(|word| !escape_words.contains(word))
    .collect()
}

// distinct candidate features found in the significant set
pub fn overlap(candidate: &Parse, significant: &HashSet<&str>) -> usize {
    candidate.features
    .iter()
    .map(|feature| feature.as_str())
    .filter(|feature| significant.contains(feature))
    .collect::<HashSet<&str>>()
    .len()
}

/// Index and overlap of the first candidate with the highest overlap.
///
/// The running maximum starts at 0, so when nothing overlaps the first candidate is kept.
pub fn select_candidate(candidates: &[Parse], significant: &HashSet<&str>) -> (usize, usize) {
    let mut max_similarity = 0;
    let mut max_index = 0;
    for (i, candidate) in candidates.iter().enumerate() {
        let similarity = overlap(candidate, significant);
        if similarity > max_similarity {
            max_similarity = similarity;
            max_index = i;
        }
    }
    (max_index, max_similarity)
}


// the parses of a word as they are written in the analyses, space separated
fn oflazer_line(parses: &[Parse]) -> String {
    parses.iter().map(|parse| parse.to_string()).collect::<Vec<String>>().join(" ")
}

pub struct Disambiguator<'a, E: EmbeddingModel + ?Sized, A: Analyzer + ?Sized> {
    embeddings: &'a E,
    analyzer: &'a A,
    params: &'a JsonDisambiguation,
}

impl<'a, E: EmbeddingModel + ?Sized, A: Analyzer + ?Sized> Disambiguator<'a, E, A> {

    pub fn new(embeddings: &'a E, analyzer: &'a A, params: &'a JsonDisambiguation) -> Self {
        Self { embeddings, analyzer, params }
    }

    pub fn neighbors(&self, word: &str) -> Result<Vec<String>> {
        let nearest = self.embeddings.nearest(word, self.params.neighbor_k)?;
        Ok(filter_neighbors(nearest, &self.params.escape_words))
    }

    fn select(&self, case: &TestCase, pool: &FeaturePool, neighbor: Option<&str>) -> Selection {
        let significant = pool.significant();
        let (index, overlap) = select_candidate(&case.candidates, &significant);
        debug!("{}: pool {:?}, picked option {} with overlap {}", case.word, pool.ranked(), index, overlap);
        Selection {
            word: case.word.clone(),
            index,
            features: case.candidates[index].features.clone(),
            overlap,
            neighbor: neighbor.map(|n| n.to_string()),
        }
    }

    fn analyses(&self, neighbor: &str) -> Vec<Parse> {
        let parses = self.analyzer.analyze(neighbor);
        debug!("{}: {}", neighbor, oflazer_line(&parses));
        parses
    }

    pub fn disambiguate(&self, case: &TestCase) -> Result<Vec<Selection>> {

        let neighbors = self.neighbors(&case.word)?;
        if neighbors.is_empty() {
            debug!("{} has no usable neighbours", case.word);
            return Ok(Vec::new());
        }

        let selections = match self.params.selection_mode {
            SelectionMode::PerNeighbor => {
                neighbors
                .iter()
                .map(|neighbor| {
                    let parses = self.analyses(neighbor);
                    self.select(case, &FeaturePool::from_parses(&parses), Some(neighbor.as_str()))
                })
                .collect()
            },
            SelectionMode::PerWord => {
                let mut pool = FeaturePool::new();
                for neighbor in &neighbors {
                    self.analyses(neighbor).iter().for_each(|parse| pool.add_parse(parse));
                }
                vec![self.select(case, &pool, None)]
            }
        };

        Ok(selections)
    }

    pub fn disambiguate_line(&self, line: &str) -> Result<Vec<Selection>> {
        let case = TestCase::parse_line(line)?;
        self.disambiguate(&case)
    }

    /// Runs every test line, skipping the ones that fail on their own.
    pub fn run<S: AsRef<str>>(&self, lines: &[S]) -> Result<Vec<Selection>> {

        let mut output = Vec::new();
        for line in lines {
            let line = line.as_ref();
            if line.trim().is_empty() {
                continue;
            }
            match self.disambiguate_line(line) {
                Ok(selections) => output.extend(selections),
                Err(e) if e.is_recoverable() => warn!("skipping test line: {}", e),
                Err(e) => return Err(e)
            }
        }
        Ok(output)
    }

}


#[cfg(test)]
mod tests {

    use super::{filter_neighbors, oflazer_line, select_candidate, Disambiguator, FeaturePool, Selection};
    use crate::config::{JsonDisambiguation, SelectionMode};
    use crate::error::{DisambiguationError, Result};
    use crate::morphology::{Analyzer, Lexicon, Parse};
    use crate::similarity::EmbeddingModel;
    use std::collections::{BTreeSet, HashMap, HashSet};

    struct MockEmbeddings {
        neighbors: HashMap<String, Vec<String>>,
    }

    impl MockEmbeddings {
        fn new(word: &str, neighbors: &[&str]) -> Self {
            let neighbors = [(word.to_string(), strings(neighbors))].into_iter().collect();
            Self { neighbors }
        }
    }

    impl EmbeddingModel for MockEmbeddings {
        fn nearest(&self, word: &str, k: usize) -> Result<Vec<String>> {
            match self.neighbors.get(word) {
                Some(ns) => Ok(ns.iter().take(k).cloned().collect()),
                None => Err(DisambiguationError::WordNotFound { word: word.to_string() })
            }
        }

        fn similarity(&self, _word_a: &str, _word_b: &str) -> Result<f32> {
            Ok(0.0)
        }
    }

    fn parse(features: &[&str]) -> Parse {
        Parse { root: "kök".to_string(), features: features.iter().map(|f| f.to_string()).collect() }
    }

    fn escape(words: &[&str]) -> BTreeSet<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn strings(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    fn params(mode: SelectionMode) -> JsonDisambiguation {
        JsonDisambiguation { selection_mode: mode, ..JsonDisambiguation::default() }
    }

    #[test]
    fn escape_words_are_removed() {
        let neighbors = strings(&["ve", "koşma", "bir", "yürüme", "ve"]);
        let filtered = filter_neighbors(neighbors.clone(), &escape(&["ve", "bir"]));
        assert_eq!(filtered, strings(&["koşma", "yürüme"]));
        assert_eq!(filtered.len(), neighbors.len() - 3);
    }

    #[test]
    fn empty_entries_are_removed() {
        let filtered = filter_neighbors(strings(&["", "koşma", "  ", "yürüme"]), &BTreeSet::new());
        assert_eq!(filtered, strings(&["koşma", "yürüme"]));
        assert!(filtered.iter().all(|w| !w.is_empty()));
    }

    #[test]
    fn pool_counts_and_significant_set() {
        let pool = FeaturePool::from_parses(&[parse(&["f1", "f2"]), parse(&["f1"])]);
        assert_eq!(pool.count("f1"), 2);
        assert_eq!(pool.count("f2"), 1);
        assert_eq!(pool.count("kök"), 0);
        assert_eq!(pool.significant(), ["f1"].into_iter().collect::<HashSet<&str>>());
    }

    #[test]
    fn neighbour_analyses_print_in_oflazer_form() {
        let lexicon = Lexicon::from_lines(&["koşma koş+Verb+Neg+Imp+A2sg koşma+Noun+A3sg+Pnon+Nom"]);
        assert_eq!(oflazer_line(&lexicon.analyze("koşma")), "koş+Verb+Neg+Imp+A2sg koşma+Noun+A3sg+Pnon+Nom");
        assert_eq!(oflazer_line(&lexicon.analyze("yok")), "");
    }

    #[test]
    fn ranking_is_stable() {
        let pool = FeaturePool::from_parses(&[parse(&["b", "a", "c"]), parse(&["c", "a"])]);
        assert_eq!(pool.ranked(), vec![("a", 2), ("c", 2), ("b", 1)]);
    }

    #[test]
    fn higher_overlap_wins() {
        let significant: HashSet<&str> = ["f1", "f3"].into_iter().collect();
        let candidates = [parse(&["f1"]), parse(&["f1", "f3"])];
        assert_eq!(select_candidate(&candidates, &significant), (1, 2));
    }

    #[test]
    fn ties_keep_the_lower_index() {
        let significant: HashSet<&str> = ["f1", "f2"].into_iter().collect();
        let candidates = [parse(&["x", "f2"]), parse(&["f1", "y"]), parse(&["f2", "f2"])];
        assert_eq!(select_candidate(&candidates, &significant), (0, 1));
    }

    #[test]
    fn zero_overlap_defaults_to_first() {
        let candidates = [parse(&["a"]), parse(&["b"])];
        assert_eq!(select_candidate(&candidates, &HashSet::new()), (0, 0));
    }

    #[test]
    fn below_threshold_neighbour_keeps_first_option() {
        let embeddings = MockEmbeddings::new("yaşama", &["koşma"]);
        let lexicon = Lexicon::from_lines(&["koşma koş+Verb+Pos"]);
        for mode in [SelectionMode::PerNeighbor, SelectionMode::PerWord] {
            let params = params(mode);
            let disambiguator = Disambiguator::new(&embeddings, &lexicon, &params);
            let output = disambiguator.run(&["yaşama yaşa+Verb+Pos yaşam+Noun+A3sg"]).unwrap();
            assert_eq!(output.len(), 1);
            assert_eq!(output[0].index, 0);
            assert_eq!(output[0].overlap, 0);
            assert_eq!(output[0].to_string(), "yaşama [Verb, Pos]");
        }
    }

    #[test]
    fn per_neighbor_emits_a_row_for_each_neighbour() {
        let embeddings = MockEmbeddings::new("yüzü", &["eli", "ve", "gözü"]);
        let lexicon = Lexicon::from_lines(&[
            "eli el+Noun+A3sg+P3sg+Nom el+Noun+A3sg+Pnon+Acc",
            "gözü göz+Noun+A3sg+P3sg+Nom göz+Noun+A3sg+Pnon+Acc göz+Noun+A3sg+P3sg+Nom",
        ]);
        let params = params(SelectionMode::PerNeighbor);
        let disambiguator = Disambiguator::new(&embeddings, &lexicon, &params);

        let output = disambiguator.run(&["yüzü yüz+Verb+Pos+Imp+A2sg yüz+Noun+A3sg+Pnon+Acc yüz+Noun+A3sg+P3sg+Nom"]).unwrap();
        assert_eq!(output.len(), 2);

        // eli: Noun 2, A3sg 2 -> both noun options overlap 2, first one wins
        assert_eq!(output[0].neighbor.as_deref(), Some("eli"));
        assert_eq!(output[0].index, 1);
        assert_eq!(output[0].overlap, 2);

        // gözü: Noun 3, A3sg 3, P3sg 2, Nom 2 -> the possessive option
        assert_eq!(output[1].neighbor.as_deref(), Some("gözü"));
        assert_eq!(output[1].index, 2);
        assert_eq!(output[1].overlap, 4);
        assert_eq!(output[1].features, vec!["Noun", "A3sg", "P3sg", "Nom"]);
    }

    #[test]
    fn per_word_pools_all_neighbours() {
        let embeddings = MockEmbeddings::new("yüzü", &["eli", "gözü"]);
        let lexicon = Lexicon::from_lines(&["eli el+Noun+A3sg+P3sg+Nom", "gözü göz+Noun+A3sg+P3sg+Nom"]);
        let params = params(SelectionMode::PerWord);
        let disambiguator = Disambiguator::new(&embeddings, &lexicon, &params);

        let output = disambiguator.run(&["yüzü yüz+Verb+Pos+Imp+A2sg yüz+Noun+A3sg+P3sg+Nom"]).unwrap();
        assert_eq!(output, vec![Selection {
            word: "yüzü".to_string(),
            index: 1,
            features: vec!["Noun".to_string(), "A3sg".to_string(), "P3sg".to_string(), "Nom".to_string()],
            overlap: 4,
            neighbor: None,
        }]);
    }

    #[test]
    fn unknown_and_malformed_words_are_skipped() {
        let embeddings = MockEmbeddings::new("yaşama", &["koşma", "yürüme"]);
        let lexicon = Lexicon::from_lines(&["koşma koş+Verb+Pos koş+Verb+Neg", "yürüme yürü+Verb+Pos yürü+Verb+Neg"]);
        let params = params(SelectionMode::PerNeighbor);
        let disambiguator = Disambiguator::new(&embeddings, &lexicon, &params);

        let output = disambiguator.run(&[
            "bilinmeyen bil+Verb+Pos bilinmeyen+Noun+A3sg",
            "bozuk",
            "",
            "yaşama yaşam+Noun+A3sg yaşa+Verb+Pos",
        ]).unwrap();

        assert_eq!(output.len(), 2);
        assert!(output.iter().all(|s| s.word == "yaşama" && s.index == 1));

        let err = disambiguator.disambiguate_line("bilinmeyen bil+Verb").err().unwrap();
        assert!(matches!(err, DisambiguationError::WordNotFound { .. }));
    }

    #[test]
    fn only_escape_words_emit_nothing() {
        let embeddings = MockEmbeddings::new("yaşama", &["ve", "bir"]);
        let lexicon = Lexicon::default();
        let params = params(SelectionMode::PerWord);
        let disambiguator = Disambiguator::new(&embeddings, &lexicon, &params);
        assert!(disambiguator.run(&["yaşama yaşa+Verb+Pos"]).unwrap().is_empty());
        assert!(lexicon.analyze("ve").is_empty());
    }

}
