use crate::config::files_handling;
use crate::error::{DisambiguationError, Result};
use log::{info, warn};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt::Display;

const FEATURE_SEPARATOR: char = '+';

/// A morphological parse in Oflazer notation, `ROOT+FEATURE+FEATURE...`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Parse {
    pub root: String,
    pub features: Vec<String>,
}

impl Parse {

    // splits on the literal separator, the first segment is the root and the
    // remaining ones are feature tags in their original order (duplicates kept)
    pub fn from_oflazer(parse: &str) -> Parse {
        let mut parts = parse.split(FEATURE_SEPARATOR);
        let root = parts.next().unwrap_or_default().to_string();
        Parse { root, features: parts.map(|x| x.to_string()).collect() }
    }

    // candidates of a test line must carry at least one feature
    fn candidate(line: &str, option: &str) -> Result<Parse> {
        if !option.contains(FEATURE_SEPARATOR) {
            return Err(DisambiguationError::malformed(line, format!("option '{}' has no features", option)));
        }
        let parse = Parse::from_oflazer(option);
        if parse.root.is_empty() {
            return Err(DisambiguationError::malformed(line, format!("option '{}' has no root", option)));
        }
        Ok(parse)
    }
}

impl Display for Parse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.root)?;
        for feature in &self.features {
            write!(f, "{}{}", FEATURE_SEPARATOR, feature)?;
        }
        Ok(())
    }
}

/// An ambiguous surface word with its candidate parses, one line of the test data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCase {
    pub word: String,
    pub candidates: Vec<Parse>,
}

impl TestCase {

    pub fn parse_line(line: &str) -> Result<TestCase> {

        let mut tokens = line.split_whitespace();
        let word = match tokens.next() {
            Some(word) => word.to_string(),
            None => return Err(DisambiguationError::malformed(line, "empty line"))
        };

        let candidates = tokens
        .map(|option| Parse::candidate(line, option))
        .collect::<Result<Vec<Parse>>>()?;

        if candidates.is_empty() {
            return Err(DisambiguationError::malformed(line, "no candidate parses"));
        }

        Ok(TestCase { word, candidates })
    }
}

/// Source of morphological analyses for a surface word.
pub trait Analyzer {
    fn analyze(&self, word: &str) -> Vec<Parse>;
}

/// Serves analyses that were computed ahead of time by an external analyzer.
///
/// The lexicon file uses the test-data layout, `WORD PARSE1 PARSE2 ...`, one word per line.
/// Words are matched lower-cased and unknown words have no analyses.
#[derive(Clone, Debug, Default)]
pub struct Lexicon {
    analyses: HashMap<String, Vec<Parse>>,
}

impl Lexicon {

    pub fn load(file_path: &str) -> Result<Lexicon> {
        let lines = files_handling::read_lines(file_path)?;
        let lexicon = Lexicon::from_lines(&lines);
        info!("loaded analyses of {} words from {}", lexicon.len(), file_path);
        Ok(lexicon)
    }

    pub fn from_lines<S: AsRef<str>>(lines: &[S]) -> Lexicon {

        let mut analyses: HashMap<String, Vec<Parse>> = HashMap::new();
        for line in lines {
            let line = line.as_ref();
            let mut tokens = line.split_whitespace();
            let word = match tokens.next() {
                Some(word) => word.to_lowercase(),
                None => continue
            };

            let parses: Vec<Parse> = tokens.map(Parse::from_oflazer).collect();
            if parses.is_empty() {
                warn!("skipping lexicon line without analyses: {:?}", line);
                continue;
            }

            // a word listed twice keeps all of its analyses
            analyses.entry(word).or_default().extend(parses);
        }

        Lexicon { analyses }
    }

    pub fn len(&self) -> usize {
        self.analyses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.analyses.is_empty()
    }
}

impl Analyzer for Lexicon {
    fn analyze(&self, word: &str) -> Vec<Parse> {
        self.analyses.get(&word.to_lowercase()).cloned().unwrap_or_default()
    }
}
