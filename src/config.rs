use crate::error::{DisambiguationError, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{collections::BTreeSet, fmt::Display, fs::File, io::BufReader};

// words skipped when collecting neighbours, they carry no sense information
const DEFAULT_ESCAPE_WORDS: [&str; 16] = [
    "bir", "ve", "de", "da", "için", "ile", "en", "öyle", "gibi", "değil",
    "ne", "ki", "ya", "a", "b", "c"
];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonTrain {
    pub vocab_size: usize,
    pub min_word_frequency: usize,
    pub window_size: usize,
    pub embedding_dim: usize,
    pub epochs: usize,
    pub learning_rate: f32,
    pub x_max: f32,
    pub alpha: f32,
    pub batch_size: usize,
    pub seed: u64
}

impl Default for JsonTrain {
    fn default() -> Self {
        Self {
            vocab_size: 400000,
            min_word_frequency: 2,
            window_size: 5,
            embedding_dim: 100,
            epochs: 50,
            learning_rate: 0.05,
            x_max: 100.0,
            alpha: 0.75,
            batch_size: 32,
            seed: 42
        }
    }
}

impl Display for JsonTrain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "training hyper parameters:
        vocab_size: {},
        min_word_frequency: {},
        window_size: {},
        embedding_dim: {},
        epochs: {},
        learning_rate: {},
        x_max: {},
        alpha: {},
        batch_size: {},
        seed: {}",
        self.vocab_size, self.min_word_frequency, self.window_size, self.embedding_dim, self.epochs,
        self.learning_rate, self.x_max, self.alpha, self.batch_size, self.seed
        )
    }
}

/// How many selection rows a test word produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// A fresh feature pool for every neighbour, one row per neighbour.
    PerNeighbor,
    /// One pool across all neighbours, one row per test word.
    PerWord
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonDisambiguation {
    pub neighbor_k: usize,
    pub escape_words: BTreeSet<String>,
    pub selection_mode: SelectionMode
}

impl Default for JsonDisambiguation {
    fn default() -> Self {
        Self {
            neighbor_k: 5,
            escape_words: DEFAULT_ESCAPE_WORDS.iter().map(|w| w.to_string()).collect(),
            selection_mode: SelectionMode::PerNeighbor
        }
    }
}

impl Display for JsonDisambiguation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "disambiguation parameters:
        neighbor_k: {},
        escape_words: {:?},
        selection_mode: {:?}",
        self.neighbor_k, self.escape_words, self.selection_mode
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonTypes {
    pub corpus_path: String,
    pub test_data_path: String,
    pub analyses_path: String,
    pub output_dir: Option<String>,
    pub reuse_counts: bool,
    pub num_threads: usize,
    pub similarity_pairs: Vec<(String, String)>,
    #[serde(flatten)]
    pub json_train: JsonTrain,
    #[serde(flatten)]
    pub json_disambiguation: JsonDisambiguation
}

impl Default for JsonTypes {
    fn default() -> Self {
        Self {
            corpus_path: "resources/devlet82.txt".to_string(),
            test_data_path: "resources/test_data.txt".to_string(),
            analyses_path: "resources/analyses.txt".to_string(),
            output_dir: None,
            reuse_counts: false,
            num_threads: 4,
            similarity_pairs: Vec::new(),
            json_train: JsonTrain::default(),
            json_disambiguation: JsonDisambiguation::default()
        }
    }
}

impl Display for JsonTypes {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "using params:
        corpus_path: {}
        test_data_path: {}
        analyses_path: {}
        output_dir: {:?}
        reuse_counts: {}
        num_threads: {}
        similarity_pairs: {:?},
        Using {}
        Using {}",
        self.corpus_path, self.test_data_path, self.analyses_path, self.output_dir, self.reuse_counts,
        self.num_threads, self.similarity_pairs, self.json_train, self.json_disambiguation)
    }
}

impl JsonTypes {

    fn validate(&self) -> Result<()> {

        let positives = [
            ("neighbor_k", self.json_disambiguation.neighbor_k),
            ("epochs", self.json_train.epochs),
            ("embedding_dim", self.json_train.embedding_dim),
            ("window_size", self.json_train.window_size),
            ("batch_size", self.json_train.batch_size),
            ("vocab_size", self.json_train.vocab_size),
            ("min_word_frequency", self.json_train.min_word_frequency),
            ("num_threads", self.num_threads),
        ];
        for (name, value) in positives {
            if value == 0 {
                return Err(DisambiguationError::InvalidConfig(format!("{} must be positive", name)));
            }
        }

        if self.reuse_counts && self.output_dir.is_none() {
            return Err(DisambiguationError::InvalidConfig(
                "reuse_counts requires output_dir to load the saved counts from".to_string()
            ));
        }
        Ok(())
    }
}

// flattened sections rule out deny_unknown_fields, so keys are checked against the serialized defaults
fn unknown_keys(value: &Value) -> Result<Vec<String>> {
    let known = serde_json::to_value(JsonTypes::default())?;
    let unknown = match (value, &known) {
        (Value::Object(given), Value::Object(known)) => given
            .keys()
            .filter(|key| !known.contains_key(key.as_str()))
            .cloned()
            .collect(),
        _ => Vec::new()
    };
    Ok(unknown)
}

pub struct Config {
    params: JsonTypes
}

impl Config {

    pub fn get_params(&self) -> JsonTypes {
        self.params.clone()
    }

    pub fn new(args: &[String]) -> Result<Config> {

        // no argument runs on the default resources, otherwise a single path to a json file
        match args.len() {
            1 => Config::from_params(JsonTypes::default()),
            2 => {
                let f = File::open(&args[1]).map_err(|e| DisambiguationError::from_io(e, &args[1]))?;
                Config::from_value(serde_json::from_reader(BufReader::new(f))?)
            },
            _ => Err(DisambiguationError::InvalidConfig("input should be a path to json file only".to_string()))
        }
    }

    pub fn from_json_str(json: &str) -> Result<Config> {
        Config::from_value(serde_json::from_str(json)?)
    }

    fn from_value(value: Value) -> Result<Config> {
        for key in unknown_keys(&value)? {
            warn!("ignoring unknown config key '{}', its default is used instead", key);
        }
        let params: JsonTypes = serde_json::from_value(value)?;
        Config::from_params(params)
    }

    pub fn from_params(params: JsonTypes) -> Result<Config> {
        params.validate()?;
        Ok(Self { params })
    }

}


pub mod files_handling {

    use crate::disambiguate::Selection;
    use crate::error::{DisambiguationError, Result};
    use flate2::{Compression, read::GzDecoder, write::GzEncoder};
    use ndarray::Array2;
    use ndarray_npy::{read_npy, write_npy};
    use std::collections::HashMap;
    use std::fs::{self, File};
    use std::io::{BufRead, BufReader, BufWriter, Read, Write};
    use std::path::{Path, PathBuf};

    /// Reads a UTF-8 text file into its lines.
    pub fn read_lines(file_path: &str) -> Result<Vec<String>> {
        let f = File::open(file_path).map_err(|e| DisambiguationError::from_io(e, file_path))?;
        let mut lines = Vec::new();
        for line in BufReader::new(f).lines() {
            lines.push(line?.trim_end_matches('\r').to_string());
        }
        Ok(lines)
    }

    pub fn read_input<R: ReadFile>(file_path: &str) -> Result<R> {
        R::read_file(file_path)
    }

    pub fn save_output<S: SaveFile>(output_dir: &str, file_name: &str, item: &S) -> Result<()> {

        // create output folder
        fs::create_dir_all(output_dir)?;
        item.save_file(output_dir, file_name)
    }

    fn open(path: &Path) -> Result<BufReader<File>> {
        let f = File::open(path).map_err(|e| DisambiguationError::from_io(e, &path.display().to_string()))?;
        Ok(BufReader::new(f))
    }

    pub trait ReadFile: Sized {
        fn read_file(file_path: &str) -> Result<Self>;
    }

    impl ReadFile for Array2<f32> {
        fn read_file(file_path: &str) -> Result<Self> {
            let in_file = format!("{}.npy", file_path);
            if !Path::new(&in_file).exists() {
                return Err(DisambiguationError::FileNotFound { path: in_file });
            }
            Ok(read_npy(in_file)?)
        }
    }

    impl ReadFile for HashMap<String, usize> {
        fn read_file(file_path: &str) -> Result<Self> {
            let in_file = format!("{}.json", file_path);
            let item = serde_json::from_reader(open(Path::new(&in_file))?)?;
            Ok(item)
        }
    }

    // chunks of `prefix` in `dir` are `{prefix}{i}.gz`, returned ordered by `i`
    fn chunk_paths(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
        let mut chunks: Vec<(usize, PathBuf)> = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| DisambiguationError::from_io(e, &dir.display().to_string()))? {
            let entry_path = entry?.path();
            let index = entry_path
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix(prefix))
                .and_then(|rest| rest.strip_suffix(".gz"))
                .and_then(|digits| digits.parse::<usize>().ok());
            if let Some(i) = index {
                chunks.push((i, entry_path));
            }
        }
        chunks.sort_by_key(|(i, _)| *i);
        Ok(chunks.into_iter().map(|(_, path)| path).collect())
    }

    impl ReadFile for Vec<Vec<u8>> {

        // `file_path` is a prefix, e.g. `out/cooc` collects `out/cooc0.gz`, `out/cooc1.gz`, ...
        fn read_file(file_path: &str) -> Result<Self> {

            let path = Path::new(file_path);
            let main_dir = match path.parent() {
                Some(dir) if !dir.as_os_str().is_empty() => dir,
                _ => Path::new(".")
            };
            let prefix = path.file_name().and_then(|name| name.to_str()).unwrap_or_default();

            let mut items: Vec<Vec<u8>> = Vec::new();
            for chunk_path in chunk_paths(main_dir, prefix)? {
                let mut reader = GzDecoder::new(open(&chunk_path)?);
                let mut buf: Vec<u8> = Vec::new();
                reader.read_to_end(&mut buf)?;
                items.push(buf);
            }
            Ok(items)
        }
    }

    pub trait SaveFile {
        fn save_file(&self, output_dir: &str, file_name: &str) -> Result<()>;
    }

    impl SaveFile for Vec<Vec<u8>> {
        fn save_file(&self, output_dir: &str, file_name: &str) -> Result<()> {

            // chunks of an earlier save would be read back along with these ones
            for stale in chunk_paths(Path::new(output_dir), file_name)? {
                fs::remove_file(stale)?;
            }

            for (i, buf) in self.iter().enumerate() {
                let out = Path::new(output_dir).join(format!("{}{}.gz", file_name, i));
                let f = BufWriter::new(File::create(out)?);
                let mut writer = GzEncoder::new(f, Compression::default());
                writer.write_all(buf)?;
                writer.finish()?.flush()?;
            }
            Ok(())
        }
    }

    impl SaveFile for Array2<f32> {
        fn save_file(&self, output_dir: &str, file_name: &str) -> Result<()> {
            let out = Path::new(output_dir).join(format!("{}.npy", file_name));
            write_npy(out, self)?;
            Ok(())
        }
    }

    impl SaveFile for HashMap<String, usize> {
        fn save_file(&self, output_dir: &str, file_name: &str) -> Result<()> {
            let out = Path::new(output_dir).join(format!("{}.json", file_name));
            let mut f = BufWriter::new(File::create(out)?);
            serde_json::to_writer(&mut f, self)?;
            f.flush()?;
            Ok(())
        }
    }

    impl SaveFile for Vec<Selection> {
        fn save_file(&self, output_dir: &str, file_name: &str) -> Result<()> {
            let out = Path::new(output_dir).join(format!("{}.json", file_name));
            let mut f = BufWriter::new(File::create(out)?);
            serde_json::to_writer_pretty(&mut f, self)?;
            f.flush()?;
            Ok(())
        }
    }

}
