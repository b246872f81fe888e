use std::{collections::HashMap, env, error::Error, process};
use glove_disambiguator::{files_handling, EmbeddingModel, Similarity};
use log::{error, warn};
use ndarray::Array2;


// checks on saved vectors, treated as a binary so it can run without retraining:
// the K most similar words to each word of the input file,
// or the cosine similarity of each pair of words in the input file.
//
// arguments:
// a letter selector: "n" for nearest words, "s" for pair similarity
// path to the input file (one word, or two words separated by a space, per line)
// the output_dir the vectors were saved to (vecs.npy and words.json)
// optional K, 10 by default
// example: ... n words.txt out 5

const DEFAULT_K: usize = 10;

fn main() {

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if let Err(e) = run(&args) {
        error!("{}", e);
        process::exit(1);
    }
}

fn run(args: &[String]) -> Result<(), Box<dyn Error>> {

    if args.len() < 4 || args.len() > 5 {
        return Err("usage: neighbors n|s <input file> <vectors dir> [k]".into());
    }
    let selector = args[1].as_str();
    if !["n", "s"].contains(&selector) {
        return Err(format!("unrecognized pattern in first argument {}", selector).into());
    }
    let k = match args.get(4) {
        Some(k) => k.parse::<usize>()?,
        None => DEFAULT_K
    };

    let lines = files_handling::read_lines(&args[2])?;
    let w = files_handling::read_input::<Array2<f32>>(&format!("{}/vecs", args[3]))?;
    let t2i = files_handling::read_input::<HashMap<String, usize>>(&format!("{}/words", args[3]))?;
    let sim_obj = Similarity::new(w, t2i)?;

    let inputs = lines
    .iter()
    .map(|line| line.split_whitespace().collect::<Vec<&str>>())
    .filter(|tokens| !tokens.is_empty())
    .collect::<Vec<Vec<&str>>>();

    match selector {
        "n" => run_nearest(&inputs, k, &sim_obj),
        _ => run_similarity(&inputs, &sim_obj)
    }
    Ok(())
}

fn run_nearest<E: EmbeddingModel>(inputs: &[Vec<&str>], k: usize, embeddings: &E) {

    for tokens in inputs {
        let token = tokens[0];
        match embeddings.nearest(token, k) {
            Ok(similar) => {
                println!("{} most similar words to {}:", k, token);
                for (i, similar_token) in similar.iter().enumerate() {
                    let score = embeddings.similarity(token, similar_token).unwrap_or(f32::NAN);
                    println!("{} : {} ? {} = {}", i, token, similar_token, score);
                }
                println!();
            },
            Err(e) => warn!("{}", e)
        }
    }
}

fn run_similarity<E: EmbeddingModel>(inputs: &[Vec<&str>], embeddings: &E) {

    for tokens in inputs {
        if tokens.len() != 2 {
            warn!("expected a pair of words, got {:?}", tokens);
            continue;
        }
        match embeddings.similarity(tokens[0], tokens[1]) {
            Ok(score) => println!("{} ~ {} = {}", tokens[0], tokens[1], score),
            Err(e) => warn!("{}", e)
        }
    }
}
