use glove_disambiguator::{Config, Pipeline};
use log::error;
use std::{env, process};

fn main() {

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // optional single argument, a path to a json config
    let args: Vec<String> = env::args().collect();
    let params = match Config::new(&args) {
        Ok(config) => config.get_params(),
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    };

    match Pipeline::run(&params) {
        Ok(output) => {
            for selection in output {
                println!("{}", selection);
            }
        },
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}
