extern crate failure;
extern crate rand;
extern crate rand_xorshift;
extern crate taxorec;
#[macro_use]
extern crate tracing;
extern crate tracing_subscriber;

use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::process;

use rand::SeedableRng;
use rand_xorshift::XorShiftRng;
use tracing_subscriber::EnvFilter;

use taxorec::config::EvaluationConfig;
use taxorec::data::{reduce_to_common_items, Interactions};
use taxorec::datasets::{load_movielens_20m, positive_interactions};
use taxorec::folds::write_fold;
use taxorec::split::k_fold_split;

fn usage() -> ! {
    eprintln!("Usage: make_folds <movielens-dir> <output-dir> [config.json]");
    process::exit(2);
}

fn main() -> Result<(), failure::Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = env::args().skip(1);
    let data_dir = args.next().map(PathBuf::from).unwrap_or_else(|| usage());
    let output_dir = args.next().map(PathBuf::from).unwrap_or_else(|| usage());

    let config = match args.next() {
        Some(path) => EvaluationConfig::from_json_file(path)?,
        None => EvaluationConfig::default(),
    };
    config.validate()?;

    let data = load_movielens_20m(&data_dir)?;
    let interactions = positive_interactions(&data.ratings, config.get_positive_threshold());
    let (interactions, taxonomy_labels) =
        reduce_to_common_items(&interactions, &data.taxonomy_labels());

    let num_tags = taxonomy_labels
        .iter()
        .map(|x| x.tag())
        .collect::<HashSet<_>>()
        .len();
    info!(
        num_interactions = interactions.len(),
        num_users = interactions.user_ids().len(),
        num_items = interactions.item_ids().len(),
        num_tags,
        "Loaded common items"
    );

    let mut rng = XorShiftRng::seed_from_u64(config.get_seed());
    let folds = k_fold_split(interactions.data(), config.get_num_folds(), &mut rng)?;

    for (index, fold) in folds.into_iter().enumerate() {
        info!(
            index,
            seed = fold.seed,
            train = fold.ratio.train,
            validation = fold.ratio.validation,
            test = fold.ratio.test,
            "Writing fold"
        );

        write_fold(
            &output_dir,
            index,
            &Interactions::from(fold.train),
            &Interactions::from(fold.test),
            &taxonomy_labels,
        )?;
    }

    Ok(())
}
