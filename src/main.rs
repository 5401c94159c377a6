use anyhow::{bail, Context, Result};
use clap::Parser;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use lightfill::{
    Alphabet, DictionaryCandidates, FillMode, FillOptions, FillStatus, Filler, Grid, LightProps,
    Randomization,
};

/// Fill a crossword template from a scored word list.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Options {
    /// Template file: `.` for open cells, `#` for blocks, letters for pre-filled cells.
    template: PathBuf,

    /// Word list with one `word;score` (or `word,score`) per line.
    #[arg(short, long)]
    dictionary: PathBuf,

    /// Don't use any answer more than once.
    #[arg(short, long)]
    unique: bool,

    /// Shuffle the letter order at each branch: 0 for none, 1 for light, 2 for heavy.
    #[arg(short, long, default_value_t = 0)]
    random: u8,

    /// Seed for the shuffle.
    #[arg(long)]
    seed: Option<u64>,

    /// Only propagate, printing the letters still possible in each cell.
    #[arg(long)]
    feasibility: bool,
}

fn load_dictionary(path: &Path) -> Result<Vec<(String, i32)>> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("couldn't read dictionary {}", path.display()))?;

    contents
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            let (word, score) = line
                .split_once(';')
                .or_else(|| line.split_once(','))
                .with_context(|| format!("line {} of the dictionary has no score", index + 1))?;
            let score: i32 = score
                .trim()
                .parse()
                .with_context(|| format!("line {} of the dictionary has a non-numeric score", index + 1))?;
            Ok((word.trim().to_string(), score))
        })
        .collect()
}

fn main() -> Result<()> {
    env_logger::init();
    let options = Options::parse();

    let alphabet = Alphabet::latin();
    let template = fs::read_to_string(&options.template)
        .with_context(|| format!("couldn't read template {}", options.template.display()))?;
    let grid = Grid::from_template(&template, &alphabet, &LightProps::default())?;
    let word_list = load_dictionary(&options.dictionary)?;
    info!("loaded {} words", word_list.len());

    let fill_options = FillOptions {
        mode: if options.feasibility {
            FillMode::Feasibility
        } else {
            FillMode::Grid
        },
        unique_answers: options.unique,
        randomization: Randomization::from_level(options.random),
        seed: options.seed,
        ..FillOptions::default()
    };
    let builder = DictionaryCandidates::from_word_list(&word_list, &alphabet);

    let filler = Filler::start(grid, Box::new(builder), fill_options, Box::new(()))?;
    let outcome = filler.wait();

    println!("{:?}", outcome.statistics);
    match &outcome.status {
        FillStatus::SolutionFound => {}
        FillStatus::Failed(error) => return Err(error.clone().into()),
        status => bail!("no fill: {status:?}"),
    }

    if options.feasibility {
        if let Some(solution) = &outcome.solution {
            for (entry, &flbm) in outcome.grid.entries.iter().zip(&solution.entry_flbms) {
                if let Some((x, y)) = entry.position {
                    println!("({x}, {y}): {}", alphabet.describe(flbm));
                }
            }
        }
    } else if let Some(rendered) = outcome.render(&alphabet) {
        println!("{rendered}");
    }

    Ok(())
}
