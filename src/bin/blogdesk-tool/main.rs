use std::fmt::{Display, Formatter};
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, ValueEnum};

use blogdesk::cards::{build_cards, in_category};
use blogdesk::config::{read_config, Derive};
use blogdesk::meta::MetadataDeriver;
use blogdesk::record::RawRecord;
use blogdesk::text_utils::{format_short_date, slugify, word_count};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
enum Args {
    /// Prints the slug of a title
    Slug(SlugArgs),
    /// Counts words and reading time of a text
    Words(WordsArgs),
    /// Builds the public cards of a blog entries file
    Cards(CardsArgs),
}

#[derive(Parser, Debug)]
struct SlugArgs {
    /// Title of the post
    title: String,
}

#[derive(Parser, Debug)]
struct WordsArgs {
    /// Text to count. Markup is ignored
    text: Option<String>,

    /// Reads the text from a file instead
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Config with the derivation settings
    #[arg(short, long)]
    config_path: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct CardsArgs {
    /// JSON array of blog entries
    file: PathBuf,

    /// Only cards of this category
    #[arg(long, default_value = "All")]
    category: String,

    /// Config with the derivation settings
    #[arg(short, long)]
    config_path: Option<PathBuf>,

    #[arg(short, long, default_value_t = CardsOutput::Text)]
    output: CardsOutput,
}

#[derive(Clone, Debug, ValueEnum)]
enum CardsOutput {
    /// One line per card
    Text,
    /// The cards as served by the API
    Json,
}

impl Display for CardsOutput {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CardsOutput::Text => write!(f, "text"),
            CardsOutput::Json => write!(f, "json"),
        }
    }
}

fn deriver_from(config_path: Option<PathBuf>) -> Result<MetadataDeriver> {
    let settings = match config_path {
        Some(path) => read_config(&path)?.derive,
        None => Derive::default(),
    };
    Ok(MetadataDeriver::new(settings))
}

fn words_cmd(args: WordsArgs) -> Result<()> {
    let text = match (args.text, args.file) {
        (_, Some(file)) => fs::read_to_string(&file)
            .with_context(|| format!("Error reading {}", file.display()))?,
        (Some(text), None) => text,
        (None, None) => anyhow::bail!("Either a text or --file is needed"),
    };

    let deriver = deriver_from(args.config_path)?;
    println!("words: {}", word_count(&text));
    println!("reading time: {} min", deriver.reading_time(&text));
    Ok(())
}

fn cards_cmd(args: CardsArgs) -> Result<()> {
    let content = fs::read_to_string(&args.file)
        .with_context(|| format!("Error reading {}", args.file.display()))?;
    let raw_blogs: Vec<RawRecord> = serde_json::from_str(&content)
        .with_context(|| format!("Error parsing {}", args.file.display()))?;

    let deriver = deriver_from(args.config_path)?;
    let cards = in_category(&build_cards(&raw_blogs, &deriver, Utc::now()), &args.category);

    match args.output {
        CardsOutput::Json => println!("{}", serde_json::to_string_pretty(&cards)?),
        CardsOutput::Text => {
            for card in cards {
                println!("{} | {} | {} | {} min | {:.1} stars | {} reads",
                         card.slug,
                         card.category,
                         format_short_date(card.meta.date.as_ref()),
                         card.meta.reading_time_minutes,
                         card.meta.rating,
                         card.meta.read_count);
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    match args {
        Args::Slug(args) => {
            println!("{}", slugify(&args.title));
            Ok(())
        }
        Args::Words(args) => words_cmd(args),
        Args::Cards(args) => cards_cmd(args),
    }
}
