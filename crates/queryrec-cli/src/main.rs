use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use queryrec_core::{
    AggregateHints, BinaryRelevanceMatrix, ContextDict, RecommendParams, RecommenderConfig,
    SuggestionReport, SuggestionResult,
};
use queryrec_engine::QueryRecommender;

/// QueryRec - Suggest the next SQL query fragments for an analysis topic
#[derive(Parser)]
#[command(name = "queryrec")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: queryrec.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show which reference databases and queries match a topic
    Search {
        /// Analysis topic, e.g. "employee hire evaluation"
        topic: String,

        /// Target columns as "table: column", comma separated
        #[arg(short = 'C', long, value_delimiter = ',', required = true)]
        columns: Vec<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a recommendation session
    Recommend {
        /// Analysis topic, e.g. "employee hire evaluation"
        topic: String,

        /// Target columns as "table: column", comma separated
        #[arg(short = 'C', long, value_delimiter = ',', required = true)]
        columns: Vec<String>,

        /// Already selected column group, comma separated (repeatable)
        #[arg(short, long)]
        select: Vec<String>,

        /// GROUP BY hint, comma separated (repeatable)
        #[arg(short, long)]
        groupby: Vec<String>,

        /// Extra rounds that accept the top suggestion each time
        #[arg(short, long, default_value_t = 0)]
        rounds: usize,

        /// Number of suggestions to aim for
        #[arg(short = 'n', long)]
        top_n: Option<usize>,

        /// Mining support for the first round
        #[arg(short = 'm', long)]
        min_support: Option<f32>,

        /// Output file for the session report
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Write a config file with default settings
    InitConfig {
        /// Where to write the config
        #[arg(default_value = "queryrec.toml")]
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    match cli.command {
        Commands::Search { ref topic, ref columns, json } => {
            let recommender = load_recommender(&cli)?;
            search_command(&recommender, topic, columns, json)
        }
        Commands::Recommend {
            ref topic,
            ref columns,
            ref select,
            ref groupby,
            rounds,
            top_n,
            min_support,
            ref output,
        } => {
            let recommender = load_recommender(&cli)?;

            let mut params = recommender.config().recommend;
            if let Some(top_n) = top_n {
                params = params.with_top_n(top_n);
            }
            if let Some(support) = min_support {
                params = params.with_min_support(support);
            }

            let session = Session {
                topic,
                columns,
                selections: select.iter().map(|s| split_group(s)).collect(),
                groupby: groupby.iter().map(|g| split_group(g)).collect(),
                rounds,
                params,
            };
            recommend_command(&recommender, &session, output.as_deref(), cli.verbose)
        }
        Commands::InitConfig { ref path } => init_config_command(path),
    }
}

/// Load config (explicit path, ./queryrec.toml, or defaults) and the corpus
fn load_recommender(cli: &Cli) -> Result<QueryRecommender> {
    let config = if let Some(config_path) = &cli.config {
        RecommenderConfig::from_file(config_path)?
    } else if Path::new("queryrec.toml").exists() {
        RecommenderConfig::from_file(Path::new("queryrec.toml"))?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        RecommenderConfig::default()
    };

    if cli.verbose {
        let paths = config.corpus_paths();
        eprintln!("{} {}", "Schema file:".cyan(), paths.schema_path.display());
        eprintln!("{} {}", "Query file:".cyan(), paths.query_path.display());
    }

    let recommender = QueryRecommender::from_config(config)
        .map_err(|e| anyhow::anyhow!("Failed to load reference corpus: {}", e))?;
    tracing::debug!(
        databases = recommender.corpus().databases().len(),
        "reference corpus loaded"
    );
    Ok(recommender)
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Search command - list matched databases and the relevance matrix shape
fn search_command(
    recommender: &QueryRecommender,
    topic: &str,
    columns: &[String],
    json: bool,
) -> Result<()> {
    let (matches, matrix) = recommender.search_with_matches(topic, columns)?;

    if json {
        let support: Vec<_> = matrix
            .columns()
            .iter()
            .enumerate()
            .map(|(index, column)| serde_json::json!({ "column": column, "count": matrix.column_count(index) }))
            .collect();
        let out = serde_json::json!({
            "topic": topic,
            "databases": matches,
            "reference_rows": matrix.n_rows(),
            "columns": support,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    print_header(&format!("Topic search: {}", topic));

    if matches.is_empty() {
        println!("{}", "✗ No reference database matches this topic".yellow());
        println!("Try a broader topic or lower thresholds.topic_sim.");
        return Ok(());
    }

    println!("{}", "Matched databases:".bold());
    for m in &matches {
        println!("  {} ({:.3})", m.db_id.green(), m.score);
    }
    println!();

    println!("{} {}", "Reference queries:".bold(), matrix.n_rows());
    println!("{}", "Column support:".bold());
    for (index, column) in matrix.columns().iter().enumerate() {
        let count = matrix.column_count(index);
        let line = format!("  {:>4}  {}", count, column);
        if count == 0 {
            println!("{}", line.dimmed());
        } else {
            println!("{}", line);
        }
    }

    Ok(())
}

struct Session<'a> {
    topic: &'a str,
    columns: &'a [String],
    selections: Vec<Vec<String>>,
    groupby: Vec<Vec<String>>,
    rounds: usize,
    params: RecommendParams,
}

/// Recommend command - initial round, replayed selections, then auto rounds
fn recommend_command(
    recommender: &QueryRecommender,
    session: &Session<'_>,
    output: Option<&Path>,
    verbose: bool,
) -> Result<()> {
    let mut context = ContextDict::new();
    context.groupby = session.groupby.clone();

    let first = match recommender.initial_recommendation_with_hints(
        session.topic,
        session.columns,
        &context,
        &session.params,
    ) {
        Ok(first) => first,
        Err(e) if e.is_no_match() => {
            eprintln!("{} {}", "✗".red(), e);
            eprintln!("Try a broader topic or lower thresholds.topic_sim.");
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let mut report = SuggestionReport::new(session.topic);
    report.matched_databases = first.matrix.databases().to_vec();
    report.reference_rows = first.matrix.n_rows();

    if verbose {
        eprintln!(
            "{} {} reference queries from {}",
            "Matched".cyan(),
            first.matrix.n_rows(),
            first.matrix.databases().join(", ")
        );
    }

    print_round(1, &context, &first.matrix, &first.result);
    report.add_round(context.clone(), first.result.clone());

    let mut last = first.result;
    let mut round = 1;

    for selection in &session.selections {
        context.push_selection(selection.clone());
        context.agg.push(AggregateHints::new());
        round += 1;

        last = recommender.next_recommendation(&first.matrix, &context, &session.params)?;
        print_round(round, &context, &first.matrix, &last);
        report.add_round(context.clone(), last.clone());
    }

    for _ in 0..session.rounds {
        let Some((select, _, agg)) = last.entries().next() else {
            println!("{}", "No further suggestions; stopping.".yellow());
            break;
        };
        context.push_selection(select.clone());
        context.agg.push(agg.clone());
        round += 1;

        last = recommender.next_recommendation(&first.matrix, &context, &session.params)?;
        print_round(round, &context, &first.matrix, &last);
        report.add_round(context.clone(), last.clone());
    }

    if let Some(path) = output {
        report.save_to_file(path)?;
        if verbose {
            eprintln!("{} {}", "Report saved to:".green(), path.display());
        }
    }

    Ok(())
}

fn print_header(title: &str) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", title.bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();
}

fn print_round(
    round: usize,
    context: &ContextDict,
    matrix: &BinaryRelevanceMatrix,
    result: &SuggestionResult,
) {
    print_header(&format!("Round {}", round));

    if !context.select.is_empty() {
        println!("{}", "History:".bold());
        for (step, group) in context.select.iter().enumerate() {
            println!("  {}. {}", step + 1, group.join(", "));
        }
        println!();
    }

    if result.is_empty() {
        println!("{}", "✗ No suggestions".yellow());
        return;
    }

    let supports = QueryRecommender::supports(matrix, result);
    for (i, ((select, groupby, agg), support)) in result.entries().zip(supports).enumerate() {
        println!(
            "  [{}] {} {}",
            i + 1,
            select.join(", ").green().bold(),
            format!("(support {:.2})", support).dimmed()
        );
        if !groupby.is_empty() {
            println!("      {} {}", "GROUP BY".cyan(), groupby.join(", "));
        }
        for (op, columns) in agg {
            println!("      {} {}", op.as_str().to_uppercase().cyan(), columns.join(", "));
        }
    }
}

/// Comma-separated column group, trimmed, empties dropped
fn split_group(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Init config command - write default settings
fn init_config_command(path: &Path) -> Result<()> {
    if path.exists() {
        return Err(anyhow::anyhow!(
            "{} already exists; remove it first to regenerate",
            path.display()
        ));
    }

    RecommenderConfig::default().save_to_file(path)?;
    println!("{} {}", "Wrote default config to".green(), path.display());
    Ok(())
}
