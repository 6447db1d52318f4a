use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use placerecon::config::Config;
use placerecon::context::{resolve_items, InputColumns};
use placerecon::countries::reconcile_countries;
use placerecon::errors::ReconError;
use placerecon::gazetteer::sparql::SparqlGazetteer;
use placerecon::logging;
use placerecon::lookup::{load_tables, TableSpec};
use placerecon::reconcile::driver::Reconciler;
use placerecon::records::{write_countries, write_regions, InputTable};
use placerecon::secondary::sparql::SparqlSecondaryKb;
use placerecon::sparql::SparqlClient;

#[derive(Parser)]
#[command(name = "placerecon", version, about = "Reconcile place names against a gazetteer with knowledge-graph fallback")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile regions nested under known parent regions
    Regions {
        /// Input CSV with a header row
        #[arg(long)]
        input: PathBuf,

        /// Region definition CSV (repeatable, paired with the two flags below)
        #[arg(long = "context-table")]
        context_tables: Vec<PathBuf>,

        /// 1-based name columns of the matching definition table, e.g. "1,2"
        #[arg(long = "context-name-cols")]
        context_name_cols: Vec<String>,

        /// 1-based identifier column of the matching definition table
        #[arg(long = "context-id-col")]
        context_id_cols: Vec<String>,

        /// 1-based context name columns of the input, e.g. "1,2"
        #[arg(long)]
        input_context_cols: String,

        /// 1-based column holding the text to reconcile
        #[arg(long)]
        input_name_col: String,

        /// Remove a trailing parenthesised qualifier before searching
        #[arg(long)]
        strip_qualifier: bool,

        /// Write the result here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Reconcile country names against sovereign states (every match is kept)
    Countries {
        /// Input CSV with a header row
        input: PathBuf,

        /// 1-based column holding the country names
        column: String,

        /// Write the result here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Parse a single 1-based column number into a 0-based index.
fn parse_column(value: &str) -> Result<usize, ReconError> {
    let n: usize = value
        .trim()
        .parse()
        .map_err(|_| ReconError::InvalidColumns(format!("'{}' is not a column number", value)))?;
    if n == 0 {
        return Err(ReconError::InvalidColumns(
            "column numbers start at 1".to_string(),
        ));
    }
    Ok(n - 1)
}

/// Parse a comma-separated list of 1-based column numbers.
fn parse_columns(value: &str) -> Result<Vec<usize>, ReconError> {
    let cols = value
        .split(',')
        .map(parse_column)
        .collect::<Result<Vec<_>, _>>()?;
    if cols.is_empty() {
        return Err(ReconError::InvalidColumns("empty column list".to_string()));
    }
    Ok(cols)
}

fn table_specs(paths: &[PathBuf], name_cols: &[String], id_cols: &[String]) -> Result<Vec<TableSpec>, ReconError> {
    if paths.len() != name_cols.len() || paths.len() != id_cols.len() {
        return Err(ReconError::Config(format!(
            "--context-table, --context-name-cols and --context-id-col must be given the same number of times (got {}, {}, {})",
            paths.len(),
            name_cols.len(),
            id_cols.len()
        )));
    }
    paths
        .iter()
        .zip(name_cols)
        .zip(id_cols)
        .map(|((path, names), id)| -> Result<TableSpec, ReconError> {
            Ok(TableSpec {
                path: path.clone(),
                name_cols: parse_columns(names)?,
                id_col: parse_column(id)?,
            })
        })
        .collect()
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>, ReconError> {
    match path {
        Some(p) => {
            let file = File::create(p).map_err(|e| ReconError::io(p, e))?;
            Ok(Box::new(std::io::BufWriter::new(file)))
        }
        None => Ok(Box::new(std::io::stdout().lock())),
    }
}

fn create_gazetteer(config: &Config) -> Result<SparqlGazetteer> {
    let gazetteer = &config.gazetteer;
    let mut client = SparqlClient::new(&gazetteer.endpoint_url, Duration::from_secs(gazetteer.timeout_secs))
        .context("Cannot set up the gazetteer client")?;
    if let Some(username) = gazetteer.username.clone().filter(|u| !u.is_empty()) {
        client = client.with_basic_auth(username, gazetteer.password.clone());
    }
    tracing::info!(endpoint = %client.endpoint(), timeout_secs = gazetteer.timeout_secs, "Gazetteer endpoint");
    Ok(SparqlGazetteer::new(client))
}

fn create_secondary(config: &Config) -> Result<SparqlSecondaryKb> {
    let secondary = &config.secondary;
    let client = SparqlClient::new(&secondary.endpoint_url, Duration::from_secs(secondary.timeout_secs))
        .context("Cannot set up the secondary knowledge base client")?;
    tracing::info!(endpoint = %client.endpoint(), timeout_secs = secondary.timeout_secs, "Secondary knowledge base endpoint");
    Ok(SparqlSecondaryKb::new(client))
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Parse CLI args
    let cli = Cli::parse();

    // 2. Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Config error (using defaults): {}", e);
        Config::default()
    });

    // 3. Logging goes to stderr only, stdout may carry the output table
    logging::init_logging(&config);

    match cli.command {
        Commands::Regions {
            input,
            context_tables,
            context_name_cols,
            context_id_cols,
            input_context_cols,
            input_name_col,
            strip_qualifier,
            output,
        } => {
            let specs = table_specs(&context_tables, &context_name_cols, &context_id_cols)?;
            let columns = InputColumns {
                context_cols: parse_columns(&input_context_cols)?,
                name_col: parse_column(&input_name_col)?,
                strip_qualifier,
            };

            let tables = load_tables(&specs)?;
            if !specs.is_empty() && tables.iter().all(|t| t.is_empty()) {
                tracing::warn!("All region definition tables are empty, only global search is possible");
            }
            let table = InputTable::read(&input)?;
            let items = resolve_items(&table, &columns, &tables);

            let mut results = BTreeMap::new();
            if items.is_empty() {
                tracing::info!("Nothing to reconcile, writing input through");
            } else {
                let reconciler = Reconciler::new(
                    Arc::new(create_gazetteer(&config)?),
                    Arc::new(create_secondary(&config)?),
                    config.gazetteer.entity_uri_base.clone(),
                );
                reconciler.reconcile_all(&items, &mut results).await;
            }

            let out = open_output(output.as_deref())?;
            write_regions(out, &table, &results)?;
        }

        Commands::Countries { input, column, output } => {
            let column = parse_column(&column)?;
            let table = InputTable::read(&input)?;

            let gazetteer = create_gazetteer(&config)?;
            let secondary = create_secondary(&config)?;
            let matches = reconcile_countries(&gazetteer, &secondary, &table, column).await;

            let out = open_output(output.as_deref())?;
            write_countries(out, &table, &matches)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_columns_is_one_based() {
        assert_eq!(parse_columns("1,2").unwrap(), vec![0, 1]);
        assert_eq!(parse_columns(" 3 ").unwrap(), vec![2]);
        assert!(matches!(parse_columns("0"), Err(ReconError::InvalidColumns(_))));
        assert!(matches!(parse_columns("1,x"), Err(ReconError::InvalidColumns(_))));
        assert!(parse_columns("").is_err());
    }

    #[test]
    fn test_table_flags_must_pair_up() {
        let paths = vec![PathBuf::from("a.csv"), PathBuf::from("b.csv")];
        let err = table_specs(&paths, &["1".to_string()], &["2".to_string(), "2".to_string()]).unwrap_err();
        assert!(matches!(err, ReconError::Config(_)));

        let specs = table_specs(&paths[..1], &["1,2".to_string()], &["3".to_string()]).unwrap();
        assert_eq!(specs[0].name_cols, vec![0, 1]);
        assert_eq!(specs[0].id_col, 2);
    }
}
