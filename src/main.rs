use clap::Parser;
use serde_json::json;
use std::error::Error;
use std::fs;
use std::path::PathBuf;

use odata_query::auth::{authorize_query_options, AuthContext, DenyList};
use odata_query::query::sql::plan_expand;
use odata_query::search::{to_fts34_query, to_fts5_query, to_websearch_query};
use odata_query::utils::logging;
use odata_query::{build_select, parse_query_string, Config, EntityRegistry, SqlDialect};

#[derive(Parser)]
#[clap(version = "0.1.0", author = "OData Query Contributors")]
enum Cli {
    /// Translate a query string for an entity set into SQL
    Sql {
        /// TOML schema with `[[entities]]` tables
        #[clap(short, long)]
        schema: PathBuf,
        #[clap(short, long)]
        entity_set: String,
        /// Raw query string, e.g. `$filter=Price gt 10&$top=5`
        #[clap(short, long)]
        query: String,
        #[clap(short, long)]
        config: Option<PathBuf>,
        /// Override the configured dialect (sqlite or postgres)
        #[clap(short, long)]
        dialect: Option<String>,
        /// Property paths hidden from the caller, e.g. `Books/Title`
        #[clap(long)]
        deny: Vec<String>,
    },
    /// Show how a $search expression is rendered for each full-text backend
    Search {
        #[clap(short, long)]
        query: String,
    },
}

fn parse_dialect(name: &str) -> Result<SqlDialect, Box<dyn Error>> {
    match name.to_ascii_lowercase().as_str() {
        "sqlite" => Ok(SqlDialect::Sqlite),
        "postgres" | "postgresql" => Ok(SqlDialect::Postgres),
        other => Err(format!("unknown dialect '{}'", other).into()),
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    match cli {
        Cli::Sql {
            schema,
            entity_set,
            query,
            config,
            dialect,
            deny,
        } => {
            let mut config = match config {
                Some(path) => Config::load(path)?,
                None => Config::default(),
            };
            if let Some(name) = dialect {
                config.query.dialect = parse_dialect(&name)?;
            }
            logging::init(&config.log)?;

            let content = fs::read_to_string(&schema)?;
            EntityRegistry::register_toml(&content)?;
            let metadata = EntityRegistry::get(&entity_set)
                .ok_or_else(|| format!("entity set '{}' is not in the schema", entity_set))?;

            let mut options = parse_query_string(&query, &metadata, &config.query)?;
            if !deny.is_empty() {
                let policy: DenyList = deny.into_iter().collect();
                authorize_query_options(&policy, &AuthContext::anonymous(), &metadata, &mut options);
            }

            let dialect = config.query.dialect;
            let statement = build_select(&options, &metadata, dialect, &config.search)?;
            let select = statement.to_sql();
            let plans = plan_expand(&options.expand, &metadata, config.query.max_in_clause_size)?;

            let mut output = json!({
                "sql": select.sql,
                "args": select.args.iter().map(|v| v.to_json()).collect::<Vec<_>>(),
                "expand": plans.iter().map(|p| json!({
                    "navigation": p.navigation,
                    "strategy": format!("{:?}", p.strategy),
                })).collect::<Vec<_>>(),
            });
            if options.count {
                let count = statement.count_sql();
                output["count_sql"] = json!(count.sql);
                output["count_args"] = json!(count.args.iter().map(|v| v.to_json()).collect::<Vec<_>>());
            }
            println!("{}", serde_json::to_string_pretty(&output)?);
            logging::shutdown();
        }
        Cli::Search { query } => {
            let output = json!({
                "fts5": to_fts5_query(&query),
                "fts34": to_fts34_query(&query),
                "websearch": to_websearch_query(&query),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
