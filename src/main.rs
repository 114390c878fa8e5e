//! TAGS CLI - Command-line interface for the TAGS graph store

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tags::config::{self, AliasPolicy, TagsConfig};
use tags::ui::{self, Icons};
use tags::{Anchor, AnchorSelector, Db, Quantity, QuantityBounds, QuantityFilter, Relation, RelationSelector};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "tags")]
#[command(version = "0.1.0")]
#[command(about = "Totally Approachable Graph System - anchors and relations in one SQLite table")]
#[command(long_about = r#"
TAGS stores anchors (unique text with an optional quantity) and named,
directed relations between them.

Patterns use `*` for any run of characters, `?` for one character and
`&#<codepoint>;` for a literal character, e.g. `&#42;` for `*`.
`@<rowid>` addresses an anchor by its row id.

Example usage:
  tags put apple 3
  tags put fruit
  tags link is-a apple fruit
  tags get 'a*' --q-gt 1
  tags rels --to fruit
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the database file (overrides the config file)
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone, Default)]
struct QuantityArgs {
    /// Quantity equals
    #[arg(long = "q-eq", value_parser = parse_quantity, allow_hyphen_values = true)]
    eq: Option<Quantity>,

    /// Quantity greater than
    #[arg(long = "q-gt", value_parser = parse_quantity, allow_hyphen_values = true)]
    gt: Option<Quantity>,

    /// Quantity greater than or equal
    #[arg(long = "q-gte", value_parser = parse_quantity, allow_hyphen_values = true)]
    gte: Option<Quantity>,

    /// Quantity less than
    #[arg(long = "q-lt", value_parser = parse_quantity, allow_hyphen_values = true)]
    lt: Option<Quantity>,

    /// Quantity less than or equal
    #[arg(long = "q-lte", value_parser = parse_quantity, allow_hyphen_values = true)]
    lte: Option<Quantity>,

    /// Negate the quantity condition
    #[arg(long = "q-not")]
    not: bool,
}

impl QuantityArgs {
    fn filter(&self) -> tags::Result<QuantityFilter> {
        QuantityBounds {
            eq: self.eq,
            gt: self.gt,
            gte: self.gte,
            lt: self.lt,
            lte: self.lte,
            not: self.not,
        }
        .resolve()
    }
}

#[derive(Args, Clone)]
struct AnchorArgs {
    /// Anchor pattern
    pattern: String,

    /// Match the pattern literally (no wildcards or aliases)
    #[arg(short, long)]
    literal: bool,

    #[command(flatten)]
    quantity: QuantityArgs,
}

impl AnchorArgs {
    fn selector(&self) -> tags::Result<AnchorSelector> {
        Ok(AnchorSelector {
            pattern: self.pattern.clone(),
            wildcards: !self.literal,
            quantity: self.quantity.filter()?,
        })
    }
}

#[derive(Args, Clone)]
struct RelationArgs {
    /// Relation name pattern
    #[arg(short, long)]
    name: Option<String>,

    /// Source anchor pattern
    #[arg(short, long)]
    from: Option<String>,

    /// Target anchor pattern
    #[arg(short, long)]
    to: Option<String>,

    /// Match patterns literally (no wildcards or aliases)
    #[arg(short, long)]
    literal: bool,

    #[command(flatten)]
    quantity: QuantityArgs,
}

impl RelationArgs {
    fn selector(&self) -> tags::Result<RelationSelector> {
        Ok(RelationSelector {
            name: self.name.clone(),
            from: self.from.clone(),
            to: self.to.clone(),
            wildcards: !self.literal,
            quantity: self.quantity.filter()?,
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create a config file and an empty store
    Init {
        /// Preface length for the new store
        #[arg(long)]
        preface_length: Option<usize>,

        /// When relation endpoints are stored as aliases
        #[arg(long, value_parser = parse_alias_policy)]
        alias: Option<AliasPolicy>,

        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },

    /// Add an anchor
    Put {
        content: String,

        #[arg(value_parser = parse_quantity, allow_hyphen_values = true)]
        q: Option<Quantity>,
    },

    /// List anchors matching a pattern
    Get {
        #[command(flatten)]
        anchors: AnchorArgs,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<u32>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Count anchors matching a pattern
    Count {
        #[command(flatten)]
        anchors: AnchorArgs,
    },

    /// Delete anchors matching a pattern
    Delete {
        #[command(flatten)]
        anchors: AnchorArgs,
    },

    /// Set the quantity of matching anchors (`none` clears it)
    SetQ {
        #[command(flatten)]
        anchors: AnchorArgs,

        #[arg(long, allow_hyphen_values = true)]
        value: String,
    },

    /// Add to the quantity of matching anchors
    IncrQ {
        #[command(flatten)]
        anchors: AnchorArgs,

        #[arg(long, value_parser = parse_quantity, allow_hyphen_values = true)]
        delta: Quantity,
    },

    /// Add a relation between two anchors
    Link {
        name: String,
        from: String,
        to: String,

        #[arg(value_parser = parse_quantity, allow_hyphen_values = true)]
        q: Option<Quantity>,
    },

    /// List relations
    Rels {
        #[command(flatten)]
        relations: RelationArgs,

        /// Maximum number of results
        #[arg(long)]
        limit: Option<u32>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Delete relations (requires --from or --to)
    Unlink {
        #[command(flatten)]
        relations: RelationArgs,
    },

    /// Set the quantity of matching relations (`none` clears it)
    RelSetQ {
        #[command(flatten)]
        relations: RelationArgs,

        #[arg(long, allow_hyphen_values = true)]
        value: String,
    },

    /// Add to the quantity of matching relations
    RelIncrQ {
        #[command(flatten)]
        relations: RelationArgs,

        #[arg(long, value_parser = parse_quantity, allow_hyphen_values = true)]
        delta: Quantity,
    },

    /// Import a JSON array of interchange items (`-` reads stdin)
    Import {
        file: PathBuf,
    },

    /// Export anchors and relations as JSON
    Export {
        /// Only this anchor pattern and its relations
        anchor: Option<String>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show statistics about the store
    Stats,
}

fn parse_quantity(s: &str) -> Result<Quantity, String> {
    s.parse::<Quantity>().map_err(|e| e.to_string())
}

fn parse_alias_policy(s: &str) -> Result<AliasPolicy, String> {
    s.parse::<AliasPolicy>().map_err(|e| e.to_string())
}

fn parse_set_value(s: &str) -> tags::Result<Option<Quantity>> {
    match s {
        "none" | "null" => Ok(None),
        _ => s.parse().map(Some),
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging; stdout is reserved for results
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    if let Err(err) = run(cli) {
        ui::error(&format!("{err:#}"));
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let file_config = config::load_config(cli.config.as_deref())?.unwrap_or_default();
    let database = cli
        .database
        .clone()
        .or_else(|| file_config.database.as_ref().map(PathBuf::from))
        .unwrap_or_else(config::default_database_path);

    match cli.command {
        Commands::Init { preface_length, alias, force } => {
            let config_path = cli.config.clone().unwrap_or_else(config::default_config_path);
            let new_config = TagsConfig {
                database: Some(database.display().to_string()),
                preface_length: preface_length.or(file_config.preface_length),
                alias: alias.or(file_config.alias),
            };
            config::write_config(&config_path, &new_config, force)?;

            let db = open_db(&database, &new_config)?;
            ui::header("Initialized TAGS store");
            ui::info("Config", &config_path.display().to_string());
            ui::info("Database", &database.display().to_string());
            ui::info("Preface length", &db.options().preface_length.to_string());
            ui::info("Alias policy", db.options().alias_policy.as_str());
        }

        Commands::Put { content, q } => {
            let mut db = open_db(&database, &file_config)?;
            db.put_anchor(&content, q)?;
            ui::anchor_line(&Anchor::new(content, q));
        }

        Commands::Get { anchors, limit, json } => {
            let db = open_db(&database, &file_config)?;
            let found = db.get_anchors(&anchors.selector()?, limit)?.fetch()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else if found.is_empty() {
                println!("{} {}", Icons::EMPTY, ui::muted("No anchors found."));
            } else {
                println!("{}", ui::anchors_table(&found));
            }
        }

        Commands::Count { anchors } => {
            let db = open_db(&database, &file_config)?;
            println!("{}", db.count_anchors(&anchors.selector()?)?);
        }

        Commands::Delete { anchors } => {
            let mut db = open_db(&database, &file_config)?;
            let deleted = db.delete_anchors(&anchors.selector()?)?;
            println!("{} Deleted {} anchor(s)", Icons::DEL, deleted);
        }

        Commands::SetQ { anchors, value } => {
            let mut db = open_db(&database, &file_config)?;
            let updated = db.set_anchor_quantity(&anchors.selector()?, parse_set_value(&value)?)?;
            ui::success(&format!("Updated {updated} anchor(s)"));
        }

        Commands::IncrQ { anchors, delta } => {
            let mut db = open_db(&database, &file_config)?;
            let updated = db.increment_anchor_quantity(&anchors.selector()?, delta)?;
            ui::success(&format!("Updated {updated} anchor(s)"));
        }

        Commands::Link { name, from, to, q } => {
            let mut db = open_db(&database, &file_config)?;
            db.put_relation(&name, &from, &to, q)?;
            ui::relation_line(&Relation::new(name, from, to, q));
        }

        Commands::Rels { relations, limit, json } => {
            let db = open_db(&database, &file_config)?;
            let found = db.get_relations(&relations.selector()?, limit)?.fetch()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else if found.is_empty() {
                println!("{} {}", Icons::EMPTY, ui::muted("No relations found."));
            } else {
                println!("{}", ui::relations_table(&found));
            }
        }

        Commands::Unlink { relations } => {
            let mut db = open_db(&database, &file_config)?;
            let deleted = db.delete_relations(&relations.selector()?)?;
            println!("{} Deleted {} relation(s)", Icons::DEL, deleted);
        }

        Commands::RelSetQ { relations, value } => {
            let mut db = open_db(&database, &file_config)?;
            let updated = db.set_relation_quantity(&relations.selector()?, parse_set_value(&value)?)?;
            ui::success(&format!("Updated {updated} relation(s)"));
        }

        Commands::RelIncrQ { relations, delta } => {
            let mut db = open_db(&database, &file_config)?;
            let updated = db.increment_relation_quantity(&relations.selector()?, delta)?;
            ui::success(&format!("Updated {updated} relation(s)"));
        }

        Commands::Import { file } => {
            let text = if file.as_os_str() == "-" {
                std::io::read_to_string(std::io::stdin())?
            } else {
                std::fs::read_to_string(&file)?
            };
            let mut db = open_db(&database, &file_config)?;
            let report = db.import_json(&text)?;

            println!("{} Imported {} item(s)", Icons::IMPORT, report.imported);
            if !report.is_clean() {
                ui::section("Failures");
                for failure in &report.failures {
                    ui::warn(&format!("#{} {}: {}", failure.index, failure.item, failure.error));
                }
            }
        }

        Commands::Export { anchor, output } => {
            let db = open_db(&database, &file_config)?;
            let text = serde_json::to_string_pretty(&db.export(anchor.as_deref())?)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, text)?;
                    ui::success(&format!("Exported to {}", path.display()));
                }
                None => println!("{text}"),
            }
        }

        Commands::Stats => {
            let db = open_db(&database, &file_config)?;
            let stats = db.stats()?;

            println!("{} TAGS Statistics ({})", Icons::STATS, database.display());
            println!(
                "{}",
                ui::stats_table(&[
                    ("Anchors", &stats.anchors.to_string()),
                    ("Relations", &stats.relations.to_string()),
                    ("Preface length", &db.options().preface_length.to_string()),
                    ("Alias policy", db.options().alias_policy.as_str()),
                ])
            );
        }
    }

    Ok(())
}

fn open_db(database: &Path, file_config: &TagsConfig) -> anyhow::Result<Db> {
    config::ensure_db_dir(database)?;
    tracing::debug!("Opening store {}", database.display());
    Ok(Db::open_with(database, &file_config.store_options())?)
}
