use clap::Parser;
use neo4j_dialect::{
    create_engine, Dialect, DialectConfig, DialectRegistry, DriverRuntime, NativeRuntime,
};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;

use config::Args;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "neo4j_inspect=info,neo4j_dialect=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let mut dialect_config = DialectConfig::from_env();
    if args.warmup {
        dialect_config = dialect_config.with_auto_warmup(true);
    }

    let runtime = NativeRuntime::global();
    if !dialect_config.auto_warmup {
        // Without warm-up the runtime has to be running before the dialect is built
        runtime.start(dialect_config.search_path.as_deref())?;
    }

    let url = args.connection_url()?;
    let registry = DialectRegistry::with_builtins();
    let engine = create_engine(&registry, &url, &dialect_config, runtime)?;
    let dialect = engine.dialect().clone();
    info!("Inspecting {}", engine.connect_args().dsn);

    let mut catalog = Vec::new();
    for schema in dialect.get_schema_names(engine.connectable()).await? {
        if !args.json {
            println!("SCHEMA::{}", schema);
        }
        let mut tables = Vec::new();
        for table in dialect
            .get_table_names(engine.connectable(), Some(schema.as_str()))
            .await?
        {
            if !args.json {
                println!("{}::{}", schema, table);
            }
            let columns = dialect
                .get_columns(engine.connectable(), &table, Some(schema.as_str()))
                .await?;
            if !args.json {
                for column in &columns {
                    println!("{}::{}::{} ({})", schema, table, column.name, column.column_type);
                }
            }
            tables.push(json!({ "name": table, "columns": columns }));
        }
        catalog.push(json!({ "schema": schema, "tables": tables }));
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&catalog)?);
    }

    if let Ok(version) = dialect.server_version_info() {
        info!("Server version {:?}", version);
    }
    Ok(())
}
