use clap::Parser;

/// Command line arguments
#[derive(Parser, Debug)]
#[clap(name = "neo4j-inspect")]
#[clap(about = "List the schemas, tables and columns of a Neo4j store")]
pub struct Args {
    /// Full connection URL; overrides the individual connection flags
    #[clap(long, env = "NEOJDBC_URL", help = "Connection URL (neo4j+jdbc://host:port/db?PWD=..)")]
    pub url: Option<String>,

    #[clap(long, env = "NEOJDBC_HOST", default_value = "127.0.0.1", help = "Server host")]
    pub host: String,

    #[clap(long, env = "NEOJDBC_PORT", default_value_t = 7687, help = "Bolt port")]
    pub port: u16,

    #[clap(long, env = "NEOJDBC_USER", default_value = "neo4j", help = "User name")]
    pub user: String,

    #[clap(long, env = "NEOJDBC_PASSWORD", help = "Password", hide_env_values = true)]
    pub password: Option<String>,

    #[clap(long, default_value = "neo4j", help = "Database to inspect")]
    pub database: String,

    /// Driver log level passed through as `LogLevel`
    #[clap(long, default_value_t = 2, help = "Driver log level (0-6)")]
    pub log_level: u8,

    #[clap(long, help = "Print the catalog as JSON")]
    pub json: bool,

    /// Leave starting the driver runtime to the dialect
    #[clap(long, help = "Start the driver runtime on first use (same as NEOJDBC_WARMUP)")]
    pub warmup: bool,
}

impl Args {
    /// Connection URL from `--url` or built from the individual flags
    pub fn connection_url(&self) -> anyhow::Result<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        let password = self
            .password
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("a password is required (--password or NEOJDBC_PASSWORD)"))?;

        Ok(format!(
            "neo4j+jdbc://{}:{}/{}?PWD={}&UID={}&LogLevel={}&StrictlyUseBoltScheme=false",
            self.host,
            self.port,
            urlencoding::encode(&self.database),
            urlencoding::encode(password),
            urlencoding::encode(&self.user),
            self.log_level,
        ))
    }
}
