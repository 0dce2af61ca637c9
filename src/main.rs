use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use proxy_probe::{
    logging,
    proxy::{CheckerConfig, ProxyChecker, ProxyParser, ProxyTarget, ProxyType},
    server, Config, DEFAULT_PORT,
};
use std::path::PathBuf;
use std::time::Duration;

/// Live HTTP/HTTPS/SOCKS4/SOCKS5 proxy verification
#[derive(Parser)]
#[command(name = "proxy-probe", version)]
#[command(about = "Verify proxies end to end and geolocate their egress IP")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level for this crate when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API (default)
    Serve {
        /// Address to bind
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, env = "PORT", default_value_t = DEFAULT_PORT)]
        port: u16,
        /// Directory with static files to serve alongside the API
        #[arg(long)]
        static_dir: Option<PathBuf>,
        /// Timeout in seconds for every network operation
        #[arg(long, default_value = "10")]
        timeout: u64,
    },
    /// Check proxies given as arguments or in a file
    Check {
        /// Proxies as IP:PORT or scheme://IP:PORT
        proxies: Vec<String>,
        /// File containing proxies, one per line
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Proxy type for entries without a scheme (http, https, socks4, socks5)
        #[arg(short = 't', long = "type", default_value = "http")]
        proxy_type: String,
        /// Timeout in seconds
        #[arg(long, default_value = "10")]
        timeout: u64,
        /// Maximum number of proxies checked at the same time
        #[arg(short = 'c', long, default_value = "50")]
        concurrency: usize,
        /// URL to test HTTP proxies against
        #[arg(long, default_value = "http://httpbin.org/ip")]
        test_url: String,
        /// Print results as JSON lines
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    match cli.command {
        None => server::serve(&Config::from_env()).await?,
        Some(Commands::Serve {
            host,
            port,
            static_dir,
            timeout,
        }) => {
            let config = Config {
                host,
                port,
                static_dir,
                checker: CheckerConfig::new().with_timeout(Duration::from_secs(timeout)),
            };
            server::serve(&config).await?;
        }
        Some(Commands::Check {
            proxies,
            file,
            proxy_type,
            timeout,
            concurrency,
            test_url,
            json,
        }) => {
            let ptype: ProxyType = proxy_type.parse()?;
            let targets = collect_targets(&proxies, file.as_ref(), ptype)?;
            if targets.is_empty() {
                return Err(anyhow!("No proxies to check"));
            }

            let config = CheckerConfig::new()
                .with_timeout(Duration::from_secs(timeout))
                .with_test_url(test_url)
                .with_concurrency(concurrency);
            let checker = ProxyChecker::with_config(config)?;

            if !json {
                println!("Checking {} proxies, timeout: {}s", targets.len(), timeout);
                println!();
            }

            let results = checker.verify_all(&targets).await;
            let working = results.iter().filter(|r| r.is_working()).count();

            for (target, result) in targets.iter().zip(&results) {
                if json {
                    let line = serde_json::json!({ "proxy": target.to_string(), "result": result });
                    println!("{}", line);
                } else if let (true, Some(ip), Some(geo)) =
                    (result.working, &result.egress_ip, &result.geo)
                {
                    println!(
                        "  ✓ {} ({}ms) egress {} [{}]",
                        target,
                        result.response_time_millis,
                        ip,
                        geo.short_display()
                    );
                } else {
                    println!("  ✗ {}", target);
                }
            }

            if !json {
                println!(
                    "\nResults: {} working, {} failed",
                    working,
                    results.len() - working
                );
            }
        }
    }

    Ok(())
}

fn collect_targets(
    proxies: &[String],
    file: Option<&PathBuf>,
    ptype: ProxyType,
) -> Result<Vec<ProxyTarget>> {
    let mut targets = Vec::new();

    for line in proxies {
        let target = ProxyParser::parse_line(line, ptype)
            .ok_or_else(|| anyhow!("Invalid proxy: {}", line))?;
        targets.push(target);
    }

    if let Some(path) = file {
        let parsed = ProxyParser::parse_file(path, ptype)?;
        eprintln!("Loaded {} proxies from {:?}", parsed.len(), path);
        targets.extend(parsed);
    }

    Ok(targets)
}
