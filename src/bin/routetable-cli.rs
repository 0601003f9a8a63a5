use clap::{Parser, Subcommand};
use rand::Rng;
use reqwest::{StatusCode, header::CONTENT_TYPE};
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, filter::LevelFilter};

use routetable::api::{DeleteResponse, ErrorResponse};
use routetable::error::{AppError, AppResult, RetryConfig, retry_with_backoff};
use routetable::routes::{RouteRecord, RoutingTable, WireRoute, parser};
use routetable::service::AddRoutesResult;

#[derive(Parser)]
#[command(name = "routetable-cli")]
#[command(about = "Client for the route table server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:50051", env = "RTS_URL")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a single route
    Add {
        #[arg(long)]
        dest: String,
        #[arg(long)]
        mask: String,
        #[arg(long)]
        nh: String,
        #[arg(long, default_value_t = 1)]
        metric: i32,
        #[arg(long, default_value = "eth0")]
        interface: String,
    },
    /// Stream every route in a route file to the server
    AddFile { path: PathBuf },
    /// Stream randomly generated /24 routes
    AddRandom {
        #[arg(short, long, default_value_t = 1)]
        count: usize,
    },
    /// Longest-prefix match for a destination network
    Get {
        #[arg(long)]
        network: String,
        #[arg(long)]
        mask: String,
    },
    /// Longest-prefix match for a single address
    Lookup { address: String },
    /// Route stored under exactly this network and mask
    Exact {
        #[arg(long)]
        network: String,
        #[arg(long)]
        mask: String,
    },
    /// Remove the route stored under this network and mask
    Delete {
        #[arg(long)]
        network: String,
        #[arg(long)]
        mask: String,
    },
    /// Print the server's current routing table
    Table,
    /// Write a route file holding only the default route
    Create {
        #[arg(default_value = "routetable.data")]
        path: PathBuf,
    },
    /// Print the routes in a route file
    Show {
        #[arg(default_value = "routetable.data")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        eprintln!("{}", e.user_message());
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli) -> AppResult<()> {
    let client = reqwest::Client::new();
    let url = cli.url.trim_end_matches('/');

    match cli.command {
        Commands::Add { dest, mask, nh, metric, interface } => {
            let route = WireRoute { dest, mask, nh, metric, interface };
            // Fail locally on addresses the server would reject anyway
            RouteRecord::try_from(route.clone())?;
            print_add_result(&stream_routes(&client, url, vec![route]).await?);
        }
        Commands::AddFile { path } => {
            let table = parser::load_routing_table(&path)?;
            println!("Sending {} route(s) from {}", table.routes.len(), path.display());
            print_add_result(&stream_routes(&client, url, table.routes).await?);
        }
        Commands::AddRandom { count } => {
            let routes = (0..count).map(|_| random_route()).collect();
            print_add_result(&stream_routes(&client, url, routes).await?);
        }
        Commands::Get { network, mask } => {
            let route: RouteRecord = fetch(
                &client,
                reqwest::Method::GET,
                &format!("{}/api/route", url),
                &[("network", network.as_str()), ("mask", mask.as_str())],
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{}/{}", network, mask)))?;
            println!("{}", route);
        }
        Commands::Lookup { address } => {
            let route: RouteRecord = fetch(
                &client,
                reqwest::Method::GET,
                &format!("{}/api/lookup", url),
                &[("address", address.as_str())],
            )
            .await?
            .ok_or_else(|| AppError::NotFound(address.clone()))?;
            println!("{}", route);
        }
        Commands::Exact { network, mask } => {
            let route: RouteRecord = fetch(
                &client,
                reqwest::Method::GET,
                &format!("{}/api/routes/exact", url),
                &[("network", network.as_str()), ("mask", mask.as_str())],
            )
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{}/{}", network, mask)))?;
            println!("{}", route);
        }
        Commands::Delete { network, mask } => {
            let response: Option<DeleteResponse> = fetch(
                &client,
                reqwest::Method::DELETE,
                &format!("{}/api/routes", url),
                &[("network", network.as_str()), ("mask", mask.as_str())],
            )
            .await?;
            match response {
                Some(DeleteResponse { removed: true }) => println!("Removed {}/{}", network, mask),
                _ => println!("No route stored under {}/{}", network, mask),
            }
        }
        Commands::Table => {
            let table: RoutingTable =
                fetch(&client, reqwest::Method::GET, &format!("{}/api/routing-table", url), &[])
                    .await?
                    .ok_or_else(|| AppError::Network("routing table endpoint missing".to_string()))?;
            println!("Routing table of {} at {}", table.hostname, table.timestamp);
            print_routes(&table.routes);
        }
        Commands::Create { path } => {
            let table = RoutingTable::new(vec![default_route()]);
            parser::save_routing_table(&path, &table)?;
            println!("{}", serde_json::to_string_pretty(&table)?);
            println!("Wrote {}", path.display());
        }
        Commands::Show { path } => {
            let table = parser::load_routing_table(&path)?;
            print_routes(&table.routes);
            match table.routes.first() {
                Some(first) => println!("Destination of the first route is: {}", first.dest),
                None => println!("{} holds no routes", path.display()),
            }
        }
    }

    Ok(())
}

/// Send routes as one NDJSON request body, the client side of AddRoutes
async fn stream_routes(
    client: &reqwest::Client,
    url: &str,
    routes: Vec<WireRoute>,
) -> AppResult<AddRoutesResult> {
    let mut lines = Vec::with_capacity(routes.len());
    for route in &routes {
        lines.push(Ok::<String, std::io::Error>(format!("{}\n", serde_json::to_string(route)?)));
    }
    let body = reqwest::Body::wrap_stream(tokio_stream::iter(lines));

    let response = client
        .post(format!("{}/api/routes", url))
        .header(CONTENT_TYPE, "application/x-ndjson")
        .body(body)
        .send()
        .await
        .map_err(|e| AppError::Network(e.to_string()))?;

    let result: AddRoutesResult = check_status(response)
        .await?
        .ok_or_else(|| AppError::Network("route upload endpoint missing".to_string()))?;

    if let Some(reason) = result.interrupted {
        return Err(AppError::TransportInterrupted {
            accepted: result.accepted_count,
            reason,
        });
    }
    Ok(result)
}

/// Idempotent request with retries. A 404 is `Ok(None)`.
async fn fetch<T: DeserializeOwned>(
    client: &reqwest::Client,
    method: reqwest::Method,
    url: &str,
    query: &[(&str, &str)],
) -> AppResult<Option<T>> {
    retry_with_backoff(
        || {
            let request = client.request(method.clone(), url).query(query);
            async move {
                let response = request
                    .send()
                    .await
                    .map_err(|e| AppError::Network(e.to_string()))?;
                check_status(response).await
            }
        },
        &RetryConfig::default(),
        url,
    )
    .await
}

async fn check_status<T: DeserializeOwned>(response: reqwest::Response) -> AppResult<Option<T>> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if status.is_server_error() {
        return Err(AppError::Network(format!("server returned {}", status)));
    }
    if !status.is_success() {
        let message = match response.json::<ErrorResponse>().await {
            Ok(err) => format!("{}: {}", err.error, err.message),
            Err(_) => status.to_string(),
        };
        return Err(AppError::Rejected(message));
    }

    response
        .json::<T>()
        .await
        .map(Some)
        .map_err(|e| AppError::Network(format!("invalid response body: {}", e)))
}

fn print_add_result(result: &AddRoutesResult) {
    println!("Added {} route(s)", result.accepted_count);
    for rejected in &result.rejected {
        match &rejected.route {
            Some(route) => println!(
                "  rejected #{} ({} mask {}): {}",
                rejected.index, route.dest, route.mask, rejected.reason
            ),
            None => println!("  rejected #{}: {}", rejected.index, rejected.reason),
        }
    }
}

fn print_routes(routes: &[WireRoute]) {
    for route in routes {
        match RouteRecord::try_from(route.clone()) {
            Ok(record) => println!("{}", record),
            Err(e) => println!("{:?} (invalid: {})", route, e),
        }
    }
}

fn default_route() -> WireRoute {
    WireRoute {
        dest: "0.0.0.0".to_string(),
        mask: "0.0.0.0".to_string(),
        nh: "10.1.1.1".to_string(),
        metric: 1,
        interface: "eth0".to_string(),
    }
}

/// A /24 with random octets and a next hop derived from them
fn random_route() -> WireRoute {
    let mut rng = rand::thread_rng();
    let a: u8 = rng.gen_range(1..=254);
    let b: u8 = rng.gen_range(1..=254);
    let c: u8 = rng.gen_range(1..=254);

    WireRoute {
        dest: format!("{}.{}.{}.0", a, b, c),
        mask: "255.255.255.0".to_string(),
        nh: format!("{}.{}.{}.1", b, a, c),
        metric: 1,
        interface: "eth0".to_string(),
    }
}
