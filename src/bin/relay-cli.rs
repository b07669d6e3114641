use clap::Parser;

use front_relay::client::{header_block, TunnelClient};

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Send one request through a front relay", long_about = None)]
struct Cli {
    /// Tunnel endpoint of the relay.
    #[arg(short, long, default_value = "http://localhost:8080/2/")]
    relay: String,

    /// Inner request method.
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,

    /// Inner request header, `Key: Value`. Repeatable.
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Inner request body.
    #[arg(short, long, default_value = "")]
    data: String,

    /// Absolute URL of the inner request.
    url: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut headers: Vec<(&str, &str)> = Vec::new();
    for raw in &cli.headers {
        match raw.split_once(':') {
            Some((key, value)) => headers.push((key.trim(), value.trim())),
            None => return Err(format!("header {:?} is not `Key: Value`", raw).into()),
        }
    }
    if let Some(host) = url_host(&cli.url) {
        if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("host")) {
            headers.push(("Host", host));
        }
    }

    let block = header_block(&cli.method, &cli.url, headers);
    let client = TunnelClient::new(cli.relay);
    let response = client.send(&block, cli.data.as_bytes()).await?;

    eprintln!("{} {} {}", response.protocol, response.status, response.reason);
    for (key, value) in &response.headers {
        eprintln!("{}: {}", key, value);
    }
    println!("{}", String::from_utf8_lossy(&response.body));

    if response.status >= 400 {
        std::process::exit(1);
    }
    Ok(())
}

fn url_host(url: &str) -> Option<&str> {
    let rest = url.split_once("://")?.1;
    let authority = rest.split(['/', '?', '#']).next()?;
    Some(authority.rsplit_once('@').map_or(authority, |(_, host)| host)).filter(|h| !h.is_empty())
}
