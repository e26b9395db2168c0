/*
[INPUT]:  Symbol identifier (e.g., "BTC-USD")
[OUTPUT]: Live price and depth book updates printed to stdout
[POS]:    Examples - public market stream
[UPDATE]: When the StreamClient API changes
*/

use standx_point_stream::standx::MARKET_STREAM_URL;
use standx_point_stream::*;
use tokio::time::{Duration, sleep};

/// Example: public market data with automatic reconnect
///
/// Subscriptions registered here are replayed on every reconnect.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== StandX Market Stream Example ===\n");

    let config = StreamConfig::new(MARKET_STREAM_URL).with_ping_interval(Duration::from_secs(10));
    let client: StandxStreamClient = match StreamClient::new(config, StandxCodec) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return;
        }
    };

    let symbol = "BTC-USD";
    let price_topic = Topic::price(symbol).to_string();
    let depth_topic = Topic::depth_book(symbol).to_string();

    client.add_listener(&price_topic, |payload| {
        if let StandxPayload::Price(price) = payload {
            println!("price  {} mark={} last={}", price.symbol, price.mark_price, price.last_price);
        }
    });
    client.add_listener(&depth_topic, |payload| {
        if let StandxPayload::DepthBook(book) = payload {
            println!(
                "depth  {} bid={} ask={}",
                book.symbol,
                book.best_bid().unwrap_or("-"),
                book.best_ask().unwrap_or("-")
            );
        }
    });

    for topic in [&price_topic, &depth_topic] {
        if let Err(e) = client.subscribe(topic.as_str()).await {
            eprintln!("Failed to subscribe {}: {}", topic, e);
        }
    }

    if let Err(e) = client.open().await {
        eprintln!("Failed to open stream: {}", e);
        return;
    }
    println!("✓ Connected, streaming for 30 seconds...\n");

    sleep(Duration::from_secs(30)).await;

    client.close().await;
    println!("\n✓ Stream closed after {} connection(s)", client.connection_count());
}
