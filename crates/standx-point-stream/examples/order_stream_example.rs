/*
[INPUT]:  STANDX_API_KEY / STANDX_API_SECRET environment variables
[OUTPUT]: Authenticated order, position and balance updates
[POS]:    Examples - authenticated order stream
[UPDATE]: When the auth handshake or StreamClient API changes
*/

use standx_point_stream::standx::{CHANNEL_BALANCE, CHANNEL_ORDER, CHANNEL_POSITION, ORDER_STREAM_URL};
use standx_point_stream::*;
use tokio::time::{Duration, sleep};

/// Example: authenticated order stream
///
/// Every (re)connect signs a fresh auth request before replaying subscriptions.
#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("=== StandX Order Stream Example ===\n");

    let (Ok(api_key), Ok(api_secret)) = (
        std::env::var("STANDX_API_KEY"),
        std::env::var("STANDX_API_SECRET"),
    ) else {
        eprintln!("Set STANDX_API_KEY and STANDX_API_SECRET to run this example");
        return;
    };

    let config = StreamConfig::new(ORDER_STREAM_URL)
        .with_credentials(Credentials::new(api_key, api_secret))
        .with_auth_version(AuthVersion::V2)
        .with_idle_timeout(Duration::from_secs(60));
    let client: StandxStreamClient = match StreamClient::new(config, StandxCodec) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            return;
        }
    };

    client.add_listener(CHANNEL_ORDER, |payload| {
        if let StandxPayload::Order(order) = payload {
            println!(
                "order #{} {} {} {} filled {}/{}",
                order.id, order.symbol, order.side, order.status, order.fill_qty, order.qty
            );
        }
    });
    for channel in [CHANNEL_POSITION, CHANNEL_BALANCE] {
        client.add_listener(channel, move |payload| println!("{channel}: {payload:?}"));
    }

    for channel in [CHANNEL_ORDER, CHANNEL_POSITION, CHANNEL_BALANCE] {
        if let Err(e) = client.subscribe(channel).await {
            eprintln!("Failed to subscribe {}: {}", channel, e);
        }
    }

    let mut states = client.state_watch();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            println!("state -> {:?}", state);
        }
    });

    if let Err(e) = client.open().await {
        eprintln!("Failed to open stream: {}", e);
        return;
    }

    sleep(Duration::from_secs(60)).await;
    client.close().await;
    println!("\n✓ Order stream closed");
}
