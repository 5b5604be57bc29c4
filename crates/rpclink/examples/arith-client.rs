//! Fire several `Arith.Add` calls concurrently over one connection.
//!
//! Usage: `cargo run --example arith-client -- tcp@127.0.0.1:9999`

use std::time::Duration;

use rpclink::{xdial, Done, Options};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let target = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "tcp@127.0.0.1:9999".to_string());

    let options = Options::default().with_connect_timeout(Duration::from_secs(3));
    let client = xdial(&target, &[options]).await?;
    println!("connected to {target}");

    let mut done = Done::new(5)?;
    for i in 0..5u32 {
        let args = format!("[{i},{}]", i * i);
        client.go("Arith.Add", args, Some(&done)).await;
    }

    for _ in 0..5 {
        let Some(call) = done.recv().await else { break };
        let args = String::from_utf8_lossy(&call.args).into_owned();
        match call.into_result() {
            Ok(reply) => println!("{args} = {}", String::from_utf8_lossy(&reply)),
            Err(err) => println!("{args} failed: {err}"),
        }
    }

    client.close().await?;
    Ok(())
}
