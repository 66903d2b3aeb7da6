//! Weather relay binary

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    weather_relay::run().await.map_err(|e| {
        log::error!("Relay failed: {}", e);
        e.into()
    })
}
