use std::sync::Arc;
use std::time::Duration;

use sms_relay::{
    BridgeRegistry, BridgeSlot, ChangeDetector, ChangeSignal, DeliveryRelay, FileStore,
    InMemorySource, MonitorService, RelayConfig,
};

#[tokio::main]
async fn main() {
    let config = RelayConfig::default()
        .with_poll_interval(Duration::from_secs(60))
        .with_poll_jitter_ms(500)
        .with_env_overrides();

    let store = match FileStore::open("./sms-relay-data").await {
        Ok(store) => Arc::new(store),
        Err(err) => {
            eprintln!("cannot open store: {}", err);
            return;
        }
    };

    let signal = ChangeSignal::new();
    let source = Arc::new(InMemorySource::new().with_signal(signal.clone()));
    let registry = Arc::new(BridgeRegistry::new());
    let slot = Arc::new(BridgeSlot::new(registry, config.bridge_name.clone()));
    let relay = Arc::new(DeliveryRelay::new(&config, slot, store));
    let detector = Arc::new(ChangeDetector::new(&config, source.clone(), relay.clone()));

    let service = MonitorService::new(config, detector, relay.clone(), signal);
    if let Err(err) = service.start().await {
        eprintln!("cannot start service: {}", err);
        return;
    }

    source.insert(Some("+15550100"), Some("hello"), 1_700_000_000_000).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    if let Ok(messages) = relay.message_log().read_all().await {
        for message in messages {
            println!("{} -> {}", message.sender, message.body);
        }
    }

    let _ = service.shutdown().await;
}
