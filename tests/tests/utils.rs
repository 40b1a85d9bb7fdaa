use mock_service::{Faults, MockNotes, PASSWORD, USERNAME};
use notesload::client::http_client;
use notesload::{ApiClient, MetricsCollector};
use notesload_core::{Credentials, LoadTestConfig, TargetConfig, DEFAULT_REQUEST_TIMEOUT};
use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::error;
use tracing_subscriber::FmtSubscriber;

/// Install a subscriber once per test binary. Not for binaries using `#[traced_test]`.
#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = FmtSubscriber::builder()
            .with_env_filter("notesload=debug,notesload_runtime=debug,mock_service=debug")
            .with_test_writer()
            .try_init();
    });
}

#[allow(unused)]
pub fn target(addr: SocketAddr) -> TargetConfig {
    TargetConfig::new(
        format!("http://{addr}").parse().unwrap(),
        Credentials::new(USERNAME, PASSWORD),
    )
}

/// Start a mock notes API and a client pointed at it.
#[allow(unused)]
pub async fn mock_client(faults: Faults) -> (ApiClient, Arc<MockNotes>, Arc<MetricsCollector>) {
    mock_client_with_timeout(faults, DEFAULT_REQUEST_TIMEOUT).await
}

/// Like [`mock_client`], with requests cut off after `request_timeout`.
#[allow(unused)]
pub async fn mock_client_with_timeout(
    faults: Faults,
    request_timeout: Duration,
) -> (ApiClient, Arc<MockNotes>, Arc<MetricsCollector>) {
    let (addr, mock) = mock_service::spawn(faults).await.unwrap();
    let metrics = Arc::new(MetricsCollector::new());

    let mut config = LoadTestConfig::new(target(addr));
    config.request_timeout = request_timeout;
    let client = ApiClient::new(&config.target, metrics.clone())
        .unwrap()
        .with_http_client(http_client(&config).unwrap());

    (client, mock, metrics)
}
