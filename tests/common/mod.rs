//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::{Arc, Once};

use keel::{Application, Bootstrapper, ConfigStore, HookRegistry};
use tokio::net::TcpListener;

static TRACING: Once = Once::new();

/// Route tracing output through the test harness, honoring `RUST_LOG`.
fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Bootstrap an application over the given config and hooks.
pub async fn bootstrap(config: ConfigStore, hooks: HookRegistry) -> Arc<Application> {
    init_tracing();
    let mut bootstrapper = Bootstrapper::new()
        .with_config(Arc::new(config))
        .with_hooks(Arc::new(hooks));
    bootstrapper.initialize().await.expect("bootstrap failed")
}

/// Serve an application's pipeline on an ephemeral port.
pub async fn serve(app: &Arc<Application>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = app.router();
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service())
            .await
            .unwrap();
    });
    addr
}

/// Client that follows nothing and pools nothing, for deterministic tests.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// A config store with the noisy defaults silenced for tests.
pub fn quiet_config() -> ConfigStore {
    let config = ConfigStore::new();
    config.set("logger", false);
    config
}
