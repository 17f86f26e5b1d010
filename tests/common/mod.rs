//! Shared harness for integration tests: assembles the full stack against
//! mocks with near-zero timing so suites run fast.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::Once;
use std::time::Duration;

use casa_core::adapters::mock::{
    InMemoryUserStore, MockConnectivityProbe, MockIdentityApi, MockNavigationSurface,
};
use casa_core::navigation::{Navigator, NavigatorConfig};
use casa_core::net::{ConnectivityMonitor, RetryConfig};
use casa_core::token::TokenManager;
use casa_core::traits::LinkState;
use casa_core::{ErrorReporter, SessionConfig, SessionManager, TokenConfig};

static TRACING: Once = Once::new();

/// Route RUST_LOG-filtered tracing output into test captures.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub struct TestStack {
    pub manager: SessionManager,
    pub navigator: Navigator,
    pub store: Arc<InMemoryUserStore>,
    pub identity: Arc<MockIdentityApi>,
    pub probe: Arc<MockConnectivityProbe>,
    pub surface: Arc<MockNavigationSurface>,
    pub net: Arc<ConnectivityMonitor>,
    pub tokens: Arc<TokenManager>,
    pub reporter: ErrorReporter,
}

pub fn fast_token_config() -> TokenConfig {
    TokenConfig {
        cache_ttl: Duration::from_millis(200),
        refresh_backoff_unit: Duration::from_millis(1),
        ..Default::default()
    }
}

pub fn stack(link: LinkState) -> TestStack {
    stack_with_token_config(link, fast_token_config())
}

pub fn stack_with_token_config(link: LinkState, token_config: TokenConfig) -> TestStack {
    init_tracing();

    let reporter = ErrorReporter::default();
    let store = Arc::new(InMemoryUserStore::new());
    let identity = Arc::new(MockIdentityApi::new());
    let probe = Arc::new(MockConnectivityProbe::new(link));

    let net = Arc::new(ConnectivityMonitor::new(
        probe.clone(),
        reporter.clone(),
        RetryConfig {
            backoff: vec![Duration::from_millis(1)],
            poll_interval: Duration::from_millis(1),
            wait_timeout: Duration::from_millis(50),
            ..Default::default()
        },
    ));
    let tokens = Arc::new(TokenManager::new(
        identity.clone(),
        net.clone(),
        reporter.clone(),
        token_config,
    ));

    let navigator = Navigator::new(
        reporter.clone(),
        NavigatorConfig {
            poll_interval: Duration::from_millis(2),
            ready_timeout: Duration::from_millis(200),
            history_limit: 50,
        },
    );
    let surface = Arc::new(MockNavigationSurface::new());
    navigator.attach(surface.clone());

    let manager = SessionManager::new(
        store.clone(),
        identity.clone(),
        tokens.clone(),
        reporter.clone(),
        Some(navigator.clone()),
        SessionConfig {
            error_clear_delay: Duration::from_millis(50),
            login_route: "SignIn".to_string(),
        },
    );

    TestStack {
        manager,
        navigator,
        store,
        identity,
        probe,
        surface,
        net,
        tokens,
        reporter,
    }
}
