use {
    axum::{
        Router,
        extract::DefaultBodyLimit,
        routing::{get, post},
    },
    pay_recon::{
        AppState,
        adapters::processor_client::ProcessorClient,
        domain::store::SystemClock,
        infra::memory::{MemoryCustomers, MemoryDispatch, MemoryOrders, MemoryTokens},
        services::{
            authenticator::IncomingEventAuthenticator, payment_methods::PaymentMethodService,
            transactions::TransactionService, worker::run_worker,
        },
    },
    std::{env, sync::Arc, time::Duration},
    tokio::{signal, sync::watch},
    tower_http::timeout::TimeoutLayer,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    dotenvy::dotenv().ok();
    let shared_secret: Arc<str> = env::var("SHARED_SECRET")
        .expect("SHARED_SECRET must be set")
        .into();
    let processor_url = env::var("PROCESSOR_URL").expect("PROCESSOR_URL must be set");
    let processor_api_key = env::var("PROCESSOR_API_KEY").expect("PROCESSOR_API_KEY must be set");
    let tokenization_enabled = env::var("TOKENIZATION_ENABLED")
        .map(|v| v != "0" && v != "false")
        .unwrap_or(true);
    let dispatch_delay_secs: i64 = env::var("WEBHOOK_DISPATCH_DELAY_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(30);
    let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    let clock = Arc::new(SystemClock);
    let gateway = Arc::new(ProcessorClient::new(processor_url, processor_api_key));
    let orders = Arc::new(MemoryOrders::new());
    let customers = Arc::new(MemoryCustomers::new());
    let tokens = Arc::new(MemoryTokens::new());
    let dispatch = Arc::new(MemoryDispatch::new(dispatch_delay_secs, clock.clone()));

    let transactions = Arc::new(TransactionService::new(
        gateway.clone(),
        orders.clone(),
        clock.clone(),
    ));
    let payment_methods = Arc::new(PaymentMethodService::new(
        gateway,
        customers,
        tokens,
        dispatch.clone(),
        tokenization_enabled,
        "pay_recon",
    ));

    let state = AppState {
        authenticator: Arc::new(IncomingEventAuthenticator::new(shared_secret)),
        transactions: transactions.clone(),
        payment_methods: payment_methods.clone(),
        dispatch: dispatch.clone(),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(run_worker(
        dispatch,
        transactions,
        payment_methods,
        shutdown_rx,
    ));

    let app = Router::new()
        .route("/", get(|| async { "ok" }))
        .route("/redirect", post(pay_recon::adapters::http::redirect_handler))
        .route("/webhook", post(pay_recon::adapters::http::webhook_handler))
        .layer(DefaultBodyLimit::max(64 * 1024)) // webhook bodies are small
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind listener");
    tracing::info!("listening on {bind_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    shutdown_tx.send(true).ok();
    worker.await.ok();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to listen for ctrl+c");
    };

    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to listen for SIGTERM")
            .recv()
            .await;
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received ctrl+c, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
