use crf_line_planner::api::router;

#[tokio::main]
async fn main() {
    env_logger::init();

    let addr = std::env::var("CRF_LINE_PLANNER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .unwrap_or_else(|e| panic!("could not bind {addr}: {e}"));
    log::info!("listening on {addr}");

    axum::serve(listener, router())
        .await
        .unwrap_or_else(|e| panic!("server error: {e}"));
}
