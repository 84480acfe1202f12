// Helpers shared by the async tests: in-process stub servers standing in for the collaborators

use axum::Router;
use tokio::net::TcpListener;

/// Serves `app` on an ephemeral localhost port and returns its base URL.
pub async fn spawn_stub(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind stub listener");
    let addr = listener.local_addr().expect("stub local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });
    format!("http://{}", addr)
}
