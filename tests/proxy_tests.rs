// tests/proxy_tests.rs
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use tcplb::frontend::{Frontend, ServeExit};
use tcplb::metrics::{MetricsCollector, MetricsRegistry};
use tcplb::strategy::{create_strategy, StrategyKind};

const WAIT: Duration = Duration::from_secs(5);

fn collector() -> Arc<MetricsCollector> {
    MetricsRegistry::new().unwrap().collector()
}

fn new_frontend(app_id: &str) -> Arc<Frontend> {
    Arc::new(Frontend::new(
        app_id.to_string(),
        0,
        create_strategy(StrategyKind::RoundRobin),
        collector(),
    ))
}

/// Echoes every byte it receives, one task per connection.
async fn spawn_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut read, mut write) = socket.split();
                let _ = tokio::io::copy(&mut read, &mut write).await;
            });
        }
    });
    addr
}

/// Writes its banner on every accepted connection, then closes it.
async fn spawn_banner_backend(banner: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            tokio::spawn(async move {
                let _ = socket.write_all(banner.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    addr
}

async fn read_banner(addr: SocketAddr) -> String {
    let mut client = TcpStream::connect(addr).await.unwrap();
    let mut banner = String::new();
    timeout(WAIT, client.read_to_string(&mut banner))
        .await
        .unwrap()
        .unwrap();
    banner
}

#[tokio::test]
async fn proxies_bytes_in_both_directions_until_the_client_closes() {
    let frontend = new_frontend("/echo-app");
    let listener = frontend.bind().await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(frontend.clone().serve(listener));

    let echo = spawn_echo_backend().await;
    frontend.add_backend(&echo.to_string()).await;

    let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    client.write_all(b"ping").await.unwrap();

    let mut reply = [0u8; 4];
    timeout(WAIT, client.read_exact(&mut reply))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(b"ping", &reply);

    // Closing our write side ends the client->backend relay; the proxy
    // must tear down the whole connection within a bounded time.
    client.shutdown().await.unwrap();
    let mut rest = Vec::new();
    let n = timeout(WAIT, client.read_to_end(&mut rest))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(0, n);

    frontend.stop();
}

#[tokio::test]
async fn alternates_between_backends_round_robin() {
    let frontend = new_frontend("/banner-app");
    let listener = frontend.bind().await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
    tokio::spawn(frontend.clone().serve(listener));

    let one = spawn_banner_backend("one").await;
    let two = spawn_banner_backend("two").await;
    frontend.add_backend(&one.to_string()).await;
    frontend.add_backend(&two.to_string()).await;

    assert_eq!("one", read_banner(addr).await);
    assert_eq!("two", read_banner(addr).await);
    assert_eq!("one", read_banner(addr).await);

    frontend.stop();
}

#[tokio::test]
async fn stop_closes_the_listener_but_not_in_flight_connections() {
    let frontend = new_frontend("/stoppable-app");
    let listener = frontend.bind().await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(frontend.clone().serve(listener));

    let echo = spawn_echo_backend().await;
    frontend.add_backend(&echo.to_string()).await;

    // Establish the proxied connection before stopping
    let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    client.write_all(b"before-stop").await.unwrap();
    let mut reply = [0u8; 11];
    timeout(WAIT, client.read_exact(&mut reply))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(b"before-stop", &reply);

    frontend.stop();
    tokio::time::sleep(Duration::from_millis(100)).await;

    // New connections are refused once the listener is gone
    assert!(TcpStream::connect(("127.0.0.1", port)).await.is_err());

    // The in-flight connection keeps working
    client.write_all(b"after-stop").await.unwrap();
    let mut reply = [0u8; 10];
    timeout(WAIT, client.read_exact(&mut reply))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(b"after-stop", &reply);
}

#[tokio::test]
async fn serve_reports_a_deliberate_stop_as_normal_shutdown() {
    let frontend = new_frontend("/quiet-app");
    let listener = frontend.bind().await.unwrap();
    let handle = tokio::spawn(frontend.clone().serve(listener));

    frontend.stop();
    let exit = timeout(WAIT, handle).await.unwrap().unwrap();
    assert_eq!(ServeExit::Stopped, exit);
}

// accept(2) on a socket that was never put into the listening state fails
// immediately.
#[cfg(unix)]
fn broken_listener() -> TcpListener {
    use std::os::fd::{FromRawFd, IntoRawFd};

    let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let stream = std::net::TcpStream::connect(probe.local_addr().unwrap()).unwrap();
    let raw = unsafe { std::net::TcpListener::from_raw_fd(stream.into_raw_fd()) };
    raw.set_nonblocking(true).unwrap();
    TcpListener::from_std(raw).unwrap()
}

#[cfg(unix)]
#[tokio::test]
async fn serve_reports_an_unexpected_listener_failure() {
    let frontend = new_frontend("/broken-app");
    let exit = timeout(WAIT, frontend.clone().serve(broken_listener()))
        .await
        .unwrap();
    assert_eq!(ServeExit::Failed, exit);
}

#[tokio::test]
async fn dial_failure_affects_only_that_connection() {
    // Grab a port that nothing listens on
    let unused = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = unused.local_addr().unwrap();
    drop(unused);

    let frontend = new_frontend("/flaky-app");
    let listener = frontend.bind().await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(frontend.clone().serve(listener));

    frontend.add_backend(&dead_addr.to_string()).await;

    // The connection against the dead backend is closed without payload
    let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    let mut buf = Vec::new();
    let n = timeout(WAIT, client.read_to_end(&mut buf))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(0, n);

    // The frontend is unaffected: swap in a live backend and traffic flows
    frontend.remove_backend(&dead_addr.to_string()).await;
    let echo = spawn_echo_backend().await;
    frontend.add_backend(&echo.to_string()).await;

    let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
    client.write_all(b"ping").await.unwrap();
    let mut reply = [0u8; 4];
    timeout(WAIT, client.read_exact(&mut reply))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(b"ping", &reply);

    frontend.stop();
}
