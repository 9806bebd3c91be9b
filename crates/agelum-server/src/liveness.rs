//! Is the preview URL answering, and which process owns its port?

use std::time::Duration;

use reqwest::Url;
use tokio::net::TcpStream;

const HEAD_TIMEOUT: Duration = Duration::from_secs(2);
const CONNECT_TIMEOUT: Duration = Duration::from_millis(800);

fn is_local_host(host: &str) -> bool {
    let h = host.to_ascii_lowercase();
    h == "localhost" || h == "::1" || h == "[::1]" || h.starts_with("127.") || h.ends_with(".local")
}

/// Port of `url` when it is neither 80 nor 443. Those are never probed or
/// signalled since they usually belong to a system service.
pub fn dev_port(url: &str) -> Option<u16> {
    let parsed = Url::parse(url).ok()?;
    let port = parsed.port_or_known_default()?;
    (port != 80 && port != 443).then_some(port)
}

async fn head_ok(url: &str, insecure: bool) -> bool {
    let client = match reqwest::Client::builder()
        .timeout(HEAD_TIMEOUT)
        .danger_accept_invalid_certs(insecure)
        .build()
    {
        Ok(c) => c,
        Err(_) => return false,
    };
    match client.head(url).send().await {
        Ok(resp) => resp.status().as_u16() < 500,
        Err(_) => false,
    }
}

/// HEAD the URL (any status below 500 counts), retrying local hosts without
/// certificate checks. Outside `strict` mode an open TCP port on a dev port
/// also counts.
pub async fn url_alive(url: &str, strict: bool) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if head_ok(url, false).await {
        return true;
    }
    let host = parsed.host_str().unwrap_or_default().to_string();
    if is_local_host(&host) && head_ok(url, true).await {
        return true;
    }
    if strict {
        return false;
    }
    match dev_port(url) {
        Some(port) => port_open(&host, port).await,
        None => false,
    }
}

pub async fn port_open(host: &str, port: u16) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    matches!(
        tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect((host, port))).await,
        Ok(Ok(_))
    )
}

/// PID listening on `port`, via `lsof -ti :<port>`.
pub async fn pid_on_port(port: u16) -> Option<u32> {
    let out = tokio::process::Command::new("lsof")
        .arg("-ti")
        .arg(format!(":{port}"))
        .output()
        .await
        .ok()?;
    String::from_utf8_lossy(&out.stdout)
        .lines()
        .find_map(|l| l.trim().parse().ok())
}
