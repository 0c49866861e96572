use std::io::Write;
use std::process::Command;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use url::Url;

use gdrive_core::{OAuthClient, OAuthToken};

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

#[derive(Debug, Error)]
pub enum OAuthFlowError {
    #[error("oauth error: {0}")]
    OAuth(#[from] gdrive_core::OAuthError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("authorization code missing in redirect")]
    MissingCode,
    #[error("authorization timed out")]
    Timeout,
}

/// Interactive login: opens the consent URL in a browser and captures the
/// authorization code on a loopback redirect, with manual code entry as the
/// fallback.
pub struct OAuthFlow {
    client: OAuthClient,
}

impl OAuthFlow {
    pub fn new(client: OAuthClient) -> Self {
        Self { client }
    }

    pub async fn authenticate(&self) -> Result<OAuthToken, OAuthFlowError> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let redirect_uri = format!("http://127.0.0.1:{}/callback", listener.local_addr()?.port());
        let url = self.client.authorize_url(&redirect_uri, DRIVE_SCOPE)?;

        println!("Open this URL in your browser to authorize Drive access:\n{url}");
        open_in_browser(url.as_str());

        let code = if env_flag("SAVEBACKUP_OAUTH_FORCE_MANUAL") {
            read_code_from_stdin()?
        } else {
            match wait_for_redirect_code(listener).await {
                Ok(code) => code,
                Err(err) => {
                    eprintln!(
                        "[savebackup] oauth redirect unavailable ({err}), falling back to manual code entry"
                    );
                    read_code_from_stdin()?
                }
            }
        };

        Ok(self.client.exchange_code(&code, &redirect_uri).await?)
    }
}

async fn wait_for_redirect_code(listener: TcpListener) -> Result<String, OAuthFlowError> {
    let (mut stream, _) = tokio::time::timeout(oauth_timeout(), listener.accept())
        .await
        .map_err(|_| OAuthFlowError::Timeout)??;

    let mut request = vec![0u8; 8192];
    let read = tokio::time::timeout(Duration::from_secs(10), stream.read(&mut request))
        .await
        .map_err(|_| OAuthFlowError::Timeout)??;
    let request_text = String::from_utf8_lossy(&request[..read]);
    let code = extract_code_from_http_request(&request_text).ok_or(OAuthFlowError::MissingCode)?;

    let _ = stream
        .write_all(
            b"HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nConnection: close\r\n\r\n\
            <html><body><h2>Drive access granted</h2><p>You can return to the terminal.</p></body></html>",
        )
        .await;
    let _ = stream.shutdown().await;

    Ok(code)
}

fn read_code_from_stdin() -> Result<String, OAuthFlowError> {
    print!("Enter the authorization code: ");
    std::io::stdout().flush()?;
    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let code = input.trim().to_string();
    if code.is_empty() {
        return Err(OAuthFlowError::MissingCode);
    }
    Ok(code)
}

fn extract_code_from_http_request(request: &str) -> Option<String> {
    let request_line = request.lines().next()?;
    let target = request_line.split_whitespace().nth(1)?;
    let request_url = if target.starts_with("http://") || target.starts_with("https://") {
        Url::parse(target).ok()?
    } else {
        Url::parse(&format!("http://127.0.0.1{target}")).ok()?
    };
    request_url
        .query_pairs()
        .find_map(|(key, value)| (key == "code" && !value.is_empty()).then(|| value.into_owned()))
}

fn open_in_browser(url: &str) {
    let launcher = if cfg!(target_os = "macos") {
        "open"
    } else {
        "xdg-open"
    };
    let _ = Command::new(launcher).arg(url).spawn();
}

fn oauth_timeout() -> Duration {
    let secs = std::env::var("SAVEBACKUP_OAUTH_TIMEOUT_SECS")
        .ok()
        .and_then(|raw| raw.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(180);
    Duration::from_secs(secs)
}

fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|value| {
            matches!(
                value.trim().to_ascii_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_code_from_request_line() {
        let req = "GET /callback?code=abc123&scope=drive HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n";
        assert_eq!(
            extract_code_from_http_request(req).as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn returns_none_when_code_missing() {
        let req = "GET /callback?error=access_denied HTTP/1.1\r\nHost: 127.0.0.1\r\n\r\n";
        assert!(extract_code_from_http_request(req).is_none());
    }

    #[test]
    fn handles_absolute_form_request_targets() {
        let req = "GET http://127.0.0.1:9999/callback?code=xyz HTTP/1.1\r\n\r\n";
        assert_eq!(extract_code_from_http_request(req).as_deref(), Some("xyz"));
    }

    #[test]
    fn unset_env_flag_is_false() {
        assert!(!env_flag("SAVEBACKUP_DOES_NOT_EXIST_456"));
    }

    #[tokio::test]
    async fn loopback_listener_captures_code_and_replies() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let request = tokio::spawn(async move {
            let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(b"GET /callback?code=granted HTTP/1.1\r\nHost: x\r\n\r\n")
                .await
                .unwrap();
            let mut response = String::new();
            stream.read_to_string(&mut response).await.unwrap();
            response
        });

        let code = wait_for_redirect_code(listener).await.unwrap();
        assert_eq!(code, "granted");

        let response = request.await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
    }
}
