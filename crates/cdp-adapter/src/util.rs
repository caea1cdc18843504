use anyhow::{anyhow, Result};
use chromiumoxide::async_process::Child;
use futures::io::{AsyncBufReadExt, BufReader};
use futures::stream::StreamExt;
use tokio::time::{timeout, Duration};

/// Reads Chromium's stderr until it announces the DevTools websocket endpoint.
pub async fn extract_ws_url(child: &mut Child, wait: Duration) -> Result<String> {
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("chromium process missing stderr handle"))?;
    let mut lines = BufReader::new(stderr).lines();
    let mut captured = Vec::new();

    let reader = async {
        while let Some(line) = lines.next().await {
            let line = line?;
            if let Some(ws) = parse_ws_line(&line) {
                return Ok(ws);
            }
            captured.push(line);
        }
        Err(anyhow!(
            "chromium exited before exposing devtools websocket url. stderr preview: {}",
            captured
                .iter()
                .take(8)
                .cloned()
                .collect::<Vec<_>>()
                .join(" | ")
        ))
    };

    timeout(wait, reader)
        .await
        .map_err(|_| anyhow!("timed out waiting for chromium devtools websocket url"))?
}

/// `DevTools listening on ws://.../devtools/browser/<id>` -> the websocket url.
pub fn parse_ws_line(line: &str) -> Option<String> {
    let (_, ws) = line.rsplit_once("listening on ")?;
    let ws = ws.trim();
    (ws.starts_with("ws") && ws.contains("devtools/browser")).then(|| ws.to_string())
}

#[cfg(test)]
mod tests {
    use super::parse_ws_line;

    #[test]
    fn picks_browser_endpoint_only() {
        assert_eq!(
            parse_ws_line("DevTools listening on ws://127.0.0.1:9222/devtools/browser/abc "),
            Some("ws://127.0.0.1:9222/devtools/browser/abc".to_string())
        );
        assert_eq!(parse_ws_line("listening on ws://127.0.0.1:9222/devtools/page/1"), None);
        assert_eq!(parse_ws_line("[0101/000000.000:ERROR] something else"), None);
    }
}
