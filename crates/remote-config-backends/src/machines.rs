//! Machine address parsing and request failover

use crate::error::{BackendError, BackendResult};
use reqwest::{Response, StatusCode, Url};

/// The validated list of machines a client talks to
///
/// Requests go to the first machine; transport failures fall through to the
/// next one in order.
#[derive(Debug, Clone)]
pub(crate) struct Machines {
    urls: Vec<Url>,
}

impl Machines {
    /// Parse machine addresses, prepending `http://` when no scheme is given
    pub(crate) fn parse(machines: &[String]) -> BackendResult<Self> {
        if machines.is_empty() {
            return Err(BackendError::InvalidEndpoint(
                "no machines configured".to_string(),
            ));
        }

        let urls = machines
            .iter()
            .map(|m| parse_machine(m))
            .collect::<BackendResult<Vec<_>>>()?;

        Ok(Self { urls })
    }

    /// Send a request built against each machine's base URL until one answers
    ///
    /// `build` receives the base URL without a trailing slash.
    pub(crate) async fn send<F>(&self, build: F) -> BackendResult<Response>
    where
        F: Fn(&str) -> reqwest::RequestBuilder,
    {
        let mut last_error = None;

        for url in &self.urls {
            let base = url.as_str().trim_end_matches('/');
            match build(base).send().await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    tracing::debug!(
                        machine = base,
                        error = %e,
                        "Machine unreachable, trying next"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => BackendError::Http(e),
            None => BackendError::InvalidEndpoint("no machines configured".to_string()),
        })
    }
}

fn parse_machine(machine: &str) -> BackendResult<Url> {
    let candidate = if machine.contains("://") {
        machine.to_string()
    } else {
        format!("http://{}", machine)
    };

    let url = Url::parse(&candidate)
        .map_err(|e| BackendError::InvalidEndpoint(format!("{:?}: {}", machine, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(BackendError::InvalidEndpoint(format!(
            "{:?}: unsupported scheme {}",
            machine,
            url.scheme()
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(BackendError::InvalidEndpoint(format!("{:?}: missing host", machine)));
    }

    Ok(url)
}

/// Map 404 to `KeyNotFound` and any other non-success status to `Status`
pub(crate) async fn check_status(response: Response, key: &str) -> BackendResult<Response> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(BackendError::KeyNotFound(key.to_string()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BackendError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_adds_scheme() {
        let machines = Machines::parse(&["127.0.0.1:8500".to_string()]).unwrap();
        assert_eq!(machines.urls[0].as_str(), "http://127.0.0.1:8500/");
    }

    #[test]
    fn test_parse_keeps_https() {
        let machines = Machines::parse(&[
            "https://etcd-0.internal:2379".to_string(),
            "http://etcd-1.internal:2379".to_string(),
        ])
        .unwrap();
        assert_eq!(machines.urls.len(), 2);
        assert_eq!(machines.urls[0].scheme(), "https");
    }

    #[test]
    fn test_parse_rejects_empty_machine() {
        let result = Machines::parse(&["".to_string()]);
        assert!(matches!(result, Err(BackendError::InvalidEndpoint(_))));
    }

    #[test]
    fn test_parse_rejects_empty_list() {
        assert!(matches!(
            Machines::parse(&[]),
            Err(BackendError::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn test_parse_rejects_unknown_scheme() {
        let result = Machines::parse(&["ftp://host:21".to_string()]);
        assert!(matches!(result, Err(BackendError::InvalidEndpoint(msg)) if msg.contains("scheme")));
    }

    #[tokio::test]
    async fn test_send_fails_over_to_next_machine() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::path("/ping"))
            .respond_with(wiremock::ResponseTemplate::new(200))
            .mount(&server)
            .await;

        // Port 9 (discard) is closed on test hosts, so the first machine refuses.
        let machines =
            Machines::parse(&["http://127.0.0.1:9".to_string(), server.uri()]).unwrap();
        let client = reqwest::Client::new();

        let response = machines
            .send(|base| client.get(format!("{}/ping", base)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
