// HTTP client for the remote authority's procedure endpoints

use std::time::Duration;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::domain::Position;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// The remote system of record, reduced to what the sync engine needs.
#[async_trait::async_trait]
pub trait RemoteAuthority: Send + Sync {
    async fn create_highlight(
        &self,
        request: &CreateHighlightRequest,
    ) -> anyhow::Result<RemoteHighlight>;
    async fn delete_highlight(&self, id: &str) -> anyhow::Result<()>;
    async fn save_progress(
        &self,
        book_id: &str,
        position: &Position,
        fraction: f64,
    ) -> anyhow::Result<()>;
    async fn health_check(&self) -> anyhow::Result<()>;
}

#[derive(Clone, Debug)]
pub struct RemoteClient {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl RemoteClient {
    /// Create a new client with the given base URL (e.g. "https://readsync.example").
    pub fn new(base_url: impl Into<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let base_url_str = base_url.into();
        tracing::debug!(base_url = %base_url_str, "creating RemoteClient");
        Ok(RemoteClient {
            base_url: base_url_str.trim_end_matches('/').to_string(),
            api_key: None,
            client,
        })
    }

    /// Return a client with the provided API key set (Bearer)
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = if key.is_empty() { None } else { Some(key) };
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn procedure_url(&self, procedure: &str) -> String {
        self.url(&format!("/trpc/{}", procedure))
    }

    fn auth_header(&self) -> Option<(String, String)> {
        self.api_key
            .as_ref()
            .map(|k| ("Authorization".to_string(), format!("Bearer {}", k)))
    }

    async fn call<I, O>(&self, procedure: &str, input: &I) -> anyhow::Result<O>
    where
        I: Serialize + ?Sized,
        O: DeserializeOwned,
    {
        let url = self.procedure_url(procedure);
        tracing::debug!(%url, "POST procedure");
        let mut req = self.client.post(&url).json(input);
        if let Some((k, v)) = self.auth_header() {
            req = req.header(&k, &v);
        }
        let resp = req.send().await?;
        let status = resp.error_for_status()?;
        let body = status.text().await?;
        parse_envelope(&body)
    }

    /// GET /trpc/healthCheck (no auth required)
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn get_health(&self) -> anyhow::Result<serde_json::Value> {
        let url = self.procedure_url("healthCheck");
        tracing::debug!(%url, "GET health");
        let resp = self.client.get(&url).send().await?;
        let status = resp.error_for_status()?;
        let body = status.text().await?;
        parse_envelope(&body)
    }
}

fn parse_envelope<O: DeserializeOwned>(body: &str) -> anyhow::Result<O> {
    match serde_json::from_str::<Envelope<O>>(body) {
        Ok(parsed) => Ok(parsed.result.data),
        Err(e) => {
            let snippet_len = body.len().min(2000);
            let snippet = body.get(..snippet_len).unwrap_or(body);
            tracing::error!(error = %e, body_snippet = %snippet, "failed to parse procedure response");
            Err(e.into())
        }
    }
}

#[async_trait::async_trait]
impl RemoteAuthority for RemoteClient {
    #[tracing::instrument(level = "debug", skip(self, request), fields(book_id = %request.book_id))]
    async fn create_highlight(
        &self,
        request: &CreateHighlightRequest,
    ) -> anyhow::Result<RemoteHighlight> {
        self.call("highlight.create", request).await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    async fn delete_highlight(&self, id: &str) -> anyhow::Result<()> {
        let _: DeleteHighlightResponse = self
            .call("highlight.delete", &DeleteHighlightRequest { id })
            .await?;
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, position))]
    async fn save_progress(
        &self,
        book_id: &str,
        position: &Position,
        fraction: f64,
    ) -> anyhow::Result<()> {
        let _: serde_json::Value = self
            .call(
                "book.saveProgress",
                &SaveProgressRequest {
                    book_id,
                    position,
                    fraction,
                },
            )
            .await?;
        Ok(())
    }

    async fn health_check(&self) -> anyhow::Result<()> {
        self.get_health().await.map(|_| ())
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    result: EnvelopeResult<T>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeResult<T> {
    data: T,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateHighlightRequest {
    pub book_id: String,
    pub text: String,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_cfi: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteHighlight {
    pub id: String,
    pub text: String,
    pub color: Option<String>,
    #[serde(default)]
    pub start_cfi: Option<String>,
    #[serde(default)]
    pub end_cfi: Option<String>,
    #[serde(default)]
    pub page_number: Option<i32>,
}

#[derive(Debug, Serialize)]
struct DeleteHighlightRequest<'a> {
    id: &'a str,
}

#[derive(Debug, Deserialize)]
struct DeleteHighlightResponse {
    #[allow(dead_code)]
    success: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveProgressRequest<'a> {
    book_id: &'a str,
    position: &'a Position,
    fraction: f64,
}

#[cfg(test)]
mod tests {
    use std::{sync::mpsc, thread};

    use serde_json::json;

    use super::*;

    #[test]
    fn build_procedure_url() {
        let c = RemoteClient::new("https://readsync.example/").unwrap();
        assert_eq!(
            c.procedure_url("highlight.create"),
            "https://readsync.example/trpc/highlight.create"
        );
    }

    #[test]
    fn empty_api_key_sends_no_auth() {
        let c = RemoteClient::new("http://localhost").unwrap().with_api_key("");
        assert!(c.auth_header().is_none());
        let c = c.with_api_key("secret");
        assert_eq!(
            c.auth_header(),
            Some(("Authorization".into(), "Bearer secret".into()))
        );
    }

    #[test]
    fn create_highlight_request_omits_missing_anchors() {
        let req = CreateHighlightRequest {
            book_id: "b1".into(),
            text: "whale".into(),
            color: "blue".into(),
            page_number: None,
            start_cfi: Some("epubcfi(/6/4!/4/2)".into()),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            json!({ "bookId": "b1", "text": "whale", "color": "blue", "startCfi": "epubcfi(/6/4!/4/2)" })
        );
    }

    #[test]
    fn highlight_envelope_deserialize() {
        let body = r#"{"result":{"data":{
            "id":"clx0h1",
            "userId":"u1",
            "bookId":"b1",
            "text":"whale",
            "color":"yellow",
            "startCfi":null,
            "endCfi":null,
            "pageNumber":12,
            "note":null,
            "createdAt":"2025-10-04T18:00:00.000Z"
        }}}"#;
        let h: RemoteHighlight = parse_envelope(body).unwrap();
        assert_eq!(h.id, "clx0h1");
        assert_eq!(h.page_number, Some(12));
        assert_eq!(h.start_cfi, None);
    }

    #[test]
    fn malformed_envelope_is_an_error() {
        assert!(parse_envelope::<RemoteHighlight>(r#"{"error":{"message":"nope"}}"#).is_err());
    }

    /// Serves exactly one request on a loopback port, replying with `status` and `body`.
    fn one_shot_server(
        status: u16,
        body: &'static str,
    ) -> (String, mpsc::Receiver<(String, String, Option<String>)>) {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start stub server");
        let base_url = format!("http://{}", server.server_addr());
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            if let Ok(mut request) = server.recv() {
                let mut payload = String::new();
                let _ = request.as_reader().read_to_string(&mut payload);
                let auth = request
                    .headers()
                    .iter()
                    .find(|h| h.field.equiv("Authorization"))
                    .map(|h| h.value.to_string());
                let _ = tx.send((request.url().to_string(), payload, auth));
                let _ = request.respond(
                    tiny_http::Response::from_string(body)
                        .with_status_code(status)
                        .with_header(
                            "Content-Type: application/json"
                                .parse::<tiny_http::Header>()
                                .unwrap(),
                        ),
                );
            }
        });
        (base_url, rx)
    }

    #[tokio::test]
    async fn save_progress_posts_position_and_fraction() {
        let (base, rx) = one_shot_server(200, r#"{"result":{"data":{"userId":"u1"}}}"#);
        let client = RemoteClient::new(base).unwrap().with_api_key("tok");
        let position = Position::new(json!({ "cfi": "epubcfi(/6/10)", "fraction": 0.5 }));

        client.save_progress("b1", &position, 0.5).await.unwrap();

        let (path, payload, auth) = rx.recv().unwrap();
        assert_eq!(path, "/trpc/book.saveProgress");
        assert_eq!(auth.as_deref(), Some("Bearer tok"));
        let sent: serde_json::Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(
            sent,
            json!({ "bookId": "b1", "position": { "cfi": "epubcfi(/6/10)", "fraction": 0.5 }, "fraction": 0.5 })
        );
    }

    #[tokio::test]
    async fn server_rejection_is_an_error() {
        let (base, _rx) = one_shot_server(404, r#"{"error":{"message":"Highlight not found"}}"#);
        let client = RemoteClient::new(base).unwrap();
        assert!(client.delete_highlight("srv-1").await.is_err());
    }
}
