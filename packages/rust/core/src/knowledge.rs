//! Knowledge retrieval: similarity search first, substring match second.

use std::time::Duration;

use async_trait::async_trait;
use letterpress_shared::{KnowledgeSnippet, LetterpressError, Result};
use letterpress_storage::Storage;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};
use url::Url;

const QUERY_TIMEOUT_SECS: u64 = 15;

/// The similarity-search collaborator contract.
#[async_trait]
pub trait KnowledgeSearch: Send + Sync {
    async fn query(
        &self,
        text: &str,
        organization_id: &str,
        limit: u32,
    ) -> Result<Vec<KnowledgeSnippet>>;
}

// ---------------------------------------------------------------------------
// HTTP collaborator
// ---------------------------------------------------------------------------

/// POSTs `{query, organization_id, limit}` to `<endpoint>/query`.
pub struct HttpKnowledgeSearch {
    client: Client,
    endpoint: Url,
}

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
    organization_id: &'a str,
    limit: u32,
}

/// The service may answer with a bare list or `{ "results": [...] }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum QueryResponse {
    Bare(Vec<KnowledgeSnippet>),
    Wrapped { results: Vec<KnowledgeSnippet> },
}

impl HttpKnowledgeSearch {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| LetterpressError::config(format!("invalid knowledge endpoint: {e}")))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(QUERY_TIMEOUT_SECS))
            .build()
            .map_err(|e| LetterpressError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl KnowledgeSearch for HttpKnowledgeSearch {
    async fn query(
        &self,
        text: &str,
        organization_id: &str,
        limit: u32,
    ) -> Result<Vec<KnowledgeSnippet>> {
        let url = format!("{}/query", self.endpoint.as_str().trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&QueryBody {
                query: text,
                organization_id,
                limit,
            })
            .send()
            .await
            .map_err(|e| LetterpressError::Network(format!("{url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LetterpressError::Network(format!("{url}: HTTP {status}")));
        }

        let parsed: QueryResponse = response
            .json()
            .await
            .map_err(|e| LetterpressError::parse(format!("{url}: {e}")))?;

        let mut snippets = match parsed {
            QueryResponse::Bare(list) => list,
            QueryResponse::Wrapped { results } => results,
        };
        snippets.truncate(limit as usize);
        Ok(snippets)
    }
}

// ---------------------------------------------------------------------------
// Retrieval with fallback
// ---------------------------------------------------------------------------

/// Query the collaborator, fall back to a substring match over stored items,
/// and return an empty list if both fail.
#[instrument(skip_all, fields(org = organization_id, limit))]
pub async fn retrieve_knowledge(
    search: Option<&dyn KnowledgeSearch>,
    storage: &Storage,
    text: &str,
    organization_id: &str,
    limit: u32,
) -> Vec<KnowledgeSnippet> {
    if let Some(search) = search {
        match search.query(text, organization_id, limit).await {
            Ok(snippets) if !snippets.is_empty() => {
                debug!(count = snippets.len(), "similarity search hit");
                return snippets;
            }
            Ok(_) => debug!("similarity search returned nothing, trying substring match"),
            Err(e) => warn!(error = %e, "similarity search failed, trying substring match"),
        }
    }

    match storage.search_knowledge(organization_id, text, limit).await {
        Ok(items) => items.into_iter().map(KnowledgeSnippet::from).collect(),
        Err(e) => {
            warn!(error = %e, "knowledge substring search failed");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use letterpress_shared::KnowledgeItem;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn storage_with_item(title: &str, content: &str) -> Storage {
        let tmp = std::env::temp_dir().join(format!("lp_test_{}.db", Uuid::now_v7()));
        let storage = Storage::open(&tmp).await.expect("open");
        storage
            .insert_knowledge_item(&KnowledgeItem {
                id: Uuid::now_v7().to_string(),
                organization_id: "acme".into(),
                title: title.into(),
                content: content.into(),
                created_at: Utc::now(),
            })
            .await
            .expect("insert");
        storage
    }

    #[tokio::test]
    async fn http_search_parses_wrapped_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_partial_json(serde_json::json!({ "organization_id": "acme", "limit": 2 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [
                    { "title": "Telehealth policy", "content": "Remote consults." },
                    { "title": "Staffing", "content": "Night shifts." },
                    { "title": "Extra", "content": "Over the limit." }
                ]
            })))
            .mount(&server)
            .await;

        let search = HttpKnowledgeSearch::new(&server.uri()).expect("search");
        let snippets = search.query("telehealth", "acme", 2).await.expect("query");
        assert_eq!(snippets.len(), 2);
        assert_eq!(snippets[0].title, "Telehealth policy");
    }

    #[tokio::test]
    async fn collaborator_failure_falls_back_to_substring() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let storage = storage_with_item("Healthcare FAQ", "Our AI in Healthcare program.").await;
        let search = HttpKnowledgeSearch::new(&server.uri()).expect("search");
        let snippets =
            retrieve_knowledge(Some(&search), &storage, "ai in healthcare", "acme", 5).await;
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].title, "Healthcare FAQ");
    }

    #[tokio::test]
    async fn no_match_anywhere_is_empty() {
        let storage = storage_with_item("Parking", "Lot B.").await;
        let snippets = retrieve_knowledge(None, &storage, "quantum computing", "acme", 5).await;
        assert!(snippets.is_empty());
    }
}
