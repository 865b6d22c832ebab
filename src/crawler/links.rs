//! Outbound link verification

use crate::storage::BrokenLink;
use reqwest::Client;
use url::Url;

/// Checks whether outbound links are reachable
#[derive(Debug, Clone)]
pub struct LinkChecker {
    client: Client,
}

impl LinkChecker {
    /// Creates a checker around a client built by `build_link_client`
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Checks a single link with HEAD, retrying with GET when HEAD fails to
    /// produce any response
    ///
    /// Returns the broken-link entry when the link is unreachable or answers
    /// with a status of 400 or above.
    pub async fn check(&self, link: &Url) -> Option<BrokenLink> {
        let response = match self.client.head(link.clone()).send().await {
            Ok(response) => Ok(response),
            Err(head_error) => {
                tracing::debug!("HEAD {} failed ({}), retrying with GET", link, head_error);
                self.client.get(link.clone()).send().await
            }
        };

        match response {
            Ok(response) => {
                let status = response.status().as_u16();
                if status >= 400 {
                    tracing::debug!("Broken link {} returned {}", link, status);
                    Some(BrokenLink {
                        url: link.to_string(),
                        status_code: Some(status),
                        error_message: None,
                    })
                } else {
                    None
                }
            }
            Err(e) => {
                tracing::debug!("Broken link {}: {}", link, e);
                Some(BrokenLink {
                    url: link.to_string(),
                    status_code: None,
                    error_message: Some(e.to_string()),
                })
            }
        }
    }

    /// Checks every link in order and collects the broken ones
    pub async fn check_all(&self, links: &[Url]) -> Vec<BrokenLink> {
        let mut broken = Vec::new();
        for link in links {
            if let Some(entry) = self.check(link).await {
                broken.push(entry);
            }
        }
        broken
    }
}
