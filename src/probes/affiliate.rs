use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use tracing::{instrument, trace, warn};

use crate::{Comparison, HealthMetric};

use super::{Probe, ProbeContext};

/// Status codes accepted from an outbound affiliate link.
///
/// Affiliate targets routinely answer with a redirect; 301/302 count as
/// working just like a plain 200.
const ACCEPTABLE_STATUS: [u16; 3] = [200, 301, 302];

/// Samples configured outbound links and reports the working percentage.
///
/// Links are absolute URLs pointing at third parties, so this probe does
/// not go through the site's base URL.
pub struct AffiliateLinksProbe {
    links: Vec<String>,
    threshold: f64,
}

impl AffiliateLinksProbe {
    pub fn new(links: Vec<String>, threshold: f64) -> Self {
        Self { links, threshold }
    }

    async fn check_link(&self, cx: &ProbeContext, link: &str) -> bool {
        // HEAD keeps the sample cheap; only the link's own status code
        // matters, so redirects are reported, not followed
        match cx.redirect_client.head(link).send().await {
            Ok(response) => {
                let code = response.status().as_u16();
                let ok = ACCEPTABLE_STATUS.contains(&code);
                trace!("{link}: status {code}, working: {ok}");
                ok
            }
            Err(e) => {
                warn!("{link}: request failed: {e}");
                false
            }
        }
    }
}

#[async_trait]
impl Probe for AffiliateLinksProbe {
    fn name(&self) -> &'static str {
        "affiliate_links"
    }

    #[instrument(skip_all)]
    async fn run(&self, cx: &ProbeContext) -> HealthMetric {
        if self.links.is_empty() {
            return self.worst_case(Utc::now());
        }

        let results = join_all(self.links.iter().map(|link| self.check_link(cx, link))).await;

        let working = results.iter().filter(|ok| **ok).count();
        let percentage = 100.0 * working as f64 / results.len() as f64;

        HealthMetric::measured(self.name(), percentage, self.threshold, Comparison::AtLeast)
    }

    fn worst_case(&self, now: DateTime<Utc>) -> HealthMetric {
        HealthMetric::failed(self.name(), 0.0, self.threshold, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Severity;
    use crate::config::MonitorConfig;
    use std::sync::Arc;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn context() -> ProbeContext {
        let config: MonitorConfig = serde_json::from_value(serde_json::json!({
            "base_url": "https://example.com",
        }))
        .unwrap();
        ProbeContext::new(Arc::new(config)).unwrap()
    }

    #[tokio::test]
    async fn test_redirects_count_as_working() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/moved"))
            .respond_with(ResponseTemplate::new(301))
            .mount(&server)
            .await;

        let cx = context().await;
        let probe = AffiliateLinksProbe::new(
            vec![
                format!("{}/ok", server.uri()),
                format!("{}/moved", server.uri()),
            ],
            80.0,
        );
        let metric = probe.run(&cx).await;

        assert_eq!(metric.value, 100.0);
        assert_eq!(metric.status, Severity::Healthy);
    }

    #[tokio::test]
    async fn test_redirect_is_judged_by_its_own_status() {
        let server = MockServer::start().await;
        // tracking endpoints often reject HEAD outright
        Mock::given(method("HEAD"))
            .and(path("/track"))
            .respond_with(ResponseTemplate::new(405))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/out"))
            .respond_with(
                ResponseTemplate::new(302)
                    .insert_header("Location", format!("{}/track", server.uri())),
            )
            .mount(&server)
            .await;

        let cx = context().await;
        let probe = AffiliateLinksProbe::new(vec![format!("{}/out", server.uri())], 80.0);
        let metric = probe.run(&cx).await;

        assert_eq!(metric.value, 100.0);
        assert_eq!(metric.status, Severity::Healthy);
    }

    #[tokio::test]
    async fn test_dead_links_degrade_the_score() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("HEAD"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(410))
            .mount(&server)
            .await;

        let cx = context().await;
        let probe = AffiliateLinksProbe::new(
            vec![
                format!("{}/ok", server.uri()),
                format!("{}/gone", server.uri()),
            ],
            80.0,
        );
        let metric = probe.run(&cx).await;

        assert_eq!(metric.value, 50.0);
        assert_eq!(metric.status, Severity::Warning);
    }
}
