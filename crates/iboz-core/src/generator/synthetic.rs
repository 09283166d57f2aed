//! Deterministic sample messages for demos and tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use super::MessageGenerator;
use crate::context::Context;
use crate::error::PortResult;
use crate::provider::{AuthState, EmailMessage, Importance, ProviderConfig};

/// Generator that fabricates a fixed set of messages from its inputs.
#[derive(Debug, Default, Clone, Copy)]
pub struct SyntheticGenerator;

impl SyntheticGenerator {
    /// Creates a generator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn build(config: &ProviderConfig, auth: &AuthState, now: DateTime<Utc>) -> Vec<EmailMessage> {
        let with_filters = |first: &str| {
            let mut labels = Vec::with_capacity(config.label_filters.len() + 1);
            labels.push(first.to_string());
            labels.extend(config.label_filters.iter().cloned());
            labels
        };

        let summary = EmailMessage {
            id: "msg-schedule".to_string(),
            subject: format!("{} focus queue summary", title_case(&config.display_name)),
            sender: format!("notifications@{}", config.provider),
            received_at: now - Duration::minutes(45),
            snippet: format!(
                "Automation insights for {}. 3 urgent items need review.",
                config.display_name
            ),
            labels: with_filters("INBOX"),
            importance: Importance::High,
        };

        let escalation = EmailMessage {
            id: "msg-escalation".to_string(),
            subject: "Escalation: Contract signature pending".to_string(),
            sender: "legal-ops@example.com".to_string(),
            received_at: now - Duration::hours(2),
            snippet: format!(
                "Hi {}, procurement is awaiting countersignature from vendor.",
                auth.username
            ),
            labels: with_filters("Escalations"),
            importance: Importance::High,
        };

        let digest = EmailMessage {
            id: "msg-digest".to_string(),
            subject: "Daily automation digest".to_string(),
            sender: "automation-bot@example.com".to_string(),
            received_at: now - Duration::hours(6),
            snippet: format!(
                "{} workflows executed, 12 emails triaged automatically.",
                4 + config.sync_window_hours / 24
            ),
            labels: with_filters("Automation"),
            importance: Importance::Normal,
        };

        vec![summary, escalation, digest]
    }
}

#[async_trait]
impl MessageGenerator for SyntheticGenerator {
    async fn generate(
        &self,
        ctx: &Context,
        config: &ProviderConfig,
        auth: &AuthState,
        now: DateTime<Utc>,
    ) -> PortResult<Vec<EmailMessage>> {
        ctx.check()?;
        Ok(Self::build(config, auth, now))
    }
}

/// Upper-cases the first letter of every space separated word.
fn title_case(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if at_word_start {
            out.extend(ch.to_uppercase());
        } else {
            out.push(ch);
        }
        at_word_start = ch.is_whitespace();
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::PortError;
    use crate::provider::{
        AuthMethod, AuthStatus, ConnectionSettings, Protocol, Provider,
    };
    use chrono::TimeZone;

    fn config() -> ProviderConfig {
        ProviderConfig {
            provider: Provider::Outlook,
            display_name: "ops team".to_string(),
            connection: ConnectionSettings {
                protocol: Protocol::Api,
                host: None,
                port: None,
                use_tls: true,
                api_base_url: None,
            },
            sync_window_hours: 72,
            label_filters: vec!["Urgent".to_string(), "Vendors".to_string()],
        }
    }

    fn auth() -> AuthState {
        AuthState {
            method: AuthMethod::OAuth,
            username: "ops@example.com".to_string(),
            status: AuthStatus::Connected,
            updated_at: Utc.with_ymd_and_hms(2024, 2, 1, 8, 0, 0).unwrap(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 12, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn generates_three_messages() {
        let messages = SyntheticGenerator
            .generate(&Context::new(), &config(), &auth(), now())
            .await
            .unwrap();

        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].subject, "Ops Team focus queue summary");
        assert_eq!(messages[0].sender, "notifications@outlook");
        assert_eq!(messages[0].labels, vec!["INBOX", "Urgent", "Vendors"]);
        assert_eq!(messages[0].received_at, now() - Duration::minutes(45));
        assert!(messages[1].snippet.contains("ops@example.com"));
        assert_eq!(messages[1].labels[0], "Escalations");
        assert_eq!(
            messages[2].snippet,
            "7 workflows executed, 12 emails triaged automatically."
        );
        assert_eq!(messages[2].importance, Importance::Normal);
    }

    #[tokio::test]
    async fn is_deterministic() {
        let ctx = Context::new();
        let a = SyntheticGenerator
            .generate(&ctx, &config(), &auth(), now())
            .await
            .unwrap();
        let b = SyntheticGenerator
            .generate(&ctx, &config(), &auth(), now())
            .await
            .unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn honors_cancellation() {
        let ctx = Context::new();
        ctx.cancel();
        let err = SyntheticGenerator
            .generate(&ctx, &config(), &auth(), now())
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Cancelled(_)));
    }

    #[test]
    fn title_case_words() {
        assert_eq!(title_case("ops mail"), "Ops Mail");
        assert_eq!(title_case("Ops"), "Ops");
        assert_eq!(title_case("élan vital"), "Élan Vital");
    }
}
