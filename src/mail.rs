//! Invitation delivery.
//!
//! The lifecycle only hands structured invitation data to a [`Mailer`];
//! [`HttpMailer`] delivers it through a transactional email HTTP API.

use chrono::DateTime;
use chrono_tz::Tz;
use reqwest::{Client, Url};
use serde::Serialize;
use thiserror::Error;

use crate::model::db::TokenId;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("mail service rejected the message with status {0}")]
    Rejected(u16),
}

/// Something that can deliver an email.
#[rocket::async_trait]
pub trait Mailer: Send + Sync {
    /// Send a message. Returns `Ok` only once the service has accepted it.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), DeliveryError>;
}

/// A [`Mailer`] backed by a JSON email API authenticated with a bearer key.
pub struct HttpMailer {
    client: Client,
    endpoint: Url,
    api_key: String,
    from: String,
}

#[derive(Serialize)]
struct OutgoingMessage<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

impl HttpMailer {
    pub fn new(client: Client, endpoint: Url, api_key: String, from: String) -> Self {
        Self {
            client,
            endpoint,
            api_key,
            from,
        }
    }
}

#[rocket::async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), DeliveryError> {
        let message = OutgoingMessage {
            from: &self.from,
            to: [to],
            subject,
            html: body,
        };
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(&message)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Rejected(status.as_u16()));
        }
        Ok(())
    }
}

/// The content of an election invitation email.
#[derive(Debug, Clone)]
pub struct Invitation<'a> {
    pub token: &'a TokenId,
    pub election_name: &'a str,
    /// When voting closes, in organisation time. The token expires then too.
    pub closes_at: DateTime<Tz>,
}

impl Invitation<'_> {
    pub fn subject(&self) -> String {
        format!("You have been invited to vote in {}", self.election_name)
    }

    /// Render the HTML body, linking to the invitation page on `site_url`.
    pub fn body(&self, site_url: &str) -> String {
        let link = format!(
            "{}/invitation?token={}",
            site_url.trim_end_matches('/'),
            self.token
        );
        format!(
            "<p>You have been invited to vote in <strong>{name}</strong>.</p>\
<p><a href=\"{link}\">Accept invitation</a></p>\
<p>This invitation expires when voting closes on {closes}.</p>",
            name = escape_html(self.election_name),
            link = escape_html(&link),
            closes = self.closes_at.format("%B %-d, %Y, %-I %p"),
        )
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
