use axum::async_trait;
use serde::Serialize;

use crate::config::MailConfig;

#[derive(Debug, Clone, Serialize)]
pub struct Email {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: Email) -> anyhow::Result<()>;
}

/// Sends mail through an HTTP relay (Resend-style JSON API).
pub struct HttpRelayMailer {
    client: reqwest::Client,
    relay_url: String,
    api_key: String,
}

impl HttpRelayMailer {
    pub fn new(config: &MailConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            relay_url: config.relay_url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl Mailer for HttpRelayMailer {
    async fn send(&self, email: Email) -> anyhow::Result<()> {
        let res = self
            .client
            .post(&self.relay_url)
            .bearer_auth(&self.api_key)
            .json(&email)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            anyhow::bail!("mail relay error: HTTP {status}: {body}");
        }
        tracing::debug!(to = %email.to, subject = %email.subject, "email dispatched");
        Ok(())
    }
}

pub fn confirmation_email(from: &str, base_url: &str, name: &str, to: &str, token: &str) -> Email {
    Email {
        from: from.to_string(),
        to: to.to_string(),
        subject: "Confirma tu cuenta".into(),
        html: format!(
            "<p>Hola {name}, comprueba tu cuenta.</p>\
             <p>Tu cuenta ya está lista, solo debes confirmarla en el siguiente enlace: \
             <a href=\"{base_url}/auth/confirmar/{token}\">Confirmar Cuenta</a></p>\
             <p>Si tú no creaste esta cuenta, puedes ignorar el mensaje.</p>"
        ),
    }
}

pub fn password_reset_email(
    from: &str,
    base_url: &str,
    name: &str,
    to: &str,
    token: &str,
) -> Email {
    Email {
        from: from.to_string(),
        to: to.to_string(),
        subject: "Restablece tu password".into(),
        html: format!(
            "<p>Hola {name}, restablece el password de tu cuenta.</p>\
             <p>Para restablecerlo necesitas crear un nuevo password en el siguiente enlace: \
             <a href=\"{base_url}/auth/olvide-password/{token}\">Crear Nuevo Password</a></p>\
             <p>Si tú no solicitaste esta acción, puedes ignorar el mensaje.</p>"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confirmation_email_embeds_token_url() {
        let email = confirmation_email(
            "no-reply@test.local",
            "https://example.com",
            "Ana",
            "ana@example.com",
            "tok_abc",
        );
        assert_eq!(email.to, "ana@example.com");
        assert!(email
            .html
            .contains("https://example.com/auth/confirmar/tok_abc"));
    }

    #[test]
    fn reset_email_embeds_token_url() {
        let email = password_reset_email(
            "no-reply@test.local",
            "https://example.com",
            "Ana",
            "ana@example.com",
            "tok_xyz",
        );
        assert!(email
            .html
            .contains("https://example.com/auth/olvide-password/tok_xyz"));
    }
}
