//! Stripe Checkout client.
//!
//! Talks to the form-encoded `POST /v1/checkout/sessions` endpoint directly
//! with `reqwest`; the only call we need does not justify an SDK.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use url::Url;

use super::{CheckoutRequest, CheckoutSession, PaymentError, PaymentProvider};
use crate::config::StripeConfig;

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    client: reqwest::Client,
    sessions_url: Url,
    secret_key: SecretString,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns error if the API base is not joinable or the HTTP client fails
    /// to build.
    pub fn new(config: &StripeConfig, timeout: Duration) -> Result<Self, PaymentError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let sessions_url = config
            .api_base
            .join("v1/checkout/sessions")
            .map_err(|e| PaymentError::Parse(format!("Invalid API base: {e}")))?;

        Ok(Self {
            client,
            sessions_url,
            secret_key: config.secret_key.clone(),
        })
    }
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let client_reference_id = request.client_reference_id.to_string();
        let form = [
            ("mode", "subscription"),
            ("payment_method_types[0]", "card"),
            ("line_items[0][price]", request.price.as_str()),
            ("line_items[0][quantity]", "1"),
            ("success_url", request.success_url.as_str()),
            ("cancel_url", request.cancel_url.as_str()),
            ("client_reference_id", client_reference_id.as_str()),
            ("customer_email", request.customer_email.as_str()),
        ];

        let response = self
            .client
            .post(self.sessions_url.clone())
            .bearer_auth(self.secret_key.expose_secret())
            .form(&form[..])
            .send()
            .await?;
        let status = response.status();

        if !status.is_success() {
            let payload = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<StripeErrorBody>(&payload)
                .ok()
                .and_then(|body| body.error.message)
                .unwrap_or_else(|| format!("checkout session request failed ({status})"));
            return Err(PaymentError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let session: StripeSession = response
            .json()
            .await
            .map_err(|e| PaymentError::Parse(e.to_string()))?;
        let url = session
            .url
            .ok_or_else(|| PaymentError::Parse(format!("session {} has no url", session.id)))?;

        Ok(CheckoutSession {
            id: session.id,
            url,
            client_reference_id: session.client_reference_id,
        })
    }
}

/// Checkout session resource.
#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
    url: Option<String>,
    client_reference_id: Option<String>,
}

/// Stripe error envelope.
#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rhythm_deck_core::{Email, UserId};
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::payments::{PriceId, PriceTable};

    fn client_for(server: &MockServer) -> StripeClient {
        let price = |id: &str| PriceId::parse(id).unwrap();
        let config = StripeConfig {
            secret_key: SecretString::from("sk_test_4eC39HqLyjWDarjtT1zdp7dc"),
            api_base: Url::parse(&server.uri()).unwrap(),
            prices: PriceTable {
                one_year: price("price_one"),
                two_year: price("price_two"),
                three_year: price("price_three"),
            },
        };
        StripeClient::new(&config, Duration::from_secs(2)).unwrap()
    }

    fn checkout_request(user_id: UserId) -> CheckoutRequest {
        CheckoutRequest {
            price: PriceId::parse("price_one").unwrap(),
            client_reference_id: user_id,
            customer_email: Email::parse("a@x.com").unwrap(),
            success_url: Url::parse(&format!(
                "https://rhythmdeck.app/profile-admin-pro.html?user_id={user_id}"
            ))
            .unwrap(),
            cancel_url: Url::parse("https://rhythmdeck.app/signup.html").unwrap(),
        }
    }

    #[tokio::test]
    async fn test_create_checkout_session() {
        let server = MockServer::start().await;
        let user_id = UserId::random();

        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .and(header(
                "Authorization",
                "Bearer sk_test_4eC39HqLyjWDarjtT1zdp7dc",
            ))
            .and(body_string_contains("mode=subscription"))
            .and(body_string_contains("line_items%5B0%5D%5Bprice%5D=price_one"))
            .and(body_string_contains(format!("client_reference_id={user_id}")))
            .and(body_string_contains("customer_email=a%40x.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "cs_test_123",
                "object": "checkout.session",
                "url": "https://checkout.stripe.com/c/pay/cs_test_123",
                "client_reference_id": user_id.to_string()
            })))
            .expect(1)
            .mount(&server)
            .await;

        let session = client_for(&server)
            .create_checkout_session(&checkout_request(user_id))
            .await
            .unwrap();

        assert_eq!(session.id, "cs_test_123");
        assert_eq!(session.url, "https://checkout.stripe.com/c/pay/cs_test_123");
        assert_eq!(session.client_reference_id, Some(user_id.to_string()));
    }

    #[tokio::test]
    async fn test_api_error_carries_stripe_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "type": "invalid_request_error",
                    "message": "No such price: 'price_one'"
                }
            })))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .create_checkout_session(&checkout_request(UserId::random()))
            .await
            .unwrap_err();

        match err {
            PaymentError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "No such price: 'price_one'");
            }
            other => panic!("expected API error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_session_without_url_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/checkout/sessions"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": "cs_test_9", "url": null})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .create_checkout_session(&checkout_request(UserId::random()))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Parse(_)));
    }
}
