use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use be_remote_db::DbError;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Stripe error: {0}")]
    Provider(String),

    #[error("Webhook signature verification failed")]
    WebhookSignatureInvalid,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for field {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("{0}")]
    Internal(#[from] anyhow::Error),
}

impl PaymentError {
    pub fn status(&self) -> StatusCode {
        match self {
            PaymentError::Provider(_)
            | PaymentError::WebhookSignatureInvalid
            | PaymentError::MissingField(_)
            | PaymentError::InvalidField { .. } => StatusCode::BAD_REQUEST,
            PaymentError::NotFound(_) => StatusCode::NOT_FOUND,
            PaymentError::Config(_) | PaymentError::Database(_) | PaymentError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short label used for analytics and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            PaymentError::Provider(_) => "provider",
            PaymentError::WebhookSignatureInvalid => "signature",
            PaymentError::MissingField(_) | PaymentError::InvalidField { .. } => "validation",
            PaymentError::NotFound(_) => "not_found",
            PaymentError::Config(_) => "config",
            PaymentError::Database(_) => "database",
            PaymentError::Internal(_) => "internal",
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    has_paid: Option<bool>,
}

impl PaymentError {
    fn into_response_with(self, has_paid: Option<bool>) -> Response {
        let status = self.status();
        let message = match &self {
            PaymentError::Provider(message) => message.clone(),
            PaymentError::Config(_) => "Server configuration error".to_string(),
            PaymentError::Database(_) | PaymentError::Internal(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(%status, error = %self, "Payment service error");
        } else {
            tracing::warn!(%status, error = %self, "Payment request rejected");
        }

        (
            status,
            axum::Json(ErrorBody {
                error: message,
                has_paid,
            }),
        )
            .into_response()
    }
}

impl IntoResponse for PaymentError {
    fn into_response(self) -> Response {
        self.into_response_with(None)
    }
}

/// Error returned by the session verification endpoint.
///
/// Provider failures there also answer `has_paid: false`.
#[derive(Debug)]
pub struct VerifyError(pub PaymentError);

impl From<PaymentError> for VerifyError {
    fn from(err: PaymentError) -> Self {
        Self(err)
    }
}

impl IntoResponse for VerifyError {
    fn into_response(self) -> Response {
        let has_paid = matches!(self.0, PaymentError::Provider(_)).then_some(false);
        self.0.into_response_with(has_paid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn provider_errors_are_client_errors() {
        let err = PaymentError::Provider("No such checkout.session: cs_test_x".into());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind(), "provider");
    }

    #[test]
    fn persistence_errors_are_server_errors() {
        let err = PaymentError::from(DbError::connection("refused"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            PaymentError::Config("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn invalid_field_message_names_field() {
        let err = PaymentError::InvalidField {
            field: "session_id",
            reason: "expected a checkout session id",
        };
        assert_eq!(
            err.to_string(),
            "Invalid value for field session_id: expected a checkout session id"
        );
    }

    #[tokio::test]
    async fn provider_error_body_has_no_payment_flag() {
        let err = PaymentError::Provider("No such customer: cus_x".into());

        let body = body_json(err.into_response()).await;

        assert_eq!(body["error"], "No such customer: cus_x");
        assert!(body.get("has_paid").is_none());
    }

    #[tokio::test]
    async fn verify_error_flags_only_provider_failures() {
        let provider = VerifyError::from(PaymentError::Provider("gone".into())).into_response();
        assert_eq!(provider.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(provider).await["has_paid"], false);

        let missing = VerifyError::from(PaymentError::MissingField("session_id")).into_response();
        assert!(body_json(missing).await.get("has_paid").is_none());
    }
}
