use {
    crate::{
        AppState,
        adapters::api_errors::ApiError,
        domain::{
            dispatch::HookName,
            error::ReconError,
            event::{EventRef, WebhookKind},
            order::PaymentState,
        },
        services::transactions::{ProcessOutcome, SkipReason},
    },
    axum::{
        Json,
        extract::{Form, State},
        http::{HeaderMap, StatusCode},
    },
    serde_json::{Map, Value},
    std::collections::HashMap,
};

/// Browser return from the hosted payment page. Processed synchronously so
/// the user gets immediate feedback.
#[tracing::instrument(name = "redirect", skip_all, fields(transaction_id = tracing::field::Empty))]
pub async fn redirect_handler(
    State(state): State<AppState>,
    Form(fields): Form<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let fields: Map<String, Value> = fields
        .into_iter()
        .map(|(k, v)| (k, Value::String(v)))
        .collect();

    let event = state.authenticator.parse_redirect(&fields)?;
    tracing::Span::current().record(
        "transaction_id",
        tracing::field::display(event.transaction_id()),
    );

    match event.reference() {
        Some(EventRef::Order { .. }) => {
            let outcome = state.transactions.process(&event).await?;
            Ok(Json(order_result(outcome)))
        }
        Some(EventRef::PaymentMethodFlow { .. }) => {
            state.payment_methods.confirm_from_redirect(&event).await?;
            Ok(Json(serde_json::json!({
                "status": "ok",
                "message": "Payment method saved.",
            })))
        }
        None => Err(ReconError::NotFound("No valid order ID in incoming data.".to_string()).into()),
    }
}

fn order_result(outcome: ProcessOutcome) -> Value {
    match outcome {
        ProcessOutcome::Applied(PaymentState::Failed) => serde_json::json!({
            "status": "failed",
            "message": "Payment was declined.",
        }),
        ProcessOutcome::Applied(state) => serde_json::json!({
            "status": "ok",
            "message": format!("Payment {state}."),
        }),
        // Duplicate/stale deliveries are success-shaped: the other channel
        // already landed the update.
        ProcessOutcome::Skipped(reason) => serde_json::json!({
            "status": "ok",
            "message": match reason {
                SkipReason::DuplicateTransaction | SkipReason::StaleTimestamp => {
                    "Payment already processed."
                }
                SkipReason::NotAnOrder => "Nothing to process.",
            },
        }),
    }
}

/// Server-to-server webhook. Authenticates, then answers fast: status
/// updates and card saves are deferred, card updates run inline.
#[tracing::instrument(
    name = "webhook",
    skip_all,
    fields(kind = tracing::field::Empty, transaction_id = tracing::field::Empty)
)]
pub async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let supplied_hash = headers
        .get("X-Signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ReconError::Auth("Webhook data hash is invalid.".to_string()))?;

    let event = state.authenticator.parse_webhook(&body, supplied_hash)?;
    tracing::Span::current()
        .record("kind", tracing::field::display(event.kind()))
        .record(
            "transaction_id",
            tracing::field::display(event.transaction_id()),
        );

    match event.kind() {
        WebhookKind::StatusUpdate => {
            state
                .dispatch
                .schedule(HookName::ProcessTransaction, event)
                .map_err(|e| {
                    tracing::error!(error = %e, "status update enqueue failed");
                    ReconError::Dispatch("Failed to schedule action.".to_string())
                })?;
            Ok((
                StatusCode::ACCEPTED,
                Json(serde_json::json!({"status": "scheduled"})),
            ))
        }
        WebhookKind::CardNew => match event.reference() {
            Some(EventRef::PaymentMethodFlow { .. }) => {
                state.payment_methods.schedule_save(&event)?;
                Ok((
                    StatusCode::ACCEPTED,
                    Json(serde_json::json!({"status": "scheduled"})),
                ))
            }
            _ => {
                // A card_new tied to a real order has no standalone save
                // flow; the matching status_update carries the order changes.
                tracing::info!("card_new for an order ref, nothing to schedule");
                Ok((
                    StatusCode::ACCEPTED,
                    Json(serde_json::json!({"status": "ignored"})),
                ))
            }
        },
        WebhookKind::CardUpdate => {
            state.payment_methods.update_from_event(&event).await?;
            Ok((
                StatusCode::ACCEPTED,
                Json(serde_json::json!({"status": "updated"})),
            ))
        }
    }
}
