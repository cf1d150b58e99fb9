use {
    super::error::ReconError,
    serde::{Deserialize, Serialize},
    std::fmt,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventChannel {
    Redirect,
    Webhook,
}

impl EventChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Redirect => "redirect",
            Self::Webhook => "webhook",
        }
    }
}

impl fmt::Display for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebhookKind {
    StatusUpdate,
    CardNew,
    CardUpdate,
}

impl WebhookKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatusUpdate => "status_update",
            Self::CardNew => "card_new",
            Self::CardUpdate => "card_update",
        }
    }
}

impl fmt::Display for WebhookKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for WebhookKind {
    type Error = ReconError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "status_update" => Ok(Self::StatusUpdate),
            "card_new" => Ok(Self::CardNew),
            "card_update" => Ok(Self::CardUpdate),
            other => Err(ReconError::Validation(format!(
                "unknown webhook kind: {other}"
            ))),
        }
    }
}

const PAYMENT_METHOD_MARKER: &str = "add_payment_method";

/// The composite reference carried in `order_id`. Parsed exactly once at the
/// boundary; downstream code never re-parses the wire string.
///
/// Wire formats: `"<orderId>-<orderKey>"` for real orders,
/// `"<userId>-add_payment_method-<nonce>"` for the standalone card flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventRef {
    Order { id: u64, key: String },
    PaymentMethodFlow { user_id: u64, nonce: String },
}

impl EventRef {
    pub fn parse(raw: &str) -> Result<Self, ReconError> {
        let marker = format!("-{PAYMENT_METHOD_MARKER}-");
        if let Some((user, nonce)) = raw.split_once(&marker) {
            let user_id: u64 = user.parse().map_err(|_| {
                ReconError::NotFound("No valid order ID in incoming data.".to_string())
            })?;
            if nonce.is_empty() {
                return Err(ReconError::NotFound(
                    "No valid order ID in incoming data.".to_string(),
                ));
            }
            return Ok(Self::PaymentMethodFlow {
                user_id,
                nonce: nonce.to_string(),
            });
        }

        let (id, key) = raw.split_once('-').ok_or_else(|| {
            ReconError::NotFound("No valid order ID in incoming data.".to_string())
        })?;
        let id: u64 = id.parse().map_err(|_| {
            ReconError::NotFound("No valid order ID in incoming data.".to_string())
        })?;
        if key.is_empty() {
            return Err(ReconError::NotFound(
                "No valid order ID in incoming data.".to_string(),
            ));
        }
        Ok(Self::Order {
            id,
            key: key.to_string(),
        })
    }
}

/// Snapshot of the nested `card` object on a `card_update` webhook.
/// Field values are raw wire strings; the token store mapping lives in
/// [`super::card`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardUpdate {
    pub update_type: String,
    pub update_detail: String,
    pub holder_name: String,
    pub scheme: String,
    pub number: String,
    pub expiry_month: String,
    pub expiry_year: String,
}

/// A validated, hash-verified event from either delivery channel.
///
/// Only the authenticator builds these from raw payloads; holding one means
/// the signature and required-field checks already passed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingEvent {
    channel: EventChannel,
    kind: WebhookKind,
    /// Absent only on `card_update`, which carries no composite ref; owner
    /// resolution goes through the card's remote customer id instead.
    reference: Option<EventRef>,
    transaction_id: String,
    card_id: Option<String>,
    status: String,
    timestamp_raw: String,
    card_update: Option<CardUpdate>,
}

pub struct IncomingEventParams {
    pub channel: EventChannel,
    pub kind: WebhookKind,
    pub reference: Option<EventRef>,
    pub transaction_id: String,
    pub card_id: Option<String>,
    pub status: String,
    pub timestamp_raw: String,
    pub card_update: Option<CardUpdate>,
}

impl IncomingEvent {
    pub fn new(params: IncomingEventParams) -> Self {
        Self {
            channel: params.channel,
            kind: params.kind,
            reference: params.reference,
            transaction_id: params.transaction_id,
            card_id: params.card_id,
            status: params.status,
            timestamp_raw: params.timestamp_raw,
            card_update: params.card_update,
        }
    }

    pub fn channel(&self) -> EventChannel {
        self.channel
    }

    pub fn kind(&self) -> WebhookKind {
        self.kind
    }

    pub fn reference(&self) -> Option<&EventRef> {
        self.reference.as_ref()
    }

    pub fn transaction_id(&self) -> &str {
        &self.transaction_id
    }

    pub fn card_id(&self) -> Option<&str> {
        self.card_id.as_deref()
    }

    /// The card id is sometimes discovered indirectly (redirect confirms
    /// derive it from the remote transaction) and attached after the fact.
    pub fn set_card_id(&mut self, card_id: impl Into<String>) {
        self.card_id = Some(card_id.into());
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn timestamp_raw(&self) -> &str {
        &self.timestamp_raw
    }

    pub fn card_update(&self) -> Option<&CardUpdate> {
        self.card_update.as_ref()
    }
}
