use {
    crate::domain::{
        error::ReconError,
        event::{
            CardUpdate, EventChannel, EventRef, IncomingEvent, IncomingEventParams, WebhookKind,
        },
    },
    hmac::{Hmac, Mac},
    serde_json::{Map, Value},
    sha2::Sha256,
    std::sync::Arc,
    subtle::ConstantTimeEq,
};

type HmacSha256 = Hmac<Sha256>;

const REDIRECT_REQUIRED: [&str; 5] = ["status", "transaction_id", "order_id", "timestamp", "hash"];
const ENVELOPE_REQUIRED: [&str; 3] = ["webhook_id", "webhook_type", "webhook_body"];
const STATUS_UPDATE_REQUIRED: [&str; 3] = ["transaction_id", "status", "order_id"];
const CARD_NEW_REQUIRED: [&str; 4] = ["transaction_id", "status", "order_id", "card_id"];
const CARD_UPDATE_REQUIRED: [&str; 4] = ["card_id", "update_type", "update_detail", "card"];
const CARD_OBJECT_REQUIRED: [&str; 5] =
    ["holder_name", "scheme", "number", "expiry_month", "expiry_year"];

/// Turns untrusted redirect/webhook payloads into trusted [`IncomingEvent`]s.
/// Stateless: a pure function of payload and the shared secret.
pub struct IncomingEventAuthenticator {
    secret: Arc<str>,
}

impl IncomingEventAuthenticator {
    pub fn new(secret: Arc<str>) -> Self {
        Self { secret }
    }

    /// Validate the signed querystring a browser brings back from the hosted
    /// payment page.
    pub fn parse_redirect(
        &self,
        fields: &Map<String, Value>,
    ) -> Result<IncomingEvent, ReconError> {
        let fields = sanitize_map(fields);

        let missing = missing_fields(&fields, &REDIRECT_REQUIRED);
        if !missing.is_empty() {
            return Err(self.reject(
                ReconError::Validation(format!(
                    "Missing required fields in redirect data: \"{}\".",
                    missing.join(", ")
                )),
                &Value::Object(fields.clone()),
            ));
        }

        let supplied = string_field(&fields, "hash");
        if !self.redirect_hash_valid(&fields, &supplied) {
            return Err(self.reject(
                ReconError::Auth("Redirect data hash is invalid.".to_string()),
                &Value::Object(fields.clone()),
            ));
        }

        let reference = EventRef::parse(&string_field(&fields, "order_id"))
            .map_err(|e| self.reject(e, &Value::Object(fields.clone())))?;

        Ok(IncomingEvent::new(IncomingEventParams {
            channel: EventChannel::Redirect,
            kind: WebhookKind::StatusUpdate,
            reference: Some(reference),
            transaction_id: string_field(&fields, "transaction_id"),
            card_id: None,
            status: string_field(&fields, "status"),
            timestamp_raw: string_field(&fields, "timestamp"),
            card_update: None,
        }))
    }

    /// Validate a signed server-to-server webhook body. Signature first, on
    /// the exact (trimmed) bytes received; only then is the JSON decoded.
    pub fn parse_webhook(
        &self,
        raw_body: &str,
        supplied_hash: &str,
    ) -> Result<IncomingEvent, ReconError> {
        if !self.webhook_hash_valid(raw_body, supplied_hash) {
            return Err(self.reject(
                ReconError::Auth("Webhook data hash is invalid.".to_string()),
                &Value::String("<unverified body>".to_string()),
            ));
        }

        let envelope: Value = serde_json::from_str(raw_body.trim()).map_err(|_| {
            self.reject(
                ReconError::Auth("Webhook data is invalid.".to_string()),
                &Value::String("<undecodable body>".to_string()),
            )
        })?;
        let envelope_map = envelope.as_object().cloned().ok_or_else(|| {
            self.reject(
                ReconError::Auth("Webhook data is invalid.".to_string()),
                &envelope,
            )
        })?;

        let missing = missing_fields(&envelope_map, &ENVELOPE_REQUIRED);
        if !missing.is_empty() {
            return Err(self.reject(
                ReconError::Validation(format!(
                    "Missing required fields in webhook: \"{}\".",
                    missing.join(", ")
                )),
                &envelope,
            ));
        }

        let webhook_id = string_field(&envelope_map, "webhook_id");
        let raw_kind = string_field(&envelope_map, "webhook_type");
        let kind = WebhookKind::try_from(raw_kind.as_str()).map_err(|_| {
            self.reject(
                ReconError::Validation(format!(
                    "Wrong webhook type sent. Webhook type \"{raw_kind}\". Webhook ID: {webhook_id}.",
                )),
                &envelope,
            )
        })?;

        let body = envelope_map
            .get("webhook_body")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let missing = missing_body_fields(&body, kind);
        if !missing.is_empty() {
            return Err(self.reject(
                ReconError::Validation(format!(
                    "Missing required fields in webhook_body: \"{}\".",
                    missing.join(", ")
                )),
                &envelope,
            ));
        }

        let reference = match kind {
            WebhookKind::StatusUpdate | WebhookKind::CardNew => Some(
                EventRef::parse(&string_field(&body, "order_id"))
                    .map_err(|e| self.reject(e, &envelope))?,
            ),
            WebhookKind::CardUpdate => None,
        };

        let card_update = match kind {
            WebhookKind::CardUpdate => {
                let card = body
                    .get("card")
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default();
                Some(CardUpdate {
                    update_type: string_field(&body, "update_type"),
                    update_detail: string_field(&body, "update_detail"),
                    holder_name: string_field(&card, "holder_name"),
                    scheme: string_field(&card, "scheme"),
                    number: string_field(&card, "number"),
                    expiry_month: string_field(&card, "expiry_month"),
                    expiry_year: string_field(&card, "expiry_year"),
                })
            }
            _ => None,
        };

        let card_id = match body.get("card_id") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };

        Ok(IncomingEvent::new(IncomingEventParams {
            channel: EventChannel::Webhook,
            kind,
            reference,
            transaction_id: string_field(&body, "transaction_id"),
            card_id,
            status: string_field(&body, "status"),
            timestamp_raw: string_field(&body, "timestamp"),
            card_update,
        }))
    }

    fn redirect_hash_valid(&self, fields: &Map<String, Value>, supplied: &str) -> bool {
        match redirect_signature(&self.secret, fields) {
            Ok(expected) => constant_time_eq(&expected, supplied),
            Err(_) => false,
        }
    }

    fn webhook_hash_valid(&self, raw_body: &str, supplied: &str) -> bool {
        match webhook_signature(&self.secret, raw_body) {
            Ok(expected) => constant_time_eq(&expected, supplied),
            Err(_) => false,
        }
    }

    /// Log the rejection before handing it back, so the decision is
    /// observable without the caller re-deriving it.
    fn reject(&self, err: ReconError, payload: &Value) -> ReconError {
        tracing::error!(payload = %redact(payload.clone()), error = %err, "incoming event rejected");
        err
    }
}

/// Sender-side signature over the redirect field set: hex HMAC-SHA256 of the
/// `key=value` pairs of every field except `hash`, sorted by key, joined
/// with `&`. An empty secret never signs anything.
pub fn redirect_signature(secret: &str, fields: &Map<String, Value>) -> Result<String, ReconError> {
    if secret.is_empty() {
        return Err(ReconError::Auth("Redirect data hash is invalid.".to_string()));
    }
    let mut pairs: Vec<String> = fields
        .iter()
        .filter(|(k, _)| k.as_str() != "hash")
        .map(|(k, v)| format!("{k}={}", value_as_signing_string(v)))
        .collect();
    pairs.sort();
    hmac_hex(secret, pairs.join("&").as_bytes())
}

/// Sender-side webhook signature: hex HMAC-SHA256 over the trimmed raw body.
/// Leading/trailing whitespace is the only tolerated encoding difference;
/// internal whitespace is significant.
pub fn webhook_signature(secret: &str, raw_body: &str) -> Result<String, ReconError> {
    if secret.is_empty() {
        return Err(ReconError::Auth("Webhook data hash is invalid.".to_string()));
    }
    hmac_hex(secret, raw_body.trim().as_bytes())
}

fn hmac_hex(secret: &str, data: &[u8]) -> Result<String, ReconError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| ReconError::Auth("shared secret is unusable".to_string()))?;
    mac.update(data);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn constant_time_eq(expected: &str, supplied: &str) -> bool {
    // Length is not secret (always 64 hex chars), only the content compare
    // needs to be constant-time.
    if expected.len() != supplied.len() {
        return false;
    }
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}

fn value_as_signing_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Recursive markup strip: strings lose `<...>` runs, arrays/objects are
/// walked, every other type passes through unchanged.
pub fn sanitize_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(strip_markup(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize_value).collect()),
        Value::Object(map) => Value::Object(sanitize_map(&map)),
        other => other,
    }
}

fn sanitize_map(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(k, v)| (k.clone(), sanitize_value(v.clone())))
        .collect()
}

fn strip_markup(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for c in s.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

/// Missing means absent or falsy: null, empty string, `false`, zero, or an
/// empty array/object all fail the presence check.
fn is_missing(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(n)) => n.as_f64() == Some(0.0),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
    }
}

fn missing_fields<'a>(map: &Map<String, Value>, required: &[&'a str]) -> Vec<&'a str> {
    required
        .iter()
        .filter(|name| is_missing(map.get(**name)))
        .copied()
        .collect()
}

/// Per-kind body schema. `card_update` additionally requires the nested card
/// object's fields, reported by their inner names.
fn missing_body_fields(body: &Map<String, Value>, kind: WebhookKind) -> Vec<&'static str> {
    match kind {
        WebhookKind::StatusUpdate => missing_fields(body, &STATUS_UPDATE_REQUIRED),
        WebhookKind::CardNew => missing_fields(body, &CARD_NEW_REQUIRED),
        WebhookKind::CardUpdate => {
            let mut missing = missing_fields(body, &CARD_UPDATE_REQUIRED);
            if let Some(card) = body.get("card").and_then(Value::as_object) {
                missing.extend(missing_fields(card, &CARD_OBJECT_REQUIRED));
            }
            missing
        }
    }
}

fn string_field(map: &Map<String, Value>, key: &str) -> String {
    match map.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Strip signature material and full card numbers before a payload reaches
/// the log.
pub fn redact(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| match k.as_str() {
                    "hash" | "number" | "holder_name" => (k, Value::String("[redacted]".into())),
                    _ => (k, redact(v)),
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(redact).collect()),
        other => other,
    }
}
