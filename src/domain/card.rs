use {
    super::error::ReconError,
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

/// Display fields stored on a token, normalized from wire values.
///
/// The mapping is exact: scheme becomes the card type as-is, `number` is
/// reduced to its last 4 digits, the month is zero-padded to 2 digits and the
/// 2-digit remote year is expanded by adding 2000.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDisplay {
    pub card_type: String,
    pub last4: String,
    pub expiry_month: String,
    pub expiry_year: String,
}

impl CardDisplay {
    pub fn from_wire(
        scheme: &str,
        number: &str,
        expiry_month: &str,
        expiry_year: &str,
    ) -> Result<Self, ReconError> {
        let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() < 4 {
            return Err(ReconError::Validation(format!(
                "card number too short for last4: {number:?}"
            )));
        }
        let last4 = digits[digits.len() - 4..].to_string();

        let month: u32 = expiry_month
            .trim()
            .parse()
            .map_err(|_| ReconError::Validation(format!("bad expiry month: {expiry_month:?}")))?;
        if !(1..=12).contains(&month) {
            return Err(ReconError::Validation(format!(
                "bad expiry month: {expiry_month:?}"
            )));
        }

        let year: u32 = expiry_year
            .trim()
            .parse()
            .map_err(|_| ReconError::Validation(format!("bad expiry year: {expiry_year:?}")))?;
        if year >= 100 {
            return Err(ReconError::Validation(format!(
                "expiry year is not a 2-digit remote value: {expiry_year:?}"
            )));
        }

        Ok(Self {
            card_type: scheme.to_string(),
            last4,
            expiry_month: format!("{month:02}"),
            expiry_year: (year + 2000).to_string(),
        })
    }
}

/// A stored card reference owned by the token store. `token` is the remote
/// card id; `(user_id, token)` is the idempotency key for saves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentToken {
    pub id: Uuid,
    pub token: String,
    pub user_id: u64,
    pub gateway_id: String,
    pub display: CardDisplay,
}

impl PaymentToken {
    pub fn new(
        token: impl Into<String>,
        user_id: u64,
        gateway_id: impl Into<String>,
        display: CardDisplay,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            token: token.into(),
            user_id,
            gateway_id: gateway_id.into(),
            display,
        }
    }
}
