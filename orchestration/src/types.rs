//! Payment instruction and outcome types

use crate::state::PaymentState;
use chrono::{DateTime, Utc};
use fraud::{Decision, PaymentSource};
use routing::PaymentRoute;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// An inbound payment instruction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInstruction {
    /// Idempotency key across submissions
    pub transaction_reference: String,

    /// Submitting tenant
    pub tenant_id: String,

    /// Payment type (e.g. WIRE_DOMESTIC, ACH_CREDIT)
    pub payment_type: String,

    /// Local instrument code (e.g. WIRE, CCD)
    pub local_instrument_code: String,

    /// ISO 20022 message type; defaults to pacs.008
    #[serde(default = "default_message_type")]
    pub message_type: String,

    /// Debtor account
    pub from_account: String,

    /// Creditor account
    pub to_account: String,

    /// Amount
    pub amount: Decimal,

    /// Currency (ISO 4217)
    pub currency: String,

    /// Statement narrative
    #[serde(default)]
    pub narrative: Option<String>,

    /// Where the payment came from
    #[serde(default = "default_payment_source")]
    pub payment_source: PaymentSource,

    /// Extra canonical fields consulted by the fraud pipeline
    #[serde(default)]
    pub payment_data: Value,

    /// Pre-assigned UETR; generated when absent
    #[serde(default)]
    pub uetr: Option<String>,
}

fn default_message_type() -> String {
    "pacs.008".to_string()
}

fn default_payment_source() -> PaymentSource {
    PaymentSource::BankClient
}

impl PaymentInstruction {
    /// Fields that must not change across resubmissions with one reference
    pub fn conflicts_with(&self, other: &PaymentInstruction) -> Option<String> {
        if self.amount != other.amount {
            return Some(format!("amount {} != {}", self.amount, other.amount));
        }
        if self.from_account != other.from_account {
            return Some("from_account differs".to_string());
        }
        if self.to_account != other.to_account {
            return Some("to_account differs".to_string());
        }
        if self.currency != other.currency {
            return Some("currency differs".to_string());
        }
        None
    }

    /// Canonical payment fields merged with caller-supplied payment data,
    /// fed to the fraud pipeline and the external fraud API
    pub fn fraud_payload(&self) -> Value {
        let mut payload = match self.payment_data.clone() {
            Value::Object(map) => Value::Object(map),
            Value::Null => Value::Object(serde_json::Map::new()),
            other => serde_json::json!({ "data": other }),
        };
        let map = payload.as_object_mut().expect("payload is an object");
        map.entry("amount".to_string())
            .or_insert_with(|| Value::String(self.amount.to_string()));
        map.entry("currency".to_string())
            .or_insert_with(|| Value::String(self.currency.clone()));
        map.entry("fromAccount".to_string())
            .or_insert_with(|| Value::String(self.from_account.clone()));
        map.entry("toAccount".to_string())
            .or_insert_with(|| Value::String(self.to_account.clone()));
        map.entry("paymentType".to_string())
            .or_insert_with(|| Value::String(self.payment_type.clone()));
        payload
    }
}

/// The orchestrator's answer for one submission
#[derive(Debug, Clone, Serialize)]
pub struct PaymentOutcome {
    /// Echoed transaction reference
    pub transaction_reference: String,

    /// UETR carried across every hop
    pub uetr: String,

    /// Current state
    pub state: PaymentState,

    /// Derived route, when routing ran
    pub route: Option<PaymentRoute>,

    /// Fraud assessment, when the pipeline ran
    pub assessment_id: Option<Uuid>,

    /// Fraud decision
    pub decision: Option<Decision>,

    /// Repair record, when a partial failure produced one
    pub repair_id: Option<Uuid>,

    /// Core transaction id of the booked debit
    pub debit_transaction_id: Option<String>,

    /// Core transaction id of the booked credit
    pub credit_transaction_id: Option<String>,

    /// Human-readable disposition
    pub message: String,

    /// Last state change
    pub updated_at: DateTime<Utc>,
}

impl PaymentOutcome {
    /// Initial outcome for a fresh submission
    pub fn new(transaction_reference: impl Into<String>, uetr: impl Into<String>) -> Self {
        Self {
            transaction_reference: transaction_reference.into(),
            uetr: uetr.into(),
            state: PaymentState::Init,
            route: None,
            assessment_id: None,
            decision: None,
            repair_id: None,
            debit_transaction_id: None,
            credit_transaction_id: None,
            message: String::new(),
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn instruction() -> PaymentInstruction {
        PaymentInstruction {
            transaction_reference: "TXN-1".to_string(),
            tenant_id: "demo-bank".to_string(),
            payment_type: "WIRE_DOMESTIC".to_string(),
            local_instrument_code: "WIRE".to_string(),
            message_type: "pacs.008".to_string(),
            from_account: "ACC-100".to_string(),
            to_account: "ACC-200".to_string(),
            amount: Decimal::new(100000, 2),
            currency: "USD".to_string(),
            narrative: None,
            payment_source: PaymentSource::BankClient,
            payment_data: json!({"channel": "mobile"}),
            uetr: None,
        }
    }

    #[test]
    fn test_conflict_detection() {
        let a = instruction();
        let mut b = instruction();
        assert!(a.conflicts_with(&b).is_none());

        b.amount = Decimal::new(999, 2);
        assert!(a.conflicts_with(&b).is_some());

        let mut c = instruction();
        c.to_account = "ACC-999".to_string();
        assert!(a.conflicts_with(&c).is_some());
    }

    #[test]
    fn test_fraud_payload_merges_canonical_fields() {
        let payload = instruction().fraud_payload();
        assert_eq!(payload["channel"], json!("mobile"));
        assert_eq!(payload["amount"], json!("1000.00"));
        assert_eq!(payload["paymentType"], json!("WIRE_DOMESTIC"));
    }

    #[test]
    fn test_instruction_deserializes_with_defaults() {
        let parsed: PaymentInstruction = serde_json::from_value(json!({
            "transaction_reference": "TXN-9",
            "tenant_id": "demo-bank",
            "payment_type": "ACH_CREDIT",
            "local_instrument_code": "CCD",
            "from_account": "ACC-1",
            "to_account": "ACC-2",
            "amount": "250.00",
            "currency": "USD"
        }))
        .unwrap();

        assert_eq!(parsed.message_type, "pacs.008");
        assert_eq!(parsed.payment_source, PaymentSource::BankClient);
        assert!(parsed.uetr.is_none());
    }
}
