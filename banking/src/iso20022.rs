//! ISO 20022 message codec
//!
//! Builds pacs.008 (FIToFICustomerCreditTransfer) documents for outbound
//! clearing, structurally validates inbound documents, and generates
//! pacs.002 (FIToFIPaymentStatusReport) accept/reject responses correlated
//! by end-to-end id and UETR.
//!
//! # Standards
//!
//! - pacs.008.001.08: FI To FI Customer Credit Transfer
//! - pacs.002.001.10: FI To FI Payment Status Report

use crate::types::TransferRequest;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use quick_xml::de::from_str as from_xml_str;
use quick_xml::se::to_string as to_xml_string;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

const PACS008_NAMESPACE: &str = "urn:iso:std:iso:20022:tech:xsd:pacs.008.001.08";
const PACS002_NAMESPACE: &str = "urn:iso:std:iso:20022:tech:xsd:pacs.002.001.10";

/// Transaction status codes used in pacs.002
pub mod status_codes {
    /// Accepted settlement in process
    pub const ACCEPTED: &str = "ACSP";
    /// Rejected
    pub const REJECTED: &str = "RJCT";
}

/// ISO 20022 codec bound to one sending institution
pub struct Iso20022Codec {
    /// Sender BIC stamped into instructing agent fields
    sender_bic: String,
}

impl Iso20022Codec {
    /// Create a codec for a sending institution
    pub fn new(sender_bic: impl Into<String>) -> Self {
        Self {
            sender_bic: sender_bic.into(),
        }
    }

    /// Build a pacs.008 document for an interbank credit transfer
    pub fn build_pacs008(
        &self,
        transfer: &TransferRequest,
        debtor_bic: &str,
        creditor_bic: &str,
    ) -> Result<String> {
        let now = Utc::now();
        let msg_id = format!("PAYGRID-{}-{}", now.format("%Y%m%d%H%M%S"), &transfer.transaction_reference);
        let uetr = transfer
            .uetr
            .clone()
            .unwrap_or_else(|| transfer.transaction_reference.clone());

        let document = Pacs008Document {
            xmlns: PACS008_NAMESPACE.to_string(),
            fi_to_fi_cstmr_cdt_trf: FiToFiCstmrCdtTrf {
                grp_hdr: GroupHeader {
                    msg_id,
                    cre_dt_tm: now,
                    nb_of_txs: 1,
                    ttl_intr_bk_sttlm_amt: AmountAndCurrency {
                        ccy: transfer.currency.clone(),
                        value: transfer.amount,
                    },
                },
                cdt_trf_tx_inf: CreditTransferTxInfo {
                    pmt_id: PaymentIdentification {
                        instr_id: transfer.transaction_reference.clone(),
                        end_to_end_id: transfer.transaction_reference.clone(),
                        tx_id: transfer.transaction_reference.clone(),
                        uetr: Some(uetr),
                    },
                    intr_bk_sttlm_amt: AmountAndCurrency {
                        ccy: transfer.currency.clone(),
                        value: transfer.amount,
                    },
                    dbtr: Party {
                        nm: transfer.from_account.clone(),
                        fin_instn_id: FinancialInstitutionId {
                            bicfi: debtor_bic.to_string(),
                        },
                    },
                    cdtr: Party {
                        nm: transfer.to_account.clone(),
                        fin_instn_id: FinancialInstitutionId {
                            bicfi: creditor_bic.to_string(),
                        },
                    },
                },
            },
        };

        self.serialize_xml(&document)
    }

    /// Parse and structurally validate a pacs.008 document
    pub fn validate_pacs008(&self, xml: &str) -> Result<Pacs008Document> {
        let document: Pacs008Document = from_xml_str(xml)
            .map_err(|e| Error::Iso20022(format!("pacs.008 parse failed: {}", e)))?;

        let header = &document.fi_to_fi_cstmr_cdt_trf.grp_hdr;
        if header.msg_id.trim().is_empty() {
            return Err(Error::Iso20022("missing MsgId".to_string()));
        }
        if header.nb_of_txs == 0 {
            return Err(Error::Iso20022("NbOfTxs must be at least 1".to_string()));
        }

        let tx = &document.fi_to_fi_cstmr_cdt_trf.cdt_trf_tx_inf;
        if tx.pmt_id.end_to_end_id.trim().is_empty() {
            return Err(Error::Iso20022("missing EndToEndId".to_string()));
        }
        if tx.intr_bk_sttlm_amt.value <= Decimal::ZERO {
            return Err(Error::Iso20022("settlement amount must be positive".to_string()));
        }
        if tx.intr_bk_sttlm_amt.ccy.len() != 3 {
            return Err(Error::Iso20022(format!(
                "invalid currency code '{}'",
                tx.intr_bk_sttlm_amt.ccy
            )));
        }
        if tx.dbtr.fin_instn_id.bicfi.trim().is_empty()
            || tx.cdtr.fin_instn_id.bicfi.trim().is_empty()
        {
            return Err(Error::Iso20022("missing debtor or creditor BIC".to_string()));
        }

        Ok(document)
    }

    /// Generate a pacs.002 status report answering an inbound pacs.008
    pub fn build_pacs002(
        &self,
        original: &Pacs008Document,
        accepted: bool,
        reason: Option<&str>,
    ) -> Result<String> {
        let now = Utc::now();
        let tx = &original.fi_to_fi_cstmr_cdt_trf.cdt_trf_tx_inf;

        let report = Pacs002Document {
            xmlns: PACS002_NAMESPACE.to_string(),
            fi_to_fi_pmt_sts_rpt: FiToFiPmtStsRpt {
                grp_hdr: StatusGroupHeader {
                    msg_id: format!("{}-STS-{}", self.sender_bic, now.format("%Y%m%d%H%M%S%3f")),
                    cre_dt_tm: now,
                },
                tx_inf_and_sts: TxInfAndSts {
                    orgnl_instr_id: Some(tx.pmt_id.instr_id.clone()),
                    orgnl_end_to_end_id: tx.pmt_id.end_to_end_id.clone(),
                    orgnl_uetr: tx.pmt_id.uetr.clone(),
                    tx_sts: if accepted {
                        status_codes::ACCEPTED.to_string()
                    } else {
                        status_codes::REJECTED.to_string()
                    },
                    sts_rsn_inf: reason.map(|r| StatusReason {
                        addtl_inf: r.to_string(),
                    }),
                },
            },
        };

        let xml = to_xml_string(&report)
            .map_err(|e| Error::Iso20022(format!("pacs.002 serialization failed: {}", e)))?;
        Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml))
    }

    fn serialize_xml(&self, document: &Pacs008Document) -> Result<String> {
        let xml = to_xml_string(document)
            .map_err(|e| Error::Iso20022(format!("pacs.008 serialization failed: {}", e)))?;
        Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{}", xml))
    }
}

// pacs.008 structures

/// pacs.008 document root
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "Document")]
pub struct Pacs008Document {
    /// XML namespace
    #[serde(rename = "@xmlns")]
    pub xmlns: String,

    /// Credit transfer body
    #[serde(rename = "FIToFICstmrCdtTrf")]
    pub fi_to_fi_cstmr_cdt_trf: FiToFiCstmrCdtTrf,
}

/// FI to FI customer credit transfer
#[derive(Debug, Serialize, Deserialize)]
pub struct FiToFiCstmrCdtTrf {
    /// Group header
    #[serde(rename = "GrpHdr")]
    pub grp_hdr: GroupHeader,

    /// Transaction information
    #[serde(rename = "CdtTrfTxInf")]
    pub cdt_trf_tx_inf: CreditTransferTxInfo,
}

/// pacs.008 group header
#[derive(Debug, Serialize, Deserialize)]
pub struct GroupHeader {
    /// Message id
    #[serde(rename = "MsgId")]
    pub msg_id: String,

    /// Creation timestamp
    #[serde(rename = "CreDtTm")]
    pub cre_dt_tm: DateTime<Utc>,

    /// Number of transactions
    #[serde(rename = "NbOfTxs")]
    pub nb_of_txs: u32,

    /// Total interbank settlement amount
    #[serde(rename = "TtlIntrBkSttlmAmt")]
    pub ttl_intr_bk_sttlm_amt: AmountAndCurrency,
}

/// Currency-qualified amount
#[derive(Debug, Serialize, Deserialize)]
pub struct AmountAndCurrency {
    /// ISO 4217 currency code
    #[serde(rename = "@Ccy")]
    pub ccy: String,

    /// Amount
    #[serde(rename = "$text")]
    pub value: Decimal,
}

/// pacs.008 transaction info
#[derive(Debug, Serialize, Deserialize)]
pub struct CreditTransferTxInfo {
    /// Payment identification
    #[serde(rename = "PmtId")]
    pub pmt_id: PaymentIdentification,

    /// Interbank settlement amount
    #[serde(rename = "IntrBkSttlmAmt")]
    pub intr_bk_sttlm_amt: AmountAndCurrency,

    /// Debtor party
    #[serde(rename = "Dbtr")]
    pub dbtr: Party,

    /// Creditor party
    #[serde(rename = "Cdtr")]
    pub cdtr: Party,
}

/// Payment identification block
#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentIdentification {
    /// Instruction id
    #[serde(rename = "InstrId")]
    pub instr_id: String,

    /// End-to-end id
    #[serde(rename = "EndToEndId")]
    pub end_to_end_id: String,

    /// Transaction id
    #[serde(rename = "TxId")]
    pub tx_id: String,

    /// Unique end-to-end transaction reference
    #[serde(rename = "UETR", skip_serializing_if = "Option::is_none")]
    pub uetr: Option<String>,
}

/// Party block
#[derive(Debug, Serialize, Deserialize)]
pub struct Party {
    /// Party name
    #[serde(rename = "Nm")]
    pub nm: String,

    /// Financial institution identification
    #[serde(rename = "FinInstnId")]
    pub fin_instn_id: FinancialInstitutionId,
}

/// Financial institution identification
#[derive(Debug, Serialize, Deserialize)]
pub struct FinancialInstitutionId {
    /// BIC
    #[serde(rename = "BICFI")]
    pub bicfi: String,
}

// pacs.002 structures

/// pacs.002 document root
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename = "Document")]
pub struct Pacs002Document {
    /// XML namespace
    #[serde(rename = "@xmlns")]
    pub xmlns: String,

    /// Status report body
    #[serde(rename = "FIToFIPmtStsRpt")]
    pub fi_to_fi_pmt_sts_rpt: FiToFiPmtStsRpt,
}

/// FI to FI payment status report
#[derive(Debug, Serialize, Deserialize)]
pub struct FiToFiPmtStsRpt {
    /// Group header
    #[serde(rename = "GrpHdr")]
    pub grp_hdr: StatusGroupHeader,

    /// Transaction status info
    #[serde(rename = "TxInfAndSts")]
    pub tx_inf_and_sts: TxInfAndSts,
}

/// pacs.002 group header
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusGroupHeader {
    /// Message id
    #[serde(rename = "MsgId")]
    pub msg_id: String,

    /// Creation timestamp
    #[serde(rename = "CreDtTm")]
    pub cre_dt_tm: DateTime<Utc>,
}

/// Transaction status block
#[derive(Debug, Serialize, Deserialize)]
pub struct TxInfAndSts {
    /// Original instruction id
    #[serde(rename = "OrgnlInstrId", skip_serializing_if = "Option::is_none")]
    pub orgnl_instr_id: Option<String>,

    /// Original end-to-end id
    #[serde(rename = "OrgnlEndToEndId")]
    pub orgnl_end_to_end_id: String,

    /// Original UETR
    #[serde(rename = "OrgnlUETR", skip_serializing_if = "Option::is_none")]
    pub orgnl_uetr: Option<String>,

    /// Transaction status code
    #[serde(rename = "TxSts")]
    pub tx_sts: String,

    /// Status reason
    #[serde(rename = "StsRsnInf", skip_serializing_if = "Option::is_none")]
    pub sts_rsn_inf: Option<StatusReason>,
}

/// Status reason block
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusReason {
    /// Additional information
    #[serde(rename = "AddtlInf")]
    pub addtl_inf: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transfer() -> TransferRequest {
        TransferRequest {
            transaction_reference: "TXN-2026-0001".to_string(),
            tenant_id: "demo-bank".to_string(),
            from_account: "ACC-100".to_string(),
            to_account: "ACC-200".to_string(),
            amount: Decimal::new(100000, 2),
            currency: "USD".to_string(),
            narrative: None,
            uetr: Some("20260115093000PGRDPACS008XABCDEFGH12".to_string()),
        }
    }

    #[test]
    fn test_pacs008_round_trip() {
        let codec = Iso20022Codec::new("PAYGUS33");
        let xml = codec
            .build_pacs008(&transfer(), "CHASUS33", "DEUTDEFF")
            .unwrap();

        assert!(xml.contains("<?xml version"));
        assert!(xml.contains("FIToFICstmrCdtTrf"));
        assert!(xml.contains("CHASUS33"));
        assert!(xml.contains("DEUTDEFF"));
        assert!(xml.contains("20260115093000PGRDPACS008XABCDEFGH12"));

        let parsed = codec.validate_pacs008(&xml).unwrap();
        let tx = &parsed.fi_to_fi_cstmr_cdt_trf.cdt_trf_tx_inf;
        assert_eq!(tx.pmt_id.end_to_end_id, "TXN-2026-0001");
        assert_eq!(tx.intr_bk_sttlm_amt.value, Decimal::new(100000, 2));
        assert_eq!(tx.intr_bk_sttlm_amt.ccy, "USD");
    }

    #[test]
    fn test_validate_rejects_zero_amount() {
        let codec = Iso20022Codec::new("PAYGUS33");
        let mut request = transfer();
        request.amount = Decimal::ZERO;

        let xml = codec
            .build_pacs008(&request, "CHASUS33", "DEUTDEFF")
            .unwrap();
        assert!(matches!(
            codec.validate_pacs008(&xml),
            Err(Error::Iso20022(_))
        ));
    }

    #[test]
    fn test_validate_rejects_garbage() {
        let codec = Iso20022Codec::new("PAYGUS33");
        assert!(codec.validate_pacs008("<not-iso/>").is_err());
        assert!(codec.validate_pacs008("not xml at all").is_err());
    }

    #[test]
    fn test_pacs002_acceptance() {
        let codec = Iso20022Codec::new("PAYGUS33");
        let xml = codec
            .build_pacs008(&transfer(), "CHASUS33", "DEUTDEFF")
            .unwrap();
        let original = codec.validate_pacs008(&xml).unwrap();

        let accepted = codec.build_pacs002(&original, true, None).unwrap();
        assert!(accepted.contains("FIToFIPmtStsRpt"));
        assert!(accepted.contains("ACSP"));
        assert!(accepted.contains("TXN-2026-0001"));
        assert!(accepted.contains("20260115093000PGRDPACS008XABCDEFGH12"));
    }

    #[test]
    fn test_pacs002_rejection_carries_reason() {
        let codec = Iso20022Codec::new("PAYGUS33");
        let xml = codec
            .build_pacs008(&transfer(), "CHASUS33", "DEUTDEFF")
            .unwrap();
        let original = codec.validate_pacs008(&xml).unwrap();

        let rejected = codec
            .build_pacs002(&original, false, Some("insufficient funds"))
            .unwrap();
        assert!(rejected.contains("RJCT"));
        assert!(rejected.contains("insufficient funds"));
    }
}
