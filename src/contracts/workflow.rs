//! Contract operations that talk to the backend.
//!
//! Every mutation drops the cached contract queries so the next listing
//! reflects the server state.

use crate::api::client::ApiClient;
use crate::api::models::{
    ContractCategory, ContractInstance, ContractTemplate, Customer, SendContractResult, VerificationMethod,
};
use crate::cache::{key, QueryCache};
use crate::contracts::lifecycle::{can, validate_otp, ContractAction, SigningDialog};
use crate::contracts::reorder::reorder_with;
use crate::contracts::status::{ContractStatus, StatusTally};
use crate::error::{Error, Result};

/// Status filter plus free-text search over number and customer name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractFilter {
    pub status: Option<ContractStatus>,
    pub search: Option<String>,
}

/// A contract joined with its customer's display name.
#[derive(Debug, Clone, PartialEq)]
pub struct ContractRow {
    pub contract: ContractInstance,
    pub customer_name: Option<String>,
}

pub fn join_customers(contracts: Vec<ContractInstance>, customers: &[Customer]) -> Vec<ContractRow> {
    contracts
        .into_iter()
        .map(|contract| {
            let customer_name = contract
                .customer_id
                .as_deref()
                .and_then(|id| customers.iter().find(|c| c.id == id))
                .map(Customer::full_name);
            ContractRow {
                contract,
                customer_name,
            }
        })
        .collect()
}

pub fn filter_contracts<'a>(rows: &'a [ContractRow], f: &ContractFilter) -> Vec<&'a ContractRow> {
    let needle = f
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);
    rows.iter()
        .filter(|r| f.status.is_none_or(|s| r.contract.status == s))
        .filter(|r| match &needle {
            None => true,
            Some(n) => {
                let number = r.contract.contract_number.as_deref().unwrap_or_default();
                let name = r.customer_name.as_deref().unwrap_or_default();
                number.to_lowercase().contains(n) || name.to_lowercase().contains(n)
            }
        })
        .collect()
}

fn require(status: ContractStatus, action: ContractAction, name: &'static str) -> Result<()> {
    if can(status, action) {
        Ok(())
    } else {
        Err(Error::InvalidTransition {
            action: name,
            state: status.label(),
        })
    }
}

#[derive(Clone)]
pub struct ContractDesk {
    client: ApiClient,
    cache: QueryCache,
}

impl ContractDesk {
    pub fn new(client: ApiClient, cache: QueryCache) -> Self {
        Self { client, cache }
    }

    fn invalidate(&self) {
        self.cache.invalidate(&["/api/contracts"]);
    }

    /// Contracts with customer names, served from cache when present.
    pub async fn rows(&self) -> Result<Vec<ContractRow>> {
        let k = key(&["/api/contracts"]);
        if let Some(rows) = self.cache.get::<Vec<ContractRow>>(&k) {
            return Ok(rows);
        }
        let (contracts, customers) = tokio::join!(self.client.contracts(), self.client.customers());
        let customers = customers.unwrap_or_else(|e| {
            log::warn!("customer list unavailable: {e}");
            Vec::new()
        });
        let rows = join_customers(contracts?, &customers);
        self.cache.put(k, rows.clone());
        Ok(rows)
    }

    pub async fn tally(&self) -> Result<StatusTally> {
        let rows = self.rows().await?;
        Ok(StatusTally::count(rows.iter().map(|r| &r.contract)))
    }

    /// Sends a draft out for signature, delivering the first code by `method`.
    pub async fn send(&self, contract: &ContractInstance, method: VerificationMethod) -> Result<SendContractResult> {
        require(contract.status, ContractAction::Send, "send")?;
        let result = self.client.send_contract(&contract.id, method).await?;
        log::info!(
            "contract {} sent, {} signature request(s)",
            contract.id,
            result.signature_requests.len()
        );
        self.invalidate();
        Ok(result)
    }

    /// Opens the signing dialog on the contract's current signature requests.
    pub async fn open_signing(&self, contract: &ContractInstance) -> Result<SigningDialog> {
        let requests = self.client.signature_requests(&contract.id).await?;
        SigningDialog::open(contract.id.clone(), contract.status, &requests)
    }

    /// Delivers a fresh code over the dialog's current channel.
    pub async fn resend_code(&self, dialog: &mut SigningDialog) -> Result<()> {
        let (contract_id, request_id, method) = match dialog {
            SigningDialog::AwaitingCode {
                contract_id,
                request_id: Some(request_id),
                method,
            } => (contract_id.clone(), request_id.clone(), *method),
            SigningDialog::AwaitingCode { request_id: None, .. } => {
                return Err(Error::InvalidTransition {
                    action: "resend the code",
                    state: "no signature request",
                });
            }
            other => {
                return Err(Error::InvalidTransition {
                    action: "resend the code",
                    state: other.state_name(),
                });
            }
        };
        self.client.resend_otp(&contract_id, &request_id, method).await?;
        dialog.code_sent(request_id)
    }

    /// Checks `code` locally, then with the backend. Only an accepted code
    /// moves the dialog to verified.
    pub async fn verify(&self, dialog: &mut SigningDialog, code: &str) -> Result<()> {
        let code = validate_otp(code)?;
        if dialog.otp_verified() {
            return Ok(());
        }
        let (Some(contract_id), Some(request_id)) = (dialog.contract_id(), dialog.request_id()) else {
            return Err(Error::InvalidTransition {
                action: "verify",
                state: dialog.state_name(),
            });
        };
        let result = self.client.verify_otp(contract_id, request_id, code).await?;
        if !(result.success || result.verified) {
            return Err(Error::Rejected("the code was not accepted".into()));
        }
        dialog.verified(result.signature_request_id)?;
        self.invalidate();
        Ok(())
    }

    /// Submits the captured signature and closes the dialog.
    pub async fn submit_signature(&self, dialog: &mut SigningDialog) -> Result<()> {
        let (contract_id, request_id, signature) = dialog.submission()?;
        self.client.sign_contract(contract_id, request_id, signature).await?;
        log::info!("contract {contract_id} signed");
        dialog.reset();
        self.invalidate();
        Ok(())
    }

    pub async fn render(&self, contract: &ContractInstance) -> Result<()> {
        require(contract.status, ContractAction::Render, "render")?;
        self.client.render_contract(&contract.id).await?;
        self.invalidate();
        Ok(())
    }

    pub async fn regenerate(&self, contract: &ContractInstance) -> Result<()> {
        require(contract.status, ContractAction::Regenerate, "regenerate")?;
        self.client.regenerate_contract(&contract.id).await?;
        self.invalidate();
        Ok(())
    }

    pub async fn cancel(&self, contract: &ContractInstance, reason: &str) -> Result<()> {
        require(contract.status, ContractAction::Cancel, "cancel")?;
        if reason.trim().is_empty() {
            return Err(Error::validation("a cancellation reason is required"));
        }
        self.client.cancel_contract(&contract.id, reason.trim()).await?;
        self.invalidate();
        Ok(())
    }

    /// Moves category `active` onto the slot of `over` and persists the order.
    /// On failure `categories` is back in its previous order.
    pub async fn reorder_categories(
        &self,
        categories: &mut Vec<ContractCategory>,
        active: i64,
        over: i64,
    ) -> Result<bool> {
        let client = self.client.clone();
        let moved = reorder_with(categories, active, over, |ids| async move {
            client.reorder_categories(&ids).await
        })
        .await?;
        if moved {
            self.cache.invalidate(&["/api/contracts/categories"]);
        }
        Ok(moved)
    }

    /// Asks the AI service to map the template's extracted fields, merges the
    /// suggestions over the saved mappings and stores the result.
    pub async fn map_template_fields(&self, template_id: &str) -> Result<ContractTemplate> {
        let mut template = self.client.template(template_id).await?;
        if template.extracted_fields.is_empty() {
            return Err(Error::validation("template has no extracted fields"));
        }
        let suggested = self.client.ai_mapping(template.extracted_fields.as_slice()).await?;
        template.placeholder_mappings.merge(suggested);
        self.client.update_template(template_id, &(&template).into()).await?;
        self.cache.invalidate(&["/api/contracts/templates"]);
        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn desk(server: &MockServer) -> ContractDesk {
        ContractDesk::new(ApiClient::new(&server.uri(), None), QueryCache::new())
    }

    fn contract(id: &str, status: ContractStatus) -> ContractInstance {
        ContractInstance {
            id: id.into(),
            status,
            ..Default::default()
        }
    }

    #[test]
    fn filter_by_status_and_search() {
        let rows = join_customers(
            vec![
                ContractInstance {
                    id: "1".into(),
                    contract_number: Some("ZML-2024-001".into()),
                    customer_id: Some("k1".into()),
                    status: ContractStatus::Draft,
                    ..Default::default()
                },
                ContractInstance {
                    id: "2".into(),
                    contract_number: Some("ZML-2024-002".into()),
                    status: ContractStatus::Signed,
                    ..Default::default()
                },
            ],
            &[Customer {
                id: "k1".into(),
                first_name: "Mária".into(),
                last_name: "Horváth".into(),
                country: "SK".into(),
            }],
        );
        assert_eq!(rows[0].customer_name.as_deref(), Some("Mária Horváth"));

        let f = ContractFilter {
            search: Some("horv".into()),
            ..Default::default()
        };
        assert_eq!(filter_contracts(&rows, &f).len(), 1);

        let f = ContractFilter {
            status: Some(ContractStatus::Signed),
            search: Some("2024".into()),
        };
        let hits = filter_contracts(&rows, &f);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].contract.id, "2");
        assert_eq!(filter_contracts(&rows, &ContractFilter::default()).len(), 2);
    }

    #[tokio::test]
    async fn otp_gate_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/contracts/c1/signature-requests"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "r1", "contractId": "c1", "signerName": "Jana", "status": "sent",
                 "verificationMethod": "sms_otp"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/contracts/c1/verify-otp"))
            .and(body_json(json!({"otpCode": "123456", "signatureRequestId": "r1"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true, "verified": true, "signatureRequestId": "r1"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/contracts/c1/sign"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true})))
            .expect(1)
            .mount(&server)
            .await;

        let desk = desk(&server);
        let c = contract("c1", ContractStatus::Sent);
        let mut dialog = desk.open_signing(&c).await.unwrap();
        assert!(!dialog.otp_verified());
        assert!(dialog.set_signature("Jana").is_err());

        let err = desk.verify(&mut dialog, "12345").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(!dialog.otp_verified());

        desk.verify(&mut dialog, "123456").await.unwrap();
        assert!(dialog.otp_verified());
        dialog.set_signature("Jana Nováková").unwrap();
        desk.submit_signature(&mut dialog).await.unwrap();
        assert_eq!(dialog, SigningDialog::Closed);
    }

    #[tokio::test]
    async fn rejected_code_stays_awaiting() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/contracts/c1/verify-otp"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Invalid OTP"})))
            .mount(&server)
            .await;
        let desk = desk(&server);
        let mut dialog = SigningDialog::AwaitingCode {
            contract_id: "c1".into(),
            request_id: Some("r1".into()),
            method: VerificationMethod::EmailOtp,
        };
        let err = desk.verify(&mut dialog, "000000").await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 400: Invalid OTP");
        assert_eq!(dialog.state_name(), "awaiting code");
    }

    #[tokio::test]
    async fn actions_are_checked_before_requests() {
        let server = MockServer::start().await;
        let desk = desk(&server);
        let signed = contract("c9", ContractStatus::Signed);
        assert!(matches!(
            desk.cancel(&signed, "customer request").await,
            Err(Error::InvalidTransition { .. })
        ));
        assert!(matches!(
            desk.send(&signed, VerificationMethod::EmailOtp).await,
            Err(Error::InvalidTransition { .. })
        ));
        let draft = contract("c1", ContractStatus::Draft);
        assert!(matches!(desk.cancel(&draft, "  ").await, Err(Error::Validation(_))));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_reorder_restores_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/contracts/categories/reorder"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        let desk = desk(&server);
        let mut cats: Vec<ContractCategory> = (1..=3)
            .map(|id| ContractCategory {
                id,
                sort_order: id as i32,
                ..Default::default()
            })
            .collect();
        let before = cats.clone();
        assert!(desk.reorder_categories(&mut cats, 3, 1).await.is_err());
        assert_eq!(cats, before);
    }

    #[tokio::test]
    async fn mutations_drop_cached_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/contracts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "c1", "status": "draft"}
            ])))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/customers"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/contracts/c1/render"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let desk = desk(&server);
        assert_eq!(desk.tally().await.unwrap().draft, 1);
        desk.rows().await.unwrap();
        desk.render(&contract("c1", ContractStatus::Draft)).await.unwrap();
        desk.rows().await.unwrap();
    }

    #[tokio::test]
    async fn mapping_needs_extracted_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/contracts/templates/t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "t1", "name": "Storage", "extractedFields": []
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/contracts/ai-mapping"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"mappings": {}})))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/contracts/templates/t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "t1", "name": "Storage"})))
            .expect(0)
            .mount(&server)
            .await;

        let err = desk(&server).map_template_fields("t1").await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn mapping_merges_suggestions_and_saves() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/contracts/templates/t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "t1", "name": "Storage",
                "extractedFields": ["meno", "adresa"],
                "placeholderMappings": {"adresa": "customer.address"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/contracts/ai-mapping"))
            .and(body_json(json!({"extractedFields": ["meno", "adresa"]})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"mappings": {"meno": "customer.firstName"}})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/api/contracts/templates/t1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "t1", "name": "Storage"})))
            .expect(1)
            .mount(&server)
            .await;

        let template = desk(&server).map_template_fields("t1").await.unwrap();
        assert_eq!(template.placeholder_mappings.mapped_count(), 2);
        assert_eq!(template.placeholder_mappings.get("meno"), Some("customer.firstName"));
    }
}
