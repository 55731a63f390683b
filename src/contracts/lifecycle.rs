//! Contract actions and the OTP signing dialog.
//!
//! The backend owns every transition. This module only decides which actions
//! are offered for a status and keeps the signing dialog in a shape where
//! "sign" cannot be reached before the one-time code was verified.

use crate::api::models::{SignatureRequest, VerificationMethod};
use crate::contracts::status::ContractStatus;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContractAction {
    ManageSigners,
    Send,
    Sign,
    Cancel,
    Render,
    Regenerate,
}

pub fn available_actions(status: ContractStatus) -> Vec<ContractAction> {
    use ContractAction::*;
    use ContractStatus as S;

    let mut actions = Vec::new();
    if status == S::Draft {
        actions.extend([ManageSigners, Send]);
    }
    if matches!(status, S::Sent | S::PendingSignature) {
        actions.push(Sign);
    }
    if matches!(status, S::Draft | S::Sent) {
        actions.push(Cancel);
    }
    if !status.is_closed() {
        actions.extend([Render, Regenerate]);
    }
    actions
}

pub fn can(status: ContractStatus, action: ContractAction) -> bool {
    available_actions(status).contains(&action)
}

/// Picks the signature request the dialog should work on.
///
/// A request that already passed OTP wins, then one that was sent, then any
/// request not yet signed.
pub fn active_request(requests: &[SignatureRequest]) -> Option<&SignatureRequest> {
    requests
        .iter()
        .find(|r| r.status == "otp_verified")
        .or_else(|| requests.iter().find(|r| r.status == "sent"))
        .or_else(|| requests.iter().find(|r| r.status != "signed"))
}

/// Checks the shape of a one-time code before it is sent for verification.
pub fn validate_otp(code: &str) -> Result<&str> {
    let code = code.trim();
    if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(code)
    } else {
        Err(Error::validation("the verification code must be 6 digits"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigningDialog {
    Closed,
    /// A code was (or is about to be) delivered; waiting for the signer to type it.
    AwaitingCode {
        contract_id: String,
        request_id: Option<String>,
        method: VerificationMethod,
    },
    /// OTP accepted; signature data can be captured.
    Verified {
        contract_id: String,
        request_id: String,
        signature: String,
    },
}

impl Default for SigningDialog {
    fn default() -> Self {
        SigningDialog::Closed
    }
}

impl SigningDialog {
    /// Opens the dialog for a contract in a signable status.
    pub fn open(
        contract_id: impl Into<String>,
        status: ContractStatus,
        requests: &[SignatureRequest],
    ) -> Result<Self> {
        if !can(status, ContractAction::Sign) {
            return Err(Error::InvalidTransition {
                action: "open signing",
                state: "contract is not awaiting a signature",
            });
        }
        let contract_id = contract_id.into();
        Ok(match active_request(requests) {
            Some(r) if r.status == "otp_verified" => SigningDialog::Verified {
                contract_id,
                request_id: r.id.clone(),
                signature: String::new(),
            },
            Some(r) => SigningDialog::AwaitingCode {
                contract_id,
                request_id: Some(r.id.clone()),
                method: r.verification_method.unwrap_or_default(),
            },
            None => SigningDialog::AwaitingCode {
                contract_id,
                request_id: None,
                method: VerificationMethod::default(),
            },
        })
    }

    pub fn state_name(&self) -> &'static str {
        match self {
            SigningDialog::Closed => "closed",
            SigningDialog::AwaitingCode { .. } => "awaiting code",
            SigningDialog::Verified { .. } => "verified",
        }
    }

    pub fn otp_verified(&self) -> bool {
        matches!(self, SigningDialog::Verified { .. })
    }

    pub fn can_sign(&self) -> bool {
        matches!(self, SigningDialog::Verified { signature, .. } if !signature.trim().is_empty())
    }

    pub fn contract_id(&self) -> Option<&str> {
        match self {
            SigningDialog::Closed => None,
            SigningDialog::AwaitingCode { contract_id, .. }
            | SigningDialog::Verified { contract_id, .. } => Some(contract_id.as_str()),
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            SigningDialog::Closed => None,
            SigningDialog::AwaitingCode { request_id, .. } => request_id.as_deref(),
            SigningDialog::Verified { request_id, .. } => Some(request_id.as_str()),
        }
    }

    /// Switches the delivery channel for the next resend.
    pub fn choose_method(&mut self, new_method: VerificationMethod) -> Result<()> {
        match self {
            SigningDialog::AwaitingCode { method, .. } => {
                *method = new_method;
                Ok(())
            }
            other => Err(Error::InvalidTransition {
                action: "change the code channel",
                state: other.state_name(),
            }),
        }
    }

    /// Records the request id handed back by a send or resend.
    pub fn code_sent(&mut self, id: impl Into<String>) -> Result<()> {
        match self {
            SigningDialog::AwaitingCode { request_id, .. } => {
                *request_id = Some(id.into());
                Ok(())
            }
            other => Err(Error::InvalidTransition {
                action: "record a sent code",
                state: other.state_name(),
            }),
        }
    }

    /// Moves to `Verified` once the backend accepted the code.
    pub fn verified(&mut self, confirmed_request: Option<String>) -> Result<()> {
        let next = match self {
            SigningDialog::AwaitingCode {
                contract_id,
                request_id,
                ..
            } => {
                let request_id = confirmed_request
                    .or_else(|| request_id.clone())
                    .ok_or(Error::InvalidTransition {
                        action: "verify",
                        state: "no signature request",
                    })?;
                SigningDialog::Verified {
                    contract_id: contract_id.clone(),
                    request_id,
                    signature: String::new(),
                }
            }
            other => {
                return Err(Error::InvalidTransition {
                    action: "verify",
                    state: other.state_name(),
                });
            }
        };
        *self = next;
        Ok(())
    }

    pub fn set_signature(&mut self, data: impl Into<String>) -> Result<()> {
        match self {
            SigningDialog::Verified { signature, .. } => {
                *signature = data.into();
                Ok(())
            }
            other => Err(Error::InvalidTransition {
                action: "capture a signature",
                state: other.state_name(),
            }),
        }
    }

    /// The `(contract, request, signature)` triple to submit, if signing is allowed.
    pub fn submission(&self) -> Result<(&str, &str, &str)> {
        match self {
            SigningDialog::Verified {
                contract_id,
                request_id,
                signature,
            } if !signature.trim().is_empty() => {
                Ok((contract_id.as_str(), request_id.as_str(), signature.as_str()))
            }
            SigningDialog::Verified { .. } => Err(Error::validation("signature is empty")),
            other => Err(Error::InvalidTransition {
                action: "sign",
                state: other.state_name(),
            }),
        }
    }

    pub fn reset(&mut self) {
        *self = SigningDialog::Closed;
    }
}
