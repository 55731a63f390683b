use std::collections::BTreeMap;

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::contracts::status::ContractStatus;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailAddress {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub email_address: EmailAddress,
}

impl Recipient {
    /// Display name, falling back to the bare address.
    pub fn label(&self) -> &str {
        if self.email_address.name.is_empty() {
            &self.email_address.address
        } else {
            &self.email_address.name
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailBody {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub content_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    pub id: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub from: Option<Recipient>,
    #[serde(default)]
    pub to_recipients: Vec<Recipient>,
    #[serde(default)]
    pub cc_recipients: Vec<Recipient>,
    #[serde(default)]
    pub received_date_time: Option<String>,
    #[serde(default)]
    pub sent_date_time: Option<String>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub body_preview: String,
    #[serde(default)]
    pub body: Option<EmailBody>,
    #[serde(default)]
    pub has_attachments: bool,
    #[serde(default)]
    pub importance: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MailFolder {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub unread_item_count: u32,
    #[serde(default)]
    pub total_item_count: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MailboxKind {
    Personal,
    Shared,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Mailbox {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(rename = "type")]
    pub kind: MailboxKind,
    #[serde(default)]
    pub is_default: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoldersResponse {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub folders: Vec<MailFolder>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderMessages {
    #[serde(default)]
    pub connected: bool,
    #[serde(default)]
    pub emails: Vec<EmailMessage>,
    #[serde(default)]
    pub total_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendEmailRequest {
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    pub body: String,
    pub mailbox_email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    pub email_id: String,
    pub body: String,
    pub reply_all: bool,
    pub mailbox_email: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForwardRequest {
    pub email_id: String,
    pub to: Vec<String>,
    pub body: String,
    pub mailbox_email: String,
}

/// Splits a comma separated recipient field, dropping blanks.
pub fn split_recipients(field: &str) -> Vec<String> {
    field
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub assigned_user_id: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
}

impl Task {
    pub fn is_pending(&self) -> bool {
        self.status == "pending"
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// A CRM user, as listed by `GET /api/users`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub full_name: String,
}

impl User {
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() { &self.username } else { &self.full_name }
    }
}

/// One thread with another user, derived from the flat chat log.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatConversation {
    pub partner_id: String,
    pub partner_name: String,
    pub last_message: ChatMessage,
    pub unread_count: usize,
    pub message_count: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SmsDirection {
    Inbound,
    Outbound,
    #[default]
    #[serde(other)]
    Unknown,
}

impl SmsDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            SmsDirection::Inbound => "inbound",
            SmsDirection::Outbound => "outbound",
            SmsDirection::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SmsMessage {
    pub id: String,
    #[serde(default)]
    pub direction: SmsDirection,
    #[serde(default)]
    pub phone_number: String,
    #[serde(default, alias = "text", alias = "message")]
    pub content: String,
    #[serde(default)]
    pub delivery_status: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Field name -> CRM field name. Empty targets count as unmapped.
///
/// The backend sometimes stores this column as a JSON string instead of an
/// object; both forms are accepted and a malformed string decodes as empty.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PlaceholderMappings(pub BTreeMap<String, String>);

impl PlaceholderMappings {
    pub fn new() -> Self {
        Self::default()
    }

    /// The mapped CRM field, or `None` when missing or empty.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn set(&mut self, field: impl Into<String>, crm_field: impl Into<String>) {
        self.0.insert(field.into(), crm_field.into());
    }

    pub fn mapped_count(&self) -> usize {
        self.0.values().filter(|v| !v.is_empty()).count()
    }

    /// Fields from `fields` that have no usable mapping yet.
    pub fn unmapped<'a>(&self, fields: &'a [String]) -> Vec<&'a str> {
        fields
            .iter()
            .map(String::as_str)
            .filter(|f| self.get(f).is_none())
            .collect()
    }

    /// Overlays `other` on top of `self`; incoming keys win.
    pub fn merge(&mut self, other: PlaceholderMappings) {
        self.0.extend(other.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for PlaceholderMappings {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let obj = match unwrap_embedded_json(value, "placeholderMappings") {
            Value::Object(obj) => obj,
            _ => return Ok(Self::default()),
        };
        let map = obj
            .into_iter()
            .filter_map(|(k, v)| match v {
                Value::String(s) => Some((k, s)),
                Value::Null => Some((k, String::new())),
                _ => None,
            })
            .collect();
        Ok(Self(map))
    }
}

/// Placeholder names found in an uploaded document.
///
/// Entries may be plain strings or objects carrying a `name`; blanks are dropped.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct ExtractedFields(pub Vec<String>);

impl ExtractedFields {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'de> Deserialize<'de> for ExtractedFields {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let items = match unwrap_embedded_json(value, "extractedFields") {
            Value::Array(items) => items,
            _ => return Ok(Self::default()),
        };
        let fields = items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Object(mut obj) => match obj.remove("name") {
                    Some(Value::String(s)) => Some(s),
                    _ => None,
                },
                _ => None,
            })
            .filter(|s| !s.trim().is_empty())
            .collect();
        Ok(Self(fields))
    }
}

/// Decodes a JSON document that was stored inside a string column.
fn unwrap_embedded_json(value: Value, field: &str) -> Value {
    match value {
        Value::String(raw) => match serde_json::from_str(&raw) {
            Ok(inner) => inner,
            Err(e) => {
                log::warn!("failed to parse {field}: {e}");
                Value::Null
            }
        },
        other => other,
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContractCategory {
    pub id: i64,
    pub value: String,
    pub label: String,
    #[serde(default)]
    pub label_sk: Option<String>,
    #[serde(default)]
    pub label_cz: Option<String>,
    #[serde(default)]
    pub label_hu: Option<String>,
    #[serde(default)]
    pub label_ro: Option<String>,
    #[serde(default)]
    pub label_it: Option<String>,
    #[serde(default)]
    pub label_de: Option<String>,
    #[serde(default)]
    pub label_us: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CategoryForm {
    pub value: String,
    pub label: String,
    pub label_sk: String,
    pub label_cz: String,
    pub label_hu: String,
    pub label_ro: String,
    pub label_it: String,
    pub label_de: String,
    pub label_us: String,
    pub description: String,
    pub sort_order: i32,
}

impl From<&ContractCategory> for CategoryForm {
    fn from(c: &ContractCategory) -> Self {
        let own = |s: &Option<String>| s.clone().unwrap_or_default();
        Self {
            value: c.value.clone(),
            label: c.label.clone(),
            label_sk: own(&c.label_sk),
            label_cz: own(&c.label_cz),
            label_hu: own(&c.label_hu),
            label_ro: own(&c.label_ro),
            label_it: own(&c.label_it),
            label_de: own(&c.label_de),
            label_us: own(&c.label_us),
            description: own(&c.description),
            sort_order: c.sort_order,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContractTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub language_code: String,
    #[serde(default)]
    pub country_code: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub content_html: Option<String>,
    #[serde(default)]
    pub source_docx_path: Option<String>,
    #[serde(default)]
    pub extracted_fields: ExtractedFields,
    #[serde(default)]
    pub placeholder_mappings: PlaceholderMappings,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl ContractTemplate {
    pub fn is_published(&self) -> bool {
        self.status == "published"
    }
}

/// Payload for creating or updating a template.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TemplateForm {
    pub name: String,
    pub category: String,
    pub language_code: String,
    pub description: String,
    pub country_code: String,
    pub content_html: String,
    pub loaded_from_category: bool,
    pub loaded_category_id: Option<i64>,
    pub source_docx_path: String,
    pub extracted_fields: ExtractedFields,
    pub placeholder_mappings: PlaceholderMappings,
}

impl From<&ContractTemplate> for TemplateForm {
    fn from(t: &ContractTemplate) -> Self {
        Self {
            name: t.name.clone(),
            category: t.category.clone(),
            language_code: t.language_code.clone(),
            description: t.description.clone().unwrap_or_default(),
            country_code: t.country_code.clone(),
            content_html: t.content_html.clone().unwrap_or_default(),
            loaded_from_category: false,
            loaded_category_id: None,
            source_docx_path: t.source_docx_path.clone().unwrap_or_default(),
            extracted_fields: t.extracted_fields.clone(),
            placeholder_mappings: t.placeholder_mappings.clone(),
        }
    }
}

/// The per-country DOCX a category ships with.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DefaultTemplate {
    #[serde(default)]
    pub template_type: Option<String>,
    #[serde(default)]
    pub source_docx_path: Option<String>,
    #[serde(default)]
    pub extracted_fields: ExtractedFields,
    #[serde(default)]
    pub placeholder_mappings: PlaceholderMappings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    #[serde(default)]
    pub extracted_fields: ExtractedFields,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocxPreview {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AiMappingResult {
    #[serde(default)]
    pub mappings: PlaceholderMappings,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaceholderReplacement {
    pub placeholder: String,
    #[serde(default)]
    pub crm_field: Option<String>,
    #[serde(default)]
    pub original_text: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiInsertResult {
    #[serde(default)]
    pub replacements: Vec<PlaceholderReplacement>,
    #[serde(default)]
    pub suggested_mappings: PlaceholderMappings,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub country: String,
}

impl Customer {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContractInstance {
    pub id: String,
    #[serde(default)]
    pub contract_number: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub status: ContractStatus,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    #[serde(default)]
    pub termination_reason: Option<String>,
    #[serde(default)]
    pub rendered_html: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerificationMethod {
    #[default]
    EmailOtp,
    SmsOtp,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SignatureRequest {
    pub id: String,
    #[serde(default)]
    pub contract_id: String,
    #[serde(default)]
    pub signer_name: String,
    #[serde(default)]
    pub signer_email: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub otp_verified_at: Option<String>,
    #[serde(default)]
    pub verification_method: Option<VerificationMethod>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendContractResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub signature_requests: Vec<SignatureRequest>,
    #[serde(default)]
    pub verification_method: Option<VerificationMethod>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpResult {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub signature_request_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn mappings_accept_object_and_string() {
        let direct: PlaceholderMappings =
            serde_json::from_value(json!({"meno": "customer.firstName", "adresa": ""})).unwrap();
        assert_eq!(direct.get("meno"), Some("customer.firstName"));
        assert_eq!(direct.get("adresa"), None);
        assert_eq!(direct.mapped_count(), 1);

        let embedded: PlaceholderMappings =
            serde_json::from_value(json!("{\"meno\":\"customer.firstName\"}")).unwrap();
        assert_eq!(embedded, {
            let mut m = PlaceholderMappings::new();
            m.set("meno", "customer.firstName");
            m
        });
    }

    #[test]
    fn malformed_mapping_string_is_empty() {
        let parsed: PlaceholderMappings = serde_json::from_value(json!("{not json")).unwrap();
        assert!(parsed.is_empty());
        let null: PlaceholderMappings = serde_json::from_value(Value::Null).unwrap();
        assert!(null.is_empty());
    }

    #[test]
    fn extracted_fields_normalise_objects_and_blanks() {
        let fields: ExtractedFields =
            serde_json::from_value(json!(["meno", {"name": "adresa"}, {"label": "x"}, " ", 3]))
                .unwrap();
        assert_eq!(fields.as_slice(), ["meno".to_string(), "adresa".to_string()]);

        let embedded: ExtractedFields = serde_json::from_value(json!("[\"a\",\"b\"]")).unwrap();
        assert_eq!(embedded.len(), 2);
    }

    #[test]
    fn template_row_with_string_columns() {
        let tpl: ContractTemplate = serde_json::from_value(json!({
            "id": "t1",
            "name": "Storage SK",
            "category": "storage",
            "countryCode": "SK",
            "status": "published",
            "extractedFields": "[\"meno\"]",
            "placeholderMappings": "{\"meno\":\"customer.firstName\"}"
        }))
        .unwrap();
        assert!(tpl.is_published());
        assert_eq!(tpl.placeholder_mappings.get("meno"), Some("customer.firstName"));
        assert!(tpl.placeholder_mappings.unmapped(tpl.extracted_fields.as_slice()).is_empty());
    }

    #[test]
    fn unknown_sms_direction_and_aliases() {
        let sms: SmsMessage = serde_json::from_value(json!({
            "id": "s1",
            "direction": "sideways",
            "text": "hello"
        }))
        .unwrap();
        assert_eq!(sms.direction, SmsDirection::Unknown);
        assert_eq!(sms.content, "hello");
    }

    #[test]
    fn recipients_split_and_trim() {
        assert_eq!(
            split_recipients(" a@x.sk, ,b@x.sk,"),
            vec!["a@x.sk".to_string(), "b@x.sk".to_string()]
        );
        assert!(split_recipients("  ").is_empty());
    }
}
