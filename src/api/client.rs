use reqwest::multipart::{Form, Part};
use reqwest::{Client as HttpClient, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::api::models::{
    AiInsertResult, AiMappingResult, CategoryForm, ChatMessage, ContractCategory, ContractInstance,
    ContractTemplate, Customer, DefaultTemplate, DocxPreview, EmailMessage, FolderMessages,
    FoldersResponse, ForwardRequest, MailFolder, Mailbox, PlaceholderMappings, ReplyRequest,
    SendContractResult, SendEmailRequest, SignatureRequest, SmsMessage, Task, TemplateForm,
    UploadResult, User, VerificationMethod, VerifyOtpResult,
};
use crate::app::AppState;
use crate::error::{Error, Result};
use crate::utils::normalize_url;

/// REST client for the CRM backend.
#[derive(Clone)]
pub struct ApiClient {
    http: HttpClient,
    base_api: String,
    token: Option<String>,
    user_id: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Self {
        Self {
            http: HttpClient::new(),
            base_api: Self::base_api(&normalize_url(base_url)),
            token,
            user_id: None,
        }
    }

    pub fn from_state(state: &AppState) -> Result<Self> {
        if !state.is_configured() {
            return Err(Error::Config("base_url is not set".into()));
        }
        url::Url::parse(&state.base_url)
            .map_err(|e| Error::Config(format!("invalid base_url {:?}: {e}", state.base_url)))?;
        Ok(Self::new(&state.base_url, state.token.clone()).with_user(state.user_id.clone()))
    }

    pub fn with_user(mut self, user_id: Option<String>) -> Self {
        self.user_id = user_id;
        self
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    fn base_api(base_url: &str) -> String {
        let trimmed = base_url.trim_end_matches('/');
        if trimmed.ends_with("/api") { trimmed.to_string() } else { format!("{}/api", trimmed) }
    }

    fn with_auth(mut req: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        if let Some(t) = token {
            req = req.header("Authorization", format!("Bearer {}", t));
        }
        req
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_api, path);
        log::debug!("{method} {url}");
        Self::with_auth(self.http.request(method, url), self.token.as_deref())
    }

    fn user_path(&self, suffix: &str) -> Result<String> {
        let uid = self
            .user_id
            .as_deref()
            .ok_or_else(|| Error::Config("user_id is not set".into()))?;
        Ok(format!("/users/{uid}/{suffix}"))
    }

    /// Turns a non-2xx response into `Error::Http`, preferring the backend's own message.
    async fn check(resp: Response) -> Result<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| {
                v.get("error")
                    .or_else(|| v.get("message"))
                    .and_then(|m| m.as_str())
                    .map(String::from)
            })
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            });
        log::warn!("HTTP {} from backend: {}", status.as_u16(), message);
        Err(Error::Http {
            status: status.as_u16(),
            message,
        })
    }

    async fn fetch<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let resp = Self::check(req.send().await?).await?;
        Ok(resp.json::<T>().await?)
    }

    async fn execute(&self, req: RequestBuilder) -> Result<()> {
        Self::check(req.send().await?).await?;
        Ok(())
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.fetch(self.request(Method::GET, path)).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.fetch(self.request(Method::POST, path).json(body)).await
    }

    async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.fetch(self.request(Method::PATCH, path).json(body)).await
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.execute(self.request(Method::DELETE, path)).await
    }

    pub async fn templates(&self, country: Option<&str>) -> Result<Vec<ContractTemplate>> {
        let mut req = self.request(Method::GET, "/contracts/templates");
        if let Some(c) = country {
            req = req.query(&[("country", c)]);
        }
        self.fetch(req).await
    }

    pub async fn template(&self, id: &str) -> Result<ContractTemplate> {
        self.get(&format!("/contracts/templates/{id}")).await
    }

    pub async fn create_template(&self, form: &TemplateForm) -> Result<ContractTemplate> {
        self.post("/contracts/templates", form).await
    }

    pub async fn update_template(&self, id: &str, form: &TemplateForm) -> Result<ContractTemplate> {
        self.patch(&format!("/contracts/templates/{id}"), form).await
    }

    pub async fn delete_template(&self, id: &str) -> Result<()> {
        self.delete(&format!("/contracts/templates/{id}")).await
    }

    pub async fn categories(&self) -> Result<Vec<ContractCategory>> {
        let mut cats: Vec<ContractCategory> = self.get("/contracts/categories").await?;
        cats.sort_by_key(|c| c.sort_order);
        Ok(cats)
    }

    pub async fn create_category(&self, form: &CategoryForm) -> Result<ContractCategory> {
        self.post("/contracts/categories", form).await
    }

    pub async fn update_category(&self, id: i64, form: &CategoryForm) -> Result<ContractCategory> {
        self.patch(&format!("/contracts/categories/{id}"), form).await
    }

    pub async fn delete_category(&self, id: i64) -> Result<()> {
        self.delete(&format!("/contracts/categories/{id}")).await
    }

    pub async fn reorder_categories(&self, ordered_ids: &[i64]) -> Result<()> {
        let req = self
            .request(Method::POST, "/contracts/categories/reorder")
            .json(&json!({ "orderedIds": ordered_ids }));
        self.execute(req).await
    }

    /// Uploads the DOCX a category uses for `country` and returns the placeholders found in it.
    pub async fn upload_default_template(
        &self,
        category_id: i64,
        country: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResult> {
        let part = Part::bytes(bytes).file_name(file_name.to_string()).mime_str(
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        )?;
        let form = Form::new()
            .part("file", part)
            .text("countryCode", country.to_string());
        let req = self
            .request(
                Method::POST,
                &format!("/contracts/categories/{category_id}/default-templates/upload"),
            )
            .multipart(form);
        self.fetch(req).await
    }

    pub async fn default_template(&self, category_id: i64, country: &str) -> Result<DefaultTemplate> {
        self.get(&format!(
            "/contracts/categories/{category_id}/default-templates/{country}"
        ))
        .await
    }

    /// Plain text of a category DOCX with `{{placeholders}}` or, with sample data, `«values»`.
    pub async fn docx_preview(&self, category_id: i64, country: &str, with_sample_data: bool) -> Result<String> {
        let mut req = self.request(
            Method::GET,
            &format!("/contracts/categories/{category_id}/default-templates/{country}/docx-preview"),
        );
        if with_sample_data {
            req = req.query(&[("withSampleData", "true")]);
        }
        let preview: DocxPreview = self.fetch(req).await?;
        Ok(preview.text)
    }

    pub async fn ai_mapping(&self, extracted_fields: &[String]) -> Result<PlaceholderMappings> {
        let result: AiMappingResult = self
            .post("/contracts/ai-mapping", &json!({ "extractedFields": extracted_fields }))
            .await?;
        Ok(result.mappings)
    }

    pub async fn ai_insert_placeholders(&self, category_id: i64, country: &str) -> Result<AiInsertResult> {
        self.post(
            "/contracts/ai-insert-placeholders",
            &json!({ "categoryId": category_id, "countryCode": country }),
        )
        .await
    }

    pub async fn contracts(&self) -> Result<Vec<ContractInstance>> {
        self.get("/contracts").await
    }

    pub async fn contract(&self, id: &str) -> Result<ContractInstance> {
        self.get(&format!("/contracts/{id}")).await
    }

    pub async fn customers(&self) -> Result<Vec<Customer>> {
        self.get("/customers").await
    }

    pub async fn signature_requests(&self, contract_id: &str) -> Result<Vec<SignatureRequest>> {
        self.get(&format!("/contracts/{contract_id}/signature-requests")).await
    }

    pub async fn send_contract(&self, id: &str, method: VerificationMethod) -> Result<SendContractResult> {
        let result: SendContractResult = self
            .post(&format!("/contracts/{id}/send"), &json!({ "verificationMethod": method }))
            .await?;
        match (&result.error, result.success) {
            (Some(err), false) => Err(Error::Rejected(err.clone())),
            _ => Ok(result),
        }
    }

    pub async fn verify_otp(&self, id: &str, request_id: &str, code: &str) -> Result<VerifyOtpResult> {
        self.post(
            &format!("/contracts/{id}/verify-otp"),
            &json!({ "otpCode": code, "signatureRequestId": request_id }),
        )
        .await
    }

    pub async fn resend_otp(&self, id: &str, request_id: &str, method: VerificationMethod) -> Result<()> {
        let req = self
            .request(Method::POST, &format!("/contracts/{id}/resend-otp"))
            .json(&json!({ "signatureRequestId": request_id, "verificationMethod": method }));
        self.execute(req).await
    }

    pub async fn sign_contract(&self, id: &str, request_id: &str, signature_data: &str) -> Result<()> {
        let req = self
            .request(Method::POST, &format!("/contracts/{id}/sign"))
            .json(&json!({
                "signatureRequestId": request_id,
                "signatureData": signature_data,
                "signatureType": "typed",
            }));
        self.execute(req).await
    }

    pub async fn render_contract(&self, id: &str) -> Result<()> {
        self.execute(self.request(Method::POST, &format!("/contracts/{id}/render")))
            .await
    }

    pub async fn regenerate_contract(&self, id: &str) -> Result<()> {
        self.execute(self.request(Method::POST, &format!("/contracts/{id}/regenerate")))
            .await
    }

    pub async fn cancel_contract(&self, id: &str, reason: &str) -> Result<()> {
        let req = self
            .request(Method::POST, &format!("/contracts/{id}/cancel"))
            .json(&json!({ "reason": reason }));
        self.execute(req).await
    }

    pub async fn mailboxes(&self) -> Result<Vec<Mailbox>> {
        self.get(&self.user_path("ms365-available-mailboxes")?).await
    }

    pub async fn folders(&self, mailbox: &str) -> Result<Vec<MailFolder>> {
        let req = self
            .request(Method::GET, &self.user_path("ms365-folders")?)
            .query(&[("mailbox", mailbox)]);
        let resp: FoldersResponse = self.fetch(req).await?;
        if !resp.connected {
            log::info!("mailbox {mailbox} is not connected");
        }
        Ok(resp.folders)
    }

    pub async fn folder_messages(&self, folder_id: &str, mailbox: &str, top: usize, skip: usize) -> Result<FolderMessages> {
        let req = self
            .request(Method::GET, &self.user_path(&format!("ms365-folder-messages/{folder_id}"))?)
            .query(&[
                ("mailbox", mailbox.to_string()),
                ("top", top.to_string()),
                ("skip", skip.to_string()),
            ]);
        self.fetch(req).await
    }

    pub async fn email(&self, id: &str, mailbox: &str) -> Result<EmailMessage> {
        let req = self
            .request(Method::GET, &self.user_path(&format!("ms365-email/{id}"))?)
            .query(&[("mailbox", mailbox)]);
        self.fetch(req).await
    }

    pub async fn send_email(&self, email: &SendEmailRequest) -> Result<()> {
        if email.to.is_empty() {
            return Err(Error::validation("at least one recipient is required"));
        }
        let req = self
            .request(Method::POST, &self.user_path("ms365-send-email")?)
            .json(email);
        self.execute(req).await
    }

    pub async fn reply(&self, reply: &ReplyRequest) -> Result<()> {
        let req = self
            .request(Method::POST, &self.user_path(&format!("ms365-reply/{}", reply.email_id))?)
            .json(reply);
        self.execute(req).await
    }

    pub async fn forward(&self, forward: &ForwardRequest) -> Result<()> {
        if forward.to.is_empty() {
            return Err(Error::validation("at least one recipient is required"));
        }
        let req = self
            .request(Method::POST, &self.user_path(&format!("ms365-forward/{}", forward.email_id))?)
            .json(forward);
        self.execute(req).await
    }

    pub async fn delete_email(&self, id: &str, mailbox: &str) -> Result<()> {
        let req = self
            .request(Method::DELETE, &self.user_path(&format!("ms365-email/{id}"))?)
            .query(&[("mailbox", mailbox)]);
        self.execute(req).await
    }

    pub async fn tasks(&self) -> Result<Vec<Task>> {
        self.get("/tasks").await
    }

    pub async fn sms_messages(&self) -> Result<Vec<SmsMessage>> {
        self.get("/sms-messages").await
    }

    pub async fn chat_messages(&self) -> Result<Vec<ChatMessage>> {
        self.get(&self.user_path("chat-messages")?).await
    }

    pub async fn users(&self) -> Result<Vec<User>> {
        self.get("/users").await
    }
}
