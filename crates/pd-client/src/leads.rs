//! Lead listing and mutation.
//!
//! The backend enforces no uniqueness on leads, so create and update
//! run a client-side duplicate sweep first: the full lead set is
//! paged in and compared by normalized email and phone before the
//! write is sent.

use crate::auth::AuthSession;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::scan::PageSource;
use async_trait::async_trait;
use pd_common::{normalize_phone, Lead, LeadDraft, Page, PageBody};
use reqwest::Method;
use std::sync::Arc;
use tracing::debug;

const LEADS_PATH: &str = "/crm-leads";

/// Lead endpoints. Obtained from [`Client::leads`](crate::Client::leads).
pub struct Leads {
    auth: Arc<AuthSession>,
    config: Arc<Config>,
}

impl Leads {
    pub(crate) fn new(auth: Arc<AuthSession>, config: Arc<Config>) -> Self {
        Self { auth, config }
    }

    /// Fetch one page of leads. `query` narrows server-side on raw
    /// columns; derived labels need client-side matching on top.
    pub async fn list(
        &self,
        take: usize,
        cursor: Option<&str>,
        query: Option<&str>,
    ) -> Result<Page<Lead>> {
        let mut params: Vec<(&str, String)> = vec![("take", take.to_string())];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            params.push(("q", query.to_string()));
        }

        let request = self.auth.request(Method::GET, LEADS_PATH).query(&params);
        let response = self.auth.send(request).await?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }
        let body: PageBody<Lead> = response.json().await?;
        Ok(body.into_page())
    }

    /// Create a lead after screening the existing set for duplicates.
    pub async fn create(&self, draft: &LeadDraft) -> Result<Lead> {
        let existing = self.list_all().await?;
        check_duplicates(draft, &existing, None)?;

        let request = self.auth.request(Method::POST, LEADS_PATH).json(draft);
        let response = self.auth.send(request).await?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }
        let lead: Lead = response.json().await?;
        debug!(lead_id = lead.id, "Lead created");
        Ok(lead)
    }

    /// Update a lead. The duplicate sweep skips the record itself.
    pub async fn update(&self, id: i64, draft: &LeadDraft) -> Result<Lead> {
        let existing = self.list_all().await?;
        check_duplicates(draft, &existing, Some(id))?;

        let path = format!("{LEADS_PATH}/{id}");
        let request = self.auth.request(Method::PUT, &path).json(draft);
        let response = self.auth.send(request).await?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }
        Ok(response.json().await?)
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let path = format!("{LEADS_PATH}/{id}");
        let request = self.auth.request(Method::DELETE, &path);
        let response = self.auth.send(request).await?;
        if !response.status().is_success() {
            return Err(Error::from_response(response).await);
        }
        debug!(lead_id = id, "Lead deleted");
        Ok(())
    }

    /// Walk the whole cursor chain. Used by the duplicate sweep, which
    /// has to see every record to be conclusive.
    async fn list_all(&self) -> Result<Vec<Lead>> {
        let mut all = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self
                .list(self.config.page_size, cursor.as_deref(), None)
                .await?;
            all.extend(page.items);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(all)
    }
}

#[async_trait]
impl PageSource<Lead> for Leads {
    async fn fetch_page(
        &self,
        query: &str,
        take: usize,
        cursor: Option<&str>,
    ) -> Result<Page<Lead>> {
        let query = Some(query).filter(|q| !q.is_empty());
        self.list(take, cursor, query).await
    }
}

/// Screen `draft` against `existing` records. Emails compare
/// lowercased, phones compare by digits only, and `exclude` names the
/// record being updated. Blank draft fields never collide.
pub fn check_duplicates(draft: &LeadDraft, existing: &[Lead], exclude: Option<i64>) -> Result<()> {
    let email = draft.email.to_lowercase();
    let phone = draft
        .phone
        .as_deref()
        .map(normalize_phone)
        .filter(|digits| !digits.is_empty());

    for lead in existing {
        if exclude == Some(lead.id) {
            continue;
        }
        if !email.is_empty() && lead.email.to_lowercase() == email {
            return Err(Error::Duplicate {
                field: "email",
                value: lead.email.clone(),
            });
        }
        if let Some(digits) = &phone {
            let existing_digits = lead.phone.as_deref().map(normalize_phone);
            if existing_digits.as_deref() == Some(digits) {
                return Err(Error::Duplicate {
                    field: "phone",
                    value: lead.phone.clone().unwrap_or_default(),
                });
            }
        }
    }
    Ok(())
}
