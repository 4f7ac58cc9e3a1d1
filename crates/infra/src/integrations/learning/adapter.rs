//! `DirectoryAdapter` implementation for the learning platform.
//!
//! Person records use the local person id as sourcedId, so the external id
//! equals the person id. `createPerson` has replace semantics on the
//! platform and `deletePerson` succeeds for absent persons, which keeps
//! both operations safely repeatable.

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use stellwerk_core::DirectoryAdapter;
use stellwerk_domain::{
    AdapterError, AdapterResult, ExternalSystem, IdentityParams, ItemOutcome, LearningConfig,
    MassResult, MembershipParams, RemoteMembership,
};
use tracing::{debug, info, instrument};

use super::wire;
use crate::errors::InfraError;
use crate::http::HttpClient;

pub struct LearningAdapter {
    config: LearningConfig,
    http: HttpClient,
}

impl LearningAdapter {
    pub fn new(config: LearningConfig) -> AdapterResult<Self> {
        let http = HttpClient::builder().timeout(config.timeout()).build()?;
        Ok(Self { config, http })
    }

    async fn post(&self, body: String) -> AdapterResult<String> {
        let request = self
            .http
            .request(Method::POST, &self.config.endpoint)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(body);
        let response = self.http.send_checked(request).await?;
        response
            .text()
            .await
            .map_err(|e| InfraError::from(e).into())
    }

    async fn mass_call(&self, body: String, submitted: &[String]) -> AdapterResult<MassResult> {
        let text = self.post(body).await?;
        let results = wire::parse_mass_response(&text)?;
        Ok(fold_results(results, submitted))
    }
}

#[async_trait]
impl DirectoryAdapter for LearningAdapter {
    fn system(&self) -> ExternalSystem {
        ExternalSystem::LearningPlatform
    }

    #[instrument(skip(self))]
    async fn read_memberships(&self, person_id: &str) -> AdapterResult<Vec<RemoteMembership>> {
        let text = self.post(wire::read_memberships_request(person_id)).await?;
        let memberships = wire::parse_memberships_response(&text, person_id)?;
        debug!(count = memberships.len(), "read learning memberships");
        Ok(memberships)
    }

    #[instrument(skip(self, params), fields(count = params.len()))]
    async fn upsert_memberships(&self, params: Vec<MembershipParams>) -> AdapterResult<MassResult> {
        if params.is_empty() {
            return Ok(MassResult::default());
        }
        let submitted: Vec<String> = params.iter().map(|p| p.membership_id.clone()).collect();
        self.mass_call(wire::create_memberships_request(&params), &submitted)
            .await
    }

    #[instrument(skip(self, membership_ids), fields(count = membership_ids.len()))]
    async fn delete_memberships(&self, membership_ids: Vec<String>) -> AdapterResult<MassResult> {
        if membership_ids.is_empty() {
            return Ok(MassResult::default());
        }
        self.mass_call(
            wire::delete_memberships_request(&membership_ids),
            &membership_ids,
        )
        .await
    }

    #[instrument(skip(self, params), fields(person_id = %params.person_id))]
    async fn create_identity(&self, params: &IdentityParams) -> AdapterResult<String> {
        let text = self.post(wire::create_person_request(params)).await?;
        let result = single_result(wire::parse_mass_response(&text)?, &params.person_id)?;
        if !result.success {
            return Err(AdapterError::RemoteValidation(
                result
                    .description
                    .unwrap_or_else(|| String::from("createPerson reported failure")),
            ));
        }
        info!("learning identity created");
        Ok(params.person_id.clone())
    }

    #[instrument(skip(self))]
    async fn delete_identity(&self, external_id: &str) -> AdapterResult<()> {
        let text = self.post(wire::delete_person_request(external_id)).await?;
        let result = single_result(wire::parse_mass_response(&text)?, external_id)?;
        if !result.success {
            return Err(AdapterError::RemoteValidation(
                result
                    .description
                    .unwrap_or_else(|| String::from("deletePerson reported failure")),
            ));
        }
        info!(person_id = %external_id, "learning identity deleted");
        Ok(())
    }
}

/// Joins submitted ids with reported results; ids the platform stayed
/// silent about count as failed.
fn fold_results(results: Vec<wire::ItemResult>, submitted: &[String]) -> MassResult {
    let mut by_id: HashMap<String, wire::ItemResult> = results
        .into_iter()
        .map(|r| (r.sourced_id.clone(), r))
        .collect();
    let mut outcomes = Vec::with_capacity(submitted.len());
    for id in submitted {
        let outcome = match by_id.remove(id) {
            Some(result) if result.success => ItemOutcome::ok(id.clone()),
            Some(result) => ItemOutcome::failed(
                id.clone(),
                result
                    .description
                    .unwrap_or_else(|| String::from("remote reported failure")),
            ),
            None => ItemOutcome::failed(id.clone(), "no result reported for this item"),
        };
        outcomes.push(outcome);
    }
    MassResult::new(outcomes)
}

fn single_result(
    results: Vec<wire::ItemResult>,
    sourced_id: &str,
) -> AdapterResult<wire::ItemResult> {
    results
        .into_iter()
        .find(|r| r.sourced_id == sourced_id)
        .ok_or_else(|| {
            AdapterError::RemoteValidation(format!("no result reported for {sourced_id}"))
        })
}
