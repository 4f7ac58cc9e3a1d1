//! `DirectoryAdapter` implementation for the groupware platform.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Method;
use stellwerk_core::DirectoryAdapter;
use stellwerk_domain::{
    AdapterError, AdapterResult, ExternalSystem, GroupwareConfig, IdentityParams, ItemOutcome,
    MassResult, MembershipParams, MembershipStatus, RemoteMembership, RoleKind,
};
use tracing::{debug, info, instrument};

use super::soap::{parse_response, ActionCall, ActionResponse, RemoteGroup, RemoteStatus};
use super::token::SecurityToken;
use crate::errors::InfraError;
use crate::http::HttpClient;

/// Module set every provisioned user gets enabled.
const DEFAULT_MODULES: &[&str] = &["webmail", "calendar", "contacts", "infostore"];

/// Groupware adapter speaking the XML action protocol.
///
/// Memberships are realized as membership in a group named
/// `<groupId>#<role>`; the composite membership id reported on reads is
/// `<userId>:<remoteGroupId>` so deletes can address the exact pair.
pub struct GroupwareAdapter {
    config: GroupwareConfig,
    http: HttpClient,
}

impl GroupwareAdapter {
    pub fn new(config: GroupwareConfig) -> AdapterResult<Self> {
        let http = HttpClient::builder().timeout(config.timeout()).build()?;
        Ok(Self { config, http })
    }

    async fn call(&self, action: ActionCall<'_>) -> AdapterResult<ActionResponse> {
        let token = SecurityToken::generate();
        debug!(action = action.name(), "groupware call");
        let body = action.to_xml(&self.config.login, &self.config.password, &token);
        let request = self
            .http
            .request(Method::POST, &self.config.endpoint)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(body);
        let response = self.http.send_checked(request).await?;
        let text = response.text().await.map_err(InfraError::from)?;
        parse_response(&text)
    }

    fn context_arg(&self) -> String {
        self.config.context_id.to_string()
    }

    /// Groupware user id for the person, or `None` when not provisioned.
    async fn resolve_user(&self, person_id: &str) -> AdapterResult<Option<String>> {
        let response = self
            .call(
                ActionCall::new("resolveUser")
                    .arg("contextId", self.context_arg())
                    .arg("externalId", person_id),
            )
            .await?;
        if response.status == RemoteStatus::UserNotFound {
            return Ok(None);
        }
        let response = response.into_result()?;
        let id = response.id.ok_or_else(|| {
            AdapterError::RemoteValidation(String::from("resolveUser response carries no user id"))
        })?;
        Ok(Some(id))
    }

    async fn list_groups(&self, user_id: &str) -> AdapterResult<Vec<RemoteGroup>> {
        let response = self
            .call(
                ActionCall::new("listGroupsForUser")
                    .arg("contextId", self.context_arg())
                    .arg("userId", user_id),
            )
            .await?
            .into_result()?;
        Ok(response.groups)
    }

    async fn resolve_group_id(&self, name: &str) -> AdapterResult<String> {
        let resolved = self
            .call(
                ActionCall::new("resolveGroup")
                    .arg("contextId", self.context_arg())
                    .arg("name", name),
            )
            .await?
            .into_result()?;
        resolved.id.ok_or_else(|| {
            AdapterError::RemoteValidation(String::from(
                "resolveGroup response carries no group id",
            ))
        })
    }

    /// Remote id of the named group, creating the group when absent.
    async fn ensure_group(&self, name: &str) -> AdapterResult<String> {
        let resolved = self
            .call(
                ActionCall::new("resolveGroup")
                    .arg("contextId", self.context_arg())
                    .arg("name", name),
            )
            .await?;
        if resolved.status != RemoteStatus::GroupNotFound {
            let resolved = resolved.into_result()?;
            return resolved.id.ok_or_else(|| {
                AdapterError::RemoteValidation(String::from(
                    "resolveGroup response carries no group id",
                ))
            });
        }

        let created = self
            .call(
                ActionCall::new("createGroup")
                    .arg("contextId", self.context_arg())
                    .arg("name", name)
                    .arg("displayName", name),
            )
            .await?;
        // lost the creation race; the winner's id is authoritative
        if created.status == RemoteStatus::GroupExists {
            return self.resolve_group_id(name).await;
        }
        let created = created.into_result()?;
        created.id.ok_or_else(|| {
            AdapterError::RemoteValidation(String::from("createGroup response carries no group id"))
        })
    }

    async fn add_member(&self, group_id: &str, user_id: &str) -> AdapterResult<()> {
        let response = self
            .call(
                ActionCall::new("addMember")
                    .arg("contextId", self.context_arg())
                    .arg("groupId", group_id)
                    .arg("userId", user_id),
            )
            .await?;
        // already a member satisfies the upsert
        if response.status == RemoteStatus::MemberExists {
            return Ok(());
        }
        response.into_result()?;
        Ok(())
    }

    async fn remove_member(&self, group_id: &str, user_id: &str) -> AdapterResult<()> {
        let response = self
            .call(
                ActionCall::new("removeMember")
                    .arg("contextId", self.context_arg())
                    .arg("groupId", group_id)
                    .arg("userId", user_id),
            )
            .await?;
        // already absent satisfies the delete
        if response.status == RemoteStatus::NoSuchMember {
            return Ok(());
        }
        response.into_result()?;
        Ok(())
    }

    async fn apply_module_access(&self, user_id: &str) -> AdapterResult<()> {
        self.call(
            ActionCall::new("changeModuleAccess")
                .arg("contextId", self.context_arg())
                .arg("userId", user_id)
                .arg("modules", DEFAULT_MODULES.join(",")),
        )
        .await?
        .into_result()?;
        Ok(())
    }

    async fn upsert_one(
        &self,
        user_id: &str,
        current: &[RemoteGroup],
        param: &MembershipParams,
    ) -> AdapterResult<()> {
        let desired_name = group_name(&param.group_id, param.role);
        let group_id = self.ensure_group(&desired_name).await?;
        self.add_member(&group_id, user_id).await?;

        // a role change moves the user out of sibling role groups
        for group in current {
            let Some((local_id, role)) = split_group_name(&group.name) else {
                continue;
            };
            if local_id == param.group_id && role != param.role {
                self.remove_member(&group.id, user_id).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryAdapter for GroupwareAdapter {
    fn system(&self) -> ExternalSystem {
        ExternalSystem::Groupware
    }

    #[instrument(skip(self))]
    async fn read_memberships(&self, person_id: &str) -> AdapterResult<Vec<RemoteMembership>> {
        let Some(user_id) = self.resolve_user(person_id).await? else {
            return Ok(Vec::new());
        };
        let groups = self.list_groups(&user_id).await?;
        let mut memberships = Vec::with_capacity(groups.len());
        for group in groups {
            // groups outside the <groupId>#<role> scheme are not ours
            let Some((group_id, role)) = split_group_name(&group.name) else {
                continue;
            };
            memberships.push(RemoteMembership {
                membership_id: format!("{user_id}:{}", group.id),
                group_id: group_id.to_owned(),
                person_id: person_id.to_owned(),
                role,
                status: MembershipStatus::Active,
            });
        }
        debug!(count = memberships.len(), "read groupware memberships");
        Ok(memberships)
    }

    #[instrument(skip(self, params), fields(count = params.len()))]
    async fn upsert_memberships(&self, params: Vec<MembershipParams>) -> AdapterResult<MassResult> {
        if params.is_empty() {
            return Ok(MassResult::default());
        }
        let person_id = params[0].person_id.clone();
        let user_id = self.resolve_user(&person_id).await?.ok_or_else(|| {
            AdapterError::NotFound(format!("no groupware identity for person {person_id}"))
        })?;
        let current = self.list_groups(&user_id).await?;

        let mut outcomes = Vec::with_capacity(params.len());
        for param in &params {
            let outcome = match self.upsert_one(&user_id, &current, param).await {
                Ok(()) => ItemOutcome::ok(param.membership_id.clone()),
                // transport failures abort the batch so the caller can retry it whole
                Err(err) if err.is_retryable() => return Err(err),
                Err(err) => ItemOutcome::failed(param.membership_id.clone(), err.to_string()),
            };
            outcomes.push(outcome);
        }
        Ok(MassResult::new(outcomes))
    }

    #[instrument(skip(self, membership_ids), fields(count = membership_ids.len()))]
    async fn delete_memberships(&self, membership_ids: Vec<String>) -> AdapterResult<MassResult> {
        if membership_ids.is_empty() {
            return Ok(MassResult::default());
        }
        let mut outcomes = Vec::with_capacity(membership_ids.len());
        for membership_id in membership_ids {
            let parts = membership_id
                .split_once(':')
                .map(|(user, group)| (user.to_owned(), group.to_owned()));
            let Some((user_id, group_id)) = parts else {
                outcomes.push(ItemOutcome::failed(
                    membership_id,
                    "membership id is not of the form userId:groupId",
                ));
                continue;
            };
            let outcome = match self.remove_member(&group_id, &user_id).await {
                Ok(()) => ItemOutcome::ok(membership_id),
                Err(err) if err.is_retryable() => return Err(err),
                Err(err) => ItemOutcome::failed(membership_id, err.to_string()),
            };
            outcomes.push(outcome);
        }
        Ok(MassResult::new(outcomes))
    }

    #[instrument(skip(self, params), fields(person_id = %params.person_id))]
    async fn create_identity(&self, params: &IdentityParams) -> AdapterResult<String> {
        let user_id = match self.resolve_user(&params.person_id).await? {
            Some(existing) => {
                debug!(user_id = %existing, "groupware identity already present");
                existing
            }
            None => {
                let created = self
                    .call(
                        ActionCall::new("createUser")
                            .arg("contextId", self.context_arg())
                            .arg("externalId", params.person_id.as_str())
                            .arg("username", params.username.as_str())
                            .arg(
                                "displayName",
                                format!("{} {}", params.first_name, params.last_name),
                            )
                            .arg("givenName", params.first_name.as_str())
                            .arg("surName", params.last_name.as_str())
                            .arg("email", params.email.as_str()),
                    )
                    .await?;
                // a concurrent creator outside this process got there first
                if created.status == RemoteStatus::UserExists {
                    self.resolve_user(&params.person_id).await?.ok_or_else(|| {
                        AdapterError::RemoteValidation(String::from(
                            "user reported as existing but cannot be resolved",
                        ))
                    })?
                } else {
                    let created = created.into_result()?;
                    let id = created.id.ok_or_else(|| {
                        AdapterError::RemoteValidation(String::from(
                            "createUser response carries no user id",
                        ))
                    })?;
                    info!(user_id = %id, "groupware identity created");
                    id
                }
            }
        };
        // refreshed on every call so a failed first attempt still converges
        self.apply_module_access(&user_id).await?;
        Ok(user_id)
    }

    #[instrument(skip(self))]
    async fn delete_identity(&self, external_id: &str) -> AdapterResult<()> {
        self.call(
            ActionCall::new("deleteUser")
                .arg("contextId", self.context_arg())
                .arg("userId", external_id),
        )
        .await?
        .into_result()?;
        info!(user_id = %external_id, "groupware identity deleted");
        Ok(())
    }
}

/// Remote group name carrying both the local group id and the role.
fn group_name(group_id: &str, role: RoleKind) -> String {
    format!("{}#{}", group_id, role.as_str().to_lowercase())
}

fn split_group_name(name: &str) -> Option<(&str, RoleKind)> {
    let (group_id, role) = name.rsplit_once('#')?;
    role.parse::<RoleKind>().ok().map(|role| (group_id, role))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_names_round_trip() {
        let name = group_name("org-22", RoleKind::Lehr);
        assert_eq!(name, "org-22#lehr");
        assert_eq!(split_group_name(&name), Some(("org-22", RoleKind::Lehr)));
    }

    #[test]
    fn foreign_group_names_are_ignored() {
        assert_eq!(split_group_name("plain-group"), None);
        assert_eq!(split_group_name("org-22#wizard"), None);
    }

    #[test]
    fn group_ids_containing_the_separator_split_on_the_last_one() {
        assert_eq!(
            split_group_name("a#b#lern"),
            Some(("a#b", RoleKind::Lern))
        );
    }
}
