//! `DirectoryAdapter` implementation over ldap3.

use std::collections::HashSet;

use async_trait::async_trait;
use ldap3::{Ldap, LdapConnAsync, LdapConnSettings, LdapError, Mod, Scope, SearchEntry};
use stellwerk_core::DirectoryAdapter;
use stellwerk_domain::{
    AdapterError, AdapterResult, DirectoryConfig, ExternalSystem, IdentityParams, ItemOutcome,
    MassResult, MembershipParams, MembershipStatus, RemoteMembership, RoleKind,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

use super::escape::{escape_dn_value, escape_filter_value};
use crate::errors::{ldap_rc_error, InfraError};

const MEMBERSHIP_CONTAINER: &str = "ou=memberships";
const PERSON_ID_ATTR: &str = "employeeNumber";

/// result codes the adapter branches on
const RC_NO_SUCH_OBJECT: u32 = 32;
const RC_ENTRY_ALREADY_EXISTS: u32 = 68;

/// Directory adapter speaking LDAP.
///
/// One bound session is cached and multiplexed across calls; on a session
/// failure the handle is dropped so the next call reconnects. Identity
/// creation is serialized through a mutex because it is a search-then-add
/// sequence that must not interleave with itself.
pub struct LdapDirectoryAdapter {
    config: DirectoryConfig,
    session: RwLock<Option<Ldap>>,
    create_lock: Mutex<()>,
}

/// Splits batch-item handling: a broken session aborts the whole call,
/// a per-entry rejection only fails that item.
enum OpFailure {
    Session(LdapError),
    Item(String),
}

impl LdapDirectoryAdapter {
    pub fn new(config: DirectoryConfig) -> Self {
        Self {
            config,
            session: RwLock::new(None),
            create_lock: Mutex::new(()),
        }
    }

    fn memberships_base(&self) -> String {
        format!("{},{}", MEMBERSHIP_CONTAINER, self.config.base_dn)
    }

    fn membership_dn(&self, membership_id: &str) -> String {
        format!(
            "cn={},{}",
            escape_dn_value(membership_id),
            self.memberships_base()
        )
    }

    fn identity_dn(&self, username: &str, root_group: &str) -> String {
        format!(
            "uid={},ou={},{}",
            escape_dn_value(username),
            escape_dn_value(root_group),
            self.config.base_dn
        )
    }

    /// Bound session handle. Connects lazily; `Ldap` is cheap to clone and
    /// multiplexes over the one underlying connection.
    async fn session(&self) -> AdapterResult<Ldap> {
        if let Some(ldap) = self.session.read().await.as_ref() {
            return Ok(ldap.clone());
        }
        let mut guard = self.session.write().await;
        if let Some(ldap) = guard.as_ref() {
            return Ok(ldap.clone());
        }
        let ldap = self.connect().await?;
        *guard = Some(ldap.clone());
        Ok(ldap)
    }

    async fn connect(&self) -> AdapterResult<Ldap> {
        debug!(url = %self.config.url, "connecting to directory");
        let settings = LdapConnSettings::new().set_conn_timeout(self.config.timeout());
        let (conn, mut ldap) = LdapConnAsync::with_settings(settings, &self.config.url)
            .await
            .map_err(InfraError::from)?;

        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "directory connection driver stopped");
            }
        });

        let result = ldap
            .simple_bind(&self.config.bind_dn, &self.config.bind_password)
            .await
            .map_err(InfraError::from)?;
        if result.rc != 0 {
            return Err(ldap_rc_error(result.rc, &result.text));
        }

        info!(url = %self.config.url, "directory session established");
        Ok(ldap)
    }

    /// Drops the cached session and maps the error; the next call reconnects.
    async fn fail_session<T>(&self, err: LdapError) -> AdapterResult<T> {
        warn!(error = %err, "directory session failed, discarding handle");
        *self.session.write().await = None;
        Err(InfraError::from(err).into())
    }

    /// DN of the person's identity entry, found by the person id attribute.
    async fn find_person_dn(&self, person_id: &str) -> AdapterResult<Option<String>> {
        let mut ldap = self.session().await?;
        let filter = format!(
            "(&(objectClass=inetOrgPerson)({}={}))",
            PERSON_ID_ATTR,
            escape_filter_value(person_id)
        );
        let result = match ldap
            .search(&self.config.base_dn, Scope::Subtree, &filter, vec!["dn"])
            .await
        {
            Ok(result) => result,
            Err(e) => return self.fail_session(e).await,
        };
        let (entries, _) = result.success().map_err(InfraError::from)?;
        Ok(entries
            .into_iter()
            .next()
            .map(|entry| SearchEntry::construct(entry).dn))
    }

    async fn upsert_one(
        &self,
        ldap: &mut Ldap,
        person_dn: &str,
        param: &MembershipParams,
    ) -> Result<(), OpFailure> {
        let dn = self.membership_dn(&param.membership_id);
        let role = param.role.as_str();

        let attrs: Vec<(&str, HashSet<&str>)> = vec![
            ("objectClass", ["top", "groupOfNames"].into_iter().collect()),
            ("cn", [param.membership_id.as_str()].into_iter().collect()),
            ("member", [person_dn].into_iter().collect()),
            ("ou", [param.group_id.as_str()].into_iter().collect()),
            ("businessCategory", [role].into_iter().collect()),
        ];

        let result = ldap.add(&dn, attrs).await.map_err(OpFailure::Session)?;
        match result.rc {
            0 => Ok(()),
            // entryAlreadyExists: refresh the existing record in place
            RC_ENTRY_ALREADY_EXISTS => {
                let mods = vec![
                    Mod::Replace(
                        "member".to_owned(),
                        [person_dn.to_owned()].into_iter().collect(),
                    ),
                    Mod::Replace("ou".to_owned(), [param.group_id.clone()].into_iter().collect()),
                    Mod::Replace(
                        "businessCategory".to_owned(),
                        [role.to_owned()].into_iter().collect(),
                    ),
                ];
                let result = ldap.modify(&dn, mods).await.map_err(OpFailure::Session)?;
                if result.rc == 0 {
                    Ok(())
                } else {
                    Err(OpFailure::Item(
                        ldap_rc_error(result.rc, &result.text).to_string(),
                    ))
                }
            }
            rc => Err(OpFailure::Item(ldap_rc_error(rc, &result.text).to_string())),
        }
    }
}

#[async_trait]
impl DirectoryAdapter for LdapDirectoryAdapter {
    fn system(&self) -> ExternalSystem {
        ExternalSystem::Directory
    }

    #[instrument(skip(self))]
    async fn read_memberships(&self, person_id: &str) -> AdapterResult<Vec<RemoteMembership>> {
        let Some(person_dn) = self.find_person_dn(person_id).await? else {
            return Ok(Vec::new());
        };

        let mut ldap = self.session().await?;
        let filter = format!(
            "(&(objectClass=groupOfNames)(member={}))",
            escape_filter_value(&person_dn)
        );
        let result = match ldap
            .search(
                &self.memberships_base(),
                Scope::OneLevel,
                &filter,
                vec!["cn", "ou", "businessCategory"],
            )
            .await
        {
            Ok(result) => result,
            Err(e) => return self.fail_session(e).await,
        };
        let (entries, _) = match result.success() {
            Ok(ok) => ok,
            // container not provisioned yet means no memberships
            Err(LdapError::LdapResult { result }) if result.rc == RC_NO_SUCH_OBJECT => {
                return Ok(Vec::new());
            }
            Err(e) => return Err(InfraError::from(e).into()),
        };

        let mut memberships = Vec::with_capacity(entries.len());
        for raw in entries {
            let entry = SearchEntry::construct(raw);
            match parse_membership_entry(&entry, person_id) {
                Ok(membership) => memberships.push(membership),
                Err(reason) => {
                    warn!(dn = %entry.dn, %reason, "skipping unreadable membership entry");
                }
            }
        }
        debug!(count = memberships.len(), "read directory memberships");
        Ok(memberships)
    }

    #[instrument(skip(self, params), fields(count = params.len()))]
    async fn upsert_memberships(&self, params: Vec<MembershipParams>) -> AdapterResult<MassResult> {
        if params.is_empty() {
            return Ok(MassResult::default());
        }

        let person_id = params[0].person_id.clone();
        let person_dn = self.find_person_dn(&person_id).await?.ok_or_else(|| {
            AdapterError::NotFound(format!("no directory identity for person {person_id}"))
        })?;

        let mut ldap = self.session().await?;
        let mut outcomes = Vec::with_capacity(params.len());
        for param in &params {
            let outcome = match self.upsert_one(&mut ldap, &person_dn, param).await {
                Ok(()) => ItemOutcome::ok(param.membership_id.clone()),
                Err(OpFailure::Item(reason)) => {
                    ItemOutcome::failed(param.membership_id.clone(), reason)
                }
                Err(OpFailure::Session(err)) => return self.fail_session(err).await,
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

        let mut ldap = self.session().await?;
        let mut outcomes = Vec::with_capacity(membership_ids.len());
        for membership_id in membership_ids {
            let dn = self.membership_dn(&membership_id);
            let result = match ldap.delete(&dn).await {
                Ok(result) => result,
                Err(e) => return self.fail_session(e).await,
            };
            let outcome = match result.rc {
                0 => ItemOutcome::ok(membership_id),
                // already gone counts as deleted
                RC_NO_SUCH_OBJECT => ItemOutcome::ok(membership_id),
                rc => ItemOutcome::failed(
                    membership_id,
                    ldap_rc_error(rc, &result.text).to_string(),
                ),
            };
            outcomes.push(outcome);
        }
        Ok(MassResult::new(outcomes))
    }

    #[instrument(skip(self, params), fields(person_id = %params.person_id))]
    async fn create_identity(&self, params: &IdentityParams) -> AdapterResult<String> {
        // search-then-add must not interleave with a concurrent creation
        let _guard = self.create_lock.lock().await;

        if let Some(existing) = self.find_person_dn(&params.person_id).await? {
            debug!(dn = %existing, "directory identity already present");
            return Ok(existing);
        }

        let root_group = self
            .config
            .resolve_root_group(params.email_domain())
            .map_err(|e| AdapterError::RemoteValidation(e.to_string()))?;
        let dn = self.identity_dn(&params.username, root_group);
        let cn = format!("{} {}", params.first_name, params.last_name);

        let mut ldap = self.session().await?;
        let attrs: Vec<(&str, HashSet<&str>)> = vec![
            (
                "objectClass",
                ["top", "person", "organizationalPerson", "inetOrgPerson"]
                    .into_iter()
                    .collect(),
            ),
            ("uid", [params.username.as_str()].into_iter().collect()),
            ("cn", [cn.as_str()].into_iter().collect()),
            ("sn", [params.last_name.as_str()].into_iter().collect()),
            ("givenName", [params.first_name.as_str()].into_iter().collect()),
            ("mail", [params.email.as_str()].into_iter().collect()),
            (PERSON_ID_ATTR, [params.person_id.as_str()].into_iter().collect()),
        ];

        let result = match ldap.add(&dn, attrs).await {
            Ok(result) => result,
            Err(e) => return self.fail_session(e).await,
        };
        match result.rc {
            0 => {
                info!(dn = %dn, "directory identity created");
                Ok(dn)
            }
            // a concurrent writer outside this process got there first
            RC_ENTRY_ALREADY_EXISTS => Ok(dn),
            rc => Err(ldap_rc_error(rc, &result.text)),
        }
    }

    #[instrument(skip(self))]
    async fn delete_identity(&self, external_id: &str) -> AdapterResult<()> {
        let mut ldap = self.session().await?;
        let result = match ldap.delete(external_id).await {
            Ok(result) => result,
            Err(e) => return self.fail_session(e).await,
        };
        if result.rc != 0 {
            return Err(ldap_rc_error(result.rc, &result.text));
        }
        info!(dn = %external_id, "directory identity deleted");
        Ok(())
    }
}

fn parse_membership_entry(
    entry: &SearchEntry,
    person_id: &str,
) -> Result<RemoteMembership, String> {
    let membership_id =
        first_attr(entry, "cn").ok_or_else(|| String::from("missing cn attribute"))?;
    let group_id = first_attr(entry, "ou").ok_or_else(|| String::from("missing ou attribute"))?;
    let role = first_attr(entry, "businessCategory")
        .ok_or_else(|| String::from("missing businessCategory attribute"))?
        .parse::<RoleKind>()?;
    Ok(RemoteMembership {
        membership_id: membership_id.to_owned(),
        group_id: group_id.to_owned(),
        person_id: person_id.to_owned(),
        role,
        status: MembershipStatus::Active,
    })
}

fn first_attr<'a>(entry: &'a SearchEntry, name: &str) -> Option<&'a str> {
    entry
        .attrs
        .get(name)
        .and_then(|values| values.first())
        .map(String::as_str)
}
