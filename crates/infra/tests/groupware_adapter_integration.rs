//! Integration tests for the groupware adapter against a mock HTTP server
//!
//! **Coverage:**
//! - Membership reads: group name decoding, foreign groups, unknown persons
//! - Membership upserts: group creation, member addition, batch abort on
//!   server errors
//! - Membership deletes: tolerance for already-absent members
//! - Identity creation: module access refresh for existing users
//! - HTTP failures mapping into the retryable transport class
//!
//! Every action posts to the same endpoint; mocks are told apart by the
//! action name inside the XML body.

use stellwerk_core::DirectoryAdapter;
use stellwerk_domain::{
    AdapterError, GroupwareConfig, IdentityParams, MembershipParams, RoleKind,
};
use stellwerk_infra::integrations::GroupwareAdapter;
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn adapter_for(server: &MockServer) -> GroupwareAdapter {
    let config = GroupwareConfig {
        endpoint: server.uri(),
        login: "oxadmin".to_owned(),
        password: "secret".to_owned(),
        context_id: 10,
        ..GroupwareConfig::default()
    };
    GroupwareAdapter::new(config).expect("adapter should build")
}

fn sample_person() -> IdentityParams {
    IdentityParams {
        person_id: "p1".to_owned(),
        username: "jdoe".to_owned(),
        first_name: "Jane".to_owned(),
        last_name: "Doe".to_owned(),
        email: "jdoe@example.org".to_owned(),
        referrer: None,
    }
}

/// Mounts a response for one action, matched by the action name in the
/// request body.
async fn mount_action(server: &MockServer, action: &str, body: &str) {
    Mock::given(method("POST"))
        .and(body_string_contains(format!(r#"<action name="{action}">"#)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body.to_owned()))
        .mount(server)
        .await;
}

#[tokio::test]
async fn read_memberships_decodes_owned_groups_and_skips_foreign_ones() {
    let server = MockServer::start().await;
    mount_action(&server, "resolveUser", "<response><status>OK</status><id>42</id></response>")
        .await;
    mount_action(
        &server,
        "listGroupsForUser",
        "<response><status>OK</status><groups>\
         <group><id>901</id><name>g1#lern</name></group>\
         <group><id>902</id><name>steering-committee</name></group>\
         </groups></response>",
    )
    .await;

    let adapter = adapter_for(&server);
    let memberships = adapter.read_memberships("p1").await.expect("read should succeed");

    assert_eq!(memberships.len(), 1);
    assert_eq!(memberships[0].membership_id, "42:901");
    assert_eq!(memberships[0].group_id, "g1");
    assert_eq!(memberships[0].person_id, "p1");
    assert_eq!(memberships[0].role, RoleKind::Lern);
}

#[tokio::test]
async fn read_memberships_for_unknown_person_is_empty() {
    let server = MockServer::start().await;
    mount_action(&server, "resolveUser", "<response><status>USER_NOT_FOUND</status></response>")
        .await;

    let adapter = adapter_for(&server);
    let memberships = adapter.read_memberships("ghost").await.expect("read should succeed");

    assert!(memberships.is_empty());
}

#[tokio::test]
async fn upsert_creates_the_missing_group_and_adds_the_member() {
    let server = MockServer::start().await;
    mount_action(&server, "resolveUser", "<response><status>OK</status><id>42</id></response>")
        .await;
    mount_action(
        &server,
        "listGroupsForUser",
        "<response><status>OK</status><groups></groups></response>",
    )
    .await;
    mount_action(&server, "resolveGroup", "<response><status>GROUP_NOT_FOUND</status></response>")
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains(r#"<action name="createGroup">"#))
        .and(body_string_contains("g1#lern"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<response><status>OK</status><id>77</id></response>"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains(r#"<action name="addMember">"#))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<response><status>OK</status></response>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let result = adapter
        .upsert_memberships(vec![MembershipParams::keyed("p1", "g1", RoleKind::Lern)])
        .await
        .expect("upsert should succeed");

    assert_eq!(result.len(), 1);
    assert!(result.is_complete());
}

#[tokio::test]
async fn upsert_for_unprovisioned_person_fails_whole_call() {
    let server = MockServer::start().await;
    mount_action(&server, "resolveUser", "<response><status>USER_NOT_FOUND</status></response>")
        .await;

    let adapter = adapter_for(&server);
    let result = adapter
        .upsert_memberships(vec![MembershipParams::keyed("ghost", "g1", RoleKind::Lern)])
        .await;

    match result {
        Err(AdapterError::NotFound(msg)) => assert!(msg.contains("ghost")),
        other => panic!("expected not found, got {:?}", other),
    }
}

#[tokio::test]
async fn server_error_status_aborts_the_batch() {
    let server = MockServer::start().await;
    mount_action(&server, "resolveUser", "<response><status>OK</status><id>42</id></response>")
        .await;
    mount_action(
        &server,
        "listGroupsForUser",
        "<response><status>OK</status><groups></groups></response>",
    )
    .await;
    mount_action(
        &server,
        "resolveGroup",
        "<response><status>SERVER_ERROR</status><message>db down</message></response>",
    )
    .await;

    let adapter = adapter_for(&server);
    let result = adapter
        .upsert_memberships(vec![MembershipParams::keyed("p1", "g1", RoleKind::Lern)])
        .await;

    let err = result.expect_err("server error must abort the call");
    assert!(err.is_retryable(), "server error must stay retryable, got {:?}", err);
}

#[tokio::test]
async fn delete_tolerates_already_absent_members() {
    let server = MockServer::start().await;
    mount_action(&server, "removeMember", "<response><status>NO_SUCH_MEMBER</status></response>")
        .await;

    let adapter = adapter_for(&server);
    let result = adapter
        .delete_memberships(vec!["42:901".to_owned()])
        .await
        .expect("delete should succeed");

    assert_eq!(result.len(), 1);
    assert!(result.is_complete());
}

#[tokio::test]
async fn delete_rejects_malformed_membership_ids() {
    let server = MockServer::start().await;

    let adapter = adapter_for(&server);
    let result = adapter
        .delete_memberships(vec!["not-a-pair".to_owned()])
        .await
        .expect("delete should succeed");

    assert_eq!(result.failed_count(), 1);
}

#[tokio::test]
async fn existing_identity_still_gets_module_access_refreshed() {
    let server = MockServer::start().await;
    mount_action(&server, "resolveUser", "<response><status>OK</status><id>42</id></response>")
        .await;
    Mock::given(method("POST"))
        .and(body_string_contains(r#"<action name="changeModuleAccess">"#))
        .and(body_string_contains("webmail"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("<response><status>OK</status></response>"),
        )
        .expect(1)
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let user_id = adapter.create_identity(&sample_person()).await.expect("create should succeed");

    assert_eq!(user_id, "42");
}

#[tokio::test]
async fn http_failure_maps_to_transport() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let adapter = adapter_for(&server);
    let result = adapter.read_memberships("p1").await;

    let err = result.expect_err("502 must fail the call");
    assert!(err.is_retryable(), "5xx must stay retryable, got {:?}", err);
}
