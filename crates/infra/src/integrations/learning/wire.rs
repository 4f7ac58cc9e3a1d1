//! IMS-ES flavored wire format for the learning platform.
//!
//! Requests are hand-built (the shapes are small and fixed); responses are
//! parsed with quick-xml. Membership sourcedIds are the deterministic
//! composite keys, so repeated submissions address the same remote record.

use std::fmt::Write as _;

use quick_xml::events::Event;
use quick_xml::Reader;
use stellwerk_domain::{
    AdapterError, AdapterResult, IdentityParams, MembershipParams, MembershipStatus,
    RemoteMembership, RoleKind,
};

use crate::errors::InfraError;
use crate::integrations::xml::xml_escape;

fn request_head(action: &str) -> String {
    let mut xml = String::with_capacity(512);
    xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = write!(xml, r#"<massRequest action="{}">"#, xml_escape(action));
    xml
}

pub fn create_memberships_request(params: &[MembershipParams]) -> String {
    let mut xml = request_head("createMemberships");
    xml.push_str("<memberships>");
    for param in params {
        let _ = write!(
            xml,
            r#"<membership sourcedId="{}"><personSourcedId>{}</personSourcedId><groupSourcedId>{}</groupSourcedId><role>{}</role><status>{}</status></membership>"#,
            xml_escape(&param.membership_id),
            xml_escape(&param.person_id),
            xml_escape(&param.group_id),
            param.role.as_str(),
            MembershipStatus::Active,
        );
    }
    xml.push_str("</memberships></massRequest>");
    xml
}

pub fn delete_memberships_request(membership_ids: &[String]) -> String {
    let mut xml = request_head("deleteMemberships");
    xml.push_str("<sourcedIds>");
    for id in membership_ids {
        let _ = write!(xml, "<sourcedId>{}</sourcedId>", xml_escape(id));
    }
    xml.push_str("</sourcedIds></massRequest>");
    xml
}

pub fn read_memberships_request(person_id: &str) -> String {
    let mut xml = request_head("readMembershipsForPerson");
    let _ = write!(
        xml,
        "<personSourcedId>{}</personSourcedId>",
        xml_escape(person_id)
    );
    xml.push_str("</massRequest>");
    xml
}

pub fn create_person_request(params: &IdentityParams) -> String {
    let mut xml = request_head("createPerson");
    let _ = write!(
        xml,
        r#"<person sourcedId="{}"><username>{}</username><givenName>{}</givenName><familyName>{}</familyName><email>{}</email></person>"#,
        xml_escape(&params.person_id),
        xml_escape(&params.username),
        xml_escape(&params.first_name),
        xml_escape(&params.last_name),
        xml_escape(&params.email),
    );
    xml.push_str("</massRequest>");
    xml
}

pub fn delete_person_request(person_id: &str) -> String {
    let mut xml = request_head("deletePerson");
    let _ = write!(
        xml,
        "<sourcedIds><sourcedId>{}</sourcedId></sourcedIds>",
        xml_escape(person_id)
    );
    xml.push_str("</massRequest>");
    xml
}

/// One per-sourcedId outcome in a mass response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemResult {
    pub sourced_id: String,
    pub success: bool,
    pub description: Option<String>,
}

enum Field {
    Status,
    Description,
    GroupSourcedId,
    Role,
    MembershipStatus,
}

/// Parses the `<results>` section of a mass response.
pub fn parse_mass_response(xml: &str) -> AdapterResult<Vec<ItemResult>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut results = Vec::new();
    let mut sourced_id: Option<String> = None;
    let mut success: Option<bool> = None;
    let mut description: Option<String> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event().map_err(InfraError::from)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"result" => {
                    sourced_id = attr_value(&e, b"sourcedId");
                    success = None;
                    description = None;
                }
                b"status" => field = Some(Field::Status),
                b"description" => field = Some(Field::Description),
                _ => field = None,
            },
            Event::Text(t) => {
                let text = t.unescape().unwrap_or_default().into_owned();
                match field {
                    Some(Field::Status) => {
                        success = Some(match text.as_str() {
                            "success" => true,
                            "failure" => false,
                            other => {
                                return Err(AdapterError::RemoteValidation(format!(
                                    "unknown item status '{other}'"
                                )))
                            }
                        });
                    }
                    Some(Field::Description) => description = Some(text),
                    _ => {}
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"result" {
                    let id = sourced_id.take().ok_or_else(|| {
                        AdapterError::RemoteValidation(String::from(
                            "result element without sourcedId",
                        ))
                    })?;
                    let ok = success.take().ok_or_else(|| {
                        AdapterError::RemoteValidation(String::from(
                            "result element without status",
                        ))
                    })?;
                    results.push(ItemResult {
                        sourced_id: id,
                        success: ok,
                        description: description.take(),
                    });
                }
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(results)
}

/// Parses the `<memberships>` section of a read response. Entries that do
/// not parse cleanly are rejected rather than skipped; the reconciler must
/// see the full remote state or none of it.
pub fn parse_memberships_response(
    xml: &str,
    person_id: &str,
) -> AdapterResult<Vec<RemoteMembership>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut memberships = Vec::new();
    let mut sourced_id: Option<String> = None;
    let mut group_id: Option<String> = None;
    let mut role: Option<RoleKind> = None;
    let mut status: Option<MembershipStatus> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event().map_err(InfraError::from)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"membership" => {
                    sourced_id = attr_value(&e, b"sourcedId");
                    group_id = None;
                    role = None;
                    status = None;
                }
                b"groupSourcedId" => field = Some(Field::GroupSourcedId),
                b"role" => field = Some(Field::Role),
                b"status" => field = Some(Field::MembershipStatus),
                _ => field = None,
            },
            Event::Text(t) => {
                let text = t.unescape().unwrap_or_default().into_owned();
                match field {
                    Some(Field::GroupSourcedId) => group_id = Some(text),
                    Some(Field::Role) => {
                        role = Some(
                            text.parse::<RoleKind>()
                                .map_err(AdapterError::RemoteValidation)?,
                        );
                    }
                    Some(Field::MembershipStatus) => {
                        status = Some(
                            text.parse::<MembershipStatus>()
                                .map_err(AdapterError::RemoteValidation)?,
                        );
                    }
                    _ => {}
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"membership" {
                    let membership = RemoteMembership {
                        membership_id: require(sourced_id.take(), "sourcedId")?,
                        group_id: require(group_id.take(), "groupSourcedId")?,
                        person_id: person_id.to_owned(),
                        role: require(role.take(), "role")?,
                        status: require(status.take(), "status")?,
                    };
                    memberships.push(membership);
                }
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(memberships)
}

fn require<T>(value: Option<T>, name: &str) -> AdapterResult<T> {
    value.ok_or_else(|| {
        AdapterError::RemoteValidation(format!("membership element without {name}"))
    })
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name)
        .map(|attr| attr.unescape_value().unwrap_or_default().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_carries_one_element_per_membership() {
        let params = vec![
            MembershipParams::keyed("p1", "g1", RoleKind::Lern),
            MembershipParams::keyed("p1", "g2", RoleKind::Lehr),
        ];
        let xml = create_memberships_request(&params);
        assert!(xml.contains(r#"<massRequest action="createMemberships">"#));
        assert!(xml.contains(r#"<membership sourcedId="membership-p1-g1">"#));
        assert!(xml.contains(r#"<membership sourcedId="membership-p1-g2">"#));
        assert!(xml.contains("<role>LERN</role>"));
        assert!(xml.contains("<role>LEHR</role>"));
        assert!(xml.contains("<status>active</status>"));
    }

    #[test]
    fn delete_request_lists_sourced_ids() {
        let xml = delete_memberships_request(&[
            "membership-p1-g1".to_owned(),
            "membership-p1-g2".to_owned(),
        ]);
        assert!(xml.contains(r#"<massRequest action="deleteMemberships">"#));
        assert!(xml.contains("<sourcedId>membership-p1-g1</sourcedId>"));
        assert!(xml.contains("<sourcedId>membership-p1-g2</sourcedId>"));
    }

    #[test]
    fn mass_response_parses_mixed_outcomes() {
        let xml = r#"<massResponse><results>
            <result sourcedId="membership-p1-g1"><status>success</status></result>
            <result sourcedId="membership-p1-g2"><status>failure</status><description>unknown group</description></result>
        </results></massResponse>"#;
        let results = parse_mass_response(xml).unwrap();
        assert_eq!(
            results,
            vec![
                ItemResult {
                    sourced_id: "membership-p1-g1".to_owned(),
                    success: true,
                    description: None,
                },
                ItemResult {
                    sourced_id: "membership-p1-g2".to_owned(),
                    success: false,
                    description: Some("unknown group".to_owned()),
                },
            ]
        );
    }

    #[test]
    fn mass_response_with_unknown_status_is_rejected() {
        let xml = r#"<massResponse><results>
            <result sourcedId="x"><status>pending</status></result>
        </results></massResponse>"#;
        assert!(matches!(
            parse_mass_response(xml),
            Err(AdapterError::RemoteValidation(_))
        ));
    }

    #[test]
    fn mass_response_without_sourced_id_is_rejected() {
        let xml = "<massResponse><results><result><status>success</status></result></results></massResponse>";
        assert!(parse_mass_response(xml).is_err());
    }

    #[test]
    fn memberships_response_parses() {
        let xml = r#"<massResponse><memberships>
            <membership sourcedId="membership-p1-g1">
                <groupSourcedId>g1</groupSourcedId>
                <role>LERN</role>
                <status>active</status>
            </membership>
            <membership sourcedId="membership-p1-g2">
                <groupSourcedId>g2</groupSourcedId>
                <role>LEHR</role>
                <status>inactive</status>
            </membership>
        </memberships></massResponse>"#;
        let memberships = parse_memberships_response(xml, "p1").unwrap();
        assert_eq!(memberships.len(), 2);
        assert_eq!(memberships[0].membership_id, "membership-p1-g1");
        assert_eq!(memberships[0].group_id, "g1");
        assert_eq!(memberships[0].person_id, "p1");
        assert_eq!(memberships[0].role, RoleKind::Lern);
        assert_eq!(memberships[0].status, MembershipStatus::Active);
        assert_eq!(memberships[1].status, MembershipStatus::Inactive);
    }

    #[test]
    fn memberships_response_with_bad_role_is_rejected() {
        let xml = r#"<massResponse><memberships>
            <membership sourcedId="m"><groupSourcedId>g</groupSourcedId><role>WIZARD</role><status>active</status></membership>
        </memberships></massResponse>"#;
        assert!(parse_memberships_response(xml, "p1").is_err());
    }

    #[test]
    fn person_requests_embed_identity_fields() {
        let params = IdentityParams {
            person_id: "p1".to_owned(),
            username: "jdoe".to_owned(),
            first_name: "Jane".to_owned(),
            last_name: "Doe".to_owned(),
            email: "jdoe@example.org".to_owned(),
            referrer: None,
        };
        let xml = create_person_request(&params);
        assert!(xml.contains(r#"<person sourcedId="p1">"#));
        assert!(xml.contains("<username>jdoe</username>"));
        assert!(xml.contains("<email>jdoe@example.org</email>"));

        let xml = delete_person_request("p1");
        assert!(xml.contains(r#"<massRequest action="deletePerson">"#));
        assert!(xml.contains("<sourcedId>p1</sourcedId>"));
    }
}
