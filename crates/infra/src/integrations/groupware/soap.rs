//! Wire encoding for the groupware admin protocol.
//!
//! Requests are an envelope with an authentication header and one action
//! element; responses carry a status code from a closed set plus optional
//! payload (`id`, `message`, `groups`).

use std::fmt;
use std::fmt::Write as _;

use quick_xml::events::Event;
use quick_xml::Reader;
use stellwerk_domain::{AdapterError, AdapterResult};

use super::token::SecurityToken;
use crate::errors::InfraError;
use crate::integrations::xml::xml_escape;

/// One protocol action with its named arguments, in submission order.
#[derive(Debug, Clone)]
pub struct ActionCall<'a> {
    action: &'a str,
    args: Vec<(&'a str, String)>,
}

impl<'a> ActionCall<'a> {
    pub fn new(action: &'a str) -> Self {
        Self {
            action,
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, name: &'a str, value: impl Into<String>) -> Self {
        self.args.push((name, value.into()));
        self
    }

    pub fn name(&self) -> &str {
        self.action
    }

    /// Serializes the call with a fresh authentication header.
    pub fn to_xml(&self, login: &str, password: &str, token: &SecurityToken) -> String {
        let mut xml = String::with_capacity(512);
        xml.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
        xml.push_str("<envelope><header><auth>");
        let _ = write!(xml, "<login>{}</login>", xml_escape(login));
        let _ = write!(xml, "<password>{}</password>", xml_escape(password));
        let _ = write!(xml, "<timestamp>{}</timestamp>", xml_escape(&token.timestamp));
        let _ = write!(xml, "<nonce>{}</nonce>", xml_escape(&token.nonce));
        xml.push_str("</auth></header><body>");
        let _ = write!(xml, r#"<action name="{}">"#, xml_escape(self.action));
        for (name, value) in &self.args {
            let _ = write!(
                xml,
                r#"<arg name="{}">{}</arg>"#,
                xml_escape(name),
                xml_escape(value)
            );
        }
        xml.push_str("</action></body></envelope>");
        xml
    }
}

/// Status codes the platform returns. Anything outside this set is a
/// protocol violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Ok,
    UserExists,
    UserNotFound,
    GroupExists,
    GroupNotFound,
    MemberExists,
    NoSuchMember,
    InvalidData,
    AuthFailed,
    ServerError,
}

impl RemoteStatus {
    fn from_code(code: &str) -> Option<Self> {
        match code {
            "OK" => Some(Self::Ok),
            "USER_EXISTS" => Some(Self::UserExists),
            "USER_NOT_FOUND" => Some(Self::UserNotFound),
            "GROUP_EXISTS" => Some(Self::GroupExists),
            "GROUP_NOT_FOUND" => Some(Self::GroupNotFound),
            "MEMBER_EXISTS" => Some(Self::MemberExists),
            "NO_SUCH_MEMBER" => Some(Self::NoSuchMember),
            "INVALID_DATA" => Some(Self::InvalidData),
            "AUTH_FAILED" => Some(Self::AuthFailed),
            "SERVER_ERROR" => Some(Self::ServerError),
            _ => None,
        }
    }

    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::UserExists => "USER_EXISTS",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::GroupExists => "GROUP_EXISTS",
            Self::GroupNotFound => "GROUP_NOT_FOUND",
            Self::MemberExists => "MEMBER_EXISTS",
            Self::NoSuchMember => "NO_SUCH_MEMBER",
            Self::InvalidData => "INVALID_DATA",
            Self::AuthFailed => "AUTH_FAILED",
            Self::ServerError => "SERVER_ERROR",
        }
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}

/// A group reference in a `listGroupsForUser` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteGroup {
    pub id: String,
    pub name: String,
}

/// Parsed action response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    pub status: RemoteStatus,
    pub id: Option<String>,
    pub message: Option<String>,
    pub groups: Vec<RemoteGroup>,
}

impl ActionResponse {
    /// Folds the remote status into the error taxonomy; an `OK` status
    /// passes the response through.
    pub fn into_result(self) -> AdapterResult<Self> {
        match self.status {
            RemoteStatus::Ok => Ok(self),
            RemoteStatus::UserNotFound | RemoteStatus::GroupNotFound | RemoteStatus::NoSuchMember => {
                Err(AdapterError::NotFound(self.detail()))
            }
            RemoteStatus::ServerError => Err(AdapterError::Transport(self.detail())),
            _ => Err(AdapterError::RemoteValidation(self.detail())),
        }
    }

    fn detail(&self) -> String {
        match &self.message {
            Some(message) => format!("{}: {message}", self.status),
            None => self.status.to_string(),
        }
    }
}

enum Field {
    Status,
    Id,
    Name,
    Message,
}

/// Parses a response body. Responses without a status, or with a status
/// outside the known set, are rejected.
pub fn parse_response(xml: &str) -> AdapterResult<ActionResponse> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut status: Option<RemoteStatus> = None;
    let mut id: Option<String> = None;
    let mut message: Option<String> = None;
    let mut groups: Vec<RemoteGroup> = Vec::new();

    let mut in_groups = false;
    let mut group_id: Option<String> = None;
    let mut group_name: Option<String> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event().map_err(InfraError::from)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"groups" => in_groups = true,
                b"group" => {
                    group_id = None;
                    group_name = None;
                }
                b"status" => field = Some(Field::Status),
                b"id" => field = Some(Field::Id),
                b"name" => field = Some(Field::Name),
                b"message" => field = Some(Field::Message),
                _ => field = None,
            },
            Event::Text(t) => {
                let text = t.unescape().unwrap_or_default().into_owned();
                match field {
                    Some(Field::Status) => {
                        status = Some(RemoteStatus::from_code(&text).ok_or_else(|| {
                            AdapterError::RemoteValidation(format!(
                                "unknown groupware status code '{text}'"
                            ))
                        })?);
                    }
                    Some(Field::Id) if in_groups => group_id = Some(text),
                    Some(Field::Id) => id = Some(text),
                    Some(Field::Name) if in_groups => group_name = Some(text),
                    Some(Field::Message) => message = Some(text),
                    _ => {}
                }
            }
            Event::End(e) => {
                match e.local_name().as_ref() {
                    b"groups" => in_groups = false,
                    b"group" => {
                        if let (Some(gid), Some(name)) = (group_id.take(), group_name.take()) {
                            groups.push(RemoteGroup { id: gid, name });
                        }
                    }
                    _ => {}
                }
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    let status = status.ok_or_else(|| {
        AdapterError::RemoteValidation(String::from("groupware response carries no status"))
    })?;
    Ok(ActionResponse {
        status,
        id,
        message,
        groups,
    })
}
