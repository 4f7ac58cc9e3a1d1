//! Conversions from external infrastructure errors into adapter errors.

use ldap3::LdapError;
use quick_xml::Error as XmlError;
use reqwest::Error as HttpError;
use stellwerk_domain::AdapterError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the adapter error.
#[derive(Debug)]
pub struct InfraError(pub AdapterError);

impl From<InfraError> for AdapterError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<AdapterError> for InfraError {
    fn from(value: AdapterError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoAdapterError {
    fn into_adapter(self) -> AdapterError;
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → AdapterError */
/* -------------------------------------------------------------------------- */

impl IntoAdapterError for HttpError {
    fn into_adapter(self) -> AdapterError {
        if self.is_timeout() {
            return AdapterError::Transport("HTTP request timed out".into());
        }

        #[cfg(not(target_arch = "wasm32"))]
        if self.is_connect() {
            return AdapterError::Transport("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                404 => AdapterError::NotFound(message),
                429 => AdapterError::Transport(message),
                500..=599 => AdapterError::Transport(message),
                400..=499 => AdapterError::RemoteValidation(message),
                _ => AdapterError::Transport(message),
            };
        }

        AdapterError::Transport(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_adapter())
    }
}

/* -------------------------------------------------------------------------- */
/* ldap3::LdapError → AdapterError */
/* -------------------------------------------------------------------------- */

impl IntoAdapterError for LdapError {
    fn into_adapter(self) -> AdapterError {
        match self {
            // `success()` turns a non-zero result code into this variant
            LdapError::LdapResult { result } => ldap_rc_error(result.rc, &result.text),
            other => AdapterError::Transport(format!("directory session failure: {other}")),
        }
    }
}

impl From<LdapError> for InfraError {
    fn from(value: LdapError) -> Self {
        InfraError(value.into_adapter())
    }
}

/// Classify an LDAP result code.
///
/// Directory operations report protocol failures through the result code, not
/// through `Err`, so adapters call this directly on non-zero codes.
pub fn ldap_rc_error(rc: u32, text: &str) -> AdapterError {
    match rc {
        // noSuchObject
        32 => AdapterError::NotFound(format!("directory entry missing (rc 32): {text}")),
        // invalidCredentials
        49 => AdapterError::RemoteValidation("directory rejected bind credentials (rc 49)".into()),
        // busy, unavailable
        51 | 52 => AdapterError::Transport(format!("directory unavailable (rc {rc}): {text}")),
        _ => AdapterError::RemoteValidation(format!("directory operation failed (rc {rc}): {text}")),
    }
}

/* -------------------------------------------------------------------------- */
/* quick_xml::Error → AdapterError */
/* -------------------------------------------------------------------------- */

impl IntoAdapterError for XmlError {
    fn into_adapter(self) -> AdapterError {
        AdapterError::RemoteValidation(format!("malformed XML payload: {self}"))
    }
}

impl From<XmlError> for InfraError {
    fn from(value: XmlError) -> Self {
        InfraError(value.into_adapter())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
