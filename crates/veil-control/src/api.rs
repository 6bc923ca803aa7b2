use serde_json::Value;

use crate::errors::ControlError;
use crate::surface::ControlSurface;

pub const ACTION_ADD_PASS_THROUGH: &str = "addPassThrough";
pub const ACTION_REMOVE_PASS_THROUGH: &str = "removePassThrough";
pub const ACTION_SET_PASS_THROUGH_ENABLED: &str = "setPassThroughEnabled";
pub const ACTION_GENERATE_ROOT_CA_CERT: &str = "generateRootCaCert";
pub const ACTION_IMPORT_ROOT_CA_CERT: &str = "importRootCaCert";
pub const ACTION_SET_ROOT_CA_CERT_VALIDITY: &str = "setRootCaCertValidity";
pub const ACTION_SET_SERVER_CERT_VALIDITY: &str = "setServerCertValidity";

pub const QUERY_GET_PASS_THROUGHS: &str = "getPassThroughs";
pub const QUERY_GET_ROOT_CA_CERT_VALIDITY: &str = "getRootCaCertValidity";
pub const QUERY_GET_SERVER_CERT_VALIDITY: &str = "getServerCertValidity";

pub const PARAM_AUTHORITY: &str = "authority";
pub const PARAM_ENABLED: &str = "enabled";
pub const PARAM_FILE_PATH: &str = "filePath";
pub const PARAM_VALIDITY: &str = "validity";

impl ControlSurface {
    /// Dispatches a named control action. Capability flags are checked
    /// before parameters, so a disabled feature reports `FeatureDisabled`
    /// even when the request is otherwise malformed.
    pub fn handle_action(&self, name: &str, params: &Value) -> Result<(), ControlError> {
        match name {
            ACTION_ADD_PASS_THROUGH => {
                self.require_local_servers()?;
                let authority = required_str(params, PARAM_AUTHORITY)?;
                let enabled = optional_bool(params, PARAM_ENABLED, true)?;
                self.add_pass_through(authority, enabled)
            }
            ACTION_REMOVE_PASS_THROUGH => {
                self.require_local_servers()?;
                let authority = required_str(params, PARAM_AUTHORITY)?;
                self.remove_pass_through(authority)
            }
            ACTION_SET_PASS_THROUGH_ENABLED => {
                self.require_local_servers()?;
                let authority = required_str(params, PARAM_AUTHORITY)?;
                let enabled = required_bool(params, PARAM_ENABLED)?;
                self.set_pass_through_enabled(authority, enabled)
            }
            ACTION_GENERATE_ROOT_CA_CERT => {
                self.require_server_certs()?;
                self.generate_root_ca_cert()
            }
            ACTION_IMPORT_ROOT_CA_CERT => {
                self.require_server_certs()?;
                let file_path = required_str(params, PARAM_FILE_PATH)?;
                self.import_root_ca_cert(file_path)
            }
            ACTION_SET_ROOT_CA_CERT_VALIDITY => {
                self.require_server_certs()?;
                let days = required_i64(params, PARAM_VALIDITY)?;
                self.set_root_ca_cert_validity(days)
            }
            ACTION_SET_SERVER_CERT_VALIDITY => {
                self.require_server_certs()?;
                let days = required_i64(params, PARAM_VALIDITY)?;
                self.set_server_cert_validity(days)
            }
            _ => Err(ControlError::NotFound("action")),
        }
    }

    /// Dispatches a named control query, returning its JSON payload.
    pub fn handle_query(&self, name: &str, _params: &Value) -> Result<Value, ControlError> {
        match name {
            QUERY_GET_PASS_THROUGHS => {
                let views = self.pass_throughs()?;
                serde_json::to_value(views)
                    .map_err(|error| ControlError::InternalError(error.to_string()))
            }
            QUERY_GET_ROOT_CA_CERT_VALIDITY => Ok(Value::from(self.root_ca_cert_validity()?)),
            QUERY_GET_SERVER_CERT_VALIDITY => Ok(Value::from(self.server_cert_validity()?)),
            _ => Err(ControlError::NotFound("query")),
        }
    }
}

fn required_str<'a>(params: &'a Value, name: &'static str) -> Result<&'a str, ControlError> {
    let Some(value) = params.get(name) else {
        return Err(ControlError::MissingParameter(name));
    };
    value.as_str().ok_or(ControlError::InvalidParameter {
        name,
        reason: "expected a string".to_string(),
    })
}

fn required_bool(params: &Value, name: &'static str) -> Result<bool, ControlError> {
    let Some(value) = params.get(name) else {
        return Err(ControlError::MissingParameter(name));
    };
    parse_bool(value).ok_or(ControlError::InvalidParameter {
        name,
        reason: "expected a boolean".to_string(),
    })
}

fn optional_bool(params: &Value, name: &'static str, default: bool) -> Result<bool, ControlError> {
    let Some(value) = params.get(name) else {
        return Ok(default);
    };
    parse_bool(value).ok_or(ControlError::InvalidParameter {
        name,
        reason: "expected a boolean".to_string(),
    })
}

fn required_i64(params: &Value, name: &'static str) -> Result<i64, ControlError> {
    let Some(value) = params.get(name) else {
        return Err(ControlError::MissingParameter(name));
    };
    parse_i64(value).ok_or(ControlError::InvalidParameter {
        name,
        reason: "expected an integer".to_string(),
    })
}

// Transports hand parameters through as strings as often as native JSON
// types, so both forms are accepted.
fn parse_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn parse_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse::<i64>().ok(),
        _ => None,
    }
}
