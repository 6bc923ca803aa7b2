mod api;
mod errors;
mod surface;

pub use api::{
    ACTION_ADD_PASS_THROUGH, ACTION_GENERATE_ROOT_CA_CERT, ACTION_IMPORT_ROOT_CA_CERT,
    ACTION_REMOVE_PASS_THROUGH, ACTION_SET_PASS_THROUGH_ENABLED, ACTION_SET_ROOT_CA_CERT_VALIDITY,
    ACTION_SET_SERVER_CERT_VALIDITY, PARAM_AUTHORITY, PARAM_ENABLED, PARAM_FILE_PATH,
    PARAM_VALIDITY, QUERY_GET_PASS_THROUGHS, QUERY_GET_ROOT_CA_CERT_VALIDITY,
    QUERY_GET_SERVER_CERT_VALIDITY,
};
pub use errors::ControlError;
pub use surface::{
    Capabilities, CertDownload, ControlSurface, PassThroughView, ROOT_CA_CERT_CONTENT_TYPE,
    ROOT_CA_CERT_FILENAME,
};
