use std::sync::Arc;

use serde_json::json;
use veil_control::{
    Capabilities, ControlError, ControlSurface, ACTION_ADD_PASS_THROUGH,
    ACTION_GENERATE_ROOT_CA_CERT, ACTION_IMPORT_ROOT_CA_CERT, ACTION_SET_ROOT_CA_CERT_VALIDITY,
    QUERY_GET_PASS_THROUGHS, QUERY_GET_ROOT_CA_CERT_VALIDITY, ROOT_CA_CERT_CONTENT_TYPE,
    ROOT_CA_CERT_FILENAME,
};
use veil_policy::{PassThroughEvaluator, PassThroughRegistry};
use veil_tls::CertificateStore;

struct Fixture {
    registry: Arc<PassThroughRegistry>,
    certificates: Arc<CertificateStore>,
    surface: ControlSurface,
}

fn fixture(capabilities: Capabilities) -> Fixture {
    let registry = Arc::new(PassThroughRegistry::new());
    let certificates = Arc::new(CertificateStore::default());
    let surface = ControlSurface::new(
        capabilities,
        Arc::clone(&registry),
        Arc::clone(&certificates),
    );
    Fixture {
        registry,
        certificates,
        surface,
    }
}

#[test]
fn pass_through_rules_flow_from_surface_to_evaluator() {
    let fixture = fixture(Capabilities::default());
    fixture
        .surface
        .handle_action(
            ACTION_ADD_PASS_THROUGH,
            &json!({ "authority": "*.internal.example.com" }),
        )
        .expect("add pass-through");

    let evaluator = PassThroughEvaluator::new(Arc::clone(&fixture.registry));
    assert!(evaluator.should_pass_through("app.internal.example.com", 8443));
    assert!(!evaluator.should_pass_through("external.com", 443));

    let listed = fixture
        .surface
        .handle_query(QUERY_GET_PASS_THROUGHS, &json!({}))
        .expect("list pass-throughs");
    assert_eq!(listed, json!([{ "name": "*.internal.example.com", "enabled": true }]));
}

#[test]
fn disabled_local_servers_capability_blocks_every_pass_through_operation() {
    let fixture = fixture(Capabilities {
        handle_local_servers: false,
        ..Capabilities::default()
    });

    let denied = fixture
        .surface
        .handle_action(ACTION_ADD_PASS_THROUGH, &json!({ "authority": "a.example.com" }))
        .expect_err("action must be gated");
    assert!(matches!(denied, ControlError::FeatureDisabled(_)));

    // Gating must win even over a malformed request.
    let denied = fixture
        .surface
        .handle_action(ACTION_ADD_PASS_THROUGH, &json!({}))
        .expect_err("action must be gated");
    assert!(matches!(denied, ControlError::FeatureDisabled(_)));

    let denied = fixture
        .surface
        .handle_query(QUERY_GET_PASS_THROUGHS, &json!({}))
        .expect_err("query must be gated");
    assert!(matches!(denied, ControlError::FeatureDisabled(_)));

    assert!(fixture.registry.list().is_empty());

    // The certificate side of the surface is unaffected.
    fixture
        .surface
        .handle_action(ACTION_GENERATE_ROOT_CA_CERT, &json!({}))
        .expect("cert handling stays enabled");
}

#[test]
fn disabled_server_certs_capability_blocks_certificate_operations() {
    let fixture = fixture(Capabilities {
        handle_server_certs: false,
        ..Capabilities::default()
    });

    for (name, params) in [
        (ACTION_GENERATE_ROOT_CA_CERT, json!({})),
        (ACTION_IMPORT_ROOT_CA_CERT, json!({ "filePath": "/tmp/ca.pem" })),
        (ACTION_SET_ROOT_CA_CERT_VALIDITY, json!({ "validity": 825 })),
    ] {
        let denied = fixture
            .surface
            .handle_action(name, &params)
            .expect_err("cert action must be gated");
        assert!(matches!(denied, ControlError::FeatureDisabled(_)), "{name}");
    }
    assert!(matches!(
        fixture.surface.root_ca_cert(),
        Err(ControlError::FeatureDisabled(_))
    ));
    assert!(fixture.certificates.root_ca().is_none());

    fixture
        .surface
        .handle_action(ACTION_ADD_PASS_THROUGH, &json!({ "authority": "a.example.com" }))
        .expect("pass-through handling stays enabled");
}

#[test]
fn dispatch_validates_names_and_parameters() {
    let fixture = fixture(Capabilities::default());

    assert_eq!(
        fixture.surface.handle_action("selfDestruct", &json!({})),
        Err(ControlError::NotFound("action"))
    );
    assert_eq!(
        fixture.surface.handle_query("getSecrets", &json!({})),
        Err(ControlError::NotFound("query"))
    );
    assert_eq!(
        fixture.surface.handle_action(ACTION_ADD_PASS_THROUGH, &json!({})),
        Err(ControlError::MissingParameter("authority"))
    );
    assert!(matches!(
        fixture
            .surface
            .handle_action(ACTION_SET_ROOT_CA_CERT_VALIDITY, &json!({ "validity": "soon" })),
        Err(ControlError::InvalidParameter { name: "validity", .. })
    ));
}

#[test]
fn validity_round_trips_and_rejects_non_positive_values() {
    let fixture = fixture(Capabilities::default());

    assert!(matches!(
        fixture
            .surface
            .handle_action(ACTION_SET_ROOT_CA_CERT_VALIDITY, &json!({ "validity": -1 })),
        Err(ControlError::InvalidParameter { name: "validity", .. })
    ));

    fixture
        .surface
        .handle_action(ACTION_SET_ROOT_CA_CERT_VALIDITY, &json!({ "validity": 825 }))
        .expect("set validity");
    assert_eq!(
        fixture
            .surface
            .handle_query(QUERY_GET_ROOT_CA_CERT_VALIDITY, &json!({}))
            .expect("query validity"),
        json!(825)
    );
}

#[test]
fn duplicate_and_unknown_rules_surface_their_error_kinds() {
    let fixture = fixture(Capabilities::default());
    fixture
        .surface
        .add_pass_through("api.example.com:443", true)
        .expect("first add");

    let duplicate = fixture
        .surface
        .add_pass_through("API.Example.com:443", true)
        .expect_err("duplicate must fail");
    assert_eq!(duplicate.kind(), "duplicate_rule");

    let missing = fixture
        .surface
        .remove_pass_through("unknown.example.com")
        .expect_err("unknown rule");
    assert_eq!(missing, ControlError::NotFound("pass-through rule"));
}

#[test]
fn root_ca_cert_download_contract() {
    let fixture = fixture(Capabilities::default());

    assert_eq!(
        fixture.surface.root_ca_cert().expect_err("no material yet"),
        ControlError::NotPresent
    );

    fixture.surface.generate_root_ca_cert().expect("generate");
    let download = fixture.surface.root_ca_cert().expect("download");
    assert_eq!(download.filename, ROOT_CA_CERT_FILENAME);
    assert_eq!(download.content_type, ROOT_CA_CERT_CONTENT_TYPE);
    assert!(download.body.contains("BEGIN CERTIFICATE"));
}

#[test]
fn import_action_round_trips_persisted_material() {
    let dir = tempfile::tempdir().expect("tempdir");
    let bundle_path = dir.path().join("root-ca.pem");

    let source = fixture(Capabilities::default());
    source.surface.generate_root_ca_cert().expect("generate");
    let bundle = format!(
        "{}{}",
        source.certificates.root_ca().expect("material").cert_pem(),
        source.certificates.root_ca().expect("material").key_pem(),
    );
    std::fs::write(&bundle_path, bundle).expect("write bundle");

    let target = fixture(Capabilities::default());
    target
        .surface
        .handle_action(
            ACTION_IMPORT_ROOT_CA_CERT,
            &json!({ "filePath": bundle_path.to_string_lossy() }),
        )
        .expect("import");
    assert_eq!(
        target.certificates.root_ca().expect("imported").fingerprint(),
        source.certificates.root_ca().expect("source").fingerprint()
    );

    let failure = target
        .surface
        .handle_action(
            ACTION_IMPORT_ROOT_CA_CERT,
            &json!({ "filePath": dir.path().join("missing.pem").to_string_lossy() }),
        )
        .expect_err("missing file must fail");
    assert_eq!(failure.kind(), "import_failure");
}
