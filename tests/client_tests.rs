use modbus_scanner_web::client::{ClientError, HttpScannerApi, ScannerApi};
use modbus_scanner_web::form::{Field, ScanForm};
use modbus_scanner_web::page::ScanPage;
use modbus_scanner_web::types::ScanConfig;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api_for(server: &MockServer) -> HttpScannerApi {
    HttpScannerApi::new(server.uri().parse().unwrap()).unwrap()
}

fn filled_form() -> ScanForm {
    ScanForm::new()
        .with(Field::ComPort, "COM1")
        .with(Field::BaudRate, "9600")
        .with(Field::Parity, "none")
        .with(Field::SlaveId, "1")
        .with(Field::StartRegister, "0")
        .with(Field::NumRegisters, "10")
}

#[tokio::test]
async fn port_list_becomes_options_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["COM1", "COM3"])))
        .expect(1)
        .mount(&server)
        .await;

    let page = ScanPage::new(api_for(&server));
    assert!(page.load_ports().await);

    let select = page.port_select();
    let options: Vec<(&str, &str)> = select
        .options()
        .iter()
        .map(|o| (o.value.as_str(), o.label.as_str()))
        .collect();
    assert_eq!(options, vec![("COM1", "COM1"), ("COM3", "COM3")]);
}

#[tokio::test]
async fn empty_port_list_gives_no_options() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let page = ScanPage::new(api_for(&server));
    assert!(page.load_ports().await);
    assert!(page.port_select().options().is_empty());
}

#[tokio::test]
async fn submission_sends_numbers_not_strings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scan"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({
            "comPort": "COM1",
            "baudRate": 9600,
            "parity": "none",
            "slaveId": 1,
            "startRegister": 0,
            "numRegisters": 10
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["Register 0: 1"])))
        .expect(1)
        .mount(&server)
        .await;

    let page = ScanPage::new(api_for(&server));
    let submission = page.submit(&filled_form()).await;
    assert!(submission.rendered);
    assert_eq!(page.results().texts(), vec!["Register 0: 1"]);

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(
        String::from_utf8_lossy(&requests[0].body),
        r#"{"comPort":"COM1","baudRate":9600,"parity":"none","slaveId":1,"startRegister":0,"numRegisters":10}"#
    );
}

#[tokio::test]
async fn new_results_replace_old_ones() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scan"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["Register 7: 999"])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/scan"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!(["Register 0: 123", "Register 1: 456"])),
        )
        .mount(&server)
        .await;

    let page = ScanPage::new(api_for(&server));
    page.submit(&filled_form()).await;
    assert_eq!(page.results().texts(), vec!["Register 7: 999"]);

    page.submit(&filled_form()).await;
    let results = page.results();
    assert_eq!(results.heading(), Some("Scan Results:"));
    assert_eq!(results.texts(), vec!["Register 0: 123", "Register 1: 456"]);
    assert!(results.lines().iter().all(|l| l.class == "text-light"));
}

#[tokio::test]
async fn server_error_is_a_protocol_error_with_message() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/scan"))
        .respond_with(
            ResponseTemplate::new(502)
                .set_body_json(json!({"error": "device did not answer before the timeout"})),
        )
        .mount(&server)
        .await;

    let api = api_for(&server);
    let err = api
        .scan(&ScanConfig::new("COM1", 9600, "none", 1, 0, 10))
        .await
        .unwrap_err();
    match err {
        ClientError::Protocol { status, detail } => {
            assert_eq!(status, 502);
            assert_eq!(detail, "device did not answer before the timeout");
        }
        other => panic!("expected protocol error, got {other:?}"),
    }

    let page = ScanPage::new(api);
    page.submit(&filled_form()).await;
    let error = page.results().error().map(str::to_owned).unwrap();
    assert!(error.starts_with("Scan failed: server responded with 502"), "{error}");
}

#[tokio::test]
async fn wrong_content_type_is_a_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ports"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let err = api_for(&server).list_ports().await.unwrap_err();
    assert!(matches!(err, ClientError::Protocol { status: 200, .. }), "{err:?}");
}

#[tokio::test]
async fn malformed_json_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/ports"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("[\"COM1\",", "application/json"))
        .mount(&server)
        .await;

    let page = ScanPage::new(api_for(&server));
    assert!(!page.load_ports().await);
    assert!(page.port_select().options().is_empty());
    let error = page.results().error().map(str::to_owned).unwrap();
    assert!(error.starts_with("Could not load ports: malformed response body"), "{error}");

    let err = page.api().list_ports().await.unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)), "{err:?}");
}

#[tokio::test]
async fn unreachable_server_is_a_connectivity_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = HttpScannerApi::new(format!("http://{addr}").parse().unwrap()).unwrap();
    let err = api.list_ports().await.unwrap_err();
    assert!(matches!(err, ClientError::Connectivity(_)), "{err:?}");
}

#[tokio::test]
async fn invalid_form_is_reported_without_a_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let page = ScanPage::new(api_for(&server));
    let form = filled_form().with(Field::NumRegisters, "ten");
    page.submit(&form).await;
    assert_eq!(
        page.results().error(),
        Some(r#"numRegisters must be a whole number, got "ten""#)
    );
}
