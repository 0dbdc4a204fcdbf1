use std::time::{Duration, SystemTime};

use stubkit::{
    Error, Expectation, LocalMockServer, MockBackend, MockRegistry, ResponseDefinition,
};

async fn setup() -> (LocalMockServer, MockRegistry) {
    let server = LocalMockServer::start().await;
    let registry = MockRegistry::new(server.clone());
    (server, registry)
}

async fn hit(server: &LocalMockServer, path: &str, times: usize) {
    let url = format!("{}{}", server.uri(), path);
    for _ in 0..times {
        reqwest::get(&url).await.unwrap();
    }
}

#[tokio::test]
async fn verify_never_passes_without_traffic_and_fails_with_it() {
    // Arrange
    let (server, registry) = setup().await;
    let mock = registry
        .stub()
        .method("GET")
        .path("/test")
        .respond(ResponseDefinition::new(200))
        .unlimited()
        .await
        .unwrap();

    // Act + Assert
    mock.verify_never().await.unwrap();

    hit(&server, "/test", 1).await;
    let err = mock.verify_never().await.unwrap_err();
    assert!(matches!(err, Error::Verification(_)));
}

#[tokio::test]
async fn each_expectation_variant_checks_the_journal() {
    // Arrange
    let (server, registry) = setup().await;
    let mock = registry
        .stub()
        .method("GET")
        .path("/test")
        .respond(ResponseDefinition::new(200))
        .unlimited()
        .await
        .unwrap();

    // Act
    hit(&server, "/test", 3).await;

    // Assert
    mock.verify_exactly(3).await.unwrap();
    mock.verify_at_least(2).await.unwrap();
    mock.verify_at_most(3).await.unwrap();
    mock.verify_between(2, 4).await.unwrap();
    mock.verify(Expectation::Exactly(3)).await.unwrap();

    assert!(mock.verify_once().await.is_err());
    assert!(mock.verify_at_least(4).await.is_err());
    assert!(mock.verify_at_most(2).await.is_err());
    assert!(mock.verify_between(4, 6).await.is_err());
}

#[tokio::test]
async fn over_budget_requests_are_counted_too() {
    // Arrange
    let (server, registry) = setup().await;
    let mock = registry
        .stub()
        .method("GET")
        .path("/test")
        .respond(ResponseDefinition::new(200))
        .exactly(3)
        .await
        .unwrap();

    // Act: one more request than the budget allows.
    hit(&server, "/test", 4).await;

    // Assert: the 404'd fourth call still shows up in the count.
    mock.verify_exactly(4).await.unwrap();
    assert!(mock.verify_exactly(3).await.is_err());
}

#[tokio::test]
async fn verification_is_idempotent() {
    // Arrange
    let (server, registry) = setup().await;
    let mock = registry
        .stub()
        .method("GET")
        .path("/test")
        .respond(ResponseDefinition::new(200))
        .unlimited()
        .await
        .unwrap();
    hit(&server, "/test", 2).await;

    // Act + Assert: verifying does not consume the journal.
    mock.verify_exactly(2).await.unwrap();
    mock.verify_exactly(2).await.unwrap();
    mock.verify_at_least(2).await.unwrap();
}

#[tokio::test]
async fn two_bounded_stubs_for_the_same_pattern_do_not_share_state() {
    // Arrange: two independent single-shot stubs for different paths.
    let (server, registry) = setup().await;
    let first = registry
        .stub()
        .method("GET")
        .path("/first")
        .respond(ResponseDefinition::new(200))
        .once()
        .await
        .unwrap();
    let second = registry
        .stub()
        .method("GET")
        .path("/second")
        .respond(ResponseDefinition::new(200))
        .once()
        .await
        .unwrap();

    // Act: exhaust the first stub only.
    hit(&server, "/first", 2).await;

    // Assert: the second stub's budget is untouched.
    first.verify_exactly(2).await.unwrap();
    second.verify_never().await.unwrap();
    let url = format!("{}/second", server.uri());
    assert_eq!(reqwest::get(&url).await.unwrap().status(), 200);
}

#[tokio::test]
async fn wait_polls_until_the_expectation_is_met() {
    // Arrange
    let (server, registry) = setup().await;
    let mock = registry
        .stub()
        .method("GET")
        .path("/test")
        .respond(ResponseDefinition::new(200))
        .unlimited()
        .await
        .unwrap()
        .wait_at_most(Duration::from_millis(500));

    // Act: traffic arrives while the verification is already polling.
    let uri = server.uri();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        reqwest::get(format!("{}/test", uri)).await.unwrap();
    });

    // Assert
    mock.verify_once().await.unwrap();
}

#[tokio::test]
async fn wait_gives_up_at_the_deadline() {
    // Arrange
    let (_server, registry) = setup().await;
    let mock = registry
        .stub()
        .method("GET")
        .path("/test")
        .respond(ResponseDefinition::new(200))
        .unlimited()
        .await
        .unwrap()
        .wait_at_most(Duration::from_millis(200));

    // Act: nobody calls the stub.
    let err = mock.verify_once().await.unwrap_err();

    // Assert
    assert!(matches!(err, Error::Verification(_)));
    assert!(err.to_string().contains("exactly once"));
}

#[tokio::test]
async fn inverted_between_bounds_are_rejected_without_querying() {
    // Arrange
    let (_server, registry) = setup().await;
    let mock = registry
        .stub()
        .method("GET")
        .path("/test")
        .respond(ResponseDefinition::new(200))
        .unlimited()
        .await
        .unwrap();

    // Act
    let err = mock.verify_between(5, 2).await.unwrap_err();

    // Assert
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn failure_message_reports_expectation_count_and_traffic() {
    // Arrange
    let (server, registry) = setup().await;
    let mock = registry
        .stub()
        .method("GET")
        .path("/test")
        .respond(ResponseDefinition::new(200))
        .unlimited()
        .await
        .unwrap();

    // No traffic yet.
    let err = mock.verify_once().await.unwrap_err();
    assert!(err
        .to_string()
        .contains("Expected number of matching requests: exactly once, actual: 0"));
    assert!(err.to_string().contains("did not receive any request"));

    // Act: unrelated traffic is listed to help diagnose the mismatch.
    hit(&server, "/other", 1).await;
    let err = mock.verify_once().await.unwrap_err();

    // Assert: the dump flags the request as unanswered.
    assert!(err.to_string().contains("Received requests:"));
    assert!(err.to_string().contains("/other"));
    assert!(err.to_string().contains("unmatched"));
}

#[tokio::test]
async fn journal_records_carry_arrival_time_and_match_flag() {
    // Arrange
    let (server, registry) = setup().await;
    registry
        .stub()
        .method("GET")
        .path("/test")
        .respond(ResponseDefinition::new(200))
        .unlimited()
        .await
        .unwrap();

    // Act: one answered request, one that falls through to the 404 default.
    let before = SystemTime::now();
    hit(&server, "/test", 1).await;
    hit(&server, "/other", 1).await;
    let after = SystemTime::now();

    // Assert
    let records = server.received_requests().await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records[0].matched);
    assert_eq!(records[0].request.url.path(), "/test");
    assert!(!records[1].matched);
    assert_eq!(records[1].request.url.path(), "/other");
    for record in &records {
        assert!(record.received_at >= before);
        assert!(record.received_at <= after);
    }
}
