use std::time::{Duration, Instant};

use serde_json::json;
use stubkit::{LocalMockServer, MockRegistry, Payload, ResponseDefinition};

async fn setup() -> (LocalMockServer, MockRegistry) {
    let server = LocalMockServer::start().await;
    let registry = MockRegistry::new(server.clone());
    (server, registry)
}

#[tokio::test]
async fn unlimited_stub_answers_every_matching_request() {
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

    // Act + Assert
    let url = format!("{}/test", server.uri());
    for _ in 0..5 {
        let status = reqwest::get(&url).await.unwrap().status();
        assert_eq!(status, 200);
    }
}

#[tokio::test]
async fn once_stub_answers_a_single_request_then_404s() {
    // Arrange
    let (server, registry) = setup().await;
    registry
        .stub()
        .method("GET")
        .path("/test")
        .respond(ResponseDefinition::new(201))
        .once()
        .await
        .unwrap();

    // Act
    let url = format!("{}/test", server.uri());
    let first = reqwest::get(&url).await.unwrap().status();
    let second = reqwest::get(&url).await.unwrap().status();

    // Assert
    assert_eq!(first, 201);
    assert_eq!(second, 404);
}

#[tokio::test]
async fn exactly_n_stub_is_exhausted_after_n_requests() {
    // Arrange
    let (server, registry) = setup().await;
    registry
        .stub()
        .method("GET")
        .path("/test")
        .respond(ResponseDefinition::new(200))
        .exactly(3)
        .await
        .unwrap();

    // Act + Assert
    let url = format!("{}/test", server.uri());
    for _ in 0..3 {
        assert_eq!(reqwest::get(&url).await.unwrap().status(), 200);
    }
    assert_eq!(reqwest::get(&url).await.unwrap().status(), 404);
    assert_eq!(reqwest::get(&url).await.unwrap().status(), 404);
}

#[tokio::test]
async fn exactly_zero_stub_always_404s_but_records_traffic() {
    // Arrange
    let (server, registry) = setup().await;
    let mock = registry
        .stub()
        .method("GET")
        .path("/test")
        .respond(ResponseDefinition::new(200))
        .exactly(0)
        .await
        .unwrap();

    // Act
    let url = format!("{}/test", server.uri());
    assert_eq!(reqwest::get(&url).await.unwrap().status(), 404);
    assert_eq!(reqwest::get(&url).await.unwrap().status(), 404);

    // Assert
    mock.verify_exactly(2).await.unwrap();
}

#[tokio::test]
async fn path_parameters_are_substituted_into_the_template() {
    // Arrange
    let (server, registry) = setup().await;
    registry
        .stub()
        .method("GET")
        .path("/contexts/{contextId}/items/{itemId}")
        .path_param("contextId", "7")
        .path_param("itemId", "42")
        .respond(ResponseDefinition::new(200))
        .unlimited()
        .await
        .unwrap();

    // Act + Assert
    let hit = format!("{}/contexts/7/items/42", server.uri());
    assert_eq!(reqwest::get(&hit).await.unwrap().status(), 200);

    let miss = format!("{}/contexts/7/items/43", server.uri());
    assert_eq!(reqwest::get(&miss).await.unwrap().status(), 404);
}

#[tokio::test]
async fn unbound_path_parameter_fails_before_reaching_the_backend() {
    // Arrange
    let (_server, registry) = setup().await;

    // Act
    let result = registry
        .stub()
        .method("GET")
        .path("/contexts/{contextId}")
        .unlimited()
        .await;

    // Assert
    let err = result.unwrap_err();
    assert!(err.to_string().contains("contextId"));
}

#[tokio::test]
async fn query_parameters_match_as_a_multiset() {
    // Arrange
    let (server, registry) = setup().await;
    registry
        .stub()
        .method("GET")
        .path("/test")
        .query_param("id", "1")
        .query_param("id", "2")
        .respond(ResponseDefinition::new(200))
        .unlimited()
        .await
        .unwrap();

    // Act + Assert
    let base = server.uri();
    let ordered = format!("{}/test?id=1&id=2", base);
    assert_eq!(reqwest::get(&ordered).await.unwrap().status(), 200);

    let swapped = format!("{}/test?id=2&id=1", base);
    assert_eq!(reqwest::get(&swapped).await.unwrap().status(), 200);

    let partial = format!("{}/test?id=1", base);
    assert_eq!(reqwest::get(&partial).await.unwrap().status(), 404);
}

#[tokio::test]
async fn header_and_cookie_constraints_are_honored() {
    // Arrange
    let (server, registry) = setup().await;
    registry
        .stub()
        .method("GET")
        .path("/test")
        .header("x-api-key", "secret")
        .cookie("session", "abc")
        .respond(ResponseDefinition::new(200))
        .unlimited()
        .await
        .unwrap();

    // Act
    let client = reqwest::Client::new();
    let url = format!("{}/test", server.uri());
    let with_both = client
        .get(&url)
        .header("x-api-key", "secret")
        .header("cookie", "session=abc; other=x")
        .send()
        .await
        .unwrap()
        .status();
    let without_cookie = client
        .get(&url)
        .header("x-api-key", "secret")
        .send()
        .await
        .unwrap()
        .status();

    // Assert
    assert_eq!(with_both, 200);
    assert_eq!(without_cookie, 404);
}

#[tokio::test]
async fn json_bodies_match_ignoring_extra_fields_and_array_order() {
    // Arrange
    let (server, registry) = setup().await;
    registry
        .stub()
        .method("POST")
        .path("/test")
        .body_json(&json!({"name": "a", "tags": [2, 1]}))
        .respond(ResponseDefinition::new(200))
        .unlimited()
        .await
        .unwrap();

    // Act
    let client = reqwest::Client::new();
    let url = format!("{}/test", server.uri());
    let matching = client
        .post(&url)
        .json(&json!({"name": "a", "tags": [1, 2], "extra": true}))
        .send()
        .await
        .unwrap()
        .status();
    let mismatching = client
        .post(&url)
        .json(&json!({"name": "b", "tags": [1, 2]}))
        .send()
        .await
        .unwrap()
        .status();

    // Assert
    assert_eq!(matching, 200);
    assert_eq!(mismatching, 404);
}

#[tokio::test]
async fn text_bodies_must_match_exactly() {
    // Arrange
    let (server, registry) = setup().await;
    registry
        .stub()
        .method("POST")
        .path("/test")
        .body_text("hello")
        .respond(ResponseDefinition::new(200))
        .unlimited()
        .await
        .unwrap();

    // Act
    let client = reqwest::Client::new();
    let url = format!("{}/test", server.uri());
    let exact = client.post(&url).body("hello").send().await.unwrap();
    let different = client.post(&url).body("hello!").send().await.unwrap();

    // Assert
    assert_eq!(exact.status(), 200);
    assert_eq!(different.status(), 404);
}

#[tokio::test]
async fn response_carries_status_headers_cookies_and_body() {
    // Arrange
    let (server, registry) = setup().await;
    registry
        .stub()
        .method("GET")
        .path("/test")
        .respond(
            ResponseDefinition::new(418)
                .insert_header("x-flavor", "earl-grey")
                .set_cookie("session", "xyz")
                .set_body_json(json!({"message": "short and stout"})),
        )
        .unlimited()
        .await
        .unwrap();

    // Act
    let response = reqwest::get(format!("{}/test", server.uri())).await.unwrap();

    // Assert
    assert_eq!(response.status(), 418);
    assert_eq!(response.headers()["x-flavor"], "earl-grey");
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(response.headers()["set-cookie"], "session=xyz");
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({"message": "short and stout"}));
}

#[tokio::test]
async fn response_body_can_come_from_a_payload_with_an_override() {
    // Arrange
    let (server, registry) = setup().await;
    let payload = Payload::json_value(json!({"id": 1, "status": "created"}))
        .override_path("status", &"deleted")
        .unwrap();
    registry
        .stub()
        .method("GET")
        .path("/test")
        .respond(ResponseDefinition::new(200).set_body(payload))
        .unlimited()
        .await
        .unwrap();

    // Act
    let response = reqwest::get(format!("{}/test", server.uri())).await.unwrap();

    // Assert
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body, json!({"id": 1, "status": "deleted"}));
}

#[tokio::test]
async fn response_delay_is_respected() {
    // Arrange
    let (server, registry) = setup().await;
    let delay = Duration::from_millis(200);
    registry
        .stub()
        .method("GET")
        .path("/test")
        .respond(ResponseDefinition::new(200).set_delay(delay))
        .unlimited()
        .await
        .unwrap();

    // Act
    let start = Instant::now();
    let status = reqwest::get(format!("{}/test", server.uri()))
        .await
        .unwrap()
        .status();

    // Assert
    assert_eq!(status, 200);
    assert!(start.elapsed() >= delay);
}

#[tokio::test]
async fn stubs_only_answer_their_own_pattern() {
    // Arrange
    let (server, registry) = setup().await;
    registry
        .stub()
        .method("GET")
        .path("/first")
        .respond(ResponseDefinition::new(200))
        .unlimited()
        .await
        .unwrap();
    registry
        .stub()
        .method("POST")
        .path("/second")
        .respond(ResponseDefinition::new(201))
        .unlimited()
        .await
        .unwrap();

    // Act + Assert
    let client = reqwest::Client::new();
    let base = server.uri();
    assert_eq!(
        reqwest::get(format!("{}/first", base)).await.unwrap().status(),
        200
    );
    assert_eq!(
        client
            .post(format!("{}/second", base))
            .send()
            .await
            .unwrap()
            .status(),
        201
    );
    // A GET against the POST-only stub's path falls through.
    assert_eq!(
        reqwest::get(format!("{}/second", base)).await.unwrap().status(),
        404
    );
}
