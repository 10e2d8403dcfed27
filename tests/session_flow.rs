use serde_json::json;
use smartfarm_api::{ApiClient, ClientConfig, Credentials, MemoryStore};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ApiClient<MemoryStore, smartfarm_api::ReqwestTransport> {
    let config = ClientConfig::new(server.uri().parse().unwrap());
    ApiClient::new(config, MemoryStore::new())
}

#[tokio::test]
async fn authenticate_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/authenticate"))
        .and(body_json(json!({"username": "farmer1", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"result": {"access_token": "A", "refresh_token": "R", "name": "Kim"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let result = client
        .authenticate(&Credentials::new("farmer1", "pw"))
        .await
        .unwrap();
    assert_eq!(result.access_token, "A");
    assert_eq!(result.refresh_token, "R");
    assert_eq!(result.name, "Kim");
    assert_eq!(result.username, "farmer1");

    let session = client.sessions().get_session().await.unwrap().unwrap();
    assert_eq!(session.access_token, "A");
    assert_eq!(session.refresh_token, "R");

    let requests = server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn expired_token_is_refreshed_and_call_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/farm/me"))
        .and(header("authorization", "Bearer OLD"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh-token"))
        .and(header("authorization", "Bearer R"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"data": {"accessToken": "NEW", "refreshToken": "R2"}})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/farm/me"))
        .and(header("authorization", "Bearer NEW"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [{"farmId": 9, "farmName": "햇살농장"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.sessions().save_session("OLD", "R").await.unwrap();

    let farm = client.my_farm().await.unwrap();
    assert!(farm.is_some());
    let session = client.sessions().get_session().await.unwrap().unwrap();
    assert_eq!(session.access_token, "NEW");
    assert_eq!(session.refresh_token, "R2");
}

#[tokio::test]
async fn persistent_401_ends_session_after_one_retry() {
    let server = MockServer::start().await;
    Mock::given(path("/farm/me"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(path("/auth/refresh-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accessToken": "NEW"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.sessions().save_session("OLD", "R").await.unwrap();

    let err = client.my_farm().await.unwrap_err();
    assert_eq!(err.status(), Some(401));
    assert_eq!(client.sessions().get_session().await.unwrap(), None);
}
