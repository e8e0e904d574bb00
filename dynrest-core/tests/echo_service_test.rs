use dynrest_core::{
    DynamicClient, InvokeError, Outcome,
    binding::Arguments,
    client::ClientBuilder,
    config::{ClientConfig, RunnerKind},
    deferred::DeferredError,
    http::StatusCode,
    rest::transport::TransportError,
    schema::ServiceDescription,
};
use echo_service::PETS_DESCRIPTION;
use serde_json::{Value, json};
use std::time::Duration;

async fn connect() -> DynamicClient {
    let addr = echo_service::spawn().await.unwrap();
    let description = ServiceDescription::from_json(PETS_DESCRIPTION).unwrap();

    DynamicClient::builder(description, format!("http://{addr}"))
        .build()
        .unwrap()
}

async fn value(client: &DynamicClient, method: &str, args: Arguments) -> Value {
    match client.invoke(method, args).await.unwrap() {
        Outcome::Value(value) => value,
        Outcome::Deferred(_) => panic!("Received deferred outcome for immediate method"),
    }
}

#[tokio::test]
async fn test_get_pet() {
    let client = connect().await;

    let pet = value(&client, "get_pet", Arguments::new().arg(1)).await;

    assert_eq!(pet, json!({ "id": 1, "name": "rex", "tag": "dog" }));
}

#[tokio::test]
async fn test_list_pets_with_optional_query() {
    let client = connect().await;

    let all = value(&client, "list_pets", vec![Value::Null, Value::Null].into()).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let cats = value(&client, "list_pets", Arguments::new().arg(Value::Null).arg("cat")).await;
    assert_eq!(cats, json!([{ "id": 2, "name": "tom", "tag": "cat" }]));

    let first = value(&client, "list_pets", Arguments::new().arg(1).arg(Value::Null)).await;
    assert_eq!(first[0]["name"], "rex");
    assert_eq!(first.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_create_then_get() {
    let client = connect().await;

    let created = value(
        &client,
        "create_pet",
        Arguments::new().arg(json!({ "name": "kiki", "tag": "bird" })),
    )
    .await;
    assert_eq!(created["name"], "kiki");

    let id = created["id"].clone();
    let fetched = value(&client, "get_pet", Arguments::new().arg(id)).await;
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn test_deferred_create() {
    let client = connect().await;

    let res = client
        .invoke("create_pet_later", Arguments::new().arg(json!({ "name": "bolt" })))
        .await
        .unwrap();

    let Outcome::Deferred(handle) = res else {
        panic!("Received immediate outcome for deferred method");
    };
    let pet = handle.get_timeout(Duration::from_secs(5)).await.unwrap();
    assert_eq!(pet["name"], "bolt");
    assert_eq!(pet["id"], 3);
}

#[tokio::test]
async fn test_not_found_is_a_status_error() {
    let client = connect().await;

    let err = client
        .invoke("get_pet", Arguments::new().arg(99))
        .await
        .unwrap_err();

    match err {
        InvokeError::Transport(TransportError::Status { status, .. }) => {
            assert_eq!(status, StatusCode::NOT_FOUND)
        }
        other => panic!("Unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_delete_returns_unit() {
    let client = connect().await;

    let res = value(&client, "delete_pet", Arguments::new().arg(2)).await;
    assert_eq!(res, Value::Null);

    let err = client
        .invoke("get_pet", Arguments::new().arg(2))
        .await
        .unwrap_err();
    assert!(matches!(err, InvokeError::Transport(TransportError::Status { .. })));
}

#[tokio::test]
async fn test_text_response() {
    let client = connect().await;

    let greeting = value(&client, "greet", Arguments::new().arg("big world")).await;

    assert_eq!(greeting, json!("Hello, big world"));
}

#[tokio::test]
async fn test_headers_are_sent() {
    let client = connect().await;

    let defaulted = value(&client, "echo_headers", Arguments::new().arg(Value::Null)).await;
    assert_eq!(defaulted["x-trace-id"], "none");
    assert_eq!(defaulted["accept"], "application/json");

    let given = value(&client, "echo_headers", Arguments::new().arg("abc-123")).await;
    assert_eq!(given["x-trace-id"], "abc-123");
}

#[tokio::test]
async fn test_form_body() {
    let client = connect().await;

    let echoed = value(
        &client,
        "submit_form",
        Arguments::new().arg(json!({ "name": "rex", "tags": ["a", "b"] })),
    )
    .await;

    assert_eq!(
        echoed,
        json!([["name", "rex"], ["tags", "a"], ["tags", "b"]])
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_deferred_timeout_and_cancel() {
    let client = connect().await;

    let Outcome::Deferred(handle) = client
        .invoke("slow", Arguments::new().arg(10_000))
        .await
        .unwrap()
    else {
        panic!("Received immediate outcome for deferred method");
    };

    let err = handle
        .get_timeout(Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, DeferredError::Timeout(_)));
    assert!(!handle.is_done());

    assert!(handle.cancel(true));
    assert!(matches!(handle.get().await, Err(DeferredError::Cancelled)));
}

#[tokio::test]
async fn test_client_from_config() {
    let addr = echo_service::spawn().await.unwrap();
    let config = ClientConfig {
        base_address: Some(format!("http://{addr}")),
        timeout_ms: Some(5_000),
        default_headers: [("x-api-key".to_string(), "secret".to_string())].into(),
        runner: RunnerKind::Detached,
        ..Default::default()
    };

    let client = ClientBuilder::from_config(
        ServiceDescription::from_json(PETS_DESCRIPTION).unwrap(),
        &config,
    )
    .unwrap()
    .build()
    .unwrap();

    let res = client
        .invoke("echo_headers", Arguments::new().arg(Value::Null))
        .await
        .unwrap();
    let Outcome::Value(headers) = res else {
        panic!("Received deferred outcome for immediate method");
    };
    assert_eq!(headers["x-api-key"], "secret");

    let Outcome::Deferred(handle) = client
        .invoke("slow", Arguments::new().arg(1))
        .await
        .unwrap()
    else {
        panic!("Received immediate outcome for deferred method");
    };
    assert!(!handle.cancel(true));
    assert_eq!(handle.get().await.unwrap(), json!({ "slept_ms": 1 }));
}
