mod common;

use common::{FakeConnector, Post, next_event, next_server, wait_until};
use conduit_api::{
    ApiDispatcher, ApiError, ApiEvent, AsyncOperation, ConnectionStatus, GraphQLOperation, GraphQLRequest,
    GraphQLResponse, Listener, OperationState, StreamMessage, SubscriptionEndpoint, SubscriptionType,
};
use conduit_config::{ApiConfiguration, ApiPluginConfiguration, AuthorizationType};
use conduit_graphql_client::RequestDocument;
use conduit_http_client::{HttpClient, HttpClientConfig};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use tokio::sync::mpsc;

fn dispatcher(connector: Arc<FakeConnector>) -> ApiDispatcher {
    let config = ApiPluginConfiguration::new()
        .with_api(
            ApiConfiguration::new("blog", "https://blog.example.com/graphql")
                .with_authorization(AuthorizationType::ApiKey)
                .with_api_key("da2-blog"),
        )
        .unwrap()
        .with_api(ApiConfiguration::new("comments", "https://comments.example.com/graphql"))
        .unwrap();

    ApiDispatcher::builder().connector(connector).build(&config).unwrap()
}

fn endpoint<'a>(dispatcher: &'a ApiDispatcher, api: &str) -> &'a SubscriptionEndpoint {
    dispatcher.registry().resolve(api).unwrap().subscription_endpoint()
}

type Events = mpsc::UnboundedReceiver<ApiEvent<GraphQLResponse<Value>>>;

fn subscribe(dispatcher: &ApiDispatcher, api: &str) -> (GraphQLOperation<Value>, Events) {
    let (listener, events) = Listener::channel();
    let operation = dispatcher
        .subscribe(api, GraphQLRequest::stream("subscription { onCreatePost { id } }"), listener)
        .unwrap();
    (operation, events)
}

async fn established(events: &mut Events) -> String {
    match next_event(events).await {
        ApiEvent::Established { subscription_id } => subscription_id,
        other => panic!("expected established, got {:?}", other),
    }
}

async fn item(events: &mut Events) -> Value {
    match next_event(events).await {
        ApiEvent::Item(response) => response.data.unwrap(),
        other => panic!("expected item, got {:?}", other),
    }
}

#[tokio::test]
async fn test_subscriptions_share_one_connection() {
    let (connector, mut servers) = FakeConnector::new();
    let dispatcher = dispatcher(connector);

    let (first, mut first_events) = subscribe(&dispatcher, "blog");
    let mut server = next_server(&mut servers).await;
    let (first_id, document) = server.next_subscribe().await;
    assert_eq!(document.query, "subscription { onCreatePost { id } }");
    assert_eq!(established(&mut first_events).await, first_id);
    assert_eq!(first.subscription_id(), Some(first_id.clone()));

    let (second, mut second_events) = subscribe(&dispatcher, "blog");
    let (second_id, _) = server.next_subscribe().await;
    assert_eq!(established(&mut second_events).await, second_id);
    assert_ne!(first_id, second_id);

    let blog = endpoint(&dispatcher, "blog");
    assert_eq!(blog.connection_count(), 1);
    assert_eq!(blog.status(), ConnectionStatus::Connected);
    assert!(servers.try_recv().is_err());

    // unregistering one keeps the other flowing
    assert!(first.cancel());
    assert_eq!(server.expect_complete().await, first_id);
    server.next(&second_id, json!({ "onCreatePost": { "id": "1" } }));
    assert_eq!(item(&mut second_events).await, json!({ "id": "1" }));
    assert_eq!(blog.status(), ConnectionStatus::Connected);

    // the last one tears the connection down
    assert!(second.cancel());
    assert_eq!(server.expect_complete().await, second_id);
    server.closed().await;
    wait_until(|| blog.status() == ConnectionStatus::Disconnected).await;
    assert_eq!(second.state(), OperationState::Cancelled);
}

#[tokio::test]
async fn test_cancel_from_listener_stops_delivery() {
    let (connector, mut servers) = FakeConnector::new();
    let dispatcher = dispatcher(connector);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let handle: Arc<OnceLock<GraphQLOperation<Value>>> = Arc::new(OnceLock::new());

    let listener = Listener::new({
        let seen = seen.clone();
        let handle = handle.clone();
        move |event: ApiEvent<GraphQLResponse<Value>>| {
            if let ApiEvent::Item(response) = event {
                let name = response.data.unwrap().as_str().unwrap().to_string();
                if name == "B" {
                    handle.get().unwrap().cancel();
                }
                seen.lock().unwrap().push(name);
            }
        }
    });

    let operation = dispatcher
        .subscribe("blog", GraphQLRequest::stream("subscription { onLetter }"), listener)
        .unwrap();
    assert!(handle.set(operation).is_ok());

    let mut server = next_server(&mut servers).await;
    let (id, _) = server.next_subscribe().await;
    for letter in ["A", "B", "C"] {
        server.next(&id, json!({ "onLetter": letter }));
    }

    assert_eq!(server.expect_complete().await, id);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(*seen.lock().unwrap(), vec!["A", "B"]);
    assert_eq!(handle.get().unwrap().state(), OperationState::Cancelled);
}

#[tokio::test]
async fn test_cancel_after_second_item() {
    let (connector, mut servers) = FakeConnector::new();
    let dispatcher = dispatcher(connector);

    let (operation, mut events) = subscribe(&dispatcher, "blog");
    let mut server = next_server(&mut servers).await;
    let (id, _) = server.next_subscribe().await;
    established(&mut events).await;

    server.next(&id, json!({ "onCreatePost": "A" }));
    server.next(&id, json!({ "onCreatePost": "B" }));
    assert_eq!(item(&mut events).await, json!("A"));
    assert_eq!(item(&mut events).await, json!("B"));

    assert!(operation.cancel());
    assert!(!operation.cancel());
    server.next(&id, json!({ "onCreatePost": "C" }));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_pause_queues_items_in_order() {
    let (connector, mut servers) = FakeConnector::new();
    let dispatcher = dispatcher(connector);

    let (operation, mut events) = subscribe(&dispatcher, "blog");
    let mut server = next_server(&mut servers).await;
    let (id, _) = server.next_subscribe().await;
    established(&mut events).await;

    assert!(operation.pause());
    assert_eq!(operation.state(), OperationState::Paused);
    server.next(&id, json!({ "onCreatePost": 1 }));
    server.next(&id, json!({ "onCreatePost": 2 }));
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(events.try_recv().is_err());
    assert_eq!(endpoint(&dispatcher, "blog").status(), ConnectionStatus::Connected);

    assert!(operation.resume());
    assert_eq!(item(&mut events).await, json!(1));
    assert_eq!(item(&mut events).await, json!(2));
    assert!(!operation.resume());
}

#[tokio::test]
async fn test_connection_loss_fails_all_and_reconnects() {
    let (connector, mut servers) = FakeConnector::new();
    let dispatcher = dispatcher(connector);

    let (first, mut first_events) = subscribe(&dispatcher, "blog");
    let mut server = next_server(&mut servers).await;
    server.next_subscribe().await;
    established(&mut first_events).await;

    let (second, mut second_events) = subscribe(&dispatcher, "blog");
    server.next_subscribe().await;
    established(&mut second_events).await;

    server.fail("connection reset");
    for events in [&mut first_events, &mut second_events] {
        match next_event(events).await {
            ApiEvent::Failed(ApiError::Connection(message)) => assert!(message.contains("connection reset")),
            other => panic!("expected connection failure, got {:?}", other),
        }
    }
    wait_until(|| first.state() == OperationState::Failed && second.state() == OperationState::Failed).await;
    assert_eq!(endpoint(&dispatcher, "blog").status(), ConnectionStatus::Disconnected);

    let (_third, mut third_events) = subscribe(&dispatcher, "blog");
    let mut reconnected = next_server(&mut servers).await;
    reconnected.next_subscribe().await;
    established(&mut third_events).await;
    assert_eq!(endpoint(&dispatcher, "blog").connection_count(), 2);
}

#[tokio::test]
async fn test_handshake_failure_reported() {
    let (connector, _servers) = FakeConnector::new();
    connector.reject_handshakes(true);
    let dispatcher = dispatcher(connector);

    let (operation, mut events) = subscribe(&dispatcher, "blog");
    let event = next_event(&mut events).await;
    assert!(matches!(event.error(), Some(ApiError::Connection(_))));
    wait_until(|| operation.state() == OperationState::Failed).await;
    assert_eq!(endpoint(&dispatcher, "blog").status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_server_complete_and_error() {
    let (connector, mut servers) = FakeConnector::new();
    let dispatcher = dispatcher(connector);

    let (completed, mut completed_events) = subscribe(&dispatcher, "blog");
    let mut server = next_server(&mut servers).await;
    let (completed_id, _) = server.next_subscribe().await;
    established(&mut completed_events).await;

    let (errored, mut errored_events) = subscribe(&dispatcher, "blog");
    let (errored_id, _) = server.next_subscribe().await;
    established(&mut errored_events).await;

    server.complete(&completed_id);
    assert!(matches!(next_event(&mut completed_events).await, ApiEvent::Completed));
    wait_until(|| completed.state() == OperationState::Completed).await;

    server.error(&errored_id, "Unauthorized");
    match next_event(&mut errored_events).await {
        ApiEvent::Failed(ApiError::GraphQL(errors)) => assert_eq!(errors[0].message, "Unauthorized"),
        other => panic!("expected graphql error, got {:?}", other),
    }
    wait_until(|| errored.state() == OperationState::Failed).await;

    server.closed().await;
    wait_until(|| endpoint(&dispatcher, "blog").status() == ConnectionStatus::Disconnected).await;
}

#[tokio::test]
async fn test_connection_init_carries_authorization() {
    let (connector, mut servers) = FakeConnector::new();
    let dispatcher = dispatcher(connector);

    let (_blog, _blog_events) = subscribe(&dispatcher, "blog");
    let server = next_server(&mut servers).await;
    assert_eq!(server.url, "wss://blog.example.com/graphql");
    assert_eq!(server.init_payload.as_ref().unwrap()["x-api-key"], "da2-blog");

    let (_comments, _comments_events) = subscribe(&dispatcher, "comments");
    let server = next_server(&mut servers).await;
    assert_eq!(server.url, "wss://comments.example.com/graphql");
    assert!(server.init_payload.is_none());
}

#[tokio::test]
async fn test_model_subscription_decodes_items() {
    let (connector, mut servers) = FakeConnector::new();
    let dispatcher = dispatcher(connector);

    let (listener, mut events) = Listener::channel();
    let _operation = dispatcher
        .subscribe_model::<Post>("blog", SubscriptionType::OnCreate, listener)
        .unwrap();

    let mut server = next_server(&mut servers).await;
    let (id, document) = server.next_subscribe().await;
    assert_eq!(document.query, "subscription OnCreatePost { onCreatePost { id title } }");
    assert!(matches!(next_event(&mut events).await, ApiEvent::Established { .. }));

    // items for unknown ids are dropped
    server.next("unknown", json!({ "onCreatePost": { "id": "0", "title": "lost" } }));
    server.next(&id, json!({ "onCreatePost": { "id": "1", "title": "Hello" } }));

    match next_event(&mut events).await {
        ApiEvent::Item(response) => assert_eq!(
            response.data,
            Some(Post {
                id: "1".into(),
                title: "Hello".into()
            })
        ),
        other => panic!("expected item, got {:?}", other),
    }

    // an undecodable item fails only this subscription
    server.next(&id, json!({ "onCreatePost": { "id": 7 } }));
    assert!(next_event(&mut events).await.error().unwrap().is_protocol());
    assert_eq!(server.expect_complete().await, id);
}

#[tokio::test]
async fn test_endpoint_register_unregister() {
    let (connector, mut servers) = FakeConnector::new();
    let configuration = ApiConfiguration::new("blog", "http://localhost:4000/graphql");
    let client = HttpClient::new(HttpClientConfig::default()).unwrap();
    let endpoint = SubscriptionEndpoint::new(&configuration, client, connector);
    assert_eq!(endpoint.url(), "ws://localhost:4000/graphql");
    assert_eq!(endpoint.status(), ConnectionStatus::Disconnected);

    let (sink_a, mut rx_a) = mpsc::unbounded_channel();
    let (sink_b, _rx_b) = mpsc::unbounded_channel();
    let a = endpoint
        .register(RequestDocument::new("subscription { a }"), sink_a)
        .await
        .unwrap();
    let b = endpoint
        .register(RequestDocument::new("subscription { b }"), sink_b)
        .await
        .unwrap();
    assert_eq!(endpoint.subscription_count().await, 2);
    assert_eq!(endpoint.connection_count(), 1);

    let mut server = next_server(&mut servers).await;
    server.next_subscribe().await;
    server.next_subscribe().await;
    server.next(&a, json!({ "a": 1 }));
    assert!(matches!(rx_a.recv().await, Some(StreamMessage::Next(_))));

    assert!(endpoint.unregister(&a).await);
    assert!(!endpoint.unregister(&a).await);
    assert_eq!(endpoint.status(), ConnectionStatus::Connected);
    assert!(endpoint.unregister(&b).await);
    assert_eq!(endpoint.status(), ConnectionStatus::Disconnected);
    assert_eq!(endpoint.subscription_count().await, 0);
}

#[tokio::test]
async fn test_undecodable_item_spares_other_subscriptions() {
    let (connector, mut servers) = FakeConnector::new();
    let dispatcher = dispatcher(connector);

    let (listener, mut posts) = Listener::channel();
    let _posts = dispatcher
        .subscribe_model::<Post>("blog", SubscriptionType::OnCreate, listener)
        .unwrap();
    let (_raw, mut raw_events) = subscribe(&dispatcher, "blog");

    let mut server = next_server(&mut servers).await;
    server.next_subscribe().await;
    server.next_subscribe().await;

    let posts_id = match next_event(&mut posts).await {
        ApiEvent::Established { subscription_id } => subscription_id,
        other => panic!("expected established, got {:?}", other),
    };
    let raw_id = established(&mut raw_events).await;

    server.next(&posts_id, json!({ "onCreatePost": { "id": 7 } }));
    assert!(next_event(&mut posts).await.error().unwrap().is_protocol());
    assert_eq!(server.expect_complete().await, posts_id);

    server.next(&raw_id, json!({ "onCreatePost": { "id": "2" } }));
    assert_eq!(item(&mut raw_events).await, json!({ "id": "2" }));

    let blog = endpoint(&dispatcher, "blog");
    assert_eq!(blog.connection_count(), 1);
    assert_eq!(blog.status(), ConnectionStatus::Connected);
    assert_eq!(blog.subscription_count().await, 1);
}

#[tokio::test]
async fn test_connection_init_omits_default_headers() {
    let (connector, mut servers) = FakeConnector::new();
    let config = ApiPluginConfiguration::new()
        .with_api(ApiConfiguration::new("blog", "https://blog.example.com/graphql").with_api_key("da2-blog"))
        .unwrap();
    let dispatcher = ApiDispatcher::builder()
        .connector(connector)
        .http_config(HttpClientConfig::builder().default_header("x-trace", "on").build())
        .build(&config)
        .unwrap();

    let (_blog, _events) = subscribe(&dispatcher, "blog");
    let server = next_server(&mut servers).await;
    assert_eq!(server.init_payload, Some(json!({ "x-api-key": "da2-blog" })));
}
