use crate::extractors::authenticated_peer::AuthenticatedPeer;
use crate::{AppState, Error};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Host, State};
use axum::response::Response;
use broker::connection::Registration;
use futures::{SinkExt, StreamExt};
use log::*;

/// GET open the consumer notification connection
///
/// The caller's identity is reserved in the connection registry before the
/// WebSocket handshake completes. A second connection for the same identity is
/// refused with 403 and leaves the first one untouched.
#[utoipa::path(
    get,
    path = "/notifications",
    responses(
        (status = 101, description = "Switching to the WebSocket notification stream"),
        (status = 401, description = "Missing peer credential, or identity matches the request host"),
        (status = 403, description = "A connection already exists for this identity"),
        (status = 500, description = "The request could not be upgraded to a WebSocket")
    ),
    security(
        ("peer_certificate" = [])
    )
)]
pub async fn socket_handler(
    AuthenticatedPeer(identity): AuthenticatedPeer,
    Host(host): Host,
    State(app_state): State<AppState>,
    ws: Option<WebSocketUpgrade>,
) -> Result<Response, Error> {
    debug!("Consumer connection requested by {identity} via host {host}");

    let (_, response) =
        app_state
            .broker_ref()
            .register_connection(identity, &host, move |registration| {
                let ws = ws.ok_or("request is not upgradable to a websocket")?;
                let peer = registration.identity().clone();
                Ok::<_, &'static str>(
                    ws.on_failed_upgrade(move |e| {
                        warn!("WebSocket handshake with {peer} failed: {e}")
                    })
                    .on_upgrade(move |socket| consumer_session(socket, registration)),
                )
            })?;

    Ok(response)
}

/// Drives one consumer connection: writes every queued notification to the socket
/// as a JSON text frame until either side goes away. Dropping the registration's
/// guard at the end removes the registry entry.
async fn consumer_session(socket: WebSocket, registration: Registration) {
    let identity = registration.identity().clone();
    let (mut queue, _guard) = registration.into_parts();
    let (mut sink, mut stream) = socket.split();

    info!("Consumer {identity} connected");

    loop {
        tokio::select! {
            queued = queue.recv() => match queued {
                Some(notification) => {
                    let text = match serde_json::to_string(&notification) {
                        Ok(text) => text,
                        Err(e) => {
                            error!("Failed to serialize notification for {identity}: {e}");
                            continue;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        warn!("Failed to write notification to {identity}: {e}");
                        break;
                    }
                }
                None => {
                    debug!("Connection for {identity} was removed from the registry");
                    break;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!("Connection for {identity} failed: {e}");
                    break;
                }
                // Inbound frames carry nothing for the broker; pings are answered by axum.
                Some(Ok(_)) => {}
            },
        }
    }

    let _ = sink.close().await;
    info!("Consumer {identity} disconnected");
}

#[cfg(test)]
mod tests {
    use crate::router::define_routes;
    use crate::AppState;
    use broker::identity::Identity;
    use broker::message::NotificationFromProducer;
    use broker::model::{NotificationDescriptor, Urn};
    use broker::Manager;
    use clap::Parser;
    use futures::{SinkExt, StreamExt};
    use serde_json::{json, Value};
    use service::config::Config;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::HeaderValue;
    use tokio_tungstenite::tungstenite::Message as ClientMessage;
    use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

    const CONSUMER: &str = "zone1:consumer";

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn serve() -> (SocketAddr, Arc<Manager>) {
        let config = Config::try_parse_from([
            "edge_broker",
            "--peer-identity-header",
            "x-ssl-client-cn",
        ])
        .unwrap();
        let broker = Arc::new(Manager::new());
        let app = define_routes(AppState::new(config, &broker));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (addr, broker)
    }

    async fn connect(addr: SocketAddr) -> Client {
        let mut request = format!("ws://{addr}/notifications")
            .into_client_request()
            .unwrap();
        request
            .headers_mut()
            .insert("x-ssl-client-cn", HeaderValue::from_static(CONSUMER));

        let (client, _) = connect_async(request).await.unwrap();
        client
    }

    async fn wait_until_disconnected(broker: &Manager) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !broker.registry().is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("registry entry should be removed after the connection ends");
    }

    #[tokio::test]
    async fn test_notification_is_written_as_json_text_frame() {
        let (addr, broker) = serve().await;
        let mut client = connect(addr).await;
        let consumer = Identity::new(CONSUMER);
        assert!(broker.connection(&consumer).is_some());

        broker
            .subscription_handler()
            .subscribe_to_service(
                &consumer,
                "zone1",
                "svc1",
                &[NotificationDescriptor::new("alert", "v1")],
            )
            .unwrap();
        let report = broker
            .dispatch(
                &Urn::new("zone1", "svc1"),
                &NotificationFromProducer {
                    name: "alert".to_string(),
                    version: "v1".to_string(),
                    payload: json!({"zone": "north"}),
                },
            )
            .await
            .unwrap();
        assert_eq!(report.delivered, vec![consumer]);

        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(frame.is_text());
        let delivered: Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
        assert_eq!(
            delivered,
            json!({
                "name": "alert",
                "version": "v1",
                "payload": {"zone": "north"},
                "producer": {"namespace": "zone1", "id": "svc1"}
            })
        );

        client.close(None).await.unwrap();
        wait_until_disconnected(&broker).await;
    }

    #[tokio::test]
    async fn test_dropped_client_releases_identity() {
        let (addr, broker) = serve().await;

        let client = connect(addr).await;
        assert_eq!(broker.registry().len(), 1);
        drop(client);
        wait_until_disconnected(&broker).await;

        // The identity can connect again once the first session is gone.
        let mut client = connect(addr).await;
        assert_eq!(broker.registry().len(), 1);
        client.close(None).await.unwrap();
        wait_until_disconnected(&broker).await;
    }

    #[tokio::test]
    async fn test_unregistered_connection_is_closed_by_broker() {
        let (addr, broker) = serve().await;
        let mut client = connect(addr).await;

        broker.unregister_connection(&Identity::new(CONSUMER));

        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match client.next().await {
                    Some(Ok(ClientMessage::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        })
        .await;
        assert!(closed.is_ok(), "broker should close the socket");
        assert!(broker.registry().is_empty());

        let _ = client.send(ClientMessage::Close(None)).await;
    }
}
