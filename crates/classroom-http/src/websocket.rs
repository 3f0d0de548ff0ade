//! Live change feed.
//!
//! Clients connect to `/ws/events` and receive a message for every write to
//! the content store. Sending `{"subscribe": "lessons"}` narrows the feed to
//! the named collections; `{"unsubscribe": "lessons"}` removes one again.
//! With no subscriptions every collection is forwarded.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use classroom_core::content::Collection;
use classroom_core::event_bus::ChangeEvent;
use classroom_core::ClassroomContext;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Message a client may send.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(untagged)]
enum ClientMessage {
    Subscribe { subscribe: Collection },
    Unsubscribe { unsubscribe: Collection },
}

/// Message sent to the client.
#[derive(Serialize)]
struct WsEvent<'a> {
    /// e.g. `content:lessons:created`
    event_type: String,
    event: &'a ChangeEvent,
}

type Subscriptions = Arc<Mutex<HashSet<Collection>>>;

/// Handler for GET /ws/events
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(ctx): State<ClassroomContext>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, ctx))
}

async fn handle_socket(socket: WebSocket, ctx: ClassroomContext) {
    let (mut sender, mut receiver) = socket.split();
    let subscriptions: Subscriptions = Arc::new(Mutex::new(HashSet::new()));
    let mut event_rx = ctx.event_bus.subscribe();

    let subs = Arc::clone(&subscriptions);
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Text(text) = msg {
                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(request) => apply(&subs, request),
                    Err(_) => log::debug!("Ignoring unrecognised WebSocket message"),
                }
            }
        }
    });

    let send_task = tokio::spawn(async move {
        loop {
            match event_rx.recv().await {
                Ok(event) => {
                    let wanted = {
                        let subs = subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
                        wants(&subs, &event)
                    };
                    if !wanted {
                        continue;
                    }

                    let message = WsEvent {
                        event_type: event.event_type(),
                        event: &event,
                    };
                    let Ok(json) = serde_json::to_string(&message) else {
                        continue;
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break; // Client disconnected
                    }
                }
                Err(RecvError::Lagged(count)) => {
                    log::warn!("WebSocket client lagged by {count} events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    first_to_finish(recv_task, send_task).await;

    log::debug!("WebSocket connection closed");
}

/// Wait for either task, then abort the other and wait for it to drop.
async fn first_to_finish(mut recv_task: JoinHandle<()>, mut send_task: JoinHandle<()>) {
    tokio::select! {
        _ = &mut recv_task => {
            send_task.abort();
            let _ = send_task.await;
        }
        _ = &mut send_task => {
            recv_task.abort();
            let _ = recv_task.await;
        }
    }
}

fn apply(subscriptions: &Subscriptions, request: ClientMessage) {
    let mut subs = subscriptions.lock().unwrap_or_else(PoisonError::into_inner);
    match request {
        ClientMessage::Subscribe { subscribe } => {
            subs.insert(subscribe);
        }
        ClientMessage::Unsubscribe { unsubscribe } => {
            subs.remove(&unsubscribe);
        }
    }
}

/// Content events for subscribed collections; everything when none are.
fn wants(subscriptions: &HashSet<Collection>, event: &ChangeEvent) -> bool {
    match event {
        ChangeEvent::Content { collection, .. } => {
            subscriptions.is_empty() || subscriptions.contains(collection)
        }
        ChangeEvent::Session { .. } => false,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use classroom_core::event_bus::{EventBus, SessionOperation, WriteAction};

    fn lesson_created() -> ChangeEvent {
        ChangeEvent::content(Collection::Lessons, "l1", WriteAction::Created)
    }

    #[test]
    fn no_subscriptions_forwards_all_content() {
        assert!(wants(&HashSet::new(), &lesson_created()));
    }

    #[test]
    fn subscriptions_filter_collections() {
        let subs = HashSet::from([Collection::Contents]);
        assert!(!wants(&subs, &lesson_created()));
        assert!(wants(
            &subs,
            &ChangeEvent::content(Collection::Contents, "c1", WriteAction::Deleted)
        ));
    }

    #[test]
    fn session_events_never_forwarded() {
        let event = ChangeEvent::session(SessionOperation::Login);
        assert!(!wants(&HashSet::new(), &event));
    }

    #[test]
    fn parses_client_messages() {
        assert_eq!(
            serde_json::from_str::<ClientMessage>(r#"{"subscribe": "lessons"}"#).unwrap(),
            ClientMessage::Subscribe {
                subscribe: Collection::Lessons
            }
        );
        assert_eq!(
            serde_json::from_str::<ClientMessage>(r#"{"unsubscribe": "units"}"#).unwrap(),
            ClientMessage::Unsubscribe {
                unsubscribe: Collection::Units
            }
        );
        assert!(serde_json::from_str::<ClientMessage>(r#"{"subscribe": "courses"}"#).is_err());
    }

    #[test]
    fn apply_adds_and_removes() {
        let subs: Subscriptions = Arc::new(Mutex::new(HashSet::new()));
        apply(
            &subs,
            ClientMessage::Subscribe {
                subscribe: Collection::Lessons,
            },
        );
        assert!(subs.lock().unwrap().contains(&Collection::Lessons));

        apply(
            &subs,
            ClientMessage::Unsubscribe {
                unsubscribe: Collection::Lessons,
            },
        );
        assert!(subs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn closed_client_releases_event_receiver() {
        let bus = EventBus::new();
        let mut event_rx = bus.subscribe();
        let send_task = tokio::spawn(async move {
            let _ = event_rx.recv().await;
        });
        let recv_task = tokio::spawn(async {});

        first_to_finish(recv_task, send_task).await;
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn ws_event_serialization() {
        let event = lesson_created();
        let message = WsEvent {
            event_type: event.event_type(),
            event: &event,
        };
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["event_type"], "content:lessons:created");
        assert_eq!(json["event"]["id"], "l1");
    }
}
