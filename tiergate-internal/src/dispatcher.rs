use chrono::Utc;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::SendError, UnboundedSender};
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info};

use crate::router::ConversationRouter;
use crate::transport::{InboundEvent, Transport};
use crate::types::UserId;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

/// Polls the transport and fans events out to one worker task per user.
///
/// A user's events are handled strictly in arrival order by that user's
/// worker; different users proceed in parallel. Workers exit after sitting
/// idle and are respawned on the next event.
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    router: Arc<ConversationRouter>,
    idle_timeout: Duration,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, router: Arc<ConversationRouter>) -> Self {
        Self {
            transport,
            router,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        tokio::pin!(shutdown);
        let mut workers: HashMap<UserId, UnboundedSender<InboundEvent>> = HashMap::new();
        let mut backoff = INITIAL_BACKOFF;

        loop {
            let polled = tokio::select! {
                () = &mut shutdown => break,
                polled = self.transport.poll() => polled,
            };

            match polled {
                Ok(events) => {
                    backoff = INITIAL_BACKOFF;
                    for event in events {
                        self.dispatch(&mut workers, event);
                    }
                }
                // Logged when the error was built
                Err(_) => {
                    tokio::select! {
                        () = &mut shutdown => break,
                        () = sleep(backoff) => {}
                    }
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }

            workers.retain(|_, sender| !sender.is_closed());
        }

        info!("Dispatcher stopped with {} active workers", workers.len());
    }

    fn dispatch(
        &self,
        workers: &mut HashMap<UserId, UnboundedSender<InboundEvent>>,
        event: InboundEvent,
    ) {
        let user_id = event.user_id;
        let event = match workers.get(&user_id) {
            Some(sender) => match sender.send(event) {
                Ok(()) => return,
                // The worker went idle and closed its queue
                Err(SendError(event)) => event,
            },
            None => event,
        };

        let sender = self.spawn_worker(user_id);
        if sender.send(event).is_err() {
            debug!("Worker for user {user_id} exited before receiving its first event");
            return;
        }
        workers.insert(user_id, sender);
    }

    fn spawn_worker(&self, user_id: UserId) -> UnboundedSender<InboundEvent> {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let transport = self.transport.clone();
        let router = self.router.clone();
        let idle_timeout = self.idle_timeout;

        tokio::spawn(async move {
            debug!("Started worker for user {user_id}");
            loop {
                match timeout(idle_timeout, receiver.recv()).await {
                    Ok(Some(event)) => process_event(transport.as_ref(), &router, event).await,
                    Ok(None) => break,
                    Err(_) => {
                        // Refuse new events, then finish whatever was already queued
                        receiver.close();
                        while let Some(event) = receiver.recv().await {
                            process_event(transport.as_ref(), &router, event).await;
                        }
                        break;
                    }
                }
            }
            debug!("Worker for user {user_id} exited");
        });

        sender
    }
}

async fn process_event(transport: &dyn Transport, router: &ConversationRouter, event: InboundEvent) {
    if let Some(callback_id) = event.callback_id() {
        if transport.acknowledge(callback_id).await.is_err() {
            debug!("Could not acknowledge callback for user {}", event.user_id);
        }
    }

    let replies = router.handle(&event, Utc::now()).await;
    for reply in &replies {
        // Send failures are logged by the transport; later replies are still attempted
        let _ = transport.send(event.chat_id, reply).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::menu::{CHAT_LABEL, SEPARATOR_CALLBACK};
    use crate::testing::{test_router, RecordingBackend, ScriptedMembershipSource};
    use crate::transport::{EventPayload, Reply};
    use crate::types::ChatId;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use tokio::sync::oneshot;

    #[derive(Default)]
    struct QueueTransport {
        batches: Mutex<VecDeque<Vec<InboundEvent>>>,
        sent: Mutex<Vec<(ChatId, String)>>,
        acknowledged: Mutex<Vec<String>>,
    }

    impl QueueTransport {
        fn push(&self, batch: Vec<InboundEvent>) {
            self.batches.lock().unwrap().push_back(batch);
        }

        fn sent_to(&self, chat_id: ChatId) -> Vec<String> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(chat, _)| *chat == chat_id)
                .map(|(_, text)| text.clone())
                .collect()
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Transport for QueueTransport {
        async fn poll(&self) -> Result<Vec<InboundEvent>, Error> {
            let batch = self.batches.lock().unwrap().pop_front();
            match batch {
                Some(batch) => Ok(batch),
                None => {
                    sleep(Duration::from_millis(5)).await;
                    Ok(Vec::new())
                }
            }
        }

        async fn send(&self, chat_id: ChatId, reply: &Reply) -> Result<(), Error> {
            self.sent.lock().unwrap().push((chat_id, reply.text.clone()));
            Ok(())
        }

        async fn acknowledge(&self, callback_id: &str) -> Result<(), Error> {
            self.acknowledged.lock().unwrap().push(callback_id.to_string());
            Ok(())
        }
    }

    fn event(user: i64, payload: EventPayload) -> InboundEvent {
        InboundEvent {
            user_id: UserId(user),
            chat_id: ChatId(user),
            payload,
        }
    }

    fn text(user: i64, text: &str) -> InboundEvent {
        event(user, EventPayload::Text(text.to_string()))
    }

    async fn wait_for_sent(transport: &QueueTransport, count: usize) {
        timeout(Duration::from_secs(5), async {
            while transport.sent_count() < count {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    fn start(
        transport: Arc<QueueTransport>,
        idle_timeout: Duration,
    ) -> (oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
        let backend = Arc::new(RecordingBackend::default());
        let router = Arc::new(test_router(
            Arc::new(ScriptedMembershipSource::default()),
            &backend,
            Duration::from_secs(1),
        ));
        let dispatcher = Dispatcher::new(transport, router).with_idle_timeout(idle_timeout);
        let (stop, stopped) = oneshot::channel::<()>();
        let handle = tokio::spawn(dispatcher.run(async {
            let _ = stopped.await;
        }));
        (stop, handle)
    }

    #[tokio::test]
    async fn test_events_are_handled_in_order_per_user() {
        let transport = Arc::new(QueueTransport::default());
        transport.push(vec![
            text(1, CHAT_LABEL),
            text(2, "hello"),
            text(1, "first question"),
        ]);
        transport.push(vec![text(1, "second message")]);

        let (stop, handle) = start(transport.clone(), Duration::from_secs(60));
        wait_for_sent(&transport, 4).await;
        stop.send(()).unwrap();
        handle.await.unwrap();

        let user_one = transport.sent_to(ChatId(1));
        assert_eq!(user_one.len(), 3);
        assert!(user_one[0].contains("ready to talk"));
        assert!(user_one[1].contains("chat for first question"));
        assert!(user_one[2].contains("did not understand"));

        let user_two = transport.sent_to(ChatId(2));
        assert_eq!(user_two.len(), 1);
        assert!(user_two[0].contains("did not understand"));
    }

    #[tokio::test]
    async fn test_callbacks_are_acknowledged() {
        let transport = Arc::new(QueueTransport::default());
        transport.push(vec![event(
            1,
            EventPayload::Callback {
                id: "cb-42".to_string(),
                data: SEPARATOR_CALLBACK.to_string(),
            },
        )]);
        transport.push(vec![text(1, "ping")]);

        let (stop, handle) = start(transport.clone(), Duration::from_secs(60));
        wait_for_sent(&transport, 1).await;
        stop.send(()).unwrap();
        handle.await.unwrap();

        assert_eq!(*transport.acknowledged.lock().unwrap(), vec!["cb-42".to_string()]);
        // The separator produces no reply, only the fallback for "ping" was sent
        assert_eq!(transport.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_idle_worker_is_respawned() {
        let transport = Arc::new(QueueTransport::default());
        transport.push(vec![text(1, "one")]);

        let (stop, handle) = start(transport.clone(), Duration::from_millis(20));
        wait_for_sent(&transport, 1).await;

        // Let the worker time out, then send again
        sleep(Duration::from_millis(100)).await;
        transport.push(vec![text(1, "two")]);
        wait_for_sent(&transport, 2).await;

        stop.send(()).unwrap();
        handle.await.unwrap();
        assert_eq!(transport.sent_to(ChatId(1)).len(), 2);
    }
}
