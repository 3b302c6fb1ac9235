//! Integration tests for the admin command protocol.

use resque_common::{Codec, CommandRegistry, ResqueConfig};
use resque_domain::{AdminCommand, ErrorKind};
use resque_infrastructure::Publisher;
use resque_testing::{create_test_queue_store, RecordingWorker, WorkerEvent};
use resque_worker::{AdminChannel, AdminError, AdminListener, Invocation, Worker};
use std::sync::Arc;

const CHANNEL: &str = "resque:admin";

fn listener(worker: Arc<RecordingWorker>) -> AdminListener {
    AdminListener::new(Arc::new(Codec::default()), CHANNEL, worker)
}

#[test]
fn test_invocation_requires_a_worker() {
    let invocation = Invocation::new(AdminCommand::pause(true));

    let err = invocation.run().unwrap_err();

    assert!(!invocation.is_bound());
    assert!(matches!(err, AdminError::Unbound(AdminCommand::Pause { paused: true })));
    assert_eq!(err.kind(), ErrorKind::State);
}

#[test]
fn test_invocation_applies_commands() {
    let worker = RecordingWorker::new("host:1:mail");

    Invocation::new(AdminCommand::pause(true))
        .bind(&worker)
        .run()
        .unwrap();
    assert!(worker.is_paused());

    Invocation::new(AdminCommand::pause(false))
        .bind(&worker)
        .run()
        .unwrap();
    assert!(!worker.is_paused());

    Invocation::new(AdminCommand::shutdown(true))
        .bind(&worker)
        .run()
        .unwrap();
    assert!(worker.is_ended());
    assert_eq!(
        worker.events(),
        vec![
            WorkerEvent::TogglePause(true),
            WorkerEvent::TogglePause(false),
            WorkerEvent::End(true),
        ]
    );
}

#[tokio::test]
async fn test_publish_reaches_listener() {
    // Arrange
    let (queues, memory) = create_test_queue_store();
    memory.set_subscribers(CHANNEL, 2);
    let publisher: Arc<dyn Publisher> = Arc::new(queues);
    let codec = Arc::new(Codec::default());
    let channel = AdminChannel::from_config(publisher, codec, &ResqueConfig::default());
    let worker = Arc::new(RecordingWorker::new("host:1:mail"));
    let listener = listener(worker.clone());

    // Act
    let receivers = channel.publish(&AdminCommand::pause(true)).await.unwrap();
    for (name, message) in memory.published() {
        listener.on_message(&name, &message);
    }

    // Assert
    assert_eq!(channel.channel(), CHANNEL);
    assert_eq!(receivers, 2);
    assert_eq!(
        memory.published(),
        vec![(CHANNEL.to_string(), r#"{"class":"PauseCommand","args":[true]}"#.to_string())]
    );
    assert_eq!(worker.events(), vec![WorkerEvent::TogglePause(true)]);
}

#[tokio::test]
async fn test_publish_without_subscribers() {
    let (queues, memory) = create_test_queue_store();
    let channel = AdminChannel::new(Arc::new(queues), Arc::new(Codec::default()), CHANNEL);

    let receivers = channel.publish(&AdminCommand::shutdown(false)).await.unwrap();

    assert_eq!(receivers, 0);
    assert_eq!(memory.published().len(), 1);
}

#[tokio::test]
async fn test_publish_transport_failure() {
    let (queues, memory) = create_test_queue_store();
    memory.set_unavailable(true);
    let channel = AdminChannel::new(Arc::new(queues), Arc::new(Codec::default()), CHANNEL);

    let err = channel.publish(&AdminCommand::pause(false)).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[test]
fn test_handle_message_returns_command() {
    let worker = Arc::new(RecordingWorker::new("host:1:mail"));
    let listener = listener(worker.clone());

    let command = listener
        .handle_message(r#"{"class":"ShutdownCommand","args":[false]}"#)
        .unwrap();

    assert_eq!(command, AdminCommand::shutdown(false));
    assert_eq!(worker.events(), vec![WorkerEvent::End(false)]);
}

#[test]
fn test_unknown_command_is_dropped() {
    let worker = Arc::new(RecordingWorker::new("host:1:mail"));
    let listener = listener(worker.clone());

    let err = listener
        .handle_message(r#"{"class":"RebootCommand","args":[]}"#)
        .unwrap_err();
    listener.on_message(CHANNEL, r#"{"class":"RebootCommand","args":[]}"#);
    listener.on_message(CHANNEL, "not json");

    assert!(matches!(err, AdminError::Codec(ref e) if e.is_lookup()));
    assert!(worker.events().is_empty());
}

#[test]
fn test_messages_on_other_channels_are_ignored() {
    let worker = Arc::new(RecordingWorker::new("host:1:mail"));
    let listener = listener(worker.clone());

    listener.on_message("resque:other", r#"{"class":"PauseCommand","args":[true]}"#);

    assert!(worker.events().is_empty());
}

#[test]
fn test_aliased_command_names() {
    let registry = CommandRegistry::builder()
        .with_defaults()
        .alias("net.greghaines.jesque.admin.commands.PauseCommand", AdminCommand::PAUSE)
        .unwrap()
        .build();
    let worker = Arc::new(RecordingWorker::new("host:1:mail"));
    let listener = AdminListener::new(
        Arc::new(Codec::with_commands(registry)),
        CHANNEL,
        worker.clone(),
    );

    listener.on_message(
        CHANNEL,
        r#"{"class":"net.greghaines.jesque.admin.commands.PauseCommand","args":[true]}"#,
    );

    assert!(worker.is_paused());
}
