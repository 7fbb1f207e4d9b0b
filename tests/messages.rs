//! Message lifecycle integration tests.

use sqlx::PgPool;

use portflow::{
    database::Database,
    errors::PortflowError,
    messages::MessageService,
    models::{MessageType, NotificationType},
};

async fn setup(pool: PgPool) -> (Database, MessageService, i64, i64) {
    let db = Database::new(pool).await.unwrap();
    let service = MessageService::new(db.clone());
    let alice = db.create_user("alice", false).await.unwrap();
    let bob = db.create_user("bob", false).await.unwrap();
    (db, service, alice, bob)
}

#[sqlx::test]
async fn send_rejects_blank_subject_and_content(pool: PgPool) {
    let (_db, service, alice, bob) = setup(pool).await;

    let blank_subject = service
        .send(alice, bob, "  ", "hello", MessageType::General, false, None)
        .await;
    assert!(matches!(blank_subject, Err(PortflowError::Validation(_))));

    let blank_content = service
        .send(alice, bob, "ETA?", "", MessageType::General, false, None)
        .await;
    assert!(matches!(blank_content, Err(PortflowError::Validation(_))));
}

#[sqlx::test]
async fn reply_goes_back_to_the_original_sender(pool: PgPool) {
    let (_db, service, alice, bob) = setup(pool).await;

    let original = service
        .send(alice, bob, "ETA?", "When does the ship arrive?", MessageType::Inquiry, false, None)
        .await
        .unwrap();

    let reply = service.reply(original.id, bob, "Tomorrow morning").await.unwrap();
    assert_eq!(reply.from_user_id, bob);
    assert_eq!(reply.to_user_id, alice);
    assert_eq!(reply.subject, "Re: ETA?");
    assert_eq!(reply.parent_message_id, Some(original.id));
    assert_eq!(reply.message_type, MessageType::Inquiry);

    // Replying to the reply does not stack prefixes
    let second = service.reply(reply.id, alice, "Thanks").await.unwrap();
    assert_eq!(second.subject, "Re: ETA?");
    assert_eq!(second.to_user_id, bob);
}

#[sqlx::test]
async fn reply_refuses_a_cyclic_chain(pool: PgPool) {
    let (db, service, alice, bob) = setup(pool).await;

    let first = service
        .send(alice, bob, "ETA?", "When?", MessageType::Inquiry, false, None)
        .await
        .unwrap();
    let second = service.reply(first.id, bob, "Tomorrow").await.unwrap();

    // Corrupt the chain into a loop, as nothing enforces acyclicity in the
    // schema itself
    sqlx::query("UPDATE messages SET parent_message_id = $2 WHERE id = $1")
        .bind(first.id)
        .bind(second.id)
        .execute(db.pool())
        .await
        .unwrap();

    let result = service.reply(second.id, alice, "Looping").await;
    assert!(matches!(result, Err(PortflowError::Validation(_))));
}

#[sqlx::test]
async fn mark_read_notifies_the_sender_once(pool: PgPool) {
    let (db, service, alice, bob) = setup(pool).await;

    let message = service
        .send(alice, bob, "ETA?", "When?", MessageType::Inquiry, false, None)
        .await
        .unwrap();

    assert_eq!(service.unread_count(bob).await.unwrap(), 1);

    let read = service.mark_read(message.id, bob).await.unwrap();
    assert!(read.is_read);
    assert!(read.read_at.is_some());
    assert_eq!(service.unread_count(bob).await.unwrap(), 0);

    // The sender got a system read receipt
    let receipts = db.notifications_for_user(alice).await.unwrap();
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].notification_type, NotificationType::System);
    assert!(receipts[0].message.contains("bob"));

    // A second read does not produce another receipt
    service.mark_read(message.id, bob).await.unwrap();
    assert_eq!(db.notifications_for_user(alice).await.unwrap().len(), 1);
}

#[sqlx::test]
async fn concurrent_first_reads_emit_a_single_receipt(pool: PgPool) {
    let (db, service, alice, bob) = setup(pool).await;

    let message = service
        .send(alice, bob, "ETA?", "When?", MessageType::Inquiry, false, None)
        .await
        .unwrap();

    let (first, second) = tokio::join!(
        service.mark_read(message.id, bob),
        service.mark_read(message.id, bob),
    );
    assert!(first.unwrap().is_read);
    assert!(second.unwrap().is_read);

    let receipts = db.notifications_for_user(alice).await.unwrap();
    assert_eq!(receipts.len(), 1);
}

#[sqlx::test]
async fn mark_read_is_recipient_only(pool: PgPool) {
    let (_db, service, alice, bob) = setup(pool).await;

    let message = service
        .send(alice, bob, "ETA?", "When?", MessageType::Inquiry, false, None)
        .await
        .unwrap();

    // The sender is not the recipient and cannot mark it read
    assert!(matches!(
        service.mark_read(message.id, alice).await,
        Err(PortflowError::NotFound)
    ));
    assert_eq!(service.unread_count(bob).await.unwrap(), 1);
}

#[sqlx::test]
async fn inbox_is_newest_first(pool: PgPool) {
    let (_db, service, alice, bob) = setup(pool).await;

    for subject in ["first", "second", "third"] {
        service
            .send(alice, bob, subject, "body", MessageType::General, false, None)
            .await
            .unwrap();
    }

    let inbox = service.inbox(bob).await.unwrap();
    let subjects: Vec<_> = inbox.iter().map(|m| m.subject.as_str()).collect();
    assert_eq!(subjects, vec!["third", "second", "first"]);
}
