//! User-to-user message lifecycle.

use std::collections::HashSet;

use crate::{
    database::Database,
    errors::PortflowError,
    models::{Message, MessageType, NewNotification, NotificationType, Severity},
};

pub struct MessageService {
    db: Database,
}

impl MessageService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Send a new message.
    pub async fn send(
        &self,
        from_user_id: i64,
        to_user_id: i64,
        subject: &str,
        content: &str,
        message_type: MessageType,
        is_urgent: bool,
        related_ship_id: Option<i64>,
    ) -> Result<Message, PortflowError> {
        if subject.trim().is_empty() {
            return Err(PortflowError::Validation(
                "Message subject cannot be empty".to_string(),
            ));
        }
        if content.trim().is_empty() {
            return Err(PortflowError::Validation(
                "Message content cannot be empty".to_string(),
            ));
        }

        self.db
            .insert_message(
                from_user_id,
                to_user_id,
                subject,
                content,
                message_type,
                is_urgent,
                related_ship_id,
                None,
            )
            .await
    }

    /// Reply to an existing message.
    ///
    /// The reply goes back to the original sender, keeps the related ship,
    /// and prefixes the subject. A reply is refused when the ancestor chain
    /// of the parent revisits a message id, so chains stay acyclic.
    pub async fn reply(
        &self,
        parent_message_id: i64,
        from_user_id: i64,
        content: &str,
    ) -> Result<Message, PortflowError> {
        if content.trim().is_empty() {
            return Err(PortflowError::Validation(
                "Message content cannot be empty".to_string(),
            ));
        }

        let parent = self.db.message_by_id(parent_message_id).await?;
        self.ensure_acyclic_chain(&parent).await?;

        let subject = if parent.subject.starts_with("Re: ") {
            parent.subject.clone()
        } else {
            format!("Re: {}", parent.subject)
        };

        self.db
            .insert_message(
                from_user_id,
                parent.from_user_id,
                &subject,
                content,
                parent.message_type,
                false,
                parent.related_ship_id,
                Some(parent.id),
            )
            .await
    }

    async fn ensure_acyclic_chain(&self, start: &Message) -> Result<(), PortflowError> {
        let mut seen = HashSet::new();
        seen.insert(start.id);

        let mut next = start.parent_message_id;
        while let Some(id) = next {
            if !seen.insert(id) {
                return Err(PortflowError::Validation(
                    "Reply chain revisits an earlier message".to_string(),
                ));
            }
            next = self.db.message_by_id(id).await?.parent_message_id;
        }
        Ok(())
    }

    /// Mark a message read and send a read-receipt notification to the
    /// sender. NotFound unless the message exists and is addressed to the
    /// given user.
    pub async fn mark_read(
        &self,
        message_id: i64,
        user_id: i64,
    ) -> Result<Message, PortflowError> {
        let (message, first_read) = self.db.mark_message_read(message_id, user_id).await?;

        // Only the first read transition produces a receipt
        if first_read {
            let reader = self.db.username(user_id).await?;
            let receipt = NewNotification::new(
                message.from_user_id,
                "Your message was read",
                format!("{reader} read your message: {}", message.subject),
                NotificationType::System,
                Severity::Low,
            );
            self.db.create_notification(&receipt).await?;
        }

        Ok(message)
    }

    /// Messages addressed to a user, newest first.
    pub async fn inbox(&self, user_id: i64) -> Result<Vec<Message>, PortflowError> {
        self.db.inbox(user_id).await
    }

    pub async fn unread_count(&self, user_id: i64) -> Result<i64, PortflowError> {
        self.db.unread_message_count(user_id).await
    }
}
