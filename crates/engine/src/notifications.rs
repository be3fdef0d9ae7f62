//! Best-effort user notifications.
//!
//! A failed push never fails the caller: delivery problems are logged
//! and swallowed. A `None` notifier is silent success.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use fitglue_notify::{PushMessage, PushSender};
use fitglue_core::UserRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    PipelineSuccess,
    PipelineFailure,
    PendingInput,
}

impl NotificationKind {
    fn allowed(&self, user: &UserRecord) -> bool {
        let prefs = user.preferences();
        match self {
            NotificationKind::PipelineSuccess => prefs.notify_pipeline_success,
            NotificationKind::PipelineFailure => prefs.notify_pipeline_failure,
            NotificationKind::PendingInput => prefs.notify_pending_input,
        }
    }
}

/// Send a push to all of the user's devices, honoring preferences.
pub async fn notify_user(
    notifier: Option<&Arc<dyn PushSender>>,
    user: &UserRecord,
    kind: NotificationKind,
    title: &str,
    body: &str,
    data: HashMap<String, String>,
) {
    let Some(notifier) = notifier else {
        return;
    };
    if !kind.allowed(user) {
        debug!(user_id = %user.user_id, ?kind, "notification suppressed by preferences");
        return;
    }
    if user.fcm_tokens.is_empty() {
        debug!(user_id = %user.user_id, "no device tokens registered");
        return;
    }

    let message = PushMessage {
        title: title.to_string(),
        body: body.to_string(),
        data,
    };
    if let Err(e) = notifier.send(&user.fcm_tokens, &message).await {
        warn!(user_id = %user.user_id, error = %e, "push notification failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fitglue_core::NotificationPreferences;
    use fitglue_notify::MemorySender;

    fn user_with_tokens() -> UserRecord {
        UserRecord {
            user_id: "u1".into(),
            fcm_tokens: vec!["tok".into()],
            ..UserRecord::default()
        }
    }

    #[tokio::test]
    async fn sends_when_allowed() {
        let sender = Arc::new(MemorySender::new());
        let dyn_sender: Arc<dyn PushSender> = sender.clone();
        notify_user(
            Some(&dyn_sender),
            &user_with_tokens(),
            NotificationKind::PipelineSuccess,
            "Synced",
            "Morning Run uploaded",
            HashMap::new(),
        )
        .await;
        assert_eq!(sender.sent_count().await, 1);
    }

    #[tokio::test]
    async fn preference_suppresses() {
        let sender = Arc::new(MemorySender::new());
        let dyn_sender: Arc<dyn PushSender> = sender.clone();
        let mut user = user_with_tokens();
        user.notification_preferences = Some(NotificationPreferences {
            notify_pipeline_success: false,
            ..NotificationPreferences::default()
        });
        notify_user(
            Some(&dyn_sender),
            &user,
            NotificationKind::PipelineSuccess,
            "Synced",
            "x",
            HashMap::new(),
        )
        .await;
        assert_eq!(sender.sent_count().await, 0);
    }

    #[tokio::test]
    async fn failure_is_swallowed() {
        let sender: Arc<dyn PushSender> = Arc::new(MemorySender::failing());
        notify_user(
            Some(&sender),
            &user_with_tokens(),
            NotificationKind::PipelineFailure,
            "Failed",
            "x",
            HashMap::new(),
        )
        .await;
        // No panic, no error: best-effort.
    }

    #[tokio::test]
    async fn none_notifier_is_silent_success() {
        notify_user(
            None,
            &user_with_tokens(),
            NotificationKind::PendingInput,
            "t",
            "b",
            HashMap::new(),
        )
        .await;
    }
}
