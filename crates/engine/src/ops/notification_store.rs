use async_trait::async_trait;
use sea_orm::{DatabaseConnection, QueryFilter, QueryOrder, prelude::*, sea_query::Expr};
use uuid::Uuid;

use crate::{
    EngineError, Notification, NotificationKind, NotificationSink, ResultEngine, SinkError,
    notifications,
};

/// Database backed notifications, also the default [`NotificationSink`].
#[derive(Clone, Debug)]
pub struct NotificationStore {
    database: DatabaseConnection,
}

impl NotificationStore {
    pub fn new(database: DatabaseConnection) -> Self {
        Self { database }
    }

    pub async fn create(
        &self,
        user_id: &str,
        message: &str,
        kind: NotificationKind,
    ) -> ResultEngine<Notification> {
        let notification = Notification::new(user_id.to_string(), message.to_string(), kind);
        notifications::Entity::insert(notifications::ActiveModel::from(&notification))
            .exec_without_returning(&self.database)
            .await?;
        Ok(notification)
    }

    /// Notifications of a user, newest first.
    pub async fn list(&self, user_id: &str) -> ResultEngine<Vec<Notification>> {
        notifications::Entity::find()
            .filter(notifications::Column::UserId.eq(user_id))
            .order_by_desc(notifications::Column::CreatedAt)
            .order_by_desc(notifications::Column::Id)
            .all(&self.database)
            .await?
            .into_iter()
            .map(Notification::try_from)
            .collect()
    }

    /// Mark one of `user_id`'s notifications as read.
    ///
    /// Someone else's notification is reported as not found.
    pub async fn mark_read(&self, user_id: &str, id: Uuid) -> ResultEngine<()> {
        let result = notifications::Entity::update_many()
            .col_expr(notifications::Column::Read, Expr::value(true))
            .filter(notifications::Column::Id.eq(id.to_string()))
            .filter(notifications::Column::UserId.eq(user_id))
            .exec(&self.database)
            .await?;
        if result.rows_affected == 0 {
            return Err(EngineError::NotFound(format!("notification {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationSink for NotificationStore {
    async fn notify(
        &self,
        user_id: &str,
        message: &str,
        kind: NotificationKind,
    ) -> Result<(), SinkError> {
        self.create(user_id, message, kind).await?;
        Ok(())
    }
}
