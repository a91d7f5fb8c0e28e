/*
 * Responsibility
 * - users テーブル向け SQLx 操作 (UserStore の Postgres 実装)
 * - PgPool を受け取り subject で 1 件引くだけ
 * - DB エラーは StoreError に変換して返す (resolver 側で deny)
 */
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::repos::error::StoreError;
use crate::repos::user_store::{BoxFuture, StoreResult, UserRecord, UserStore};

#[derive(Debug, FromRow)]
pub struct UserRow {
    #[sqlx(rename = "userId")]
    pub id: Uuid,
    #[sqlx(rename = "userName")]
    pub user_name: String,
    pub email: Option<String>,
    // NULL => no role data, '{}' => explicitly no roles
    pub roles: Option<Vec<String>>,
    #[sqlx(rename = "isActive")]
    pub is_active: bool,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id.to_string(),
            subject: row.user_name,
            email: row.email,
            roles: row.roles,
            active: row.is_active,
        }
    }
}

pub async fn find_by_user_name(
    db: &PgPool,
    user_name: &str,
) -> Result<Option<UserRow>, StoreError> {
    let row = sqlx::query_as::<_, UserRow>(
        r#"
        SELECT "userId", "userName", email, roles, "isActive"
        FROM users
        WHERE "userName" = $1
        "#,
    )
    .bind(user_name)
    .fetch_optional(db)
    .await?;

    Ok(row)
}

/// `UserStore` backed by the shared Postgres `users` table.
#[derive(Clone, Debug)]
pub struct PgUserStore {
    db: PgPool,
}

impl PgUserStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

impl UserStore for PgUserStore {
    fn find_by_subject<'a>(
        &'a self,
        subject: &'a str,
    ) -> BoxFuture<'a, StoreResult<Option<UserRecord>>> {
        Box::pin(async move {
            let row = find_by_user_name(&self.db, subject).await?;
            Ok(row.map(UserRecord::from))
        })
    }
}
