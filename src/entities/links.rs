use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};

/// Upper bound on `short_code`, mirrored by the `VARCHAR(20)` column.
pub const MAX_SHORT_CODE_LEN: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "links")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    /// Subject issued by the identity provider. Not a foreign key.
    #[sea_orm(column_type = "Text")]
    pub user_id: String,
    #[sea_orm(column_type = "Text")]
    pub original_url: String,
    #[sea_orm(column_type = "String(StringLen::N(20))", unique)]
    pub short_code: String,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = chrono::Utc::now();

        if insert {
            if self.created_at.is_not_set() {
                self.created_at = Set(now);
            }
            if self.updated_at.is_not_set() {
                self.updated_at = Set(now);
            }
        } else {
            if self.user_id.is_set() {
                return Err(DbErr::Custom("link owner cannot be changed".to_string()));
            }
            self.updated_at = Set(now);
        }

        if let ActiveValue::Set(code) = &self.short_code {
            if code.chars().count() > MAX_SHORT_CODE_LEN {
                return Err(DbErr::Custom(format!(
                    "short code exceeds {} characters",
                    MAX_SHORT_CODE_LEN
                )));
            }
        }

        Ok(self)
    }
}
