#[allow(unused_imports)]
pub mod prelude {
    pub use super::refresh_token::Entity as RefreshToken;
    pub use super::user::Entity as User;
}

pub mod user {
    use sea_orm::entity::prelude::*;

    use crate::db::dao::{HasCreatedAtColumn, HasIdActiveModel, TimestampedActiveModel};

    /// Local account bound to an external identity. Rows are never hard
    /// deleted; `deleted_at` marks removal and every authentication read
    /// must filter it.
    #[sea_orm::model]
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "users")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        #[sea_orm(unique)]
        pub email: String,
        #[sea_orm(indexed)]
        pub provider: String,
        #[sea_orm(indexed)]
        pub provider_id: Option<String>,
        pub first_name: Option<String>,
        pub last_name: Option<String>,
        pub avatar_url: Option<String>,
        pub role: String,
        #[sea_orm(default_value = false)]
        pub onboarding_completed: bool,
        pub password_hash: Option<String>,
        #[sea_orm(default_expr = "Expr::current_timestamp()")]
        pub created_at: DateTimeWithTimeZone,
        #[sea_orm(default_expr = "Expr::current_timestamp()")]
        pub updated_at: DateTimeWithTimeZone,
        pub deleted_at: Option<DateTimeWithTimeZone>,
        #[sea_orm(has_many)]
        pub refresh_tokens: HasMany<super::refresh_token::Entity>,
    }

    impl ActiveModelBehavior for ActiveModel {}

    impl HasIdActiveModel for ActiveModel {
        fn set_id(&mut self, id: Uuid) {
            self.id = sea_orm::Set(id);
        }
    }

    impl TimestampedActiveModel for ActiveModel {
        fn set_created_at(&mut self, ts: DateTimeWithTimeZone) {
            self.created_at = sea_orm::Set(ts);
        }

        fn set_updated_at(&mut self, ts: DateTimeWithTimeZone) {
            self.updated_at = sea_orm::Set(ts);
        }
    }

    impl HasCreatedAtColumn for Entity {
        fn created_at_column() -> Self::Column {
            Column::CreatedAt
        }
    }
}

pub mod refresh_token {
    use sea_orm::entity::prelude::*;

    use crate::db::dao::{HasCreatedAtColumn, HasIdActiveModel, TimestampedActiveModel};

    /// One outstanding, single-use session-renewal capability. Valid iff
    /// `revoked_at` is unset and `expires_at` is in the future; redeeming
    /// revokes the row and issues a replacement.
    #[sea_orm::model]
    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "refresh_tokens")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        #[sea_orm(unique)]
        pub token: String,
        #[sea_orm(indexed)]
        pub user_id: Uuid,
        pub expires_at: DateTimeWithTimeZone,
        #[sea_orm(default_expr = "Expr::current_timestamp()")]
        pub created_at: DateTimeWithTimeZone,
        #[sea_orm(default_expr = "Expr::current_timestamp()")]
        pub updated_at: DateTimeWithTimeZone,
        pub revoked_at: Option<DateTimeWithTimeZone>,
        #[sea_orm(belongs_to, from = "user_id", to = "id", on_delete = "Cascade")]
        pub user: HasOne<super::user::Entity>,
    }

    impl ActiveModelBehavior for ActiveModel {}

    impl HasIdActiveModel for ActiveModel {
        fn set_id(&mut self, id: Uuid) {
            self.id = sea_orm::Set(id);
        }
    }

    impl TimestampedActiveModel for ActiveModel {
        fn set_created_at(&mut self, ts: DateTimeWithTimeZone) {
            self.created_at = sea_orm::Set(ts);
        }

        fn set_updated_at(&mut self, ts: DateTimeWithTimeZone) {
            self.updated_at = sea_orm::Set(ts);
        }
    }

    impl HasCreatedAtColumn for Entity {
        fn created_at_column() -> Self::Column {
            Column::CreatedAt
        }
    }
}
