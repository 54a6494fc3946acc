//! Quiz item entity
//!
//! `item` holds the classified question in its JSON schema shape; the
//! question text is duplicated into its own column so answers can be matched
//! to it.

use crate::errors::AppError;
use crate::store::QuizItemRecord;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quiz_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub user_id: String,

    #[sea_orm(column_type = "Text")]
    pub question: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub item: serde_json::Value,

    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub student_answer: Option<serde_json::Value>,

    pub correctness: Option<i32>,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for QuizItemRecord {
    type Error = AppError;

    fn try_from(model: Model) -> std::result::Result<Self, AppError> {
        let student_answer = model
            .student_answer
            .map(serde_json::from_value)
            .transpose()?;

        Ok(QuizItemRecord {
            id: model.id,
            user_id: model.user_id,
            question: serde_json::from_value(model.item)?,
            student_answer,
            correctness: model.correctness,
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        })
    }
}
