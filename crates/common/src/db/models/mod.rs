//! SeaORM entity models
//!
//! Database entities for the per-user study collections

mod note;
mod quiz_item;
mod user;

pub use user::{
    Entity as UserEntity,
    Model as User,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
};

pub use note::{
    Entity as NoteEntity,
    Model as Note,
    Column as NoteColumn,
};

pub use quiz_item::{
    Entity as QuizItemEntity,
    Model as QuizItem,
    ActiveModel as QuizItemActiveModel,
    Column as QuizItemColumn,
};
