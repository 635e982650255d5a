//! `SeaORM` entity definitions.

pub mod listings;
pub mod sea_orm_active_enums;
pub mod upload_activities;
pub mod uploaded_files;
