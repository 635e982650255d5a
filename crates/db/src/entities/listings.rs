//! `SeaORM` Entity for listings table.
//!
//! Rows are owned by the listings system; this service only reads them and
//! locks them while changing a listing's primary file.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "listings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub listing_type: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub listing_id: String,
    pub owner_uid: String,
    pub title: String,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
