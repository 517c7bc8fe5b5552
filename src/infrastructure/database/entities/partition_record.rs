// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "partition_records")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub partition: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub pk: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub sk: String,
    pub data: JsonValue,
    pub expires_at: Option<DateTimeUtc>,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
