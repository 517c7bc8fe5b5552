// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "partition_index_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub partition: String,
    pub index_name: String,
    pub hash_key: String,
    pub sort_key: String,
    pub pk: String,
    pub sk: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
