// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

pub mod admin_review_api_test;
pub mod helpers;
pub mod sea_orm_store_test;
pub mod source_api_test;
