// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 数据库实体模块
///
/// 分区存储的两张表：记录表与二级索引表
pub mod partition_index_entry;
pub mod partition_record;
