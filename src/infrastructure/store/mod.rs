// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 分区存储实现
///
/// - 内存实现（memory）：测试与单机运行
/// - SeaORM实现（sea_orm_store）：PostgreSQL / SQLite
pub mod memory;
pub mod sea_orm_store;

pub use memory::MemoryPartitionStore;
pub use sea_orm_store::SeaOrmPartitionStore;
