// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库实现模块
///
/// 提供领域仓库接口的具体实现，所有实体都通过分区存储读写，
/// 主键与索引键的计算集中在 keys 模块
pub mod activity_repo_impl;
pub mod admin_event_repo_impl;
pub mod execution_repo_impl;
pub mod keys;
pub mod source_repo_impl;
pub mod task_repo_impl;
