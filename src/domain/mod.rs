// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 领域层模块
///
/// 该模块包含系统的核心业务逻辑，包括：
/// - 领域模型（models）：核心业务实体和数据结构
/// - 仓库接口（repositories）：数据持久化抽象接口
/// - 服务（services）：数据源生命周期、审核流程、去重与质量评分
///
/// 领域层不依赖于任何具体存储实现。
pub mod models;
pub mod repositories;
pub mod services;
