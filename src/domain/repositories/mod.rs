// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// 仓库接口模块
///
/// 该模块定义了领域层的仓库接口，遵循依赖倒置原则。
/// 所有实体都存放在分区存储（store）之上，具体实现由基础设施层提供。
///
/// 包含的仓库接口：
/// - 分区存储（store）：三个逻辑分区的键值与二级索引访问
/// - 数据源仓库（source_repository）：提交、分析与配置
/// - 任务仓库（task_repository）：任务调度与待执行槽位
/// - 执行记录仓库（execution_repository）：任务运行记录
/// - 活动仓库（activity_repository）：已发布活动与去重键
/// - 审核事件仓库（admin_event_repository）：待审核的原始提取结果
pub mod activity_repository;
pub mod admin_event_repository;
pub mod execution_repository;
pub mod source_repository;
pub mod store;
pub mod task_repository;
