//! Read-side services.

pub mod task_query_service;

pub use task_query_service::{
    ProductTaskList, TaskListFilter, TaskQueryParams, TaskQueryService, TaskView,
};
