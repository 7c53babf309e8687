pub mod balancer;
pub mod failure_table;
pub mod health_check;
pub mod idle_pool;

pub use balancer::{BalancePolicy, Balancer};
pub use failure_table::{FailureStatus, FailureTable};
pub use health_check::{ActiveCheckConfig, HealthChecker};
pub use idle_pool::IdlePool;
