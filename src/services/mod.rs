pub mod aggregation;
pub mod daily_log;
pub mod hours_calculator;
pub mod live;
pub mod metrics;
