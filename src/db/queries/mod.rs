pub mod daily_hours;
pub mod entries;
