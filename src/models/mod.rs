pub mod change;
pub mod daily_hours;
pub mod entry;
pub mod summary;

pub use change::{ChangeEvent, Record};
pub use daily_hours::{
    DailyHours, DailyHoursInput, DailyHoursPatch, DailyHoursSummary, NewDailyHours,
};
pub use entry::{Entry, EntryInput, EntryPatch, NewEntry, DEFAULT_CURRENCY};
pub use summary::{HasTotals, PeriodSummary, Totals, WeekBucket};
