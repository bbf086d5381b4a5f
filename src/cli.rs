pub use tbdash_cli::{AgeParsing, Args, ChartFormat, MonthNames, Page};
