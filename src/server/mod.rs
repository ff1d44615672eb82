pub mod handler;

pub use handler::{render_answer, FundReportHandler};
