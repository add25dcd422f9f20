pub mod canary;
pub mod promote;
pub mod report;
