//! Commonly used types, for `use gosling::prelude::*;`.

pub use crate::browser::{Browser, BrowserSession, HttpBrowser, PageLoad};
pub use crate::config::{
    BrowserKind, Configuration, LoadTestConfiguration, LoadTestDefault, LoadTestDefaultType,
};
pub use crate::metrics::{Metric, MetricsAggregate, Stats};
pub use crate::phase::{PhaseController, TestPhase};
pub use crate::{GoslingError, LoadTest, LoadTestResult};
